//! Session descriptor provider
//!
//! The public entry point of the bootstrap: given a launch or attach request,
//! [`SessionProvider::resolve`] returns either a live transport descriptor or
//! `None` after all failure messaging has been dispatched. Launch sessions
//! spawn the adapter, drive the startup handshake to resolution, and hand the
//! surviving subprocess to a background watcher that owns cleanup.
//!
//! Every terminal path converges on one idempotent stop routine: external
//! stop requests and process exit race safely, the socket file is unlinked at
//! most once per session, and repeated [`SessionHandle::stop`] calls are
//! no-ops.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use byedap_config::constants::{SOCKET_FILE_PREFIX, SOCKET_FILE_SUFFIX, TOKEN_LENGTH};
use byedap_config::{ResolvedLaunchConfig, SessionRequest};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{Notifier, OutputChannel};
use crate::classify::{classify_spawn_failure, probe_gemfile, FailureCategory};
use crate::error::Error;
use crate::handshake::{FailureSignature, HandshakeScanner};
use crate::launcher::AdapterCommand;
use crate::scratch::ScratchDir;
use crate::token::random_token;

/// How long to keep reading already-buffered pipe data after process exit
const DRAIN_GRACE: Duration = Duration::from_millis(50);

/// Address over which DAP messages are subsequently exchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportDescriptor {
    /// A unix socket served by the adapter subprocess
    UnixSocket(PathBuf),
}

impl TransportDescriptor {
    pub fn socket_path(&self) -> &Path {
        match self {
            Self::UnixSocket(path) => path,
        }
    }
}

/// External stop control for one session.
///
/// Clone freely; `stop` is idempotent. Stopping before the handshake resolves
/// cancels it; stopping afterwards kills the adapter subprocess.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    stop: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { stop: Arc::new(tx) }
    }

    /// Request the session to stop. Repeated calls are no-ops.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// How a launch attempt's handshake resolved.
enum HandshakeOutcome {
    /// Sentinel seen; the subprocess and its streams survive into the watcher
    Ready {
        child: Child,
        stdout: ChildStdout,
        stderr: ChildStderr,
    },
    /// Process exited or errored before the sentinel
    Failed,
    /// External stop before resolution
    Cancelled,
}

/// Resolves session requests into transport descriptors.
pub struct SessionProvider {
    scratch: Arc<ScratchDir>,
    channel: Arc<dyn OutputChannel>,
    notifier: Arc<dyn Notifier>,
    workspace_root: Option<PathBuf>,
}

impl SessionProvider {
    pub fn new(channel: Arc<dyn OutputChannel>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            scratch: Arc::new(ScratchDir::new()),
            channel,
            notifier,
            workspace_root: None,
        }
    }

    /// Set the workspace root used as the default working directory.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Remove the scratch directory and every socket file under it.
    ///
    /// Call once at host shutdown, after all sessions have ended. Safe to
    /// call repeatedly.
    pub fn teardown(&self) {
        self.scratch.purge();
    }

    /// Resolve a session request into a transport descriptor.
    ///
    /// Attach requests return immediately; launch requests suspend until the
    /// adapter's startup handshake resolves, the subprocess dies, or `handle`
    /// is stopped. All failure messaging is dispatched before `None` is
    /// returned; nothing is thrown further up.
    pub async fn resolve(
        &self,
        request: SessionRequest,
        handle: &SessionHandle,
    ) -> Option<TransportDescriptor> {
        match request {
            SessionRequest::Attach(attach) => {
                debug!(socket = %attach.socket.display(), "Attach session: reusing adapter socket");
                Some(TransportDescriptor::UnixSocket(attach.socket))
            }
            SessionRequest::Launch(launch) => {
                let config = launch.resolve(self.workspace_root.as_deref());
                self.resolve_launch(config, handle).await
            }
        }
    }

    async fn resolve_launch(
        &self,
        config: ResolvedLaunchConfig,
        handle: &SessionHandle,
    ) -> Option<TransportDescriptor> {
        let socket_name = format!(
            "{}{}{}",
            SOCKET_FILE_PREFIX,
            random_token(TOKEN_LENGTH),
            SOCKET_FILE_SUFFIX
        );
        let socket = match self.scratch.path(&socket_name) {
            Ok(path) => path,
            Err(e) => {
                warn!("Failed to allocate session socket path: {}", e);
                self.notifier
                    .error("Could not allocate a socket for the debug session");
                return None;
            }
        };

        let sentinel = random_token(TOKEN_LENGTH);
        let command = AdapterCommand::build(&config, &sentinel, &socket);
        self.channel.append_line(&format!("$ {}", command.display()));

        let child = match command.spawn() {
            Ok(child) => child,
            Err(Error::Spawn { program, source }) => {
                self.channel
                    .append_line(&format!("Exited with error {}", source));
                let category = classify_spawn_failure(&program, &source, &config).await;
                self.dispatch_failure(category);
                remove_socket(&socket);
                return None;
            }
            Err(e) => {
                warn!("Adapter launch failed: {}", e);
                remove_socket(&socket);
                return None;
            }
        };

        match self.drive_handshake(child, &sentinel, &config, handle).await {
            HandshakeOutcome::Ready {
                child,
                stdout,
                stderr,
            } => {
                info!(socket = %socket.display(), "Adapter ready");
                self.watch_session(child, stdout, stderr, socket.clone(), handle.clone());
                Some(TransportDescriptor::UnixSocket(socket))
            }
            HandshakeOutcome::Failed | HandshakeOutcome::Cancelled => {
                remove_socket(&socket);
                None
            }
        }
    }

    /// Drive the startup handshake to resolution.
    ///
    /// Reads stdout and stderr cooperatively, feeding each chunk to the
    /// scanner. Process exit alone fails the handshake: stream EOF is not
    /// required, since descendants of the adapter can inherit the pipe write
    /// ends and hold them open past the adapter's death. An external stop
    /// cancels.
    async fn drive_handshake(
        &self,
        mut child: Child,
        sentinel: &str,
        config: &ResolvedLaunchConfig,
        handle: &SessionHandle,
    ) -> HandshakeOutcome {
        let mut stdout = match child.stdout.take() {
            Some(stream) => stream,
            None => return self.fail_without_streams(child, "stdout").await,
        };
        let mut stderr = match child.stderr.take() {
            Some(stream) => stream,
            None => return self.fail_without_streams(child, "stderr").await,
        };

        let mut scanner = HandshakeScanner::new(sentinel);
        let mut stop_rx = handle.subscribe();
        let mut stop_open = true;
        let mut known_failure: Option<JoinHandle<bool>> = None;

        let mut out_buf = vec![0u8; 4096];
        let mut err_buf = vec![0u8; 4096];
        let mut out_open = true;
        let mut err_open = true;

        let status = loop {
            let step = tokio::select! {
                status = child.wait() => break status,
                read = stdout.read(&mut out_buf), if out_open => match read {
                    Ok(0) | Err(_) => {
                        out_open = false;
                        None
                    }
                    Ok(n) => Some(scanner.feed(&String::from_utf8_lossy(&out_buf[..n]))),
                },
                read = stderr.read(&mut err_buf), if err_open => match read {
                    Ok(0) | Err(_) => {
                        err_open = false;
                        None
                    }
                    Ok(n) => Some(scanner.feed(&String::from_utf8_lossy(&err_buf[..n]))),
                },
                stopped = wait_for_stop(&mut stop_rx), if stop_open => {
                    if stopped {
                        scanner.cancel();
                        info!("Session stopped before the adapter became ready");
                        if let Err(e) = child.kill().await {
                            warn!("Failed to kill adapter after stop: {}", e);
                        }
                        return HandshakeOutcome::Cancelled;
                    }
                    // All handles dropped; no stop can arrive anymore
                    stop_open = false;
                    None
                }
            };

            if let Some(step) = step {
                for line in &step.flushed {
                    self.channel.append_line(line);
                }
                if let Some(signature) = step.signature {
                    known_failure = Some(self.classify_signature(signature, config));
                }
                if step.ready {
                    return HandshakeOutcome::Ready {
                        child,
                        stdout,
                        stderr,
                    };
                }
            }
        };

        // The adapter exited before the sentinel. Collect whatever output is
        // already buffered in the pipes without waiting for EOF; a sentinel
        // surfacing now is moot, the process is gone.
        for chunk in [
            drain_buffered(&mut stdout, out_open).await,
            drain_buffered(&mut stderr, err_open).await,
        ] {
            if chunk.is_empty() {
                continue;
            }
            let step = scanner.feed(&chunk);
            for line in &step.flushed {
                self.channel.append_line(line);
            }
            if let Some(signature) = step.signature {
                known_failure = Some(self.classify_signature(signature, config));
            }
        }
        if !scanner.remainder().is_empty() {
            self.channel.append_line(scanner.remainder());
        }
        scanner.fail();

        let code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                warn!("Failed to reap adapter: {}", e);
                None
            }
        };
        match code {
            Some(code) => self.channel.append_line(&format!("Exited with code {}", code)),
            None => self.channel.append_line("Exited on signal"),
        }

        let known = match known_failure {
            Some(task) => task.await.unwrap_or(false),
            None => false,
        };

        // A classified failure already produced a message; the generic
        // diagnostic reveal would be duplicate noise. Signal exits log the
        // line without revealing.
        if code.is_some_and(|c| c != 0) && !known {
            self.channel.reveal();
        }

        HandshakeOutcome::Failed
    }

    async fn fail_without_streams(&self, mut child: Child, which: &'static str) -> HandshakeOutcome {
        warn!("Adapter {} was not piped; aborting session", which);
        if let Err(e) = child.kill().await {
            warn!("Failed to kill adapter: {}", e);
        }
        HandshakeOutcome::Failed
    }

    /// Spawn asynchronous classification for a recognized failure signature.
    ///
    /// Runs concurrently with the rest of the handshake; the returned task
    /// resolves `true` once the user has been messaged, which suppresses the
    /// generic diagnostic reveal on exit.
    fn classify_signature(
        &self,
        signature: FailureSignature,
        config: &ResolvedLaunchConfig,
    ) -> JoinHandle<bool> {
        let config = config.clone();
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let category = match signature {
                FailureSignature::AdapterMissingFromBundle => {
                    let declared = probe_gemfile(&config).await.assume_declared();
                    FailureCategory::AdapterNotFound { declared }
                }
            };
            if let Some(message) = category.user_message() {
                notifier.error(&message);
            }
            true
        })
    }

    /// Own the ready session's subprocess until it ends.
    ///
    /// Stderr passes through to the diagnostic channel for the remainder of
    /// the session; stdout is drained and discarded. Process exit and
    /// external stop converge here, exactly once: log the exit, unlink the
    /// socket.
    fn watch_session(
        &self,
        mut child: Child,
        mut stdout: ChildStdout,
        mut stderr: ChildStderr,
        socket: PathBuf,
        handle: SessionHandle,
    ) {
        let channel = Arc::clone(&self.channel);
        tokio::spawn(async move {
            let mut stop_rx = handle.subscribe();
            let mut out_buf = vec![0u8; 4096];
            let mut err_buf = vec![0u8; 4096];
            let mut out_open = true;
            let mut err_open = true;

            let status = loop {
                tokio::select! {
                    status = child.wait() => break status.ok(),
                    stopped = wait_for_stop(&mut stop_rx) => {
                        if stopped {
                            debug!("Stop requested; killing adapter");
                        }
                        break None;
                    }
                    read = stdout.read(&mut out_buf), if out_open => {
                        // Drained to keep the pipe from backing up; DAP
                        // traffic goes over the socket, not stdout
                        if matches!(read, Ok(0) | Err(_)) {
                            out_open = false;
                        }
                    }
                    read = stderr.read(&mut err_buf), if err_open => match read {
                        Ok(0) | Err(_) => err_open = false,
                        Ok(n) => channel.append(&String::from_utf8_lossy(&err_buf[..n])),
                    },
                }
            };

            let status = match status {
                Some(status) => Some(status),
                None => {
                    // Stopped externally (or the stop channel closed with the
                    // session still up): kill and reap
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill adapter: {}", e);
                    }
                    child.wait().await.ok()
                }
            };

            match status.and_then(|s| s.code()) {
                Some(code) => channel.append_line(&format!("Exited with code {}", code)),
                None => channel.append_line("Exited on signal"),
            }
            remove_socket(&socket);
        });
    }

    fn dispatch_failure(&self, category: FailureCategory) {
        match category.user_message() {
            Some(message) => self.notifier.error(&message),
            None => self.channel.reveal(),
        }
    }
}

/// Resolve once the handle is stopped; `false` means every handle was
/// dropped and no stop can arrive anymore.
///
/// The watch guard is consumed before this returns, so callers never hold it
/// across an await and their futures stay `Send`.
async fn wait_for_stop(stop_rx: &mut watch::Receiver<bool>) -> bool {
    stop_rx.wait_for(|stopped| *stopped).await.is_ok()
}

/// Read whatever is already buffered on a pipe after process exit.
///
/// Gives up after a short grace period instead of waiting for EOF, which may
/// never come while an orphaned descendant holds the write end.
async fn drain_buffered<R>(stream: &mut R, open: bool) -> String
where
    R: AsyncRead + Unpin,
{
    let mut drained = String::new();
    if !open {
        return drained;
    }
    let mut buf = vec![0u8; 4096];
    loop {
        match tokio::time::timeout(DRAIN_GRACE, stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => drained.push_str(&String::from_utf8_lossy(&buf[..n])),
            _ => break,
        }
    }
    drained
}

/// Best-effort socket cleanup; the file may never have been created.
fn remove_socket(socket: &Path) {
    if let Err(e) = std::fs::remove_file(socket) {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(socket = %socket.display(), "Socket cleanup failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byedap_config::{AttachRequest, LaunchRequest};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingChannel {
        lines: Mutex<Vec<String>>,
        revealed: AtomicBool,
    }

    impl OutputChannel for CapturingChannel {
        fn append_line(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
        fn append(&self, chunk: &str) {
            self.lines.lock().unwrap().push(chunk.to_string());
        }
        fn reveal(&self) {
            self.revealed.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct CapturingNotifier {
        errors: Mutex<Vec<String>>,
    }

    impl Notifier for CapturingNotifier {
        fn error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    fn provider() -> (
        SessionProvider,
        Arc<CapturingChannel>,
        Arc<CapturingNotifier>,
    ) {
        let channel = Arc::new(CapturingChannel::default());
        let notifier = Arc::new(CapturingNotifier::default());
        let provider = SessionProvider::new(channel.clone(), notifier.clone());
        (provider, channel, notifier)
    }

    #[tokio::test]
    async fn test_attach_resolves_immediately() {
        let (provider, _, notifier) = provider();
        let request = SessionRequest::Attach(AttachRequest {
            socket: PathBuf::from("/tmp/debug-abc.socket"),
        });

        let descriptor = provider.resolve(request, &SessionHandle::new()).await;

        assert_eq!(
            descriptor,
            Some(TransportDescriptor::UnixSocket(PathBuf::from(
                "/tmp/debug-abc.socket"
            )))
        );
        assert!(notifier.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_launch_missing_adapter_notifies_and_returns_none() {
        let (provider, channel, notifier) = provider();
        let mut request = LaunchRequest::for_program("main.rb");
        request.byebug_dap_path = Some("nonexistent_command_12345".to_string());
        request.cwd = Some(std::env::temp_dir());

        let descriptor = provider
            .resolve(
                SessionRequest::Launch(request),
                &SessionHandle::new(),
            )
            .await;

        assert!(descriptor.is_none());

        // The missing program is the configured adapter path, so the
        // classifier renders the byebug-dap guidance
        let errors = notifier.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Could not find 'byebug-dap'"));

        // Command echo plus the spawn-error line
        let lines = channel.lines.lock().unwrap();
        assert!(lines[0].starts_with("$ nonexistent_command_12345"));
        assert!(lines.iter().any(|l| l.starts_with("Exited with error")));

        provider.teardown();
    }

    // Hosts drive resolution from spawned tasks, so the resolve future must
    // stay Send; this fails to compile if a lock guard is ever held across
    // an await inside it
    #[tokio::test]
    async fn test_resolve_runs_on_a_spawned_task() {
        let (provider, _, _) = provider();
        let provider = Arc::new(provider);
        let handle = SessionHandle::new();

        let task = {
            let provider = Arc::clone(&provider);
            let handle = handle.clone();
            tokio::spawn(async move {
                let request = SessionRequest::Attach(AttachRequest {
                    socket: PathBuf::from("/tmp/debug-xyz.socket"),
                });
                provider.resolve(request, &handle).await
            })
        };

        assert!(task.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let handle = SessionHandle::new();
        assert!(!handle.is_stopped());

        handle.stop();
        handle.stop();
        assert!(handle.is_stopped());
    }

    #[test]
    fn test_descriptor_socket_path() {
        let descriptor = TransportDescriptor::UnixSocket(PathBuf::from("/tmp/x.socket"));
        assert_eq!(descriptor.socket_path(), Path::new("/tmp/x.socket"));
    }
}
