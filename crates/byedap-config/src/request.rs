//! Launch and attach request types
//!
//! These mirror the JSON configuration objects the editor collaborator sends:
//! a `launch` request names a Ruby program to debug, an `attach` request names
//! a socket produced by a prior launch session. Field names use the editor's
//! camelCase spelling.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_ADAPTER_PATH, DEFAULT_BUNDLE_PATH, DEFAULT_RUBY_PATH};

/// A debug session request from the editor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "lowercase")]
pub enum SessionRequest {
    /// Launch a new adapter subprocess for the given program
    Launch(LaunchRequest),
    /// Attach to the socket of an already-running adapter
    Attach(AttachRequest),
}

/// Configuration for attaching to an existing adapter socket.
///
/// Attach sessions are children of a launch session: when the debuggee spawns
/// a subprocess, the adapter reports a fresh socket and the editor starts a
/// nested session against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachRequest {
    /// Unix socket path the adapter is serving DAP on
    pub socket: PathBuf,
}

/// Configuration for launching a new debug session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    /// Path to the Ruby program to debug
    pub program: String,

    /// Working directory for the adapter and target program
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Arguments passed to the target program
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables layered over the ambient environment
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Log DAP protocol traffic from the adapter
    #[serde(default)]
    pub show_protocol_log: bool,

    /// Run the adapter through `bundle exec`
    #[serde(default)]
    pub use_bundler: bool,

    /// Ruby interpreter path (defaults to `ruby`)
    #[serde(default)]
    pub ruby_path: Option<String>,

    /// Bundler path (defaults to `bundle`)
    #[serde(default)]
    pub bundle_path: Option<String>,

    /// byebug-dap executable path (defaults to `byebug-dap`)
    #[serde(default)]
    pub byebug_dap_path: Option<String>,
}

impl LaunchRequest {
    /// Minimal launch request for a program with everything else defaulted.
    ///
    /// This is the shape of the synthesized "Debug current file"
    /// configuration.
    pub fn for_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            cwd: None,
            args: Vec::new(),
            env: HashMap::new(),
            show_protocol_log: false,
            use_bundler: false,
            ruby_path: None,
            bundle_path: None,
            byebug_dap_path: None,
        }
    }

    /// Apply defaults and produce the immutable per-session configuration.
    ///
    /// Path fields fall back to the well-known executable names; `cwd` falls
    /// back to the workspace root, then to the program's parent directory.
    pub fn resolve(self, workspace_root: Option<&Path>) -> ResolvedLaunchConfig {
        let cwd = self
            .cwd
            .or_else(|| workspace_root.map(Path::to_path_buf))
            .unwrap_or_else(|| program_dir(&self.program));

        ResolvedLaunchConfig {
            ruby_path: self.ruby_path.unwrap_or_else(|| DEFAULT_RUBY_PATH.into()),
            bundle_path: self
                .bundle_path
                .unwrap_or_else(|| DEFAULT_BUNDLE_PATH.into()),
            adapter_path: self
                .byebug_dap_path
                .unwrap_or_else(|| DEFAULT_ADAPTER_PATH.into()),
            use_bundler: self.use_bundler,
            cwd,
            program: self.program,
            args: self.args,
            env: self.env,
            show_protocol_log: self.show_protocol_log,
        }
    }
}

/// Directory containing the program, or `.` for a bare name
fn program_dir(program: &str) -> PathBuf {
    Path::new(program)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// A fully resolved launch configuration.
///
/// Immutable once constructed for a session; every path field has been
/// defaulted per [`LaunchRequest::resolve`].
#[derive(Debug, Clone)]
pub struct ResolvedLaunchConfig {
    /// Ruby interpreter executable
    pub ruby_path: String,
    /// Bundler executable
    pub bundle_path: String,
    /// byebug-dap adapter executable
    pub adapter_path: String,
    /// Run the adapter through `bundle exec`
    pub use_bundler: bool,
    /// Working directory for the adapter process
    pub cwd: PathBuf,
    /// Target program path
    pub program: String,
    /// Target program arguments
    pub args: Vec<String>,
    /// Extra environment (caller keys win over the ambient environment)
    pub env: HashMap<String, String>,
    /// Log DAP protocol traffic
    pub show_protocol_log: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_applies_executable_defaults() {
        let config = LaunchRequest::for_program("app/main.rb").resolve(None);

        assert_eq!(config.ruby_path, "ruby");
        assert_eq!(config.bundle_path, "bundle");
        assert_eq!(config.adapter_path, "byebug-dap");
        assert!(!config.use_bundler);
        assert!(!config.show_protocol_log);
    }

    #[test]
    fn test_resolve_keeps_explicit_paths() {
        let mut request = LaunchRequest::for_program("main.rb");
        request.ruby_path = Some("/opt/ruby/bin/ruby".into());
        request.byebug_dap_path = Some("/opt/gems/bin/byebug-dap".into());

        let config = request.resolve(None);
        assert_eq!(config.ruby_path, "/opt/ruby/bin/ruby");
        assert_eq!(config.adapter_path, "/opt/gems/bin/byebug-dap");
    }

    #[test]
    fn test_cwd_prefers_explicit_then_workspace_then_program_dir() {
        let mut request = LaunchRequest::for_program("/proj/src/main.rb");
        request.cwd = Some(PathBuf::from("/explicit"));
        let config = request.resolve(Some(Path::new("/workspace")));
        assert_eq!(config.cwd, PathBuf::from("/explicit"));

        let request = LaunchRequest::for_program("/proj/src/main.rb");
        let config = request.resolve(Some(Path::new("/workspace")));
        assert_eq!(config.cwd, PathBuf::from("/workspace"));

        let request = LaunchRequest::for_program("/proj/src/main.rb");
        let config = request.resolve(None);
        assert_eq!(config.cwd, PathBuf::from("/proj/src"));
    }

    #[test]
    fn test_cwd_for_bare_program_name() {
        let config = LaunchRequest::for_program("main.rb").resolve(None);
        assert_eq!(config.cwd, PathBuf::from("."));
    }

    #[test]
    fn test_launch_request_from_json() {
        let json = r#"{
            "request": "launch",
            "program": "lib/app.rb",
            "args": ["--verbose"],
            "env": {"RAILS_ENV": "test"},
            "useBundler": true,
            "showProtocolLog": true
        }"#;

        let request: SessionRequest = serde_json::from_str(json).unwrap();
        match request {
            SessionRequest::Launch(launch) => {
                assert_eq!(launch.program, "lib/app.rb");
                assert_eq!(launch.args, vec!["--verbose"]);
                assert_eq!(launch.env.get("RAILS_ENV").unwrap(), "test");
                assert!(launch.use_bundler);
                assert!(launch.show_protocol_log);
            }
            SessionRequest::Attach(_) => panic!("Expected launch request"),
        }
    }

    #[test]
    fn test_attach_request_from_json() {
        let json = r#"{"request": "attach", "socket": "/tmp/debug-abc.socket"}"#;

        let request: SessionRequest = serde_json::from_str(json).unwrap();
        match request {
            SessionRequest::Attach(attach) => {
                assert_eq!(attach.socket, PathBuf::from("/tmp/debug-abc.socket"));
            }
            SessionRequest::Launch(_) => panic!("Expected attach request"),
        }
    }

    #[test]
    fn test_launch_request_requires_program() {
        let json = r#"{"request": "launch"}"#;
        assert!(serde_json::from_str::<SessionRequest>(json).is_err());
    }
}
