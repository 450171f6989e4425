//! Shared test doubles for session integration tests

use byedap_session::{Notifier, OutputChannel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Diagnostic channel that records everything it receives.
#[derive(Default)]
pub struct CaptureChannel {
    lines: Mutex<Vec<String>>,
    revealed: AtomicBool,
}

impl CaptureChannel {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn was_revealed(&self) -> bool {
        self.revealed.load(Ordering::SeqCst)
    }
}

impl OutputChannel for CaptureChannel {
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

/// Notifier that records user-facing error messages.
#[derive(Default)]
pub struct CaptureNotifier {
    errors: Mutex<Vec<String>>,
}

impl CaptureNotifier {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl Notifier for CaptureNotifier {
    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

/// Write an executable shell script standing in for the byebug-dap adapter.
#[cfg(unix)]
pub fn write_adapter_script(dir: &std::path::Path, name: &str, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.to_string_lossy().into_owned()
}
