//! Adapter subprocess launching
//!
//! Builds the byebug-dap command line from a resolved configuration and
//! spawns it with piped standard streams. Environment layering: caller keys
//! are applied over the inherited process environment, caller winning on
//! conflict. No retries here; every failure surfaces to the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use byedap_config::constants::{
    ARG_SEPARATOR, BUNDLE_EXEC, FLAG_CAPTURE_OUTPUT, FLAG_ON_START, FLAG_PROTOCOL_LOG,
    FLAG_SUPPRESS_OUTPUT, FLAG_UNIX_SOCKET, FLAG_WAIT,
};
use byedap_config::ResolvedLaunchConfig;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{Error, Result};

/// A fully constructed adapter command line, ready to spawn.
#[derive(Debug, Clone)]
pub struct AdapterCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
}

impl AdapterCommand {
    /// Construct the command line per the launch policy.
    ///
    /// With `use_bundler` the adapter runs as `bundle exec byebug-dap ...`;
    /// otherwise `byebug-dap` is invoked directly. Handshake flags tell the
    /// adapter to wait for attach, capture target output, echo the sentinel
    /// once ready, and serve DAP on the given unix socket. Everything after
    /// `--` is the target program and its arguments.
    pub fn build(config: &ResolvedLaunchConfig, sentinel: &str, socket: &Path) -> Self {
        let mut args = Vec::new();

        let program = if config.use_bundler {
            args.push(BUNDLE_EXEC.to_string());
            args.push(config.adapter_path.clone());
            config.bundle_path.clone()
        } else {
            config.adapter_path.clone()
        };

        if config.show_protocol_log {
            args.push(FLAG_PROTOCOL_LOG.to_string());
        }

        args.push(FLAG_WAIT.to_string());
        args.push(FLAG_CAPTURE_OUTPUT.to_string());
        args.push(FLAG_SUPPRESS_OUTPUT.to_string());
        args.push(FLAG_ON_START.to_string());
        args.push(sentinel.to_string());
        args.push(FLAG_UNIX_SOCKET.to_string());
        args.push(socket.to_string_lossy().into_owned());

        args.push(ARG_SEPARATOR.to_string());
        args.push(config.program.clone());
        args.extend(config.args.iter().cloned());

        Self {
            program,
            args,
            cwd: config.cwd.clone(),
            env: config.env.clone(),
        }
    }

    /// The command line as echoed to the diagnostic channel.
    pub fn display(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }

    /// Spawn the adapter with piped stdio.
    ///
    /// The child is killed if its handle is dropped before it exits, so an
    /// abandoned session cannot leak a waiting adapter process.
    pub fn spawn(&self) -> Result<Child> {
        debug!(program = %self.program, "Spawning debug adapter");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // We never write to the adapter's stdin; drop it so the child sees EOF
        drop(child.stdin.take());

        Ok(child)
    }
}
