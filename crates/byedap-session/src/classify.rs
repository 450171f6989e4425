//! Failure classification
//!
//! Maps subprocess spawn errors and recognized output signatures to a fixed
//! set of actionable categories, rendering each as a user-facing message.
//! Adapter-not-found failures are refined by probing the workspace Gemfile
//! through the configured Ruby interpreter; the probe is best-effort and its
//! own failures are treated as "not declared".

use std::io;
use std::process::Stdio;

use byedap_config::constants::{ADAPTER_GEM_NAME, GEMFILE_PROBE_SCRIPT};
use byedap_config::ResolvedLaunchConfig;
use tokio::process::Command;
use tracing::{debug, trace};

/// Category of a startup failure, derived at the moment of failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCategory {
    /// The Ruby interpreter executable was not found
    RubyNotFound,
    /// The Bundler executable was not found
    BundleNotFound,
    /// The byebug-dap executable was not found; `declared` reflects whether
    /// the Gemfile declares the gem (probe inconclusive counts as false)
    AdapterNotFound { declared: bool },
    /// Some other executable was not found
    ExecutableNotFound { path: String },
    /// The adapter exited with a non-zero code before the sentinel
    NonZeroExit { code: i32 },
    /// A spawn failure that is not a missing executable
    SpawnError { message: String },
}

impl FailureCategory {
    /// The user-facing message for this failure, if one exists.
    ///
    /// `NonZeroExit` and `SpawnError` return `None`: they carry no actionable
    /// advice, so the caller reveals the diagnostic channel instead.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::RubyNotFound => Some(
                "Could not find 'ruby'. Set \"rubyPath\" in the launch configuration \
                 to the full path to the ruby executable."
                    .to_string(),
            ),
            Self::BundleNotFound => Some(
                "Could not find 'bundle'. Install 'bundler' with `gem install bundler` \
                 or set \"bundlePath\" in the launch configuration to the full path to \
                 the bundle executable."
                    .to_string(),
            ),
            Self::AdapterNotFound { declared: true } => Some(
                "Could not find 'byebug-dap'. Run `bundle install` to install byebug-dap \
                 from your Gemfile, or set \"byebugDapPath\" in the launch configuration \
                 to the full path to the byebug-dap executable."
                    .to_string(),
            ),
            Self::AdapterNotFound { declared: false } => Some(
                "Could not find 'byebug-dap'. Add 'byebug-dap' to your Gemfile and run \
                 `bundle install`, or set \"byebugDapPath\" in the launch configuration \
                 to the full path to the byebug-dap executable."
                    .to_string(),
            ),
            Self::ExecutableNotFound { path } => Some(format!("Could not find '{}'", path)),
            Self::NonZeroExit { .. } | Self::SpawnError { .. } => None,
        }
    }
}

/// Outcome of probing the Gemfile for the adapter gem.
///
/// `Unknown` (probe spawn failure, non-zero exit, unparseable output) is an
/// explicit state so the "assume not declared" policy is a visible branch,
/// not exception suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GemfileProbe {
    /// The Gemfile declares the adapter gem
    Declared,
    /// The Gemfile does not declare the adapter gem
    NotDeclared,
    /// The manifest could not be checked
    Unknown,
}

impl GemfileProbe {
    /// Collapse the tri-state for message selection: only a positive probe
    /// counts as declared.
    pub fn assume_declared(self) -> bool {
        matches!(self, Self::Declared)
    }
}

/// Probe the workspace Gemfile for the adapter gem.
///
/// Invokes the configured interpreter with an inline script that prints one
/// declared gem name per line. Never fails past this function: any error
/// resolves to [`GemfileProbe::Unknown`].
pub async fn probe_gemfile(config: &ResolvedLaunchConfig) -> GemfileProbe {
    let output = Command::new(&config.ruby_path)
        .arg("-e")
        .arg(GEMFILE_PROBE_SCRIPT)
        .current_dir(&config.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            debug!("Gemfile probe failed to run: {}", e);
            return GemfileProbe::Unknown;
        }
    };

    if !output.status.success() {
        debug!(status = ?output.status, "Gemfile probe exited unsuccessfully");
        return GemfileProbe::Unknown;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let declared = stdout.lines().any(|line| line.trim() == ADAPTER_GEM_NAME);
    trace!(declared, "Gemfile probe completed");

    if declared {
        GemfileProbe::Declared
    } else {
        GemfileProbe::NotDeclared
    }
}

/// Classify a spawn failure for the given program.
///
/// Missing-executable errors are matched against the resolved configuration's
/// path fields; an adapter miss triggers the Gemfile probe to refine the
/// message. Everything else is a generic spawn error (diagnostic reveal, no
/// message).
pub async fn classify_spawn_failure(
    program: &str,
    source: &io::Error,
    config: &ResolvedLaunchConfig,
) -> FailureCategory {
    if source.kind() != io::ErrorKind::NotFound {
        return FailureCategory::SpawnError {
            message: source.to_string(),
        };
    }

    if program == config.ruby_path {
        FailureCategory::RubyNotFound
    } else if program == config.bundle_path {
        FailureCategory::BundleNotFound
    } else if program == config.adapter_path {
        let declared = probe_gemfile(config).await.assume_declared();
        FailureCategory::AdapterNotFound { declared }
    } else {
        FailureCategory::ExecutableNotFound {
            path: program.to_string(),
        }
    }
}
