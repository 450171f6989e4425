//! Default constants for byedap configuration
//!
//! Centralizes the well-known executable names, adapter CLI flags, and
//! handshake parameters so every component reads defaults from one place.

// ============================================================================
// EXECUTABLES
// ============================================================================

/// Default Ruby interpreter executable (resolved via PATH)
pub const DEFAULT_RUBY_PATH: &str = "ruby";

/// Default Bundler executable (resolved via PATH)
pub const DEFAULT_BUNDLE_PATH: &str = "bundle";

/// Default byebug-dap adapter executable (resolved via PATH)
pub const DEFAULT_ADAPTER_PATH: &str = "byebug-dap";

/// Name of the adapter gem as it appears in a Gemfile
pub const ADAPTER_GEM_NAME: &str = "byebug-dap";

// ============================================================================
// ADAPTER CLI CONTRACT
// ============================================================================

/// Bundler subcommand used to run the adapter from the bundle
pub const BUNDLE_EXEC: &str = "exec";

/// Adapter flag: wait for the editor to attach before running the target
pub const FLAG_WAIT: &str = "--wait";

/// Adapter flag: capture the target program's output
pub const FLAG_CAPTURE_OUTPUT: &str = "--capture-output";

/// Adapter flag: suppress captured output from the adapter's own streams.
/// The spelling is the adapter's, not ours.
pub const FLAG_SUPPRESS_OUTPUT: &str = "--supress-output";

/// Adapter flag: echo the given token on its own line once ready
pub const FLAG_ON_START: &str = "--on-start";

/// Adapter flag: serve DAP over a unix socket at the given path
pub const FLAG_UNIX_SOCKET: &str = "--unix";

/// Adapter flag: log DAP protocol traffic
pub const FLAG_PROTOCOL_LOG: &str = "--debug-protocol";

/// Separator between adapter arguments and the target program
pub const ARG_SEPARATOR: &str = "--";

// ============================================================================
// HANDSHAKE
// ============================================================================

/// Length of generated sentinel and socket-name tokens
pub const TOKEN_LENGTH: usize = 10;

/// Prefix for the process-wide scratch directory
pub const SCRATCH_DIR_PREFIX: &str = "byedap-";

/// Socket file name shape: `debug-<token>.socket`
pub const SOCKET_FILE_PREFIX: &str = "debug-";

/// Socket file name suffix
pub const SOCKET_FILE_SUFFIX: &str = ".socket";

// ============================================================================
// GEMFILE PROBE
// ============================================================================

/// Inline Ruby script that prints one declared gem name per line.
/// Run as `ruby -e <script>` in the session's working directory.
pub const GEMFILE_PROBE_SCRIPT: &str =
    "require 'bundler'; puts Bundler::Definition.build('Gemfile', nil, {}).dependencies.map(&:name)";
