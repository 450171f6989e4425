//! byedap-session - Adapter session bootstrap
//!
//! This crate spawns the byebug-dap debug adapter, performs the startup
//! handshake, and exposes the resulting DAP transport to the editor host.
//!
//! # Architecture
//!
//! The bootstrap is a pipeline of small components:
//! - `scratch` allocates the process-wide directory that holds socket files
//! - `token` generates the sentinel and socket-name tokens
//! - `launcher` builds and spawns the adapter command line
//! - `handshake` scans merged subprocess output for the readiness sentinel
//! - `classify` turns failures into actionable user-facing messages
//! - `session` wires it together behind [`SessionProvider::resolve`]
//!
//! The editor host supplies the two collaborator seams in `channel`: an
//! [`OutputChannel`] for diagnostic output and a [`Notifier`] for failure
//! messages. DAP message semantics are out of scope; once the transport
//! descriptor is returned, the host talks to the adapter directly.

pub mod channel;
pub mod classify;
pub mod error;
pub mod handshake;
pub mod launcher;
pub mod scratch;
pub mod session;
pub mod token;

pub use channel::{Notifier, OutputChannel, TracingChannel, TracingNotifier};
pub use classify::{classify_spawn_failure, probe_gemfile, FailureCategory, GemfileProbe};
pub use error::{Error, Result};
pub use handshake::{FailureSignature, HandshakeScanner, HandshakeState, ScanStep};
pub use launcher::AdapterCommand;
pub use scratch::ScratchDir;
pub use session::{SessionHandle, SessionProvider, TransportDescriptor};
pub use token::random_token;
