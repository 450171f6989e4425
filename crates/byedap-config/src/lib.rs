//! Configuration types for byedap
//!
//! This crate provides:
//! - Launch/attach request structures as the editor collaborator sends them
//! - Default resolution into an immutable per-session configuration
//! - Well-known constants (executable names, adapter CLI flags)
//!
//! Configuration is an infrastructure concern: the session crate consumes
//! only the resolved form and never reads editor settings itself.

// Default constants for executables, flags, and handshake parameters
pub mod constants;

mod request;

pub use request::{AttachRequest, LaunchRequest, ResolvedLaunchConfig, SessionRequest};
