//! Startup handshake scanner
//!
//! An explicit automaton over the adapter subprocess's interleaved
//! stdout/stderr bytes. The scanner waits for the sentinel token to appear on
//! a line of its own, recognizes known failure signatures along the way, and
//! flushes every completed non-sentinel line for the diagnostic channel.
//!
//! The automaton is pure: it consumes text chunks and reports what happened.
//! The async driver in [`crate::session`] owns the streams, the subprocess,
//! and the one-shot outcome.

use regex::Regex;
use tracing::trace;

/// Handshake state for one launch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for the sentinel line from either stream
    AwaitingSentinel,
    /// Sentinel seen; the adapter is ready for the transport connection
    Ready,
    /// Process exited or errored before the sentinel
    Failed,
    /// External stop request before resolution
    Cancelled,
}

/// Known failure signatures scanned for in adapter output.
///
/// A signature match schedules failure classification but does not itself
/// terminate the handshake; the process is expected to exit on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSignature {
    /// Bundler could not find the byebug-dap executable in the bundle
    AdapterMissingFromBundle,
}

/// Line-anchored signature patterns, matched against the whole buffer
const FAILURE_PATTERNS: &[(&str, FailureSignature)] = &[(
    r"^bundler: command not found: byebug-dap$",
    FailureSignature::AdapterMissingFromBundle,
)];

/// What one call to [`HandshakeScanner::feed`] observed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanStep {
    /// Completed lines to flush to the diagnostic channel
    pub flushed: Vec<String>,
    /// A known failure signature matched in this chunk
    pub signature: Option<FailureSignature>,
    /// The sentinel matched; the scanner is now [`HandshakeState::Ready`]
    pub ready: bool,
}

/// Scanner for the startup handshake of a single launch attempt.
pub struct HandshakeScanner {
    state: HandshakeState,
    // Accumulates raw chunks; holds at most one incomplete trailing line
    // between feeds once scanning begins
    buffer: String,
    sentinel: Regex,
    signatures: Vec<(Regex, FailureSignature)>,
    signature_seen: Option<FailureSignature>,
}

impl HandshakeScanner {
    /// Build a scanner awaiting `token` alone on a line of its own.
    pub fn new(token: &str) -> Self {
        // Tokens are lowercase alphabetic; escape anyway
        let sentinel = Regex::new(&format!("(?m)^{}$", regex::escape(token)))
            .expect("escaped sentinel pattern is valid");

        let signatures = FAILURE_PATTERNS
            .iter()
            .map(|(pattern, sig)| {
                let re = Regex::new(&format!("(?m){}", pattern))
                    .expect("static signature pattern is valid");
                (re, *sig)
            })
            .collect();

        Self {
            state: HandshakeState::AwaitingSentinel,
            buffer: String::new(),
            sentinel,
            signatures,
            signature_seen: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// The first failure signature observed, if any.
    pub fn signature_seen(&self) -> Option<FailureSignature> {
        self.signature_seen
    }

    /// Consume one chunk of output from either stream.
    ///
    /// Chunks are appended to the accumulation buffer. Scanning is deferred
    /// until the buffer contains a newline, so a line split across chunks is
    /// reassembled before any pattern test. Interleaving between stdout and
    /// stderr is best-effort; the sentinel is written to one stream whole.
    pub fn feed(&mut self, chunk: &str) -> ScanStep {
        let mut step = ScanStep::default();

        if self.state != HandshakeState::AwaitingSentinel {
            return step;
        }

        self.buffer.push_str(chunk);
        if !self.buffer.contains('\n') {
            return step;
        }

        for (re, sig) in &self.signatures {
            if self.signature_seen.is_none() && re.is_match(&self.buffer) {
                trace!(?sig, "Failure signature matched in adapter output");
                self.signature_seen = Some(*sig);
                step.signature = Some(*sig);
            }
        }

        if self.sentinel.is_match(&self.buffer) {
            self.state = HandshakeState::Ready;
            self.buffer.clear();
            step.ready = true;
            return step;
        }

        // Flush every complete line; keep the (possibly incomplete) tail
        let tail_start = self.buffer.rfind('\n').map(|i| i + 1).unwrap_or(0);
        step.flushed
            .extend(self.buffer[..tail_start].lines().map(str::to_string));
        self.buffer.drain(..tail_start);

        step
    }

    /// Remaining buffered output that never formed a complete line.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }

    /// Record process exit/error while still awaiting the sentinel.
    pub fn fail(&mut self) {
        if self.state == HandshakeState::AwaitingSentinel {
            self.state = HandshakeState::Failed;
        }
    }

    /// Record an external stop request while still awaiting the sentinel.
    pub fn cancel(&mut self) {
        if self.state == HandshakeState::AwaitingSentinel {
            self.state = HandshakeState::Cancelled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_on_own_line_matches() {
        let mut scanner = HandshakeScanner::new("abcdefghij");
        let step = scanner.feed("abcdefghij\n");

        assert!(step.ready);
        assert_eq!(scanner.state(), HandshakeState::Ready);
    }

    #[test]
    fn test_sentinel_as_substring_does_not_match() {
        let mut scanner = HandshakeScanner::new("abcdefghij");
        let step = scanner.feed("xxabcdefghijyy\n");

        assert!(!step.ready);
        assert_eq!(scanner.state(), HandshakeState::AwaitingSentinel);
        assert_eq!(step.flushed, vec!["xxabcdefghijyy"]);
    }

    #[test]
    fn test_sentinel_after_other_lines() {
        let mut scanner = HandshakeScanner::new("tokentoken");
        let step = scanner.feed("Loading...\ntokentoken\n");

        assert!(step.ready);
    }

    #[test]
    fn test_split_line_reassembly() {
        let mut scanner = HandshakeScanner::new("tokentoken");

        let step = scanner.feed("partial");
        assert!(step.flushed.is_empty());
        assert!(!step.ready);

        let step = scanner.feed("-line\ntokentoken\n");
        assert!(step.ready);
        // The sentinel match consumes the buffer whole; the flushed lines
        // check happens below via the non-sentinel variant
        let mut scanner = HandshakeScanner::new("tokentoken");
        scanner.feed("partial");
        let step = scanner.feed("-line\nmore\n");
        assert_eq!(step.flushed, vec!["partial-line", "more"]);
    }

    #[test]
    fn test_incomplete_tail_retained() {
        let mut scanner = HandshakeScanner::new("tokentoken");
        let step = scanner.feed("done line\nincomplete");

        assert_eq!(step.flushed, vec!["done line"]);
        assert_eq!(scanner.remainder(), "incomplete");
    }

    #[test]
    fn test_no_scan_without_newline() {
        let mut scanner = HandshakeScanner::new("tokentoken");
        let step = scanner.feed("tokentoken");

        assert!(!step.ready);
        assert_eq!(scanner.state(), HandshakeState::AwaitingSentinel);

        let step = scanner.feed("\n");
        assert!(step.ready);
    }

    #[test]
    fn test_failure_signature_detected_once() {
        let mut scanner = HandshakeScanner::new("tokentoken");

        let step = scanner.feed("bundler: command not found: byebug-dap\n");
        assert_eq!(step.signature, Some(FailureSignature::AdapterMissingFromBundle));
        assert_eq!(scanner.state(), HandshakeState::AwaitingSentinel);

        // Not reported again on subsequent feeds
        let step = scanner.feed("bundler: command not found: byebug-dap\n");
        assert_eq!(step.signature, None);
        assert_eq!(
            scanner.signature_seen(),
            Some(FailureSignature::AdapterMissingFromBundle)
        );
    }

    #[test]
    fn test_signature_requires_line_anchor() {
        let mut scanner = HandshakeScanner::new("tokentoken");
        let step = scanner.feed("note: bundler: command not found: byebug-dap happened\n");
        assert_eq!(step.signature, None);
    }

    #[test]
    fn test_terminal_state_ignores_feed() {
        let mut scanner = HandshakeScanner::new("tokentoken");
        scanner.feed("tokentoken\n");
        assert_eq!(scanner.state(), HandshakeState::Ready);

        let step = scanner.feed("more output\n");
        assert_eq!(step, ScanStep::default());
    }

    #[test]
    fn test_fail_and_cancel_transitions() {
        let mut scanner = HandshakeScanner::new("tokentoken");
        scanner.fail();
        assert_eq!(scanner.state(), HandshakeState::Failed);

        // Terminal states stick
        scanner.cancel();
        assert_eq!(scanner.state(), HandshakeState::Failed);

        let mut scanner = HandshakeScanner::new("tokentoken");
        scanner.cancel();
        assert_eq!(scanner.state(), HandshakeState::Cancelled);
        scanner.fail();
        assert_eq!(scanner.state(), HandshakeState::Cancelled);
    }

    #[test]
    fn test_crlf_lines_flushed_clean() {
        let mut scanner = HandshakeScanner::new("tokentoken");
        let step = scanner.feed("windows line\r\n");
        assert_eq!(step.flushed, vec!["windows line"]);
    }
}
