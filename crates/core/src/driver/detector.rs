//! Prompt detectors.
//!
//! A detector only answers "is the tool waiting at the current stage's
//! prompt?". The stage machine in the runner owns everything else, so a
//! different detection scheme only needs a new implementation of this trait.

use std::time::Duration;

use super::config::PromptSignatures;
use super::types::Stage;

/// Decides when the wrapped tool is waiting for input.
pub trait PromptDetector: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Interval at which [`on_tick`](Self::on_tick) wants to be called, if at all.
    fn poll_interval(&self) -> Option<Duration>;

    /// Inspects output received since the last stage transition.
    ///
    /// Returns the number of bytes of `fresh` consumed by the detected
    /// prompt, or `None` if the prompt for `stage` has not shown up yet.
    fn on_output(&mut self, stage: Stage, fresh: &[u8]) -> Option<usize>;

    /// Periodic check with the total output length so far.
    ///
    /// Returns `true` when the tool should be considered waiting at `stage`.
    fn on_tick(&mut self, stage: Stage, output_len: usize) -> bool;
}

/// Matches a fixed signature per stage.
#[derive(Debug, Clone)]
pub struct SignatureDetector {
    signatures: PromptSignatures,
}

impl SignatureDetector {
    pub fn new(signatures: PromptSignatures) -> Self {
        Self { signatures }
    }
}

impl PromptDetector for SignatureDetector {
    fn name(&self) -> &'static str {
        "signature"
    }

    fn poll_interval(&self) -> Option<Duration> {
        None
    }

    fn on_output(&mut self, stage: Stage, fresh: &[u8]) -> Option<usize> {
        let signature = self.signatures.for_stage(stage)?.as_bytes();
        if signature.is_empty() {
            return None;
        }
        find(fresh, signature).map(|pos| pos + signature.len())
    }

    fn on_tick(&mut self, _stage: Stage, _output_len: usize) -> bool {
        false
    }
}

/// Treats a new output plateau as a prompt.
///
/// A plateau is a tick at which the output length equals the previous tick's.
/// It is new when the output grew since the last plateau that was acted upon,
/// so one quiet period never answers two prompts.
#[derive(Debug, Clone)]
pub struct QuiescenceDetector {
    interval: Duration,
    last_len: usize,
    acted_len: usize,
}

impl QuiescenceDetector {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_len: 0,
            acted_len: 0,
        }
    }
}

impl PromptDetector for QuiescenceDetector {
    fn name(&self) -> &'static str {
        "quiescence"
    }

    fn poll_interval(&self) -> Option<Duration> {
        Some(self.interval)
    }

    fn on_output(&mut self, _stage: Stage, _fresh: &[u8]) -> Option<usize> {
        None
    }

    fn on_tick(&mut self, _stage: Stage, output_len: usize) -> bool {
        let grew = output_len != self.last_len;
        self.last_len = output_len;
        if grew || output_len <= self.acted_len {
            return false;
        }
        self.acted_len = output_len;
        true
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
