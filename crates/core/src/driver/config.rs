//! Configuration for the prompt driver.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::detector::{PromptDetector, QuiescenceDetector, SignatureDetector};
use super::types::Stage;

/// How the driver decides the tool is waiting for input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    /// Output stopped growing for one polling interval.
    Quiescence,
    /// A per-stage byte signature appeared in the output.
    Signature,
}

/// Configuration for driving the wrapped download tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Program to spawn.
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments passed to the program.
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Extra environment variables for the child process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Prompt detection strategy.
    #[serde(default = "default_detection")]
    pub detection: DetectionStrategy,

    /// Quiescence polling interval in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Hard limit for one job in seconds; the process is killed afterwards.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Label preceding the score title in the tool's output.
    #[serde(default = "default_title_label")]
    pub title_label: String,

    /// Prompt signatures used by signature detection.
    #[serde(default)]
    pub signatures: PromptSignatures,

    /// Keystrokes written at each stage.
    #[serde(default)]
    pub input: InputSequences,
}

fn default_program() -> String {
    "npx".to_string()
}

fn default_args() -> Vec<String> {
    vec!["-y".to_string(), "dl-librescore@latest".to_string()]
}

fn default_detection() -> DetectionStrategy {
    DetectionStrategy::Quiescence
}

fn default_poll_interval() -> u64 {
    1000 // 1 second
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_title_label() -> String {
    "Title:".to_string()
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            env: BTreeMap::new(),
            detection: default_detection(),
            poll_interval_ms: default_poll_interval(),
            timeout_secs: default_timeout(),
            title_label: default_title_label(),
            signatures: PromptSignatures::default(),
            input: InputSequences::default(),
        }
    }
}

impl DriverConfig {
    /// Creates a config for a custom program.
    pub fn with_program(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            ..Default::default()
        }
    }

    /// Sets the detection strategy.
    pub fn with_detection(mut self, detection: DetectionStrategy) -> Self {
        self.detection = detection;
        self
    }

    /// Sets the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds a fresh detector for one job.
    pub fn detector(&self) -> Box<dyn PromptDetector> {
        match self.detection {
            DetectionStrategy::Quiescence => {
                Box::new(QuiescenceDetector::new(self.poll_interval()))
            }
            DetectionStrategy::Signature => {
                Box::new(SignatureDetector::new(self.signatures.clone()))
            }
        }
    }
}

/// Text the tool prints when it waits at each prompt.
///
/// TOML escapes (`"\u001b[?25h"`) can be used for control sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSignatures {
    #[serde(default = "default_link_prompt")]
    pub link_prompt: String,
    #[serde(default = "default_confirmation_prompt")]
    pub confirmation_prompt: String,
    #[serde(default = "default_file_selection_prompt")]
    pub file_selection_prompt: String,
    #[serde(default = "default_destination_prompt")]
    pub destination_prompt: String,
}

fn default_link_prompt() -> String {
    "URL".to_string()
}

fn default_confirmation_prompt() -> String {
    "Continue?".to_string()
}

fn default_file_selection_prompt() -> String {
    "Filetype".to_string()
}

fn default_destination_prompt() -> String {
    "Output Directory".to_string()
}

impl Default for PromptSignatures {
    fn default() -> Self {
        Self {
            link_prompt: default_link_prompt(),
            confirmation_prompt: default_confirmation_prompt(),
            file_selection_prompt: default_file_selection_prompt(),
            destination_prompt: default_destination_prompt(),
        }
    }
}

impl PromptSignatures {
    /// Signature for the prompt awaited in `stage`.
    pub fn for_stage(&self, stage: Stage) -> Option<&str> {
        match stage {
            Stage::AwaitingLinkPrompt => Some(&self.link_prompt),
            Stage::AwaitingConfirmation => Some(&self.confirmation_prompt),
            Stage::AwaitingFileSelection => Some(&self.file_selection_prompt),
            Stage::AwaitingDestination => Some(&self.destination_prompt),
            Stage::Done => None,
        }
    }

    /// Name of the first empty signature, if any.
    pub fn first_empty(&self) -> Option<&'static str> {
        [
            ("link_prompt", &self.link_prompt),
            ("confirmation_prompt", &self.confirmation_prompt),
            ("file_selection_prompt", &self.file_selection_prompt),
            ("destination_prompt", &self.destination_prompt),
        ]
        .into_iter()
        .find(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
    }
}

/// Keystrokes written to the tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSequences {
    /// Appended to every answer.
    #[serde(default = "default_line_terminator")]
    pub line_terminator: String,

    /// Toggles every entry of the file-type checklist.
    #[serde(default = "default_toggle_all")]
    pub toggle_all: String,

    /// Confirms the checklist.
    #[serde(default = "default_confirm")]
    pub confirm: String,
}

fn default_line_terminator() -> String {
    "\n".to_string()
}

fn default_toggle_all() -> String {
    "a".to_string()
}

fn default_confirm() -> String {
    "\r".to_string()
}

impl Default for InputSequences {
    fn default() -> Self {
        Self {
            line_terminator: default_line_terminator(),
            toggle_all: default_toggle_all(),
            confirm: default_confirm(),
        }
    }
}

impl InputSequences {
    /// Answer for a free-text prompt.
    pub fn line(&self, text: &str) -> Vec<u8> {
        format!("{}{}", text, self.line_terminator).into_bytes()
    }

    /// Answer for a yes/no prompt, accepting the default.
    pub fn bare_confirmation(&self) -> Vec<u8> {
        self.line_terminator.clone().into_bytes()
    }

    /// Answer for the file-type checklist: select everything.
    pub fn select_all(&self) -> Vec<u8> {
        format!("{}{}{}", self.toggle_all, self.confirm, self.line_terminator).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert_eq!(config.program, "npx");
        assert_eq!(config.args, vec!["-y", "dl-librescore@latest"]);
        assert_eq!(config.detection, DetectionStrategy::Quiescence);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert_eq!(config.title_label, "Title:");
    }

    #[test]
    fn test_config_builder() {
        let config = DriverConfig::with_program("sh", vec!["tool.sh".to_string()])
            .with_detection(DetectionStrategy::Signature)
            .with_poll_interval(Duration::from_millis(50))
            .with_timeout(10);

        assert_eq!(config.program, "sh");
        assert_eq!(config.detection, DetectionStrategy::Signature);
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn test_detector_follows_strategy() {
        let config = DriverConfig::default();
        assert_eq!(config.detector().name(), "quiescence");

        let config = config.with_detection(DetectionStrategy::Signature);
        assert_eq!(config.detector().name(), "signature");
    }

    #[test]
    fn test_input_sequences() {
        let input = InputSequences::default();
        assert_eq!(input.line("https://x"), b"https://x\n");
        assert_eq!(input.bare_confirmation(), b"\n");
        assert_eq!(input.select_all(), b"a\r\n");
    }

    #[test]
    fn test_signatures_for_stage() {
        let signatures = PromptSignatures::default();
        assert_eq!(signatures.for_stage(Stage::AwaitingConfirmation), Some("Continue?"));
        assert_eq!(signatures.for_stage(Stage::Done), None);
        assert_eq!(signatures.first_empty(), None);
    }

    #[test]
    fn test_deserialize_control_sequence_signature() {
        let toml = r#"
detection = "signature"

[signatures]
link_prompt = "\u001b[?25h"
"#;
        let config: DriverConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.signatures.link_prompt, "\x1b[?25h");
        assert_eq!(config.signatures.destination_prompt, "Output Directory");
    }

    #[test]
    fn test_config_serialization() {
        let config = DriverConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: DriverConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.timeout_secs, config.timeout_secs);
        assert_eq!(parsed.detection, config.detection);
    }
}
