//! Helpers for reading the tool's unstructured output.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// CSI and OSC escape sequences, plus stray single-character escapes.
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b(?:\[[0-9;?]*[ -/]*[@-~]|\][^\x07\x1b]*(?:\x07|\x1b\\)|[@-Z\\-_])")
        .expect("ANSI escape pattern is valid")
});

/// Removes terminal control sequences from `text`.
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Finds `label` in `output` and returns the rest of that line, cleaned up.
///
/// The last occurrence wins because interactive tools tend to redraw lines.
/// Returns `None` when the label is missing or followed by nothing.
pub fn extract_title(output: &[u8], label: &str) -> Option<String> {
    let text = strip_ansi(&String::from_utf8_lossy(output));
    text.lines()
        .filter_map(|line| {
            let start = line.rfind(label)? + label.len();
            let title = line[start..].trim();
            (!title.is_empty()).then(|| title.to_string())
        })
        .last()
}
