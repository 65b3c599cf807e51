//! Texts shown to requesters.

use crate::driver::FailureReason;

use super::types::FileDelivery;

pub const STARTED: &str = "Looking up your score...";

pub const MALFORMED_LINK: &str = "That doesn't look like a MuseScore score link. \
Send a link like https://musescore.com/user/123/scores/456";

pub const INVALID_LINK: &str = "Invalid link. Make sure the score exists and is public, then try again.";

pub const EMPTY_RESULT: &str = "Something unexpected happened: the download produced no files. \
Please try again.";

pub const UNEXPECTED_ERROR: &str = "Something unexpected went wrong. Please try again later.";

pub const RESET_DONE: &str = "Your active downloads have been reset. You can send new links now.";

/// Reply to `/start`.
pub fn greeting(first_name: Option<&str>) -> String {
    match first_name {
        Some(name) if !name.trim().is_empty() => format!("Hello {}!", name.trim()),
        _ => "Hello!".to_string(),
    }
}

pub fn quota_exceeded(ceiling: u32) -> String {
    format!(
        "You already have {} downloads in progress. Wait for one to finish, \
or send /reset if they are stuck.",
        ceiling
    )
}

pub fn title_found(title: &str) -> String {
    format!("Found score: {}\nDownloading...", title)
}

/// Final text for a failed driver run.
pub fn driver_failure(reason: &FailureReason) -> String {
    match reason {
        // Without a title the cause is unknown; a bad link is the likely one.
        FailureReason::NoTitle => INVALID_LINK.to_string(),
        FailureReason::TimedOut { timeout_secs } => format!(
            "The download took longer than {} seconds and was stopped. Please try again.",
            timeout_secs
        ),
    }
}

/// Final text once every delivery has completed.
pub fn delivery_summary(title: &str, files: &[FileDelivery]) -> String {
    let mut text = format!("Found score: {}\n", title);
    for file in files {
        let mark = if file.delivered() { "✅" } else { "❌" };
        text.push_str(&format!("\n{} {}", mark, file.filename));
    }

    let failed = files.iter().filter(|f| !f.delivered()).count();
    if failed == 0 {
        text.push_str("\n\nDone!");
    } else {
        text.push_str(&format!(
            "\n\nDone, but {} of {} files could not be sent.",
            failed,
            files.len()
        ));
    }
    text
}
