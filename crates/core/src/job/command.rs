//! Parsing of incoming texts.

/// What a requester asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// `/start`: greet the requester.
    Start,
    /// `/reset`: clear the requester's active job count.
    Reset,
    /// Anything else is treated as a score link.
    Link(String),
}

impl BotCommand {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let first = trimmed.split_whitespace().next().unwrap_or("");
        // Group chats address commands as `/start@bot_name`.
        let command = first.split('@').next().unwrap_or(first);

        match command.to_ascii_lowercase().as_str() {
            "/start" => BotCommand::Start,
            "/reset" | "reset" if trimmed.split_whitespace().count() == 1 => BotCommand::Reset,
            _ => BotCommand::Link(trimmed.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(BotCommand::parse("/start"), BotCommand::Start);
        assert_eq!(BotCommand::parse("/start@scorebot"), BotCommand::Start);
        assert_eq!(BotCommand::parse("/reset"), BotCommand::Reset);
        assert_eq!(BotCommand::parse("  Reset "), BotCommand::Reset);
        assert_eq!(BotCommand::parse("/RESET@scorebot"), BotCommand::Reset);
    }

    #[test]
    fn test_parse_link() {
        assert_eq!(
            BotCommand::parse(" https://musescore.com/user/1/scores/2 "),
            BotCommand::Link("https://musescore.com/user/1/scores/2".to_string())
        );
        assert_eq!(
            BotCommand::parse("reset my quota please"),
            BotCommand::Link("reset my quota please".to_string())
        );
    }
}
