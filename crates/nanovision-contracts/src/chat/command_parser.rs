use super::command_registry::{
    find_kind, CommandKind, NO_ARG_COMMANDS, OPTIONAL_PATH_COMMANDS, PATH_COMMANDS,
};

/// One line of chat input, classified.
///
/// Anything that is not a recognised slash command is an edit instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Noop,
    Upload { path: String },
    Reset,
    Download { dir: Option<String> },
    Status,
    Help,
    Quit,
    Edit { instruction: String },
    Unknown { command: String, arg: String },
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

// Unquoted paths with spaces are rejoined so `/upload my photo.jpg` works.
fn parse_single_path_arg(arg: &str) -> String {
    parse_path_args(arg).join(" ")
}

fn command_for(kind: CommandKind, arg: &str) -> ChatCommand {
    match kind {
        CommandKind::Upload => ChatCommand::Upload {
            path: parse_single_path_arg(arg),
        },
        CommandKind::Download => {
            let dir = parse_single_path_arg(arg);
            ChatCommand::Download {
                dir: (!dir.is_empty()).then_some(dir),
            }
        }
        CommandKind::Reset => ChatCommand::Reset,
        CommandKind::Status => ChatCommand::Status,
        CommandKind::Help => ChatCommand::Help,
        CommandKind::Quit => ChatCommand::Quit,
    }
}

pub fn parse_command(text: &str) -> ChatCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return ChatCommand::Noop;
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(kind) = find_kind(&command, PATH_COMMANDS)
                .or_else(|| find_kind(&command, OPTIONAL_PATH_COMMANDS))
                .or_else(|| find_kind(&command, NO_ARG_COMMANDS))
            {
                return command_for(kind, arg);
            }

            return ChatCommand::Unknown {
                command,
                arg: arg.to_string(),
            };
        }
    }

    // Instructions are kept verbatim; the session decides emptiness after trimming.
    ChatCommand::Edit {
        instruction: text.trim_end_matches(['\n', '\r']).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_command, ChatCommand};

    #[test]
    fn blank_lines_are_noops() {
        assert_eq!(parse_command(""), ChatCommand::Noop);
        assert_eq!(parse_command("   \t"), ChatCommand::Noop);
    }

    #[test]
    fn parse_upload_quoted_and_unquoted_paths() {
        assert_eq!(
            parse_command("/upload \"/tmp/my photo.jpg\""),
            ChatCommand::Upload {
                path: "/tmp/my photo.jpg".to_string()
            }
        );
        assert_eq!(
            parse_command("  /upload   photo.jpg  "),
            ChatCommand::Upload {
                path: "photo.jpg".to_string()
            }
        );
        assert_eq!(
            parse_command("/open my photo.jpg"),
            ChatCommand::Upload {
                path: "my photo.jpg".to_string()
            }
        );
    }

    #[test]
    fn parse_download_with_and_without_dir() {
        assert_eq!(
            parse_command("/download"),
            ChatCommand::Download { dir: None }
        );
        assert_eq!(
            parse_command("/download /tmp/out"),
            ChatCommand::Download {
                dir: Some("/tmp/out".to_string())
            }
        );
    }

    #[test]
    fn parse_no_arg_commands_case_insensitively() {
        assert_eq!(parse_command("/reset"), ChatCommand::Reset);
        assert_eq!(parse_command("/STATUS"), ChatCommand::Status);
        assert_eq!(parse_command("/help"), ChatCommand::Help);
        assert_eq!(parse_command("/quit"), ChatCommand::Quit);
        assert_eq!(parse_command("/exit"), ChatCommand::Quit);
    }

    #[test]
    fn plain_text_is_an_edit_instruction() {
        assert_eq!(
            parse_command("add a hat\n"),
            ChatCommand::Edit {
                instruction: "add a hat".to_string()
            }
        );
        // A lone slash is not a command.
        assert_eq!(
            parse_command("/ make it 50/50"),
            ChatCommand::Edit {
                instruction: "/ make it 50/50".to_string()
            }
        );
    }

    #[test]
    fn parse_unknown_command() {
        assert_eq!(
            parse_command("/magic foo bar"),
            ChatCommand::Unknown {
                command: "magic".to_string(),
                arg: "foo bar".to_string()
            }
        );
    }
}
