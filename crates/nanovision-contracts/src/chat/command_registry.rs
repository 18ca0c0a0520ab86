#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CommandKind {
    Upload,
    Reset,
    Download,
    Status,
    Help,
    Quit,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub kind: CommandKind,
}

pub(crate) const PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upload",
        kind: CommandKind::Upload,
    },
    CommandSpec {
        command: "open",
        kind: CommandKind::Upload,
    },
];

pub(crate) const OPTIONAL_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "download",
    kind: CommandKind::Download,
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "reset",
        kind: CommandKind::Reset,
    },
    CommandSpec {
        command: "status",
        kind: CommandKind::Status,
    },
    CommandSpec {
        command: "help",
        kind: CommandKind::Help,
    },
    CommandSpec {
        command: "quit",
        kind: CommandKind::Quit,
    },
    CommandSpec {
        command: "exit",
        kind: CommandKind::Quit,
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/upload <path>",
    "/reset",
    "/download [dir]",
    "/status",
    "/help",
    "/quit",
];

pub(crate) fn find_kind(command: &str, specs: &[CommandSpec]) -> Option<CommandKind> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.kind)
}
