use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use nanovision_contracts::chat::{parse_command, ChatCommand, CHAT_HELP_COMMANDS};
use nanovision_contracts::events::EventWriter;
use nanovision_engine::{
    Editor, ProviderConfig, RemoteEditClient, Session, Status, SubmitRefusal, WaitOutcome,
};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "nanovision", version, about = "Prompt-driven image editing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload one image, apply one instruction, and save the result.
    Edit(EditArgs),
    /// Interactive editing session.
    Chat(ChatArgs),
}

#[derive(Debug, Args)]
struct SessionArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    prompt: String,
    /// Overrides the media type guessed from the file extension.
    #[arg(long)]
    media_type: Option<String>,
    /// Also print the edited image as an inline `data:` URL.
    #[arg(long)]
    print_data_url: bool,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    session: SessionArgs,
}

const MIN_TICK_MS: u64 = 10;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("nanovision error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Edit(args) => run_edit(args),
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
    }
}

fn open_editor(args: &SessionArgs) -> Result<Editor> {
    let config = ProviderConfig::from_env()
        .with_overrides(args.provider.as_deref(), args.model.as_deref());
    let client = RemoteEditClient::from_config(&config)?;
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let events = EventWriter::new(events_path, Uuid::new_v4().to_string());
    Editor::new(client, events)
}

fn tick_duration(tick_ms: u64) -> Duration {
    Duration::from_millis(tick_ms.max(MIN_TICK_MS))
}

fn run_edit(args: EditArgs) -> Result<i32> {
    let mut editor = open_editor(&args.session)?;
    let tick = tick_duration(args.session.tick_ms);

    if editor
        .upload(&args.image, args.media_type.as_deref())
        .is_err()
    {
        return Ok(report_failure(&editor));
    }
    if settle(&mut editor, tick, false)? != Status::Idle {
        return Ok(report_failure(&editor));
    }

    editor.set_instruction(args.prompt.as_str());
    if let Err(refusal) = editor.submit() {
        eprintln!("{}", refusal_message(refusal));
        return Ok(1);
    }
    let status = settle(&mut editor, tick, true)?;
    println!();
    if status != Status::Succeeded {
        return Ok(report_failure(&editor));
    }

    let path = editor.download(&args.session.out)?;
    println!("Saved {}", path.display());
    if args.print_data_url {
        if let Some(url) = generated_data_url(editor.session()) {
            println!("{url}");
        }
    }
    warn_on_log_error(&editor);
    Ok(0)
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let mut editor = open_editor(&args.session)?;
    let tick = tick_duration(args.session.tick_ms);
    let stdin = io::stdin();
    let mut line = String::new();
    let mut log_warned = false;

    println!(
        "Nanovision chat started ({} provider). Type /help for commands.",
        editor.provider_name()
    );

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        match parse_command(&line) {
            ChatCommand::Noop => continue,
            ChatCommand::Help => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
                println!("Anything else is sent as an edit instruction.");
            }
            ChatCommand::Upload { path } => {
                if path.is_empty() {
                    println!("/upload requires a path");
                    continue;
                }
                match editor.upload(Path::new(&path), None) {
                    Ok(_) => {
                        settle(&mut editor, tick, false)?;
                        println!("{}", describe_session(editor.session()));
                    }
                    Err(refusal) => println!("{refusal}"),
                }
            }
            ChatCommand::Reset => {
                editor.reset();
                println!("Session cleared.");
            }
            ChatCommand::Download { dir } => {
                let dir = dir
                    .map(PathBuf::from)
                    .unwrap_or_else(|| args.session.out.clone());
                match editor.download(&dir) {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(err) => println!("{err:#}"),
                }
            }
            ChatCommand::Status => {
                let view = editor.snapshot();
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
            ChatCommand::Quit => break,
            ChatCommand::Edit { instruction } => {
                editor.set_instruction(instruction);
                match editor.submit() {
                    Ok(_) => {
                        settle(&mut editor, tick, true)?;
                        println!();
                        println!("{}", describe_session(editor.session()));
                    }
                    Err(refusal) => println!("{}", refusal_message(refusal)),
                }
            }
            ChatCommand::Unknown { command, .. } => {
                println!("Unknown command: /{command}. Type /help for commands.");
            }
        }
        if !log_warned && editor.log_error().is_some() {
            warn_on_log_error(&editor);
            log_warned = true;
        }
    }
    Ok(())
}

/// Drives the editor until no work is in flight and returns the final status.
fn settle(editor: &mut Editor, tick: Duration, show_progress: bool) -> Result<Status> {
    loop {
        if !editor.session().status().is_busy() {
            return Ok(editor.session().status());
        }
        match editor.wait(tick) {
            WaitOutcome::Applied(status) if !status.is_busy() => return Ok(status),
            WaitOutcome::Applied(_) | WaitOutcome::Ignored => {}
            WaitOutcome::Ticked(progress) => {
                if show_progress {
                    print!("\r{}", progress_line(progress));
                    io::stdout().flush()?;
                }
            }
        }
    }
}

fn progress_line(progress: f64) -> String {
    format!("Generating... {:>3.0}%", progress.clamp(0.0, 100.0))
}

fn refusal_message(refusal: SubmitRefusal) -> &'static str {
    match refusal {
        SubmitRefusal::NoOriginal => "Upload an image first (/upload <path>).",
        SubmitRefusal::EmptyInstruction => "Type an edit instruction first.",
        SubmitRefusal::UploadInFlight => "Wait for the upload to finish.",
    }
}

fn describe_session(session: &Session) -> String {
    match session.status() {
        Status::Idle => match session.original() {
            Some(asset) => format!(
                "Image loaded ({}, {} bytes).",
                asset.media_type(),
                asset.raw_bytes().len()
            ),
            None => "No image loaded.".to_string(),
        },
        Status::Uploading => "Uploading...".to_string(),
        Status::Generating => progress_line(session.progress()),
        Status::Succeeded => match session.generated() {
            Some(asset) => format!(
                "Edit ready ({} bytes). Use /download to save it.",
                asset.raw_bytes().len()
            ),
            None => "Edit ready.".to_string(),
        },
        Status::Failed => match session.failure() {
            Some(failure) => format!("Failed: {}", failure.message),
            None => "Failed.".to_string(),
        },
    }
}

fn generated_data_url(session: &Session) -> Option<String> {
    let asset = session.generated()?;
    session.displays().data_url(asset.display_handle())
}

fn warn_on_log_error(editor: &Editor) {
    if let Some(err) = editor.log_error() {
        eprintln!("warning: event log not written: {err}");
    }
}

fn report_failure(editor: &Editor) -> i32 {
    let session = editor.session();
    match session.failure() {
        Some(failure) => eprintln!("{}", failure.message),
        None => eprintln!("edit did not complete (status: {})", session.status().as_str()),
    }
    warn_on_log_error(editor);
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_edit_with_shared_flags() {
        let cli = Cli::try_parse_from([
            "nanovision",
            "edit",
            "--image",
            "photo.jpg",
            "--prompt",
            "add a hat",
            "--out",
            "out",
            "--provider",
            "dryrun",
            "--tick-ms",
            "50",
        ])
        .unwrap();
        let Command::Edit(args) = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(args.image, PathBuf::from("photo.jpg"));
        assert_eq!(args.prompt, "add a hat");
        assert_eq!(args.session.provider.as_deref(), Some("dryrun"));
        assert_eq!(args.session.tick_ms, 50);
        assert!(args.session.events.is_none());
    }

    #[test]
    fn chat_requires_out() {
        assert!(Cli::try_parse_from(["nanovision", "chat"]).is_err());
        let cli = Cli::try_parse_from(["nanovision", "chat", "--out", "o"]).unwrap();
        let Command::Chat(args) = cli.command else {
            panic!("expected chat");
        };
        assert_eq!(args.session.tick_ms, 250);
    }

    #[test]
    fn tick_has_a_floor() {
        assert_eq!(tick_duration(0), Duration::from_millis(MIN_TICK_MS));
        assert_eq!(tick_duration(400), Duration::from_millis(400));
    }

    #[test]
    fn progress_line_rounds_percent() {
        assert_eq!(progress_line(12.0), "Generating...  12%");
        assert_eq!(progress_line(94.6), "Generating...  95%");
    }

    #[test]
    fn describe_empty_session() {
        let session = Session::new();
        assert_eq!(describe_session(&session), "No image loaded.");
    }

    #[test]
    fn dryrun_edit_writes_output_and_events() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let image = temp.path().join("photo.png");
        std::fs::write(&image, b"not-really-a-png")?;
        let out = temp.path().join("out");

        let code = run_edit(EditArgs {
            image,
            prompt: "add a hat".to_string(),
            media_type: None,
            print_data_url: false,
            session: SessionArgs {
                out: out.clone(),
                events: None,
                provider: Some("dryrun".to_string()),
                model: None,
                tick_ms: 10,
            },
        })?;
        assert_eq!(code, 0);

        let saved: Vec<_> = std::fs::read_dir(&out)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        assert!(saved.iter().any(|name| name.starts_with("nanovision-edit-")));
        assert!(saved.iter().any(|name| name == "events.jsonl"));
        Ok(())
    }

    #[test]
    fn generated_image_renders_as_data_url() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let image = temp.path().join("photo.png");
        std::fs::write(&image, b"not-really-a-png")?;
        let client = RemoteEditClient::new(std::sync::Arc::new(
            nanovision_engine::provider::DryrunProvider::new(),
        ));
        let mut editor = Editor::new(client, EventWriter::discard("cli-test"))?;
        let tick = tick_duration(10);

        assert!(generated_data_url(editor.session()).is_none());
        assert!(editor.upload(&image, None).is_ok());
        assert_eq!(settle(&mut editor, tick, false)?, Status::Idle);
        editor.set_instruction("add a hat");
        assert!(editor.submit().is_ok());
        assert_eq!(settle(&mut editor, tick, false)?, Status::Succeeded);

        let url = generated_data_url(editor.session()).unwrap();
        assert!(url.starts_with("data:image/png;base64,"), "{url}");
        Ok(())
    }

    #[test]
    fn rejected_media_type_exits_with_failure() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let code = run_edit(EditArgs {
            image: temp.path().join("document.pdf"),
            prompt: "add a hat".to_string(),
            media_type: None,
            print_data_url: false,
            session: SessionArgs {
                out: temp.path().join("out"),
                events: None,
                provider: Some("dryrun".to_string()),
                model: None,
                tick_ms: 10,
            },
        })?;
        assert_eq!(code, 1);
        Ok(())
    }
}
