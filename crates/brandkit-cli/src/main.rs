use std::io::{self, Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use brandkit_contracts::archive::DirectorySink;
use brandkit_contracts::assets::{AssetResult, AssetStatus};
use brandkit_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use brandkit_contracts::events::EventWriter;
use brandkit_engine::{
    build_service, ClipboardPayload, ImageFile, MemoryClipboardItem, PasteEvent, PasteTarget,
    ProviderKind, RunReport, Studio, StudioConfig, StudioSnapshot,
};
use clap::{Args, Parser, Subcommand};
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde_json::{json, Map, Value};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "brandkit", version, about = "Marketing asset studio")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat(ChatArgs),
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct SessionArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    /// Overrides BRANDKIT_PROVIDER (gemini or dryrun).
    #[arg(long)]
    provider: Option<String>,
    /// Skips the avatar description step.
    #[arg(long)]
    no_avatar: bool,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    prompt: String,
    #[command(flatten)]
    session: SessionArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("brandkit error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Run(args) => run_once(args),
    }
}

fn open_studio(session: &SessionArgs) -> Result<Studio> {
    let mut config = StudioConfig::from_env()?;
    if let Some(provider) = session.provider.as_deref() {
        config.provider = provider.parse::<ProviderKind>()?;
    }
    if session.no_avatar {
        config.avatar_step = false;
    }
    config.out_dir = Some(session.out.clone());

    let events_path = session
        .events
        .clone()
        .unwrap_or_else(|| session.out.join("events.jsonl"));
    let events = EventWriter::new(
        events_path,
        format!("session-{}", Uuid::new_v4().simple()),
    );
    let service = build_service(&config)?;
    events.emit(
        "session_started",
        json_object(json!({
            "provider": service.name(),
            "image_model": config.image_model,
            "text_model": config.text_model,
            "avatar_step": config.avatar_step,
            "out_dir": session.out.to_string_lossy(),
        })),
    )?;
    Ok(Studio::new(service, config, events))
}

fn run_once(args: RunArgs) -> Result<i32> {
    let studio = open_studio(&args.session)?;
    let file = ImageFile::from_path(&args.image)?;
    studio.select_image(file)?;
    studio.set_prompt(args.prompt.clone());

    let report = studio.generate_with(&print_update)?;
    print_report(&report);

    let mut sink = DirectorySink::new(args.session.out.join(&report.run_id).join("assets"));
    match studio.download_all(&mut sink)? {
        Some(path) => println!("Saved assets to {}", path.display()),
        None => println!("No assets to save."),
    }
    Ok(0)
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let out_dir = args.session.out.clone();
    let studio = open_studio(&args.session)?;

    let stdin = io::stdin();
    let mut line = String::new();

    println!("Brandkit chat started. Type /help for commands.");

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

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_intent(input);
        if intent.action == "noop" {
            continue;
        }

        match intent.action.as_str() {
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
                println!("Any other text replaces the product description.");
            }
            "set_prompt" => {
                let prompt = intent.prompt.clone().unwrap_or_default();
                if prompt.trim().is_empty() {
                    println!("/prompt requires text");
                    continue;
                }
                studio.set_prompt(prompt.clone());
                println!("Description set: {prompt}");
            }
            "select_image" => {
                let Some(path) = intent.arg_str("path") else {
                    println!("/image requires a path");
                    continue;
                };
                let file = match ImageFile::from_path(path) {
                    Ok(file) => file,
                    Err(err) => {
                        println!("Image failed: {err:#}");
                        continue;
                    }
                };
                match studio.select_image(file) {
                    Ok(()) => println!("Image set to {path}"),
                    Err(err) => println!("{err}"),
                }
            }
            "paste_image" => paste_from_clipboard(&studio, PasteTarget::ImageDropZone),
            "paste_prompt" => paste_from_clipboard(&studio, PasteTarget::DescriptionField),
            "generate" => spawn_run(&studio),
            "stop" => {
                if studio.stop() {
                    println!("Stopped. Finished assets were kept.");
                } else {
                    println!("Nothing to stop.");
                }
            }
            "clear" => {
                studio.clear();
                println!("Cleared image, description and results.");
            }
            "status" => print_status(&studio.snapshot()),
            "download" => {
                let dir = intent
                    .arg_str("path")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| out_dir.join("downloads"));
                let mut sink = DirectorySink::new(dir);
                match studio.download_all(&mut sink) {
                    Ok(Some(path)) => println!("Saved assets to {}", path.display()),
                    Ok(None) => println!("Nothing to download yet."),
                    Err(err) => println!("Download failed: {err:#}"),
                }
            }
            "quit" => break,
            "unknown" => {
                let command = intent.arg_str("command").unwrap_or("");
                println!("Unknown command: /{command}. Type /help for commands.");
            }
            _ => {}
        }
    }

    // In-flight requests are left to finish on their own threads; their
    // completions are discarded once the run is stopped.
    studio.stop();
    Ok(())
}

fn spawn_run(studio: &Studio) {
    if studio.snapshot().loading {
        println!("Restarting: the previous run is cancelled.");
    }
    let runner = studio.clone();
    let spawned = thread::Builder::new()
        .name("brandkit-run".to_string())
        .spawn(move || match runner.generate_with(&print_update) {
            Ok(report) => print_report(&report),
            Err(err) => println!("{err}"),
        });
    match spawned {
        Ok(_) => println!("Generating..."),
        Err(err) => println!("Generation failed to start: {err}"),
    }
}

fn paste_from_clipboard(studio: &Studio, target: PasteTarget) {
    let (payload, text) = match read_clipboard() {
        Ok(contents) => contents,
        Err(err) => {
            println!("Paste failed: {err:#}");
            return;
        }
    };
    let mut event = PasteEvent::new(target, payload);
    match studio.paste(&mut event) {
        Ok(true) => {
            let name = studio.snapshot().image_name.unwrap_or_default();
            println!("Image pasted: {name}");
        }
        Ok(false) if target == PasteTarget::DescriptionField => {
            let Some(text) = text.filter(|value| !value.trim().is_empty()) else {
                println!("Clipboard is empty.");
                return;
            };
            let current = studio.snapshot().prompt;
            let prompt = if current.trim().is_empty() {
                text.trim().to_string()
            } else {
                format!("{} {}", current.trim_end(), text.trim())
            };
            studio.set_prompt(prompt.clone());
            println!("Description set: {prompt}");
        }
        Ok(false) => println!("Clipboard has no image."),
        Err(err) => println!("{err}"),
    }
}

/// Snapshot of the system clipboard as paste payload plus its plain text.
/// A bitmap becomes an in-memory PNG item; text naming an image file on disk
/// becomes a file handle.
fn read_clipboard() -> Result<(ClipboardPayload, Option<String>)> {
    let mut clipboard = arboard::Clipboard::new().context("system clipboard unavailable")?;
    let mut payload = ClipboardPayload::default();

    if let Ok(image_data) = clipboard.get_image() {
        let width = image_data.width as u32;
        let height = image_data.height as u32;
        let image = RgbaImage::from_raw(width, height, image_data.bytes.into_owned())
            .context("clipboard image has an unexpected buffer size")?;
        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut png, ImageFormat::Png)
            .context("clipboard image PNG encode failed")?;
        payload
            .items
            .push(Box::new(MemoryClipboardItem::new("image/png", png.into_inner())));
    }

    let text = clipboard.get_text().ok();
    if let Some(text) = text.as_deref() {
        if let Some(file) = image_file_named_by(text) {
            payload.files.push(file);
        }
        payload.items.push(Box::new(MemoryClipboardItem::new(
            "text/plain",
            text.as_bytes().to_vec(),
        )));
    }
    Ok((payload, text))
}

fn image_file_named_by(text: &str) -> Option<ImageFile> {
    let path = Path::new(text.trim());
    if !path.is_file() {
        return None;
    }
    ImageFile::from_path(path)
        .ok()
        .filter(|file| file.mime_type().starts_with("image/"))
}

fn print_update(result: &AssetResult) {
    match result.status {
        AssetStatus::Success => println!("  [done]  {}", result.title),
        AssetStatus::Error => println!(
            "  [error] {}: {}",
            result.title,
            result.error_message.as_deref().unwrap_or("")
        ),
        AssetStatus::Pending => {}
    }
}

fn print_report(report: &RunReport) {
    if let Some(description) = report.avatar_description.as_deref() {
        println!("Brand avatar: {description}");
    }
    let mut line = format!(
        "Run {}: {} of {} assets ready, {} failed",
        report.run_id, report.succeeded, report.total, report.failed
    );
    if report.cancelled {
        line.push_str(&format!(", {} stopped", report.pending));
    }
    println!("{line}");
    if let Some(path) = report.summary_path.as_deref() {
        println!("Summary: {}", path.display());
    }
}

fn print_status(snapshot: &StudioSnapshot) {
    println!(
        "Image: {}",
        snapshot.image_name.as_deref().unwrap_or("(none)")
    );
    if snapshot.prompt.trim().is_empty() {
        println!("Description: (none)");
    } else {
        println!("Description: {}", snapshot.prompt);
    }
    if snapshot.loading {
        println!("Generating...");
    }
    if let Some(error) = snapshot.error.as_deref() {
        println!("Error: {error}");
    }
    for result in &snapshot.results {
        match result.error_message.as_deref() {
            Some(message) => println!("  {:<8} {}: {}", result.status.label(), result.title, message),
            None => println!("  {:<8} {}", result.status.label(), result.title),
        }
    }
    if !snapshot.results.is_empty() {
        println!(
            "{} ready, {} failed, {} pending",
            snapshot.count(AssetStatus::Success),
            snapshot.count(AssetStatus::Error),
            snapshot.count(AssetStatus::Pending)
        );
    }
}

fn json_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn run_command_parses_flags() {
        let cli = Cli::try_parse_from([
            "brandkit",
            "run",
            "--image",
            "mug.png",
            "--prompt",
            "blue mug",
            "--out",
            "out",
            "--provider",
            "dryrun",
            "--no-avatar",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.prompt, "blue mug");
        assert_eq!(args.session.provider.as_deref(), Some("dryrun"));
        assert!(args.session.no_avatar);
        assert_eq!(args.session.events, None);
    }

    #[test]
    fn chat_requires_out() {
        assert!(Cli::try_parse_from(["brandkit", "chat"]).is_err());
    }
}
