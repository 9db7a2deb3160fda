use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, FixedOffset};
use clap::{Parser, ValueEnum};
use gemini_export_core::config::parse_max_chars;
use gemini_export_core::{
    ExportConfig, ExportError, Locale, MarkerVocabulary, ScrollConfig, SnapshotPage,
    export_current_chat, export_response, export_response_to_json, format_export_markdown,
    local_iso_timestamp, now_local_iso, save_markdown,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LocaleArg {
    All,
    En,
    Ja,
}

impl LocaleArg {
    fn vocabulary(self) -> MarkerVocabulary {
        match self {
            Self::All => MarkerVocabulary::default(),
            Self::En => MarkerVocabulary::for_locale(Locale::En),
            Self::Ja => MarkerVocabulary::for_locale(Locale::Ja),
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "gemini-export",
    version,
    about = "Export a saved Gemini chat page as Markdown"
)]
struct Cli {
    /// Saved HTML of a Gemini chat page
    snapshot: PathBuf,

    /// Chat URL like https://gemini.google.com/app/<chat_id>; defaults to the page's canonical URL
    #[arg(long)]
    url: Option<String>,

    /// Truncate each message to this many characters (overrides GEMINI_EXPORT_MAX_CHARS)
    #[arg(long, value_parser = parse_max_chars_arg)]
    max_chars: Option<usize>,

    /// Write <chat_id>.md instead of printing the document
    #[arg(long)]
    save: bool,

    /// Directory for --save (overrides GEMINI_EXPORT_DIR)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Output the export response as JSON instead of markdown
    #[arg(long)]
    raw: bool,

    /// UI language(s) whose control labels mark conversation turns
    #[arg(long, value_enum, default_value_t = LocaleArg::All)]
    locale: LocaleArg,

    /// Fixed RFC 3339 generation time for the document header
    #[arg(long)]
    generated_at: Option<DateTime<FixedOffset>>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> gemini_export_core::Result<()> {
    let mut config = ExportConfig::from_env()?;
    if let Some(max_chars) = cli.max_chars {
        config.max_chars_per_message = Some(max_chars);
    }
    if let Some(dir) = cli.dir {
        config.save_dir = dir;
    }

    tracing::debug!(
        snapshot = %cli.snapshot.display(),
        locale = ?cli.locale,
        max_chars = ?config.max_chars_per_message,
        "loading snapshot"
    );
    let vocabulary = cli.locale.vocabulary();
    let options = config.extract_options();
    let mut page = SnapshotPage::from_file(&cli.snapshot, cli.url.as_deref())?;

    if cli.raw {
        let response = export_response(&mut page, &vocabulary, &options, ScrollConfig::default());
        let raw_json = export_response_to_json(&response)?;
        println!("{raw_json}");
        return match response.error {
            Some(error) => Err(ExportError::ExportAborted(error)),
            None => Ok(()),
        };
    }

    let payload = export_current_chat(&mut page, &vocabulary, &options, ScrollConfig::default())?;
    let generated_at = cli
        .generated_at
        .map(|at| local_iso_timestamp(&at))
        .unwrap_or_else(now_local_iso);
    let markdown = format_export_markdown(&payload, &generated_at);

    if cli.save {
        let chat_id = payload.chat_id.as_deref().ok_or(ExportError::NoActiveThread)?;
        let path = save_markdown(&config.save_dir, chat_id, &markdown)?;
        println!(
            "Exported {} messages to {}.",
            payload.messages.len(),
            path.display()
        );
    } else {
        print!("{markdown}");
    }

    Ok(())
}

fn parse_max_chars_arg(input: &str) -> Result<usize, String> {
    parse_max_chars(input).map_err(|err| err.to_string())
}
