use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gaze_cli::commands::{capture_ops, config_ops, dict_ops};
use gaze_cli::trace_init;
use gaze_core::ranker::ShiftState;

#[derive(Parser)]
#[command(name = "gazetool", about = "Gaze keyboard dictionary tool")]
struct Cli {
    /// Custom settings TOML (default: embedded settings)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Override the dictionary language
    #[arg(long, global = true)]
    language: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all entries with their usage counts
    List,
    /// Check whether a word is in the dictionary
    Exists {
        /// Word or phrase
        word: String,
    },
    /// Add a word to the user dictionary
    Add {
        /// Word or phrase
        word: String,
    },
    /// Remove a word and rewrite the user dictionary
    Remove {
        /// Word or phrase
        word: String,
    },
    /// Show ranked suggestions for the text typed so far
    Suggest {
        /// Text typed so far
        text: String,
        /// Predict the next word instead of completing the current one
        #[arg(long)]
        next_word: bool,
        /// Shift key state: up, down or locked
        #[arg(long, default_value = "up", value_parser = parse_shift)]
        shift: ShiftState,
    },
    /// Resolve a recorded capture (JSON array of {x, y, value, timestamp_ms})
    Resolve {
        /// Capture samples file
        file: String,
        /// Reliable first letter
        #[arg(long)]
        first: Option<char>,
        /// Reliable last letter
        #[arg(long)]
        last: Option<char>,
        /// Minimum dwell count (default: derived from the sampling rate)
        #[arg(long)]
        min_count: Option<usize>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export default settings as TOML
    SettingsExport,
    /// Validate a custom settings TOML file
    SettingsValidate {
        /// Path to the TOML file
        file: String,
    },
}

fn parse_shift(s: &str) -> Result<ShiftState, String> {
    match s.to_ascii_lowercase().as_str() {
        "up" => Ok(ShiftState::Up),
        "down" => Ok(ShiftState::Down),
        "locked" | "lockeddown" => Ok(ShiftState::LockedDown),
        other => Err(format!("unknown shift state '{other}' (expected up, down or locked)")),
    }
}

fn main() {
    trace_init::init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Command::SettingsExport => return config_ops::settings_export(),
        Command::SettingsValidate { file } => return config_ops::settings_validate(file),
        _ => {}
    }

    let mut settings = match config_ops::load_settings(cli.settings.as_deref()) {
        Ok(s) => s.clone(),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(language) = cli.language {
        settings.dictionary.language = language;
    }
    let service = dict_ops::open_service(settings);

    match cli.command {
        Command::List => dict_ops::list(&service),
        Command::Exists { word } => dict_ops::exists(&service, &word),
        Command::Add { word } => dict_ops::add(&service, &word),
        Command::Remove { word } => dict_ops::remove(&service, &word),
        Command::Suggest {
            text,
            next_word,
            shift,
        } => dict_ops::suggest(&service, &text, next_word, shift),
        Command::Resolve {
            file,
            first,
            last,
            min_count,
            json,
        } => capture_ops::resolve(&service, &file, first, last, min_count, json),
        Command::SettingsExport | Command::SettingsValidate { .. } => unreachable!(),
    }
}
