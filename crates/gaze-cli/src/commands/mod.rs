use std::path::PathBuf;

macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            std::process::exit(1);
        })
    };
}

pub mod capture_ops;
pub mod config_ops;
pub mod dict_ops;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid capture file: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Settings(#[from] gaze_core::settings::SettingsError),
}
