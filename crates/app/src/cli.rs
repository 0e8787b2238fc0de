//! Command line parsing and the startup plan derived from it

use clap::Parser;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Set to any value to print the startup plan as JSON instead of opening a window
pub const NO_WINDOW_ENV: &str = "PDF_EDITOR_NO_WINDOW";

#[derive(Debug, Parser)]
#[command(name = "pdf-editor")]
#[command(version, about = "Edit, annotate and rearrange PDF documents")]
pub struct Cli {
    /// PDF to open at startup
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args)
    }
}

/// What the window does when it comes up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartupPlan {
    pub version: String,
    /// File opened on startup
    pub open: Option<PathBuf>,
    /// Why the requested file is not opened
    pub warning: Option<String>,
}

impl StartupPlan {
    /// An unusable path is not fatal: the window opens empty and the
    /// reason is logged.
    pub fn resolve(cli: &Cli) -> Self {
        let (open, warning) = match cli.file.as_deref() {
            None => (None, None),
            Some(path) => match check_file(path) {
                Ok(()) => (Some(path.to_path_buf()), None),
                Err(reason) => {
                    tracing::warn!(path = %path.display(), %reason, "not opening startup file");
                    (None, Some(reason))
                }
            },
        };
        Self { version: env!("CARGO_PKG_VERSION").to_owned(), open, warning }
    }
}

fn check_file(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("file does not exist: {}", path.display()));
    }
    if !path.is_file() {
        return Err(format!("path is not a file: {}", path.display()));
    }
    Ok(())
}

pub fn no_window_requested() -> bool {
    std::env::var_os(NO_WINDOW_ENV).is_some()
}

/// Log to stderr; `RUST_LOG` overrides the `info` default
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_opens_empty_window() {
        let cli = Cli::parse_args(["pdf-editor"]).expect("args should parse");
        let plan = StartupPlan::resolve(&cli);

        assert_eq!(plan.open, None);
        assert_eq!(plan.warning, None);
    }

    #[test]
    fn existing_file_is_opened() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let file = temp.path().join("doc.pdf");
        std::fs::write(&file, b"%PDF-1.7").expect("write should succeed");

        let cli = Cli::parse_args([OsString::from("pdf-editor"), file.clone().into()])
            .expect("args should parse");
        assert_eq!(StartupPlan::resolve(&cli).open, Some(file));
    }

    #[test]
    fn missing_file_becomes_a_warning() {
        let cli = Cli::parse_args(["pdf-editor", "/definitely/not/here.pdf"]).expect("args should parse");
        let plan = StartupPlan::resolve(&cli);

        assert_eq!(plan.open, None);
        assert!(plan.warning.expect("warning expected").starts_with("file does not exist"));
    }

    #[test]
    fn directory_is_not_a_file() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let cli = Cli::parse_args([OsString::from("pdf-editor"), temp.path().into()])
            .expect("args should parse");

        let plan = StartupPlan::resolve(&cli);
        assert!(plan.warning.expect("warning expected").starts_with("path is not a file"));
    }

    #[test]
    fn extra_positional_arguments_are_rejected() {
        assert!(Cli::parse_args(["pdf-editor", "a.pdf", "b.pdf"]).is_err());
    }
}
