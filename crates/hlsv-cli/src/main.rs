//! `hlsv`: interactive terminal browser for HLS playlist hierarchies.
//!
//! Usage:
//!   hlsv <URL|PATH> [--timeout SECS] [--retries N] [--max-body BYTES]
//!        [--pointer GLYPH] [--no-color] [--log-file PATH]
//!
//! Keys: `q`/`Ctrl+C` quit, `↑`/`k` and `↓`/`j` move the selection,
//! `Enter`/`Space` open the selected entry, `Backspace`/`Ctrl+O` go back,
//! `u` reloads the current entry.

mod shell;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use hlsv::{AutoSource, CancellationToken, Color, Highlighter, Multi, Navigator, Plain, Pointer, Settings};
use tracing::{info, metadata::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hlsv", version, about = "Browse an HLS playlist hierarchy")]
struct Args {
    /// Master playlist URL, `file://` URL or local path.
    url: String,

    /// Request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Retry attempts for failed requests.
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Fetched bodies are truncated to this many bytes.
    #[arg(long, default_value_t = 1024 * 1024)]
    max_body: usize,

    /// Marker drawn in front of the selected line.
    #[arg(long)]
    pointer: Option<String>,

    /// Do not color the selected line.
    #[arg(long)]
    no_color: bool,

    /// Write logs to this file (nothing is logged otherwise).
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn settings(&self) -> Settings {
        Settings::default()
            .request_timeout(Duration::from_secs(self.timeout))
            .max_retries(self.retries)
            .max_body_bytes(self.max_body)
    }

    fn highlighter(&self) -> Box<dyn Highlighter> {
        let mut multi = Multi::default();
        if let Some(glyph) = &self.pointer {
            multi = multi.with(Pointer(glyph.clone()));
        }
        if !self.no_color {
            multi = multi.with(Color::default());
        }
        if multi.0.is_empty() {
            Box::new(Plain)
        } else {
            Box::new(multi)
        }
    }

    /// Local paths are made absolute so their directory can serve as a base.
    fn master_url(&self) -> String {
        let lower = self.url.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("file:")
        {
            return self.url.clone();
        }
        std::path::absolute(&self.url)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| self.url.clone())
    }
}

fn init_logging(path: Option<&Path>) -> std::io::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::INFO.into()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_line_number(true)
        .with_file(true)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(args.log_file.as_deref()) {
        eprintln!("hlsv: cannot open log file: {e}");
        return ExitCode::FAILURE;
    }

    let source = match AutoSource::new(args.settings()) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("hlsv: {e}");
            return ExitCode::FAILURE;
        }
    };

    let master_url = args.master_url();
    info!("hlsv starting: {}", master_url);

    let cancel = CancellationToken::new();
    let navigator = match Navigator::start(source, master_url, &cancel).await {
        Ok(navigator) => navigator,
        Err(e) => {
            eprintln!("hlsv: {e}");
            return ExitCode::FAILURE;
        }
    };

    match shell::run(navigator, args.highlighter(), cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hlsv: terminal error: {e}");
            ExitCode::FAILURE
        }
    }
}
