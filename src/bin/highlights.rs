//! CLI binary for pdf-highlights.
//!
//! A thin shim over the library crate: reads the JSON configuration, applies
//! flag overrides, runs the export and prints JSON to stdout or a summary to
//! stderr.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_highlights::{
    run_with_progress, ExtractionProgressCallback, ExtractionStats, InputParams,
    NoopProgressCallback, ProgressCallback, RunOutput,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: a page bar plus one line per unreadable page.
struct CliProgressCallback {
    bar: ProgressBar,
    annotations: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_extraction_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            annotations: AtomicUsize::new(0),
        })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Reading");
        self.bar.set_message("");
    }

    fn on_page_complete(&self, _page_num: usize, _total_pages: usize, annotations: usize) {
        let seen = self.annotations.fetch_add(annotations, Ordering::SeqCst) + annotations;
        self.bar.set_message(format!("{seen} annotations"));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(error)
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, stats: &ExtractionStats) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} annotations from {} pages  {}",
            green("✔"),
            bold(&stats.emitted.to_string()),
            stats.pages,
            dim(&format!("{}ms", stats.duration_ms)),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # JSON to stdout
  highlights '{"pdfInputPath": "paper.pdf"}'

  # Merge into a Markdown note in a vault
  highlights --config-file paper.json --output-dir ~/vault/literature

  # Dry run: no images written
  highlights --no-write --pretty '{"pdfInputPath": "paper.pdf", "groupBy": "tag"}'

CONFIGURATION (JSON, camelCase):
  pdfInputPath         PDF to read (required)
  assetOutputPath      Image root; images go to <assetOutputPath>/<baseName>/
  outputPath           Directory for <baseName>.md; omit for JSON output
  citeKey              Citation key in the note preamble
  taskPrefix           Comment prefix marking a task, e.g. "todo:"
  calloutPrefixes      [{"type": "question", "prefix": "q:", "title": "Questions"}]
  concatenationPrefix  Comment prefix continuing the previous annotation, e.g. "+"
  keywordPrefix        Comment prefix for keywords (default "keyword")
  sortBy               location | date | color
  groupBy              tag | annotation-date | export-date | color
  colorMode            hex | named
  dateFormat           strftime pattern (default "%Y-%m-%d")
  dateTimeFormat       strftime pattern (default "%Y-%m-%d %H:%M")
  imageDPI             36–600 (default 100)
  lastExportDate       epoch milliseconds; JSON output only
  noWrite              true to skip writing images

ENVIRONMENT VARIABLES:
  HIGHLIGHTS_CONFIG    JSON configuration when no argument is given
  PDFIUM_LIB_PATH      Directory containing the pdfium shared library
  RUST_LOG             Log filter override (logs go to stderr)
"#;

/// Export PDF annotations to JSON or to incremental Markdown notes.
#[derive(Parser, Debug)]
#[command(
    name = "highlights",
    version,
    about = "Export PDF annotations to JSON or incremental Markdown notes",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// JSON configuration object.
    #[arg(env = "HIGHLIGHTS_CONFIG", conflicts_with = "config_file")]
    config: Option<String>,

    /// Read the JSON configuration from a file.
    #[arg(long, short = 'c')]
    config_file: Option<PathBuf>,

    /// Override `outputPath`: write <baseName>.md into this directory.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Override `noWrite`: do not write image files.
    #[arg(long)]
    no_write: bool,

    /// Pretty-print JSON output.
    #[arg(long)]
    pretty: bool,

    /// Disable progress bar.
    #[arg(long, env = "HIGHLIGHTS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HIGHLIGHTS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HIGHLIGHTS_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The bar gives all the feedback that matters; keep INFO logs out of it.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let params = load_params(&cli).await?;

    let progress: ProgressCallback = if show_progress {
        CliProgressCallback::new_dynamic() as Arc<dyn ExtractionProgressCallback>
    } else {
        Arc::new(NoopProgressCallback)
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let report = run_with_progress(&params, progress)
        .await
        .with_context(|| format!("Export of {} failed", params.pdf_input_path.display()))?;

    match report.output {
        RunOutput::Json(data) => {
            let json = if cli.pretty {
                serde_json::to_string_pretty(&data)
            } else {
                serde_json::to_string(&data)
            }
            .context("Failed to serialise output")?;

            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{json}").context("Failed to write to stdout")?;
        }
        RunOutput::Markdown { path, export } => {
            if !cli.quiet {
                eprintln!(
                    "{}  {} new annotations  →  {}",
                    green("✔"),
                    export.new_annotations,
                    bold(&path.display().to_string()),
                );
            }
        }
    }

    if !cli.quiet && report.stats.images_failed > 0 {
        eprintln!(
            "   {} image regions could not be exported",
            red(&report.stats.images_failed.to_string())
        );
    }

    Ok(())
}

/// Read the JSON configuration and apply flag overrides.
async fn load_params(cli: &Cli) -> Result<InputParams> {
    let json = match (&cli.config, &cli.config_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration from {:?}", path))?,
        (None, None) => anyhow::bail!(
            "No configuration given: pass JSON as an argument, --config-file, or HIGHLIGHTS_CONFIG"
        ),
    };

    let mut params = InputParams::from_json(&json).context("Invalid configuration")?;

    if let Some(ref dir) = cli.output_dir {
        params.output_path = Some(dir.clone());
    }
    if cli.no_write {
        params.no_write = true;
    }

    Ok(params)
}
