//! CLI binary for ocr-extract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr_extract::pipeline::intake::resolve_upload;
use ocr_extract::{
    ExtractionConfig, ExtractionOutput, ExtractionProgressCallback, Extractor, ProgressCallback,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── Terminal styling ─────────────────────────────────────────────────────────

const GREEN: u8 = 32;
const RED: u8 = 31;
const CYAN: u8 = 36;
const DIM: u8 = 2;
const BOLD: u8 = 1;

fn paint(code: u8, s: impl std::fmt::Display) -> String {
    format!("\x1b[{code}m{s}\x1b[0m")
}

const SPINNER_TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸ ")
        .tick_strings(&SPINNER_TICKS)
}

// ── Page progress reporter ───────────────────────────────────────────────────

/// Draws a bar on stderr and prints one line per finished page.
struct PageReporter {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
    failures: AtomicUsize,
}

impl PageReporter {
    /// Starts as a spinner; the page count arrives with `on_extraction_start`.
    fn spawn() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(bar_style("{spinner:.cyan} {msg}"));
        bar.set_message("rasterizing…");
        bar.enable_steady_tick(Duration::from_millis(100));
        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
            failures: AtomicUsize::new(0),
        })
    }

    fn page_secs(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .map_or(0.0, |t| t.elapsed().as_secs_f64())
    }

    fn log_page(&self, mark: String, page_num: usize, total: usize, detail: String) {
        let secs = self.page_secs();
        self.bar.println(format!(
            "  {mark} page {page_num}/{total}  {detail}  {}",
            paint(DIM, format!("{secs:.1}s"))
        ));
        self.bar.inc(1);
    }

    /// Clear the bar if extraction failed before `on_extraction_complete`.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ExtractionProgressCallback for PageReporter {
    fn on_extraction_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(bar_style(
            "{spinner:.cyan} {msg:<10} [{bar:40.cyan/238}] {pos}/{len}  {elapsed_precise}",
        ));
        self.bar.println(paint(BOLD, format!("Recognizing {total_pages} page(s)")));
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        if let Ok(mut slot) = self.page_started.lock() {
            *slot = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, token_count: usize) {
        self.log_page(
            paint(GREEN, "✓"),
            page_num,
            total_pages,
            paint(DIM, format!("{token_count} words")),
        );
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        let short: String = error.chars().take(80).collect();
        self.log_page(paint(RED, "✗"), page_num, total_pages, paint(RED, short));
    }

    fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failures = self.failures.load(Ordering::Relaxed);
        let mark = match failures {
            0 => paint(GREEN, "✔"),
            n if n == total_pages => paint(RED, "✘"),
            _ => paint(CYAN, "⚠"),
        };
        eprintln!("{mark} {success_count}/{total_pages} pages recognized");
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a scanned PDF (Spanish by default); prints the full text
  ocr-extract scan.pdf

  # English invoice, artifacts under ./out served at /files
  ocr-extract --lang eng --output-dir out --public-base /files invoice.png

  # Multiple languages
  ocr-extract --lang spa+eng contract.pdf

  # Full result as JSON (full_text, boxes, total_lines, downloads, …)
  ocr-extract --json scan.pdf > result.json

  # Plain text only, no artifacts written
  ocr-extract --plain https://example.com/scan.pdf

SUPPORTED INPUTS:
  .pdf .png .jpg .jpeg  (local path or HTTP/HTTPS URL, 50 MB max by default)

ENVIRONMENT VARIABLES:
  TESSERACT_LANG        Recognition language (default: spa)
  OCR_OUTPUT_DIR        Artifact directory (default: outputs)
  OCR_PUBLIC_BASE       URL prefix for artifact downloads (default: /outputs)
  OCR_DPI               Rasterization DPI (default: 300)
  OCR_TIMEOUT           Request deadline in seconds (default: 120)
  RUST_LOG              Override the log filter

SETUP:
  Debian/Ubuntu:  apt install tesseract-ocr tesseract-ocr-spa poppler-utils
  macOS:          brew install tesseract tesseract-lang poppler
"#;

/// Extract text and word boxes from PDFs and images with tesseract.
#[derive(Parser, Debug)]
#[command(
    name = "ocr-extract",
    version,
    about = "Extract text and word boxes from PDFs and images with tesseract",
    long_about = "Rasterize PDF pages with pdftoppm, recognize each page with tesseract, and \
write the merged result as JSON, plain text and markdown artifacts.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path or HTTP/HTTPS URL (.pdf, .png, .jpg, .jpeg).
    input: String,

    /// Recognition language in tesseract syntax (e.g. spa, eng, spa+eng).
    #[arg(short, long = "lang", env = "TESSERACT_LANG", default_value = "spa")]
    language: String,

    /// Directory receiving the <id>.json / .txt / .md artifacts.
    #[arg(short, long, env = "OCR_OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// URL prefix under which the output directory is served.
    #[arg(long, env = "OCR_PUBLIC_BASE", default_value = "/outputs")]
    public_base: String,

    /// Parent directory for per-request staging directories.
    #[arg(long, env = "OCR_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Rasterization DPI (72–600).
    #[arg(long, env = "OCR_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Request deadline in seconds (rasterization + recognition), at most one day.
    #[arg(long, env = "OCR_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Maximum upload size in MiB.
    #[arg(long, env = "OCR_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "OCR_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// tesseract executable.
    #[arg(long, env = "OCR_TESSERACT_BIN", default_value = "tesseract")]
    tesseract: PathBuf,

    /// pdftoppm executable.
    #[arg(long, env = "OCR_PDFTOPPM_BIN", default_value = "pdftoppm")]
    pdftoppm: PathBuf,

    /// Print the full result as JSON instead of the text.
    #[arg(long, env = "OCR_JSON", conflicts_with = "plain")]
    json: bool,

    /// Plain-text mode: no boxes, no artifacts.
    #[arg(long)]
    plain: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.plain;
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
    let progress = show_progress.then(PageReporter::spawn);
    let config = build_config(
        &cli,
        progress.clone().map(|cb| cb as Arc<dyn ExtractionProgressCallback>),
    )?;

    let extractor = match Extractor::new(config).await {
        Ok(extractor) => extractor,
        Err(e) => {
            if let Some(ref cb) = progress {
                cb.abandon();
            }
            return Err(e).context("Failed to initialise the OCR engine");
        }
    };

    // ── Plain-text mode ──────────────────────────────────────────────────
    if cli.plain {
        let upload = resolve_upload(&cli.input, extractor.config())
            .await
            .context("Failed to read input")?;
        let text = extractor
            .extract_text(upload)
            .await
            .context("Extraction failed")?;
        write_stdout(&text)?;
        return Ok(());
    }

    // ── Full extraction ──────────────────────────────────────────────────
    let result = extractor.extract_input(&cli.input).await;
    if let Some(ref cb) = progress {
        cb.abandon();
    }
    let output = result.context("Extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        write_stdout(&output.result.full_text)?;
    }

    if !cli.quiet && !cli.json {
        print_summary(&output);
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .language(&cli.language)
        .dpi(cli.dpi)
        .timeout_secs(cli.timeout)
        .output_dir(&cli.output_dir)
        .public_base(&cli.public_base)
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1 << 20))
        .download_timeout_secs(cli.download_timeout)
        .tesseract_bin(&cli.tesseract)
        .pdftoppm_bin(&cli.pdftoppm);

    if let Some(ref dir) = cli.staging_dir {
        builder = builder.staging_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn write_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

fn print_summary(output: &ExtractionOutput) {
    let r = &output.result;
    eprintln!(
        "{}  {} words on {} pages  {}ms",
        if output.stats.failed_pages == 0 { paint(GREEN, "✔") } else { paint(CYAN, "⚠") },
        r.total_tokens,
        r.total_pages,
        output.stats.total_ms,
    );
    for kind in ocr_extract::ArtifactKind::ALL {
        if let Some(loc) = output.downloads.get(kind) {
            eprintln!("   {:<8} {}", kind.to_string(), paint(DIM, &loc.url));
        }
    }
    for w in &output.warnings {
        eprintln!("   {} {} not written: {}", paint(RED, "✗"), w.artifact, w.message);
    }
}
