//! CLI binary for mdstory.
//!
//! A thin shim over the library crate that maps CLI flags to `RenderConfig`,
//! writes the rendered slides and reports progress.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mdstory::{
    archive_bytes, check_toolchain, write_images, ProgressCallback, RasterFormat, RenderConfig,
    RenderProgressCallback, Stage, StoryRenderer, StyleSheet,
};
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
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

/// Terminal progress: a spinner naming the running stage, plus one line per
/// finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Rendering");
        bar.set_message("preparing workspace…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Workspace => "workspace",
        Stage::Layout => "layout (pandoc + weasyprint)",
        Stage::Raster => "rasterise (pdftoppm)",
        Stage::Collect => "collect pages",
    }
}

impl RenderProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(format!("{}…", stage_label(stage)));
    }

    fn on_stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<30}  {}",
            green("✓"),
            stage_label(stage),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, stage: Stage, _error: &str) {
        self.bar
            .println(format!("  {} {}", red("✗"), stage_label(stage)));
        self.bar.finish_and_clear();
    }

    fn on_render_complete(&self, page_count: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} slides rendered",
            green("✔"),
            bold(&page_count.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Render a file into ./story-01.png, ./story-02.png, …
  mdstory post.md

  # Read from stdin, write into a directory
  cat post.md | mdstory -o slides/

  # Package the slides as a ZIP
  mdstory post.md --archive story.zip

  # Inline preview JSON ({ images: [{ index, dataUrl }] })
  mdstory post.md --json > preview.json

  # Custom typography, larger rasters
  mdstory post.md --css brand.css --dpi 192

  # Verify the external tools are installed
  mdstory --check

REQUIRED TOOLS:
  pandoc       markdown → HTML               https://pandoc.org/installing.html
  weasyprint   HTML + CSS → paginated PDF    pip install weasyprint
  pdftoppm     PDF → PNG (poppler-utils)     apt install poppler-utils

ENVIRONMENT VARIABLES:
  MDSTORY_PANDOC      Path to pandoc (overrides PATH lookup)
  MDSTORY_WEASYPRINT  Path to weasyprint (overrides PATH lookup)
  MDSTORY_PDFTOPPM    Path to pdftoppm (overrides PATH lookup)
  RUST_LOG            Log filter, e.g. RUST_LOG=mdstory=debug
"#;

/// Render Markdown into story-sized (1080×1920) slide images.
#[derive(Parser, Debug)]
#[command(
    name = "mdstory",
    version,
    about = "Render Markdown into story-sized (1080×1920) slide images",
    long_about = "Render a Markdown document into a sequence of 1080×1920 images, one per \
page, ready to post as story slides. Layout is done by pandoc and WeasyPrint; pages are \
rasterised by pdftoppm.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file to render. Reads stdin when omitted or `-`.
    input: Option<PathBuf>,

    /// Directory to write the slides into (created if missing). Default: current directory.
    #[arg(short, long, env = "MDSTORY_OUTPUT")]
    output: Option<PathBuf>,

    /// File-name prefix for the slides.
    #[arg(short, long, env = "MDSTORY_PREFIX", default_value = "story")]
    prefix: String,

    /// Also package the slides into this ZIP file.
    #[arg(long, env = "MDSTORY_ARCHIVE")]
    archive: Option<PathBuf>,

    /// Print preview JSON with base64 data URLs to stdout.
    ///
    /// No image files are written unless --output is also given.
    #[arg(long)]
    json: bool,

    /// Stylesheet to use instead of the built-in story theme.
    #[arg(long, env = "MDSTORY_CSS")]
    css: Option<PathBuf>,

    /// Rasterisation DPI (36–600). 96 gives exactly 1080×1920 pixels.
    #[arg(long, env = "MDSTORY_DPI", default_value_t = 96,
          value_parser = clap::value_parser!(u32).range(36..=600))]
    dpi: u32,

    /// Image format.
    #[arg(long, env = "MDSTORY_FORMAT", value_enum, default_value = "png")]
    format: FormatArg,

    /// Path to the pandoc executable.
    #[arg(long)]
    pandoc: Option<PathBuf>,

    /// Path to the pdftoppm executable.
    #[arg(long)]
    pdftoppm: Option<PathBuf>,

    /// HTML-to-PDF engine pandoc should use.
    #[arg(long, env = "MDSTORY_PDF_ENGINE", default_value = "weasyprint")]
    pdf_engine: String,

    /// Per-stage timeout in seconds; the running tool is killed when exceeded.
    #[arg(long, env = "MDSTORY_TIMEOUT")]
    timeout: Option<u64>,

    /// Report which external tools were found, then exit.
    #[arg(long)]
    check: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MDSTORY_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MDSTORY_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "MDSTORY_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    Jpeg,
}

impl From<FormatArg> for RasterFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Png => RasterFormat::Png,
            FormatArg::Jpeg => RasterFormat::Jpeg,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers what INFO logs would say; keep them quiet under it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && io::stderr().is_terminal();
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

    // ── Toolchain check ──────────────────────────────────────────────────
    if cli.check {
        return report_toolchain();
    }

    let markdown = read_input(cli.input.as_deref()).await?;
    if markdown.trim().is_empty() {
        anyhow::bail!("No markdown content provided");
    }

    // ── Build renderer ───────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RenderProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let mut renderer = StoryRenderer::new(config).context("External toolchain is incomplete")?;
    if let Some(ref path) = cli.css {
        let style = StyleSheet::from_file(path).context("Failed to load stylesheet")?;
        renderer = renderer.with_stylesheet(style);
    }

    // ── Render ───────────────────────────────────────────────────────────
    let output = match renderer.render(&markdown).await {
        Ok(output) => output,
        Err(e) => {
            if let Some(diagnostics) = e.diagnostics() {
                eprintln!("{}", dim(diagnostics.trim_end()));
            }
            return Err(e).context("Render failed");
        }
    };

    // ── Outputs ──────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&output.preview())
            .context("Failed to serialise preview")?;
        println!("{json}");
    }

    if !cli.json || cli.output.is_some() {
        let dir = cli.output.clone().unwrap_or_else(|| PathBuf::from("."));
        let written = write_images(&output.images, &dir, &cli.prefix)
            .await
            .context("Failed to write slides")?;
        if !cli.quiet {
            for path in &written {
                eprintln!("  {}", path.display());
            }
        }
    }

    if let Some(ref archive_path) = cli.archive {
        let bytes = archive_bytes(&output.images).context("Failed to build archive")?;
        write_atomic(archive_path, &bytes).await?;
        if !cli.quiet {
            eprintln!("  {}", bold(&archive_path.display().to_string()));
        }
    }

    if !cli.quiet && !show_progress && !cli.json {
        eprintln!(
            "Rendered {} slides in {}ms",
            output.stats.page_count, output.stats.total_ms
        );
    }

    Ok(())
}

/// Map CLI args to `RenderConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RenderConfig> {
    let mut builder = RenderConfig::builder()
        .dpi(cli.dpi)
        .raster_format(cli.format.into())
        .pdf_engine(cli.pdf_engine.clone());

    if let Some(ref path) = cli.pandoc {
        builder = builder.pandoc_path(path);
    }
    if let Some(ref path) = cli.pdftoppm {
        builder = builder.pdftoppm_path(path);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.stage_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Read markdown from `path`, or stdin for `None` / `-`.
async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => tokio::fs::read_to_string(p)
            .await
            .with_context(|| format!("Failed to read {}", p.display())),
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read markdown from stdin")?;
            Ok(buf)
        }
    }
}

/// Write `bytes` to `path` via a temp file + rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("zip.tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Print where each external tool resolves to; fails if any is missing.
fn report_toolchain() -> Result<()> {
    let mut missing = 0;
    for (tool, result) in check_toolchain() {
        match result {
            Ok(path) => println!("{} {:<11} {}", green("✓"), tool, path.display()),
            Err(e) => {
                missing += 1;
                println!("{} {:<11} {}", red("✗"), tool, e);
            }
        }
    }
    if missing > 0 {
        anyhow::bail!("{missing} required tool(s) not found");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_has_short_flag() {
        let cli = Cli::try_parse_from(["mdstory", "-p", "deck", "talk.md"]).unwrap();
        assert_eq!(cli.prefix, "deck");
        assert_eq!(cli.input, Some(PathBuf::from("talk.md")));
    }

    #[test]
    fn prefix_defaults_to_story() {
        let cli = Cli::try_parse_from(["mdstory"]).unwrap();
        assert_eq!(cli.prefix, "story");
    }
}
