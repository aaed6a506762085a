//! CLI binary for certbook.
//!
//! A thin shim over the library crate that maps CLI flags to `GuideConfig` /
//! `AnnotateConfig` and prints results.

use anyhow::{Context, Result};
use certbook::{
    annotate_readmes, generate_guides, generate_page_pdfs, AnnotateConfig, AnnotateReport,
    BatchReport, GuideConfig, GuideProgressCallback, ProgressCallback, ReadmeStatus,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per guide. Works
/// when guides finish out of order (`--jobs > 1`).
struct CliProgressCallback {
    bar: ProgressBar,
    /// What the bar counts ("guides" or "pages").
    unit: &'static str,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(unit: &'static str) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading navigation…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            unit,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {}  ⏱ {{elapsed_precise}}",
            self.unit
        );
        let progress_style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl GuideProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total} {}…", self.unit))
        ));
    }

    fn on_guide_start(&self, index: usize, _total: usize, name: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_guide_complete(&self, index: usize, total: usize, name: &str, engine: &str) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<40}  {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("{engine:<8}")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_guide_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<40}  {}  {}",
            red("✗"),
            index,
            total,
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, _success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();
        if failed > 0 {
            eprintln!(
                "{} {} of {} {} failed",
                if failed == total { red("✘") } else { cyan("⚠") },
                red(&failed.to_string()),
                total,
                self.unit,
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One combined study guide per certification (site/pdf/<Cert>_Study_Guide.pdf)
  certbook guides

  # Only two certifications, four at a time, without pandoc
  certbook guides --only KCNA,CKA --jobs 4 --no-pandoc

  # One PDF per navigation page
  certbook pages -o site/pdf/pages

  # Add the download block to every certification README
  certbook annotate --root docs

  # Machine-readable report
  certbook guides --json > report.json

RENDERING:
  pandoc is tried first (with --pdf-engine, default weasyprint). When it is
  missing, times out or fails, the built-in renderer takes over. It needs a
  TrueType family (default LiberationSans / LiberationMono); point --font-dir
  at a directory containing LiberationSans-Regular.ttf etc. if the system
  fonts are elsewhere.

ENVIRONMENT VARIABLES:
  Every flag has a CERTBOOK_* counterpart, e.g. CERTBOOK_NAV, CERTBOOK_OUTPUT_DIR,
  CERTBOOK_JOBS, CERTBOOK_NO_PANDOC, CERTBOOK_FONT_DIR.
  RUST_LOG                Override the log filter (e.g. certbook=debug)
"#;

/// Build printable study guides from an mkdocs site.
#[derive(Parser, Debug)]
#[command(
    name = "certbook",
    version,
    about = "Assemble certification study guides from mkdocs navigation and render them to PDF",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print the report as JSON on stdout.
    #[arg(long, global = true, env = "CERTBOOK_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "CERTBOOK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "CERTBOOK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "CERTBOOK_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One combined study guide per certification.
    Guides(RenderArgs),
    /// One PDF per navigation page.
    Pages(RenderArgs),
    /// Insert the "download PDF" block into certification READMEs.
    Annotate(AnnotateArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// mkdocs navigation file.
    #[arg(long, env = "CERTBOOK_NAV", default_value = "mkdocs.yml")]
    nav: PathBuf,

    /// Directory page paths are relative to. Default: docs_dir next to --nav.
    #[arg(long, env = "CERTBOOK_DOCS_DIR")]
    docs_dir: Option<PathBuf>,

    /// Directory the PDFs are written to.
    #[arg(short, long, env = "CERTBOOK_OUTPUT_DIR", default_value = "site/pdf")]
    output_dir: PathBuf,

    /// nav category to include (repeatable). Default: the Kubestronaut categories.
    #[arg(long = "category", env = "CERTBOOK_CATEGORIES", value_delimiter = ';')]
    categories: Vec<String>,

    /// Only these certifications (comma-separated, case-insensitive).
    #[arg(long, env = "CERTBOOK_ONLY", value_delimiter = ',')]
    only: Vec<String>,

    /// Skip pandoc and use the built-in renderer only.
    #[arg(long, env = "CERTBOOK_NO_PANDOC")]
    no_pandoc: bool,

    /// pandoc executable.
    #[arg(long, env = "CERTBOOK_PANDOC", default_value = "pandoc")]
    pandoc: String,

    /// pandoc --pdf-engine; "default" lets pandoc choose.
    #[arg(long, env = "CERTBOOK_PDF_ENGINE", default_value = "weasyprint")]
    pdf_engine: String,

    /// Seconds before a pandoc run is killed.
    #[arg(long, env = "CERTBOOK_PANDOC_TIMEOUT", default_value_t = 300)]
    pandoc_timeout: u64,

    /// Directory holding the built-in renderer's TrueType fonts.
    #[arg(long, env = "CERTBOOK_FONT_DIR")]
    font_dir: Option<PathBuf>,

    /// Running header of the built-in renderer. Default: mkdocs site_name.
    #[arg(long, env = "CERTBOOK_HEADER")]
    header: Option<String>,

    /// Value of the guide's "Version" line.
    #[arg(long, env = "CERTBOOK_DOC_VERSION", default_value = "1.0")]
    doc_version: String,

    /// Number of guides rendered concurrently.
    #[arg(short, long, env = "CERTBOOK_JOBS", default_value_t = 1)]
    jobs: usize,
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    /// Directory holding <code>/README.md for each certification.
    #[arg(long, env = "CERTBOOK_ANNOTATE_ROOT", default_value = "docs")]
    root: PathBuf,

    /// URL prefix the PDFs are published under.
    #[arg(long, env = "CERTBOOK_DOWNLOAD_BASE", default_value = "/pdf")]
    download_base: String,

    /// Only these certification codes (comma-separated).
    #[arg(long, env = "CERTBOOK_ONLY", value_delimiter = ',')]
    only: Vec<String>,

    /// Report what would change without writing.
    #[arg(long, env = "CERTBOOK_DRY_RUN")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level logs; annotation has no bar.
    let renders = matches!(cli.command, Command::Guides(_) | Command::Pages(_));
    let show_progress = renders && !cli.quiet && !cli.no_progress && !cli.json;
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

    match &cli.command {
        Command::Guides(args) => {
            let progress = show_progress.then(|| CliProgressCallback::new("guides") as ProgressCallback);
            let config = build_guide_config(args, progress)?;
            let report = generate_guides(&config)
                .await
                .context("Study guide generation failed")?;
            print_batch(&cli, &report, "guides", &config)?;
        }
        Command::Pages(args) => {
            let progress = show_progress.then(|| CliProgressCallback::new("pages") as ProgressCallback);
            let config = build_guide_config(args, progress)?;
            let report = generate_page_pdfs(&config)
                .await
                .context("Page PDF generation failed")?;
            print_batch(&cli, &report, "pages", &config)?;
        }
        Command::Annotate(args) => {
            let config = build_annotate_config(args)?;
            let report = annotate_readmes(&config);
            print_annotate(&cli, &report)?;
        }
    }

    Ok(())
}

/// Map CLI args to `GuideConfig`.
fn build_guide_config(args: &RenderArgs, progress: Option<ProgressCallback>) -> Result<GuideConfig> {
    let pdf_engine = match args.pdf_engine.trim() {
        "" | "default" => None,
        engine => Some(engine.to_string()),
    };

    let mut builder = GuideConfig::builder()
        .nav_path(&args.nav)
        .output_dir(&args.output_dir)
        .only(args.only.iter().map(|s| s.trim().to_string()))
        .use_pandoc(!args.no_pandoc)
        .pandoc_program(&args.pandoc)
        .pdf_engine(pdf_engine)
        .pandoc_timeout_secs(args.pandoc_timeout)
        .version(&args.doc_version)
        .jobs(args.jobs);

    if !args.categories.is_empty() {
        builder = builder.categories(args.categories.iter().cloned());
    }
    if let Some(ref dir) = args.docs_dir {
        builder = builder.content_root(dir);
    }
    if let Some(ref dir) = args.font_dir {
        builder = builder.font_dir(dir);
    }
    if let Some(ref header) = args.header {
        builder = builder.header_text(header);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Map CLI args to `AnnotateConfig`.
fn build_annotate_config(args: &AnnotateArgs) -> Result<AnnotateConfig> {
    let mut config = AnnotateConfig {
        root: args.root.clone(),
        download_base: args.download_base.clone(),
        dry_run: args.dry_run,
        ..AnnotateConfig::default()
    };
    let only: Vec<String> = args.only.iter().map(|s| s.trim().to_string()).collect();
    config.restrict_to(&only);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_batch(cli: &Cli, report: &BatchReport, unit: &str, config: &GuideConfig) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
        println!("{json}");
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    for outcome in report.failed() {
        eprintln!("  {} {}", red("✗"), bold(&outcome.certification));
        for failure in &outcome.result.failures {
            eprintln!("      {}", dim(failure));
        }
    }
    eprintln!(
        "{}  {} {} generated  {}ms  →  {}",
        if report.succeeded == report.attempted {
            green("✔")
        } else {
            cyan("⚠")
        },
        report.summary(),
        unit,
        report.total_duration_ms,
        bold(&config.output_dir.display().to_string()),
    );
    Ok(())
}

fn print_annotate(cli: &Cli, report: &AnnotateReport) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialise report")?;
        println!("{json}");
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    for outcome in &report.outcomes {
        let line = match &outcome.status {
            ReadmeStatus::Inserted { heuristic } => {
                let verb = if report.dry_run { "would insert" } else { "inserted" };
                format!("{} {}  {}", green("✓"), outcome.code.to_uppercase(), dim(&format!("{verb} after {heuristic} line")))
            }
            ReadmeStatus::AlreadyPresent => {
                format!("{} {}  {}", green("✓"), outcome.code.to_uppercase(), dim("already present"))
            }
            ReadmeStatus::Missing => {
                format!("{} {}  {}", cyan("⚠"), outcome.code.to_uppercase(), dim(&format!("{} not found", outcome.path.display())))
            }
            ReadmeStatus::NoInsertionPoint => {
                format!("{} {}  {}", red("✗"), outcome.code.to_uppercase(), red("no insertion point"))
            }
            ReadmeStatus::Failed { error } => {
                format!("{} {}  {}", red("✗"), outcome.code.to_uppercase(), red(error))
            }
        };
        eprintln!("  {line}");
    }
    eprintln!("{}  {} READMEs carry the download block", cyan("◆"), report.summary());
    Ok(())
}
