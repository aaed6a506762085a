//! README annotation: insert a "download PDF" block into certification
//! landing pages.
//!
//! ## Insertion point
//!
//! The block goes directly after the first line matched by an ordered chain
//! of [`InsertionHeuristic`]s:
//!
//! 1. [`DescriptionParagraph`] — `The **XYZ** exam certifies ...`
//! 2. [`BadgeLine`] — the Linux Foundation training badge/link
//! 3. [`TitleLine`] — the page's `# ` title
//!
//! If none matches the text is left alone.
//!
//! ## Idempotence
//!
//! The block's heading ([`MARKER`]) is searched for before anything else; a
//! README that already contains it is never touched again, so the annotator
//! can run on every build.

use crate::config::AnnotateConfig;
use crate::error::AnnotateError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Text whose presence means the block was already inserted.
pub const MARKER: &str = "📥 Download Study Guide";

/// Locates the line after which the block is inserted.
pub trait InsertionHeuristic: Send + Sync {
    fn name(&self) -> &'static str;

    /// Index of the anchor line, if this heuristic applies.
    fn locate(&self, lines: &[&str]) -> Option<usize>;
}

/// The exam description paragraph.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptionParagraph;

impl InsertionHeuristic for DescriptionParagraph {
    fn name(&self) -> &'static str {
        "description"
    }

    fn locate(&self, lines: &[&str]) -> Option<usize> {
        lines
            .iter()
            .position(|l| l.trim().starts_with("The **") && l.contains("exam certifies"))
    }
}

/// The line linking the official training page.
#[derive(Debug, Clone, Copy, Default)]
pub struct BadgeLine;

impl InsertionHeuristic for BadgeLine {
    fn name(&self) -> &'static str {
        "badge"
    }

    fn locate(&self, lines: &[&str]) -> Option<usize> {
        lines
            .iter()
            .position(|l| l.contains("training.linuxfoundation.org"))
    }
}

/// The first top-level heading.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleLine;

impl InsertionHeuristic for TitleLine {
    fn name(&self) -> &'static str {
        "title"
    }

    fn locate(&self, lines: &[&str]) -> Option<usize> {
        lines.iter().position(|l| l.starts_with("# "))
    }
}

/// The default chain, most specific first.
pub fn default_heuristics() -> Vec<Box<dyn InsertionHeuristic>> {
    vec![
        Box::new(DescriptionParagraph),
        Box::new(BadgeLine),
        Box::new(TitleLine),
    ]
}

/// The block inserted for certification `code`, without trailing newline.
///
/// The first line is empty so the block is separated from the anchor line.
pub fn download_block(code: &str, download_base: &str) -> String {
    let code = code.to_uppercase();
    let base = download_base.trim_end_matches('/');
    let url = format!("{base}/{code}_Study_Guide.pdf");
    format!(
        "\n## {MARKER}\n\
         \n\
         [![PDF Download](https://img.shields.io/badge/PDF-Download-red?style=for-the-badge&logo=adobeacrobatreader&logoColor=white)]({url})\n\
         \n\
         **Get the complete {code} Study Guide as a printable PDF:**\n\
         - 📚 All chapters combined into one document\n\
         - 📑 Printer-friendly formatting with table of contents\n\
         - 🔖 Page numbers and navigation\n\
         - 📱 Optimized for offline study\n\
         \n\
         [Download {code} Study Guide PDF]({url})"
    )
}

/// Result of annotating one README's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    Inserted {
        text: String,
        heuristic: &'static str,
    },
    AlreadyPresent,
    NoInsertionPoint,
}

impl Annotation {
    /// The text to keep: the annotated text, or `original` when unchanged.
    pub fn into_text(self, original: &str) -> String {
        match self {
            Annotation::Inserted { text, .. } => text,
            _ => original.to_string(),
        }
    }
}

/// Insert the download block for `code` into `text` with the default chain.
pub fn annotate(text: &str, code: &str, download_base: &str) -> Annotation {
    annotate_with(text, code, download_base, &default_heuristics())
}

/// Insert the download block using an explicit heuristic chain.
pub fn annotate_with(
    text: &str,
    code: &str,
    download_base: &str,
    heuristics: &[Box<dyn InsertionHeuristic>],
) -> Annotation {
    if text.contains(MARKER) {
        return Annotation::AlreadyPresent;
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let Some((index, heuristic)) = heuristics
        .iter()
        .find_map(|h| h.locate(&lines).map(|i| (i, h.name())))
    else {
        return Annotation::NoInsertionPoint;
    };

    let block = download_block(code, download_base);
    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 1);
    out.extend_from_slice(&lines[..=index]);
    out.push(&block);
    out.extend_from_slice(&lines[index + 1..]);

    Annotation::Inserted {
        text: out.join("\n"),
        heuristic,
    }
}

// ── Batch over README files ─────────────────────────────────────────────

/// What happened to one README.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReadmeStatus {
    /// The block was inserted (or would be, on a dry run).
    Inserted { heuristic: String },
    AlreadyPresent,
    Missing,
    NoInsertionPoint,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadmeOutcome {
    pub code: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: ReadmeStatus,
}

/// Outcome of an annotation batch, in certification order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotateReport {
    pub outcomes: Vec<ReadmeOutcome>,
    pub dry_run: bool,
}

impl AnnotateReport {
    pub fn inserted(&self) -> usize {
        self.count(|s| matches!(s, ReadmeStatus::Inserted { .. }))
    }

    pub fn already_present(&self) -> usize {
        self.count(|s| matches!(s, ReadmeStatus::AlreadyPresent))
    }

    /// READMEs that now carry the block, as `N/M` of those processed.
    pub fn summary(&self) -> String {
        format!(
            "{}/{}",
            self.inserted() + self.already_present(),
            self.outcomes.len()
        )
    }

    fn count(&self, f: impl Fn(&ReadmeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| f(&o.status)).count()
    }
}

/// Annotate every configured certification's README.
///
/// Per-README problems are recorded in the report; nothing here is fatal.
pub fn annotate_readmes(config: &AnnotateConfig) -> AnnotateReport {
    let heuristics = default_heuristics();
    let outcomes = config
        .certifications
        .iter()
        .map(|cert| {
            let path = config.readme_path(&cert.code);
            let status = match annotate_file(config, &cert.code, &heuristics) {
                Ok(status) => status,
                Err(AnnotateError::ReadmeNotFound { path }) => {
                    warn!("{} not found, skipping", path.display());
                    ReadmeStatus::Missing
                }
                Err(e @ AnnotateError::InsertionPointNotFound { .. }) => {
                    warn!("{}", e);
                    ReadmeStatus::NoInsertionPoint
                }
                Err(e) => {
                    warn!("{}", e);
                    ReadmeStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            ReadmeOutcome {
                code: cert.code.clone(),
                path,
                status,
            }
        })
        .collect();

    AnnotateReport {
        outcomes,
        dry_run: config.dry_run,
    }
}

fn annotate_file(
    config: &AnnotateConfig,
    code: &str,
    heuristics: &[Box<dyn InsertionHeuristic>],
) -> Result<ReadmeStatus, AnnotateError> {
    let path = config.readme_path(code);
    let text = std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AnnotateError::ReadmeNotFound { path: path.clone() }
        } else {
            AnnotateError::Io {
                path: path.clone(),
                source: e,
            }
        }
    })?;

    match annotate_with(&text, code, &config.download_base, heuristics) {
        Annotation::AlreadyPresent => {
            debug!("{}: download block already present", path.display());
            Ok(ReadmeStatus::AlreadyPresent)
        }
        Annotation::NoInsertionPoint => Err(AnnotateError::InsertionPointNotFound { path }),
        Annotation::Inserted { text, heuristic } => {
            if config.dry_run {
                info!("{}: would insert after {} line", path.display(), heuristic);
            } else {
                std::fs::write(&path, text).map_err(|e| AnnotateError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                info!("{}: inserted download block after {} line", path.display(), heuristic);
            }
            Ok(ReadmeStatus::Inserted {
                heuristic: heuristic.to_string(),
            })
        }
    }
}
