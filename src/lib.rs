//! # certbook
//!
//! Assemble certification study guides from an mkdocs site and render them
//! to PDF.
//!
//! ## Why this crate?
//!
//! A documentation site is organised for browsing: one certification is
//! spread over a dozen pages reachable only through the navigation tree.
//! Readers who want to study offline need one printable document per
//! certification, with a table of contents that actually links to its
//! sections. This crate walks the site's `nav`, stitches each
//! certification's pages into one markdown guide, and renders it through an
//! external converter when available or an in-process renderer otherwise.
//!
//! ## Pipeline Overview
//!
//! ```text
//! mkdocs.yml
//!  │
//!  ├─ 1. Nav       load requested categories, flatten to certifications
//!  ├─ 2. Assemble  title block, numbered TOC, one section per page
//!  ├─ 3. Render    pandoc → native (genpdf + lopdf outline), first success wins
//!  └─ 4. Report    per-certification outcome, N/M summary
//! ```
//!
//! Separately, [`annotate`] inserts a "download PDF" block into each
//! certification README so the site links to the generated files.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use certbook::{generate_guides, GuideConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GuideConfig::builder()
//!         .nav_path("mkdocs.yml")
//!         .output_dir("site/pdf")
//!         .build()?;
//!     let report = generate_guides(&config).await?;
//!     eprintln!("{} guides generated", report.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `certbook` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! certbook = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod annotate;
pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use annotate::{annotate, annotate_readmes, AnnotateReport, Annotation, ReadmeStatus};
pub use batch::{generate_guides, generate_page_pdfs};
pub use config::{AnnotateConfig, CertificationRef, GuideConfig, GuideConfigBuilder};
pub use error::{AnnotateError, CertbookError, PageError, RenderError};
pub use output::{BatchReport, Engine, GuideOutcome, RenderResult};
pub use pipeline::assemble::{assemble, AssembledDocument, AssemblyOptions, FsPageSource, PageSource};
pub use pipeline::nav::{load_navigation, CertificationSection, Navigation, NavigationEntry, StandalonePage};
pub use progress::{GuideProgressCallback, NoopProgressCallback, ProgressCallback};
pub use render::{PdfRenderer, RenderJob, RenderStrategy, StyleSheet};
