//! Configuration types for guide generation and README annotation.
//!
//! Guide and page batches are controlled through [`GuideConfig`], built via
//! [`GuideConfigBuilder`]; README annotation through [`AnnotateConfig`].
//! Every field has a default that matches the site layout (`mkdocs.yml` at
//! the root, pages under `docs/`, PDFs into `site/pdf`), so the CLI works
//! with no flags at all.

use crate::error::CertbookError;
use crate::pipeline::assemble::AssemblyOptions;
use crate::pipeline::nav::{Navigation, DEFAULT_CATEGORIES};
use crate::progress::ProgressCallback;
use crate::render::{PandocOptions, StyleSheet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Configuration for a guide (or per-page) batch.
///
/// # Example
/// ```rust
/// use certbook::GuideConfig;
///
/// let config = GuideConfig::builder()
///     .nav_path("mkdocs.yml")
///     .output_dir("site/pdf")
///     .jobs(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.jobs, 2);
/// ```
#[derive(Clone)]
pub struct GuideConfig {
    /// The mkdocs navigation file. Default: `mkdocs.yml`.
    pub nav_path: PathBuf,

    /// Directory page paths are relative to. Default: `None`, meaning the
    /// config's `docs_dir` (or `docs`) next to `nav_path`.
    pub content_root: Option<PathBuf>,

    /// Where PDFs are written. Created if missing. Default: `site/pdf`.
    pub output_dir: PathBuf,

    /// `nav` categories to extract, in the order given.
    pub categories: Vec<String>,

    /// Title-block settings of assembled guides.
    pub assembly: AssemblyOptions,

    /// Try pandoc before the native renderer. Default: true.
    pub use_pandoc: bool,

    pub pandoc: PandocOptions,

    pub style: StyleSheet,

    /// Running header of natively rendered pages. Default: `None`, meaning
    /// the config's `site_name`, then the style sheet's header.
    pub header_text: Option<String>,

    /// Certifications rendered concurrently. Default: 1.
    pub jobs: usize,

    /// Only process certifications whose name matches one of these
    /// (case-insensitive). Empty means all.
    pub only: Vec<String>,

    /// Receives per-guide progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            nav_path: PathBuf::from("mkdocs.yml"),
            content_root: None,
            output_dir: PathBuf::from("site/pdf"),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            assembly: AssemblyOptions::default(),
            use_pandoc: true,
            pandoc: PandocOptions::default(),
            style: StyleSheet::default(),
            header_text: None,
            jobs: 1,
            only: Vec::new(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GuideConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuideConfig")
            .field("nav_path", &self.nav_path)
            .field("content_root", &self.content_root)
            .field("output_dir", &self.output_dir)
            .field("categories", &self.categories)
            .field("assembly", &self.assembly)
            .field("use_pandoc", &self.use_pandoc)
            .field("pandoc", &self.pandoc)
            .field("header_text", &self.header_text)
            .field("jobs", &self.jobs)
            .field("only", &self.only)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn GuideProgressCallback>"),
            )
            .finish()
    }
}

impl GuideConfig {
    pub fn builder() -> GuideConfigBuilder {
        GuideConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory page paths are resolved against.
    pub fn resolve_content_root(&self, nav: &Navigation) -> PathBuf {
        if let Some(root) = &self.content_root {
            return root.clone();
        }
        let base = self.nav_path.parent().unwrap_or_else(|| Path::new(""));
        base.join(nav.docs_dir.as_deref().unwrap_or("docs"))
    }

    /// Style sheet with the running header resolved.
    pub fn resolve_style(&self, nav: &Navigation) -> StyleSheet {
        let mut style = self.style.clone();
        if let Some(header) = self.header_text.as_ref().or(nav.site_name.as_ref()) {
            style.header_text = header.clone();
        }
        style
    }

    /// Whether `name` passes the `only` filter.
    pub fn selects(&self, name: &str) -> bool {
        self.only.is_empty() || self.only.iter().any(|o| o.eq_ignore_ascii_case(name))
    }
}

/// Builder for [`GuideConfig`].
#[derive(Debug)]
pub struct GuideConfigBuilder {
    config: GuideConfig,
}

impl GuideConfigBuilder {
    pub fn nav_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.nav_path = path.into();
        self
    }

    pub fn content_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.content_root = Some(path.into());
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_dir = path.into();
        self
    }

    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.assembly.version = version.into();
        self
    }

    pub fn generated_at(mut self, at: chrono::NaiveDateTime) -> Self {
        self.config.assembly.generated_at = Some(at);
        self
    }

    pub fn use_pandoc(mut self, v: bool) -> Self {
        self.config.use_pandoc = v;
        self
    }

    pub fn pandoc(mut self, options: PandocOptions) -> Self {
        self.config.pandoc = options;
        self
    }

    pub fn pandoc_program(mut self, program: impl Into<String>) -> Self {
        self.config.pandoc.program = program.into();
        self
    }

    /// `None` lets pandoc choose its default PDF engine.
    pub fn pdf_engine(mut self, engine: Option<String>) -> Self {
        self.config.pandoc.pdf_engine = engine;
        self
    }

    pub fn pandoc_timeout_secs(mut self, secs: u64) -> Self {
        self.config.pandoc.timeout_secs = secs;
        self
    }

    pub fn style(mut self, style: StyleSheet) -> Self {
        self.config.style = style;
        self
    }

    pub fn font_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.style.fonts.dir = Some(dir.into());
        self
    }

    pub fn header_text(mut self, text: impl Into<String>) -> Self {
        self.config.header_text = Some(text.into());
        self
    }

    pub fn jobs(mut self, n: usize) -> Self {
        self.config.jobs = n.max(1);
        self
    }

    pub fn only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.only = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GuideConfig, CertbookError> {
        let c = &self.config;
        if c.jobs == 0 {
            return Err(CertbookError::InvalidConfig("jobs must be ≥ 1".into()));
        }
        if c.categories.is_empty() {
            return Err(CertbookError::InvalidConfig(
                "at least one nav category is required".into(),
            ));
        }
        if c.use_pandoc && c.pandoc.timeout_secs == 0 {
            return Err(CertbookError::InvalidConfig(
                "pandoc timeout must be ≥ 1 second".into(),
            ));
        }
        if c.pandoc.toc_depth == 0 || c.pandoc.toc_depth > 6 {
            return Err(CertbookError::InvalidConfig(format!(
                "toc depth must be 1–6, got {}",
                c.pandoc.toc_depth
            )));
        }
        let s = &c.style;
        if s.margin_mm * 2.0 >= s.paper_width_mm.min(s.paper_height_mm) {
            return Err(CertbookError::InvalidConfig(format!(
                "margin {} mm leaves no room on a {}×{} mm page",
                s.margin_mm, s.paper_width_mm, s.paper_height_mm
            )));
        }
        Ok(self.config)
    }
}

// ── README annotation ────────────────────────────────────────────────────

/// A certification whose README receives the download block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationRef {
    /// Directory name and PDF stem, e.g. `kcna`.
    pub code: String,
    pub name: String,
}

impl CertificationRef {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// The Kubestronaut and Golden Kubestronaut certifications.
pub const DEFAULT_CERTIFICATIONS: &[(&str, &str)] = &[
    ("kcna", "Kubernetes and Cloud Native Associate"),
    ("kcsa", "Kubernetes and Cloud Native Security Associate"),
    ("cka", "Certified Kubernetes Administrator"),
    ("ckad", "Certified Kubernetes Application Developer"),
    ("cks", "Certified Kubernetes Security Specialist"),
    ("pca", "Prometheus Certified Associate"),
    ("cnpe", "Certified Node.js Platform Engineer"),
    ("lfcs", "Linux Foundation Certified System Administrator"),
    ("ica", "Istio Certified Associate"),
    ("cca", "Cilium Certified Associate"),
    ("capa", "Argo CD Certified Professional - Application Delivery"),
    ("cgoa", "Certified GitOps Professional"),
    ("cba", "Cilium Certified Associate - (Beta)"),
    ("otca", "OpenTelemetry Certified Associate"),
    ("kca", "Kyverno Certified Associate"),
    ("cnpa", "Cloud Native Professional Associate"),
];

/// Configuration for README annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateConfig {
    /// Directory holding one `<code>/README.md` per certification. Default: `docs`.
    pub root: PathBuf,
    pub certifications: Vec<CertificationRef>,
    /// URL prefix of the published PDFs. Default: `/pdf`.
    pub download_base: String,
    /// Report what would change without writing. Default: false.
    pub dry_run: bool,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("docs"),
            certifications: DEFAULT_CERTIFICATIONS
                .iter()
                .map(|(code, name)| CertificationRef::new(*code, *name))
                .collect(),
            download_base: "/pdf".to_string(),
            dry_run: false,
        }
    }
}

impl AnnotateConfig {
    /// Path of one certification's README.
    pub fn readme_path(&self, code: &str) -> PathBuf {
        self.root.join(code).join("README.md")
    }

    /// Keep only the certifications whose code is listed (case-insensitive).
    pub fn restrict_to(&mut self, codes: &[String]) {
        if codes.is_empty() {
            return;
        }
        self.certifications
            .retain(|c| codes.iter().any(|code| code.eq_ignore_ascii_case(&c.code)));
    }

    pub fn validate(&self) -> Result<(), CertbookError> {
        if self.certifications.is_empty() {
            return Err(CertbookError::InvalidConfig(
                "no certifications selected for annotation".into(),
            ));
        }
        Ok(())
    }
}
