//! PDF rendering with an ordered chain of interchangeable strategies.
//!
//! ## Why a chain?
//!
//! The external converter gives the best output but is frequently missing on
//! contributor machines and CI images. The in-process renderer always works
//! once fonts are present. [`PdfRenderer`] tries each [`RenderStrategy`] in
//! order and the first one that leaves a non-empty file behind wins.
//!
//! ## Guarantees of [`PdfRenderer::render`]
//!
//! * Stale output at the target path is deleted before the first attempt.
//! * A strategy only counts as successful if the output file exists and is
//!   non-empty afterwards.
//! * Partial output from a failed strategy is deleted before the next one.
//! * Total failure is reported in the [`RenderResult`], never as a panic or
//!   `Err`, so the batch can move on to the next certification.

pub mod markup;
pub mod native;
pub mod outline;
pub mod pandoc;
pub mod style;

use crate::config::GuideConfig;
use crate::error::RenderError;
use crate::output::{Engine, RenderResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub use native::NativeStrategy;
pub use pandoc::{PandocOptions, PandocStrategy};
pub use style::{FontSpec, StyleSheet};

/// Everything a strategy needs to produce one PDF.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Document title (PDF metadata, log lines).
    pub title: String,
    /// The assembled markdown.
    pub markdown: String,
    /// The same markdown, written to the workspace, for external converters.
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    /// Directory relative image links are resolved against.
    pub resource_dir: Option<PathBuf>,
}

/// One way of turning a [`RenderJob`] into a PDF file.
#[async_trait]
pub trait RenderStrategy: Send + Sync {
    /// Short name used in logs and failure lines.
    fn name(&self) -> &str;

    /// Which [`Engine`] a success is reported as.
    fn engine(&self) -> Engine;

    /// Write `job.output_path`. Must not leave a file behind on error.
    async fn attempt(&self, job: &RenderJob) -> Result<(), RenderError>;
}

/// Tries strategies in order until one produces a PDF.
pub struct PdfRenderer {
    strategies: Vec<Box<dyn RenderStrategy>>,
}

impl PdfRenderer {
    pub fn new(strategies: Vec<Box<dyn RenderStrategy>>) -> Self {
        Self { strategies }
    }

    /// Pandoc (unless disabled) followed by the native renderer.
    pub fn from_config(config: &GuideConfig) -> Self {
        Self::with_style(config, config.style.clone())
    }

    /// Like [`Self::from_config`] with an explicit native style sheet.
    pub fn with_style(config: &GuideConfig, style: StyleSheet) -> Self {
        let mut strategies: Vec<Box<dyn RenderStrategy>> = Vec::with_capacity(2);
        if config.use_pandoc {
            strategies.push(Box::new(PandocStrategy::new(config.pandoc.clone())));
        }
        strategies.push(Box::new(NativeStrategy::new(style)));
        Self::new(strategies)
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Render one job. Never fails; see the module docs.
    pub async fn render(&self, job: &RenderJob) -> RenderResult {
        remove_if_exists(&job.output_path).await;

        let mut failures = Vec::new();
        for strategy in &self.strategies {
            debug!("{}: trying {}", job.title, strategy.name());

            let outcome = match strategy.attempt(job).await {
                Ok(()) => verify_output(strategy.name(), &job.output_path).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {
                    info!(
                        "{}: rendered with {} → {}",
                        job.title,
                        strategy.name(),
                        job.output_path.display()
                    );
                    return RenderResult::succeeded(
                        job.output_path.clone(),
                        strategy.engine(),
                        failures,
                    );
                }
                Err(e) => {
                    warn!("{}: {} failed: {}", job.title, strategy.name(), e);
                    failures.push(format!("[{}] {}", strategy.name(), e));
                    remove_if_exists(&job.output_path).await;
                }
            }
        }

        RenderResult::failed(job.output_path.clone(), failures)
    }
}

async fn verify_output(engine: &str, path: &Path) -> Result<(), RenderError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(RenderError::NoOutput {
            engine: engine.to_string(),
            path: path.to_path_buf(),
        }),
    }
}

async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("removed stale {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove {}: {}", path.display(), e),
    }
}
