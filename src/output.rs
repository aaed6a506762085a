//! Result types returned by the renderer and the batch drivers.
//!
//! Everything here derives `Serialize` so the CLI can print a batch report
//! with `--json` without a second set of DTOs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which rendering strategy produced a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// The external converter (pandoc).
    Primary,
    /// The in-process renderer.
    Fallback,
    /// Nothing succeeded.
    None,
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Engine::Primary => "primary",
            Engine::Fallback => "fallback",
            Engine::None => "none",
        };
        f.write_str(s)
    }
}

/// Outcome of rendering one document.
///
/// `success` is true exactly when `engine_used` is not [`Engine::None`]; in
/// that case a non-empty file exists at `output_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResult {
    pub success: bool,
    pub output_path: PathBuf,
    pub engine_used: Engine,
    /// One line per strategy that failed before the winner (or all of them).
    pub failures: Vec<String>,
}

impl RenderResult {
    pub fn succeeded(output_path: PathBuf, engine: Engine, failures: Vec<String>) -> Self {
        Self {
            success: true,
            output_path,
            engine_used: engine,
            failures,
        }
    }

    pub fn failed(output_path: PathBuf, failures: Vec<String>) -> Self {
        Self {
            success: false,
            output_path,
            engine_used: Engine::None,
            failures,
        }
    }
}

/// Outcome for one unit of a batch: a certification guide or a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideOutcome {
    pub certification: String,
    /// Sections in the assembled document.
    pub page_count: usize,
    /// Sections replaced by the "could not load" placeholder.
    pub placeholder_count: usize,
    pub result: RenderResult,
    pub duration_ms: u64,
}

/// Summary of a whole batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<GuideOutcome>,
    pub attempted: usize,
    pub succeeded: usize,
    pub total_duration_ms: u64,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: Vec<GuideOutcome>, total_duration_ms: u64) -> Self {
        let attempted = outcomes.len();
        let succeeded = outcomes.iter().filter(|o| o.result.success).count();
        Self {
            outcomes,
            attempted,
            succeeded,
            total_duration_ms,
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &GuideOutcome> {
        self.outcomes.iter().filter(|o| !o.result.success)
    }

    /// The `N/M` summary line.
    pub fn summary(&self) -> String {
        format!("{}/{}", self.succeeded, self.attempted)
    }
}
