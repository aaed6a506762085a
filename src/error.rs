//! Error types for the certbook library.
//!
//! Failures are isolated to the smallest unit that can fail, and each unit
//! has its own error type:
//!
//! * [`CertbookError`] — **Fatal**: nothing useful can happen without the
//!   navigation config or an output directory. Returned as `Err` from the
//!   top-level batch functions.
//!
//! * [`PageError`] — **Non-fatal**: one page of one certification could not be
//!   read. The assembler substitutes a placeholder and records the error in
//!   [`crate::pipeline::assemble::AssembledDocument::page_errors`].
//!
//! * [`RenderError`] — **Non-fatal**: one rendering strategy failed for one
//!   document. The renderer moves on to the next strategy; if every strategy
//!   fails the certification is reported as failed and the batch continues.
//!
//! * [`AnnotateError`] — **Non-fatal**: one README could not be annotated and
//!   is left untouched.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the certbook library.
#[derive(Debug, Error)]
pub enum CertbookError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The navigation config file does not exist.
    #[error("Navigation config not found: '{path}'\nRun from the site root or pass --nav <mkdocs.yml>.")]
    ConfigNotFound { path: PathBuf },

    /// The navigation config exists but is not usable.
    #[error("Failed to parse navigation config '{path}': {detail}")]
    ConfigParseError { path: PathBuf, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the directory that receives the PDFs.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create the scoped workspace for intermediate files.
    #[error("Failed to prepare temporary workspace: {0}")]
    WorkspaceFailed(#[source] std::io::Error),
}

/// A non-fatal error for a single page of a certification.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page file is missing or unreadable.
    #[error("Could not load '{path}' for '{title}': {detail}")]
    ContentRead {
        title: String,
        path: String,
        detail: String,
    },
}

/// A failure of one rendering strategy for one document.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The external converter could not be started.
    #[error("{engine}: '{program}' is not installed or not on PATH")]
    EngineNotInstalled { engine: String, program: String },

    /// The external converter exceeded its time budget and was killed.
    #[error("{engine}: conversion timed out after {secs}s")]
    Timeout { engine: String, secs: u64 },

    /// The external converter exited unsuccessfully.
    #[error("{engine}: exited with status {}: {stderr}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()))]
    NonZeroExit {
        engine: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The strategy reported success but left no usable file behind.
    #[error("{engine}: no PDF was written to '{path}'")]
    NoOutput { engine: String, path: PathBuf },

    /// No font directory holds any of the configured TrueType families.
    #[error("No usable font family among '{family}' (searched: {searched})\nPass --font-dir to point at a directory with e.g. DejaVuSans.ttf, -Bold, -Oblique and -BoldOblique.")]
    FontsUnavailable { family: String, searched: String },

    /// The layout engine rejected the document.
    #[error("Layout failed: {0}")]
    Layout(String),

    /// Reading the input or writing the PDF failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error (e.g. a panicked blocking task).
    #[error("Internal render error: {0}")]
    Internal(String),
}

/// A failure to annotate one README.
#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("README not found: '{path}'")]
    ReadmeNotFound { path: PathBuf },

    /// None of the insertion heuristics matched; the file is left unchanged.
    #[error("No insertion point found in '{path}'")]
    InsertionPointNotFound { path: PathBuf },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
