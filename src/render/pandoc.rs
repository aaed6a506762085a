//! Primary strategy: convert with an external `pandoc` process.
//!
//! The command line mirrors what the site has always used for its printable
//! guides: a generated TOC three levels deep, numbered sections, 1.5 cm
//! margins, 11 pt article class and blue links.
//!
//! The child is spawned with `kill_on_drop(true)` and awaited under
//! `tokio::time::timeout`, so a hung converter is killed when the budget runs
//! out instead of stalling the batch.

use crate::error::RenderError;
use crate::output::Engine;
use crate::render::{RenderJob, RenderStrategy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const ENGINE_NAME: &str = "pandoc";

/// Keep at most this many bytes of the converter's stderr in errors.
const STDERR_TAIL: usize = 2000;

/// Command-line knobs of the pandoc invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PandocOptions {
    /// Executable to run. Default: "pandoc".
    pub program: String,
    /// `--pdf-engine=` value; `None` lets pandoc pick. Default: "weasyprint".
    pub pdf_engine: Option<String>,
    /// Default: 3.
    pub toc_depth: u8,
    /// Default: true.
    pub number_sections: bool,
    pub margin: String,
    pub font_size: String,
    pub document_class: String,
    /// Used for `linkcolor`, `urlcolor` and `toccolor`.
    pub link_color: String,
    /// Wall-clock budget per document. Default: 300.
    pub timeout_secs: u64,
    /// Appended verbatim after the built-in arguments.
    pub extra_args: Vec<String>,
}

impl Default for PandocOptions {
    fn default() -> Self {
        Self {
            program: "pandoc".to_string(),
            pdf_engine: Some("weasyprint".to_string()),
            toc_depth: 3,
            number_sections: true,
            margin: "1.5cm".to_string(),
            font_size: "11pt".to_string(),
            document_class: "article".to_string(),
            link_color: "blue".to_string(),
            timeout_secs: 300,
            extra_args: Vec::new(),
        }
    }
}

/// Build the argument vector for one conversion.
///
/// `resource_dir` lets pandoc resolve images referenced relative to the
/// original pages rather than the temporary input file.
pub fn pandoc_args(
    options: &PandocOptions,
    input: &Path,
    output: &Path,
    resource_dir: Option<&Path>,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        input.as_os_str().to_owned(),
        "-o".into(),
        output.as_os_str().to_owned(),
    ];
    if let Some(engine) = &options.pdf_engine {
        args.push(format!("--pdf-engine={engine}").into());
    }
    args.push("--toc".into());
    args.push(format!("--toc-depth={}", options.toc_depth).into());
    if options.number_sections {
        args.push("--number-sections".into());
    }
    if let Some(dir) = resource_dir {
        let mut flag = OsString::from("--resource-path=");
        flag.push(dir.as_os_str());
        args.push(flag);
    }

    let vars = [
        format!("geometry:margin={}", options.margin),
        format!("fontsize={}", options.font_size),
        format!("documentclass={}", options.document_class),
        "colorlinks=true".to_string(),
        format!("linkcolor={}", options.link_color),
        format!("urlcolor={}", options.link_color),
        format!("toccolor={}", options.link_color),
    ];
    for var in vars {
        args.push("-V".into());
        args.push(var.into());
    }

    args.extend(options.extra_args.iter().map(OsString::from));
    args
}

/// Runs `pandoc` on the job's intermediate markdown file.
#[derive(Debug, Clone)]
pub struct PandocStrategy {
    options: PandocOptions,
}

impl PandocStrategy {
    pub fn new(options: PandocOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PandocOptions {
        &self.options
    }
}

#[async_trait]
impl RenderStrategy for PandocStrategy {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn engine(&self) -> Engine {
        Engine::Primary
    }

    async fn attempt(&self, job: &RenderJob) -> Result<(), RenderError> {
        let args = pandoc_args(
            &self.options,
            &job.source_path,
            &job.output_path,
            job.resource_dir.as_deref(),
        );
        debug!("{} {:?}", self.options.program, args);

        let child = Command::new(&self.options.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RenderError::EngineNotInstalled {
                    engine: ENGINE_NAME.to_string(),
                    program: self.options.program.clone(),
                },
                _ => RenderError::Io {
                    path: job.source_path.clone(),
                    source: e,
                },
            })?;

        let budget = Duration::from_secs(self.options.timeout_secs);
        let output = match tokio::time::timeout(budget, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| RenderError::Io {
                path: job.source_path.clone(),
                source: e,
            })?,
            // Dropping the wait future drops the child, which kills it.
            Err(_) => {
                return Err(RenderError::Timeout {
                    engine: ENGINE_NAME.to_string(),
                    secs: self.options.timeout_secs,
                })
            }
        };

        if !output.status.success() {
            return Err(RenderError::NonZeroExit {
                engine: ENGINE_NAME.to_string(),
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("…{}", &text[start..])
}
