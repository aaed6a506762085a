//! Batch drivers: every certification (or every page) → one PDF each.
//!
//! ## Data Flow
//!
//! ```text
//! load nav ─▶ flatten ─▶ ┌ per unit ─────────────────────────────┐ ─▶ BatchReport
//!                        │ assemble ─▶ workspace .md ─▶ render   │
//!                        └───────────────────────────────────────┘
//! ```
//!
//! Only setup can fail the batch (missing config, unwritable output
//! directory, no workspace). Once units are running, every failure is
//! recorded in that unit's [`GuideOutcome`] and the batch moves on.
//!
//! Units run `jobs` at a time; results always come back in navigation order.

use crate::config::GuideConfig;
use crate::error::CertbookError;
use crate::output::{BatchReport, GuideOutcome, RenderResult};
use crate::pipeline::anchor::{file_stem, guide_file_name};
use crate::pipeline::assemble::{assemble, standalone_page, FsPageSource, PageSource};
use crate::pipeline::nav::{
    load_navigation, CertificationSection, Navigation, NavigationEntry, StandalonePage,
};
use crate::progress::ProgressCallback;
use crate::render::{PdfRenderer, RenderJob};
use crate::workspace::Workspace;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Generate one combined study guide per certification.
///
/// # Errors
/// Only fatal setup errors; see the module docs.
pub async fn generate_guides(config: &GuideConfig) -> Result<BatchReport, CertbookError> {
    let nav = load_navigation(&config.nav_path, &config.categories)?;
    let renderer = PdfRenderer::with_style(config, config.resolve_style(&nav));
    generate_guides_with(config, &nav, &renderer).await
}

/// [`generate_guides`] with an already loaded navigation and renderer.
pub async fn generate_guides_with(
    config: &GuideConfig,
    nav: &Navigation,
    renderer: &PdfRenderer,
) -> Result<BatchReport, CertbookError> {
    let start = Instant::now();
    let certifications: Vec<CertificationSection> = nav
        .certifications()
        .into_iter()
        .filter(|c| config.selects(&c.name))
        .collect();
    let stems = guide_output_stems(&certifications);
    info!(
        "Generating {} study guide(s) into {}",
        certifications.len(),
        config.output_dir.display()
    );

    let source = FsPageSource::new(config.resolve_content_root(nav));
    prepare_output_dir(&config.output_dir).await?;
    let workspace = Workspace::new()?;

    let total = certifications.len();
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_batch_start(total);
    }

    let ctx = UnitContext {
        config,
        renderer,
        workspace: &workspace,
        resource_dir: source.root().to_path_buf(),
        total,
    };
    let outcomes: Vec<GuideOutcome> = stream::iter(certifications.iter().zip(stems).enumerate())
        .map(|(i, (cert, stem))| guide_unit(&ctx, i + 1, cert, stem, &source))
        .buffered(config.jobs)
        .collect()
        .await;

    workspace.close();
    Ok(finish(outcomes, start, cb))
}

/// Generate one PDF per navigation page.
///
/// # Errors
/// Only fatal setup errors; see the module docs.
pub async fn generate_page_pdfs(config: &GuideConfig) -> Result<BatchReport, CertbookError> {
    let nav = load_navigation(&config.nav_path, &config.categories)?;
    let renderer = PdfRenderer::with_style(config, config.resolve_style(&nav));
    generate_page_pdfs_with(config, &nav, &renderer).await
}

/// [`generate_page_pdfs`] with an already loaded navigation and renderer.
pub async fn generate_page_pdfs_with(
    config: &GuideConfig,
    nav: &Navigation,
    renderer: &PdfRenderer,
) -> Result<BatchReport, CertbookError> {
    let start = Instant::now();
    let pages: Vec<NavigationEntry> = nav
        .pages()
        .into_iter()
        .filter(|p| config.selects(&p.certification))
        .map(|p: StandalonePage| p.page)
        .collect();
    let names = page_output_names(&pages);
    info!(
        "Generating {} page PDF(s) into {}",
        pages.len(),
        config.output_dir.display()
    );

    let source = FsPageSource::new(config.resolve_content_root(nav));
    prepare_output_dir(&config.output_dir).await?;
    let workspace = Workspace::new()?;

    let total = pages.len();
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_batch_start(total);
    }

    let ctx = UnitContext {
        config,
        renderer,
        workspace: &workspace,
        resource_dir: source.root().to_path_buf(),
        total,
    };
    let outcomes: Vec<GuideOutcome> = stream::iter(pages.iter().zip(names).enumerate())
        .map(|(i, (page, name))| page_unit(&ctx, i + 1, page, name, &source))
        .buffered(config.jobs)
        .collect()
        .await;

    workspace.close();
    Ok(finish(outcomes, start, cb))
}

// ── Units ────────────────────────────────────────────────────────────────

struct UnitContext<'a> {
    config: &'a GuideConfig,
    renderer: &'a PdfRenderer,
    workspace: &'a Workspace,
    resource_dir: PathBuf,
    total: usize,
}

impl UnitContext<'_> {
    fn callback(&self) -> Option<&ProgressCallback> {
        self.config.progress_callback.as_ref()
    }

    /// Write the intermediate markdown and run the strategy chain.
    async fn render(&self, title: &str, stem: &str, markdown: String, output_path: PathBuf) -> RenderResult {
        let source_path = match self.workspace.write_markdown(stem, &markdown) {
            Ok(path) => path,
            Err(e) => {
                warn!("{}: could not write intermediate markdown: {}", title, e);
                return RenderResult::failed(output_path, vec![format!("[workspace] {e}")]);
            }
        };
        let job = RenderJob {
            title: title.to_string(),
            markdown,
            source_path,
            output_path,
            resource_dir: Some(self.resource_dir.clone()),
        };
        self.renderer.render(&job).await
    }

    fn report(&self, index: usize, name: &str, result: &RenderResult) {
        let Some(cb) = self.callback() else {
            return;
        };
        if result.success {
            cb.on_guide_complete(index, self.total, name, &result.engine_used.to_string());
        } else {
            cb.on_guide_error(index, self.total, name, &result.failures.join("; "));
        }
    }
}

async fn guide_unit(
    ctx: &UnitContext<'_>,
    index: usize,
    cert: &CertificationSection,
    stem: String,
    source: &dyn PageSource,
) -> GuideOutcome {
    let start = Instant::now();
    if let Some(cb) = ctx.callback() {
        cb.on_guide_start(index, ctx.total, &cert.name);
    }
    info!("[{}/{}] {} ({} pages)", index, ctx.total, cert.name, cert.pages.len());

    let document = assemble(&cert.name, &cert.pages, source, &ctx.config.assembly);
    for error in &document.page_errors {
        warn!("{}: {}", cert.name, error);
    }

    let output_path = ctx.config.output_dir.join(guide_file_name(&stem));
    let result = ctx.render(&cert.name, &stem, document.body, output_path).await;
    ctx.report(index, &cert.name, &result);

    GuideOutcome {
        certification: cert.name.clone(),
        page_count: cert.pages.len(),
        placeholder_count: document.page_errors.len(),
        result,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

async fn page_unit(
    ctx: &UnitContext<'_>,
    index: usize,
    page: &NavigationEntry,
    name: String,
    source: &dyn PageSource,
) -> GuideOutcome {
    let start = Instant::now();
    if let Some(cb) = ctx.callback() {
        cb.on_guide_start(index, ctx.total, &page.title);
    }
    let output_path = ctx.config.output_dir.join(format!("{name}.pdf"));

    let (result, placeholder_count) = match source.read_page(&page.path) {
        Ok(raw) => {
            let markdown = standalone_page(&page.title, &raw);
            (ctx.render(&page.title, &name, markdown, output_path).await, 0)
        }
        Err(e) => {
            // A standalone PDF of a placeholder is useless; report instead.
            warn!("{}: could not read '{}': {}", page.title, page.path, e);
            let failure = format!("[read] {}: {}", page.path, e);
            (RenderResult::failed(output_path, vec![failure]), 1)
        }
    };
    ctx.report(index, &page.title, &result);

    GuideOutcome {
        certification: page.title.clone(),
        page_count: 1,
        placeholder_count,
        result,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

async fn prepare_output_dir(dir: &Path) -> Result<(), CertbookError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| CertbookError::OutputDirFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

fn finish(outcomes: Vec<GuideOutcome>, start: Instant, cb: Option<&ProgressCallback>) -> BatchReport {
    let report = BatchReport::from_outcomes(outcomes, start.elapsed().as_millis() as u64);
    for outcome in report.failed() {
        debug!("{} failed: {:?}", outcome.certification, outcome.result.failures);
    }
    info!(
        "Batch complete: {} succeeded in {}ms",
        report.summary(),
        report.total_duration_ms
    );
    if let Some(cb) = cb {
        cb.on_batch_complete(report.attempted, report.succeeded);
    }
    report
}

/// File stems for combined guides. Certifications whose names reduce to the
/// same stem (`CKA` and `CKA!`) get `_2`, `_3` and so on.
pub fn guide_output_stems(certifications: &[CertificationSection]) -> Vec<String> {
    let mut used = HashSet::new();
    certifications
        .iter()
        .map(|cert| unique_name(&mut used, file_stem(&cert.name)))
        .collect()
}

fn unique_name(used: &mut HashSet<String>, name: String) -> String {
    let mut unique = name.clone();
    let mut n = 2;
    while !used.insert(unique.clone()) {
        unique = format!("{name}_{n}");
        n += 1;
    }
    unique
}

/// Output stems for per-page PDFs: the page file's own stem, prefixed with
/// its directories when another page already uses that stem (every
/// certification has a `README.md`).
pub fn page_output_names(pages: &[NavigationEntry]) -> Vec<String> {
    let mut used = HashSet::new();
    pages
        .iter()
        .map(|page| {
            let path = Path::new(&page.path);
            let base = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(file_stem)
                .unwrap_or_else(|| file_stem(&page.path));
            let name = if used.contains(&base) {
                file_stem(&path.with_extension("").to_string_lossy())
            } else {
                base
            };
            unique_name(&mut used, name)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use crate::output::Engine;
    use crate::pipeline::nav::parse_navigation;
    use crate::progress::GuideProgressCallback;
    use crate::render::RenderStrategy;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    const NAV: &str = r#"
site_name: Kube Guides
nav:
  - Home: index.md
  - "Kubestronaut (5 Certs)":
      - KCNA:
          - kcna/README.md
          - Deep Dive: kcna/deep-dive.md
      - CKA:
          - cka/README.md
          - Missing: cka/missing.md
"#;

    /// Writes a marker PDF unless the title is in `fail_on`.
    struct FakeStrategy {
        fail_on: Vec<&'static str>,
    }

    #[async_trait]
    impl RenderStrategy for FakeStrategy {
        fn name(&self) -> &str {
            "fake"
        }

        fn engine(&self) -> Engine {
            Engine::Fallback
        }

        async fn attempt(&self, job: &RenderJob) -> Result<(), RenderError> {
            if self.fail_on.contains(&job.title.as_str()) {
                return Err(RenderError::Layout("forced".into()));
            }
            assert!(job.source_path.exists(), "intermediate markdown missing");
            std::fs::write(&job.output_path, format!("%PDF {}", job.title)).map_err(|e| RenderError::Io {
                path: job.output_path.clone(),
                source: e,
            })
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl GuideProgressCallback for Recorder {
        fn on_batch_start(&self, total: usize) {
            self.0.lock().unwrap().push(format!("start {total}"));
        }
        fn on_guide_complete(&self, index: usize, _total: usize, name: &str, engine: &str) {
            self.0.lock().unwrap().push(format!("ok {index} {name} {engine}"));
        }
        fn on_guide_error(&self, index: usize, _total: usize, name: &str, _error: &str) {
            self.0.lock().unwrap().push(format!("err {index} {name}"));
        }
        fn on_batch_complete(&self, total: usize, success_count: usize) {
            self.0.lock().unwrap().push(format!("done {success_count}/{total}"));
        }
    }

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(docs.join("kcna")).unwrap();
        std::fs::create_dir_all(docs.join("cka")).unwrap();
        std::fs::write(docs.join("kcna/README.md"), "# KCNA\n\nIntro.\n").unwrap();
        std::fs::write(docs.join("kcna/deep-dive.md"), "# Deep Dive\n\nPods.\n").unwrap();
        std::fs::write(docs.join("cka/README.md"), "# CKA\n\nAdmin.\n").unwrap();
        std::fs::write(dir.path().join("mkdocs.yml"), NAV).unwrap();
        dir
    }

    fn setup(dir: &Path, fail_on: Vec<&'static str>, cb: Option<ProgressCallback>) -> (GuideConfig, Navigation, PdfRenderer) {
        let mut builder = GuideConfig::builder()
            .nav_path(dir.join("mkdocs.yml"))
            .output_dir(dir.join("out"));
        if let Some(cb) = cb {
            builder = builder.progress_callback(cb);
        }
        let config = builder.build().unwrap();
        let nav = parse_navigation(NAV, &config.nav_path, &config.categories).unwrap();
        let renderer = PdfRenderer::new(vec![Box::new(FakeStrategy { fail_on })]);
        (config, nav, renderer)
    }

    #[tokio::test]
    async fn guides_continue_past_failures() {
        let dir = site();
        let recorder = Arc::new(Recorder::default());
        let (config, nav, renderer) = setup(dir.path(), vec!["KCNA"], Some(recorder.clone()));

        let report = generate_guides_with(&config, &nav, &renderer).await.unwrap();
        assert_eq!(report.summary(), "1/2");
        assert_eq!(report.outcomes[0].certification, "KCNA");
        assert!(!report.outcomes[0].result.success);
        assert!(!dir.path().join("out/KCNA_Study_Guide.pdf").exists());

        let cka = &report.outcomes[1];
        assert!(cka.result.success);
        assert_eq!(cka.page_count, 2);
        assert_eq!(cka.placeholder_count, 1);
        assert!(dir.path().join("out/CKA_Study_Guide.pdf").exists());

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["start 2", "err 1 KCNA", "ok 2 CKA fallback", "done 1/2"]
        );
    }

    #[tokio::test]
    async fn parallel_jobs_keep_navigation_order() {
        let dir = site();
        let (mut config, nav, renderer) = setup(dir.path(), vec![], None);
        config.jobs = 4;
        let report = generate_guides_with(&config, &nav, &renderer).await.unwrap();
        let names: Vec<_> = report.outcomes.iter().map(|o| o.certification.as_str()).collect();
        assert_eq!(names, vec!["KCNA", "CKA"]);
        assert_eq!(report.summary(), "2/2");
    }

    #[tokio::test]
    async fn only_filter_limits_guides() {
        let dir = site();
        let (mut config, nav, renderer) = setup(dir.path(), vec![], None);
        config.only = vec!["cka".into()];
        let report = generate_guides_with(&config, &nav, &renderer).await.unwrap();
        assert_eq!(report.attempted, 1);
        assert_eq!(report.outcomes[0].certification, "CKA");
    }

    #[tokio::test]
    async fn pages_render_individually() {
        let dir = site();
        let (config, nav, renderer) = setup(dir.path(), vec![], None);
        let report = generate_page_pdfs_with(&config, &nav, &renderer).await.unwrap();

        let titles: Vec<_> = report.outcomes.iter().map(|o| o.certification.as_str()).collect();
        assert_eq!(titles, vec!["KCNA", "KCNA - Deep Dive", "CKA", "CKA - Missing"]);
        assert_eq!(report.summary(), "3/4");
        assert!(dir.path().join("out/README.pdf").exists());
        assert!(dir.path().join("out/deep-dive.pdf").exists());
        assert!(dir.path().join("out/cka_README.pdf").exists());
        assert_eq!(report.outcomes[3].placeholder_count, 1);
        assert!(report.outcomes[3].result.failures[0].starts_with("[read] cka/missing.md"));
    }

    #[tokio::test]
    async fn unwritable_output_dir_is_fatal() {
        let dir = site();
        let (mut config, nav, renderer) = setup(dir.path(), vec![], None);
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        config.output_dir = blocker.join("pdf");
        let err = generate_guides_with(&config, &nav, &renderer).await.unwrap_err();
        assert!(matches!(err, CertbookError::OutputDirFailed { .. }));
    }

    #[tokio::test]
    async fn missing_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = GuideConfig::builder()
            .nav_path(dir.path().join("mkdocs.yml"))
            .build()
            .unwrap();
        let err = generate_guides(&config).await.unwrap_err();
        assert!(matches!(err, CertbookError::ConfigNotFound { .. }));
    }

    #[test]
    fn page_names_disambiguate_collisions() {
        let pages = vec![
            NavigationEntry::new("KCNA", "kcna/README.md"),
            NavigationEntry::new("CKA", "cka/README.md"),
            NavigationEntry::new("CKA - Deep Dive", "cka/deep-dive.md"),
        ];
        assert_eq!(page_output_names(&pages), vec!["README", "cka_README", "deep-dive"]);
    }

    const CLASHING_NAV: &str = r#"
nav:
  - "Kubestronaut (5 Certs)":
      - CKA - Administrator:
          - cka/README.md
          - Storage: cka/storage.md
      - CKA - Administrator!:
          - cka2/README.md
"#;

    fn clashing_site() -> (tempfile::TempDir, GuideConfig, Navigation, PdfRenderer) {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(docs.join("cka")).unwrap();
        std::fs::create_dir_all(docs.join("cka2")).unwrap();
        std::fs::write(docs.join("cka/README.md"), "# CKA\n\nAdmin.\n").unwrap();
        std::fs::write(docs.join("cka/storage.md"), "# Storage\n\nVolumes.\n").unwrap();
        std::fs::write(docs.join("cka2/README.md"), "# CKA again\n\nMore.\n").unwrap();
        std::fs::write(dir.path().join("mkdocs.yml"), CLASHING_NAV).unwrap();
        let config = GuideConfig::builder()
            .nav_path(dir.path().join("mkdocs.yml"))
            .output_dir(dir.path().join("out"))
            .build()
            .unwrap();
        let nav = parse_navigation(CLASHING_NAV, &config.nav_path, &config.categories).unwrap();
        let renderer = PdfRenderer::new(vec![Box::new(FakeStrategy { fail_on: vec![] })]);
        (dir, config, nav, renderer)
    }

    #[tokio::test]
    async fn only_filter_matches_hyphenated_certification_pages() {
        let (dir, mut config, nav, renderer) = clashing_site();
        config.only = vec!["CKA - Administrator".into()];
        let report = generate_page_pdfs_with(&config, &nav, &renderer).await.unwrap();
        let titles: Vec<_> = report.outcomes.iter().map(|o| o.certification.as_str()).collect();
        assert_eq!(titles, vec!["CKA - Administrator", "CKA - Administrator - Storage"]);
        assert_eq!(report.summary(), "2/2");
        assert!(dir.path().join("out/storage.pdf").exists());
    }

    #[tokio::test]
    async fn guides_with_clashing_stems_get_separate_files() {
        let (dir, config, nav, renderer) = clashing_site();
        let report = generate_guides_with(&config, &nav, &renderer).await.unwrap();
        assert_eq!(report.summary(), "2/2");

        let first = dir.path().join("out/CKA_-_Administrator_Study_Guide.pdf");
        let second = dir.path().join("out/CKA_-_Administrator_2_Study_Guide.pdf");
        assert_eq!(report.outcomes[0].result.output_path, first);
        assert_eq!(report.outcomes[1].result.output_path, second);
        assert_eq!(std::fs::read_to_string(first).unwrap(), "%PDF CKA - Administrator");
        assert_eq!(std::fs::read_to_string(second).unwrap(), "%PDF CKA - Administrator!");
    }

    #[test]
    fn guide_stems_disambiguate_collisions() {
        let certs: Vec<_> = ["KCNA", "KCNA!", "KCNA?", "CKA"]
            .iter()
            .map(|name| CertificationSection {
                name: name.to_string(),
                pages: Vec::new(),
            })
            .collect();
        assert_eq!(guide_output_stems(&certs), vec!["KCNA", "KCNA_2", "KCNA_3", "CKA"]);
    }
}
