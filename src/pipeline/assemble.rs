//! Document assembly: one certification's pages → one markdown guide.
//!
//! ## Layout
//!
//! ```text
//! # <Certification>
//! **Generated on:** 2026-10-19 14:03:11
//! **Version:** 1.0
//! ---
//! ## Table of Contents
//! 1. [Overview](#overview)
//! 2. [Deep Dive](#deep-dive)
//! ---
//! ## Overview {#overview}   ← explicit id, the same anchor as the TOC link
//! <page body without its own "# Title" line>
//! ---
//! ## Deep Dive {#deep-dive}
//! ...
//! ```
//!
//! Every block is separated by one blank line. Section headings carry their
//! anchor as an explicit `{#id}` attribute so renderers that derive ids on
//! their own still land on the TOC targets. Two pages with the same title get
//! distinct anchors (`overview`, `overview-1`).
//!
//! A page that cannot be read does not abort the guide: its heading is still
//! emitted (so the TOC link resolves) followed by a visible placeholder, and
//! the failure is recorded in [`AssembledDocument::page_errors`].

use crate::error::PageError;
use crate::pipeline::anchor::{heading_line, AnchorRegistry};
use crate::pipeline::nav::NavigationEntry;
use crate::pipeline::normalize::{normalize_page, strip_leading_title};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Timestamp format of the `Generated on` line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where page content comes from.
///
/// The filesystem implementation is [`FsPageSource`]; tests can provide
/// in-memory sources.
pub trait PageSource: Send + Sync {
    fn read_page(&self, path: &str) -> io::Result<String>;
}

/// Reads pages relative to a content root (normally the mkdocs `docs_dir`).
#[derive(Debug, Clone)]
pub struct FsPageSource {
    root: PathBuf,
}

impl FsPageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PageSource for FsPageSource {
    fn read_page(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(self.root.join(path))
    }
}

/// Knobs for the title block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyOptions {
    /// Value of the `**Version:**` line. Default: "1.0".
    pub version: String,
    /// Fixed generation time; `None` uses the local clock.
    pub generated_at: Option<NaiveDateTime>,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            generated_at: None,
        }
    }
}

/// One line of the table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: String,
    pub anchor: String,
}

/// A certification guide ready to render. Not mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledDocument {
    pub certification_name: String,
    pub generated_at: NaiveDateTime,
    pub table_of_contents: Vec<TocEntry>,
    pub body: String,
    /// Pages replaced by a placeholder.
    pub page_errors: Vec<PageError>,
}

impl AssembledDocument {
    /// Number of sections rendered from real content.
    pub fn loaded_pages(&self) -> usize {
        self.table_of_contents.len() - self.page_errors.len()
    }
}

/// The placeholder emitted in place of an unreadable page.
pub fn placeholder_line(title: &str) -> String {
    format!("*Error: Could not load content for {title}*")
}

/// Assemble one certification guide.
///
/// Never fails: unreadable pages become placeholders.
pub fn assemble(
    certification_name: &str,
    pages: &[NavigationEntry],
    source: &dyn PageSource,
    options: &AssemblyOptions,
) -> AssembledDocument {
    let generated_at = options
        .generated_at
        .unwrap_or_else(|| Local::now().naive_local());

    let mut anchors = AnchorRegistry::new();
    let table_of_contents: Vec<TocEntry> = pages
        .iter()
        .map(|page| TocEntry {
            title: page.title.clone(),
            anchor: anchors.assign(&page.title),
        })
        .collect();

    let mut parts: Vec<String> = Vec::with_capacity(pages.len() * 3 + 8);

    // ── Title block ──────────────────────────────────────────────────────
    parts.push(format!("# {certification_name}"));
    parts.push(format!(
        "**Generated on:** {}",
        generated_at.format(TIMESTAMP_FORMAT)
    ));
    parts.push(format!("**Version:** {}", options.version));
    parts.push("---".to_string());

    // ── Table of contents ────────────────────────────────────────────────
    parts.push("## Table of Contents".to_string());
    let toc_lines: Vec<String> = table_of_contents
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("{}. [{}](#{})", i + 1, entry.title, entry.anchor))
        .collect();
    if !toc_lines.is_empty() {
        parts.push(toc_lines.join("\n"));
    }
    parts.push("---".to_string());

    // ── Sections ─────────────────────────────────────────────────────────
    let mut page_errors = Vec::new();
    for (page, entry) in pages.iter().zip(&table_of_contents) {
        parts.push(heading_line(2, &page.title, &entry.anchor));
        match source.read_page(&page.path) {
            Ok(raw) => {
                let normalized = normalize_page(&raw);
                let (content, dropped) = strip_leading_title(&normalized);
                if dropped {
                    debug!("{}: dropped duplicate title line", page.path);
                }
                let content = content.trim_end();
                if !content.is_empty() {
                    parts.push(content.to_string());
                }
            }
            Err(e) => {
                warn!("Could not read '{}' for '{}': {}", page.path, page.title, e);
                parts.push(placeholder_line(&page.title));
                page_errors.push(PageError::ContentRead {
                    title: page.title.clone(),
                    path: page.path.clone(),
                    detail: e.to_string(),
                });
            }
        }
        parts.push("---".to_string());
    }

    let mut body = parts.join("\n\n");
    body.push('\n');

    AssembledDocument {
        certification_name: certification_name.to_string(),
        generated_at,
        table_of_contents,
        body,
        page_errors,
    }
}

/// Prepare one page for standalone rendering: `# <title>` followed by the
/// page body without its own top-level title.
pub fn standalone_page(title: &str, raw: &str) -> String {
    let normalized = normalize_page(raw);
    let (content, _) = strip_leading_title(&normalized);
    let content = content.trim_end();
    if content.is_empty() {
        format!("# {title}\n")
    } else {
        format!("# {title}\n\n{content}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::anchor::split_heading_id;
    use std::collections::HashMap;

    struct MemorySource(HashMap<&'static str, &'static str>);

    impl PageSource for MemorySource {
        fn read_page(&self, path: &str) -> io::Result<String> {
            self.0
                .get(path)
                .map(|s| s.to_string())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such page"))
        }
    }

    fn fixed_options() -> AssemblyOptions {
        AssemblyOptions {
            version: "1.0".into(),
            generated_at: NaiveDateTime::parse_from_str("2026-10-19 08:30:00", TIMESTAMP_FORMAT).ok(),
        }
    }

    fn example() -> (Vec<NavigationEntry>, MemorySource) {
        let pages = vec![
            NavigationEntry::new("Overview", "a.md"),
            NavigationEntry::new("Deep Dive", "b.md"),
        ];
        let source = MemorySource(HashMap::from([("a.md", "# A\nIntro text"), ("b.md", "# B\nDetails")]));
        (pages, source)
    }

    #[test]
    fn example_cert_matches_expected_layout() {
        let (pages, source) = example();
        let doc = assemble("Example Cert", &pages, &source, &fixed_options());

        let expected = "# Example Cert\n\n\
**Generated on:** 2026-10-19 08:30:00\n\n\
**Version:** 1.0\n\n\
---\n\n\
## Table of Contents\n\n\
1. [Overview](#overview)\n2. [Deep Dive](#deep-dive)\n\n\
---\n\n\
## Overview {#overview}\n\n\
Intro text\n\n\
---\n\n\
## Deep Dive {#deep-dive}\n\n\
Details\n\n\
---\n";
        assert_eq!(doc.body, expected);
        assert!(!doc.body.contains("# A\n"));
        assert!(!doc.body.contains("# B\n"));
    }

    #[test]
    fn toc_has_one_entry_per_page_in_order() {
        let (pages, source) = example();
        let doc = assemble("Example Cert", &pages, &source, &fixed_options());
        let titles: Vec<_> = doc.table_of_contents.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Overview", "Deep Dive"]);
    }

    fn section_ids(body: &str) -> Vec<String> {
        body.lines()
            .filter_map(|l| l.strip_prefix("## "))
            .filter_map(|h| split_heading_id(h).1)
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn toc_anchors_match_emitted_headings() {
        let pages = vec![
            NavigationEntry::new("Domain 1: Cluster Architecture (25%)", "a.md"),
            NavigationEntry::new("Services & Networking", "b.md"),
            NavigationEntry::new("Kubernetes v1.30 Features", "c.md"),
            NavigationEntry::new("1. Cluster Setup", "d.md"),
        ];
        let source = MemorySource(HashMap::from([("a.md", "x"), ("b.md", "y"), ("c.md", "z"), ("d.md", "w")]));
        let doc = assemble("CKA", &pages, &source, &fixed_options());

        let toc_anchors: Vec<String> =
            doc.table_of_contents.iter().map(|t| t.anchor.clone()).collect();
        assert_eq!(section_ids(&doc.body), toc_anchors);
        for anchor in &toc_anchors {
            assert!(doc.body.contains(&format!("(#{anchor})")));
        }
        assert!(doc
            .body
            .contains("## Kubernetes v1.30 Features {#kubernetes-v130-features}"));
        assert!(doc.body.contains("## 1. Cluster Setup {#section-1-cluster-setup}"));
    }

    #[test]
    fn repeated_titles_get_distinct_anchors() {
        let pages = vec![
            NavigationEntry::new("Overview", "a.md"),
            NavigationEntry::new("Overview", "b.md"),
        ];
        let (_, source) = example();
        let doc = assemble("X", &pages, &source, &fixed_options());
        assert_eq!(section_ids(&doc.body), vec!["overview", "overview-1"]);
        assert!(doc.body.contains("1. [Overview](#overview)\n2. [Overview](#overview-1)"));
    }

    #[test]
    fn unreadable_page_becomes_placeholder() {
        let pages = vec![
            NavigationEntry::new("Overview", "a.md"),
            NavigationEntry::new("Missing", "gone.md"),
            NavigationEntry::new("Deep Dive", "b.md"),
        ];
        let (_, source) = example();
        let doc = assemble("Example Cert", &pages, &source, &fixed_options());

        assert_eq!(doc.table_of_contents.len(), 3);
        assert_eq!(doc.page_errors.len(), 1);
        assert_eq!(doc.loaded_pages(), 2);
        assert!(doc.body.contains("## Missing {#missing}\n\n*Error: Could not load content for Missing*"));
        assert!(doc.body.contains("Intro text"));
        assert!(doc.body.contains("Details"));
    }

    #[test]
    fn subheading_first_line_is_kept() {
        let pages = vec![NavigationEntry::new("Overview", "a.md")];
        let source = MemorySource(HashMap::from([("a.md", "## Scope\nText")]));
        let doc = assemble("X", &pages, &source, &fixed_options());
        assert!(doc.body.contains("## Overview {#overview}\n\n## Scope\nText"));
    }

    #[test]
    fn no_pages_still_has_title_and_toc() {
        let source = MemorySource(HashMap::new());
        let doc = assemble("Empty", &[], &source, &fixed_options());
        assert!(doc.body.starts_with("# Empty\n"));
        assert!(doc.body.contains("## Table of Contents\n\n---"));
        assert!(doc.table_of_contents.is_empty());
    }

    #[test]
    fn fs_source_reads_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("kcna")).unwrap();
        std::fs::write(dir.path().join("kcna/README.md"), "# KCNA\nHello").unwrap();
        let source = FsPageSource::new(dir.path());
        assert_eq!(source.read_page("kcna/README.md").unwrap(), "# KCNA\nHello");
        assert!(source.read_page("kcna/missing.md").is_err());
    }

    #[test]
    fn standalone_page_replaces_title() {
        assert_eq!(
            standalone_page("KCNA - Domain 1", "# Domain 1\r\nBody\r\n"),
            "# KCNA - Domain 1\n\nBody\n"
        );
    }
}
