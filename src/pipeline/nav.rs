//! Navigation loading and flattening.
//!
//! The study guides are described by the `nav` tree of an mkdocs config:
//!
//! ```yaml
//! nav:
//!   - Home: index.md
//!   - Kubestronaut (5 Certs):
//!       - KCNA:
//!           - kcna/README.md            # bare path   → "Overview"
//!           - Domain 1: kcna/domain1.md # titled page
//! ```
//!
//! [`load_navigation`] pulls the requested categories out of that tree without
//! interpreting them; [`flatten_category`] turns one category into an ordered
//! list of certifications and their pages. The nested structure is loosely
//! typed, so every item goes through [`NavItem::parse`], a tagged parser whose
//! `Unrecognized` arm is logged and dropped instead of failing the run.

use crate::error::CertbookError;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;
use tracing::{debug, info, warn};

/// Categories extracted from `nav` when the caller does not name any.
pub const DEFAULT_CATEGORIES: [&str; 2] = [
    "Kubestronaut (5 Certs)",
    "Golden Kubestronaut (Additional Certs)",
];

/// Title given to a bare page path inside a certification.
pub const OVERVIEW_TITLE: &str = "Overview";

const MARKDOWN_EXTENSIONS: [&str; 2] = [".md", ".markdown"];

/// One page of a certification: its display title and content path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEntry {
    pub title: String,
    pub path: String,
}

impl NavigationEntry {
    pub fn new(title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            path: path.into(),
        }
    }
}

/// A page flattened for standalone output, with the certification it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandalonePage {
    pub certification: String,
    pub page: NavigationEntry,
}

/// A certification and its pages in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationSection {
    pub name: String,
    pub pages: Vec<NavigationEntry>,
}

/// One top-level `nav` category, kept as the raw nested structure.
#[derive(Debug, Clone)]
pub struct NavCategory {
    pub name: String,
    pub sections: Value,
}

/// The parts of an mkdocs config the generators care about.
#[derive(Debug, Clone)]
pub struct Navigation {
    /// `site_name`, used as the running header of natively rendered PDFs.
    pub site_name: Option<String>,
    /// `docs_dir`, relative to the config file. mkdocs defaults it to `docs`.
    pub docs_dir: Option<String>,
    /// Requested categories, in `nav` order.
    pub categories: Vec<NavCategory>,
}

impl Navigation {
    /// Flatten every category into one ordered list of certifications.
    ///
    /// A certification defined more than once keeps the position of its first
    /// definition and the pages of its last one.
    pub fn certifications(&self) -> Vec<CertificationSection> {
        merge_certifications(
            self.categories
                .iter()
                .flat_map(|category| flatten_category(&category.sections)),
        )
    }

    /// Flatten every category into individual pages, titled for standalone use.
    pub fn pages(&self) -> Vec<StandalonePage> {
        self.categories
            .iter()
            .flat_map(|category| flatten_pages(&category.sections))
            .collect()
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

/// Read the config at `path` and extract the named categories.
///
/// # Errors
/// - [`CertbookError::ConfigNotFound`] when the file does not exist
/// - [`CertbookError::ConfigParseError`] when it cannot be read, is not YAML,
///   or has no `nav` sequence
pub fn load_navigation(path: &Path, categories: &[String]) -> Result<Navigation, CertbookError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CertbookError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            CertbookError::ConfigParseError {
                path: path.to_path_buf(),
                detail: format!("unreadable: {e}"),
            }
        }
    })?;
    parse_navigation(&text, path, categories)
}

/// Parse config text; `path` is only used in error messages.
pub fn parse_navigation(
    text: &str,
    path: &Path,
    categories: &[String],
) -> Result<Navigation, CertbookError> {
    let parse_error = |detail: String| CertbookError::ConfigParseError {
        path: path.to_path_buf(),
        detail,
    };

    let root: Value = serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string()))?;
    let nav = root
        .get("nav")
        .and_then(Value::as_sequence)
        .ok_or_else(|| parse_error("missing top-level `nav` sequence".into()))?;

    let mut found = Vec::new();
    for item in nav {
        let Some(mapping) = item.as_mapping() else {
            continue;
        };
        for (key, value) in mapping {
            let Some(name) = key.as_str() else { continue };
            if categories.iter().any(|c| c == name) {
                debug!("Found category '{}'", name);
                found.push(NavCategory {
                    name: name.to_string(),
                    sections: value.clone(),
                });
            }
        }
    }

    for wanted in categories {
        if !found.iter().any(|c| &c.name == wanted) {
            warn!("Category '{}' not present in {}", wanted, path.display());
        }
    }
    info!("Loaded {} navigation categories", found.len());

    Ok(Navigation {
        site_name: root.get("site_name").and_then(Value::as_str).map(String::from),
        docs_dir: root.get("docs_dir").and_then(Value::as_str).map(String::from),
        categories: found,
    })
}

// ── Item parser ──────────────────────────────────────────────────────────────

/// One item of a certification's page list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavItem {
    /// `- kcna/README.md`
    PagePath(String),
    /// `- Domain 1: kcna/domain1.md` (one or more title → path pairs)
    TitledGroup(Vec<(String, String)>),
    /// Anything else; carries a short description for the log.
    Unrecognized(String),
}

impl NavItem {
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::String(path) => NavItem::PagePath(path.clone()),
            Value::Mapping(mapping) => {
                let mut pairs = Vec::with_capacity(mapping.len());
                for (key, value) in mapping {
                    match (key.as_str(), value.as_str()) {
                        (Some(title), Some(path)) => pairs.push((title.to_string(), path.to_string())),
                        _ => warn!("Skipping navigation entry {:?}: expected `title: path`", key),
                    }
                }
                if pairs.is_empty() {
                    NavItem::Unrecognized(format!("mapping with {} unusable entries", mapping.len()))
                } else {
                    NavItem::TitledGroup(pairs)
                }
            }
            other => NavItem::Unrecognized(describe(other)),
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::Sequence(s) => format!("sequence of {} items", s.len()),
        Value::Tagged(t) => format!("tagged value {}", t.tag),
        Value::String(_) | Value::Mapping(_) => "unexpected entry".into(),
    }
}

fn is_markdown(path: &str) -> bool {
    MARKDOWN_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

// ── Flattener ────────────────────────────────────────────────────────────────

/// Turn one category into ordered certifications.
///
/// Each `- <Certification>: [items]` mapping becomes a section; items are
/// parsed with [`NavItem::parse`]. Order follows the input exactly.
pub fn flatten_category(sections: &Value) -> Vec<CertificationSection> {
    let Some(items) = sections.as_sequence() else {
        warn!("Category is not a sequence ({}), skipping", describe(sections));
        return Vec::new();
    };

    let mut certifications = Vec::new();
    for item in items {
        let Some(mapping) = item.as_mapping() else {
            debug!("Skipping non-certification item in category: {}", describe(item));
            continue;
        };
        for (key, content) in mapping {
            let Some(name) = key.as_str() else { continue };
            let Some(children) = content.as_sequence() else {
                debug!("'{}' is a single page, not a certification", name);
                continue;
            };
            certifications.push(CertificationSection {
                name: name.to_string(),
                pages: collect_pages(name, children, false),
            });
        }
    }

    merge_certifications(certifications)
}

/// Flatten one category into standalone pages.
///
/// Bare paths take the certification name as title; titled pages become
/// `"<certification> - <title>"` so each PDF is identifiable on its own.
pub fn flatten_pages(sections: &Value) -> Vec<StandalonePage> {
    let Some(items) = sections.as_sequence() else {
        return Vec::new();
    };
    let mut pages = Vec::new();
    for mapping in items.iter().filter_map(Value::as_mapping) {
        for (key, content) in mapping {
            if let (Some(name), Some(children)) = (key.as_str(), content.as_sequence()) {
                pages.extend(
                    collect_pages(name, children, true)
                        .into_iter()
                        .map(|page| StandalonePage {
                            certification: name.to_string(),
                            page,
                        }),
                );
            }
        }
    }
    pages
}

fn collect_pages(certification: &str, children: &[Value], standalone: bool) -> Vec<NavigationEntry> {
    let mut pages = Vec::new();
    for child in children {
        match NavItem::parse(child) {
            NavItem::PagePath(path) => {
                let title = if standalone { certification } else { OVERVIEW_TITLE };
                push_markdown(&mut pages, title.to_string(), path);
            }
            NavItem::TitledGroup(pairs) => {
                for (title, path) in pairs {
                    let title = if standalone {
                        format!("{certification} - {title}")
                    } else {
                        title
                    };
                    push_markdown(&mut pages, title, path);
                }
            }
            NavItem::Unrecognized(what) => {
                warn!("Skipping unrecognized navigation entry under '{}': {}", certification, what);
            }
        }
    }
    pages
}

fn push_markdown(pages: &mut Vec<NavigationEntry>, title: String, path: String) {
    if is_markdown(&path) {
        pages.push(NavigationEntry { title, path });
    } else {
        debug!("Skipping '{}' ({}): not a markdown page", title, path);
    }
}

fn merge_certifications(
    sections: impl IntoIterator<Item = CertificationSection>,
) -> Vec<CertificationSection> {
    let mut merged: Vec<CertificationSection> = Vec::new();
    for section in sections {
        match merged.iter_mut().find(|s| s.name == section.name) {
            Some(existing) => {
                warn!(
                    "Certification '{}' is defined more than once; using the later definition ({} pages, replacing {})",
                    section.name,
                    section.pages.len(),
                    existing.pages.len()
                );
                *existing = section;
            }
            None => merged.push(section),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const MKDOCS: &str = r#"
site_name: Golden Kubestronaut Learning
docs_dir: docs
markdown_extensions:
  - pymdownx.emoji:
      emoji_index: !!python/name:material.extensions.emoji.twemoji
nav:
  - Home: index.md
  - Kubestronaut (5 Certs):
      - KCNA:
          - kcna/README.md
          - Domain 1 - Kubernetes Fundamentals: kcna/domain1.md
          - Domain 2: kcna/domain2.md
      - CKA:
          - cka/README.md
          - Troubleshooting: cka/troubleshooting.md
  - Golden Kubestronaut (Additional Certs):
      - PCA:
          - pca/README.md
          - Upstream: https://prometheus.io/docs
"#;

    fn categories() -> Vec<String> {
        DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect()
    }

    fn parse(text: &str) -> Navigation {
        parse_navigation(text, &PathBuf::from("mkdocs.yml"), &categories()).unwrap()
    }

    #[test]
    fn loads_requested_categories_in_order() {
        let nav = parse(MKDOCS);
        let names: Vec<_> = nav.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, DEFAULT_CATEGORIES);
        assert_eq!(nav.site_name.as_deref(), Some("Golden Kubestronaut Learning"));
        assert_eq!(nav.docs_dir.as_deref(), Some("docs"));
    }

    #[test]
    fn flattens_both_shapes() {
        let nav = parse(MKDOCS);
        let certs = nav.certifications();
        assert_eq!(certs.len(), 3);
        assert_eq!(certs[0].name, "KCNA");
        assert_eq!(
            certs[0].pages,
            vec![
                NavigationEntry::new("Overview", "kcna/README.md"),
                NavigationEntry::new("Domain 1 - Kubernetes Fundamentals", "kcna/domain1.md"),
                NavigationEntry::new("Domain 2", "kcna/domain2.md"),
            ]
        );
    }

    #[test]
    fn drops_non_markdown_targets() {
        let certs = parse(MKDOCS).certifications();
        let pca = certs.iter().find(|c| c.name == "PCA").unwrap();
        assert_eq!(pca.pages, vec![NavigationEntry::new("Overview", "pca/README.md")]);
    }

    #[test]
    fn flattening_is_deterministic() {
        let nav = parse(MKDOCS);
        let first = format!("{:?}", nav.certifications());
        for _ in 0..5 {
            assert_eq!(format!("{:?}", parse(MKDOCS).certifications()), first);
        }
    }

    #[test]
    fn unrecognized_items_are_skipped() {
        let section: Value = serde_yaml::from_str(
            r#"
- KCSA:
    - kcsa/README.md
    - 42
    - [nested, list]
    - Threats: kcsa/threats.md
"#,
        )
        .unwrap();
        let certs = flatten_category(&section);
        assert_eq!(certs.len(), 1);
        assert_eq!(
            certs[0].pages,
            vec![
                NavigationEntry::new("Overview", "kcsa/README.md"),
                NavigationEntry::new("Threats", "kcsa/threats.md"),
            ]
        );
    }

    #[test]
    fn nav_item_parser_variants() {
        let path: Value = serde_yaml::from_str("a.md").unwrap();
        assert_eq!(NavItem::parse(&path), NavItem::PagePath("a.md".into()));

        let group: Value = serde_yaml::from_str("Deep Dive: b.md").unwrap();
        assert_eq!(
            NavItem::parse(&group),
            NavItem::TitledGroup(vec![("Deep Dive".into(), "b.md".into())])
        );

        let number: Value = serde_yaml::from_str("7").unwrap();
        assert!(matches!(NavItem::parse(&number), NavItem::Unrecognized(_)));

        let bad_group: Value = serde_yaml::from_str("Nested: [x.md]").unwrap();
        assert!(matches!(NavItem::parse(&bad_group), NavItem::Unrecognized(_)));
    }

    #[test]
    fn duplicate_certification_last_wins_in_first_position() {
        let text = r#"
nav:
  - Kubestronaut (5 Certs):
      - CKA:
          - cka/old.md
      - CKAD:
          - ckad/README.md
      - CKA:
          - cka/new.md
"#;
        let certs = parse(text).certifications();
        let names: Vec<_> = certs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["CKA", "CKAD"]);
        assert_eq!(certs[0].pages, vec![NavigationEntry::new("Overview", "cka/new.md")]);
    }

    #[test]
    fn standalone_pages_are_prefixed() {
        let pages = parse(MKDOCS).pages();
        assert_eq!(pages[0].page, NavigationEntry::new("KCNA", "kcna/README.md"));
        assert_eq!(
            pages[1].page,
            NavigationEntry::new("KCNA - Domain 1 - Kubernetes Fundamentals", "kcna/domain1.md")
        );
        assert!(pages.iter().take(2).all(|p| p.certification == "KCNA"));
    }

    #[test]
    fn standalone_pages_keep_hyphenated_certification_names() {
        let text = r#"
nav:
  - Kubestronaut (5 Certs):
      - CKA - Certified Kubernetes Administrator:
          - cka/README.md
          - Storage: cka/storage.md
"#;
        let pages = parse(text).pages();
        assert_eq!(pages.len(), 2);
        assert!(pages
            .iter()
            .all(|p| p.certification == "CKA - Certified Kubernetes Administrator"));
        assert_eq!(pages[1].page.title, "CKA - Certified Kubernetes Administrator - Storage");
    }

    #[test]
    fn missing_nav_is_parse_error() {
        let err = parse_navigation("site_name: x\n", &PathBuf::from("m.yml"), &categories())
            .unwrap_err();
        assert!(matches!(err, CertbookError::ConfigParseError { .. }));
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let err = parse_navigation("nav: [unclosed", &PathBuf::from("m.yml"), &categories())
            .unwrap_err();
        assert!(matches!(err, CertbookError::ConfigParseError { .. }));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_navigation(&PathBuf::from("/definitely/not/here/mkdocs.yml"), &categories())
            .unwrap_err();
        assert!(matches!(err, CertbookError::ConfigNotFound { .. }));
    }
}
