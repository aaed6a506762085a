//! Anchor and file-name derivation.
//!
//! [`slugify`] is the single normalisation used for every in-document anchor:
//! the assembler's table of contents, the headings it emits, and the heading
//! ids assigned by the native renderer. Links only resolve if all three agree,
//! so nothing else in the crate may compute an anchor.

use std::collections::HashSet;

/// Prefix for anchors that would otherwise not start with a letter.
pub const ANCHOR_PREFIX: &str = "section";

/// Derive the anchor id for a heading title.
///
/// Lower-cases letters, turns each whitespace character into `-`, keeps
/// `-` and `_`, and strips every other non-alphanumeric character. An id must
/// start with a letter to be usable as an explicit heading attribute
/// (`{#id}`), so a slug that does not is prefixed with `section-`, and an empty
/// one becomes `section`.
///
/// ```
/// use certbook::pipeline::anchor::slugify;
/// assert_eq!(slugify("Deep Dive"), "deep-dive");
/// assert_eq!(slugify("Domain 1: Cluster (Setup), Basics"), "domain-1-cluster-setup-basics");
/// assert_eq!(slugify("1. Cluster Setup"), "section-1-cluster-setup");
/// ```
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.trim().chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if ch.is_whitespace() {
            slug.push('-');
        } else if ch == '-' || ch == '_' {
            slug.push(ch);
        }
    }
    match slug.chars().next() {
        Some(first) if first.is_alphabetic() => slug,
        Some(_) => format!("{ANCHOR_PREFIX}-{slug}"),
        None => ANCHOR_PREFIX.to_string(),
    }
}

/// A markdown heading line carrying an explicit id: `## Title {#anchor}`.
///
/// Renderers that derive their own ids from the heading text (pandoc keeps
/// dots and drops leading digits) then still agree with the table of
/// contents.
pub fn heading_line(level: usize, title: &str, anchor: &str) -> String {
    format!("{} {} {{#{}}}", "#".repeat(level.clamp(1, 6)), title, anchor)
}

/// Split a trailing `{#id}` attribute off heading text.
///
/// Returns the bare title and the id, if one was present.
pub fn split_heading_id(text: &str) -> (&str, Option<&str>) {
    let trimmed = text.trim_end();
    let Some(body) = trimmed.strip_suffix('}') else {
        return (text, None);
    };
    let Some(open) = body.rfind("{#") else {
        return (text, None);
    };
    let id = &body[open + 2..];
    if id.is_empty() || id.chars().any(|c| c.is_whitespace() || c == '{' || c == '}') {
        return (text, None);
    }
    (body[..open].trim_end(), Some(id))
}

/// Hands out unique anchors within one document.
///
/// The first heading with a given slug keeps it; later ones get `-1`, `-2`,
/// ... suffixes. Ids reserved up front (explicit `{#id}` attributes found
/// anywhere in the document) are never handed out to other headings.
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    used: HashSet<String>,
    reserved: HashSet<String>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, id: &str) {
        self.reserved.insert(id.to_string());
    }

    /// Unique anchor derived from `title`.
    pub fn assign(&mut self, title: &str) -> String {
        let base = slugify(title);
        let mut candidate = base.clone();
        let mut n = 0;
        while self.used.contains(&candidate) || self.reserved.contains(&candidate) {
            n += 1;
            candidate = format!("{base}-{n}");
        }
        self.used.insert(candidate.clone());
        candidate
    }

    /// Take an explicit id as-is. Returns `false` when it was already taken.
    pub fn claim(&mut self, id: &str) -> bool {
        self.used.insert(id.to_string())
    }
}

/// Derive a file-system-safe stem from a display name.
///
/// Whitespace and punctuation become `_`, runs of `_` collapse, and leading or
/// trailing `_` are trimmed. Falls back to `"untitled"` for names with no
/// usable characters.
pub fn file_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for ch in name.chars() {
        let mapped = if ch.is_alphanumeric() || ch == '-' {
            ch
        } else {
            '_'
        };
        if mapped == '_' && stem.ends_with('_') {
            continue;
        }
        stem.push(mapped);
    }
    let trimmed = stem.trim_matches('_');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Output file name of a combined study guide, from its [`file_stem`].
pub fn guide_file_name(stem: &str) -> String {
    format!("{stem}_Study_Guide.pdf")
}
