//! Normalisation: deterministic cleanup of page markdown before assembly.
//!
//! Pages are hand-written over years by many contributors and edited on
//! different platforms. Before the assembler looks at the first line of a page
//! (to drop a duplicate `# Title`) the text has to be in a predictable shape,
//! otherwise a BOM, a CRLF or an mkdocs front-matter block hides the title and
//! the guide ends up with two headings per section.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule can assume `\n`;
//! invisible characters go before front-matter detection because a leading BOM
//! would otherwise hide the opening `---`.
//!
//! Fenced code blocks are copied through untouched by the blank-line rule:
//! blank lines inside a fence are part of the listing.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all normalisation rules to one page of markdown.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (BOM, zero-width spaces, soft hyphens)
/// 3. Strip a leading YAML front-matter block
/// 4. Collapse 3+ consecutive blank lines down to 2, outside code fences
/// 5. Ensure the text ends with exactly one newline
pub fn normalize_page(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = strip_front_matter(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

/// Split off the first line when it is a top-level (`# `) heading.
///
/// Returns the remaining text, with leading blank lines removed, and whether a
/// title was dropped. `## ` and deeper headings are kept.
pub fn strip_leading_title(content: &str) -> (&str, bool) {
    let first_line = content.lines().next().unwrap_or("");
    if !first_line.starts_with("# ") {
        return (content, false);
    }
    let rest = match content.find('\n') {
        Some(idx) => &content[idx + 1..],
        None => "",
    };
    (rest.trim_start_matches('\n'), true)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Strip YAML front matter ─────────────────────────────────────────
//
// mkdocs pages may open with `---\nkey: value\n---`. It carries page metadata
// for the site generator and must not leak into the guide as a horizontal rule
// followed by a paragraph of YAML.

static RE_FRONT_MATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\n.*?\n---[ \t]*(?:\n|\z)").unwrap());

fn strip_front_matter(input: &str) -> String {
    RE_FRONT_MATTER.replace(input, "").to_string()
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

/// At most this many consecutive blank lines survive outside code fences.
const MAX_BLANK_LINES: usize = 2;

fn collapse_blank_lines(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut fence: Option<Fence> = None;
    let mut blanks = 0;

    for line in input.split_inclusive('\n') {
        match fence {
            Some(open) => {
                if open.closed_by(line) {
                    fence = None;
                }
            }
            None => {
                if line.trim().is_empty() {
                    blanks += 1;
                    if blanks > MAX_BLANK_LINES {
                        continue;
                    }
                } else {
                    blanks = 0;
                    fence = Fence::opened_by(line);
                }
            }
        }
        out.push_str(line);
    }
    out
}

/// An open ```` ``` ```` or `~~~` fence.
#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: char,
    len: usize,
}

impl Fence {
    fn opened_by(line: &str) -> Option<Self> {
        let trimmed = line.trim_start_matches(' ');
        // Four spaces of indentation make an indented code line, not a fence.
        if line.len() - trimmed.len() > 3 {
            return None;
        }
        let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let len = trimmed.chars().take_while(|c| *c == marker).count();
        if len < 3 {
            return None;
        }
        // A backtick fence's info string may not contain backticks.
        if marker == '`' && trimmed[len..].contains('`') {
            return None;
        }
        Some(Self { marker, len })
    }

    fn closed_by(self, line: &str) -> bool {
        let trimmed = line.trim_start_matches(' ');
        if line.len() - trimmed.len() > 3 {
            return false;
        }
        let len = trimmed.chars().take_while(|c| *c == self.marker).count();
        len >= self.len && trimmed[len * self.marker.len_utf8()..].trim().is_empty()
    }
}

// ── Rule 5: Ensure text ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "\u{FEFF}# Title\u{200B}";
        assert_eq!(remove_invisible_chars(input), "# Title");
    }

    #[test]
    fn test_strip_front_matter() {
        let input = "---\ntitle: KCNA\ntags: [k8s]\n---\n# KCNA\nBody";
        assert_eq!(strip_front_matter(input), "# KCNA\nBody");
    }

    #[test]
    fn test_horizontal_rule_mid_page_is_not_front_matter() {
        let input = "Intro\n---\nnot yaml\n---\n";
        assert_eq!(strip_front_matter(input), input);
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_collapse_blank_lines_ignores_fenced_code() {
        let page = "Intro\n\n\n\n\n```python\ndef a():\n    pass\n\n\n\n\ndef b():\n    pass\n```\n\n\n\n\nAfter\n";
        let out = collapse_blank_lines(page);
        assert!(out.contains("    pass\n\n\n\n\ndef b():"));
        assert!(out.starts_with("Intro\n\n\n```python"));
        assert!(out.ends_with("```\n\n\nAfter\n"));
    }

    #[test]
    fn test_collapse_blank_lines_tilde_fence_and_longer_closer() {
        let page = "~~~~\na\n\n\n\nb\n~~~\n\n\n\n\nstill code\n~~~~~\n\n\n\n\nz";
        let out = collapse_blank_lines(page);
        // A shorter closing run does not end a four-tilde fence.
        assert!(out.contains("b\n~~~\n\n\n\n\nstill code"));
        assert!(out.ends_with("~~~~~\n\n\nz"));
    }

    #[test]
    fn test_normalize_page_keeps_code_verbatim() {
        let code = "```python\nimport os\n\n\n\n\nprint(os.getcwd())\n```";
        let page = normalize_page(&format!("# Title\n\nText\n\n{code}\n"));
        assert!(page.contains(code));
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("hello"), "hello\n");
        assert_eq!(ensure_final_newline("hello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn test_bom_does_not_hide_title() {
        let page = normalize_page("\u{FEFF}# A\r\nIntro text\r\n");
        let (rest, dropped) = strip_leading_title(&page);
        assert!(dropped);
        assert_eq!(rest, "Intro text\n");
    }

    #[test]
    fn test_strip_leading_title_keeps_subheadings() {
        let (rest, dropped) = strip_leading_title("## Scope\nText\n");
        assert!(!dropped);
        assert_eq!(rest, "## Scope\nText\n");
    }

    #[test]
    fn test_strip_leading_title_single_line() {
        assert_eq!(strip_leading_title("# Only a title"), ("", true));
    }

    #[test]
    fn test_strip_leading_title_trims_blank_lines() {
        assert_eq!(strip_leading_title("# B\n\n\nDetails\n"), ("Details\n", true));
    }
}
