//! Fixed style sheet and font discovery for the in-process renderer.
//!
//! The native renderer is a fallback, so the look is deliberately plain: A4,
//! 15 mm margins, a grey running header, a right-aligned `Page N of M`
//! footer, dark slate headings and framed tables.

use crate::error::RenderError;
use genpdf::fonts::{FontData, FontFamily};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directories searched when no explicit font directory is configured.
pub const DEFAULT_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/liberation2",
    "/usr/share/fonts/liberation",
    "/usr/share/fonts/liberation-sans",
    "/usr/share/fonts/liberation-mono",
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/dejavu",
    "/usr/share/fonts/dejavu-sans-fonts",
    "/usr/share/fonts/dejavu-sans-mono-fonts",
    "/usr/share/fonts/TTF",
    "/usr/local/share/fonts",
    "/Library/Fonts",
    "C:\\Windows\\Fonts",
];

/// File-name suffixes tried for each face, in order.
///
/// Covers `Name-Regular.ttf` / `-Italic` (Liberation) as well as the bare
/// `Name.ttf` / `-Oblique` / `-BoldOblique` (DejaVu).
const REGULAR_SUFFIXES: &[&str] = &["-Regular", "", "-Book", "-Roman"];
const BOLD_SUFFIXES: &[&str] = &["-Bold"];
const ITALIC_SUFFIXES: &[&str] = &["-Italic", "-Oblique"];
const BOLD_ITALIC_SUFFIXES: &[&str] = &["-BoldItalic", "-BoldOblique"];

/// An RGB colour.
pub type Rgb = (u8, u8, u8);

/// Which TrueType families to load and where to look for them.
///
/// Each family is tried in order; the first one with all four faces
/// (regular, bold, italic, bold italic) in a single search directory wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontSpec {
    /// Explicit directory; `None` searches [`DEFAULT_FONT_DIRS`].
    pub dir: Option<PathBuf>,
    /// Body families in order of preference.
    pub body_families: Vec<String>,
    /// Monospace families for code, in order of preference. Code falls back to
    /// the body family when none is found.
    pub code_families: Vec<String>,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            dir: None,
            body_families: vec!["LiberationSans".to_string(), "DejaVuSans".to_string()],
            code_families: vec!["LiberationMono".to_string(), "DejaVuSansMono".to_string()],
        }
    }
}

/// Loaded font families, ready to hand to `genpdf`.
#[derive(Clone)]
pub struct LoadedFonts {
    pub body: FontFamily<FontData>,
    pub code: Option<FontFamily<FontData>>,
}

impl FontSpec {
    /// The directories that will be searched, in order.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        match &self.dir {
            Some(dir) => vec![dir.clone()],
            None => DEFAULT_FONT_DIRS.iter().map(PathBuf::from).collect(),
        }
    }

    /// The four face files of `family` in the first search directory that
    /// holds all of them.
    pub fn locate(&self, family: &str) -> Option<FontFamily<PathBuf>> {
        self.search_dirs()
            .iter()
            .find_map(|dir| family_files(dir, family))
    }

    /// Load the first available body family and, when available, a code
    /// family.
    ///
    /// No body family is an error; no code family only logs and code blocks
    /// use the body family instead.
    pub fn load(&self) -> Result<LoadedFonts, RenderError> {
        let body = self.load_first(&self.body_families)?;
        let code = if self.code_families.is_empty() {
            None
        } else {
            match self.load_first(&self.code_families) {
                Ok(f) => Some(f),
                Err(e) => {
                    debug!("code font unavailable, using body font: {}", e);
                    None
                }
            }
        };
        Ok(LoadedFonts { body, code })
    }

    fn load_first(&self, families: &[String]) -> Result<FontFamily<FontData>, RenderError> {
        let mut failures = Vec::new();
        for family in families {
            let Some(files) = self.locate(family) else {
                continue;
            };
            debug!("loading font family {} from {}", family, files.regular.display());
            match load_family(&files) {
                Ok(loaded) => return Ok(loaded),
                Err(e) => failures.push(format!("{family}: {e}")),
            }
        }

        let mut searched = self
            .search_dirs()
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        if !failures.is_empty() {
            searched = format!("{searched} ({})", failures.join("; "));
        }
        Err(RenderError::FontsUnavailable {
            family: families.join(" | "),
            searched,
        })
    }
}

fn face_file(dir: &Path, family: &str, suffixes: &[&str]) -> Option<PathBuf> {
    suffixes
        .iter()
        .map(|suffix| dir.join(format!("{family}{suffix}.ttf")))
        .find(|path| path.is_file())
}

fn family_files(dir: &Path, family: &str) -> Option<FontFamily<PathBuf>> {
    Some(FontFamily {
        regular: face_file(dir, family, REGULAR_SUFFIXES)?,
        bold: face_file(dir, family, BOLD_SUFFIXES)?,
        italic: face_file(dir, family, ITALIC_SUFFIXES)?,
        bold_italic: face_file(dir, family, BOLD_ITALIC_SUFFIXES)?,
    })
}

fn load_family(files: &FontFamily<PathBuf>) -> Result<FontFamily<FontData>, genpdf::error::Error> {
    Ok(FontFamily {
        regular: FontData::load(&files.regular, None)?,
        bold: FontData::load(&files.bold, None)?,
        italic: FontData::load(&files.italic, None)?,
        bold_italic: FontData::load(&files.bold_italic, None)?,
    })
}

/// Page geometry, typography and colours of the native renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleSheet {
    pub paper_width_mm: f64,
    pub paper_height_mm: f64,
    pub margin_mm: f64,
    /// Running header printed at the top of every page.
    pub header_text: String,
    pub body_font_size: u8,
    pub code_font_size: u8,
    pub table_font_size: u8,
    pub header_font_size: u8,
    pub footer_font_size: u8,
    /// Sizes of heading levels 1 to 6.
    pub heading_sizes: [u8; 6],
    pub line_spacing: f64,
    pub heading_color: Rgb,
    pub text_color: Rgb,
    pub muted_color: Rgb,
    pub link_color: Rgb,
    pub code_color: Rgb,
    pub fonts: FontSpec,
}

impl Default for StyleSheet {
    fn default() -> Self {
        Self {
            paper_width_mm: 210.0,
            paper_height_mm: 297.0,
            margin_mm: 15.0,
            header_text: "Golden Kubestronaut Learning".to_string(),
            body_font_size: 11,
            code_font_size: 9,
            table_font_size: 10,
            header_font_size: 10,
            footer_font_size: 9,
            heading_sizes: [20, 16, 14, 12, 11, 11],
            line_spacing: 1.25,
            heading_color: (44, 62, 80),
            text_color: (51, 51, 51),
            muted_color: (102, 102, 102),
            link_color: (0, 123, 255),
            code_color: (199, 37, 78),
            fonts: FontSpec::default(),
        }
    }
}

impl StyleSheet {
    pub fn heading_size(&self, level: u8) -> u8 {
        let idx = usize::from(level.clamp(1, 6)) - 1;
        self.heading_sizes[idx]
    }

    /// Footer text for one page.
    pub fn footer_text(page: usize, total: Option<usize>) -> String {
        match total {
            Some(total) => format!("Page {page} of {total}"),
            None => format!("Page {page}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_size_clamps_level() {
        let s = StyleSheet::default();
        assert_eq!(s.heading_size(1), 20);
        assert_eq!(s.heading_size(2), 16);
        assert_eq!(s.heading_size(0), 20);
        assert_eq!(s.heading_size(9), 11);
    }

    #[test]
    fn footer_text_with_and_without_total() {
        assert_eq!(StyleSheet::footer_text(3, Some(12)), "Page 3 of 12");
        assert_eq!(StyleSheet::footer_text(3, None), "Page 3");
    }

    #[test]
    fn explicit_dir_is_the_only_search_dir() {
        let spec = FontSpec {
            dir: Some(PathBuf::from("/opt/fonts")),
            ..FontSpec::default()
        };
        assert_eq!(spec.search_dirs(), vec![PathBuf::from("/opt/fonts")]);
    }

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), b"not a font file!").unwrap();
        }
    }

    fn spec_in(dir: &Path) -> FontSpec {
        FontSpec {
            dir: Some(dir.to_path_buf()),
            ..FontSpec::default()
        }
    }

    #[test]
    fn locate_requires_all_four_faces() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &["Demo-Regular.ttf", "Demo-Bold.ttf", "Demo-Italic.ttf"]);
        let spec = spec_in(dir.path());
        assert!(spec.locate("Demo").is_none());

        touch(dir.path(), &["Demo-BoldItalic.ttf"]);
        let files = spec.locate("Demo").unwrap();
        assert_eq!(files.regular, dir.path().join("Demo-Regular.ttf"));
        assert_eq!(files.bold_italic, dir.path().join("Demo-BoldItalic.ttf"));
    }

    #[test]
    fn locate_accepts_bare_regular_and_oblique_faces() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &[
                "DejaVuSans.ttf",
                "DejaVuSans-Bold.ttf",
                "DejaVuSans-Oblique.ttf",
                "DejaVuSans-BoldOblique.ttf",
            ],
        );
        let files = spec_in(dir.path()).locate("DejaVuSans").unwrap();
        assert_eq!(files.regular, dir.path().join("DejaVuSans.ttf"));
        assert_eq!(files.italic, dir.path().join("DejaVuSans-Oblique.ttf"));
        assert_eq!(files.bold_italic, dir.path().join("DejaVuSans-BoldOblique.ttf"));
    }

    #[test]
    fn missing_body_family_is_fonts_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        match spec_in(dir.path()).load() {
            Err(RenderError::FontsUnavailable { family, .. }) => {
                assert_eq!(family, "LiberationSans | DejaVuSans")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected missing fonts"),
        }
    }

    #[test]
    fn unreadable_face_is_reported_not_panicked() {
        let dir = tempfile::tempdir().unwrap();
        touch(
            dir.path(),
            &["Demo.ttf", "Demo-Bold.ttf", "Demo-Oblique.ttf", "Demo-BoldOblique.ttf"],
        );
        let spec = FontSpec {
            body_families: vec!["Demo".into()],
            code_families: Vec::new(),
            ..spec_in(dir.path())
        };
        match spec.load() {
            Err(RenderError::FontsUnavailable { searched, .. }) => assert!(searched.contains("Demo:")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("empty files are not fonts"),
        }
    }

    #[test]
    fn default_search_finds_an_installed_family() {
        // Needs Liberation or DejaVu in one of DEFAULT_FONT_DIRS.
        let fonts = FontSpec::default().load().unwrap();
        assert!(fonts.code.is_some());
    }
}
