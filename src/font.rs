use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use fontdue::{Font, FontSettings};

use crate::text::TextMeasure;

/// A parsed font plus where it came from. All measurement and
/// rasterization for one run goes through a single face.
pub struct FontFace {
    font: Font,
    source: PathBuf,
}

impl FontFace {
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read font file {}", path.display()))?;
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|error| anyhow!("failed to parse font {}: {error}", path.display()))?;
        Ok(Self {
            font,
            source: path.to_path_buf(),
        })
    }

    /// Resolves the first family candidate that matches a parseable font
    /// file in the system font directories. No match is fatal: layout
    /// cannot proceed without metrics.
    pub fn resolve(families: &[String]) -> Result<Self> {
        let files = system_font_files();
        for family in families {
            let mut matches = files
                .iter()
                .filter(|path| stem_matches_family(path, family))
                .collect::<Vec<_>>();
            // Shortest stem first, so "Mono-Regular" beats "Mono-BoldItalic".
            matches.sort_by_key(|path| {
                path.file_stem().map_or(usize::MAX, |stem| stem.len())
            });
            for path in matches {
                if let Ok(face) = Self::from_path(path) {
                    return Ok(face);
                }
            }
        }
        bail!(
            "no usable font found for families [{}]; set font_path in the theme file",
            families.join(", ")
        );
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn font(&self) -> &Font {
        &self.font
    }

    pub fn advance(&self, ch: char, size: f32) -> f32 {
        self.font.metrics(ch, size).advance_width
    }

    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars().map(|ch| self.advance(ch, size)).sum()
    }

    pub fn ascent(&self, size: f32) -> f32 {
        self.font
            .horizontal_line_metrics(size)
            .map(|metrics| metrics.ascent)
            .unwrap_or(size * 0.8)
    }

    pub fn visual_height(&self, size: f32) -> f32 {
        self.font
            .horizontal_line_metrics(size)
            .map(|metrics| metrics.ascent - metrics.descent)
            .unwrap_or(size)
    }

    pub fn sized(&self, size: f32) -> SizedFace<'_> {
        SizedFace { face: self, size }
    }
}

/// A face pinned to one pixel size; the measurement oracle handed to the
/// word wrapper.
pub struct SizedFace<'a> {
    face: &'a FontFace,
    size: f32,
}

impl TextMeasure for SizedFace<'_> {
    fn text_width(&self, text: &str) -> f32 {
        self.face.text_width(text, self.size)
    }
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/System/Library/Fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("C:\\Windows\\Fonts"),
    ];
    if let Some(home) = env::var_os("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".fonts"));
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join("Library/Fonts"));
    }
    dirs
}

fn system_font_files() -> Vec<PathBuf> {
    let mut files = Vec::new();
    for dir in system_font_dirs() {
        collect_font_files(&dir, 0, &mut files);
    }
    files
}

fn collect_font_files(dir: &Path, depth: u32, out: &mut Vec<PathBuf>) {
    if depth > 4 {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_font_files(&path, depth + 1, out);
            continue;
        }
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if matches!(extension.as_str(), "ttf" | "otf") {
            out.push(path);
        }
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

fn stem_matches_family(path: &Path, family: &str) -> bool {
    let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
        return false;
    };
    let stem = normalize(stem);
    let family = normalize(family);
    if family.is_empty() {
        return false;
    }
    stem == family || stem.starts_with(&family)
}
