use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::{de::Error as DeError, Deserialize, Deserializer};

/// Extra vertical space added to a font size to produce a line height.
pub const LINE_SPACING: u32 = 10;

/// Opaque RGB color, written in theme files as `#RRGGBB` or `#RGB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let expanded = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => digits.to_owned(),
            other => bail!("hex color must have 3 or 6 digits, got {other} in '{hex}'"),
        };
        let parse = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&expanded[range], 16)
                .map_err(|_| anyhow!("invalid hex color '{hex}'"))
        };
        Ok(Self {
            r: parse(0..2)?,
            g: parse(2..4)?,
            b: parse(4..6)?,
        })
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, 255)
    }

    pub fn rgba8(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(D::Error::custom)
    }
}

/// Immutable per-run rendering configuration. Built once (theme file plus CLI
/// overrides), validated, then passed by reference through every component.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,

    pub font_size: f32,
    pub comment_font_size: f32,
    pub header_font_size: f32,
    pub footer_font_size: f32,
    /// Candidate font families, tried in order against the system font dirs.
    pub font_families: Vec<String>,
    /// Explicit font file, bypassing family resolution.
    pub font_path: Option<PathBuf>,

    pub font_color: Color,
    pub background_color: Color,
    pub prompt_color: Color,
    pub header_bg_color: Color,
    pub footer_bg_color: Color,
    pub card_bg_color: Color,
    pub comment_text_color: Color,

    pub header_text: String,
    pub footer_text: String,
    pub prompt: String,

    pub header_height: u32,
    pub header_buffer: u32,
    pub footer_height: u32,
    pub footer_buffer: u32,
    pub margin: u32,
    pub card_padding: u32,
    pub card_radius: f32,

    pub pre_delay: f32,
    pub output_delay: f32,
    pub frame_rate: u32,
    pub typing_speed: f32,
    pub min_cps: f32,

    pub output: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            font_size: 24.0,
            comment_font_size: 28.0,
            header_font_size: 36.0,
            footer_font_size: 24.0,
            font_families: default_font_families(),
            font_path: None,
            font_color: Color { r: 0xFF, g: 0xFF, b: 0xFF },
            background_color: Color { r: 0x00, g: 0x00, b: 0x00 },
            prompt_color: Color { r: 0x00, g: 0xFF, b: 0x00 },
            header_bg_color: Color { r: 0x32, g: 0x32, b: 0x32 },
            footer_bg_color: Color { r: 0x32, g: 0x32, b: 0x32 },
            card_bg_color: Color { r: 0x00, g: 0x00, b: 0x8B },
            comment_text_color: Color { r: 0xFF, g: 0xFF, b: 0xFF },
            header_text: "Command Line Shorts".to_owned(),
            footer_text: "Powered by termcast".to_owned(),
            prompt: "user@localhost$ ".to_owned(),
            header_height: 200,
            header_buffer: 20,
            footer_height: 400,
            footer_buffer: 20,
            margin: 50,
            card_padding: 20,
            card_radius: 15.0,
            pre_delay: 2.0,
            output_delay: 2.0,
            frame_rate: 10,
            typing_speed: 5.0,
            min_cps: 1.0,
            output: PathBuf::from("command_video.mp4"),
        }
    }
}

fn default_font_families() -> Vec<String> {
    [
        "DejaVu Sans Mono",
        "Liberation Mono",
        "Courier New",
        "Courier",
        "FreeMono",
        "Menlo",
        "Consolas",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

impl RenderConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read theme file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&contents).map_err(|error| {
            let location = error
                .location()
                .map(|location| format!("line {}, column {}", location.line(), location.column()))
                .unwrap_or_else(|| "unknown location".to_owned());
            anyhow!(
                "failed to parse theme yaml in {} at {}: {}",
                path.display(),
                location,
                error
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("video size must be positive, got {}x{}", self.width, self.height);
        }
        if self.frame_rate == 0 {
            bail!("frame rate must be > 0");
        }
        if self.font_size <= 0.0 || self.comment_font_size <= 0.0 {
            bail!("font sizes must be > 0");
        }
        if self.min_cps <= 0.0 {
            bail!("min_cps must be > 0");
        }
        if self.pre_delay < 0.0 || self.output_delay < 0.0 {
            bail!("delays must not be negative");
        }
        let chrome = self.header_height + self.header_buffer + self.footer_height + self.footer_buffer;
        if chrome + self.line_height() > self.height {
            bail!(
                "content area is empty: {}px of chrome leaves no room in a {}px frame",
                chrome,
                self.height
            );
        }
        if self.margin * 2 >= self.width {
            bail!("margin {} leaves no content width in a {}px frame", self.margin, self.width);
        }
        Ok(())
    }

    pub fn line_height(&self) -> u32 {
        self.font_size.round() as u32 + LINE_SPACING
    }

    pub fn comment_line_height(&self) -> u32 {
        self.comment_font_size.round() as u32 + LINE_SPACING
    }

    /// First content row, just under the header band.
    pub fn content_top(&self) -> u32 {
        self.header_height + self.header_buffer
    }

    /// One past the last content row, just above the footer band.
    pub fn content_bottom(&self) -> u32 {
        self.height - self.footer_height - self.footer_buffer
    }

    /// Viewport capacity between header and footer.
    pub fn visible_height(&self) -> u32 {
        self.content_bottom() - self.content_top()
    }

    /// Fastest typing rate: one character per frame at speed 10.
    pub fn max_cps(&self) -> f32 {
        self.frame_rate as f32
    }

    pub fn card_width(&self) -> u32 {
        self.width - 2 * self.margin
    }

    pub fn pre_delay_frames(&self) -> u32 {
        (self.pre_delay * self.frame_rate as f32) as u32
    }

    pub fn output_delay_frames(&self) -> u32 {
        (self.output_delay * self.frame_rate as f32) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse_including_shorthand() {
        assert_eq!(
            Color::from_hex("#00008B").unwrap(),
            Color { r: 0, g: 0, b: 0x8B }
        );
        assert_eq!(
            Color::from_hex("#fff").unwrap(),
            Color { r: 0xFF, g: 0xFF, b: 0xFF }
        );
        assert_eq!(
            Color::from_hex("323232").unwrap(),
            Color { r: 0x32, g: 0x32, b: 0x32 }
        );
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("#gggggg").is_err());
    }

    #[test]
    fn defaults_validate_and_derive_viewport() {
        let config = RenderConfig::default();
        config.validate().expect("defaults should validate");
        assert_eq!(config.content_top(), 220);
        assert_eq!(config.content_bottom(), 1500);
        assert_eq!(config.visible_height(), 1280);
        assert_eq!(config.line_height(), 34);
        assert_eq!(config.comment_line_height(), 38);
        assert_eq!(config.card_width(), 980);
        assert_eq!(config.pre_delay_frames(), 20);
    }

    #[test]
    fn yaml_overrides_merge_over_defaults() {
        let config: RenderConfig = serde_yaml::from_str(
            "frame_rate: 24\nprompt_color: '#0F0'\nheader_text: demo\n",
        )
        .expect("partial theme should parse");
        assert_eq!(config.frame_rate, 24);
        assert_eq!(config.max_cps(), 24.0);
        assert_eq!(config.prompt_color, Color { r: 0, g: 0xFF, b: 0 });
        assert_eq!(config.header_text, "demo");
        assert_eq!(config.width, 1080);
    }

    #[test]
    fn unknown_theme_fields_are_rejected() {
        let result: Result<RenderConfig, _> = serde_yaml::from_str("frame_rte: 24\n");
        assert!(result.is_err());
    }

    #[test]
    fn degenerate_geometry_fails_validation() {
        let mut config = RenderConfig::default();
        config.height = 600;
        assert!(config.validate().is_err());

        let mut config = RenderConfig::default();
        config.frame_rate = 0;
        assert!(config.validate().is_err());
    }
}
