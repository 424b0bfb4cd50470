use std::collections::HashMap;

use anyhow::{anyhow, Result};
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Rect, Transform};

use crate::buffer::{Item, ScreenBuffer};
use crate::config::{Color, RenderConfig};
use crate::font::FontFace;

// Cubic control-point offset factor for a quarter-circle arc.
const KAPPA: f32 = 0.552_284_8;

struct RasterGlyph {
    metrics: fontdue::Metrics,
    coverage: Vec<u8>,
}

/// Rasterizes characters through a per-(char, size) bitmap cache and
/// alpha-blends them into a pixmap. Advances are the same ones the
/// measurement oracle sums, so drawn text always matches measured text.
pub struct GlyphPainter {
    face: FontFace,
    cache: HashMap<(char, u32), RasterGlyph>,
}

impl GlyphPainter {
    pub fn new(face: FontFace) -> Self {
        Self {
            face,
            cache: HashMap::new(),
        }
    }

    pub fn face(&self) -> &FontFace {
        &self.face
    }

    /// Draws one character at `x` on the given baseline; returns its advance.
    pub fn draw_char(
        &mut self,
        pixmap: &mut Pixmap,
        x: f32,
        baseline: f32,
        ch: char,
        size: f32,
        color: [u8; 4],
    ) -> f32 {
        let Self { face, cache } = self;
        let glyph = cache.entry((ch, size.to_bits())).or_insert_with(|| {
            let (metrics, coverage) = face.font().rasterize(ch, size);
            RasterGlyph { metrics, coverage }
        });

        let left = (x + glyph.metrics.xmin as f32).round() as i32;
        let top = (baseline - (glyph.metrics.ymin + glyph.metrics.height as i32) as f32).round()
            as i32;
        blend_glyph(
            pixmap,
            left,
            top,
            glyph.metrics.width,
            glyph.metrics.height,
            &glyph.coverage,
            color,
        );
        glyph.metrics.advance_width
    }
}

fn blend_glyph(
    pixmap: &mut Pixmap,
    x: i32,
    y: i32,
    width: usize,
    height: usize,
    coverage: &[u8],
    color: [u8; 4],
) {
    let frame_width = pixmap.width();
    let frame_height = pixmap.height();
    let data = pixmap.data_mut();

    for row in 0..height {
        let py = y + row as i32;
        if py < 0 || py >= frame_height as i32 {
            continue;
        }
        for col in 0..width {
            let px = x + col as i32;
            if px < 0 || px >= frame_width as i32 {
                continue;
            }
            let mask = coverage[row * width + col];
            if mask == 0 {
                continue;
            }
            let alpha = ((u16::from(mask) * u16::from(color[3])) / 255) as u8;
            let idx = ((py as u32 * frame_width + px as u32) * 4) as usize;
            blend_pixel(data, idx, [color[0], color[1], color[2], alpha]);
        }
    }
}

fn blend_pixel(data: &mut [u8], idx: usize, src: [u8; 4]) {
    let alpha = u16::from(src[3]);
    if alpha == 0 {
        return;
    }
    let inv_alpha = 255_u16.saturating_sub(alpha);
    for channel in 0..3 {
        let dst = u16::from(data[idx + channel]);
        let src_c = u16::from(src[channel]);
        data[idx + channel] = ((src_c * alpha + dst * inv_alpha + 127) / 255) as u8;
    }
    data[idx + 3] = 255;
}

/// Owns the drawing surface for one run: background + header/footer chrome,
/// incremental typing updates, and full-buffer redraws. Both drawing paths
/// share the same primitives, so a redraw of a buffer matching what
/// incremental drawing produced yields identical pixels.
pub struct FrameRenderer {
    config: RenderConfig,
    painter: GlyphPainter,
    canvas: Pixmap,
}

impl FrameRenderer {
    pub fn new(config: RenderConfig, face: FontFace) -> Result<Self> {
        let canvas = Pixmap::new(config.width, config.height)
            .ok_or_else(|| anyhow!("failed to allocate {}x{} canvas", config.width, config.height))?;
        let mut renderer = Self {
            config,
            painter: GlyphPainter::new(face),
            canvas,
        };
        renderer.reset_canvas();
        Ok(renderer)
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// The canvas stays fully opaque, so its premultiplied bytes are plain
    /// RGBA and can be handed to the frame store as-is.
    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    pub fn face(&self) -> &FontFace {
        self.painter.face()
    }

    pub fn measure(&self, text: &str, size: f32) -> f32 {
        self.painter.face().text_width(text, size)
    }

    /// Background fill plus chrome; the starting state of every canvas.
    pub fn reset_canvas(&mut self) {
        self.canvas.fill(self.config.background_color.to_skia());
        self.draw_chrome();
    }

    fn draw_chrome(&mut self) {
        let width = self.config.width as f32;
        let height = self.config.height as f32;

        self.fill_rect(0.0, 0.0, width, self.config.header_height as f32, self.config.header_bg_color);
        self.fill_rect(
            0.0,
            height - self.config.footer_height as f32,
            width,
            self.config.footer_height as f32,
            self.config.footer_bg_color,
        );

        let header_text = self.config.header_text.clone();
        let header_size = self.config.header_font_size;
        let text_width = self.measure(&header_text, header_size);
        let text_height = self.face().visual_height(header_size);
        let x = (width - text_width) / 2.0;
        let y = (self.config.header_height as f32 - text_height) / 2.0;
        self.draw_text_at(x, y, &header_text, header_size, self.config.font_color);

        let footer_text = self.config.footer_text.clone();
        let footer_size = self.config.footer_font_size;
        let text_width = self.measure(&footer_text, footer_size);
        let text_height = self.face().visual_height(footer_size);
        let x = (width - text_width) / 2.0;
        let y = height - self.config.footer_height as f32
            + (self.config.footer_height as f32 - text_height) / 2.0;
        self.draw_text_at(x, y, &footer_text, footer_size, self.config.font_color);
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        let Some(rect) = Rect::from_xywh(x, y, w, h) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(color.to_skia());
        self.canvas
            .fill_rect(rect, &paint, Transform::identity(), None);
    }

    /// Draws a run with its top edge at `top`; returns the total advance.
    pub fn draw_text_at(&mut self, x: f32, top: f32, text: &str, size: f32, color: Color) -> f32 {
        let baseline = top + self.painter.face().ascent(size);
        let rgba = color.rgba8();
        let mut cursor = x;
        for ch in text.chars() {
            cursor += self
                .painter
                .draw_char(&mut self.canvas, cursor, baseline, ch, size, rgba);
        }
        cursor - x
    }

    /// Draws a single character with its line top at `top`; returns the advance.
    pub fn draw_char_at(&mut self, x: f32, top: f32, ch: char, size: f32, color: Color) -> f32 {
        let baseline = top + self.painter.face().ascent(size);
        self.painter
            .draw_char(&mut self.canvas, x, baseline, ch, size, color.rgba8())
    }

    /// Rounded panel for a comment card, anchored at the left margin.
    pub fn draw_card_panel(&mut self, top: u32, width: u32, height: u32, radius: f32, background: Color) {
        let Some(path) = rounded_rect_path(
            self.config.margin as f32,
            top as f32,
            width as f32,
            height as f32,
            radius,
        ) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(background.to_skia());
        paint.anti_alias = true;
        self.canvas
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    /// Draws one buffer item fully formed, with its top edge at `top`.
    pub fn draw_item_at(&mut self, top: u32, item: &Item) {
        match item {
            Item::Line { segments, .. } => {
                let mut x = self.config.margin as f32;
                for segment in segments {
                    x += self.draw_text_at(
                        x,
                        top as f32,
                        &segment.text,
                        self.config.font_size,
                        segment.color,
                    );
                }
            }
            Item::CommentCard {
                lines,
                width,
                height,
                padding,
                radius,
                background,
            } => {
                self.draw_card_panel(top, *width, *height, *radius, *background);
                let x = (self.config.margin + padding) as f32;
                let mut line_top = top + padding;
                for line in lines {
                    self.draw_text_at(
                        x,
                        line_top as f32,
                        &line.text,
                        self.config.comment_font_size,
                        line.color,
                    );
                    line_top += self.config.comment_line_height();
                }
            }
        }
    }

    /// Full-buffer redraw: fresh canvas, chrome, then every remaining item
    /// top-to-bottom from the content-area top. Idempotent for an
    /// unchanged buffer.
    pub fn redraw(&mut self, buffer: &ScreenBuffer) {
        self.reset_canvas();
        let mut y = self.config.content_top();
        for item in buffer.items() {
            self.draw_item_at(y, item);
            y += item.height();
        }
    }
}

fn rounded_rect_path(x: f32, y: f32, w: f32, h: f32, radius: f32) -> Option<Path> {
    let r = radius.clamp(0.0, (w / 2.0).min(h / 2.0));
    if r <= 0.0 {
        return Some(PathBuilder::from_rect(Rect::from_xywh(x, y, w, h)?));
    }
    let k = r * KAPPA;
    let (right, bottom) = (x + w, y + h);

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(right - r, y);
    pb.cubic_to(right - r + k, y, right, y + r - k, right, y + r);
    pb.line_to(right, bottom - r);
    pb.cubic_to(right, bottom - r + k, right - r + k, bottom, right - r, bottom);
    pb.line_to(x + r, bottom);
    pb.cubic_to(x + r - k, bottom, x, bottom - r + k, x, bottom - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
}
