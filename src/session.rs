use anyhow::Result;
use serde::Serialize;

use crate::buffer::{Item, ScreenBuffer, Segment};
use crate::config::{Color, RenderConfig};
use crate::exec::{expand_tabs, sanitize_output};
use crate::frames::FrameSink;
use crate::render::FrameRenderer;
use crate::script::ScriptEntry;
use crate::text::wrap_words;
use crate::typing::{cps_for_speed, TypingClock};

/// Commands that wipe the terminal instead of producing output.
const SCREEN_CLEARING_COMMANDS: [&str; 2] = ["clear", "reset"];

/// One script entry paired with its pre-collected command output
/// (empty for comments).
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedStep {
    pub entry: ScriptEntry,
    pub output: String,
}

impl ScriptedStep {
    pub fn new(entry: ScriptEntry, output: impl Into<String>) -> Self {
        Self {
            entry,
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderStats {
    pub frames: u32,
    pub frame_rate: u32,
    pub cps: f32,
    pub evictions: u32,
    pub duration_seconds: f32,
}

/// Walks the script and turns it into the ordered frame sequence:
/// pre-delay, typing runs, output holds, and scroll redraws. Owns all
/// mutable render state (screen buffer, canvas, frame counter via the
/// sink) on a single call stack.
pub struct SessionDriver<'a> {
    renderer: FrameRenderer,
    sink: &'a mut dyn FrameSink,
    buffer: ScreenBuffer,
    cps: f32,
    evictions: u32,
}

impl<'a> SessionDriver<'a> {
    pub fn new(renderer: FrameRenderer, sink: &'a mut dyn FrameSink) -> Self {
        let config = renderer.config();
        let cps = cps_for_speed(config.typing_speed, config.min_cps, config.max_cps());
        let buffer = ScreenBuffer::new(config.visible_height());
        Self {
            renderer,
            sink,
            buffer,
            cps,
            evictions: 0,
        }
    }

    pub fn cps(&self) -> f32 {
        self.cps
    }

    pub fn run(mut self, steps: &[ScriptedStep]) -> Result<RenderStats> {
        let pre_frames = self.config().pre_delay_frames();
        eprintln!("generating {pre_frames} pre-simulation frames");
        self.emit_static_frames(pre_frames)?;

        for step in steps {
            match &step.entry {
                ScriptEntry::Comment(text) => {
                    eprintln!("rendering comment: {text}");
                    self.process_comment(text)?;
                }
                ScriptEntry::Command(command)
                    if SCREEN_CLEARING_COMMANDS.contains(&command.as_str()) =>
                {
                    eprintln!("rendering command: {command}");
                    self.process_screen_clear(command)?;
                }
                ScriptEntry::Command(command) => {
                    eprintln!("rendering command: {command}");
                    self.process_command(command, &step.output)?;
                }
            }
        }

        let frames = self.sink.frames_written();
        let frame_rate = self.config().frame_rate;
        Ok(RenderStats {
            frames,
            frame_rate,
            cps: self.cps,
            evictions: self.evictions,
            duration_seconds: frames as f32 / frame_rate as f32,
        })
    }

    fn config(&self) -> &RenderConfig {
        self.renderer.config()
    }

    fn emit_frame(&mut self) -> Result<()> {
        self.sink.write_frame(self.renderer.canvas())
    }

    fn emit_static_frames(&mut self, count: u32) -> Result<()> {
        for _ in 0..count {
            self.emit_frame()?;
        }
        Ok(())
    }

    /// Evicts oldest-first until `item_height` fits, emitting exactly one
    /// full-buffer redraw frame per eviction.
    fn scroll_until_fits(&mut self, item_height: u32) -> Result<()> {
        while !self.buffer.fits(item_height) {
            if self.buffer.evict_oldest().is_none() {
                // Taller than the whole viewport; render it anyway.
                break;
            }
            self.evictions += 1;
            self.renderer.redraw(&self.buffer);
            self.emit_frame()?;
        }
        Ok(())
    }

    /// Scrolls and returns the row an item of `item_height` will occupy,
    /// without inserting it yet. Commands type first and insert after;
    /// nothing else can move the buffer in between.
    fn reserve_row(&mut self, item_height: u32) -> Result<u32> {
        self.scroll_until_fits(item_height)?;
        Ok(self.config().content_top() + self.buffer.total_height())
    }

    /// Scrolls, appends, and returns the row the item now occupies.
    fn insert_item(&mut self, item: Item) -> Result<u32> {
        let top = self.reserve_row(item.height())?;
        self.buffer.push(item);
        Ok(top)
    }

    /// Types a run character-by-character: one frame per tick, emitted
    /// after the characters due that tick are drawn, so the final
    /// character is visible in the last typed frame.
    fn type_text(&mut self, x: f32, top: u32, text: &str, size: f32, color: Color) -> Result<()> {
        let chars = text.chars().collect::<Vec<_>>();
        if chars.is_empty() {
            return Ok(());
        }
        let mut clock = TypingClock::new(self.cps, self.config().frame_rate);
        let mut cursor = x;
        let mut drawn = 0;
        while drawn < chars.len() {
            for _ in 0..clock.advance_tick() {
                if drawn == chars.len() {
                    break;
                }
                cursor += self
                    .renderer
                    .draw_char_at(cursor, top as f32, chars[drawn], size, color);
                drawn += 1;
            }
            self.emit_frame()?;
        }
        Ok(())
    }

    /// Prompt drawn instantly (one frame), command text typed, completed
    /// line inserted afterwards: check-then-type-then-insert.
    fn type_prompted_line(&mut self, text: &str) -> Result<()> {
        let font_size = self.config().font_size;
        let font_color = self.config().font_color;
        let prompt_color = self.config().prompt_color;
        let line_height = self.config().line_height();
        let margin = self.config().margin as f32;
        let prompt = self.config().prompt.clone();

        let top = self.reserve_row(line_height)?;
        let prompt_advance =
            self.renderer
                .draw_text_at(margin, top as f32, &prompt, font_size, prompt_color);
        self.emit_frame()?;

        self.type_text(margin + prompt_advance, top, text, font_size, font_color)?;
        self.buffer.push(Item::line(
            vec![
                Segment::new(prompt, prompt_color),
                Segment::new(text, font_color),
            ],
            line_height,
        ));
        Ok(())
    }

    fn process_comment(&mut self, text: &str) -> Result<()> {
        let line_height = self.config().line_height();
        let font_color = self.config().font_color;
        self.insert_item(Item::blank(font_color, line_height))?;

        let comment_size = self.config().comment_font_size;
        let padding = self.config().card_padding;
        let card_width = self.config().card_width();
        let max_text_width = (card_width - 2 * padding) as f32;
        let lines = wrap_words(text, &self.renderer.face().sized(comment_size), max_text_width);

        if !lines.is_empty() {
            let comment_line_height = self.config().comment_line_height();
            let comment_color = self.config().comment_text_color;
            let radius = self.config().card_radius;
            let background = self.config().card_bg_color;
            let card_height = 2 * padding + lines.len() as u32 * comment_line_height;

            let card = Item::comment_card(
                lines
                    .iter()
                    .map(|line| Segment::new(line.clone(), comment_color))
                    .collect(),
                card_width,
                padding,
                radius,
                background,
                comment_line_height,
            );
            let top = self.insert_item(card)?;

            // Panel appears fully formed in its own frame, then the text
            // types into it.
            self.renderer
                .draw_card_panel(top, card_width, card_height, radius, background);
            self.emit_frame()?;

            let text_x = (self.config().margin + padding) as f32;
            let mut line_top = top + padding;
            for line in &lines {
                self.type_text(text_x, line_top, line, comment_size, comment_color)?;
                line_top += comment_line_height;
            }

            let delay_frames = self.config().output_delay_frames();
            self.emit_static_frames(delay_frames)?;
        }

        self.insert_item(Item::blank(font_color, line_height))?;
        Ok(())
    }

    fn process_command(&mut self, command: &str, output: &str) -> Result<()> {
        let font_size = self.config().font_size;
        let font_color = self.config().font_color;
        let line_height = self.config().line_height();
        let margin = self.config().margin as f32;

        let prompt_width = self.renderer.measure(&self.config().prompt, font_size);
        let command_width = (self.config().card_width() as f32 - prompt_width).max(0.0);
        let wrapped = wrap_words(
            command,
            &self.renderer.face().sized(font_size),
            command_width,
        );
        let (first, rest) = match wrapped.split_first() {
            Some((first, rest)) => (first.clone(), rest.to_vec()),
            None => (String::new(), Vec::new()),
        };

        self.type_prompted_line(&first)?;
        for line in rest {
            let top = self.reserve_row(line_height)?;
            self.type_text(margin, top, &line, font_size, font_color)?;
            self.buffer.push(Item::line(
                vec![Segment::new(line, font_color)],
                line_height,
            ));
        }

        let delay_frames = self.config().output_delay_frames();
        self.emit_static_frames(delay_frames)?;

        // Output lines appear fully formed, one frame each. No output, no
        // frames beyond the delay.
        let sanitized = sanitize_output(output);
        for raw_line in sanitized.lines() {
            let line = expand_tabs(raw_line);
            let top = self.reserve_row(line_height)?;
            self.renderer
                .draw_text_at(margin, top as f32, &line, font_size, font_color);
            self.buffer.push(Item::line(
                vec![Segment::new(line, font_color)],
                line_height,
            ));
            self.emit_frame()?;
        }
        Ok(())
    }

    /// `clear`/`reset`: typed like any command, then the buffer empties
    /// and a single chrome-only frame shows the wiped terminal.
    fn process_screen_clear(&mut self, command: &str) -> Result<()> {
        self.type_prompted_line(command)?;

        let delay_frames = self.config().output_delay_frames();
        self.emit_static_frames(delay_frames)?;

        self.buffer.clear();
        self.renderer.reset_canvas();
        self.emit_frame()?;
        Ok(())
    }

    #[cfg(test)]
    fn buffer(&self) -> &ScreenBuffer {
        &self.buffer
    }

    #[cfg(test)]
    fn frames_emitted(&self) -> u32 {
        self.sink.frames_written()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontFace;
    use crate::typing::TypingClock;
    use tiny_skia::Pixmap;

    struct CountingSink {
        frames: u32,
    }

    impl CountingSink {
        fn new() -> Self {
            Self { frames: 0 }
        }
    }

    impl FrameSink for CountingSink {
        fn write_frame(&mut self, _pixmap: &Pixmap) -> Result<()> {
            self.frames += 1;
            Ok(())
        }

        fn frames_written(&self) -> u32 {
            self.frames
        }
    }

    fn resolve_face() -> Option<FontFace> {
        let config = RenderConfig::default();
        match FontFace::resolve(&config.font_families) {
            Ok(face) => Some(face),
            Err(_) => {
                eprintln!("skipping: no system font available");
                None
            }
        }
    }

    fn driver_with<'a>(
        config: RenderConfig,
        face: FontFace,
        sink: &'a mut CountingSink,
    ) -> SessionDriver<'a> {
        let renderer = FrameRenderer::new(config, face).expect("renderer builds");
        SessionDriver::new(renderer, sink)
    }

    #[test]
    fn echo_hi_produces_the_predicted_frame_total() {
        let Some(face) = resolve_face() else { return };
        let mut config = RenderConfig::default();
        config.typing_speed = 10.0;
        config.frame_rate = 10;
        config.pre_delay = 2.0;
        config.output_delay = 2.0;

        let mut sink = CountingSink::new();
        let driver = driver_with(config, face, &mut sink);
        assert_eq!(driver.cps(), 10.0);

        let steps = [ScriptedStep::new(
            ScriptEntry::Command("echo hi".to_owned()),
            "hi\n",
        )];
        let stats = driver.run(&steps).expect("session runs");

        // pre(20) + prompt(1) + typed ceil(7*10/10)=7 + delay(20) + output line(1)
        assert_eq!(stats.frames, 20 + 1 + 7 + 20 + 1);
        assert_eq!(stats.evictions, 0);
    }

    #[test]
    fn empty_output_emits_no_frames_beyond_the_delay() {
        let Some(face) = resolve_face() else { return };
        let mut config = RenderConfig::default();
        config.typing_speed = 10.0;
        config.frame_rate = 10;
        config.pre_delay = 0.0;
        config.output_delay = 1.0;

        let mut sink = CountingSink::new();
        let driver = driver_with(config, face, &mut sink);
        let steps = [ScriptedStep::new(ScriptEntry::Command("true".to_owned()), "")];
        let stats = driver.run(&steps).expect("session runs");

        // prompt(1) + typed ceil(4*10/10)=4 + delay(10), nothing after
        assert_eq!(stats.frames, 1 + 4 + 10);
    }

    #[test]
    fn comment_wrapping_to_two_lines_builds_the_expected_card() {
        let Some(face) = resolve_face() else { return };
        let mut config = RenderConfig::default();
        config.pre_delay = 0.0;
        config.output_delay = 0.0;
        config.typing_speed = 10.0;

        // Size the frame so "hello world" no longer fits the card text
        // area but "hello" alone does: exactly one wrap point.
        let full = face.text_width("hello world", config.comment_font_size);
        config.width =
            (full - 1.0).ceil() as u32 + 2 * config.card_padding + 2 * config.margin;

        let mut sink = CountingSink::new();
        let mut driver = driver_with(config.clone(), face, &mut sink);
        driver.process_comment("hello world").expect("comment renders");

        let items = driver.buffer().items();
        assert_eq!(items.len(), 3, "spacer, card, spacer");
        match &items[1] {
            Item::CommentCard { lines, height, .. } => {
                assert_eq!(lines.len(), 2);
                assert_eq!(
                    *height,
                    2 * config.comment_line_height() + 2 * config.card_padding
                );
            }
            other => panic!("expected comment card, got {other:?}"),
        }
    }

    #[test]
    fn empty_comment_renders_spacers_but_no_card() {
        let Some(face) = resolve_face() else { return };
        let mut config = RenderConfig::default();
        config.pre_delay = 0.0;
        config.output_delay = 0.0;

        let mut sink = CountingSink::new();
        let mut driver = driver_with(config, face, &mut sink);
        driver.process_comment("").expect("empty comment renders");

        assert_eq!(driver.frames_emitted(), 0);
        let items = driver.buffer().items();
        assert_eq!(items.len(), 2);
        assert!(items
            .iter()
            .all(|item| matches!(item, Item::Line { .. })));
    }

    #[test]
    fn overflowing_output_scrolls_and_drops_the_oldest_line() {
        let Some(face) = resolve_face() else { return };
        let mut config = RenderConfig::default();
        config.typing_speed = 10.0;
        config.frame_rate = 10;
        config.pre_delay = 0.0;
        config.output_delay = 0.0;

        // Enough numbered lines to overflow the 1280px viewport at 34px
        // per line, plus the prompt line itself.
        let output = (0..40)
            .map(|index| format!("line {index}"))
            .collect::<Vec<_>>()
            .join("\n");

        let mut sink = CountingSink::new();
        let mut driver = driver_with(config.clone(), face, &mut sink);
        driver
            .process_command("seq 0 39", &output)
            .expect("command renders");
        assert!(driver.evictions > 0, "expected at least one scroll redraw");

        // Frame accounting: prompt(1) + typed ceil(8*10/10)=8 + one frame
        // per output line + one redraw frame per eviction.
        assert_eq!(driver.frames_emitted(), 1 + 8 + 40 + driver.evictions);

        // The oldest rendered line (the prompt line) has been evicted.
        assert!(driver.buffer().items().iter().all(|item| match item {
            Item::Line { segments, .. } => segments
                .first()
                .map_or(true, |segment| segment.text != config.prompt),
            Item::CommentCard { .. } => true,
        }));
        assert!(driver.buffer().total_height() <= driver.buffer().capacity());
    }

    #[test]
    fn eviction_cost_is_one_frame_each() {
        let Some(face) = resolve_face() else { return };
        let mut config = RenderConfig::default();
        config.typing_speed = 10.0;
        config.frame_rate = 10;
        config.pre_delay = 0.0;
        config.output_delay = 0.0;

        let mut sink = CountingSink::new();
        let mut driver = driver_with(config.clone(), face, &mut sink);

        let line_height = config.line_height();
        let capacity = config.visible_height();
        let fill = capacity / line_height;
        for index in 0..fill {
            driver
                .insert_item(Item::line(
                    vec![Segment::new(index.to_string(), config.font_color)],
                    line_height,
                ))
                .expect("insert");
        }
        assert_eq!(driver.frames_emitted(), 0);

        // Next insert evicts exactly one item and costs exactly one frame.
        driver
            .insert_item(Item::line(
                vec![Segment::new("overflow", config.font_color)],
                line_height,
            ))
            .expect("insert");
        assert_eq!(driver.frames_emitted(), 1);
        assert_eq!(driver.evictions, 1);
        assert!(driver.buffer().total_height() <= driver.buffer().capacity());
    }

    #[test]
    fn screen_clear_empties_the_buffer_and_emits_one_wipe_frame() {
        let Some(face) = resolve_face() else { return };
        let mut config = RenderConfig::default();
        config.typing_speed = 10.0;
        config.frame_rate = 10;
        config.pre_delay = 0.0;
        config.output_delay = 0.0;

        let mut sink = CountingSink::new();
        let driver = driver_with(config, face, &mut sink);
        let steps = [
            ScriptedStep::new(ScriptEntry::Command("echo hi".to_owned()), "hi\n"),
            ScriptedStep::new(ScriptEntry::Command("clear".to_owned()), ""),
        ];
        let stats = driver.run(&steps).expect("session runs");

        // echo: 1 + 7 + 1; clear: 1 + ceil(5*10/10)=5 + wipe frame
        assert_eq!(stats.frames, (1 + 7 + 1) + (1 + 5 + 1));
    }

    #[test]
    fn typed_frames_match_the_clock_for_fractional_rates() {
        let Some(face) = resolve_face() else { return };
        let mut config = RenderConfig::default();
        config.typing_speed = 2.0; // cps = 1 + 9*0.2 = 2.8
        config.frame_rate = 10;
        config.pre_delay = 0.0;
        config.output_delay = 0.0;

        let cps = cps_for_speed(2.0, config.min_cps, config.max_cps());
        let expected_typed = TypingClock::frames_for(cps, 10, "echo hi".chars().count());

        let mut sink = CountingSink::new();
        let driver = driver_with(config, face, &mut sink);
        let steps = [ScriptedStep::new(
            ScriptEntry::Command("echo hi".to_owned()),
            "hi\n",
        )];
        let stats = driver.run(&steps).expect("session runs");
        assert_eq!(stats.frames, 1 + expected_typed + 1);
    }
}
