use crate::config::Color;

/// One colored run of text within a line or card.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub color: Color,
}

impl Segment {
    pub fn new(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

/// A unit of screen content. Heights are fixed at creation (wrapping has
/// already happened) and never change once the item enters the buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Line {
        segments: Vec<Segment>,
        height: u32,
    },
    CommentCard {
        lines: Vec<Segment>,
        width: u32,
        height: u32,
        padding: u32,
        radius: f32,
        background: Color,
    },
}

impl Item {
    pub fn line(segments: Vec<Segment>, line_height: u32) -> Self {
        Self::Line {
            segments,
            height: line_height,
        }
    }

    /// A spacer row: one empty segment, standard line height.
    pub fn blank(color: Color, line_height: u32) -> Self {
        Self::line(vec![Segment::new("", color)], line_height)
    }

    pub fn comment_card(
        lines: Vec<Segment>,
        width: u32,
        padding: u32,
        radius: f32,
        background: Color,
        comment_line_height: u32,
    ) -> Self {
        let height = padding * 2 + lines.len() as u32 * comment_line_height;
        Self::CommentCard {
            lines,
            width,
            height,
            padding,
            radius,
            background,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Line { height, .. } => *height,
            Self::CommentCard { height, .. } => *height,
        }
    }
}

/// Ordered sequence of items currently on screen, with a cached running
/// height. The driver keeps `total_height() <= capacity` by evicting from
/// the front before each push; eviction order is strictly FIFO.
#[derive(Debug)]
pub struct ScreenBuffer {
    items: Vec<Item>,
    total_height: u32,
    capacity: u32,
}

impl ScreenBuffer {
    pub fn new(capacity: u32) -> Self {
        Self {
            items: Vec::new(),
            total_height: 0,
            capacity,
        }
    }

    pub fn fits(&self, item_height: u32) -> bool {
        self.total_height + item_height <= self.capacity
    }

    pub fn evict_oldest(&mut self) -> Option<Item> {
        if self.items.is_empty() {
            return None;
        }
        let evicted = self.items.remove(0);
        self.total_height -= evicted.height();
        Some(evicted)
    }

    pub fn push(&mut self, item: Item) {
        self.total_height += item.height();
        self.items.push(item);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.total_height = 0;
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn total_height(&self) -> u32 {
        self.total_height
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white() -> Color {
        Color { r: 255, g: 255, b: 255 }
    }

    fn tagged_line(tag: &str, height: u32) -> Item {
        Item::line(vec![Segment::new(tag, white())], height)
    }

    fn insert_evicting(buffer: &mut ScreenBuffer, item: Item) -> Vec<Item> {
        let mut evicted = Vec::new();
        while !buffer.fits(item.height()) {
            evicted.push(buffer.evict_oldest().expect("eviction on empty buffer"));
        }
        buffer.push(item);
        evicted
    }

    #[test]
    fn running_height_tracks_members() {
        let mut buffer = ScreenBuffer::new(100);
        buffer.push(tagged_line("a", 30));
        buffer.push(Item::comment_card(
            vec![Segment::new("x", white())],
            200,
            10,
            5.0,
            white(),
            20,
        ));
        assert_eq!(buffer.total_height(), 30 + (10 * 2 + 20));
    }

    #[test]
    fn invariant_holds_after_every_insertion() {
        let mut buffer = ScreenBuffer::new(100);
        for (index, height) in [30_u32, 30, 30, 40, 90, 10, 100].into_iter().enumerate() {
            insert_evicting(&mut buffer, tagged_line(&index.to_string(), height));
            assert!(
                buffer.total_height() <= buffer.capacity(),
                "overflow after insertion {index}"
            );
        }
    }

    #[test]
    fn eviction_is_strictly_fifo() {
        let mut buffer = ScreenBuffer::new(120);
        for tag in ["A", "B", "C"] {
            assert!(insert_evicting(&mut buffer, tagged_line(tag, 40)).is_empty());
        }

        // D needs two evictions: exactly A then B, in that order.
        let evicted = insert_evicting(&mut buffer, tagged_line("D", 80));
        let tags = evicted
            .iter()
            .map(|item| match item {
                Item::Line { segments, .. } => segments[0].text.as_str(),
                Item::CommentCard { .. } => unreachable!("only lines inserted"),
            })
            .collect::<Vec<_>>();
        assert_eq!(tags, vec!["A", "B"]);
        assert_eq!(buffer.items().len(), 2);
        assert_eq!(buffer.total_height(), 120);
    }

    #[test]
    fn card_height_is_padding_plus_lines() {
        let card = Item::comment_card(
            vec![
                Segment::new("first", white()),
                Segment::new("second", white()),
            ],
            500,
            20,
            15.0,
            white(),
            38,
        );
        assert_eq!(card.height(), 2 * 38 + 2 * 20);
    }

    #[test]
    fn clear_resets_height_accounting() {
        let mut buffer = ScreenBuffer::new(100);
        buffer.push(tagged_line("a", 60));
        buffer.clear();
        assert_eq!(buffer.total_height(), 0);
        assert!(buffer.items().is_empty());
        assert!(buffer.fits(100));
    }
}
