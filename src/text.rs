/// Pixel-width oracle for a text run in one concrete font and size.
///
/// Implementations must be deterministic for a given string; `wrap_words`
/// and the renderer both consume widths through this seam so tests can
/// substitute a fixed-advance fake.
pub trait TextMeasure {
    fn text_width(&self, text: &str) -> f32;
}

/// Wraps `text` into lines no wider than `max_width`, splitting only at
/// whitespace. A single word wider than `max_width` is placed alone on its
/// own line rather than split mid-word. Empty input yields no lines.
pub fn wrap_words(text: &str, measure: &dyn TextMeasure, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_owned()
        } else {
            format!("{current} {word}")
        };

        if measure.text_width(&candidate) <= max_width {
            current = candidate;
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current = word.to_owned();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
pub(crate) struct FixedAdvance(pub f32);

#[cfg(test)]
impl TextMeasure for FixedAdvance {
    fn text_width(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.0
    }
}
