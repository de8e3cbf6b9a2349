//! Grouping of extracted characters into words and font runs.
//!
//! Backends that only report individual characters (PDFium) feed them
//! through here in content order, with boxes already in page space.

use doc_model::{Point, Rect, TextSpan, Word};

#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub rect: Rect,
    pub font: String,
    pub size: f32,
}

impl Glyph {
    /// Printable character whose box overlaps `area`.
    fn is_covered_by(&self, area: &Rect) -> bool {
        !self.ch.is_whitespace() && self.rect.intersects(area)
    }

    fn is_line_break(&self) -> bool {
        self.ch == '\n' || self.ch == '\r'
    }

    /// True when `self` does not sit on the same line as `previous`.
    fn starts_new_line(&self, previous: &Rect) -> bool {
        let center = self.rect.center().y;
        center < previous.y0 || center > previous.y1
    }
}

/// A glyph together with its baseline origin in PDF user space
/// (bottom-left origin), which is where text must be re-drawn to land on
/// the same spot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedGlyph {
    pub glyph: Glyph,
    pub origin: Point,
}

/// Characters of one text object that outlive a redaction, one run per
/// word, each anchored at the origin of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct SurvivingRun {
    pub text: String,
    pub origin: Point,
}

pub fn touches_area(glyphs: &[PlacedGlyph], area: &Rect) -> bool {
    glyphs.iter().any(|placed| placed.glyph.is_covered_by(area))
}

/// Split the characters outside `area` into runs. Whitespace, line breaks
/// and covered characters all end the current run.
pub fn surviving_runs(glyphs: &[PlacedGlyph], area: &Rect) -> Vec<SurvivingRun> {
    let mut runs = Vec::new();
    let mut current: Option<SurvivingRun> = None;

    for placed in glyphs {
        let glyph = &placed.glyph;
        if glyph.ch.is_whitespace() || glyph.is_covered_by(area) {
            runs.extend(current.take());
            continue;
        }

        match &mut current {
            Some(run) => run.text.push(glyph.ch),
            None => current = Some(SurvivingRun { text: glyph.ch.to_string(), origin: placed.origin }),
        }
    }

    runs.extend(current);
    runs
}

#[derive(Default)]
struct WordGrouper {
    words: Vec<Word>,
    current: Option<(Rect, String)>,
    line_no: u32,
    word_no: u32,
    line_has_words: bool,
    pending_break: bool,
}

impl WordGrouper {
    fn flush(&mut self) {
        if let Some((rect, text)) = self.current.take() {
            self.words.push(Word::new(rect, text).at_position(0, self.line_no, self.word_no));
            self.word_no += 1;
            self.line_has_words = true;
        }
    }

    fn push(&mut self, glyph: &Glyph) {
        if self.pending_break {
            if self.line_has_words {
                self.line_no += 1;
                self.word_no = 0;
                self.line_has_words = false;
            }
            self.pending_break = false;
        }

        match &mut self.current {
            Some((rect, text)) => {
                *rect = rect.union(&glyph.rect);
                text.push(glyph.ch);
            }
            None => self.current = Some((glyph.rect, glyph.ch.to_string())),
        }
    }
}

/// Split on whitespace; line numbers advance on explicit line breaks and
/// on vertical jumps between consecutive characters.
pub fn group_words(glyphs: &[Glyph]) -> Vec<Word> {
    let mut grouper = WordGrouper::default();
    let mut previous: Option<Rect> = None;

    for glyph in glyphs {
        if glyph.is_line_break() {
            grouper.flush();
            grouper.pending_break = true;
            continue;
        }
        if glyph.ch.is_whitespace() {
            grouper.flush();
            continue;
        }

        if previous.is_some_and(|previous| glyph.starts_new_line(&previous)) {
            grouper.flush();
            grouper.pending_break = true;
        }

        grouper.push(glyph);
        previous = Some(glyph.rect);
    }

    grouper.flush();
    grouper.words
}

/// Consecutive characters on one line sharing a font name and size.
pub fn group_spans(glyphs: &[Glyph]) -> Vec<TextSpan> {
    let mut spans: Vec<TextSpan> = Vec::new();
    let mut open = false;
    let mut previous: Option<Rect> = None;

    for glyph in glyphs {
        if glyph.is_line_break() {
            open = false;
            continue;
        }

        if glyph.ch.is_whitespace() {
            if let (true, Some(span)) = (open, spans.last_mut()) {
                span.text.push(glyph.ch);
            }
            continue;
        }

        let same_line = previous.is_some_and(|previous| !glyph.starts_new_line(&previous));
        previous = Some(glyph.rect);

        if let (true, true, Some(span)) = (open, same_line, spans.last_mut()) {
            if span.font == glyph.font && span.size.to_bits() == glyph.size.to_bits() {
                span.rect = span.rect.union(&glyph.rect);
                span.text.push(glyph.ch);
                continue;
            }
        }

        spans.push(TextSpan {
            rect: glyph.rect,
            text: glyph.ch.to_string(),
            font: glyph.font.clone(),
            size: glyph.size,
        });
        open = true;
    }

    for span in &mut spans {
        let trimmed = span.text.trim_end().len();
        span.text.truncate(trimmed);
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lay out `text` on one line, 6pt per character.
    fn line(text: &str, y: f32, font: &str) -> Vec<Glyph> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| Glyph {
                ch,
                rect: Rect::new(i as f32 * 6.0, y, i as f32 * 6.0 + 6.0, y + 10.0),
                font: font.to_owned(),
                size: 10.0,
            })
            .collect()
    }

    fn newline() -> Glyph {
        Glyph { ch: '\n', rect: Rect::default(), font: String::new(), size: 0.0 }
    }

    #[test]
    fn words_split_on_whitespace_and_lines() {
        let mut glyphs = line("to be", 0.0, "Helvetica");
        glyphs.push(Glyph { ch: '\r', ..newline() });
        glyphs.push(newline());
        glyphs.extend(line("or", 20.0, "Helvetica"));

        let words = group_words(&glyphs);
        let summary: Vec<_> =
            words.iter().map(|word| (word.text.as_str(), word.line_no, word.word_no)).collect();
        assert_eq!(summary, vec![("to", 0, 0), ("be", 0, 1), ("or", 1, 0)]);
        assert_eq!(words[1].rect, Rect::new(18.0, 0.0, 30.0, 10.0));
    }

    #[test]
    fn vertical_jump_starts_a_new_line() {
        let mut glyphs = line("ab", 0.0, "Helvetica");
        glyphs.extend(line("cd", 40.0, "Helvetica"));

        let words = group_words(&glyphs);
        let summary: Vec<_> = words.iter().map(|word| (word.text.as_str(), word.line_no)).collect();
        assert_eq!(summary, vec![("ab", 0), ("cd", 1)]);
    }

    #[test]
    fn spans_break_on_font_change() {
        let mut glyphs = line("plain ", 0.0, "Helvetica");
        let bold: Vec<_> = line("      bold", 0.0, "Helvetica-Bold").into_iter().skip(6).collect();
        glyphs.extend(bold);

        let spans = group_spans(&glyphs);
        let summary: Vec<_> = spans.iter().map(|span| (span.text.as_str(), span.font.as_str())).collect();
        assert_eq!(summary, vec![("plain", "Helvetica"), ("bold", "Helvetica-Bold")]);
        assert_eq!(spans[1].rect.x0, 36.0);
    }

    /// Place `text` on a line at y = 0, with PDF origins on a baseline
    /// at 700.
    fn placed(text: &str) -> Vec<PlacedGlyph> {
        line(text, 0.0, "Helvetica")
            .into_iter()
            .map(|glyph| {
                let origin = Point::new(glyph.rect.x0, 700.0);
                PlacedGlyph { glyph, origin }
            })
            .collect()
    }

    #[test]
    fn redaction_keeps_neighbouring_words_at_their_origins() {
        // "quick" spans x 24..54.
        let glyphs = placed("The quick fox");
        let area = Rect::new(25.0, 2.0, 50.0, 8.0);

        assert!(touches_area(&glyphs, &area));
        let runs = surviving_runs(&glyphs, &area);
        assert_eq!(
            runs,
            vec![
                SurvivingRun { text: "The".to_owned(), origin: Point::new(0.0, 700.0) },
                SurvivingRun { text: "fox".to_owned(), origin: Point::new(60.0, 700.0) },
            ]
        );
    }

    #[test]
    fn partially_covered_word_keeps_its_uncovered_tail() {
        let glyphs = placed("quickly");
        // Covers the first five characters (x 0..30).
        let runs = surviving_runs(&glyphs, &Rect::new(1.0, 1.0, 29.0, 9.0));
        assert_eq!(runs, vec![SurvivingRun { text: "ly".to_owned(), origin: Point::new(30.0, 700.0) }]);
    }

    #[test]
    fn covering_only_whitespace_leaves_the_object_alone() {
        let glyphs = placed("a b");
        // The space occupies x 6..12.
        let area = Rect::new(7.0, 1.0, 11.0, 9.0);
        assert!(!touches_area(&glyphs, &area));
    }

    #[test]
    fn fully_covered_object_has_no_survivors() {
        let glyphs = placed("gone");
        let area = Rect::new(-1.0, -1.0, 100.0, 20.0);
        assert!(touches_area(&glyphs, &area));
        assert!(surviving_runs(&glyphs, &area).is_empty());
    }
}
