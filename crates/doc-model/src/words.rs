use crate::geometry::{Point, Rect};
use serde::{Deserialize, Serialize};

/// A single word as reported by the engine's word extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub rect: Rect,
    pub text: String,
    #[serde(default)]
    pub block_no: u32,
    #[serde(default)]
    pub line_no: u32,
    #[serde(default)]
    pub word_no: u32,
}

impl Word {
    pub fn new(rect: Rect, text: impl Into<String>) -> Self {
        Self { rect, text: text.into(), block_no: 0, line_no: 0, word_no: 0 }
    }

    pub fn at_position(mut self, block_no: u32, line_no: u32, word_no: u32) -> Self {
        self.block_no = block_no;
        self.line_no = line_no;
        self.word_no = word_no;
        self
    }

    fn reading_key(&self) -> (u32, u32, u32) {
        (self.block_no, self.line_no, self.word_no)
    }
}

/// Words of one page, in extraction order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageWords {
    pub page_index: u32,
    pub words: Vec<Word>,
}

impl PageWords {
    pub fn new(page_index: u32, words: Vec<Word>) -> Self {
        Self { page_index, words }
    }

    pub fn word_at(&self, point: Point) -> Option<&Word> {
        self.words.iter().find(|word| word.rect.contains(point))
    }

    /// Words sorted by block, line and position in line. Extraction order
    /// is not guaranteed to follow the text (inserted words come last).
    pub fn in_reading_order(&self) -> Vec<&Word> {
        let mut words: Vec<&Word> = self.words.iter().collect();
        words.sort_by_key(|word| word.reading_key());
        words
    }

    pub fn words_in(&self, region: &Rect) -> Vec<&Word> {
        self.words.iter().filter(|word| word.rect.intersects(region)).collect()
    }

    /// Text of every word touching `region`, one output line per source line.
    pub fn text_in(&self, region: &Rect) -> String {
        let mut hits = self.words_in(region);
        hits.sort_by_key(|word| word.reading_key());

        let mut out = String::new();
        let mut current_line: Option<(u32, u32)> = None;

        for word in hits {
            let line = (word.block_no, word.line_no);
            match current_line {
                Some(previous) if previous == line => out.push(' '),
                Some(_) => out.push('\n'),
                None => {}
            }
            out.push_str(&word.text);
            current_line = Some(line);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> PageWords {
        PageWords::new(
            0,
            vec![
                Word::new(Rect::new(10.0, 10.0, 40.0, 20.0), "Hello").at_position(0, 0, 0),
                Word::new(Rect::new(45.0, 10.0, 80.0, 20.0), "world").at_position(0, 0, 1),
                Word::new(Rect::new(10.0, 30.0, 50.0, 40.0), "second").at_position(0, 1, 0),
                Word::new(Rect::new(55.0, 30.0, 90.0, 40.0), "line").at_position(0, 1, 1),
            ],
        )
    }

    #[test]
    fn word_at_finds_containing_word() {
        let page = sample_page();
        let word = page.word_at(Point::new(50.0, 15.0)).expect("word expected");
        assert_eq!(word.text, "world");
        assert!(page.word_at(Point::new(42.0, 15.0)).is_none());
    }

    #[test]
    fn text_in_joins_lines_with_newlines() {
        let page = sample_page();
        let text = page.text_in(&Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(text, "Hello world\nsecond line");
    }

    #[test]
    fn text_in_only_includes_intersecting_words() {
        let page = sample_page();
        let text = page.text_in(&Rect::new(51.0, 5.0, 100.0, 35.0));
        assert_eq!(text, "world\nline");
    }

    #[test]
    fn reading_order_ignores_storage_order() {
        let mut page = sample_page();
        page.words.swap(0, 3);
        let texts: Vec<_> = page.in_reading_order().iter().map(|word| word.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "world", "second", "line"]);
    }

    #[test]
    fn text_in_orders_by_reading_position() {
        let mut page = sample_page();
        page.words.reverse();
        assert_eq!(page.text_in(&Rect::new(0.0, 0.0, 100.0, 25.0)), "Hello world");
    }
}
