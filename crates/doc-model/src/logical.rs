//! Logical document index.
//!
//! Holds the word boxes of every page so hit-testing, region extraction and
//! search never go back to the engine. The index is a cache of the physical
//! document: after any mutation the affected page must be replaced with a
//! fresh extraction through [`LogicalDocument::replace_page`].

use crate::geometry::{Point, Rect};
use crate::words::{PageWords, Word};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogicalDocument {
    pages: Vec<PageWords>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub case_sensitive: bool,
}

/// One search match; `rect` covers every word the match spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub page_index: u32,
    pub rect: Rect,
    pub text: String,
}

impl LogicalDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from per-page word lists, page `i` at position `i`.
    pub fn from_pages(pages: impl IntoIterator<Item = Vec<Word>>) -> Self {
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(index, words)| PageWords::new(index as u32, words))
            .collect();

        Self { pages }
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn page(&self, page_index: u32) -> Option<&PageWords> {
        self.pages.get(page_index as usize)
    }

    /// Words of a page; empty when the page does not exist.
    pub fn page_words(&self, page_index: u32) -> &[Word] {
        self.page(page_index).map(|page| page.words.as_slice()).unwrap_or(&[])
    }

    pub fn word_at(&self, page_index: u32, point: Point) -> Option<&Word> {
        self.page(page_index)?.word_at(point)
    }

    pub fn contains_word(&self, page_index: u32, word: &Word) -> bool {
        self.page_words(page_index).iter().any(|candidate| candidate == word)
    }

    /// Replace the text of the first word equal to `word` on the page.
    ///
    /// Only the logical entry changes; the physical document is untouched.
    pub fn edit_word(&mut self, page_index: u32, word: &Word, new_text: &str) -> bool {
        let Some(page) = self.pages.get_mut(page_index as usize) else {
            return false;
        };

        match page.words.iter_mut().find(|candidate| *candidate == word) {
            Some(found) => {
                found.text = new_text.to_owned();
                true
            }
            None => false,
        }
    }

    /// Swap in a fresh extraction of one page.
    pub fn replace_page(&mut self, page_index: u32, words: Vec<Word>) -> bool {
        match self.pages.get_mut(page_index as usize) {
            Some(page) => {
                page.words = words;
                true
            }
            None => false,
        }
    }

    pub fn text_in_region(&self, page_index: u32, region: &Rect) -> String {
        self.page(page_index).map(|page| page.text_in(region)).unwrap_or_default()
    }

    pub fn search(&self, query: &str, options: SearchOptions) -> Vec<SearchHit> {
        let fold = |text: &str| {
            if options.case_sensitive {
                text.to_owned()
            } else {
                text.to_lowercase()
            }
        };

        let tokens: Vec<String> = query.split_whitespace().map(fold).collect();
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut hits = Vec::new();

        for page in &self.pages {
            let words = page.in_reading_order();
            let folded: Vec<String> = words.iter().map(|word| fold(&word.text)).collect();

            if tokens.len() == 1 {
                for (word, text) in words.iter().zip(&folded) {
                    if text.contains(tokens[0].as_str()) {
                        hits.push(SearchHit {
                            page_index: page.page_index,
                            rect: word.rect,
                            text: word.text.clone(),
                        });
                    }
                }
                continue;
            }

            if folded.len() < tokens.len() {
                continue;
            }

            for start in 0..=(folded.len() - tokens.len()) {
                let window = &folded[start..start + tokens.len()];
                if !phrase_matches(window, &tokens) {
                    continue;
                }

                let matched = &words[start..start + tokens.len()];
                let rect = matched[1..].iter().fold(matched[0].rect, |acc, word| acc.union(&word.rect));
                let text =
                    matched.iter().map(|word| word.text.as_str()).collect::<Vec<_>>().join(" ");

                hits.push(SearchHit { page_index: page.page_index, rect, text });
            }
        }

        hits
    }
}

fn phrase_matches(window: &[String], tokens: &[String]) -> bool {
    let last = tokens.len() - 1;

    window.iter().zip(tokens).enumerate().all(|(index, (word, token))| {
        if index == 0 {
            word.ends_with(token.as_str())
        } else if index == last {
            word.starts_with(token.as_str())
        } else {
            word == token
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(x0: f32, y0: f32, text: &str) -> Word {
        Word::new(Rect::new(x0, y0, x0 + 8.0 * text.len() as f32, y0 + 12.0), text)
    }

    fn document() -> LogicalDocument {
        LogicalDocument::from_pages(vec![
            vec![word(10.0, 10.0, "The"), word(50.0, 10.0, "quick"), word(100.0, 10.0, "fox")],
            vec![word(10.0, 10.0, "A"), word(30.0, 10.0, "Quick"), word(80.0, 10.0, "brown")],
        ])
    }

    #[test]
    fn page_words_out_of_range_is_empty() {
        let doc = document();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_words(1).len(), 3);
        assert!(doc.page_words(7).is_empty());
    }

    #[test]
    fn edit_word_replaces_first_matching_entry() {
        let mut doc = document();
        let target = doc.page_words(0)[1].clone();

        assert!(doc.edit_word(0, &target, "slow"));
        assert_eq!(doc.page_words(0)[1].text, "slow");
        assert_eq!(doc.page_words(0)[1].rect, target.rect);

        // The old word no longer exists, so a second edit misses.
        assert!(!doc.edit_word(0, &target, "again"));
    }

    #[test]
    fn edit_word_rejects_unknown_page_or_word() {
        let mut doc = document();
        let target = doc.page_words(0)[0].clone();
        assert!(!doc.edit_word(5, &target, "x"));
        assert!(!doc.edit_word(1, &target, "x"));
    }

    #[test]
    fn replace_page_resynchronizes_words() {
        let mut doc = document();
        assert!(doc.replace_page(0, vec![word(10.0, 10.0, "fresh")]));
        assert_eq!(doc.page_words(0).len(), 1);
        assert!(!doc.replace_page(9, Vec::new()));
    }

    #[test]
    fn word_at_uses_page_coordinates() {
        let doc = document();
        let hit = doc.word_at(0, Point::new(55.0, 15.0)).expect("word expected");
        assert_eq!(hit.text, "quick");
        assert!(doc.word_at(3, Point::new(55.0, 15.0)).is_none());
    }

    #[test]
    fn single_token_search_is_case_insensitive_by_default() {
        let doc = document();
        let hits = doc.search("quick", SearchOptions::default());
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].page_index, 0);
        assert_eq!(hits[1].page_index, 1);

        let strict = doc.search("quick", SearchOptions { case_sensitive: true });
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].page_index, 0);
    }

    #[test]
    fn phrase_search_spans_consecutive_words() {
        let doc = document();
        let hits = doc.search("he quick f", SearchOptions::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "The quick fox");
        assert_eq!(hits[0].rect, Rect::new(10.0, 10.0, 124.0, 22.0));
    }

    #[test]
    fn phrase_search_is_case_sensitive_on_request() {
        let doc = document();
        assert_eq!(doc.search("a quick", SearchOptions::default()).len(), 1);
        assert!(doc.search("a quick", SearchOptions { case_sensitive: true }).is_empty());

        let exact = doc.search("A Quick", SearchOptions { case_sensitive: true });
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].text, "A Quick");
    }

    #[test]
    fn phrase_search_crosses_line_breaks() {
        let doc = LogicalDocument::from_pages(vec![vec![
            word(10.0, 10.0, "ends").at_position(0, 0, 0),
            word(50.0, 10.0, "with").at_position(0, 0, 1),
            word(10.0, 30.0, "next").at_position(0, 1, 0),
            word(50.0, 30.0, "line").at_position(0, 1, 1),
        ]]);

        let hits = doc.search("with next", SearchOptions::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "with next");
        assert_eq!(hits[0].rect, Rect::new(10.0, 10.0, 82.0, 42.0));
    }

    #[test]
    fn phrase_search_follows_reading_order_not_storage_order() {
        // An inserted word is stored last but reads between the others.
        let doc = LogicalDocument::from_pages(vec![vec![
            word(10.0, 10.0, "jumps").at_position(0, 0, 0),
            word(110.0, 10.0, "dog").at_position(0, 0, 2),
            word(60.0, 10.0, "over").at_position(0, 0, 1),
        ]]);

        let hits = doc.search("jumps over dog", SearchOptions::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "jumps over dog");
    }

    #[test]
    fn empty_query_has_no_hits() {
        assert!(document().search("   ", SearchOptions::default()).is_empty());
    }
}
