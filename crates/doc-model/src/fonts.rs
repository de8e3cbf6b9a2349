//! Font statistics for re-inserting edited text in a matching style.

use crate::geometry::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Share of the font size that sits below the baseline for base-14 fonts.
const DESCENT_RATIO: f32 = 0.21;

/// A run of characters drawn with one font at one size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub rect: Rect,
    pub text: String,
    pub font: String,
    pub size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontStyle {
    pub name: String,
    pub size: f32,
}

impl FontStyle {
    pub fn new(name: impl Into<String>, size: f32) -> Self {
        Self { name: name.into(), size }
    }
}

impl Default for FontStyle {
    fn default() -> Self {
        Self::new("helv", 11.0)
    }
}

/// Most frequent font name and most frequent size across `spans`.
///
/// Name and size are counted independently, so the result may pair a name
/// with a size that never occur together. Ties go to the value seen first.
pub fn most_common_font(spans: &[TextSpan], fallback: &FontStyle) -> FontStyle {
    if spans.is_empty() {
        return fallback.clone();
    }

    let name = most_frequent(spans.iter().map(|span| span.font.clone()));
    // Sizes are counted by bit pattern; they come straight from the engine
    // so equal sizes are bit-identical.
    let size = most_frequent(spans.iter().map(|span| span.size.to_bits())).map(f32::from_bits);

    match (name, size) {
        (Some(name), Some(size)) => FontStyle { name, size },
        _ => fallback.clone(),
    }
}

fn most_frequent<T: Eq + std::hash::Hash + Clone>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: HashMap<T, (usize, usize)> = HashMap::new();

    for (position, value) in values.enumerate() {
        counts.entry(value).or_insert((0, position)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(value, _)| value)
}

/// Style of the text under `rect`.
///
/// Prefers the span with the largest overlap; falls back to the page-wide
/// most common style, then to `fallback` for pages without text.
pub fn font_for_rect(spans: &[TextSpan], rect: &Rect, fallback: &FontStyle) -> FontStyle {
    let best = spans
        .iter()
        .filter_map(|span| span.rect.intersection(rect).map(|overlap| (span, overlap.area())))
        .max_by(|(_, a), (_, b)| a.total_cmp(b));

    match best {
        Some((span, _)) => FontStyle::new(span.font.clone(), span.size),
        None => most_common_font(spans, fallback),
    }
}

/// Where to start drawing replacement text so its baseline lines up with
/// the word it replaces.
pub fn baseline_origin(rect: &Rect, size: f32) -> Point {
    let baseline = rect.y1 - size * DESCENT_RATIO;
    Point::new(rect.x0, baseline.clamp(rect.y0, rect.y1))
}

/// Built-in PDF fonts that replacement text can be drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl BaseFont {
    /// Pick the closest built-in font for an arbitrary font name.
    pub fn resolve(name: &str) -> Self {
        let lower = name.to_lowercase();
        // Subset fonts carry a "ABCDEF+" prefix.
        let lower = lower.split_once('+').map(|(_, rest)| rest).unwrap_or(&lower);

        let bold = lower.contains("bold") || lower.contains("black") || lower.contains("heavy");
        let italic = lower.contains("italic") || lower.contains("oblique");

        let serif = lower.starts_with("tiro")
            || lower.contains("times")
            || (lower.contains("serif") && !lower.contains("sans"))
            || lower.contains("georgia")
            || lower.contains("garamond")
            || lower.contains("cambria");
        let mono = lower.starts_with("cour")
            || lower.contains("courier")
            || lower.contains("mono")
            || lower.contains("consol");

        match (mono, serif, bold, italic) {
            (true, _, true, true) => Self::CourierBoldOblique,
            (true, _, true, false) => Self::CourierBold,
            (true, _, false, true) => Self::CourierOblique,
            (true, _, false, false) => Self::Courier,
            (false, true, true, true) => Self::TimesBoldItalic,
            (false, true, true, false) => Self::TimesBold,
            (false, true, false, true) => Self::TimesItalic,
            (false, true, false, false) => Self::TimesRoman,
            (false, false, true, true) => Self::HelveticaBoldOblique,
            (false, false, true, false) => Self::HelveticaBold,
            (false, false, false, true) => Self::HelveticaOblique,
            (false, false, false, false) => Self::Helvetica,
        }
    }

    /// PostScript name of the font.
    pub fn postscript_name(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Self::TimesRoman => "Times-Roman",
            Self::TimesBold => "Times-Bold",
            Self::TimesItalic => "Times-Italic",
            Self::TimesBoldItalic => "Times-BoldItalic",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
        }
    }
}
