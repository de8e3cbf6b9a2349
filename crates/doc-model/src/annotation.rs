use crate::geometry::{Point, Rect};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationKind {
    Text,
    Highlight,
    Underline,
    StrikeOut,
    Square,
    Circle,
    Ink,
    FreeText,
    Link,
    Other,
}

impl AnnotationKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Text => "Note",
            Self::Highlight => "Highlight",
            Self::Underline => "Underline",
            Self::StrikeOut => "Strike-out",
            Self::Square => "Rectangle",
            Self::Circle => "Ellipse",
            Self::Ink => "Ink",
            Self::FreeText => "Text box",
            Self::Link => "Link",
            Self::Other => "Annotation",
        }
    }
}

/// An annotation on a page.
///
/// `index` is the annotation's position in the page's annotation list and
/// is invalidated by any move or delete on that page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub index: usize,
    pub kind: AnnotationKind,
    pub rect: Rect,
    #[serde(default)]
    pub contents: Option<String>,
}

/// Topmost annotation under `point`. Later annotations are drawn on top.
pub fn annotation_at(annotations: &[Annotation], point: Point) -> Option<&Annotation> {
    annotations.iter().rev().find(|annotation| annotation.rect.contains(point))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_at_prefers_topmost() {
        let annotations = vec![
            Annotation {
                index: 0,
                kind: AnnotationKind::Square,
                rect: Rect::new(0.0, 0.0, 100.0, 100.0),
                contents: None,
            },
            Annotation {
                index: 1,
                kind: AnnotationKind::Text,
                rect: Rect::new(40.0, 40.0, 60.0, 60.0),
                contents: Some("note".to_owned()),
            },
        ];

        assert_eq!(annotation_at(&annotations, Point::new(50.0, 50.0)).map(|a| a.index), Some(1));
        assert_eq!(annotation_at(&annotations, Point::new(10.0, 10.0)).map(|a| a.index), Some(0));
        assert!(annotation_at(&annotations, Point::new(200.0, 10.0)).is_none());
    }
}
