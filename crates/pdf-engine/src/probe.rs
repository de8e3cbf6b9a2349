//! Lightweight document inspection with `lopdf`, without binding a renderer.

use crate::{PageSize, PdfEngineError};
use lopdf::{Dictionary, Document, Object};
use serde::Serialize;
use std::path::Path;

const LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

/// Page attributes may be inherited from `/Pages` nodes; stop after this
/// many parents.
const MAX_INHERIT_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub page_count: u32,
    /// `[width, height]` in points per page.
    pub page_sizes: Vec<[f32; 2]>,
    pub title: Option<String>,
}

pub fn probe_file(path: &Path) -> Result<DocumentInfo, PdfEngineError> {
    probe(&std::fs::read(path)?)
}

pub fn probe(bytes: &[u8]) -> Result<DocumentInfo, PdfEngineError> {
    if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
        return Err(PdfEngineError::EncryptedUnsupported);
    }

    let doc = Document::load_mem(bytes)?;
    let pages = doc.get_pages();
    let mut page_sizes = Vec::with_capacity(pages.len());

    for (_, object_id) in pages {
        let dict = doc.get_dictionary(object_id)?;
        let size = media_box(&doc, dict).unwrap_or(LETTER);
        page_sizes.push([size.width_pt, size.height_pt]);
    }

    if page_sizes.is_empty() {
        return Err(PdfEngineError::Backend("document has no pages".to_owned()));
    }

    Ok(DocumentInfo { page_count: page_sizes.len() as u32, page_sizes, title: title(&doc) })
}

fn media_box(doc: &Document, page: &Dictionary) -> Option<PageSize> {
    let mut dict = page;

    for _ in 0..MAX_INHERIT_DEPTH {
        if let Some(size) = dict.get(b"MediaBox").ok().and_then(parse_box) {
            return Some(size);
        }

        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }

    None
}

fn parse_box(object: &Object) -> Option<PageSize> {
    let array = object.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;
    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
}

fn title(doc: &Document) -> Option<String> {
    let info_id = doc.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = doc.get_dictionary(info_id).ok()?;

    match info.get(b"Title").ok()? {
        Object::String(bytes, _) => {
            let text = decode_text_string(bytes);
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_owned())
        }
        _ => None,
    }
}

/// PDF text strings are UTF-16BE with a byte order mark, or PDFDocEncoding,
/// which agrees with Latin-1 for printable text.
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> =
                rest.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&byte| char::from(byte)).collect(),
    }
}
