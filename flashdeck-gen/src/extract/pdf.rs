//! PDF reader backed by lopdf
//!
//! Extracts one text page per PDF page and walks the document outline
//! (bookmarks) into `(title, page, level)` entries.

use crate::error::{GenError, GenResult};
use crate::models::{ExtractedDocument, OutlineEntry, Page};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// Hard stop for malformed outlines
const MAX_OUTLINE_ITEMS: usize = 10_000;

/// Load a PDF and extract its pages and outline
pub fn extract_pdf(path: &Path) -> GenResult<ExtractedDocument> {
    let doc = Document::load(path).map_err(|e| GenError::extraction(path, e))?;

    let page_ids = doc.get_pages();
    let mut pages = Vec::with_capacity(page_ids.len());

    for (&number, _) in page_ids.iter() {
        // Pages without extractable text stay as empty strings
        let text = match doc.extract_text(&[number]) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                debug!(page = number, error = %e, "No text extracted from page");
                String::new()
            }
        };
        pages.push(Page::new(text, number));
    }

    let outline = read_outline(&doc);

    Ok(ExtractedDocument { pages, outline })
}

/// Walk the outline tree depth-first in document order
///
/// Entries whose destination cannot be resolved to a page are skipped.
pub fn read_outline(doc: &Document) -> Vec<OutlineEntry> {
    let page_numbers: HashMap<ObjectId, u32> = doc
        .get_pages()
        .into_iter()
        .map(|(number, id)| (id, number))
        .collect();

    let catalog = match catalog(doc) {
        Some(c) => c,
        None => return Vec::new(),
    };

    let first = catalog
        .get(b"Outlines")
        .ok()
        .and_then(|o| as_dict(doc, o))
        .and_then(|outlines| outlines.get(b"First").ok())
        .and_then(|o| o.as_reference().ok());

    let mut entries = Vec::new();
    let mut visited: HashSet<ObjectId> = HashSet::new();
    // (next item to visit, level)
    let mut stack: Vec<(ObjectId, u32)> = first.map(|id| vec![(id, 1)]).unwrap_or_default();

    while let Some((id, level)) = stack.pop() {
        if !visited.insert(id) || visited.len() > MAX_OUTLINE_ITEMS {
            if visited.len() > MAX_OUTLINE_ITEMS {
                warn!("Outline exceeds {} items, truncating", MAX_OUTLINE_ITEMS);
                break;
            }
            continue;
        }

        let item = match doc.get_dictionary(id) {
            Ok(d) => d,
            Err(_) => continue,
        };

        // Siblings are visited after this item's children
        if let Ok(next) = item.get(b"Next").and_then(|o| o.as_reference()) {
            stack.push((next, level));
        }
        if let Ok(child) = item.get(b"First").and_then(|o| o.as_reference()) {
            stack.push((child, level + 1));
        }

        let title = item
            .get(b"Title")
            .ok()
            .map(|o| deref(doc, o))
            .and_then(|o| match o {
                Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
                _ => None,
            })
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        if title.is_empty() {
            continue;
        }

        match item_page(doc, catalog, item, &page_numbers) {
            Some(page) => entries.push(OutlineEntry::new(title, page, level)),
            None => debug!(title = %title, "Outline entry has no resolvable page"),
        }
    }

    entries
}

fn catalog(doc: &Document) -> Option<&Dictionary> {
    doc.trailer
        .get(b"Root")
        .ok()
        .and_then(|root| as_dict(doc, root))
}

fn deref<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn as_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match deref(doc, obj) {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

/// Page of an outline item, via `/Dest` or a GoTo action's `/D`
fn item_page(
    doc: &Document,
    catalog: &Dictionary,
    item: &Dictionary,
    page_numbers: &HashMap<ObjectId, u32>,
) -> Option<u32> {
    if let Ok(dest) = item.get(b"Dest") {
        return dest_page(doc, catalog, dest, page_numbers, 0);
    }

    let action = item.get(b"A").ok().and_then(|a| as_dict(doc, a))?;
    let dest = action.get(b"D").ok()?;
    dest_page(doc, catalog, dest, page_numbers, 0)
}

fn dest_page(
    doc: &Document,
    catalog: &Dictionary,
    dest: &Object,
    page_numbers: &HashMap<ObjectId, u32>,
    depth: u8,
) -> Option<u32> {
    if depth > 4 {
        return None;
    }

    match deref(doc, dest) {
        Object::Array(items) => match items.first()? {
            Object::Reference(page_id) => page_numbers.get(page_id).copied(),
            // Remote-style destinations carry a 0-based page index
            Object::Integer(index) if *index >= 0 => Some(*index as u32 + 1),
            _ => None,
        },
        Object::Dictionary(d) => {
            let inner = d.get(b"D").ok()?;
            dest_page(doc, catalog, inner, page_numbers, depth + 1)
        }
        Object::Name(name) => {
            let target = named_dest(doc, catalog, name)?;
            dest_page(doc, catalog, target, page_numbers, depth + 1)
        }
        Object::String(name, _) => {
            let target = named_dest(doc, catalog, name)?;
            dest_page(doc, catalog, target, page_numbers, depth + 1)
        }
        _ => None,
    }
}

/// Look a named destination up in `/Dests` (PDF 1.1) or the `/Names` tree
fn named_dest<'a>(doc: &'a Document, catalog: &'a Dictionary, name: &[u8]) -> Option<&'a Object> {
    if let Some(dests) = catalog.get(b"Dests").ok().and_then(|d| as_dict(doc, d)) {
        if let Ok(found) = dests.get(name) {
            return Some(found);
        }
    }

    let tree = catalog
        .get(b"Names")
        .ok()
        .and_then(|n| as_dict(doc, n))
        .and_then(|names| names.get(b"Dests").ok())
        .and_then(|d| as_dict(doc, d))?;

    search_name_tree(doc, tree, name, 0)
}

fn search_name_tree<'a>(
    doc: &'a Document,
    node: &'a Dictionary,
    name: &[u8],
    depth: u8,
) -> Option<&'a Object> {
    if depth > 32 {
        return None;
    }

    if let Ok(Object::Array(pairs)) = node.get(b"Names").map(|o| deref(doc, o)) {
        for pair in pairs.chunks(2) {
            if let [Object::String(key, _), value] = pair {
                if key.as_slice() == name {
                    return Some(value);
                }
            }
        }
    }

    if let Ok(Object::Array(kids)) = node.get(b"Kids").map(|o| deref(doc, o)) {
        for kid in kids {
            if let Some(kid_dict) = as_dict(doc, kid) {
                if let Some(found) = search_name_tree(doc, kid_dict, name, depth + 1) {
                    return Some(found);
                }
            }
        }
    }

    None
}

/// Decode a PDF text string: UTF-16BE with BOM, otherwise lossy UTF-8
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    String::from_utf8_lossy(bytes).into_owned()
}
