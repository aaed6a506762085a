//! Post-processing of natively rendered PDFs with `lopdf`.
//!
//! `genpdf` has no notion of outlines or internal links, so after layout the
//! bytes are reopened and three things are attached:
//!
//! * an `/Outlines` tree with one entry per heading,
//! * a `/Dests` dictionary naming each heading's position by its anchor id,
//! * a `/Link` annotation for every in-document link, pointing at the named
//!   destination of its target.
//!
//! The same loader gives the page count used for `Page N of M`.

use crate::error::RenderError;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use std::collections::{BTreeMap, HashSet};

/// A heading and where it was laid out.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadingMark {
    pub level: u8,
    pub title: String,
    pub anchor: String,
    /// 1-based page number.
    pub page: usize,
    /// Top edge in PDF user space (points from the bottom of the page).
    /// `None` targets the top of the page.
    pub top: Option<f32>,
}

/// A clickable region that jumps to a heading anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkMark {
    /// 1-based page number.
    pub page: usize,
    /// `[left, bottom, right, top]` in PDF user space.
    pub rect: [f32; 4],
    pub target: String,
}

/// Number of pages in a rendered PDF.
pub fn count_pages(pdf: &[u8]) -> Result<usize, RenderError> {
    let document = load(pdf)?;
    Ok(document.get_pages().len())
}

/// Attach outline, named destinations and link annotations; return the new
/// bytes.
///
/// Levels nest: a level-3 mark becomes a child of the nearest preceding mark
/// with a lower level. Marks pointing past the last page are skipped, and so
/// are links whose target names no destination. With no usable marks the
/// input is returned unchanged.
pub fn apply_outline(pdf: &[u8], marks: &[HeadingMark], links: &[LinkMark]) -> Result<Vec<u8>, RenderError> {
    let mut document = load(pdf)?;
    let pages = document.get_pages();

    let entries = collect_entries(&mut document, marks, &pages);
    if entries.is_empty() {
        return Ok(pdf.to_vec());
    }

    let outlines_id = document.new_object_id();
    link_entries(&mut document, outlines_id, &entries);
    insert_outlines_root(&mut document, outlines_id, &entries)?;
    let names = insert_dests(&mut document, &entries)?;
    insert_link_annotations(&mut document, links, &pages, &names)?;

    let mut buffer = Vec::new();
    document
        .save_to(&mut buffer)
        .map_err(|e| RenderError::Layout(format!("failed to save outlined PDF: {e}")))?;
    Ok(buffer)
}

fn load(pdf: &[u8]) -> Result<Document, RenderError> {
    Document::load_mem(pdf).map_err(|e| RenderError::Layout(format!("rendered PDF is unreadable: {e}")))
}

struct Entry {
    object_id: ObjectId,
    page_ref: ObjectId,
    title: String,
    anchor: String,
    top: Option<f32>,
    level: u8,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl Entry {
    /// `[page /XYZ null top null]`: keep the zoom, scroll to the heading.
    fn destination(&self) -> Object {
        Object::Array(vec![
            Object::Reference(self.page_ref),
            Object::Name(b"XYZ".to_vec()),
            Object::Null,
            self.top.map(Object::Real).unwrap_or(Object::Null),
            Object::Null,
        ])
    }
}

fn collect_entries(
    document: &mut Document,
    marks: &[HeadingMark],
    pages: &BTreeMap<u32, ObjectId>,
) -> Vec<Entry> {
    let mut entries: Vec<Entry> = Vec::new();
    // Indices of the currently open ancestors, shallowest first.
    let mut stack: Vec<usize> = Vec::new();

    for mark in marks {
        let Some(page_ref) = page_ref(pages, mark.page) else {
            continue;
        };
        while let Some(&top) = stack.last() {
            if entries[top].level >= mark.level {
                stack.pop();
            } else {
                break;
            }
        }
        let index = entries.len();
        let parent = stack.last().copied();
        if let Some(p) = parent {
            entries[p].children.push(index);
        }
        entries.push(Entry {
            object_id: document.new_object_id(),
            page_ref,
            title: mark.title.clone(),
            anchor: mark.anchor.clone(),
            top: mark.top,
            level: mark.level,
            parent,
            children: Vec::new(),
        });
        stack.push(index);
    }
    entries
}

fn page_ref(pages: &BTreeMap<u32, ObjectId>, page: usize) -> Option<ObjectId> {
    u32::try_from(page).ok().and_then(|p| pages.get(&p)).copied()
}

fn link_entries(document: &mut Document, outlines_id: ObjectId, entries: &[Entry]) {
    let roots: Vec<usize> = (0..entries.len())
        .filter(|&i| entries[i].parent.is_none())
        .collect();

    for index in 0..entries.len() {
        let entry = &entries[index];
        let siblings: &[usize] = match entry.parent {
            Some(p) => &entries[p].children,
            None => &roots,
        };
        let position = siblings.iter().position(|&i| i == index).unwrap_or(0);

        let mut dictionary = Dictionary::new();
        dictionary.set("Title", text_string(&entry.title));
        dictionary.set("Dest", entry.destination());
        let parent_id = entry.parent.map(|p| entries[p].object_id).unwrap_or(outlines_id);
        dictionary.set("Parent", Object::Reference(parent_id));

        if position > 0 {
            dictionary.set("Prev", Object::Reference(entries[siblings[position - 1]].object_id));
        }
        if let Some(&next) = siblings.get(position + 1) {
            dictionary.set("Next", Object::Reference(entries[next].object_id));
        }
        if let (Some(&first), Some(&last)) = (entry.children.first(), entry.children.last()) {
            dictionary.set("First", Object::Reference(entries[first].object_id));
            dictionary.set("Last", Object::Reference(entries[last].object_id));
            // Negative count: collapsed by default.
            dictionary.set("Count", Object::Integer(-(entry.children.len() as i64)));
        }

        document
            .objects
            .insert(entry.object_id, Object::Dictionary(dictionary));
    }
}

fn catalog_mut(document: &mut Document) -> Result<&mut Dictionary, RenderError> {
    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| RenderError::Layout("PDF catalog entry is missing".into()))?;
    document
        .objects
        .get_mut(&catalog_id)
        .and_then(|o| o.as_dict_mut().ok())
        .ok_or_else(|| RenderError::Layout("PDF catalog entry is not a dictionary".into()))
}

fn insert_outlines_root(
    document: &mut Document,
    outlines_id: ObjectId,
    entries: &[Entry],
) -> Result<(), RenderError> {
    let roots: Vec<&Entry> = entries.iter().filter(|e| e.parent.is_none()).collect();

    let mut dictionary = Dictionary::new();
    dictionary.set("Type", Object::Name(b"Outlines".to_vec()));
    dictionary.set("Count", Object::Integer(roots.len() as i64));
    if let Some(first) = roots.first() {
        dictionary.set("First", Object::Reference(first.object_id));
    }
    if let Some(last) = roots.last() {
        dictionary.set("Last", Object::Reference(last.object_id));
    }
    document
        .objects
        .insert(outlines_id, Object::Dictionary(dictionary));

    let catalog = catalog_mut(document)?;
    catalog.set("Outlines", Object::Reference(outlines_id));
    catalog.set("PageMode", Object::Name(b"UseOutlines".to_vec()));
    Ok(())
}

/// One named destination per distinct anchor; the first heading wins.
fn insert_dests(document: &mut Document, entries: &[Entry]) -> Result<HashSet<String>, RenderError> {
    let mut names = HashSet::new();
    let mut dests = Dictionary::new();
    for entry in entries {
        if entry.anchor.is_empty() || !names.insert(entry.anchor.clone()) {
            continue;
        }
        dests.set(entry.anchor.as_bytes().to_vec(), entry.destination());
    }
    if names.is_empty() {
        return Ok(names);
    }
    let dests_id = document.add_object(Object::Dictionary(dests));
    catalog_mut(document)?.set("Dests", Object::Reference(dests_id));
    Ok(names)
}

fn insert_link_annotations(
    document: &mut Document,
    links: &[LinkMark],
    pages: &BTreeMap<u32, ObjectId>,
    names: &HashSet<String>,
) -> Result<(), RenderError> {
    for link in links {
        if !names.contains(&link.target) {
            continue;
        }
        let Some(page_id) = page_ref(pages, link.page) else {
            continue;
        };

        let mut annotation = Dictionary::new();
        annotation.set("Type", Object::Name(b"Annot".to_vec()));
        annotation.set("Subtype", Object::Name(b"Link".to_vec()));
        annotation.set(
            "Rect",
            Object::Array(link.rect.iter().map(|v| Object::Real(*v)).collect()),
        );
        annotation.set(
            "Border",
            Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)]),
        );
        annotation.set("Dest", Object::Name(link.target.as_bytes().to_vec()));
        let annotation_id = document.add_object(Object::Dictionary(annotation));

        let page = document
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| RenderError::Layout(format!("page {} is not a dictionary: {e}", link.page)))?;
        match page.get_mut(b"Annots") {
            Ok(Object::Array(annots)) => annots.push(Object::Reference(annotation_id)),
            _ => page.set("Annots", Object::Array(vec![Object::Reference(annotation_id)])),
        }
    }
    Ok(())
}

/// Encode a PDF text string: plain literal for ASCII, UTF-16BE with BOM
/// otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}
