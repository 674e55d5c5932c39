//! Lenient (X)HTML parsing into a flat element tree.
//!
//! Elements are stored in document order with parent and previous-sibling
//! links, which is all selector matching and inheritance need. Raw-text
//! elements (`<style>`, `<script>`) are cut out before tokenizing so their
//! contents never reach the XML reader.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use smallvec::SmallVec;

use crate::css::DeclarationBlock;
use crate::document::LoadLimits;
use crate::error::{ErrorPhase, ScanError};

/// One element of the parsed document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// Lowercased local tag name.
    pub tag: String,
    /// `id` attribute.
    pub id: Option<String>,
    /// Class list.
    pub classes: SmallVec<[String; 4]>,
    /// All attributes with lowercased names, in source order.
    pub attributes: Vec<(String, String)>,
    /// Parsed `style` attribute.
    pub inline_style: Option<DeclarationBlock>,
    /// Index of the parent element.
    pub parent: Option<usize>,
    /// Index of the previous element sibling.
    pub prev_sibling: Option<usize>,
}

impl Element {
    /// Attribute value by lowercased name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Stylesheet reference in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StylesheetRef {
    /// `<link rel="stylesheet" href="...">`.
    Linked {
        /// Raw `href` attribute.
        href: String,
        /// `rel` also holds `alternate`: listed but disabled by default.
        alternate: bool,
    },
    /// `<style>` element contents.
    Inline {
        /// Raw CSS text.
        css: String,
    },
}

/// Parsed document: elements plus stylesheet references.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    /// Elements in document order; parents precede children.
    pub elements: Vec<Element>,
    /// Stylesheet references in document order.
    pub stylesheets: Vec<StylesheetRef>,
    /// First `<base href>` value, if any.
    pub base_href: Option<String>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["style", "script"];

struct RawTextSplit {
    markup: String,
    style_blocks: Vec<String>,
}

/// Parse document bytes (UTF-8) into a [`ParsedDocument`].
pub fn parse_document(html: &[u8], limits: &LoadLimits) -> Result<ParsedDocument, ScanError> {
    if html.len() > limits.max_html_bytes {
        return Err(ScanError::new(
            ErrorPhase::Load,
            "HTML_BYTES_LIMIT",
            format!(
                "Document exceeds max_html_bytes ({} > {})",
                html.len(),
                limits.max_html_bytes
            ),
        )
        .with_limit("max_html_bytes", html.len(), limits.max_html_bytes));
    }
    let text = core::str::from_utf8(html).map_err(|err| {
        ScanError::new(
            ErrorPhase::Load,
            "HTML_NOT_UTF8",
            format!("Document is not UTF-8: {}", err),
        )
        .with_token_offset(err.valid_up_to())
    })?;

    let split = split_raw_text(text);
    let mut style_blocks = split.style_blocks.into_iter();
    let mut doc = ParsedDocument::default();
    let mut stack: Vec<usize> = Vec::with_capacity(16);
    // Last child seen for each open element; index 0 tracks top-level nodes.
    let mut last_child: Vec<Option<usize>> = vec![None];

    let mut reader = Reader::from_reader(split.markup.as_bytes());
    {
        let config = reader.config_mut();
        config.trim_text(true);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;
    }
    let mut buf = Vec::with_capacity(256);

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let index = push_element(&reader, &e, &mut doc, &stack, &mut last_child, limits)?;
                let tag = doc.elements[index].tag.clone();
                if tag == "style" {
                    doc.stylesheets.push(StylesheetRef::Inline {
                        css: style_blocks.next().unwrap_or_default(),
                    });
                }
                if !VOID_ELEMENTS.contains(&tag.as_str()) {
                    stack.push(index);
                    last_child.push(None);
                }
            }
            Ok(Event::Empty(e)) => {
                let index = push_element(&reader, &e, &mut doc, &stack, &mut last_child, limits)?;
                if doc.elements[index].tag == "style" {
                    doc.stylesheets.push(StylesheetRef::Inline {
                        css: style_blocks.next().unwrap_or_default(),
                    });
                }
            }
            Ok(Event::End(e)) => {
                let tag = decode_tag_name(&reader, e.name().as_ref())?;
                if let Some(pos) = stack
                    .iter()
                    .rposition(|&idx| doc.elements[idx].tag == tag)
                {
                    stack.truncate(pos);
                    last_child.truncate(pos + 1);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(ScanError::new(
                    ErrorPhase::Parse,
                    "DOM_TOKENIZE_ERROR",
                    format!("Markup error: {:?}", err),
                )
                .with_token_offset(reader_token_offset(&reader)));
            }
        }
        buf.clear();
    }

    Ok(doc)
}

fn push_element(
    reader: &Reader<&[u8]>,
    e: &BytesStart<'_>,
    doc: &mut ParsedDocument,
    stack: &[usize],
    last_child: &mut [Option<usize>],
    limits: &LoadLimits,
) -> Result<usize, ScanError> {
    if doc.elements.len() >= limits.max_elements {
        return Err(ScanError::new(
            ErrorPhase::Parse,
            "DOM_ELEMENT_LIMIT",
            "Document exceeds max_elements",
        )
        .with_limit("max_elements", doc.elements.len() + 1, limits.max_elements)
        .with_token_offset(reader_token_offset(reader)));
    }

    let mut element = element_from_start(reader, e, limits.max_inline_style_bytes)?;
    let index = doc.elements.len();
    element.parent = stack.last().copied();
    if let Some(slot) = last_child.last_mut() {
        element.prev_sibling = slot.replace(index);
    }

    match element.tag.as_str() {
        "link" => {
            let rel = element.attribute("rel").unwrap_or("");
            let has_rel = |name: &str| rel.split_whitespace().any(|v| v.eq_ignore_ascii_case(name));
            if has_rel("stylesheet") {
                let alternate = has_rel("alternate");
                if let Some(href) = element.attribute("href") {
                    let href = href.trim();
                    if !href.is_empty() {
                        doc.stylesheets.push(StylesheetRef::Linked {
                            href: href.to_string(),
                            alternate,
                        });
                    }
                }
            }
        }
        "base" if doc.base_href.is_none() => {
            doc.base_href = element.attribute("href").map(|h| h.trim().to_string());
        }
        _ => {}
    }

    doc.elements.push(element);
    Ok(index)
}

fn element_from_start(
    reader: &Reader<&[u8]>,
    e: &BytesStart<'_>,
    max_inline_style_bytes: usize,
) -> Result<Element, ScanError> {
    let tag = decode_tag_name(reader, e.name().as_ref())?;
    let mut element = Element {
        tag,
        ..Element::default()
    };

    for attr in e.html_attributes().flatten() {
        let key = match reader.decoder().decode(attr.key.as_ref()) {
            Ok(v) => v.to_ascii_lowercase(),
            Err(_) => continue,
        };
        let raw = match reader.decoder().decode(&attr.value) {
            Ok(v) => v.to_string(),
            Err(_) => continue,
        };
        let value = match quick_xml::escape::unescape(&raw) {
            Ok(v) => v.into_owned(),
            Err(_) => raw,
        };
        match key.as_str() {
            "id" => element.id = Some(value.clone()),
            "class" => element
                .classes
                .extend(value.split_whitespace().map(str::to_string)),
            "style" => {
                if value.len() > max_inline_style_bytes {
                    log::warn!(
                        "Ignoring style attribute on <{}>: {} bytes exceeds max_inline_style_bytes ({})",
                        element.tag,
                        value.len(),
                        max_inline_style_bytes
                    );
                } else {
                    element.inline_style = Some(DeclarationBlock::parse(&value));
                }
            }
            _ => {}
        }
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn decode_tag_name(reader: &Reader<&[u8]>, raw: &[u8]) -> Result<String, ScanError> {
    let decoded = reader.decoder().decode(raw).map_err(|err| {
        ScanError::new(
            ErrorPhase::Parse,
            "DOM_TOKENIZE_ERROR",
            format!("Decode error: {:?}", err),
        )
        .with_token_offset(reader_token_offset(reader))
    })?;
    let local_name = decoded.rsplit(':').next().unwrap_or(decoded.as_ref());
    Ok(local_name.to_ascii_lowercase())
}

fn reader_token_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

/// Remove the contents of raw-text elements, keeping their tags.
///
/// `<style>` contents are returned in document order. Comments are skipped
/// so a commented-out `<style>` does not shift the order.
fn split_raw_text(html: &str) -> RawTextSplit {
    let lower = html.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut markup = String::with_capacity(html.len());
    let mut style_blocks = Vec::new();
    let mut copy_from = 0usize;
    let mut pos = 0usize;

    while let Some(rel) = lower[pos..].find('<') {
        let lt = pos + rel;
        if lower[lt..].starts_with("<!--") {
            pos = lower[lt + 4..]
                .find("-->")
                .map(|end| lt + 4 + end + 3)
                .unwrap_or(bytes.len());
            continue;
        }
        let Some(tag) = RAW_TEXT_ELEMENTS.iter().find(|tag| {
            lower[lt + 1..].starts_with(**tag)
                && bytes
                    .get(lt + 1 + tag.len())
                    .is_some_and(|b| b.is_ascii_whitespace() || *b == b'>' || *b == b'/')
        }) else {
            pos = lt + 1;
            continue;
        };
        let Some(open_end) = lower[lt..].find('>').map(|gt| lt + gt + 1) else {
            break;
        };
        if html[lt..open_end].ends_with("/>") {
            pos = open_end;
            continue;
        }
        let close_pat = format!("</{}", tag);
        let close = lower[open_end..]
            .find(&close_pat)
            .map(|c| open_end + c)
            .unwrap_or(bytes.len());
        if *tag == "style" {
            style_blocks.push(html[open_end..close].to_string());
        }
        markup.push_str(&html[copy_from..open_end]);
        copy_from = close;
        pos = close;
    }
    markup.push_str(&html[copy_from..]);

    RawTextSplit {
        markup,
        style_blocks,
    }
}
