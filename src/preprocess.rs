//! Record flattening: turns one XML data file into flat rows.
//!
//! A data file has a single root element whose children are day groups. Each day
//! group carries the attributes shared by that day (date, plaza id, ...) and contains
//! one element per child record (hour, direction, counts). Every child record becomes
//! one [`FlatRow`]: the day's attributes merged with the child's, child winning on a
//! key collision.
//!
//! Values are kept as text here; [`table`](crate::table) decides column types.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::contract::{SkipReason, SkippedItem};
use crate::error::MarkupError;

/// Ordered attribute list of one element, as it appears in the document.
pub type Attributes = Vec<(String, String)>;

/// Top-level unit of a data file: one reporting day.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DayGroup {
    pub attributes: Attributes,
    pub children: Vec<ChildRecord>,
}

/// Leaf unit inside a day group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChildRecord {
    pub attributes: Attributes,
}

/// A parsed data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root: String,
    pub days: Vec<DayGroup>,
}

/// Field-to-value mapping for one output row. Keys are unique; order is
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlatRow {
    fields: Vec<(String, String)>,
}

impl FlatRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing value in place (last write wins).
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FlatRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = FlatRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

/// Merges day-level and child-level attributes into one row.
///
/// Day attributes are applied first and child attributes second, so on a key
/// collision the child's value is kept. Day keys keep their position; new child
/// keys are appended.
pub fn merge_attributes(day: &[(String, String)], child: &[(String, String)]) -> FlatRow {
    let mut row = FlatRow::new();
    for (k, v) in day.iter().chain(child) {
        row.insert(k.as_str(), v.as_str());
    }
    row
}

/// Parses a data file into its day groups and child records.
///
/// Fails unless the text is a well-formed XML document with exactly one root element.
/// Elements nested below child records are checked for well-formedness but otherwise
/// ignored, as is text content and the root's own attributes.
pub fn parse_document(text: &str) -> Result<Document, MarkupError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut builder = DocumentBuilder::default();
    loop {
        let event = reader.read_event().map_err(|e| MarkupError::Syntax {
            position: reader.error_position() as u64,
            message: e.to_string(),
        })?;
        match event {
            Event::Start(e) => {
                builder.open(&e, reader.buffer_position() as u64)?;
                builder.open_elements.push(element_name(&e));
            }
            Event::Empty(e) => {
                builder.open(&e, reader.buffer_position() as u64)?;
                if builder.open_elements.is_empty() {
                    builder.root_closed = true;
                }
            }
            Event::End(_) => {
                // quick-xml rejects unmatched and mismatched end tags itself
                builder.open_elements.pop();
                if builder.open_elements.is_empty() {
                    builder.root_closed = true;
                }
            }
            Event::Text(t) => {
                // entity references are checked at every depth, even where text is ignored
                let text = t.unescape().map_err(|e| MarkupError::Syntax {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                })?;
                if builder.open_elements.is_empty() && !text.trim().is_empty() {
                    return Err(MarkupError::TextOutsideRoot {
                        position: reader.buffer_position() as u64,
                    });
                }
            }
            Event::CData(_) if builder.open_elements.is_empty() => {
                return Err(MarkupError::TextOutsideRoot {
                    position: reader.buffer_position() as u64,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }
    builder.finish()
}

#[derive(Default)]
struct DocumentBuilder {
    root: Option<String>,
    root_closed: bool,
    open_elements: Vec<String>,
    days: Vec<DayGroup>,
}

impl DocumentBuilder {
    /// Records an opening (or self-closing) element at the current depth.
    fn open(&mut self, element: &BytesStart<'_>, position: u64) -> Result<(), MarkupError> {
        let name = element_name(element);
        check_name(&name, position)?;
        let attributes = read_attributes(element, &name, position)?;
        match self.open_elements.len() {
            0 => {
                if self.root.is_some() {
                    return Err(MarkupError::MultipleRoots { element: name });
                }
                self.root = Some(name);
            }
            1 => self.days.push(DayGroup {
                attributes,
                children: Vec::new(),
            }),
            2 => {
                if let Some(day) = self.days.last_mut() {
                    day.children.push(ChildRecord { attributes });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Document, MarkupError> {
        if let Some(element) = self.open_elements.pop() {
            return Err(MarkupError::Unclosed { element });
        }
        match self.root {
            Some(root) if self.root_closed => Ok(Document {
                root,
                days: self.days,
            }),
            Some(element) => Err(MarkupError::Unclosed { element }),
            None => Err(MarkupError::NoRootElement),
        }
    }
}

fn element_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

/// XML `Name` production: a letter, `_` or `:` first, then also digits, `-` and `.`.
/// Non-ASCII characters are accepted in either position.
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let start = |c: char| c.is_alphabetic() || c == '_' || c == ':' || !c.is_ascii();
    start(first) && chars.all(|c| start(c) || c.is_ascii_digit() || c == '-' || c == '.')
}

fn check_name(name: &str, position: u64) -> Result<(), MarkupError> {
    if is_xml_name(name) {
        Ok(())
    } else {
        Err(MarkupError::InvalidName {
            name: name.to_string(),
            position,
        })
    }
}

fn read_attributes(
    element: &BytesStart<'_>,
    name: &str,
    position: u64,
) -> Result<Attributes, MarkupError> {
    let bad = |message: String| MarkupError::Attribute {
        element: name.to_string(),
        message,
    };
    let mut out = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| bad(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        check_name(&key, position)?;
        if attr.value.contains(&b'<') {
            return Err(bad(format!("'<' in value of '{key}'")));
        }
        let value = attr.unescape_value().map_err(|e| bad(e.to_string()))?;
        out.push((key, value.into_owned()));
    }
    Ok(out)
}

/// Checks that a payload is a well-formed data file without keeping the parse.
pub fn validate_markup(text: &str) -> Result<(), MarkupError> {
    parse_document(text).map(|_| ())
}

/// Flattens a parsed document into one row per child record, in document order.
pub fn flatten_document(document: &Document) -> Vec<FlatRow> {
    document
        .days
        .iter()
        .flat_map(|day| {
            day.children
                .iter()
                .map(move |child| merge_attributes(&day.attributes, &child.attributes))
        })
        .collect()
}

/// Parses and flattens one payload.
pub fn flatten(text: &str) -> Result<Vec<FlatRow>, MarkupError> {
    let document = parse_document(text)?;
    let rows = flatten_document(&document);
    debug!(
        root = %document.root,
        days = document.days.len(),
        rows = rows.len(),
        "Flattened document"
    );
    Ok(rows)
}

/// Like [`flatten`], but a malformed payload is logged as a warning naming `link`
/// and returned as a [`SkippedItem`] for the run report.
pub fn flatten_or_skip(link: &str, text: &str) -> Result<Vec<FlatRow>, SkippedItem> {
    flatten(text).map_err(|e| {
        warn!(link = %link, error = %e, "Could not parse data file, skipping");
        SkippedItem {
            link: link.to_string(),
            reason: SkipReason::InvalidMarkup(e),
        }
    })
}
