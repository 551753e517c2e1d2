//! Metadata document codec
//!
//! The dataset's structured metadata is an `ismrmrdHeader` XML document in
//! the `http://www.ismrm.org/ISMRMRD` namespace. [`serialize`] always writes
//! that root name and namespace with two-space indentation; [`deserialize`]
//! accepts any well-formed document and fills absent fields with defaults.
//!
//! # Example
//!
//! ```
//! use ismrmrd_rust::xml::{self, Encoding, IsmrmrdHeader, Limit};
//!
//! let mut header = IsmrmrdHeader::default();
//! let mut encoding = Encoding {
//!     trajectory: "cartesian".to_string(),
//!     ..Default::default()
//! };
//! encoding.encoding_limits.kspace_encoding_step_1 = Some(Limit::new(0, 127, 64));
//! header.encoding.push(encoding);
//!
//! let text = xml::serialize(&header).unwrap();
//! assert!(text.starts_with("<ismrmrdHeader xmlns=\"http://www.ismrm.org/ISMRMRD\">"));
//!
//! let decoded = xml::deserialize(&text).unwrap();
//! assert_eq!(decoded, header);
//! ```

pub mod model;

use crate::error::{IsmrmrdError, Result};
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::Serialize;

pub use model::*;

/// Namespace of every serialized document
pub const NAMESPACE: &str = "http://www.ismrm.org/ISMRMRD";
/// Root element name of every serialized document
pub const ROOT_ELEMENT: &str = "ismrmrdHeader";

/// Serialize a metadata document to indented XML text
pub fn serialize(header: &IsmrmrdHeader) -> Result<String> {
    let mut text = String::new();
    let mut serializer = quick_xml::se::Serializer::with_root(&mut text, Some(ROOT_ELEMENT))
        .map_err(|e| IsmrmrdError::SchemaViolation(e.to_string()))?;
    serializer.indent(' ', 2);
    header
        .serialize(serializer)
        .map_err(|e| IsmrmrdError::SchemaViolation(e.to_string()))?;
    Ok(text)
}

/// Parse a metadata document from XML text
///
/// Fails with `SchemaViolation` only when the text is not well-formed or a
/// value cannot be parsed as its field's type. Domain rules (such as the
/// presence of at least one encoding block) are left to the caller.
///
/// Leading and trailing whitespace of string values is kept. Numeric values
/// may be padded with whitespace, which is ignored.
pub fn deserialize(text: &str) -> Result<IsmrmrdHeader> {
    let text = protect_edge_whitespace(text)?;
    quick_xml::de::from_str(&text).map_err(|e| IsmrmrdError::SchemaViolation(e.to_string()))
}

/// Parse a metadata document from UTF-8 bytes
pub fn deserialize_bytes(bytes: &[u8]) -> Result<IsmrmrdHeader> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| IsmrmrdError::SchemaViolation(format!("Document is not UTF-8: {}", e)))?;
    deserialize(text)
}

fn schema_error(e: impl std::fmt::Display) -> IsmrmrdError {
    IsmrmrdError::SchemaViolation(e.to_string())
}

/// Rewrite the document so that edge whitespace of every text-only element
/// is written as character references.
///
/// The serde deserializer trims element text before resolving references,
/// so `&#32;` survives where a literal space would not. Indentation between
/// elements is left as is.
fn protect_edge_whitespace(text: &str) -> Result<String> {
    let mut reader = Reader::from_str(text);
    let mut writer = Writer::new(Vec::with_capacity(text.len()));
    let mut after_start = false;
    let mut pending: Option<BytesText<'_>> = None;

    loop {
        let event = match reader.read_event().map_err(schema_error)? {
            Event::Text(t) => {
                if after_start {
                    pending = Some(t);
                } else {
                    writer.write_event(Event::Text(t)).map_err(schema_error)?;
                }
                after_start = false;
                continue;
            }
            event => event,
        };

        if let Some(t) = pending.take() {
            let leaf = matches!(event, Event::End(_));
            let t = if leaf { pad_with_references(t)? } else { t };
            writer.write_event(Event::Text(t)).map_err(schema_error)?;
        }
        after_start = matches!(event, Event::Start(_));
        if let Event::Eof = event {
            break;
        }
        writer.write_event(event).map_err(schema_error)?;
    }

    String::from_utf8(writer.into_inner()).map_err(schema_error)
}

fn is_xml_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

fn pad_with_references(text: BytesText<'_>) -> Result<BytesText<'static>> {
    let raw = text.into_inner();
    let start = raw.iter().position(|&b| !is_xml_space(b)).unwrap_or(raw.len());
    let end = raw.iter().rposition(|&b| !is_xml_space(b)).map_or(start, |i| i + 1);
    let core = std::str::from_utf8(&raw[start..end]).map_err(schema_error)?;

    // Whitespace around numbers collapses
    if !core.is_empty() && core.parse::<f64>().is_ok() {
        return Ok(BytesText::from_escaped(core.to_string()));
    }

    let mut out = String::with_capacity(raw.len() + 16);
    for &b in &raw[..start] {
        out.push_str(&format!("&#{};", b));
    }
    out.push_str(core);
    for &b in &raw[end..] {
        out.push_str(&format!("&#{};", b));
    }
    Ok(BytesText::from_escaped(out))
}
