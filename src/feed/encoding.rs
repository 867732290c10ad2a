//! Character encoding detection and decoding for fetched feed bodies.
//!
//! Feeds arrive as raw bytes in whatever charset the publisher chose. The
//! encoding is resolved in this order:
//!
//! 1. Byte-order mark (UTF-8, UTF-16LE, UTF-16BE)
//! 2. The `encoding` attribute of the XML declaration
//! 3. The `charset` parameter of the HTTP `Content-Type` header
//! 4. UTF-8, if the bytes are valid UTF-8
//!
//! An unknown label, a UTF-16 label without a byte-order mark, or bytes that
//! match none of the above are rejected rather than decoded with a guess.

use std::borrow::Cow;
use std::ops::Range;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use thiserror::Error;

/// How far into the body the XML declaration is searched for.
const DECLARATION_SCAN_LIMIT: usize = 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// A declared charset label that `encoding_rs` does not know.
    #[error("Unknown character encoding: {0}")]
    UnknownEncoding(String),

    /// UTF-16 was declared, but the body has no byte-order mark.
    #[error("Declared {0} without a byte-order mark")]
    MissingBom(String),

    /// Nothing declared and the body is not valid UTF-8.
    #[error("Could not detect character encoding")]
    Undetected,

    /// The body contains byte sequences invalid for the detected encoding.
    #[error("Body is not valid {0}")]
    Malformed(&'static str),
}

/// Detected encoding plus the number of leading BOM bytes to skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detected {
    pub encoding: &'static Encoding,
    pub bom_len: usize,
}

/// Resolve the encoding of `bytes`. `content_type` is the raw HTTP header, if any.
pub fn detect(bytes: &[u8], content_type: Option<&str>) -> Result<Detected, DecodeError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return Ok(Detected { encoding, bom_len });
    }

    let labels = [
        declared_label(bytes),
        content_type.and_then(charset_param).map(str::to_owned),
    ];
    if let Some(label) = labels.into_iter().flatten().next() {
        let Some(encoding) = Encoding::for_label(label.trim().as_bytes()) else {
            return Err(DecodeError::UnknownEncoding(label));
        };
        // A label readable as ASCII means the body is not actually UTF-16
        if encoding == UTF_16LE || encoding == UTF_16BE {
            return Err(DecodeError::MissingBom(label));
        }
        return Ok(Detected {
            encoding,
            bom_len: 0,
        });
    }

    if std::str::from_utf8(bytes).is_ok() {
        return Ok(Detected {
            encoding: UTF_8,
            bom_len: 0,
        });
    }

    Err(DecodeError::Undetected)
}

/// Detect, then strictly decode to UTF-8 text.
///
/// The XML declaration of the result is rewritten to say `UTF-8` so the
/// parser does not try to transcode the text a second time.
pub fn decode(bytes: &[u8], content_type: Option<&str>) -> Result<String, DecodeError> {
    let Detected { encoding, bom_len } = detect(bytes, content_type)?;
    tracing::debug!(encoding = encoding.name(), "Detected feed encoding");

    let text = encoding
        .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
        .ok_or(DecodeError::Malformed(encoding.name()))?;

    if let Cow::Owned(relabelled) = relabel_declaration(&text) {
        return Ok(relabelled);
    }
    Ok(text.into_owned())
}

fn declared_label(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(DECLARATION_SCAN_LIMIT)];
    let head = String::from_utf8_lossy(head);
    let decl = xml_declaration(&head)?;
    let range = encoding_value(decl)?;
    Some(decl[range].to_string())
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches(|c| c == '"' || c == '\''))
        } else {
            None
        }
    })
}

/// The `<?xml ... ?>` prefix of `text`, if present.
fn xml_declaration(text: &str) -> Option<&str> {
    let trimmed = text.trim_start();
    if !trimmed.starts_with("<?xml") {
        return None;
    }
    let end = trimmed.find("?>")?;
    Some(&trimmed[..end + 2])
}

/// Byte range of the encoding attribute's value inside a declaration.
fn encoding_value(decl: &str) -> Option<Range<usize>> {
    let attr = decl.find("encoding")?;
    let rest = &decl[attr + "encoding".len()..];
    let eq = rest.find('=')?;
    if !rest[..eq].trim().is_empty() {
        return None;
    }
    let after_eq = &rest[eq + 1..];
    let quote_offset = after_eq.len() - after_eq.trim_start().len();
    let quote = after_eq[quote_offset..].chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }

    let start = attr + "encoding".len() + eq + 1 + quote_offset + 1;
    let len = decl[start..].find(quote)?;
    Some(start..start + len)
}

fn relabel_declaration(text: &str) -> Cow<'_, str> {
    let Some(decl) = xml_declaration(text) else {
        return Cow::Borrowed(text);
    };
    let Some(range) = encoding_value(decl) else {
        return Cow::Borrowed(text);
    };
    if decl[range.clone()].eq_ignore_ascii_case("utf-8") {
        return Cow::Borrowed(text);
    }

    let offset = text.len() - text.trim_start().len();
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..offset + range.start]);
    out.push_str("UTF-8");
    out.push_str(&text[offset + range.end..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_utf8_without_declaration() {
        let detected = detect("<rss>héllo</rss>".as_bytes(), None).unwrap();
        assert_eq!(detected.encoding, UTF_8);
        assert_eq!(detected.bom_len, 0);
    }

    #[test]
    fn test_bom_wins() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(br#"<?xml version="1.0" encoding="ISO-8859-1"?><rss/>"#);
        let detected = detect(&bytes, None).unwrap();
        assert_eq!(detected.encoding, UTF_8);
        assert_eq!(detected.bom_len, 3);
    }

    #[test]
    fn test_declared_latin1_is_decoded() {
        let mut bytes = br#"<?xml version="1.0" encoding="ISO-8859-1"?><rss><t>caf"#.to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"</t></rss>");

        let text = decode(&bytes, None).unwrap();
        assert!(text.contains("café"));
        assert!(text.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    }

    #[test]
    fn test_single_quoted_declaration() {
        let bytes = b"<?xml version='1.0' encoding='windows-1252'?><rss/>";
        let detected = detect(bytes, None).unwrap();
        assert_eq!(detected.encoding.name(), "windows-1252");
    }

    #[test]
    fn test_content_type_charset() {
        let bytes = [b'<', b'r', b's', b's', b'>', 0xE9, b'<', b'/', b'r', b's', b's', b'>'];
        let text = decode(&bytes, Some("application/rss+xml; charset=\"iso-8859-1\"")).unwrap();
        assert_eq!(text, "<rss>é</rss>");
    }

    #[test]
    fn test_declaration_beats_content_type() {
        let bytes = br#"<?xml version="1.0" encoding="utf-8"?><rss/>"#;
        let detected = detect(bytes, Some("text/xml; charset=iso-8859-1")).unwrap();
        assert_eq!(detected.encoding, UTF_8);
    }

    #[test]
    fn test_unknown_label_fails() {
        let bytes = br#"<?xml version="1.0" encoding="x-made-up"?><rss/>"#;
        let err = detect(bytes, None).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownEncoding(label) if label == "x-made-up"));
    }

    #[test]
    fn test_utf16_declared_without_bom_fails() {
        let bytes = br#"<?xml version="1.0" encoding="UTF-16"?><rss/>"#;
        let err = detect(bytes, None).unwrap_err();
        assert!(matches!(err, DecodeError::MissingBom(label) if label == "UTF-16"));

        let err = decode(b"<rss/>", Some("text/xml; charset=utf-16be")).unwrap_err();
        assert!(matches!(err, DecodeError::MissingBom(_)));
    }

    #[test]
    fn test_utf16_with_bom_decodes() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<rss>é</rss>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode(&bytes, None).unwrap(), "<rss>é</rss>");
    }

    #[test]
    fn test_undetectable_bytes_fail() {
        let bytes = [b'<', b'r', b's', b's', b'>', 0xFF, 0xFE, 0xFD];
        assert!(matches!(detect(&bytes, None), Err(DecodeError::Undetected)));
    }

    #[test]
    fn test_invalid_bytes_for_declared_encoding() {
        let mut bytes = br#"<?xml version="1.0" encoding="UTF-8"?><rss>"#.to_vec();
        bytes.push(0xC3);
        bytes.extend_from_slice(b"</rss>");
        assert!(matches!(
            decode(&bytes, None),
            Err(DecodeError::Malformed("UTF-8"))
        ));
    }

    #[test]
    fn test_utf8_declaration_left_alone() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?><rss/>"#;
        assert_eq!(decode(xml.as_bytes(), None).unwrap(), xml);
    }

    #[test]
    fn test_charset_param_parsing() {
        assert_eq!(charset_param("text/xml; charset=UTF-8"), Some("UTF-8"));
        assert_eq!(charset_param("text/xml;CHARSET='koi8-r'"), Some("koi8-r"));
        assert_eq!(charset_param("text/xml"), None);
    }
}
