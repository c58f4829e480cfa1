//! 全文内容提取
//!
//! Turns a document content stream into indexable text:
//! - MIME allow-list check before the content is fetched
//! - only textual MIME types are decoded, binary content is skipped
//! - decoding honours a BOM, then a `charset` parameter, then falls back
//!   UTF-8 → GBK → Windows-1252
//! - the decoded text is cut at `max_content_bytes` on a char boundary

use encoding_rs::{Encoding, GBK, UTF_8, WINDOWS_1252};
use tracing::debug;

use crate::infrastructure::config::FulltextConfig;
use crate::models::ContentStream;

const TEXTUAL_APPLICATION_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/javascript",
    "application/x-javascript",
    "application/yaml",
    "application/x-yaml",
    "application/x-sh",
    "application/sql",
    "application/csv",
];

/// `text/plain; charset=utf-8` → `text/plain`
fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn charset(mime_type: &str) -> Option<&'static Encoding> {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, value)| Encoding::for_label(value.trim().trim_matches('"').as_bytes()))
}

/// Whether content of this MIME type should be fetched at all.
pub fn is_allowed(mime_type: Option<&str>, config: &FulltextConfig) -> bool {
    if !config.enabled {
        return false;
    }
    if !config.mime_filter_enabled {
        return true;
    }
    let Some(mime_type) = mime_type else {
        return false;
    };
    let essence = essence(mime_type);
    config
        .allowed_mime_types
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&essence))
}

pub fn is_textual(mime_type: &str) -> bool {
    let essence = essence(mime_type);
    essence.starts_with("text/")
        || essence.ends_with("+xml")
        || essence.ends_with("+json")
        || TEXTUAL_APPLICATION_TYPES.contains(&essence.as_str())
}

/// Indexable text of `content`, `None` for binary or empty content.
pub fn extract_text(content: &ContentStream, max_content_bytes: usize) -> Option<String> {
    if !is_textual(&content.mime_type) {
        debug!(mime_type = %content.mime_type, "Skipping non-textual content");
        return None;
    }

    let (mut text, encoding) = decode(&content.bytes, charset(&content.mime_type));
    if text.len() > max_content_bytes {
        let mut cut = max_content_bytes;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    debug!(encoding, bytes = content.bytes.len(), chars = text.len(), "Decoded content stream");

    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn decode(bytes: &[u8], declared: Option<&'static Encoding>) -> (String, &'static str) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return (text.into_owned(), encoding.name());
    }

    if let Some(encoding) = declared {
        let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
        if !had_errors {
            return (text.into_owned(), encoding.name());
        }
    }

    let (text, had_errors) = UTF_8.decode_without_bom_handling(bytes);
    if !had_errors {
        return (text.into_owned(), UTF_8.name());
    }

    let (text, had_errors) = GBK.decode_without_bom_handling(bytes);
    if !had_errors {
        return (text.into_owned(), GBK.name());
    }

    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    (text.into_owned(), WINDOWS_1252.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn stream(mime_type: &str, bytes: &[u8]) -> ContentStream {
        ContentStream {
            mime_type: mime_type.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[rstest]
    #[case("text/plain", true)]
    #[case("text/html; charset=utf-8", true)]
    #[case("application/json", true)]
    #[case("application/atom+xml", true)]
    #[case("application/pdf", false)]
    #[case("image/png", false)]
    fn test_is_textual(#[case] mime: &str, #[case] expected: bool) {
        assert_eq!(is_textual(mime), expected);
    }

    #[test]
    fn test_allow_list() {
        let mut config = FulltextConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(is_allowed(Some("application/pdf"), &config));

        config.mime_filter_enabled = true;
        config.allowed_mime_types = vec!["text/plain".into()];
        assert!(is_allowed(Some("Text/Plain; charset=utf-8"), &config));
        assert!(!is_allowed(Some("application/pdf"), &config));
        assert!(!is_allowed(None, &config));

        config.enabled = false;
        assert!(!is_allowed(Some("text/plain"), &config));
    }

    #[test]
    fn test_decode_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "héllo".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let text = extract_text(&stream("text/plain", &bytes), 1024);
        assert_eq!(text.as_deref(), Some("héllo"));
    }

    #[test]
    fn test_decode_gbk_fallback() {
        let text = extract_text(&stream("text/plain", b"\xc4\xe3\xba\xc3"), 1024);
        assert_eq!(text.as_deref(), Some("你好"));
    }

    #[test]
    fn test_declared_charset() {
        let text = extract_text(&stream("text/plain; charset=windows-1252", b"caf\xe9"), 1024);
        assert_eq!(text.as_deref(), Some("café"));
    }

    #[test]
    fn test_truncates_on_char_boundary() {
        let text = extract_text(&stream("text/plain", "aé".as_bytes()), 2).unwrap();
        assert_eq!(text, "a");
    }

    #[test]
    fn test_binary_and_blank_content() {
        assert_eq!(extract_text(&stream("application/pdf", b"%PDF-1.7"), 1024), None);
        assert_eq!(extract_text(&stream("text/plain", b"   \n"), 1024), None);
    }
}
