//! Byte-level URL parsing.
//!
//! The parser records component offsets as [`Span`]s into the original string so
//! accessors on [`Url`](crate::Url) never re-parse.

use crate::error::{ParseError, ParseErrorKind};
use crate::{DataComponents, OpaqueComponents, ParsedComponents, ReferenceComponents, Span, WebComponents};

// ============================================================================
// Public API
// ============================================================================

/// Detects the URL type and parses its components.
pub(crate) fn parse_url(bytes: &[u8]) -> Result<ParsedComponents, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::new(ParseErrorKind::Empty));
    }
    if u32::try_from(bytes.len()).is_err() {
        return Err(ParseError::new(ParseErrorKind::TooLong));
    }

    if starts_with_ignore_case(bytes, b"data:") {
        return Ok(ParsedComponents::Data(parse_data_url(bytes)));
    }

    if let Some(scheme_end) = find_scheme_end(bytes) {
        if bytes[scheme_end..].starts_with(b"://") {
            let web = parse_web_url(bytes, scheme_end);
            validate_web_url(&web, bytes)?;
            return Ok(ParsedComponents::Web(web));
        }
        return Ok(ParsedComponents::Opaque(parse_opaque(bytes, scheme_end)));
    }

    Ok(ParsedComponents::Reference(parse_reference(bytes)))
}

fn validate_web_url(web: &WebComponents, bytes: &[u8]) -> Result<(), ParseError> {
    if !web.host.is_present() || web.host.is_empty() {
        return Err(ParseError::new(ParseErrorKind::MissingHost));
    }

    if web.port.is_present() {
        let port = &bytes[web.port.range()];
        let valid = !port.is_empty()
            && port.iter().all(u8::is_ascii_digit)
            && core::str::from_utf8(port)
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .is_some_and(|p| p != 0);
        if !valid {
            return Err(ParseError::new(ParseErrorKind::InvalidPort));
        }
    }

    Ok(())
}

// ============================================================================
// Web URL Parser
// ============================================================================

fn parse_web_url(bytes: &[u8], scheme_end: usize) -> WebComponents {
    let len = bytes.len();
    let scheme = Span::new(0, scheme_end);

    let authority_start = scheme_end + 3;
    let authority_end = find_char_or_end(bytes, authority_start, b"/?#");
    let authority = if authority_end > authority_start {
        Span::new(authority_start, authority_end)
    } else {
        Span::NONE
    };

    let (host, port) = parse_host_port(bytes, authority_start, authority_end);
    let (path, query, fragment) = parse_tail(bytes, authority_end, len);

    WebComponents {
        scheme,
        authority,
        host,
        port,
        path,
        query,
        fragment,
    }
}

/// Parses host and port from the authority section.
fn parse_host_port(bytes: &[u8], start: usize, end: usize) -> (Span, Span) {
    if start >= end {
        return (Span::NONE, Span::NONE);
    }

    // userinfo is skipped
    let host_start = find_byte(bytes, start, end, b'@').map_or(start, |at| at + 1);
    if host_start >= end {
        return (Span::NONE, Span::NONE);
    }

    let mut in_ipv6 = false;
    let mut colon = None;
    for (i, &b) in bytes.iter().enumerate().take(end).skip(host_start) {
        match b {
            b'[' => in_ipv6 = true,
            b']' => in_ipv6 = false,
            b':' if !in_ipv6 => colon = Some(i),
            _ => {}
        }
    }

    match colon {
        Some(colon) => (Span::new(host_start, colon), Span::new(colon + 1, end)),
        None => (Span::new(host_start, end), Span::NONE),
    }
}

// ============================================================================
// Data URL Parser
// ============================================================================

fn parse_data_url(bytes: &[u8]) -> DataComponents {
    // data:[<mediatype>][;base64],<data>
    let len = bytes.len();
    let pos = 5;

    let Some(comma) = find_byte(bytes, pos, len, b',') else {
        return DataComponents {
            mime_type: Span::NONE,
            data: Span::new(pos, len),
        };
    };

    let mime_end = find_byte(bytes, pos, comma, b';').unwrap_or(comma);
    let mime_type = if mime_end > pos {
        Span::new(pos, mime_end)
    } else {
        Span::NONE
    };

    DataComponents {
        mime_type,
        data: Span::new(comma + 1, len),
    }
}

// ============================================================================
// Opaque URI Parser
// ============================================================================

fn parse_opaque(bytes: &[u8], scheme_end: usize) -> OpaqueComponents {
    let (path, query, fragment) = parse_tail(bytes, scheme_end + 1, bytes.len());
    OpaqueComponents {
        scheme: Span::new(0, scheme_end),
        path,
        query,
        fragment,
    }
}

// ============================================================================
// Relative Reference Parser
// ============================================================================

fn parse_reference(bytes: &[u8]) -> ReferenceComponents {
    let len = bytes.len();
    let (path, query, fragment) = parse_tail(bytes, 0, len);
    ReferenceComponents {
        path,
        query,
        fragment,
        network_path: bytes.starts_with(b"//"),
    }
}

/// Splits `bytes[start..end]` into path, query and fragment spans.
fn parse_tail(bytes: &[u8], start: usize, end: usize) -> (Span, Span, Span) {
    let path_end = find_char_or_end(bytes, start, b"?#").min(end);
    let path = if path_end > start {
        Span::new(start, path_end)
    } else {
        Span::NONE
    };

    let mut pos = path_end;
    let query = if pos < end && bytes[pos] == b'?' {
        let query_end = find_char_or_end(bytes, pos + 1, b"#").min(end);
        let span = Span::new(pos + 1, query_end);
        pos = query_end;
        span
    } else {
        Span::NONE
    };

    let fragment = if pos < end && bytes[pos] == b'#' {
        Span::new(pos + 1, end)
    } else {
        Span::NONE
    };

    (path, query, fragment)
}

// ============================================================================
// Helpers
// ============================================================================

/// Finds the end of a syntactically valid scheme (position of ':').
fn find_scheme_end(bytes: &[u8]) -> Option<usize> {
    if !bytes.first()?.is_ascii_alphabetic() {
        return None;
    }
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b':' => return Some(i),
            b if b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.') => {}
            _ => return None,
        }
    }
    None
}

fn find_char_or_end(bytes: &[u8], start: usize, chars: &[u8]) -> usize {
    bytes
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, b)| chars.contains(b))
        .map_or(bytes.len(), |(i, _)| i)
}

fn find_byte(bytes: &[u8], start: usize, end: usize, needle: u8) -> Option<usize> {
    bytes[start..end]
        .iter()
        .position(|&b| b == needle)
        .map(|i| start + i)
}

fn starts_with_ignore_case(bytes: &[u8], prefix: &[u8]) -> bool {
    bytes.len() >= prefix.len() && bytes[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Removes `.` and `..` segments from a path.
pub(crate) fn remove_dot_segments(path: &str) -> String {
    let absolute = path.starts_with('/');
    let trailing = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    let mut out: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }

    let mut result = String::with_capacity(path.len());
    if absolute {
        result.push('/');
    }
    result.push_str(&out.join("/"));
    if trailing && !out.is_empty() {
        result.push('/');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_detection() {
        assert_eq!(find_scheme_end(b"https://example.com"), Some(5));
        assert_eq!(find_scheme_end(b"svn+ssh://host"), Some(7));
        assert_eq!(find_scheme_end(b"/path:with:colons"), None);
        assert_eq!(find_scheme_end(b"1abc://x"), None);
        assert_eq!(find_scheme_end(b"relative/path"), None);
    }

    #[test]
    fn test_reject_malformed_web_urls() {
        assert_eq!(
            parse_url(b"https://").unwrap_err().kind(),
            ParseErrorKind::MissingHost
        );
        assert_eq!(
            parse_url(b"https://example.com:abc/").unwrap_err().kind(),
            ParseErrorKind::InvalidPort
        );
        assert_eq!(
            parse_url(b"https://example.com:99999").unwrap_err().kind(),
            ParseErrorKind::InvalidPort
        );
        assert_eq!(parse_url(b"").unwrap_err().kind(), ParseErrorKind::Empty);
    }

    #[test]
    fn test_remove_dot_segments() {
        assert_eq!(remove_dot_segments("/a/b/c/./../../g"), "/a/g");
        assert_eq!(remove_dot_segments("mid/content=5/../6"), "mid/6");
        assert_eq!(remove_dot_segments("/a/b/"), "/a/b/");
        assert_eq!(remove_dot_segments("/a/b/.."), "/a/");
        assert_eq!(remove_dot_segments("/../x"), "/x");
    }

    #[test]
    fn test_parse_tail() {
        let bytes = b"/p/a?q=1#frag";
        let (path, query, fragment) = parse_tail(bytes, 0, bytes.len());
        assert_eq!(&bytes[path.range()], b"/p/a");
        assert_eq!(&bytes[query.range()], b"q=1");
        assert_eq!(&bytes[fragment.range()], b"frag");
    }
}
