//! Frame parser for `<service> | <message>` lines
//!
//! Lines that do not follow the convention (banners, blank lines, wrapped
//! continuation lines) are not errors, they simply do not match.
//! Service names containing `|` cannot be represented by this framing.

use crate::types::{LogLine, ServiceId};
use regex::Regex;
use std::sync::LazyLock;

static FRAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9-]+)\s*\|\s*(.*)$").expect("frame pattern is valid")
});

/// Split a line into service id and message, or `None` when it is not framed
pub fn parse_frame(line: &str) -> Option<LogLine> {
    let caps = FRAME_RE.captures(line)?;
    let service = ServiceId::new(caps.get(1)?.as_str())?;
    let message = caps.get(2).map_or("", |m| m.as_str()).to_string();
    Some(LogLine { service, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> Option<(String, String)> {
        parse_frame(line).map(|l| (l.service.to_string(), l.message))
    }

    #[test]
    fn test_compose_style_padding() {
        assert_eq!(
            parsed("web-1    | GET /health 200"),
            Some(("web-1".into(), "GET /health 200".into()))
        );
    }

    #[test]
    fn test_no_whitespace_around_pipe() {
        assert_eq!(parsed("db|ready"), Some(("db".into(), "ready".into())));
    }

    #[test]
    fn test_message_is_verbatim() {
        assert_eq!(
            parsed("api | key=a|b, \"quoted\"; trailing  "),
            Some(("api".into(), "key=a|b, \"quoted\"; trailing  ".into()))
        );
    }

    #[test]
    fn test_empty_message() {
        assert_eq!(parsed("worker |"), Some(("worker".into(), String::new())));
        assert_eq!(parsed("worker |   "), Some(("worker".into(), String::new())));
    }

    #[test]
    fn test_non_matching_lines() {
        assert_eq!(parsed(""), None);
        assert_eq!(parsed("no separator here"), None);
        assert_eq!(parsed("123-abc "), None);
        assert_eq!(parsed("garbage no pipe"), None);
        assert_eq!(parsed(" web | indented"), None);
        assert_eq!(parsed("| missing id"), None);
        assert_eq!(parsed("web_1 | underscore"), None);
    }
}
