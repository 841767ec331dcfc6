//! Text cleanup helpers for caption payloads and page strings.

use std::sync::LazyLock;

use regex::Regex;

static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap());

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Decode the HTML entities that appear in caption payloads.
pub fn html_unescape(s: &str) -> String {
    let decoded = NUMERIC_ENTITY.replace_all(s, |caps: &regex::Captures| {
        let body = &caps[1];
        let code = match body.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => body.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(|c| c.to_string())
            .unwrap_or_else(|| caps[0].to_string())
    });
    decoded
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Remove markup tags, keeping inner text.
pub fn strip_tags(s: &str) -> String {
    TAG.replace_all(s, "").into_owned()
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Join caption lines into one paragraph, dropping consecutive duplicates.
///
/// Rolling auto-generated captions repeat the previous line in each cue.
pub fn join_caption_lines<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for line in lines {
        let line = collapse_whitespace(line.as_ref());
        if line.is_empty() || out.last().is_some_and(|prev| *prev == line) {
            continue;
        }
        out.push(line);
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_unescape() {
        assert_eq!(html_unescape("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(html_unescape("it&#39;s"), "it's");
        assert_eq!(html_unescape("&#x41;&lt;b&gt;"), "A<b>");
        assert_eq!(html_unescape("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<c.colorE5E5E5>hello</c> <i>world</i>"), "hello world");
    }

    #[test]
    fn test_join_caption_lines_dedupes_consecutive() {
        let lines = ["hello", "hello", " world ", "", "hello"];
        assert_eq!(join_caption_lines(lines), "hello world hello");
    }
}
