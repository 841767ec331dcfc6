//! Session cookie loading for authenticated caption requests.
//!
//! Two export formats are accepted: Netscape `cookies.txt` (as written by
//! browser extensions and `yt-dlp --cookies`) and a JSON array of objects
//! with `name`/`value`/`domain` keys.

use std::path::Path;
use std::sync::Arc;

use reqwest::cookie::Jar;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("cannot read cookie file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cookie file {0} is not valid JSON or Netscape format")]
    Format(String),
    #[error("cookie file {0} contains no cookies")]
    Empty(String),
}

/// One cookie from an export file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub name: String,
    pub value: String,
}

impl SessionCookie {
    fn set_cookie_header(&self) -> String {
        let mut header = format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, self.path
        );
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }

    fn origin_url(&self) -> Option<reqwest::Url> {
        let host = self.domain.trim_start_matches('.');
        format!("https://{}{}", host, self.path).parse().ok()
    }
}

/// Parse a cookie export, detecting its format from the content.
pub fn parse_cookie_file(content: &str, label: &str) -> Result<Vec<SessionCookie>, CookieError> {
    let trimmed = content.trim_start();
    let cookies = if trimmed.starts_with('[') {
        parse_json(trimmed).ok_or_else(|| CookieError::Format(label.to_string()))?
    } else {
        parse_netscape(content)
    };
    if cookies.is_empty() {
        return Err(CookieError::Empty(label.to_string()));
    }
    Ok(cookies)
}

fn parse_netscape(content: &str) -> Vec<SessionCookie> {
    content
        .lines()
        .filter_map(|line| {
            // `#HttpOnly_` prefixes a real cookie line; other `#` lines are comments.
            let line = line.strip_prefix("#HttpOnly_").unwrap_or(line);
            if line.trim().is_empty() || line.starts_with('#') {
                return None;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 7 {
                return None;
            }
            Some(SessionCookie {
                domain: fields[0].to_string(),
                path: fields[2].to_string(),
                secure: fields[3].eq_ignore_ascii_case("TRUE"),
                name: fields[5].to_string(),
                value: fields[6].trim_end_matches(['\r', '\n']).to_string(),
            })
        })
        .filter(|c| !c.name.is_empty() && !c.domain.is_empty())
        .collect()
}

fn parse_json(content: &str) -> Option<Vec<SessionCookie>> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(content).ok()?;
    Some(
        entries
            .iter()
            .filter_map(|cookie| {
                let field = |key: &str| cookie.get(key).and_then(|v| v.as_str());
                let name = field("name").or_else(|| field("key"))?;
                let domain = field("domain")?;
                if name.is_empty() || domain.is_empty() {
                    return None;
                }
                Some(SessionCookie {
                    domain: domain.to_string(),
                    path: field("path").unwrap_or("/").to_string(),
                    secure: cookie.get("secure").and_then(|v| v.as_bool()).unwrap_or(false),
                    name: name.to_string(),
                    value: field("value").unwrap_or_default().to_string(),
                })
            })
            .collect(),
    )
}

/// Read a cookie file and build a reqwest cookie jar from it.
pub fn load_cookie_jar(path: &Path) -> Result<Arc<Jar>, CookieError> {
    let label = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| CookieError::Io {
        path: label.clone(),
        source,
    })?;
    let cookies = parse_cookie_file(&content, &label)?;

    let jar = Jar::default();
    for cookie in &cookies {
        if let Some(url) = cookie.origin_url() {
            jar.add_cookie_str(&cookie.set_cookie_header(), &url);
        }
    }
    debug!("Loaded {} session cookies from {}", cookies.len(), label);
    Ok(Arc::new(jar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const NETSCAPE: &str = "# Netscape HTTP Cookie File\n\
        .youtube.com\tTRUE\t/\tTRUE\t1999999999\tSID\tabc123\n\
        #HttpOnly_.youtube.com\tTRUE\t/\tTRUE\t1999999999\tHSID\tdef456\n\
        \n\
        broken line\n";

    #[test]
    fn test_parse_netscape() {
        let cookies = parse_cookie_file(NETSCAPE, "cookies.txt").unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "SID");
        assert_eq!(cookies[0].value, "abc123");
        assert!(cookies[0].secure);
        assert_eq!(cookies[1].name, "HSID");
    }

    #[test]
    fn test_parse_json_export() {
        let json = r#"[{"name":"SID","value":"x","domain":".youtube.com","secure":true},
                       {"key":"PREF","value":"y","domain":"www.youtube.com"},
                       {"name":"","value":"z","domain":".youtube.com"}]"#;
        let cookies = parse_cookie_file(json, "cookies.json").unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[1].name, "PREF");
        assert_eq!(cookies[1].path, "/");
    }

    #[test]
    fn test_empty_and_malformed() {
        assert!(matches!(
            parse_cookie_file("# only comments\n", "c.txt"),
            Err(CookieError::Empty(_))
        ));
        assert!(matches!(
            parse_cookie_file("[not json", "c.json"),
            Err(CookieError::Format(_))
        ));
    }

    #[test]
    fn test_load_cookie_jar_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(NETSCAPE.as_bytes()).unwrap();
        assert!(load_cookie_jar(file.path()).is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_cookie_jar(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, CookieError::Io { .. }));
    }
}
