//! URL helpers for Seda-Harvest
//!
//! Site pages mix absolute links with relative ones such as `./DetailsAlbum/?g=1`.
//! These helpers resolve such links against a base and pull numeric
//! identifiers out of query strings.

use crate::{UrlError, UrlResult};
use url::Url;

/// Resolves a possibly relative link against `base`
///
/// Absolute `http(s)` links are returned trimmed but otherwise untouched.
/// Relative links lose any leading `.` and `/` characters and are joined onto
/// the base, so `./DetailsAlbum/?g=7` and `/DetailsAlbum/?g=7` resolve to the
/// same URL.
///
/// # Examples
///
/// ```
/// use seda_harvest::url::resolve_url;
/// use url::Url;
///
/// let base = Url::parse("https://book.example.org/").unwrap();
/// let url = resolve_url(&base, "./DetailsAlbum/?g=7").unwrap();
/// assert_eq!(url, "https://book.example.org/DetailsAlbum/?g=7");
/// ```
pub fn resolve_url(base: &Url, href: &str) -> UrlResult<String> {
    let href = href.trim();

    if href.starts_with("http://") || href.starts_with("https://") {
        return Ok(href.to_string());
    }

    let relative = href.trim_start_matches(|c: char| c == '.' || c == '/');
    let joined = base
        .join(relative)
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

    match joined.scheme() {
        "http" | "https" => Ok(joined.to_string()),
        other => Err(UrlError::InvalidScheme(other.to_string())),
    }
}

/// Extracts a numeric query parameter from raw link text
///
/// Matches `?name=<digits>` or `&name=<digits>`. The parameter name is compared
/// case-insensitively when `ignore_case` is set. Works on relative links that
/// [`Url`] cannot parse on its own.
pub fn numeric_param(text: &str, name: &str, ignore_case: bool) -> Option<u64> {
    let haystack = if ignore_case {
        text.to_ascii_lowercase()
    } else {
        text.to_string()
    };
    let needle = if ignore_case {
        name.to_ascii_lowercase()
    } else {
        name.to_string()
    };

    let mut search_from = 0;
    while let Some(offset) = haystack[search_from..].find(&needle) {
        let start = search_from + offset;
        let end = start + needle.len();
        search_from = start + 1;

        let preceded = start > 0 && matches!(haystack.as_bytes()[start - 1], b'?' | b'&');
        let followed = haystack.as_bytes().get(end) == Some(&b'=');
        if !preceded || !followed {
            continue;
        }

        let digits: String = haystack[end + 1..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(value) = digits.parse() {
            return Some(value);
        }
    }

    None
}
