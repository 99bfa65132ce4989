// src/utils/url.rs

//! URL canonicalization utilities.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{AppError, Result};

static DISPLAY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:www\.)?").expect("display prefix pattern is valid")
});

/// Canonicalize a user-supplied URL.
///
/// The protocol defaults to `https://` when absent; only `http` and `https`
/// are accepted.
///
/// # Examples
/// ```
/// use sitewatch::utils::url::format_url;
///
/// assert_eq!(format_url("example.com").unwrap(), "https://example.com/");
/// assert_eq!(
///     format_url("http://example.com/page").unwrap(),
///     "http://example.com/page"
/// );
/// ```
pub fn format_url(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("URL is empty"));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches('/'))
    };

    let parsed = Url::parse(&candidate)?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AppError::validation(format!(
                "unsupported URL scheme '{other}'"
            )));
        }
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(AppError::validation(format!("URL has no host: {trimmed}")));
    }
    Ok(parsed.to_string())
}

/// Short label for a URL: no scheme, no leading `www.`, no trailing slash.
///
/// # Examples
/// ```
/// use sitewatch::utils::url::display_name;
///
/// assert_eq!(display_name("https://www.example.com/"), "example.com");
/// ```
pub fn display_name(url: &str) -> String {
    DISPLAY_PREFIX
        .replace(url, "")
        .trim_end_matches('/')
        .to_string()
}

/// Extract the lowercase host from a URL.
pub fn get_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}
