//! Metadata probe: a single HEAD request that tells us how big the resource
//! is, whether the server serves byte ranges, and what to call it.
use crate::error::{Error, Result};
use percent_encoding::percent_decode_str;
use reqwest::header::{ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, HeaderMap};
use reqwest::Client;
use sanitize_filename::sanitize;
use std::time::Duration;
use url::Url;

/// Name used when neither the headers nor the URL provide one.
pub const FALLBACK_FILENAME: &str = "output.bin";

/// What the server told us about the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// `Content-Length`, or `None` when the server did not report it.
    pub total_len: Option<u64>,
    pub accepts_ranges: bool,
    pub filename: String,
}

/// Issues a HEAD request against `url` and extracts its [`Metadata`].
///
/// # Errors
///
/// Returns [`Error::ResourceUnavailable`] on a non-success status and
/// [`Error::Transport`] when the request itself fails.
pub async fn probe(client: &Client, url: &str, timeout: Duration) -> Result<Metadata> {
    let response = client.head(url).timeout(timeout).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::ResourceUnavailable { status });
    }

    let headers = response.headers();
    let metadata = Metadata {
        total_len: content_length(headers),
        accepts_ranges: accepts_ranges(headers),
        filename: filename_from_headers(headers).unwrap_or_else(|| get_filename_from_url(url)),
    };

    tracing::debug!(?metadata, "probed {}", url);
    Ok(metadata)
}

// Read from the header map: `Response::content_length` reports the (empty)
// body of a HEAD response instead.
fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
}

fn accepts_ranges(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.trim().is_empty() && !v.trim().eq_ignore_ascii_case("none"))
}

/// Extracts the filename advertised in a `Content-Disposition` header.
///
/// The RFC 5987 `filename*=charset'lang'value` form wins over `filename=`.
/// A header with an unterminated quoted string yields `None`.
pub fn filename_from_headers(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;

    let mut plain = None;
    let mut extended = None;
    for part in split_params(value)? {
        let Some((key, val)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => plain = Some(val.trim().to_string()),
            "filename*" => {
                extended = val
                    .trim()
                    .rsplit_once('\'')
                    .map(|(_, encoded)| percent_decode_str(encoded).decode_utf8_lossy().to_string());
            }
            _ => {}
        }
    }

    extended
        .or(plain)
        .map(sanitize)
        .filter(|name| !name.is_empty())
}

/// Splits a header value on `;`, leaving separators inside quoted strings
/// alone. Quotes are removed and `\x` escapes inside them unescaped.
fn split_params(value: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => current.push(chars.next()?),
            ';' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_quotes {
        return None;
    }
    parts.push(current);
    Some(parts)
}

/// Extracts a clean filename from a URL.
///
/// Takes the last path segment, URL-decodes it and strips characters that
/// are invalid on the local filesystem. Falls back to `output.bin`.
pub fn get_filename_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .map(|mut s| s.next_back().unwrap_or("").to_string())
        })
        .map(|s| percent_decode_str(&s).decode_utf8_lossy().to_string())
        .map(sanitize)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}
