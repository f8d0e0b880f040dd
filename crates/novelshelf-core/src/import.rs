//! Import helpers
//!
//! Title derivation for files and URLs, and the cancellable fetch used by
//! URL imports. The import pipelines themselves live on `NovelStore`.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};

/// Title used when a URL has no final path segment
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Strip the last extension from a name
///
/// Only a trailing `.ext` where `ext` is non-empty and contains no `/` or
/// `.` is removed, so `a.tar.gz` becomes `a.tar` and `notes` is unchanged.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos + 1 < name.len() && !name[pos + 1..].contains('/') => &name[..pos],
        _ => name,
    }
}

/// Title for a novel imported from a file
pub fn title_from_filename(name: &str) -> String {
    strip_extension(name).to_string()
}

/// Title for a novel downloaded from a URL
///
/// Takes everything after the last `/`, percent-decodes it and strips the
/// extension. A malformed escape (`%` not followed by two hex digits) or an
/// escape sequence that decodes to invalid UTF-8 is an error.
pub fn title_from_url(url: &str) -> Result<String> {
    let segment = url.rsplit('/').next().unwrap_or_default();
    if segment.is_empty() {
        return Ok(UNKNOWN_TITLE.to_string());
    }

    let invalid = |reason: &str| Error::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    if !has_valid_escapes(segment) {
        return Err(invalid("malformed percent-escape"));
    }
    let decoded = urlencoding::decode(segment)
        .map_err(|_| invalid("percent-escapes are not valid UTF-8"))?;
    Ok(strip_extension(&decoded).to_string())
}

/// Every `%` starts a two-digit hex escape
fn has_valid_escapes(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3);
            if !hex.is_some_and(|h| h.iter().all(u8::is_ascii_hexdigit)) {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Read a whole input into memory
pub(crate) async fn read_all<R>(name: &str, mut reader: R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    reader
        .read_to_end(&mut buffer)
        .await
        .map_err(|source| Error::Read {
            name: name.to_string(),
            source,
        })?;
    Ok(buffer)
}

/// Build the HTTP client used for URL imports
pub(crate) fn http_client(config: &Config) -> reqwest::Client {
    let builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.fetch_timeout_secs))
        .user_agent(config.user_agent.clone());

    builder.build().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "falling back to default HTTP client");
        reqwest::Client::new()
    })
}

/// GET `url` and return the body as text
///
/// The body is always read as UTF-8 whatever charset the server declares;
/// invalid sequences are replaced. Resolves to [`Error::Cancelled`] as soon as `cancel` fires, dropping the
/// in-flight request.
pub(crate) async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    cancel: &CancellationToken,
) -> Result<String> {
    let request = async {
        let response = client.get(url).send().await.map_err(|source| Error::Fetch {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| Error::Fetch {
            url: url.to_string(),
            source,
        })?;
        debug!(url, bytes = bytes.len(), "fetched novel body");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled { url: url.to_string() }),
        result = request => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{serve_once, serve_stalled, serve_with_content_type};

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("chapter1.txt"), "chapter1");
        assert_eq!(strip_extension("archive.tar.gz"), "archive.tar");
        assert_eq!(strip_extension("noext"), "noext");
        assert_eq!(strip_extension("trailing."), "trailing.");
        assert_eq!(strip_extension(".hidden"), "");
        assert_eq!(strip_extension("dir.d/file"), "dir.d/file");
    }

    #[test]
    fn test_title_from_filename() {
        assert_eq!(title_from_filename("chapter1.txt"), "chapter1");
        assert_eq!(title_from_filename("吾輩は猫である.txt"), "吾輩は猫である");
    }

    #[test]
    fn test_title_from_url() {
        let title = |url| title_from_url(url).unwrap();
        assert_eq!(title("https://example.com/My%20Book.txt"), "My Book");
        assert_eq!(title("https://example.com/novels/%E7%8C%AB.txt"), "猫");
        assert_eq!(title("https://example.com/plain"), "plain");
        assert_eq!(title("https://example.com/100%25.txt"), "100%");
        assert_eq!(title("https://example.com/dir/"), UNKNOWN_TITLE);
    }

    #[test]
    fn test_title_from_url_with_bad_escape() {
        // %FF alone is not valid UTF-8
        let err = title_from_url("https://example.com/a%FFb.txt").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));

        for url in [
            "https://example.com/100%zz",
            "https://example.com/trailing%",
            "https://example.com/short%4",
        ] {
            assert!(
                matches!(title_from_url(url), Err(Error::InvalidUrl { .. })),
                "{url}"
            );
        }
    }

    #[tokio::test]
    async fn test_fetch_text_ignores_declared_charset() {
        let body = "第一章 吾輩は猫である";
        let url = serve_with_content_type("200 OK", "text/plain; charset=ISO-8859-1", body).await;
        let client = http_client(&Config::default());

        let text = fetch_text(&client, &url, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, body);
    }

    #[tokio::test]
    async fn test_read_all() {
        let data: &[u8] = b"some bytes";
        let bytes = read_all("mem", data).await.unwrap();
        assert_eq!(bytes, b"some bytes");
    }

    #[tokio::test]
    async fn test_fetch_text_ok() {
        let url = serve_once("200 OK", "hello from the server").await;
        let client = http_client(&Config::default());

        let body = fetch_text(&client, &url, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(body, "hello from the server");
    }

    #[tokio::test]
    async fn test_fetch_text_not_found() {
        let url = serve_once("404 Not Found", "").await;
        let client = http_client(&Config::default());

        let err = fetch_text(&client, &url, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_text_cancelled() {
        let url = serve_stalled().await;
        let client = http_client(&Config::default());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = fetch_text(&client, &url, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_fetch_text_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = http_client(&Config::default());
        let err = fetch_text(
            &client,
            &format!("http://127.0.0.1:{port}/a.txt"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
    }
}
