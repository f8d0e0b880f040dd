//! Text encoding detection and decoding
//!
//! Turns a byte buffer of unknown encoding into a `String`:
//!
//! 1. Strict UTF-8 (a leading BOM is dropped).
//! 2. Otherwise ask the [`EncodingDetector`] for a best-guess label. No guess
//!    is the only hard failure.
//! 3. Normalize the label through [`normalize_label`] and decode strictly.
//! 4. If that decoder rejects the input (or the label is unknown), fall back
//!    to lossy UTF-8 and log the failure.

use std::sync::Arc;

use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;
use tracing::{debug, warn};

/// Decoding failures that are surfaced to the caller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not valid UTF-8 and the detector produced no guess
    #[error("Could not detect file encoding")]
    UndetectedEncoding,
}

/// Guesses the encoding of a byte buffer
///
/// Returns an encoding label (any case, WHATWG or legacy spelling), or `None`
/// if no guess can be made. The first guess is trusted as-is.
pub trait EncodingDetector: Send + Sync {
    fn detect(&self, bytes: &[u8]) -> Option<String>;
}

/// Default detector: byte-order mark first, then `chardetng` statistics
#[derive(Debug, Default, Clone, Copy)]
pub struct ChardetDetector;

impl EncodingDetector for ChardetDetector {
    fn detect(&self, bytes: &[u8]) -> Option<String> {
        if bytes.is_empty() {
            return None;
        }
        if let Some((encoding, _)) = Encoding::for_bom(bytes) {
            return Some(encoding.name().to_string());
        }

        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(bytes, true);
        Some(detector.guess(None, true).name().to_string())
    }
}

/// Canonical decoder label for a detected label
///
/// Legacy Western labels collapse to `windows-1252` and simplified Chinese
/// labels to `gb18030`. Labels not in the table pass through lowercased.
pub fn normalize_label(label: &str) -> String {
    let label = label.trim().to_ascii_lowercase();
    let canonical = match label.as_str() {
        "ascii" | "iso-8859-1" | "windows-1252" => "windows-1252",
        "gb2312" | "gbk" => "gb18030",
        "big5" => "big5",
        "euc-jp" => "euc-jp",
        "shift-jis" => "shift-jis",
        "euc-kr" => "euc-kr",
        _ => return label,
    };
    canonical.to_string()
}

/// Result of a detailed decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// The decoded text
    pub text: String,
    /// Name of the encoding the text was decoded with
    pub encoding: &'static str,
    /// True when the lossy UTF-8 fallback produced the text
    pub lossy: bool,
}

/// Converts byte buffers to text
///
/// Cheap to clone; clones share the detector.
#[derive(Clone)]
pub struct EncodingResolver {
    detector: Arc<dyn EncodingDetector>,
}

impl Default for EncodingResolver {
    fn default() -> Self {
        Self::new(ChardetDetector)
    }
}

impl std::fmt::Debug for EncodingResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodingResolver").finish_non_exhaustive()
    }
}

impl EncodingResolver {
    /// Create a resolver using a specific detector
    pub fn new(detector: impl EncodingDetector + 'static) -> Self {
        Self {
            detector: Arc::new(detector),
        }
    }

    /// Decode a buffer to text
    pub fn decode(&self, bytes: &[u8]) -> Result<String, DecodeError> {
        self.decode_detailed(bytes).map(|decoded| decoded.text)
    }

    /// Decode a buffer, also reporting which encoding was used
    pub fn decode_detailed(&self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
        let unprefixed = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        if let Ok(text) = std::str::from_utf8(unprefixed) {
            return Ok(Decoded {
                text: text.to_string(),
                encoding: UTF_8.name(),
                lossy: false,
            });
        }

        let detected = self
            .detector
            .detect(bytes)
            .ok_or(DecodeError::UndetectedEncoding)?;
        let label = normalize_label(&detected);
        debug!(detected = %detected, label = %label, "detected text encoding");

        match decode_strict(&label, bytes) {
            Ok((text, encoding)) => Ok(Decoded {
                text,
                encoding: encoding.name(),
                lossy: false,
            }),
            Err(reason) => {
                warn!(encoding = %label, %reason, "failed to decode with detected encoding, falling back to lossy UTF-8");
                Ok(Decoded {
                    text: String::from_utf8_lossy(bytes).into_owned(),
                    encoding: UTF_8.name(),
                    lossy: true,
                })
            }
        }
    }
}

/// Decode with the encoding named by `label`, failing on any malformed input
fn decode_strict(label: &str, bytes: &[u8]) -> Result<(String, &'static Encoding), String> {
    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| format!("unsupported encoding label '{label}'"))?;

    let body = match Encoding::for_bom(bytes) {
        Some((bom_encoding, bom_len)) if bom_encoding == encoding => &bytes[bom_len..],
        _ => bytes,
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| (text.into_owned(), encoding))
        .ok_or_else(|| format!("malformed {} sequence", encoding.name()))
}
