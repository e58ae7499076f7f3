//! Correlation ID derivation.
//!
//! Two trust postures, picked by [`Config::external`](crate::Config::external):
//!
//! | Mode | Inbound header present | No header |
//! |---|---|---|
//! | internal | used verbatim | random, generated on first `id()` |
//! | external | `base64(sha1(value))-<random>` | random, generated on first `id()` |
//!
//! The external form keeps the client's value usable for correlation
//! without letting the client choose the ID outright.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderMap;
use sha1::{Digest, Sha1};

/// Returns a fresh identifier: 128 random bits, base64-encoded.
pub(crate) fn generate() -> String {
    let bytes: [u8; 16] = rand::random();
    STANDARD.encode(bytes)
}

/// Base64 SHA-1 of `value`.
pub(crate) fn digest(value: &[u8]) -> String {
    STANDARD.encode(Sha1::digest(value))
}

/// Derives the ID eagerly from the candidate headers, in order.
///
/// External mode hashes the first candidate present. Internal mode takes
/// the first candidate whose value is non-empty visible ASCII. `None` means
/// the ID is left for [`generate`] on first access.
pub(crate) fn from_headers(headers: &HeaderMap, candidates: &[String], external: bool) -> Option<String> {
    let mut values = candidates.iter().filter_map(|name| headers.get(name.as_str()));

    if external {
        let value = values.next()?;
        // TODO: mix in a per-process secret so a client that knows another
        // client's header value cannot reproduce the hash prefix.
        return Some(format!("{}-{}", digest(value.as_bytes()), generate()));
    }

    values
        .filter_map(|value| value.to_str().ok())
        .find(|id| !id.is_empty())
        .map(str::to_owned)
}
