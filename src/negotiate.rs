//! Content negotiation over the `Accept*` request headers.
//!
//! Media ranges are parsed and matched by `headers-accept`, which applies the
//! RFC 9110 specificity rules. The other three headers share the
//! `token;q=value` grammar and are parsed into quality-ordered lists by
//! `accept-language`. A preference with `q=0` makes matching values
//! unacceptable.

use http::HeaderMap;
use http::header::{ACCEPT, ACCEPT_CHARSET, ACCEPT_ENCODING, ACCEPT_LANGUAGE, HeaderName};
use mediatype::{MediaType, MediaTypeBuf, ReadParams, names};
use tracing::debug;

type MediaRanges = headers_accept::Accept;

/// Parsed `Accept`, `Accept-Language`, `Accept-Encoding` and
/// `Accept-Charset` headers.
#[derive(Debug)]
pub struct Accept {
    media: MediaRanges,
    types: Vec<String>,
    languages: Vec<(String, f32)>,
    encodings: Vec<(String, f32)>,
    charsets: Vec<(String, f32)>,
}

impl Accept {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        let media = joined(headers, &ACCEPT)
            .and_then(|raw| {
                raw.parse::<MediaRanges>()
                    .inspect_err(|_| debug!(accept = %raw, "ignoring malformed accept header"))
                    .ok()
            })
            .unwrap_or_else(any_media);

        let tokens = |name: &HeaderName| match joined(headers, name) {
            Some(raw) => weighted(&raw),
            None => vec![("*".to_owned(), 1.0)],
        };

        let encodings = match joined(headers, &ACCEPT_ENCODING) {
            Some(raw) => with_identity(weighted(&raw)),
            None => vec![("identity".to_owned(), 1.0)],
        };

        Self {
            types: ranked_types(&media),
            media,
            languages: tokens(&ACCEPT_LANGUAGE),
            encodings,
            charsets: tokens(&ACCEPT_CHARSET),
        }
    }

    /// Acceptable media types, most preferred first.
    pub fn types(&self) -> Vec<&str> {
        self.types.iter().map(String::as_str).collect()
    }

    pub fn languages(&self) -> Vec<&str> {
        acceptable(&self.languages)
    }

    pub fn encodings(&self) -> Vec<&str> {
        acceptable(&self.encodings)
    }

    pub fn charsets(&self) -> Vec<&str> {
        acceptable(&self.charsets)
    }

    /// Best of `offered` media types, e.g. `["application/json", "text/html"]`.
    /// Offers that are not valid media types are skipped.
    pub fn r#type<'a>(&self, offered: &[&'a str]) -> Option<&'a str> {
        let parsed: Vec<(&'a str, MediaType<'a>)> = offered
            .iter()
            .filter_map(|&offer| MediaType::parse(offer).ok().map(|mt| (offer, mt)))
            .collect();

        let best = self.media.negotiate(parsed.iter().map(|(_, mt)| mt))?;
        parsed
            .iter()
            .find(|(_, mt)| std::ptr::eq(mt, best))
            .map(|(offer, _)| *offer)
    }

    pub fn language<'a>(&self, offered: &[&'a str]) -> Option<&'a str> {
        pick(offered, |offer| best_token(&self.languages, offer, language_specificity))
    }

    pub fn encoding<'a>(&self, offered: &[&'a str]) -> Option<&'a str> {
        pick(offered, |offer| best_token(&self.encodings, offer, token_specificity))
    }

    pub fn charset<'a>(&self, offered: &[&'a str]) -> Option<&'a str> {
        pick(offered, |offer| best_token(&self.charsets, offer, token_specificity))
    }
}

fn any_media() -> MediaRanges {
    [MediaType::new(names::_STAR, names::_STAR)].into_iter().collect()
}

/// All values of a list header, comma-joined.
fn joined(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    if values.is_empty() { None } else { Some(values.join(",")) }
}

fn quality(media: &MediaTypeBuf) -> f32 {
    media
        .get_param(names::Q)
        .and_then(|q| q.as_str().parse::<f32>().ok())
        .map_or(1.0, |q| q.clamp(0.0, 1.0))
}

/// Essences of the acceptable ranges ordered by quality. The parser already
/// orders by specificity, which the stable sort keeps for equal qualities.
fn ranked_types(media: &MediaRanges) -> Vec<String> {
    let mut ranked: Vec<(String, f32)> = media
        .media_types()
        .map(|mt| (mt.essence().to_string(), quality(mt)))
        .filter(|(_, q)| *q > 0.0)
        .collect();
    ranked.sort_by(|(_, a), (_, b)| b.total_cmp(a));
    ranked.into_iter().map(|(essence, _)| essence).collect()
}

/// `token;q=value` list, highest quality first, tokens lowercased.
fn weighted(raw: &str) -> Vec<(String, f32)> {
    accept_language::parse_with_quality(raw)
        .into_iter()
        .map(|(token, q)| (token.to_ascii_lowercase(), q.clamp(0.0, 1.0)))
        .collect()
}

/// `identity` stays acceptable unless the client explicitly refused it.
fn with_identity(mut prefs: Vec<(String, f32)>) -> Vec<(String, f32)> {
    let mentioned = prefs.iter().any(|(token, _)| token == "identity" || token == "*");
    if !mentioned {
        let q = prefs.iter().map(|(_, q)| *q).fold(1.0_f32, f32::min);
        prefs.push(("identity".to_owned(), q.max(0.001)));
    }
    prefs
}

fn acceptable(prefs: &[(String, f32)]) -> Vec<&str> {
    prefs
        .iter()
        .filter(|(_, q)| *q > 0.0)
        .map(|(token, _)| token.as_str())
        .collect()
}

/// Picks the offer with the highest non-zero quality; earlier offers win ties.
fn pick<'a>(offered: &[&'a str], score: impl Fn(&str) -> Option<f32>) -> Option<&'a str> {
    let mut best: Option<(&'a str, f32)> = None;
    for &offer in offered {
        let Some(q) = score(offer) else { continue };
        if q <= 0.0 {
            continue;
        }
        if best.is_none_or(|(_, top)| q > top) {
            best = Some((offer, q));
        }
    }
    best.map(|(offer, _)| offer)
}

/// Quality of the most specific preference matching `offer`. Preferences
/// arrive quality-ordered, so the first one wins among equals.
fn best_token(prefs: &[(String, f32)], offer: &str, specificity: fn(&str, &str) -> Option<u8>) -> Option<f32> {
    let offer = offer.to_ascii_lowercase();
    let mut best: Option<(u8, f32)> = None;
    for (token, q) in prefs {
        let Some(s) = specificity(token, &offer) else { continue };
        if best.is_none_or(|(top, _)| s > top) {
            best = Some((s, *q));
        }
    }
    best.map(|(_, q)| q)
}

fn token_specificity(range: &str, offer: &str) -> Option<u8> {
    match range {
        "*" => Some(0),
        _ if range == offer => Some(1),
        _ => None,
    }
}

/// `en` matches `en-US`; `en-US` matches only itself.
fn language_specificity(range: &str, offer: &str) -> Option<u8> {
    match range {
        "*" => Some(0),
        _ if range == offer => Some(2),
        _ if offer.starts_with(range) && offer.as_bytes().get(range.len()) == Some(&b'-') => Some(1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn accept(pairs: &[(HeaderName, &'static str)]) -> Accept {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(name.clone(), HeaderValue::from_static(value));
        }
        Accept::from_headers(&headers)
    }

    #[test]
    fn orders_types_by_quality() {
        let a = accept(&[(ACCEPT, "text/html;q=0.5, application/json, text/*;q=0.8")]);
        assert_eq!(a.types(), ["application/json", "text/*", "text/html"]);
    }

    #[test]
    fn refused_types_are_not_listed() {
        let a = accept(&[(ACCEPT, "text/csv;q=0, text/plain")]);
        assert_eq!(a.types(), ["text/plain"]);
    }

    #[test]
    fn picks_best_offered_type() {
        let a = accept(&[(ACCEPT, "text/html;q=0.5, application/json")]);
        assert_eq!(a.r#type(&["text/html", "application/json"]), Some("application/json"));
        assert_eq!(a.r#type(&["image/png"]), None);
    }

    #[test]
    fn specific_range_overrides_wildcard() {
        let a = accept(&[(ACCEPT, "text/*, text/plain;q=0")]);
        assert_eq!(a.r#type(&["text/plain"]), None);
        assert_eq!(a.r#type(&["text/plain", "text/csv"]), Some("text/csv"));
    }

    #[test]
    fn missing_accept_takes_first_offer() {
        let a = accept(&[]);
        assert_eq!(a.types(), ["*/*"]);
        assert_eq!(a.r#type(&["application/json", "text/html"]), Some("application/json"));
    }

    #[test]
    fn invalid_offers_are_skipped() {
        let a = accept(&[(ACCEPT, "application/json")]);
        assert_eq!(a.r#type(&["not a type", "application/json"]), Some("application/json"));
    }

    #[test]
    fn languages_match_by_prefix() {
        let a = accept(&[(ACCEPT_LANGUAGE, "fr;q=0.4, en")]);
        assert_eq!(a.languages(), ["en", "fr"]);
        assert_eq!(a.language(&["fr-CA", "en-US"]), Some("en-US"));
        assert_eq!(a.language(&["de"]), None);
    }

    #[test]
    fn identity_encoding_defaults() {
        assert_eq!(accept(&[]).encodings(), ["identity"]);
        assert_eq!(accept(&[]).encoding(&["gzip", "identity"]), Some("identity"));

        let a = accept(&[(ACCEPT_ENCODING, "gzip, br;q=0.9")]);
        assert_eq!(a.encodings(), ["gzip", "br", "identity"]);

        let refused = accept(&[(ACCEPT_ENCODING, "gzip, identity;q=0")]);
        assert_eq!(refused.encoding(&["identity"]), None);
    }

    #[test]
    fn repeated_headers_are_joined() {
        let a = accept(&[(ACCEPT_CHARSET, "utf-8"), (ACCEPT_CHARSET, "iso-8859-1;q=0.2")]);
        assert_eq!(a.charsets(), ["utf-8", "iso-8859-1"]);
        assert_eq!(a.charset(&["ISO-8859-1", "UTF-8"]), Some("UTF-8"));
    }
}
