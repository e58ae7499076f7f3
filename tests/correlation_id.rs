mod common;

use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::request_with;
use http_body_util::Empty;
use bytes::Bytes;
use portico::Config;
use sha1::{Digest, Sha1};

fn id(config: Config, headers: &[(&str, &str)]) -> String {
    let mut builder = http::Request::builder();
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    request_with(builder, Empty::<Bytes>::new(), config).id().to_owned()
}

#[test]
fn internal_mode_trusts_header() {
    assert_eq!(id(Config::new(), &[("request-id", "abc")]), "abc");
}

#[test]
fn candidate_headers_in_order_case_insensitive() {
    let config = || Config::new().request_id_headers(["X-Correlation-ID", "Request-Id"]);

    assert_eq!(id(config(), &[("request-id", "second"), ("x-correlation-id", "first")]), "first");
    assert_eq!(id(config(), &[("REQUEST-ID", "only")]), "only");
}

#[test]
fn external_mode_hashes_and_salts() {
    let expected_prefix = STANDARD.encode(Sha1::digest(b"abc"));
    assert_eq!(expected_prefix, "qZk+NkcGgWq6PiVxeFDCbJzQ2J0=");

    let a = id(Config::new().external(true), &[("request-id", "abc")]);
    let b = id(Config::new().external(true), &[("request-id", "abc")]);

    let (prefix, suffix) = a.split_once('-').unwrap();
    assert_eq!(prefix, expected_prefix);
    assert_eq!(STANDARD.decode(suffix).unwrap().len(), 16);
    assert_ne!(a, b);
}

#[test]
fn generated_ids_do_not_collide() {
    for external in [false, true] {
        let ids: HashSet<String> = (0..1000)
            .map(|_| id(Config::new().external(external), &[]))
            .collect();
        assert_eq!(ids.len(), 1000);
    }
}

#[test]
fn generated_id_is_memoized() {
    let req = request_with(http::Request::builder(), Empty::<Bytes>::new(), Config::new());
    let first = req.id().to_owned();
    assert_eq!(STANDARD.decode(&first).unwrap().len(), 16);
    assert_eq!(req.id(), first);
}

#[test]
fn unrelated_headers_are_ignored() {
    let generated = id(Config::new(), &[("x-request-id", "abc")]);
    assert_ne!(generated, "abc");
}
