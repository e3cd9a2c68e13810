//! Canonical request fingerprints.
//!
//! A fingerprint covers the method, the path and the body. JSON bodies are
//! rewritten with object members sorted by key and without insignificant
//! whitespace, so two payloads that differ only in key order or formatting
//! hash the same. Anything that does not parse as JSON is hashed as its
//! trimmed text.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Computes the hex-encoded SHA-256 fingerprint of a request.
pub fn request_hash(method: &str, path: &str, body: &[u8]) -> String {
    let canonical = canonicalize_body(body);
    let input = format!("{}\n{}\n{}", method, path, canonical);
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Returns the canonical text form of a request body.
pub fn canonicalize_body(body: &[u8]) -> String {
    let raw = String::from_utf8_lossy(body);
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => {
            let mut out = String::with_capacity(trimmed.len());
            write_canonical(&value, &mut out);
            out
        }
        Err(_) => trimmed.to_string(),
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut members: Vec<(&String, &Value)> = map.iter().collect();
            members.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push('{');
            for (i, (key, member)) in members.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(member, out);
            }
            out.push('}');
        }
        Value::Array(elements) => {
            out.push('[');
            for (i, element) in elements.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(element, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
