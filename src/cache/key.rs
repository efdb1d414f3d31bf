/// Request fingerprinting
///
/// The fingerprint is the uppercase hex SHA-256 of
/// `METHOD + URL + sorted parameters`, with the `.request` suffix appended.
/// Parameters listed in the ignore set never reach the digest, and key order
/// is normalized, so logically identical requests share one cache file.
use reqwest::Method;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::request::Parameters;

pub const CACHE_FILE_SUFFIX: &str = ".request";

/// File name (fingerprint + suffix) for one request
pub fn derive_fingerprint(
    method: &Method,
    url: &str,
    parameters: &Parameters,
    ignore_parameters: &[String]
) -> String {
    let material = format!("{}{}{}", method.as_str(), url, canonical_parameters(parameters, ignore_parameters));
    format!("{}{}", hex_upper(&Sha256::digest(material.as_bytes())), CACHE_FILE_SUFFIX)
}

/// `KEY=value` pairs joined by `&`, keys ordered case-insensitively descending
///
/// Keys equal ignoring case fall back to a byte-wise descending comparison
/// so the order never depends on insertion.
pub fn canonical_parameters(parameters: &Parameters, ignore_parameters: &[String]) -> String {
    let mut entries: Vec<(&String, &Value)> = parameters
        .iter()
        .filter(|(key, _)| !ignore_parameters.iter().any(|ignored| ignored == *key))
        .collect();

    entries.sort_by(|(a, _), (b, _)| {
        b.to_uppercase().cmp(&a.to_uppercase()).then_with(|| b.cmp(a))
    });

    entries
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect()
}
