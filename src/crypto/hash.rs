use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Calculate SHA-256 and return the lowercase hex digest (64 chars)
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Fingerprint of raw content (uploaded deed, certificate payload, ...)
pub fn fingerprint_bytes(content: &[u8]) -> String {
    sha256_hex(content)
}

/// Canonical JSON encoding used for hashing AND persistence.
///
/// The value is first lowered into a `serde_json::Value`, whose object map
/// keeps keys sorted, so struct field order and map iteration order never
/// reach the output bytes.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let tree = serde_json::to_value(value)?;
    Ok(canonical_bytes(&tree))
}

/// Render an already lowered value tree: sorted keys, no whitespace
pub fn canonical_bytes(tree: &Value) -> Vec<u8> {
    tree.to_string().into_bytes()
}

/// Check that a string looks like a SHA-256 hex digest
pub fn is_hex_digest(candidate: &str) -> bool {
    candidate.len() == 64 && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let a = json!({"b": 1, "a": {"z": true, "y": null}});
        let bytes = canonical_json(&a).unwrap();
        assert_eq!(bytes, br#"{"a":{"y":null,"z":true},"b":1}"#.to_vec());
    }

    #[test]
    fn test_canonical_json_matches_tree_rendering() {
        let tree = json!({"z": [1, 2], "a": "x"});
        assert_eq!(canonical_json(&tree).unwrap(), canonical_bytes(&tree));
    }

    #[test]
    fn test_hex_digest_shape() {
        assert!(is_hex_digest(&sha256_hex(b"deed.pdf")));
        assert!(!is_hex_digest("abc"));
        assert!(!is_hex_digest(&"g".repeat(64)));
    }
}
