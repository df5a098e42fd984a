pub mod hash;

pub use hash::{canonical_bytes, canonical_json, fingerprint_bytes, is_hex_digest, sha256_hex};
