//! Content hashing for change detection and reproducibility checks.
//!
//! The watcher hashes source files to skip change events that leave the
//! content untouched, and tests hash generated WGSL to verify byte-identical
//! output across compiles.

use sha2::{Digest, Sha256};

/// A content hash digest (SHA-256, 32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Hash a text blob.
    pub fn of_text(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
        let result = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&result);
        Self::from_bytes(bytes)
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_text_same_hash() {
        let a = ContentHash::of_text("(def triangles: u32 5)");
        let b = ContentHash::of_text("(def triangles: u32 5)");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_text_different_hash() {
        let a = ContentHash::of_text("(def triangles: u32 5)");
        let b = ContentHash::of_text("(def triangles: u32 6)");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hex_length() {
        let hash = ContentHash::of_text("");
        assert_eq!(hash.to_hex().len(), 64);
    }
}
