//! Stable hashing of bulk payloads so two runs can be compared byte for byte.

use blake3::Hasher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        // blake3 hex(32b) is 64 hex chars
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Running digest over a sequence of payloads, in the order they were fed.
#[derive(Debug, Clone, Default)]
pub struct PayloadDigest {
    hasher: Hasher,
    payloads: u64,
}

impl PayloadDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, payload: &str) {
        self.hasher.update(payload.as_bytes());
        self.payloads += 1;
    }

    pub fn payloads(&self) -> u64 {
        self.payloads
    }

    pub fn finish(&self) -> Hash256 {
        Hash256(self.hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_of_pieces_matches_digest_of_concatenation() {
        let mut d = PayloadDigest::new();
        d.update("{\"a\":1}\n");
        d.update("{\"b\":2}\n");
        assert_eq!(d.payloads(), 2);
        let whole = blake3::hash(b"{\"a\":1}\n{\"b\":2}\n");
        assert_eq!(d.finish(), Hash256(whole.into()));
        assert_eq!(d.finish().to_hex().len(), 64);
    }
}
