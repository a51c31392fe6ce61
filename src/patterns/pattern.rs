//! Byte patterns with per-byte wildcard masks.

use crate::errors::{Error, Result};

/// A byte pattern with a parallel mask: `mask[i] == false` means the byte at `i` is a wildcard
/// and matches anything. Bytes at wildcard positions are zero by convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    bytes: Vec<u8>,
    mask: Vec<bool>,
}

impl Pattern {
    /// Builds a pattern from the byte representation of a trivially copyable value. All bytes
    /// are strict.
    pub fn from_value<T: Copy>(value: &T) -> Self {
        let size = std::mem::size_of::<T>();
        let bytes = unsafe { std::slice::from_raw_parts(value as *const T as *const u8, size) };
        Self {
            bytes: bytes.to_vec(),
            mask: vec![true; size],
        }
    }

    /// Builds a pattern from raw bytes, treating every byte as strict (e.g. for scanning for a
    /// literal string's bytes).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            mask: vec![true; bytes.len()],
        }
    }

    /// Builds a pattern from an IDA-style `(bytes, mask)` pair, e.g.
    /// `("\xA1\x00\x00\x00\x00\xB2", "x????x")`. Mask character `'x'`/`'X'` is strict; anything
    /// else is a wildcard.
    pub fn from_ida(aob: &[u8], mask: &str) -> Result<Self> {
        if aob.len() != mask.len() {
            return Err(Error::InvalidArgument(format!(
                "ida pattern length mismatch: {} bytes vs {} mask chars",
                aob.len(),
                mask.len()
            )));
        }

        let mut bytes = Vec::with_capacity(aob.len());
        let mut out_mask = Vec::with_capacity(aob.len());
        for (&byte, ch) in aob.iter().zip(mask.chars()) {
            let strict = matches!(ch, 'x' | 'X');
            bytes.push(if strict { byte } else { 0 });
            out_mask.push(strict);
        }

        Ok(Self {
            bytes,
            mask: out_mask,
        })
    }

    /// Builds a pattern from readable text: whitespace-separated hex bytes, `?`/`??` as
    /// wildcards. Example: `"A1 ? ?? B2"`.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut bytes = Vec::new();
        let mut mask = Vec::new();

        for token in text.split_whitespace() {
            if token == "?" || token == "??" {
                bytes.push(0);
                mask.push(false);
            } else {
                let byte = u8::from_str_radix(token, 16)
                    .map_err(|_| Error::InvalidArgument(format!("invalid hex byte: {token}")))?;
                bytes.push(byte);
                mask.push(true);
            }
        }

        if bytes.is_empty() {
            return Err(Error::InvalidArgument("empty pattern".to_string()));
        }

        Ok(Self { bytes, mask })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// True if every position in the pattern is strict (no wildcards). Turbo-BM is only
    /// well-defined for such patterns.
    pub fn is_strict(&self) -> bool {
        self.mask.iter().all(|&strict| strict)
    }

    /// Renders the pattern back to its `"A1 ? ?? B2"` textual form.
    pub fn to_text(&self) -> String {
        self.bytes
            .iter()
            .zip(self.mask.iter())
            .map(|(byte, &strict)| {
                if strict {
                    format!("{byte:02X}")
                } else {
                    "?".to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_text_parses_wildcards_and_hex() {
        let p = Pattern::from_text("A1 ? ?? B2").unwrap();
        assert_eq!(p.len(), 4);
        assert_eq!(p.mask(), &[true, false, false, true]);
        assert_eq!(p.bytes(), &[0xA1, 0, 0, 0xB2]);
    }

    #[test]
    fn from_text_rejects_empty() {
        assert!(Pattern::from_text("").is_err());
        assert!(Pattern::from_text("   ").is_err());
    }

    #[test]
    fn from_text_rejects_bad_hex() {
        assert!(Pattern::from_text("ZZ").is_err());
    }

    #[test]
    fn from_value_is_all_strict() {
        let v: u32 = 0xdeadbeef;
        let p = Pattern::from_value(&v);
        assert_eq!(p.len(), 4);
        assert!(p.is_strict());
        assert_eq!(p.bytes(), &v.to_le_bytes());
    }

    #[test]
    fn from_ida_matches_text_equivalent() {
        let a = Pattern::from_ida(&[0xA1, 0, 0, 0xB2], "x??x").unwrap();
        let b = Pattern::from_text("A1 ? ? B2").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn from_ida_rejects_length_mismatch() {
        assert!(Pattern::from_ida(&[1, 2, 3], "xx").is_err());
    }

    #[test]
    fn to_text_round_trips() {
        let p = Pattern::from_text("A1 ? ?? B2").unwrap();
        assert_eq!(p.to_text(), "A1 ? ? B2");
    }
}
