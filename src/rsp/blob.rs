//! Blob - growable ordered byte buffer.
//!
//! Carries all wire data: command payloads, hex-encoded register and
//! memory contents, reply tokens. Hex conversions always produce
//! lowercase, even-length strings and round-trip exactly.

use super::WireError;

/// Ordered byte sequence with the front/back operations the reply
/// grammars need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob {
    bytes: Vec<u8>,
}

impl Blob {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// Build a blob from the raw bytes of a text command like `"qOffsets"`.
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// Decode an even-length hex string into bytes.
    pub fn from_hex(text: &str) -> Result<Self, WireError> {
        Ok(Self {
            bytes: hex::decode(text)?,
        })
    }

    /// Encode as a lowercase hex string, two digits per byte.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Lossy text rendering, used for reply tokens and log lines.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    pub fn first(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.bytes.starts_with(prefix)
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn reverse(&mut self) {
        self.bytes.reverse();
    }

    /// Remove and return up to `n` bytes from the front.
    pub fn pop_front(&mut self, n: usize) -> Blob {
        let n = n.min(self.bytes.len());
        Blob {
            bytes: self.bytes.drain(..n).collect(),
        }
    }

    /// Remove and return the front bytes up to and including the first
    /// occurrence of `delim`. Drains the whole buffer if `delim` is absent.
    pub fn pop_front_until(&mut self, delim: u8) -> Blob {
        match self.bytes.iter().position(|&b| b == delim) {
            Some(pos) => self.pop_front(pos + 1),
            None => self.pop_front(self.bytes.len()),
        }
    }

    /// Greedily parse a hex-digit run at the front as an unsigned integer,
    /// removing the consumed digits. Fails if the front byte is not a hex
    /// digit.
    pub fn pop_int_from_front(&mut self) -> Result<u64, WireError> {
        let digits = self
            .bytes
            .iter()
            .take_while(|b| b.is_ascii_hexdigit())
            .count();
        if digits == 0 {
            return Err(WireError::MissingInteger);
        }
        let mut value: u64 = 0;
        for &b in &self.bytes[..digits] {
            let nibble = (b as char).to_digit(16).unwrap_or(0) as u64;
            value = value
                .checked_mul(16)
                .and_then(|v| v.checked_add(nibble))
                .ok_or(WireError::IntegerOverflow)?;
        }
        self.bytes.drain(..digits);
        Ok(value)
    }

    /// Non-mutating copy-out of `len` bytes starting at `offset`, clamped
    /// to the available range.
    pub fn peek(&self, offset: usize, len: usize) -> Blob {
        if offset >= self.bytes.len() {
            return Blob::new();
        }
        let end = (offset + len).min(self.bytes.len());
        Blob::from_bytes(&self.bytes[offset..end])
    }

    /// Split on any byte of `delims`, consuming delimiters and dropping
    /// empty tokens.
    pub fn split(&self, delims: &[u8]) -> Vec<Blob> {
        self.bytes
            .split(|b| delims.contains(b))
            .filter(|token| !token.is_empty())
            .map(Blob::from_bytes)
            .collect()
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl From<&str> for Blob {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl std::fmt::Display for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}
