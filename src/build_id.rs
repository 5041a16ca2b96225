use std::fmt;

use debugid::CodeId;

/// An opaque, fixed-width byte string identifying a binary build.
///
/// Equality is bytewise, with one deliberate exception: an empty build-id
/// never compares equal to any other build-id, not even another empty one.
/// That rule lives in [`BuildId::matches`]; `PartialEq`/`Eq` are plain
/// bytewise comparisons for use in maps and sorting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildId(CodeId);

impl BuildId {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        BuildId(CodeId::from_binary(bytes))
    }

    pub fn empty() -> Self {
        BuildId(CodeId::from_binary(&[]))
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_str().is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_str().as_bytes()
    }

    /// The comparison used by `FindDebugFile` and `FindSymbol`-adjacent
    /// build-id checks: an empty build-id matches nothing, including
    /// another empty build-id.
    pub fn matches(&self, other: &BuildId) -> bool {
        !self.is_empty() && !other.is_empty() && self.0.as_str() == other.0.as_str()
    }

    pub fn to_hex(&self) -> String {
        self.0.as_str().to_string()
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let bytes = decode_hex(hex)?;
        Some(BuildId::from_bytes(&bytes))
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_str())
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let hi = (bytes[i] as char).to_digit(16)?;
        let lo = (bytes[i + 1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
        i += 2;
    }
    Some(out)
}
