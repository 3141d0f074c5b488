use core::fmt;

/// The 48-bit producer-identity field of a version-1 identifier.
///
/// Many identifiers share one `NodeValue`; the registry substitutes each
/// distinct value with a small [`NodeId`] so the codec can pack it into at
/// most three bytes instead of six.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct NodeValue(u64);

impl NodeValue {
    /// Bitmask for the 48-bit node field.
    pub const MASK: u64 = (1 << 48) - 1;

    /// Creates a node value, truncating to 48 bits.
    pub const fn new(raw: u64) -> Self {
        Self(raw & Self::MASK)
    }

    /// Returns the raw 48-bit value.
    pub const fn to_raw(self) -> u64 {
        self.0
    }

    /// The canonical 6-byte big-endian form; this is the digest input used
    /// by the registry's bucket probing.
    pub const fn to_be_bytes(self) -> [u8; 6] {
        let b = self.0.to_be_bytes();
        [b[2], b[3], b[4], b[5], b[6], b[7]]
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:012x}", self.0)
    }
}

impl fmt::Debug for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeValue({:012x})", self.0)
    }
}

/// A small, registry-assigned substitute for a [`NodeValue`].
///
/// Unique per node value and permanent once assigned: the durable store's
/// `(id, value)` pairs are never altered or deleted.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// The largest id the codec can pack: a 3-byte field keeps 2 bits for
    /// the width tag, leaving 22 bits of id space.
    pub const MAX: Self = Self((1 << 22) - 1);

    /// Wraps a raw id without bounds checking; ids at or above 2^22 are
    /// representable here but rejected by the codec at encode time.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    pub const fn to_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
