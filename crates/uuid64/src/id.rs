use crate::NodeValue;
use core::fmt;
use core::str::FromStr;

/// A 128-bit, version-1, time-based unique identifier.
///
/// Stored in RFC 4122 field order as a single `u128`:
///
/// ```text
///  Bit Index:  127         96 95        80 79               64 63         56 55        48 47       0
///              +-------------+------------+-------------------+-------------+------------+---------+
///  Field:      | time_low    | time_mid   | time_hi + version | clk_hi/var  | clk_low    | node    |
///              +-------------+------------+-------------------+-------------+------------+---------+
///              |<------------------------- MSB ------- 128 bits ------- LSB ------------------->|
/// ```
///
/// The 60-bit timestamp counts 100 ns ticks since 1582-10-15 00:00:00 UTC
/// (the Gregorian reform), the layout defined by RFC 4122 for version-1
/// identifiers.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TimeId {
    id: u128,
}

impl TimeId {
    /// The all-zero sentinel identifier.
    pub const NIL: Self = Self { id: 0 };

    /// Bitmask for the 60-bit timestamp.
    pub const TICKS_MASK: u64 = (1 << 60) - 1;

    /// Bitmask for the 14-bit clock sequence.
    pub const CLOCK_SEQ_MASK: u16 = (1 << 14) - 1;

    /// Constructs a version-1 identifier from its timestamp, clock
    /// sequence, and node fields, stamping the version nibble and the
    /// RFC 4122 variant bits.
    pub const fn from_fields(ticks: u64, clock_seq: u16, node: NodeValue) -> Self {
        let ticks = ticks & Self::TICKS_MASK;
        let clock_seq = clock_seq & Self::CLOCK_SEQ_MASK;

        let time_low = ticks & 0xFFFF_FFFF;
        let time_mid = (ticks >> 32) & 0xFFFF;
        let time_hi_and_version = ((ticks >> 48) & 0x0FFF) | 0x1000;
        let clock_seq_hi_and_variant = ((clock_seq >> 8) as u64 & 0x3F) | 0x80;
        let clock_seq_low = (clock_seq & 0xFF) as u64;

        let id = ((time_low as u128) << 96)
            | ((time_mid as u128) << 80)
            | ((time_hi_and_version as u128) << 64)
            | ((clock_seq_hi_and_variant as u128) << 56)
            | ((clock_seq_low as u128) << 48)
            | node.to_raw() as u128;
        Self { id }
    }

    /// Converts a raw `u128` in RFC 4122 order into this type.
    pub const fn from_raw(raw: u128) -> Self {
        Self { id: raw }
    }

    /// Converts this type into its raw `u128` representation.
    pub const fn to_raw(&self) -> u128 {
        self.id
    }

    /// Extracts the 60-bit timestamp: 100 ns ticks since the Gregorian
    /// epoch.
    pub const fn ticks(&self) -> u64 {
        let time_low = (self.id >> 96) as u64 & 0xFFFF_FFFF;
        let time_mid = (self.id >> 80) as u64 & 0xFFFF;
        let time_hi = (self.id >> 64) as u64 & 0x0FFF;
        (time_hi << 48) | (time_mid << 32) | time_low
    }

    /// Extracts the 14-bit clock sequence.
    pub const fn clock_seq(&self) -> u16 {
        let hi = (self.id >> 56) as u16 & 0x3F;
        let lo = (self.id >> 48) as u16 & 0xFF;
        (hi << 8) | lo
    }

    /// Extracts the 48-bit node field.
    pub const fn node(&self) -> NodeValue {
        NodeValue::new(self.id as u64 & NodeValue::MASK)
    }

    /// Extracts the version nibble.
    pub const fn version(&self) -> u8 {
        ((self.id >> 76) & 0xF) as u8
    }

    /// Returns `true` for the all-zero sentinel.
    pub const fn is_nil(&self) -> bool {
        self.id == 0
    }
}

impl fmt::Display for TimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (self.id >> 96) as u32,
            (self.id >> 80) as u16,
            (self.id >> 64) as u16,
            (self.id >> 48) as u16,
            self.id as u64 & NodeValue::MASK
        )
    }
}

impl fmt::Debug for TimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeId")
            .field("id", &format_args!("{self}"))
            .field("ticks", &self.ticks())
            .field("clock_seq", &self.clock_seq())
            .field("node", &self.node())
            .finish()
    }
}

/// Error returned when parsing a hyphenated identifier string fails.
#[derive(Copy, Clone, PartialEq, Eq, Debug, thiserror::Error)]
#[error("invalid identifier string")]
pub struct ParseTimeIdError;

impl FromStr for TimeId {
    type Err = ParseTimeIdError;

    /// Parses the canonical hyphenated form, e.g.
    /// `"9e4ce0d0-37dd-11e4-916c-0a0b0c0d0e0f"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 36 {
            return Err(ParseTimeIdError);
        }
        let mut id: u128 = 0;
        for (i, &b) in bytes.iter().enumerate() {
            if matches!(i, 8 | 13 | 18 | 23) {
                if b != b'-' {
                    return Err(ParseTimeIdError);
                }
                continue;
            }
            let digit = (b as char).to_digit(16).ok_or(ParseTimeIdError)?;
            id = (id << 4) | u128::from(digit);
        }
        Ok(Self { id })
    }
}

#[cfg(feature = "uuid")]
impl From<uuid::Uuid> for TimeId {
    fn from(value: uuid::Uuid) -> Self {
        Self::from_raw(value.as_u128())
    }
}

#[cfg(feature = "uuid")]
impl From<TimeId> for uuid::Uuid {
    fn from(value: TimeId) -> Self {
        uuid::Uuid::from_u128(value.to_raw())
    }
}
