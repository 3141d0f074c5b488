//! Stateless, bit-exact transform between a [`TimeId`] and a compact,
//! URL-safe code.

use crate::{Error, NodeId, NodeRegistry, NodeStore, Result, TimeId};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// The reserved code for the all-zero identifier.
///
/// Never otherwise produced: every non-sentinel code is base64, and this
/// literal is not.
pub const ANONYMOUS_CODE: &str = "ANONYMOUS";

/// 100 ns Gregorian ticks subtracted from every timestamp before packing.
///
/// Re-bases the origin from 1582-10-15 to September 2014 so packed
/// integers stay small. Identifiers older than this cannot be encoded.
pub const ENCODE_EPOCH_TICKS: u64 = 0x01E4_3918_0000_0000;

/// Widest possible packed integer: 60 timestamp bits, 14 clock bits, and
/// a 24-bit node field: 98 bits, or 13 whole bytes.
const MAX_PACKED_BYTES: usize = 13;

const CLOCK_SEQ_BITS: u32 = 14;
const NODE_TAG_BITS: u32 = 2;
const MAX_NODE_FIELD_BYTES: u32 = 3;

/// Bidirectional codec between [`TimeId`]s and short printable codes.
///
/// The packed layout, most significant bits first:
///
/// ```text
///              +-----------------+------------+-----------------+---------+
///  Field:      | timestamp (≤60) | clock (14) | node id (6-22)  | tag (2) |
///              +-----------------+------------+-----------------+---------+
/// ```
///
/// The node id and tag together occupy exactly `tag + 1` bytes; the tag
/// lets decode recover the field width. The whole integer is serialized
/// as its minimal big-endian byte string and base64url-encoded without
/// padding, so the result is always shorter than the canonical
/// 36-character hyphenated form.
///
/// The codec owns no mutable state beyond the registry it delegates node
/// translation to; it is safe to share across threads.
pub struct CompactCodec<S> {
    registry: NodeRegistry<S>,
}

impl<S: NodeStore> CompactCodec<S> {
    /// Creates a codec over a fresh registry for `store`.
    pub fn new(store: S) -> Self {
        Self {
            registry: NodeRegistry::new(store),
        }
    }

    /// Creates a codec over an explicitly configured registry.
    pub fn with_registry(registry: NodeRegistry<S>) -> Self {
        Self { registry }
    }

    /// The node registry backing this codec.
    pub fn registry(&self) -> &NodeRegistry<S> {
        &self.registry
    }

    /// Encodes `id` into a compact, URL-safe, padding-free code.
    ///
    /// The all-zero identifier encodes to [`ANONYMOUS_CODE`]. Encoding a
    /// previously unseen node value registers it as a side effect; the
    /// registration is idempotent, so a failed encode never leaves the
    /// store inconsistent.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidVersion`] if `id` is not version 1
    /// - [`Error::NodeSpaceExhausted`] if the registry returned an id of
    ///   2^22 or more
    /// - [`Error::InvalidTimestamp`] if `id` predates
    ///   [`ENCODE_EPOCH_TICKS`]
    pub fn encode(&self, id: TimeId) -> Result<String> {
        if id.is_nil() {
            return Ok(ANONYMOUS_CODE.to_owned());
        }
        let version = id.version();
        if version != 1 {
            return Err(Error::InvalidVersion { version });
        }
        let node_id = self.registry.get_node_id(id.node())?;
        let field_bytes = node_field_bytes(node_id)?;
        let ticks = id.ticks();
        let time = ticks
            .checked_sub(ENCODE_EPOCH_TICKS)
            .ok_or(Error::InvalidTimestamp { ticks })?;

        let clock = u128::from(id.clock_seq() & TimeId::CLOCK_SEQ_MASK);
        let node_field = u128::from((node_id.to_raw() << NODE_TAG_BITS) | (field_bytes - 1));
        let packed =
            (((u128::from(time) << CLOCK_SEQ_BITS) | clock) << (field_bytes * 8)) | node_field;
        Ok(URL_SAFE_NO_PAD.encode(minimal_be_bytes(packed)))
    }

    /// Decodes a compact code back into the identifier it was produced
    /// from, resolving the node field through the registry.
    ///
    /// Decoding is strict: any packing that `encode` could not have
    /// produced, such as a truncated node field or a width tag wider than
    /// its id requires, is rejected rather than silently reinterpreted.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedCode`] on bad base64, an implausible length,
    ///   or a packing inconsistent with its width tag
    /// - [`Error::UnknownNode`] if the node id has no registry binding
    pub fn decode(&self, code: &str) -> Result<TimeId> {
        if code == ANONYMOUS_CODE {
            return Ok(TimeId::NIL);
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(code)
            .map_err(|err| Error::malformed(err.to_string()))?;
        if bytes.is_empty() || bytes.len() > MAX_PACKED_BYTES {
            return Err(Error::malformed(format!(
                "implausible length: {} bytes",
                bytes.len()
            )));
        }
        if bytes[0] == 0 {
            return Err(Error::malformed("leading zero byte"));
        }
        let packed = bytes
            .iter()
            .fold(0u128, |acc, &b| (acc << 8) | u128::from(b));

        let field_bytes = (packed & 0b11) as u32 + 1;
        if field_bytes > MAX_NODE_FIELD_BYTES {
            return Err(Error::malformed("reserved node field width"));
        }
        if (bytes.len() as u32) < field_bytes {
            return Err(Error::malformed("truncated node field"));
        }
        let field_bits = field_bytes * 8;
        let node_field = (packed & ((1 << field_bits) - 1)) as u32;
        let node_id = NodeId::from_raw(node_field >> NODE_TAG_BITS);
        if node_field_bytes(node_id)? != field_bytes {
            return Err(Error::malformed("node field wider than its id requires"));
        }

        let remainder = packed >> field_bits;
        let clock = (remainder as u16) & TimeId::CLOCK_SEQ_MASK;
        let ticks = u64::try_from(remainder >> CLOCK_SEQ_BITS)
            .ok()
            .and_then(|time| time.checked_add(ENCODE_EPOCH_TICKS))
            .filter(|ticks| *ticks <= TimeId::TICKS_MASK)
            .ok_or_else(|| Error::malformed("timestamp overflow"))?;

        let node = self
            .registry
            .get_node(node_id)?
            .ok_or(Error::UnknownNode { id: node_id })?;
        Ok(TimeId::from_fields(ticks, clock, node))
    }
}

/// Minimum whole bytes holding `id` shifted over its 2-bit width tag.
fn node_field_bytes(id: NodeId) -> Result<u32> {
    let width = 32 - id.to_raw().leading_zeros() + NODE_TAG_BITS;
    let bytes = width.div_ceil(8).max(1);
    if bytes > MAX_NODE_FIELD_BYTES {
        return Err(Error::NodeSpaceExhausted { id });
    }
    Ok(bytes)
}

/// Serializes `packed` as its minimal big-endian byte sequence, with no
/// leading zero byte.
fn minimal_be_bytes(packed: u128) -> Vec<u8> {
    let bytes = packed.to_be_bytes();
    let skip = (packed.leading_zeros() / 8) as usize;
    bytes[skip..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryNodeStore, NodeValue};

    fn codec() -> CompactCodec<MemoryNodeStore> {
        CompactCodec::new(MemoryNodeStore::new())
    }

    fn v1(ticks: u64, clock_seq: u16, node: u64) -> TimeId {
        TimeId::from_fields(ticks, clock_seq, NodeValue::new(node))
    }

    #[test]
    fn sentinel_round_trips() {
        let codec = codec();
        assert_eq!(codec.encode(TimeId::NIL).unwrap(), ANONYMOUS_CODE);
        assert_eq!(codec.decode(ANONYMOUS_CODE).unwrap(), TimeId::NIL);
    }

    #[test]
    fn known_answer_packing() {
        let node = NodeValue::new(0x0A0B_0C0D_0E0F);
        let store = MemoryNodeStore::new();
        assert!(store.insert_if_absent(NodeId::from_raw(5), node).unwrap());

        let codec = CompactCodec::new(store);
        let id = v1(ENCODE_EPOCH_TICKS + 1000, 0x1234, node.to_raw());
        // packed = ((1000 << 14 | 0x1234) << 8) | (5 << 2) = 0xFA123414
        let code = codec.encode(id).unwrap();
        assert_eq!(code, "-hI0FQ");
        assert_eq!(codec.decode(&code).unwrap(), id);
    }

    #[test]
    fn round_trips_preserve_every_field() {
        let codec = codec();
        let cases = [
            (ENCODE_EPOCH_TICKS, 0x0000, 0x0000_0000_0001),
            (ENCODE_EPOCH_TICKS + 1, 0x3FFF, NodeValue::MASK),
            (ENCODE_EPOCH_TICKS + 1000, 0x1234, 0x0A0B_0C0D_0E0F),
            (TimeId::TICKS_MASK, 0x2AAA, 0x00AA_BBCC_DDEE),
            (ENCODE_EPOCH_TICKS + (1 << 40), 0x0001, 0x0123_4567_89AB),
        ];
        for (ticks, clock_seq, node) in cases {
            let id = v1(ticks, clock_seq, node);
            let code = codec.encode(id).unwrap();
            let decoded = codec.decode(&code).unwrap();
            assert_eq!(decoded, id, "code {code} did not round-trip");
            assert_eq!(decoded.node().to_raw(), node & NodeValue::MASK);
        }
    }

    #[test]
    fn codes_are_shorter_than_hyphenated_form() {
        let codec = codec();
        let id = v1(TimeId::TICKS_MASK, 0x3FFF, NodeValue::MASK);
        let code = codec.encode(id).unwrap();
        assert!(code.len() < 36, "code {code} is not compact");
        assert!(
            code.bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        );
    }

    #[test]
    fn rejects_non_version_1_identifiers() {
        let codec = codec();
        let raw = v1(ENCODE_EPOCH_TICKS, 0, 1).to_raw();
        let v4 = TimeId::from_raw((raw & !(0xF << 76)) | (4 << 76));
        assert!(matches!(
            codec.encode(v4).unwrap_err(),
            Error::InvalidVersion { version: 4 }
        ));
    }

    #[test]
    fn rejects_pre_epoch_timestamps() {
        let codec = codec();
        let id = v1(ENCODE_EPOCH_TICKS - 1, 0, 1);
        assert!(matches!(
            codec.encode(id).unwrap_err(),
            Error::InvalidTimestamp { .. }
        ));
    }

    #[test]
    fn node_field_width_boundary() {
        let node = NodeValue::new(0x0A0B_0C0D_0E0F);
        let store = MemoryNodeStore::new();
        let top = NodeId::from_raw((1 << 22) - 1);
        assert!(store.insert_if_absent(top, node).unwrap());

        let codec = CompactCodec::new(store.clone());
        let id = v1(ENCODE_EPOCH_TICKS + 1, 0, node.to_raw());
        let code = codec.encode(id).unwrap();
        // The node field occupies exactly three trailing bytes, tagged 2.
        let bytes = URL_SAFE_NO_PAD.decode(&code).unwrap();
        assert_eq!(bytes[bytes.len() - 1] & 0b11, 2);
        assert_eq!(codec.decode(&code).unwrap(), id);

        // One more id bit no longer fits.
        let over_value = NodeValue::new(0x1111_2222_3333);
        let over = NodeId::from_raw(1 << 22);
        assert!(store.insert_if_absent(over, over_value).unwrap());
        let err = codec
            .encode(v1(ENCODE_EPOCH_TICKS + 1, 0, over_value.to_raw()))
            .unwrap_err();
        assert!(matches!(err, Error::NodeSpaceExhausted { id } if id == over));
    }

    #[test]
    fn unknown_nodes_fail_decode() {
        let writer = codec();
        let id = v1(ENCODE_EPOCH_TICKS + 42, 7, 0x0A0B_0C0D_0E0F);
        let code = writer.encode(id).unwrap();

        let reader = codec();
        assert!(matches!(
            reader.decode(&code).unwrap_err(),
            Error::UnknownNode { .. }
        ));
    }

    fn assert_malformed<S: NodeStore>(codec: &CompactCodec<S>, code: &str, fragment: &str) {
        match codec.decode(code).unwrap_err() {
            Error::MalformedCode { reason } => {
                assert!(
                    reason.contains(fragment),
                    "expected {fragment:?} in {reason:?} for code {code:?}"
                );
            }
            other => panic!("expected MalformedCode for {code:?}, got {other:?}"),
        }
    }

    #[test]
    fn strict_decode_rejects_garbage() {
        let codec = codec();

        // Not base64 at all.
        assert!(matches!(
            codec.decode("!!!").unwrap_err(),
            Error::MalformedCode { .. }
        ));
        // Decodes to zero bytes.
        assert_malformed(&codec, "", "implausible length");
        // 14 bytes cannot come out of a 98-bit packing.
        let long = URL_SAFE_NO_PAD.encode([0x55u8; 14]);
        assert_malformed(&codec, &long, "implausible length");
        // Minimal serialization never has a leading zero byte.
        assert_malformed(&codec, "AAAA", "leading zero");
        // Tag 3 would mean a four-byte node field.
        let reserved = URL_SAFE_NO_PAD.encode([0x07u8]);
        assert_malformed(&codec, &reserved, "reserved node field width");
        // Tag 1 demands at least two bytes.
        let truncated = URL_SAFE_NO_PAD.encode([0x05u8]);
        assert_malformed(&codec, &truncated, "truncated node field");
        // Node id 5 fits one byte; a two-byte field is non-canonical.
        let padded = URL_SAFE_NO_PAD.encode([0x01u8, 0x00, 0x15]);
        assert_malformed(&codec, &padded, "wider than its id requires");
        // 13 bytes whose timestamp lands past 60 bits.
        let mut overflow = [0xFFu8; 13];
        overflow[12] = 0xFC;
        let overflow = URL_SAFE_NO_PAD.encode(overflow);
        assert_malformed(&codec, &overflow, "timestamp overflow");
    }

    #[test]
    fn decode_is_strict_about_padding() {
        let node = NodeValue::new(0x0A0B_0C0D_0E0F);
        let codec = codec();
        let code = codec
            .encode(v1(ENCODE_EPOCH_TICKS + 1000, 0x1234, node.to_raw()))
            .unwrap();
        assert!(!code.contains('='));
        // The padded spelling of the same bytes is not accepted.
        assert!(codec.decode(&format!("{code}==")).is_err());
    }

    #[test]
    fn encode_registers_the_node_as_a_side_effect() {
        let store = MemoryNodeStore::new();
        let codec = CompactCodec::new(store.clone());
        assert!(store.is_empty());

        codec
            .encode(v1(ENCODE_EPOCH_TICKS, 0, 0x0A0B_0C0D_0E0F))
            .unwrap();
        assert_eq!(store.len(), 1);

        // Re-encoding the same node allocates nothing further.
        codec
            .encode(v1(ENCODE_EPOCH_TICKS + 5, 1, 0x0A0B_0C0D_0E0F))
            .unwrap();
        assert_eq!(store.len(), 1);
    }
}
