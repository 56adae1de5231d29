//! Property-based tests for the packet codec.
//!
//! Uses proptest to verify:
//! 1. Any delimiter-free packet survives encode → decode unchanged.
//! 2. Bodies with fewer than five fields are rejected as malformed.
//! 3. Arbitrary text never causes a panic in `decode`.
//! 4. Group target lists survive join → parse.

use lanchat_proto::codec::{self, CodecError, FIELD_COUNT};
use lanchat_proto::{MessageKind, NULL_TOKEN, Packet};
use proptest::prelude::*;

// --- Strategies ---

/// A field that contains no comma and no line ending.
fn arb_field() -> impl Strategy<Value = String> {
    "[^,\r\n]{0,32}"
}

/// An alias: non-empty, no delimiters, no whitespace, not the null token.
fn arb_alias() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.-]{1,16}".prop_filter("alias must not be the null token", |a| a != NULL_TOKEN)
}

fn arb_kind() -> impl Strategy<Value = MessageKind> {
    prop::sample::select(MessageKind::ALL.to_vec())
}

fn arb_packet() -> impl Strategy<Value = Packet> {
    (arb_alias(), arb_kind(), arb_field(), arb_field(), arb_field()).prop_map(
        |(alias, kind, origin_endpoint, payload, target)| Packet {
            alias,
            kind,
            origin_endpoint,
            payload,
            target,
        },
    )
}

// --- Property tests ---

proptest! {
    /// Any delimiter-free packet survives an encode → decode round-trip.
    #[test]
    fn packet_round_trip(packet in arb_packet()) {
        let wire = codec::encode(&packet);
        let decoded = codec::decode(&wire).expect("decode should succeed");
        prop_assert_eq!(packet, decoded);
    }

    /// Fewer than five fields is always `Malformed`, never a panic.
    #[test]
    fn short_bodies_are_malformed(fields in prop::collection::vec(arb_field(), 1..FIELD_COUNT)) {
        let body = fields.join(",");
        prop_assert_eq!(
            codec::decode(&body),
            Err(CodecError::Malformed { fields: fields.len() })
        );
    }

    /// Arbitrary text never panics the decoder.
    #[test]
    fn random_text_decode_no_panic(body in ".{0,256}") {
        let _ = codec::decode(&body);
    }

    /// Alias lists survive join → parse.
    #[test]
    fn target_list_round_trip(aliases in prop::collection::vec(arb_alias(), 0..8)) {
        let joined = codec::join_targets(&aliases);
        prop_assert_eq!(codec::parse_targets(&joined), aliases);
    }

    /// Converting to a typed request and back preserves sender and kind.
    #[test]
    fn request_keeps_sender_and_kind(packet in arb_packet()) {
        let request = packet.clone().into_request();
        prop_assert_eq!(request.sender(), packet.alias.as_str());
        prop_assert_eq!(request.kind(), packet.kind);
    }
}
