//! Text encoding and decoding for the `LanChat` wire format.
//!
//! Wire format: `alias,type,originEndpoint,payload,target`. There is no
//! quoting or escaping, so no field except `target` may contain a
//! delimiter, and `target` may only contain `|`.

use crate::packet::{MessageKind, Packet};
use crate::{FIELD_DELIMITER, LIST_DELIMITER, NULL_TOKEN};

/// Number of comma-separated fields in every packet.
pub const FIELD_COUNT: usize = 5;

/// Error type for codec decode operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The body did not split into exactly five fields.
    #[error("malformed packet: expected {FIELD_COUNT} fields, got {fields}")]
    Malformed {
        /// Number of fields actually found.
        fields: usize,
    },
    /// The `messageType` field is not one of `C`, `D`, `P`, `G`, `B`.
    #[error("unknown message type {0:?}")]
    UnknownMessageType(String),
}

/// Encodes a [`Packet`] into its wire form.
#[must_use]
pub fn encode(packet: &Packet) -> String {
    packet.to_string()
}

/// Decodes a wire body into a [`Packet`].
///
/// A single trailing line ending is ignored.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] if the body does not hold exactly five
/// fields, or [`CodecError::UnknownMessageType`] if the type tag is not
/// recognised.
pub fn decode(body: &str) -> Result<Packet, CodecError> {
    let body = body.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = body.split(FIELD_DELIMITER).collect();
    let [alias, kind, origin, payload, target] = fields.as_slice() else {
        return Err(CodecError::Malformed {
            fields: fields.len(),
        });
    };

    let kind: MessageKind = kind
        .parse()
        .map_err(CodecError::UnknownMessageType)?;

    Ok(Packet {
        alias: (*alias).to_string(),
        kind,
        origin_endpoint: (*origin).to_string(),
        payload: (*payload).to_string(),
        target: (*target).to_string(),
    })
}

/// Splits a group target into aliases.
///
/// An empty target or the [`NULL_TOKEN`] yields an empty list. Empty
/// segments (`"a||b"`, a trailing `|`) are skipped.
#[must_use]
pub fn parse_targets(target: &str) -> Vec<String> {
    if target == NULL_TOKEN {
        return Vec::new();
    }
    target
        .split(LIST_DELIMITER)
        .filter(|alias| !alias.is_empty())
        .map(str::to_string)
        .collect()
}

/// Joins aliases into a group target field.
///
/// An empty list encodes as [`NULL_TOKEN`].
#[must_use]
pub fn join_targets(aliases: &[String]) -> String {
    if aliases.is_empty() {
        return NULL_TOKEN.to_string();
    }
    let mut out = String::new();
    for (i, alias) in aliases.iter().enumerate() {
        if i > 0 {
            out.push(LIST_DELIMITER);
        }
        out.push_str(alias);
    }
    out
}
