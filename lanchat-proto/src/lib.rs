//! Shared protocol definitions for the `LanChat` wire format.
//!
//! A packet is a single line of UTF-8 text holding five comma-separated
//! fields. [`packet`] defines the flat record and the typed [`packet::Request`]
//! the relay routes on; [`codec`] converts between records and wire text.

pub mod codec;
pub mod packet;

pub use codec::{CodecError, decode, encode, join_targets, parse_targets};
pub use packet::{AliasError, MessageKind, Packet, Request, validate_alias};

/// Field delimiter on the wire.
pub const FIELD_DELIMITER: char = ',';

/// Delimiter between aliases in a group target list.
pub const LIST_DELIMITER: char = '|';

/// Literal placed in a field that carries no value.
pub const NULL_TOKEN: &str = "null";

/// Inbound body that asks the relay to stop its receive loop.
pub const SHUTDOWN_BODY: &str = "Shutdown";
