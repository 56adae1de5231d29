//! Packet record, message kinds, and the typed request union.
//!
//! [`Packet`] mirrors the five wire fields one-to-one. The relay never
//! routes on a raw [`Packet`]; it converts it into a [`Request`] first so
//! every delivery mode is handled through an exhaustive `match`.

use std::fmt;
use std::str::FromStr;

use crate::codec::{join_targets, parse_targets};
use crate::{FIELD_DELIMITER, LIST_DELIMITER, NULL_TOKEN};

/// Delivery mode carried in the `messageType` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Participant joins the relay (`C`).
    Connect,
    /// Participant leaves the relay (`D`).
    Disconnect,
    /// One named recipient (`P`).
    Private,
    /// An explicit list of recipients (`G`).
    Group,
    /// Everyone except the sender (`B`).
    Broadcast,
}

impl MessageKind {
    /// All kinds, in wire-tag order.
    pub const ALL: [Self; 5] = [
        Self::Connect,
        Self::Disconnect,
        Self::Private,
        Self::Group,
        Self::Broadcast,
    ];

    /// The one-character tag used on the wire.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Connect => 'C',
            Self::Disconnect => 'D',
            Self::Private => 'P',
            Self::Group => 'G',
            Self::Broadcast => 'B',
        }
    }
}

impl TryFrom<char> for MessageKind {
    type Error = char;

    fn try_from(tag: char) -> Result<Self, Self::Error> {
        match tag {
            'C' => Ok(Self::Connect),
            'D' => Ok(Self::Disconnect),
            'P' => Ok(Self::Private),
            'G' => Ok(Self::Group),
            'B' => Ok(Self::Broadcast),
            other => Err(other),
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(tag), None) => Self::try_from(tag).map_err(|_| s.to_string()),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A decoded wire packet: five fields in fixed order.
///
/// The `Display` impl produces the wire form; see [`crate::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Sender's display name (unique identity key).
    pub alias: String,
    /// Delivery mode.
    pub kind: MessageKind,
    /// Opaque descriptor of the sender's transport endpoint.
    pub origin_endpoint: String,
    /// Message text, or [`NULL_TOKEN`] when unused.
    pub payload: String,
    /// Recipient specification, or [`NULL_TOKEN`] when unused.
    pub target: String,
}

impl Packet {
    /// Builds a connect request as a client would send it.
    pub fn connect(alias: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::control(alias, MessageKind::Connect, endpoint)
    }

    /// Builds a disconnect request as a client would send it.
    pub fn disconnect(alias: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::control(alias, MessageKind::Disconnect, endpoint)
    }

    /// Builds a private message addressed to `to`.
    pub fn private(
        alias: impl Into<String>,
        endpoint: impl Into<String>,
        to: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            kind: MessageKind::Private,
            origin_endpoint: endpoint.into(),
            payload: text.into(),
            target: to.into(),
        }
    }

    /// Builds a group message addressed to every alias in `to`.
    pub fn group(
        alias: impl Into<String>,
        endpoint: impl Into<String>,
        to: &[String],
        text: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            kind: MessageKind::Group,
            origin_endpoint: endpoint.into(),
            payload: text.into(),
            target: join_targets(to),
        }
    }

    /// Builds a broadcast message.
    pub fn broadcast(
        alias: impl Into<String>,
        endpoint: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            kind: MessageKind::Broadcast,
            origin_endpoint: endpoint.into(),
            payload: text.into(),
            target: NULL_TOKEN.to_string(),
        }
    }

    fn control(alias: impl Into<String>, kind: MessageKind, endpoint: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            kind,
            origin_endpoint: endpoint.into(),
            payload: NULL_TOKEN.to_string(),
            target: NULL_TOKEN.to_string(),
        }
    }

    /// Converts the flat record into the typed request the relay routes on.
    #[must_use]
    pub fn into_request(self) -> Request {
        let Self {
            alias,
            kind,
            origin_endpoint: endpoint,
            payload: text,
            target,
        } = self;
        match kind {
            MessageKind::Connect => Request::Connect { alias, endpoint },
            MessageKind::Disconnect => Request::Disconnect { alias, endpoint },
            MessageKind::Private => Request::Private {
                from: alias,
                endpoint,
                to: target,
                text,
            },
            MessageKind::Group => Request::Group {
                from: alias,
                endpoint,
                to: parse_targets(&target),
                text,
            },
            MessageKind::Broadcast => Request::Broadcast {
                from: alias,
                endpoint,
                text,
            },
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = FIELD_DELIMITER;
        write!(
            f,
            "{}{d}{}{d}{}{d}{}{d}{}",
            self.alias, self.kind, self.origin_endpoint, self.payload, self.target
        )
    }
}

/// A request to the relay, one variant per delivery mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Register `alias` at `endpoint`.
    Connect {
        /// Joining participant.
        alias: String,
        /// Where the participant receives packets.
        endpoint: String,
    },
    /// Remove `alias` from the relay.
    Disconnect {
        /// Departing participant.
        alias: String,
        /// Endpoint the participant reported.
        endpoint: String,
    },
    /// Deliver `text` to a single alias.
    Private {
        /// Sending participant.
        from: String,
        /// Sender's endpoint.
        endpoint: String,
        /// Recipient alias.
        to: String,
        /// Message text.
        text: String,
    },
    /// Deliver `text` to each listed alias.
    Group {
        /// Sending participant.
        from: String,
        /// Sender's endpoint.
        endpoint: String,
        /// Recipient aliases.
        to: Vec<String>,
        /// Message text.
        text: String,
    },
    /// Deliver `text` to every participant except the sender.
    Broadcast {
        /// Sending participant.
        from: String,
        /// Sender's endpoint.
        endpoint: String,
        /// Message text.
        text: String,
    },
}

impl Request {
    /// The kind tag this request travels under.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Connect { .. } => MessageKind::Connect,
            Self::Disconnect { .. } => MessageKind::Disconnect,
            Self::Private { .. } => MessageKind::Private,
            Self::Group { .. } => MessageKind::Group,
            Self::Broadcast { .. } => MessageKind::Broadcast,
        }
    }

    /// The alias of the participant that sent this request.
    #[must_use]
    pub fn sender(&self) -> &str {
        match self {
            Self::Connect { alias, .. } | Self::Disconnect { alias, .. } => alias,
            Self::Private { from, .. } | Self::Group { from, .. } | Self::Broadcast { from, .. } => {
                from
            }
        }
    }

    /// Flattens the request back into a wire record.
    #[must_use]
    pub fn into_packet(self) -> Packet {
        match self {
            Self::Connect { alias, endpoint } => Packet::connect(alias, endpoint),
            Self::Disconnect { alias, endpoint } => Packet::disconnect(alias, endpoint),
            Self::Private {
                from,
                endpoint,
                to,
                text,
            } => Packet::private(from, endpoint, to, text),
            Self::Group {
                from,
                endpoint,
                to,
                text,
            } => Packet::group(from, endpoint, &to, text),
            Self::Broadcast {
                from,
                endpoint,
                text,
            } => Packet::broadcast(from, endpoint, text),
        }
    }
}

/// Reasons an alias cannot be used on the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AliasError {
    /// The alias is empty.
    #[error("alias is empty")]
    Empty,
    /// The alias contains a reserved delimiter or whitespace.
    #[error("alias contains reserved character {0:?}")]
    Reserved(char),
}

/// Checks that `alias` contains no protocol syntax.
///
/// The relay does not enforce this; clients call it before connecting.
///
/// # Errors
///
/// Returns [`AliasError`] if the alias is empty or contains `,`, `|`, or
/// whitespace.
pub fn validate_alias(alias: &str) -> Result<(), AliasError> {
    if alias.is_empty() {
        return Err(AliasError::Empty);
    }
    match alias
        .chars()
        .find(|c| *c == FIELD_DELIMITER || *c == LIST_DELIMITER || c.is_whitespace())
    {
        Some(c) => Err(AliasError::Reserved(c)),
        None => Ok(()),
    }
}
