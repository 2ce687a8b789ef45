// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// XRCE object model: identifiers, kinds, creation flags and representations.
//
// An ObjectId is 16 bits on the wire: a 12-bit prefix followed by the 4-bit
// object kind. Representations describe how an entity is (or is proposed to
// be) configured: by reference name, by XML profile, or by an already
// decoded binary structure.

use std::fmt;
use std::ops::BitOr;

use crate::error::XrceError;

// Object kinds (low nibble of the object id)
pub const OBJK_PARTICIPANT: u8 = 0x01;
pub const OBJK_TOPIC: u8 = 0x02;
pub const OBJK_PUBLISHER: u8 = 0x03;
pub const OBJK_SUBSCRIBER: u8 = 0x04;
pub const OBJK_DATAWRITER: u8 = 0x05;
pub const OBJK_DATAREADER: u8 = 0x06;

// ---------------------------------------------------------------------------
// Object kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectKind {
    Participant = OBJK_PARTICIPANT,
    Topic = OBJK_TOPIC,
    Publisher = OBJK_PUBLISHER,
    Subscriber = OBJK_SUBSCRIBER,
    DataWriter = OBJK_DATAWRITER,
    DataReader = OBJK_DATAREADER,
}

impl ObjectKind {
    pub fn from_u8(v: u8) -> Result<Self, XrceError> {
        match v {
            OBJK_PARTICIPANT => Ok(Self::Participant),
            OBJK_TOPIC => Ok(Self::Topic),
            OBJK_PUBLISHER => Ok(Self::Publisher),
            OBJK_SUBSCRIBER => Ok(Self::Subscriber),
            OBJK_DATAWRITER => Ok(Self::DataWriter),
            OBJK_DATAREADER => Ok(Self::DataReader),
            _ => Err(XrceError::UnknownObjectKind(v)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Kind an entity of this kind must be created under, if any.
    pub fn parent_kind(self) -> Option<ObjectKind> {
        match self {
            Self::Participant => None,
            Self::Topic | Self::Publisher | Self::Subscriber => Some(Self::Participant),
            Self::DataWriter => Some(Self::Publisher),
            Self::DataReader => Some(Self::Subscriber),
        }
    }
}

// ---------------------------------------------------------------------------
// Object id
// ---------------------------------------------------------------------------

/// XRCE object identifier: 12-bit prefix + 4-bit kind nibble.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u16);

impl ObjectId {
    /// Build an id from a prefix (only the low 12 bits are kept) and a kind.
    pub fn new(prefix: u16, kind: ObjectKind) -> Self {
        Self(((prefix & 0x0FFF) << 4) | u16::from(kind.as_u8()))
    }

    /// Wrap a raw 16-bit id as received from a client.
    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Full 16-bit value; this is the key used towards the middleware.
    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn prefix(self) -> u16 {
        self.0 >> 4
    }

    pub fn kind_nibble(self) -> u8 {
        (self.0 & 0x000F) as u8
    }

    pub fn kind(self) -> Result<ObjectKind, XrceError> {
        ObjectKind::from_u8(self.kind_nibble())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId(0x{:03x}:{:x})", self.prefix(), self.kind_nibble())
    }
}

// ---------------------------------------------------------------------------
// Creation flags
// ---------------------------------------------------------------------------

/// Per-request creation mode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreationFlags(u8);

impl CreationFlags {
    pub const NONE: Self = Self(0x00);
    pub const REUSE: Self = Self(0x01 << 1);
    pub const REPLACE: Self = Self(0x01 << 2);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & (Self::REUSE.0 | Self::REPLACE.0))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn reuse(self) -> bool {
        self.contains(Self::REUSE)
    }

    pub fn replace(self) -> bool {
        self.contains(Self::REPLACE)
    }
}

impl BitOr for CreationFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Binary representations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reliability {
    #[default]
    BestEffort,
    Reliable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    #[default]
    Volatile,
    TransientLocal,
    Transient,
    Persistent,
}

/// Endpoint QoS carried by writer/reader representations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointQos {
    pub reliability: Reliability,
    pub durability: Durability,
    /// KEEP_LAST depth; 0 means KEEP_ALL.
    pub history_depth: u32,
}

impl Default for EndpointQos {
    fn default() -> Self {
        Self {
            reliability: Reliability::BestEffort,
            durability: Durability::Volatile,
            history_depth: 1,
        }
    }
}

/// Decoded binary representation, one shape per object kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryRepresentation {
    Participant {
        name: String,
    },
    Topic {
        topic_name: String,
        type_name: String,
    },
    Publisher {
        partitions: Vec<String>,
    },
    Subscriber {
        partitions: Vec<String>,
    },
    DataWriter {
        topic_name: String,
        qos: EndpointQos,
    },
    DataReader {
        topic_name: String,
        qos: EndpointQos,
    },
}

impl BinaryRepresentation {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Participant { .. } => ObjectKind::Participant,
            Self::Topic { .. } => ObjectKind::Topic,
            Self::Publisher { .. } => ObjectKind::Publisher,
            Self::Subscriber { .. } => ObjectKind::Subscriber,
            Self::DataWriter { .. } => ObjectKind::DataWriter,
            Self::DataReader { .. } => ObjectKind::DataReader,
        }
    }
}

// ---------------------------------------------------------------------------
// Representation
// ---------------------------------------------------------------------------

/// How an entity is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Representation {
    /// Symbolic name resolved by the middleware's profile table.
    Reference(String),
    /// Inline XML profile.
    Xml(String),
    /// Already decoded binary structure.
    Binary(BinaryRepresentation),
}

impl Representation {
    pub fn by_ref(name: impl Into<String>) -> Self {
        Self::Reference(name.into())
    }

    pub fn by_xml(xml: impl Into<String>) -> Self {
        Self::Xml(xml.into())
    }

    /// Short tag used in log lines.
    pub fn format_name(&self) -> &'static str {
        match self {
            Self::Reference(_) => "ref",
            Self::Xml(_) => "xml",
            Self::Binary(_) => "bin",
        }
    }
}

// ---------------------------------------------------------------------------
// Object variant (creation proposal)
// ---------------------------------------------------------------------------

/// A proposed representation together with its kind-specific parent link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectVariant {
    Participant {
        domain_id: i16,
        representation: Representation,
    },
    Topic {
        participant_id: ObjectId,
        representation: Representation,
    },
    Publisher {
        participant_id: ObjectId,
        representation: Representation,
    },
    Subscriber {
        participant_id: ObjectId,
        representation: Representation,
    },
    DataWriter {
        publisher_id: ObjectId,
        representation: Representation,
    },
    DataReader {
        subscriber_id: ObjectId,
        representation: Representation,
    },
}

impl ObjectVariant {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Participant { .. } => ObjectKind::Participant,
            Self::Topic { .. } => ObjectKind::Topic,
            Self::Publisher { .. } => ObjectKind::Publisher,
            Self::Subscriber { .. } => ObjectKind::Subscriber,
            Self::DataWriter { .. } => ObjectKind::DataWriter,
            Self::DataReader { .. } => ObjectKind::DataReader,
        }
    }

    pub fn representation(&self) -> &Representation {
        match self {
            Self::Participant { representation, .. }
            | Self::Topic { representation, .. }
            | Self::Publisher { representation, .. }
            | Self::Subscriber { representation, .. }
            | Self::DataWriter { representation, .. }
            | Self::DataReader { representation, .. } => representation,
        }
    }

    /// Parent object this proposal is scoped under (None for participants).
    pub fn parent_id(&self) -> Option<ObjectId> {
        match self {
            Self::Participant { .. } => None,
            Self::Topic { participant_id, .. }
            | Self::Publisher { participant_id, .. }
            | Self::Subscriber { participant_id, .. } => Some(*participant_id),
            Self::DataWriter { publisher_id, .. } => Some(*publisher_id),
            Self::DataReader { subscriber_id, .. } => Some(*subscriber_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_layout() {
        let id = ObjectId::new(0x123, ObjectKind::DataReader);
        assert_eq!(id.raw(), 0x1236);
        assert_eq!(id.to_bytes(), [0x12, 0x36]);
        assert_eq!(id.prefix(), 0x123);
        assert_eq!(id.kind().unwrap(), ObjectKind::DataReader);
        assert_eq!(ObjectId::from_bytes([0x12, 0x36]), id);
    }

    #[test]
    fn test_object_id_prefix_truncated_to_12_bits() {
        let id = ObjectId::new(0xF001, ObjectKind::Topic);
        assert_eq!(id.prefix(), 0x001);
        assert_eq!(id.kind_nibble(), OBJK_TOPIC);
    }

    #[test]
    fn test_unknown_kind_nibble() {
        let id = ObjectId::from_raw(0x001F);
        assert!(matches!(id.kind(), Err(XrceError::UnknownObjectKind(0x0F))));
    }

    #[test]
    fn test_creation_flags() {
        let both = CreationFlags::REUSE | CreationFlags::REPLACE;
        assert!(both.reuse());
        assert!(both.replace());
        assert_eq!(both.bits(), 0x06);
        assert!(!CreationFlags::NONE.reuse());
        assert!(!CreationFlags::NONE.replace());
        // Unknown bits are dropped
        assert_eq!(CreationFlags::from_bits(0xFF).bits(), 0x06);
    }

    #[test]
    fn test_parent_kind() {
        assert_eq!(ObjectKind::Participant.parent_kind(), None);
        assert_eq!(ObjectKind::Topic.parent_kind(), Some(ObjectKind::Participant));
        assert_eq!(ObjectKind::DataWriter.parent_kind(), Some(ObjectKind::Publisher));
        assert_eq!(ObjectKind::DataReader.parent_kind(), Some(ObjectKind::Subscriber));
    }
}
