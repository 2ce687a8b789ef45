// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Agent-side entities.
//!
//! Each entity wraps one middleware object. Creating an [`Entity`] creates
//! the middleware object; dropping it deletes it.

mod datareader;
mod datawriter;

pub use datareader::{DataFormat, DataReader, ReadRequest};
pub use datawriter::DataWriter;

use std::sync::Arc;

use crate::error::XrceError;
use crate::middleware::Middleware;
use crate::object::{ObjectId, ObjectKind, ObjectVariant};
use crate::reader::DeliveryGate;

// ---------------------------------------------------------------------------
// Middleware handle
// ---------------------------------------------------------------------------

/// Owns one middleware object and deletes it on drop.
pub(crate) struct MiddlewareHandle {
    id: ObjectId,
    kind: ObjectKind,
    middleware: Arc<dyn Middleware>,
}

impl MiddlewareHandle {
    fn new(id: ObjectId, kind: ObjectKind, middleware: Arc<dyn Middleware>) -> Self {
        Self {
            id,
            kind,
            middleware,
        }
    }

    pub(crate) fn middleware(&self) -> &Arc<dyn Middleware> {
        &self.middleware
    }
}

impl Drop for MiddlewareHandle {
    fn drop(&mut self) {
        let raw = self.id.raw();
        let result = match self.kind {
            ObjectKind::Participant => self.middleware.delete_participant(raw),
            ObjectKind::Topic => self.middleware.delete_topic(raw),
            ObjectKind::Publisher => self.middleware.delete_publisher(raw),
            ObjectKind::Subscriber => self.middleware.delete_subscriber(raw),
            ObjectKind::DataWriter => self.middleware.delete_datawriter(raw),
            ObjectKind::DataReader => self.middleware.delete_datareader(raw),
        };
        if let Err(e) = result {
            log::warn!("[XRCE] failed to delete {:?} {}: {}", self.kind, self.id, e);
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Participant: remembers the domain it was created in.
pub struct Participant {
    handle: MiddlewareHandle,
    domain_id: i16,
}

impl Participant {
    pub fn domain_id(&self) -> i16 {
        self.domain_id
    }
}

pub struct Topic {
    handle: MiddlewareHandle,
}

pub struct Publisher {
    handle: MiddlewareHandle,
}

pub struct Subscriber {
    handle: MiddlewareHandle,
}

pub enum Entity {
    Participant(Participant),
    Topic(Topic),
    Publisher(Publisher),
    Subscriber(Subscriber),
    DataWriter(DataWriter),
    DataReader(DataReader),
}

impl Entity {
    /// Create the middleware object described by `variant` under `id`.
    ///
    /// The caller has already checked that `variant` targets `id`'s kind and
    /// that the parent link resolves.
    pub fn create(
        id: ObjectId,
        variant: &ObjectVariant,
        middleware: &Arc<dyn Middleware>,
        gate: &Arc<dyn DeliveryGate>,
    ) -> Result<Self, XrceError> {
        let raw = id.raw();
        let kind = variant.kind();
        let representation = variant.representation();

        let entity = match variant {
            ObjectVariant::Participant { domain_id, .. } => {
                middleware.create_participant(raw, *domain_id, representation)?;
                Self::Participant(Participant {
                    handle: MiddlewareHandle::new(id, kind, middleware.clone()),
                    domain_id: *domain_id,
                })
            }
            ObjectVariant::Topic { participant_id, .. } => {
                middleware.create_topic(raw, participant_id.raw(), representation)?;
                Self::Topic(Topic {
                    handle: MiddlewareHandle::new(id, kind, middleware.clone()),
                })
            }
            ObjectVariant::Publisher { participant_id, .. } => {
                middleware.create_publisher(raw, participant_id.raw(), representation)?;
                Self::Publisher(Publisher {
                    handle: MiddlewareHandle::new(id, kind, middleware.clone()),
                })
            }
            ObjectVariant::Subscriber { participant_id, .. } => {
                middleware.create_subscriber(raw, participant_id.raw(), representation)?;
                Self::Subscriber(Subscriber {
                    handle: MiddlewareHandle::new(id, kind, middleware.clone()),
                })
            }
            ObjectVariant::DataWriter { publisher_id, .. } => {
                middleware.create_datawriter(raw, publisher_id.raw(), representation)?;
                Self::DataWriter(DataWriter::new(MiddlewareHandle::new(
                    id,
                    kind,
                    middleware.clone(),
                )))
            }
            ObjectVariant::DataReader { subscriber_id, .. } => {
                middleware.create_datareader(raw, subscriber_id.raw(), representation)?;
                Self::DataReader(DataReader::new(
                    MiddlewareHandle::new(id, kind, middleware.clone()),
                    gate.clone(),
                ))
            }
        };

        log::info!(
            "[XRCE] created {:?} {} (by {})",
            kind,
            id,
            representation.format_name()
        );
        Ok(entity)
    }

    fn handle(&self) -> &MiddlewareHandle {
        match self {
            Self::Participant(e) => &e.handle,
            Self::Topic(e) => &e.handle,
            Self::Publisher(e) => &e.handle,
            Self::Subscriber(e) => &e.handle,
            Self::DataWriter(e) => e.handle(),
            Self::DataReader(e) => e.handle(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.handle().id
    }

    pub fn kind(&self) -> ObjectKind {
        self.handle().kind
    }

    /// Whether `variant` describes this entity as it currently exists.
    ///
    /// The id's kind nibble must agree with the proposal before the
    /// middleware is asked to compare representations.
    pub fn matched(&self, variant: &ObjectVariant) -> bool {
        let id = self.id();
        if id.kind_nibble() != variant.kind().as_u8() || variant.kind() != self.kind() {
            return false;
        }

        let raw = id.raw();
        let mw = self.handle().middleware();
        let representation = variant.representation();
        match (self, variant) {
            (Self::Participant(p), ObjectVariant::Participant { domain_id, .. }) => {
                p.domain_id == *domain_id && mw.matched_participant(raw, representation)
            }
            (Self::Topic(_), _) => mw.matched_topic(raw, representation),
            (Self::Publisher(_), _) => mw.matched_publisher(raw, representation),
            (Self::Subscriber(_), _) => mw.matched_subscriber(raw, representation),
            (Self::DataWriter(_), _) => mw.matched_datawriter(raw, representation),
            (Self::DataReader(_), _) => mw.matched_datareader(raw, representation),
            (Self::Participant(_), _) => false,
        }
    }

    pub fn as_datawriter(&self) -> Option<&DataWriter> {
        match self {
            Self::DataWriter(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_datareader(&self) -> Option<&DataReader> {
        match self {
            Self::DataReader(r) => Some(r),
            _ => None,
        }
    }
}
