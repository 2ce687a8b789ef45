// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error and status types for the XRCE agent core.

use std::fmt;

use thiserror::Error;

use crate::object::{ObjectId, ObjectKind};

/// Errors produced by the XRCE agent core and its middleware.
#[derive(Debug, Error)]
pub enum XrceError {
    /// A reference name did not resolve to a known profile.
    #[error("unknown reference: {0}")]
    UnknownReference(String),

    /// An XML representation could not be parsed or lacks required fields.
    #[error("invalid XML representation: {0}")]
    InvalidXml(String),

    /// A representation is not valid for the entity kind it targets.
    #[error("invalid representation: {0}")]
    InvalidRepresentation(String),

    /// Kind nibble that maps to no object kind.
    #[error("unknown object kind: 0x{0:02x}")]
    UnknownObjectKind(u8),

    /// Object not found in a registry or in the middleware.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// The object exists but is of a different kind than requested.
    #[error("object {id} is a {actual:?}, expected {expected:?}")]
    ObjectKindMismatch {
        id: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    /// Failure reported by the middleware side.
    #[error("middleware error: {0}")]
    Middleware(String),

    /// A read session cannot be restarted while another thread is
    /// reconfiguring it.
    #[error("read session of {0} is being reconfigured")]
    SessionBusy(ObjectId),

    /// A worker or timer thread could not be spawned.
    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(String),

    /// Configuration validation error.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Outcome of an agent operation, as reported back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpResult {
    Ok,
    OkMatched,
    AlreadyExistsError,
    MismatchError,
    UnknownReferenceError,
    InvalidDataError,
    ResourcesError,
}

impl OpResult {
    /// True for `Ok` and `OkMatched`.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::OkMatched)
    }
}

impl fmt::Display for OpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::OkMatched => "OK_MATCHED",
            Self::AlreadyExistsError => "ALREADY_EXISTS_ERROR",
            Self::MismatchError => "MISMATCH_ERROR",
            Self::UnknownReferenceError => "UNKNOWN_REFERENCE_ERROR",
            Self::InvalidDataError => "INVALID_DATA_ERROR",
            Self::ResourcesError => "RESOURCES_ERROR",
        };
        f.write_str(s)
    }
}

impl From<&XrceError> for OpResult {
    fn from(err: &XrceError) -> Self {
        match err {
            XrceError::UnknownReference(_)
            | XrceError::InvalidXml(_)
            | XrceError::InvalidRepresentation(_)
            | XrceError::ObjectNotFound(_)
            | XrceError::ObjectKindMismatch { .. } => Self::UnknownReferenceError,
            XrceError::ThreadSpawn(_) | XrceError::SessionBusy(_) => Self::ResourcesError,
            XrceError::UnknownObjectKind(_)
            | XrceError::Middleware(_)
            | XrceError::Config(_)
            | XrceError::Io(_)
            | XrceError::Toml(_) => Self::InvalidDataError,
        }
    }
}
