// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Middleware contract: bridges the XRCE agent to an actual DDS implementation.
//!
//! This is intentionally DDS-agnostic: any DDS library can implement it. Ids
//! passed across this boundary are raw 16-bit XRCE object ids, so the
//! middleware never needs to know about client registries.
//!
//! Each client gets its own middleware instance from a [`MiddlewareFactory`],
//! so object ids only need to be unique within one client.
//!
//! Every `create_*` call dispatches on the [`Representation`] it receives:
//! by reference, by XML, or by decoded binary structure. `matched_*` answers
//! whether a proposed representation is equivalent to the live configuration
//! of the entity already registered under `id`.

mod memory;
mod xml;

pub use memory::{InMemoryMiddleware, InMemoryNetwork};

use std::sync::Arc;
use std::time::Duration;

use crate::error::XrceError;
use crate::object::{ObjectVariant, Representation};

/// Callback fired by the middleware whenever a sample arrives for a reader.
pub type DataListener = Arc<dyn Fn() + Send + Sync>;

/// Builds the middleware instance backing one client.
pub type MiddlewareFactory = Arc<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

/// Bridge between the XRCE agent and a publish/subscribe middleware.
pub trait Middleware: Send + Sync {
    // --- creation -----------------------------------------------------------

    fn create_participant(
        &self,
        id: u16,
        domain_id: i16,
        representation: &Representation,
    ) -> Result<(), XrceError>;

    fn create_topic(
        &self,
        id: u16,
        participant_id: u16,
        representation: &Representation,
    ) -> Result<(), XrceError>;

    fn create_publisher(
        &self,
        id: u16,
        participant_id: u16,
        representation: &Representation,
    ) -> Result<(), XrceError>;

    fn create_subscriber(
        &self,
        id: u16,
        participant_id: u16,
        representation: &Representation,
    ) -> Result<(), XrceError>;

    fn create_datawriter(
        &self,
        id: u16,
        publisher_id: u16,
        representation: &Representation,
    ) -> Result<(), XrceError>;

    fn create_datareader(
        &self,
        id: u16,
        subscriber_id: u16,
        representation: &Representation,
    ) -> Result<(), XrceError>;

    /// Check, without creating anything, that `variant` would be accepted by
    /// the matching `create_*` call once its id is free.
    ///
    /// Called before an existing entity is torn down for REPLACE. The default
    /// accepts everything.
    fn validate_creation(&self, variant: &ObjectVariant) -> Result<(), XrceError> {
        let _ = variant;
        Ok(())
    }

    // --- matching -----------------------------------------------------------

    fn matched_participant(&self, id: u16, representation: &Representation) -> bool;
    fn matched_topic(&self, id: u16, representation: &Representation) -> bool;
    fn matched_publisher(&self, id: u16, representation: &Representation) -> bool;
    fn matched_subscriber(&self, id: u16, representation: &Representation) -> bool;
    fn matched_datawriter(&self, id: u16, representation: &Representation) -> bool;
    fn matched_datareader(&self, id: u16, representation: &Representation) -> bool;

    // --- deletion -----------------------------------------------------------

    fn delete_participant(&self, id: u16) -> Result<(), XrceError>;
    fn delete_topic(&self, id: u16) -> Result<(), XrceError>;
    fn delete_publisher(&self, id: u16) -> Result<(), XrceError>;
    fn delete_subscriber(&self, id: u16) -> Result<(), XrceError>;
    fn delete_datawriter(&self, id: u16) -> Result<(), XrceError>;
    fn delete_datareader(&self, id: u16) -> Result<(), XrceError>;

    // --- data path ----------------------------------------------------------

    /// Write one serialized sample through a writer.
    fn write_data(&self, writer_id: u16, data: &[u8]) -> Result<(), XrceError>;

    /// Take one sample, waiting up to `timeout` for it to arrive.
    /// Returns `None` if nothing arrived in time.
    fn read_data(&self, reader_id: u16, timeout: Duration) -> Result<Option<Vec<u8>>, XrceError>;

    /// Number of samples waiting in the reader's queue.
    fn unread_count(&self, reader_id: u16) -> usize;

    /// Size in bytes of the next sample, without taking it.
    fn next_sample_size(&self, reader_id: u16) -> Option<usize>;

    /// Remove and return the next sample.
    fn take_next_sample(&self, reader_id: u16) -> Option<Vec<u8>>;

    /// Install (or clear, with `None`) the new-data callback for a reader.
    fn set_data_listener(&self, reader_id: u16, listener: Option<DataListener>);
}
