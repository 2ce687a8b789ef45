// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! DDS-XRCE agent core.
//!
//! Entity lifecycle and read delivery for an XRCE agent: clients create,
//! reuse, replace and delete remote-controlled DDS entities, and pull data
//! from readers under rate, sample-count and time limits.
//!
//! # Architecture
//!
//! ```text
//!   decoded client request
//!            |
//!         Agent ------------- one ObjectRegistry per ClientKey
//!            |
//!     ObjectRegistry -------- REUSE / REPLACE rules, cascade delete
//!            |
//!         Entity ------------ Participant | Topic | Publisher | Subscriber
//!            |                DataWriter  | DataReader (RateControlledReader)
//!            |
//!       Middleware ---------- any DDS implementation (InMemoryMiddleware built in)
//! ```
//!
//! Wire decoding and transports are not part of this crate.
//!
//! # Example
//!
//! ```
//! use hdds_xrce_agent::{Agent, AgentConfig, CreationFlags, ObjectId, ObjectKind, OpResult,
//!                       Representation};
//!
//! let agent = Agent::in_memory(AgentConfig::default()).unwrap();
//! let client = 0x0A0B0C0Du32;
//! assert_eq!(agent.create_client(client), OpResult::Ok);
//!
//! let participant = ObjectId::new(0x001, ObjectKind::Participant);
//! let result = agent.create_participant(
//!     client,
//!     participant,
//!     0,
//!     Representation::by_ref("default_xrce_participant"),
//!     CreationFlags::NONE,
//! );
//! assert_eq!(result, OpResult::Ok);
//! ```

pub mod agent;
pub mod config;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod object;
pub mod reader;
pub mod registry;

// Re-exports for convenience.
pub use agent::{Agent, ClientKey, ProxyClient};
pub use config::{AgentConfig, ReferenceProfiles};
pub use entity::{DataFormat, DataReader, DataWriter, Entity, ReadRequest};
pub use error::{OpResult, XrceError};
pub use middleware::{
    DataListener, InMemoryMiddleware, InMemoryNetwork, Middleware, MiddlewareFactory,
};
pub use object::{
    BinaryRepresentation, CreationFlags, Durability, EndpointQos, ObjectId, ObjectKind,
    ObjectVariant, Reliability, Representation,
};
pub use reader::{
    AllowAll, DeliveryControl, DeliveryGate, RateControlledReader, ReaderWaker, SampleSource,
    TokenBucket,
};
pub use registry::ObjectRegistry;
