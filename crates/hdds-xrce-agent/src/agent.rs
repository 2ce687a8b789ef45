// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// XRCE agent facade.
//
// Keeps one ObjectRegistry per client key, each over its own middleware
// instance, and translates client requests into registry/entity operations. Transport and wire decoding live outside
// this crate; callers hand in already decoded requests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::AgentConfig;
use crate::entity::ReadRequest;
use crate::error::{OpResult, XrceError};
use crate::middleware::{InMemoryMiddleware, InMemoryNetwork, Middleware, MiddlewareFactory};
use crate::object::{CreationFlags, ObjectId, ObjectVariant, Representation};
use crate::reader::{AllowAll, DeliveryControl, DeliveryGate};
use crate::registry::ObjectRegistry;

// ---------------------------------------------------------------------------
// Client key
// ---------------------------------------------------------------------------

/// 4-byte key identifying an XRCE client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey([u8; 4]);

impl ClientKey {
    pub fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for ClientKey {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl From<u32> for ClientKey {
    fn from(key: u32) -> Self {
        Self(key.to_be_bytes())
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", u32::from_be_bytes(self.0))
    }
}

// ---------------------------------------------------------------------------
// Proxy client
// ---------------------------------------------------------------------------

/// Agent-side state of one client.
pub struct ProxyClient {
    key: ClientKey,
    registry: ObjectRegistry,
}

impl ProxyClient {
    pub fn key(&self) -> ClientKey {
        self.key
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Middleware instance created for this client.
    pub fn middleware(&self) -> &Arc<dyn Middleware> {
        self.registry.middleware()
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// The XRCE agent. Bridges resource-constrained clients to a middleware.
pub struct Agent {
    config: AgentConfig,
    factory: MiddlewareFactory,
    gate: Arc<dyn DeliveryGate>,
    clients: Mutex<HashMap<ClientKey, Arc<ProxyClient>>>,
}

impl Agent {
    /// Create an agent. `factory` builds the middleware of each new client.
    pub fn new<F>(config: AgentConfig, factory: F) -> Result<Self, XrceError>
    where
        F: Fn() -> Arc<dyn Middleware> + Send + Sync + 'static,
    {
        Self::with_gate(config, factory, Arc::new(AllowAll))
    }

    /// Create an agent whose readers consult `gate` for every sample.
    pub fn with_gate<F>(
        config: AgentConfig,
        factory: F,
        gate: Arc<dyn DeliveryGate>,
    ) -> Result<Self, XrceError>
    where
        F: Fn() -> Arc<dyn Middleware> + Send + Sync + 'static,
    {
        config.validate()?;
        config.apply_log_level()?;
        Ok(Self {
            config,
            factory: Arc::new(factory),
            gate,
            clients: Mutex::new(HashMap::new()),
        })
    }

    /// Agent whose clients each get an [`InMemoryMiddleware`] using the
    /// configured profiles. All of them share one network, so samples flow
    /// between clients.
    pub fn in_memory(config: AgentConfig) -> Result<Self, XrceError> {
        let network = InMemoryNetwork::new();
        let profiles = config.profiles.clone();
        Self::new(config, move || -> Arc<dyn Middleware> {
            Arc::new(InMemoryMiddleware::on_network(profiles.clone(), &network))
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Clients
    // -----------------------------------------------------------------------

    /// Register a client. Creating an already known client is a no-op.
    pub fn create_client(&self, key: impl Into<ClientKey>) -> OpResult {
        let key = key.into();
        let mut clients = self.clients.lock();
        if clients.contains_key(&key) {
            log::debug!("[XRCE] client {} already connected", key);
            return OpResult::Ok;
        }
        if clients.len() >= self.config.max_clients {
            log::warn!(
                "[XRCE] cannot accept client {}: {} clients connected",
                key,
                clients.len()
            );
            return OpResult::ResourcesError;
        }
        clients.insert(
            key,
            Arc::new(ProxyClient {
                key,
                registry: ObjectRegistry::with_gate((self.factory)(), self.gate.clone()),
            }),
        );
        log::info!("[XRCE] client {} connected", key);
        OpResult::Ok
    }

    /// Remove a client and tear down everything it created.
    pub fn delete_client(&self, key: impl Into<ClientKey>) -> OpResult {
        let key = key.into();
        let removed = self.clients.lock().remove(&key);
        match removed {
            Some(client) => {
                client.registry.clear();
                log::info!("[XRCE] client {} disconnected", key);
                OpResult::Ok
            }
            None => {
                log::warn!("[XRCE] delete of unknown client {}", key);
                OpResult::UnknownReferenceError
            }
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Look up a client. The map lock is released before returning.
    pub fn client(&self, key: impl Into<ClientKey>) -> Option<Arc<ProxyClient>> {
        self.clients.lock().get(&key.into()).cloned()
    }

    /// Drop every client and their entities.
    pub fn reset(&self) {
        let clients: Vec<Arc<ProxyClient>> =
            self.clients.lock().drain().map(|(_, c)| c).collect();
        for client in &clients {
            client.registry.clear();
        }
        log::info!("[XRCE] agent reset ({} clients dropped)", clients.len());
    }

    // -----------------------------------------------------------------------
    // Entity lifecycle
    // -----------------------------------------------------------------------

    pub fn create_object(
        &self,
        key: impl Into<ClientKey>,
        id: ObjectId,
        variant: ObjectVariant,
        flags: CreationFlags,
    ) -> OpResult {
        let key = key.into();
        match self.client(key) {
            Some(client) => client.registry.create(id, variant, flags),
            None => unknown_client(key),
        }
    }

    pub fn create_participant(
        &self,
        key: impl Into<ClientKey>,
        id: ObjectId,
        domain_id: i16,
        representation: Representation,
        flags: CreationFlags,
    ) -> OpResult {
        self.create_object(
            key,
            id,
            ObjectVariant::Participant {
                domain_id,
                representation,
            },
            flags,
        )
    }

    pub fn create_topic(
        &self,
        key: impl Into<ClientKey>,
        id: ObjectId,
        participant_id: ObjectId,
        representation: Representation,
        flags: CreationFlags,
    ) -> OpResult {
        self.create_object(
            key,
            id,
            ObjectVariant::Topic {
                participant_id,
                representation,
            },
            flags,
        )
    }

    pub fn create_publisher(
        &self,
        key: impl Into<ClientKey>,
        id: ObjectId,
        participant_id: ObjectId,
        representation: Representation,
        flags: CreationFlags,
    ) -> OpResult {
        self.create_object(
            key,
            id,
            ObjectVariant::Publisher {
                participant_id,
                representation,
            },
            flags,
        )
    }

    pub fn create_subscriber(
        &self,
        key: impl Into<ClientKey>,
        id: ObjectId,
        participant_id: ObjectId,
        representation: Representation,
        flags: CreationFlags,
    ) -> OpResult {
        self.create_object(
            key,
            id,
            ObjectVariant::Subscriber {
                participant_id,
                representation,
            },
            flags,
        )
    }

    pub fn create_datawriter(
        &self,
        key: impl Into<ClientKey>,
        id: ObjectId,
        publisher_id: ObjectId,
        representation: Representation,
        flags: CreationFlags,
    ) -> OpResult {
        self.create_object(
            key,
            id,
            ObjectVariant::DataWriter {
                publisher_id,
                representation,
            },
            flags,
        )
    }

    pub fn create_datareader(
        &self,
        key: impl Into<ClientKey>,
        id: ObjectId,
        subscriber_id: ObjectId,
        representation: Representation,
        flags: CreationFlags,
    ) -> OpResult {
        self.create_object(
            key,
            id,
            ObjectVariant::DataReader {
                subscriber_id,
                representation,
            },
            flags,
        )
    }

    pub fn delete_object(&self, key: impl Into<ClientKey>, id: ObjectId) -> OpResult {
        let key = key.into();
        match self.client(key) {
            Some(client) => client.registry.delete(id),
            None => unknown_client(key),
        }
    }

    // -----------------------------------------------------------------------
    // Data path
    // -----------------------------------------------------------------------

    /// Write one serialized sample through a client's writer.
    pub fn write(&self, key: impl Into<ClientKey>, writer_id: ObjectId, data: &[u8]) -> OpResult {
        let key = key.into();
        let Some(client) = self.client(key) else {
            return unknown_client(key);
        };
        match client
            .registry
            .with_datawriter(writer_id, |w| w.write(data))
            .and_then(|r| r)
        {
            Ok(()) => OpResult::Ok,
            Err(e) => {
                log::warn!("[XRCE] client {} write via {} failed: {}", key, writer_id, e);
                OpResult::from(&e)
            }
        }
    }

    /// Start a read session on a client's reader.
    ///
    /// `sink` receives `(reader_id, sample)` from the reader's worker thread.
    /// It must not call back into this client's entities.
    pub fn read<F>(
        &self,
        key: impl Into<ClientKey>,
        reader_id: ObjectId,
        request: ReadRequest,
        sink: F,
    ) -> OpResult
    where
        F: FnMut(ObjectId, Vec<u8>) + Send + 'static,
    {
        let key = key.into();
        let Some(client) = self.client(key) else {
            return unknown_client(key);
        };
        let request = self.normalize(request);
        match client
            .registry
            .with_datareader(reader_id, |r| r.read(&request, sink))
            .and_then(|r| r)
        {
            Ok(()) => OpResult::Ok,
            Err(e) => {
                log::warn!("[XRCE] client {} read on {} failed: {}", key, reader_id, e);
                OpResult::from(&e)
            }
        }
    }

    /// Take one sample synchronously, waiting up to `read_timeout_ms`.
    pub fn read_once(
        &self,
        key: impl Into<ClientKey>,
        reader_id: ObjectId,
    ) -> Result<Option<Vec<u8>>, XrceError> {
        let key = key.into();
        let client = self
            .client(key)
            .ok_or_else(|| XrceError::UnknownReference(format!("client {}", key)))?;
        let timeout = Duration::from_millis(self.config.read_timeout_ms);
        client
            .registry
            .with_datareader(reader_id, |r| r.read_once(timeout))?
    }

    pub fn stop_reading(&self, key: impl Into<ClientKey>, reader_id: ObjectId) -> OpResult {
        let key = key.into();
        let Some(client) = self.client(key) else {
            return unknown_client(key);
        };
        match client.registry.with_datareader(reader_id, |r| r.stop_read()) {
            Ok(()) => OpResult::Ok,
            Err(e) => {
                log::warn!("[XRCE] client {} stop on {} failed: {}", key, reader_id, e);
                OpResult::from(&e)
            }
        }
    }

    /// Fill in delivery defaults and apply the configured rate cap.
    fn normalize(&self, mut request: ReadRequest) -> ReadRequest {
        let mut control = request.delivery_control.unwrap_or(DeliveryControl {
            max_samples: self.config.default_max_samples,
            ..DeliveryControl::default()
        });
        let cap = self.config.max_bytes_per_second_cap;
        if cap > 0 && (control.max_bytes_per_second == 0 || control.max_bytes_per_second > cap) {
            control.max_bytes_per_second = cap;
        }
        request.delivery_control = Some(control);
        request
    }
}

fn unknown_client(key: ClientKey) -> OpResult {
    log::warn!("[XRCE] request from unknown client {}", key);
    OpResult::UnknownReferenceError
}
