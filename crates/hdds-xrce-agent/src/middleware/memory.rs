// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process middleware: entities live in hash maps and samples are routed
//! between writers and readers that share a topic name and domain.
//!
//! Every instance keeps its own entity ids. Instances attached to the same
//! [`InMemoryNetwork`] exchange samples, the way separate DDS participants
//! meet on a shared network. Useful as a loopback backend for tests and for
//! agents embedded next to their clients. Reference names are resolved through [`ReferenceProfiles`]
//! and every representation is normalized into a small config struct, so
//! `matched_*` is plain structural equality.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::xml;
use super::{DataListener, Middleware};
use crate::config::ReferenceProfiles;
use crate::error::XrceError;
use crate::object::{
    BinaryRepresentation, EndpointQos, ObjectId, ObjectKind, ObjectVariant, Representation,
};

// ---------------------------------------------------------------------------
// Normalized entity configurations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct TopicConfig {
    name: String,
    type_name: String,
    keyed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PubSubConfig {
    /// Opaque text when the XML could not be parsed as a profile.
    label: Option<String>,
    partitions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EndpointConfig {
    topic_name: String,
    type_name: Option<String>,
    qos: EndpointQos,
}

struct ParticipantEntry {
    domain_id: i16,
    name: String,
}

struct TopicEntry {
    participant: u16,
    config: TopicConfig,
}

struct PubSubEntry {
    participant: u16,
    config: PubSubConfig,
}

struct WriterEntry {
    publisher: u16,
    config: EndpointConfig,
}

struct ReaderEntry {
    subscriber: u16,
    config: EndpointConfig,
    queue: VecDeque<Vec<u8>>,
    listener: Option<DataListener>,
}

#[derive(Default)]
struct State {
    participants: HashMap<u16, ParticipantEntry>,
    topics: HashMap<u16, TopicEntry>,
    publishers: HashMap<u16, PubSubEntry>,
    subscribers: HashMap<u16, PubSubEntry>,
    writers: HashMap<u16, WriterEntry>,
    readers: HashMap<u16, ReaderEntry>,
}

impl State {
    fn participant_of_publisher(&self, publisher: u16) -> Option<u16> {
        self.publishers.get(&publisher).map(|p| p.participant)
    }

    fn participant_of_subscriber(&self, subscriber: u16) -> Option<u16> {
        self.subscribers.get(&subscriber).map(|s| s.participant)
    }

    fn domain_of(&self, participant: u16) -> Option<i16> {
        self.participants.get(&participant).map(|p| p.domain_id)
    }

    /// Endpoints must name a topic already registered under their participant.
    fn check_endpoint_topic(
        &self,
        participant: u16,
        config: &EndpointConfig,
    ) -> Result<(), XrceError> {
        let topic = self
            .topics
            .values()
            .find(|t| t.participant == participant && t.config.name == config.topic_name)
            .ok_or_else(|| XrceError::UnknownReference(config.topic_name.clone()))?;
        if let Some(type_name) = &config.type_name {
            if *type_name != topic.config.type_name {
                return Err(XrceError::InvalidRepresentation(format!(
                    "topic {} carries type {}, endpoint expects {}",
                    config.topic_name, topic.config.type_name, type_name
                )));
            }
        }
        Ok(())
    }

    fn contains(&self, id: u16) -> bool {
        self.participants.contains_key(&id)
            || self.topics.contains_key(&id)
            || self.publishers.contains_key(&id)
            || self.subscribers.contains_key(&id)
            || self.writers.contains_key(&id)
            || self.readers.contains_key(&id)
    }

    fn len(&self) -> usize {
        self.participants.len()
            + self.topics.len()
            + self.publishers.len()
            + self.subscribers.len()
            + self.writers.len()
            + self.readers.len()
    }
}

// ---------------------------------------------------------------------------
// InMemoryNetwork
// ---------------------------------------------------------------------------

/// Entity tables of one middleware instance.
#[derive(Default)]
struct Node {
    state: Mutex<State>,
    data_ready: Condvar,
}

impl Node {
    /// Queue `data` on every reader of `topic_name` in `domain`.
    /// Returns the listeners to fire once the lock is released.
    fn deliver(&self, topic_name: &str, domain: Option<i16>, data: &[u8]) -> Vec<DataListener> {
        let mut listeners = Vec::new();
        {
            let mut state = self.state.lock();
            let targets: Vec<u16> = state
                .readers
                .iter()
                .filter(|(_, r)| r.config.topic_name == topic_name)
                .filter(|(_, r)| {
                    state
                        .participant_of_subscriber(r.subscriber)
                        .and_then(|p| state.domain_of(p))
                        == domain
                })
                .map(|(id, _)| *id)
                .collect();

            for id in targets {
                if let Some(reader) = state.readers.get_mut(&id) {
                    let depth = reader.config.qos.history_depth as usize;
                    if depth > 0 {
                        while reader.queue.len() >= depth {
                            reader.queue.pop_front();
                        }
                    }
                    reader.queue.push_back(data.to_vec());
                    if let Some(listener) = &reader.listener {
                        listeners.push(listener.clone());
                    }
                }
            }
        }
        self.data_ready.notify_all();
        listeners
    }
}

/// Data space shared by several [`InMemoryMiddleware`] instances.
///
/// Cloning yields another handle to the same network.
#[derive(Clone, Default)]
pub struct InMemoryNetwork {
    nodes: Arc<Mutex<Vec<Weak<Node>>>>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of middleware instances still attached.
    pub fn node_count(&self) -> usize {
        self.nodes.lock().iter().filter(|n| n.strong_count() > 0).count()
    }

    fn attach(&self, node: &Arc<Node>) {
        let mut nodes = self.nodes.lock();
        nodes.retain(|n| n.strong_count() > 0);
        nodes.push(Arc::downgrade(node));
    }

    fn live_nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.lock().iter().filter_map(Weak::upgrade).collect()
    }
}

// ---------------------------------------------------------------------------
// InMemoryMiddleware
// ---------------------------------------------------------------------------

/// Loopback middleware keeping every entity and sample in memory.
pub struct InMemoryMiddleware {
    profiles: ReferenceProfiles,
    node: Arc<Node>,
    network: InMemoryNetwork,
}

impl InMemoryMiddleware {
    /// Instance on a private network of its own.
    pub fn new(profiles: ReferenceProfiles) -> Self {
        Self::on_network(profiles, &InMemoryNetwork::new())
    }

    /// Instance exchanging samples with every other instance on `network`.
    pub fn on_network(profiles: ReferenceProfiles, network: &InMemoryNetwork) -> Self {
        let node = Arc::new(Node::default());
        network.attach(&node);
        Self {
            profiles,
            node,
            network: network.clone(),
        }
    }

    pub fn with_builtin_profiles() -> Self {
        Self::new(ReferenceProfiles::builtin())
    }

    /// Number of live entities of all kinds.
    pub fn entity_count(&self) -> usize {
        self.node.state.lock().len()
    }

    /// True if any entity is registered under `id`.
    pub fn contains(&self, id: u16) -> bool {
        self.node.state.lock().contains(id)
    }

    fn resolve<'a>(&'a self, representation: &'a Representation) -> Result<&'a str, XrceError> {
        match representation {
            Representation::Reference(name) => self
                .profiles
                .get(name)
                .ok_or_else(|| XrceError::UnknownReference(name.clone())),
            Representation::Xml(text) => Ok(text.as_str()),
            Representation::Binary(_) => Err(XrceError::InvalidRepresentation(
                "binary representation has no XML form".into(),
            )),
        }
    }

    fn participant_name(&self, representation: &Representation) -> Result<String, XrceError> {
        match representation {
            Representation::Binary(BinaryRepresentation::Participant { name }) => Ok(name.clone()),
            Representation::Binary(other) => Err(wrong_binary("participant", other)),
            _ => xml::parse_participant(self.resolve(representation)?),
        }
    }

    fn topic_config(&self, representation: &Representation) -> Result<TopicConfig, XrceError> {
        match representation {
            Representation::Binary(BinaryRepresentation::Topic {
                topic_name,
                type_name,
            }) => Ok(TopicConfig {
                name: topic_name.clone(),
                type_name: type_name.clone(),
                keyed: false,
            }),
            Representation::Binary(other) => Err(wrong_binary("topic", other)),
            _ => {
                let profile = xml::parse_topic(self.resolve(representation)?)?;
                Ok(TopicConfig {
                    name: profile.name,
                    type_name: profile.type_name,
                    keyed: profile.keyed,
                })
            }
        }
    }

    fn pubsub_config(
        &self,
        representation: &Representation,
        tag: &str,
    ) -> Result<PubSubConfig, XrceError> {
        match (representation, tag) {
            (Representation::Binary(BinaryRepresentation::Publisher { partitions }), "publisher")
            | (
                Representation::Binary(BinaryRepresentation::Subscriber { partitions }),
                "subscriber",
            ) => {
                let mut partitions = partitions.clone();
                partitions.sort();
                Ok(PubSubConfig {
                    label: None,
                    partitions,
                })
            }
            (Representation::Binary(other), _) => Err(wrong_binary(tag, other)),
            (Representation::Reference(_), _) => {
                let partitions = xml::parse_partitions(self.resolve(representation)?, tag)?;
                Ok(PubSubConfig {
                    label: None,
                    partitions,
                })
            }
            // Clients commonly send a bare name instead of a full profile.
            (Representation::Xml(text), _) => match xml::parse_partitions(text, tag) {
                Ok(partitions) => Ok(PubSubConfig {
                    label: None,
                    partitions,
                }),
                Err(_) => Ok(PubSubConfig {
                    label: Some(text.clone()),
                    partitions: Vec::new(),
                }),
            },
        }
    }

    fn endpoint_config(
        &self,
        representation: &Representation,
        tag: &str,
    ) -> Result<EndpointConfig, XrceError> {
        match (representation, tag) {
            (
                Representation::Binary(BinaryRepresentation::DataWriter { topic_name, qos }),
                "data_writer",
            )
            | (
                Representation::Binary(BinaryRepresentation::DataReader { topic_name, qos }),
                "data_reader",
            ) => Ok(EndpointConfig {
                topic_name: topic_name.clone(),
                type_name: None,
                qos: qos.clone(),
            }),
            (Representation::Binary(other), _) => Err(wrong_binary(tag, other)),
            _ => {
                let profile = xml::parse_endpoint(self.resolve(representation)?, tag)?;
                Ok(EndpointConfig {
                    topic_name: profile.topic_name,
                    type_name: profile.type_name,
                    qos: profile.qos,
                })
            }
        }
    }
}

impl Default for InMemoryMiddleware {
    fn default() -> Self {
        Self::with_builtin_profiles()
    }
}

fn wrong_binary(expected: &str, got: &BinaryRepresentation) -> XrceError {
    XrceError::InvalidRepresentation(format!(
        "expected {} representation, got {:?}",
        expected,
        got.kind()
    ))
}

fn already_exists(id: u16) -> XrceError {
    XrceError::Middleware(format!("entity {} already exists", ObjectId::from_raw(id)))
}

fn not_found(id: u16) -> XrceError {
    XrceError::ObjectNotFound(ObjectId::from_raw(id))
}

fn parent_raw(variant: &ObjectVariant) -> Result<u16, XrceError> {
    variant.parent_id().map(ObjectId::raw).ok_or_else(|| {
        XrceError::InvalidRepresentation(format!("{:?} without a parent", variant.kind()))
    })
}

impl Middleware for InMemoryMiddleware {
    // --- creation -----------------------------------------------------------

    fn create_participant(
        &self,
        id: u16,
        domain_id: i16,
        representation: &Representation,
    ) -> Result<(), XrceError> {
        let name = self.participant_name(representation)?;
        let mut state = self.node.state.lock();
        if state.contains(id) {
            return Err(already_exists(id));
        }
        state
            .participants
            .insert(id, ParticipantEntry { domain_id, name });
        Ok(())
    }

    fn create_topic(
        &self,
        id: u16,
        participant_id: u16,
        representation: &Representation,
    ) -> Result<(), XrceError> {
        let config = self.topic_config(representation)?;
        let mut state = self.node.state.lock();
        if state.contains(id) {
            return Err(already_exists(id));
        }
        if !state.participants.contains_key(&participant_id) {
            return Err(not_found(participant_id));
        }
        state.topics.insert(
            id,
            TopicEntry {
                participant: participant_id,
                config,
            },
        );
        Ok(())
    }

    fn create_publisher(
        &self,
        id: u16,
        participant_id: u16,
        representation: &Representation,
    ) -> Result<(), XrceError> {
        let config = self.pubsub_config(representation, "publisher")?;
        let mut state = self.node.state.lock();
        if state.contains(id) {
            return Err(already_exists(id));
        }
        if !state.participants.contains_key(&participant_id) {
            return Err(not_found(participant_id));
        }
        state.publishers.insert(
            id,
            PubSubEntry {
                participant: participant_id,
                config,
            },
        );
        Ok(())
    }

    fn create_subscriber(
        &self,
        id: u16,
        participant_id: u16,
        representation: &Representation,
    ) -> Result<(), XrceError> {
        let config = self.pubsub_config(representation, "subscriber")?;
        let mut state = self.node.state.lock();
        if state.contains(id) {
            return Err(already_exists(id));
        }
        if !state.participants.contains_key(&participant_id) {
            return Err(not_found(participant_id));
        }
        state.subscribers.insert(
            id,
            PubSubEntry {
                participant: participant_id,
                config,
            },
        );
        Ok(())
    }

    fn create_datawriter(
        &self,
        id: u16,
        publisher_id: u16,
        representation: &Representation,
    ) -> Result<(), XrceError> {
        let config = self.endpoint_config(representation, "data_writer")?;
        let mut state = self.node.state.lock();
        if state.contains(id) {
            return Err(already_exists(id));
        }
        let participant = state
            .participant_of_publisher(publisher_id)
            .ok_or_else(|| not_found(publisher_id))?;
        state.check_endpoint_topic(participant, &config)?;
        state.writers.insert(
            id,
            WriterEntry {
                publisher: publisher_id,
                config,
            },
        );
        Ok(())
    }

    fn create_datareader(
        &self,
        id: u16,
        subscriber_id: u16,
        representation: &Representation,
    ) -> Result<(), XrceError> {
        let config = self.endpoint_config(representation, "data_reader")?;
        let mut state = self.node.state.lock();
        if state.contains(id) {
            return Err(already_exists(id));
        }
        let participant = state
            .participant_of_subscriber(subscriber_id)
            .ok_or_else(|| not_found(subscriber_id))?;
        state.check_endpoint_topic(participant, &config)?;
        state.readers.insert(
            id,
            ReaderEntry {
                subscriber: subscriber_id,
                config,
                queue: VecDeque::new(),
                listener: None,
            },
        );
        Ok(())
    }

    fn validate_creation(&self, variant: &ObjectVariant) -> Result<(), XrceError> {
        let representation = variant.representation();
        match variant.kind() {
            ObjectKind::Participant => self.participant_name(representation).map(|_| ()),
            ObjectKind::Topic => self.topic_config(representation).map(|_| ()),
            ObjectKind::Publisher => self.pubsub_config(representation, "publisher").map(|_| ()),
            ObjectKind::Subscriber => self.pubsub_config(representation, "subscriber").map(|_| ()),
            ObjectKind::DataWriter => {
                let config = self.endpoint_config(representation, "data_writer")?;
                let publisher = parent_raw(variant)?;
                let state = self.node.state.lock();
                let participant = state
                    .participant_of_publisher(publisher)
                    .ok_or_else(|| not_found(publisher))?;
                state.check_endpoint_topic(participant, &config)
            }
            ObjectKind::DataReader => {
                let config = self.endpoint_config(representation, "data_reader")?;
                let subscriber = parent_raw(variant)?;
                let state = self.node.state.lock();
                let participant = state
                    .participant_of_subscriber(subscriber)
                    .ok_or_else(|| not_found(subscriber))?;
                state.check_endpoint_topic(participant, &config)
            }
        }
    }

    // --- matching -----------------------------------------------------------

    fn matched_participant(&self, id: u16, representation: &Representation) -> bool {
        let Ok(name) = self.participant_name(representation) else {
            return false;
        };
        self.node.state
            .lock()
            .participants
            .get(&id)
            .is_some_and(|p| p.name == name)
    }

    fn matched_topic(&self, id: u16, representation: &Representation) -> bool {
        let Ok(config) = self.topic_config(representation) else {
            return false;
        };
        self.node.state
            .lock()
            .topics
            .get(&id)
            .is_some_and(|t| t.config == config)
    }

    fn matched_publisher(&self, id: u16, representation: &Representation) -> bool {
        let Ok(config) = self.pubsub_config(representation, "publisher") else {
            return false;
        };
        self.node.state
            .lock()
            .publishers
            .get(&id)
            .is_some_and(|p| p.config == config)
    }

    fn matched_subscriber(&self, id: u16, representation: &Representation) -> bool {
        let Ok(config) = self.pubsub_config(representation, "subscriber") else {
            return false;
        };
        self.node.state
            .lock()
            .subscribers
            .get(&id)
            .is_some_and(|s| s.config == config)
    }

    fn matched_datawriter(&self, id: u16, representation: &Representation) -> bool {
        let Ok(config) = self.endpoint_config(representation, "data_writer") else {
            return false;
        };
        self.node.state
            .lock()
            .writers
            .get(&id)
            .is_some_and(|w| w.config == config)
    }

    fn matched_datareader(&self, id: u16, representation: &Representation) -> bool {
        let Ok(config) = self.endpoint_config(representation, "data_reader") else {
            return false;
        };
        self.node.state
            .lock()
            .readers
            .get(&id)
            .is_some_and(|r| r.config == config)
    }

    // --- deletion -----------------------------------------------------------

    fn delete_participant(&self, id: u16) -> Result<(), XrceError> {
        self.node.state
            .lock()
            .participants
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    fn delete_topic(&self, id: u16) -> Result<(), XrceError> {
        self.node.state
            .lock()
            .topics
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    fn delete_publisher(&self, id: u16) -> Result<(), XrceError> {
        self.node.state
            .lock()
            .publishers
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    fn delete_subscriber(&self, id: u16) -> Result<(), XrceError> {
        self.node.state
            .lock()
            .subscribers
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    fn delete_datawriter(&self, id: u16) -> Result<(), XrceError> {
        self.node.state
            .lock()
            .writers
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    fn delete_datareader(&self, id: u16) -> Result<(), XrceError> {
        let removed = self.node.state.lock().readers.remove(&id);
        // Wake any read_data() blocked on this reader so it can observe the removal.
        self.node.data_ready.notify_all();
        removed.map(|_| ()).ok_or_else(|| not_found(id))
    }

    // --- data path ----------------------------------------------------------

    fn write_data(&self, writer_id: u16, data: &[u8]) -> Result<(), XrceError> {
        let (topic_name, domain) = {
            let state = self.node.state.lock();
            let writer = state.writers.get(&writer_id).ok_or_else(|| not_found(writer_id))?;
            let domain = state
                .participant_of_publisher(writer.publisher)
                .and_then(|p| state.domain_of(p));
            (writer.config.topic_name.clone(), domain)
        };

        // One node lock at a time; listeners run with no lock held since
        // they may call back into us.
        let mut listeners = Vec::new();
        for node in self.network.live_nodes() {
            listeners.extend(node.deliver(&topic_name, domain, data));
        }
        log::trace!(
            "[XRCE-MW] writer {} -> {} bytes on '{}'",
            ObjectId::from_raw(writer_id),
            data.len(),
            topic_name
        );
        for listener in listeners {
            listener();
        }
        Ok(())
    }

    fn read_data(&self, reader_id: u16, timeout: Duration) -> Result<Option<Vec<u8>>, XrceError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.node.state.lock();
        loop {
            let reader = state
                .readers
                .get_mut(&reader_id)
                .ok_or_else(|| not_found(reader_id))?;
            if let Some(sample) = reader.queue.pop_front() {
                return Ok(Some(sample));
            }
            if self.node.data_ready.wait_until(&mut state, deadline).timed_out() {
                return Ok(state
                    .readers
                    .get_mut(&reader_id)
                    .and_then(|r| r.queue.pop_front()));
            }
        }
    }

    fn unread_count(&self, reader_id: u16) -> usize {
        self.node.state
            .lock()
            .readers
            .get(&reader_id)
            .map_or(0, |r| r.queue.len())
    }

    fn next_sample_size(&self, reader_id: u16) -> Option<usize> {
        self.node.state
            .lock()
            .readers
            .get(&reader_id)
            .and_then(|r| r.queue.front().map(Vec::len))
    }

    fn take_next_sample(&self, reader_id: u16) -> Option<Vec<u8>> {
        self.node.state
            .lock()
            .readers
            .get_mut(&reader_id)
            .and_then(|r| r.queue.pop_front())
    }

    fn set_data_listener(&self, reader_id: u16, listener: Option<DataListener>) {
        if let Some(reader) = self.node.state.lock().readers.get_mut(&reader_id) {
            reader.listener = listener;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    const PARTICIPANT: u16 = 0x0011;
    const TOPIC: u16 = 0x0012;
    const PUBLISHER: u16 = 0x0013;
    const SUBSCRIBER: u16 = 0x0014;
    const WRITER: u16 = 0x0015;
    const READER: u16 = 0x0016;

    fn keep_all() -> EndpointQos {
        EndpointQos {
            history_depth: 0,
            ..EndpointQos::default()
        }
    }

    fn setup() -> InMemoryMiddleware {
        let mw = InMemoryMiddleware::with_builtin_profiles();
        mw.create_participant(PARTICIPANT, 0, &Representation::by_ref("default_xrce_participant"))
            .unwrap();
        mw.create_topic(TOPIC, PARTICIPANT, &Representation::by_ref("shapetype_topic"))
            .unwrap();
        mw.create_publisher(PUBLISHER, PARTICIPANT, &Representation::by_xml("publisher"))
            .unwrap();
        mw.create_subscriber(SUBSCRIBER, PARTICIPANT, &Representation::by_xml("subscriber"))
            .unwrap();
        mw.create_datawriter(
            WRITER,
            PUBLISHER,
            &Representation::Binary(BinaryRepresentation::DataWriter {
                topic_name: "Square".into(),
                qos: keep_all(),
            }),
        )
        .unwrap();
        mw.create_datareader(
            READER,
            SUBSCRIBER,
            &Representation::Binary(BinaryRepresentation::DataReader {
                topic_name: "Square".into(),
                qos: keep_all(),
            }),
        )
        .unwrap();
        mw
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let mw = InMemoryMiddleware::with_builtin_profiles();
        let err = mw
            .create_participant(PARTICIPANT, 0, &Representation::by_ref("nope"))
            .unwrap_err();
        assert!(matches!(err, XrceError::UnknownReference(_)));
        assert_eq!(mw.entity_count(), 0);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mw = setup();
        assert!(mw
            .create_topic(TOPIC, PARTICIPANT, &Representation::by_ref("shapetype_topic"))
            .is_err());
    }

    #[test]
    fn test_endpoint_requires_topic() {
        let mw = setup();
        let err = mw
            .create_datawriter(
                0x0025,
                PUBLISHER,
                &Representation::Binary(BinaryRepresentation::DataWriter {
                    topic_name: "Circle".into(),
                    qos: EndpointQos::default(),
                }),
            )
            .unwrap_err();
        assert!(matches!(err, XrceError::UnknownReference(_)));
    }

    #[test]
    fn test_endpoint_type_must_match_topic() {
        let mw = setup();
        let xml = "<dds><data_writer><topic><name>Square</name>\
                   <dataType>Other</dataType></topic></data_writer></dds>";
        let err = mw
            .create_datawriter(0x0025, PUBLISHER, &Representation::by_xml(xml))
            .unwrap_err();
        assert!(matches!(err, XrceError::InvalidRepresentation(_)));
    }

    #[test]
    fn test_matching() {
        let mw = setup();
        assert!(mw.matched_participant(
            PARTICIPANT,
            &Representation::by_ref("default_xrce_participant")
        ));
        assert!(!mw.matched_participant(
            PARTICIPANT,
            &Representation::by_ref("default_xrce_participant_two")
        ));
        assert!(mw.matched_topic(TOPIC, &Representation::by_ref("shapetype_topic")));
        assert!(!mw.matched_topic(TOPIC, &Representation::by_ref("helloworld_topic")));
        assert!(mw.matched_publisher(PUBLISHER, &Representation::by_xml("publisher")));
        assert!(!mw.matched_publisher(PUBLISHER, &Representation::by_xml("publisher_two")));
        // Wrong kind of binary never matches
        assert!(!mw.matched_datawriter(
            WRITER,
            &Representation::Binary(BinaryRepresentation::Topic {
                topic_name: "Square".into(),
                type_name: "ShapeType".into(),
            })
        ));
        // Unknown id never matches
        assert!(!mw.matched_topic(0x0FF2, &Representation::by_ref("shapetype_topic")));
    }

    #[test]
    fn test_write_routes_to_reader() {
        let mw = setup();
        mw.write_data(WRITER, b"abc").unwrap();
        mw.write_data(WRITER, b"de").unwrap();
        assert_eq!(mw.unread_count(READER), 2);
        assert_eq!(mw.next_sample_size(READER), Some(3));
        assert_eq!(mw.take_next_sample(READER).unwrap(), b"abc");
        assert_eq!(mw.take_next_sample(READER).unwrap(), b"de");
        assert_eq!(mw.take_next_sample(READER), None);
    }

    #[test]
    fn test_history_depth_drops_oldest() {
        let mw = setup();
        mw.create_datareader(
            0x0026,
            SUBSCRIBER,
            &Representation::Binary(BinaryRepresentation::DataReader {
                topic_name: "Square".into(),
                qos: EndpointQos::default(),
            }),
        )
        .unwrap();
        mw.write_data(WRITER, b"1").unwrap();
        mw.write_data(WRITER, b"2").unwrap();
        assert_eq!(mw.unread_count(0x0026), 1);
        assert_eq!(mw.take_next_sample(0x0026).unwrap(), b"2");
    }

    #[test]
    fn test_listener_called_per_sample() {
        let mw = setup();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        mw.set_data_listener(
            READER,
            Some(Arc::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })),
        );
        mw.write_data(WRITER, b"x").unwrap();
        mw.write_data(WRITER, b"y").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        mw.set_data_listener(READER, None);
        mw.write_data(WRITER, b"z").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_read_data_times_out() {
        let mw = setup();
        let start = Instant::now();
        let sample = mw.read_data(READER, Duration::from_millis(20)).unwrap();
        assert!(sample.is_none());
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_read_data_wakes_on_write() {
        let mw = Arc::new(setup());
        let writer = mw.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer.write_data(WRITER, b"late").unwrap();
        });
        let sample = mw.read_data(READER, Duration::from_secs(2)).unwrap();
        assert_eq!(sample.unwrap(), b"late");
        handle.join().unwrap();
    }

    #[test]
    fn test_delete_and_counts() {
        let mw = setup();
        assert_eq!(mw.entity_count(), 6);
        mw.delete_datareader(READER).unwrap();
        assert!(!mw.contains(READER));
        assert!(mw.delete_datareader(READER).is_err());
        assert!(mw.read_data(READER, Duration::from_millis(1)).is_err());
        assert_eq!(mw.entity_count(), 5);
    }

    fn build_on(network: &InMemoryNetwork) -> InMemoryMiddleware {
        let mw = InMemoryMiddleware::on_network(ReferenceProfiles::builtin(), network);
        mw.create_participant(PARTICIPANT, 0, &Representation::by_ref("default_xrce_participant"))
            .unwrap();
        mw.create_topic(TOPIC, PARTICIPANT, &Representation::by_ref("shapetype_topic"))
            .unwrap();
        mw.create_publisher(PUBLISHER, PARTICIPANT, &Representation::by_xml("publisher"))
            .unwrap();
        mw.create_subscriber(SUBSCRIBER, PARTICIPANT, &Representation::by_xml("subscriber"))
            .unwrap();
        mw.create_datawriter(WRITER, PUBLISHER, &Representation::by_ref("shapetype_data_writer"))
            .unwrap();
        mw.create_datareader(READER, SUBSCRIBER, &Representation::by_ref("shapetype_data_reader"))
            .unwrap();
        mw
    }

    #[test]
    fn test_network_instances_share_ids_and_samples() {
        let network = InMemoryNetwork::new();
        // Same ids on both sides: each instance has its own tables
        let left = build_on(&network);
        let right = build_on(&network);
        assert_eq!(network.node_count(), 2);
        assert_eq!(left.entity_count(), 6);
        assert_eq!(right.entity_count(), 6);

        left.write_data(WRITER, b"hello").unwrap();
        assert_eq!(left.take_next_sample(READER).unwrap(), b"hello");
        assert_eq!(right.take_next_sample(READER).unwrap(), b"hello");

        right.delete_datareader(READER).unwrap();
        assert!(left.contains(READER));

        drop(right);
        assert_eq!(network.node_count(), 1);
        left.write_data(WRITER, b"again").unwrap();
        assert_eq!(left.unread_count(READER), 1);
    }

    #[test]
    fn test_private_instances_are_isolated() {
        let a = setup();
        let b = setup();
        a.write_data(WRITER, b"only-a").unwrap();
        assert_eq!(a.unread_count(READER), 1);
        assert_eq!(b.unread_count(READER), 0);
    }

    #[test]
    fn test_validate_creation_is_a_dry_run() {
        let mw = setup();
        let participant = |rep: Representation| ObjectVariant::Participant {
            domain_id: 0,
            representation: rep,
        };
        assert!(mw
            .validate_creation(&participant(Representation::by_ref("default_xrce_participant")))
            .is_ok());
        assert!(matches!(
            mw.validate_creation(&participant(Representation::by_ref("no_such_profile"))),
            Err(XrceError::UnknownReference(_))
        ));

        let writer = |topic: &str| ObjectVariant::DataWriter {
            publisher_id: ObjectId::from_raw(PUBLISHER),
            representation: Representation::Binary(BinaryRepresentation::DataWriter {
                topic_name: topic.into(),
                qos: EndpointQos::default(),
            }),
        };
        assert!(mw.validate_creation(&writer("Square")).is_ok());
        assert!(mw.validate_creation(&writer("Circle")).is_err());

        let orphan = ObjectVariant::DataReader {
            subscriber_id: ObjectId::from_raw(0x0FF4),
            representation: Representation::by_ref("shapetype_data_reader"),
        };
        assert!(matches!(
            mw.validate_creation(&orphan),
            Err(XrceError::ObjectNotFound(_))
        ));
        // Nothing was created along the way
        assert_eq!(mw.entity_count(), 6);
    }
}
