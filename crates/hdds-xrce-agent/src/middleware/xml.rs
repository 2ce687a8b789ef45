// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! XML profile parsing for entity representations.
//!
//! Profiles follow the Fast DDS layout used by XRCE clients:
//!
//! ```xml
//! <dds>
//!   <data_writer>
//!     <topic>
//!       <kind>NO_KEY</kind>
//!       <name>HelloWorldTopic</name>
//!       <dataType>HelloWorld</dataType>
//!       <historyQos><kind>KEEP_LAST</kind><depth>5</depth></historyQos>
//!     </topic>
//!     <qos><durability><kind>TRANSIENT_LOCAL</kind></durability></qos>
//!   </data_writer>
//! </dds>
//! ```

use roxmltree::{Document, Node};

use crate::error::XrceError;
use crate::object::{Durability, EndpointQos, Reliability};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TopicProfile {
    pub name: String,
    pub type_name: String,
    pub keyed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EndpointProfile {
    pub topic_name: String,
    pub type_name: Option<String>,
    pub qos: EndpointQos,
}

pub(crate) fn parse_participant(xml: &str) -> Result<String, XrceError> {
    let doc = parse(xml)?;
    let profile = find_profile(&doc, "participant")?;
    Ok(child_text(profile, &["rtps", "name"]).unwrap_or_default())
}

pub(crate) fn parse_topic(xml: &str) -> Result<TopicProfile, XrceError> {
    let doc = parse(xml)?;
    let profile = find_profile(&doc, "topic")?;
    let name = child_text(profile, &["name"])
        .ok_or_else(|| XrceError::InvalidXml("topic without <name>".into()))?;
    let type_name = child_text(profile, &["dataType"])
        .ok_or_else(|| XrceError::InvalidXml("topic without <dataType>".into()))?;
    let keyed = child_text(profile, &["kind"]).as_deref() == Some("WITH_KEY");
    Ok(TopicProfile {
        name,
        type_name,
        keyed,
    })
}

/// Publisher/subscriber partitions (`<qos><partition><names><name>`).
pub(crate) fn parse_partitions(xml: &str, tag: &str) -> Result<Vec<String>, XrceError> {
    let doc = parse(xml)?;
    let profile = find_profile(&doc, tag)?;
    let mut partitions: Vec<String> = profile
        .descendants()
        .filter(|n| n.tag_name().name() == "names")
        .flat_map(|names| names.children().filter(|n| n.has_tag_name("name")))
        .filter_map(|n| n.text().map(|t| t.trim().to_string()))
        .collect();
    partitions.sort();
    Ok(partitions)
}

/// `tag` is `data_writer` or `data_reader`.
pub(crate) fn parse_endpoint(xml: &str, tag: &str) -> Result<EndpointProfile, XrceError> {
    let doc = parse(xml)?;
    let profile = find_profile(&doc, tag)?;
    let topic = element(profile, "topic")
        .ok_or_else(|| XrceError::InvalidXml(format!("{} without <topic>", tag)))?;
    let topic_name = child_text(topic, &["name"])
        .ok_or_else(|| XrceError::InvalidXml(format!("{} topic without <name>", tag)))?;
    let type_name = child_text(topic, &["dataType"]);

    let mut qos = EndpointQos::default();
    if let Some(history) = element(topic, "historyQos") {
        match child_text(history, &["kind"]).as_deref() {
            Some("KEEP_ALL") => qos.history_depth = 0,
            _ => {
                if let Some(depth) = child_text(history, &["depth"]) {
                    qos.history_depth = depth.parse().map_err(|_| {
                        XrceError::InvalidXml(format!("invalid history depth: {}", depth))
                    })?;
                }
            }
        }
    }
    if let Some(qos_node) = element(profile, "qos") {
        if let Some(kind) = child_text(qos_node, &["reliability", "kind"]) {
            qos.reliability = match kind.as_str() {
                "RELIABLE" => Reliability::Reliable,
                "BEST_EFFORT" => Reliability::BestEffort,
                other => {
                    return Err(XrceError::InvalidXml(format!(
                        "unknown reliability kind: {}",
                        other
                    )))
                }
            };
        }
        if let Some(kind) = child_text(qos_node, &["durability", "kind"]) {
            qos.durability = match kind.as_str() {
                "VOLATILE" => Durability::Volatile,
                "TRANSIENT_LOCAL" => Durability::TransientLocal,
                "TRANSIENT" => Durability::Transient,
                "PERSISTENT" => Durability::Persistent,
                other => {
                    return Err(XrceError::InvalidXml(format!(
                        "unknown durability kind: {}",
                        other
                    )))
                }
            };
        }
    }

    Ok(EndpointProfile {
        topic_name,
        type_name,
        qos,
    })
}

fn parse(xml: &str) -> Result<Document<'_>, XrceError> {
    Document::parse(xml).map_err(|e| XrceError::InvalidXml(e.to_string()))
}

/// The profile element is either the root itself or a direct child of `<dds>`.
fn find_profile<'a, 'input>(
    doc: &'a Document<'input>,
    tag: &str,
) -> Result<Node<'a, 'input>, XrceError> {
    let root = doc.root_element();
    if root.has_tag_name(tag) {
        return Ok(root);
    }
    if root.has_tag_name("dds") {
        if let Some(node) = element(root, tag) {
            return Ok(node);
        }
    }
    Err(XrceError::InvalidXml(format!("no <{}> profile found", tag)))
}

fn element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.is_element() && n.has_tag_name(tag))
}

fn child_text(node: Node<'_, '_>, path: &[&str]) -> Option<String> {
    let mut current = node;
    for tag in path {
        current = element(current, tag)?;
    }
    current.text().map(|t| t.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_participant_name() {
        let xml = "<dds><participant><rtps><name>p1</name></rtps></participant></dds>";
        assert_eq!(parse_participant(xml).unwrap(), "p1");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_participant("error"), Err(XrceError::InvalidXml(_))));
        assert!(matches!(
            parse_topic("<dds><participant/></dds>"),
            Err(XrceError::InvalidXml(_))
        ));
    }

    #[test]
    fn test_parse_topic() {
        let xml = "<dds><topic><kind>WITH_KEY</kind><name>Square</name>\
                   <dataType>ShapeType</dataType></topic></dds>";
        let topic = parse_topic(xml).unwrap();
        assert_eq!(topic.name, "Square");
        assert_eq!(topic.type_name, "ShapeType");
        assert!(topic.keyed);
    }

    #[test]
    fn test_parse_endpoint_qos() {
        let xml = "<dds><data_reader><topic><name>T</name><dataType>X</dataType>\
                   <historyQos><kind>KEEP_LAST</kind><depth>7</depth></historyQos></topic>\
                   <qos><reliability><kind>RELIABLE</kind></reliability>\
                   <durability><kind>TRANSIENT_LOCAL</kind></durability></qos>\
                   </data_reader></dds>";
        let ep = parse_endpoint(xml, "data_reader").unwrap();
        assert_eq!(ep.topic_name, "T");
        assert_eq!(ep.type_name.as_deref(), Some("X"));
        assert_eq!(ep.qos.history_depth, 7);
        assert_eq!(ep.qos.reliability, Reliability::Reliable);
        assert_eq!(ep.qos.durability, Durability::TransientLocal);

        // Wrong profile tag
        assert!(parse_endpoint(xml, "data_writer").is_err());
    }

    #[test]
    fn test_parse_keep_all() {
        let xml = "<data_writer><topic><name>T</name>\
                   <historyQos><kind>KEEP_ALL</kind></historyQos></topic></data_writer>";
        let ep = parse_endpoint(xml, "data_writer").unwrap();
        assert_eq!(ep.qos.history_depth, 0);
        assert!(ep.type_name.is_none());
    }

    #[test]
    fn test_parse_partitions_sorted() {
        let xml = "<dds><publisher><qos><partition><names>\
                   <name>b</name><name>a</name></names></partition></qos></publisher></dds>";
        assert_eq!(parse_partitions(xml, "publisher").unwrap(), vec!["a", "b"]);
    }
}
