//! Parsing of `INFO replication` text blocks.

use std::collections::HashMap;

use crate::topology::NodeRole;

/// Key/value pairs from an INFO reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeInfo {
    fields: HashMap<String, String>,
}

/// Parses an INFO text block.
///
/// Empty lines, `#` section headers and lines without exactly one `:`
/// are skipped. Values are kept verbatim; a trailing `\r` is trimmed.
pub fn parse_info(text: &str) -> NodeInfo {
    let mut fields = HashMap::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split(':');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        fields.insert(key.to_string(), value.to_string());
    }
    NodeInfo { fields }
}

impl NodeInfo {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Role as reported in the `role` field.
    pub fn role(&self) -> NodeRole {
        match self.get("role") {
            Some("master") => NodeRole::Primary,
            Some("slave") | Some("replica") => NodeRole::Replica,
            _ => NodeRole::Unknown,
        }
    }
}
