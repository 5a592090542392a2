//! # Controller Records
//!
//! Typed shapes for everything the controller's REST API hands back. Decoding
//! happens once, at the API boundary: identifiers are required (a record
//! without one is a decode error) while descriptive fields default-fill when
//! missing or `null`, so nothing downstream has to guard optional access.
//!
//! - [`Node`] - a mesh device, keyed by its 32-bit mesh address
//! - [`Link`] - a weighted edge between two node addresses
//! - [`Neighbor`] - one probe result from the current discovery run
//! - [`DiscoveryStatus`] - the controller's discovery process snapshot
//!
//! Node id rendering and link id packing live in [`ids`].

pub mod ids;

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub use ids::{
    format_legacy_node_id, format_node_id, normalize_node_label, pack_link_id, parse_node_id,
    unpack_link_id,
};

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A mesh device as reported by `GET nodes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tag: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub in_use: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_local: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Firmware revision, when the controller queried the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_tag: Option<String>,
    /// Last error the controller hit while querying this device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_power: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binded: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<i32>,
}

impl Node {
    pub fn new(id: u32, tag: impl Into<String>) -> Self {
        Node {
            id,
            tag: tag.into(),
            in_use: false,
            is_local: false,
            path: None,
            revision: None,
            dev_tag: None,
            error: None,
            channel: None,
            tx_power: None,
            groups: None,
            binded: None,
            flags: None,
        }
    }

    pub fn local(mut self) -> Self {
        self.is_local = true;
        self
    }

    /// Mesh address in the `N......` display form.
    pub fn display_id(&self) -> String {
        format_node_id(self.id)
    }
}

/// Opaque link identifier. The controller sends numbers, other deployments
/// send strings; both are kept in their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LinkId(String);

impl LinkId {
    pub fn new(id: impl Into<String>) -> Self {
        LinkId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, when the controller keyed the link with a number.
    pub fn as_number(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl From<u64> for LinkId {
    fn from(id: u64) -> Self {
        LinkId(id.to_string())
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl<'de> Deserialize<'de> for LinkId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => LinkId(n.to_string()),
            RawId::Text(s) => LinkId(s),
        })
    }
}

/// A weighted edge as reported by `GET links`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub from: u32,
    pub to: u32,
    /// Route cost/quality in `[0, 1]`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Link {
    pub fn new(id: impl Into<LinkId>, from: u32, to: u32, weight: f64) -> Self {
        Link {
            id: id.into(),
            from,
            to,
            weight,
            description: None,
        }
    }

    /// Link keyed the way the controller keys its own edges.
    pub fn between(from: u32, to: u32, weight: f64) -> Self {
        Link::new(pack_link_id(from, to), from, to, weight)
    }

    /// Endpoints packed into a numeric id that disagree with `from`/`to`.
    /// `None` when the id is not numeric or matches the record.
    pub fn mismatched_id_endpoints(&self) -> Option<(u32, u32)> {
        let encoded = unpack_link_id(self.id.as_number()?);
        (encoded != (self.from, self.to)).then_some(encoded)
    }
}

impl From<&str> for LinkId {
    fn from(id: &str) -> Self {
        LinkId(id.to_string())
    }
}

/// One probe result from `GET neighbors`, only meaningful for the current
/// discovery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub next: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub delta: f64,
}

/// Lifecycle of the controller's discovery process.
///
/// Anything the controller reports that we do not recognise (or a missing
/// status) decodes as [`DiscoveryState::Unknown`], which gates commands the
/// same way `running` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryState {
    Idle,
    Running,
    Done,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

impl DiscoveryState {
    /// True unless the process is in a resting state (`idle`, `done`, `error`).
    pub fn is_busy(self) -> bool {
        !matches!(
            self,
            DiscoveryState::Idle | DiscoveryState::Done | DiscoveryState::Error
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiscoveryState::Idle => "idle",
            DiscoveryState::Running => "running",
            DiscoveryState::Done => "done",
            DiscoveryState::Error => "error",
            DiscoveryState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot returned by `GET neighbors/discovery/0`. Each poll replaces the
/// previous one wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: DiscoveryState,
    /// Address being probed; negative while the controller has none.
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repeat: u32,
}

impl DiscoveryStatus {
    /// What the controller reports before any run was ever started.
    pub fn idle() -> Self {
        DiscoveryStatus {
            id: 0,
            status: DiscoveryState::Idle,
            current_id: 0,
            repeat: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.status.is_busy()
    }

    pub fn current_node(&self) -> Option<u32> {
        u32::try_from(self.current_id).ok()
    }
}

impl fmt::Display for DiscoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self
            .current_node()
            .map(format_node_id)
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "Discovery: {}, CurrentId: {} Repetitions: {}",
            self.status, current, self.repeat
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_ids_are_checked_against_endpoints() {
        assert_eq!(Link::between(3, 4, 1.0).mismatched_id_endpoints(), None);
        assert_eq!(Link::new("x-1", 3, 4, 1.0).mismatched_id_endpoints(), None);

        let swapped = Link::new(pack_link_id(4, 3), 3, 4, 1.0);
        assert_eq!(swapped.mismatched_id_endpoints(), Some((4, 3)));
        assert_eq!(LinkId::from(9u64).as_number(), Some(9));
    }

    #[test]
    fn node_defaults_missing_fields() {
        let node: Node = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(node.id, 7);
        assert_eq!(node.tag, "");
        assert!(!node.is_local);
        assert!(!node.in_use);
        assert!(node.path.is_none());
    }

    #[test]
    fn node_without_id_is_rejected() {
        let err = serde_json::from_str::<Node>(r#"{"tag": "A"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn node_null_tag_becomes_empty() {
        let node: Node = serde_json::from_str(r#"{"id": 1, "tag": null, "in_use": true}"#).unwrap();
        assert_eq!(node.tag, "");
        assert!(node.in_use);
    }

    #[test]
    fn controller_node_payload_decodes() {
        let raw = r#"{"id":1193046,"tag":"garage","in_use":true,"path":"N000001 > N123456",
            "revision":"1.4.2","error":"","dev_tag":"esp-garage","channel":3,"tx_power":12,
            "groups":0,"binded":0,"flags":1}"#;
        let node: Node = serde_json::from_str(raw).unwrap();
        assert_eq!(node.display_id(), "N123456");
        assert_eq!(node.revision.as_deref(), Some("1.4.2"));
        assert_eq!(node.channel, Some(3));
        assert_eq!(node.flags, Some(1));
    }

    #[test]
    fn link_id_accepts_number_or_string() {
        let a: Link = serde_json::from_str(r#"{"id": 9, "from": 1, "to": 2, "weight": 0.5}"#).unwrap();
        let b: Link =
            serde_json::from_str(r#"{"id": "9", "from": 1, "to": 2, "weight": 0.5}"#).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.as_str(), "9");
    }

    #[test]
    fn link_between_uses_packed_id() {
        let link = Link::between(0x000001, 0x000002, 0.25);
        assert_eq!(link.id.as_str(), (1u64 + (2u64 << 24)).to_string());
    }

    #[test]
    fn discovery_status_default_fills() {
        let status: DiscoveryStatus = serde_json::from_str(r#"{"status":"running"}"#).unwrap();
        assert_eq!(status.status, DiscoveryState::Running);
        assert_eq!(status.current_id, 0);
        assert_eq!(status.repeat, 0);

        let empty: DiscoveryStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.status, DiscoveryState::Unknown);
        assert!(empty.is_busy());
    }

    #[test]
    fn unrecognised_status_is_unknown_and_busy() {
        let status: DiscoveryStatus =
            serde_json::from_str(r#"{"id":0,"status":"paused","current_id":3,"repeat":2}"#)
                .unwrap();
        assert_eq!(status.status, DiscoveryState::Unknown);
        assert!(status.is_busy());
    }

    #[test]
    fn resting_states_are_not_busy() {
        assert!(!DiscoveryState::Idle.is_busy());
        assert!(!DiscoveryState::Done.is_busy());
        assert!(!DiscoveryState::Error.is_busy());
        assert!(DiscoveryState::Running.is_busy());
    }

    #[test]
    fn status_display_uses_node_form() {
        let status = DiscoveryStatus {
            id: 0,
            status: DiscoveryState::Running,
            current_id: 255,
            repeat: 1,
        };
        assert_eq!(
            status.to_string(),
            "Discovery: running, CurrentId: N0000FF Repetitions: 1"
        );

        let inactive = DiscoveryStatus {
            current_id: -1,
            ..DiscoveryStatus::idle()
        };
        assert!(inactive.to_string().contains("CurrentId: -"));
    }

    #[test]
    fn neighbor_decodes_float_fields() {
        let n: Neighbor =
            serde_json::from_str(r#"{"id":4,"address":"","current":3,"next":5,"delta":2}"#)
                .unwrap();
        assert_eq!(n.delta, 2.0);
        assert_eq!(n.next - n.current, n.delta);
    }
}
