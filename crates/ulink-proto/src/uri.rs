//! Entity and resource addressing

use serde::{Deserialize, Serialize};

/// Authority name matching any authority
pub const WILDCARD_AUTHORITY: &str = "*";
/// Entity ID matching any entity
pub const WILDCARD_ENTITY_ID: u32 = 0x0000_FFFF;
/// Major version matching any version
pub const WILDCARD_VERSION: u32 = 0xFF;
/// Resource ID matching any resource
pub const WILDCARD_RESOURCE_ID: u32 = 0xFFFF;

/// Highest resource ID usable as an RPC method
pub const MAX_RPC_METHOD_ID: u32 = 0x7FFF;
/// Lowest resource ID usable as a topic
pub const MIN_TOPIC_ID: u32 = 0x8000;

/// Address of an entity (uE) or one of its resources
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UUri {
    /// Device or domain the entity runs on
    pub authority_name: String,
    /// Entity ID; instance in the upper 16 bits, service in the lower 16
    pub ue_id: u32,
    /// Major version of the entity's interface
    pub ue_version_major: u32,
    /// Resource within the entity; 0 is the entity itself
    pub resource_id: u32,
}

impl UUri {
    /// Create a new URI
    pub fn new(
        authority_name: impl Into<String>,
        ue_id: u32,
        ue_version_major: u32,
        resource_id: u32,
    ) -> Self {
        Self {
            authority_name: authority_name.into(),
            ue_id,
            ue_version_major,
            resource_id,
        }
    }

    /// URI matching every other URI when used as a filter
    pub fn any() -> Self {
        Self::new(
            WILDCARD_AUTHORITY,
            WILDCARD_ENTITY_ID,
            WILDCARD_VERSION,
            WILDCARD_RESOURCE_ID,
        )
    }

    /// Same entity, different resource
    pub fn with_resource(&self, resource_id: u32) -> Self {
        Self {
            resource_id,
            ..self.clone()
        }
    }

    /// Whether any field holds a wildcard
    pub fn has_wildcard(&self) -> bool {
        self.authority_name == WILDCARD_AUTHORITY
            || self.ue_id == WILDCARD_ENTITY_ID
            || self.ue_version_major == WILDCARD_VERSION
            || self.resource_id == WILDCARD_RESOURCE_ID
    }

    /// Whether this URI names an RPC method
    pub fn is_rpc_method(&self) -> bool {
        !self.has_wildcard() && (1..=MAX_RPC_METHOD_ID).contains(&self.resource_id)
    }

    /// Whether this URI can receive RPC responses (the entity itself)
    pub fn is_rpc_response(&self) -> bool {
        !self.has_wildcard() && self.resource_id == 0
    }

    /// Whether messages can be published or notified from this URI
    pub fn is_topic(&self) -> bool {
        !self.has_wildcard() && self.resource_id >= MIN_TOPIC_ID
    }

    /// Whether this URI can receive notifications (the entity itself)
    pub fn is_notification_sink(&self) -> bool {
        self.is_rpc_response()
    }

    /// Whether this URI is usable as a topic filter; wildcards are allowed
    pub fn is_subscription(&self) -> bool {
        (MIN_TOPIC_ID..=WILDCARD_RESOURCE_ID).contains(&self.resource_id)
    }

    /// Check a candidate against this URI used as a filter
    pub fn matches(&self, candidate: &UUri) -> bool {
        (self.authority_name == WILDCARD_AUTHORITY
            || self.authority_name == candidate.authority_name)
            && (self.ue_id == WILDCARD_ENTITY_ID || self.ue_id == candidate.ue_id)
            && (self.ue_version_major == WILDCARD_VERSION
                || self.ue_version_major == candidate.ue_version_major)
            && (self.resource_id == WILDCARD_RESOURCE_ID
                || self.resource_id == candidate.resource_id)
    }
}
