use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Binds a remote notification collection to its destination channels
///
/// Owned by the surrounding system and treated as immutable for the duration
/// of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Stable identifier, also used to key persisted notifications
    pub id: String,

    /// Location of the remote notification collection
    pub collection_uri: String,

    /// Destination addresses per processor type (e.g. "email" -> mailto URIs)
    #[serde(default)]
    pub destinations: BTreeMap<String, Vec<String>>,

    /// Preferred locale for rendered messages
    #[serde(default)]
    pub locale: Option<String>,
}

impl Subscription {
    pub fn new(id: impl Into<String>, collection_uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collection_uri: collection_uri.into(),
            destinations: BTreeMap::new(),
            locale: None,
        }
    }

    /// Add a destination address for a processor type
    pub fn with_destination(
        mut self,
        processor_type: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        self.destinations
            .entry(processor_type.into())
            .or_default()
            .push(address.into());
        self
    }

    /// Destination addresses configured for a processor type
    pub fn destinations_for(&self, processor_type: &str) -> &[String] {
        self.destinations
            .get(processor_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether this subscription routes notifications to the processor type
    pub fn wants(&self, processor_type: &str) -> bool {
        self.destinations.contains_key(processor_type)
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.id.is_empty() {
            return Err(crate::Error::config("Subscription id cannot be empty"));
        }
        if self.collection_uri.is_empty() {
            return Err(crate::Error::config(format!(
                "Subscription {} has no collection URI",
                self.id
            )));
        }
        Ok(())
    }
}
