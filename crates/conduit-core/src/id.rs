use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Identifies a connected component of a transporter network.
    ///
    /// Keys are generation-tagged: once a split, merge, or removal retires a
    /// component, its key stops resolving and can never alias a newer one.
    pub struct ComponentId;
}

/// Identifies a mover (payload) in transit. Allocated by the registry.
///
/// Unlike [`ComponentId`], mover identities are plain counters so that a
/// reroute can re-insert a record under an identity the registry no longer
/// tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MoverId(pub u64);

impl fmt::Display for MoverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mover#{}", self.0)
    }
}

/// Names a kind of transporter (item pipe, fluid duct, ...). Each registered
/// type owns its own network and handler.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransporterType(pub String);

impl TransporterType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransporterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransporterType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
