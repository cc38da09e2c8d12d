//! Serde data file structs for transporter definitions.
//!
//! These structs define the on-disk format of `transporters.{ron,toml,json}`.
//! Sides are written by name and resolved into core types by the loader.

use serde::Deserialize;

/// A conduit block definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct TransporterData {
    pub name: String,
    /// The transporter type whose network the block joins.
    pub transporter_type: String,
    pub route_groups: Vec<RouteGroupData>,
}

/// One independent path through a block. Side names are resolved with
/// [`Side::from_name`](conduit_core::geometry::Side::from_name).
#[derive(Debug, Clone, Deserialize)]
pub struct RouteGroupData {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}
