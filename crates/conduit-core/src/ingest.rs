//! Topology ingestion: physical conduit changes in, graph node changes out.
//!
//! A [`TransporterDef`] describes a kind of conduit block. Each of its route
//! groups is an independent input/output side grouping and becomes its own
//! node at the block's location, so one block can carry several separate
//! paths.
//!
//! Single placements and removals are permanent world changes. Region loads
//! and unloads batch every placement of a definition per route group and use
//! the transient unload reason, which freezes movers instead of removing
//! them.

use crate::geometry::{BlockPos, Rotation, SideMask};
use crate::id::TransporterType;
use crate::network::{ChangeReason, TopologyGraph, TransportNode};
use crate::registry::{TransportError, TransportRegistry};
use crate::scheduler::Scheduler;
use serde::{Deserialize, Serialize};

/// One independent path through a conduit block. Sides are relative to the
/// block's unrotated front (north).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteGroup {
    pub inputs: SideMask,
    pub outputs: SideMask,
}

/// A kind of conduit block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransporterDef {
    pub name: String,
    pub transporter: TransporterType,
    pub route_groups: Vec<RouteGroup>,
}

/// Where and how a conduit block sits in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Placement {
    pub location: BlockPos,
    pub rotation: Rotation,
}

impl Placement {
    pub fn at(location: BlockPos) -> Self {
        Self {
            location,
            rotation: Rotation::None,
        }
    }

    pub fn rotated(location: BlockPos, rotation: Rotation) -> Self {
        Self { location, rotation }
    }
}

impl TransporterDef {
    /// The node a route group becomes at a placement.
    pub fn node(&self, group: &RouteGroup, placement: Placement) -> TransportNode {
        TransportNode::new(
            placement.location,
            group.inputs.rotated(placement.rotation),
            group.outputs.rotated(placement.rotation),
        )
    }

    /// One node per route group at a placement.
    pub fn nodes(&self, placement: Placement) -> Vec<TransportNode> {
        self.route_groups
            .iter()
            .map(|group| self.node(group, placement))
            .collect()
    }
}

impl<G: TopologyGraph, S: Scheduler> TransportRegistry<G, S> {
    /// A conduit block was built.
    pub fn transporter_placed(&mut self, def: &TransporterDef, placement: Placement) -> Result<(), TransportError> {
        for node in def.nodes(placement) {
            self.mutate_graph(&def.transporter, |g| g.add_node(node, ChangeReason::WorldChange))?;
        }
        Ok(())
    }

    /// A conduit block was destroyed.
    pub fn transporter_removed(&mut self, def: &TransporterDef, placement: Placement) -> Result<(), TransportError> {
        for node in def.nodes(placement) {
            self.mutate_graph(&def.transporter, |g| g.remove_node(node, ChangeReason::WorldChange))?;
        }
        Ok(())
    }

    /// A conduit block changed shape or orientation. Every node at the
    /// location is replaced; nothing is patched in place.
    pub fn transporter_updated(&mut self, def: &TransporterDef, placement: Placement) -> Result<(), TransportError> {
        self.mutate_graph(&def.transporter, |g| {
            let old = g.nodes_at(placement.location);
            if old.is_empty() {
                Vec::new()
            } else {
                g.remove_nodes(&old, ChangeReason::WorldChange)
            }
        })?;
        self.transporter_placed(def, placement)
    }

    /// Blocks of one definition came into simulation with a region.
    pub fn region_loaded(&mut self, def: &TransporterDef, placements: &[Placement]) -> Result<(), TransportError> {
        for group in &def.route_groups {
            let nodes: Vec<TransportNode> = placements.iter().map(|&p| def.node(group, p)).collect();
            self.mutate_graph(&def.transporter, |g| g.add_nodes(&nodes, ChangeReason::Unload))?;
        }
        Ok(())
    }

    /// Blocks of one definition are leaving simulation with their region.
    /// Movers on them are frozen and collected for
    /// [`take_unloaded`](Self::take_unloaded).
    pub fn region_unloaded(&mut self, def: &TransporterDef, placements: &[Placement]) -> Result<(), TransportError> {
        for group in &def.route_groups {
            let nodes: Vec<TransportNode> = placements.iter().map(|&p| def.node(group, p)).collect();
            self.mutate_graph(&def.transporter, |g| g.remove_nodes(&nodes, ChangeReason::Unload))?;
        }
        Ok(())
    }
}
