//! Connectivity graph for transporter networks.
//!
//! A network is made of [`TransportNode`]s placed on the block grid. Nodes in
//! neighbouring blocks connect when their side masks line up, and the
//! maximal connected sets of nodes are the network's *components*.
//!
//! The registry only talks to a network through the [`TopologyGraph`] trait:
//! node mutation plus a list of [`TopologyEvent`]s describing how the
//! components changed. [`BlockNetwork`] is the reference implementation.
//!
//! # Component identity
//!
//! Components are keyed by [`ComponentId`] slotmap keys. A component that is
//! split, merged, or emptied is removed from the arena, so its key stops
//! resolving the moment the corresponding event is produced. Any query with a
//! stale key returns `None` instead of silently reading a different component.

use crate::geometry::{BlockPos, Direction, Side, SideMask};
use crate::id::ComponentId;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A located point with directional connection capability.
///
/// Two nodes are equal iff location and both masks match, so a single block
/// can host several independent nodes (one per route group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransportNode {
    pub location: BlockPos,
    /// Sides this node accepts movers from.
    pub inputs: SideMask,
    /// Sides this node hands movers out through.
    pub outputs: SideMask,
}

impl TransportNode {
    pub fn new(location: BlockPos, inputs: SideMask, outputs: SideMask) -> Self {
        Self {
            location,
            inputs,
            outputs,
        }
    }

    /// Whether this node accepts or emits on `side` for the given direction.
    pub fn has_side(&self, side: Side, direction: Direction) -> bool {
        match direction {
            Direction::Input => self.inputs.contains(side),
            Direction::Output => self.outputs.contains(side),
        }
    }

    /// Whether a mover can pass between `self` and `other` in either
    /// direction. Only nodes in face-adjacent blocks can connect.
    pub fn connects_to(&self, other: &TransportNode) -> bool {
        Side::ALL.into_iter().any(|side| {
            self.location.offset(side) == other.location
                && ((self.outputs.contains(side) && other.inputs.contains(side.opposite()))
                    || (self.inputs.contains(side) && other.outputs.contains(side.opposite())))
        })
    }
}

// ---------------------------------------------------------------------------
// Topology notifications
// ---------------------------------------------------------------------------

/// Why the topology changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeReason {
    /// A permanent change to the world: a conduit was built, destroyed, or
    /// reconfigured.
    WorldChange,
    /// A region of the world was loaded or unloaded. The conduits still
    /// exist; they are just not simulated.
    Unload,
}

/// How the components of a network changed. Emitted in the order the
/// changes happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyEvent {
    /// A brand-new component appeared (no existing component was touched).
    ComponentAdded {
        component: ComponentId,
        reason: ChangeReason,
    },
    /// The last nodes of a component were removed.
    ComponentRemoved {
        component: ComponentId,
        reason: ChangeReason,
    },
    /// Removing nodes disconnected `old` into several components.
    ComponentSplit {
        old: ComponentId,
        new: Vec<ComponentId>,
        reason: ChangeReason,
    },
    /// Adding nodes joined several components into one.
    ComponentsMerged {
        old: Vec<ComponentId>,
        new: ComponentId,
        reason: ChangeReason,
    },
    /// Nodes joined an existing component without merging it with others.
    NodesAdded {
        component: ComponentId,
        nodes: Vec<TransportNode>,
        reason: ChangeReason,
    },
    /// Nodes left an existing component without splitting it.
    NodesRemoved {
        component: ComponentId,
        nodes: Vec<TransportNode>,
        reason: ChangeReason,
    },
}

// ---------------------------------------------------------------------------
// Graph engine contract
// ---------------------------------------------------------------------------

/// The capability set the registry needs from a connectivity graph engine.
pub trait TopologyGraph {
    /// Add a batch of nodes. Nodes already present are ignored.
    fn add_nodes(&mut self, nodes: &[TransportNode], reason: ChangeReason) -> Vec<TopologyEvent>;

    /// Remove a batch of nodes. Nodes not present are ignored.
    fn remove_nodes(&mut self, nodes: &[TransportNode], reason: ChangeReason) -> Vec<TopologyEvent>;

    /// All nodes at a block location.
    fn nodes_at(&self, location: BlockPos) -> Vec<TransportNode>;

    /// Every live component.
    fn components(&self) -> Vec<ComponentId>;

    /// The nodes of a live component, or `None` if the key is stale.
    fn component_nodes(&self, component: ComponentId) -> Option<&BTreeSet<TransportNode>>;

    fn add_node(&mut self, node: TransportNode, reason: ChangeReason) -> Vec<TopologyEvent> {
        self.add_nodes(std::slice::from_ref(&node), reason)
    }

    fn remove_node(&mut self, node: TransportNode, reason: ChangeReason) -> Vec<TopologyEvent> {
        self.remove_nodes(std::slice::from_ref(&node), reason)
    }

    fn contains_component(&self, component: ComponentId) -> bool {
        self.component_nodes(component).is_some()
    }

    /// The first of `candidates` with any node at `location`.
    fn component_among(&self, candidates: &[ComponentId], location: BlockPos) -> Option<ComponentId> {
        candidates.iter().copied().find(|&c| {
            self.component_nodes(c)
                .is_some_and(|nodes| nodes.iter().any(|n| n.location == location))
        })
    }

    /// The component with any node at `location`. Linear in the node count.
    fn component_at(&self, location: BlockPos) -> Option<ComponentId> {
        self.component_among(&self.components(), location)
    }

    /// The component holding a node at `location` whose input (or output)
    /// mask includes `side`. Linear in the node count.
    fn find_component_at(
        &self,
        location: BlockPos,
        side: Side,
        direction: Direction,
    ) -> Option<ComponentId> {
        self.components().into_iter().find(|&c| {
            self.component_nodes(c).is_some_and(|nodes| {
                nodes
                    .iter()
                    .any(|n| n.location == location && n.has_side(side, direction))
            })
        })
    }
}

// ---------------------------------------------------------------------------
// BlockNetwork
// ---------------------------------------------------------------------------

/// Reference connectivity graph: nodes on the block grid, components held in
/// a generation-keyed arena.
///
/// All internal maps are ordered, so identical mutation sequences produce
/// identical event sequences.
#[derive(Debug, Default)]
pub struct BlockNetwork {
    components: SlotMap<ComponentId, BTreeSet<TransportNode>>,
    membership: BTreeMap<TransportNode, ComponentId>,
    by_location: BTreeMap<BlockPos, BTreeSet<TransportNode>>,
}

impl BlockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of nodes across all components.
    pub fn node_count(&self) -> usize {
        self.membership.len()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// The component a node belongs to.
    pub fn component_of(&self, node: &TransportNode) -> Option<ComponentId> {
        self.membership.get(node).copied()
    }

    /// Nodes connected to `node`, whatever component they are in.
    fn neighbours(&self, node: &TransportNode) -> Vec<TransportNode> {
        let mut found = Vec::new();
        for side in Side::ALL {
            if let Some(candidates) = self.by_location.get(&node.location.offset(side)) {
                found.extend(candidates.iter().filter(|c| node.connects_to(c)).copied());
            }
        }
        found
    }

    /// Split `nodes` into connected groups, only walking through members of `nodes`.
    fn connected_groups(&self, nodes: &BTreeSet<TransportNode>) -> Vec<BTreeSet<TransportNode>> {
        let mut visited: BTreeSet<TransportNode> = BTreeSet::new();
        let mut groups = Vec::new();

        for &start in nodes {
            if !visited.insert(start) {
                continue;
            }
            let mut group = BTreeSet::new();
            let mut queue = VecDeque::from([start]);
            while let Some(node) = queue.pop_front() {
                group.insert(node);
                for next in self.neighbours(&node) {
                    if nodes.contains(&next) && visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            groups.push(group);
        }

        groups
    }

    fn assign(&mut self, nodes: &BTreeSet<TransportNode>) -> ComponentId {
        let id = self.components.insert(nodes.clone());
        for &node in nodes {
            self.membership.insert(node, id);
        }
        id
    }
}

impl TopologyGraph for BlockNetwork {
    fn add_nodes(&mut self, nodes: &[TransportNode], reason: ChangeReason) -> Vec<TopologyEvent> {
        let fresh: BTreeSet<TransportNode> = nodes
            .iter()
            .filter(|n| !self.membership.contains_key(n))
            .copied()
            .collect();
        if fresh.is_empty() {
            return Vec::new();
        }
        for &node in &fresh {
            self.by_location.entry(node.location).or_default().insert(node);
        }

        // Connected regions of the new nodes, with the existing components
        // each region touches.
        let regions: Vec<(BTreeSet<TransportNode>, BTreeSet<ComponentId>)> = self
            .connected_groups(&fresh)
            .into_iter()
            .map(|region| {
                let touched = region
                    .iter()
                    .flat_map(|n| self.neighbours(n))
                    .filter_map(|n| self.membership.get(&n).copied())
                    .collect();
                (region, touched)
            })
            .collect();

        // Regions that touch the same component end up in one component.
        let mut parent: Vec<usize> = (0..regions.len()).collect();
        let mut owner: BTreeMap<ComponentId, usize> = BTreeMap::new();
        for (index, (_, touched)) in regions.iter().enumerate() {
            for &component in touched {
                match owner.get(&component) {
                    Some(&other) => union(&mut parent, index, other),
                    None => {
                        owner.insert(component, index);
                    }
                }
            }
        }
        let mut groups: BTreeMap<usize, (BTreeSet<TransportNode>, BTreeSet<ComponentId>)> =
            BTreeMap::new();
        for (index, (region, touched)) in regions.into_iter().enumerate() {
            let root = find(&mut parent, index);
            let group = groups.entry(root).or_default();
            group.0.extend(region);
            group.1.extend(touched);
        }

        let mut events = Vec::new();
        for (added, touched) in groups.into_values() {
            let touched: Vec<ComponentId> = touched.into_iter().collect();
            match touched.as_slice() {
                [] => {
                    let component = self.assign(&added);
                    events.push(TopologyEvent::ComponentAdded { component, reason });
                }
                [component] => {
                    let component = *component;
                    if let Some(members) = self.components.get_mut(component) {
                        members.extend(added.iter().copied());
                    }
                    for &node in &added {
                        self.membership.insert(node, component);
                    }
                    events.push(TopologyEvent::NodesAdded {
                        component,
                        nodes: added.into_iter().collect(),
                        reason,
                    });
                }
                _ => {
                    let mut merged = added;
                    for &old in &touched {
                        if let Some(members) = self.components.remove(old) {
                            merged.extend(members);
                        }
                    }
                    let new = self.assign(&merged);
                    events.push(TopologyEvent::ComponentsMerged {
                        old: touched,
                        new,
                        reason,
                    });
                }
            }
        }
        events
    }

    fn remove_nodes(&mut self, nodes: &[TransportNode], reason: ChangeReason) -> Vec<TopologyEvent> {
        let mut by_component: BTreeMap<ComponentId, Vec<TransportNode>> = BTreeMap::new();
        for node in nodes {
            let Some(component) = self.membership.remove(node) else {
                continue;
            };
            if let Some(at) = self.by_location.get_mut(&node.location) {
                at.remove(node);
                if at.is_empty() {
                    self.by_location.remove(&node.location);
                }
            }
            by_component.entry(component).or_default().push(*node);
        }

        let mut events = Vec::new();
        for (component, removed) in by_component {
            let Some(members) = self.components.get_mut(component) else {
                continue;
            };
            for node in &removed {
                members.remove(node);
            }
            if members.is_empty() {
                self.components.remove(component);
                events.push(TopologyEvent::ComponentRemoved { component, reason });
                continue;
            }

            let remaining = members.clone();
            let parts = self.connected_groups(&remaining);
            if parts.len() == 1 {
                events.push(TopologyEvent::NodesRemoved {
                    component,
                    nodes: removed,
                    reason,
                });
            } else {
                self.components.remove(component);
                let new = parts.iter().map(|part| self.assign(part)).collect();
                events.push(TopologyEvent::ComponentSplit {
                    old: component,
                    new,
                    reason,
                });
            }
        }
        events
    }

    fn nodes_at(&self, location: BlockPos) -> Vec<TransportNode> {
        self.by_location
            .get(&location)
            .map(|at| at.iter().copied().collect())
            .unwrap_or_default()
    }

    fn components(&self) -> Vec<ComponentId> {
        self.components.keys().collect()
    }

    fn component_nodes(&self, component: ComponentId) -> Option<&BTreeSet<TransportNode>> {
        self.components.get(component)
    }

    fn component_at(&self, location: BlockPos) -> Option<ComponentId> {
        self.by_location
            .get(&location)?
            .iter()
            .find_map(|n| self.membership.get(n).copied())
    }
}

fn find(parent: &mut [usize], mut index: usize) -> usize {
    while parent[index] != index {
        parent[index] = parent[parent[index]];
        index = parent[index];
    }
    index
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        parent[ra.max(rb)] = ra.min(rb);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
