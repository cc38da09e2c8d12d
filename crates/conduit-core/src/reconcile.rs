//! Topology-change reconciliation.
//!
//! When a network's components change, every mover travelling through an
//! affected component must end up owned by exactly one live component, or
//! leave the system through its handler. The reconciler never picks routes
//! itself; it only transfers ownership and tells the handler what happened.
//!
//! | Event               | Outcome for the movers involved                         |
//! |---------------------|---------------------------------------------------------|
//! | `ComponentAdded`    | none; an empty mover set is opened                      |
//! | `ComponentRemoved`  | removed (world change) or frozen (unload)               |
//! | `ComponentSplit`    | moved to the part holding their position, else removed  |
//! | `ComponentsMerged`  | moved to the merged component                           |
//! | `NodesAdded/Removed`| unchanged; the handler sees the current mover set       |
//!
//! Moved and removed records are retired once the handler returns, so a
//! handler that wants a mover to keep travelling routes it again.
//!
//! A retired component's mover set is taken out of the registry before the
//! loop over it starts. A handler that reroutes a mover still waiting in that
//! list moves it to a live component, and the loop skips it.

use crate::geometry::BlockPos;
use crate::id::{ComponentId, MoverId, TransporterType};
use crate::mover::RoutedMover;
use crate::network::{ChangeReason, TopologyEvent, TopologyGraph};
use crate::registry::{TransportError, TransportRegistry};
use crate::scheduler::Scheduler;
use tracing::{debug, warn};

impl<G: TopologyGraph, S: Scheduler> TransportRegistry<G, S> {
    /// Mutate the graph of `transporter` and reconcile movers against every
    /// topology change the mutation produced.
    pub fn mutate_graph(
        &mut self,
        transporter: &TransporterType,
        mutation: impl FnOnce(&mut G) -> Vec<TopologyEvent>,
    ) -> Result<(), TransportError> {
        let events = mutation(&mut self.network_mut(transporter)?.graph);
        self.apply_topology(transporter, events);
        Ok(())
    }

    /// Process topology notifications in the order the graph produced them.
    pub(crate) fn apply_topology(&mut self, transporter: &TransporterType, events: Vec<TopologyEvent>) {
        for event in events {
            debug!(%transporter, ?event, "topology changed");
            match event {
                TopologyEvent::ComponentAdded { component, .. } => {
                    self.open_component(transporter, component);
                }
                TopologyEvent::ComponentRemoved { component, reason } => {
                    for id in self.take_members(transporter, component) {
                        if let Some(mover) = self.take_member(id, component) {
                            self.evict(transporter, mover, component, reason);
                        }
                    }
                }
                TopologyEvent::ComponentSplit { old, new, reason } => {
                    // The graph may hand a retired slot to one of the new
                    // components, so the old set is taken before any new one
                    // is opened.
                    let members = self.take_members(transporter, old);
                    for &component in &new {
                        self.open_component(transporter, component);
                    }
                    for id in members {
                        self.split_mover(transporter, id, old, &new, reason);
                    }
                }
                TopologyEvent::ComponentsMerged { old, new, .. } => {
                    let members: Vec<(ComponentId, Vec<MoverId>)> = old
                        .into_iter()
                        .map(|from| (from, self.take_members(transporter, from)))
                        .collect();
                    self.open_component(transporter, new);
                    for (from, ids) in members {
                        for id in ids {
                            if let Some(mover) = self.take_member(id, from) {
                                self.transfer(transporter, mover, from, new);
                            }
                        }
                    }
                }
                TopologyEvent::NodesAdded { component, .. }
                | TopologyEvent::NodesRemoved { component, .. } => {
                    let movers: Vec<RoutedMover> = self
                        .movers_in(transporter, component)
                        .into_iter()
                        .cloned()
                        .collect();
                    self.notify(transporter, |handler, ctx| {
                        handler.on_network_modified(ctx, component, &movers)
                    });
                }
            }
        }
    }

    fn open_component(&mut self, transporter: &TransporterType, component: ComponentId) {
        if let Some(entry) = self
            .networks
            .get_mut(transporter)
            .and_then(|n| n.members.entry(component))
        {
            entry.or_default();
        }
    }

    /// Remove `component`'s mover set, returning the ids it held.
    fn take_members(&mut self, transporter: &TransporterType, component: ComponentId) -> Vec<MoverId> {
        self.networks
            .get_mut(transporter)
            .and_then(|n| n.members.remove(component))
            .unwrap_or_default()
    }

    /// Detach a mover if it is still owned by `component`. Movers a handler
    /// already moved elsewhere are left alone.
    fn take_member(&mut self, id: MoverId, component: ComponentId) -> Option<RoutedMover> {
        if self.movers.get(&id)?.component != component {
            return None;
        }
        self.detach(id)
    }

    fn split_mover(
        &mut self,
        transporter: &TransporterType,
        id: MoverId,
        old: ComponentId,
        new: &[ComponentId],
        reason: ChangeReason,
    ) {
        let Some(mover) = self.take_member(id, old) else {
            return;
        };
        let block = BlockPos::containing(mover.position(self.clock.now()));
        let target = self
            .networks
            .get(transporter)
            .and_then(|n| n.graph.component_among(new, block));
        match target {
            Some(to) => self.transfer(transporter, mover, old, to),
            None => {
                warn!(mover = %id, %transporter, %block, "no component at mover position after split");
                self.evict(transporter, mover, old, reason);
            }
        }
    }

    fn transfer(&mut self, transporter: &TransporterType, mover: RoutedMover, from: ComponentId, to: ComponentId) {
        let progress = mover.progress(self.clock.now());
        debug!(mover = %mover.id, ?from, ?to, progress, "mover moved between networks");
        self.notify(transporter, |handler, ctx| {
            handler.on_moved_between_networks(ctx, &mover, progress, from, to)
        });
        self.retire(mover.id);
    }

    /// A mover lost its component: removed for good on a world change,
    /// frozen for persistence on an unload.
    fn evict(
        &mut self,
        transporter: &TransporterType,
        mover: RoutedMover,
        component: ComponentId,
        reason: ChangeReason,
    ) {
        let now = self.clock.now();
        match reason {
            ChangeReason::WorldChange => {
                let progress = mover.progress(now);
                debug!(mover = %mover.id, ?component, progress, "mover removed from network");
                self.notify(transporter, |handler, ctx| {
                    handler.on_removed_from_network(ctx, &mover, progress, component)
                });
                self.retire(mover.id);
            }
            ChangeReason::Unload => {
                // The record is already detached, so its timer is cancelled.
                let frozen = mover.freeze(now);
                debug!(mover = %frozen.id, progress = frozen.progress, "mover frozen by unload");
                self.unloaded.push(frozen);
            }
        }
    }

    /// End a record's lifetime after its handler was notified. A reroute of
    /// the retired identity from inside that callback does not survive.
    fn retire(&mut self, id: MoverId) {
        if self.detach(id).is_some() {
            debug!(mover = %id, "retired mover identity was rerouted by its handler; dropped");
        }
    }
}
