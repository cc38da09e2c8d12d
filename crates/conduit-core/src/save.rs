//! Freezing and resuming movers around saves and loads.
//!
//! Two paths bring movers in and out of durable storage:
//!
//! - **Save**: [`pre_save`](TransportRegistry::pre_save) freezes every
//!   mover in place so the world can be written out consistently, and
//!   [`post_save`](TransportRegistry::post_save) resumes them afterwards.
//!   The records stay in their components throughout.
//! - **Load**: movers read back from storage are queued with
//!   [`load_frozen`](TransportRegistry::load_frozen). On the next tick each one
//!   is matched to the component at its frozen position and handed to the
//!   handler as a discovery.
//!
//! Freezing always cancels the arrival timer before computing the durable
//! state, so a timer can never fire for a mover that has been frozen.

use crate::id::{MoverId, TransporterType};
use crate::mover::FrozenMover;
use crate::network::TopologyGraph;
use crate::registry::{TransportError, TransportRegistry};
use crate::scheduler::{ActionTag, Scheduler};
use tracing::{debug, error};

impl<G: TopologyGraph, S: Scheduler> TransportRegistry<G, S> {
    /// Freeze every mover in transit and return their durable state.
    pub fn pre_save(&mut self) -> Vec<FrozenMover> {
        let now = self.clock.now();
        let mut frozen = Vec::with_capacity(self.movers.len());
        for mover in self.movers.values_mut() {
            self.scheduler.cancel(mover.id, ActionTag::Arrival);
            let state = mover.freeze(now);
            mover.suspended = Some(state.progress);
            frozen.push(state);
        }
        debug!(count = frozen.len(), "movers frozen for save");
        frozen
    }

    /// Resume every mover frozen by [`pre_save`](Self::pre_save). Each one is
    /// rescheduled for the rest of its trip; a mover with nothing left to
    /// travel arrives immediately.
    pub fn post_save(&mut self) {
        let now = self.clock.now();
        let mut arrived: Vec<MoverId> = Vec::new();
        for mover in self.movers.values_mut() {
            let Some(progress) = mover.suspended.take() else {
                continue;
            };
            mover.start = now.saturating_sub(progress);
            let remaining = mover.route.duration().saturating_sub(progress);
            if remaining == 0 {
                arrived.push(mover.id);
            } else {
                self.scheduler
                    .schedule_at(mover.id, ActionTag::Arrival, now.saturating_add(remaining));
            }
        }
        debug!(immediate = arrived.len(), "movers resumed after save");
        for id in arrived {
            self.arrive(id);
        }
    }

    /// Queue a mover read back from storage. It is matched to a component on
    /// the next tick.
    pub fn load_frozen(&mut self, mover: FrozenMover) -> Result<(), TransportError> {
        self.network(&mover.transporter)?;
        self.next_mover = self.next_mover.max(mover.id.0.saturating_add(1));
        debug!(mover = %mover.id, transporter = %mover.transporter, "frozen mover queued");
        self.pending_loads
            .entry(mover.transporter.clone())
            .or_default()
            .push(mover);
        Ok(())
    }

    /// Number of loaded movers still waiting for their component.
    pub fn pending_load_count(&self) -> usize {
        self.pending_loads.values().map(Vec::len).sum()
    }

    /// Drain the movers frozen by region unloads since the last call.
    pub fn take_unloaded(&mut self) -> Vec<FrozenMover> {
        std::mem::take(&mut self.unloaded)
    }

    /// Hand every queued loaded mover to the handler of the component at its
    /// frozen position. Movers with no component there are dropped.
    pub(crate) fn discover_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending_loads);
        for (transporter, movers) in pending {
            for mover in movers {
                self.discover(&transporter, mover);
            }
        }
    }

    fn discover(&mut self, transporter: &TransporterType, mover: FrozenMover) {
        let block = mover.block();
        let Some(component) = self
            .networks
            .get(transporter)
            .and_then(|n| n.graph.component_at(block))
        else {
            error!(mover = %mover.id, %transporter, %block, "loaded mover has no network at its position; dropped");
            return;
        };
        debug!(mover = %mover.id, ?component, progress = mover.progress, "loaded mover discovered");
        let progress = mover.progress;
        self.notify(transporter, |handler, ctx| {
            handler.on_discovered_in_network(ctx, &mover, component, progress)
        });
    }
}
