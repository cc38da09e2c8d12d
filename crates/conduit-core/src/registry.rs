//! The per-type transport registry.
//!
//! [`TransportRegistry`] owns, for every registered transporter type, one
//! connectivity graph, one [`TransportHandler`], and the mapping from each
//! live component to the movers travelling through it. It also owns the
//! simulated clock and the scheduler that signals arrivals.
//!
//! The registry is an ordinary value: construct one at startup and pass it to
//! whatever drives the world. Topology changes go in through the ingestion
//! methods, time goes in through [`TransportRegistry::tick`].

use crate::clock::{SimClock, Ticks};
use crate::geometry::{BlockPos, Direction, Side};
use crate::handler::{RoutingCommand, RoutingContext, TransportHandler};
use crate::id::{ComponentId, MoverId, TransporterType};
use crate::mover::{FrozenMover, RoutedMover};
use crate::network::{BlockNetwork, TopologyGraph};
use crate::route::Route;
use crate::scheduler::{ActionTag, DelayQueue, FiredAction, Scheduler};
use slotmap::SecondaryMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by registry and routing calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No handler was registered for the transporter type. This is a startup
    /// configuration mistake and is never silently ignored.
    #[error("no transport handler registered for transporter type `{0}`")]
    UnregisteredType(TransporterType),
    #[error("transporter type `{0}` already has a handler")]
    AlreadyRegistered(TransporterType),
    /// The component key was retired by a topology change.
    #[error("component {0:?} is no longer part of its network")]
    StaleComponent(ComponentId),
}

// ---------------------------------------------------------------------------
// Per-type state
// ---------------------------------------------------------------------------

/// Everything the registry keeps for one transporter type.
#[derive(Debug)]
pub(crate) struct TransporterNetwork<G> {
    pub(crate) handler: Box<dyn TransportHandler>,
    pub(crate) graph: G,
    /// Movers in transit on each live component.
    pub(crate) members: SecondaryMap<ComponentId, Vec<MoverId>>,
}

// ---------------------------------------------------------------------------
// TransportRegistry
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct TransportRegistry<G = BlockNetwork, S = DelayQueue> {
    pub(crate) networks: BTreeMap<TransporterType, TransporterNetwork<G>>,
    pub(crate) movers: BTreeMap<MoverId, RoutedMover>,
    pub(crate) next_mover: u64,
    pub(crate) scheduler: S,
    pub(crate) clock: SimClock,
    /// Movers loaded from storage that have not found their component yet.
    pub(crate) pending_loads: BTreeMap<TransporterType, Vec<FrozenMover>>,
    /// Movers frozen by region unloads, waiting for the host to persist them.
    pub(crate) unloaded: Vec<FrozenMover>,
}

impl TransportRegistry {
    /// A registry over [`BlockNetwork`] graphs and a [`DelayQueue`], with the
    /// clock at tick 0.
    pub fn new() -> Self {
        Self::with_scheduler(DelayQueue::new())
    }
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: TopologyGraph, S: Scheduler> TransportRegistry<G, S> {
    pub fn with_scheduler(scheduler: S) -> Self {
        Self {
            networks: BTreeMap::new(),
            movers: BTreeMap::new(),
            next_mover: 0,
            scheduler,
            clock: SimClock::default(),
            pending_loads: BTreeMap::new(),
            unloaded: Vec::new(),
        }
    }

    // -- Registration --------------------------------------------------------

    /// Register the handler for a transporter type, creating an empty graph
    /// for it. Each type can be registered once.
    pub fn register_handler(
        &mut self,
        transporter: impl Into<TransporterType>,
        handler: Box<dyn TransportHandler>,
    ) -> Result<(), TransportError>
    where
        G: Default,
    {
        let transporter = transporter.into();
        if self.networks.contains_key(&transporter) {
            return Err(TransportError::AlreadyRegistered(transporter));
        }
        debug!(%transporter, "transport handler registered");
        self.networks.insert(
            transporter,
            TransporterNetwork {
                handler,
                graph: G::default(),
                members: SecondaryMap::new(),
            },
        );
        Ok(())
    }

    pub fn is_registered(&self, transporter: &TransporterType) -> bool {
        self.networks.contains_key(transporter)
    }

    pub(crate) fn network(
        &self,
        transporter: &TransporterType,
    ) -> Result<&TransporterNetwork<G>, TransportError> {
        self.networks
            .get(transporter)
            .ok_or_else(|| TransportError::UnregisteredType(transporter.clone()))
    }

    pub(crate) fn network_mut(
        &mut self,
        transporter: &TransporterType,
    ) -> Result<&mut TransporterNetwork<G>, TransportError> {
        self.networks
            .get_mut(transporter)
            .ok_or_else(|| TransportError::UnregisteredType(transporter.clone()))
    }

    // -- Queries -------------------------------------------------------------

    /// The component holding a node at `location` whose input (or output)
    /// sides include `side`.
    pub fn find_component_at(
        &self,
        transporter: &TransporterType,
        location: BlockPos,
        side: Side,
        direction: Direction,
    ) -> Result<Option<ComponentId>, TransportError> {
        Ok(self
            .network(transporter)?
            .graph
            .find_component_at(location, side, direction))
    }

    /// The graph for a transporter type.
    pub fn graph(&self, transporter: &TransporterType) -> Option<&G> {
        self.networks.get(transporter).map(|n| &n.graph)
    }

    /// The registered handler for a type, downcast to its concrete type.
    pub fn handler<H: TransportHandler + 'static>(&self, transporter: &TransporterType) -> Option<&H> {
        self.networks.get(transporter)?.handler.as_any().downcast_ref::<H>()
    }

    pub fn handler_mut<H: TransportHandler + 'static>(
        &mut self,
        transporter: &TransporterType,
    ) -> Option<&mut H> {
        self.networks
            .get_mut(transporter)?
            .handler
            .as_any_mut()
            .downcast_mut::<H>()
    }

    pub fn mover(&self, id: MoverId) -> Option<&RoutedMover> {
        self.movers.get(&id)
    }

    /// Movers currently travelling through `component`, in routing order.
    pub fn movers_in(&self, transporter: &TransporterType, component: ComponentId) -> Vec<&RoutedMover> {
        self.networks
            .get(transporter)
            .and_then(|n| n.members.get(component))
            .map(|ids| ids.iter().filter_map(|id| self.movers.get(id)).collect())
            .unwrap_or_default()
    }

    /// Number of movers in transit across all types.
    pub fn mover_count(&self) -> usize {
        self.movers.len()
    }

    pub fn now(&self) -> Ticks {
        self.clock.now()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Whether every mover record sits in exactly one component's mover set,
    /// and that set belongs to the record's own component and type.
    pub fn membership_consistent(&self) -> bool {
        let mut seen = BTreeSet::new();
        for (transporter, network) in &self.networks {
            for (component, ids) in network.members.iter() {
                for id in ids {
                    let Some(mover) = self.movers.get(id) else {
                        return false;
                    };
                    if !seen.insert(*id)
                        || mover.component != component
                        || &mover.transporter != transporter
                    {
                        return false;
                    }
                }
            }
        }
        seen.len() == self.movers.len()
    }

    // -- Routing -------------------------------------------------------------

    /// Start a new mover along `route` through `component`, arriving
    /// `duration` ticks from now.
    pub fn route_mover(
        &mut self,
        transporter: &TransporterType,
        component: ComponentId,
        route: Route,
        duration: Ticks,
    ) -> Result<MoverId, TransportError> {
        self.check_live(transporter, component)?;
        let id = MoverId(self.next_mover);
        self.next_mover += 1;
        self.place(transporter, id, component, route, duration);
        Ok(id)
    }

    /// Move `mover` onto a new route with a fresh start time. An unknown
    /// mover is simply inserted.
    pub fn reroute_mover(
        &mut self,
        transporter: &TransporterType,
        component: ComponentId,
        mover: MoverId,
        route: Route,
        duration: Ticks,
    ) -> Result<(), TransportError> {
        self.check_live(transporter, component)?;
        self.scheduler.cancel(mover, ActionTag::Arrival);
        self.detach(mover);
        self.place(transporter, mover, component, route, duration);
        Ok(())
    }

    fn check_live(&self, transporter: &TransporterType, component: ComponentId) -> Result<(), TransportError> {
        if self.network(transporter)?.graph.contains_component(component) {
            Ok(())
        } else {
            Err(TransportError::StaleComponent(component))
        }
    }

    /// Insert a mover record into `component`'s set and schedule its arrival.
    fn place(
        &mut self,
        transporter: &TransporterType,
        id: MoverId,
        component: ComponentId,
        route: Route,
        duration: Ticks,
    ) {
        let now = self.clock.now();
        // Ids inserted by reroute must never be handed out again.
        self.next_mover = self.next_mover.max(id.0.saturating_add(1));
        if let Some(entry) = self
            .networks
            .get_mut(transporter)
            .and_then(|n| n.members.entry(component))
        {
            let ids = entry.or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        self.movers.insert(
            id,
            RoutedMover {
                id,
                transporter: transporter.clone(),
                component,
                route,
                start: now,
                suspended: None,
            },
        );
        let arrival = now.saturating_add(duration);
        self.scheduler.schedule_at(id, ActionTag::Arrival, arrival);
        debug!(mover = %id, %transporter, ?component, arrival, "mover routed");
    }

    /// Remove a mover record and its arrival timer. Unknown movers are
    /// ignored.
    pub(crate) fn detach(&mut self, id: MoverId) -> Option<RoutedMover> {
        let mover = self.movers.remove(&id)?;
        self.scheduler.cancel(id, ActionTag::Arrival);
        if let Some(ids) = self
            .networks
            .get_mut(&mover.transporter)
            .and_then(|n| n.members.get_mut(mover.component))
        {
            ids.retain(|m| *m != id);
        }
        Some(mover)
    }

    // -- Handler dispatch ----------------------------------------------------

    /// Run a handler callback, then apply whatever routing it requested.
    pub(crate) fn with_handler<R>(
        &mut self,
        transporter: &TransporterType,
        callback: impl FnOnce(&mut dyn TransportHandler, &mut RoutingContext<'_>) -> R,
    ) -> Result<R, TransportError> {
        let now = self.clock.now();
        let network = self
            .networks
            .get_mut(transporter)
            .ok_or_else(|| TransportError::UnregisteredType(transporter.clone()))?;
        let TransporterNetwork { handler, graph, .. } = network;
        let mut ctx = RoutingContext::new(transporter, &*graph, now, &mut self.next_mover);
        let out = callback(&mut **handler, &mut ctx);
        let commands = ctx.into_commands();
        self.apply_commands(transporter, commands);
        Ok(out)
    }

    /// [`with_handler`](Self::with_handler) for internal notifications, where
    /// the type is known to be registered.
    pub(crate) fn notify(
        &mut self,
        transporter: &TransporterType,
        callback: impl FnOnce(&mut dyn TransportHandler, &mut RoutingContext<'_>),
    ) {
        if let Err(err) = self.with_handler(transporter, callback) {
            error!(%transporter, %err, "handler notification dropped");
        }
    }

    fn apply_commands(&mut self, transporter: &TransporterType, commands: Vec<RoutingCommand>) {
        for command in commands {
            match command {
                RoutingCommand::Route {
                    mover,
                    component,
                    route,
                    duration,
                } => self.place(transporter, mover, component, route, duration),
                RoutingCommand::Reroute {
                    mover,
                    component,
                    route,
                    duration,
                } => {
                    self.scheduler.cancel(mover, ActionTag::Arrival);
                    self.detach(mover);
                    self.place(transporter, mover, component, route, duration);
                }
            }
        }
    }

    // -- Time ----------------------------------------------------------------

    /// Advance the clock to `now`, place movers loaded since the last tick,
    /// and dispatch every scheduled action that has come due.
    ///
    /// Actions scheduled by handlers during this tick with deadlines at or
    /// before `now` fire on the next tick. A due action whose mover was
    /// rerouted by an earlier delivery in the same tick is dropped.
    pub fn tick(&mut self, now: Ticks) {
        self.clock.advance_to(now);
        self.discover_pending();
        let now = self.clock.now();
        for action in self.scheduler.drain_due(now) {
            // Drained keys are no longer pending. One that is pending again
            // was rescheduled by an earlier delivery in this batch.
            if self.scheduler.deadline(action.subject, action.action).is_some() {
                debug!(mover = %action.subject, due = action.due, "superseded action skipped");
                continue;
            }
            self.fire(action);
        }
    }

    /// Deliver one fired scheduler action.
    pub fn fire(&mut self, action: FiredAction) {
        match action.action {
            ActionTag::Arrival => self.arrive(action.subject),
        }
    }

    /// Retire an arrived mover and tell its handler.
    pub(crate) fn arrive(&mut self, id: MoverId) {
        let Some(mover) = self.detach(id) else {
            debug!(mover = %id, "arrival for unknown mover ignored");
            return;
        };
        debug!(mover = %id, transporter = %mover.transporter, "mover arrived");
        let transporter = mover.transporter.clone();
        self.notify(&transporter, |handler, ctx| handler.on_arrived(ctx, &mover));
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;
    use crate::network::ChangeReason;
    use crate::test_utils::*;

    fn setup() -> (TransportRegistry, TransporterType, ComponentId) {
        let ty = item_pipe();
        let mut registry = recording_registry(&ty);
        registry
            .mutate_graph(&ty, |g| g.add_nodes(&straight_run(0..4), ChangeReason::WorldChange))
            .unwrap();
        let component = registry.graph(&ty).unwrap().component_at(BlockPos::new(0, 0, 0)).unwrap();
        (registry, ty, component)
    }

    // -----------------------------------------------------------------------
    // Test 1: Registration
    // -----------------------------------------------------------------------

    #[test]
    fn double_registration_is_rejected() {
        let ty = item_pipe();
        let mut registry = recording_registry(&ty);
        let again = registry.register_handler(ty.clone(), Box::new(RecordingHandler::default()));
        assert_eq!(again, Err(TransportError::AlreadyRegistered(ty)));
    }

    #[test]
    fn unregistered_type_is_an_error() {
        let mut registry = TransportRegistry::new();
        let ghost = TransporterType::from("ghost");
        let lookup = registry.find_component_at(&ghost, BlockPos::new(0, 0, 0), Side::West, Direction::Input);
        assert_eq!(lookup, Err(TransportError::UnregisteredType(ghost.clone())));
        let mutate = registry.mutate_graph(&ghost, |g| g.add_nodes(&straight_run(0..1), ChangeReason::WorldChange));
        assert!(mutate.is_err());
    }

    // -----------------------------------------------------------------------
    // Test 2: Routing
    // -----------------------------------------------------------------------

    #[test]
    fn route_mover_joins_component_and_schedules_arrival() {
        let (mut registry, ty, component) = setup();
        registry.tick(100);
        let id = registry
            .route_mover(&ty, component, along_x(0.0, 3.0, 1000), 3000)
            .unwrap();

        let mover = registry.mover(id).unwrap();
        assert_eq!(mover.start, 100);
        assert_eq!(mover.component, component);
        assert_eq!(registry.movers_in(&ty, component).len(), 1);
        assert_eq!(registry.scheduler().deadline(id, ActionTag::Arrival), Some(3100));
        assert!(registry.membership_consistent());
    }

    #[test]
    fn mover_ids_are_unique() {
        let (mut registry, ty, component) = setup();
        let a = registry.route_mover(&ty, component, along_x(0.0, 1.0, 10), 10).unwrap();
        let b = registry.route_mover(&ty, component, along_x(0.0, 1.0, 10), 10).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn reroute_resets_start_and_timer() {
        let (mut registry, ty, component) = setup();
        let id = registry.route_mover(&ty, component, along_x(0.0, 3.0, 1000), 3000).unwrap();
        registry.tick(1000);
        registry
            .reroute_mover(&ty, component, id, along_x(0.0, 3.0, 1000), 3000)
            .unwrap();
        registry
            .reroute_mover(&ty, component, id, along_x(0.0, 3.0, 1000), 3000)
            .unwrap();

        let mover = registry.mover(id).unwrap();
        assert_eq!(mover.start, 1000);
        assert_eq!(mover.remaining(registry.now()), 3000);
        assert_eq!(registry.scheduler().deadline(id, ActionTag::Arrival), Some(4000));
        assert_eq!(registry.movers_in(&ty, component).len(), 1);
        assert!(registry.membership_consistent());
    }

    #[test]
    fn reroute_of_unknown_mover_inserts_it() {
        let (mut registry, ty, component) = setup();
        registry
            .reroute_mover(&ty, component, MoverId(42), along_x(0.0, 1.0, 10), 10)
            .unwrap();
        assert!(registry.mover(MoverId(42)).is_some());
        assert!(registry.membership_consistent());
    }

    #[test]
    fn routing_into_stale_component_fails() {
        let (mut registry, ty, component) = setup();
        registry
            .mutate_graph(&ty, |g| g.remove_nodes(&straight_run(0..4), ChangeReason::WorldChange))
            .unwrap();
        let result = registry.route_mover(&ty, component, along_x(0.0, 1.0, 10), 10);
        assert_eq!(result, Err(TransportError::StaleComponent(component)));
        assert_eq!(registry.mover_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Test 3: Arrival
    // -----------------------------------------------------------------------

    #[test]
    fn arrival_retires_mover_and_notifies_handler() {
        let (mut registry, ty, component) = setup();
        let id = registry.route_mover(&ty, component, along_x(0.0, 3.0, 1000), 3000).unwrap();
        registry.tick(2999);
        assert!(registry.mover(id).is_some());
        registry.tick(3000);
        assert!(registry.mover(id).is_none());
        assert!(registry.movers_in(&ty, component).is_empty());

        let recorder = registry.handler::<RecordingHandler>(&ty).unwrap();
        assert_eq!(recorder.calls, vec![Callback::Arrived { mover: id }]);
    }

    #[test]
    fn mover_rerouted_by_an_earlier_arrival_in_the_same_tick_keeps_travelling() {
        let (mut registry, ty, component) = setup();
        let a = registry.route_mover(&ty, component, along_x(0.0, 1.0, 10), 10).unwrap();
        let b = registry.route_mover(&ty, component, along_x(0.0, 1.0, 10), 10).unwrap();
        registry.handler_mut::<RecordingHandler>(&ty).unwrap().claim_on_arrival = Some((b, 3000));

        registry.tick(10);

        let recorder = registry.handler::<RecordingHandler>(&ty).unwrap();
        assert_eq!(recorder.calls, vec![Callback::Arrived { mover: a }]);
        assert_eq!(registry.mover(b).map(|m| m.start), Some(10));
        assert_eq!(registry.scheduler().deadline(b, ActionTag::Arrival), Some(3010));
        assert!(registry.membership_consistent());

        registry.tick(3010);
        let recorder = registry.handler::<RecordingHandler>(&ty).unwrap();
        assert_eq!(
            recorder.calls,
            vec![Callback::Arrived { mover: a }, Callback::Arrived { mover: b }]
        );
    }

    #[test]
    fn rerouting_an_unknown_id_reserves_it() {
        let (mut registry, ty, component) = setup();
        registry
            .reroute_mover(&ty, component, MoverId(0), along_x(0.0, 1.0, 10), 10)
            .unwrap();
        let fresh = registry.route_mover(&ty, component, along_x(0.0, 1.0, 10), 10).unwrap();

        assert_ne!(fresh, MoverId(0));
        assert_eq!(registry.mover_count(), 2);
        assert_eq!(registry.movers_in(&ty, component).len(), 2);
        assert!(registry.membership_consistent());
    }

    #[test]
    fn arrival_for_unknown_mover_is_ignored() {
        let (mut registry, ty, _) = setup();
        registry.fire(FiredAction {
            subject: MoverId(7),
            action: ActionTag::Arrival,
            due: 0,
        });
        assert!(registry.handler::<RecordingHandler>(&ty).unwrap().calls.is_empty());
    }

    #[test]
    fn handler_can_route_onwards_on_arrival() {
        let (mut registry, ty, component) = setup();
        registry.handler_mut::<RecordingHandler>(&ty).unwrap().route_on_arrival = true;
        let first = registry.route_mover(&ty, component, along_x(0.0, 1.0, 100), 100).unwrap();
        registry.tick(100);

        assert!(registry.mover(first).is_none());
        let recorder = registry.handler::<RecordingHandler>(&ty).unwrap();
        let [next] = recorder.routed.as_slice() else {
            panic!("expected one onward mover, got {:?}", recorder.routed);
        };
        let next = *next;
        assert_ne!(next, first);
        assert_eq!(registry.mover(next).map(|m| m.start), Some(100));
        assert_eq!(registry.scheduler().deadline(next, ActionTag::Arrival), Some(200));
    }

    #[test]
    fn find_component_at_matches_sides() {
        let (registry, ty, component) = setup();
        let at = BlockPos::new(2, 0, 0);
        assert_eq!(
            registry.find_component_at(&ty, at, Side::West, Direction::Input),
            Ok(Some(component))
        );
        assert_eq!(registry.find_component_at(&ty, at, Side::Up, Direction::Input), Ok(None));
    }

    #[test]
    fn movers_in_stale_component_is_empty() {
        let (mut registry, ty, component) = setup();
        registry.route_mover(&ty, component, Route::new(Vec3::ZERO, 1), 5).unwrap();
        registry
            .mutate_graph(&ty, |g| g.remove_nodes(&straight_run(0..4), ChangeReason::WorldChange))
            .unwrap();
        assert!(registry.movers_in(&ty, component).is_empty());
    }
}
