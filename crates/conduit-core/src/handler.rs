//! The pluggable routing policy.
//!
//! The registry decides *which component owns a mover*; a
//! [`TransportHandler`] decides *where movers go*. Every lifecycle and
//! topology callback receives a [`RoutingContext`] through which the handler
//! can route new movers or reroute existing ones.
//!
//! Routing requests made through the context are not applied while the
//! callback runs. They are collected and applied by the registry as soon as
//! the callback returns, so a handler can never disturb the mover set the
//! registry is iterating.

use crate::clock::Ticks;
use crate::geometry::{BlockPos, Direction, Side};
use crate::id::{ComponentId, MoverId, TransporterType};
use crate::mover::{FrozenMover, RoutedMover};
use crate::network::TopologyGraph;
use crate::registry::TransportError;
use crate::route::Route;

// ---------------------------------------------------------------------------
// Handler trait
// ---------------------------------------------------------------------------

/// Routing policy for one transporter type.
///
/// Records passed to `on_moved_between_networks`, `on_removed_from_network`,
/// and `on_arrived` are already retired: their identity is gone once the
/// callback returns. To keep a mover travelling, route it again with
/// [`RoutingContext::route_mover`], which issues a fresh identity.
pub trait TransportHandler: std::fmt::Debug {
    /// Nodes were added to or removed from `component` without splitting or
    /// merging it. Existing routes may no longer be valid.
    fn on_network_modified(
        &mut self,
        ctx: &mut RoutingContext<'_>,
        component: ComponentId,
        movers: &[RoutedMover],
    ) {
        let _ = (ctx, component, movers);
    }

    /// A mover loaded from storage was found on `component`. The frozen
    /// carrier is dropped after this returns.
    fn on_discovered_in_network(
        &mut self,
        ctx: &mut RoutingContext<'_>,
        mover: &FrozenMover,
        component: ComponentId,
        progress: Ticks,
    );

    /// A split or merge moved the mover from `from` into `to`.
    fn on_moved_between_networks(
        &mut self,
        ctx: &mut RoutingContext<'_>,
        mover: &RoutedMover,
        progress: Ticks,
        from: ComponentId,
        to: ComponentId,
    );

    /// The mover's component (or the part of it the mover was in) was
    /// permanently destroyed.
    fn on_removed_from_network(
        &mut self,
        ctx: &mut RoutingContext<'_>,
        mover: &RoutedMover,
        progress: Ticks,
        component: ComponentId,
    );

    /// The mover reached the end of its route.
    fn on_arrived(&mut self, ctx: &mut RoutingContext<'_>, mover: &RoutedMover);

    /// Downcast to `&dyn Any` for access to concrete handler types.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Downcast to `&mut dyn Any` for mutable access to concrete handler types.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

// ---------------------------------------------------------------------------
// RoutingContext
// ---------------------------------------------------------------------------

/// A routing request queued by a handler.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RoutingCommand {
    Route {
        mover: MoverId,
        component: ComponentId,
        route: Route,
        duration: Ticks,
    },
    Reroute {
        mover: MoverId,
        component: ComponentId,
        route: Route,
        duration: Ticks,
    },
}

/// What a handler can see and do during a callback.
pub struct RoutingContext<'a> {
    transporter: &'a TransporterType,
    graph: &'a dyn TopologyGraph,
    now: Ticks,
    next_mover: &'a mut u64,
    commands: Vec<RoutingCommand>,
}

impl<'a> RoutingContext<'a> {
    pub(crate) fn new(
        transporter: &'a TransporterType,
        graph: &'a dyn TopologyGraph,
        now: Ticks,
        next_mover: &'a mut u64,
    ) -> Self {
        Self {
            transporter,
            graph,
            now,
            next_mover,
            commands: Vec::new(),
        }
    }

    pub fn transporter(&self) -> &TransporterType {
        self.transporter
    }

    pub fn now(&self) -> Ticks {
        self.now
    }

    /// Read access to this transporter type's network.
    pub fn graph(&self) -> &dyn TopologyGraph {
        self.graph
    }

    pub fn find_component_at(
        &self,
        location: BlockPos,
        side: Side,
        direction: Direction,
    ) -> Option<ComponentId> {
        self.graph.find_component_at(location, side, direction)
    }

    /// Start a new mover along `route` through `component`. The identity is
    /// allocated immediately; the mover joins the component and its arrival
    /// is scheduled when the callback returns.
    pub fn route_mover(
        &mut self,
        component: ComponentId,
        route: Route,
        duration: Ticks,
    ) -> Result<MoverId, TransportError> {
        self.check_live(component)?;
        let mover = MoverId(*self.next_mover);
        *self.next_mover += 1;
        self.commands.push(RoutingCommand::Route {
            mover,
            component,
            route,
            duration,
        });
        Ok(mover)
    }

    /// Give an existing mover a new route with a fresh start time.
    pub fn reroute_mover(
        &mut self,
        component: ComponentId,
        mover: MoverId,
        route: Route,
        duration: Ticks,
    ) -> Result<(), TransportError> {
        self.check_live(component)?;
        self.commands.push(RoutingCommand::Reroute {
            mover,
            component,
            route,
            duration,
        });
        Ok(())
    }

    fn check_live(&self, component: ComponentId) -> Result<(), TransportError> {
        if self.graph.contains_component(component) {
            Ok(())
        } else {
            Err(TransportError::StaleComponent(component))
        }
    }

    pub(crate) fn into_commands(self) -> Vec<RoutingCommand> {
        self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{SideMask, Vec3};
    use crate::network::{BlockNetwork, ChangeReason, TransportNode};

    fn network_with_pipe() -> (BlockNetwork, ComponentId) {
        let mut net = BlockNetwork::new();
        let ends = SideMask::of(&[Side::West, Side::East]);
        net.add_node(
            TransportNode::new(BlockPos::new(0, 0, 0), ends, ends),
            ChangeReason::WorldChange,
        );
        let component = net.component_at(BlockPos::new(0, 0, 0)).unwrap();
        (net, component)
    }

    #[test]
    fn route_requests_are_deferred_and_numbered() {
        let (net, component) = network_with_pipe();
        let ty = TransporterType::from("item_pipe");
        let mut next = 5;
        let mut ctx = RoutingContext::new(&ty, &net, 100, &mut next);
        let route = Route::new(Vec3::ZERO, 10);

        let a = ctx.route_mover(component, route.clone(), 10).unwrap();
        let b = ctx.route_mover(component, route, 10).unwrap();
        assert_eq!((a, b), (MoverId(5), MoverId(6)));
        assert_eq!(ctx.now(), 100);
        assert_eq!(ctx.transporter(), &ty);

        let commands = ctx.into_commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(next, 7);
    }

    #[test]
    fn stale_component_is_rejected() {
        let (mut net, component) = network_with_pipe();
        let ends = SideMask::of(&[Side::West, Side::East]);
        net.remove_node(
            TransportNode::new(BlockPos::new(0, 0, 0), ends, ends),
            ChangeReason::WorldChange,
        );
        let ty = TransporterType::from("item_pipe");
        let mut next = 0;
        let mut ctx = RoutingContext::new(&ty, &net, 0, &mut next);
        let result = ctx.route_mover(component, Route::new(Vec3::ZERO, 1), 0);
        assert!(matches!(result, Err(TransportError::StaleComponent(c)) if c == component));
        let result = ctx.reroute_mover(component, MoverId(0), Route::new(Vec3::ZERO, 1), 0);
        assert!(result.is_err());
        assert!(ctx.into_commands().is_empty());
        assert_eq!(next, 0);
    }
}
