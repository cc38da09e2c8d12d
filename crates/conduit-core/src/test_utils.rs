//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::clock::Ticks;
use crate::geometry::{BlockPos, Side, SideMask, Vec3};
use crate::handler::{RoutingContext, TransportHandler};
use crate::id::{ComponentId, MoverId, TransporterType};
use crate::ingest::{RouteGroup, TransporterDef};
use crate::mover::{FrozenMover, RoutedMover};
use crate::network::TransportNode;
use crate::registry::TransportRegistry;
use crate::route::Route;

// ===========================================================================
// Network builders
// ===========================================================================

pub fn item_pipe() -> TransporterType {
    TransporterType::from("item_pipe")
}

/// A pipe segment at `(x, 0, 0)` open to the west and east.
pub fn pipe(x: i32) -> TransportNode {
    let ends = SideMask::of(&[Side::West, Side::East]);
    TransportNode::new(BlockPos::new(x, 0, 0), ends, ends)
}

/// Pipe segments along the x axis.
pub fn straight_run(xs: impl IntoIterator<Item = i32>) -> Vec<TransportNode> {
    xs.into_iter().map(pipe).collect()
}

/// The definition behind [`pipe`]: one west-east route group.
pub fn pipe_def() -> TransporterDef {
    let ends = SideMask::of(&[Side::West, Side::East]);
    TransporterDef {
        name: "pipe".to_string(),
        transporter: item_pipe(),
        route_groups: vec![RouteGroup {
            inputs: ends,
            outputs: ends,
        }],
    }
}

/// A straight route along the x axis.
pub fn along_x(from: f64, to: f64, time_per_unit: Ticks) -> Route {
    Route::through(Vec3::new(from, 0.0, 0.0), [Vec3::new(to, 0.0, 0.0)], time_per_unit)
}

/// A registry with a [`RecordingHandler`] registered for `transporter`.
pub fn recording_registry(transporter: &TransporterType) -> TransportRegistry {
    let mut registry = TransportRegistry::new();
    registry
        .register_handler(transporter.clone(), Box::new(RecordingHandler::default()))
        .expect("fresh registry accepts a handler");
    registry
}

// ===========================================================================
// RecordingHandler
// ===========================================================================

/// One handler notification, as seen by [`RecordingHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    NetworkModified {
        component: ComponentId,
        movers: Vec<MoverId>,
    },
    Discovered {
        mover: MoverId,
        component: ComponentId,
        progress: Ticks,
    },
    Moved {
        mover: MoverId,
        progress: Ticks,
        from: ComponentId,
        to: ComponentId,
    },
    Removed {
        mover: MoverId,
        progress: Ticks,
        component: ComponentId,
    },
    Arrived {
        mover: MoverId,
    },
}

/// A handler that records every notification and optionally keeps movers
/// travelling.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    pub calls: Vec<Callback>,
    /// Route a fresh mover for the rest of the trip whenever a mover is moved
    /// between components or discovered after a load.
    pub reroute_on_transfer: bool,
    /// Route a fresh mover along the same route whenever one arrives.
    pub route_on_arrival: bool,
    /// On the next transfer, reroute this mover into the destination.
    pub claim_on_transfer: Option<MoverId>,
    /// On the next arrival, reroute this mover into the arrival's component
    /// for the given number of ticks.
    pub claim_on_arrival: Option<(MoverId, Ticks)>,
    /// Movers this handler routed.
    pub routed: Vec<MoverId>,
}

impl RecordingHandler {
    fn route(&mut self, ctx: &mut RoutingContext<'_>, component: ComponentId, route: Route, duration: Ticks) {
        if let Ok(id) = ctx.route_mover(component, route, duration) {
            self.routed.push(id);
        }
    }
}

impl TransportHandler for RecordingHandler {
    fn on_network_modified(
        &mut self,
        _ctx: &mut RoutingContext<'_>,
        component: ComponentId,
        movers: &[RoutedMover],
    ) {
        self.calls.push(Callback::NetworkModified {
            component,
            movers: movers.iter().map(|m| m.id).collect(),
        });
    }

    fn on_discovered_in_network(
        &mut self,
        ctx: &mut RoutingContext<'_>,
        mover: &FrozenMover,
        component: ComponentId,
        progress: Ticks,
    ) {
        self.calls.push(Callback::Discovered {
            mover: mover.id,
            component,
            progress,
        });
        if self.reroute_on_transfer {
            self.route(ctx, component, mover.route.clone(), mover.remaining());
        }
    }

    fn on_moved_between_networks(
        &mut self,
        ctx: &mut RoutingContext<'_>,
        mover: &RoutedMover,
        progress: Ticks,
        from: ComponentId,
        to: ComponentId,
    ) {
        self.calls.push(Callback::Moved {
            mover: mover.id,
            progress,
            from,
            to,
        });
        if let Some(claimed) = self.claim_on_transfer.take() {
            let _ = ctx.reroute_mover(to, claimed, Route::new(Vec3::ZERO, 1), 10);
        }
        if self.reroute_on_transfer {
            let remaining = mover.route.duration().saturating_sub(progress);
            self.route(ctx, to, mover.route.clone(), remaining);
        }
    }

    fn on_removed_from_network(
        &mut self,
        _ctx: &mut RoutingContext<'_>,
        mover: &RoutedMover,
        progress: Ticks,
        component: ComponentId,
    ) {
        self.calls.push(Callback::Removed {
            mover: mover.id,
            progress,
            component,
        });
    }

    fn on_arrived(&mut self, ctx: &mut RoutingContext<'_>, mover: &RoutedMover) {
        self.calls.push(Callback::Arrived { mover: mover.id });
        if let Some((claimed, duration)) = self.claim_on_arrival.take() {
            let _ = ctx.reroute_mover(mover.component, claimed, Route::new(Vec3::ZERO, 1), duration);
        }
        if self.route_on_arrival {
            self.route(ctx, mover.component, mover.route.clone(), mover.route.duration());
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
