//! Conduit Core -- mover tracking over changing transporter networks.
//!
//! Conduit blocks placed in a 3D world form connectivity graphs, one per
//! transporter type. Movers (payloads) travel along routes through those
//! graphs over simulated time. This crate keeps every mover owned by exactly
//! one live network component while the graphs gain and lose nodes, split,
//! and merge underneath them, and freezes and resumes movers around saves and
//! region unloads.
//!
//! # Control Flow
//!
//! 1. **Ingestion** -- Block placements, removals, updates, and region
//!    loads/unloads become node changes on the type's graph.
//! 2. **Graph** -- The graph engine recomputes components and reports
//!    topology events.
//! 3. **Reconcile** -- Each event is applied to the mover sets: movers are
//!    transferred, removed, or frozen, and the handler is notified.
//! 4. **Routing** -- Handlers queue new routes through their context; the
//!    registry applies them after the callback and schedules arrivals.
//! 5. **Tick** -- The clock advances, loaded movers are matched to their
//!    components, and due arrivals are delivered.
//!
//! # Key Types
//!
//! - [`registry::TransportRegistry`] -- Per-type graphs, handlers, mover sets,
//!   clock, and scheduler.
//! - [`handler::TransportHandler`] -- The pluggable routing policy.
//! - [`route::Route`] -- Waypoint path with duration and position-by-progress.
//! - [`network::BlockNetwork`] -- Reference connectivity graph with
//!   generation-keyed component identities.
//! - [`scheduler::DelayQueue`] -- Reference fire-at-time scheduler.
//! - [`mover::FrozenMover`] -- Durable state of a mover that is not simulated.

pub mod clock;
pub mod geometry;
pub mod handler;
pub mod id;
pub mod ingest;
pub mod mover;
pub mod network;
pub mod reconcile;
pub mod registry;
pub mod route;
pub mod save;
pub mod scheduler;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
