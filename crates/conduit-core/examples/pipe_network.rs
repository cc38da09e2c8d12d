//! Pipe network example: movers surviving a pipe being cut and repaired.
//!
//! Lays a straight run of eight pipes, sends three movers down it, removes a
//! pipe in the middle (splitting the network), puts it back (merging the
//! halves), and runs the clock until every mover has arrived.
//!
//! Run with: `RUST_LOG=debug cargo run -p conduit-core --example pipe_network`

use conduit_core::clock::Ticks;
use conduit_core::geometry::{BlockPos, Direction, Side, SideMask, Vec3};
use conduit_core::handler::{RoutingContext, TransportHandler};
use conduit_core::id::{ComponentId, TransporterType};
use conduit_core::ingest::{Placement, RouteGroup, TransporterDef};
use conduit_core::mover::{FrozenMover, RoutedMover};
use conduit_core::network::TopologyGraph;
use conduit_core::registry::TransportRegistry;
use conduit_core::route::Route;

/// Keeps every mover heading for the far end of whatever component it is in.
#[derive(Debug, Default)]
struct ShuttleHandler {
    arrived: usize,
    lost: usize,
}

impl ShuttleHandler {
    /// Route from the mover's current position to the easternmost block of
    /// `component`.
    fn continue_from(&self, ctx: &mut RoutingContext<'_>, component: ComponentId, from: Vec3, rate: Ticks) {
        let Some(end) = ctx
            .graph()
            .component_nodes(component)
            .and_then(|nodes| nodes.iter().map(|n| n.location).max_by_key(|p| p.x))
        else {
            return;
        };
        let route = Route::through(from, [Vec3::from(end)], rate);
        let duration = route.duration();
        if let Err(err) = ctx.route_mover(component, route, duration) {
            tracing::warn!(%err, "could not continue mover");
        }
    }
}

impl TransportHandler for ShuttleHandler {
    fn on_discovered_in_network(
        &mut self,
        ctx: &mut RoutingContext<'_>,
        mover: &FrozenMover,
        component: ComponentId,
        _progress: Ticks,
    ) {
        self.continue_from(ctx, component, mover.position, mover.route.time_per_unit());
    }

    fn on_moved_between_networks(
        &mut self,
        ctx: &mut RoutingContext<'_>,
        mover: &RoutedMover,
        progress: Ticks,
        _from: ComponentId,
        to: ComponentId,
    ) {
        let here = mover.route.position_at(progress);
        self.continue_from(ctx, to, here, mover.route.time_per_unit());
    }

    fn on_removed_from_network(
        &mut self,
        _ctx: &mut RoutingContext<'_>,
        mover: &RoutedMover,
        _progress: Ticks,
        _component: ComponentId,
    ) {
        println!("  {} fell out of the network", mover.id);
        self.lost += 1;
    }

    fn on_arrived(&mut self, ctx: &mut RoutingContext<'_>, mover: &RoutedMover) {
        println!("  {} arrived at tick {}", mover.id, ctx.now());
        self.arrived += 1;
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conduit_core=info".into()),
        )
        .init();

    let pipe_type = TransporterType::from("item_pipe");
    let ends = SideMask::of(&[Side::West, Side::East]);
    let pipe = TransporterDef {
        name: "pipe".to_string(),
        transporter: pipe_type.clone(),
        route_groups: vec![RouteGroup {
            inputs: ends,
            outputs: ends,
        }],
    };

    let mut registry = TransportRegistry::new();
    registry
        .register_handler(pipe_type.clone(), Box::new(ShuttleHandler::default()))
        .expect("item_pipe registered once");

    // --- Step 1: Lay the pipe run ---

    for x in 0..8 {
        registry
            .transporter_placed(&pipe, Placement::at(BlockPos::new(x, 0, 0)))
            .expect("pipe type is registered");
    }
    let start = registry
        .find_component_at(&pipe_type, BlockPos::new(0, 0, 0), Side::West, Direction::Input)
        .expect("pipe type is registered")
        .expect("run starts at the origin");

    // --- Step 2: Send three movers, staggered by their start offset ---

    for offset in [0.0, 1.0, 2.0] {
        let route = Route::through(Vec3::new(offset, 0.0, 0.0), [Vec3::new(7.0, 0.0, 0.0)], 100);
        let duration = route.duration();
        let id = registry
            .route_mover(&pipe_type, start, route, duration)
            .expect("component is live");
        println!("routed {id} ({duration} ticks)");
    }

    // --- Step 3: Cut and repair the run ---

    registry.tick(250);
    println!("tick 250: cutting pipe at x=4");
    registry
        .transporter_removed(&pipe, Placement::at(BlockPos::new(4, 0, 0)))
        .expect("pipe type is registered");

    registry.tick(300);
    println!("tick 300: repairing pipe at x=4");
    registry
        .transporter_placed(&pipe, Placement::at(BlockPos::new(4, 0, 0)))
        .expect("pipe type is registered");

    // --- Step 4: Run until everything has arrived ---

    let mut now = 300;
    while registry.mover_count() > 0 && now < 5_000 {
        now += 50;
        registry.tick(now);
    }

    let shuttle = registry
        .handler::<ShuttleHandler>(&pipe_type)
        .expect("handler registered above");
    println!(
        "done at tick {now}: {} arrived, {} lost, {} components",
        shuttle.arrived,
        shuttle.lost,
        registry.graph(&pipe_type).map_or(0, |g| g.components().len()),
    );
}
