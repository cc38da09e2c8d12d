//! Networks built from transporter definitions loaded off disk.
//!
//! Definitions are written to a temporary directory as RON, loaded through
//! `conduit_data`, and placed into a registry with one recording handler per
//! transporter type.

use std::fs;
use std::path::{Path, PathBuf};

use conduit_core::geometry::{BlockPos, Direction, Rotation, Side, Vec3};
use conduit_core::id::TransporterType;
use conduit_core::ingest::Placement;
use conduit_core::network::TopologyGraph;
use conduit_core::registry::TransportRegistry;
use conduit_core::route::Route;
use conduit_core::test_utils::{Callback, RecordingHandler};
use conduit_data::{TransporterCatalog, load_transporters};

const TRANSPORTERS_RON: &str = r#"[
    (
        name: "straight_pipe",
        transporter_type: "item_pipe",
        route_groups: [(inputs: ["west", "east"], outputs: ["west", "east"])],
    ),
    (
        name: "crossing",
        transporter_type: "item_pipe",
        route_groups: [
            (inputs: ["west", "east"], outputs: ["west", "east"]),
            (inputs: ["north", "south"], outputs: ["north", "south"]),
        ],
    ),
    (
        name: "duct",
        transporter_type: "fluid_duct",
        route_groups: [(inputs: ["west", "east"], outputs: ["west", "east"])],
    ),
]"#;

fn make_test_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "conduit_integration_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

/// Load the catalog and register a recording handler for every type it uses.
fn setup(suffix: &str) -> (TransporterCatalog, TransportRegistry) {
    let dir = make_test_dir(suffix);
    fs::write(dir.join("transporters.ron"), TRANSPORTERS_RON).unwrap();
    let catalog = load_transporters(&dir).unwrap();
    cleanup(&dir);

    let mut registry = TransportRegistry::new();
    for ty in catalog.transporter_types() {
        registry
            .register_handler(ty, Box::new(RecordingHandler::default()))
            .unwrap();
    }
    (catalog, registry)
}

fn item_pipe() -> TransporterType {
    TransporterType::from("item_pipe")
}

#[test]
fn every_catalog_type_gets_a_network() {
    let (catalog, registry) = setup("types");
    assert_eq!(catalog.len(), 3);
    assert!(registry.is_registered(&item_pipe()));
    assert!(registry.is_registered(&TransporterType::from("fluid_duct")));
}

#[test]
fn crossing_keeps_its_route_groups_apart() {
    let (catalog, mut registry) = setup("crossing");
    let straight = catalog.get("straight_pipe").unwrap();
    let crossing = catalog.get("crossing").unwrap();

    registry
        .transporter_placed(crossing, Placement::at(BlockPos::new(0, 0, 0)))
        .unwrap();
    for x in [-1, 1] {
        registry
            .transporter_placed(straight, Placement::at(BlockPos::new(x, 0, 0)))
            .unwrap();
    }
    // A straight pipe turned a quarter runs north to south.
    for z in [-1, 1] {
        registry
            .transporter_placed(straight, Placement::rotated(BlockPos::new(0, 0, z), Rotation::Cw90))
            .unwrap();
    }

    let ty = item_pipe();
    let east_west = registry
        .find_component_at(&ty, BlockPos::new(-1, 0, 0), Side::East, Direction::Output)
        .unwrap()
        .unwrap();
    let north_south = registry
        .find_component_at(&ty, BlockPos::new(0, 0, -1), Side::South, Direction::Output)
        .unwrap()
        .unwrap();
    assert_ne!(east_west, north_south);

    let graph = registry.graph(&ty).unwrap();
    assert_eq!(graph.component_count(), 2);
    assert_eq!(graph.component_nodes(east_west).map(|n| n.len()), Some(3));
    assert_eq!(graph.component_nodes(north_south).map(|n| n.len()), Some(3));
}

#[test]
fn adjacent_blocks_of_different_types_stay_separate() {
    let (catalog, mut registry) = setup("isolation");
    let straight = catalog.get("straight_pipe").unwrap();
    let duct = catalog.get("duct").unwrap();

    registry
        .transporter_placed(straight, Placement::at(BlockPos::new(0, 0, 0)))
        .unwrap();
    registry
        .transporter_placed(duct, Placement::at(BlockPos::new(1, 0, 0)))
        .unwrap();

    let pipes = registry.graph(&item_pipe()).unwrap();
    let ducts = registry.graph(&TransporterType::from("fluid_duct")).unwrap();
    assert_eq!(pipes.node_count(), 1);
    assert_eq!(ducts.node_count(), 1);
    assert!(pipes.component_at(BlockPos::new(1, 0, 0)).is_none());
}

#[test]
fn region_round_trip_with_loaded_definitions() {
    let (catalog, mut registry) = setup("region");
    let straight = catalog.get("straight_pipe").unwrap();
    let ty = item_pipe();
    let region: Vec<Placement> = (0..4)
        .map(|x| Placement::at(BlockPos::new(x, 0, 10)))
        .collect();

    registry.region_loaded(straight, &region).unwrap();
    let component = registry.graph(&ty).unwrap().component_at(BlockPos::new(0, 0, 10)).unwrap();
    let route = Route::through(Vec3::new(0.0, 0.0, 10.0), [Vec3::new(3.0, 0.0, 10.0)], 100);
    let id = registry.route_mover(&ty, component, route, 300).unwrap();
    registry.tick(100);

    registry.region_unloaded(straight, &region).unwrap();
    assert_eq!(registry.mover_count(), 0);
    let frozen = registry.take_unloaded();
    assert_eq!(frozen.len(), 1);
    assert_eq!(frozen[0].id, id);
    assert_eq!(frozen[0].block(), BlockPos::new(1, 0, 10));

    registry.region_loaded(straight, &region).unwrap();
    for mover in frozen {
        registry.load_frozen(mover).unwrap();
    }
    assert_eq!(registry.pending_load_count(), 1);
    registry.tick(200);
    assert_eq!(registry.pending_load_count(), 0);

    let reloaded = registry.graph(&ty).unwrap().component_at(BlockPos::new(1, 0, 10)).unwrap();
    let recorder = registry.handler::<RecordingHandler>(&ty).unwrap();
    assert!(recorder.calls.iter().any(|c| matches!(
        c,
        Callback::Discovered { mover, component, progress: 100 }
            if *mover == id && *component == reloaded
    )));
}
