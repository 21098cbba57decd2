//! End-to-end floorplanning scenarios.
//!
//! These tests drive the public API the way a caller would: build a
//! database, floorplan it, and check the geometry written back.

use mosaic_config::{OutlineChoice, Representation, ResolvedOptions};
use mosaic_diagnostics::DiagnosticSink;
use mosaic_floorplan::seqpair::{placement_to_seqpair, seqpair_to_tree};
use mosaic_floorplan::shape::ShapeTable;
use mosaic_floorplan::{
    cost, floorplan, AnnealParams, Annealer, Block, ContourEvaluator, FloorplanDb, Net, NetPin,
    Outline, PartitionAdapter, Rect, Terminal,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn squares(n: usize, side: f64) -> FloorplanDb {
    let mut db = FloorplanDb::new();
    for i in 0..n {
        db.add_block(Block::hard(format!("b{i}"), side, side));
    }
    db
}

fn options(representation: Representation, seed: u64) -> ResolvedOptions {
    ResolvedOptions {
        representation,
        minimize_wirelength: false,
        outline: OutlineChoice::Free,
        max_whitespace: 0.0,
        seed: Some(seed),
        ..ResolvedOptions::default()
    }
}

// ---------------------------------------------------------------------------
// Packing scenarios
// ---------------------------------------------------------------------------

#[test]
fn four_squares_pack_without_whitespace() {
    for representation in [Representation::Tree, Representation::SequencePair] {
        let mut db = squares(4, 10.0);
        let sink = DiagnosticSink::new();
        let report = floorplan(&mut db, &options(representation, 1), &sink).unwrap();
        let dims = (report.width, report.height);
        assert!(
            [(20.0, 20.0), (10.0, 40.0), (40.0, 10.0)].contains(&dims),
            "{representation} packed four squares into {dims:?}"
        );
        assert!(report.success);
        let placement = db.current_placement().unwrap();
        assert!(!placement.has_overlap());
    }
}

#[test]
fn undersized_outline_reports_the_closest_packing() {
    let db = squares(4, 10.0);
    let params = AnnealParams {
        representation: Representation::Tree,
        outline: Outline::Fixed {
            width: 15.0,
            height: 15.0,
        },
        seed: Some(3),
        ..AnnealParams::default()
    };
    let outcome = Annealer::new(params).run(&db, &DiagnosticSink::new()).unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.placement.len(), 4);
    assert!(!outcome.placement.has_overlap());
}

#[test]
fn abutting_pair_has_hpwl_ten() {
    let mut db = FloorplanDb::new();
    let a = db.add_block(Block::hard("a", 10.0, 10.0).at(0.0, 0.0));
    let b = db.add_block(Block::hard("b", 10.0, 10.0).at(10.0, 0.0));
    db.add_net(Net::new("ab", vec![NetPin::center(a), NetPin::center(b)]))
        .unwrap();
    assert_eq!(db.hpwl(), Some(10.0));
    let placement = db.current_placement().unwrap();
    assert_eq!(cost::total_hpwl(&db, &placement), 10.0);
}

#[test]
fn same_seed_gives_the_same_floorplan() {
    let build = || {
        let mut db = squares(6, 10.0);
        let pad = db.add_terminal(Terminal::new("pad", 0.0, 50.0));
        let id = db.blocks[3].id;
        db.add_net(Net::new("io", vec![NetPin::center(id), NetPin::Terminal(pad)]))
            .unwrap();
        db
    };
    let mut opts = options(Representation::Auto, 17);
    opts.minimize_wirelength = true;
    let (mut a, mut b) = (build(), build());
    let sink = DiagnosticSink::new();
    let ra = floorplan(&mut a, &opts, &sink).unwrap();
    let rb = floorplan(&mut b, &opts, &sink).unwrap();
    assert_eq!(ra, rb);
    assert_eq!(a.current_placement(), b.current_placement());
}

// ---------------------------------------------------------------------------
// Representation conversions
// ---------------------------------------------------------------------------

#[test]
fn compacted_result_survives_seqpair_tree_round_trip() {
    let mut db = squares(4, 10.0);
    floorplan(
        &mut db,
        &options(Representation::Tree, 5),
        &DiagnosticSink::new(),
    )
    .unwrap();
    let placement = db.current_placement().unwrap();
    let shapes = ShapeTable::from_db(&db, false);
    let orients: Vec<_> = placement.blocks.iter().map(|b| b.orient).collect();

    let sp = placement_to_seqpair(&placement);
    let from_sp = sp.evaluate(&shapes, &orients);
    assert_eq!((from_sp.width, from_sp.height), (placement.width, placement.height));

    let tree = seqpair_to_tree(&sp, &shapes, &orients);
    let from_tree = ContourEvaluator::new().evaluate(&tree, &shapes).placement;
    assert_eq!(
        (from_tree.width, from_tree.height),
        (placement.width, placement.height)
    );
    assert!(!from_tree.has_overlap());
}

// ---------------------------------------------------------------------------
// Scale-out
// ---------------------------------------------------------------------------

#[test]
fn hierarchical_floorplan_places_every_block() {
    let mut db = squares(12, 10.0);
    for i in 0..12 {
        let (a, b) = (db.blocks[i].id, db.blocks[(i + 1) % 12].id);
        let weight = if i % 2 == 0 { 5 } else { 1 };
        let pins = vec![NetPin::center(a), NetPin::center(b)];
        db.add_net(Net::new(format!("n{i}"), pins).with_weight(weight))
            .unwrap();
    }
    let mut opts = options(Representation::Auto, 9);
    opts.minimize_wirelength = true;
    opts.max_whitespace = 15.0;
    opts.hierarchy.max_top_level_blocks = Some(4);
    opts.hierarchy.parallel = false;

    let sink = DiagnosticSink::new();
    let report = floorplan(&mut db, &opts, &sink).unwrap();
    assert!(report.success);
    assert!(db.is_fully_placed());
    let placement = db.current_placement().unwrap();
    assert!(!placement.has_overlap());
    assert!(placement.blocks.iter().all(|b| b.x >= 0.0 && b.y >= 0.0));
}

#[test]
fn partition_adapter_keeps_macros_in_their_quadrants() {
    let core = Rect::new(0.0, 0.0, 200.0, 100.0);
    let mut db = FloorplanDb::new();
    let pads = [(0.0, 10.0), (200.0, 10.0), (0.0, 90.0), (200.0, 90.0)];
    for (i, (x, y)) in pads.into_iter().enumerate() {
        for k in 0..2 {
            let b = db.add_block(Block::hard(format!("m{i}_{k}"), 20.0, 15.0).as_macro());
            let t = db.add_terminal(Terminal::new(format!("p{i}_{k}"), x, y));
            let pins = vec![NetPin::center(b), NetPin::Terminal(t)];
            db.add_net(Net::new(format!("n{i}_{k}"), pins)).unwrap();
        }
    }
    let adapter = PartitionAdapter::new(AnnealParams::default(), core);
    let outcome = adapter
        .place(&mut db, &mut StdRng::seed_from_u64(12), &DiagnosticSink::new())
        .unwrap();
    assert!(outcome.success());
    assert_eq!(outcome.quadrants.iter().map(|q| q.blocks.len()).sum::<usize>(), 8);
    for q in &outcome.quadrants {
        assert!(core.contains(&q.bounds));
        for &id in &q.blocks {
            let rect = db.block(id).rect().unwrap();
            assert!(q.bounds.contains(&rect), "{} left {}", db.block(id).name, q.quadrant);
        }
    }
    assert!(!db.current_placement().unwrap().has_overlap());
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

#[test]
fn report_serializes_to_json() {
    let mut db = squares(2, 10.0);
    let report = floorplan(
        &mut db,
        &options(Representation::Tree, 2),
        &DiagnosticSink::new(),
    )
    .unwrap();
    let json = serde_json::to_value(report).unwrap();
    assert_eq!(json["area"], 200.0);
    assert_eq!(json["success"], true);
    assert_eq!(json["representation"], "Tree");
}
