mod common;

use stack_surrogate::data::{
    spectrum, BatchGenerator, BatchSource, BatchStore, Combined, Forward, Inverse,
};
use stack_surrogate::Error;

use std::collections::BTreeMap;
use std::fs;

#[test]
fn draws_cover_listing_before_repeating() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::write_batches(dir.path(), 5, 0);
    let mut gen = BatchGenerator::seeded(store, 42);

    for _ in 0..3 {
        let mut cycle: Vec<String> = (0..5).map(|_| gen.next_id().unwrap()).collect();
        cycle.sort();
        assert_eq!(cycle, vec!["b0", "b1", "b2", "b3", "b4"]);
    }
}

#[test]
fn two_batches_are_drawn_equally_often() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::write_batches(dir.path(), 2, 0);
    let mut gen = BatchGenerator::new(store);

    let mut counts = BTreeMap::new();
    let drawn: Vec<String> = (0..10).map(|_| gen.next_id().unwrap()).collect();
    for id in &drawn {
        *counts.entry(id.clone()).or_insert(0) += 1;
    }
    assert_eq!(counts["b0"], 5);
    assert_eq!(counts["b1"], 5);
    for cycle in drawn.chunks(2) {
        assert_ne!(cycle[0], cycle[1]);
    }
}

#[test]
fn modes_reshape_the_same_draw() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::write_batches(dir.path(), 3, 0);

    let mut inverse = BatchGenerator::seeded(store.clone(), 7).into_pairs::<Inverse>();
    let mut forward = BatchGenerator::seeded(store.clone(), 7).into_pairs::<Forward>();
    let mut combined = BatchGenerator::seeded(store, 7).into_pairs::<Combined>();

    for _ in 0..4 {
        let (spectra, labels) = inverse.next_pair().unwrap();
        let (f_labels, f_spectra) = forward.next_pair().unwrap();
        let (c_in, c_out) = combined.next_pair().unwrap();

        assert_eq!(spectra.dim(), (common::SAMPLES, common::POINTS, 2));
        assert_eq!(labels, f_labels);
        assert_eq!(spectra, f_spectra);
        assert_eq!(c_in, spectra);
        assert_eq!(c_out, spectra);
    }
}

#[test]
fn continuous_labels_come_from_parameter_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::write_batches(dir.path(), 1, 3);
    let raw = store.load_raw("b0").unwrap();
    let batch = store.load("b0").unwrap();

    for (i, params) in raw.params.iter().enumerate() {
        let row = batch.labels.continuous_row(i);
        assert_eq!(row[0], params.0.width);
        assert_eq!(row[3], params.0.period);
        assert_eq!(row[4], params.1.width);
        assert_eq!(row[8], params.2.spacer_height);
        assert_eq!(row[9], params.2.angle);
    }
    assert_eq!(spectrum(&batch.spectra, 0).len(), common::POINTS * 2);
}

#[test]
fn refill_picks_up_new_batches() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::write_batches(dir.path(), 2, 0);
    let mut gen = BatchGenerator::seeded(store.clone(), 1);

    gen.next_id().unwrap();
    store
        .write("late", &common::raw_batch(99, common::SAMPLES, common::POINTS))
        .unwrap();
    // the running cycle only knows the batches listed when it started
    assert_ne!(gen.next_id().unwrap(), "late");

    let mut cycle: Vec<String> = (0..3).map(|_| gen.next_id().unwrap()).collect();
    cycle.sort();
    assert_eq!(cycle, vec!["b0", "b1", "late"]);
    assert_eq!(gen.listing_len().unwrap(), 3);
}

#[test]
fn empty_directory_is_an_empty_pool() {
    let dir = tempfile::tempdir().unwrap();
    let store = BatchStore::new(dir.path());
    store.create_dirs().unwrap();

    let mut gen = BatchGenerator::new(store);
    match gen.next_batch() {
        Err(Error::EmptyPool { dir: reported }) => assert_eq!(reported, dir.path()),
        other => panic!("Expected an empty pool, got {:?}", other),
    }
}

#[test]
fn missing_parameter_file_fails_the_draw() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::write_batches(dir.path(), 1, 0);
    fs::remove_file(dir.path().join("params").join("b0.json")).unwrap();

    let mut pairs = BatchGenerator::new(store).into_pairs::<Inverse>();
    match pairs.next() {
        Some(Err(Error::MissingBatch { id, .. })) => assert_eq!(id, "b0"),
        other => panic!("Expected a missing batch, got {:?}", other.map(|r| r.is_ok())),
    }
}
