use approx::assert_relative_eq;

use flowacc_core::direction::{DirectionGrid, E, NONE, S, W};
use flowacc_core::flow_routing::compute_d8_directions;
use flowacc_core::heightfield::HeightField;
use flowacc_core::{accumulate, run, AccumConfig, AccumOutput, Error, NumericKind, WeightGrid, ZeroMode};

/// Two 4-cell chains meeting head-on at a single outlet in the middle.
fn two_chains() -> DirectionGrid {
    DirectionGrid::new(1, 9, vec![E, E, E, E, NONE, W, W, W, W]).unwrap()
}

#[test]
fn merging_chains_independent_of_thread_count() {
    for threads in [1, 2, 8] {
        for _ in 0..20 {
            let cfg = AccumConfig { threads: Some(threads), ..Default::default() };
            let acc = accumulate::<i32>(&two_chains(), None, &cfg).unwrap();
            assert_eq!(acc.get(0, 4), Some(9), "threads = {threads}");
            assert_eq!(acc.get(0, 3), Some(4));
            assert_eq!(acc.get(0, 5), Some(4));
        }
    }
}

#[test]
fn right_then_down_3x3() {
    let dirs = DirectionGrid::new(3, 3, vec![E, E, S, E, E, S, E, E, NONE]).unwrap();
    for less in [false, true] {
        let cfg = AccumConfig { use_less_memory: less, ..Default::default() };
        let acc = accumulate::<f64>(&dirs, None, &cfg).unwrap();
        assert_eq!(acc.get(2, 2), Some(9.0));
        assert_eq!(acc.get(0, 0), Some(1.0));
    }
}

#[test]
fn int_overflow_aborts_when_checked() {
    // Two cells of 2e9 each: the outlet exceeds i32::MAX.
    let dirs = DirectionGrid::new(1, 2, vec![E, NONE]).unwrap();
    let w = WeightGrid::new(1, 2, vec![2.0e9, 2.0e9], NumericKind::Int).unwrap();

    let cfg = AccumConfig { kind: NumericKind::Int, check_overflow: true, ..Default::default() };
    let err = run(&dirs, Some(&w), &cfg).unwrap_err();
    assert_eq!(err, Error::Overflow { row: 0, col: 1, kind: NumericKind::Int });
    assert!(err.to_string().contains("float"));

    // Unchecked integer arithmetic wraps.
    let cfg = AccumConfig { kind: NumericKind::Int, ..Default::default() };
    let out = run(&dirs, Some(&w), &cfg).unwrap();
    assert_eq!(out.get_f64(0, 1), Some(2_000_000_000i32.wrapping_add(2_000_000_000) as f64));

    // A wider kind holds it.
    let cfg = AccumConfig { kind: NumericKind::Double, check_overflow: true, ..Default::default() };
    let out = run(&dirs, Some(&w), &cfg).unwrap();
    assert_eq!(out.get_f64(0, 1), Some(4.0e9));
}

#[test]
fn float_overflow_aborts_when_checked() {
    let dirs = DirectionGrid::new(1, 3, vec![E, E, NONE]).unwrap();
    let w = WeightGrid::new(1, 3, vec![3.0e38, 3.0e38, 1.0], NumericKind::Double).unwrap();
    let cfg = AccumConfig { kind: NumericKind::Float, check_overflow: true, ..Default::default() };
    let err = run(&dirs, Some(&w), &cfg).unwrap_err();
    assert!(matches!(err, Error::Overflow { col: 1, kind: NumericKind::Float, .. }), "{err:?}");
}

#[test]
fn null_weight_cuts_the_path() {
    let dirs = DirectionGrid::new(1, 4, vec![E, E, E, NONE]).unwrap();
    let w = WeightGrid::from_options(1, 4, &[Some(1.0), None, Some(1.0), Some(1.0)]).unwrap();

    let cfg = AccumConfig { kind: NumericKind::Int, ..Default::default() };
    let out = run(&dirs, Some(&w), &cfg).unwrap();
    let AccumOutput::Int(acc) = out else { panic!("expected int output") };
    assert_eq!(acc.data, vec![Some(1), None, Some(1), Some(2)]);

    let cfg = AccumConfig { kind: NumericKind::Int, null_weight_as_zero: true, ..Default::default() };
    let AccumOutput::Int(acc) = run(&dirs, Some(&w), &cfg).unwrap() else { panic!() };
    assert_eq!(acc.data, vec![Some(1), Some(1), Some(2), Some(3)]);
}

#[test]
fn zero_modes_on_zero_weights() {
    let dirs = DirectionGrid::new(1, 3, vec![NONE, E, NONE]).unwrap();
    let w = WeightGrid::new(1, 3, vec![0.0, 0.0, 0.0], NumericKind::Int).unwrap();
    let base = AccumConfig { kind: NumericKind::Int, ..Default::default() };

    let acc = accumulate::<i32>(&dirs, Some(&w), &base).unwrap();
    assert_eq!(acc.data, vec![None, Some(0), Some(0)]);

    let cfg = AccumConfig { zero_mode: ZeroMode::ZeroThenNullify, ..base.clone() };
    let acc = accumulate::<i32>(&dirs, Some(&w), &cfg).unwrap();
    assert_eq!(acc.data, vec![None, None, None]);

    let cfg = AccumConfig { zero_mode: ZeroMode::LeaveZero, ..base };
    let acc = accumulate::<i32>(&dirs, Some(&w), &cfg).unwrap();
    assert_eq!(acc.data, vec![Some(0), Some(0), Some(0)]);
}

#[test]
fn weighted_join_sums_every_branch() {
    let dirs = two_chains();
    let weights: Vec<f64> = (0..9).map(|i| i as f64 * 0.25).collect();
    let w = WeightGrid::new(1, 9, weights.clone(), NumericKind::Double).unwrap();
    let acc = accumulate::<f64>(&dirs, Some(&w), &AccumConfig::default()).unwrap();
    let total: f64 = weights.iter().sum();
    assert_relative_eq!(acc.get(0, 4).unwrap(), total, epsilon = 1e-12);
}

#[test]
fn large_terrain_same_result_across_modes_and_threads() {
    let hf = HeightField::random(180, 140, 2024);
    let dirs = compute_d8_directions(&hf).unwrap();
    let reference = accumulate::<f64>(
        &dirs,
        None,
        &AccumConfig { threads: Some(1), ..Default::default() },
    )
    .unwrap();

    for threads in [2, 8] {
        for less in [false, true] {
            let cfg = AccumConfig { threads: Some(threads), use_less_memory: less, ..Default::default() };
            let acc = accumulate::<f64>(&dirs, None, &cfg).unwrap();
            let same = acc
                .data
                .iter()
                .zip(&reference.data)
                .all(|(a, b)| a.map(f64::to_bits) == b.map(f64::to_bits));
            assert!(same, "threads = {threads}, less_memory = {less}");
        }
    }

    let total: f64 = reference
        .data
        .iter()
        .enumerate()
        .filter(|&(i, _)| dirs.code(i) != NONE && dirs.downstream(i).is_none())
        .filter_map(|(_, v)| *v)
        .sum();
    // Cells draining off the grid edge carry everything upstream of them;
    // pits (NONE) hold the rest.
    let pits: f64 = reference
        .data
        .iter()
        .enumerate()
        .filter(|&(i, _)| dirs.code(i) == NONE)
        .filter_map(|(_, v)| *v)
        .sum();
    let isolated = reference
        .data
        .iter()
        .enumerate()
        .filter(|&(i, v)| dirs.code(i) == NONE && v.is_none())
        .count();
    assert_eq!(total + pits + isolated as f64, (180 * 140) as f64);
}
