mod common;

use rand::{ SeedableRng, rngs::StdRng };
use peps_ite::{
    Peps,
    environment::{ Compressor, EnvOption, Environment },
    mpo::{ BoundaryMpo, Canonical, Side },
    observables,
};

#[test]
fn compression_cost_never_increases() {
    let mut rng = StdRng::seed_from_u64(100);
    let peps = Peps::random(5, 5, 2, 2, &mut rng);
    let comp = Compressor { d_aux: 3, comp_sweeps: 5 };
    let mut b0 = BoundaryMpo::fill(&peps, Side::Bottom).unwrap();
    b0.canonicalize(Canonical::Right, None).unwrap();

    let (b1, costs) = comp.add_row_traced(&peps, &b0, Side::Bottom, 1).unwrap();
    assert_eq!(costs.len(), 6);
    assert!(b1.max_bond() <= 3);
    let scale = costs[0].abs();
    for w in costs.windows(2) {
        assert!(w[1] <= w[0] + 1e-10 * scale, "cost increased: {:?}", costs);
    }

    let mut t2 = BoundaryMpo::fill(&peps, Side::Top).unwrap();
    t2.canonicalize(Canonical::Right, None).unwrap();
    let (_, costs) = comp.add_row_traced(&peps, &t2, Side::Top, 3).unwrap();
    let scale = costs[0].abs();
    for w in costs.windows(2) {
        assert!(w[1] <= w[0] + 1e-10 * scale, "cost increased: {:?}", costs);
    }
}

#[test]
fn truncated_fit_beats_plain_truncation() {
    // the variational sweeps can only improve on the SVD initialization
    let mut rng = StdRng::seed_from_u64(101);
    let peps = Peps::random(4, 4, 2, 2, &mut rng);
    let mut b0 = BoundaryMpo::fill(&peps, Side::Bottom).unwrap();
    b0.canonicalize(Canonical::Right, None).unwrap();
    let svd_only = Compressor { d_aux: 2, comp_sweeps: 0 };
    let swept = Compressor { d_aux: 2, comp_sweeps: 3 };
    let (_, c0) = svd_only.add_row_traced(&peps, &b0, Side::Bottom, 1).unwrap();
    let (_, c1) = swept.add_row_traced(&peps, &b0, Side::Bottom, 1).unwrap();
    assert_eq!(c0.len(), 1);
    assert!(c1[c1.len() - 1] <= c0[0] + 1e-10 * c0[0].abs());
}

#[test]
fn large_d_aux_is_exact() {
    // every cut of a boundary on a 4-wide lattice has rank at most (D²)² = 16
    let mut rng = StdRng::seed_from_u64(102);
    let peps = Peps::random(4, 4, 2, 2, &mut rng);
    let exact = common::brute_force_norm(&peps);

    let mut env = Environment::new(4, 4, 16, 2);
    env.calc(EnvOption::All, &peps).unwrap();
    let from_env = observables::norm(&peps, &env).unwrap();
    assert!(
        (from_env - exact).abs() < 1e-10 * exact,
        "environment {} vs brute force {}", from_env, exact,
    );
    for cut in env.consistency().unwrap() {
        assert!((cut - exact).abs() < 1e-10 * exact, "cut {} vs {}", cut, exact);
    }
}

#[test]
fn incremental_layers_match_full_rebuild() {
    let mut rng = StdRng::seed_from_u64(103);
    let peps = Peps::random(3, 5, 2, 2, &mut rng);
    let mut full = Environment::new(3, 5, 16, 1);
    full.calc(EnvOption::Bottom, &peps).unwrap();
    let mut inc = Environment::new(3, 5, 16, 1);
    for row in 0..3 {
        inc.add_layer(Side::Bottom, row, &peps).unwrap();
    }
    for row in 0..3 {
        let a = full.gb(row);
        let b = inc.gb(row);
        let overlap = a.dot(b).unwrap();
        let na = a.norm().unwrap();
        let nb = b.norm().unwrap();
        assert!((overlap - na * nb).abs() < 1e-8 * na * nb);
        assert!((na - nb).abs() < 1e-8 * na);
    }
}
