//! Brute-force helpers shared by the integration tests.
#![allow(dead_code)]

use peps_ite::{
    Peps,
    lattice::{ LTensor, Pair },
};

/// Contract every ket tensor of the lattice into the full state, with the
/// two sites of `replace.0` swapped for the two-site tensor `replace.1`.
///
/// Sites are absorbed in row-major order, so every new tensor shares a bond
/// with what has been contracted so far. The result keeps the dimension-1
/// edge legs.
pub fn state_vector(peps: &Peps, replace: Option<(&Pair, &LTensor)>) -> LTensor {
    let mut acc: Option<LTensor> = None;
    for row in 0..peps.ly() {
        for col in 0..peps.lx() {
            let site = (row, col);
            let next = match replace {
                Some((pair, theta)) if pair.first() == site => theta.clone(),
                Some((pair, _)) if pair.second() == site => continue,
                _ => peps.ket(row, col).unwrap(),
            };
            acc = Some(match acc {
                None => next,
                Some(a) => a.contract(&next).unwrap(),
            });
        }
    }
    acc.unwrap()
}

/// `⟨Ψ|Ψ⟩` by full contraction of the state vector.
pub fn brute_force_norm(peps: &Peps) -> f64 {
    state_vector(peps, None).norm().powi(2)
}
