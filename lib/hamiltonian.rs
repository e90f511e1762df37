//! Two-body J1-J2 Heisenberg Hamiltonian.
//!
//! The pair interaction is stored as a short list of product terms
//! `coef · L ⊗ R`, with one coefficient for nearest-neighbour bonds and one for
//! next-nearest (diagonal) bonds.

use ndarray as nd;

/// Local spin operators for spin `S = (d - 1) / 2` in the basis
/// `m = -S, -S + 1, ..., S`.
#[derive(Clone, Debug, PartialEq)]
pub struct SpinOps {
    pub sz: nd::Array2<f64>,
    pub sp: nd::Array2<f64>,
    pub sm: nd::Array2<f64>,
}

pub fn spin_ops(d: usize) -> SpinOps {
    let s = (d as f64 - 1.0) / 2.0;
    let m = |i: usize| -s + i as f64;
    let sz = nd::Array2::from_diag(&nd::Array1::from_shape_fn(d, m));
    let mut sp: nd::Array2<f64> = nd::Array2::zeros((d, d));
    for i in 0..d.saturating_sub(1) {
        sp[[i + 1, i]] = (s * (s + 1.0) - m(i) * (m(i) + 1.0)).sqrt();
    }
    let sm = sp.t().to_owned();
    SpinOps { sz, sp, sm }
}

/// One product term `L ⊗ R` of the pair interaction.
#[derive(Clone, Debug, PartialEq)]
pub struct Term {
    /// Coefficient on nearest-neighbour bonds.
    pub coef_n: f64,
    /// Coefficient on next-nearest-neighbour bonds.
    pub coef_nn: f64,
    /// Operator on the first site of the bond.
    pub left: nd::Array2<f64>,
    /// Operator on the second site of the bond.
    pub right: nd::Array2<f64>,
}

/// Bond type selecting a coefficient.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Coupling {
    Nearest,
    NextNearest,
}

impl Term {
    pub fn coef(&self, coupling: Coupling) -> f64 {
        match coupling {
            Coupling::Nearest => self.coef_n,
            Coupling::NextNearest => self.coef_nn,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Hamiltonian {
    d: usize,
    terms: Vec<Term>,
}

impl Hamiltonian {
    /// `H = J1 Σ_<ij> S_i·S_j + J2 Σ_<<ij>> S_i·S_j` with `J1 = 1`.
    pub fn j1j2(d: usize, j2: f64) -> Self {
        let SpinOps { sz, sp, sm } = spin_ops(d);
        let terms = vec![
            Term { coef_n: 1.0, coef_nn: j2, left: sz.clone(), right: sz },
            Term { coef_n: 0.5, coef_nn: 0.5 * j2, left: sp.clone(), right: sm.clone() },
            Term { coef_n: 0.5, coef_nn: 0.5 * j2, left: sm, right: sp },
        ];
        Self { d, terms }
    }

    pub fn d(&self) -> usize { self.d }

    pub fn terms(&self) -> &[Term] { &self.terms }

    /// Return `true` if any next-nearest-neighbour coefficient is nonzero.
    pub fn has_next_nearest(&self) -> bool {
        self.terms.iter().any(|t| t.coef_nn != 0.0)
    }

    /// Pair operator `Σ coef · L ⊗ R` as a `d² × d²` matrix with rows
    /// `s_i * d + s_j` and columns `s_k * d + s_l`.
    pub fn pair_matrix(&self, coupling: Coupling) -> nd::Array2<f64> {
        let d = self.d;
        let mut h: nd::Array2<f64> = nd::Array2::zeros((d * d, d * d));
        for term in self.terms.iter() {
            let c = term.coef(coupling);
            if c == 0.0 { continue; }
            for si in 0..d {
                for sj in 0..d {
                    for sk in 0..d {
                        for sl in 0..d {
                            h[[si * d + sj, sk * d + sl]]
                                += c * term.left[[si, sk]] * term.right[[sj, sl]];
                        }
                    }
                }
            }
        }
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_half_operators() {
        let SpinOps { sz, sp, sm } = spin_ops(2);
        assert_eq!(sz, nd::array![[-0.5, 0.0], [0.0, 0.5]]);
        assert_eq!(sp, nd::array![[0.0, 0.0], [1.0, 0.0]]);
        assert_eq!(sm, nd::array![[0.0, 1.0], [0.0, 0.0]]);
    }

    #[test]
    fn spin_one_casimir() {
        // S² = S(S + 1) = 2 for d = 3
        let SpinOps { sz, sp, sm } = spin_ops(3);
        let s2 = sz.dot(&sz) + 0.5 * (sp.dot(&sm) + sm.dot(&sp));
        for i in 0..3 {
            for j in 0..3 {
                let target = if i == j { 2.0 } else { 0.0 };
                assert!((s2[[i, j]] - target).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn heisenberg_pair_spectrum() {
        // singlet at -3/4, triplet at 1/4
        let ham = Hamiltonian::j1j2(2, 0.0);
        let h = ham.pair_matrix(Coupling::Nearest);
        let (eig, _) = crate::linalg::eigh(&h).unwrap();
        assert!((eig[0] + 0.75).abs() < 1e-12);
        for k in 1..4 { assert!((eig[k] - 0.25).abs() < 1e-12); }
        assert!(!ham.has_next_nearest());
        assert!(Hamiltonian::j1j2(2, 0.5).has_next_nearest());
    }
}
