//! Two-site imaginary-time gates `exp(-τ H_pair)`, factorized into one
//! operator per site.
//!
//! The gate `G[(s t), (s' t')]` is regrouped as `G̃[(s s'), (t t')]` and split
//! by an SVD into `LO(s, k, s') = U[(s s'), k] √σ_k` and
//! `RO(t, k, t') = √σ_k Vᵀ[k, (t t')]`, so that
//! `G[(s t), (s' t')] = Σ_k LO(s, k, s') RO(t, k, t')`.

use ndarray as nd;
use crate::{
    error::PepsResult,
    hamiltonian::{ Coupling, Hamiltonian },
    linalg,
};

/// Singular values of the regrouped gate at or below this are discarded.
pub const GATE_SVD_CUTOFF: f64 = 1e-15;

#[derive(Clone, Debug, PartialEq)]
pub struct Trotter {
    tau: f64,
    lo_n: nd::Array3<f64>,
    ro_n: nd::Array3<f64>,
    lo_nn: nd::Array3<f64>,
    ro_nn: nd::Array3<f64>,
}

impl Trotter {
    pub fn new(ham: &Hamiltonian, tau: f64) -> PepsResult<Self> {
        let (lo_n, ro_n) = factorize(&gate_matrix(ham, Coupling::Nearest, tau)?, ham.d())?;
        let (lo_nn, ro_nn)
            = factorize(&gate_matrix(ham, Coupling::NextNearest, tau)?, ham.d())?;
        Ok(Self { tau, lo_n, ro_n, lo_nn, ro_nn })
    }

    pub fn tau(&self) -> f64 { self.tau }

    /// Left and right gate factors for the given bond type.
    pub fn factors(&self, coupling: Coupling) -> (&nd::Array3<f64>, &nd::Array3<f64>) {
        match coupling {
            Coupling::Nearest => (&self.lo_n, &self.ro_n),
            Coupling::NextNearest => (&self.lo_nn, &self.ro_nn),
        }
    }

    /// Recombine the factors into the `d² × d²` gate
    /// `G[(s t), (s' t')] = Σ_k LO(s, k, s') RO(t, k, t')`.
    pub fn gate(&self, coupling: Coupling) -> nd::Array2<f64> {
        let (lo, ro) = self.factors(coupling);
        let (d, dim, _) = lo.dim();
        let mut g: nd::Array2<f64> = nd::Array2::zeros((d * d, d * d));
        for s in 0..d {
            for t in 0..d {
                for s_ in 0..d {
                    for t_ in 0..d {
                        g[[s * d + t, s_ * d + t_]]
                            = (0..dim)
                            .map(|k| lo[[s, k, s_]] * ro[[t, k, t_]])
                            .sum();
                    }
                }
            }
        }
        g
    }
}

// exp(-τ H) from the eigendecomposition of the pair operator
fn gate_matrix(ham: &Hamiltonian, coupling: Coupling, tau: f64)
    -> PepsResult<nd::Array2<f64>>
{
    let h = ham.pair_matrix(coupling);
    let (eig, vecs) = linalg::eigh(&h)?;
    let weights = eig.mapv(|e| (-tau * e).exp());
    let scaled: nd::Array2<f64> = &vecs * &weights.view().insert_axis(nd::Axis(0));
    Ok(scaled.dot(&vecs.t()))
}

fn factorize(gate: &nd::Array2<f64>, d: usize)
    -> PepsResult<(nd::Array3<f64>, nd::Array3<f64>)>
{
    let regrouped: nd::Array2<f64>
        = nd::Array2::from_shape_fn((d * d, d * d), |(i, j)| {
            let (s, s_) = (i / d, i % d);
            let (t, t_) = (j / d, j % d);
            gate[[s * d + t, s_ * d + t_]]
        });
    let svd = linalg::svd_truncated(regrouped, None, GATE_SVD_CUTOFF, None)?;
    let dim = svd.rank;
    let (left, right) = svd.split_sqrt();
    let lo = nd::Array3::from_shape_fn((d, dim, d), |(s, k, s_)| left[[s * d + s_, k]]);
    let ro = nd::Array3::from_shape_fn((d, dim, d), |(t, k, t_)| right[[k, t * d + t_]]);
    Ok((lo, ro))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_abs_diff(a: &nd::Array2<f64>, b: &nd::Array2<f64>) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
    }

    #[test]
    fn factors_reproduce_gate() {
        let ham = Hamiltonian::j1j2(2, 0.3);
        let trotter = Trotter::new(&ham, 0.05).unwrap();
        for coupling in [Coupling::Nearest, Coupling::NextNearest] {
            let exact = gate_matrix(&ham, coupling, 0.05).unwrap();
            assert!(max_abs_diff(&trotter.gate(coupling), &exact) < 1e-12);
        }
    }

    #[test]
    fn heisenberg_gate_rank() {
        // exp(-τ S·S) = a 1 + b S·S is a sum of four product terms
        let ham = Hamiltonian::j1j2(2, 0.0);
        let trotter = Trotter::new(&ham, 0.1).unwrap();
        let (lo, ro) = trotter.factors(Coupling::Nearest);
        assert_eq!(lo.dim(), (2, 4, 2));
        assert_eq!(ro.dim(), (2, 4, 2));
    }

    #[test]
    fn zero_coupling_gives_identity() {
        let ham = Hamiltonian::j1j2(2, 0.0);
        let trotter = Trotter::new(&ham, 0.1).unwrap();
        let g = trotter.gate(Coupling::NextNearest);
        assert!(max_abs_diff(&g, &nd::Array2::eye(4)) < 1e-12);
    }
}
