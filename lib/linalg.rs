//! Dense linear algebra on real matrices, backed by LAPACK through
//! `ndarray-linalg`.

use ndarray as nd;
use ndarray_linalg::{
    Eigh,
    FactorizeHInto,
    QR,
    SVDInto,
    SolveH,
    UPLO,
};
use crate::error::{ PepsError, PepsResult };

/// Truncated singular value decomposition `q ≈ u · diag(s) · vt`.
#[derive(Clone, Debug)]
pub struct Svd {
    pub u: nd::Array2<f64>,
    pub s: nd::Array1<f64>,
    pub vt: nd::Array2<f64>,
    /// Number of retained singular values, including zero padding.
    pub rank: usize,
}

impl Svd {
    /// Split the decomposition symmetrically, returning `(u √s, √s vt)`.
    pub fn split_sqrt(self) -> (nd::Array2<f64>, nd::Array2<f64>) {
        let Svd { mut u, s, mut vt, .. } = self;
        let sqrt_s = s.mapv(f64::sqrt);
        u.axis_iter_mut(nd::Axis(1))
            .zip(&sqrt_s)
            .for_each(|(mut uk, sk)| { uk.map_inplace(|x| { *x *= sk; }); });
        vt.axis_iter_mut(nd::Axis(0))
            .zip(&sqrt_s)
            .for_each(|(mut vk, sk)| { vk.map_inplace(|x| { *x *= sk; }); });
        (u, vt)
    }

    /// Return `diag(s) · vt`.
    pub fn s_vt(&self) -> nd::Array2<f64> {
        let mut svt = self.vt.clone();
        svt.axis_iter_mut(nd::Axis(0))
            .zip(&self.s)
            .for_each(|(mut vk, sk)| { vk.map_inplace(|x| { *x *= sk; }); });
        svt
    }
}

/// Singular value decomposition of `q`, keeping singular values strictly
/// greater than `cutoff`, at most `max_rank` of them.
///
/// If `pad_to` is given and fewer singular values survive, the factors are
/// extended with zero columns/rows (and zero singular values) up to that rank,
/// so that the caller always receives a bond of the requested dimension.
pub fn svd_truncated(
    q: nd::Array2<f64>,
    max_rank: Option<usize>,
    cutoff: f64,
    pad_to: Option<usize>,
) -> PepsResult<Svd>
{
    let (m, n) = q.dim();
    let (Some(u), s, Some(vt)) = q.svd_into(true, true)?
        else { return Err(PepsError::MissingSingularVectors); };
    let mut rank = s.iter().take_while(|sk| **sk > cutoff).count();
    if let Some(max) = max_rank { rank = rank.min(max); }
    let target = pad_to.map(|p| p.max(rank)).unwrap_or(rank).max(1);

    let mut u_out: nd::Array2<f64> = nd::Array2::zeros((m, target));
    let mut s_out: nd::Array1<f64> = nd::Array1::zeros(target);
    let mut vt_out: nd::Array2<f64> = nd::Array2::zeros((target, n));
    u_out.slice_mut(nd::s![.., ..rank]).assign(&u.slice(nd::s![.., ..rank]));
    s_out.slice_mut(nd::s![..rank]).assign(&s.slice(nd::s![..rank]));
    vt_out.slice_mut(nd::s![..rank, ..]).assign(&vt.slice(nd::s![..rank, ..]));
    Ok(Svd { u: u_out, s: s_out, vt: vt_out, rank: target })
}

/// Reduced QR decomposition `a = q · r` with `q` having orthonormal columns.
pub fn qr(a: &nd::Array2<f64>) -> PepsResult<(nd::Array2<f64>, nd::Array2<f64>)>
{
    let (q, r) = a.qr()?;
    Ok((q, r))
}

/// Reduced LQ decomposition `a = l · q` with `q` having orthonormal rows,
/// computed from the QR decomposition of `aᵀ`.
pub fn lq(a: &nd::Array2<f64>) -> PepsResult<(nd::Array2<f64>, nd::Array2<f64>)>
{
    let (q, r) = a.t().qr()?;
    Ok((r.reversed_axes(), q.reversed_axes()))
}

/// Eigendecomposition of a real symmetric matrix, reading the upper triangle.
///
/// Eigenvalues are returned in ascending order with eigenvectors as columns.
pub fn eigh(a: &nd::Array2<f64>) -> PepsResult<(nd::Array1<f64>, nd::Array2<f64>)>
{
    Ok(a.eigh(UPLO::Upper)?)
}

/// Solve `n · x = b` for every column of `b`, where `n` is symmetric but
/// possibly indefinite.
///
/// `n` is symmetrized as `(n + nᵀ) / 2` before a Bunch-Kaufman factorization;
/// the factorization is computed once and reused for every right-hand side.
/// The `site` coordinates are only used to report a singular system, which is
/// detected as a non-finite solution.
pub fn solve_symmetric(
    n: &nd::Array2<f64>,
    b: &nd::Array2<f64>,
    site: (usize, usize),
) -> PepsResult<nd::Array2<f64>>
{
    let sym: nd::Array2<f64> = (n + &n.t()) * 0.5;
    let factorized = sym.factorizeh_into()?;
    let mut x: nd::Array2<f64> = nd::Array2::zeros(b.raw_dim());
    for (j, bj) in b.columns().into_iter().enumerate() {
        let xj = factorized.solveh(&bj)?;
        x.column_mut(j).assign(&xj);
    }
    if x.iter().all(|xk| xk.is_finite()) {
        Ok(x)
    } else {
        Err(PepsError::SingularSystem { row: site.0, col: site.1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn max_abs_diff(a: &nd::Array2<f64>, b: &nd::Array2<f64>) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
    }

    #[test]
    fn svd_reconstructs() {
        let q = array![[1.0, 2.0, 0.5], [0.0, -1.0, 3.0], [2.0, 1.0, 1.0]];
        let svd = svd_truncated(q.clone(), None, 1e-15, None).unwrap();
        assert_eq!(svd.rank, 3);
        let rec = svd.u.dot(&svd.s_vt());
        assert!(max_abs_diff(&rec, &q) < 1e-12);
        let (l, r) = svd.split_sqrt();
        assert!(max_abs_diff(&l.dot(&r), &q) < 1e-12);
    }

    #[test]
    fn svd_pads_with_zeros() {
        // rank one
        let q = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let svd = svd_truncated(q.clone(), Some(2), 1e-12, Some(2)).unwrap();
        assert_eq!(svd.rank, 2);
        assert_eq!(svd.u.dim(), (3, 2));
        assert_eq!(svd.vt.dim(), (2, 2));
        assert_eq!(svd.s[1], 0.0);
        assert!(max_abs_diff(&svd.u.dot(&svd.s_vt()), &q) < 1e-12);
    }

    #[test]
    fn svd_truncation_limits_rank() {
        let q = array![[3.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 1.0]];
        let svd = svd_truncated(q, Some(2), 0.0, None).unwrap();
        assert_eq!(svd.rank, 2);
        assert!((svd.s[0] - 3.0).abs() < 1e-12);
        assert!((svd.s[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn qr_and_lq() {
        let a = array![[1.0, 2.0], [3.0, 4.0], [5.0, 7.0]];
        let (q, r) = qr(&a).unwrap();
        assert_eq!(q.dim(), (3, 2));
        assert!(max_abs_diff(&q.dot(&r), &a) < 1e-12);
        assert!(max_abs_diff(&q.t().dot(&q), &nd::Array2::eye(2)) < 1e-12);

        let b = a.t().to_owned();
        let (l, q) = lq(&b).unwrap();
        assert_eq!(q.dim(), (2, 3));
        assert!(max_abs_diff(&l.dot(&q), &b) < 1e-12);
        assert!(max_abs_diff(&q.dot(&q.t()), &nd::Array2::eye(2)) < 1e-12);
    }

    #[test]
    fn indefinite_solve() {
        let n = array![[1.0, 2.0, 0.0], [2.0, -1.0, 1.0], [0.0, 1.0, 3.0]];
        let b = array![[1.0, 0.0], [0.0, 1.0], [2.0, -1.0]];
        let x = solve_symmetric(&n, &b, (0, 0)).unwrap();
        assert!(max_abs_diff(&n.dot(&x), &b) < 1e-10);
    }

    #[test]
    fn singular_solve_is_an_error() {
        // Bunch-Kaufman hits an exact zero pivot on both of these
        let rank_one = array![[1.0, 1.0], [1.0, 1.0]];
        let zero_line = array![[2.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let cases = [
            (rank_one, array![[1.0], [1.0]]),
            (zero_line, array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]),
        ];
        for (n, b) in cases {
            match solve_symmetric(&n, &b, (2, 3)) {
                Err(PepsError::SingularSystem { row, col }) => {
                    assert_eq!((row, col), (2, 3));
                },
                Err(PepsError::Linalg(_)) => { },
                other => panic!("expected a singular-system error, got {:?}", other),
            }
        }
    }

    #[test]
    fn eigh_ascending() {
        let a = array![[2.0, 1.0], [1.0, 2.0]];
        let (e, v) = eigh(&a).unwrap();
        assert!((e[0] - 1.0).abs() < 1e-12);
        assert!((e[1] - 3.0).abs() < 1e-12);
        let rec = v.dot(&nd::Array2::from_diag(&e)).dot(&v.t());
        assert!(max_abs_diff(&rec, &a) < 1e-12);
    }
}
