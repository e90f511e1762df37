//! Boundary matrix-product operators.
//!
//! A boundary MPO stands in for the contraction of a block of full rows of the
//! double-layer network. Its site tensors are stored as
//! `(left, ket, bra, right)` arrays, where `ket` and `bra` attach to the
//! vertical bonds of the ket and bra layers just outside the block.

use ndarray as nd;
use crate::{
    error::PepsResult,
    lattice::{ Chain, LTensor, Layer, Leg, site_legs },
    linalg,
    peps::Peps,
};

/// Direction of a canonicalization sweep.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Canonical {
    /// Every site but the last is left-orthonormal.
    Left,
    /// Every site but the first is right-orthonormal.
    Right,
}

/// Which edge row of the lattice a boundary MPO is filled from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    Bottom,
    Top,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryMpo {
    sites: Vec<nd::Array4<f64>>,
}

impl BoundaryMpo {
    /// Boundary of a block containing no rows: every bond has dimension 1 and
    /// every element is 1.
    pub fn unit(lx: usize) -> Self {
        Self { sites: (0..lx).map(|_| nd::Array4::ones((1, 1, 1, 1))).collect() }
    }

    pub fn from_sites(sites: Vec<nd::Array4<f64>>) -> Self { Self { sites } }

    pub fn len(&self) -> usize { self.sites.len() }

    pub fn is_empty(&self) -> bool { self.sites.is_empty() }

    pub fn sites(&self) -> &[nd::Array4<f64>] { &self.sites }

    pub fn site(&self, col: usize) -> &nd::Array4<f64> { &self.sites[col] }

    pub(crate) fn set_site(&mut self, col: usize, site: nd::Array4<f64>) {
        self.sites[col] = site;
    }

    /// Largest auxiliary bond dimension.
    pub fn max_bond(&self) -> usize {
        self.sites.iter().map(|s| s.shape()[3]).max().unwrap_or(1)
    }

    /// Label site `col` with auxiliary bonds from `chain` and open legs on the
    /// vertical bonds of row `bond_row`.
    pub fn labeled(&self, col: usize, chain: Chain, bond_row: isize)
        -> PepsResult<LTensor>
    {
        let c = col as isize;
        let legs = [
            Leg::aux(chain, c - 1),
            Leg::v(bond_row, col, Layer::Ket),
            Leg::v(bond_row, col, Layer::Bra),
            Leg::aux(chain, c),
        ];
        Ok(LTensor::from_array(legs, self.sites[col].clone().into_dyn())?)
    }

    /// Overwrite site `col` from a tensor labeled as in
    /// [`labeled`][Self::labeled].
    pub fn set_labeled(
        &mut self,
        col: usize,
        site: &LTensor,
        chain: Chain,
        bond_row: isize,
    ) -> PepsResult<()>
    {
        let c = col as isize;
        let legs = [
            Leg::aux(chain, c - 1),
            Leg::v(bond_row, col, Layer::Ket),
            Leg::v(bond_row, col, Layer::Bra),
            Leg::aux(chain, c),
        ];
        self.sites[col] = site.to_array(&legs)?.into_dimensionality()?;
        Ok(())
    }

    /// Multiply the whole operator by `x`, spread evenly as `x^(1/Lx)` over
    /// the sites. `x` must be non-negative.
    pub fn scal(&mut self, x: f64) {
        let per_site = x.powf((self.sites.len() as f64).recip());
        self.sites.iter_mut().for_each(|s| { *s *= per_site; });
    }

    /// Exact boundary of a single edge row: `Bottom` contracts row 0, leaving
    /// its upward bonds open; `Top` contracts row `Ly - 1`, leaving its
    /// downward bonds open. Auxiliary bonds are the fused ket-bra horizontal
    /// bonds, of dimension `D²`.
    pub fn fill(peps: &Peps, side: Side) -> PepsResult<Self> {
        let row = match side {
            Side::Bottom => 0,
            Side::Top => peps.ly() - 1,
        };
        let sites: Vec<nd::Array4<f64>>
            = (0..peps.lx())
            .map(|col| {
                let [l, u, r, d, _] = site_legs(row, col, Layer::Ket);
                let (open, closed) = match side {
                    Side::Bottom => (u, d),
                    Side::Top => (d, u),
                };
                let double = peps.ket(row, col)?.contract(&peps.bra(row, col)?)?;
                let order = [
                    l, l.flip_layer(),
                    open, open.flip_layer(),
                    r, r.flip_layer(),
                    closed, closed.flip_layer(),
                ];
                let dims: Vec<usize>
                    = order.iter()
                    .map(|leg| double.dim_of(leg))
                    .collect::<Result<_, _>>()?;
                let arr = double.to_array(&order)?;
                let site: nd::Array4<f64>
                    = arr.into_shape((
                        dims[0] * dims[1],
                        dims[2],
                        dims[3],
                        dims[4] * dims[5] * dims[6] * dims[7],
                    ))?;
                Ok(site)
            })
            .collect::<PepsResult<_>>()?;
        Ok(Self { sites })
    }

    /// Bring the operator into canonical form by a sweep of SVDs, optionally
    /// truncating every bond to `max_rank`.
    pub fn canonicalize(&mut self, dir: Canonical, max_rank: Option<usize>)
        -> PepsResult<()>
    {
        let n = self.sites.len();
        if n < 2 { return Ok(()); }
        match dir {
            Canonical::Right => {
                for col in (1..n).rev() {
                    let (dl, dk, db, dr) = self.sites[col].dim();
                    let mat: nd::Array2<f64>
                        = self.sites[col].as_standard_layout()
                        .into_owned()
                        .into_shape((dl, dk * db * dr))?;
                    let svd = linalg::svd_truncated(mat, max_rank, 0.0, None)?;
                    let rank = svd.rank;
                    let us: nd::Array2<f64>
                        = &svd.u * &svd.s.view().insert_axis(nd::Axis(0));
                    self.sites[col]
                        = crate::tensor::standard_layout(svd.vt)
                        .into_shape((rank, dk, db, dr))?;
                    self.absorb_right_of(col - 1, &us)?;
                }
            },
            Canonical::Left => {
                for col in 0..n - 1 {
                    let (dl, dk, db, dr) = self.sites[col].dim();
                    let mat: nd::Array2<f64>
                        = self.sites[col].as_standard_layout()
                        .into_owned()
                        .into_shape((dl * dk * db, dr))?;
                    let svd = linalg::svd_truncated(mat, max_rank, 0.0, None)?;
                    let rank = svd.rank;
                    let svt = svd.s_vt();
                    self.sites[col]
                        = crate::tensor::standard_layout(svd.u)
                        .into_shape((dl, dk, db, rank))?;
                    self.absorb_left_of(col + 1, &svt)?;
                }
            },
        }
        Ok(())
    }

    /// Multiply `m` into the right bond of site `col`.
    pub(crate) fn absorb_right_of(&mut self, col: usize, m: &nd::Array2<f64>)
        -> PepsResult<()>
    {
        let (dl, dk, db, dr) = self.sites[col].dim();
        let mat: nd::Array2<f64>
            = self.sites[col].as_standard_layout()
            .into_owned()
            .into_shape((dl * dk * db, dr))?;
        let new_dr = m.ncols();
        self.sites[col] = mat.dot(m).into_shape((dl, dk, db, new_dr))?;
        Ok(())
    }

    /// Multiply `m` into the left bond of site `col`.
    pub(crate) fn absorb_left_of(&mut self, col: usize, m: &nd::Array2<f64>)
        -> PepsResult<()>
    {
        let (dl, dk, db, dr) = self.sites[col].dim();
        let mat: nd::Array2<f64>
            = self.sites[col].as_standard_layout()
            .into_owned()
            .into_shape((dl, dk * db * dr))?;
        let new_dl = m.nrows();
        self.sites[col] = m.dot(&mat).into_shape((new_dl, dk, db, dr))?;
        Ok(())
    }

    /// Frobenius inner product with another boundary MPO of the same length
    /// and physical dimensions.
    pub fn dot(&self, other: &Self) -> PepsResult<f64> {
        let edge = |c: isize| LTensor::ones([
            (Leg::aux(Chain::Bottom, c), 1),
            (Leg::aux(Chain::Top, c), 1),
        ]);
        let mut acc = edge(-1)?;
        for col in 0..self.sites.len() {
            acc = acc.contract(&self.labeled(col, Chain::Bottom, 0)?)?
                .contract(&other.labeled(col, Chain::Top, 0)?)?;
        }
        let last = self.sites.len() as isize - 1;
        Ok(acc.contract(&edge(last)?)?.scalar()?)
    }

    /// Frobenius norm.
    pub fn norm(&self) -> PepsResult<f64> { Ok(self.dot(self)?.max(0.0).sqrt()) }

    /// Contract the whole chain into a single tensor. The result has
    /// `2 Lx + 2` legs, so this is only usable on small lattices.
    pub fn to_tensor(&self, chain: Chain, bond_row: isize) -> PepsResult<LTensor> {
        let mut acc = self.labeled(0, chain, bond_row)?;
        for col in 1..self.sites.len() {
            acc = acc.contract(&self.labeled(col, chain, bond_row)?)?;
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{ Rng, SeedableRng, rngs::StdRng };

    fn random_mpo(rng: &mut StdRng, dims: &[(usize, usize, usize, usize)])
        -> BoundaryMpo
    {
        BoundaryMpo::from_sites(
            dims.iter()
                .map(|d| nd::Array4::from_shape_fn(*d, |_| rng.gen_range(-1.0..1.0)))
                .collect()
        )
    }

    #[test]
    fn canonicalization_preserves_operator() {
        let mut rng = StdRng::seed_from_u64(10);
        let mpo = random_mpo(
            &mut rng, &[(1, 2, 2, 3), (3, 2, 2, 4), (4, 2, 2, 2), (2, 2, 2, 1)]);
        let norm2 = mpo.dot(&mpo).unwrap();
        for dir in [Canonical::Left, Canonical::Right] {
            let mut c = mpo.clone();
            c.canonicalize(dir, None).unwrap();
            assert!((c.dot(&mpo).unwrap() - norm2).abs() < 1e-10 * norm2);
            assert!((c.dot(&c).unwrap() - norm2).abs() < 1e-10 * norm2);
        }
    }

    #[test]
    fn right_canonical_sites_are_orthonormal() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut mpo = random_mpo(
            &mut rng, &[(1, 2, 2, 3), (3, 2, 2, 3), (3, 2, 2, 1)]);
        mpo.canonicalize(Canonical::Right, None).unwrap();
        for col in 1..3 {
            let (dl, dk, db, dr) = mpo.site(col).dim();
            let mat = mpo.site(col).clone().into_shape((dl, dk * db * dr)).unwrap();
            let gram = mat.dot(&mat.t());
            for i in 0..dl {
                for j in 0..dl {
                    let target = if i == j { 1.0 } else { 0.0 };
                    assert!((gram[[i, j]] - target).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn scal_multiplies_operator() {
        let mut rng = StdRng::seed_from_u64(12);
        let mpo = random_mpo(&mut rng, &[(1, 2, 2, 2), (2, 2, 2, 2), (2, 2, 2, 1)]);
        let mut scaled = mpo.clone();
        scaled.scal(8.0);
        let ratio = scaled.dot(&mpo).unwrap() / mpo.dot(&mpo).unwrap();
        assert!((ratio - 8.0).abs() < 1e-10);
    }

    #[test]
    fn full_contraction_matches_dot() {
        let mut rng = StdRng::seed_from_u64(14);
        let a = random_mpo(&mut rng, &[(1, 2, 2, 3), (3, 2, 2, 2), (2, 2, 2, 1)]);
        let b = random_mpo(&mut rng, &[(1, 2, 2, 2), (2, 2, 2, 4), (4, 2, 2, 1)]);
        let ta = a.to_tensor(Chain::Bottom, 0).unwrap();
        let tb = b.to_tensor(Chain::Top, 0).unwrap();
        // the dimension-1 edge bonds stay open on both sides
        assert_eq!(ta.rank(), 2 * 3 + 2);
        let close = LTensor::ones([
            (Leg::aux(Chain::Bottom, -1), 1),
            (Leg::aux(Chain::Bottom, 2), 1),
            (Leg::aux(Chain::Top, -1), 1),
            (Leg::aux(Chain::Top, 2), 1),
        ]).unwrap();
        let full = ta.contract(&tb).unwrap().contract(&close).unwrap().scalar().unwrap();
        let via_dot = a.dot(&b).unwrap();
        assert!((full - via_dot).abs() < 1e-10 * via_dot.abs().max(1.0));
    }

    #[test]
    fn fill_has_squared_bonds() {
        let mut rng = StdRng::seed_from_u64(13);
        let peps = Peps::random(3, 3, 2, 2, &mut rng);
        let b = BoundaryMpo::fill(&peps, Side::Bottom).unwrap();
        assert_eq!(b.site(0).dim(), (1, 2, 2, 4));
        assert_eq!(b.site(1).dim(), (4, 2, 2, 4));
        assert_eq!(b.site(2).dim(), (4, 2, 2, 1));
        let t = BoundaryMpo::fill(&peps, Side::Top).unwrap();
        assert_eq!(t.site(1).dim(), (4, 2, 2, 4));
    }
}
