//! Contractions of the strip made of two adjacent rows sandwiched between a
//! bottom and a top boundary.
//!
//! A side operator at column boundary `c` (between columns `c` and `c + 1`)
//! carries six legs: the bottom boundary bond, the ket and bra horizontal
//! bonds of both rows, and the top boundary bond. The left operator `L[c]`
//! contracts every column `< c`, the right operator `R[c]` every column `> c`;
//! both start from all-ones edge tensors on dimension-1 legs.

use ndarray as nd;
use crate::{
    environment::Environment,
    error::PepsResult,
    lattice::{ Chain, LTensor, Layer, Leg },
    mpo::BoundaryMpo,
    peps::Peps,
};

/// Operator inserted on the ket layer of a single site.
pub type SiteOp<'o> = ((usize, usize), &'o nd::Array2<f64>);

/// Fold `parts` into `env` one contraction at a time, in order.
pub fn absorb<'t, I>(env: &LTensor, parts: I) -> PepsResult<LTensor>
where I: IntoIterator<Item = &'t LTensor>
{
    let mut iter = parts.into_iter();
    let mut acc = match iter.next() {
        Some(first) => env.contract(first)?,
        None => return Ok(env.clone()),
    };
    for part in iter {
        acc = acc.contract(part)?;
    }
    Ok(acc)
}

/// Apply `op` to the physical leg of a ket site tensor:
/// `new(s) = Σ_s' op(s, s') old(s')`.
pub fn apply_site_op(ket: &LTensor, op: &nd::Array2<f64>, row: usize, col: usize)
    -> PepsResult<LTensor>
{
    let phys = Leg::phys(row, col);
    let mut shifted = ket.clone();
    shifted.relabel(&phys, Leg::Scratch(0))?;
    let op = LTensor::from_array([phys, Leg::Scratch(0)], op.clone().into_dyn())?;
    Ok(shifted.contract(&op)?)
}

/// The pair of rows `(row, row + 1)` together with the boundaries around it.
#[derive(Copy, Clone, Debug)]
pub struct RowPair<'a> {
    row: usize,
    below: &'a BoundaryMpo,
    above: &'a BoundaryMpo,
}

impl<'a> RowPair<'a> {
    pub fn new(env: &'a Environment, row: usize) -> Self {
        Self { row, below: env.below(row), above: env.above(row) }
    }

    pub fn from_boundaries(row: usize, below: &'a BoundaryMpo, above: &'a BoundaryMpo)
        -> Self
    {
        Self { row, below, above }
    }

    /// Lower row of the pair.
    pub fn row(&self) -> usize { self.row }

    /// Lattice width.
    pub fn lx(&self) -> usize { self.below.len() }

    /// Site `col` of the bottom boundary.
    pub fn below(&self, col: usize) -> PepsResult<LTensor> {
        self.below.labeled(col, Chain::Bottom, self.row as isize - 1)
    }

    /// Site `col` of the top boundary.
    pub fn above(&self, col: usize) -> PepsResult<LTensor> {
        self.above.labeled(col, Chain::Top, self.row as isize + 1)
    }

    fn edge(&self, c: isize) -> PepsResult<LTensor> {
        let (r0, r1) = (self.row, self.row + 1);
        Ok(LTensor::ones([
            (Leg::aux(Chain::Bottom, c), 1),
            (Leg::h(r0, c, Layer::Ket), 1),
            (Leg::h(r0, c, Layer::Bra), 1),
            (Leg::h(r1, c, Layer::Ket), 1),
            (Leg::h(r1, c, Layer::Bra), 1),
            (Leg::aux(Chain::Top, c), 1),
        ])?)
    }

    /// Left operator of column 0.
    pub fn left_edge(&self) -> PepsResult<LTensor> { self.edge(-1) }

    /// Right operator of column `Lx - 1`.
    pub fn right_edge(&self) -> PepsResult<LTensor> {
        self.edge(self.lx() as isize - 1)
    }

    /// All tensors of column `col` in contraction order: bottom boundary, ket
    /// and bra of the lower row, ket and bra of the upper row, top boundary.
    /// Operators in `ops` are applied to the ket copies of their sites.
    pub fn column(&self, peps: &Peps, col: usize, ops: &[SiteOp<'_>])
        -> PepsResult<[LTensor; 6]>
    {
        let ket = |row: usize| -> PepsResult<LTensor> {
            let mut k = peps.ket(row, col)?;
            for ((r, c), op) in ops.iter() {
                if *r == row && *c == col { k = apply_site_op(&k, op, row, col)?; }
            }
            Ok(k)
        };
        let (r0, r1) = (self.row, self.row + 1);
        Ok([
            self.below(col)?,
            ket(r0)?,
            peps.bra(r0, col)?,
            ket(r1)?,
            peps.bra(r1, col)?,
            self.above(col)?,
        ])
    }

    /// Extend a left operator by column `col`, giving the left operator of
    /// column `col + 1`.
    pub fn absorb_left(&self, left: &LTensor, peps: &Peps, col: usize)
        -> PepsResult<LTensor>
    {
        absorb(left, self.column(peps, col, &[])?.iter())
    }

    /// Extend a right operator by column `col`, giving the right operator of
    /// column `col - 1`.
    pub fn absorb_right(&self, right: &LTensor, peps: &Peps, col: usize)
        -> PepsResult<LTensor>
    {
        absorb(right, self.column(peps, col, &[])?.iter())
    }

    /// Left operators `L[c]` for `c` in `0..Lx`.
    pub fn left_operators(&self, peps: &Peps) -> PepsResult<Vec<LTensor>> {
        let lx = self.lx();
        let mut ops: Vec<LTensor> = Vec::with_capacity(lx);
        ops.push(self.left_edge()?);
        for col in 0..lx - 1 {
            let next = self.absorb_left(&ops[col], peps, col)?;
            ops.push(next);
        }
        Ok(ops)
    }

    /// Right operators `R[c]` for `c` in `0..Lx`.
    pub fn right_operators(&self, peps: &Peps) -> PepsResult<Vec<LTensor>> {
        let lx = self.lx();
        let mut ops: Vec<LTensor> = Vec::with_capacity(lx);
        ops.push(self.right_edge()?);
        for col in (1..lx).rev() {
            let next = self.absorb_right(&ops[ops.len() - 1], peps, col)?;
            ops.push(next);
        }
        ops.reverse();
        Ok(ops)
    }

    /// Contract columns `c0..=c1` between `left` (`L[c0]`) and `right`
    /// (`R[c1]`), with operators inserted on the ket layer.
    pub fn window(
        &self,
        peps: &Peps,
        left: &LTensor,
        right: &LTensor,
        c0: usize,
        c1: usize,
        ops: &[SiteOp<'_>],
    ) -> PepsResult<f64>
    {
        let mut acc = left.clone();
        for col in c0..=c1 {
            acc = absorb(&acc, self.column(peps, col, ops)?.iter())?;
        }
        Ok(acc.contract(right)?.scalar()?)
    }

    /// `⟨Ψ|Ψ⟩` as estimated by this strip.
    pub fn norm(&self, peps: &Peps) -> PepsResult<f64> {
        let lx = self.lx();
        let mut acc = self.left_edge()?;
        for col in 0..lx {
            acc = self.absorb_left(&acc, peps, col)?;
        }
        Ok(acc.contract(&self.right_edge()?)?.scalar()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{ SeedableRng, rngs::StdRng };

    #[test]
    fn left_and_right_operators_agree() {
        let mut rng = StdRng::seed_from_u64(20);
        let peps = Peps::random(3, 2, 2, 2, &mut rng);
        let unit = BoundaryMpo::unit(3);
        let rp = RowPair::from_boundaries(0, &unit, &unit);
        let lefts = rp.left_operators(&peps).unwrap();
        let rights = rp.right_operators(&peps).unwrap();
        let total = rp.norm(&peps).unwrap();
        for col in 0..3 {
            let val = rp.window(&peps, &lefts[col], &rights[col], col, col, &[])
                .unwrap();
            assert!((val - total).abs() < 1e-10 * total.abs());
        }
        assert!(total > 0.0);
    }

    #[test]
    fn identity_insertion_is_trivial() {
        let mut rng = StdRng::seed_from_u64(21);
        let peps = Peps::random(2, 2, 2, 2, &mut rng);
        let unit = BoundaryMpo::unit(2);
        let rp = RowPair::from_boundaries(0, &unit, &unit);
        let lefts = rp.left_operators(&peps).unwrap();
        let rights = rp.right_operators(&peps).unwrap();
        let eye: nd::Array2<f64> = nd::Array2::eye(2);
        let with_op = rp.window(&peps, &lefts[0], &rights[1], 0, 1, &[((1, 1), &eye)])
            .unwrap();
        let total = rp.norm(&peps).unwrap();
        assert!((with_op - total).abs() < 1e-10 * total.abs());
    }
}
