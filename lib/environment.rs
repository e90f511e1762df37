//! Boundary environments above and below every pair of rows.
//!
//! `b[i]` approximates the double-layer contraction of rows `0..=i` and leaves
//! the vertical bonds between rows `i` and `i + 1` open; `t[i]` approximates
//! rows `i + 2..Ly` and leaves the bonds between rows `i + 1` and `i + 2`
//! open. Both chains have `Ly - 2` entries, so that the pair of rows
//! `(r, r + 1)` sits between `b[r - 1]` and `t[r]`, with the unit boundary
//! standing in at the lattice edges.
//!
//! Each boundary is built from its neighbour by absorbing one row and
//! compressing back to bond dimension `D_aux`: a truncated SVD sweep gives the
//! initial guess, which is refined by one-site variational sweeps that
//! minimize `‖a - target‖²`.

use log::{ debug, log_enabled, Level };
use ndarray as nd;
use crate::{
    error::{ PepsError, PepsResult },
    lattice::{ Chain, LTensor, Layer, Leg },
    linalg,
    mpo::{ BoundaryMpo, Canonical, Side },
    peps::Peps,
    tensor::standard_layout,
};

/// Which boundary chains to recompute.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EnvOption {
    Bottom,
    Top,
    All,
}

/// Compression parameters for absorbing a row into a boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Compressor {
    /// Maximum auxiliary bond dimension.
    pub d_aux: usize,
    /// Number of variational sweeps after the SVD initialization.
    pub comp_sweeps: usize,
}

// labels of one row-absorption problem
#[derive(Copy, Clone, Debug)]
struct RowGeometry {
    lx: usize,
    prow: usize,
    chain: Chain,
    old_bond: isize,
    new_bond: isize,
}

impl RowGeometry {
    fn new(lx: usize, side: Side, prow: usize) -> Self {
        let p = prow as isize;
        match side {
            Side::Bottom => Self {
                lx, prow, chain: Chain::Bottom, old_bond: p - 1, new_bond: p,
            },
            Side::Top => Self {
                lx, prow, chain: Chain::Top, old_bond: p, new_bond: p - 1,
            },
        }
    }

    fn fit_legs(&self, col: usize) -> [Leg; 4] {
        let c = col as isize;
        [
            Leg::aux(Chain::Fit, c - 1),
            Leg::v(self.new_bond, col, Layer::Ket),
            Leg::v(self.new_bond, col, Layer::Bra),
            Leg::aux(Chain::Fit, c),
        ]
    }

    // open legs on the left side of column `col`
    fn left_edge(&self) -> PepsResult<LTensor> {
        Ok(LTensor::ones([
            (Leg::aux(self.chain, -1), 1),
            (Leg::h(self.prow, -1, Layer::Ket), 1),
            (Leg::h(self.prow, -1, Layer::Bra), 1),
            (Leg::aux(Chain::Fit, -1), 1),
        ])?)
    }

    fn right_edge(&self) -> PepsResult<LTensor> {
        let c = self.lx as isize - 1;
        Ok(LTensor::ones([
            (Leg::aux(self.chain, c), 1),
            (Leg::h(self.prow, c, Layer::Ket), 1),
            (Leg::h(self.prow, c, Layer::Bra), 1),
            (Leg::aux(Chain::Fit, c), 1),
        ])?)
    }
}

impl Compressor {
    /// Absorb row `prow` of `peps` into `old` and compress the result.
    ///
    /// For `Side::Bottom`, `old` must leave the bonds below `prow` open and the
    /// result leaves the bonds above it open; `Side::Top` is the mirror image.
    pub fn add_row(&self, peps: &Peps, old: &BoundaryMpo, side: Side, prow: usize)
        -> PepsResult<BoundaryMpo>
    {
        let trace = log_enabled!(Level::Debug);
        let (fit, costs) = self.fit_row(peps, old, side, prow, trace)?;
        if trace {
            debug!(
                "compress {:?} row {}: cost per sweep {:?}, max bond {}",
                side, prow, costs, fit.max_bond(),
            );
        }
        Ok(fit)
    }

    /// Like [`add_row`][Self::add_row], but also return the fitting cost
    /// `⟨a|a⟩ - 2⟨target|a⟩` after the SVD initialization and after every
    /// sweep.
    pub fn add_row_traced(
        &self,
        peps: &Peps,
        old: &BoundaryMpo,
        side: Side,
        prow: usize,
    ) -> PepsResult<(BoundaryMpo, Vec<f64>)>
    {
        self.fit_row(peps, old, side, prow, true)
    }

    fn fit_row(
        &self,
        peps: &Peps,
        old: &BoundaryMpo,
        side: Side,
        prow: usize,
        trace: bool,
    ) -> PepsResult<(BoundaryMpo, Vec<f64>)>
    {
        let geom = RowGeometry::new(peps.lx(), side, prow);
        let targets: Vec<LTensor>
            = (0..geom.lx)
            .map(|col| {
                old.labeled(col, geom.chain, geom.old_bond)?
                    .contract(&peps.ket(prow, col)?)?
                    .contract(&peps.bra(prow, col)?)
                    .map_err(PepsError::from)
            })
            .collect::<PepsResult<_>>()?;

        let mut costs: Vec<f64> = Vec::new();
        let mut fit = self.init_svd(&geom, &targets)?;
        if trace { costs.push(cost_function(&geom, &targets, &fit)?); }
        for _ in 0..self.comp_sweeps {
            self.sweep(&geom, &targets, &mut fit)?;
            if trace { costs.push(cost_function(&geom, &targets, &fit)?); }
        }

        let nrm: f64 = fit.site(0).iter().map(|x| x * x).sum::<f64>().sqrt();
        if nrm > 0.0 {
            let mut site0 = fit.site(0).clone();
            site0 /= nrm;
            fit.set_site(0, site0);
            fit.scal(nrm);
        }
        Ok((fit, costs))
    }

    // left-to-right truncated SVDs of the exact absorbed row, then a
    // right-canonicalizing sweep
    fn init_svd(&self, geom: &RowGeometry, targets: &[LTensor])
        -> PepsResult<BoundaryMpo>
    {
        let mut sites: Vec<nd::Array4<f64>> = Vec::with_capacity(geom.lx);
        let mut carry = LTensor::ones([
            (Leg::aux(Chain::Fit, -1), 1),
            (Leg::aux(geom.chain, -1), 1),
            (Leg::h(geom.prow, -1, Layer::Ket), 1),
            (Leg::h(geom.prow, -1, Layer::Bra), 1),
        ])?;
        for (col, x) in targets.iter().enumerate() {
            let c = col as isize;
            let m = carry.contract(x)?;
            let [fl, vk, vb, _] = geom.fit_legs(col);
            let rows = [fl, vk, vb];
            let cols = [
                Leg::aux(geom.chain, c),
                Leg::h(geom.prow, c, Layer::Ket),
                Leg::h(geom.prow, c, Layer::Bra),
            ];
            let rdims: Vec<usize>
                = rows.iter().map(|l| m.dim_of(l)).collect::<Result<_, _>>()?;
            let cdims: Vec<usize>
                = cols.iter().map(|l| m.dim_of(l)).collect::<Result<_, _>>()?;
            let mat = m.to_matrix(&rows, &cols)?;
            if col + 1 < geom.lx {
                let svd = linalg::svd_truncated(mat, Some(self.d_aux), 0.0, None)?;
                let rank = svd.rank;
                let svt = svd.s_vt();
                sites.push(
                    standard_layout(svd.u)
                        .into_shape((rdims[0], rdims[1], rdims[2], rank))?
                );
                let col_legs: Vec<(Leg, usize)>
                    = cols.iter().copied().zip(cdims.iter().copied()).collect();
                carry = LTensor::from_matrix(
                    svt, &[(Leg::aux(Chain::Fit, c), rank)], &col_legs)?;
            } else {
                let n: usize = cdims.iter().product();
                sites.push(mat.into_shape((rdims[0], rdims[1], rdims[2], n))?);
            }
        }
        let mut fit = BoundaryMpo::from_sites(sites);
        fit.canonicalize(Canonical::Right, Some(self.d_aux))?;
        Ok(fit)
    }

    // one right pass (QR) and one left pass (LQ) of one-site projections;
    // `fit` must be right-canonical on entry
    fn sweep(&self, geom: &RowGeometry, targets: &[LTensor], fit: &mut BoundaryMpo)
        -> PepsResult<()>
    {
        let lx = geom.lx;
        let right_edge = geom.right_edge()?;
        let mut lenv: Vec<LTensor> = vec![geom.left_edge()?; lx + 1];
        let mut renv: Vec<LTensor> = vec![right_edge; lx + 1];
        for col in (1..lx).rev() {
            renv[col] = absorb_column(&renv[col + 1], &targets[col], fit, geom, col)?;
        }

        for col in 0..lx.saturating_sub(1) {
            let site = project(&lenv[col], &targets[col], &renv[col + 1])?;
            let legs = geom.fit_legs(col);
            let dims: Vec<usize>
                = legs.iter().map(|l| site.dim_of(l)).collect::<Result<_, _>>()?;
            let mat = site.to_matrix(&legs[..3], &legs[3..])?;
            let (q, r) = linalg::qr(&mat)?;
            let k = q.ncols();
            fit.set_site(
                col,
                standard_layout(q).into_shape((dims[0], dims[1], dims[2], k))?,
            );
            fit.absorb_left_of(col + 1, &r)?;
            lenv[col + 1] = absorb_column(&lenv[col], &targets[col], fit, geom, col)?;
        }

        for col in (1..lx).rev() {
            let site = project(&lenv[col], &targets[col], &renv[col + 1])?;
            let legs = geom.fit_legs(col);
            let dims: Vec<usize>
                = legs.iter().map(|l| site.dim_of(l)).collect::<Result<_, _>>()?;
            let mat = site.to_matrix(&legs[..1], &legs[1..])?;
            let (l, q) = linalg::lq(&mat)?;
            let k = q.nrows();
            fit.set_site(
                col,
                standard_layout(q).into_shape((k, dims[1], dims[2], dims[3]))?,
            );
            fit.absorb_right_of(col - 1, &l)?;
            renv[col] = absorb_column(&renv[col + 1], &targets[col], fit, geom, col)?;
        }

        // sites 1.. are right-orthonormal again, so the projection is exact
        let site = project(&lenv[0], &targets[0], &renv[1])?;
        fit.set_labeled(0, &site, Chain::Fit, geom.new_bond)?;
        Ok(())
    }

    /// Build a whole chain from scratch. `Side::Bottom` returns `b`,
    /// `Side::Top` returns `t`.
    pub fn build_chain(&self, peps: &Peps, side: Side) -> PepsResult<Vec<BoundaryMpo>> {
        let ly = peps.ly();
        let n = ly.saturating_sub(2);
        let mut chain: Vec<BoundaryMpo> = Vec::with_capacity(n);
        if n == 0 { return Ok(chain); }
        let mut edge = BoundaryMpo::fill(peps, side)?;
        edge.canonicalize(Canonical::Right, None)?;
        chain.push(edge);
        match side {
            Side::Bottom => {
                for row in 1..n {
                    let next = self.add_row(peps, &chain[row - 1], side, row)?;
                    chain.push(next);
                }
            },
            Side::Top => {
                // built from t[Ly-3] downward, stored in reverse until done
                for row in (0..n - 1).rev() {
                    let prev = &chain[chain.len() - 1];
                    let next = self.add_row(peps, prev, side, row + 2)?;
                    chain.push(next);
                }
                chain.reverse();
            },
        }
        Ok(chain)
    }
}

// lenv[col] · x[col] · renv[col + 1]
fn project(lenv: &LTensor, target: &LTensor, renv: &LTensor) -> PepsResult<LTensor> {
    Ok(lenv.contract(target)?.contract(renv)?)
}

// extend a left (or right) overlap environment by column `col`
fn absorb_column(
    env: &LTensor,
    target: &LTensor,
    fit: &BoundaryMpo,
    geom: &RowGeometry,
    col: usize,
) -> PepsResult<LTensor>
{
    Ok(
        env.contract(target)?
            .contract(&fit.labeled(col, Chain::Fit, geom.new_bond)?)?
    )
}

// ⟨a|a⟩ - 2⟨target|a⟩, evaluated exactly
fn cost_function(geom: &RowGeometry, targets: &[LTensor], fit: &BoundaryMpo)
    -> PepsResult<f64>
{
    let aa = fit.dot(fit)?;
    let mut acc = geom.left_edge()?;
    for (col, x) in targets.iter().enumerate() {
        acc = absorb_column(&acc, x, fit, geom, col)?;
    }
    let ta = acc.contract(&geom.right_edge()?)?.scalar()?;
    Ok(aa - 2.0 * ta)
}

/// Boundary environments for every row pair.
#[derive(Clone, Debug)]
pub struct Environment {
    lx: usize,
    ly: usize,
    compressor: Compressor,
    b: Vec<BoundaryMpo>,
    t: Vec<BoundaryMpo>,
    unit: BoundaryMpo,
}

impl Environment {
    /// Create an environment with every boundary set to the unit boundary;
    /// call [`calc`][Self::calc] before use.
    pub fn new(lx: usize, ly: usize, d_aux: usize, comp_sweeps: usize) -> Self {
        let n = ly.saturating_sub(2);
        let unit = BoundaryMpo::unit(lx);
        Self {
            lx,
            ly,
            compressor: Compressor { d_aux, comp_sweeps },
            b: vec![unit.clone(); n],
            t: vec![unit.clone(); n],
            unit,
        }
    }

    /// Recompute the bottom chain, the top chain, or both. `All` computes the
    /// two chains concurrently.
    pub fn calc(&mut self, opt: EnvOption, peps: &Peps) -> PepsResult<()> {
        self.check_lattice(peps)?;
        let comp = self.compressor;
        match opt {
            EnvOption::Bottom => {
                self.b = comp.build_chain(peps, Side::Bottom)?;
            },
            EnvOption::Top => {
                self.t = comp.build_chain(peps, Side::Top)?;
            },
            EnvOption::All => {
                let (b, t) = rayon::join(
                    || comp.build_chain(peps, Side::Bottom),
                    || comp.build_chain(peps, Side::Top),
                );
                self.b = b?;
                self.t = t?;
            },
        }
        Ok(())
    }

    /// Recompute a single boundary from its neighbour: `b[row]` from
    /// `b[row - 1]` and row `row`, or `t[row]` from `t[row + 1]` and row
    /// `row + 2`. The boundaries at the ends of each chain are refilled
    /// exactly from the edge rows.
    pub fn add_layer(&mut self, side: Side, row: usize, peps: &Peps) -> PepsResult<()> {
        self.check_lattice(peps)?;
        let n = self.b.len();
        if row >= n {
            return Err(PepsError::InvalidParams(format!(
                "boundary index {} out of range for {} rows", row, self.ly)));
        }
        let comp = self.compressor;
        match side {
            Side::Bottom => {
                self.b[row] = if row == 0 {
                    let mut edge = BoundaryMpo::fill(peps, side)?;
                    edge.canonicalize(Canonical::Right, None)?;
                    edge
                } else {
                    comp.add_row(peps, &self.b[row - 1], side, row)?
                };
            },
            Side::Top => {
                self.t[row] = if row + 1 == n {
                    let mut edge = BoundaryMpo::fill(peps, side)?;
                    edge.canonicalize(Canonical::Right, None)?;
                    edge
                } else {
                    comp.add_row(peps, &self.t[row + 1], side, row + 2)?
                };
            },
        }
        Ok(())
    }

    fn check_lattice(&self, peps: &Peps) -> PepsResult<()> {
        if peps.lx() != self.lx || peps.ly() != self.ly {
            return Err(PepsError::InvalidParams(format!(
                "environment for {}x{} lattice used with {}x{} state",
                self.lx, self.ly, peps.lx(), peps.ly(),
            )));
        }
        Ok(())
    }

    /// Bottom boundary `b[i]`.
    pub fn gb(&self, i: usize) -> &BoundaryMpo { &self.b[i] }

    /// Top boundary `t[i]`.
    pub fn gt(&self, i: usize) -> &BoundaryMpo { &self.t[i] }

    /// Boundary below the row pair `(row, row + 1)`.
    pub fn below(&self, row: usize) -> &BoundaryMpo {
        if row == 0 { &self.unit } else { &self.b[row - 1] }
    }

    /// Boundary above the row pair `(row, row + 1)`.
    pub fn above(&self, row: usize) -> &BoundaryMpo {
        if row + 2 >= self.ly { &self.unit } else { &self.t[row] }
    }

    /// Return `b[i + 1] · t[i]` for every cut where both exist. For a converged
    /// environment every entry approximates `⟨Ψ|Ψ⟩`.
    pub fn consistency(&self) -> PepsResult<Vec<f64>> {
        (0..self.b.len().saturating_sub(1))
            .map(|i| self.b[i + 1].dot(&self.t[i]))
            .collect()
    }
}
