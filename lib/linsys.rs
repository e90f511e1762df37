//! Local least-squares problems for one nearest-neighbour pair.
//!
//! Writing `|Φ⟩` for the state with the pair replaced by its current iterate
//! and `|Ψ⟩` for the state with the gate applied to the pair, the pair update
//! minimizes `‖Φ - Ψ‖²` over one tensor `X` of the pair at a time. With
//! everything but `X` contracted into an effective metric `N` and overlap
//! vector `b`, the minimizer solves `N x = b`.
//!
//! The contractions that do not involve either tensor of the pair are gathered
//! into a [`PairFrame`] once per pair update and reused for every sweep.

use ndarray as nd;
use crate::{
    contractions::{ RowPair, absorb },
    error::{ PepsError, PepsResult },
    lattice::{ Bond, LTensor, Layer, Leg, Pair, virtual_legs },
    linalg,
    peps::Peps,
};

/// The two tensors of a pair after applying one factor of the gate to each.
///
/// Each carries the virtual legs of its site, its (new) physical leg and the
/// internal gate leg that joins them.
#[derive(Clone, Debug)]
pub struct Gated {
    pub lop: LTensor,
    pub rop: LTensor,
}

// factor tensor with legs [new phys, gate, old phys]
fn gate_factor(factor: &nd::Array3<f64>, row: usize, col: usize) -> PepsResult<LTensor> {
    Ok(LTensor::from_array(
        [Leg::phys(row, col), Leg::Gate, Leg::Scratch(0)],
        factor.clone().into_dyn(),
    )?)
}

/// Apply the gate factors `lo` to the first and `ro` to the second site of
/// `pair`.
pub fn apply_gate(
    peps: &Peps,
    pair: &Pair,
    lo: &nd::Array3<f64>,
    ro: &nd::Array3<f64>,
) -> PepsResult<Gated>
{
    let act = |(row, col): (usize, usize), factor: &nd::Array3<f64>| {
        let mut ket = peps.ket(row, col)?;
        ket.relabel(&Leg::phys(row, col), Leg::Scratch(0))?;
        ket.contract(&gate_factor(factor, row, col)?)
            .map_err(PepsError::from)
    };
    Ok(Gated { lop: act(pair.first(), lo)?, rop: act(pair.second(), ro)? })
}

/// Contractions of the strip around a pair that involve neither of its
/// tensors.
#[derive(Clone, Debug)]
pub enum PairFrame {
    /// `frame = L·below·above` at the pair's column, with `right = R`.
    Vertical { frame: LTensor, right: LTensor },
    /// `left = L·below·above·ket·bra` of the other row at the first column,
    /// and `right` the mirror image at the second column.
    Horizontal { left: LTensor, right: LTensor },
}

impl PairFrame {
    /// Frame for the vertical pair in column `col` of `strip`, from the left
    /// operator of `col` and the right operator of `col`.
    pub fn vertical(strip: &RowPair<'_>, col: usize, left: &LTensor, right: &LTensor)
        -> PepsResult<Self>
    {
        let frame = absorb(left, [&strip.below(col)?, &strip.above(col)?])?;
        Ok(Self::Vertical { frame, right: right.clone() })
    }

    /// Frame for the horizontal pair `(row, col)`-`(row, col + 1)` of
    /// `strip`, from the left operator of `col` and the right operator of
    /// `col + 1`.
    pub fn horizontal(
        strip: &RowPair<'_>,
        peps: &Peps,
        row: usize,
        col: usize,
        left: &LTensor,
        right: &LTensor,
    ) -> PepsResult<Self>
    {
        let other = if row == strip.row() { row + 1 } else { strip.row() };
        let left = absorb(
            left,
            [
                &strip.below(col)?,
                &strip.above(col)?,
                &peps.ket(other, col)?,
                &peps.bra(other, col)?,
            ],
        )?;
        let right = absorb(
            right,
            [
                &strip.below(col + 1)?,
                &strip.above(col + 1)?,
                &peps.ket(other, col + 1)?,
                &peps.bra(other, col + 1)?,
            ],
        )?;
        Ok(Self::Horizontal { left, right })
    }

    /// Contract everything except the unknown tensor `X`, with `y_ket` and
    /// `y_bra` standing in for the other tensor of the pair. The result has
    /// the virtual legs of `X` open in both layers, plus whatever extra legs
    /// `y_ket` carries.
    pub fn environment(&self, x_is_first: bool, y_ket: &LTensor, y_bra: &LTensor)
        -> PepsResult<LTensor>
    {
        match self {
            Self::Vertical { frame, right } => absorb(frame, [y_ket, y_bra, right]),
            Self::Horizontal { left, right } => {
                if x_is_first {
                    Ok(left.contract(&absorb(right, [y_ket, y_bra])?)?)
                } else {
                    absorb(left, [y_ket, y_bra, right])
                }
            },
        }
    }

    fn bond(&self) -> Bond {
        match self {
            Self::Vertical { .. } => Bond::Vertical,
            Self::Horizontal { .. } => Bond::Horizontal,
        }
    }
}

/// The normal equations `N x = b` for one tensor of a pair.
#[derive(Clone, Debug)]
pub struct LinSys {
    /// Site of the unknown tensor.
    pub site: (usize, usize),
    /// Effective metric with the unknown's virtual legs in both layers.
    pub n_eff: LTensor,
    /// Overlap with the gated target, with the unknown's bra virtual legs and
    /// its physical leg.
    pub rhs: LTensor,
}

impl LinSys {
    fn legs(&self, layer: Layer) -> [Leg; 4] {
        virtual_legs(self.site.0, self.site.1, layer)
    }

    /// Solve the system for a new ket tensor of the unknown site.
    pub fn solve(&self) -> PepsResult<LTensor> {
        let ket = self.legs(Layer::Ket);
        let bra = self.legs(Layer::Bra);
        let phys = Leg::phys(self.site.0, self.site.1);
        let n_mat = self.n_eff.to_matrix(&bra, &ket)?;
        let rhs_mat = self.rhs.to_matrix(&bra, &[phys])?;
        let x = linalg::solve_symmetric(&n_mat, &rhs_mat, self.site)?;
        let rows: Vec<(Leg, usize)>
            = ket.iter()
            .map(|l| self.n_eff.dim_of(l).map(|dim| (*l, dim)))
            .collect::<Result<_, _>>()?;
        let d = self.rhs.dim_of(&phys)?;
        Ok(LTensor::from_matrix(x, &rows, &[(phys, d)])?)
    }

    /// Value of `xᵀ N x - 2 xᵀ b` for a ket tensor `x` of the unknown site.
    ///
    /// Up to the constant `⟨Ψ|Ψ⟩` this is `‖Φ - Ψ‖²` with `x` in place.
    pub fn cost(&self, x: &LTensor) -> PepsResult<f64> {
        let x_bra = x.clone().map_indices(Leg::flip_layer)?;
        let nx = self.n_eff.contract(x)?;
        let quad = nx.dot(&x_bra)?;
        let lin = self.rhs.dot(&x_bra)?;
        Ok(quad - 2.0 * lin)
    }
}

/// Build the normal equations for the first (`solve_second == false`) or
/// second tensor of `pair`, holding the other at its current value.
pub fn construct_lin_sys(
    frame: &PairFrame,
    pair: &Pair,
    peps: &Peps,
    gated: &Gated,
    solve_second: bool,
) -> PepsResult<LinSys>
{
    if frame.bond() != pair.bond {
        return Err(PepsError::InvalidParams(format!(
            "{:?} frame used for a {:?} pair", frame.bond(), pair.bond)));
    }
    let (x, y) = if solve_second {
        (pair.second(), pair.first())
    } else {
        (pair.first(), pair.second())
    };
    let (x_gated, y_gated) = if solve_second {
        (&gated.rop, &gated.lop)
    } else {
        (&gated.lop, &gated.rop)
    };
    let y_ket = peps.ket(y.0, y.1)?;
    let y_bra = peps.bra(y.0, y.1)?;
    let n_eff = frame.environment(!solve_second, &y_ket, &y_bra)?;
    let rhs = frame.environment(!solve_second, y_gated, &y_bra)?.contract(x_gated)?;
    Ok(LinSys { site: x, n_eff, rhs })
}

/// Normal equations for one tensor of the vertical pair
/// `(row, col)`-`(row + 1, col)`; `solve_upper` selects the upper tensor.
pub fn construct_lin_sys_vertical(
    frame: &PairFrame,
    pair: &Pair,
    peps: &Peps,
    gated: &Gated,
    solve_upper: bool,
) -> PepsResult<LinSys>
{
    if pair.bond != Bond::Vertical {
        return Err(PepsError::InvalidParams(format!(
            "vertical builder used for {:?}", pair)));
    }
    construct_lin_sys(frame, pair, peps, gated, solve_upper)
}

/// Normal equations for one tensor of the horizontal pair
/// `(row, col)`-`(row, col + 1)`; `solve_right` selects the right tensor.
pub fn construct_lin_sys_horizontal(
    frame: &PairFrame,
    pair: &Pair,
    peps: &Peps,
    gated: &Gated,
    solve_right: bool,
) -> PepsResult<LinSys>
{
    if pair.bond != Bond::Horizontal {
        return Err(PepsError::InvalidParams(format!(
            "horizontal builder used for {:?}", pair)));
    }
    construct_lin_sys(frame, pair, peps, gated, solve_right)
}

/// `⟨Φ|Φ⟩ - 2⟨Φ|Ψ⟩` for the current tensors of `pair`.
pub fn cost_function(frame: &PairFrame, pair: &Pair, peps: &Peps, gated: &Gated)
    -> PepsResult<f64>
{
    let sys = construct_lin_sys(frame, pair, peps, gated, false)?;
    let (row, col) = pair.first();
    sys.cost(&peps.ket(row, col)?)
}
