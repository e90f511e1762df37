//! Pair updates and the full imaginary-time step.
//!
//! Every pair update goes through the same stages: the gate factors are
//! applied to the two tensors, a truncated SVD of the gated pair gives an
//! initial guess, alternating least-squares sweeps fit the pair to the gated
//! target in the presence of the environment, and a final SVD re-split
//! balances the weight across the shared bond.

use log::{ Level, info, log_enabled, trace };
use crate::{
    context::{ Params, SimulationContext },
    contractions::RowPair,
    environment::EnvOption,
    error::PepsResult,
    hamiltonian::Coupling,
    lattice::{ Bond, LTensor, Layer, Leg, Pair, site_legs },
    linalg,
    linsys::{ self, Gated, LinSys, PairFrame },
    mpo::Side,
    peps::Peps,
    trotter::Trotter,
};

type LinSysBuilder
    = fn(&PairFrame, &Pair, &Peps, &Gated, bool) -> PepsResult<LinSys>;

// labels of a site of the pair other than the shared bond
fn outer_legs(site: (usize, usize), shared: &Leg) -> Vec<Leg> {
    site_legs(site.0, site.1, Layer::Ket)
        .into_iter()
        .filter(|l| l != shared)
        .collect()
}

// SVD-split a two-site tensor back into the pair, keeping the shared bond at
// dimension D
fn split_pair(peps: &mut Peps, pair: &Pair, theta: &LTensor) -> PepsResult<()> {
    let shared = pair.shared_leg(Layer::Ket);
    let (a, b) = (pair.first(), pair.second());
    let rows = outer_legs(a, &shared);
    let cols = outer_legs(b, &shared);
    let dims = |legs: &[Leg]| -> PepsResult<Vec<(Leg, usize)>> {
        legs.iter()
            .map(|l| Ok((*l, theta.dim_of(l)?)))
            .collect()
    };
    let (row_dims, col_dims) = (dims(&rows)?, dims(&cols)?);
    let bond = peps.bond();
    let mat = theta.to_matrix(&rows, &cols)?;
    let svd = linalg::svd_truncated(mat, Some(bond), 0.0, Some(bond))?;
    let (left, right) = svd.split_sqrt();
    let new_a = LTensor::from_matrix(left, &row_dims, &[(shared, bond)])?;
    let new_b = LTensor::from_matrix(right, &[(shared, bond)], &col_dims)?;
    peps.set_ket(a.0, a.1, &new_a)?;
    peps.set_ket(b.0, b.1, &new_b)?;
    Ok(())
}

/// Replace the pair by the truncated SVD of the gated pair, contracted over
/// the gate leg and the shared bond.
pub fn initial_guess(peps: &mut Peps, pair: &Pair, gated: &Gated) -> PepsResult<()> {
    let theta = gated.lop.contract(&gated.rop)?;
    split_pair(peps, pair, &theta)
}

/// Re-split the pair by an SVD over the shared bond, leaving the product of
/// the two tensors unchanged and the singular values shared evenly.
pub fn equilibrate(peps: &mut Peps, pair: &Pair) -> PepsResult<()> {
    let (a, b) = (pair.first(), pair.second());
    let theta = peps.ket(a.0, a.1)?.contract(&peps.ket(b.0, b.1)?)?;
    split_pair(peps, pair, &theta)
}

/// Equilibrate the vertical pair `(row, col)`-`(row + 1, col)`.
pub fn equilibrate_vertical(peps: &mut Peps, row: usize, col: usize) -> PepsResult<()> {
    equilibrate(peps, &Pair::vertical(row, col))
}

/// Equilibrate the horizontal pair `(row, col)`-`(row, col + 1)`.
pub fn equilibrate_horizontal(peps: &mut Peps, row: usize, col: usize) -> PepsResult<()> {
    equilibrate(peps, &Pair::horizontal(row, col))
}

/// Run the full gate-fit-equilibrate sequence on one pair.
///
/// Returns the local cost after every sweep when it was evaluated (a
/// convergence tolerance is set, or trace logging is enabled), otherwise an
/// empty vector.
pub fn update_pair(
    frame: &PairFrame,
    pair: &Pair,
    peps: &mut Peps,
    trotter: &Trotter,
    params: &Params,
) -> PepsResult<Vec<f64>>
{
    let (lo, ro) = trotter.factors(Coupling::Nearest);
    let gated = linsys::apply_gate(peps, pair, lo, ro)?;
    initial_guess(peps, pair, &gated)?;

    let build: LinSysBuilder
        = match pair.bond {
            Bond::Vertical => linsys::construct_lin_sys_vertical,
            Bond::Horizontal => linsys::construct_lin_sys_horizontal,
        };
    let track = params.convergence_tol.is_some() || log_enabled!(Level::Trace);
    let mut costs: Vec<f64> = Vec::new();
    if track { costs.push(linsys::cost_function(frame, pair, peps, &gated)?); }
    for iter in 0..params.n_sweeps {
        for solve_second in [false, true] {
            let sys = build(frame, pair, peps, &gated, solve_second)?;
            let x = sys.solve()?;
            peps.set_ket(sys.site.0, sys.site.1, &x)?;
        }
        if track {
            let cost = linsys::cost_function(frame, pair, peps, &gated)?;
            trace!("{:?} sweep {}: cost {:.12e}", pair, iter, cost);
            let prev = costs[costs.len() - 1];
            costs.push(cost);
            if let Some(tol) = params.convergence_tol {
                if (prev - cost).abs() <= tol * cost.abs().max(f64::MIN_POSITIVE) {
                    break;
                }
            }
        }
    }

    equilibrate(peps, pair)?;
    Ok(costs)
}

/// Update the vertical pair in column `col` of `strip`, given the left and
/// right operators of `col`.
pub fn update_vertical(
    strip: &RowPair<'_>,
    peps: &mut Peps,
    col: usize,
    left: &LTensor,
    right: &LTensor,
    trotter: &Trotter,
    params: &Params,
) -> PepsResult<Vec<f64>>
{
    let pair = Pair::vertical(strip.row(), col);
    let frame = PairFrame::vertical(strip, col, left, right)?;
    update_pair(&frame, &pair, peps, trotter, params)
}

/// Update the horizontal pair `(row, col)`-`(row, col + 1)` inside `strip`,
/// given the left operator of `col` and the right operator of `col + 1`.
#[allow(clippy::too_many_arguments)]
pub fn update_horizontal(
    strip: &RowPair<'_>,
    peps: &mut Peps,
    row: usize,
    col: usize,
    left: &LTensor,
    right: &LTensor,
    trotter: &Trotter,
    params: &Params,
) -> PepsResult<Vec<f64>>
{
    let pair = Pair::horizontal(row, col);
    let frame = PairFrame::horizontal(strip, peps, row, col, left, right)?;
    update_pair(&frame, &pair, peps, trotter, params)
}

/// One imaginary-time step: every nearest-neighbour bond of the lattice is
/// updated once.
///
/// Row pairs are processed bottom to top. Within a pair, columns are swept
/// left to right, updating the vertical bond of the column and then the
/// horizontal bond to its right in the lower row (and, for the topmost pair,
/// also in the upper row). The bottom boundary of the next pair is rebuilt
/// after every pair.
pub fn step(peps: &mut Peps, ctx: &mut SimulationContext) -> PepsResult<()> {
    let (lx, ly) = (peps.lx(), peps.ly());
    ctx.env.calc(EnvOption::Top, peps)?;
    for row in 0..ly - 1 {
        {
            let strip = RowPair::new(&ctx.env, row);
            let rights = strip.right_operators(peps)?;
            let mut left = strip.left_edge()?;
            let mut h_rows = vec![row];
            if row + 2 == ly { h_rows.push(row + 1); }
            for col in 0..lx - 1 {
                update_vertical(
                    &strip, peps, col, &left, &rights[col], &ctx.trotter, &ctx.params)?;
                for &h_row in h_rows.iter() {
                    update_horizontal(
                        &strip,
                        peps,
                        h_row,
                        col,
                        &left,
                        &rights[col + 1],
                        &ctx.trotter,
                        &ctx.params,
                    )?;
                }
                left = strip.absorb_left(&left, peps, col)?;
            }
            update_vertical(
                &strip, peps, lx - 1, &left, &rights[lx - 1], &ctx.trotter, &ctx.params)?;
        }
        if row + 2 < ly {
            ctx.env.add_layer(Side::Bottom, row, peps)?;
        }
        info!("step: row pair ({}, {}) done", row, row + 1);
    }
    Ok(())
}
