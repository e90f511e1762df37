//! Norm and energy estimates from the boundary environment.

use rayon::prelude::*;
use crate::{
    contractions::{ RowPair, SiteOp },
    environment::{ EnvOption, Environment },
    error::{ PepsError, PepsResult },
    hamiltonian::{ Coupling, Hamiltonian },
    peps::Peps,
};

/// `⟨Ψ|Ψ⟩`, contracted through the topmost row pair with `b[Ly - 3]` below
/// it. The bottom chain of `env` must be current.
pub fn norm(peps: &Peps, env: &Environment) -> PepsResult<f64> {
    RowPair::new(env, peps.ly() - 2).norm(peps)
}

/// Rebuild the bottom chain of `env` and scale every site so that
/// `⟨Ψ|Ψ⟩ = 1`. Returns the norm before scaling.
pub fn normalize(peps: &mut Peps, env: &mut Environment) -> PepsResult<f64> {
    env.calc(EnvOption::Bottom, peps)?;
    let nrm = norm(peps, env)?;
    if !(nrm.is_finite() && nrm > 0.0) {
        return Err(PepsError::InvalidParams(format!(
            "cannot normalize a state with norm {}", nrm)));
    }
    let n_sites = (peps.lx() * peps.ly()) as f64;
    peps.scal(nrm.powf(-0.5 / n_sites));
    Ok(nrm)
}

/// `⟨Ψ|H|Ψ⟩ / ⟨Ψ|Ψ⟩`, summed over every bond of the lattice.
///
/// Bonds are grouped by the row pair containing them; each pair's terms are
/// divided by that pair's own estimate of `⟨Ψ|Ψ⟩`. Both chains of `env` must
/// be current.
pub fn energy(peps: &Peps, env: &Environment, ham: &Hamiltonian) -> PepsResult<f64> {
    let ly = peps.ly();
    (0..ly - 1)
        .map(|row| row_pair_energy(&RowPair::new(env, row), peps, ham, row + 2 == ly))
        .sum()
}

// vertical bonds between the two rows, horizontal bonds of the lower row (and
// of the upper row for the topmost pair) and, with J2 ≠ 0, both diagonals of
// every plaquette
fn row_pair_energy(
    strip: &RowPair<'_>,
    peps: &Peps,
    ham: &Hamiltonian,
    include_upper_row: bool,
) -> PepsResult<f64>
{
    let lx = peps.lx();
    let (r0, r1) = (strip.row(), strip.row() + 1);
    let lefts = strip.left_operators(peps)?;
    let rights = strip.right_operators(peps)?;
    let nrm = strip.window(peps, &lefts[0], &rights[lx - 1], 0, lx - 1, &[])?;
    let mut h_rows = vec![r0];
    if include_upper_row { h_rows.push(r1); }
    let with_nn = ham.has_next_nearest();

    let per_column: Vec<f64>
        = (0..lx).into_par_iter()
        .map(|col| -> PepsResult<f64> {
            let mut acc = 0.0;
            for term in ham.terms() {
                let (a, b) = (&term.left, &term.right);
                let cn = term.coef(Coupling::Nearest);
                if cn != 0.0 {
                    let ops: [SiteOp<'_>; 2] = [((r0, col), a), ((r1, col), b)];
                    acc += cn * strip.window(
                        peps, &lefts[col], &rights[col], col, col, &ops)?;
                    if col + 1 < lx {
                        for &row in h_rows.iter() {
                            let ops: [SiteOp<'_>; 2]
                                = [((row, col), a), ((row, col + 1), b)];
                            acc += cn * strip.window(
                                peps, &lefts[col], &rights[col + 1], col, col + 1, &ops)?;
                        }
                    }
                }
                let cnn = term.coef(Coupling::NextNearest);
                if with_nn && cnn != 0.0 && col + 1 < lx {
                    let up: [SiteOp<'_>; 2] = [((r0, col), a), ((r1, col + 1), b)];
                    let down: [SiteOp<'_>; 2] = [((r1, col), a), ((r0, col + 1), b)];
                    for ops in [up, down] {
                        acc += cnn * strip.window(
                            peps, &lefts[col], &rights[col + 1], col, col + 1, &ops)?;
                    }
                }
            }
            Ok(acc)
        })
        .collect::<PepsResult<_>>()?;
    Ok(per_column.iter().sum::<f64>() / nrm)
}
