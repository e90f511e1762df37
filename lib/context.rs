//! Simulation parameters and the objects shared across time steps.

use rand::Rng;
use crate::{
    environment::Environment,
    error::{ PepsError, PepsResult },
    hamiltonian::Hamiltonian,
    peps::Peps,
    trotter::Trotter,
};

/// Parameters of an imaginary-time evolution run.
#[derive(Clone, Debug, PartialEq)]
pub struct Params {
    /// Lattice width.
    pub lx: usize,
    /// Lattice height.
    pub ly: usize,
    /// Physical dimension.
    pub d: usize,
    /// PEPS bond dimension `D`.
    pub bond: usize,
    /// Boundary MPO bond dimension `D_aux`.
    pub d_aux: usize,
    /// Variational sweeps per boundary compression.
    pub comp_sweeps: usize,
    /// ALS sweeps per pair update.
    pub n_sweeps: usize,
    /// Imaginary time step.
    pub tau: f64,
    /// Next-nearest-neighbour coupling.
    pub j2: f64,
    /// Stop the ALS sweeps of a pair early once the relative change of the
    /// local cost drops below this.
    pub convergence_tol: Option<f64>,
}

impl Params {
    /// Parameters for an `l × l` lattice, with the remaining fields at their
    /// defaults: 2 compression sweeps, 10 ALS sweeps, `τ = 0.01`, `J2 = 0`.
    pub fn square(l: usize, d: usize, bond: usize, d_aux: usize) -> Self {
        Self {
            lx: l,
            ly: l,
            d,
            bond,
            d_aux,
            comp_sweeps: 2,
            n_sweeps: 10,
            tau: 0.01,
            j2: 0.0,
            convergence_tol: None,
        }
    }

    pub fn validate(&self) -> PepsResult<()> {
        let fail = |msg: String| Err(PepsError::InvalidParams(msg));
        if self.lx < 2 || self.ly < 2 {
            return fail(format!("lattice must be at least 2x2, got {}x{}", self.lx, self.ly));
        }
        if self.d < 2 {
            return fail(format!("physical dimension must be at least 2, got {}", self.d));
        }
        if self.bond == 0 || self.d_aux == 0 {
            return fail("bond dimensions must be positive".to_string());
        }
        if !(self.tau.is_finite() && self.tau > 0.0) {
            return fail(format!("time step must be positive, got {}", self.tau));
        }
        if !self.j2.is_finite() {
            return fail(format!("J2 must be finite, got {}", self.j2));
        }
        if let Some(tol) = self.convergence_tol {
            if !(tol.is_finite() && tol >= 0.0) {
                return fail(format!("convergence tolerance must be non-negative, got {}", tol));
            }
        }
        Ok(())
    }
}

/// Hamiltonian, gates and environment for one run.
#[derive(Clone, Debug)]
pub struct SimulationContext {
    pub params: Params,
    pub hamiltonian: Hamiltonian,
    pub trotter: Trotter,
    pub env: Environment,
}

impl SimulationContext {
    pub fn new(params: Params) -> PepsResult<Self> {
        params.validate()?;
        let hamiltonian = Hamiltonian::j1j2(params.d, params.j2);
        let trotter = Trotter::new(&hamiltonian, params.tau)?;
        let env = Environment::new(params.lx, params.ly, params.d_aux, params.comp_sweeps);
        Ok(Self { params, hamiltonian, trotter, env })
    }

    /// Change the time step, rebuilding the gates.
    pub fn set_tau(&mut self, tau: f64) -> PepsResult<()> {
        let mut params = self.params.clone();
        params.tau = tau;
        params.validate()?;
        self.trotter = Trotter::new(&self.hamiltonian, tau)?;
        self.params = params;
        Ok(())
    }

    /// A state with the run's dimensions and uniformly random elements.
    pub fn random_state<R>(&self, rng: &mut R) -> Peps
    where R: Rng + ?Sized
    {
        let p = &self.params;
        Peps::random(p.lx, p.ly, p.d, p.bond, rng)
    }

    /// A Néel state with the run's dimensions plus Gaussian noise.
    pub fn neel_state<R>(&self, noise: f64, rng: &mut R) -> PepsResult<Peps>
    where R: Rng + ?Sized
    {
        let p = &self.params;
        Peps::neel(p.lx, p.ly, p.d, p.bond, noise, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        assert!(Params::square(4, 2, 2, 4).validate().is_ok());
        assert!(Params::square(1, 2, 2, 4).validate().is_err());
        let mut p = Params::square(4, 2, 2, 4);
        p.tau = -0.1;
        assert!(matches!(p.validate(), Err(PepsError::InvalidParams(_))));
        p.tau = 0.1;
        p.convergence_tol = Some(f64::NAN);
        assert!(p.validate().is_err());
    }

    #[test]
    fn set_tau_rebuilds_gates() {
        let mut ctx = SimulationContext::new(Params::square(3, 2, 2, 4)).unwrap();
        let before = ctx.trotter.clone();
        ctx.set_tau(0.001).unwrap();
        assert_eq!(ctx.trotter.tau(), 0.001);
        assert_ne!(before, ctx.trotter);
        assert!(ctx.set_tau(0.0).is_err());
        assert_eq!(ctx.params.tau, 0.001);
    }
}
