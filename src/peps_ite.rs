use clap::Parser;
use log::info;
use rand::{ SeedableRng, rngs::StdRng };
use peps_ite::{
    Params,
    PepsResult,
    SimulationContext,
    environment::EnvOption,
    observables,
    propagate,
};

/// Time-step schedule: (number of steps, τ).
const SCHEDULE: &[(usize, f64)] = &[(1000, 0.01), (4000, 0.001)];

/// Frobenius norm every site is rescaled to after a step.
const SCAL_NUM: f64 = 1.0;

/// Imaginary-time evolution of a PEPS for the J1-J2 model on an L×L lattice.
#[derive(Parser, Debug)]
#[command(name = "peps_ite")]
struct Cli {
    /// Linear lattice size.
    l: usize,
    /// Physical dimension.
    d: usize,
    /// PEPS bond dimension.
    bond: usize,
    /// Boundary MPO bond dimension.
    d_aux: usize,
    /// Next-nearest-neighbour coupling.
    j2: f64,
    /// Standard deviation of the Gaussian noise added to the Néel state.
    noise: f64,

    /// Start from uniformly random tensors instead of the Néel state.
    #[arg(long)]
    random: bool,
    /// Seed for the random number generator.
    #[arg(long)]
    seed: Option<u64>,
    /// ALS sweeps per pair update.
    #[arg(long, default_value_t = 10)]
    sweeps: usize,
    /// Variational sweeps per boundary compression.
    #[arg(long, default_value_t = 2)]
    comp_sweeps: usize,
    /// Relative tolerance for ending ALS sweeps early.
    #[arg(long)]
    tol: Option<f64>,
}

fn main() -> PepsResult<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut params = Params::square(cli.l, cli.d, cli.bond, cli.d_aux);
    params.j2 = cli.j2;
    params.n_sweeps = cli.sweeps;
    params.comp_sweeps = cli.comp_sweeps;
    params.convergence_tol = cli.tol;
    params.tau = SCHEDULE[0].1;
    let mut ctx = SimulationContext::new(params)?;

    let mut rng
        = match cli.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
    let mut peps
        = if cli.random {
            ctx.random_state(&mut rng)
        } else {
            ctx.neel_state(cli.noise, &mut rng)?
        };
    observables::normalize(&mut peps, &mut ctx.env)?;
    peps.rescale_tensors(SCAL_NUM);
    observables::normalize(&mut peps, &mut ctx.env)?;

    let n_sites = (cli.l * cli.l) as f64;
    let mut i: usize = 0;
    for &(n_steps, tau) in SCHEDULE.iter() {
        ctx.set_tau(tau)?;
        info!("tau = {}", tau);
        for _ in 0..n_steps {
            propagate::step(&mut peps, &mut ctx)?;
            peps.rescale_tensors(SCAL_NUM);
            observables::normalize(&mut peps, &mut ctx.env)?;
            ctx.env.calc(EnvOption::All, &peps)?;
            let e = observables::energy(&peps, &ctx.env, &ctx.hamiltonian)?;
            println!("{}\t{:.15}", i, e / n_sites);
            i += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_is_not_a_flag() {
        let base = ["peps_ite", "4", "2", "2", "4", "0.0", "0.01"];
        let cli = Cli::try_parse_from(base).unwrap();
        assert_eq!(cli.sweeps, 10);
        assert_eq!(cli.comp_sweeps, 2);
        let with = |extra: &[&'static str]| {
            Cli::try_parse_from(base.iter().chain(extra.iter()).copied())
        };
        assert!(with(&["--steps", "5"]).is_err());
        assert!(with(&["--tau", "0.1"]).is_err());
        assert_eq!(with(&["--sweeps", "4"]).unwrap().sweeps, 4);
    }
}
