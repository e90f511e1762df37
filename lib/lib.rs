#![allow(non_snake_case)]

//! Imaginary-time evolution of projected entangled pair states (PEPS) for the
//! J1-J2 model on an open `Lx × Ly` square lattice.
//!
//! One time step applies the two-site Trotter gates of the Hamiltonian to
//! every nearest-neighbour pair of lattice tensors and recompresses each pair
//! to the fixed bond dimension `D` by an alternating least-squares ("full
//! update") optimization. The local problems are built from boundary
//! matrix-product operators that approximate the contraction of everything
//! above and below the pair of rows being updated.
//!
//! ```text
//!    t[r]     ══════════════════════════════   rows r+2 .. Ly-1
//!               |      |      |      |
//!    row r+1  --o------o------o------o--
//!               |      |      |      |
//!    row r    --o------o------o------o--
//!               |      |      |      |
//!    b[r-1]   ══════════════════════════════   rows 0 .. r-1
//! ```
//!
//! All tensors are handled through [`tensor::Tensor`], whose axes carry
//! [`lattice::Leg`] labels; contractions are expressed by label rather than by
//! axis position, so the same code serves every row pair and every column,
//! with dimension-1 placeholder legs at the lattice edges.

pub mod error;
pub mod tensor;
pub mod linalg;
pub mod lattice;
pub mod peps;
pub mod mpo;
pub mod environment;
pub mod hamiltonian;
pub mod trotter;
pub mod contractions;
pub mod linsys;
pub mod propagate;
pub mod observables;
pub mod context;

pub use error::{ PepsError, PepsResult };
pub use context::{ Params, SimulationContext };
pub use peps::Peps;
