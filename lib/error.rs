//! Crate-wide error type.

use ndarray_linalg::error::LinalgError;
use thiserror::Error;
use crate::tensor::TensorError;

#[derive(Debug, Error)]
pub enum PepsError {
    /// Returned when a labeled-tensor operation fails, e.g. a contraction
    /// between tensors with no common legs.
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),

    /// Returned when a LAPACK routine (SVD, QR, eigendecomposition,
    /// Bunch-Kaufman factorization) reports failure.
    #[error("linear algebra error: {0}")]
    Linalg(#[from] LinalgError),

    /// Returned when an array reshape fails.
    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Returned when the solution of a local linear system is not finite.
    #[error("singular local linear system for site ({row}, {col})")]
    SingularSystem { row: usize, col: usize },

    /// Returned when an SVD does not produce singular vectors.
    #[error("singular value decomposition returned no singular vectors")]
    MissingSingularVectors,

    /// Returned when a site tensor with the wrong shape is written into the
    /// lattice.
    #[error("site ({row}, {col}) expects shape {expected:?}, got {got:?}")]
    SiteShape {
        row: usize,
        col: usize,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Returned when simulation parameters are inconsistent.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}
pub type PepsResult<T> = Result<T, PepsError>;
