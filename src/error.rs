use thiserror::Error;

use crate::context::pc_context::PcType;

// Unified error type for kryst-assembled

#[derive(Error, Debug)]
pub enum KError {
    #[error("factorization error: {0}")]
    FactorError(String),
    #[error("solve error: {0}")]
    SolveError(String),
    #[error("indefinite matrix detected (p^T A p <= 0)")]
    IndefiniteMatrix,
    #[error("indefinite preconditioner detected (beta < 0)")]
    IndefinitePreconditioner,
    #[error("zero pivot at row {0}")]
    ZeroPivot(usize),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("expecting PC type {expected}, found {found}")]
    WrongPcType { expected: PcType, found: PcType },
    #[error("only diagonal blocks may be inverted")]
    OffDiagonalBlock,
    #[error("preconditioning operator is not matrix-free")]
    NotMatrixFree,
    #[error("operators have not been set")]
    MissingOperators,
    #[error("no DM attached to the PC")]
    MissingDm,
    #[error("object has not been set up")]
    NotSetUp,
    #[error("invalid value {value:?} for option -{key}")]
    InvalidOption { key: String, value: String },
    #[error("unknown {kind} type {name:?}")]
    UnknownType { kind: &'static str, name: String },
    #[error("no boundary marked {0}")]
    UnknownBoundary(usize),
    #[error("invalid form: {0}")]
    InvalidForm(String),
    #[error("assembly error: {0}")]
    Assembly(String),
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("application context entry {0:?} has an unexpected type")]
    AppCtxType(String),
}
