use thiserror::Error;

use crate::context::ContextError;

/// Errors surfaced by meshes and the scene graph.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The caller broke the contract of an operation, e.g. passed attribute
    /// arrays of different vertex counts. No context state was changed.
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type RenderResult<T> = Result<T, RenderError>;
