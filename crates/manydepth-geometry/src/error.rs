/// An error type for the geometry module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GeometryError {
    /// Error when a matrix contains NaN or infinite entries.
    #[error("Matrix contains non finite values")]
    NonFiniteMatrix,
}
