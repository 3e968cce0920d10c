/// An error type for the nn module.
#[derive(thiserror::Error, Debug)]
pub enum NnError {
    /// Error raised by the tensor backend, including missing or mis-shaped weights.
    #[error("Tensor backend error. {0}")]
    CandleError(#[from] candle_core::Error),

    /// Error when the depth range is not strictly positive and increasing.
    #[error("Invalid depth bin range [{0}, {1}]")]
    InvalidDepthRange(f32, f32),

    /// Error when zero depth bins are requested.
    #[error("The number of depth bins must be positive")]
    InvalidNumBins,

    /// Error when a tensor does not have the expected shape.
    #[error("Unexpected shape for {name}: expected {expected}, got {actual:?}")]
    InvalidShape {
        /// the tensor name
        name: &'static str,
        /// description of the expected shape
        expected: String,
        /// the actual dimensions
        actual: Vec<usize>,
    },

    /// Error when the decoder did not produce the requested scale.
    #[error("Disparity scale {0} was not produced by the decoder")]
    MissingScale(usize),
}
