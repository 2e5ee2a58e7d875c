use thiserror::Error;

#[derive(Debug, Error)]
pub enum NnError {
    #[error("Manifold error: {0}")]
    Hyp(#[from] hyperret_hyp_ops::HypError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Shape error: {0}")]
    Shape(String),
}

pub type Result<T> = std::result::Result<T, NnError>;

/// `Shape` error unless `got == expected`.
pub(crate) fn expect_width(layer: &str, expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(NnError::Shape(format!(
            "{layer}: expected input width {expected}, got {got}"
        )))
    }
}
