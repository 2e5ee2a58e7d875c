//! # Similarity scoring
//!
//! Turns two batches of embeddings into a `[n, m]` similarity matrix where
//! larger means more similar:
//!
//! | Manifold | `score(x, y)` |
//! |---|---|
//! | euclidean | cosine similarity |
//! | poincare | −d(xᵢ, yⱼ) |
//! | lorentz | −d(xᵢ, yⱼ) |

use ndarray::{Array2, ArrayView2};

use hyperret_hyp_ops::{check_finite, l2_normalize_rows, Curvature, Manifold, ManifoldKind};

use crate::error::{NnError, Result};
use crate::mapper::ManifoldMapper;

/// Euclidean and hyperbolic similarity matrices of the same pairs.
#[derive(Debug, Clone)]
pub struct HybridScores {
    pub euclidean: Array2<f64>,
    pub hyperbolic: Array2<f64>,
}

#[derive(Debug, Clone)]
pub struct Scorer {
    manifold: Manifold,
}

impl Scorer {
    pub fn new(manifold: Manifold) -> Self {
        Self { manifold }
    }

    /// Build from a configuration name.
    ///
    /// # Errors
    ///
    /// [`NnError::Hyp`] wrapping a `Configuration` error for unknown names.
    pub fn from_config_name(name: &str, curvature: Curvature, atol: f64, rtol: f64) -> Result<Self> {
        let kind: ManifoldKind = name.parse()?;
        Ok(Self::new(Manifold::build(kind, curvature, atol, rtol)?))
    }

    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    /// Similarity matrix: cosine for Euclidean, negative geodesic distance
    /// otherwise.
    pub fn score(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
        match &self.manifold {
            Manifold::Euclidean(_) => cosine(x, y),
            m => Ok(-m.dist_batch(x, y)?),
        }
    }

    /// Negative squared distance (squared Euclidean distance for Euclidean).
    pub fn sqdist_score(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(-self.manifold.sqdist_batch(x, y)?)
    }

    /// Cosine similarity of the space components. Lorentz points drop their
    /// time coordinate first; other manifolds use the raw coordinates.
    pub fn space_cosine(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
        match &self.manifold {
            Manifold::Lorentz(m) => cosine(m.get_space(x).view(), m.get_space(y).view()),
            _ => cosine(x, y),
        }
    }

    /// Scores raw Euclidean features twice: cosine on the features and
    /// negative geodesic distance after `mapper` lifts them.
    pub fn hybrid(
        &self,
        mapper: &ManifoldMapper,
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
    ) -> Result<HybridScores> {
        if mapper.manifold().kind() != self.manifold.kind() {
            return Err(NnError::Config(format!(
                "mapper targets {} but scorer uses {}",
                mapper.manifold().kind(),
                self.manifold.kind()
            )));
        }
        let hx = mapper.forward(x)?;
        let hy = mapper.forward(y)?;
        Ok(HybridScores {
            euclidean: cosine(x, y)?,
            hyperbolic: -self.manifold.dist_batch(hx.view(), hy.view())?,
        })
    }
}

fn cosine(x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
    if x.ncols() != y.ncols() {
        return Err(NnError::Shape(format!(
            "cosine: widths differ ({} vs {})",
            x.ncols(),
            y.ncols()
        )));
    }
    let sim = l2_normalize_rows(x).dot(&l2_normalize_rows(y).t());
    check_finite("cosine", &sim)?;
    Ok(sim)
}
