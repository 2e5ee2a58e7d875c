//! # Manifold mapper
//!
//! Lifts Euclidean encoder features onto the configured manifold:
//!
//! ```text
//! clip:       x · min(1, r / (‖x‖ + 1e-5))      when clip_radius is set and use_normalize is false
//! normalize:  γ · x / ‖x‖                       otherwise
//!
//! lorentz:    projx([0, x])                     (time coordinate recomputed)
//! poincare:   projx(exp₀(x))
//! euclidean:  x
//! ```

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};

use hyperret_hyp_ops::numerics::{l2_normalize_rows, row_norms};
use hyperret_hyp_ops::Manifold;

use crate::error::{NnError, Result};

const CLIP_EPS: f64 = 1e-5;

#[derive(Debug, Clone)]
pub struct ManifoldMapper {
    manifold: Manifold,
    clip_radius: Option<f64>,
    use_normalize: bool,
    gamma: f64,
    validate_output: bool,
}

impl ManifoldMapper {
    /// # Errors
    ///
    /// [`NnError::Config`] if `clip_radius` is not a finite positive number.
    pub fn new(manifold: Manifold, clip_radius: Option<f64>, use_normalize: bool) -> Result<Self> {
        if let Some(r) = clip_radius {
            if !(r.is_finite() && r > 0.0) {
                return Err(NnError::Config(format!("clip radius must be finite and > 0, got {r}")));
            }
        }
        Ok(Self {
            manifold,
            clip_radius,
            use_normalize,
            gamma: 1.0,
            validate_output: false,
        })
    }

    /// Check every output against the manifold invariant.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_output = validate;
        self
    }

    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    pub fn clip_radius(&self) -> Option<f64> {
        self.clip_radius
    }

    /// Learnable gain applied in the normalize branch.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn set_gamma(&mut self, gamma: f64) {
        self.gamma = gamma;
    }

    fn clips(&self) -> bool {
        self.clip_radius.is_some() && !self.use_normalize
    }

    /// Map `[batch, d]` features to manifold points of ambient width.
    pub fn forward(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let scaled = match self.clip_radius {
            Some(r) if self.clips() => {
                let norms = row_norms(x);
                let mut out = x.to_owned();
                Zip::from(out.rows_mut()).and(&norms).for_each(|mut row, &n| {
                    row *= (r / (n + CLIP_EPS)).min(1.0);
                });
                out
            }
            _ => {
                tracing::debug!(gamma = self.gamma, "mapper normalize branch");
                l2_normalize_rows(x) * self.gamma
            }
        };
        let out = match &self.manifold {
            Manifold::Euclidean(_) => scaled,
            Manifold::Poincare(m) => m.expmap0(scaled.view()),
            Manifold::Lorentz(m) => m.add_time(scaled.view()),
        };
        if self.validate_output {
            self.manifold.assert_check_point_on_manifold(out.view())?;
        }
        Ok(out)
    }

    /// Map every sequence of a `[batch, seq, d]` array.
    pub fn forward_sequence(&self, x: ArrayView3<f64>) -> Result<Array3<f64>> {
        let (batch, seq, dim) = x.dim();
        let mut out = Array3::zeros((batch, seq, self.manifold.ambient_dim(dim)));
        for (src, mut dst) in x.outer_iter().zip(out.outer_iter_mut()) {
            dst.assign(&self.forward(src)?);
        }
        Ok(out)
    }
}
