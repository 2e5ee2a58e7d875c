use ndarray::{Array2, ArrayView2};
use rand::Rng;

use hyperret_hyp_ops::Manifold;

use crate::activation::Activation;
use crate::error::Result;
use crate::layers::{HypSeqLinear, Layer, LorentzSeqLinear, SeqLinear};

/// Projection head matching the model's manifold, chosen once at build time.
#[derive(Debug, Clone)]
pub enum ProjectionHead {
    Euclidean(SeqLinear),
    Poincare(HypSeqLinear),
    Lorentz(LorentzSeqLinear),
}

impl ProjectionHead {
    /// `in_dim` and `layer_dims` are intrinsic dimensions.
    pub fn build<R: Rng + ?Sized>(
        manifold: &Manifold,
        in_dim: usize,
        layer_dims: &[usize],
        dropout: f64,
        act: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        let head = match manifold {
            Manifold::Euclidean(_) => {
                ProjectionHead::Euclidean(SeqLinear::new(in_dim, layer_dims, dropout, act, true, rng)?)
            }
            Manifold::Poincare(m) => ProjectionHead::Poincare(HypSeqLinear::new(
                m.clone(),
                in_dim,
                layer_dims,
                dropout,
                act,
                rng,
            )?),
            Manifold::Lorentz(m) => ProjectionHead::Lorentz(LorentzSeqLinear::new(
                m.clone(),
                in_dim,
                layer_dims,
                dropout,
                act,
                rng,
            )?),
        };
        tracing::info!(kind = %manifold.kind(), in_dim, out_dim = head.out_dim(), "projection head built");
        Ok(head)
    }

    /// Intrinsic output dimension.
    pub fn out_dim(&self) -> usize {
        match self {
            ProjectionHead::Euclidean(h) => h.out_dim(),
            ProjectionHead::Poincare(h) => h.out_dim(),
            ProjectionHead::Lorentz(h) => h.out_dim(),
        }
    }
}

impl Layer for ProjectionHead {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        match self {
            ProjectionHead::Euclidean(h) => h.forward(x),
            ProjectionHead::Poincare(h) => h.forward(x),
            ProjectionHead::Lorentz(h) => h.forward(x),
        }
    }

    fn set_training(&mut self, training: bool) {
        match self {
            ProjectionHead::Euclidean(h) => h.set_training(training),
            ProjectionHead::Poincare(h) => h.set_training(training),
            ProjectionHead::Lorentz(h) => h.set_training(training),
        }
    }
}
