use ndarray::{Array2, ArrayView2};
use rand::Rng;

use crate::activation::Activation;
use crate::error::{NnError, Result};
use crate::layers::{Dropout, Layer, LayerNorm, Linear};

#[derive(Debug, Clone)]
struct Stage {
    dropout: Dropout,
    linear: Linear,
    hidden: Option<(Activation, LayerNorm)>,
}

/// Euclidean MLP head: `dropout → linear → act → LayerNorm` per hidden
/// stage, `dropout → linear` for the last one.
#[derive(Debug, Clone)]
pub struct SeqLinear {
    stages: Vec<Stage>,
}

impl SeqLinear {
    pub fn new<R: Rng + ?Sized>(
        in_dim: usize,
        layer_dims: &[usize],
        dropout: f64,
        act: Activation,
        bias: bool,
        rng: &mut R,
    ) -> Result<Self> {
        if layer_dims.is_empty() {
            return Err(NnError::Config("layer_dims must not be empty".into()));
        }
        let last = layer_dims.len() - 1;
        let mut stages = Vec::with_capacity(layer_dims.len());
        let mut prev = in_dim;
        for (idx, &dim) in layer_dims.iter().enumerate() {
            stages.push(Stage {
                dropout: Dropout::new(dropout, rng)?,
                linear: Linear::new(prev, dim, bias, rng)?,
                hidden: (idx != last).then(|| (act, LayerNorm::new(dim))),
            });
            prev = dim;
        }
        Ok(Self { stages })
    }

    pub fn out_dim(&self) -> usize {
        self.stages.last().map_or(0, |s| s.linear.out_dim())
    }
}

impl Layer for SeqLinear {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let mut h = x.to_owned();
        for stage in &mut self.stages {
            h = stage.dropout.forward(h.view())?;
            h = stage.linear.forward(h.view())?;
            if let Some((act, norm)) = &mut stage.hidden {
                h = norm.forward(act.apply(h.view()).view())?;
            }
        }
        Ok(h)
    }

    fn set_training(&mut self, training: bool) {
        for stage in &mut self.stages {
            stage.dropout.set_training(training);
        }
    }
}
