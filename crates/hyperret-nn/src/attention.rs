//! # Lorentz attention
//!
//! ```text
//! Q = Wq(x_q)   K = Wk(x_c)   V = Wv(x_c)            (LorentzLinear)
//! αᵢⱼ = softmax_j(−d²(Qᵢ, Kⱼ) / τ)
//! outᵢ = centroid(V, αᵢ)
//! ```
//!
//! Aggregation uses the Lorentz centroid, so outputs never leave the
//! hyperboloid.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::Rng;

use hyperret_hyp_ops::Lorentz;

use crate::error::{expect_width, NnError, Result};
use crate::layers::{Layer, LorentzLinear};

#[derive(Debug, Clone)]
pub struct LorentzAttention {
    lorentz: Lorentz,
    query: LorentzLinear,
    key: LorentzLinear,
    value: LorentzLinear,
    temperature: f64,
}

impl LorentzAttention {
    pub fn new<R: Rng + ?Sized>(
        lorentz: Lorentz,
        in_dim: usize,
        out_dim: usize,
        dropout: f64,
        temperature: f64,
        rng: &mut R,
    ) -> Result<Self> {
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(NnError::Config(format!(
                "attention temperature must be finite and > 0, got {temperature}"
            )));
        }
        Ok(Self {
            query: LorentzLinear::new(lorentz.clone(), in_dim, out_dim, true, dropout, rng)?,
            key: LorentzLinear::new(lorentz.clone(), in_dim, out_dim, true, dropout, rng)?,
            value: LorentzLinear::new(lorentz.clone(), in_dim, out_dim, true, dropout, rng)?,
            lorentz,
            temperature,
        })
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Attention weights `[n_queries, n_keys]` between already projected
    /// queries and keys. Keys with `mask = 0` get zero weight.
    pub fn weights(
        &self,
        q: ArrayView2<f64>,
        k: ArrayView2<f64>,
        mask: Option<ArrayView1<f64>>,
    ) -> Result<Array2<f64>> {
        if let Some(m) = &mask {
            expect_width("attention mask", k.nrows(), m.len())?;
        }
        // Logits are shifted by the nearest kept key; its weight is exp(0).
        let mut scores = self.lorentz.sqdist_batch(q, k)?;
        for mut row in scores.rows_mut() {
            if let Some(m) = &mask {
                row.zip_mut_with(m, |s, &keep| {
                    if keep <= 0.0 {
                        *s = f64::INFINITY;
                    }
                });
            }
            let nearest = row.fold(f64::INFINITY, |a, &b| a.min(b));
            if nearest == f64::INFINITY {
                row.fill(0.0);
                continue;
            }
            row.mapv_inplace(|d| (-(d - nearest) / self.temperature).exp());
            let total = row.sum();
            row /= total;
        }
        Ok(scores)
    }

    /// Attend from `queries` to `context`, both points of width `in_dim + 1`.
    pub fn attend(
        &mut self,
        queries: ArrayView2<f64>,
        context: ArrayView2<f64>,
        mask: Option<ArrayView1<f64>>,
    ) -> Result<Array2<f64>> {
        let q = self.query.forward(queries)?;
        let k = self.key.forward(context)?;
        let v = self.value.forward(context)?;
        let alpha = self.weights(q.view(), k.view(), mask)?;
        let mut out = Array2::zeros((q.nrows(), v.ncols()));
        for (mut dst, w) in out.rows_mut().into_iter().zip(alpha.rows()) {
            dst.assign(&self.lorentz.centroid(v.view(), Some(w))?);
        }
        Ok(out)
    }
}

impl Layer for LorentzAttention {
    /// Self-attention over the rows of `x`.
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.attend(x, x, None)
    }

    fn set_training(&mut self, training: bool) {
        self.query.set_training(training);
        self.key.set_training(training);
        self.value.set_training(training);
    }
}
