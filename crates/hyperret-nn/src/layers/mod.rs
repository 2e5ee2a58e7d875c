//! Layers that consume and produce `[batch, width]` batches.
//!
//! Parameters live in plain ndarray buffers. Gradients are computed by the
//! external training code, which writes updated values back through the
//! `*_mut` accessors between passes.

pub mod euclid;
pub mod lorentz;
pub mod mlr;
pub mod poincare;

use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::{expect_width, NnError, Result};

pub use euclid::SeqLinear;
pub use lorentz::{LorentzAct, LorentzBlock, LorentzLayerNorm, LorentzLinear, LorentzSeqLinear};
pub use mlr::{LorentzMLR, PoincareMLR};
pub use poincare::{HypSeqLinear, MobiusAct, MobiusLinear};

/// A forward-only layer.
pub trait Layer {
    /// Map a batch of rows. Takes `&mut self` because dropout draws from the
    /// layer's own RNG.
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Switch between training (dropout active) and evaluation mode.
    fn set_training(&mut self, _training: bool) {}
}

impl<L: Layer + ?Sized> Layer for Box<L> {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        (**self).forward(x)
    }

    fn set_training(&mut self, training: bool) {
        (**self).set_training(training)
    }
}

// ─────────────────────────────────────────────
// Linear
// ─────────────────────────────────────────────

/// Affine map `y = x Wᵀ + b` with `W` shaped `[out, in]`.
#[derive(Debug, Clone)]
pub struct Linear {
    weight: Array2<f64>,
    bias: Option<Array1<f64>>,
}

impl Linear {
    /// Kaiming-normal weights (`std = sqrt(2 / in_dim)`), zero bias.
    pub fn new<R: Rng + ?Sized>(in_dim: usize, out_dim: usize, bias: bool, rng: &mut R) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(NnError::Shape(format!(
                "linear layer needs non-zero dims, got {in_dim} -> {out_dim}"
            )));
        }
        let std = (2.0 / in_dim as f64).sqrt();
        let normal = Normal::new(0.0, std).map_err(|e| NnError::Config(e.to_string()))?;
        let weight = Array2::from_shape_simple_fn((out_dim, in_dim), || normal.sample(rng));
        Ok(Self {
            weight,
            bias: bias.then(|| Array1::zeros(out_dim)),
        })
    }

    /// Build from explicit parameters.
    pub fn from_parts(weight: Array2<f64>, bias: Option<Array1<f64>>) -> Result<Self> {
        if let Some(b) = &bias {
            expect_width("linear bias", weight.nrows(), b.len())?;
        }
        Ok(Self { weight, bias })
    }

    pub fn in_dim(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_dim(&self) -> usize {
        self.weight.nrows()
    }

    pub fn weight(&self) -> &Array2<f64> {
        &self.weight
    }

    pub fn weight_mut(&mut self) -> &mut Array2<f64> {
        &mut self.weight
    }

    pub fn bias(&self) -> Option<&Array1<f64>> {
        self.bias.as_ref()
    }

    pub fn bias_mut(&mut self) -> Option<&mut Array1<f64>> {
        self.bias.as_mut()
    }
}

impl Layer for Linear {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        expect_width("linear", self.in_dim(), x.ncols())?;
        let mut y = x.dot(&self.weight.t());
        if let Some(b) = &self.bias {
            y += b;
        }
        Ok(y)
    }
}

// ─────────────────────────────────────────────
// Dropout
// ─────────────────────────────────────────────

/// Inverted dropout: in training, zero each entry with probability `p` and
/// scale survivors by `1/(1−p)`. Identity in evaluation mode.
#[derive(Debug, Clone)]
pub struct Dropout {
    p: f64,
    training: bool,
    rng: StdRng,
}

impl Dropout {
    /// Layers start in training mode. The layer's RNG is seeded from `rng`.
    pub fn new<R: Rng + ?Sized>(p: f64, rng: &mut R) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(NnError::Config(format!("dropout probability must be in [0, 1), got {p}")));
        }
        Ok(Self {
            p,
            training: true,
            rng: StdRng::seed_from_u64(rng.gen()),
        })
    }

    pub fn p(&self) -> f64 {
        self.p
    }

    pub fn is_training(&self) -> bool {
        self.training
    }
}

impl Layer for Dropout {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if !self.training || self.p == 0.0 {
            return Ok(x.to_owned());
        }
        let keep = 1.0 - self.p;
        let scale = 1.0 / keep;
        let rng = &mut self.rng;
        Ok(x.mapv(|v| if rng.gen_bool(keep) { v * scale } else { 0.0 }))
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }
}

// ─────────────────────────────────────────────
// LayerNorm
// ─────────────────────────────────────────────

/// Normalization over the last axis with learnable gain and shift.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    gamma: Array1<f64>,
    beta: Array1<f64>,
    eps: f64,
}

impl LayerNorm {
    pub const DEFAULT_EPS: f64 = 1e-5;

    pub fn new(dim: usize) -> Self {
        Self {
            gamma: Array1::ones(dim),
            beta: Array1::zeros(dim),
            eps: Self::DEFAULT_EPS,
        }
    }

    pub fn dim(&self) -> usize {
        self.gamma.len()
    }

    pub fn gamma_mut(&mut self) -> &mut Array1<f64> {
        &mut self.gamma
    }

    pub fn beta_mut(&mut self) -> &mut Array1<f64> {
        &mut self.beta
    }
}

impl Layer for LayerNorm {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        expect_width("layer norm", self.dim(), x.ncols())?;
        let mut out = x.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            let mean = row.mean().unwrap_or(0.0);
            let var = row.mapv(|v| (v - mean) * (v - mean)).mean().unwrap_or(0.0);
            let inv_std = 1.0 / (var + self.eps).sqrt();
            Zip::from(&mut row)
                .and(&self.gamma)
                .and(&self.beta)
                .for_each(|v, &g, &b| *v = (*v - mean) * inv_std * g + b);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn linear_applies_affine_map() {
        let mut l = Linear::from_parts(array![[1.0, 2.0], [0.0, -1.0], [3.0, 0.0]], Some(array![0.5, 0.0, -1.0]))
            .unwrap();
        let y = l.forward(array![[1.0, 1.0]].view()).unwrap();
        assert_eq!(y, array![[3.5, -1.0, 2.0]]);
    }

    #[test]
    fn linear_rejects_wrong_width() {
        let mut l = Linear::new(4, 2, true, &mut rng()).unwrap();
        assert!(matches!(l.forward(Array2::zeros((1, 3)).view()), Err(NnError::Shape(_))));
    }

    #[test]
    fn kaiming_init_has_expected_scale() {
        let l = Linear::new(256, 512, false, &mut rng()).unwrap();
        let var = l.weight().mapv(|w| w * w).mean().unwrap();
        assert_abs_diff_eq!(var, 2.0 / 256.0, epsilon = 5e-4);
        assert!(l.bias().is_none());
    }

    #[test]
    fn dropout_is_identity_in_eval() {
        let mut d = Dropout::new(0.5, &mut rng()).unwrap();
        d.set_training(false);
        let x = array![[1.0, 2.0, 3.0]];
        assert_eq!(d.forward(x.view()).unwrap(), x);
    }

    #[test]
    fn dropout_zeroes_and_rescales() {
        let mut d = Dropout::new(0.5, &mut rng()).unwrap();
        let x = Array2::ones((100, 100));
        let y = d.forward(x.view()).unwrap();
        assert!(y.iter().all(|&v| v == 0.0 || v == 2.0));
        let kept = y.iter().filter(|&&v| v > 0.0).count() as f64 / 10_000.0;
        assert!((kept - 0.5).abs() < 0.05, "kept fraction {kept}");
    }

    #[test]
    fn dropout_rejects_p_one() {
        assert!(Dropout::new(1.0, &mut rng()).is_err());
        assert!(Dropout::new(-0.1, &mut rng()).is_err());
    }

    #[test]
    fn layer_norm_standardizes_rows() {
        let mut ln = LayerNorm::new(4);
        let y = ln.forward(array![[1.0, 2.0, 3.0, 4.0], [5.0, 5.0, 5.0, 5.0]].view()).unwrap();
        assert_abs_diff_eq!(y.row(0).sum(), 0.0, epsilon = 1e-12);
        let var = y.row(0).mapv(|v| v * v).mean().unwrap();
        assert_abs_diff_eq!(var, 1.0, epsilon = 1e-4);
        assert!(y.row(1).iter().all(|v| v.abs() < 1e-12));
    }
}
