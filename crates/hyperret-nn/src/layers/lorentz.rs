//! Lorentz layers.
//!
//! Every layer follows the same pattern: drop the time coordinate, transform
//! the space coordinates with an ordinary Euclidean operation, then recompute
//! the time coordinate with [`Lorentz::add_time`]. Outputs are therefore on
//! the hyperboloid by construction. Widths passed to constructors are
//! intrinsic dimensions; inputs and outputs carry one extra column.

use ndarray::{Array2, ArrayView2};
use rand::Rng;

use hyperret_hyp_ops::{check_finite, Lorentz};

use crate::activation::Activation;
use crate::error::{expect_width, NnError, Result};
use crate::layers::{Dropout, Layer, LayerNorm, Linear};

/// Dropout then an affine map on the space coordinates.
#[derive(Debug, Clone)]
pub struct LorentzLinear {
    lorentz: Lorentz,
    dropout: Dropout,
    linear: Linear,
}

impl LorentzLinear {
    pub fn new<R: Rng + ?Sized>(
        lorentz: Lorentz,
        in_dim: usize,
        out_dim: usize,
        bias: bool,
        dropout: f64,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            lorentz,
            dropout: Dropout::new(dropout, rng)?,
            linear: Linear::new(in_dim, out_dim, bias, rng)?,
        })
    }

    pub fn in_dim(&self) -> usize {
        self.linear.in_dim()
    }

    pub fn out_dim(&self) -> usize {
        self.linear.out_dim()
    }

    pub fn linear_mut(&mut self) -> &mut Linear {
        &mut self.linear
    }
}

impl Layer for LorentzLinear {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        expect_width("lorentz linear", self.in_dim() + 1, x.ncols())?;
        let space = self.lorentz.get_space(x);
        let space = self.dropout.forward(space.view())?;
        let space = self.linear.forward(space.view())?;
        let out = self.lorentz.add_time(space.view());
        check_finite("lorentz_linear", &out)?;
        Ok(out)
    }

    fn set_training(&mut self, training: bool) {
        self.dropout.set_training(training);
    }
}

/// Activation applied to the space coordinates.
#[derive(Debug, Clone)]
pub struct LorentzAct {
    lorentz: Lorentz,
    act: Activation,
}

impl LorentzAct {
    pub fn new(lorentz: Lorentz, act: Activation) -> Self {
        Self { lorentz, act }
    }
}

impl Layer for LorentzAct {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let space = self.act.apply(self.lorentz.get_space(x).view());
        Ok(self.lorentz.add_time(space.view()))
    }
}

/// Layer normalization of the space coordinates.
#[derive(Debug, Clone)]
pub struct LorentzLayerNorm {
    lorentz: Lorentz,
    norm: LayerNorm,
}

impl LorentzLayerNorm {
    pub fn new(lorentz: Lorentz, dim: usize) -> Self {
        Self {
            lorentz,
            norm: LayerNorm::new(dim),
        }
    }
}

impl Layer for LorentzLayerNorm {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let space = self.norm.forward(self.lorentz.get_space(x).view())?;
        Ok(self.lorentz.add_time(space.view()))
    }
}

/// Linear, then optional normalization, then optional activation.
#[derive(Debug, Clone)]
pub struct LorentzBlock {
    linear: LorentzLinear,
    norm: Option<LorentzLayerNorm>,
    act: Option<LorentzAct>,
}

impl LorentzBlock {
    pub fn new<R: Rng + ?Sized>(
        lorentz: Lorentz,
        in_dim: usize,
        out_dim: usize,
        dropout: f64,
        act: Option<Activation>,
        normalize: bool,
        rng: &mut R,
    ) -> Result<Self> {
        let linear = LorentzLinear::new(lorentz.clone(), in_dim, out_dim, true, dropout, rng)?;
        let norm = normalize.then(|| LorentzLayerNorm::new(lorentz.clone(), out_dim));
        let act = act.map(|a| LorentzAct::new(lorentz, a));
        Ok(Self { linear, norm, act })
    }

    pub fn out_dim(&self) -> usize {
        self.linear.out_dim()
    }

    pub fn linear_mut(&mut self) -> &mut LorentzLinear {
        &mut self.linear
    }
}

impl Layer for LorentzBlock {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let mut h = self.linear.forward(x)?;
        if let Some(norm) = &mut self.norm {
            h = norm.forward(h.view())?;
        }
        if let Some(act) = &mut self.act {
            h = act.forward(h.view())?;
        }
        Ok(h)
    }

    fn set_training(&mut self, training: bool) {
        self.linear.set_training(training);
    }
}

/// Stack of [`LorentzBlock`]s. Every block but the last normalizes and
/// activates; the last one is a plain linear map.
#[derive(Debug, Clone)]
pub struct LorentzSeqLinear {
    blocks: Vec<LorentzBlock>,
}

impl LorentzSeqLinear {
    pub fn new<R: Rng + ?Sized>(
        lorentz: Lorentz,
        in_dim: usize,
        layer_dims: &[usize],
        dropout: f64,
        act: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        if layer_dims.is_empty() {
            return Err(NnError::Config("layer_dims must not be empty".into()));
        }
        let last = layer_dims.len() - 1;
        let mut blocks = Vec::with_capacity(layer_dims.len());
        let mut prev = in_dim;
        for (idx, &dim) in layer_dims.iter().enumerate() {
            let hidden = idx != last;
            blocks.push(LorentzBlock::new(
                lorentz.clone(),
                prev,
                dim,
                dropout,
                hidden.then_some(act),
                hidden,
                rng,
            )?);
            prev = dim;
        }
        tracing::debug!(in_dim, ?layer_dims, %act, "lorentz seq linear built");
        Ok(Self { blocks })
    }

    pub fn blocks_mut(&mut self) -> &mut [LorentzBlock] {
        &mut self.blocks
    }

    pub fn out_dim(&self) -> usize {
        self.blocks.last().map_or(0, LorentzBlock::out_dim)
    }
}

impl Layer for LorentzSeqLinear {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let mut h = x.to_owned();
        for block in &mut self.blocks {
            h = block.forward(h.view())?;
        }
        Ok(h)
    }

    fn set_training(&mut self, training: bool) {
        for block in &mut self.blocks {
            block.set_training(training);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperret_hyp_ops::Curvature;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lorentz(k: f64) -> Lorentz {
        Lorentz::new(Curvature::fixed(k).unwrap()).unwrap()
    }

    #[test]
    fn linear_output_is_on_manifold() {
        let m = lorentz(0.5);
        let mut rng = StdRng::seed_from_u64(0);
        let x = m.random(16, 8, 1.0, &mut rng).unwrap();
        let mut layer = LorentzLinear::new(m.clone(), 8, 4, true, 0.1, &mut rng).unwrap();
        let y = layer.forward(x.view()).unwrap();
        assert_eq!(y.dim(), (16, 5));
        m.assert_check_point_on_manifold(y.view()).unwrap();
    }

    #[test]
    fn linear_rejects_intrinsic_width_input() {
        let m = lorentz(1.0);
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = LorentzLinear::new(m, 8, 4, true, 0.0, &mut rng).unwrap();
        assert!(matches!(
            layer.forward(Array2::zeros((2, 8)).view()),
            Err(NnError::Shape(_))
        ));
    }

    #[test]
    fn act_and_norm_keep_points_on_manifold() {
        let m = lorentz(2.0);
        let mut rng = StdRng::seed_from_u64(2);
        let x = m.random(8, 6, 2.0, &mut rng).unwrap();
        let mut act = LorentzAct::new(m.clone(), Activation::Relu);
        let y = act.forward(x.view()).unwrap();
        m.assert_check_point_on_manifold(y.view()).unwrap();
        assert!(y.iter().skip(1).all(|v| *v >= 0.0));
        let mut norm = LorentzLayerNorm::new(m.clone(), 6);
        m.assert_check_point_on_manifold(norm.forward(x.view()).unwrap().view()).unwrap();
    }

    #[test]
    fn seq_linear_chains_dims_and_stays_valid() {
        for k in [0.1, 1.0, 5.0] {
            let m = lorentz(k);
            let mut rng = StdRng::seed_from_u64(3);
            let x = m.random(10, 12, 1.0, &mut rng).unwrap();
            let mut seq =
                LorentzSeqLinear::new(m.clone(), 12, &[32, 16, 8], 0.1, Activation::Gelu, &mut rng).unwrap();
            assert_eq!(seq.out_dim(), 8);
            let y = seq.forward(x.view()).unwrap();
            assert_eq!(y.dim(), (10, 9));
            m.assert_check_point_on_manifold(y.view()).unwrap();
        }
    }

    #[test]
    fn seq_linear_eval_is_deterministic() {
        let m = lorentz(1.0);
        let mut rng = StdRng::seed_from_u64(4);
        let x = m.random(4, 6, 1.0, &mut rng).unwrap();
        let mut seq = LorentzSeqLinear::new(m, 6, &[6, 3], 0.5, Activation::Relu, &mut rng).unwrap();
        seq.set_training(false);
        let a = seq.forward(x.view()).unwrap();
        let b = seq.forward(x.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_layer_dims_is_config_error() {
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            LorentzSeqLinear::new(lorentz(1.0), 4, &[], 0.1, Activation::Relu, &mut rng),
            Err(NnError::Config(_))
        ));
    }
}
