//! Poincaré-ball layers built on Möbius operations.

use ndarray::{Array2, ArrayView2, Axis};
use rand::Rng;

use hyperret_hyp_ops::{check_finite, Poincare};

use crate::activation::Activation;
use crate::error::{expect_width, NnError, Result};
use crate::layers::{Dropout, Layer, LayerNorm, Linear};

/// `(W ⊗ x) ⊕ exp₀(b)`, re-projected into the ball.
///
/// The bias is stored as a tangent vector at the origin.
#[derive(Debug, Clone)]
pub struct MobiusLinear {
    ball: Poincare,
    linear: Linear,
}

impl MobiusLinear {
    pub fn new<R: Rng + ?Sized>(
        ball: Poincare,
        in_dim: usize,
        out_dim: usize,
        bias: bool,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self {
            ball,
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

impl Layer for MobiusLinear {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        expect_width("mobius linear", self.in_dim(), x.ncols())?;
        let mut h = self.ball.mobius_matvec(self.linear.weight().view(), x)?;
        if let Some(bias) = self.linear.bias() {
            let b = self.ball.expmap0(bias.view().insert_axis(Axis(0)));
            let b = b
                .broadcast(h.raw_dim())
                .ok_or_else(|| NnError::Shape("bias does not broadcast to output".into()))?;
            h = self.ball.mobius_add(h.view(), b)?;
        }
        check_finite("mobius_linear", &h)?;
        Ok(h)
    }
}

/// `exp₀(σ(log₀(x)))`.
#[derive(Debug, Clone)]
pub struct MobiusAct {
    ball: Poincare,
    act: Activation,
}

impl MobiusAct {
    pub fn new(ball: Poincare, act: Activation) -> Self {
        Self { ball, act }
    }
}

impl Layer for MobiusAct {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let t = self.act.apply(self.ball.logmap0(x).view());
        Ok(self.ball.expmap0(t.view()))
    }
}

#[derive(Debug, Clone)]
struct HypStage {
    dropout: Dropout,
    linear: MobiusLinear,
    hidden: Option<(MobiusAct, LayerNorm)>,
}

/// Stack of Möbius linear layers.
///
/// Hidden stages run `dropout → Möbius linear → Möbius act → log₀ →
/// LayerNorm → exp₀`; the last stage stops after the Möbius linear.
#[derive(Debug, Clone)]
pub struct HypSeqLinear {
    ball: Poincare,
    stages: Vec<HypStage>,
}

impl HypSeqLinear {
    pub fn new<R: Rng + ?Sized>(
        ball: Poincare,
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
        let mut stages = Vec::with_capacity(layer_dims.len());
        let mut prev = in_dim;
        for (idx, &dim) in layer_dims.iter().enumerate() {
            stages.push(HypStage {
                dropout: Dropout::new(dropout, rng)?,
                linear: MobiusLinear::new(ball.clone(), prev, dim, true, rng)?,
                hidden: (idx != last)
                    .then(|| (MobiusAct::new(ball.clone(), act), LayerNorm::new(dim))),
            });
            prev = dim;
        }
        tracing::debug!(in_dim, ?layer_dims, %act, "hyperbolic seq linear built");
        Ok(Self { ball, stages })
    }

    pub fn out_dim(&self) -> usize {
        self.stages.last().map_or(0, |s| s.linear.out_dim())
    }
}

impl Layer for HypSeqLinear {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let mut h = x.to_owned();
        for stage in &mut self.stages {
            // inverted dropout can push a point past the boundary
            h = self.ball.projx(stage.dropout.forward(h.view())?.view());
            h = stage.linear.forward(h.view())?;
            if let Some((act, norm)) = &mut stage.hidden {
                h = act.forward(h.view())?;
                let t = norm.forward(self.ball.logmap0(h.view()).view())?;
                h = self.ball.expmap0(t.view());
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hyperret_hyp_ops::Curvature;
    use ndarray::{array, Array1};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ball(c: f64) -> Poincare {
        Poincare::new(Curvature::fixed(c).unwrap())
    }

    #[test]
    fn mobius_linear_with_zero_bias_is_matvec() {
        let p = ball(1.0);
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = MobiusLinear::new(p.clone(), 3, 2, true, &mut rng).unwrap();
        let x = array![[0.1, -0.2, 0.3]];
        let y = layer.forward(x.view()).unwrap();
        let expected = p.mobius_matvec(layer.linear_mut().weight().view(), x.view()).unwrap();
        for (a, b) in y.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn mobius_linear_bias_translates_origin() {
        let p = ball(1.0);
        let mut rng = StdRng::seed_from_u64(1);
        let mut layer = MobiusLinear::new(p.clone(), 2, 2, true, &mut rng).unwrap();
        if let Some(b) = layer.linear_mut().bias_mut() {
            b.assign(&Array1::from(vec![0.5, 0.0]));
        }
        let y = layer.forward(Array2::zeros((1, 2)).view()).unwrap();
        assert_abs_diff_eq!(y[[0, 0]], 0.5f64.tanh(), epsilon = 1e-12);
    }

    #[test]
    fn mobius_act_relu_on_origin_is_origin() {
        let mut act = MobiusAct::new(ball(1.0), Activation::Relu);
        let y = act.forward(array![[-0.3, -0.1]].view()).unwrap();
        assert!(y.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn hyp_seq_linear_outputs_inside_ball() {
        for c in [0.1, 1.0, 5.0] {
            let p = ball(c);
            let mut rng = StdRng::seed_from_u64(2);
            let x = p.random(12, 10, 1.0, &mut rng).unwrap();
            let mut seq = HypSeqLinear::new(p.clone(), 10, &[16, 8], 0.2, Activation::Relu, &mut rng).unwrap();
            let y = seq.forward(x.view()).unwrap();
            assert_eq!(y.dim(), (12, 8));
            assert_eq!(seq.out_dim(), 8);
            p.assert_check_point_on_manifold(y.view()).unwrap();
        }
    }

    #[test]
    fn hyp_seq_linear_rejects_empty_dims() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(HypSeqLinear::new(ball(1.0), 4, &[], 0.1, Activation::Relu, &mut rng).is_err());
    }
}
