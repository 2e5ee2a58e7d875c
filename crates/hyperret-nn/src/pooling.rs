use ndarray::{Array2, ArrayView2, ArrayView3};

use hyperret_hyp_ops::Manifold;

use crate::error::Result;

/// Pools a `[batch, seq, width]` array of manifold points into one point per
/// sequence with the manifold's centroid.
#[derive(Debug, Clone)]
pub struct CentroidPooler {
    manifold: Manifold,
}

impl CentroidPooler {
    pub fn new(manifold: Manifold) -> Self {
        Self { manifold }
    }

    /// `weights`, when given, is `[batch, seq]` (e.g. an attention mask).
    pub fn forward(&self, x: ArrayView3<f64>, weights: Option<ArrayView2<f64>>) -> Result<Array2<f64>> {
        Ok(self.manifold.centroid_batch(x, weights)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperret_hyp_ops::{Curvature, HypError, ManifoldKind};
    use ndarray::{array, Array3, Axis};

    use crate::error::NnError;

    #[test]
    fn mask_excludes_padding() {
        let m = Manifold::build(ManifoldKind::Lorentz, Curvature::fixed(1.0).unwrap(), 1e-5, 1e-5).unwrap();
        let lorentz = m.as_lorentz().unwrap();
        let tokens = lorentz.add_time(array![[0.2, 0.1], [9.0, -9.0]].view());
        let x = tokens.insert_axis(Axis(0));
        let pooler = CentroidPooler::new(m.clone());
        let pooled = pooler.forward(x.view(), Some(array![[1.0, 0.0]].view())).unwrap();
        for (a, b) in pooled.row(0).iter().zip(x.slice(ndarray::s![0, 0, ..]).iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    fn all_zero_mask_is_rejected() {
        let m = Manifold::build(ManifoldKind::Poincare, Curvature::fixed(1.0).unwrap(), 1e-5, 1e-5).unwrap();
        let pooler = CentroidPooler::new(m);
        let x = Array3::zeros((1, 2, 3));
        assert!(matches!(
            pooler.forward(x.view(), Some(array![[0.0, 0.0]].view())),
            Err(NnError::Hyp(HypError::InvalidWeights(_)))
        ));
    }
}
