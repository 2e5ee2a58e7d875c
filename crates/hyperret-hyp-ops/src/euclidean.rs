//! Flat space with the same surface as the hyperbolic engines.
//!
//! Every map is the identity; distances are `‖x − y‖`.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayView3, Axis, Zip};

use crate::error::{HypError, Result};
use crate::lorentz::{same_len, validate_weights};
use crate::numerics::{check_finite, finite_or_err, nan_max};

#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl Euclidean {
    pub fn origin(&self, dim: usize) -> Array1<f64> {
        Array1::zeros(dim)
    }

    pub fn projx(&self, x: ArrayView2<f64>) -> Array2<f64> {
        x.to_owned()
    }

    pub fn expmap0(&self, v: ArrayView2<f64>) -> Array2<f64> {
        v.to_owned()
    }

    pub fn logmap0(&self, x: ArrayView2<f64>) -> Array2<f64> {
        x.to_owned()
    }

    pub fn dist(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<f64> {
        same_len(x.len(), y.len())?;
        let d = Zip::from(&x)
            .and(&y)
            .fold(0.0, |acc, &a, &b| acc + (a - b) * (a - b))
            .sqrt();
        finite_or_err("euclidean_dist", d)
    }

    pub fn sqdist(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<f64> {
        self.dist(x, y).map(|d| d * d)
    }

    pub fn dist_rows(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>> {
        same_len(x.nrows(), y.nrows())?;
        same_len(x.ncols(), y.ncols())?;
        let d = Zip::from(x.rows()).and(y.rows()).map_collect(|a, b| {
            Zip::from(&a)
                .and(&b)
                .fold(0.0, |acc, &p, &q| acc + (p - q) * (p - q))
                .sqrt()
        });
        check_finite("euclidean_dist_rows", &d)?;
        Ok(d)
    }

    /// `‖x‖² + ‖y‖² − 2⟨x, y⟩`, clamped at 0 against cancellation.
    pub fn sqdist_batch(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
        same_len(x.ncols(), y.ncols())?;
        let x2 = x.map_axis(Axis(1), |r| r.dot(&r));
        let y2 = y.map_axis(Axis(1), |r| r.dot(&r));
        let mut gram = x.dot(&y.t());
        Zip::indexed(&mut gram).for_each(|(i, j), g| {
            *g = nan_max(x2[i] + y2[j] - 2.0 * *g, 0.0);
        });
        check_finite("euclidean_sqdist_batch", &gram)?;
        Ok(gram)
    }

    pub fn dist_batch(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(self.sqdist_batch(x, y)?.mapv_into(f64::sqrt))
    }

    /// Weighted arithmetic mean.
    pub fn centroid(
        &self,
        points: ArrayView2<f64>,
        weights: Option<ArrayView1<f64>>,
    ) -> Result<Array1<f64>> {
        if points.nrows() == 0 || points.ncols() == 0 {
            return Err(HypError::EmptyInput);
        }
        match weights {
            Some(w) => {
                validate_weights(w, points.nrows())?;
                Ok(w.dot(&points) / w.sum())
            }
            None => points.mean_axis(Axis(0)).ok_or(HypError::EmptyInput),
        }
    }

    pub fn centroid_batch(
        &self,
        points: ArrayView3<f64>,
        weights: Option<ArrayView2<f64>>,
    ) -> Result<Array2<f64>> {
        let (batch, _, width) = points.dim();
        if let Some(w) = &weights {
            same_len(batch, w.nrows())?;
        }
        let mut out = Array2::zeros((batch, width));
        for (b, mut dst) in out.rows_mut().into_iter().enumerate() {
            let w = weights.as_ref().map(|w| w.row(b));
            dst.assign(&self.centroid(points.index_axis(Axis(0), b), w)?);
        }
        Ok(out)
    }

    /// Any finite point is valid.
    pub fn assert_check_point_on_manifold(&self, x: ArrayView2<f64>) -> Result<()> {
        check_finite("euclidean_check", &x)
    }
}
