//! # Poincaré ball model
//!
//! Points live in the open ball `‖x‖ < 1/√c`. With `c = 0` the ball becomes
//! all of ℝᵈ and every map degenerates to its Euclidean counterpart.
//!
//! | Function | Direction | Purpose |
//! |---|---|---|
//! | [`Poincare::expmap0`] | ℝᵈ → 𝔹 | Project encoder output into the ball |
//! | [`Poincare::logmap0`] | 𝔹 → ℝᵈ | Unproject for Euclidean layers |
//! | [`Poincare::mobius_add`] | 𝔹 × 𝔹 → 𝔹 | Translate a point by another |
//! | [`Poincare::mobius_matvec`] | ℝᵐˣⁿ × 𝔹 → 𝔹 | Linear map in the ball |
//! | [`Poincare::dist_batch`] | 𝔹ⁿ × 𝔹ᵐ → ℝⁿˣᵐ | Pairwise hyperbolic distances |
//! | [`Poincare::centroid`] | 𝔹ⁿ → 𝔹 | Tangent-space mean at the origin |

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayView3, Axis, Zip};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::curvature::Curvature;
use crate::error::{HypError, Result};
use crate::lorentz::{same_len, validate_weights};
use crate::numerics::{
    atanhc, check_finite, finite_or_err, nan_max, row_norms, tanhc, BALL_EPS, MIN_NORM,
};

/// Poincaré ball with a shared curvature `c ≥ 0`.
#[derive(Debug, Clone)]
pub struct Poincare {
    c: Curvature,
}

impl Poincare {
    pub fn new(c: Curvature) -> Self {
        Self { c }
    }

    pub fn curvature(&self) -> &Curvature {
        &self.c
    }

    #[inline]
    pub fn c(&self) -> f64 {
        self.c.value()
    }

    /// Largest norm [`Poincare::projx`] lets through, `None` when `c = 0`.
    pub fn max_norm(&self) -> Option<f64> {
        let c = self.c();
        (c > 0.0).then(|| (1.0 / c.sqrt() - BALL_EPS).max(0.0))
    }

    pub fn origin(&self, dim: usize) -> Array1<f64> {
        Array1::zeros(dim)
    }

    // ─────────────────────────────────────────────
    // Projection
    // ─────────────────────────────────────────────

    /// Rescale every row with `‖x‖ ≥ 1/√c − ε` onto that radius.
    /// Rows already inside are returned unchanged.
    pub fn projx(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut out = x.to_owned();
        let Some(max_norm) = self.max_norm() else {
            return out;
        };
        for mut row in out.rows_mut() {
            let norm = row.dot(&row).sqrt();
            if norm >= max_norm {
                row *= max_norm / norm.max(MIN_NORM);
            }
        }
        out
    }

    // ─────────────────────────────────────────────
    // Exponential / logarithmic maps at the origin
    // ─────────────────────────────────────────────

    /// ```text
    /// exp₀(v) = tanh(√c‖v‖) · v / (√c‖v‖)
    /// ```
    ///
    /// followed by [`Poincare::projx`], so the result is strictly inside the
    /// ball even when `tanh` rounds to 1.
    pub fn expmap0(&self, v: ArrayView2<f64>) -> Array2<f64> {
        let sqrt_c = self.c().sqrt();
        let mut out = v.to_owned();
        for mut row in out.rows_mut() {
            let z = sqrt_c * row.dot(&row).sqrt();
            row *= tanhc(z);
        }
        self.projx(out.view())
    }

    /// ```text
    /// log₀(y) = atanh(√c‖y‖) · y / (√c‖y‖)
    /// ```
    ///
    /// Inverse of [`Poincare::expmap0`]. The `atanh` argument is clamped
    /// below 1, so points on or past the boundary map to a large but finite
    /// tangent vector.
    pub fn logmap0(&self, y: ArrayView2<f64>) -> Array2<f64> {
        let sqrt_c = self.c().sqrt();
        let mut out = y.to_owned();
        for mut row in out.rows_mut() {
            let z = sqrt_c * row.dot(&row).sqrt();
            row *= atanhc(z);
        }
        out
    }

    // ─────────────────────────────────────────────
    // Möbius operations
    // ─────────────────────────────────────────────

    /// Row-wise Möbius addition `x ⊕ y`.
    ///
    /// ```text
    ///          (1 + 2c⟨x,y⟩ + c‖y‖²) · x  +  (1 − c‖x‖²) · y
    /// x ⊕ y = ───────────────────────────────────────────────
    ///                1 + 2c⟨x,y⟩ + c²‖x‖²‖y‖²
    /// ```
    pub fn mobius_add(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
        same_len(x.nrows(), y.nrows())?;
        same_len(x.ncols(), y.ncols())?;
        let c = self.c();
        let mut out = Array2::zeros(x.raw_dim());
        Zip::from(out.rows_mut())
            .and(x.rows())
            .and(y.rows())
            .for_each(|mut dst, a, b| {
                let xy = a.dot(&b);
                let x2 = a.dot(&a);
                let y2 = b.dot(&b);
                let denom = nan_max(1.0 + 2.0 * c * xy + c * c * x2 * y2, MIN_NORM);
                let coeff_x = (1.0 + 2.0 * c * xy + c * y2) / denom;
                let coeff_y = (1.0 - c * x2) / denom;
                Zip::from(&mut dst)
                    .and(&a)
                    .and(&b)
                    .for_each(|d, &ai, &bi| *d = coeff_x * ai + coeff_y * bi);
            });
        // clamp drift back inside the ball
        Ok(self.projx(out.view()))
    }

    /// Möbius matrix-vector product for every row of `x`, with `w` shaped
    /// `[out, in]`:
    ///
    /// ```text
    /// M ⊗ x = tanh(‖Mx‖/‖x‖ · atanh(√c‖x‖)) · Mx / (√c‖Mx‖)
    /// ```
    ///
    /// Zero rows of `Mx` map to the origin.
    pub fn mobius_matvec(&self, w: ArrayView2<f64>, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        same_len(w.ncols(), x.ncols())?;
        let sqrt_c = self.c().sqrt();
        let mut mx = x.dot(&w.t());
        let x_norms = row_norms(x);
        Zip::from(mx.rows_mut()).and(&x_norms).for_each(|mut row, &xn| {
            let mxn = row.dot(&row).sqrt();
            if mxn < MIN_NORM {
                row.fill(0.0);
                return;
            }
            let a = atanhc(sqrt_c * xn);
            row *= tanhc(sqrt_c * mxn * a) * a;
        });
        Ok(self.projx(mx.view()))
    }

    // ─────────────────────────────────────────────
    // Distance
    // ─────────────────────────────────────────────

    /// ```text
    /// d(x, y) = (2/√c) · atanh(√c‖(−x) ⊕ y‖)
    /// ```
    ///
    /// Evaluated as `2‖·‖·atanhc(√c‖·‖)`, which tends to `2‖y − x‖` as
    /// `c → 0`.
    pub fn dist(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<f64> {
        same_len(x.len(), y.len())?;
        let c = self.c();
        let xy = x.dot(&y);
        finite_or_err("poincare_dist", distance_from_products(c, x.dot(&x), y.dot(&y), xy))
    }

    pub fn sqdist(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<f64> {
        self.dist(x, y).map(|d| d * d)
    }

    /// Row-wise distances between two equally sized batches.
    pub fn dist_rows(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>> {
        same_len(x.nrows(), y.nrows())?;
        same_len(x.ncols(), y.ncols())?;
        let c = self.c();
        let d = Zip::from(x.rows())
            .and(y.rows())
            .map_collect(|a, b| distance_from_products(c, a.dot(&a), b.dot(&b), a.dot(&b)));
        check_finite("poincare_dist_rows", &d)?;
        Ok(d)
    }

    /// Pairwise distance matrix.
    ///
    /// The norm of `(−xᵢ) ⊕ yⱼ` only depends on `‖xᵢ‖²`, `‖yⱼ‖²` and
    /// `⟨xᵢ, yⱼ⟩`, so one Gram product replaces `n·m` Möbius sums.
    pub fn dist_batch(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
        same_len(x.ncols(), y.ncols())?;
        let c = self.c();
        let x2 = x.map_axis(Axis(1), |r| r.dot(&r));
        let y2 = y.map_axis(Axis(1), |r| r.dot(&r));
        let mut gram = x.dot(&y.t());
        Zip::indexed(&mut gram).for_each(|(i, j), g| {
            *g = distance_from_products(c, x2[i], y2[j], *g);
        });
        check_finite("poincare_dist_batch", &gram)?;
        Ok(gram)
    }

    pub fn sqdist_batch(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(self.dist_batch(x, y)?.mapv_into(|d| d * d))
    }

    // ─────────────────────────────────────────────
    // Centroid
    // ─────────────────────────────────────────────

    /// Weighted mean in the tangent space at the origin, mapped back to the
    /// ball. Same weight contract as the Lorentz centroid.
    pub fn centroid(
        &self,
        points: ArrayView2<f64>,
        weights: Option<ArrayView1<f64>>,
    ) -> Result<Array1<f64>> {
        if points.nrows() == 0 || points.ncols() == 0 {
            return Err(HypError::EmptyInput);
        }
        let tangent = self.logmap0(points);
        let mean = match weights {
            Some(w) => {
                validate_weights(w, points.nrows())?;
                w.dot(&tangent) / w.sum()
            }
            None => tangent.mean_axis(Axis(0)).ok_or(HypError::EmptyInput)?,
        };
        let row = mean.insert_axis(Axis(0));
        let out = self.expmap0(row.view()).index_axis_move(Axis(0), 0);
        check_finite("poincare_centroid", &out)?;
        Ok(out)
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

    // ─────────────────────────────────────────────
    // Validation & sampling
    // ─────────────────────────────────────────────

    /// Fail if any row has `‖x‖ ≥ 1/√c`. The reported residual is the row
    /// norm and the tolerance is the ball radius.
    pub fn assert_check_point_on_manifold(&self, x: ArrayView2<f64>) -> Result<()> {
        check_finite("poincare_check", &x)?;
        let c = self.c();
        if c == 0.0 {
            return Ok(());
        }
        let radius = 1.0 / c.sqrt();
        for (row, norm) in row_norms(x).iter().enumerate() {
            if *norm >= radius {
                tracing::warn!(row, norm, radius, "point outside the Poincaré ball");
                return Err(HypError::ManifoldViolation {
                    row,
                    residual: *norm,
                    tolerance: radius,
                });
            }
        }
        Ok(())
    }

    /// `n` random points: tangent samples from `N(0, std²)` lifted by
    /// [`Poincare::expmap0`].
    pub fn random<R: Rng + ?Sized>(
        &self,
        n: usize,
        dim: usize,
        std: f64,
        rng: &mut R,
    ) -> Result<Array2<f64>> {
        let normal = Normal::new(0.0, std)
            .map_err(|e| HypError::Configuration(format!("invalid std {std}: {e}")))?;
        let tangent = Array2::from_shape_simple_fn((n, dim), || normal.sample(rng));
        Ok(self.expmap0(tangent.view()))
    }
}

/// Distance from the three scalar products of `a = −x` and `b = y`.
#[inline]
fn distance_from_products(c: f64, x2: f64, y2: f64, xy: f64) -> f64 {
    let ab = -xy;
    let a_coeff = 1.0 + 2.0 * c * ab + c * y2;
    let b_coeff = 1.0 - c * x2;
    let num_sq = a_coeff * a_coeff * x2 + 2.0 * a_coeff * b_coeff * ab + b_coeff * b_coeff * y2;
    let denom = nan_max(1.0 + 2.0 * c * ab + c * c * x2 * y2, MIN_NORM);
    let norm = nan_max(num_sq, 0.0).sqrt() / denom;
    2.0 * norm * atanhc(c.sqrt() * norm)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
