//! # Lorentz (hyperboloid) model
//!
//! Points live in ℝ^{d+1}: column 0 is the time coordinate, columns `1..`
//! the space coordinates. Every point satisfies
//!
//! ```text
//! ⟨x, x⟩_L = −x₀² + Σ xᵢ² = −1/k,    x₀ > 0
//! ```
//!
//! with curvature `k > 0` (`1/k` is the squared radius). The origin is
//! `(1/√k, 0, …, 0)`.
//!
//! | Function | Direction | Purpose |
//! |---|---|---|
//! | [`Lorentz::projx`] | ℝ^{d+1} → 𝕃 | Recompute the time coordinate |
//! | [`Lorentz::expmap0`] | T₀𝕃 → 𝕃 | Lift tangent vectors at the origin |
//! | [`Lorentz::logmap0`] | 𝕃 → T₀𝕃 | Unproject to the origin tangent space |
//! | [`Lorentz::dist_batch`] | 𝕃ⁿ × 𝕃ᵐ → ℝⁿˣᵐ | Pairwise geodesic distances |
//! | [`Lorentz::centroid`] | 𝕃ⁿ → 𝕃 | Closed-form weighted centroid |
//! | [`Lorentz::entailment_penalty`] | 𝕃 × 𝕃 → ℝ⁺ | Entailment-cone violation |
//!
//! Batches are `[batch, d+1]` arrays. Inputs are never mutated.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayView3, Axis, Zip};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::curvature::{Curvature, MIN_CURVATURE};
use crate::error::{HypError, Result};
use crate::numerics::{
    asinhc, check_finite, finite_or_err, nan_max, row_sq_norms, safe_acosh, safe_cosh, safe_sqrt,
    sinhc, MIN_NORM,
};

/// Default absolute tolerance of the invariant check.
pub const DEFAULT_ATOL: f64 = 1e-5;

/// Default relative tolerance of the invariant check.
pub const DEFAULT_RTOL: f64 = 1e-5;

/// Minimum radius used by [`Lorentz::half_aperture`].
pub const MIN_CONE_RADIUS: f64 = 0.1;

const ANGLE_EPS: f64 = 1e-8;

/// Lorentz manifold with a shared, possibly learnable, curvature.
#[derive(Debug, Clone)]
pub struct Lorentz {
    k: Curvature,
    atol: f64,
    rtol: f64,
}

impl Lorentz {
    /// Build with the default tolerances.
    ///
    /// # Errors
    ///
    /// [`HypError::Configuration`] if the curvature is not strictly positive.
    pub fn new(k: Curvature) -> Result<Self> {
        Self::with_tolerances(k, DEFAULT_ATOL, DEFAULT_RTOL)
    }

    pub fn with_tolerances(k: Curvature, atol: f64, rtol: f64) -> Result<Self> {
        if k.value() <= 0.0 {
            return Err(HypError::Configuration(format!(
                "Lorentz manifold needs curvature > 0, got {}",
                k.value()
            )));
        }
        if !(atol.is_finite() && atol >= 0.0 && rtol.is_finite() && rtol >= 0.0) {
            return Err(HypError::Configuration(format!(
                "tolerances must be finite and ≥ 0 (atol={atol}, rtol={rtol})"
            )));
        }
        Ok(Self { k, atol, rtol })
    }

    /// Handle to the shared curvature cell.
    pub fn curvature(&self) -> &Curvature {
        &self.k
    }

    /// Curvature value as read by every formula, floored at [`MIN_CURVATURE`].
    #[inline]
    pub fn k(&self) -> f64 {
        let k = self.k.value();
        if k < MIN_CURVATURE {
            tracing::warn!(k, floor = MIN_CURVATURE, "Lorentz curvature below floor");
        }
        k.max(MIN_CURVATURE)
    }

    pub fn atol(&self) -> f64 {
        self.atol
    }

    pub fn rtol(&self) -> f64 {
        self.rtol
    }

    /// The origin `(1/√k, 0, …, 0)` of a `dim`-dimensional hyperboloid.
    pub fn origin(&self, dim: usize) -> Array1<f64> {
        let mut o = Array1::zeros(dim + 1);
        o[0] = 1.0 / self.k().sqrt();
        o
    }

    // ─────────────────────────────────────────────
    // Coordinates
    // ─────────────────────────────────────────────

    /// Recompute the time coordinate of every row:
    /// `x₀ = sqrt(1/k + ‖x₁:‖²)`. Column 0 of the input is ignored.
    pub fn projx(&self, x: ArrayView2<f64>) -> Array2<f64> {
        if x.ncols() == 0 {
            return x.to_owned();
        }
        self.add_time(x.slice(s![.., 1..]))
    }

    /// Prepend the time coordinate to spatial coordinates `[batch, d]`.
    pub fn add_time(&self, x_space: ArrayView2<f64>) -> Array2<f64> {
        let inv_k = 1.0 / self.k();
        let sq = row_sq_norms(x_space);
        let mut out = Array2::zeros((x_space.nrows(), x_space.ncols() + 1));
        out.slice_mut(s![.., 1..]).assign(&x_space);
        Zip::from(out.column_mut(0))
            .and(&sq)
            .for_each(|t, &n2| *t = safe_sqrt(inv_k + n2));
        out
    }

    /// Drop the time coordinate.
    pub fn get_space(&self, x: ArrayView2<f64>) -> Array2<f64> {
        if x.ncols() == 0 {
            return x.to_owned();
        }
        x.slice(s![.., 1..]).to_owned()
    }

    // ─────────────────────────────────────────────
    // Inner product and distance
    // ─────────────────────────────────────────────

    /// Lorentzian inner product `−x₀y₀ + Σ xᵢyᵢ` of two points.
    pub fn inner(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<f64> {
        same_len(x.len(), y.len())?;
        if x.is_empty() {
            return Err(HypError::EmptyInput);
        }
        Ok(lorentz_inner(x, y))
    }

    /// Pairwise inner products: `G[i, j] = ⟨xᵢ, yⱼ⟩_L`.
    pub fn inner_batch(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
        same_len(x.ncols(), y.ncols())?;
        if x.ncols() == 0 {
            return Err(HypError::EmptyInput);
        }
        let mut g = x.slice(s![.., 1..]).dot(&y.slice(s![.., 1..]).t());
        let x0 = x.column(0);
        let y0 = y.column(0);
        Zip::indexed(&mut g).for_each(|(i, j), v| *v -= x0[i] * y0[j]);
        Ok(g)
    }

    /// Geodesic distance `acosh(max(−k⟨x,y⟩, 1+ε)) / √k`.
    ///
    /// # Errors
    ///
    /// [`HypError::NumericInstability`] when either point holds NaN/Inf.
    pub fn dist(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<f64> {
        let k = self.k();
        finite_or_err("lorentz_dist", safe_acosh(-k * self.inner(x, y)?) / k.sqrt())
    }

    /// Squared geodesic distance.
    pub fn sqdist(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<f64> {
        self.dist(x, y).map(|d| d * d)
    }

    /// Row-wise distances between two equally sized batches.
    pub fn dist_rows(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>> {
        same_len(x.nrows(), y.nrows())?;
        same_len(x.ncols(), y.ncols())?;
        if x.ncols() == 0 {
            return Err(HypError::EmptyInput);
        }
        let k = self.k();
        let sqrt_k = k.sqrt();
        let d = Zip::from(x.rows())
            .and(y.rows())
            .map_collect(|a, b| safe_acosh(-k * lorentz_inner(a, b)) / sqrt_k);
        check_finite("lorentz_dist_rows", &d)?;
        Ok(d)
    }

    /// Pairwise distance matrix `D[i, j] = d(xᵢ, yⱼ)`.
    pub fn dist_batch(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
        let k = self.k();
        let sqrt_k = k.sqrt();
        let d = self
            .inner_batch(x, y)?
            .mapv_into(|g| safe_acosh(-k * g) / sqrt_k);
        check_finite("lorentz_dist_batch", &d)?;
        Ok(d)
    }

    /// Pairwise squared distance matrix.
    pub fn sqdist_batch(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(self.dist_batch(x, y)?.mapv_into(|d| d * d))
    }

    // ─────────────────────────────────────────────
    // Exponential / logarithmic maps
    // ─────────────────────────────────────────────

    /// Exponential map at the origin.
    ///
    /// `v` is a batch of tangent vectors at the origin in ambient width `d+1`;
    /// their time coordinate is ignored (it is 0 for a true tangent vector).
    ///
    /// ```text
    /// z = √k‖v₁:‖
    /// exp₀(v) = (cosh(z)/√k,  sinh(z)/z · v₁:)
    /// ```
    ///
    /// The time coordinate is produced through [`Lorentz::projx`] so the
    /// invariant holds to rounding.
    pub fn expmap0(&self, v: ArrayView2<f64>) -> Array2<f64> {
        if v.ncols() == 0 {
            return v.to_owned();
        }
        let sqrt_k = self.k().sqrt();
        let mut space = v.slice(s![.., 1..]).to_owned();
        for mut row in space.rows_mut() {
            let z = sqrt_k * row.dot(&row).sqrt();
            row *= sinhc(z);
        }
        self.add_time(space.view())
    }

    /// Logarithmic map at the origin; inverse of [`Lorentz::expmap0`].
    ///
    /// ```text
    /// log₀(x) = (0,  acosh(√k·x₀)/(√k‖x₁:‖) · x₁:)
    /// ```
    ///
    /// On the hyperboloid `acosh(√k·x₀) = asinh(√k‖x₁:‖)`, which is the form
    /// evaluated here: it needs no clamp and stays accurate near the origin.
    pub fn logmap0(&self, x: ArrayView2<f64>) -> Array2<f64> {
        if x.ncols() == 0 {
            return x.to_owned();
        }
        let sqrt_k = self.k().sqrt();
        let mut out = Array2::zeros(x.raw_dim());
        for (mut dst, src) in out.rows_mut().into_iter().zip(x.rows()) {
            let space = src.slice(s![1..]);
            let z = sqrt_k * space.dot(&space).sqrt();
            let scale = asinhc(z);
            dst.slice_mut(s![1..])
                .zip_mut_with(&space, |d, &s| *d = scale * s);
        }
        out
    }

    /// Exponential map at an arbitrary base point `x` for a tangent vector `v`
    /// (`⟨x, v⟩_L = 0`).
    pub fn expmap(&self, x: ArrayView1<f64>, v: ArrayView1<f64>) -> Result<Array1<f64>> {
        same_len(x.len(), v.len())?;
        if x.is_empty() {
            return Err(HypError::EmptyInput);
        }
        let sqrt_k = self.k().sqrt();
        let v_norm = nan_max(lorentz_inner(v, v), 0.0).sqrt();
        let z = sqrt_k * v_norm;
        let moved = &x * safe_cosh(z) + &v * sinhc(z);
        let row = moved.insert_axis(Axis(0));
        Ok(self.projx(row.view()).index_axis_move(Axis(0), 0))
    }

    /// Logarithmic map at `x`: the tangent vector at `x` pointing to `y`
    /// whose Lorentzian norm equals `d(x, y)`.
    pub fn logmap(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<Array1<f64>> {
        let k = self.k();
        let alpha = nan_max(-k * self.inner(x, y)?, 1.0);
        // y − αx is tangent at x with Lorentzian norm sqrt(α² − 1)/√k.
        let direction = &y - &(&x * alpha);
        let t = nan_max(alpha * alpha - 1.0, 0.0).sqrt();
        Ok(direction * asinhc(t))
    }

    // ─────────────────────────────────────────────
    // Centroid
    // ─────────────────────────────────────────────

    /// Weighted centroid of `points` (`[n, d+1]`).
    ///
    /// ```text
    /// a = Σ wᵢ xᵢ            (uniform mean when `weights` is None)
    /// c = projx( a / (√k · sqrt(|⟨a, a⟩_L|)) )
    /// ```
    ///
    /// This is the closed-form Lorentz-normalized sum, not an iterative
    /// Fréchet mean. For two points with equal weights it is the geodesic
    /// midpoint.
    ///
    /// # Errors
    ///
    /// [`HypError::EmptyInput`] for no points; [`HypError::InvalidWeights`]
    /// if weights are negative, non-finite, mis-sized or sum to ≤ 0.
    pub fn centroid(
        &self,
        points: ArrayView2<f64>,
        weights: Option<ArrayView1<f64>>,
    ) -> Result<Array1<f64>> {
        if points.nrows() == 0 || points.ncols() == 0 {
            return Err(HypError::EmptyInput);
        }
        let avg = match weights {
            Some(w) => {
                validate_weights(w, points.nrows())?;
                w.dot(&points)
            }
            None => points
                .mean_axis(Axis(0))
                .ok_or(HypError::EmptyInput)?,
        };
        let norm = nan_max(lorentz_inner(avg.view(), avg.view()).abs(), MIN_NORM).sqrt();
        let normalized = avg / (self.k().sqrt() * norm);
        let row = normalized.insert_axis(Axis(0));
        let out = self.projx(row.view()).index_axis_move(Axis(0), 0);
        check_finite("lorentz_centroid", &out)?;
        Ok(out)
    }

    /// Centroid of every sequence in a `[batch, seq, d+1]` array.
    ///
    /// `weights`, when given, is `[batch, seq]`.
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
            let c = self.centroid(points.index_axis(Axis(0), b), w)?;
            dst.assign(&c);
        }
        Ok(out)
    }

    // ─────────────────────────────────────────────
    // Entailment cones
    // ─────────────────────────────────────────────

    /// Exterior angle at `x` between the ray from the origin through `x`
    /// and the geodesic from `x` to `y`, row by row.
    pub fn oxy_angle(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>> {
        same_len(x.nrows(), y.nrows())?;
        same_len(x.ncols(), y.ncols())?;
        let k = self.k();
        let inv_k = 1.0 / k;
        let xs = self.get_space(x);
        let ys = self.get_space(y);
        Ok(Zip::from(xs.rows()).and(ys.rows()).map_collect(|a, b| {
            let a_sq = a.dot(&a);
            let x_time = safe_sqrt(inv_k + a_sq);
            let y_time = safe_sqrt(inv_k + b.dot(&b));
            let c_xyl = k * (a.dot(&b) - x_time * y_time);
            let numer = y_time + c_xyl * x_time;
            let denom = nan_max(c_xyl * c_xyl - 1.0, ANGLE_EPS).sqrt();
            let cos = numer / (a_sq.sqrt() * denom + ANGLE_EPS);
            cos.clamp(-1.0 + ANGLE_EPS, 1.0 - ANGLE_EPS).acos()
        }))
    }

    /// Half-aperture of the entailment cone rooted at each row of `x`.
    pub fn half_aperture(&self, x: ArrayView2<f64>) -> Array1<f64> {
        let sqrt_k = self.k().sqrt();
        let xs = self.get_space(x);
        xs.map_axis(Axis(1), |row| {
            let s = 2.0 * MIN_CONE_RADIUS / (row.dot(&row).sqrt() * sqrt_k + ANGLE_EPS);
            s.clamp(-1.0 + ANGLE_EPS, 1.0 - ANGLE_EPS).asin()
        })
    }

    /// `max(0, oxy_angle(x, y) − half_aperture(x))`: zero when `y` lies
    /// inside the cone of `x`.
    pub fn entailment_penalty(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>> {
        let angle = self.oxy_angle(x, y)?;
        let aperture = self.half_aperture(x);
        Ok(Zip::from(&angle)
            .and(&aperture)
            .map_collect(|&a, &h| (a - h).max(0.0)))
    }

    // ─────────────────────────────────────────────
    // Validation & sampling
    // ─────────────────────────────────────────────

    /// Fail if any row violates `|⟨x,x⟩_L + 1/k| ≤ atol + rtol·|1/k|` or has
    /// `x₀ ≤ 0`.
    ///
    /// This never corrects a point; callers invoke it at boundaries where a
    /// bad point would corrupt every later distance.
    pub fn assert_check_point_on_manifold(&self, x: ArrayView2<f64>) -> Result<()> {
        check_finite("lorentz_check", &x)?;
        if x.ncols() == 0 {
            return Err(HypError::EmptyInput);
        }
        let target = 1.0 / self.k();
        let tolerance = self.atol + self.rtol * target;
        for (row, p) in x.rows().into_iter().enumerate() {
            let residual = (lorentz_inner(p, p) + target).abs();
            if residual > tolerance || p[0] <= 0.0 {
                tracing::warn!(row, residual, tolerance, "point off the hyperboloid");
                return Err(HypError::ManifoldViolation {
                    row,
                    residual,
                    tolerance,
                });
            }
        }
        Ok(())
    }

    /// `n` random points of a `dim`-dimensional hyperboloid: spatial
    /// coordinates drawn from `N(0, std²)`, then [`Lorentz::add_time`].
    pub fn random<R: Rng + ?Sized>(
        &self,
        n: usize,
        dim: usize,
        std: f64,
        rng: &mut R,
    ) -> Result<Array2<f64>> {
        let normal = Normal::new(0.0, std)
            .map_err(|e| HypError::Configuration(format!("invalid std {std}: {e}")))?;
        let space = Array2::from_shape_simple_fn((n, dim), || normal.sample(rng));
        Ok(self.add_time(space.view()))
    }
}

#[inline]
pub(crate) fn lorentz_inner(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    -x[0] * y[0] + x.slice(s![1..]).dot(&y.slice(s![1..]))
}

#[inline]
pub(crate) fn same_len(expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(HypError::DimensionMismatch { expected, got })
    }
}

pub(crate) fn validate_weights(w: ArrayView1<f64>, n: usize) -> Result<()> {
    same_len(n, w.len()).map_err(|_| {
        HypError::InvalidWeights(format!("expected {n} weights, got {}", w.len()))
    })?;
    if let Some(bad) = w.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(HypError::InvalidWeights(format!(
            "weights must be finite and ≥ 0, found {bad}"
        )));
    }
    let total = w.sum();
    if total <= 0.0 {
        return Err(HypError::InvalidWeights(format!(
            "weights must sum to > 0, got {total}"
        )));
    }
    Ok(())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
