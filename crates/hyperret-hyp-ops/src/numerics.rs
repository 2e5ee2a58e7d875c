//! Numerical stability helpers shared by every manifold engine.
//!
//! Transcendental functions only see clamped arguments here. The `*c`
//! helpers (`sinhc`, `tanhc`, ...) evaluate `f(z) / z` and switch to the
//! Taylor series below [`TAYLOR_THRESHOLD`], which is the scalar form of a
//! masked `where` selection: both branches agree to machine precision at the
//! switch point, so the value and its derivative stay continuous.

use ndarray::{Array1, Array2, ArrayBase, ArrayView2, Axis, Data, Dimension, Zip};

use crate::error::{HypError, Result};

/// Lower clamp applied to norms before dividing by them.
pub const MIN_NORM: f64 = 1e-15;

/// `acosh` arguments are clamped to `≥ 1 + ACOSH_EPS`.
pub const ACOSH_EPS: f64 = 1e-15;

/// `sqrt` radicands are clamped to `≥ SQRT_EPS`.
pub const SQRT_EPS: f64 = 1e-15;

/// `atanh` arguments are clamped to `|z| ≤ 1 − ATANH_EPS`.
pub const ATANH_EPS: f64 = 1e-15;

/// Margin kept between Poincaré points and the ball boundary `1/√c`.
pub const BALL_EPS: f64 = 1e-5;

/// Below this magnitude the `f(z)/z` helpers use their Taylor expansion.
pub const TAYLOR_THRESHOLD: f64 = 1e-4;

/// Maximum argument for `sinh`/`cosh`. `cosh(50)² ≈ 2.7e42` keeps the
/// time coordinate and its square finite in f64.
pub const MAX_HYPERBOLIC_ARG: f64 = 50.0;

/// `max` that keeps NaN instead of returning the floor.
#[inline]
pub fn nan_max(x: f64, floor: f64) -> f64 {
    if x.is_nan() {
        x
    } else {
        x.max(floor)
    }
}

/// Safe `acosh`: the argument is clamped to `1 + ACOSH_EPS`. NaN passes
/// through so [`check_finite`] can report it.
#[inline]
pub fn safe_acosh(x: f64) -> f64 {
    nan_max(x, 1.0 + ACOSH_EPS).acosh()
}

/// Safe `atanh`: the argument is clamped inside `(-1, 1)`.
#[inline]
pub fn safe_atanh(x: f64) -> f64 {
    x.clamp(-1.0 + ATANH_EPS, 1.0 - ATANH_EPS).atanh()
}

/// Safe `sqrt`: the radicand is clamped to `SQRT_EPS`. NaN passes through.
#[inline]
pub fn safe_sqrt(x: f64) -> f64 {
    nan_max(x, SQRT_EPS).sqrt()
}

/// `sinh` with overflow protection.
#[inline]
pub fn safe_sinh(x: f64) -> f64 {
    x.clamp(-MAX_HYPERBOLIC_ARG, MAX_HYPERBOLIC_ARG).sinh()
}

/// `cosh` with overflow protection.
#[inline]
pub fn safe_cosh(x: f64) -> f64 {
    x.clamp(-MAX_HYPERBOLIC_ARG, MAX_HYPERBOLIC_ARG).cosh()
}

/// `sinh(z) / z`, equal to 1 at the origin.
#[inline]
pub fn sinhc(z: f64) -> f64 {
    if z.abs() < TAYLOR_THRESHOLD {
        1.0 + z * z / 6.0
    } else {
        safe_sinh(z) / z
    }
}

/// `tanh(z) / z`, equal to 1 at the origin.
#[inline]
pub fn tanhc(z: f64) -> f64 {
    if z.abs() < TAYLOR_THRESHOLD {
        1.0 - z * z / 3.0
    } else {
        z.tanh() / z
    }
}

/// `asinh(z) / z`, equal to 1 at the origin.
#[inline]
pub fn asinhc(z: f64) -> f64 {
    if z.abs() < TAYLOR_THRESHOLD {
        1.0 - z * z / 6.0
    } else {
        z.asinh() / z
    }
}

/// `atanh(z) / z` with the argument clamped inside the unit interval.
#[inline]
pub fn atanhc(z: f64) -> f64 {
    if z.abs() < TAYLOR_THRESHOLD {
        1.0 + z * z / 3.0
    } else {
        safe_atanh(z) / z
    }
}

/// Euclidean norm of every row.
pub fn row_norms(x: ArrayView2<f64>) -> Array1<f64> {
    x.map_axis(Axis(1), |row| row.dot(&row).sqrt())
}

/// Squared Euclidean norm of every row.
pub fn row_sq_norms(x: ArrayView2<f64>) -> Array1<f64> {
    x.map_axis(Axis(1), |row| row.dot(&row))
}

/// L2-normalize every row: `x / max(‖x‖, 1e-12)`.
pub fn l2_normalize_rows(x: ArrayView2<f64>) -> Array2<f64> {
    let norms = row_norms(x);
    let mut out = x.to_owned();
    Zip::from(out.rows_mut()).and(&norms).for_each(|mut row, &n| {
        row /= n.max(1e-12);
    });
    out
}

/// Scalar form of [`check_finite`].
pub fn finite_or_err(op: &'static str, v: f64) -> Result<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        tracing::warn!(op, value = v, "non-finite value after clamping");
        Err(HypError::NumericInstability {
            op,
            detail: format!("non-finite result {v}"),
        })
    }
}

/// Post-hoc guard: fails with [`HypError::NumericInstability`] if any entry
/// of `x` is NaN or infinite.
pub fn check_finite<S, D>(op: &'static str, x: &ArrayBase<S, D>) -> Result<()>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    match x.iter().position(|v| !v.is_finite()) {
        None => Ok(()),
        Some(flat) => {
            tracing::warn!(op, index = flat, "non-finite value after clamping");
            Err(HypError::NumericInstability {
                op,
                detail: format!("non-finite value at flat index {flat}"),
            })
        }
    }
}
