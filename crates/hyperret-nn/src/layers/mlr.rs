//! Hyperbolic multinomial logistic regression.
//!
//! Each class owns a hyperbolic hyperplane; the logit of a point is its
//! signed distance to that hyperplane scaled by the hyperplane's norm.
//! Feed the logits to an ordinary softmax / cross-entropy.

use ndarray::{s, Array1, Array2, ArrayView2, Axis, Zip};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use hyperret_hyp_ops::numerics::{nan_max, safe_cosh, safe_sinh, safe_sqrt, MIN_NORM};
use hyperret_hyp_ops::{check_finite, Lorentz, Poincare};

use crate::error::{expect_width, NnError, Result};
use crate::layers::Layer;

/// `U(−1/√dim, 1/√dim)` parameters, the kaiming-uniform bound for `a = √5`.
fn uniform_init<R: Rng + ?Sized>(shape: (usize, usize), rng: &mut R) -> Result<Array2<f64>> {
    let (rows, dim) = shape;
    if rows == 0 || dim == 0 {
        return Err(NnError::Shape(format!(
            "MLR needs at least one class and one feature, got {rows} x {dim}"
        )));
    }
    let bound = 1.0 / (dim as f64).sqrt();
    let dist = Uniform::new_inclusive(-bound, bound);
    Ok(Array2::from_shape_simple_fn(shape, || dist.sample(&mut *rng)))
}

// ─────────────────────────────────────────────
// Poincaré
// ─────────────────────────────────────────────

/// Softmax classifier on the Poincaré ball.
///
/// Class `j` has an offset `pⱼ = exp₀(p_valsⱼ)` and a normal `aⱼ` scaled by
/// the conformal factor `1 − c‖pⱼ‖²`:
///
/// ```text
/// zᵢⱼ   = (−pⱼ) ⊕ xᵢ
/// logit = λ(pⱼ)‖aⱼ‖/√c · asinh( 2√c⟨zᵢⱼ, aⱼ⟩ / (‖aⱼ‖(1 − c‖zᵢⱼ‖²)) )
/// λ(p)  = 2 / (1 − c‖p‖²)
/// ```
///
/// At `c = 0` this is the Euclidean limit `4⟨x − p, a⟩`.
#[derive(Debug, Clone)]
pub struct PoincareMLR {
    ball: Poincare,
    a_vals: Array2<f64>,
    p_vals: Array2<f64>,
}

impl PoincareMLR {
    pub fn new<R: Rng + ?Sized>(
        ball: Poincare,
        dim: usize,
        n_classes: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let a_vals = uniform_init((n_classes, dim), rng)?;
        let p_vals = uniform_init((n_classes, dim), rng)?;
        Ok(Self { ball, a_vals, p_vals })
    }

    /// Build from explicit `[n_classes, dim]` normals and tangent offsets.
    pub fn from_parts(ball: Poincare, a_vals: Array2<f64>, p_vals: Array2<f64>) -> Result<Self> {
        if a_vals.dim() != p_vals.dim() {
            return Err(NnError::Shape(format!(
                "poincare MLR: normals {:?} and offsets {:?} differ",
                a_vals.dim(),
                p_vals.dim()
            )));
        }
        Ok(Self { ball, a_vals, p_vals })
    }

    pub fn dim(&self) -> usize {
        self.a_vals.ncols()
    }

    pub fn n_classes(&self) -> usize {
        self.a_vals.nrows()
    }

    pub fn a_vals_mut(&mut self) -> &mut Array2<f64> {
        &mut self.a_vals
    }

    pub fn p_vals_mut(&mut self) -> &mut Array2<f64> {
        &mut self.p_vals
    }

    /// Logits `[batch, n_classes]` for points `[batch, dim]` in the ball.
    pub fn logits(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        expect_width("poincare MLR", self.dim(), x.ncols())?;
        let c = self.ball.c();
        let mut out = Array2::zeros((x.nrows(), self.n_classes()));

        if c == 0.0 {
            for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
                let a = self.a_vals.row(j);
                let p = self.p_vals.row(j);
                let offset = p.dot(&a);
                Zip::from(&mut col)
                    .and(x.rows())
                    .for_each(|o, xi| *o = 4.0 * (xi.dot(&a) - offset));
            }
            check_finite("poincare_mlr", &out)?;
            return Ok(out);
        }

        let sqrt_c = c.sqrt();
        let p = self.ball.expmap0(self.p_vals.view());
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let pj = p.row(j);
            let one_minus = nan_max(1.0 - c * pj.dot(&pj), MIN_NORM);
            let a: Array1<f64> = &self.a_vals.row(j) * one_minus;
            let a_norm = nan_max(a.dot(&a).sqrt(), MIN_NORM);
            let lambda = 2.0 / one_minus;

            let neg_p = (-&pj).insert_axis(Axis(0));
            let neg_p = neg_p
                .broadcast(x.raw_dim())
                .ok_or_else(|| NnError::Shape("MLR offset does not broadcast".into()))?;
            let z = self.ball.mobius_add(neg_p, x)?;

            Zip::from(&mut col).and(z.rows()).for_each(|o, zi| {
                let num = 2.0 * sqrt_c * zi.dot(&a);
                let den = a_norm * nan_max(1.0 - c * zi.dot(&zi), MIN_NORM);
                *o = lambda * a_norm / sqrt_c * (num / den).asinh();
            });
        }
        check_finite("poincare_mlr", &out)?;
        Ok(out)
    }
}

impl Layer for PoincareMLR {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.logits(x)
    }
}

// ─────────────────────────────────────────────
// Lorentz
// ─────────────────────────────────────────────

/// Softmax classifier on the hyperboloid.
///
/// Class `j` has a spatial normal `zⱼ` and a signed offset `aⱼ`; with
/// `s = √k`:
///
/// ```text
/// w_t   = sinh(s·aⱼ)‖zⱼ‖
/// α     = −w_t·x₀ + cosh(s·aⱼ)⟨x₁:, zⱼ⟩
/// β     = sqrt(cosh²(s·aⱼ)‖zⱼ‖² − w_t²)
/// logit = β/s · asinh(s·α/β)
/// ```
#[derive(Debug, Clone)]
pub struct LorentzMLR {
    lorentz: Lorentz,
    a: Array1<f64>,
    z: Array2<f64>,
}

impl LorentzMLR {
    /// `dim` is the intrinsic dimension; inputs are `dim + 1` wide.
    pub fn new<R: Rng + ?Sized>(
        lorentz: Lorentz,
        dim: usize,
        n_classes: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let z = uniform_init((n_classes, dim), rng)?;
        let bound = 1.0 / (dim as f64).sqrt();
        let dist = Uniform::new_inclusive(-bound, bound);
        let a = Array1::from_shape_simple_fn(n_classes, || dist.sample(&mut *rng));
        Ok(Self { lorentz, a, z })
    }

    /// Build from explicit offsets `[n_classes]` and normals `[n_classes, dim]`.
    pub fn from_parts(lorentz: Lorentz, a: Array1<f64>, z: Array2<f64>) -> Result<Self> {
        expect_width("lorentz MLR offsets", z.nrows(), a.len())?;
        Ok(Self { lorentz, a, z })
    }

    pub fn dim(&self) -> usize {
        self.z.ncols()
    }

    pub fn n_classes(&self) -> usize {
        self.z.nrows()
    }

    pub fn a_mut(&mut self) -> &mut Array1<f64> {
        &mut self.a
    }

    pub fn z_mut(&mut self) -> &mut Array2<f64> {
        &mut self.z
    }

    /// Logits `[batch, n_classes]` for points `[batch, dim + 1]`.
    pub fn logits(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        expect_width("lorentz MLR", self.dim() + 1, x.ncols())?;
        let s = self.lorentz.k().sqrt();
        let mut out = x.slice(s![.., 1..]).dot(&self.z.t());
        let time = x.column(0);

        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let zj = self.z.row(j);
            let z_norm = zj.dot(&zj).sqrt();
            let sa = s * self.a[j];
            let (sinh, cosh) = (safe_sinh(sa), safe_cosh(sa));
            let w_t = sinh * z_norm;
            let beta = safe_sqrt(cosh * cosh * z_norm * z_norm - w_t * w_t);
            Zip::from(&mut col).and(&time).for_each(|o, &x0| {
                let alpha = -w_t * x0 + cosh * *o;
                *o = beta / s * (s * alpha / beta).asinh();
            });
        }
        check_finite("lorentz_mlr", &out)?;
        Ok(out)
    }
}

impl Layer for LorentzMLR {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.logits(x)
    }
}
