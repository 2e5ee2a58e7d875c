//! # Closed manifold selection
//!
//! Model code chooses its geometry once, from configuration, and then talks
//! to a single [`Manifold`] value. The set of geometries is closed:
//!
//! | Kind | Point width | Invariant |
//! |---|---|---|
//! | `euclidean` | d | finite |
//! | `poincare` | d | ‖x‖ < 1/√c |
//! | `lorentz` | d + 1 | ⟨x,x⟩_L = −1/k, x₀ > 0 |
//!
//! Operations keep each engine's own conventions: Lorentz points and tangent
//! vectors are `d + 1` wide, the others `d` wide. Use
//! [`Manifold::ambient_dim`] to size buffers.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayView3};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::curvature::Curvature;
use crate::error::{HypError, Result};
use crate::euclidean::Euclidean;
use crate::lorentz::Lorentz;
use crate::poincare::Poincare;

/// Configuration-level name of a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifoldKind {
    Euclidean,
    Poincare,
    Lorentz,
}

impl ManifoldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ManifoldKind::Euclidean => "euclidean",
            ManifoldKind::Poincare => "poincare",
            ManifoldKind::Lorentz => "lorentz",
        }
    }
}

impl fmt::Display for ManifoldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManifoldKind {
    type Err = HypError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euclidean" => Ok(ManifoldKind::Euclidean),
            "poincare" => Ok(ManifoldKind::Poincare),
            "lorentz" => Ok(ManifoldKind::Lorentz),
            other => Err(HypError::Configuration(format!(
                "unknown manifold '{other}' (expected euclidean, poincare or lorentz)"
            ))),
        }
    }
}

/// One of the three supported geometries.
#[derive(Debug, Clone)]
pub enum Manifold {
    Euclidean(Euclidean),
    Poincare(Poincare),
    Lorentz(Lorentz),
}

impl Manifold {
    /// Build the engine for `kind`. `curvature` is ignored for Euclidean;
    /// `atol`/`rtol` only matter for Lorentz.
    pub fn build(kind: ManifoldKind, curvature: Curvature, atol: f64, rtol: f64) -> Result<Self> {
        let manifold = match kind {
            ManifoldKind::Euclidean => Manifold::Euclidean(Euclidean),
            ManifoldKind::Poincare => Manifold::Poincare(Poincare::new(curvature)),
            ManifoldKind::Lorentz => {
                Manifold::Lorentz(Lorentz::with_tolerances(curvature, atol, rtol)?)
            }
        };
        tracing::info!(
            kind = %kind,
            curvature = manifold.curvature().map(Curvature::value),
            learnable = manifold.curvature().is_some_and(Curvature::is_learnable),
            "manifold built"
        );
        Ok(manifold)
    }

    pub fn kind(&self) -> ManifoldKind {
        match self {
            Manifold::Euclidean(_) => ManifoldKind::Euclidean,
            Manifold::Poincare(_) => ManifoldKind::Poincare,
            Manifold::Lorentz(_) => ManifoldKind::Lorentz,
        }
    }

    /// Shared curvature handle, `None` for Euclidean.
    pub fn curvature(&self) -> Option<&Curvature> {
        match self {
            Manifold::Euclidean(_) => None,
            Manifold::Poincare(m) => Some(m.curvature()),
            Manifold::Lorentz(m) => Some(m.curvature()),
        }
    }

    pub fn is_hyperbolic(&self) -> bool {
        !matches!(self, Manifold::Euclidean(_))
    }

    /// Stored width of a point whose intrinsic dimension is `dim`.
    pub fn ambient_dim(&self, dim: usize) -> usize {
        match self {
            Manifold::Lorentz(_) => dim + 1,
            _ => dim,
        }
    }

    pub fn as_lorentz(&self) -> Option<&Lorentz> {
        match self {
            Manifold::Lorentz(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_poincare(&self) -> Option<&Poincare> {
        match self {
            Manifold::Poincare(m) => Some(m),
            _ => None,
        }
    }

    /// Origin of the `dim`-dimensional manifold, in ambient width.
    pub fn origin(&self, dim: usize) -> Array1<f64> {
        match self {
            Manifold::Euclidean(m) => m.origin(dim),
            Manifold::Poincare(m) => m.origin(dim),
            Manifold::Lorentz(m) => m.origin(dim),
        }
    }

    pub fn projx(&self, x: ArrayView2<f64>) -> Array2<f64> {
        match self {
            Manifold::Euclidean(m) => m.projx(x),
            Manifold::Poincare(m) => m.projx(x),
            Manifold::Lorentz(m) => m.projx(x),
        }
    }

    pub fn expmap0(&self, v: ArrayView2<f64>) -> Array2<f64> {
        match self {
            Manifold::Euclidean(m) => m.expmap0(v),
            Manifold::Poincare(m) => m.expmap0(v),
            Manifold::Lorentz(m) => m.expmap0(v),
        }
    }

    pub fn logmap0(&self, x: ArrayView2<f64>) -> Array2<f64> {
        match self {
            Manifold::Euclidean(m) => m.logmap0(x),
            Manifold::Poincare(m) => m.logmap0(x),
            Manifold::Lorentz(m) => m.logmap0(x),
        }
    }

    pub fn dist(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<f64> {
        match self {
            Manifold::Euclidean(m) => m.dist(x, y),
            Manifold::Poincare(m) => m.dist(x, y),
            Manifold::Lorentz(m) => m.dist(x, y),
        }
    }

    pub fn sqdist(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<f64> {
        match self {
            Manifold::Euclidean(m) => m.sqdist(x, y),
            Manifold::Poincare(m) => m.sqdist(x, y),
            Manifold::Lorentz(m) => m.sqdist(x, y),
        }
    }

    pub fn dist_rows(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array1<f64>> {
        match self {
            Manifold::Euclidean(m) => m.dist_rows(x, y),
            Manifold::Poincare(m) => m.dist_rows(x, y),
            Manifold::Lorentz(m) => m.dist_rows(x, y),
        }
    }

    pub fn dist_batch(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
        match self {
            Manifold::Euclidean(m) => m.dist_batch(x, y),
            Manifold::Poincare(m) => m.dist_batch(x, y),
            Manifold::Lorentz(m) => m.dist_batch(x, y),
        }
    }

    pub fn sqdist_batch(&self, x: ArrayView2<f64>, y: ArrayView2<f64>) -> Result<Array2<f64>> {
        match self {
            Manifold::Euclidean(m) => m.sqdist_batch(x, y),
            Manifold::Poincare(m) => m.sqdist_batch(x, y),
            Manifold::Lorentz(m) => m.sqdist_batch(x, y),
        }
    }

    pub fn centroid(
        &self,
        points: ArrayView2<f64>,
        weights: Option<ArrayView1<f64>>,
    ) -> Result<Array1<f64>> {
        match self {
            Manifold::Euclidean(m) => m.centroid(points, weights),
            Manifold::Poincare(m) => m.centroid(points, weights),
            Manifold::Lorentz(m) => m.centroid(points, weights),
        }
    }

    pub fn centroid_batch(
        &self,
        points: ArrayView3<f64>,
        weights: Option<ArrayView2<f64>>,
    ) -> Result<Array2<f64>> {
        match self {
            Manifold::Euclidean(m) => m.centroid_batch(points, weights),
            Manifold::Poincare(m) => m.centroid_batch(points, weights),
            Manifold::Lorentz(m) => m.centroid_batch(points, weights),
        }
    }

    pub fn assert_check_point_on_manifold(&self, x: ArrayView2<f64>) -> Result<()> {
        match self {
            Manifold::Euclidean(m) => m.assert_check_point_on_manifold(x),
            Manifold::Poincare(m) => m.assert_check_point_on_manifold(x),
            Manifold::Lorentz(m) => m.assert_check_point_on_manifold(x),
        }
    }

    /// `n` random points of intrinsic dimension `dim`.
    pub fn random<R: Rng + ?Sized>(
        &self,
        n: usize,
        dim: usize,
        std: f64,
        rng: &mut R,
    ) -> Result<Array2<f64>> {
        match self {
            Manifold::Euclidean(_) => {
                let normal = Normal::new(0.0, std)
                    .map_err(|e| HypError::Configuration(format!("invalid std {std}: {e}")))?;
                Ok(Array2::from_shape_simple_fn((n, dim), || normal.sample(rng)))
            }
            Manifold::Poincare(m) => m.random(n, dim, std, rng),
            Manifold::Lorentz(m) => m.random(n, dim, std, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_known_names() {
        assert_eq!("lorentz".parse::<ManifoldKind>().unwrap(), ManifoldKind::Lorentz);
        assert_eq!(" Poincare ".parse::<ManifoldKind>().unwrap(), ManifoldKind::Poincare);
        assert_eq!("euclidean".parse::<ManifoldKind>().unwrap(), ManifoldKind::Euclidean);
    }

    #[test]
    fn kind_rejects_unknown_name() {
        assert!(matches!(
            "sphere".parse::<ManifoldKind>(),
            Err(HypError::Configuration(_))
        ));
    }

    #[test]
    fn kind_serde_uses_lowercase() {
        let json = serde_json::to_string(&ManifoldKind::Poincare).unwrap();
        assert_eq!(json, "\"poincare\"");
    }

    #[test]
    fn build_reports_geometry() {
        let k = Curvature::fixed(1.0).unwrap();
        let m = Manifold::build(ManifoldKind::Lorentz, k.clone(), 1e-5, 1e-5).unwrap();
        assert_eq!(m.kind(), ManifoldKind::Lorentz);
        assert!(m.is_hyperbolic());
        assert_eq!(m.ambient_dim(4), 5);
        assert!(m.curvature().unwrap().shares_cell_with(&k));
        assert!(m.as_lorentz().is_some());

        let e = Manifold::build(ManifoldKind::Euclidean, k, 1e-5, 1e-5).unwrap();
        assert!(e.curvature().is_none());
        assert_eq!(e.ambient_dim(4), 4);
    }

    #[test]
    fn lorentz_with_zero_curvature_fails() {
        let k = Curvature::fixed(0.0).unwrap();
        assert!(Manifold::build(ManifoldKind::Lorentz, k, 1e-5, 1e-5).is_err());
    }

    #[test]
    fn random_points_have_ambient_width() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;
        let mut rng = StdRng::seed_from_u64(3);
        for kind in [ManifoldKind::Euclidean, ManifoldKind::Poincare, ManifoldKind::Lorentz] {
            let m = Manifold::build(kind, Curvature::fixed(1.0).unwrap(), 1e-5, 1e-5).unwrap();
            let pts = m.random(5, 3, 0.5, &mut rng).unwrap();
            assert_eq!(pts.ncols(), m.ambient_dim(3));
            m.assert_check_point_on_manifold(pts.view()).unwrap();
        }
    }
}
