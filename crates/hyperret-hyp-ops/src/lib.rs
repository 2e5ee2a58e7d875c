//! # hyperret-hyp-ops
//!
//! Hyperbolic geometry kernels for embedding retrieval models.
//!
//! Every crate that touches manifold coordinates imports from here. All
//! kernels work on `f64` ndarray batches (`[batch, dim]` rows, `[batch, seq,
//! dim]` sequences), never mutate their inputs, and clamp every
//! transcendental argument so outputs stay finite for any finite input.
//!
//! ## Engines
//!
//! | Engine | Model | Curvature |
//! |---|---|---|
//! | [`Lorentz`] | hyperboloid in ℝ^{d+1} | `k > 0` |
//! | [`Poincare`] | open ball ‖x‖ < 1/√c | `c ≥ 0` |
//! | [`Euclidean`] | flat ℝᵈ | none |
//!
//! [`Manifold`] wraps the three behind one closed enum, chosen at
//! construction from a [`ManifoldKind`].
//!
//! ## Curvature
//!
//! A [`Curvature`] is shared by reference: the manifold and every layer hold
//! clones of the same cell, so an optimizer update between passes is seen
//! everywhere at once.
//!
//! ## Safety invariant
//!
//! Every point returned by `projx`, `expmap0`, `centroid` and `random`
//! satisfies its engine's invariant. Use `assert_check_point_on_manifold` to
//! validate external inputs.

pub mod curvature;
pub mod error;
pub mod euclidean;
pub mod lorentz;
pub mod manifold;
pub mod numerics;
pub mod poincare;

pub use curvature::{Curvature, CurvatureSnapshot, MIN_CURVATURE};
pub use error::{HypError, Result};
pub use euclidean::Euclidean;
pub use lorentz::Lorentz;
pub use manifold::{Manifold, ManifoldKind};
pub use numerics::{check_finite, l2_normalize_rows};
pub use poincare::Poincare;
