//! Configuration for the manifold stack.

use serde::{Deserialize, Serialize};

use hyperret_hyp_ops::{Curvature, Manifold, ManifoldKind};

use crate::activation::Activation;
use crate::error::{NnError, Result};
use crate::mapper::ManifoldMapper;

/// Geometry and projection settings shared by a model's mapper, layers and
/// scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifoldConfig {
    // ── Geometry ──────────────────────────────────────────────────────────────

    /// Which manifold to embed into.
    /// Default: `lorentz`
    pub manifold: ManifoldKind,

    /// Initial curvature magnitude (`k` for Lorentz, `c` for Poincaré).
    /// Default: `1.0`
    pub curv: f64,

    /// Whether the optimizer may update the curvature between passes.
    /// Default: `false`
    pub curv_learnable: bool,

    /// Absolute tolerance of the Lorentz invariant check.
    /// Default: `1e-5`
    pub atol: f64,

    /// Relative tolerance of the Lorentz invariant check.
    /// Default: `1e-5`
    pub rtol: f64,

    // ── Mapper ────────────────────────────────────────────────────────────────

    /// Norm cap applied to encoder features before lifting. `None` switches
    /// the mapper to L2 normalization.
    /// Default: `Some(2.0)`
    pub clip_radius: Option<f64>,

    /// Force L2 normalization even when `clip_radius` is set.
    /// Default: `false`
    pub use_normalize: bool,

    // ── Layers ────────────────────────────────────────────────────────────────

    /// Dropout probability of projection heads.
    /// Default: `0.1`
    pub dropout: f64,

    /// Activation of hidden projection stages.
    /// Default: `relu`
    pub act_func: Activation,
}

impl Default for ManifoldConfig {
    fn default() -> Self {
        Self {
            manifold:       ManifoldKind::Lorentz,
            curv:           1.0,
            curv_learnable: false,
            atol:           1e-5,
            rtol:           1e-5,
            clip_radius:    Some(2.0),
            use_normalize:  false,
            dropout:        0.1,
            act_func:       Activation::Relu,
        }
    }
}

impl ManifoldConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// | Variable                   | Default   |
    /// |----------------------------|-----------|
    /// | `HYPERRET_MANIFOLD`        | `lorentz` |
    /// | `HYPERRET_CURV`            | `1.0`     |
    /// | `HYPERRET_CURV_LEARNABLE`  | `false`   |
    /// | `HYPERRET_ATOL`            | `1e-5`    |
    /// | `HYPERRET_RTOL`            | `1e-5`    |
    /// | `HYPERRET_CLIP_RADIUS`     | `2.0` (`none` disables) |
    /// | `HYPERRET_USE_NORMALIZE`   | `false`   |
    /// | `HYPERRET_DROPOUT`         | `0.1`     |
    /// | `HYPERRET_ACT_FUNC`        | `relu`    |
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        }
        fn env_clip(key: &str, default: Option<f64>) -> Option<f64> {
            match std::env::var(key) {
                Ok(s) if s.trim().eq_ignore_ascii_case("none") => None,
                Ok(s) => s.trim().parse().ok().or(default),
                Err(_) => default,
            }
        }

        let def = Self::default();
        Self {
            manifold:       env_parse("HYPERRET_MANIFOLD",       def.manifold),
            curv:           env_parse("HYPERRET_CURV",           def.curv),
            curv_learnable: env_parse("HYPERRET_CURV_LEARNABLE", def.curv_learnable),
            atol:           env_parse("HYPERRET_ATOL",           def.atol),
            rtol:           env_parse("HYPERRET_RTOL",           def.rtol),
            clip_radius:    env_clip("HYPERRET_CLIP_RADIUS",     def.clip_radius),
            use_normalize:  env_parse("HYPERRET_USE_NORMALIZE",  def.use_normalize),
            dropout:        env_parse("HYPERRET_DROPOUT",        def.dropout),
            act_func:       env_parse("HYPERRET_ACT_FUNC",       def.act_func),
        }
    }

    /// Reject settings no component could use.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(NnError::Config(format!("dropout must be in [0, 1), got {}", self.dropout)));
        }
        if self.manifold == ManifoldKind::Lorentz && !(self.curv > 0.0) {
            return Err(NnError::Config(format!("lorentz needs curv > 0, got {}", self.curv)));
        }
        Ok(())
    }

    /// The Euclidean manifold carries no curvature and no clip radius.
    fn effective(&self) -> (f64, bool, Option<f64>) {
        match self.manifold {
            ManifoldKind::Euclidean => (0.0, false, None),
            _ => (self.curv, self.curv_learnable, self.clip_radius),
        }
    }

    /// Build the manifold with a fresh curvature cell.
    pub fn build_manifold(&self) -> Result<Manifold> {
        self.validate()?;
        let (curv, learnable, _) = self.effective();
        let curvature = Curvature::new(curv, learnable)?;
        Ok(Manifold::build(self.manifold, curvature, self.atol, self.rtol)?)
    }

    /// Build a mapper onto `manifold`, which should come from
    /// [`ManifoldConfig::build_manifold`] so the curvature cell is shared.
    pub fn build_mapper(&self, manifold: Manifold) -> Result<ManifoldMapper> {
        let (_, _, clip_radius) = self.effective();
        ManifoldMapper::new(manifold, clip_radius, self.use_normalize)
    }
}
