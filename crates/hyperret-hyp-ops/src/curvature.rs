//! Shared curvature parameter.
//!
//! A model builds one [`Curvature`] and hands clones of it to the manifold,
//! the mapper and every layer. Clones share a single cell, so when the
//! external optimizer steps a learnable curvature between passes, every
//! holder sees the new value on its next read.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{HypError, Result};

/// Smallest curvature the engines will divide by.
pub const MIN_CURVATURE: f64 = 1e-8;

#[derive(Debug)]
struct CurvatureState {
    value: f64,
    learnable: bool,
}

/// Non-negative curvature scalar shared by reference.
#[derive(Debug, Clone)]
pub struct Curvature {
    cell: Arc<RwLock<CurvatureState>>,
}

/// Serializable view of a curvature, for the external checkpointing code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvatureSnapshot {
    pub value: f64,
    pub learnable: bool,
}

impl Curvature {
    /// Curvature that the optimizer must not touch.
    pub fn fixed(value: f64) -> Result<Self> {
        Self::new(value, false)
    }

    /// Curvature the optimizer may update between passes.
    pub fn learnable(value: f64) -> Result<Self> {
        Self::new(value, true)
    }

    pub fn new(value: f64, learnable: bool) -> Result<Self> {
        validate(value)?;
        Ok(Self {
            cell: Arc::new(RwLock::new(CurvatureState { value, learnable })),
        })
    }

    /// Rebuild a curvature from a checkpoint snapshot.
    pub fn from_snapshot(snapshot: CurvatureSnapshot) -> Result<Self> {
        Self::new(snapshot.value, snapshot.learnable)
    }

    /// Current value.
    #[inline]
    pub fn value(&self) -> f64 {
        self.cell.read().value
    }

    #[inline]
    pub fn is_learnable(&self) -> bool {
        self.cell.read().learnable
    }

    /// Overwrite the value. Fails on frozen curvature.
    pub fn set(&self, value: f64) -> Result<()> {
        validate(value)?;
        let mut state = self.cell.write();
        if !state.learnable {
            return Err(HypError::FrozenCurvature);
        }
        tracing::debug!(old = state.value, new = value, "curvature set");
        state.value = value;
        Ok(())
    }

    /// One gradient-descent step `k ← max(k − lr·grad, MIN_CURVATURE)`.
    ///
    /// Returns `Ok(false)` without touching the value when the curvature is
    /// frozen, so an optimizer can iterate over every parameter uniformly.
    pub fn apply_gradient(&self, grad: f64, lr: f64) -> Result<bool> {
        if !grad.is_finite() || !lr.is_finite() {
            return Err(HypError::NumericInstability {
                op: "curvature_step",
                detail: format!("grad={grad}, lr={lr}"),
            });
        }
        let mut state = self.cell.write();
        if !state.learnable {
            return Ok(false);
        }
        let stepped = state.value - lr * grad;
        if stepped < MIN_CURVATURE {
            tracing::warn!(stepped, floor = MIN_CURVATURE, "curvature step clamped");
        }
        state.value = stepped.max(MIN_CURVATURE);
        tracing::debug!(value = state.value, grad, lr, "curvature step");
        Ok(true)
    }

    pub fn snapshot(&self) -> CurvatureSnapshot {
        let state = self.cell.read();
        CurvatureSnapshot {
            value: state.value,
            learnable: state.learnable,
        }
    }

    /// Whether `self` and `other` are handles to the same cell.
    pub fn shares_cell_with(&self, other: &Curvature) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

fn validate(value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(HypError::InvalidCurvature { value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_and_nan() {
        assert!(matches!(
            Curvature::fixed(-1.0),
            Err(HypError::InvalidCurvature { .. })
        ));
        assert!(Curvature::learnable(f64::NAN).is_err());
        assert!(Curvature::fixed(0.0).is_ok());
    }

    #[test]
    fn clones_share_updates() {
        let k = Curvature::learnable(1.0).unwrap();
        let held_by_layer = k.clone();
        k.set(2.5).unwrap();
        assert_eq!(held_by_layer.value(), 2.5);
        assert!(k.shares_cell_with(&held_by_layer));
    }

    #[test]
    fn independent_curvatures_do_not_share() {
        let a = Curvature::fixed(1.0).unwrap();
        let b = Curvature::fixed(1.0).unwrap();
        assert!(!a.shares_cell_with(&b));
    }

    #[test]
    fn frozen_rejects_set_and_ignores_gradient() {
        let k = Curvature::fixed(1.0).unwrap();
        assert!(matches!(k.set(2.0), Err(HypError::FrozenCurvature)));
        assert!(!k.apply_gradient(0.5, 0.1).unwrap());
        assert_eq!(k.value(), 1.0);
    }

    #[test]
    fn gradient_step_is_floored() {
        let k = Curvature::learnable(1.0).unwrap();
        assert!(k.apply_gradient(0.5, 0.1).unwrap());
        assert!((k.value() - 0.95).abs() < 1e-12);
        k.apply_gradient(100.0, 1.0).unwrap();
        assert_eq!(k.value(), MIN_CURVATURE);
    }

    #[test]
    fn snapshot_roundtrip() {
        let k = Curvature::learnable(0.7).unwrap();
        let json = serde_json::to_string(&k.snapshot()).unwrap();
        let back: CurvatureSnapshot = serde_json::from_str(&json).unwrap();
        let restored = Curvature::from_snapshot(back).unwrap();
        assert_eq!(restored.value(), 0.7);
        assert!(restored.is_learnable());
    }
}
