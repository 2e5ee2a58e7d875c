//! # hyperret-nn
//!
//! Model-side building blocks on top of `hyperret-hyp-ops`.
//!
//! ```text
//! encoder features ──► ManifoldMapper ──► ProjectionHead ──► CentroidPooler ──► Scorer
//!   [b, s, d]            clip + lift        manifold layers     per-sequence       [n, m]
//! ```
//!
//! | Module | Contents |
//! |---|---|
//! | [`config`] | [`ManifoldConfig`]: serde + env loading, manifold and mapper builders |
//! | [`mapper`] | Euclidean features onto the chosen manifold |
//! | [`layers`] | Euclidean, Möbius and Lorentz linear stacks, hyperbolic MLR heads |
//! | [`attention`] | distance-based attention on the hyperboloid |
//! | [`pooling`] | centroid pooling over sequences |
//! | [`scoring`] | similarity matrices for retrieval |
//!
//! Every component built from the same [`ManifoldConfig::build_manifold`]
//! result shares one curvature cell.

pub mod activation;
pub mod attention;
pub mod config;
pub mod error;
pub mod head;
pub mod layers;
pub mod mapper;
pub mod pooling;
pub mod scoring;

pub use activation::Activation;
pub use attention::LorentzAttention;
pub use config::ManifoldConfig;
pub use error::{NnError, Result};
pub use head::ProjectionHead;
pub use layers::{
    Dropout, HypSeqLinear, Layer, LayerNorm, Linear, LorentzAct, LorentzBlock, LorentzLayerNorm,
    LorentzLinear, LorentzMLR, LorentzSeqLinear, MobiusAct, MobiusLinear, PoincareMLR, SeqLinear,
};
pub use mapper::ManifoldMapper;
pub use pooling::CentroidPooler;
pub use scoring::{HybridScores, Scorer};
