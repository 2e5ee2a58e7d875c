//! Element-wise activation functions selected by name.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::layers::Layer;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[serde(rename = "id")]
    Identity,
    #[default]
    Relu,
    Tanh,
    /// Exact GELU, `x·Φ(x)`.
    Gelu,
    /// ELU with `α = 1`.
    Elu,
}

impl Activation {
    #[inline]
    pub fn apply_scalar(self, x: f64) -> f64 {
        match self {
            Activation::Identity => x,
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Gelu => 0.5 * x * (1.0 + libm::erf(x * std::f64::consts::FRAC_1_SQRT_2)),
            Activation::Elu => {
                if x > 0.0 {
                    x
                } else {
                    x.exp_m1()
                }
            }
        }
    }

    pub fn apply(self, x: ArrayView2<f64>) -> Array2<f64> {
        x.mapv(|v| self.apply_scalar(v))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Activation::Identity => "id",
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Gelu => "gelu",
            Activation::Elu => "elu",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Activation {
    type Err = NnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "id" | "identity" | "none" => Ok(Activation::Identity),
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            "gelu" => Ok(Activation::Gelu),
            "elu" => Ok(Activation::Elu),
            other => Err(NnError::Config(format!("unknown activation '{other}'"))),
        }
    }
}

impl Layer for Activation {
    fn forward(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(self.apply(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("ReLU".parse::<Activation>().unwrap(), Activation::Relu);
        assert_eq!("id".parse::<Activation>().unwrap(), Activation::Identity);
        assert_eq!("GELU".parse::<Activation>().unwrap(), Activation::Gelu);
        assert!(matches!("swish".parse::<Activation>(), Err(NnError::Config(_))));
    }

    #[test]
    fn scalar_values() {
        assert_eq!(Activation::Relu.apply_scalar(-2.0), 0.0);
        assert_eq!(Activation::Identity.apply_scalar(-2.0), -2.0);
        assert_abs_diff_eq!(Activation::Elu.apply_scalar(-1.0), (-1.0f64).exp() - 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(Activation::Gelu.apply_scalar(0.0), 0.0);
        assert_abs_diff_eq!(Activation::Gelu.apply_scalar(3.0), 2.996, epsilon = 1e-3);
    }

    #[test]
    fn gelu_is_the_erf_form() {
        // x·Φ(x) at ±1
        assert_abs_diff_eq!(Activation::Gelu.apply_scalar(1.0), 0.841_344_746_068_542_9, epsilon = 1e-12);
        assert_abs_diff_eq!(Activation::Gelu.apply_scalar(-1.0), -0.158_655_253_931_457_05, epsilon = 1e-12);
    }

    #[test]
    fn applies_elementwise() {
        let out = Activation::Tanh.apply(array![[0.0, 100.0]].view());
        assert_eq!(out[[0, 0]], 0.0);
        assert_abs_diff_eq!(out[[0, 1]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn serde_names_match_parser() {
        let json = serde_json::to_string(&Activation::Identity).unwrap();
        assert_eq!(json, "\"id\"");
        let back: Activation = serde_json::from_str("\"elu\"").unwrap();
        assert_eq!(back, Activation::Elu);
    }
}
