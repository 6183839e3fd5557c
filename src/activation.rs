//! Activation functions.
//!
//! A layer computes a pre-activation value `z = W a + b` and then applies an
//! activation function element-wise: `a' = activation(z)`.
//!
//! Backprop needs `f'(z)`, so the derivative here is expressed in terms of the
//! pre-activation `z` (which the forward trace keeps around), not the output.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Element-wise activation function, chosen once when the network is built.
pub enum Activation {
    #[default]
    Sigmoid,
    ReLU,
}

impl Activation {
    #[inline]
    pub fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Sigmoid => sigmoid(z),
            Activation::ReLU => z.max(0.0),
        }
    }

    /// Derivative of the activation with respect to its input `z`.
    #[inline]
    pub fn derivative(self, z: f64) -> f64 {
        match self {
            Activation::Sigmoid => {
                let s = sigmoid(z);
                s * (1.0 - s)
            }
            Activation::ReLU => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Sigmoid => "sigmoid",
            Activation::ReLU => "relu",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sigmoid" => Ok(Activation::Sigmoid),
            "relu" => Ok(Activation::ReLU),
            other => Err(Error::InvalidConfig(format!(
                "unknown activation {other:?}; expected \"sigmoid\" or \"relu\""
            ))),
        }
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}
