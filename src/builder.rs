//! Network builder.
//!
//! `NetworkBuilder` makes model structure explicit (layer widths, activation,
//! seed) and validates it once, at `build` time.
//!
//! ```rust
//! use mnist_mlp::{Activation, NetworkBuilder};
//!
//! # fn main() -> mnist_mlp::Result<()> {
//! let net = NetworkBuilder::new(784)
//!     .add_layer(32)
//!     .add_layer(10)
//!     .activation(Activation::ReLU)
//!     .seed(0)
//!     .build()?;
//! assert_eq!(net.layer_sizes(), &[784, 32, 10]);
//! # Ok(())
//! # }
//! ```

use rand::Rng;

use crate::{Activation, Network, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkBuilder {
    layer_sizes: Vec<usize>,
    activation: Activation,
    seed: Option<u64>,
}

impl NetworkBuilder {
    /// Start a network that accepts inputs of length `input_dim`.
    pub fn new(input_dim: usize) -> Self {
        Self::from_sizes(&[input_dim])
    }

    /// Start from a full sizes list (input, hidden..., output).
    pub fn from_sizes(layer_sizes: &[usize]) -> Self {
        Self {
            layer_sizes: layer_sizes.to_vec(),
            activation: Activation::default(),
            seed: None,
        }
    }

    /// Append a layer with `width` neurons.
    pub fn add_layer(mut self, width: usize) -> Self {
        self.layer_sizes.push(width);
        self
    }

    pub fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fails with `InvalidTopology` for fewer than two sizes or a zero width.
    pub fn build(self) -> Result<Network> {
        Network::with_activation(&self.layer_sizes, self.activation, self.seed)
    }

    /// Build using the provided RNG; any configured seed is ignored.
    pub fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Network> {
        Network::new_with_rng(&self.layer_sizes, self.activation, rng)
    }
}
