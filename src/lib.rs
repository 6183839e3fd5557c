//! A from-scratch fully-connected network trainer for MNIST-style digits.
//!
//! The engine is [`Network`]: construction, forward pass, backpropagation, and
//! a gradient-descent update. Everything else in the crate (CSV loading, the
//! mini-batch loop, the hyperparameter sweep, JSON persistence) is glue around
//! those four operations.
//!
//! # Data layout and shapes
//!
//! - Scalars are `f64`.
//! - `layer_sizes[0]` is the input width, the last entry the output width.
//! - Transition `l` has weights of shape `(layer_sizes[l + 1], layer_sizes[l])`,
//!   stored row-major: `weights(l).get(i, j)` connects input `j` to output `i`
//!   and lives at flat index `i * layer_sizes[l] + j`.
//! - [`Gradients`] have exactly the same shape as the parameters.
//!
//! # Errors
//!
//! Caller mistakes are returned, never panicked on: a bad topology is
//! [`Error::InvalidTopology`], a wrongly sized input/target/gradient is
//! [`Error::DimensionMismatch`].
//!
//! # Sharing a network
//!
//! `forward`/`backward` borrow the network immutably and `update` borrows it
//! mutably, so an update can never interleave with an in-flight pass. To
//! parallelize a batch, give each worker its own [`Gradients`], merge them with
//! [`Gradients::accumulate`], and apply one `update`.
//!
//! # Quick start
//!
//! ```rust
//! use mnist_mlp::{Gradients, Network};
//!
//! # fn main() -> mnist_mlp::Result<()> {
//! let mut net = Network::new(&[2, 3, 1], Some(42))?;
//!
//! let trace = net.forward(&[0.5, -1.2])?;
//! assert!(trace.output()[0] > 0.0 && trace.output()[0] < 1.0);
//!
//! let mut batch = Gradients::zeros_like(&net);
//! for (x, t) in [([0.5, -1.2], [0.0]), ([0.1, 0.3], [1.0])] {
//!     batch.accumulate(&net.backward(&x, &t)?)?;
//! }
//! batch.scale(0.5);
//! net.update(&batch, 0.01)?;
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod builder;
pub mod data;
pub mod error;
pub mod layer;
pub mod loss;
pub mod matrix;
pub mod network;
pub mod sweep;
pub mod train;

#[cfg(feature = "serde")]
pub mod persist;

pub use activation::Activation;
pub use builder::NetworkBuilder;
pub use data::{Dataset, Sample};
pub use error::{Error, Result};
pub use layer::Layer;
pub use matrix::Matrix;
pub use network::{ForwardTrace, Gradients, Network};
pub use sweep::{SweepGrid, SweepResult, run_sweep};
pub use train::{EpochReport, FitReport, TrainConfig, evaluate, train};
