//! Network serialization (feature: `serde`).
//!
//! This module defines a versioned, stable on-disk format for `Network`:
//! the layer sizes, the activation, then each transition's flat row-major
//! weights and its biases, in transition order.
//!
//! Design notes:
//! - `Network`/`Layer` are not serialized directly, so the file format stays
//!   fixed even if the in-memory representation changes.
//! - Deserialization validates topology, parameter lengths, and that every
//!   parameter is finite.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Activation, Error, Layer, Network, Result};

pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedNetwork {
    pub format_version: u32,
    pub layer_sizes: Vec<usize>,
    pub activation: SerializedActivation,
    pub transitions: Vec<SerializedTransition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedTransition {
    /// Row-major (layer_sizes[l + 1], layer_sizes[l]).
    pub weights: Vec<f64>,
    pub biases: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializedActivation {
    Sigmoid,
    Relu,
}

impl From<Activation> for SerializedActivation {
    fn from(value: Activation) -> Self {
        match value {
            Activation::Sigmoid => SerializedActivation::Sigmoid,
            Activation::ReLU => SerializedActivation::Relu,
        }
    }
}

impl From<SerializedActivation> for Activation {
    fn from(value: SerializedActivation) -> Self {
        match value {
            SerializedActivation::Sigmoid => Activation::Sigmoid,
            SerializedActivation::Relu => Activation::ReLU,
        }
    }
}

impl SerializedNetwork {
    pub fn validate(&self) -> Result<()> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(Error::InvalidData(format!(
                "unsupported model format_version {}; expected {}",
                self.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if self.layer_sizes.len() < 2 || self.layer_sizes.contains(&0) {
            return Err(Error::InvalidData(format!(
                "layer_sizes must have at least 2 entries, all > 0, got {:?}",
                self.layer_sizes
            )));
        }
        if self.transitions.len() != self.layer_sizes.len() - 1 {
            return Err(Error::InvalidData(format!(
                "{} transitions stored for {} layer sizes",
                self.transitions.len(),
                self.layer_sizes.len()
            )));
        }
        Ok(())
    }
}

impl From<&Network> for SerializedNetwork {
    fn from(net: &Network) -> Self {
        let transitions = net
            .layers()
            .iter()
            .map(|layer| SerializedTransition {
                weights: layer.weights().as_slice().to_vec(),
                biases: layer.biases().to_vec(),
            })
            .collect();
        Self {
            format_version: MODEL_FORMAT_VERSION,
            layer_sizes: net.layer_sizes().to_vec(),
            activation: net.activation().into(),
            transitions,
        }
    }
}

impl TryFrom<SerializedNetwork> for Network {
    type Error = Error;

    fn try_from(value: SerializedNetwork) -> std::result::Result<Self, Self::Error> {
        value.validate()?;

        let layers = value
            .layer_sizes
            .windows(2)
            .zip(value.transitions)
            .enumerate()
            .map(|(l, (dims, t))| {
                // Layer::from_parts checks lengths and finiteness.
                Layer::from_parts(dims[0], dims[1], t.weights, t.biases)
                    .map_err(|e| Error::InvalidData(format!("transition {l} invalid: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Network::from_layers(layers, value.activation.into())
    }
}

impl Network {
    /// Serialize the network to a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(&SerializedNetwork::from(self))
            .map_err(|e| Error::InvalidData(format!("failed to serialize network: {e}")))
    }

    /// Serialize the network to a compact JSON string.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(&SerializedNetwork::from(self))
            .map_err(|e| Error::InvalidData(format!("failed to serialize network: {e}")))
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let ser: SerializedNetwork = serde_json::from_str(s)
            .map_err(|e| Error::InvalidData(format!("failed to parse network json: {e}")))?;
        ser.try_into()
    }

    /// Save the network to a JSON file (pretty-printed).
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = self.to_json_string_pretty()?;
        std::fs::write(path, s)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_json_str(&s)
    }
}
