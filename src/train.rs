//! Mini-batch training loop.
//!
//! Per batch: backprop every sample, sum the gradients, divide by the batch
//! length, then apply a single [`Network::update`].

use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::loss::{argmax, cross_entropy};
use crate::{Activation, Dataset, Error, Gradients, Network, Result};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Input, hidden, and output widths.
    pub layer_sizes: Vec<usize>,
    #[cfg_attr(feature = "serde", serde(with = "activation_name"))]
    pub activation: Activation,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    /// Seeds both parameter init and the shuffle. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            layer_sizes: vec![784, 32, 16, 10],
            activation: Activation::Sigmoid,
            learning_rate: 0.6,
            epochs: 12,
            batch_size: 16,
            seed: None,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.layer_sizes.len() < 2 || self.layer_sizes.contains(&0) {
            return Err(Error::InvalidTopology(format!(
                "layer_sizes must have at least 2 entries, all > 0, got {:?}",
                self.layer_sizes
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be finite and > 0, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be > 0".to_owned()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    /// 1-based.
    pub epoch: usize,
    /// Mean cross-entropy over the training samples.
    pub avg_loss: f64,
    /// Percent of training samples classified correctly during the epoch.
    pub train_accuracy: f64,
    /// Percent correct on the held-out set, if one was supplied.
    pub test_accuracy: Option<f64>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitReport {
    pub epochs: Vec<EpochReport>,
}

impl FitReport {
    pub fn last(&self) -> Option<&EpochReport> {
        self.epochs.last()
    }

    /// Test accuracy after the final epoch.
    pub fn final_test_accuracy(&self) -> Option<f64> {
        self.last().and_then(|e| e.test_accuracy)
    }
}

/// Build a fresh network from `cfg` and train it.
///
/// `train` is shuffled once (seeded by `cfg.seed`) before the first epoch.
pub fn train(
    cfg: &TrainConfig,
    train: &Dataset,
    test: Option<&Dataset>,
) -> Result<(Network, FitReport)> {
    cfg.validate()?;

    let mut net = Network::with_activation(&cfg.layer_sizes, cfg.activation, cfg.seed)?;
    let mut shuffled = train.clone();
    shuffled.shuffle(cfg.seed.unwrap_or_else(rand::random));

    info!(
        layer_sizes = ?cfg.layer_sizes,
        activation = %cfg.activation,
        learning_rate = cfg.learning_rate,
        epochs = cfg.epochs,
        batch_size = cfg.batch_size,
        "starting training"
    );
    let report = net.fit(&shuffled, test, cfg)?;
    info!("training completed");

    Ok((net, report))
}

impl Network {
    /// Train in place for `cfg.epochs` epochs over `train` in its current order.
    ///
    /// `cfg.layer_sizes`, `cfg.activation` and `cfg.seed` are ignored here; the
    /// network already fixes them.
    pub fn fit(
        &mut self,
        train: &Dataset,
        test: Option<&Dataset>,
        cfg: &TrainConfig,
    ) -> Result<FitReport> {
        if train.is_empty() {
            return Err(Error::InvalidData(
                "train dataset must not be empty".to_owned(),
            ));
        }
        if !(cfg.learning_rate.is_finite() && cfg.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be finite and > 0, got {}",
                cfg.learning_rate
            )));
        }
        if cfg.epochs == 0 || cfg.batch_size == 0 {
            return Err(Error::InvalidConfig(
                "epochs and batch_size must be > 0".to_owned(),
            ));
        }

        let mut report = FitReport::default();

        for epoch in 1..=cfg.epochs {
            let start = Instant::now();
            let mut total_loss = 0.0;
            let mut correct = 0usize;

            for batch in train.batches(cfg.batch_size) {
                let mut batch_grads = Gradients::zeros_like(self);

                for sample in batch {
                    let trace = self.forward(&sample.input)?;
                    let grads = self.backward_from_trace(&trace, &sample.target)?;
                    batch_grads.accumulate(&grads)?;

                    total_loss += cross_entropy(trace.output(), &sample.target);
                    if argmax(trace.output()) == sample.label {
                        correct += 1;
                    }
                }

                batch_grads.scale(1.0 / batch.len() as f64);
                self.update(&batch_grads, cfg.learning_rate)?;
            }

            let avg_loss = total_loss / train.len() as f64;
            let train_accuracy = correct as f64 / train.len() as f64 * 100.0;
            let test_accuracy = test.map(|t| evaluate(self, t)).transpose()?;
            let elapsed = start.elapsed();

            info!(
                epoch,
                epochs = cfg.epochs,
                avg_loss = format_args!("{avg_loss:.4}"),
                train_accuracy = format_args!("{train_accuracy:.2}%"),
                test_accuracy = ?test_accuracy,
                ?elapsed,
                "epoch finished"
            );

            report.epochs.push(EpochReport {
                epoch,
                avg_loss,
                train_accuracy,
                test_accuracy,
                elapsed,
            });
        }

        Ok(report)
    }
}

/// Percent of samples in `data` whose argmax output equals their label.
pub fn evaluate(net: &Network, data: &Dataset) -> Result<f64> {
    if data.is_empty() {
        return Err(Error::InvalidData("dataset must not be empty".to_owned()));
    }

    let mut correct = 0usize;
    for sample in data.samples() {
        if net.predict(&sample.input)? == sample.label {
            correct += 1;
        }
    }
    Ok(correct as f64 / data.len() as f64 * 100.0)
}

#[cfg(feature = "serde")]
mod activation_name {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::Activation;

    pub fn serialize<S: Serializer>(act: &Activation, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(act.name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Activation, D::Error> {
        let name = String::deserialize(d)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
