//! Grid search over hidden widths, learning rate, and batch size.
//!
//! Every grid point trains a fresh network and appends one CSV row:
//! `accuracy,hidden1,hidden2,learning_rate,batch_size`.

use std::io::Write;

use tracing::{info, warn};

use crate::data::NUM_CLASSES;
use crate::{Activation, Dataset, Error, Result, TrainConfig, train};

#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
    pub hidden1: Vec<usize>,
    pub hidden2: Vec<usize>,
    pub learning_rates: Vec<f64>,
    pub batch_sizes: Vec<usize>,
    pub epochs: usize,
    pub activation: Activation,
    pub seed: Option<u64>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            hidden1: (3..=8).map(|i| i * 16).collect(),
            hidden2: (2..=4).map(|i| i * 16).collect(),
            learning_rates: vec![0.6, 0.8],
            batch_sizes: vec![32, 64],
            epochs: 12,
            activation: Activation::Sigmoid,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    pub accuracy: f64,
    pub hidden1: usize,
    pub hidden2: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
}

impl SweepGrid {
    pub fn len(&self) -> usize {
        self.hidden1.len() * self.hidden2.len() * self.learning_rates.len() * self.batch_sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Training configs for every grid point, in row order.
    pub fn configs(&self, input_dim: usize) -> Vec<TrainConfig> {
        let mut out = Vec::with_capacity(self.len());
        for &h1 in &self.hidden1 {
            for &h2 in &self.hidden2 {
                for &lr in &self.learning_rates {
                    for &bs in &self.batch_sizes {
                        out.push(TrainConfig {
                            layer_sizes: vec![input_dim, h1, h2, NUM_CLASSES],
                            activation: self.activation,
                            learning_rate: lr,
                            epochs: self.epochs,
                            batch_size: bs,
                            seed: self.seed,
                        });
                    }
                }
            }
        }
        out
    }
}

/// Train every grid point and stream results to `out` as CSV.
///
/// A trial that fails is logged and skipped; the sweep keeps going. Returns the
/// successful results in grid order.
pub fn run_sweep<W: Write>(
    grid: &SweepGrid,
    train_set: &Dataset,
    test_set: &Dataset,
    out: W,
) -> Result<Vec<SweepResult>> {
    let input_dim = train_set
        .input_dim()
        .ok_or_else(|| Error::InvalidData("train dataset must not be empty".to_owned()))?;

    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record([
        "Accuracy",
        "Neurons in hidden layer 1",
        "Neurons in hidden layer 2",
        "Learning rate",
        "Batch size",
    ])?;
    wtr.flush()?;

    let configs = grid.configs(input_dim);
    let total = configs.len();
    let mut results = Vec::with_capacity(total);

    for (i, cfg) in configs.into_iter().enumerate() {
        info!(
            trial = i + 1,
            total,
            layer_sizes = ?cfg.layer_sizes,
            lr = cfg.learning_rate,
            batch_size = cfg.batch_size,
            "sweep trial"
        );

        let accuracy = match train(&cfg, train_set, Some(test_set)) {
            Ok((_, report)) => report.final_test_accuracy().unwrap_or(0.0),
            Err(e) => {
                warn!(trial = i + 1, error = %e, "sweep trial failed");
                continue;
            }
        };

        let result = SweepResult {
            accuracy,
            hidden1: cfg.layer_sizes[1],
            hidden2: cfg.layer_sizes[2],
            learning_rate: cfg.learning_rate,
            batch_size: cfg.batch_size,
        };
        wtr.write_record([
            format!("{:.2}", result.accuracy),
            result.hidden1.to_string(),
            result.hidden2.to_string(),
            format!("{:.1}", result.learning_rate),
            result.batch_size.to_string(),
        ])?;
        wtr.flush()?;
        results.push(result);
    }

    info!(completed = results.len(), total, "sweep finished");
    Ok(results)
}
