//! MNIST-style CSV datasets.
//!
//! Each row is `label,pixel_0,...,pixel_{n-1}` with no header. Pixels are
//! scaled from `0..=255` into `[0, 1]` and labels become one-hot targets.

use std::io::Read;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Digits 0-9.
pub const NUM_CLASSES: usize = 10;

const PIXEL_SCALE: f64 = 255.0;

/// One labelled example.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub input: Vec<f64>,
    pub label: usize,
    /// One-hot: `1.0` at `label`, `0.0` elsewhere.
    pub target: Vec<f64>,
}

impl Sample {
    pub fn new(input: Vec<f64>, label: usize, num_classes: usize) -> Result<Self> {
        if label >= num_classes {
            return Err(Error::InvalidData(format!(
                "label {label} out of range for {num_classes} classes"
            )));
        }
        let mut target = vec![0.0; num_classes];
        target[label] = 1.0;
        Ok(Self {
            input,
            label,
            target,
        })
    }
}

/// An in-memory collection of samples that all share one input dimension.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self> {
        if let Some(first) = samples.first() {
            let input_dim = first.input.len();
            let target_dim = first.target.len();
            for (i, s) in samples.iter().enumerate() {
                if s.input.len() != input_dim || s.target.len() != target_dim {
                    return Err(Error::InvalidData(format!(
                        "sample {i} has input/target len {}/{}, expected {input_dim}/{target_dim}",
                        s.input.len(),
                        s.target.len()
                    )));
                }
            }
        }
        Ok(Self { samples })
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let file = std::fs::File::open(p)?;
        let ds = Self::from_csv_reader(file)?;
        debug!(path = %p.display(), samples = ds.len(), "loaded dataset");
        Ok(ds)
    }

    /// Parse CSV rows from any reader.
    ///
    /// Rows with fewer than two fields or a label that is not a digit in
    /// `0..NUM_CLASSES` are skipped; unparsable pixels read as `0.0`.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut samples: Vec<Sample> = Vec::new();
        let mut skipped = 0usize;

        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() < 2 {
                skipped += 1;
                continue;
            }
            let Some(label) = record[0]
                .parse::<usize>()
                .ok()
                .filter(|&l| l < NUM_CLASSES)
            else {
                skipped += 1;
                continue;
            };

            let input: Vec<f64> = record
                .iter()
                .skip(1)
                .map(|field| field.parse::<f64>().map_or(0.0, |v| v / PIXEL_SCALE))
                .collect();

            if let Some(first) = samples.first()
                && first.input.len() != input.len()
            {
                return Err(Error::InvalidData(format!(
                    "row {row} has {} pixels, expected {}",
                    input.len(),
                    first.input.len()
                )));
            }

            samples.push(Sample::new(input, label, NUM_CLASSES)?);
        }

        if skipped > 0 {
            warn!(skipped, "skipped malformed csv rows");
        }
        Ok(Self { samples })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Input dimension of the samples, or `None` for an empty dataset.
    pub fn input_dim(&self) -> Option<usize> {
        self.samples.first().map(|s| s.input.len())
    }

    pub fn target_dim(&self) -> Option<usize> {
        self.samples.first().map(|s| s.target.len())
    }

    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Deterministic in-place shuffle.
    pub fn shuffle(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        self.samples.shuffle(&mut rng);
    }

    /// Consecutive batches of `batch_size` samples; the last may be shorter.
    ///
    /// Panics if `batch_size == 0`.
    pub fn batches(&self, batch_size: usize) -> std::slice::Chunks<'_, Sample> {
        self.samples.chunks(batch_size)
    }
}
