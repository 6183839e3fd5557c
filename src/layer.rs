use rand::Rng;
use rand_distr::StandardNormal;

use crate::{Error, Matrix, Result};

/// One fully-connected transition between two adjacent layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Shape `(out_dim, in_dim)`; `weights.get(i, j)` connects input `j` to output `i`.
    weights: Matrix,
    biases: Vec<f64>,
}

impl Layer {
    /// Every weight and bias is an independent draw from N(0, 1).
    ///
    /// Dimensions are not checked here; `Network` validates the topology.
    pub(crate) fn new_with_rng<R: Rng + ?Sized>(in_dim: usize, out_dim: usize, rng: &mut R) -> Self {
        let weights = Matrix::from_fn(out_dim, in_dim, |_, _| rng.sample(StandardNormal));
        let biases = (0..out_dim).map(|_| rng.sample(StandardNormal)).collect();
        Self { weights, biases }
    }

    /// Build a layer from existing parameters.
    ///
    /// Validates shapes and that all parameters are finite.
    pub fn from_parts(
        in_dim: usize,
        out_dim: usize,
        weights: Vec<f64>,
        biases: Vec<f64>,
    ) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidTopology(format!(
                "layer dims must be > 0, got in_dim={in_dim} out_dim={out_dim}"
            )));
        }
        if biases.len() != out_dim {
            return Err(Error::InvalidData(format!(
                "biases length {} does not match out_dim {out_dim}",
                biases.len()
            )));
        }
        if weights.iter().chain(&biases).any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "parameters must contain only finite values".to_owned(),
            ));
        }

        let weights = Matrix::from_vec(out_dim, in_dim, weights)?;
        Ok(Self { weights, biases })
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.weights.cols()
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.weights.rows()
    }

    #[inline]
    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    #[inline]
    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    #[cfg(test)]
    pub(crate) fn weights_mut(&mut self) -> &mut Matrix {
        &mut self.weights
    }

    #[cfg(test)]
    pub(crate) fn biases_mut(&mut self) -> &mut [f64] {
        &mut self.biases
    }

    /// Pre-activation for a single sample: `z = W * inputs + b`.
    ///
    /// Shape contract: `inputs.len() == self.in_dim()`.
    #[inline]
    pub(crate) fn pre_activation(&self, inputs: &[f64]) -> Vec<f64> {
        self.weights.affine(inputs, &self.biases)
    }

    /// `param -= lr * d_param`. Shapes are checked by the caller.
    #[inline]
    pub(crate) fn sgd_step(&mut self, d_weights: &Matrix, d_biases: &[f64], lr: f64) {
        debug_assert_eq!(d_weights.shape(), self.weights.shape());
        debug_assert_eq!(d_biases.len(), self.biases.len());

        self.weights.add_scaled(d_weights, -lr);
        for (b, &g) in self.biases.iter_mut().zip(d_biases) {
            *b = g.mul_add(-lr, *b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn random_init_has_expected_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = Layer::new_with_rng(4, 3, &mut rng);
        assert_eq!(layer.weights().shape(), (3, 4));
        assert_eq!(layer.biases().len(), 3);
        assert!(layer.weights().as_slice().iter().all(|w| w.is_finite()));
    }

    #[test]
    fn standard_normal_init_has_unit_scale() {
        let mut rng = StdRng::seed_from_u64(11);
        let layer = Layer::new_with_rng(100, 100, &mut rng);
        let w = layer.weights().as_slice();
        let n = w.len() as f64;
        let mean = w.iter().sum::<f64>() / n;
        let var = w.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
        assert!(mean.abs() < 0.05, "mean={mean}");
        assert!((var - 1.0).abs() < 0.1, "var={var}");
    }

    #[test]
    fn from_parts_validates() {
        assert!(Layer::from_parts(2, 1, vec![1.0, 2.0], vec![0.0]).is_ok());
        assert!(Layer::from_parts(2, 1, vec![1.0], vec![0.0]).is_err());
        assert!(Layer::from_parts(2, 1, vec![1.0, 2.0], vec![0.0, 0.0]).is_err());
        assert!(Layer::from_parts(2, 1, vec![f64::NAN, 2.0], vec![0.0]).is_err());
        assert!(Layer::from_parts(0, 1, vec![], vec![0.0]).is_err());
    }

    #[test]
    fn sgd_step_moves_against_gradient() {
        let mut layer = Layer::from_parts(2, 1, vec![1.0, 2.0], vec![0.5]).unwrap();
        let dw = Matrix::from_vec(1, 2, vec![1.0, -1.0]).unwrap();
        layer.sgd_step(&dw, &[2.0], 0.1);
        assert_abs_diff_eq!(layer.weights().get(0, 0), 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(layer.weights().get(0, 1), 2.1, epsilon = 1e-12);
        assert_abs_diff_eq!(layer.biases()[0], 0.3, epsilon = 1e-12);
    }
}
