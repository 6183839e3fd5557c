use std::marker::PhantomData;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::check_len;
use crate::loss::argmax;
use crate::{Activation, Error, Layer, Matrix, Result};

/// A fully-connected feed-forward network.
///
/// `layer_sizes` is fixed at construction; only parameter values change, and
/// only through [`Network::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    layer_sizes: Vec<usize>,
    layers: Vec<Layer>,
    activation: Activation,
}

/// Per-layer values recorded by [`Network::forward`].
///
/// A trace holds a shared borrow of the network that produced it, so the
/// network cannot be updated while the trace is alive:
///
/// ```compile_fail
/// use mnist_mlp::Network;
///
/// let mut net = Network::new(&[2, 1], Some(0)).unwrap();
/// let trace = net.forward(&[0.5, -1.2]).unwrap();
/// let grads = net.backward(&[0.5, -1.2], &[1.0]).unwrap();
/// net.update(&grads, 0.1).unwrap();
/// let _ = net.backward_from_trace(&trace, &[1.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardTrace<'a> {
    /// `z` for every transition (one entry per non-input layer).
    pre_activations: Vec<Vec<f64>>,
    /// Activations for every layer, starting with the input itself.
    activations: Vec<Vec<f64>>,
    network: PhantomData<&'a Network>,
}

/// Parameter gradients, shaped exactly like a network's weights and biases.
///
/// Also serves as the mini-batch accumulator: sum per-sample gradients with
/// [`Gradients::accumulate`], then [`Gradients::scale`] by `1 / batch_len`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    d_weights: Vec<Matrix>,
    d_biases: Vec<Vec<f64>>,
}

fn validate_topology(sizes: &[usize]) -> Result<()> {
    if sizes.len() < 2 {
        return Err(Error::InvalidTopology(format!(
            "need at least 2 layer sizes (input and output), got {}",
            sizes.len()
        )));
    }
    if let Some(pos) = sizes.iter().position(|&s| s == 0) {
        return Err(Error::InvalidTopology(format!(
            "layer sizes must be > 0, layer {pos} has size 0"
        )));
    }
    Ok(())
}

impl Network {
    /// Sigmoid network with standard-normal parameters.
    ///
    /// With `seed = None` the parameters come from OS entropy.
    pub fn new(layer_sizes: &[usize], seed: Option<u64>) -> Result<Self> {
        Self::with_activation(layer_sizes, Activation::Sigmoid, seed)
    }

    pub fn with_activation(
        layer_sizes: &[usize],
        activation: Activation,
        seed: Option<u64>,
    ) -> Result<Self> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::new_with_rng(layer_sizes, activation, &mut rng)
    }

    pub fn new_with_rng<R: Rng + ?Sized>(
        layer_sizes: &[usize],
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        validate_topology(layer_sizes)?;

        let layers = layer_sizes
            .windows(2)
            .map(|w| Layer::new_with_rng(w[0], w[1], &mut *rng))
            .collect();

        let net = Self {
            layer_sizes: layer_sizes.to_vec(),
            layers,
            activation,
        };
        debug!(
            layer_sizes = ?net.layer_sizes,
            %activation,
            parameters = net.parameter_count(),
            "initialized network"
        );
        Ok(net)
    }

    /// Assemble a network from existing layers.
    ///
    /// Adjacent layers must agree on their shared dimension.
    pub fn from_layers(layers: Vec<Layer>, activation: Activation) -> Result<Self> {
        let first = layers.first().ok_or_else(|| {
            Error::InvalidTopology("network must have at least one transition".to_owned())
        })?;

        let mut layer_sizes = Vec::with_capacity(layers.len() + 1);
        layer_sizes.push(first.in_dim());
        for (l, layer) in layers.iter().enumerate() {
            let prev_out = layer_sizes[l];
            if layer.in_dim() != prev_out {
                return Err(Error::InvalidTopology(format!(
                    "transition {l} in_dim {} does not match previous out_dim {prev_out}",
                    layer.in_dim()
                )));
            }
            layer_sizes.push(layer.out_dim());
        }
        validate_topology(&layer_sizes)?;

        Ok(Self {
            layer_sizes,
            layers,
            activation,
        })
    }

    #[inline]
    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.layer_sizes[0]
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.layer_sizes[self.layer_sizes.len() - 1]
    }

    /// Number of weight/bias containers (`layer_sizes.len() - 1`).
    #[inline]
    pub fn num_transitions(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Weights of transition `l`, shape `(layer_sizes[l + 1], layer_sizes[l])`.
    ///
    /// Panics if `l >= num_transitions()`.
    #[inline]
    pub fn weights(&self, l: usize) -> &Matrix {
        self.layers[l].weights()
    }

    /// Panics if `l >= num_transitions()`.
    #[inline]
    pub fn biases(&self, l: usize) -> &[f64] {
        self.layers[l].biases()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights().len() + l.biases().len())
            .sum()
    }

    /// Forward pass for a single sample.
    ///
    /// Returns the full trace; the prediction is [`ForwardTrace::output`].
    pub fn forward(&self, input: &[f64]) -> Result<ForwardTrace<'_>> {
        check_len("input", self.input_dim(), input.len())?;

        let mut pre_activations = Vec::with_capacity(self.layers.len());
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_vec());

        for layer in &self.layers {
            let prev = &activations[activations.len() - 1];
            let z = layer.pre_activation(prev);
            let a = z.iter().map(|&v| self.activation.apply(v)).collect();
            pre_activations.push(z);
            activations.push(a);
        }

        Ok(ForwardTrace {
            pre_activations,
            activations,
            network: PhantomData,
        })
    }

    /// Index of the largest output for `input`.
    pub fn predict(&self, input: &[f64]) -> Result<usize> {
        let trace = self.forward(input)?;
        Ok(argmax(trace.output()))
    }

    /// Backpropagation for a single sample under `0.5 * Σ (output - target)^2`.
    pub fn backward(&self, input: &[f64], target: &[f64]) -> Result<Gradients> {
        let trace = self.forward(input)?;
        self.backward_from_trace(&trace, target)
    }

    /// Backprop from a trace produced by [`Network::forward`] on this network.
    ///
    /// Lets a training loop reuse one forward pass for both the gradient and
    /// the reported loss.
    pub fn backward_from_trace(
        &self,
        trace: &ForwardTrace<'_>,
        target: &[f64],
    ) -> Result<Gradients> {
        check_len("target", self.output_dim(), target.len())?;
        check_len(
            "trace activations",
            self.layer_sizes.len(),
            trace.activations.len(),
        )?;
        for (a, &size) in trace.activations.iter().zip(&self.layer_sizes) {
            check_len("trace layer", size, a.len())?;
        }

        let act = self.activation;
        let last = self.layers.len() - 1;

        let mut delta: Vec<f64> = trace
            .output()
            .iter()
            .zip(target)
            .zip(&trace.pre_activations[last])
            .map(|((&o, &t), &z)| (o - t) * act.derivative(z))
            .collect();

        let mut d_weights = Vec::with_capacity(self.layers.len());
        let mut d_biases = Vec::with_capacity(self.layers.len());

        for l in (0..self.layers.len()).rev() {
            d_weights.push(Matrix::outer(&delta, &trace.activations[l]));

            let prev_delta = if l > 0 {
                // delta[l-1][i] = f'(z[l-1][i]) * Σ_k W[l][k][i] * delta[l][k]
                self.layers[l]
                    .weights()
                    .transpose_mul(&delta)
                    .into_iter()
                    .zip(&trace.pre_activations[l - 1])
                    .map(|(s, &z)| s * act.derivative(z))
                    .collect()
            } else {
                Vec::new()
            };

            d_biases.push(std::mem::replace(&mut delta, prev_delta));
        }

        d_weights.reverse();
        d_biases.reverse();

        Ok(Gradients {
            d_weights,
            d_biases,
        })
    }

    /// Gradient-descent step: `param -= learning_rate * grad` for every parameter.
    ///
    /// All checks run before the first write, so on error the network is untouched.
    pub fn update(&mut self, grads: &Gradients, learning_rate: f64) -> Result<()> {
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning rate must be finite and > 0, got {learning_rate}"
            )));
        }
        grads.check_shape(self)?;

        for (layer, (dw, db)) in self
            .layers
            .iter_mut()
            .zip(grads.d_weights.iter().zip(&grads.d_biases))
        {
            layer.sgd_step(dw, db, learning_rate);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn layer_mut(&mut self, l: usize) -> &mut Layer {
        &mut self.layers[l]
    }
}

impl ForwardTrace<'_> {
    /// Final-layer activations (the prediction).
    #[inline]
    pub fn output(&self) -> &[f64] {
        &self.activations[self.activations.len() - 1]
    }

    #[inline]
    pub fn pre_activations(&self) -> &[Vec<f64>] {
        &self.pre_activations
    }

    /// Activations per layer; index 0 is the input.
    #[inline]
    pub fn activations(&self) -> &[Vec<f64>] {
        &self.activations
    }

    /// `(output, pre_activations, activations)`.
    pub fn into_parts(self) -> (Vec<f64>, Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let output = self.output().to_vec();
        (output, self.pre_activations, self.activations)
    }
}

impl Gradients {
    /// All-zero gradients shaped like `net`.
    pub fn zeros_like(net: &Network) -> Self {
        let d_weights = net
            .layers
            .iter()
            .map(|l| Matrix::zeros(l.out_dim(), l.in_dim()))
            .collect();
        let d_biases = net.layers.iter().map(|l| vec![0.0; l.out_dim()]).collect();
        Self {
            d_weights,
            d_biases,
        }
    }

    /// Wrap caller-built gradients. The shape is checked when they are applied.
    pub fn from_parts(d_weights: Vec<Matrix>, d_biases: Vec<Vec<f64>>) -> Self {
        Self {
            d_weights,
            d_biases,
        }
    }

    pub fn into_parts(self) -> (Vec<Matrix>, Vec<Vec<f64>>) {
        (self.d_weights, self.d_biases)
    }

    #[inline]
    pub fn num_transitions(&self) -> usize {
        self.d_weights.len()
    }

    #[inline]
    pub fn weights(&self) -> &[Matrix] {
        &self.d_weights
    }

    #[inline]
    pub fn biases(&self) -> &[Vec<f64>] {
        &self.d_biases
    }

    #[inline]
    pub fn d_weights(&self, l: usize) -> &Matrix {
        &self.d_weights[l]
    }

    #[inline]
    pub fn d_biases(&self, l: usize) -> &[f64] {
        &self.d_biases[l]
    }

    /// Element-wise `self += other`.
    pub fn accumulate(&mut self, other: &Gradients) -> Result<()> {
        self.check_same_shape(other)?;
        for (a, b) in self.d_weights.iter_mut().zip(&other.d_weights) {
            a.add_scaled(b, 1.0);
        }
        for (a, b) in self.d_biases.iter_mut().zip(&other.d_biases) {
            for (x, &y) in a.iter_mut().zip(b) {
                *x += y;
            }
        }
        Ok(())
    }

    /// Multiply every entry by `factor` (e.g. `1 / batch_len` to average).
    pub fn scale(&mut self, factor: f64) {
        for w in &mut self.d_weights {
            w.scale(factor);
        }
        for b in &mut self.d_biases {
            for x in b.iter_mut() {
                *x *= factor;
            }
        }
    }

    /// Euclidean norm over every entry.
    pub fn norm(&self) -> f64 {
        let w = self
            .d_weights
            .iter()
            .flat_map(|m| m.as_slice())
            .map(|g| g * g);
        let b = self.d_biases.iter().flatten().map(|g| g * g);
        w.chain(b).sum::<f64>().sqrt()
    }

    pub fn same_shape_as(&self, net: &Network) -> bool {
        self.check_shape(net).is_ok()
    }

    fn check_shape(&self, net: &Network) -> Result<()> {
        check_len(
            "gradient weight transitions",
            net.layers.len(),
            self.d_weights.len(),
        )?;
        check_len(
            "gradient bias transitions",
            net.layers.len(),
            self.d_biases.len(),
        )?;
        for (layer, (dw, db)) in net
            .layers
            .iter()
            .zip(self.d_weights.iter().zip(&self.d_biases))
        {
            check_len("gradient weight rows", layer.out_dim(), dw.rows())?;
            check_len("gradient weight cols", layer.in_dim(), dw.cols())?;
            check_len("gradient biases", layer.out_dim(), db.len())?;
        }
        Ok(())
    }

    fn check_same_shape(&self, other: &Gradients) -> Result<()> {
        check_len(
            "gradient transitions",
            self.d_weights.len(),
            other.d_weights.len(),
        )?;
        check_len(
            "gradient bias transitions",
            self.d_biases.len(),
            other.d_biases.len(),
        )?;
        for (a, b) in self.d_weights.iter().zip(&other.d_weights) {
            check_len("gradient weight rows", a.rows(), b.rows())?;
            check_len("gradient weight cols", a.cols(), b.cols())?;
        }
        for (a, b) in self.d_biases.iter().zip(&other.d_biases) {
            check_len("gradient biases", a.len(), b.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_abs_diff_eq;

    use crate::loss::squared_error;

    fn loss_for(net: &Network, input: &[f64], target: &[f64]) -> f64 {
        let trace = net.forward(input).unwrap();
        squared_error(trace.output(), target)
    }

    fn check_numeric_gradients(mut net: Network, input: &[f64], target: &[f64]) {
        let grads = net.backward(input, target).unwrap();
        let eps = 1e-5;
        let tol = 1e-4;

        for l in 0..net.num_transitions() {
            for p in 0..net.weights(l).len() {
                let orig = net.weights(l).as_slice()[p];

                net.layer_mut(l).weights_mut().as_mut_slice()[p] = orig + eps;
                let plus = loss_for(&net, input, target);
                net.layer_mut(l).weights_mut().as_mut_slice()[p] = orig - eps;
                let minus = loss_for(&net, input, target);
                net.layer_mut(l).weights_mut().as_mut_slice()[p] = orig;

                let numeric = (plus - minus) / (2.0 * eps);
                assert_abs_diff_eq!(grads.d_weights(l).as_slice()[p], numeric, epsilon = tol);
            }

            for p in 0..net.biases(l).len() {
                let orig = net.biases(l)[p];

                net.layer_mut(l).biases_mut()[p] = orig + eps;
                let plus = loss_for(&net, input, target);
                net.layer_mut(l).biases_mut()[p] = orig - eps;
                let minus = loss_for(&net, input, target);
                net.layer_mut(l).biases_mut()[p] = orig;

                let numeric = (plus - minus) / (2.0 * eps);
                assert_abs_diff_eq!(grads.d_biases(l)[p], numeric, epsilon = tol);
            }
        }
    }

    #[test]
    fn rejects_bad_topology() {
        assert!(matches!(
            Network::new(&[3], Some(0)),
            Err(Error::InvalidTopology(_))
        ));
        assert!(matches!(
            Network::new(&[], Some(0)),
            Err(Error::InvalidTopology(_))
        ));
        assert!(matches!(
            Network::new(&[2, 0, 1], Some(0)),
            Err(Error::InvalidTopology(_))
        ));
    }

    #[test]
    fn parameter_shapes_follow_layer_sizes() {
        let net = Network::new(&[4, 5, 3, 2], Some(1)).unwrap();
        assert_eq!(net.num_transitions(), 3);
        for (l, w) in net.layer_sizes().windows(2).enumerate() {
            assert_eq!(net.weights(l).shape(), (w[1], w[0]));
            assert_eq!(net.weights(l).len(), w[1] * w[0]);
            assert_eq!(net.biases(l).len(), w[1]);
        }
        assert_eq!(net.parameter_count(), 5 * 4 + 5 + 3 * 5 + 3 + 2 * 3 + 2);
    }

    #[test]
    fn seeded_init_is_deterministic() {
        let a = Network::new(&[2, 3, 1], Some(123)).unwrap();
        let b = Network::new(&[2, 3, 1], Some(123)).unwrap();
        let c = Network::new(&[2, 3, 1], Some(124)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn forward_matches_hand_computation() {
        let l1 = Layer::from_parts(2, 2, vec![1.0, -1.0, 0.5, 0.5], vec![0.0, -0.25]).unwrap();
        let l2 = Layer::from_parts(2, 1, vec![2.0, -3.0], vec![0.1]).unwrap();
        let net = Network::from_layers(vec![l1, l2], Activation::ReLU).unwrap();

        let trace = net.forward(&[1.0, 0.5]).unwrap();
        // z1 = [0.5, 0.5], a1 = [0.5, 0.5]; z2 = 1.0 - 1.5 + 0.1 = -0.4, a2 = 0
        assert_eq!(trace.pre_activations()[0], vec![0.5, 0.5]);
        assert_abs_diff_eq!(trace.pre_activations()[1][0], -0.4, epsilon = 1e-12);
        assert_eq!(trace.output(), &[0.0]);
        assert_eq!(trace.activations().len(), 3);
        assert_eq!(trace.activations()[0], vec![1.0, 0.5]);
    }

    #[test]
    fn forward_rejects_wrong_input_len() {
        let net = Network::new(&[2, 3, 1], Some(0)).unwrap();
        let err = net.forward(&[0.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn backward_rejects_wrong_target_len() {
        let net = Network::new(&[2, 3, 1], Some(0)).unwrap();
        assert!(matches!(
            net.backward(&[0.0, 0.0], &[0.0, 1.0]),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            net.backward(&[0.0], &[0.0]),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn backward_matches_numeric_gradients_sigmoid() {
        let net = Network::new(&[2, 3, 1], Some(0)).unwrap();
        check_numeric_gradients(net, &[0.3, -0.7], &[0.2]);
    }

    #[test]
    fn backward_matches_numeric_gradients_deep_sigmoid() {
        // Non-square transitions catch transpose indexing mistakes.
        let net = Network::new(&[4, 5, 3, 2], Some(9)).unwrap();
        check_numeric_gradients(net, &[0.1, -0.4, 0.9, 0.0], &[1.0, 0.0]);
    }

    #[test]
    fn backward_matches_numeric_gradients_relu() {
        // Fixed parameters keep every pre-activation well away from the kink at 0.
        let l1 = Layer::from_parts(2, 3, vec![0.8, -0.2, 0.5, 0.4, -0.6, 0.3], vec![0.5, 0.6, 0.7])
            .unwrap();
        let l2 = Layer::from_parts(3, 2, vec![0.3, -0.5, 0.9, 0.2, 0.7, -0.1], vec![0.4, 0.3])
            .unwrap();
        let net = Network::from_layers(vec![l1, l2], Activation::ReLU).unwrap();
        check_numeric_gradients(net, &[0.5, 0.25], &[0.0, 1.0]);
    }

    #[test]
    fn backward_from_trace_equals_backward() {
        let net = Network::new(&[3, 4, 2], Some(5)).unwrap();
        let input = [0.2, 0.4, -0.6];
        let target = [1.0, 0.0];
        let trace = net.forward(&input).unwrap();
        assert_eq!(
            net.backward_from_trace(&trace, &target).unwrap(),
            net.backward(&input, &target).unwrap()
        );

        let other = Network::new(&[3, 5, 2], Some(5)).unwrap();
        assert!(other.backward_from_trace(&trace, &target).is_err());
    }

    #[test]
    fn from_layers_rejects_zero_width_layer() {
        let mut rng = StdRng::seed_from_u64(0);
        let into_empty = Layer::new_with_rng(2, 0, &mut rng);
        let from_empty = Layer::new_with_rng(0, 1, &mut rng);
        assert!(matches!(
            Network::from_layers(vec![into_empty, from_empty], Activation::Sigmoid),
            Err(Error::InvalidTopology(_))
        ));
        assert!(matches!(
            Network::from_layers(vec![], Activation::Sigmoid),
            Err(Error::InvalidTopology(_))
        ));
    }

    #[test]
    fn fresh_trace_after_update_matches_backward() {
        let mut net = Network::new(&[2, 3, 1], Some(4)).unwrap();
        let input = [0.5, -1.2];
        let target = [0.0];

        let before = net.forward(&input).unwrap().into_parts().0;
        let grads = net.backward(&input, &target).unwrap();
        net.update(&grads, 5.0).unwrap();

        let trace = net.forward(&input).unwrap();
        assert_ne!(trace.output(), before.as_slice());
        assert_eq!(
            net.backward_from_trace(&trace, &target).unwrap(),
            net.backward(&input, &target).unwrap()
        );
    }

    #[test]
    fn update_rejects_bad_learning_rate_and_shape() {
        let mut net = Network::new(&[2, 3, 1], Some(0)).unwrap();
        let before = net.clone();
        let grads = net.backward(&[0.5, -1.2], &[0.0]).unwrap();

        assert!(net.update(&grads, 0.0).is_err());
        assert!(net.update(&grads, f64::NAN).is_err());

        let other = Network::new(&[2, 4, 1], Some(0)).unwrap();
        let wrong = Gradients::zeros_like(&other);
        assert!(!wrong.same_shape_as(&net));
        assert!(net.update(&wrong, 0.1).is_err());

        assert_eq!(net, before);
    }

    #[test]
    fn update_applies_exact_step() {
        let l1 = Layer::from_parts(1, 1, vec![1.0], vec![2.0]).unwrap();
        let mut net = Network::from_layers(vec![l1], Activation::Sigmoid).unwrap();
        let grads = Gradients::from_parts(
            vec![Matrix::from_vec(1, 1, vec![3.0]).unwrap()],
            vec![vec![4.0]],
        );
        net.update(&grads, 0.1).unwrap();
        assert_abs_diff_eq!(net.weights(0).get(0, 0), 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(net.biases(0)[0], 1.6, epsilon = 1e-12);
    }

    #[test]
    fn accumulate_and_scale_average_a_batch() {
        let net = Network::new(&[2, 3, 1], Some(3)).unwrap();
        let g1 = net.backward(&[0.1, 0.2], &[1.0]).unwrap();
        let g2 = net.backward(&[-0.3, 0.4], &[0.0]).unwrap();

        let mut sum = Gradients::zeros_like(&net);
        sum.accumulate(&g1).unwrap();
        sum.accumulate(&g2).unwrap();
        sum.scale(0.5);

        let p = 4;
        let expected = 0.5 * (g1.d_weights(0).as_slice()[p] + g2.d_weights(0).as_slice()[p]);
        assert_abs_diff_eq!(sum.d_weights(0).as_slice()[p], expected, epsilon = 1e-12);

        let other = Network::new(&[2, 2, 1], Some(3)).unwrap();
        let mut wrong = Gradients::zeros_like(&other);
        assert!(wrong.accumulate(&g1).is_err());
    }
}
