//! Multilayer perceptron (feed-forward only). Peer component (§1: "does not
//! interact with CMF").
//!
//! Grounded on `examples/original_source/src/perceptron.hpp`'s
//! `feed_forward`/`set_weights` semantics: each neuron sums the weighted
//! output of every neuron in the previous layer plus a bias weight, then
//! applies an activation function. The original flattens all weights and
//! neuron outputs into two fixed-size `double[total_weight_count]` arrays
//! indexed by hand-derived offsets (`weight_base`, `output_base`); this port
//! uses one `Vec<f64>` of weights per neuron (grouped per layer), which is
//! the idiomatic nested-vector substitute for that offset arithmetic.

/// A fully-connected feed-forward network. `layer_sizes[0]` is the input
/// width; `layer_sizes[last]` is the output width.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MultiLayerPerceptron {
    layer_sizes: Vec<usize>,
    /// `weights[layer][neuron]` is the incoming weight vector for that
    /// neuron, sized `layer_sizes[layer-1] + 1` (last entry is the bias).
    weights: Vec<Vec<Vec<f64>>>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl MultiLayerPerceptron {
    /// Builds a network with zero-initialised weights for the given layer
    /// sizes (`layer_sizes.len()` must be at least 2).
    pub fn new(layer_sizes: Vec<usize>) -> Self {
        let mut weights = Vec::with_capacity(layer_sizes.len());
        weights.push(Vec::new()); // layer 0 (input) carries no weights.
        for l in 1..layer_sizes.len() {
            let fan_in = layer_sizes[l - 1] + 1; // +1 for the bias weight.
            weights.push(vec![vec![0.0; fan_in]; layer_sizes[l]]);
        }
        MultiLayerPerceptron {
            layer_sizes,
            weights,
        }
    }

    /// Feeds `input` (sized `layer_sizes[0]`) through every layer and
    /// returns the final layer's activations (sized `layer_sizes[last]`).
    pub fn feed_forward(&self, input: &[f64]) -> Vec<f64> {
        let mut activations = input.to_vec();
        for l in 1..self.layer_sizes.len() {
            let mut next = Vec::with_capacity(self.layer_sizes[l]);
            for neuron_weights in &self.weights[l] {
                let bias = *neuron_weights.last().unwrap();
                let sum: f64 = neuron_weights[..neuron_weights.len() - 1]
                    .iter()
                    .zip(activations.iter())
                    .map(|(w, a)| w * a)
                    .sum::<f64>()
                    + bias;
                next.push(sigmoid(sum));
            }
            activations = next;
        }
        activations
    }

    /// Overwrites the incoming weight vector (including trailing bias) for
    /// one neuron in `layer` (must be `>= 1`).
    pub fn set_neuron_weights(&mut self, layer: usize, neuron: usize, new_weights: &[f64]) {
        self.weights[layer][neuron].copy_from_slice(new_weights);
    }

    /// Overwrites every neuron's weights in `layer` at once, flattened as
    /// `(fan_in + 1) * layer_sizes[layer]` values, row-major per neuron.
    pub fn set_layer_weights(&mut self, layer: usize, new_weights: &[f64]) {
        let fan_in = self.layer_sizes[layer - 1] + 1;
        for (neuron, chunk) in new_weights.chunks(fan_in).enumerate() {
            self.weights[layer][neuron].copy_from_slice(chunk);
        }
    }

    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_weights_and_zero_bias_output_one_half() {
        let mlp = MultiLayerPerceptron::new(vec![2, 3, 1]);
        let out = mlp.feed_forward(&[1.0, -1.0]);
        assert_eq!(out.len(), 1);
        assert!((out[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn set_neuron_weights_changes_output() {
        let mut mlp = MultiLayerPerceptron::new(vec![1, 1]);
        mlp.set_neuron_weights(1, 0, &[10.0, 0.0]);
        let out = mlp.feed_forward(&[1.0]);
        assert!(out[0] > 0.99);
    }
}
