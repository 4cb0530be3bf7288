//! Stacked-LSTM failure classifier.
//!
//! ```text
//! window [T x F]
//!   -> LSTM(F -> 128), every step -> LayerNorm -> Dropout
//!   -> LSTM(128 -> 64), last step -> LayerNorm -> Dropout
//!   -> Dense(64 -> 32) ReLU       -> LayerNorm -> Dropout
//!   -> Dense(32 -> 1) sigmoid
//! ```

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::layers::{apply_mask, dropout_mask, relu, sigmoid, DenseWeights, NormCache, NormWeights};
use super::lstm::LstmWeights;
use crate::evaluation::metrics::bce_term;
use crate::prep::{Window, WindowSet};
use crate::types::NUM_FEATURES;

/// Layer sizes and regularization of the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub num_features: usize,
    pub lstm1_units: usize,
    pub lstm2_units: usize,
    pub dense_units: usize,
    pub dropout: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            num_features: NUM_FEATURES,
            lstm1_units: 128,
            lstm2_units: 64,
            dense_units: 32,
            dropout: 0.3,
        }
    }
}

/// All trainable tensors. Also used, zero-initialized, as a gradient buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierWeights {
    pub lstm1: LstmWeights,
    pub norm1: NormWeights,
    pub lstm2: LstmWeights,
    pub norm2: NormWeights,
    pub dense: DenseWeights,
    pub norm3: NormWeights,
    pub head: DenseWeights,
}

impl ClassifierWeights {
    pub fn init(config: &ClassifierConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            lstm1: LstmWeights::init(config.num_features, config.lstm1_units, &mut rng),
            norm1: NormWeights::init(config.lstm1_units),
            lstm2: LstmWeights::init(config.lstm1_units, config.lstm2_units, &mut rng),
            norm2: NormWeights::init(config.lstm2_units),
            dense: DenseWeights::init(config.lstm2_units, config.dense_units, &mut rng),
            norm3: NormWeights::init(config.dense_units),
            head: DenseWeights::init(config.dense_units, 1, &mut rng),
        }
    }

    pub fn zeros(config: &ClassifierConfig) -> Self {
        Self {
            lstm1: LstmWeights::zeros(config.num_features, config.lstm1_units),
            norm1: NormWeights::zeros(config.lstm1_units),
            lstm2: LstmWeights::zeros(config.lstm1_units, config.lstm2_units),
            norm2: NormWeights::zeros(config.lstm2_units),
            dense: DenseWeights::zeros(config.lstm2_units, config.dense_units),
            norm3: NormWeights::zeros(config.dense_units),
            head: DenseWeights::zeros(config.dense_units, 1),
        }
    }

    /// Every tensor in a fixed order.
    pub fn tensors(&self) -> [&[f64]; 16] {
        [
            self.lstm1.kernel.as_slice(),
            self.lstm1.recurrent.as_slice(),
            self.lstm1.bias.as_slice(),
            self.norm1.gamma.as_slice(),
            self.norm1.beta.as_slice(),
            self.lstm2.kernel.as_slice(),
            self.lstm2.recurrent.as_slice(),
            self.lstm2.bias.as_slice(),
            self.norm2.gamma.as_slice(),
            self.norm2.beta.as_slice(),
            self.dense.kernel.as_slice(),
            self.dense.bias.as_slice(),
            self.norm3.gamma.as_slice(),
            self.norm3.beta.as_slice(),
            self.head.kernel.as_slice(),
            self.head.bias.as_slice(),
        ]
    }

    /// Every tensor, mutably, in the order of [`Self::tensors`].
    pub fn tensors_mut(&mut self) -> [&mut [f64]; 16] {
        [
            self.lstm1.kernel.as_mut_slice(),
            self.lstm1.recurrent.as_mut_slice(),
            self.lstm1.bias.as_mut_slice(),
            self.norm1.gamma.as_mut_slice(),
            self.norm1.beta.as_mut_slice(),
            self.lstm2.kernel.as_mut_slice(),
            self.lstm2.recurrent.as_mut_slice(),
            self.lstm2.bias.as_mut_slice(),
            self.norm2.gamma.as_mut_slice(),
            self.norm2.beta.as_mut_slice(),
            self.dense.kernel.as_mut_slice(),
            self.dense.bias.as_mut_slice(),
            self.norm3.gamma.as_mut_slice(),
            self.norm3.beta.as_mut_slice(),
            self.head.kernel.as_mut_slice(),
            self.head.bias.as_mut_slice(),
        ]
    }

    pub fn num_params(&self) -> usize {
        self.tensors().iter().map(|t| t.len()).sum()
    }

    pub fn add_assign(&mut self, other: &Self) {
        for (dst, src) in self.tensors_mut().into_iter().zip(other.tensors()) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s;
            }
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for t in self.tensors_mut() {
            for v in t.iter_mut() {
                *v *= factor;
            }
        }
    }

    pub fn l2_norm(&self) -> f64 {
        self.tensors()
            .into_iter()
            .flat_map(|t| t.iter())
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt()
    }

    /// Check that every tensor has the shape `config` implies.
    pub fn matches(&self, config: &ClassifierConfig) -> bool {
        let shapes_ok = self.lstm1.input_size == config.num_features
            && self.lstm1.hidden_size == config.lstm1_units
            && self.norm1.size == config.lstm1_units
            && self.lstm2.input_size == config.lstm1_units
            && self.lstm2.hidden_size == config.lstm2_units
            && self.norm2.size == config.lstm2_units
            && self.dense.input_size == config.lstm2_units
            && self.dense.output_size == config.dense_units
            && self.norm3.size == config.dense_units
            && self.head.input_size == config.dense_units
            && self.head.output_size == 1;
        shapes_ok
            && self.lstm1.is_consistent()
            && self.norm1.is_consistent()
            && self.lstm2.is_consistent()
            && self.norm2.is_consistent()
            && self.dense.is_consistent()
            && self.norm3.is_consistent()
            && self.head.is_consistent()
    }
}

/// The classifier: configuration, init seed and current weights.
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    config: ClassifierConfig,
    seed: u64,
    weights: ClassifierWeights,
}

impl FailureClassifier {
    pub fn new(config: ClassifierConfig, seed: u64) -> Self {
        let weights = ClassifierWeights::init(&config, seed);
        tracing::debug!(params = weights.num_params(), seed, "Classifier initialized");
        Self { config, seed, weights }
    }

    /// Wrap existing weights. The caller is responsible for shape checks.
    pub(crate) fn from_parts(config: ClassifierConfig, seed: u64, weights: ClassifierWeights) -> Self {
        Self { config, seed, weights }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn weights(&self) -> &ClassifierWeights {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut ClassifierWeights {
        &mut self.weights
    }

    pub fn set_weights(&mut self, weights: ClassifierWeights) {
        self.weights = weights;
    }

    pub fn num_params(&self) -> usize {
        self.weights.num_params()
    }

    /// Inference on row-major `[T x num_features]` values (dropout off).
    pub fn predict_values(&self, values: &[f64]) -> f64 {
        let w = &self.weights;
        let seq1 = w.lstm1.run_sequence(values.chunks_exact(self.config.num_features));
        let normed: Vec<Vec<f64>> = seq1.iter().map(|h| w.norm1.forward(h).0).collect();
        let seq2 = w.lstm2.run_sequence(normed.iter().map(Vec::as_slice));
        let Some(last) = seq2.last() else {
            return sigmoid(w.head.bias[0]);
        };

        let (a2, _) = w.norm2.forward(last);
        let hidden: Vec<f64> = w.dense.forward(&a2).into_iter().map(relu).collect();
        let (a3, _) = w.norm3.forward(&hidden);
        sigmoid(w.head.forward(&a3)[0])
    }

    /// Failure probability of one window.
    pub fn predict(&self, window: &Window<'_>) -> f64 {
        self.predict_values(window.values())
    }

    /// Probabilities for the given window indices, computed in parallel.
    pub fn predict_indices(&self, windows: &WindowSet, indices: &[usize]) -> Vec<f64> {
        indices.par_iter().map(|&i| self.predict(&windows.get(i))).collect()
    }

    /// Probabilities for every window, in index order.
    pub fn predict_proba(&self, windows: &WindowSet) -> Vec<f64> {
        (0..windows.len())
            .into_par_iter()
            .map(|i| self.predict(&windows.get(i)))
            .collect()
    }

    /// Forward and backward pass for one training sample with dropout.
    ///
    /// Adds the gradient of the BCE loss into `grads` and returns
    /// `(probability, loss)`.
    pub fn train_values(&self, values: &[f64], label: u8, rng: &mut StdRng, grads: &mut ClassifierWeights) -> (f64, f64) {
        let w = &self.weights;
        let rate = self.config.dropout;

        // Forward
        let trace1 = w.lstm1.forward(values.chunks_exact(self.config.num_features));
        let steps = trace1.outputs.len();
        if steps == 0 {
            let p = sigmoid(w.head.bias[0]);
            return (p, bce_term(p, label));
        }

        let mut caches1: Vec<NormCache> = Vec::with_capacity(steps);
        let mut masks1: Vec<Vec<f64>> = Vec::with_capacity(steps);
        let mut a1: Vec<Vec<f64>> = Vec::with_capacity(steps);
        for h in &trace1.outputs {
            let (mut y, cache) = w.norm1.forward(h);
            let mask = dropout_mask(y.len(), rate, rng);
            apply_mask(&mut y, &mask);
            caches1.push(cache);
            masks1.push(mask);
            a1.push(y);
        }

        let trace2 = w.lstm2.forward(a1.iter().map(Vec::as_slice));
        let last = trace2.outputs.len() - 1;
        let (mut a2, cache2) = w.norm2.forward(&trace2.outputs[last]);
        let mask2 = dropout_mask(a2.len(), rate, rng);
        apply_mask(&mut a2, &mask2);

        let pre3 = w.dense.forward(&a2);
        let hidden: Vec<f64> = pre3.iter().copied().map(relu).collect();
        let (mut a3, cache3) = w.norm3.forward(&hidden);
        let mask3 = dropout_mask(a3.len(), rate, rng);
        apply_mask(&mut a3, &mask3);

        let p = sigmoid(w.head.forward(&a3)[0]);
        let loss = bce_term(p, label);

        // Backward: d(BCE)/d(logit) = p - y
        let d_logit = p - f64::from(label);
        let mut d_a3 = w.head.backward(&a3, &[d_logit], &mut grads.head);
        apply_mask(&mut d_a3, &mask3);
        let mut d_hidden = w.norm3.backward(&cache3, &d_a3, &mut grads.norm3);
        for (d, z) in d_hidden.iter_mut().zip(&pre3) {
            if *z <= 0.0 {
                *d = 0.0;
            }
        }
        let mut d_a2 = w.dense.backward(&a2, &d_hidden, &mut grads.dense);
        apply_mask(&mut d_a2, &mask2);
        let d_h2 = w.norm2.backward(&cache2, &d_a2, &mut grads.norm2);

        let mut d_out2 = vec![vec![0.0; w.lstm2.hidden_size]; steps];
        d_out2[last] = d_h2;
        let d_a1 = w.lstm2.backward(&trace2, &d_out2, &mut grads.lstm2, true);

        let d_out1: Vec<Vec<f64>> = d_a1
            .into_iter()
            .zip(masks1.iter().zip(&caches1))
            .map(|(mut d, (mask, cache))| {
                apply_mask(&mut d, mask);
                w.norm1.backward(cache, &d, &mut grads.norm1)
            })
            .collect();
        w.lstm1.backward(&trace1, &d_out1, &mut grads.lstm1, false);

        (p, loss)
    }

    pub fn train_sample(&self, window: &Window<'_>, rng: &mut StdRng, grads: &mut ClassifierWeights) -> (f64, f64) {
        self.train_values(window.values(), window.label, rng, grads)
    }
}
