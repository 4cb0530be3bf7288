//! Dense, layer-norm and dropout building blocks with manual backprop.
//!
//! Weights are stored flat and row-major (`kernel[o * input_size + i]`).
//! Every `backward` accumulates into a gradient struct of the same shape and
//! returns the gradient with respect to its input.

use rand::rngs::StdRng;
use rand_distr::{Bernoulli, Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Variance floor for layer normalization.
pub const NORM_EPSILON: f64 = 1e-3;

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[inline]
pub fn relu(x: f64) -> f64 {
    x.max(0.0)
}

/// Glorot/Xavier uniform: `U(-l, l)` with `l = sqrt(6 / (fan_in + fan_out))`.
pub fn glorot_uniform(len: usize, fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Vec<f64> {
    let limit = (6.0 / (fan_in + fan_out).max(1) as f64).sqrt();
    let dist = Uniform::new_inclusive(-limit, limit);
    (0..len).map(|_| dist.sample(rng)).collect()
}

// ============================================================================
// Dense
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseWeights {
    pub input_size: usize,
    pub output_size: usize,
    /// `[output_size x input_size]`
    pub kernel: Vec<f64>,
    pub bias: Vec<f64>,
}

impl DenseWeights {
    pub fn init(input_size: usize, output_size: usize, rng: &mut StdRng) -> Self {
        Self {
            input_size,
            output_size,
            kernel: glorot_uniform(input_size * output_size, input_size, output_size, rng),
            bias: vec![0.0; output_size],
        }
    }

    pub fn zeros(input_size: usize, output_size: usize) -> Self {
        Self {
            input_size,
            output_size,
            kernel: vec![0.0; input_size * output_size],
            bias: vec![0.0; output_size],
        }
    }

    /// `y = W x + b`
    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        self.kernel
            .chunks_exact(self.input_size)
            .zip(&self.bias)
            .map(|(row, b)| b + row.iter().zip(x).map(|(w, xi)| w * xi).sum::<f64>())
            .collect()
    }

    pub fn backward(&self, x: &[f64], dy: &[f64], grads: &mut Self) -> Vec<f64> {
        let mut dx = vec![0.0; self.input_size];
        for (o, &g) in dy.iter().enumerate() {
            if g == 0.0 {
                continue;
            }
            grads.bias[o] += g;
            let row = o * self.input_size;
            let w_row = &self.kernel[row..row + self.input_size];
            let g_row = &mut grads.kernel[row..row + self.input_size];
            for i in 0..self.input_size {
                g_row[i] += g * x[i];
                dx[i] += w_row[i] * g;
            }
        }
        dx
    }

    pub fn is_consistent(&self) -> bool {
        self.kernel.len() == self.input_size * self.output_size && self.bias.len() == self.output_size
    }
}

// ============================================================================
// Layer normalization
// ============================================================================

/// Learnable scale and shift of a layer-norm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormWeights {
    pub size: usize,
    pub gamma: Vec<f64>,
    pub beta: Vec<f64>,
}

/// Values saved by the forward pass for backprop.
#[derive(Debug, Clone)]
pub struct NormCache {
    pub normalized: Vec<f64>,
    pub inv_std: f64,
}

impl NormWeights {
    pub fn init(size: usize) -> Self {
        Self { size, gamma: vec![1.0; size], beta: vec![0.0; size] }
    }

    pub fn zeros(size: usize) -> Self {
        Self { size, gamma: vec![0.0; size], beta: vec![0.0; size] }
    }

    pub fn forward(&self, x: &[f64]) -> (Vec<f64>, NormCache) {
        let n = x.len() as f64;
        let mean = x.iter().sum::<f64>() / n;
        let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let inv_std = 1.0 / (var + NORM_EPSILON).sqrt();

        let normalized: Vec<f64> = x.iter().map(|v| (v - mean) * inv_std).collect();
        let y = normalized
            .iter()
            .zip(self.gamma.iter().zip(&self.beta))
            .map(|(xh, (g, b))| g * xh + b)
            .collect();
        (y, NormCache { normalized, inv_std })
    }

    pub fn backward(&self, cache: &NormCache, dy: &[f64], grads: &mut Self) -> Vec<f64> {
        let n = dy.len() as f64;
        let mut dxhat = vec![0.0; dy.len()];
        let mut sum_dxhat = 0.0;
        let mut sum_dxhat_xhat = 0.0;
        for i in 0..dy.len() {
            let xh = cache.normalized[i];
            grads.gamma[i] += dy[i] * xh;
            grads.beta[i] += dy[i];
            dxhat[i] = dy[i] * self.gamma[i];
            sum_dxhat += dxhat[i];
            sum_dxhat_xhat += dxhat[i] * xh;
        }
        dxhat
            .iter()
            .zip(&cache.normalized)
            .map(|(d, xh)| cache.inv_std / n * (n * d - sum_dxhat - xh * sum_dxhat_xhat))
            .collect()
    }

    pub fn is_consistent(&self) -> bool {
        self.gamma.len() == self.size && self.beta.len() == self.size
    }
}

// ============================================================================
// Dropout
// ============================================================================

/// Inverted-dropout mask: each entry is `0` with probability `rate`, else
/// `1 / (1 - rate)`. A zero rate yields all ones.
pub fn dropout_mask(size: usize, rate: f64, rng: &mut StdRng) -> Vec<f64> {
    if rate <= 0.0 {
        return vec![1.0; size];
    }
    let keep = 1.0 - rate;
    match Bernoulli::new(keep) {
        Ok(dist) => (0..size)
            .map(|_| if dist.sample(rng) { 1.0 / keep } else { 0.0 })
            .collect(),
        Err(_) => vec![0.0; size],
    }
}

#[inline]
pub fn apply_mask(values: &mut [f64], mask: &[f64]) {
    for (v, m) in values.iter_mut().zip(mask) {
        *v *= m;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_dense_forward() {
        let d = DenseWeights {
            input_size: 2,
            output_size: 2,
            kernel: vec![1.0, 2.0, -1.0, 0.5],
            bias: vec![0.5, 0.0],
        };
        assert_eq!(d.forward(&[1.0, 1.0]), vec![3.5, -0.5]);
    }

    #[test]
    fn test_dense_backward_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(3);
        let d = DenseWeights::init(3, 2, &mut rng);
        let x = [0.3, -1.2, 0.8];
        let dy = [1.0, -0.5];
        let mut grads = DenseWeights::zeros(3, 2);
        let dx = d.backward(&x, &dy, &mut grads);

        let objective = |x: &[f64]| -> f64 {
            let y = d.forward(x);
            y[0] * dy[0] + y[1] * dy[1]
        };
        for i in 0..3 {
            let mut xp = x;
            let mut xm = x;
            xp[i] += 1e-6;
            xm[i] -= 1e-6;
            let numeric = (objective(&xp) - objective(&xm)) / 2e-6;
            assert!((numeric - dx[i]).abs() < 1e-6);
        }
        assert!((grads.kernel[0] - 0.3).abs() < 1e-12);
        assert!((grads.bias[1] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_layer_norm_output_statistics() {
        let norm = NormWeights::init(4);
        let (y, _) = norm.forward(&[1.0, 2.0, 3.0, 10.0]);
        let mean = y.iter().sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
    }

    #[test]
    fn test_layer_norm_backward_matches_finite_difference() {
        let norm = NormWeights {
            size: 3,
            gamma: vec![1.5, -0.7, 0.9],
            beta: vec![0.1, 0.2, -0.3],
        };
        let x = [0.4, -1.1, 2.3];
        let dy = [0.7, -0.2, 1.3];
        let (_, cache) = norm.forward(&x);
        let mut grads = NormWeights::zeros(3);
        let dx = norm.backward(&cache, &dy, &mut grads);

        let objective = |x: &[f64]| -> f64 {
            let (y, _) = norm.forward(x);
            y.iter().zip(&dy).map(|(a, b)| a * b).sum()
        };
        for i in 0..3 {
            let mut xp = x;
            let mut xm = x;
            xp[i] += 1e-6;
            xm[i] -= 1e-6;
            let numeric = (objective(&xp) - objective(&xm)) / 2e-6;
            assert!((numeric - dx[i]).abs() < 1e-5, "dx[{i}]: {numeric} vs {}", dx[i]);
        }
    }

    #[test]
    fn test_dropout_mask_scaling() {
        let mut rng = StdRng::seed_from_u64(11);
        let mask = dropout_mask(10_000, 0.3, &mut rng);
        let kept = mask.iter().filter(|&&m| m > 0.0).count() as f64 / 10_000.0;
        assert!((kept - 0.7).abs() < 0.03);
        assert!(mask.iter().all(|&m| m == 0.0 || (m - 1.0 / 0.7).abs() < 1e-12));
        assert!(dropout_mask(5, 0.0, &mut rng).iter().all(|&m| m == 1.0));
    }

    #[test]
    fn test_glorot_bounds() {
        let mut rng = StdRng::seed_from_u64(0);
        let w = glorot_uniform(1000, 24, 512, &mut rng);
        let limit = (6.0_f64 / 536.0).sqrt();
        assert!(w.iter().all(|v| v.abs() <= limit));
    }
}
