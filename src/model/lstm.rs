//! LSTM layer with full backpropagation through time.
//!
//! ```text
//! z = W x_t + U h_{t-1} + b            (4H rows, gate order i, f, g, o)
//! i = sigmoid(z_i)   f = sigmoid(z_f)   g = tanh(z_g)   o = sigmoid(z_o)
//! c_t = f * c_{t-1} + i * g
//! h_t = o * tanh(c_t)
//! ```

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::layers::{glorot_uniform, sigmoid};

/// Initial forget-gate bias.
const FORGET_BIAS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmWeights {
    pub input_size: usize,
    pub hidden_size: usize,
    /// `[4H x input_size]`
    pub kernel: Vec<f64>,
    /// `[4H x H]`
    pub recurrent: Vec<f64>,
    /// `[4H]`
    pub bias: Vec<f64>,
}

/// Activations of one time step, kept for BPTT.
#[derive(Debug, Clone)]
pub struct LstmStep {
    pub input: Vec<f64>,
    pub h_prev: Vec<f64>,
    pub c_prev: Vec<f64>,
    /// Activated gates `[i | f | g | o]`.
    pub gates: Vec<f64>,
    pub tanh_c: Vec<f64>,
}

/// Forward record of a whole sequence.
#[derive(Debug, Clone, Default)]
pub struct LstmTrace {
    pub steps: Vec<LstmStep>,
    /// Hidden state after each step.
    pub outputs: Vec<Vec<f64>>,
}

impl LstmTrace {
    pub fn last_output(&self) -> Option<&[f64]> {
        self.outputs.last().map(Vec::as_slice)
    }
}

impl LstmWeights {
    pub fn init(input_size: usize, hidden_size: usize, rng: &mut StdRng) -> Self {
        let rows = 4 * hidden_size;
        let kernel = glorot_uniform(rows * input_size, input_size, rows, rng);
        let recurrent = glorot_uniform(rows * hidden_size, hidden_size, rows, rng);
        let mut bias = vec![0.0; rows];
        bias[hidden_size..2 * hidden_size].fill(FORGET_BIAS);
        Self { input_size, hidden_size, kernel, recurrent, bias }
    }

    pub fn zeros(input_size: usize, hidden_size: usize) -> Self {
        let rows = 4 * hidden_size;
        Self {
            input_size,
            hidden_size,
            kernel: vec![0.0; rows * input_size],
            recurrent: vec![0.0; rows * hidden_size],
            bias: vec![0.0; rows],
        }
    }

    pub fn is_consistent(&self) -> bool {
        let rows = 4 * self.hidden_size;
        self.kernel.len() == rows * self.input_size
            && self.recurrent.len() == rows * self.hidden_size
            && self.bias.len() == rows
    }

    /// One step: returns `(gates, c_new, tanh_c, h_new)`.
    fn step(&self, x: &[f64], h_prev: &[f64], c_prev: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
        let h = self.hidden_size;
        let mut gates = self.bias.clone();
        for (r, z) in gates.iter_mut().enumerate() {
            let w = &self.kernel[r * self.input_size..(r + 1) * self.input_size];
            let u = &self.recurrent[r * h..(r + 1) * h];
            *z += w.iter().zip(x).map(|(a, b)| a * b).sum::<f64>()
                + u.iter().zip(h_prev).map(|(a, b)| a * b).sum::<f64>();
        }
        for (r, z) in gates.iter_mut().enumerate() {
            *z = if (2 * h..3 * h).contains(&r) { z.tanh() } else { sigmoid(*z) };
        }

        let mut c = vec![0.0; h];
        let mut tanh_c = vec![0.0; h];
        let mut h_new = vec![0.0; h];
        for k in 0..h {
            let (i, f, g, o) = (gates[k], gates[h + k], gates[2 * h + k], gates[3 * h + k]);
            c[k] = f * c_prev[k] + i * g;
            tanh_c[k] = c[k].tanh();
            h_new[k] = o * tanh_c[k];
        }
        (gates, c, tanh_c, h_new)
    }

    /// Run a sequence of input rows from zero state, recording every step.
    pub fn forward<'a>(&self, inputs: impl IntoIterator<Item = &'a [f64]>) -> LstmTrace {
        let mut h = vec![0.0; self.hidden_size];
        let mut c = vec![0.0; self.hidden_size];
        let mut trace = LstmTrace::default();

        for x in inputs {
            let (gates, c_new, tanh_c, h_new) = self.step(x, &h, &c);
            trace.steps.push(LstmStep {
                input: x.to_vec(),
                h_prev: std::mem::replace(&mut h, h_new.clone()),
                c_prev: std::mem::replace(&mut c, c_new),
                gates,
                tanh_c,
            });
            trace.outputs.push(h_new);
        }
        trace
    }

    /// Inference-only pass returning every hidden state.
    pub fn run_sequence<'a>(&self, inputs: impl IntoIterator<Item = &'a [f64]>) -> Vec<Vec<f64>> {
        let mut h = vec![0.0; self.hidden_size];
        let mut c = vec![0.0; self.hidden_size];
        let mut outputs = Vec::new();
        for x in inputs {
            let (_, c_new, _, h_new) = self.step(x, &h, &c);
            c = c_new;
            h = h_new;
            outputs.push(h.clone());
        }
        outputs
    }

    /// Backpropagation through time.
    ///
    /// `d_outputs[t]` is the loss gradient w.r.t. the hidden state emitted at
    /// step `t`. Parameter gradients are accumulated into `grads`. When
    /// `want_input_grads` is set, returns the gradient w.r.t. each input row;
    /// otherwise returns an empty vector.
    pub fn backward(
        &self,
        trace: &LstmTrace,
        d_outputs: &[Vec<f64>],
        grads: &mut Self,
        want_input_grads: bool,
    ) -> Vec<Vec<f64>> {
        let h = self.hidden_size;
        let n_in = self.input_size;
        let mut dh_next = vec![0.0; h];
        let mut dc_next = vec![0.0; h];
        let mut dz = vec![0.0; 4 * h];
        let mut d_inputs = if want_input_grads {
            vec![Vec::new(); trace.steps.len()]
        } else {
            Vec::new()
        };

        for t in (0..trace.steps.len()).rev() {
            let step = &trace.steps[t];
            let gates = &step.gates;

            for k in 0..h {
                let (i, f, g, o) = (gates[k], gates[h + k], gates[2 * h + k], gates[3 * h + k]);
                let tc = step.tanh_c[k];
                let dh = d_outputs[t][k] + dh_next[k];
                let dc = dh * o * (1.0 - tc * tc) + dc_next[k];

                dz[k] = dc * g * i * (1.0 - i);
                dz[h + k] = dc * step.c_prev[k] * f * (1.0 - f);
                dz[2 * h + k] = dc * i * (1.0 - g * g);
                dz[3 * h + k] = dh * tc * o * (1.0 - o);
                dc_next[k] = dc * f;
            }

            dh_next.fill(0.0);
            let mut dx = if want_input_grads { vec![0.0; n_in] } else { Vec::new() };
            for (r, &g) in dz.iter().enumerate() {
                if g == 0.0 {
                    continue;
                }
                grads.bias[r] += g;

                let w = &self.kernel[r * n_in..(r + 1) * n_in];
                let gw = &mut grads.kernel[r * n_in..(r + 1) * n_in];
                for j in 0..n_in {
                    gw[j] += g * step.input[j];
                }
                if want_input_grads {
                    for j in 0..n_in {
                        dx[j] += w[j] * g;
                    }
                }

                let u = &self.recurrent[r * h..(r + 1) * h];
                let gu = &mut grads.recurrent[r * h..(r + 1) * h];
                for k in 0..h {
                    gu[k] += g * step.h_prev[k];
                    dh_next[k] += u[k] * g;
                }
            }
            if want_input_grads {
                d_inputs[t] = dx;
            }
        }
        d_inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn sequence() -> Vec<Vec<f64>> {
        vec![vec![0.5, -0.3], vec![0.1, 0.9], vec![-0.7, 0.2], vec![0.4, 0.4]]
    }

    /// Scalar objective: weighted sum of every hidden output.
    fn objective(w: &LstmWeights, xs: &[Vec<f64>], coeffs: &[Vec<f64>]) -> f64 {
        let outs = w.run_sequence(xs.iter().map(Vec::as_slice));
        outs.iter()
            .zip(coeffs)
            .map(|(h, c)| h.iter().zip(c).map(|(a, b)| a * b).sum::<f64>())
            .sum()
    }

    #[test]
    fn test_init_shapes_and_forget_bias() {
        let mut rng = StdRng::seed_from_u64(1);
        let w = LstmWeights::init(24, 8, &mut rng);
        assert!(w.is_consistent());
        assert!(w.bias[8..16].iter().all(|&b| b == 1.0));
        assert!(w.bias[..8].iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_trace_matches_inference() {
        let mut rng = StdRng::seed_from_u64(2);
        let w = LstmWeights::init(2, 3, &mut rng);
        let xs = sequence();
        let trace = w.forward(xs.iter().map(Vec::as_slice));
        let outs = w.run_sequence(xs.iter().map(Vec::as_slice));
        assert_eq!(trace.outputs, outs);
        assert_eq!(trace.steps.len(), 4);
    }

    #[test]
    fn test_bptt_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(5);
        let w = LstmWeights::init(2, 3, &mut rng);
        let xs = sequence();
        let coeffs: Vec<Vec<f64>> = (0..4)
            .map(|t| (0..3).map(|k| 0.3 * (t as f64) - 0.2 * (k as f64) + 0.5).collect())
            .collect();

        let trace = w.forward(xs.iter().map(Vec::as_slice));
        let mut grads = LstmWeights::zeros(2, 3);
        let d_inputs = w.backward(&trace, &coeffs, &mut grads, true);

        let eps = 1e-6;
        let check = |analytic: f64, plus: f64, minus: f64| {
            let numeric = (plus - minus) / (2.0 * eps);
            assert!((numeric - analytic).abs() < 1e-6, "numeric {numeric} vs analytic {analytic}");
        };

        for idx in [0, 5, 11, 17, 23] {
            let mut wp = w.clone();
            let mut wm = w.clone();
            wp.kernel[idx] += eps;
            wm.kernel[idx] -= eps;
            check(grads.kernel[idx], objective(&wp, &xs, &coeffs), objective(&wm, &xs, &coeffs));
        }
        for idx in [0, 7, 20, 35] {
            let mut wp = w.clone();
            let mut wm = w.clone();
            wp.recurrent[idx] += eps;
            wm.recurrent[idx] -= eps;
            check(grads.recurrent[idx], objective(&wp, &xs, &coeffs), objective(&wm, &xs, &coeffs));
        }
        for idx in 0..12 {
            let mut wp = w.clone();
            let mut wm = w.clone();
            wp.bias[idx] += eps;
            wm.bias[idx] -= eps;
            check(grads.bias[idx], objective(&wp, &xs, &coeffs), objective(&wm, &xs, &coeffs));
        }
        for t in 0..4 {
            for j in 0..2 {
                let mut xp = xs.clone();
                let mut xm = xs.clone();
                xp[t][j] += eps;
                xm[t][j] -= eps;
                check(d_inputs[t][j], objective(&w, &xp, &coeffs), objective(&w, &xm, &coeffs));
            }
        }
    }

    #[test]
    fn test_no_input_grads_when_not_requested() {
        let mut rng = StdRng::seed_from_u64(9);
        let w = LstmWeights::init(2, 2, &mut rng);
        let xs = sequence();
        let trace = w.forward(xs.iter().map(Vec::as_slice));
        let d = vec![vec![1.0, 1.0]; 4];
        let mut grads = LstmWeights::zeros(2, 2);
        assert!(w.backward(&trace, &d, &mut grads, false).is_empty());
        assert!(grads.bias.iter().any(|&g| g != 0.0));
    }
}
