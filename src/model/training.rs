//! Mini-batch training loop: Adam, gradient clipping, early stopping and
//! learning-rate decay on plateau.
//!
//! Per-sample gradients inside a batch are computed in parallel over fixed
//! size chunks and summed in chunk order, so results do not depend on the
//! number of worker threads.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::network::{ClassifierWeights, FailureClassifier};
use crate::evaluation::metrics::{binary_cross_entropy, ConfusionMatrix};
use crate::evaluation::roc_auc;
use crate::prep::{SplitIndices, WindowSet};

/// Samples per parallel gradient task.
const GRAD_CHUNK: usize = 8;

/// Validation loss must drop by more than this to count as improvement.
const MIN_DELTA: f64 = 1e-6;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub validation_fraction: f64,
    /// Epochs without validation improvement before stopping.
    pub early_stopping_patience: usize,
    /// Epochs without improvement before the learning rate is reduced.
    pub lr_patience: usize,
    pub lr_factor: f64,
    pub min_learning_rate: f64,
    /// Global gradient L2-norm cap; non-positive disables clipping.
    pub gradient_clip_norm: f64,
    pub seed: u64,
    /// Print one line per epoch.
    pub verbose: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 64,
            learning_rate: 1e-3,
            validation_fraction: 0.2,
            early_stopping_patience: 10,
            lr_patience: 5,
            lr_factor: 0.5,
            min_learning_rate: 1e-6,
            gradient_clip_norm: 5.0,
            seed: crate::config::defaults::SEED,
            verbose: true,
        }
    }
}

// ============================================================================
// Adam
// ============================================================================

/// Adam optimizer over the flattened tensors of [`ClassifierWeights`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdamOptimizer {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    /// Total steps taken.
    pub steps: u64,
    /// First moment estimates, flattened in tensor order.
    m: Vec<f64>,
    /// Second moment estimates, flattened in tensor order.
    v: Vec<f64>,
}

impl AdamOptimizer {
    pub fn new(num_params: usize, lr: f64) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-7,
            steps: 0,
            m: vec![0.0; num_params],
            v: vec![0.0; num_params],
        }
    }

    pub fn apply(&mut self, weights: &mut ClassifierWeights, grads: &ClassifierWeights) {
        self.steps += 1;
        let t = self.steps as f64;
        let bias1 = 1.0 - self.beta1.powf(t);
        let bias2 = 1.0 - self.beta2.powf(t);

        let mut offset = 0;
        for (w, g) in weights.tensors_mut().into_iter().zip(grads.tensors()) {
            let m = &mut self.m[offset..offset + w.len()];
            let v = &mut self.v[offset..offset + w.len()];
            for i in 0..w.len() {
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g[i];
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g[i] * g[i];
                let m_hat = m[i] / bias1;
                let v_hat = v[i] / bias2;
                w[i] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
            }
            offset += w.len();
        }
    }
}

// ============================================================================
// History
// ============================================================================

/// Loss and threshold-0.5 metrics of one split for one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitMetrics {
    pub loss: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    /// `None` when the split holds a single class.
    pub auc: Option<f64>,
}

impl SplitMetrics {
    pub fn compute(probabilities: &[f64], labels: &[u8]) -> Self {
        let cm = ConfusionMatrix::at_threshold(probabilities, labels, 0.5);
        Self {
            loss: binary_cross_entropy(probabilities, labels),
            accuracy: cm.accuracy(),
            precision: cm.precision(),
            recall: cm.recall(),
            auc: roc_auc(probabilities, labels),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based.
    pub epoch: usize,
    pub learning_rate: f64,
    pub train: SplitMetrics,
    pub validation: Option<SplitMetrics>,
}

impl EpochMetrics {
    /// Loss monitored for early stopping: validation if present, else train.
    pub fn monitored_loss(&self) -> f64 {
        self.validation.map_or(self.train.loss, |v| v.loss)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
    /// 1-based epoch whose weights were kept.
    pub best_epoch: usize,
    pub stopped_early: bool,
}

impl TrainingHistory {
    pub fn best(&self) -> Option<&EpochMetrics> {
        self.epochs.iter().find(|e| e.epoch == self.best_epoch)
    }
}

fn format_auc(auc: Option<f64>) -> String {
    auc.map_or_else(|| "n/a".to_string(), |a| format!("{a:.4}"))
}

fn print_epoch(total: usize, m: &EpochMetrics) {
    let t = &m.train;
    let mut line = format!(
        "Epoch {:>3}/{:<3} loss {:.4} acc {:.4} prec {:.4} rec {:.4} auc {}",
        m.epoch,
        total,
        t.loss,
        t.accuracy,
        t.precision,
        t.recall,
        format_auc(t.auc)
    );
    if let Some(v) = &m.validation {
        line.push_str(&format!(
            " | val_loss {:.4} val_acc {:.4} val_prec {:.4} val_rec {:.4} val_auc {}",
            v.loss,
            v.accuracy,
            v.precision,
            v.recall,
            format_auc(v.auc)
        ));
    }
    line.push_str(&format!(" | lr {:.2e}", m.learning_rate));
    println!("{line}");
}

// ============================================================================
// Training loop
// ============================================================================

/// Dropout RNG for one sample, independent of scheduling.
fn sample_rng(seed: u64, epoch: usize, index: usize) -> StdRng {
    let mixed = seed
        ^ (epoch as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (index as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    StdRng::seed_from_u64(mixed)
}

/// Train `model` on `split.train`, monitoring `split.validation`.
///
/// The weights of the best epoch (lowest monitored loss) are restored before
/// returning.
pub fn fit(
    model: &mut FailureClassifier,
    windows: &WindowSet,
    split: &SplitIndices,
    config: &TrainingConfig,
) -> TrainingHistory {
    let mut history = TrainingHistory::default();
    if split.train.is_empty() || config.epochs == 0 {
        tracing::warn!(train = split.train.len(), epochs = config.epochs, "Nothing to train");
        return history;
    }

    let batch_size = config.batch_size.max(1);
    let val_labels: Vec<u8> = split.validation.iter().map(|&i| windows.get(i).label).collect();
    let mut optimizer = AdamOptimizer::new(model.num_params(), config.learning_rate);
    let mut shuffle_rng = StdRng::seed_from_u64(config.seed);
    let mut order = split.train.clone();

    let mut best_loss = f64::INFINITY;
    let mut best_weights = model.weights().clone();
    let mut wait = 0_usize;
    let mut lr_wait = 0_usize;

    tracing::info!(
        train = split.train.len(),
        validation = split.validation.len(),
        params = model.num_params(),
        batch_size,
        epochs = config.epochs,
        "Training started"
    );

    for epoch in 1..=config.epochs {
        order.shuffle(&mut shuffle_rng);
        let mut train_probs = Vec::with_capacity(order.len());
        let mut train_labels = Vec::with_capacity(order.len());

        for batch in order.chunks(batch_size) {
            let partials: Vec<(ClassifierWeights, Vec<f64>)> = batch
                .par_chunks(GRAD_CHUNK)
                .map(|chunk| {
                    let mut grads = ClassifierWeights::zeros(model.config());
                    let probs = chunk
                        .iter()
                        .map(|&i| {
                            let mut rng = sample_rng(config.seed, epoch, i);
                            model.train_sample(&windows.get(i), &mut rng, &mut grads).0
                        })
                        .collect();
                    (grads, probs)
                })
                .collect();

            let mut total = ClassifierWeights::zeros(model.config());
            for (grads, probs) in &partials {
                total.add_assign(grads);
                train_probs.extend_from_slice(probs);
            }
            train_labels.extend(batch.iter().map(|&i| windows.get(i).label));

            total.scale(1.0 / batch.len() as f64);
            if config.gradient_clip_norm > 0.0 {
                let norm = total.l2_norm();
                if norm > config.gradient_clip_norm {
                    total.scale(config.gradient_clip_norm / norm);
                }
            }
            optimizer.apply(model.weights_mut(), &total);
        }

        let validation = (!split.validation.is_empty()).then(|| {
            let probs = model.predict_indices(windows, &split.validation);
            SplitMetrics::compute(&probs, &val_labels)
        });
        let metrics = EpochMetrics {
            epoch,
            learning_rate: optimizer.lr,
            train: SplitMetrics::compute(&train_probs, &train_labels),
            validation,
        };
        if config.verbose {
            print_epoch(config.epochs, &metrics);
        }
        tracing::debug!(epoch, loss = metrics.train.loss, monitored = metrics.monitored_loss(), "Epoch complete");

        let monitored = metrics.monitored_loss();
        history.epochs.push(metrics);

        if monitored < best_loss - MIN_DELTA {
            best_loss = monitored;
            best_weights = model.weights().clone();
            history.best_epoch = epoch;
            wait = 0;
            lr_wait = 0;
        } else {
            wait += 1;
            lr_wait += 1;
            if lr_wait >= config.lr_patience && optimizer.lr > config.min_learning_rate {
                let new_lr = (optimizer.lr * config.lr_factor).max(config.min_learning_rate);
                tracing::info!(epoch, from = optimizer.lr, to = new_lr, "Reducing learning rate");
                optimizer.lr = new_lr;
                lr_wait = 0;
            }
            if wait >= config.early_stopping_patience {
                tracing::info!(epoch, best_epoch = history.best_epoch, "Early stopping");
                history.stopped_early = true;
                break;
            }
        }
    }

    model.set_weights(best_weights);
    tracing::info!(
        epochs_run = history.epochs.len(),
        best_epoch = history.best_epoch,
        best_loss,
        "Training finished"
    );
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassifierConfig;
    use crate::prep::{label_training_units, stratified_split, StandardScaler};
    use crate::types::{CycleRecord, Unit, NUM_FEATURES};

    /// Units whose sensor 0 ramps up sharply near failure.
    fn toy_windows() -> WindowSet {
        let units: Vec<Unit> = (1..=6)
            .map(|id| {
                let len = 40 + id * 3;
                Unit {
                    id,
                    records: (1..=len)
                        .map(|cycle| {
                            let rul = f64::from(len - cycle);
                            let mut features = [0.0; NUM_FEATURES];
                            features[3] = (-rul / 10.0).exp() * 5.0;
                            features[4] = f64::from(cycle % 5) * 0.1;
                            CycleRecord { unit_id: id, cycle, features }
                        })
                        .collect(),
                }
            })
            .collect();
        let labeled = label_training_units(&units, 10);
        let scaler = StandardScaler::fit_units(&labeled);
        WindowSet::build(&labeled, &scaler, 5)
    }

    fn small_model(seed: u64) -> FailureClassifier {
        FailureClassifier::new(
            ClassifierConfig { lstm1_units: 6, lstm2_units: 4, dense_units: 4, dropout: 0.1, ..ClassifierConfig::default() },
            seed,
        )
    }

    fn quiet_config(epochs: usize) -> TrainingConfig {
        TrainingConfig { epochs, batch_size: 16, learning_rate: 5e-3, verbose: false, ..TrainingConfig::default() }
    }

    #[test]
    fn test_training_reduces_loss() {
        let windows = toy_windows();
        let split = stratified_split(&windows.labels(), 0.2, &mut StdRng::seed_from_u64(1));
        let mut model = small_model(1);
        let history = fit(&mut model, &windows, &split, &quiet_config(15));

        let first = history.epochs[0].train.loss;
        let lowest = history.epochs.iter().map(|e| e.train.loss).fold(f64::INFINITY, f64::min);
        assert!(lowest < first, "loss did not improve: {first} -> {lowest}");
        assert!(history.best_epoch >= 1);
    }

    #[test]
    fn test_training_is_deterministic() {
        let windows = toy_windows();
        let split = stratified_split(&windows.labels(), 0.2, &mut StdRng::seed_from_u64(2));
        let mut a = small_model(3);
        let mut b = small_model(3);
        let ha = fit(&mut a, &windows, &split, &quiet_config(2));
        let hb = fit(&mut b, &windows, &split, &quiet_config(2));
        assert_eq!(ha, hb);
        assert_eq!(a.weights(), b.weights());
    }

    #[test]
    fn test_early_stopping_restores_best() {
        let windows = toy_windows();
        let split = stratified_split(&windows.labels(), 0.2, &mut StdRng::seed_from_u64(4));
        let mut model = small_model(5);
        let config = TrainingConfig {
            learning_rate: 0.5,
            early_stopping_patience: 2,
            lr_patience: 1,
            ..quiet_config(30)
        };
        let history = fit(&mut model, &windows, &split, &config);
        if history.stopped_early {
            assert_eq!(history.epochs.len(), history.best_epoch + 2);
        }
        let restored = model.predict_indices(&windows, &split.validation);
        let labels: Vec<u8> = split.validation.iter().map(|&i| windows.get(i).label).collect();
        let loss = binary_cross_entropy(&restored, &labels);
        let best = history.best().and_then(|e| e.validation).map(|v| v.loss).unwrap_or(loss);
        assert!((loss - best).abs() < 1e-9);
    }

    #[test]
    fn test_adam_moves_against_gradient() {
        let config = ClassifierConfig { lstm1_units: 2, lstm2_units: 2, dense_units: 2, ..ClassifierConfig::default() };
        let mut weights = ClassifierWeights::zeros(&config);
        let mut grads = ClassifierWeights::zeros(&config);
        grads.head.bias[0] = 1.0;
        grads.head.kernel[0] = -2.0;
        let mut adam = AdamOptimizer::new(weights.num_params(), 1e-3);
        adam.apply(&mut weights, &grads);
        assert!((weights.head.bias[0] + 1e-3).abs() < 1e-6);
        assert!((weights.head.kernel[0] - 1e-3).abs() < 1e-6);
        assert_eq!(weights.lstm1.kernel[0], 0.0);
    }

    #[test]
    fn test_empty_split_returns_empty_history() {
        let windows = toy_windows();
        let mut model = small_model(0);
        let history = fit(&mut model, &windows, &SplitIndices::default(), &quiet_config(3));
        assert!(history.epochs.is_empty());
    }
}
