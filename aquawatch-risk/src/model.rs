//! Logistic outbreak classifier trained by batch gradient descent.
//!
//! Inputs are standardised per column before the linear layer, so the
//! learned weights are directly comparable and double as the per-feature
//! contribution breakdown.

use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};
use crate::features::{FeatureVector, FEATURE_COLUMNS};

const N_FEATURES: usize = FEATURE_COLUMNS.len();

/// One training row: observation plus whether an outbreak followed.
#[derive(Debug, Clone)]
pub struct LabeledSample {
    pub features: FeatureVector,
    pub outbreak: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct TrainingParams {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            epochs: 400,
            l2: 1e-3,
        }
    }
}

/// Column means and standard deviations captured at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl Standardizer {
    pub fn fit(rows: &[[f64; N_FEATURES]]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut means = vec![0.0; N_FEATURES];
        for row in rows {
            for (m, x) in means.iter_mut().zip(row) {
                *m += x / n;
            }
        }
        let mut stds = vec![0.0; N_FEATURES];
        for row in rows {
            for ((s, x), m) in stds.iter_mut().zip(row).zip(&means) {
                *s += (x - m).powi(2) / n;
            }
        }
        // Constant columns keep unit scale so they standardise to zero.
        let stds = stds
            .into_iter()
            .map(|v| if v > 1e-12 { v.sqrt() } else { 1.0 })
            .collect();
        Self { means, stds }
    }

    pub fn transform(&self, row: &[f64; N_FEATURES]) -> [f64; N_FEATURES] {
        let mut out = [0.0; N_FEATURES];
        for i in 0..N_FEATURES {
            out[i] = (row[i] - self.means[i]) / self.stds[i];
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub scaler: Standardizer,
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticModel {
    pub fn train(samples: &[LabeledSample], params: TrainingParams) -> RiskResult<Self> {
        if samples.is_empty() {
            return Err(RiskError::EmptyTrainingSet);
        }

        let raw: Vec<[f64; N_FEATURES]> = samples.iter().map(|s| s.features.to_array()).collect();
        let scaler = Standardizer::fit(&raw);
        let xs: Vec<[f64; N_FEATURES]> = raw.iter().map(|r| scaler.transform(r)).collect();
        let ys: Vec<f64> = samples.iter().map(|s| if s.outbreak { 1.0 } else { 0.0 }).collect();

        let n = xs.len() as f64;
        let mut weights = [0.0; N_FEATURES];
        let mut bias = 0.0;

        for _ in 0..params.epochs {
            let mut grad_w = [0.0; N_FEATURES];
            let mut grad_b = 0.0;
            for (x, y) in xs.iter().zip(&ys) {
                let err = sigmoid(dot(&weights, x) + bias) - y;
                for (g, xi) in grad_w.iter_mut().zip(x) {
                    *g += err * xi;
                }
                grad_b += err;
            }
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= params.learning_rate * (g / n + params.l2 * *w);
            }
            bias -= params.learning_rate * grad_b / n;
        }

        Ok(Self {
            scaler,
            weights: weights.to_vec(),
            bias,
        })
    }

    pub fn predict_proba(&self, fv: &FeatureVector) -> f64 {
        let z = self.scaler.transform(&fv.to_array());
        sigmoid(dot(&self.weights, &z) + self.bias)
    }

    /// Per-feature logit contribution `w_i * z_i`, in column order.
    pub fn contributions(&self, fv: &FeatureVector) -> Vec<(&'static str, f64, f64)> {
        let z = self.scaler.transform(&fv.to_array());
        FEATURE_COLUMNS
            .iter()
            .zip(self.weights.iter())
            .zip(z.iter())
            .map(|((name, w), zi)| (*name, *w, w * zi))
            .collect()
    }

    pub fn evaluate(&self, samples: &[LabeledSample]) -> Evaluation {
        if samples.is_empty() {
            return Evaluation::default();
        }
        let mut correct = 0usize;
        let mut log_loss = 0.0;
        for s in samples {
            let p = self.predict_proba(&s.features).clamp(1e-12, 1.0 - 1e-12);
            if (p >= 0.5) == s.outbreak {
                correct += 1;
            }
            log_loss -= if s.outbreak { p.ln() } else { (1.0 - p).ln() };
        }
        let n = samples.len() as f64;
        Evaluation {
            samples: samples.len(),
            accuracy: correct as f64 / n,
            log_loss: log_loss / n,
            positive_rate: samples.iter().filter(|s| s.outbreak).count() as f64 / n,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub samples: usize,
    pub accuracy: f64,
    pub log_loss: f64,
    pub positive_rate: f64,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn dot(w: &[f64], x: &[f64]) -> f64 {
    w.iter().zip(x).map(|(a, b)| a * b).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::clean_sample;
    use crate::synthetic;

    #[test]
    fn empty_training_set_is_rejected() {
        assert!(matches!(
            LogisticModel::train(&[], TrainingParams::default()),
            Err(RiskError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn standardizer_centres_columns() {
        let mut a = clean_sample().to_array();
        let mut b = a;
        a[2] = 10.0;
        b[2] = 30.0;
        let scaler = Standardizer::fit(&[a, b]);
        assert_eq!(scaler.means[2], 20.0);
        assert_eq!(scaler.stds[2], 10.0);
        assert_eq!(scaler.transform(&b)[2], 1.0);
        // water_ph is identical in both rows
        assert_eq!(scaler.stds[0], 1.0);
        assert_eq!(scaler.transform(&a)[0], 0.0);
    }

    #[test]
    fn learns_synthetic_outbreaks() {
        let data = synthetic::generate(2_000, 7);
        let (train, holdout) = data.split_at(1_600);
        let model = LogisticModel::train(train, TrainingParams::default()).unwrap();
        let eval = model.evaluate(holdout);

        assert!(eval.accuracy > 0.7, "accuracy {}", eval.accuracy);
        assert!(eval.accuracy >= 1.0 - eval.positive_rate - 0.02);

        let dirty = FeatureVector {
            ecoli_per_100ml: 90.0,
            turbidity_ntu: 12.0,
            rainfall_mm_7d: 120.0,
            previous_outbreak: true,
            is_monsoon: true,
            sanitation_score: 0.5,
            ..clean_sample()
        };
        assert!(model.predict_proba(&dirty) > model.predict_proba(&clean_sample()));
    }

    #[test]
    fn contributions_follow_columns() {
        let data = synthetic::generate(300, 1);
        let model = LogisticModel::train(&data, TrainingParams { epochs: 50, ..Default::default() }).unwrap();
        let parts = model.contributions(&clean_sample());
        assert_eq!(parts.len(), FEATURE_COLUMNS.len());
        assert_eq!(parts[2].0, "ecoli_per_100ml");
    }
}
