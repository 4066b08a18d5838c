//! Seeded synthetic field observations for model development.
//!
//! Distributions loosely follow surveillance data from monsoon-affected
//! districts. The outbreak label is a points score over known drivers with
//! a small fraction of flipped labels.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::features::{FeatureVector, SANITATION_MAX};
use crate::model::LabeledSample;

const LABEL_NOISE: f64 = 0.05;
const OUTBREAK_POINTS: u32 = 4;

pub fn generate(n: usize, seed: u64) -> Vec<LabeledSample> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| sample(&mut rng)).collect()
}

fn sample(rng: &mut StdRng) -> LabeledSample {
    let month: u32 = rng.gen_range(1..=12);
    let is_monsoon = (6..=9).contains(&month);

    let ecoli = exponential(rng, 15.0);
    let monsoon_rain = if is_monsoon { exponential(rng, 60.0) } else { 0.0 };

    let features = FeatureVector {
        water_ph: normal(rng, 7.0, 0.8).clamp(0.0, 14.0),
        turbidity_ntu: exponential(rng, 2.5),
        ecoli_per_100ml: ecoli,
        total_coliform: ecoli * 3.0 + exponential(rng, 20.0),
        temperature_celsius: normal(rng, 27.0, 5.0),
        rainfall_mm_7d: exponential(rng, 30.0) + monsoon_rain,
        population_density: exponential(rng, 600.0),
        sanitation_score: rng.gen_range(0.0..SANITATION_MAX),
        distance_to_healthcare_km: exponential(rng, 8.0),
        previous_outbreak: rng.gen_bool(0.15),
        is_monsoon,
        month,
    };

    let mut outbreak = outbreak_points(&features) >= OUTBREAK_POINTS;
    if rng.gen_bool(LABEL_NOISE) {
        outbreak = !outbreak;
    }

    LabeledSample { features, outbreak }
}

fn outbreak_points(fv: &FeatureVector) -> u32 {
    let mut points = 0;
    if fv.ecoli_per_100ml > 20.0 {
        points += 3;
    }
    if fv.turbidity_ntu > 5.0 {
        points += 2;
    }
    if fv.rainfall_mm_7d > 50.0 {
        points += 2;
    }
    points += u32::from(fv.previous_outbreak);
    points += u32::from(fv.sanitation_score < 2.0);
    points += u32::from(fv.is_monsoon);
    points
}

fn exponential(rng: &mut StdRng, mean: f64) -> f64 {
    let u: f64 = rng.gen();
    -mean * (1.0 - u).ln()
}

// Box-Muller
fn normal(rng: &mut StdRng, mean: f64, std: f64) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    mean + std * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
