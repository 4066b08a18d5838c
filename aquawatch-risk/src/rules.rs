use serde::{Deserialize, Serialize};

use crate::features::{FeatureVector, SANITATION_MAX};

// -- Drinking-water hard limits --
pub const ECOLI_LIMIT: f64 = 100.0;
pub const TURBIDITY_LIMIT_NTU: f64 = 5.0;
pub const PH_SAFE_RANGE: (f64, f64) = (6.5, 8.5);

// -- E. coli grading below the hard limit --
const ECOLI_MODERATE: f64 = 50.0;
const ECOLI_LOW: f64 = 10.0;
const TURBIDITY_ADVISORY_NTU: f64 = 1.0;

// -- Outbreak score weights (sum to 1.0) --
pub const W_WATER_QUALITY: f64 = 0.30;
pub const W_POPULATION: f64 = 0.20;
pub const W_HISTORICAL: f64 = 0.20;
pub const W_SEASONAL: f64 = 0.15;
pub const W_HEALTHCARE: f64 = 0.15;

// -- Normalisation spans --
const DENSITY_SPAN: f64 = 2000.0;
const COLIFORM_SPAN: f64 = 500.0;
const TURBIDITY_SPAN: f64 = 10.0;
const RAINFALL_SPAN_MM: f64 = 100.0;
const HEALTHCARE_DISTANCE_SPAN_KM: f64 = 50.0;

/// Ordered from cleanest to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContaminationLevel {
    Safe,
    LowRisk,
    ModerateRisk,
    HighRisk,
    Unsafe,
}

impl ContaminationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::LowRisk => "LOW_RISK",
            Self::ModerateRisk => "MODERATE_RISK",
            Self::HighRisk => "HIGH_RISK",
            Self::Unsafe => "UNSAFE",
        }
    }

    pub fn is_safe_to_drink(&self) -> bool {
        *self == Self::Safe
    }
}

impl std::fmt::Display for ContaminationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity bucket of an outbreak probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Cut-points are exclusive: exactly 0.8 is `High`, exactly 0.4 is `Low`.
    pub fn from_probability(p: f64) -> Self {
        if p > 0.8 {
            Self::Critical
        } else if p > 0.6 {
            Self::High
        } else if p > 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count of hard-limit breaches: E. coli, turbidity, pH.
pub fn hard_limit_violations(fv: &FeatureVector) -> usize {
    let (ph_min, ph_max) = PH_SAFE_RANGE;
    [
        fv.ecoli_per_100ml > ECOLI_LIMIT,
        fv.turbidity_ntu > TURBIDITY_LIMIT_NTU,
        fv.water_ph < ph_min || fv.water_ph > ph_max,
    ]
    .into_iter()
    .filter(|v| *v)
    .count()
}

pub fn contamination_level(fv: &FeatureVector) -> ContaminationLevel {
    match hard_limit_violations(fv) {
        0 => {}
        1 => return ContaminationLevel::HighRisk,
        _ => return ContaminationLevel::Unsafe,
    }

    if fv.ecoli_per_100ml > ECOLI_MODERATE {
        ContaminationLevel::ModerateRisk
    } else if fv.ecoli_per_100ml > ECOLI_LOW || fv.turbidity_ntu > TURBIDITY_ADVISORY_NTU {
        ContaminationLevel::LowRisk
    } else {
        ContaminationLevel::Safe
    }
}

/// Quick screen used by field dashboards: any one marker is enough.
pub fn is_high_risk(fv: &FeatureVector) -> bool {
    fv.ecoli_per_100ml > ECOLI_LIMIT || fv.turbidity_ntu > TURBIDITY_LIMIT_NTU || fv.sanitation_score < 2.0
}

/// Normalised sub-scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub water_quality: f64,
    pub population_density: f64,
    pub historical_incidence: f64,
    pub seasonal: f64,
    pub healthcare_access: f64,
}

impl RiskFactors {
    pub fn from_features(fv: &FeatureVector) -> Self {
        Self {
            water_quality: water_quality_score(fv),
            population_density: unit(fv.population_density / DENSITY_SPAN),
            historical_incidence: if fv.previous_outbreak { 1.0 } else { 0.0 },
            seasonal: seasonal_score(fv),
            healthcare_access: healthcare_score(fv),
        }
    }

    /// `(name, sub-score, weight)` in a fixed order.
    pub fn weighted(&self) -> [(&'static str, f64, f64); 5] {
        [
            ("water_quality", self.water_quality, W_WATER_QUALITY),
            ("population_density", self.population_density, W_POPULATION),
            ("historical_incidence", self.historical_incidence, W_HISTORICAL),
            ("seasonal", self.seasonal, W_SEASONAL),
            ("healthcare_access", self.healthcare_access, W_HEALTHCARE),
        ]
    }

    pub fn outbreak_score(&self) -> f64 {
        unit(self.weighted().iter().map(|(_, score, w)| score * w).sum())
    }
}

fn water_quality_score(fv: &FeatureVector) -> f64 {
    let (ph_min, ph_max) = PH_SAFE_RANGE;
    let ph_excursion = if fv.water_ph < ph_min {
        ph_min - fv.water_ph
    } else if fv.water_ph > ph_max {
        fv.water_ph - ph_max
    } else {
        0.0
    };

    0.45 * unit(fv.ecoli_per_100ml / ECOLI_LIMIT)
        + 0.25 * unit(fv.turbidity_ntu / TURBIDITY_SPAN)
        + 0.15 * unit(ph_excursion / 1.5)
        + 0.15 * unit(fv.total_coliform / COLIFORM_SPAN)
}

fn seasonal_score(fv: &FeatureVector) -> f64 {
    if fv.is_monsoon {
        return 1.0;
    }
    0.6 * unit(fv.rainfall_mm_7d / RAINFALL_SPAN_MM) + 0.4 * unit((fv.temperature_celsius - 20.0) / 15.0)
}

fn healthcare_score(fv: &FeatureVector) -> f64 {
    0.5 * unit(fv.distance_to_healthcare_km / HEALTHCARE_DISTANCE_SPAN_KM)
        + 0.5 * unit(1.0 - fv.sanitation_score / SANITATION_MAX)
}

fn unit(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}
