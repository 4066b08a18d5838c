use serde::{Deserialize, Serialize};

use crate::error::{RiskError, RiskResult};

/// Column order the model is trained on. Artifacts record it and are
/// rejected when it differs.
pub const FEATURE_COLUMNS: [&str; 12] = [
    "water_ph",
    "turbidity_ntu",
    "ecoli_per_100ml",
    "total_coliform",
    "temperature_celsius",
    "rainfall_mm_7d",
    "population_density",
    "sanitation_score",
    "distance_to_healthcare_km",
    "previous_outbreak",
    "is_monsoon",
    "month",
];

pub const SANITATION_MAX: f64 = 5.0;

/// One village observation: water chemistry, environment, and context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub water_ph: f64,
    pub turbidity_ntu: f64,
    pub ecoli_per_100ml: f64,
    #[serde(default)]
    pub total_coliform: f64,
    pub temperature_celsius: f64,
    #[serde(default)]
    pub rainfall_mm_7d: f64,
    /// People per km².
    pub population_density: f64,
    /// 0 (none) to 5 (full coverage).
    pub sanitation_score: f64,
    #[serde(default)]
    pub distance_to_healthcare_km: f64,
    #[serde(default)]
    pub previous_outbreak: bool,
    #[serde(default)]
    pub is_monsoon: bool,
    pub month: u32,
}

impl FeatureVector {
    pub fn validate(&self) -> RiskResult<()> {
        let non_negative = [
            ("turbidity_ntu", self.turbidity_ntu),
            ("ecoli_per_100ml", self.ecoli_per_100ml),
            ("total_coliform", self.total_coliform),
            ("rainfall_mm_7d", self.rainfall_mm_7d),
            ("population_density", self.population_density),
            ("distance_to_healthcare_km", self.distance_to_healthcare_km),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(name, format!("must be a non-negative number, got {value}")));
            }
        }
        if !self.water_ph.is_finite() || !(0.0..=14.0).contains(&self.water_ph) {
            return Err(invalid("water_ph", format!("must be within 0-14, got {}", self.water_ph)));
        }
        if !self.temperature_celsius.is_finite() {
            return Err(invalid("temperature_celsius", "must be a finite number".into()));
        }
        if !(0.0..=SANITATION_MAX).contains(&self.sanitation_score) {
            return Err(invalid(
                "sanitation_score",
                format!("must be within 0-{SANITATION_MAX}, got {}", self.sanitation_score),
            ));
        }
        if !(1..=12).contains(&self.month) {
            return Err(invalid("month", format!("must be within 1-12, got {}", self.month)));
        }
        Ok(())
    }

    /// Values in [`FEATURE_COLUMNS`] order.
    pub fn to_array(&self) -> [f64; FEATURE_COLUMNS.len()] {
        [
            self.water_ph,
            self.turbidity_ntu,
            self.ecoli_per_100ml,
            self.total_coliform,
            self.temperature_celsius,
            self.rainfall_mm_7d,
            self.population_density,
            self.sanitation_score,
            self.distance_to_healthcare_km,
            flag(self.previous_outbreak),
            flag(self.is_monsoon),
            f64::from(self.month),
        ]
    }
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn invalid(name: &'static str, reason: String) -> RiskError {
    RiskError::InvalidFeature { name, reason }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn clean_sample() -> FeatureVector {
        FeatureVector {
            water_ph: 7.2,
            turbidity_ntu: 0.5,
            ecoli_per_100ml: 2.0,
            total_coliform: 5.0,
            temperature_celsius: 22.0,
            rainfall_mm_7d: 5.0,
            population_density: 100.0,
            sanitation_score: 5.0,
            distance_to_healthcare_km: 2.0,
            previous_outbreak: false,
            is_monsoon: false,
            month: 1,
        }
    }

    #[test]
    fn array_follows_column_order() {
        let mut fv = clean_sample();
        fv.previous_outbreak = true;
        fv.month = 7;
        let arr = fv.to_array();
        assert_eq!(arr[0], 7.2);
        assert_eq!(arr[2], 2.0);
        assert_eq!(arr[9], 1.0);
        assert_eq!(arr[10], 0.0);
        assert_eq!(arr[11], 7.0);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut fv = clean_sample();
        fv.month = 13;
        assert!(matches!(fv.validate(), Err(RiskError::InvalidFeature { name: "month", .. })));

        let mut fv = clean_sample();
        fv.sanitation_score = 7.5;
        assert!(fv.validate().is_err());

        let mut fv = clean_sample();
        fv.ecoli_per_100ml = f64::NAN;
        assert!(fv.validate().is_err());

        assert!(clean_sample().validate().is_ok());
    }
}
