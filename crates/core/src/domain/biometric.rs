use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::pipeline::reshape::WideRecord;

/// One row of the `stats` table. Columns other than the date are nullable in
/// the source database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyBiometricSample {
    pub date: NaiveDate,
    pub resting_heart_rate: Option<f64>,
    pub rest_stress_duration: Option<f64>,
    pub low_stress_duration: Option<f64>,
    pub medium_stress_duration: Option<f64>,
    pub high_stress_duration: Option<f64>,
    pub active_kilocalories: Option<f64>,
    pub bmr_kilocalories: Option<f64>,
}

impl WideRecord for DailyBiometricSample {
    type Key = NaiveDate;
    type Value = Option<f64>;

    fn key(&self) -> NaiveDate {
        self.date
    }

    fn value(&self, column: &str) -> Option<Option<f64>> {
        let v = match column {
            "resting_heart_rate" => self.resting_heart_rate,
            "rest_stress_duration" => self.rest_stress_duration,
            "low_stress_duration" => self.low_stress_duration,
            "medium_stress_duration" => self.medium_stress_duration,
            "high_stress_duration" => self.high_stress_duration,
            "active_kilocalories" => self.active_kilocalories,
            "bmr_kilocalories" => self.bmr_kilocalories,
            _ => return None,
        };
        Some(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StressLevel {
    Rest,
    Low,
    Medium,
    High,
}

impl StressLevel {
    pub const ALL: [StressLevel; 4] = [Self::Rest, Self::Low, Self::Medium, Self::High];

    pub fn column(self) -> &'static str {
        match self {
            Self::Rest => "rest_stress_duration",
            Self::Low => "low_stress_duration",
            Self::Medium => "medium_stress_duration",
            Self::High => "high_stress_duration",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn duration(self, sample: &DailyBiometricSample) -> Option<f64> {
        match self {
            Self::Rest => sample.rest_stress_duration,
            Self::Low => sample.low_stress_duration,
            Self::Medium => sample.medium_stress_duration,
            Self::High => sample.high_stress_duration,
        }
    }
}
