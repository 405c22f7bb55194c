//! Customer questionnaire to policy record translation

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::model::ModelArtifact;
use crate::pipeline::predictor::{predict, preprocess};
use crate::pipeline::record::{records_to_frame, PolicyRecord};
use crate::pipeline::schema::month_abbreviation;

/// Placeholder identifier of a served request
pub const REQUEST_USER_ID: &str = "U0001";

/// Years of clean history assumed for a customer without claims
const CLAIM_FREE_HORIZON: f64 = 5.0;

/// Questionnaire answers posted to `/predict`. Absent fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssessmentInput {
    pub age: u32,
    pub occupation: String,
    pub income: f64,
    pub marital_status: String,
    pub dependents: u32,
    pub has_children: bool,
    pub home_owner: bool,
    pub vehicles: u32,
    pub property_value: f64,
    pub current_insurance: String,
    pub claims_history: u32,
    pub risk_tolerance: String,
}

impl Default for AssessmentInput {
    fn default() -> Self {
        Self {
            age: 35,
            occupation: "employee".to_string(),
            income: 75_000.0,
            marital_status: String::new(),
            dependents: 0,
            has_children: false,
            home_owner: false,
            vehicles: 1,
            property_value: 0.0,
            current_insurance: "none".to_string(),
            claims_history: 0,
            risk_tolerance: "medium".to_string(),
        }
    }
}

impl AssessmentInput {
    pub fn is_existing_policyholder(&self) -> bool {
        !matches!(self.current_insurance.as_str(), "" | "none")
    }

    /// Derive a raw policy record dated `today`.
    pub fn to_record(&self, today: NaiveDate) -> PolicyRecord {
        let existing = self.is_existing_policyholder();
        let child = if self.has_children { 1 } else { 0 };
        let adult = self.dependents.saturating_sub(child);
        let claims = self.claims_history as f64;

        PolicyRecord {
            user_id: Some(REQUEST_USER_ID.to_string()),
            policy_start_month: Some(month_abbreviation(today.month()).to_string()),
            broker_agency_type: Some("Direct".to_string()),
            deductible_tier: Some(deductible_tier(&self.risk_tolerance).to_string()),
            acquisition_channel: Some("Online".to_string()),
            payment_schedule: Some("Monthly".to_string()),
            employment_status: Some(employment_status(&self.occupation).to_string()),
            policy_cancelled_post_purchase: Some(0.0),
            policy_start_year: Some(today.year() as f64),
            policy_start_week: Some(today.iso_week().week() as f64),
            policy_start_day: Some(today.day() as f64),
            grace_period_extensions: Some(0.0),
            previous_policy_duration_months: Some(if existing { 12.0 } else { 0.0 }),
            adult_dependents: Some(adult as f64),
            child_dependents: Some(child as f64),
            infant_dependents: Some(0.0),
            existing_policyholder: Some(if existing { 1.0 } else { 0.0 }),
            previous_claims_filed: Some(claims),
            years_without_claims: Some((CLAIM_FREE_HORIZON - claims).max(0.0)),
            policy_amendments_count: Some(0.0),
            underwriting_processing_days: Some(5.0),
            vehicles_on_policy: Some(self.vehicles as f64),
            custom_riders_requested: Some(0.0),
            estimated_annual_income: Some(self.income),
            days_since_quote: Some(0.0),
            ..Default::default()
        }
    }
}

/// Low risk tolerance buys a high deductible tier and vice versa.
pub fn deductible_tier(risk_tolerance: &str) -> &'static str {
    match risk_tolerance {
        "low" => "High",
        "high" => "Low",
        _ => "Medium",
    }
}

pub fn employment_status(occupation: &str) -> &'static str {
    match occupation {
        "retired" => "Retired",
        "business" | "self-employed" => "Self-Employed",
        _ => "Employed",
    }
}

/// Recommend a coverage bundle for one questionnaire.
pub fn recommend(artifact: &ModelArtifact, input: &AssessmentInput, today: NaiveDate) -> Result<i64> {
    let frame = records_to_frame(&[input.to_record(today)])?;
    let prepared = preprocess(&frame, artifact)?;
    predict(artifact, &prepared)?
        .first()
        .map(|p| p.bundle)
        .ok_or_else(|| PipelineError::Inference {
            kind: "Empty".to_string(),
            message: "no prediction produced for request".to_string(),
        })
}
