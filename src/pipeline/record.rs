//! Typed raw policy record
//!
//! Every raw column is an optional field, so an absent value is explicit in
//! the type instead of being discovered by probing a table for column names.
//! A batch of records converts into the table shape the cleaner expects:
//! a column is emitted only when at least one record carries it.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;

macro_rules! policy_record {
    (
        strings { $($s_field:ident => $s_col:literal),* $(,)? }
        numbers { $($n_field:ident => $n_col:literal),* $(,)? }
        integers { $($i_field:ident => $i_col:literal),* $(,)? }
    ) => {
        /// One customer/policy application as it arrives, before cleaning.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct PolicyRecord {
            $(
                #[serde(rename = $s_col, default, skip_serializing_if = "Option::is_none")]
                pub $s_field: Option<String>,
            )*
            $(
                #[serde(rename = $n_col, default, skip_serializing_if = "Option::is_none")]
                pub $n_field: Option<f64>,
            )*
            $(
                #[serde(rename = $i_col, default, skip_serializing_if = "Option::is_none")]
                pub $i_field: Option<i64>,
            )*
        }

        impl PolicyRecord {
            /// Text-valued raw columns.
            pub const STRING_COLUMNS: &'static [&'static str] = &[$($s_col),*];
            /// Numeric raw columns.
            pub const NUMERIC_COLUMNS: &'static [&'static str] = &[$($n_col),*];
        }

        /// Build a raw table from records, one row per record.
        pub fn records_to_frame(records: &[PolicyRecord]) -> Result<DataFrame> {
            let mut columns: Vec<Column> = Vec::new();
            $(
                if records.iter().any(|r| r.$s_field.is_some()) {
                    let values: Vec<Option<&str>> =
                        records.iter().map(|r| r.$s_field.as_deref()).collect();
                    columns.push(Column::new($s_col.into(), values));
                }
            )*
            $(
                if records.iter().any(|r| r.$n_field.is_some()) {
                    let values: Vec<Option<f64>> = records.iter().map(|r| r.$n_field).collect();
                    columns.push(Column::new($n_col.into(), values));
                }
            )*
            $(
                if records.iter().any(|r| r.$i_field.is_some()) {
                    let values: Vec<Option<i64>> = records.iter().map(|r| r.$i_field).collect();
                    columns.push(Column::new($i_col.into(), values));
                }
            )*
            Ok(DataFrame::new(columns)?)
        }
    };
}

policy_record! {
    strings {
        user_id => "User_ID",
        policy_start_month => "Policy_Start_Month",
        broker_agency_type => "Broker_Agency_Type",
        deductible_tier => "Deductible_Tier",
        acquisition_channel => "Acquisition_Channel",
        payment_schedule => "Payment_Schedule",
        employment_status => "Employment_Status",
        employer_id => "Employer_ID",
        region_code => "Region_Code",
    }
    numbers {
        policy_cancelled_post_purchase => "Policy_Cancelled_Post_Purchase",
        policy_start_year => "Policy_Start_Year",
        policy_start_week => "Policy_Start_Week",
        policy_start_day => "Policy_Start_Day",
        grace_period_extensions => "Grace_Period_Extensions",
        previous_policy_duration_months => "Previous_Policy_Duration_Months",
        adult_dependents => "Adult_Dependents",
        child_dependents => "Child_Dependents",
        infant_dependents => "Infant_Dependents",
        existing_policyholder => "Existing_Policyholder",
        previous_claims_filed => "Previous_Claims_Filed",
        years_without_claims => "Years_Without_Claims",
        policy_amendments_count => "Policy_Amendments_Count",
        underwriting_processing_days => "Underwriting_Processing_Days",
        vehicles_on_policy => "Vehicles_on_Policy",
        custom_riders_requested => "Custom_Riders_Requested",
        estimated_annual_income => "Estimated_Annual_Income",
        days_since_quote => "Days_Since_Quote",
        broker_id => "Broker_ID",
    }
    integers {
        purchased_coverage_bundle => "Purchased_Coverage_Bundle",
    }
}
