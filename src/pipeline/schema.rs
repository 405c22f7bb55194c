//! Column names and feature-schema versions for policy records

use serde::{Deserialize, Serialize};

/// Identifier column, carried through but never used as a feature
pub const ID_COLUMN: &str = "User_ID";

/// Label column: the purchased coverage bundle (0-9)
pub const TARGET_COLUMN: &str = "Purchased_Coverage_Bundle";

/// Raw month column, a three-letter abbreviation
pub const MONTH_COLUMN: &str = "Policy_Start_Month";

pub const MONTH_SIN: &str = "month_sin";
pub const MONTH_COS: &str = "month_cos";

/// Placeholder category for missing and back-filled categorical values
pub const UNKNOWN: &str = "Unknown";

/// Columns dropped by the current cleaner as unreliable
pub const DROPPED_COLUMNS: [&str; 3] = ["Employer_ID", "Broker_ID", "Region_Code"];

/// Columns handled natively as categorical by the current schema
pub const CATEGORICAL_COLUMNS: [&str; 5] = [
    "Broker_Agency_Type",
    "Deductible_Tier",
    "Acquisition_Channel",
    "Payment_Schedule",
    "Employment_Status",
];

/// Columns derived by the feature engineer
pub const ENGINEERED_COLUMNS: [&str; 6] = [
    "Family_Size",
    "Risk_Index",
    "Policy_Engagement",
    "Time_To_Convert",
    "Income_Per_Dependent",
    "Loyalty_Score",
];

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Map a month abbreviation to 1..=12. Unmapped or missing values fall back to 1.
pub fn month_index(value: Option<&str>) -> u32 {
    value
        .map(|s| s.trim().to_ascii_lowercase())
        .and_then(|s| MONTHS.iter().position(|m| *m == s))
        .map(|idx| idx as u32 + 1)
        .unwrap_or(1)
}

/// Abbreviation for a 1-based month index (used when building records).
pub fn month_abbreviation(month: u32) -> &'static str {
    const ABBR: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    ABBR[((month.clamp(1, 12)) - 1) as usize]
}

/// Feature schema a model was trained against.
///
/// Each version fixes the cleaning rules and whether behavioral features are
/// derived, so an artifact always knows how its input must be prepared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// Raw columns, month kept as a category, region and broker kept.
    Base,
    /// Unreliable columns dropped, month encoded on the unit circle.
    Cyclical,
    /// Cyclical cleaning plus the six behavioral features.
    #[default]
    Behavioral,
}

impl SchemaVersion {
    /// Columns removed before training.
    pub fn dropped_columns(&self) -> &'static [&'static str] {
        match self {
            SchemaVersion::Base => &["Employer_ID"],
            SchemaVersion::Cyclical | SchemaVersion::Behavioral => &DROPPED_COLUMNS,
        }
    }

    /// Columns cast to categorical.
    pub fn categorical_columns(&self) -> Vec<&'static str> {
        let mut cols = CATEGORICAL_COLUMNS.to_vec();
        if *self == SchemaVersion::Base {
            cols.insert(0, "Region_Code");
            cols.push(MONTH_COLUMN);
        }
        cols
    }

    /// Whether the month is replaced by `month_sin`/`month_cos`.
    pub fn encodes_month(&self) -> bool {
        !matches!(self, SchemaVersion::Base)
    }

    /// Whether the behavioral features are derived.
    pub fn engineers_features(&self) -> bool {
        matches!(self, SchemaVersion::Behavioral)
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaVersion::Base => write!(f, "base"),
            SchemaVersion::Cyclical => write!(f, "cyclical"),
            SchemaVersion::Behavioral => write!(f, "behavioral"),
        }
    }
}

impl std::str::FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base" => Ok(SchemaVersion::Base),
            "cyclical" => Ok(SchemaVersion::Cyclical),
            "behavioral" => Ok(SchemaVersion::Behavioral),
            _ => Err(format!(
                "Unknown schema version: '{}'. Use 'base', 'cyclical' or 'behavioral'.",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_index_case_insensitive() {
        assert_eq!(month_index(Some("Jan")), 1);
        assert_eq!(month_index(Some("dec")), 12);
        assert_eq!(month_index(Some(" SEP ")), 9);
    }

    #[test]
    fn test_month_index_fallback() {
        assert_eq!(month_index(None), 1);
        assert_eq!(month_index(Some("Smarch")), 1);
    }

    #[test]
    fn test_month_abbreviation_round_trip() {
        for m in 1..=12 {
            assert_eq!(month_index(Some(month_abbreviation(m))), m);
        }
    }

    #[test]
    fn test_schema_version_from_str() {
        assert_eq!("Behavioral".parse::<SchemaVersion>().unwrap(), SchemaVersion::Behavioral);
        assert_eq!("base".parse::<SchemaVersion>().unwrap(), SchemaVersion::Base);
        assert!("v2".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn test_base_schema_keeps_month_categorical() {
        let cols = SchemaVersion::Base.categorical_columns();
        assert!(cols.contains(&MONTH_COLUMN));
        assert!(cols.contains(&"Region_Code"));
        assert!(!SchemaVersion::Base.encodes_month());
        assert_eq!(SchemaVersion::Cyclical.categorical_columns().len(), 5);
    }
}
