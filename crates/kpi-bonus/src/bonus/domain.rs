use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const ENTITY: &'static str = $label;
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Store-assigned identifier of a KPI definition.
    KpiId,
    "KPI"
);
entity_id!(ThresholdId, "threshold");
entity_id!(LocationId, "location");
entity_id!(DepartmentId, "department");
entity_id!(ManagerId, "manager");

/// Calendar month a measurement belongs to, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid YYYY-MM month")]
pub struct MonthParseError {
    pub value: String,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, MonthParseError> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() || !(0..=9999).contains(&year) {
            return Err(MonthParseError {
                value: format!("{year}-{month}"),
            });
        }
        Ok(Self { year, month })
    }

    pub fn current() -> Self {
        let today = Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl FromStr for Month {
    type Err = MonthParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let invalid = || MonthParseError {
            value: raw.to_string(),
        };

        let well_formed = trimmed.len() == 7
            && trimmed.bytes().enumerate().all(|(idx, byte)| match idx {
                4 => byte == b'-',
                _ => byte.is_ascii_digit(),
            });
        if !well_formed {
            return Err(invalid());
        }

        let year = trimmed[..4].parse::<i32>().map_err(|_| invalid())?;
        let month = trimmed[5..].parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Informational tag describing how a KPI is read; the evaluator ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    HigherIsBetter,
    LowerIsBetter,
    TargetValue,
}

impl CalculationType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::HigherIsBetter => "Higher is better",
            Self::LowerIsBetter => "Lower is better",
            Self::TargetValue => "Target value",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiDefinition {
    pub id: KpiId,
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub calculation: Option<CalculationType>,
    pub display_order: u32,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewKpiDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub calculation: Option<CalculationType>,
    /// Appended after the current last KPI when omitted.
    #[serde(default)]
    pub display_order: Option<u32>,
}

/// Partial update of a KPI definition; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiDefinitionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub calculation: Option<CalculationType>,
    #[serde(default)]
    pub display_order: Option<u32>,
}

impl KpiDefinitionPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.unit.is_none()
            && self.calculation.is_none()
            && self.display_order.is_none()
    }

    pub(crate) fn apply(self, kpi: &mut KpiDefinition) {
        if let Some(name) = self.name {
            kpi.name = name;
        }
        if let Some(description) = self.description {
            kpi.description = Some(description);
        }
        if let Some(unit) = self.unit {
            kpi.unit = Some(unit);
        }
        if let Some(calculation) = self.calculation {
            kpi.calculation = Some(calculation);
        }
        if let Some(order) = self.display_order {
            kpi.display_order = order;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub description: Option<String>,
    pub head: Option<String>,
    /// Department reports its own KPI values instead of averaging its locations.
    pub has_own_kpi: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDepartment {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub head: Option<String>,
    #[serde(default)]
    pub has_own_kpi: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub department_id: DepartmentId,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLocation {
    pub name: String,
    pub department_id: DepartmentId,
    #[serde(default)]
    pub description: Option<String>,
}

/// Manager responsible for every active location of one department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalManager {
    pub id: ManagerId,
    pub department_id: DepartmentId,
    pub name: String,
    pub email: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewManager {
    pub name: String,
    pub department_id: DepartmentId,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasurementSource {
    Manual,
    Import,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasurementStatus {
    Active,
    Deleted,
}

/// Raw value for one location, KPI and month as submitted by entry or import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEntry {
    pub month: Month,
    pub location_id: LocationId,
    pub kpi_id: KpiId,
    pub value: f64,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentEntry {
    pub month: Month,
    pub department_id: DepartmentId,
    pub kpi_id: KpiId,
    pub value: f64,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMeasurement {
    pub month: Month,
    pub location_id: LocationId,
    pub kpi_id: KpiId,
    pub value: f64,
    pub note: Option<String>,
    pub source: MeasurementSource,
    pub status: MeasurementStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentMeasurement {
    pub month: Month,
    pub department_id: DepartmentId,
    pub kpi_id: KpiId,
    pub value: f64,
    pub note: Option<String>,
    pub source: MeasurementSource,
    pub status: MeasurementStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived result of evaluating one location measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEvaluation {
    pub month: Month,
    pub location_id: LocationId,
    pub kpi_id: KpiId,
    pub value: f64,
    pub met: bool,
    pub bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentSummary {
    pub month: Month,
    pub department_id: DepartmentId,
    pub aggregate_bonus: f64,
    pub active_kpis: u32,
    pub met_kpis: u32,
}
