//! Monthly KPI evaluation and bonus aggregation.
//!
//! Raw values are stored per (month, location, KPI) and per (month, department, KPI).
//! The evaluation pass turns location values into bonus rows using each KPI's ordered
//! threshold rules; the summary pass rolls those rows up per department. Manager cards
//! and the comparison chart are computed at read time from the evaluation rows.

mod admin;
pub mod domain;
pub mod evaluation;
pub mod import;
pub mod memory;
pub mod passes;
pub mod repository;
pub mod rollup;
pub mod router;
pub mod seed;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    CalculationType, Department, DepartmentEntry, DepartmentId, DepartmentMeasurement,
    DepartmentSummary, KpiDefinition, KpiDefinitionPatch, KpiId, Location, LocationEntry,
    LocationEvaluation, LocationId, LocationMeasurement, ManagerId, MeasurementSource,
    MeasurementStatus, Month, MonthParseError, NewDepartment, NewKpiDefinition, NewLocation,
    NewManager, OperationalManager, ThresholdId,
};
pub use evaluation::{
    BonusEvaluator, OperatorParseError, RuleSet, ThresholdDraft, ThresholdOperator,
    ThresholdRule,
};
pub use import::{import_template, ImportError, ImportReport, ImportRowError};
pub use memory::InMemoryBonusStore;
pub use passes::{EvaluationRun, SummaryEntry, SummaryRun, SummarySource};
pub use repository::{
    BonusRepository, DirectoryStore, EvaluationStore, MeasurementStore, RepositoryError,
    ThresholdStore,
};
pub use rollup::{
    department_average_bonus, row_mean_bonus, success_rate, BonusTier, DepartmentKpiValue,
    EvaluationTally, KpiValueSource, LocationBreakdown, ManagerComparison, ManagerRollup,
};
pub use router::bonus_router;
pub use service::{BonusService, BonusServiceError, RecalculationRun, Withdrawal};
