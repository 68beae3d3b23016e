use super::domain::{
    Department, DepartmentEntry, DepartmentId, DepartmentMeasurement, DepartmentSummary,
    KpiDefinition, KpiId, Location, LocationEntry, LocationEvaluation, LocationId,
    LocationMeasurement, ManagerId, MeasurementSource, Month, NewDepartment, NewKpiDefinition,
    NewLocation, NewManager, OperationalManager, ThresholdId,
};
use super::evaluation::{ThresholdDraft, ThresholdRule};

/// Threshold rules keyed by KPI.
pub trait ThresholdStore: Send + Sync {
    /// Rules of one KPI, ascending by evaluation order; equal orders come back by id.
    fn rules_for(&self, kpi_id: KpiId) -> Result<Vec<ThresholdRule>, RepositoryError>;
    fn threshold(&self, id: ThresholdId) -> Result<Option<ThresholdRule>, RepositoryError>;
    /// A draft without an order is placed after the KPI's highest order.
    fn insert_threshold(
        &self,
        kpi_id: KpiId,
        draft: ThresholdDraft,
    ) -> Result<ThresholdRule, RepositoryError>;
    fn update_threshold(&self, rule: ThresholdRule) -> Result<(), RepositoryError>;
    fn delete_threshold(&self, id: ThresholdId) -> Result<(), RepositoryError>;
}

/// Reference data: KPI definitions, departments, locations and managers.
///
/// Listings include inactive records; callers filter on the `active` flag.
pub trait DirectoryStore: Send + Sync {
    fn insert_kpi(&self, kpi: NewKpiDefinition) -> Result<KpiDefinition, RepositoryError>;
    fn update_kpi(&self, kpi: KpiDefinition) -> Result<(), RepositoryError>;
    fn kpi(&self, id: KpiId) -> Result<Option<KpiDefinition>, RepositoryError>;
    /// Sorted by display order, then name.
    fn kpis(&self) -> Result<Vec<KpiDefinition>, RepositoryError>;

    fn insert_department(&self, department: NewDepartment)
        -> Result<Department, RepositoryError>;
    fn update_department(&self, department: Department) -> Result<(), RepositoryError>;
    fn department(&self, id: DepartmentId) -> Result<Option<Department>, RepositoryError>;
    /// Sorted by name.
    fn departments(&self) -> Result<Vec<Department>, RepositoryError>;

    fn insert_location(&self, location: NewLocation) -> Result<Location, RepositoryError>;
    fn update_location(&self, location: Location) -> Result<(), RepositoryError>;
    fn location(&self, id: LocationId) -> Result<Option<Location>, RepositoryError>;
    /// Sorted by name.
    fn locations(&self) -> Result<Vec<Location>, RepositoryError>;

    fn insert_manager(&self, manager: NewManager) -> Result<OperationalManager, RepositoryError>;
    fn update_manager(&self, manager: OperationalManager) -> Result<(), RepositoryError>;
    fn manager(&self, id: ManagerId) -> Result<Option<OperationalManager>, RepositoryError>;
    /// Sorted by name.
    fn managers(&self) -> Result<Vec<OperationalManager>, RepositoryError>;
    fn manager_kpis(&self, id: ManagerId) -> Result<Vec<KpiId>, RepositoryError>;
    fn set_manager_kpis(&self, id: ManagerId, kpis: Vec<KpiId>) -> Result<(), RepositoryError>;
}

/// Raw monthly values. Reads return `ACTIVE` rows only.
pub trait MeasurementStore: Send + Sync {
    /// Inserts or replaces the row for (month, location, KPI) and marks it active.
    fn upsert_location_measurement(
        &self,
        entry: LocationEntry,
        source: MeasurementSource,
    ) -> Result<LocationMeasurement, RepositoryError>;
    fn location_measurements(
        &self,
        month: Month,
        location_id: Option<LocationId>,
    ) -> Result<Vec<LocationMeasurement>, RepositoryError>;
    /// Flags every row of the location/month as deleted; returns how many changed.
    fn soft_delete_location_month(
        &self,
        month: Month,
        location_id: LocationId,
    ) -> Result<usize, RepositoryError>;

    fn upsert_department_measurement(
        &self,
        entry: DepartmentEntry,
        source: MeasurementSource,
    ) -> Result<DepartmentMeasurement, RepositoryError>;
    fn department_measurements(
        &self,
        month: Month,
        department_id: Option<DepartmentId>,
    ) -> Result<Vec<DepartmentMeasurement>, RepositoryError>;
    fn soft_delete_department_month(
        &self,
        month: Month,
        department_id: DepartmentId,
    ) -> Result<usize, RepositoryError>;

    /// Distinct months with active location measurements, newest first.
    fn months_with_data(&self) -> Result<Vec<Month>, RepositoryError>;
}

/// Derived rows written by the evaluation and summary passes.
pub trait EvaluationStore: Send + Sync {
    fn upsert_evaluation(&self, evaluation: LocationEvaluation) -> Result<(), RepositoryError>;
    fn evaluations(
        &self,
        month: Month,
        location_id: Option<LocationId>,
    ) -> Result<Vec<LocationEvaluation>, RepositoryError>;
    fn delete_evaluations(
        &self,
        month: Month,
        location_id: LocationId,
    ) -> Result<usize, RepositoryError>;

    fn upsert_summary(&self, summary: DepartmentSummary) -> Result<(), RepositoryError>;
    fn summaries(
        &self,
        month: Option<Month>,
        department_id: Option<DepartmentId>,
    ) -> Result<Vec<DepartmentSummary>, RepositoryError>;
}

/// Everything the bonus service needs from persistence.
pub trait BonusRepository:
    ThresholdStore + DirectoryStore + MeasurementStore + EvaluationStore
{
}

impl<T> BonusRepository for T where
    T: ThresholdStore + DirectoryStore + MeasurementStore + EvaluationStore
{
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{entity} '{key}' already exists")]
    Conflict { entity: &'static str, key: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
