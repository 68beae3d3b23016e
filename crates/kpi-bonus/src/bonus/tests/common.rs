use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::bonus::domain::{
    Department, DepartmentEntry, DepartmentId, DepartmentMeasurement, DepartmentSummary,
    KpiDefinition, KpiId, Location, LocationEntry, LocationEvaluation, LocationId,
    LocationMeasurement, ManagerId, MeasurementSource, Month, NewDepartment, NewKpiDefinition,
    NewLocation, NewManager, OperationalManager, ThresholdId,
};
use crate::bonus::evaluation::{ThresholdDraft, ThresholdOperator, ThresholdRule};
use crate::bonus::memory::InMemoryBonusStore;
use crate::bonus::repository::{
    DirectoryStore, EvaluationStore, MeasurementStore, RepositoryError, ThresholdStore,
};
use crate::bonus::service::BonusService;

pub(super) fn month() -> Month {
    "2025-11".parse().expect("valid month")
}

pub(super) fn audit_rules() -> Vec<ThresholdDraft> {
    vec![
        ThresholdDraft::new(ThresholdOperator::AtLeast, 30.0)
            .lower(85.0)
            .order(1),
        ThresholdDraft::new(ThresholdOperator::Between, 15.0)
            .lower(75.0)
            .upper(84.99)
            .order(2),
        ThresholdDraft::new(ThresholdOperator::Below, 0.0)
            .upper(75.0)
            .order(3),
    ]
}

/// Two departments: Bouda averages its locations, Kitchen reports its own KPIs.
pub(super) struct Fixture {
    pub(super) service: BonusService<InMemoryBonusStore>,
    pub(super) store: Arc<InMemoryBonusStore>,
    pub(super) bouda: DepartmentId,
    pub(super) kitchen: DepartmentId,
    pub(super) mercury: LocationId,
    pub(super) dvory: LocationId,
    pub(super) matej: ManagerId,
    pub(super) chef: ManagerId,
    pub(super) audit: KpiId,
    pub(super) error_rate: KpiId,
}

impl Fixture {
    pub(super) fn new() -> Self {
        let store = Arc::new(InMemoryBonusStore::new());
        let service = BonusService::new(Arc::clone(&store));

        let bouda = service
            .add_department(NewDepartment {
                name: "Bouda".to_string(),
                ..NewDepartment::default()
            })
            .expect("bouda");
        let kitchen = service
            .add_department(NewDepartment {
                name: "Central kitchen".to_string(),
                has_own_kpi: true,
                ..NewDepartment::default()
            })
            .expect("kitchen");

        let mercury = service
            .add_location(NewLocation {
                name: "Mercury".to_string(),
                department_id: bouda.id,
                description: None,
            })
            .expect("mercury");
        let dvory = service
            .add_location(NewLocation {
                name: "OC4Dvory".to_string(),
                department_id: bouda.id,
                description: None,
            })
            .expect("dvory");

        let matej = service
            .add_manager(NewManager {
                name: "Matěj".to_string(),
                department_id: bouda.id,
                email: None,
            })
            .expect("matej");
        let chef = service
            .add_manager(NewManager {
                name: "Chef".to_string(),
                department_id: kitchen.id,
                email: None,
            })
            .expect("chef");

        let audit = service
            .add_kpi(NewKpiDefinition {
                name: "Audit".to_string(),
                unit: Some("%".to_string()),
                ..NewKpiDefinition::default()
            })
            .expect("audit");
        for draft in audit_rules() {
            service.add_threshold(audit.id, draft).expect("audit rule");
        }

        let error_rate = service
            .add_kpi(NewKpiDefinition {
                name: "Order error rate".to_string(),
                ..NewKpiDefinition::default()
            })
            .expect("error rate");
        service
            .add_threshold(
                error_rate.id,
                ThresholdDraft::new(ThresholdOperator::Below, 10.0).upper(0.5),
            )
            .expect("error rate rule");

        Self {
            service,
            store,
            bouda: bouda.id,
            kitchen: kitchen.id,
            mercury: mercury.id,
            dvory: dvory.id,
            matej: matej.id,
            chef: chef.id,
            audit: audit.id,
            error_rate: error_rate.id,
        }
    }

    pub(super) fn record(&self, location_id: LocationId, kpi_id: KpiId, value: f64) {
        self.service
            .record_location_measurement(
                LocationEntry {
                    month: month(),
                    location_id,
                    kpi_id,
                    value,
                    note: None,
                },
                MeasurementSource::Manual,
            )
            .expect("measurement recorded");
    }

    pub(super) fn record_department(&self, department_id: DepartmentId, kpi_id: KpiId, value: f64) {
        self.service
            .record_department_measurement(
                DepartmentEntry {
                    month: month(),
                    department_id,
                    kpi_id,
                    value,
                    note: None,
                },
                MeasurementSource::Manual,
            )
            .expect("department measurement recorded");
    }
}

/// In-memory store whose persistence calls fail once `fail_writes` is set.
#[derive(Default)]
pub(super) struct FlakyStore {
    pub(super) inner: InMemoryBonusStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub(super) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepositoryError::Unavailable("database offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ThresholdStore for FlakyStore {
    fn rules_for(&self, kpi_id: KpiId) -> Result<Vec<ThresholdRule>, RepositoryError> {
        self.inner.rules_for(kpi_id)
    }

    fn threshold(&self, id: ThresholdId) -> Result<Option<ThresholdRule>, RepositoryError> {
        self.inner.threshold(id)
    }

    fn insert_threshold(
        &self,
        kpi_id: KpiId,
        draft: ThresholdDraft,
    ) -> Result<ThresholdRule, RepositoryError> {
        self.check()?;
        self.inner.insert_threshold(kpi_id, draft)
    }

    fn update_threshold(&self, rule: ThresholdRule) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.update_threshold(rule)
    }

    fn delete_threshold(&self, id: ThresholdId) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.delete_threshold(id)
    }
}

impl DirectoryStore for FlakyStore {
    fn insert_kpi(&self, kpi: NewKpiDefinition) -> Result<KpiDefinition, RepositoryError> {
        self.check()?;
        self.inner.insert_kpi(kpi)
    }

    fn update_kpi(&self, kpi: KpiDefinition) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.update_kpi(kpi)
    }

    fn kpi(&self, id: KpiId) -> Result<Option<KpiDefinition>, RepositoryError> {
        self.inner.kpi(id)
    }

    fn kpis(&self) -> Result<Vec<KpiDefinition>, RepositoryError> {
        self.inner.kpis()
    }

    fn insert_department(
        &self,
        department: NewDepartment,
    ) -> Result<Department, RepositoryError> {
        self.check()?;
        self.inner.insert_department(department)
    }

    fn update_department(&self, department: Department) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.update_department(department)
    }

    fn department(&self, id: DepartmentId) -> Result<Option<Department>, RepositoryError> {
        self.inner.department(id)
    }

    fn departments(&self) -> Result<Vec<Department>, RepositoryError> {
        self.inner.departments()
    }

    fn insert_location(&self, location: NewLocation) -> Result<Location, RepositoryError> {
        self.check()?;
        self.inner.insert_location(location)
    }

    fn update_location(&self, location: Location) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.update_location(location)
    }

    fn location(&self, id: LocationId) -> Result<Option<Location>, RepositoryError> {
        self.inner.location(id)
    }

    fn locations(&self) -> Result<Vec<Location>, RepositoryError> {
        self.inner.locations()
    }

    fn insert_manager(&self, manager: NewManager) -> Result<OperationalManager, RepositoryError> {
        self.check()?;
        self.inner.insert_manager(manager)
    }

    fn update_manager(&self, manager: OperationalManager) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.update_manager(manager)
    }

    fn manager(&self, id: ManagerId) -> Result<Option<OperationalManager>, RepositoryError> {
        self.inner.manager(id)
    }

    fn managers(&self) -> Result<Vec<OperationalManager>, RepositoryError> {
        self.inner.managers()
    }

    fn manager_kpis(&self, id: ManagerId) -> Result<Vec<KpiId>, RepositoryError> {
        self.inner.manager_kpis(id)
    }

    fn set_manager_kpis(&self, id: ManagerId, kpis: Vec<KpiId>) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.set_manager_kpis(id, kpis)
    }
}

impl MeasurementStore for FlakyStore {
    fn upsert_location_measurement(
        &self,
        entry: LocationEntry,
        source: MeasurementSource,
    ) -> Result<LocationMeasurement, RepositoryError> {
        self.check()?;
        self.inner.upsert_location_measurement(entry, source)
    }

    fn location_measurements(
        &self,
        month: Month,
        location_id: Option<LocationId>,
    ) -> Result<Vec<LocationMeasurement>, RepositoryError> {
        self.inner.location_measurements(month, location_id)
    }

    fn soft_delete_location_month(
        &self,
        month: Month,
        location_id: LocationId,
    ) -> Result<usize, RepositoryError> {
        self.check()?;
        self.inner.soft_delete_location_month(month, location_id)
    }

    fn upsert_department_measurement(
        &self,
        entry: DepartmentEntry,
        source: MeasurementSource,
    ) -> Result<DepartmentMeasurement, RepositoryError> {
        self.check()?;
        self.inner.upsert_department_measurement(entry, source)
    }

    fn department_measurements(
        &self,
        month: Month,
        department_id: Option<DepartmentId>,
    ) -> Result<Vec<DepartmentMeasurement>, RepositoryError> {
        self.inner.department_measurements(month, department_id)
    }

    fn soft_delete_department_month(
        &self,
        month: Month,
        department_id: DepartmentId,
    ) -> Result<usize, RepositoryError> {
        self.check()?;
        self.inner.soft_delete_department_month(month, department_id)
    }

    fn months_with_data(&self) -> Result<Vec<Month>, RepositoryError> {
        self.inner.months_with_data()
    }
}

impl EvaluationStore for FlakyStore {
    fn upsert_evaluation(&self, evaluation: LocationEvaluation) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.upsert_evaluation(evaluation)
    }

    fn evaluations(
        &self,
        month: Month,
        location_id: Option<LocationId>,
    ) -> Result<Vec<LocationEvaluation>, RepositoryError> {
        self.inner.evaluations(month, location_id)
    }

    fn delete_evaluations(
        &self,
        month: Month,
        location_id: LocationId,
    ) -> Result<usize, RepositoryError> {
        self.check()?;
        self.inner.delete_evaluations(month, location_id)
    }

    fn upsert_summary(&self, summary: DepartmentSummary) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.upsert_summary(summary)
    }

    fn summaries(
        &self,
        month: Option<Month>,
        department_id: Option<DepartmentId>,
    ) -> Result<Vec<DepartmentSummary>, RepositoryError> {
        self.inner.summaries(month, department_id)
    }
}

/// Flaky store seeded with one location, one KPI and an `>= 85 -> 30` rule.
pub(super) fn flaky_service() -> (BonusService<FlakyStore>, Arc<FlakyStore>, LocationId, KpiId) {
    let store = Arc::new(FlakyStore::default());
    let service = BonusService::new(Arc::clone(&store));
    let department = service
        .add_department(NewDepartment {
            name: "Bouda".to_string(),
            ..NewDepartment::default()
        })
        .expect("department");
    let location = service
        .add_location(NewLocation {
            name: "Mercury".to_string(),
            department_id: department.id,
            description: None,
        })
        .expect("location");
    let kpi = service
        .add_kpi(NewKpiDefinition {
            name: "Audit".to_string(),
            ..NewKpiDefinition::default()
        })
        .expect("kpi");
    service
        .add_threshold(
            kpi.id,
            ThresholdDraft::new(ThresholdOperator::AtLeast, 30.0).lower(85.0),
        )
        .expect("rule");
    (service, store, location.id, kpi.id)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
