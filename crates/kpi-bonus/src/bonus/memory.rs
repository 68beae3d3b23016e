use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::domain::{
    Department, DepartmentEntry, DepartmentId, DepartmentMeasurement, DepartmentSummary,
    KpiDefinition, KpiId, Location, LocationEntry, LocationEvaluation, LocationId,
    LocationMeasurement, ManagerId, MeasurementSource, MeasurementStatus, Month, NewDepartment,
    NewKpiDefinition, NewLocation, NewManager, OperationalManager, ThresholdId,
};
use super::evaluation::{ThresholdDraft, ThresholdRule};
use super::repository::{
    DirectoryStore, EvaluationStore, MeasurementStore, RepositoryError, ThresholdStore,
};

/// Mutex-guarded store keyed by the natural unique tuples of each table.
///
/// Every trait call takes the lock once, so individual upserts are atomic while a
/// pass as a whole is not.
#[derive(Default, Clone)]
pub struct InMemoryBonusStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    last_id: u64,
    kpis: BTreeMap<KpiId, KpiDefinition>,
    thresholds: BTreeMap<ThresholdId, ThresholdRule>,
    departments: BTreeMap<DepartmentId, Department>,
    locations: BTreeMap<LocationId, Location>,
    managers: BTreeMap<ManagerId, OperationalManager>,
    manager_kpis: BTreeMap<ManagerId, BTreeSet<KpiId>>,
    location_measurements: BTreeMap<(Month, LocationId, KpiId), LocationMeasurement>,
    department_measurements: BTreeMap<(Month, DepartmentId, KpiId), DepartmentMeasurement>,
    evaluations: BTreeMap<(Month, LocationId, KpiId), LocationEvaluation>,
    summaries: BTreeMap<(Month, DepartmentId), DepartmentSummary>,
}

impl StoreState {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }
}

impl InMemoryBonusStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

fn ensure_unique<'a, I>(
    entity: &'static str,
    mut names: I,
    candidate: &str,
) -> Result<(), RepositoryError>
where
    I: Iterator<Item = &'a str>,
{
    if names.any(|name| name == candidate) {
        return Err(RepositoryError::Conflict {
            entity,
            key: candidate.to_string(),
        });
    }
    Ok(())
}

impl ThresholdStore for InMemoryBonusStore {
    fn rules_for(&self, kpi_id: KpiId) -> Result<Vec<ThresholdRule>, RepositoryError> {
        let state = self.lock()?;
        let mut rules: Vec<ThresholdRule> = state
            .thresholds
            .values()
            .filter(|rule| rule.kpi_id == kpi_id)
            .cloned()
            .collect();
        rules.sort_by_key(|rule| (rule.order, rule.id));
        Ok(rules)
    }

    fn threshold(&self, id: ThresholdId) -> Result<Option<ThresholdRule>, RepositoryError> {
        Ok(self.lock()?.thresholds.get(&id).cloned())
    }

    fn insert_threshold(
        &self,
        kpi_id: KpiId,
        draft: ThresholdDraft,
    ) -> Result<ThresholdRule, RepositoryError> {
        let mut state = self.lock()?;
        if !state.kpis.contains_key(&kpi_id) {
            return Err(RepositoryError::NotFound {
                entity: KpiId::ENTITY,
                id: kpi_id.0,
            });
        }

        let order = draft.order.unwrap_or_else(|| {
            state
                .thresholds
                .values()
                .filter(|rule| rule.kpi_id == kpi_id)
                .map(|rule| rule.order)
                .max()
                .unwrap_or(0)
                + 1
        });

        let rule = ThresholdRule {
            id: ThresholdId(state.next_id()),
            kpi_id,
            operator: draft.operator,
            lower: draft.lower,
            upper: draft.upper,
            bonus: draft.bonus,
            description: draft.description,
            order,
        };
        state.thresholds.insert(rule.id, rule.clone());
        Ok(rule)
    }

    fn update_threshold(&self, rule: ThresholdRule) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.thresholds.get_mut(&rule.id) {
            Some(existing) => {
                *existing = rule;
                Ok(())
            }
            None => Err(RepositoryError::NotFound {
                entity: ThresholdId::ENTITY,
                id: rule.id.0,
            }),
        }
    }

    fn delete_threshold(&self, id: ThresholdId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state
            .thresholds
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound {
                entity: ThresholdId::ENTITY,
                id: id.0,
            })
    }
}

impl DirectoryStore for InMemoryBonusStore {
    fn insert_kpi(&self, kpi: NewKpiDefinition) -> Result<KpiDefinition, RepositoryError> {
        let mut state = self.lock()?;
        ensure_unique(
            KpiId::ENTITY,
            state.kpis.values().map(|existing| existing.name.as_str()),
            &kpi.name,
        )?;

        let display_order = kpi.display_order.unwrap_or_else(|| {
            state
                .kpis
                .values()
                .map(|existing| existing.display_order)
                .max()
                .unwrap_or(0)
                + 1
        });

        let definition = KpiDefinition {
            id: KpiId(state.next_id()),
            name: kpi.name,
            description: kpi.description,
            unit: kpi.unit,
            calculation: kpi.calculation,
            display_order,
            active: true,
        };
        state.kpis.insert(definition.id, definition.clone());
        Ok(definition)
    }

    fn update_kpi(&self, kpi: KpiDefinition) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.kpis.contains_key(&kpi.id) {
            return Err(RepositoryError::NotFound {
                entity: KpiId::ENTITY,
                id: kpi.id.0,
            });
        }
        ensure_unique(
            KpiId::ENTITY,
            state
                .kpis
                .values()
                .filter(|existing| existing.id != kpi.id)
                .map(|existing| existing.name.as_str()),
            &kpi.name,
        )?;
        state.kpis.insert(kpi.id, kpi);
        Ok(())
    }

    fn kpi(&self, id: KpiId) -> Result<Option<KpiDefinition>, RepositoryError> {
        Ok(self.lock()?.kpis.get(&id).cloned())
    }

    fn kpis(&self) -> Result<Vec<KpiDefinition>, RepositoryError> {
        let state = self.lock()?;
        let mut kpis: Vec<_> = state.kpis.values().cloned().collect();
        kpis.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(kpis)
    }

    fn insert_department(
        &self,
        department: NewDepartment,
    ) -> Result<Department, RepositoryError> {
        let mut state = self.lock()?;
        ensure_unique(
            DepartmentId::ENTITY,
            state.departments.values().map(|existing| existing.name.as_str()),
            &department.name,
        )?;

        let record = Department {
            id: DepartmentId(state.next_id()),
            name: department.name,
            description: department.description,
            head: department.head,
            has_own_kpi: department.has_own_kpi,
            active: true,
        };
        state.departments.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_department(&self, department: Department) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.departments.contains_key(&department.id) {
            return Err(RepositoryError::NotFound {
                entity: DepartmentId::ENTITY,
                id: department.id.0,
            });
        }
        ensure_unique(
            DepartmentId::ENTITY,
            state
                .departments
                .values()
                .filter(|existing| existing.id != department.id)
                .map(|existing| existing.name.as_str()),
            &department.name,
        )?;
        state.departments.insert(department.id, department);
        Ok(())
    }

    fn department(&self, id: DepartmentId) -> Result<Option<Department>, RepositoryError> {
        Ok(self.lock()?.departments.get(&id).cloned())
    }

    fn departments(&self) -> Result<Vec<Department>, RepositoryError> {
        let state = self.lock()?;
        let mut departments: Vec<_> = state.departments.values().cloned().collect();
        departments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(departments)
    }

    fn insert_location(&self, location: NewLocation) -> Result<Location, RepositoryError> {
        let mut state = self.lock()?;
        if !state.departments.contains_key(&location.department_id) {
            return Err(RepositoryError::NotFound {
                entity: DepartmentId::ENTITY,
                id: location.department_id.0,
            });
        }
        ensure_unique(
            LocationId::ENTITY,
            state.locations.values().map(|existing| existing.name.as_str()),
            &location.name,
        )?;

        let record = Location {
            id: LocationId(state.next_id()),
            department_id: location.department_id,
            name: location.name,
            description: location.description,
            active: true,
        };
        state.locations.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_location(&self, location: Location) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.locations.contains_key(&location.id) {
            return Err(RepositoryError::NotFound {
                entity: LocationId::ENTITY,
                id: location.id.0,
            });
        }
        ensure_unique(
            LocationId::ENTITY,
            state
                .locations
                .values()
                .filter(|existing| existing.id != location.id)
                .map(|existing| existing.name.as_str()),
            &location.name,
        )?;
        state.locations.insert(location.id, location);
        Ok(())
    }

    fn location(&self, id: LocationId) -> Result<Option<Location>, RepositoryError> {
        Ok(self.lock()?.locations.get(&id).cloned())
    }

    fn locations(&self) -> Result<Vec<Location>, RepositoryError> {
        let state = self.lock()?;
        let mut locations: Vec<_> = state.locations.values().cloned().collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    fn insert_manager(&self, manager: NewManager) -> Result<OperationalManager, RepositoryError> {
        let mut state = self.lock()?;
        if !state.departments.contains_key(&manager.department_id) {
            return Err(RepositoryError::NotFound {
                entity: DepartmentId::ENTITY,
                id: manager.department_id.0,
            });
        }

        let record = OperationalManager {
            id: ManagerId(state.next_id()),
            department_id: manager.department_id,
            name: manager.name,
            email: manager.email,
            active: true,
        };
        state.managers.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_manager(&self, manager: OperationalManager) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.managers.get_mut(&manager.id) {
            Some(existing) => {
                *existing = manager;
                Ok(())
            }
            None => Err(RepositoryError::NotFound {
                entity: ManagerId::ENTITY,
                id: manager.id.0,
            }),
        }
    }

    fn manager(&self, id: ManagerId) -> Result<Option<OperationalManager>, RepositoryError> {
        Ok(self.lock()?.managers.get(&id).cloned())
    }

    fn managers(&self) -> Result<Vec<OperationalManager>, RepositoryError> {
        let state = self.lock()?;
        let mut managers: Vec<_> = state.managers.values().cloned().collect();
        managers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(managers)
    }

    fn manager_kpis(&self, id: ManagerId) -> Result<Vec<KpiId>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .manager_kpis
            .get(&id)
            .map(|kpis| kpis.iter().copied().collect())
            .unwrap_or_default())
    }

    fn set_manager_kpis(&self, id: ManagerId, kpis: Vec<KpiId>) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.managers.contains_key(&id) {
            return Err(RepositoryError::NotFound {
                entity: ManagerId::ENTITY,
                id: id.0,
            });
        }
        state.manager_kpis.insert(id, kpis.into_iter().collect());
        Ok(())
    }
}

impl MeasurementStore for InMemoryBonusStore {
    fn upsert_location_measurement(
        &self,
        entry: LocationEntry,
        source: MeasurementSource,
    ) -> Result<LocationMeasurement, RepositoryError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let key = (entry.month, entry.location_id, entry.kpi_id);
        let created_at = state
            .location_measurements
            .get(&key)
            .map(|existing| existing.created_at)
            .unwrap_or(now);

        let record = LocationMeasurement {
            month: entry.month,
            location_id: entry.location_id,
            kpi_id: entry.kpi_id,
            value: entry.value,
            note: entry.note,
            source,
            status: MeasurementStatus::Active,
            created_at,
            updated_at: now,
        };
        state.location_measurements.insert(key, record.clone());
        Ok(record)
    }

    fn location_measurements(
        &self,
        month: Month,
        location_id: Option<LocationId>,
    ) -> Result<Vec<LocationMeasurement>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .location_measurements
            .values()
            .filter(|row| row.month == month && row.status == MeasurementStatus::Active)
            .filter(|row| location_id.map_or(true, |id| row.location_id == id))
            .cloned()
            .collect())
    }

    fn soft_delete_location_month(
        &self,
        month: Month,
        location_id: LocationId,
    ) -> Result<usize, RepositoryError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let mut changed = 0;
        for row in state.location_measurements.values_mut() {
            if row.month == month
                && row.location_id == location_id
                && row.status == MeasurementStatus::Active
            {
                row.status = MeasurementStatus::Deleted;
                row.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn upsert_department_measurement(
        &self,
        entry: DepartmentEntry,
        source: MeasurementSource,
    ) -> Result<DepartmentMeasurement, RepositoryError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let key = (entry.month, entry.department_id, entry.kpi_id);
        let created_at = state
            .department_measurements
            .get(&key)
            .map(|existing| existing.created_at)
            .unwrap_or(now);

        let record = DepartmentMeasurement {
            month: entry.month,
            department_id: entry.department_id,
            kpi_id: entry.kpi_id,
            value: entry.value,
            note: entry.note,
            source,
            status: MeasurementStatus::Active,
            created_at,
            updated_at: now,
        };
        state.department_measurements.insert(key, record.clone());
        Ok(record)
    }

    fn department_measurements(
        &self,
        month: Month,
        department_id: Option<DepartmentId>,
    ) -> Result<Vec<DepartmentMeasurement>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .department_measurements
            .values()
            .filter(|row| row.month == month && row.status == MeasurementStatus::Active)
            .filter(|row| department_id.map_or(true, |id| row.department_id == id))
            .cloned()
            .collect())
    }

    fn soft_delete_department_month(
        &self,
        month: Month,
        department_id: DepartmentId,
    ) -> Result<usize, RepositoryError> {
        let mut state = self.lock()?;
        let now = Utc::now();
        let mut changed = 0;
        for row in state.department_measurements.values_mut() {
            if row.month == month
                && row.department_id == department_id
                && row.status == MeasurementStatus::Active
            {
                row.status = MeasurementStatus::Deleted;
                row.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn months_with_data(&self) -> Result<Vec<Month>, RepositoryError> {
        let state = self.lock()?;
        let months: BTreeSet<Month> = state
            .location_measurements
            .values()
            .filter(|row| row.status == MeasurementStatus::Active)
            .map(|row| row.month)
            .collect();
        Ok(months.into_iter().rev().collect())
    }
}

impl EvaluationStore for InMemoryBonusStore {
    fn upsert_evaluation(&self, evaluation: LocationEvaluation) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let key = (evaluation.month, evaluation.location_id, evaluation.kpi_id);
        state.evaluations.insert(key, evaluation);
        Ok(())
    }

    fn evaluations(
        &self,
        month: Month,
        location_id: Option<LocationId>,
    ) -> Result<Vec<LocationEvaluation>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .evaluations
            .values()
            .filter(|row| row.month == month)
            .filter(|row| location_id.map_or(true, |id| row.location_id == id))
            .cloned()
            .collect())
    }

    fn delete_evaluations(
        &self,
        month: Month,
        location_id: LocationId,
    ) -> Result<usize, RepositoryError> {
        let mut state = self.lock()?;
        let before = state.evaluations.len();
        state
            .evaluations
            .retain(|(row_month, row_location, _), _| {
                !(*row_month == month && *row_location == location_id)
            });
        Ok(before - state.evaluations.len())
    }

    fn upsert_summary(&self, summary: DepartmentSummary) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state
            .summaries
            .insert((summary.month, summary.department_id), summary);
        Ok(())
    }

    fn summaries(
        &self,
        month: Option<Month>,
        department_id: Option<DepartmentId>,
    ) -> Result<Vec<DepartmentSummary>, RepositoryError> {
        let state = self.lock()?;
        let mut rows: Vec<_> = state
            .summaries
            .values()
            .filter(|row| month.map_or(true, |m| row.month == m))
            .filter(|row| department_id.map_or(true, |id| row.department_id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.month
                .cmp(&a.month)
                .then_with(|| a.department_id.cmp(&b.department_id))
        });
        Ok(rows)
    }
}
