use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::domain::{
    DepartmentEntry, DepartmentId, DepartmentMeasurement, DepartmentSummary, KpiId,
    LocationEntry, LocationEvaluation, LocationId, LocationMeasurement, ManagerId,
    MeasurementSource, Month,
};
use super::evaluation::{BonusEvaluator, RuleSet};
use super::passes::{self, EvaluationRun, SummaryRun};
use super::repository::{BonusRepository, RepositoryError};
use super::rollup::{self, DepartmentKpiValue, ManagerComparison, ManagerRollup};

/// Service composing the repository with the evaluation passes and rollups.
pub struct BonusService<R> {
    repository: Arc<R>,
}

impl<R> Clone for BonusService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

/// Both passes of a "recalculate bonuses" action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecalculationRun {
    pub evaluation: EvaluationRun,
    pub summary: SummaryRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Withdrawal {
    pub measurements: usize,
    pub evaluations: usize,
}

impl<R> BonusService<R>
where
    R: BonusRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Upserts a location value after checking the location and KPI are active.
    pub fn record_location_measurement(
        &self,
        entry: LocationEntry,
        source: MeasurementSource,
    ) -> Result<LocationMeasurement, BonusServiceError> {
        ensure_finite(entry.value)?;
        self.active_location(entry.location_id)?;
        self.active_kpi(entry.kpi_id)?;

        let entry = LocationEntry {
            note: normalize_note(entry.note),
            ..entry
        };
        Ok(self
            .repository
            .upsert_location_measurement(entry, source)?)
    }

    pub fn record_department_measurement(
        &self,
        entry: DepartmentEntry,
        source: MeasurementSource,
    ) -> Result<DepartmentMeasurement, BonusServiceError> {
        ensure_finite(entry.value)?;
        self.active_department(entry.department_id)?;
        self.active_kpi(entry.kpi_id)?;

        let entry = DepartmentEntry {
            note: normalize_note(entry.note),
            ..entry
        };
        Ok(self
            .repository
            .upsert_department_measurement(entry, source)?)
    }

    pub fn location_measurements(
        &self,
        month: Month,
        location_id: Option<LocationId>,
    ) -> Result<Vec<LocationMeasurement>, BonusServiceError> {
        Ok(self.repository.location_measurements(month, location_id)?)
    }

    pub fn department_measurements(
        &self,
        month: Month,
        department_id: Option<DepartmentId>,
    ) -> Result<Vec<DepartmentMeasurement>, BonusServiceError> {
        Ok(self
            .repository
            .department_measurements(month, department_id)?)
    }

    /// Soft-deletes a location's month of data and drops its derived evaluations.
    pub fn withdraw_location_month(
        &self,
        month: Month,
        location_id: LocationId,
    ) -> Result<Withdrawal, BonusServiceError> {
        let measurements = self
            .repository
            .soft_delete_location_month(month, location_id)?;
        let evaluations = self.repository.delete_evaluations(month, location_id)?;
        info!(%month, location = %location_id, measurements, evaluations, "location month withdrawn");
        Ok(Withdrawal {
            measurements,
            evaluations,
        })
    }

    pub fn withdraw_department_month(
        &self,
        month: Month,
        department_id: DepartmentId,
    ) -> Result<usize, BonusServiceError> {
        Ok(self
            .repository
            .soft_delete_department_month(month, department_id)?)
    }

    pub fn months_with_data(&self) -> Result<Vec<Month>, BonusServiceError> {
        Ok(self.repository.months_with_data()?)
    }

    /// Bonus a single value would earn under the KPI's current rules.
    pub fn evaluate(&self, kpi_id: KpiId, value: f64) -> Result<f64, BonusServiceError> {
        Ok(BonusEvaluator::new(self.repository.as_ref()).evaluate(kpi_id, value)?)
    }

    pub fn rule_set(&self, kpi_id: KpiId) -> Result<RuleSet, BonusServiceError> {
        Ok(RuleSet::new(self.repository.rules_for(kpi_id)?))
    }

    pub fn evaluate_month(
        &self,
        month: Month,
        location_id: Option<LocationId>,
    ) -> Result<EvaluationRun, BonusServiceError> {
        Ok(passes::evaluate_month(
            self.repository.as_ref(),
            month,
            location_id,
        )?)
    }

    pub fn summarize_month(&self, month: Month) -> Result<SummaryRun, BonusServiceError> {
        Ok(passes::summarize_month(self.repository.as_ref(), month)?)
    }

    pub fn recalculate(&self, month: Month) -> Result<RecalculationRun, BonusServiceError> {
        let evaluation = self.evaluate_month(month, None)?;
        let summary = self.summarize_month(month)?;
        Ok(RecalculationRun {
            evaluation,
            summary,
        })
    }

    pub fn evaluations(
        &self,
        month: Month,
        location_id: Option<LocationId>,
    ) -> Result<Vec<LocationEvaluation>, BonusServiceError> {
        Ok(self.repository.evaluations(month, location_id)?)
    }

    pub fn summaries(
        &self,
        month: Option<Month>,
        department_id: Option<DepartmentId>,
    ) -> Result<Vec<DepartmentSummary>, BonusServiceError> {
        Ok(self.repository.summaries(month, department_id)?)
    }

    pub fn rollup(
        &self,
        month: Month,
        manager_id: ManagerId,
    ) -> Result<ManagerRollup, BonusServiceError> {
        let manager = self
            .repository
            .manager(manager_id)?
            .ok_or(RepositoryError::NotFound {
                entity: ManagerId::ENTITY,
                id: manager_id.0,
            })?;
        Ok(rollup::manager_rollup(
            self.repository.as_ref(),
            month,
            &manager,
        )?)
    }

    /// Overview cards for every active manager.
    pub fn rollups(&self, month: Month) -> Result<Vec<ManagerRollup>, BonusServiceError> {
        let mut rollups = Vec::new();
        for manager in self.repository.managers()?.into_iter().filter(|m| m.active) {
            rollups.push(rollup::manager_rollup(
                self.repository.as_ref(),
                month,
                &manager,
            )?);
        }
        Ok(rollups)
    }

    pub fn comparison(
        &self,
        month: Month,
        kpi_id: Option<KpiId>,
    ) -> Result<Vec<ManagerComparison>, BonusServiceError> {
        Ok(rollup::manager_comparison(
            self.repository.as_ref(),
            month,
            kpi_id,
        )?)
    }

    pub fn department_kpi_value(
        &self,
        month: Month,
        department_id: DepartmentId,
        kpi_id: KpiId,
    ) -> Result<Option<DepartmentKpiValue>, BonusServiceError> {
        Ok(rollup::department_kpi_value(
            self.repository.as_ref(),
            month,
            department_id,
            kpi_id,
        )?)
    }

    pub(crate) fn active_location(
        &self,
        id: LocationId,
    ) -> Result<super::domain::Location, BonusServiceError> {
        self.repository
            .location(id)?
            .filter(|location| location.active)
            .ok_or(BonusServiceError::Inactive {
                entity: LocationId::ENTITY,
                id: id.0,
            })
    }

    pub(crate) fn active_department(
        &self,
        id: DepartmentId,
    ) -> Result<super::domain::Department, BonusServiceError> {
        self.repository
            .department(id)?
            .filter(|department| department.active)
            .ok_or(BonusServiceError::Inactive {
                entity: DepartmentId::ENTITY,
                id: id.0,
            })
    }

    pub(crate) fn active_kpi(
        &self,
        id: KpiId,
    ) -> Result<super::domain::KpiDefinition, BonusServiceError> {
        self.repository
            .kpi(id)?
            .filter(|kpi| kpi.active)
            .ok_or(BonusServiceError::Inactive {
                entity: KpiId::ENTITY,
                id: id.0,
            })
    }
}

fn ensure_finite(value: f64) -> Result<(), BonusServiceError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(BonusServiceError::Invalid {
            field: "value",
            reason: format!("{value} is not a finite number"),
        })
    }
}

fn normalize_note(note: Option<String>) -> Option<String> {
    note.filter(|text| !text.trim().is_empty())
}

/// Error raised by the bonus service.
#[derive(Debug, thiserror::Error)]
pub enum BonusServiceError {
    #[error("{entity} {id} does not exist or is not active")]
    Inactive { entity: &'static str, id: u64 },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error(
        "department {id} still has {locations} active location(s) and {managers} active manager(s)"
    )]
    DepartmentInUse {
        id: u64,
        locations: usize,
        managers: usize,
    },
    #[error("no changes requested")]
    NoChanges,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
