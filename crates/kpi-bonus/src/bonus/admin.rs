//! Configuration management: KPI definitions, threshold rules and org structure.

use tracing::{info, warn};

use super::domain::{
    Department, DepartmentId, KpiDefinition, KpiDefinitionPatch, KpiId, Location, LocationId,
    ManagerId, NewDepartment, NewKpiDefinition, NewLocation, NewManager, OperationalManager,
    ThresholdId,
};
use super::evaluation::{ThresholdDraft, ThresholdRule};
use super::repository::{BonusRepository, RepositoryError};
use super::rollup::active_locations_of;
use super::service::{BonusService, BonusServiceError};

impl<R> BonusService<R>
where
    R: BonusRepository + 'static,
{
    pub fn add_kpi(&self, kpi: NewKpiDefinition) -> Result<KpiDefinition, BonusServiceError> {
        ensure_name("name", &kpi.name)?;
        let kpi = NewKpiDefinition {
            name: kpi.name.trim().to_string(),
            ..kpi
        };
        let created = self.repository().insert_kpi(kpi)?;
        info!(kpi = %created.id, name = %created.name, "KPI created");
        Ok(created)
    }

    pub fn update_kpi(
        &self,
        id: KpiId,
        patch: KpiDefinitionPatch,
    ) -> Result<KpiDefinition, BonusServiceError> {
        if patch.is_empty() {
            return Err(BonusServiceError::NoChanges);
        }
        if let Some(name) = &patch.name {
            ensure_name("name", name)?;
        }

        let mut kpi = self.existing_kpi(id)?;
        patch.apply(&mut kpi);
        self.repository().update_kpi(kpi.clone())?;
        Ok(kpi)
    }

    /// Deactivates the KPI; its rules and historical rows stay in place.
    pub fn delete_kpi(&self, id: KpiId) -> Result<(), BonusServiceError> {
        let mut kpi = self.existing_kpi(id)?;
        kpi.active = false;
        self.repository().update_kpi(kpi)?;
        Ok(())
    }

    pub fn kpis(&self, include_inactive: bool) -> Result<Vec<KpiDefinition>, BonusServiceError> {
        Ok(self
            .repository()
            .kpis()?
            .into_iter()
            .filter(|kpi| include_inactive || kpi.active)
            .collect())
    }

    pub fn add_threshold(
        &self,
        kpi_id: KpiId,
        draft: ThresholdDraft,
    ) -> Result<ThresholdRule, BonusServiceError> {
        self.active_kpi(kpi_id)?;
        ensure_bonus(draft.bonus)?;
        ensure_bounds(draft.lower, draft.upper)?;

        let rule = self.repository().insert_threshold(kpi_id, draft)?;
        if rule.is_inert() {
            warn!(
                kpi = %kpi_id,
                threshold = %rule.id,
                operator = %rule.operator,
                "threshold is missing a bound and will never match"
            );
        }
        Ok(rule)
    }

    /// Replaces every field of an existing rule; the KPI link cannot change.
    pub fn update_threshold(
        &self,
        id: ThresholdId,
        draft: ThresholdDraft,
    ) -> Result<ThresholdRule, BonusServiceError> {
        ensure_bonus(draft.bonus)?;
        ensure_bounds(draft.lower, draft.upper)?;

        let existing = self
            .repository()
            .threshold(id)?
            .ok_or(RepositoryError::NotFound {
                entity: ThresholdId::ENTITY,
                id: id.0,
            })?;
        let rule = ThresholdRule {
            id,
            kpi_id: existing.kpi_id,
            operator: draft.operator,
            lower: draft.lower,
            upper: draft.upper,
            bonus: draft.bonus,
            description: draft.description,
            order: draft.order.unwrap_or(existing.order),
        };
        if rule.is_inert() {
            warn!(
                threshold = %id,
                operator = %rule.operator,
                "threshold is missing a bound and will never match"
            );
        }
        self.repository().update_threshold(rule.clone())?;
        Ok(rule)
    }

    pub fn delete_threshold(&self, id: ThresholdId) -> Result<(), BonusServiceError> {
        Ok(self.repository().delete_threshold(id)?)
    }

    /// Rules of one KPI in evaluation order.
    pub fn thresholds(&self, kpi_id: KpiId) -> Result<Vec<ThresholdRule>, BonusServiceError> {
        self.existing_kpi(kpi_id)?;
        Ok(self.rule_set(kpi_id)?.rules().to_vec())
    }

    pub fn add_department(
        &self,
        department: NewDepartment,
    ) -> Result<Department, BonusServiceError> {
        ensure_name("name", &department.name)?;
        let department = NewDepartment {
            name: department.name.trim().to_string(),
            ..department
        };
        Ok(self.repository().insert_department(department)?)
    }

    pub fn set_department_own_kpi(
        &self,
        id: DepartmentId,
        has_own_kpi: bool,
    ) -> Result<Department, BonusServiceError> {
        let mut department = self.active_department(id)?;
        department.has_own_kpi = has_own_kpi;
        self.repository().update_department(department.clone())?;
        Ok(department)
    }

    /// Deactivates a department that no longer has active locations or managers.
    pub fn delete_department(&self, id: DepartmentId) -> Result<(), BonusServiceError> {
        let mut department = self.active_department(id)?;
        let locations = active_locations_of(self.repository().as_ref(), id)?.len();
        let managers = self
            .repository()
            .managers()?
            .iter()
            .filter(|manager| manager.active && manager.department_id == id)
            .count();
        if locations > 0 || managers > 0 {
            return Err(BonusServiceError::DepartmentInUse {
                id: id.0,
                locations,
                managers,
            });
        }

        department.active = false;
        self.repository().update_department(department)?;
        Ok(())
    }

    pub fn departments(&self) -> Result<Vec<Department>, BonusServiceError> {
        Ok(self
            .repository()
            .departments()?
            .into_iter()
            .filter(|department| department.active)
            .collect())
    }

    pub fn add_location(&self, location: NewLocation) -> Result<Location, BonusServiceError> {
        ensure_name("name", &location.name)?;
        self.active_department(location.department_id)?;
        let location = NewLocation {
            name: location.name.trim().to_string(),
            ..location
        };
        Ok(self.repository().insert_location(location)?)
    }

    pub fn move_location(
        &self,
        id: LocationId,
        department_id: DepartmentId,
    ) -> Result<Location, BonusServiceError> {
        self.active_department(department_id)?;
        let mut location = self.active_location(id)?;
        location.department_id = department_id;
        self.repository().update_location(location.clone())?;
        Ok(location)
    }

    pub fn delete_location(&self, id: LocationId) -> Result<(), BonusServiceError> {
        let mut location = self.active_location(id)?;
        location.active = false;
        self.repository().update_location(location)?;
        Ok(())
    }

    pub fn locations(&self) -> Result<Vec<Location>, BonusServiceError> {
        Ok(self
            .repository()
            .locations()?
            .into_iter()
            .filter(|location| location.active)
            .collect())
    }

    pub fn locations_in_department(
        &self,
        department_id: DepartmentId,
    ) -> Result<Vec<Location>, BonusServiceError> {
        Ok(active_locations_of(self.repository().as_ref(), department_id)?)
    }

    pub fn add_manager(
        &self,
        manager: NewManager,
    ) -> Result<OperationalManager, BonusServiceError> {
        ensure_name("name", &manager.name)?;
        self.active_department(manager.department_id)?;
        let manager = NewManager {
            name: manager.name.trim().to_string(),
            ..manager
        };
        Ok(self.repository().insert_manager(manager)?)
    }

    pub fn delete_manager(&self, id: ManagerId) -> Result<(), BonusServiceError> {
        let mut manager = self
            .repository()
            .manager(id)?
            .filter(|manager| manager.active)
            .ok_or(BonusServiceError::Inactive {
                entity: ManagerId::ENTITY,
                id: id.0,
            })?;
        manager.active = false;
        self.repository().update_manager(manager)?;
        Ok(())
    }

    pub fn managers(&self) -> Result<Vec<OperationalManager>, BonusServiceError> {
        Ok(self
            .repository()
            .managers()?
            .into_iter()
            .filter(|manager| manager.active)
            .collect())
    }

    /// Replaces the manager's KPI assignments with `kpis`.
    pub fn set_manager_kpis(
        &self,
        id: ManagerId,
        kpis: Vec<KpiId>,
    ) -> Result<(), BonusServiceError> {
        for kpi in &kpis {
            self.active_kpi(*kpi)?;
        }
        Ok(self.repository().set_manager_kpis(id, kpis)?)
    }

    pub fn manager_kpis(&self, id: ManagerId) -> Result<Vec<KpiId>, BonusServiceError> {
        Ok(self.repository().manager_kpis(id)?)
    }

    fn existing_kpi(&self, id: KpiId) -> Result<KpiDefinition, BonusServiceError> {
        Ok(self.repository().kpi(id)?.ok_or(RepositoryError::NotFound {
            entity: KpiId::ENTITY,
            id: id.0,
        })?)
    }
}

fn ensure_name(field: &'static str, name: &str) -> Result<(), BonusServiceError> {
    if name.trim().is_empty() {
        return Err(BonusServiceError::Invalid {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

fn ensure_bonus(bonus: f64) -> Result<(), BonusServiceError> {
    if !bonus.is_finite() || bonus < 0.0 {
        return Err(BonusServiceError::Invalid {
            field: "bonus",
            reason: format!("{bonus} must be a non-negative number"),
        });
    }
    Ok(())
}

fn ensure_bounds(lower: Option<f64>, upper: Option<f64>) -> Result<(), BonusServiceError> {
    for (field, bound) in [("lower", lower), ("upper", upper)] {
        if let Some(value) = bound.filter(|value| !value.is_finite()) {
            return Err(BonusServiceError::Invalid {
                field,
                reason: format!("{value} is not a finite number"),
            });
        }
    }
    Ok(())
}
