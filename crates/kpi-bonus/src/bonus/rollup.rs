//! Read-time aggregation of evaluation rows for managers and departments.
//!
//! Two different "average bonus" statistics live here on purpose:
//! [`department_average_bonus`] divides the summed bonus by the number of
//! locations, while [`row_mean_bonus`] averages individual evaluation rows. The
//! overview cards and the department summary use the former, the cross-manager
//! comparison chart uses the latter.

use serde::Serialize;

use super::domain::{
    DepartmentId, KpiId, Location, LocationEvaluation, LocationId, ManagerId, Month,
    OperationalManager,
};
use super::repository::{DirectoryStore, EvaluationStore, MeasurementStore, RepositoryError};

/// Unweighted per-location average: summed bonus over the number of locations.
pub fn department_average_bonus(total_bonus: f64, location_count: usize) -> f64 {
    if location_count == 0 {
        0.0
    } else {
        total_bonus / location_count as f64
    }
}

/// Mean of the individual evaluation-row bonuses.
pub fn row_mean_bonus(rows: &[LocationEvaluation]) -> f64 {
    if rows.is_empty() {
        0.0
    } else {
        rows.iter().map(|row| row.bonus).sum::<f64>() / rows.len() as f64
    }
}

/// Share of met KPIs in percent; 0 when nothing was evaluated.
pub fn success_rate(met: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(met) / f64::from(total) * 100.0
    }
}

/// Sums of one or more locations' evaluation rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EvaluationTally {
    pub bonus_sum: f64,
    pub rows: u32,
    pub met: u32,
}

impl EvaluationTally {
    pub fn of(rows: &[LocationEvaluation]) -> Self {
        rows.iter().fold(Self::default(), |mut tally, row| {
            tally.bonus_sum += row.bonus;
            tally.rows += 1;
            if row.met {
                tally.met += 1;
            }
            tally
        })
    }

    pub fn add(&mut self, other: EvaluationTally) {
        self.bonus_sum += other.bonus_sum;
        self.rows += other.rows;
        self.met += other.met;
    }
}

/// Colour band used by the overview cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusTier {
    Good,
    Medium,
    Low,
}

impl BonusTier {
    pub const GOOD_FROM: f64 = 50.0;
    pub const MEDIUM_FROM: f64 = 30.0;

    pub fn for_bonus(avg_bonus: f64) -> Self {
        if avg_bonus >= Self::GOOD_FROM {
            Self::Good
        } else if avg_bonus >= Self::MEDIUM_FROM {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationBreakdown {
    pub location_id: LocationId,
    pub location_name: String,
    pub tally: EvaluationTally,
    pub evaluations: Vec<LocationEvaluation>,
}

/// Overview card for one manager, covering every active location of their department.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerRollup {
    pub month: Month,
    pub manager_id: ManagerId,
    pub manager_name: String,
    pub department_id: DepartmentId,
    pub department_name: Option<String>,
    pub avg_bonus: f64,
    pub total_kpis_evaluated: u32,
    pub met_kpis: u32,
    pub location_count: usize,
    pub success_rate: f64,
    pub tier: BonusTier,
    pub locations: Vec<LocationBreakdown>,
}

/// Bar-chart entry comparing managers on individual evaluation rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerComparison {
    pub manager_id: ManagerId,
    pub manager_name: String,
    pub department_name: Option<String>,
    /// Mean of the individual row bonuses, not a per-location average.
    pub avg_bonus: f64,
    pub total_bonus: f64,
    pub met_kpis: u32,
    pub total_kpis: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiValueSource {
    Own,
    LocationAverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepartmentKpiValue {
    pub value: f64,
    pub source: KpiValueSource,
}

pub(crate) fn active_locations_of<R>(
    repository: &R,
    department_id: DepartmentId,
) -> Result<Vec<Location>, RepositoryError>
where
    R: DirectoryStore + ?Sized,
{
    Ok(repository
        .locations()?
        .into_iter()
        .filter(|location| location.active && location.department_id == department_id)
        .collect())
}

pub(crate) fn manager_rollup<R>(
    repository: &R,
    month: Month,
    manager: &OperationalManager,
) -> Result<ManagerRollup, RepositoryError>
where
    R: DirectoryStore + EvaluationStore + ?Sized,
{
    let department_name = repository
        .department(manager.department_id)?
        .map(|department| department.name);
    let locations = active_locations_of(repository, manager.department_id)?;

    let mut total = EvaluationTally::default();
    let mut breakdown = Vec::with_capacity(locations.len());
    for location in &locations {
        let evaluations = repository.evaluations(month, Some(location.id))?;
        let tally = EvaluationTally::of(&evaluations);
        total.add(tally);
        breakdown.push(LocationBreakdown {
            location_id: location.id,
            location_name: location.name.clone(),
            tally,
            evaluations,
        });
    }

    let avg_bonus = department_average_bonus(total.bonus_sum, locations.len());

    Ok(ManagerRollup {
        month,
        manager_id: manager.id,
        manager_name: manager.name.clone(),
        department_id: manager.department_id,
        department_name,
        avg_bonus,
        total_kpis_evaluated: total.rows,
        met_kpis: total.met,
        location_count: locations.len(),
        success_rate: success_rate(total.met, total.rows),
        tier: BonusTier::for_bonus(avg_bonus),
        locations: breakdown,
    })
}

/// Managers without any matching evaluation row are left out of the chart.
pub(crate) fn manager_comparison<R>(
    repository: &R,
    month: Month,
    kpi_id: Option<KpiId>,
) -> Result<Vec<ManagerComparison>, RepositoryError>
where
    R: DirectoryStore + EvaluationStore + ?Sized,
{
    let evaluations = repository.evaluations(month, None)?;
    let mut entries = Vec::new();

    for manager in repository.managers()?.into_iter().filter(|m| m.active) {
        let location_ids: Vec<LocationId> =
            active_locations_of(repository, manager.department_id)?
                .into_iter()
                .map(|location| location.id)
                .collect();

        let rows: Vec<LocationEvaluation> = evaluations
            .iter()
            .filter(|row| location_ids.contains(&row.location_id))
            .filter(|row| kpi_id.map_or(true, |id| row.kpi_id == id))
            .cloned()
            .collect();
        if rows.is_empty() {
            continue;
        }

        let tally = EvaluationTally::of(&rows);
        let department_name = repository
            .department(manager.department_id)?
            .map(|department| department.name);

        entries.push(ManagerComparison {
            manager_id: manager.id,
            manager_name: manager.name,
            department_name,
            avg_bonus: row_mean_bonus(&rows),
            total_bonus: tally.bonus_sum,
            met_kpis: tally.met,
            total_kpis: tally.rows,
        });
    }

    Ok(entries)
}

pub(crate) fn department_kpi_value<R>(
    repository: &R,
    month: Month,
    department_id: DepartmentId,
    kpi_id: KpiId,
) -> Result<Option<DepartmentKpiValue>, RepositoryError>
where
    R: DirectoryStore + MeasurementStore + ?Sized,
{
    let Some(department) = repository.department(department_id)? else {
        return Ok(None);
    };

    if department.has_own_kpi {
        let own = repository
            .department_measurements(month, Some(department_id))?
            .into_iter()
            .find(|row| row.kpi_id == kpi_id)
            .map(|row| DepartmentKpiValue {
                value: row.value,
                source: KpiValueSource::Own,
            });
        return Ok(own);
    }

    let location_ids: Vec<LocationId> = active_locations_of(repository, department_id)?
        .into_iter()
        .map(|location| location.id)
        .collect();
    let values: Vec<f64> = repository
        .location_measurements(month, None)?
        .into_iter()
        .filter(|row| row.kpi_id == kpi_id && location_ids.contains(&row.location_id))
        .map(|row| row.value)
        .collect();

    if values.is_empty() {
        return Ok(None);
    }

    Ok(Some(DepartmentKpiValue {
        value: values.iter().sum::<f64>() / values.len() as f64,
        source: KpiValueSource::LocationAverage,
    }))
}
