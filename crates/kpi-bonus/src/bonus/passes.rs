use serde::Serialize;
use tracing::{debug, info};

use super::domain::{
    Department, DepartmentId, DepartmentSummary, LocationEvaluation, LocationId, Month,
};
use super::evaluation::BonusEvaluator;
use super::repository::{
    DirectoryStore, EvaluationStore, MeasurementStore, RepositoryError, ThresholdStore,
};
use super::rollup::{active_locations_of, department_average_bonus, EvaluationTally};

/// Outcome of one location evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRun {
    pub month: Month,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<LocationId>,
    pub evaluated: usize,
    pub met: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    OwnKpi,
    LocationAverage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub source: SummarySource,
    pub summary: DepartmentSummary,
}

/// Outcome of one department summary pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRun {
    pub month: Month,
    pub written: Vec<SummaryEntry>,
    /// Own-KPI departments without any measurement for the month.
    pub skipped: Vec<DepartmentId>,
}

/// Evaluates every active location measurement of `month` and upserts the results.
pub(crate) fn evaluate_month<R>(
    repository: &R,
    month: Month,
    location_id: Option<LocationId>,
) -> Result<EvaluationRun, RepositoryError>
where
    R: ThresholdStore + MeasurementStore + EvaluationStore + ?Sized,
{
    let measurements = repository.location_measurements(month, location_id)?;
    let mut evaluator = BonusEvaluator::new(repository);
    let mut run = EvaluationRun {
        month,
        location_id,
        evaluated: 0,
        met: 0,
    };

    for measurement in measurements {
        let bonus = evaluator.evaluate(measurement.kpi_id, measurement.value)?;
        let met = bonus > 0.0;
        debug!(
            %month,
            location = %measurement.location_id,
            kpi = %measurement.kpi_id,
            value = measurement.value,
            bonus,
            "evaluated measurement"
        );

        repository.upsert_evaluation(LocationEvaluation {
            month,
            location_id: measurement.location_id,
            kpi_id: measurement.kpi_id,
            value: measurement.value,
            met,
            bonus,
        })?;

        run.evaluated += 1;
        if met {
            run.met += 1;
        }
    }

    info!(%month, evaluated = run.evaluated, met = run.met, "location evaluation pass finished");
    Ok(run)
}

/// Recomputes the summary row of every active department for `month`.
pub(crate) fn summarize_month<R>(
    repository: &R,
    month: Month,
) -> Result<SummaryRun, RepositoryError>
where
    R: ThresholdStore + DirectoryStore + MeasurementStore + EvaluationStore + ?Sized,
{
    let departments: Vec<Department> = repository
        .departments()?
        .into_iter()
        .filter(|department| department.active)
        .collect();

    let mut evaluator = BonusEvaluator::new(repository);
    let mut run = SummaryRun {
        month,
        written: Vec::new(),
        skipped: Vec::new(),
    };

    for department in departments {
        let (source, tally) = if department.has_own_kpi {
            let measurements = repository.department_measurements(month, Some(department.id))?;
            let mut tally = EvaluationTally::default();
            for measurement in &measurements {
                let bonus = evaluator.evaluate(measurement.kpi_id, measurement.value)?;
                tally.bonus_sum += bonus;
                tally.rows += 1;
                if bonus > 0.0 {
                    tally.met += 1;
                }
            }

            if tally.rows == 0 {
                debug!(%month, department = %department.id, "no own KPI data, summary skipped");
                run.skipped.push(department.id);
                continue;
            }
            (SummarySource::OwnKpi, tally)
        } else {
            let locations = active_locations_of(repository, department.id)?;
            let mut tally = EvaluationTally::default();
            for location in &locations {
                let evaluations = repository.evaluations(month, Some(location.id))?;
                tally.add(EvaluationTally::of(&evaluations));
            }
            tally.bonus_sum = department_average_bonus(tally.bonus_sum, locations.len());
            (SummarySource::LocationAverage, tally)
        };

        let summary = DepartmentSummary {
            month,
            department_id: department.id,
            aggregate_bonus: tally.bonus_sum,
            active_kpis: tally.rows,
            met_kpis: tally.met,
        };
        repository.upsert_summary(summary.clone())?;
        run.written.push(SummaryEntry { source, summary });
    }

    info!(
        %month,
        written = run.written.len(),
        skipped = run.skipped.len(),
        "department summary pass finished"
    );
    Ok(run)
}
