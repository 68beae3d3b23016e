use crate::infra::{in_memory_service, parse_month};
use clap::Args;
use kpi_bonus::bonus::{
    import_template, BonusService, ImportReport, InMemoryBonusStore, ManagerRollup, Month,
    RecalculationRun,
};
use kpi_bonus::config::AppConfig;
use kpi_bonus::error::AppError;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// Month to evaluate (YYYY-MM); defaults to KPI_DEFAULT_MONTH or the current month
    #[arg(long, value_parser = parse_month)]
    pub(crate) month: Option<Month>,
    /// CSV file of location values to import before recalculating
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
    /// Print the per-location breakdown under each manager
    #[arg(long)]
    pub(crate) list_locations: bool,
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let ReportArgs {
        month,
        csv,
        list_locations,
    } = args;

    let month = match month {
        Some(month) => month,
        None => AppConfig::load()?.bonus.report_month(),
    };

    let service = in_memory_service(true)?;
    let import = match csv {
        Some(path) => Some(service.import_csv_path(path)?),
        None => None,
    };

    let run = service.recalculate(month)?;
    let rollups = service.rollups(month)?;
    let departments = department_names(&service)?;

    render_bonus_report(
        month,
        import.as_ref(),
        &run,
        &rollups,
        &departments,
        list_locations,
    );
    Ok(())
}

pub(crate) fn run_template() -> Result<(), AppError> {
    print!("{}", import_template()?);
    Ok(())
}

fn department_names(
    service: &BonusService<InMemoryBonusStore>,
) -> Result<HashMap<u64, String>, AppError> {
    Ok(service
        .departments()?
        .into_iter()
        .map(|department| (department.id.0, department.name))
        .collect())
}

pub(crate) fn render_bonus_report(
    month: Month,
    import: Option<&ImportReport>,
    run: &RecalculationRun,
    rollups: &[ManagerRollup],
    departments: &HashMap<u64, String>,
    list_locations: bool,
) {
    println!("KPI bonus report for {}", month);

    match import {
        Some(report) => {
            println!(
                "Data source: CSV import ({} value(s) imported, {} row error(s))",
                report.imported,
                report.errors.len()
            );
            for error in &report.errors {
                println!("- {}", error);
            }
        }
        None => println!("Data source: reference configuration (no CSV provided)"),
    }

    println!(
        "\nEvaluation: {} value(s) evaluated, {} threshold(s) met",
        run.evaluation.evaluated, run.evaluation.met
    );

    if run.summary.written.is_empty() {
        println!("\nDepartment summaries: none");
    } else {
        println!("\nDepartment summaries");
        for entry in &run.summary.written {
            let summary = &entry.summary;
            println!(
                "- {}: {:.2} bonus, {}/{} KPIs met",
                department_label(departments, summary.department_id.0),
                summary.aggregate_bonus,
                summary.met_kpis,
                summary.active_kpis
            );
        }
    }
    for skipped in &run.summary.skipped {
        println!(
            "- {}: skipped, no department values for the month",
            department_label(departments, skipped.0)
        );
    }

    if rollups.is_empty() {
        println!("\nManager overview: no active managers");
        return;
    }

    println!("\nManager overview");
    for rollup in rollups {
        println!(
            "- {} ({}): {:.2} avg bonus, {}/{} KPIs met ({:.1}%), {} location(s) [{}]",
            rollup.manager_name,
            rollup
                .department_name
                .as_deref()
                .unwrap_or("unknown department"),
            rollup.avg_bonus,
            rollup.met_kpis,
            rollup.total_kpis_evaluated,
            rollup.success_rate,
            rollup.location_count,
            rollup.tier.label()
        );

        if list_locations {
            for location in &rollup.locations {
                println!(
                    "    {}: {:.2} bonus over {} KPI(s), {} met",
                    location.location_name,
                    location.tally.bonus_sum,
                    location.tally.rows,
                    location.tally.met
                );
            }
        }
    }
}

fn department_label(departments: &HashMap<u64, String>, id: u64) -> String {
    departments
        .get(&id)
        .cloned()
        .unwrap_or_else(|| format!("department {}", id))
}
