use super::common::*;
use crate::bonus::domain::{
    LocationEntry, MeasurementSource, MeasurementStatus, NewDepartment, NewKpiDefinition,
};
use crate::bonus::evaluation::{ThresholdDraft, ThresholdOperator};
use crate::bonus::passes::SummarySource;
use crate::bonus::repository::{EvaluationStore, RepositoryError};
use crate::bonus::service::BonusServiceError;

#[test]
fn recorded_value_reads_back_before_any_evaluation() {
    let fixture = Fixture::new();
    let stored = fixture
        .service
        .record_location_measurement(
            LocationEntry {
                month: month(),
                location_id: fixture.mercury,
                kpi_id: fixture.audit,
                value: 82.5,
                note: Some("kitchen audit".to_string()),
            },
            MeasurementSource::Manual,
        )
        .expect("recorded");
    assert_eq!(stored.status, MeasurementStatus::Active);

    let rows = fixture
        .service
        .location_measurements(month(), Some(fixture.mercury))
        .expect("measurements");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, 82.5);
    assert_eq!(rows[0].note.as_deref(), Some("kitchen audit"));
    assert_eq!(rows[0].source, MeasurementSource::Manual);

    let evaluations = fixture.service.evaluations(month(), None).expect("evaluations");
    assert!(evaluations.is_empty());
}

#[test]
fn evaluation_pass_is_idempotent() {
    let fixture = Fixture::new();
    fixture.record(fixture.mercury, fixture.audit, 90.0);
    fixture.record(fixture.mercury, fixture.error_rate, 0.7);
    fixture.record(fixture.dvory, fixture.audit, 80.0);

    let first = fixture.service.evaluate_month(month(), None).expect("first pass");
    let rows_after_first = fixture.service.evaluations(month(), None).expect("rows");
    let second = fixture.service.evaluate_month(month(), None).expect("second pass");
    let rows_after_second = fixture.service.evaluations(month(), None).expect("rows");

    assert_eq!(first, second);
    assert_eq!(first.evaluated, 3);
    assert_eq!(first.met, 2);
    assert_eq!(rows_after_first, rows_after_second);
    assert_eq!(rows_after_second.len(), 3);

    let mercury_audit = rows_after_second
        .iter()
        .find(|row| row.location_id == fixture.mercury && row.kpi_id == fixture.audit)
        .expect("mercury audit row");
    assert!(mercury_audit.met);
    assert_eq!(mercury_audit.bonus, 30.0);
}

#[test]
fn evaluation_pass_without_measurements_is_a_no_op() {
    let fixture = Fixture::new();
    let run = fixture.service.evaluate_month(month(), None).expect("pass");
    assert_eq!(run.evaluated, 0);
    assert!(fixture.service.evaluations(month(), None).expect("rows").is_empty());
}

#[test]
fn evaluation_pass_can_target_one_location() {
    let fixture = Fixture::new();
    fixture.record(fixture.mercury, fixture.audit, 90.0);
    fixture.record(fixture.dvory, fixture.audit, 80.0);

    let run = fixture
        .service
        .evaluate_month(month(), Some(fixture.dvory))
        .expect("pass");
    assert_eq!(run.evaluated, 1);

    let rows = fixture.service.evaluations(month(), None).expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].location_id, fixture.dvory);
    assert_eq!(rows[0].bonus, 15.0);
}

#[test]
fn rule_changes_apply_only_after_rerun() {
    let fixture = Fixture::new();
    fixture.record(fixture.mercury, fixture.audit, 90.0);
    fixture.service.evaluate_month(month(), None).expect("pass");

    let top = fixture.service.thresholds(fixture.audit).expect("rules")[0].clone();
    fixture
        .service
        .update_threshold(
            top.id,
            ThresholdDraft::new(ThresholdOperator::AtLeast, 40.0)
                .lower(85.0)
                .order(top.order),
        )
        .expect("update");

    let stale = fixture.service.evaluations(month(), None).expect("rows");
    assert_eq!(stale[0].bonus, 30.0);

    fixture.service.evaluate_month(month(), None).expect("rerun");
    let fresh = fixture.service.evaluations(month(), None).expect("rows");
    assert_eq!(fresh[0].bonus, 40.0);
}

#[test]
fn average_mode_divides_by_location_count() {
    let fixture = Fixture::new();
    let mystery = fixture
        .service
        .add_kpi(NewKpiDefinition {
            name: "Mystery shop".to_string(),
            ..NewKpiDefinition::default()
        })
        .expect("kpi");
    fixture
        .service
        .add_threshold(
            mystery.id,
            ThresholdDraft::new(ThresholdOperator::AtLeast, 60.0).lower(90.0),
        )
        .expect("rule");
    fixture
        .service
        .add_threshold(
            mystery.id,
            ThresholdDraft::new(ThresholdOperator::AtLeast, 40.0).lower(80.0),
        )
        .expect("rule");

    fixture.record(fixture.mercury, mystery.id, 85.0);
    fixture.record(fixture.dvory, mystery.id, 95.0);

    let run = fixture.service.recalculate(month()).expect("recalculate");
    let bouda = run
        .summary
        .written
        .iter()
        .find(|entry| entry.summary.department_id == fixture.bouda)
        .expect("bouda summary");
    assert_eq!(bouda.source, SummarySource::LocationAverage);
    assert_eq!(bouda.summary.aggregate_bonus, 50.0);
    assert_eq!(bouda.summary.active_kpis, 2);
    assert_eq!(bouda.summary.met_kpis, 2);
}

#[test]
fn average_mode_counts_locations_that_earned_nothing() {
    let fixture = Fixture::new();
    fixture.record(fixture.mercury, fixture.audit, 90.0);
    fixture.record(fixture.dvory, fixture.audit, 60.0);

    let run = fixture.service.recalculate(month()).expect("recalculate");
    let bouda = run
        .summary
        .written
        .iter()
        .find(|entry| entry.summary.department_id == fixture.bouda)
        .expect("bouda summary");
    assert_eq!(bouda.summary.aggregate_bonus, 15.0);
    assert_eq!(bouda.summary.active_kpis, 2);
    assert_eq!(bouda.summary.met_kpis, 1);
}

#[test]
fn own_kpi_mode_sums_department_values() {
    let fixture = Fixture::new();
    fixture.record_department(fixture.kitchen, fixture.audit, 90.0);

    let run = fixture.service.summarize_month(month()).expect("summary pass");
    let kitchen = run
        .written
        .iter()
        .find(|entry| entry.summary.department_id == fixture.kitchen)
        .expect("kitchen summary");
    assert_eq!(kitchen.source, SummarySource::OwnKpi);
    assert_eq!(kitchen.summary.aggregate_bonus, 30.0);
    assert_eq!(kitchen.summary.active_kpis, 1);
    assert_eq!(kitchen.summary.met_kpis, 1);
}

#[test]
fn own_kpi_department_without_data_is_skipped() {
    let fixture = Fixture::new();
    let run = fixture.service.summarize_month(month()).expect("summary pass");

    assert_eq!(run.skipped, vec![fixture.kitchen]);
    let kitchen_rows = fixture
        .service
        .summaries(Some(month()), Some(fixture.kitchen))
        .expect("summaries");
    assert!(kitchen_rows.is_empty());

    let bouda_rows = fixture
        .service
        .summaries(Some(month()), Some(fixture.bouda))
        .expect("summaries");
    assert_eq!(bouda_rows.len(), 1);
    assert_eq!(bouda_rows[0].aggregate_bonus, 0.0);
}

#[test]
fn department_without_locations_still_gets_a_zero_row() {
    let fixture = Fixture::new();
    let empty = fixture
        .service
        .add_department(NewDepartment {
            name: "Catering".to_string(),
            ..NewDepartment::default()
        })
        .expect("department");

    fixture.service.summarize_month(month()).expect("summary pass");
    let rows = fixture
        .service
        .summaries(Some(month()), Some(empty.id))
        .expect("summaries");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].aggregate_bonus, 0.0);
    assert_eq!(rows[0].active_kpis, 0);
    assert_eq!(rows[0].met_kpis, 0);
}

#[test]
fn deactivating_a_kpi_keeps_its_evaluations() {
    let fixture = Fixture::new();
    fixture.record(fixture.mercury, fixture.audit, 90.0);
    fixture.service.evaluate_month(month(), None).expect("pass");

    fixture.service.delete_kpi(fixture.audit).expect("soft delete");

    let rows = fixture.store.evaluations(month(), None).expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kpi_id, fixture.audit);
    assert_eq!(rows[0].bonus, 30.0);
}

#[test]
fn withdrawing_a_month_hides_values_and_drops_evaluations() {
    let fixture = Fixture::new();
    fixture.record(fixture.mercury, fixture.audit, 90.0);
    fixture.record(fixture.mercury, fixture.error_rate, 0.2);
    fixture.record(fixture.dvory, fixture.audit, 90.0);
    fixture.service.evaluate_month(month(), None).expect("pass");

    let withdrawal = fixture
        .service
        .withdraw_location_month(month(), fixture.mercury)
        .expect("withdraw");
    assert_eq!(withdrawal.measurements, 2);
    assert_eq!(withdrawal.evaluations, 2);

    assert!(fixture
        .service
        .location_measurements(month(), Some(fixture.mercury))
        .expect("measurements")
        .is_empty());
    let remaining = fixture.service.evaluations(month(), None).expect("rows");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].location_id, fixture.dvory);

    fixture.record(fixture.mercury, fixture.audit, 70.0);
    let restored = fixture
        .service
        .location_measurements(month(), Some(fixture.mercury))
        .expect("measurements");
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].value, 70.0);
}

#[test]
fn persistence_failure_aborts_the_pass() {
    let (service, store, location_id, kpi_id) = flaky_service();
    service
        .record_location_measurement(
            LocationEntry {
                month: month(),
                location_id,
                kpi_id,
                value: 90.0,
                note: None,
            },
            MeasurementSource::Manual,
        )
        .expect("recorded");

    store.fail_writes();
    let err = service
        .evaluate_month(month(), None)
        .expect_err("write failure surfaces");
    assert!(matches!(
        err,
        BonusServiceError::Repository(RepositoryError::Unavailable(_))
    ));
    assert!(store.inner.evaluations(month(), None).expect("rows").is_empty());
}
