use super::common::*;
use crate::bonus::domain::{LocationEntry, MeasurementSource};
use crate::bonus::import::{import_template, ImportError};
use crate::bonus::repository::RepositoryError;

#[test]
fn imports_rows_and_collects_row_errors() {
    let fixture = Fixture::new();
    let csv = "\
Month (YYYY-MM),Location,KPI name,Value,Note
2025-11,Mercury,Audit,88,Good audit
2025-11,  mercury ,ORDER ERROR RATE,0.3,
2025-11,Atlantis,Audit,70,
2025-11,OC4Dvory,Revenue,1300,
2025-13,OC4Dvory,Audit,70,
2025-11,OC4Dvory,Audit,abc,
2025-11,OC4Dvory,Audit,79.5,rechecked
";

    let report = fixture.service.import_csv(csv.as_bytes()).expect("import");
    assert_eq!(report.imported, 3);
    let rows: Vec<usize> = report.errors.iter().map(|err| err.row).collect();
    assert_eq!(rows, vec![4, 5, 6, 7]);
    assert!(report.errors[0].message.contains("Atlantis"));
    assert!(report.errors[1].message.contains("Revenue"));
    assert_eq!(report.errors[0].to_string(), "row 4: location 'Atlantis' not found");

    let stored = fixture
        .service
        .location_measurements(month(), Some(fixture.mercury))
        .expect("measurements");
    assert_eq!(stored.len(), 2);
    assert!(stored
        .iter()
        .all(|row| row.source == MeasurementSource::Import));
    let error_rate = stored
        .iter()
        .find(|row| row.kpi_id == fixture.error_rate)
        .expect("error rate row");
    assert!(error_rate.note.is_none());
}

#[test]
fn signed_years_are_row_errors() {
    let fixture = Fixture::new();
    let csv = "\
Month (YYYY-MM),Location,KPI name,Value,Note
-202-11,Mercury,Audit,88,
+202-11,Mercury,Audit,88,
2025-11,Mercury,Audit,88,
";

    let report = fixture.service.import_csv(csv.as_bytes()).expect("import");
    assert_eq!(report.imported, 1);
    let rows: Vec<usize> = report.errors.iter().map(|err| err.row).collect();
    assert_eq!(rows, vec![2, 3]);
    assert!(report.errors[0].message.contains("YYYY-MM"));
    assert_eq!(
        fixture.service.months_with_data().expect("months"),
        vec![month()]
    );
}

#[test]
fn imported_rows_evaluate_like_manual_entries() {
    let fixture = Fixture::new();
    fixture
        .service
        .import_csv("Month,Location,KPI,Value,Note\n2025-11,OC4Dvory,Audit,80,\n".as_bytes())
        .expect("import");
    fixture
        .service
        .record_location_measurement(
            LocationEntry {
                month: month(),
                location_id: fixture.mercury,
                kpi_id: fixture.audit,
                value: 80.0,
                note: None,
            },
            MeasurementSource::Manual,
        )
        .expect("manual entry");

    fixture.service.evaluate_month(month(), None).expect("pass");
    let bonuses: Vec<f64> = fixture
        .service
        .evaluations(month(), None)
        .expect("rows")
        .iter()
        .map(|row| row.bonus)
        .collect();
    assert_eq!(bonuses, vec![15.0, 15.0]);
}

#[test]
fn reimport_overwrites_instead_of_duplicating() {
    let fixture = Fixture::new();
    let header = "Month (YYYY-MM),Location,KPI name,Value,Note\n";
    let first = format!("{header}2025-11,Mercury,Audit,70,\n");
    let second = format!("{header}2025-11,Mercury,Audit,91,corrected\n");
    fixture.service.import_csv(first.as_bytes()).expect("first");
    fixture.service.import_csv(second.as_bytes()).expect("second");

    let stored = fixture
        .service
        .location_measurements(month(), Some(fixture.mercury))
        .expect("measurements");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].value, 91.0);
    assert_eq!(stored[0].note.as_deref(), Some("corrected"));
}

#[test]
fn short_rows_become_row_errors() {
    let fixture = Fixture::new();
    let csv = "Month (YYYY-MM),Location,KPI name,Value,Note\n2025-11,Mercury\n2025-11,Mercury,Audit,90,\n";
    let report = fixture.service.import_csv(csv.as_bytes()).expect("import");
    assert_eq!(report.imported, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].row, 2);
}

#[test]
fn missing_columns_reject_the_file() {
    let fixture = Fixture::new();
    let err = fixture
        .service
        .import_csv("Month,Location,Note\n2025-11,Mercury,\n".as_bytes())
        .expect_err("missing columns");
    match err {
        ImportError::MissingColumns(columns) => {
            assert_eq!(columns, vec!["KPI name", "Value"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn persistence_failure_aborts_the_import() {
    let (service, store, _, _) = flaky_service();
    store.fail_writes();

    let err = service
        .import_csv("Month,Location,KPI,Value,Note\n2025-11,Mercury,Audit,90,\n".as_bytes())
        .expect_err("store offline");
    assert!(matches!(
        err,
        ImportError::Repository(RepositoryError::Unavailable(_))
    ));
}

#[test]
fn template_round_trips_through_the_importer() {
    let template = import_template().expect("template");
    let mut lines = template.lines();
    assert_eq!(
        lines.next(),
        Some("Month (YYYY-MM),Location,KPI name,Value,Note")
    );
    assert_eq!(lines.count(), 6);

    let fixture = Fixture::new();
    let report = fixture.service.import_csv(template.as_bytes()).expect("import");
    // Fixture knows Mercury, OC4Dvory, Audit and Order error rate only.
    assert_eq!(report.imported, 3);
    assert_eq!(report.errors.len(), 3);
}
