use super::parser::{KPI_HEADER, LOCATION_HEADER, MONTH_HEADER, NOTE_HEADER, VALUE_HEADER};
use super::ImportError;

const SAMPLE_ROWS: [[&str; 5]; 6] = [
    ["2025-11", "Mercury", "Audit", "85.5", "Good audit"],
    ["2025-11", "Mercury", "Order error rate", "0.3", ""],
    ["2025-11", "OC4Dvory", "Audit", "78", "Needs improvement"],
    ["2025-11", "OC4Dvory", "Mystery shop", "88", ""],
    ["2025-11", "Bistro", "Audit", "92", ""],
    ["2025-11", "Bistro", "Delivery rating", "4.7", ""],
];

/// CSV header plus sample rows naming the reference locations and KPIs.
pub fn import_template() -> Result<String, ImportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([MONTH_HEADER, LOCATION_HEADER, KPI_HEADER, VALUE_HEADER, NOTE_HEADER])?;
    for row in SAMPLE_ROWS {
        writer.write_record(row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ImportError::Io(err.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
