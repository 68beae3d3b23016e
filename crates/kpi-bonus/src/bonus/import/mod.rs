mod normalizer;
mod parser;
mod template;

pub use template::import_template;

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{KpiId, LocationEntry, LocationId, MeasurementSource, Month};
use super::repository::{BonusRepository, RepositoryError};
use super::service::{BonusService, BonusServiceError};
use normalizer::normalize_name;
use parser::ImportRow;

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingColumns(Vec<&'static str>),
    Repository(RepositoryError),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read import file: {}", err),
            ImportError::Csv(err) => write!(f, "invalid import CSV data: {}", err),
            ImportError::MissingColumns(columns) => {
                write!(f, "import file is missing column(s): {}", columns.join(", "))
            }
            ImportError::Repository(err) => write!(f, "could not store imported values: {}", err),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::MissingColumns(_) => None,
            ImportError::Repository(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}

/// Row-level problem; the rest of the batch is still processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRowError {
    pub row: usize,
    pub message: String,
}

impl fmt::Display for ImportRowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub errors: Vec<ImportRowError>,
}

/// Active locations and KPIs keyed by normalized name.
struct NameIndex {
    locations: HashMap<String, LocationId>,
    kpis: HashMap<String, KpiId>,
}

impl<R> BonusService<R>
where
    R: BonusRepository + 'static,
{
    pub fn import_csv_path<P: AsRef<Path>>(&self, path: P) -> Result<ImportReport, ImportError> {
        let file = std::fs::File::open(path)?;
        self.import_csv(file)
    }

    /// Upserts every resolvable row with source `IMPORT`.
    pub fn import_csv<Rd: Read>(&self, reader: Rd) -> Result<ImportReport, ImportError> {
        let parsed = parser::parse_rows(reader)?;
        if !parsed.missing_columns.is_empty() {
            return Err(ImportError::MissingColumns(parsed.missing_columns));
        }

        let index = self.name_index()?;
        let mut report = ImportReport::default();

        for parsed_row in parsed.rows {
            let row = parsed_row.row;
            let outcome = parsed_row
                .content
                .and_then(|content| resolve_row(&index, content));
            let entry = match outcome {
                Ok(entry) => entry,
                Err(message) => {
                    warn!(row, %message, "import row skipped");
                    report.errors.push(ImportRowError { row, message });
                    continue;
                }
            };

            match self.record_location_measurement(entry, MeasurementSource::Import) {
                Ok(_) => report.imported += 1,
                Err(BonusServiceError::Repository(err @ RepositoryError::Unavailable(_))) => {
                    return Err(ImportError::Repository(err));
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!(row, %message, "import row rejected");
                    report.errors.push(ImportRowError { row, message });
                }
            }
        }

        info!(
            imported = report.imported,
            errors = report.errors.len(),
            "CSV import finished"
        );
        Ok(report)
    }

    fn name_index(&self) -> Result<NameIndex, RepositoryError> {
        let repository = self.repository();
        let locations = repository
            .locations()?
            .into_iter()
            .filter(|location| location.active)
            .map(|location| (normalize_name(&location.name), location.id))
            .collect();
        let kpis = repository
            .kpis()?
            .into_iter()
            .filter(|kpi| kpi.active)
            .map(|kpi| (normalize_name(&kpi.name), kpi.id))
            .collect();
        Ok(NameIndex { locations, kpis })
    }
}

fn resolve_row(index: &NameIndex, row: ImportRow) -> Result<LocationEntry, String> {
    let month = row.month.parse::<Month>().map_err(|err| err.to_string())?;

    let location_id = *index
        .locations
        .get(&normalize_name(&row.location))
        .ok_or_else(|| format!("location '{}' not found", row.location))?;

    let kpi_id = *index
        .kpis
        .get(&normalize_name(&row.kpi))
        .ok_or_else(|| format!("KPI '{}' not found", row.kpi))?;

    let value = row
        .value
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("'{}' is not a valid number", row.value))?;

    Ok(LocationEntry {
        month,
        location_id,
        kpi_id,
        value,
        note: row.note,
    })
}
