use serde::{Deserialize, Deserializer};
use std::io::Read;

pub(crate) const MONTH_HEADER: &str = "Month (YYYY-MM)";
pub(crate) const LOCATION_HEADER: &str = "Location";
pub(crate) const KPI_HEADER: &str = "KPI name";
pub(crate) const VALUE_HEADER: &str = "Value";
pub(crate) const NOTE_HEADER: &str = "Note";

/// One data row as written in the file; nothing is resolved yet.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ImportRow {
    #[serde(rename = "Month (YYYY-MM)", alias = "Month", default)]
    pub(crate) month: String,
    #[serde(rename = "Location", default)]
    pub(crate) location: String,
    #[serde(rename = "KPI name", alias = "KPI", default)]
    pub(crate) kpi: String,
    #[serde(rename = "Value", default)]
    pub(crate) value: String,
    #[serde(rename = "Note", default, deserialize_with = "empty_string_as_none")]
    pub(crate) note: Option<String>,
}

/// A data row together with its 1-based line number; the header is row 1.
#[derive(Debug)]
pub(crate) struct ParsedRow {
    pub(crate) row: usize,
    pub(crate) content: Result<ImportRow, String>,
}

pub(crate) struct ParsedFile {
    pub(crate) missing_columns: Vec<&'static str>,
    pub(crate) rows: Vec<ParsedRow>,
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<ParsedFile, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let has = |names: &[&str]| {
        headers
            .iter()
            .any(|header| names.contains(&header.trim_start_matches('\u{feff}')))
    };
    let missing_columns = [
        (MONTH_HEADER, has(&[MONTH_HEADER, "Month"])),
        (LOCATION_HEADER, has(&[LOCATION_HEADER])),
        (KPI_HEADER, has(&[KPI_HEADER, "KPI"])),
        (VALUE_HEADER, has(&[VALUE_HEADER])),
    ]
    .into_iter()
    .filter_map(|(name, present)| (!present).then_some(name))
    .collect();

    let mut rows = Vec::new();
    for (idx, record) in csv_reader.deserialize::<ImportRow>().enumerate() {
        rows.push(ParsedRow {
            row: idx + 2,
            content: record.map_err(|err| err.to_string()),
        });
    }

    Ok(ParsedFile {
        missing_columns,
        rows,
    })
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
