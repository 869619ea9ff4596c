use crate::error::{DashboardError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Cell texts that read as a missing value.
const NA_VALUES: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "<NA>",
    "#N/A", "#NA", "#N/A N/A", "1.#IND", "-1.#IND", "1.#QNAN", "-1.#QNAN",
];

const BOOL_LITERALS: &[&str] = &["True", "False", "true", "false", "TRUE", "FALSE"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Semantic kind of a column, derived from what its cells parse as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Boolean,
    Temporal,
    Empty,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Temporal => "temporal",
            ColumnKind::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: ColumnValues,
}

impl Column {
    fn from_cells(name: String, cells: Vec<Option<String>>) -> Self {
        let kind = infer_kind(&cells);
        let values = match kind {
            ColumnKind::Numeric => ColumnValues::Numeric(
                cells
                    .iter()
                    .map(|c| c.as_deref().and_then(parse_number))
                    .collect(),
            ),
            _ => ColumnValues::Text(cells),
        };
        Self { name, kind, values }
    }

    pub fn len(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn numbers(&self) -> Option<&[Option<f64>]> {
        match &self.values {
            ColumnValues::Numeric(v) => Some(v),
            ColumnValues::Text(_) => None,
        }
    }

    pub fn labels(&self) -> Option<&[Option<String>]> {
        match &self.values {
            ColumnValues::Text(v) => Some(v),
            ColumnValues::Numeric(_) => None,
        }
    }
}

/// An immutable table of named columns, loaded once per page view.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Parse delimited text. Blank lines are skipped, short rows are padded
    /// with missing cells, long rows are an error.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        if headers.is_empty() {
            return Err(DashboardError::EmptyDataset);
        }
        let names = normalize_headers(&headers);
        let width = names.len();

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
        let mut row_count = 0;

        for (row_idx, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() > width {
                return Err(DashboardError::RaggedRow {
                    row: row_idx + 2,
                    expected: width,
                    found: record.len(),
                });
            }
            for (col_idx, column) in cells.iter_mut().enumerate() {
                let cell = record.get(col_idx).and_then(|s| {
                    if NA_VALUES.contains(&s) {
                        None
                    } else {
                        Some(s.to_string())
                    }
                });
                column.push(cell);
            }
            row_count += 1;
        }

        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| Column::from_cells(name, cells))
            .collect();

        Ok(Self { columns, row_count })
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        Self::from_reader(text.as_bytes())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| DashboardError::UnknownColumn(name.to_string()))
    }

    /// Values of a numeric column
    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>]> {
        let column = self.column(name)?;
        match (column.kind, column.numbers()) {
            (ColumnKind::Numeric, Some(values)) => Ok(values),
            _ => Err(DashboardError::WrongColumnKind {
                column: name.to_string(),
                expected: "numeric",
            }),
        }
    }

    /// Labels of a categorical column
    pub fn categorical(&self, name: &str) -> Result<&[Option<String>]> {
        let column = self.column(name)?;
        match (column.kind, column.labels()) {
            (ColumnKind::Categorical, Some(values)) => Ok(values),
            _ => Err(DashboardError::WrongColumnKind {
                column: name.to_string(),
                expected: "categorical",
            }),
        }
    }

    pub fn classify(&self) -> Classification {
        let mut classification = Classification::default();
        for column in &self.columns {
            match column.kind {
                ColumnKind::Numeric => classification.numeric_columns.push(column.name.clone()),
                ColumnKind::Categorical => {
                    classification.categorical_columns.push(column.name.clone())
                }
                ColumnKind::Boolean | ColumnKind::Temporal | ColumnKind::Empty => {}
            }
        }
        classification
    }

    pub fn schema(&self) -> Schema {
        let classification = self.classify();
        Schema {
            rows: self.row_count,
            columns: self
                .columns
                .iter()
                .map(|c| ColumnSchema {
                    name: c.name.clone(),
                    kind: c.kind,
                })
                .collect(),
            numeric_columns: classification.numeric_columns,
            categorical_columns: classification.categorical_columns,
        }
    }
}

/// Column lists offered to the selectors of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
}

impl Classification {
    pub fn has_numeric(&self) -> bool {
        !self.numeric_columns.is_empty()
    }

    pub fn has_categorical(&self) -> bool {
        !self.categorical_columns.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub rows: usize,
    pub columns: Vec<ColumnSchema>,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
}

fn normalize_headers(raw: &csv::StringRecord) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(raw.len());
    let mut suffixes: HashMap<String, usize> = HashMap::new();

    for (idx, header) in raw.iter().enumerate() {
        let base = if header.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            header.to_string()
        };
        let mut name = base.clone();
        while names.contains(&name) {
            let n = suffixes.entry(base.clone()).or_insert(0);
            *n += 1;
            name = format!("{}.{}", base, n);
        }
        names.push(name);
    }
    names
}

fn parse_number(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(i as f64);
    }
    trimmed.parse::<f64>().ok()
}

fn is_temporal(cell: &str) -> bool {
    let trimmed = cell.trim();
    if NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok() {
        return true;
    }
    if DateTime::parse_from_rfc3339(trimmed).is_ok() {
        return true;
    }
    DATETIME_FORMATS
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).is_ok())
}

fn infer_kind(cells: &[Option<String>]) -> ColumnKind {
    let present: Vec<&str> = cells.iter().filter_map(|c| c.as_deref()).collect();

    if present.is_empty() {
        return ColumnKind::Empty;
    }
    if present.iter().all(|c| parse_number(c).is_some()) {
        return ColumnKind::Numeric;
    }
    // A boolean column with gaps falls back to text labels.
    if present.len() == cells.len() && present.iter().all(|c| BOOL_LITERALS.contains(c)) {
        return ColumnKind::Boolean;
    }
    if present.iter().all(|c| is_temporal(c)) {
        return ColumnKind::Temporal;
    }
    ColumnKind::Categorical
}
