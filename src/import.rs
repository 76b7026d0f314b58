use crate::codelists::PROGRAMS;
use crate::datasets::DatasetLayout;
use crate::store::{DimensionalStore, StoreError};
use crate::types::{DataPoint, DeleteScope, TimeWindow, UNASSIGNED_CODE};
use chrono::{Duration, LocalResult, NaiveDate, TimeZone};
use chrono_tz::Tz;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Dataset '{0}' not known")]
    UnknownDataset(String),
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid import window for {0}")]
    Window(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of parsing one file, before anything is sent to the store.
#[derive(Debug, Default)]
pub struct ParsedBatch {
    /// Data rows read, header excluded.
    pub rows: usize,
    /// Rows skipped for a wrong column count, bad encoding or bad date.
    pub malformed: usize,
    /// Well-formed rows discarded by the value encoding.
    pub discarded: usize,
    pub points: Vec<DataPoint>,
}

impl ParsedBatch {
    /// Rows that passed the structural checks.
    pub fn candidates(&self) -> usize {
        self.rows - self.malformed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub rows: usize,
    pub malformed: usize,
    pub discarded: usize,
    pub outside_window: usize,
    pub posted: usize,
}

/// Epoch millis of local midnight of `date`. A midnight skipped by a DST
/// change resolves to the first instant after the gap.
pub fn local_midnight_millis(date: NaiveDate, tz: Tz) -> Option<i64> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    let resolved = match tz.from_local_datetime(&midnight) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest()?,
    };
    Some(resolved.timestamp_millis())
}

pub fn window_for(layout: &DatasetLayout, tz: Tz) -> Result<TimeWindow, ImportError> {
    let ((sy, sm, sd), (ey, em, ed)) = layout.window;
    let bound = |y, m, d| {
        NaiveDate::from_ymd_opt(y, m, d).and_then(|date| local_midnight_millis(date, tz))
    };
    match (bound(sy, sm, sd), bound(ey, em, ed)) {
        (Some(start), Some(end)) if start < end => Ok(TimeWindow { start, end }),
        _ => Err(ImportError::Window(layout.key.to_string())),
    }
}

/// Parses every data row of `reader` according to `layout`. Malformed rows
/// are logged and skipped; a read failure aborts the whole batch.
pub fn parse_rows<R: Read>(
    layout: &DatasetLayout,
    reader: R,
    tz: Tz,
) -> Result<ParsedBatch, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(reader);

    let mut batch = ParsedBatch::default();
    for result in rdr.records() {
        batch.rows += 1;
        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e),
            Err(e) => {
                warn!("[{}] row {}: unreadable: {}", layout.key, batch.rows, e);
                batch.malformed += 1;
                continue;
            }
        };
        let line = record.position().map_or(0, |p| p.line());

        if record.len() != layout.columns {
            warn!(
                "[{}] line {}: expected {} columns, found {}",
                layout.key,
                line,
                layout.columns,
                record.len()
            );
            batch.malformed += 1;
            continue;
        }

        let raw_date = cell(&record, layout.date_column);
        let Some(time) = NaiveDate::parse_from_str(raw_date, layout.date_format)
            .ok()
            .and_then(|d| local_midnight_millis(d, tz))
        else {
            warn!("[{}] line {}: invalid date '{}'", layout.key, line, raw_date);
            batch.malformed += 1;
            continue;
        };

        match row_points(layout, &record, time) {
            Some(points) => batch.points.extend(points),
            None => {
                debug!("[{}] line {}: discarded by value encoding", layout.key, line);
                batch.discarded += 1;
            }
        }
    }
    Ok(batch)
}

fn cell(record: &StringRecord, column: usize) -> &str {
    record.get(column).unwrap_or("")
}

/// Points of one well-formed row; `None` when the encoding discards the row.
fn row_points(layout: &DatasetLayout, record: &StringRecord, time: i64) -> Option<Vec<DataPoint>> {
    let station = match cell(record, layout.station_column) {
        "" => UNASSIGNED_CODE,
        code => code,
    };
    let program = PROGRAMS.resolve(cell(record, layout.program_column));

    let mut base = BTreeMap::new();
    base.insert("estacion".to_string(), station.to_string());
    base.insert("programa".to_string(), program.to_string());
    for c in layout.classifier_columns {
        base.insert(c.field.to_string(), c.list.resolve(cell(record, c.column)).to_string());
    }

    let mut points = Vec::with_capacity(layout.value_columns.len());
    for vc in layout.value_columns {
        let Some(value) = layout.encoding.decode(cell(record, vc.column)) else {
            if layout.encoding.discards_row() {
                return None;
            }
            continue;
        };
        let mut classifier_values = base.clone();
        if let (Some(classifier), Some(code)) = (&layout.value_classifier, vc.code) {
            classifier_values.insert(classifier.field.to_string(), code.to_string());
        }
        points.push(DataPoint {
            variable_code: layout.variable.code.to_string(),
            time,
            value,
            classifier_values,
        });
    }
    Some(points)
}

/// Replaces the layout's window in the store with the contents of `path`.
pub async fn import_file(
    store: &dyn DimensionalStore,
    layout: &DatasetLayout,
    path: &Path,
    tz: Tz,
) -> Result<ImportSummary, ImportError> {
    info!("[{}] importing {:?}", layout.key, path);
    let file = File::open(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    import_reader(store, layout, file, path, tz).await
}

/// Same as `import_file` over an already opened source; `path` only labels
/// errors.
pub async fn import_reader<R: Read + Send>(
    store: &dyn DimensionalStore,
    layout: &DatasetLayout,
    reader: R,
    path: &Path,
    tz: Tz,
) -> Result<ImportSummary, ImportError> {
    // 1. Parse; nothing reaches the store unless the whole source was read
    let batch = parse_rows(layout, reader, tz).map_err(|e| ImportError::Io {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    let window = window_for(layout, tz)?;

    // 2. Clear the window
    info!("[{}] deleting previous period", layout.key);
    store
        .delete_period(layout.variable.code, window, DeleteScope::VARIABLE_DATA)
        .await?;

    let mut summary = ImportSummary {
        rows: batch.rows,
        malformed: batch.malformed,
        discarded: batch.discarded,
        outside_window: 0,
        posted: 0,
    };
    // 3. Post one point at a time
    for point in &batch.points {
        if !window.contains(point.time) {
            warn!("[{}] point at {} outside import window", layout.key, point.time);
            summary.outside_window += 1;
            continue;
        }
        store.post_data(point).await?;
        summary.posted += 1;
    }

    info!(
        "[{}] {} rows, {} malformed, {} discarded, {} points posted",
        layout.key, summary.rows, summary.malformed, summary.discarded, summary.posted
    );
    Ok(summary)
}

/// Imports the dataset `key` from `<csv_dir>/<file_name>`.
pub async fn import_dataset(
    store: &dyn DimensionalStore,
    key: &str,
    csv_dir: &Path,
    tz: Tz,
) -> Result<ImportSummary, ImportError> {
    let layout = crate::datasets::find(key).ok_or_else(|| ImportError::UnknownDataset(key.to_string()))?;
    import_file(store, layout, &csv_dir.join(layout.file_name), tz).await
}
