use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use parking_lot::Mutex;

use crate::logic::features::{FeatureSchema, FlowRecord};
use crate::logic::model::Decision;
use super::METADATA_COLUMNS;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Header state of an existing log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HeaderCheck {
    /// Missing, empty or unreadable; a header will be written
    Absent,
    Matches,
    Differs(Vec<String>),
}

/// Append-only CSV sink for scored flows
pub struct DecisionLogger {
    path: PathBuf,
    columns: Vec<String>,
    /// Feature columns, in schema order
    feature_count: usize,
    /// Serializes appends; held for the whole open-write-close cycle
    lock: Mutex<()>,
    written: AtomicU64,
    failures: AtomicU64,
}

impl DecisionLogger {
    /// Prepare the log at `path` for `schema`.
    ///
    /// An existing file whose header no longer matches the schema is left
    /// untouched; decisions then go to a sibling file tagged with the layout
    /// hash.
    pub fn open(path: impl Into<PathBuf>, schema: &FeatureSchema) -> Self {
        let requested = path.into();

        let mut columns: Vec<String> = schema.names().to_vec();
        columns.extend(METADATA_COLUMNS.iter().map(|c| c.to_string()));

        if let Some(parent) = requested.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!("Failed to create decision log directory {}: {}", parent.display(), e);
            }
        }

        let path = match check_header(&requested, &columns) {
            HeaderCheck::Differs(_) => {
                let sibling = sibling_path(&requested, schema.layout_hash());
                tracing::warn!(
                    "Decision log {} has a different column set, writing to {}",
                    requested.display(),
                    sibling.display()
                );
                if let HeaderCheck::Differs(found) = check_header(&sibling, &columns) {
                    tracing::warn!(
                        "Decision log {} also has a different column set ({} columns, expected {}); rows will not line up with its header",
                        sibling.display(),
                        found.len(),
                        columns.len()
                    );
                }
                sibling
            }
            HeaderCheck::Absent | HeaderCheck::Matches => requested,
        };

        let logger = Self {
            path,
            columns,
            feature_count: schema.len(),
            lock: Mutex::new(()),
            written: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        };

        if let Err(e) = logger.ensure_header() {
            tracing::warn!("Could not initialize decision log {}: {}", logger.path.display(), e);
        }
        logger
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Append one decision. The file is opened and closed within the call.
    pub fn append(&self, record: &FlowRecord, decision: &Decision) -> io::Result<()> {
        let row = self.row(record, decision);

        let result = {
            let _guard = self.lock.lock();
            self.write_row(&row)
        };

        match &result {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Append and report failures through tracing instead of the caller
    pub fn log(&self, record: &FlowRecord, decision: &Decision) {
        if let Err(e) = self.append(record, decision) {
            tracing::error!("Decision log append to {} failed: {}", self.path.display(), e);
        }
    }

    fn ensure_header(&self) -> io::Result<()> {
        let _guard = self.lock.lock();
        self.write(None)
    }

    fn write_row(&self, row: &[String]) -> io::Result<()> {
        self.write(Some(row))
    }

    /// Open for append and write the header into an empty file, then the row
    fn write(&self, row: Option<&[String]>) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let empty = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if empty {
            writer.write_record(&self.columns)?;
        }
        if let Some(row) = row {
            writer.write_record(row)?;
        }
        writer.flush()
    }

    /// One value per column: feature text or an empty placeholder, then metadata
    fn row(&self, record: &FlowRecord, decision: &Decision) -> Vec<String> {
        let mut row: Vec<String> = self.columns[..self.feature_count]
            .iter()
            .map(|name| record.feature_text(name).unwrap_or_default().to_string())
            .collect();

        row.push(decision.label.to_string());
        row.push(decision.confidence.to_string());
        row.push(decision.rule.clone());
        row.push(format!("{:.2}", decision.latency_ms));
        row.push(Local::now().format(TIMESTAMP_FORMAT).to_string());
        row
    }
}

/// Compare the first record of an existing log against `columns`, field by field
pub(crate) fn check_header(path: &Path, columns: &[String]) -> HeaderCheck {
    let Ok(mut reader) = csv::ReaderBuilder::new().flexible(true).from_path(path) else {
        return HeaderCheck::Absent;
    };
    match reader.byte_headers() {
        Ok(found) if found.is_empty() => HeaderCheck::Absent,
        Ok(found) if found.iter().eq(columns.iter().map(String::as_bytes)) => HeaderCheck::Matches,
        Ok(found) => HeaderCheck::Differs(
            found.iter().map(|f| String::from_utf8_lossy(f).into_owned()).collect(),
        ),
        Err(e) => {
            tracing::warn!("Could not read decision log header {}: {}", path.display(), e);
            HeaderCheck::Absent
        }
    }
}

fn sibling_path(path: &Path, layout_hash: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("decisions");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("csv");
    path.with_file_name(format!("{}.{:08x}.{}", stem, layout_hash, ext))
}
