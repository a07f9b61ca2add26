use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const FILE_PREFIX: &str = "attendance_";
const FILE_SUFFIX: &str = ".json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    /// Only the exact string `"present"` marks a student present.
    pub fn from_form_value(v: Option<&str>) -> Status {
        match v {
            Some("present") => Status::Present,
            _ => Status::Absent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub student_id: String,
    pub status: Status,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("attendance for {0} has already been taken")]
    AlreadyTaken(NaiveDate),
    #[error("no attendance snapshot for {0}")]
    NotFound(NaiveDate),
    #[error("snapshot (de)serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("snapshot storage unavailable: {0}")]
    Io(#[from] std::io::Error),
}

pub fn file_name(date: NaiveDate) -> String {
    format!("{}{}{}", FILE_PREFIX, date.format("%Y-%m-%d"), FILE_SUFFIX)
}

fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

/// One entry per student, in roster order. Students absent from `statuses`
/// are recorded as absent.
pub fn build_entries<'a, I>(
    student_ids: I,
    statuses: &HashMap<String, String>,
) -> Vec<SnapshotEntry>
where
    I: IntoIterator<Item = &'a str>,
{
    student_ids
        .into_iter()
        .map(|id| SnapshotEntry {
            student_id: id.to_string(),
            status: Status::from_form_value(statuses.get(id).map(|s| s.as_str())),
        })
        .collect()
}

/// Writes the snapshot for `date`. At most one snapshot per day: the content
/// is synced to a temp file first and published with a hard link, which
/// fails if the day's file already exists. A failed write leaves nothing
/// behind under the final name.
pub fn write_snapshot(
    dir: &Path,
    date: NaiveDate,
    entries: &[SnapshotEntry],
) -> Result<PathBuf, SnapshotError> {
    let encoded = serde_json::to_vec_pretty(entries)?;
    publish(dir, date, |file| file.write_all(&encoded))
}

fn publish<F>(dir: &Path, date: NaiveDate, fill: F) -> Result<PathBuf, SnapshotError>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let path = dir.join(file_name(date));
    if path.exists() {
        return Err(SnapshotError::AlreadyTaken(date));
    }
    let tmp = dir.join(format!(".{}.{}.tmp", file_name(date), Uuid::new_v4()));
    let result = write_temp(&tmp, fill).and_then(|()| link_new(&tmp, &path, date));
    match std::fs::remove_file(&tmp) {
        Err(e) if e.kind() != ErrorKind::NotFound => {
            tracing::warn!(path = %tmp.display(), error = %e, "snapshot temp file not removed");
        }
        _ => {}
    }
    result.map(|()| path)
}

fn write_temp<F>(tmp: &Path, fill: F) -> Result<(), SnapshotError>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let mut file = OpenOptions::new().write(true).create_new(true).open(tmp)?;
    fill(&mut file)?;
    file.sync_all()?;
    Ok(())
}

fn link_new(tmp: &Path, path: &Path, date: NaiveDate) -> Result<(), SnapshotError> {
    match std::fs::hard_link(tmp, path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(SnapshotError::AlreadyTaken(date)),
        Err(e) => Err(e.into()),
    }
}

pub fn read_snapshot(dir: &Path, date: NaiveDate) -> Result<Vec<SnapshotEntry>, SnapshotError> {
    let path = dir.join(file_name(date));
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(SnapshotError::NotFound(date)),
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

pub fn list_snapshot_dates(dir: &Path) -> Result<Vec<NaiveDate>, SnapshotError> {
    let mut dates = Vec::new();
    for ent in std::fs::read_dir(dir)? {
        let ent = ent?;
        if !ent.file_type()?.is_file() {
            continue;
        }
        let name = ent.file_name();
        if let Some(d) = name.to_str().and_then(date_from_file_name) {
            dates.push(d);
        }
    }
    dates.sort();
    Ok(dates)
}
