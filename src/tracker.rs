//! In-memory attendance tracker.
//!
//! Holds the tracked rows and their session marks. Scoring goes through
//! `calc`; the UI reads rows back and watches `revision` for changes.

use crate::calc::{self, AggregateReport, AttendanceRecord, Classification, SESSION_COUNT};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerForm {
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

struct FieldRule {
    field: &'static str,
    pattern: &'static str,
    message: &'static str,
}

const FIELD_RULES: [FieldRule; 4] = [
    FieldRule {
        field: "studentId",
        pattern: r"^[0-9]{8,}$",
        message: "Student ID must contain at least 8 numbers",
    },
    FieldRule {
        field: "lastName",
        pattern: r"^[A-Za-zÀ-ÿ\s-]{2,}$",
        message: "Last name must be 2+ characters (letters, spaces, or hyphens)",
    },
    FieldRule {
        field: "firstName",
        pattern: r"^[A-Za-zÀ-ÿ\s-]{2,}$",
        message: "First name must be 2+ characters (letters, spaces, or hyphens)",
    },
    FieldRule {
        field: "email",
        pattern: r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$",
        message: "Please enter a valid email address (ex: user@domain.com)",
    },
];

fn field_patterns() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        FIELD_RULES
            .iter()
            .map(|r| Regex::new(r.pattern).expect("tracker field pattern"))
            .collect()
    })
}

impl TrackerForm {
    fn trimmed(&self) -> TrackerForm {
        TrackerForm {
            student_id: self.student_id.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            first_name: self.first_name.trim().to_string(),
            email: self.email.trim().to_string(),
        }
    }

    fn values(&self) -> [&str; 4] {
        [
            self.student_id.as_str(),
            self.last_name.as_str(),
            self.first_name.as_str(),
            self.email.as_str(),
        ]
    }

    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        for ((rule, re), value) in FIELD_RULES
            .iter()
            .zip(field_patterns())
            .zip(self.values())
        {
            let value = value.trim();
            if value.is_empty() {
                errors.push(FieldError {
                    field: rule.field,
                    message: "This field is required",
                });
            } else if !re.is_match(value) {
                errors.push(FieldError {
                    field: rule.field,
                    message: rule.message,
                });
            }
        }
        errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkField {
    Present,
    Participated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Absences,
    Participation,
}

impl SortBy {
    pub fn status_line(self) -> &'static str {
        match self {
            SortBy::Absences => "Currently sorted by absences (ascending)",
            SortBy::Participation => "Currently sorted by participation (descending)",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("invalid student")]
    Validation(Vec<FieldError>),
    #[error("student {0} is already tracked")]
    Duplicate(String),
    #[error("student {0} is not tracked")]
    NotFound(String),
    #[error("session must be between 1 and {max}, got {got}")]
    SessionOutOfRange { got: usize, max: usize },
}

#[derive(Debug, Clone)]
pub struct TrackerRow {
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub record: AttendanceRecord,
    pub visible: bool,
}

impl TrackerRow {
    pub fn student_id(&self) -> &str {
        &self.record.student_id
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    fn matches(&self, needle: &str) -> bool {
        self.last_name.to_lowercase().contains(needle)
            || self.first_name.to_lowercase().contains(needle)
    }
}

/// Row as handed to the rendering layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub student_id: String,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub sessions: Vec<calc::SessionMark>,
    pub visible: bool,
    pub excellent: bool,
    #[serde(flatten)]
    pub classification: Classification,
}

#[derive(Debug, Default)]
pub struct Tracker {
    rows: Vec<TrackerRow>,
    sorted_by: Option<SortBy>,
    revision: u64,
}

impl Tracker {
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn sort_status(&self) -> Option<&'static str> {
        self.sorted_by.map(SortBy::status_line)
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn position(&self, student_id: &str) -> Result<usize, TrackerError> {
        self.rows
            .iter()
            .position(|r| r.student_id() == student_id)
            .ok_or_else(|| TrackerError::NotFound(student_id.to_string()))
    }

    pub fn add_student(&mut self, form: &TrackerForm) -> Result<&TrackerRow, TrackerError> {
        let form = form.trimmed();
        let errors = form.validate();
        if !errors.is_empty() {
            return Err(TrackerError::Validation(errors));
        }
        if self.position(&form.student_id).is_ok() {
            return Err(TrackerError::Duplicate(form.student_id));
        }

        self.rows.push(TrackerRow {
            last_name: form.last_name,
            first_name: form.first_name,
            email: form.email,
            record: AttendanceRecord::new(form.student_id),
            visible: true,
        });
        self.touch();
        let idx = self.rows.len() - 1;
        Ok(&self.rows[idx])
    }

    /// `session` is 1-based, matching the column labels.
    pub fn set_mark(
        &mut self,
        student_id: &str,
        session: usize,
        field: MarkField,
        checked: bool,
    ) -> Result<&TrackerRow, TrackerError> {
        if session == 0 || session > SESSION_COUNT {
            return Err(TrackerError::SessionOutOfRange {
                got: session,
                max: SESSION_COUNT,
            });
        }
        let idx = self.position(student_id)?;
        let mark = &mut self.rows[idx].record.sessions[session - 1];
        match field {
            MarkField::Present => mark.present = checked,
            MarkField::Participated => mark.participated = checked,
        }
        self.touch();
        Ok(&self.rows[idx])
    }

    /// Shows rows whose last or first name contains `query`, ignoring case.
    /// A blank query shows everything. Returns the number of visible rows.
    pub fn search(&mut self, query: &str) -> usize {
        let needle = query.trim().to_lowercase();
        for row in &mut self.rows {
            row.visible = needle.is_empty() || row.matches(&needle);
        }
        self.touch();
        self.rows.iter().filter(|r| r.visible).count()
    }

    /// Re-orders only the visible rows. Hidden rows keep their relative order
    /// and end up ahead of the sorted ones.
    pub fn sort(&mut self, by: SortBy) {
        let (mut visible, hidden): (Vec<TrackerRow>, Vec<TrackerRow>) =
            std::mem::take(&mut self.rows)
                .into_iter()
                .partition(|r| r.visible);
        match by {
            SortBy::Absences => visible.sort_by_key(|r| r.record.absences()),
            SortBy::Participation => {
                visible.sort_by(|a, b| b.record.participations().cmp(&a.record.participations()))
            }
        }
        self.rows = hidden;
        self.rows.extend(visible);
        self.sorted_by = Some(by);
        self.touch();
    }

    pub fn order(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.student_id()).collect()
    }

    pub fn row(&self, student_id: &str) -> Result<&TrackerRow, TrackerError> {
        self.position(student_id).map(|i| &self.rows[i])
    }

    pub fn rows(&self) -> Vec<RowView> {
        self.rows.iter().map(row_view).collect()
    }

    /// Ids of rows that qualify for the excellence highlight.
    pub fn highlight(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| calc::is_excellent(&r.record))
            .map(|r| r.student_id())
            .collect()
    }

    pub fn report(&self) -> AggregateReport {
        calc::aggregate(self.rows.iter().map(|r| &r.record))
    }
}

pub fn row_view(row: &TrackerRow) -> RowView {
    // Rows are built with exactly SESSION_COUNT marks, so classify cannot fail.
    let classification = match calc::classify(&row.record.sessions) {
        Ok(c) => c,
        Err(e) => unreachable!("tracker row with malformed sessions: {e}"),
    };
    RowView {
        student_id: row.student_id().to_string(),
        last_name: row.last_name.clone(),
        first_name: row.first_name.clone(),
        email: row.email.clone(),
        sessions: row.record.sessions.clone(),
        visible: row.visible,
        excellent: calc::is_excellent(&row.record),
        classification,
    }
}
