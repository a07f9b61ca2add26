use chrono::{SecondsFormat, Utc};
use regex::Regex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

const FULL_NAME_MIN: usize = 3;
const FULL_NAME_MAX: usize = 100;
const MATRICULE_MAX: usize = 20;
const GROUP_MAX: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub full_name: String,
    pub matricule: String,
    pub group_id: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// Fields a roster form submits. Missing fields deserialize as empty and are
/// reported by `validate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub matricule: String,
    #[serde(default)]
    pub group_id: String,
}

impl StudentForm {
    pub fn trimmed(&self) -> StudentForm {
        StudentForm {
            full_name: self.full_name.trim().to_string(),
            matricule: self.matricule.trim().to_string(),
            group_id: self.group_id.trim().to_string(),
        }
    }

    /// All problems with the (already trimmed) form, in field order.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let name_len = self.full_name.chars().count();
        if name_len == 0 {
            errors.push("full name is required".to_string());
        } else if name_len < FULL_NAME_MIN {
            errors.push(format!(
                "full name must be at least {} characters",
                FULL_NAME_MIN
            ));
        } else if name_len > FULL_NAME_MAX {
            errors.push(format!(
                "full name must be at most {} characters",
                FULL_NAME_MAX
            ));
        }

        if self.matricule.is_empty() {
            errors.push("matricule is required".to_string());
        } else if !matricule_re().is_match(&self.matricule) {
            errors.push("matricule must contain at least 8 digits".to_string());
        } else if self.matricule.len() > MATRICULE_MAX {
            errors.push(format!(
                "matricule must be at most {} digits",
                MATRICULE_MAX
            ));
        }

        let group_len = self.group_id.chars().count();
        if group_len == 0 {
            errors.push("group is required".to_string());
        } else if group_len > GROUP_MAX {
            errors.push(format!("group must be at most {} characters", GROUP_MAX));
        }

        errors
    }
}

fn matricule_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{8,}$").expect("matricule pattern"))
}

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("invalid student: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("a student with matricule {0} already exists")]
    Duplicate(String),
    #[error("student not found")]
    NotFound,
    #[error("storage unavailable: {0}")]
    Storage(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    FullName,
    Matricule,
    GroupId,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: SortField,
    pub descending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder {
            field: SortField::CreatedAt,
            descending: true,
        }
    }
}

impl SortOrder {
    /// Parses `"<field>"` or `"<field> <asc|desc>"`. Anything outside the
    /// allowlist yields `None`.
    pub fn parse(raw: &str) -> Option<SortOrder> {
        let mut parts = raw.split_whitespace();
        let field = match parts.next()? {
            "id" => SortField::Id,
            "fullName" | "fullname" => SortField::FullName,
            "matricule" => SortField::Matricule,
            "groupId" | "group_id" => SortField::GroupId,
            "createdAt" | "created_at" => SortField::CreatedAt,
            _ => return None,
        };
        let descending = match parts.next().map(|s| s.to_ascii_lowercase()).as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(_) => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(SortOrder { field, descending })
    }

    fn sql(self) -> &'static str {
        match (self.field, self.descending) {
            (SortField::Id, false) => "id ASC",
            (SortField::Id, true) => "id DESC",
            (SortField::FullName, false) => "fullname ASC",
            (SortField::FullName, true) => "fullname DESC",
            (SortField::Matricule, false) => "matricule ASC",
            (SortField::Matricule, true) => "matricule DESC",
            (SortField::GroupId, false) => "group_id ASC",
            (SortField::GroupId, true) => "group_id DESC",
            (SortField::CreatedAt, false) => "created_at ASC, rowid ASC",
            (SortField::CreatedAt, true) => "created_at DESC, rowid DESC",
        }
    }
}

const STUDENT_COLUMNS: &str = "id, fullname, matricule, group_id, created_at, updated_at";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        full_name: r.get(1)?,
        matricule: r.get(2)?,
        group_id: r.get(3)?,
        created_at: r.get(4)?,
        updated_at: r.get(5)?,
    })
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation
    )
}

pub fn list_students(
    conn: &Connection,
    order: SortOrder,
    limit: Option<usize>,
) -> Result<Vec<Student>, RosterError> {
    // SQLite treats a negative LIMIT as no limit.
    let limit: i64 = limit
        .filter(|n| *n > 0)
        .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
        .unwrap_or(-1);
    let sql = format!(
        "SELECT {} FROM students ORDER BY {} LIMIT ?",
        STUDENT_COLUMNS,
        order.sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let students = stmt
        .query_map([limit], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(students)
}

pub fn get_student(conn: &Connection, id: &str) -> Result<Student, RosterError> {
    conn.query_row(
        &format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS),
        [id],
        student_from_row,
    )
    .optional()?
    .ok_or(RosterError::NotFound)
}

/// Validates and inserts in one statement; an existing matricule makes the
/// insert a no-op and is reported as `Duplicate`.
pub fn add_student(conn: &Connection, form: &StudentForm) -> Result<Student, RosterError> {
    let form = form.trimmed();
    let errors = form.validate();
    if !errors.is_empty() {
        return Err(RosterError::Validation(errors));
    }

    let id = Uuid::new_v4().to_string();
    let inserted = conn.execute(
        "INSERT INTO students(id, fullname, matricule, group_id, created_at)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(matricule) DO NOTHING",
        (
            &id,
            &form.full_name,
            &form.matricule,
            &form.group_id,
            now_rfc3339(),
        ),
    )?;
    if inserted == 0 {
        return Err(RosterError::Duplicate(form.matricule));
    }
    get_student(conn, &id)
}

pub fn update_student(
    conn: &Connection,
    id: &str,
    form: &StudentForm,
) -> Result<Student, RosterError> {
    let form = form.trimmed();
    let errors = form.validate();
    if !errors.is_empty() {
        return Err(RosterError::Validation(errors));
    }

    let changed = conn.execute(
        "UPDATE students
         SET fullname = ?, matricule = ?, group_id = ?, updated_at = ?
         WHERE id = ?",
        (
            &form.full_name,
            &form.matricule,
            &form.group_id,
            now_rfc3339(),
            id,
        ),
    );
    match changed {
        Ok(0) => Err(RosterError::NotFound),
        Ok(_) => get_student(conn, id),
        Err(e) if is_unique_violation(&e) => Err(RosterError::Duplicate(form.matricule)),
        Err(e) => Err(e.into()),
    }
}

pub fn delete_student(conn: &Connection, id: &str) -> Result<(), RosterError> {
    let changed = conn.execute("DELETE FROM students WHERE id = ?", [id])?;
    if changed == 0 {
        return Err(RosterError::NotFound);
    }
    Ok(())
}
