use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, parse_params, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, SortOrder, StudentForm};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    #[serde(default)]
    sort: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    student_id: String,
    #[serde(flatten)]
    form: StudentForm,
}

fn students_list(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let p: ListParams = parse_params(params)?;
    // Unknown sort keys fall back to newest first rather than failing.
    let order = p
        .sort
        .as_deref()
        .and_then(SortOrder::parse)
        .unwrap_or_default();
    let students = roster::list_students(conn, order, p.limit)?;
    Ok(json!({
        "count": students.len(),
        "students": students,
    }))
}

fn students_get(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let student = roster::get_student(conn, &student_id)?;
    Ok(json!({ "student": student }))
}

fn students_create(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let form: StudentForm = parse_params(params)?;
    let student = roster::add_student(conn, &form)?;
    tracing::info!(
        student_id = %student.id,
        matricule = %student.matricule,
        "student created"
    );
    Ok(json!({ "student": student }))
}

fn students_update(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let p: UpdateParams = parse_params(params)?;
    let student = roster::update_student(conn, p.student_id.trim(), &p.form)?;
    tracing::info!(student_id = %student.id, "student updated");
    Ok(json!({ "student": student }))
}

fn students_delete(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let student_id = get_required_str(params, "studentId")?;
    roster::delete_student(conn, &student_id)?;
    tracing::info!(student_id = %student_id, "student deleted");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state, &req.params),
        "students.get" => students_get(state, &req.params),
        "students.create" => students_create(state, &req.params),
        "students.update" => students_update(state, &req.params),
        "students.delete" => students_delete(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => {
            tracing::debug!(method = %req.method, code = error.code, "request rejected");
            error.response(&req.id)
        }
    })
}
