use crate::calc::{self, AttendanceRecord, SessionMark};
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    bad_params, get_required_str, parse_params, require_db, require_workspace, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, SortField, SortOrder};
use crate::snapshot::{self, Status};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct ClassifyParams {
    sessions: Vec<SessionMark>,
}

#[derive(Debug, Deserialize)]
struct AggregateParams {
    records: Vec<AttendanceRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct TakeSnapshotParams {
    #[serde(default)]
    date: Option<String>,
    /// studentId -> "present" | "absent"
    #[serde(default)]
    statuses: HashMap<String, String>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| bad_params("date must be YYYY-MM-DD"))
}

fn attendance_classify(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let p: ClassifyParams = parse_params(params)?;
    let c = calc::classify(&p.sessions)?;
    Ok(json!(c))
}

fn attendance_aggregate(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let p: AggregateParams = parse_params(params)?;
    // Every record has to be well-formed, same as a single classify.
    let mut excellent = Vec::new();
    for r in &p.records {
        calc::classify(&r.sessions).map_err(|e| {
            HandlerErr::from(e).with_details(json!({ "studentId": r.student_id }))
        })?;
        if calc::is_excellent(r) {
            excellent.push(r.student_id.as_str());
        }
    }
    let report = calc::aggregate(&p.records);
    Ok(json!({
        "total": report.total,
        "presentAtLeastOnce": report.present_at_least_once,
        "participatedAtLeastOnce": report.participated_at_least_once,
        "excellent": excellent,
    }))
}

fn attendance_take_snapshot(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let dir = require_workspace(state)?;
    let p: TakeSnapshotParams = parse_params(params)?;
    let date = match p.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => Local::now().date_naive(),
    };

    let order = SortOrder {
        field: SortField::CreatedAt,
        descending: false,
    };
    let students = roster::list_students(conn, order, None)?;
    let entries = snapshot::build_entries(students.iter().map(|s| s.id.as_str()), &p.statuses);
    let path = snapshot::write_snapshot(dir, date, &entries)?;

    let present = entries.iter().filter(|e| e.status == Status::Present).count();
    tracing::info!(
        path = %path.display(),
        total = entries.len(),
        present,
        "attendance snapshot written"
    );
    Ok(json!({
        "date": date.format("%Y-%m-%d").to_string(),
        "fileName": snapshot::file_name(date),
        "total": entries.len(),
        "present": present,
        "absent": entries.len() - present,
    }))
}

fn attendance_get_snapshot(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let dir = require_workspace(state)?;
    let date = parse_date(&get_required_str(params, "date")?)?;
    let entries = snapshot::read_snapshot(dir, date)?;
    Ok(json!({
        "date": date.format("%Y-%m-%d").to_string(),
        "entries": entries,
    }))
}

fn attendance_list_snapshots(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let dir = require_workspace(state)?;
    let dates: Vec<String> = snapshot::list_snapshot_dates(dir)?
        .into_iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();
    Ok(json!({ "dates": dates }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.classify" => attendance_classify(&req.params),
        "attendance.aggregate" => attendance_aggregate(&req.params),
        "attendance.takeSnapshot" => attendance_take_snapshot(state, &req.params),
        "attendance.getSnapshot" => attendance_get_snapshot(state, &req.params),
        "attendance.listSnapshots" => attendance_list_snapshots(state),
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
