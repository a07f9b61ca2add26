use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, parse_params, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::tracker::{row_view, MarkField, SortBy, Tracker, TrackerForm};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetMarkParams {
    student_id: String,
    session: usize,
    field: MarkField,
    checked: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Deserialize)]
struct SortParams {
    by: SortBy,
}

fn tracker_add_student(
    tracker: &mut Tracker,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let form: TrackerForm = parse_params(params)?;
    let row = row_view(tracker.add_student(&form)?);
    Ok(json!({ "row": row, "revision": tracker.revision() }))
}

fn tracker_set_mark(
    tracker: &mut Tracker,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let p: SetMarkParams = parse_params(params)?;
    let row = row_view(tracker.set_mark(p.student_id.trim(), p.session, p.field, p.checked)?);
    Ok(json!({ "row": row, "revision": tracker.revision() }))
}

fn tracker_search(
    tracker: &mut Tracker,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let p: SearchParams = parse_params(params)?;
    let visible = tracker.search(&p.query);
    Ok(json!({ "visible": visible, "revision": tracker.revision() }))
}

fn tracker_sort(
    tracker: &mut Tracker,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let p: SortParams = parse_params(params)?;
    tracker.sort(p.by);
    Ok(json!({
        "order": tracker.order(),
        "status": p.by.status_line(),
        "revision": tracker.revision(),
    }))
}

fn tracker_rows(tracker: &Tracker) -> serde_json::Value {
    json!({
        "rows": tracker.rows(),
        "sortStatus": tracker.sort_status(),
        "revision": tracker.revision(),
    })
}

fn tracker_inspect(
    tracker: &Tracker,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let row = tracker.row(&student_id)?;
    Ok(json!({
        "studentId": row.student_id(),
        "displayName": row.display_name(),
        "absences": row.record.absences(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let tracker = &mut state.tracker;
    let result = match req.method.as_str() {
        "tracker.addStudent" => tracker_add_student(tracker, &req.params),
        "tracker.setMark" => tracker_set_mark(tracker, &req.params),
        "tracker.search" => tracker_search(tracker, &req.params),
        "tracker.sort" => tracker_sort(tracker, &req.params),
        "tracker.rows" => Ok(tracker_rows(tracker)),
        "tracker.highlight" => Ok(json!({ "studentIds": tracker.highlight() })),
        "tracker.report" => Ok(json!(tracker.report())),
        "tracker.inspect" => tracker_inspect(tracker, &req.params),
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
