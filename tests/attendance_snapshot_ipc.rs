use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rosterd");
    let mut child = Command::new(exe)
        .env_remove("ROSTERD_WORKSPACE")
        .env_remove("ROSTERD_LOG_FILE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rosterd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded",
        method
    );
    value.get("error").cloned().expect("error object")
}

fn str_field<'a>(v: &'a serde_json::Value, key: &str) -> &'a str {
    v.get(key).and_then(|x| x.as_str()).unwrap_or_default()
}

fn select_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> PathBuf {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    workspace
}

fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    name: &str,
    matricule: &str,
) -> String {
    let created = request_ok(
        stdin,
        reader,
        &format!("create-{}", matricule),
        "students.create",
        json!({ "fullName": name, "matricule": matricule, "groupId": "L3-INFO-A" }),
    );
    str_field(&created["student"], "id").to_string()
}

#[test]
fn snapshot_is_taken_once_per_day() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let workspace = select_workspace(&mut stdin, &mut reader, "rosterd-snapshot-once");
    let ada = create_student(&mut stdin, &mut reader, "Ada Lovelace", "20230001");
    let alan = create_student(&mut stdin, &mut reader, "Alan Turing", "20230002");
    let grace = create_student(&mut stdin, &mut reader, "Grace Hopper", "20230003");

    let taken = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.takeSnapshot",
        json!({
            "date": "2026-10-16",
            "statuses": { ada.clone(): "present", alan.clone(): "absent", grace.clone(): "PRESENT" }
        }),
    );
    assert_eq!(str_field(&taken, "fileName"), "attendance_2026-10-16.json");
    assert_eq!(taken.get("total").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(taken.get("present").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(taken.get("absent").and_then(|v| v.as_u64()), Some(2));
    let file = workspace.join("attendance_2026-10-16.json");
    let before = std::fs::read_to_string(&file).expect("snapshot file");

    let err = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.takeSnapshot",
        json!({ "date": "2026-10-16", "statuses": { alan.clone(): "present" } }),
    );
    assert_eq!(str_field(&err, "code"), "already_taken");
    assert_eq!(std::fs::read_to_string(&file).expect("snapshot file"), before);

    let got = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.getSnapshot",
        json!({ "date": "2026-10-16" }),
    );
    let entries = got["entries"].as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 3);
    let status_of = |id: &str| {
        entries
            .iter()
            .find(|e| str_field(e, "student_id") == id)
            .map(|e| str_field(e, "status").to_string())
    };
    assert_eq!(status_of(&ada).as_deref(), Some("present"));
    assert_eq!(status_of(&alan).as_deref(), Some("absent"));
    assert_eq!(status_of(&grace).as_deref(), Some("absent"));
}

#[test]
fn snapshots_are_listed_by_date() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, "rosterd-snapshot-list");
    let _ = create_student(&mut stdin, &mut reader, "Ada Lovelace", "20230001");

    for (i, date) in ["2026-10-14", "2026-10-02"].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("take-{}", i),
            "attendance.takeSnapshot",
            json!({ "date": date, "statuses": {} }),
        );
    }
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "list",
        "attendance.listSnapshots",
        json!({}),
    );
    let dates: Vec<&str> = listed["dates"]
        .as_array()
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    assert_eq!(dates, vec!["2026-10-02", "2026-10-14"]);

    let err = request_err(
        &mut stdin,
        &mut reader,
        "missing",
        "attendance.getSnapshot",
        json!({ "date": "2026-10-03" }),
    );
    assert_eq!(str_field(&err, "code"), "not_found");

    let err = request_err(
        &mut stdin,
        &mut reader,
        "bad-date",
        "attendance.takeSnapshot",
        json!({ "date": "16/10/2026" }),
    );
    assert_eq!(str_field(&err, "code"), "bad_params");
}

#[test]
fn snapshot_defaults_to_today() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = select_workspace(&mut stdin, &mut reader, "rosterd-snapshot-today");
    let taken = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.takeSnapshot",
        json!({ "statuses": {} }),
    );
    assert_eq!(taken.get("total").and_then(|v| v.as_u64()), Some(0));
    let date = str_field(&taken, "date").to_string();
    assert_eq!(date.len(), 10);
    assert_eq!(str_field(&taken, "fileName"), format!("attendance_{}.json", date));
}
