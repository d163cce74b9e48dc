#![allow(dead_code)]

use chrono::{Duration, Utc};
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub type Sidecar = (Child, ChildStdin, BufReader<ChildStdout>);

pub fn temp_dir(prefix: &str) -> PathBuf {
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

/// Runs the daemon on UTC so tests can compute local dates from `Utc::now()`.
pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_tardyd");
    let mut child = Command::new(exe)
        .env("TARDYD_TIMEZONE", "UTC")
        .env_remove("TARDYD_WORKSPACE")
        .env_remove("TARDYD_REPORT_WINDOW_DAYS")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn tardyd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
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

pub fn request_ok(
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
        value.get("error").cloned().unwrap_or(serde_json::Value::Null)
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

/// Sends a request that must fail and returns its error code.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .pointer("/error/code")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}

pub fn days_ago(days: i64) -> String {
    (Utc::now() - Duration::days(days)).to_rfc3339()
}

pub fn today() -> String {
    Utc::now().date_naive().to_string()
}

pub fn date_days_ago(days: i64) -> String {
    (Utc::now().date_naive() - Duration::days(days)).to_string()
}

pub const STAFF: &str = "11111111";
pub const RESP_A: &str = "22222222";
pub const RESP_B: &str = "33333333";
pub const ADMIN: &str = "99999999";

pub struct School {
    pub ana: String,
    pub axel: String,
    pub bruno: String,
}

fn create_student(
    sidecar: &mut Sidecar,
    id: &str,
    owner: &str,
    first: &str,
    last: &str,
    level: &str,
    grade: i64,
) -> String {
    let (_, stdin, reader) = sidecar;
    let res = request_ok(
        stdin,
        reader,
        id,
        "students.create",
        json!({
            "viewerId": owner,
            "firstName": first,
            "lastName": last,
            "level": level,
            "grade": grade,
        }),
    );
    res["studentId"].as_str().expect("studentId").to_string()
}

fn notice(sidecar: &mut Sidecar, id: &str, owner: &str, student: &str, reason: &str, ago: i64) {
    let (_, stdin, reader) = sidecar;
    let _ = request_ok(
        stdin,
        reader,
        id,
        "notices.create",
        json!({
            "viewerId": owner,
            "studentIds": [student],
            "reason": reason,
            "reportedAt": days_ago(ago),
        }),
    );
}

/// Opens a fresh workspace with one staff member, two responsibles and their
/// children. Responsible A: Ana (5, 10, 31 days ago) and Axel (2 days ago).
/// Responsible B: Beto Bruno (1, 7, 10 days ago).
pub fn seed_school(sidecar: &mut Sidecar, prefix: &str) -> School {
    let workspace = temp_dir(prefix);
    {
        let (_, stdin, reader) = &mut *sidecar;
        let _ = request_ok(
            stdin,
            reader,
            "seed-ws",
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        for (id, name) in [(STAFF, "Escuela Uno"), (RESP_A, "Padre A"), (RESP_B, "Padre B")] {
            let _ = request_ok(
                stdin,
                reader,
                &format!("seed-user-{id}"),
                "users.create",
                json!({ "idNumber": id, "fullName": name, "email": format!("{id}@test.com") }),
            );
        }
        let _ = request_ok(
            stdin,
            reader,
            "seed-admin",
            "users.createSuperuser",
            json!({ "idNumber": ADMIN, "fullName": "Admin", "email": "admin@test.com" }),
        );
        let _ = request_ok(
            stdin,
            reader,
            "seed-staff",
            "staff.assign",
            json!({ "viewerId": ADMIN, "idNumber": STAFF, "isSchoolStaff": true }),
        );
    }

    let ana = create_student(sidecar, "seed-ana", RESP_A, "Ana", "Alvarez", "Primaria", 6);
    let axel = create_student(sidecar, "seed-axel", RESP_A, "Axel", "Alvarez", "Primaria", 3);
    let bruno = create_student(sidecar, "seed-bruno", RESP_B, "Beto", "Bruno", "Secundaria", 1);

    notice(sidecar, "seed-n1", RESP_A, &ana, "Demora tránsito", 5);
    notice(sidecar, "seed-n2", RESP_A, &ana, "Dormido", 10);
    notice(sidecar, "seed-n3", RESP_A, &ana, "Viejo", 31);
    notice(sidecar, "seed-n4", RESP_A, &axel, "Médico", 2);
    notice(sidecar, "seed-n5", RESP_B, &bruno, "Colectivo", 1);
    notice(sidecar, "seed-n6", RESP_B, &bruno, "Trámite", 7);
    notice(sidecar, "seed-n7", RESP_B, &bruno, "Llueve", 10);

    School { ana, axel, bruno }
}
