mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, seed_school, spawn_sidecar, RESP_A, RESP_B, STAFF};

#[test]
fn opening_the_desk_acknowledges_todays_arrivals_once() {
    let mut sidecar = spawn_sidecar();
    let school = seed_school(&mut sidecar, "tardy-school-today");
    let (_child, stdin, reader) = &mut sidecar;

    let _ = request_ok(
        stdin,
        reader,
        "1",
        "notices.create",
        json!({ "viewerId": RESP_A, "studentIds": [school.ana], "reason": "Paro de colectivos" }),
    );

    let code = request_err(stdin, reader, "2", "school.today", json!({ "viewerId": RESP_A }));
    assert_eq!(code, "forbidden");

    let first = request_ok(stdin, reader, "3", "school.today", json!({ "viewerId": STAFF }));
    assert_eq!(first["acknowledged"], 1);
    let rows = first["arrivals"].as_array().expect("arrivals");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["reason"], "Paro de colectivos");
    assert_eq!(rows[0]["reviewedBy"], STAFF);
    assert_eq!(rows[0]["reviewedByName"], "Escuela Uno");
    assert_eq!(rows[0]["total"], 4);
    assert_eq!(rows[0]["last30"], 3);

    let again = request_ok(stdin, reader, "4", "school.today", json!({ "viewerId": STAFF }));
    assert_eq!(again["acknowledged"], 0);
    assert_eq!(again["arrivals"].as_array().expect("arrivals").len(), 1);

    // A later report today is picked up by the explicit acknowledge call.
    let _ = request_ok(
        stdin,
        reader,
        "5",
        "notices.create",
        json!({ "viewerId": RESP_B, "studentIds": [school.bruno], "reason": "Turno" }),
    );
    let ack = request_ok(
        stdin,
        reader,
        "6",
        "school.acknowledgeToday",
        json!({ "viewerId": STAFF }),
    );
    assert_eq!(ack["acknowledged"], 1);
}

#[test]
fn student_history_is_staff_only_and_complete() {
    let mut sidecar = spawn_sidecar();
    let school = seed_school(&mut sidecar, "tardy-school-history");
    let (_child, stdin, reader) = &mut sidecar;

    let code = request_err(
        stdin,
        reader,
        "1",
        "school.studentHistory",
        json!({ "viewerId": RESP_A, "studentId": school.ana }),
    );
    assert_eq!(code, "forbidden");

    let res = request_ok(
        stdin,
        reader,
        "2",
        "school.studentHistory",
        json!({ "viewerId": STAFF, "studentId": school.ana }),
    );
    assert_eq!(res["student"]["firstName"], "Ana");
    let reasons: Vec<&str> = res["arrivals"]
        .as_array()
        .expect("arrivals")
        .iter()
        .map(|r| r["reason"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(reasons, vec!["Demora tránsito", "Dormido", "Viejo"]);

    let code = request_err(
        stdin,
        reader,
        "3",
        "school.studentHistory",
        json!({ "viewerId": STAFF, "studentId": "no-such-student" }),
    );
    assert_eq!(code, "not_found");
}
