//! Shared school fixture for unit tests.

use crate::clock::LocalClock;
use crate::db::test_conn;
use crate::model::{self, Student};
use crate::policy::Viewer;
use crate::students::{self, NewStudent};
use crate::users::{self, NewUser};
use chrono::{Duration, TimeZone, Utc};
use rusqlite::Connection;
use uuid::Uuid;

pub struct Fixture {
    pub conn: Connection,
    pub clock: LocalClock,
    pub staff: Viewer,
    pub resp_a: Viewer,
    pub resp_b: Viewer,
    pub ana: Student,
    pub axel: Student,
    pub bruno: Student,
}

fn user(conn: &Connection, id: &str, name: &str) -> Viewer {
    let u = users::create(
        conn,
        &NewUser {
            id_number: id.to_string(),
            full_name: name.to_string(),
            email: format!("{}@test.com", id),
        },
        false,
    )
    .expect("create user");
    Viewer::from(&u)
}

fn student(conn: &Connection, owner: &Viewer, first: &str, last: &str, level: &str, grade: i64) -> Student {
    students::create(
        conn,
        owner,
        &NewStudent {
            first_name: first.to_string(),
            last_name: last.to_string(),
            level: level.to_string(),
            grade,
            active: true,
        },
    )
    .expect("create student")
}

impl Fixture {
    /// Responsible A has Ana (5, 10, 31 days ago) and Axel (2 days ago);
    /// responsible B has Beto Bruno (1, 7, 10 days ago). "Now" is local noon.
    pub fn school() -> Self {
        let conn = test_conn();
        let tz = chrono_tz::America::Argentina::Buenos_Aires;
        let now = Utc.with_ymd_and_hms(2025, 6, 16, 15, 0, 0).unwrap();
        let clock = LocalClock::new(now, tz);

        let mut staff = user(&conn, "11111111", "Escuela Uno");
        conn.execute(
            "UPDATE users SET is_school_staff = 1 WHERE id_number = ?",
            [&staff.id_number],
        )
        .expect("mark staff");
        staff.is_school_staff = true;

        let resp_a = user(&conn, "22222222", "Padre A");
        let resp_b = user(&conn, "33333333", "Padre B");

        let ana = student(&conn, &resp_a, "Ana", "Alvarez", "Primaria", 6);
        let axel = student(&conn, &resp_a, "Axel", "Alvarez", "Primaria", 3);
        let bruno = student(&conn, &resp_b, "Beto", "Bruno", "Secundaria", 1);

        let f = Fixture {
            conn,
            clock,
            staff,
            resp_a,
            resp_b,
            ana,
            axel,
            bruno,
        };
        f.arrival(&f.resp_a, &f.ana, "Demora tránsito", Duration::days(5));
        f.arrival(&f.resp_a, &f.ana, "Dormido", Duration::days(10));
        f.arrival(&f.resp_a, &f.ana, "Viejo", Duration::days(31));
        f.arrival(&f.resp_a, &f.axel, "Médico", Duration::days(2));
        f.arrival(&f.resp_b, &f.bruno, "Colectivo", Duration::days(1));
        f.arrival(&f.resp_b, &f.bruno, "Trámite", Duration::days(7));
        f.arrival(&f.resp_b, &f.bruno, "Llueve", Duration::days(10));
        f
    }

    pub fn arrival(&self, by: &Viewer, s: &Student, reason: &str, ago: Duration) -> String {
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO late_arrivals(id, responsible_id, student_id, reason, reported_at)
                 VALUES(?, ?, ?, ?, ?)",
                (
                    &id,
                    &by.id_number,
                    &s.id,
                    reason,
                    model::format_ts(self.clock.now - ago),
                ),
            )
            .expect("insert arrival");
        id
    }
}
