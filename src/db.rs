use anyhow::Context;
use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "tardy.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    conn.busy_timeout(std::time::Duration::from_secs(20))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id_number TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            is_school_staff INTEGER NOT NULL DEFAULT 0,
            is_superuser INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            level TEXT NOT NULL,
            grade INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(last_name, first_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS responsible_students(
            responsible_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            PRIMARY KEY(responsible_id, student_id),
            FOREIGN KEY(responsible_id) REFERENCES users(id_number)
                ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_responsible_students_student ON responsible_students(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS late_arrivals(
            id TEXT PRIMARY KEY,
            responsible_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            reason TEXT NOT NULL,
            reported_at TEXT NOT NULL,
            reviewed_by TEXT,
            reviewed_at TEXT,
            FOREIGN KEY(responsible_id) REFERENCES users(id_number)
                ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY(reviewed_by) REFERENCES users(id_number) ON UPDATE CASCADE,
            CHECK ((reviewed_by IS NULL) = (reviewed_at IS NULL))
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_late_arrivals_reported ON late_arrivals(reported_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_late_arrivals_student ON late_arrivals(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_late_arrivals_responsible ON late_arrivals(responsible_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
pub(crate) fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = test_conn();
        init_schema(&conn).expect("second init");
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('users', 'students', 'responsible_students', 'late_arrivals')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn review_fields_must_be_set_together() {
        let conn = test_conn();
        conn.execute(
            "INSERT INTO users(id_number, full_name, email, created_at) VALUES('11111111', 'A', 'a@x', 'now')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO students(id, first_name, last_name, level, grade) VALUES('s1', 'Ana', 'Alvarez', 'PRIMARIA', 6)",
            [],
        )
        .unwrap();
        let half = conn.execute(
            "INSERT INTO late_arrivals(id, responsible_id, student_id, reason, reported_at, reviewed_by)
             VALUES('l1', '11111111', 's1', 'x', '2025-01-01T00:00:00.000000Z', '11111111')",
            [],
        );
        assert!(half.is_err());
    }
}
