use crate::error::{ServiceError, ServiceResult};
use crate::model::{self, Level, Student, NAME_MAX_CHARS};
use crate::policy::Viewer;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub level: String,
    pub grade: i64,
    pub active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub level: Option<String>,
    pub grade: Option<i64>,
    pub active: Option<bool>,
}

pub(crate) const STUDENT_COLUMNS: &str = "s.id, s.first_name, s.last_name, s.level, s.grade, s.active";

pub(crate) fn student_from_row(r: &Row<'_>, offset: usize) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(offset)?,
        first_name: r.get(offset + 1)?,
        last_name: r.get(offset + 2)?,
        level: r.get(offset + 3)?,
        grade: r.get(offset + 4)?,
        active: r.get::<_, i64>(offset + 5)? != 0,
    })
}

fn validate_new(new: &NewStudent) -> ServiceResult<Student> {
    Ok(Student {
        id: Uuid::new_v4().to_string(),
        first_name: model::validate_name("firstName", &new.first_name, NAME_MAX_CHARS)?,
        last_name: model::validate_name("lastName", &new.last_name, NAME_MAX_CHARS)?,
        level: Level::parse(&new.level)?.as_str().to_string(),
        grade: model::validate_grade(new.grade)?,
        active: new.active,
    })
}

fn insert_linked(conn: &Connection, responsible_id: &str, s: &Student) -> ServiceResult<()> {
    conn.execute(
        "INSERT INTO students(id, first_name, last_name, level, grade, active)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &s.id,
            &s.first_name,
            &s.last_name,
            &s.level,
            s.grade,
            s.active as i64,
        ),
    )?;
    link(conn, responsible_id, &s.id)
}

/// Get-or-create for the responsible↔student pair.
pub fn link(conn: &Connection, responsible_id: &str, student_id: &str) -> ServiceResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO responsible_students(responsible_id, student_id) VALUES(?, ?)",
        (responsible_id, student_id),
    )?;
    Ok(())
}

pub fn create(conn: &Connection, viewer: &Viewer, new: &NewStudent) -> ServiceResult<Student> {
    let student = validate_new(new)?;
    let tx = conn.unchecked_transaction()?;
    insert_linked(&tx, &viewer.id_number, &student)?;
    tx.commit()?;
    Ok(student)
}

/// Registers several students at once; nothing is written if any entry is invalid.
pub fn register_many(
    conn: &Connection,
    viewer: &Viewer,
    entries: &[NewStudent],
) -> ServiceResult<Vec<Student>> {
    let mut validated = Vec::with_capacity(entries.len());
    for (i, e) in entries.iter().enumerate() {
        let s = validate_new(e).map_err(|err| match err {
            ServiceError::BadParams { message, details } => ServiceError::BadParams {
                message: format!("students[{}]: {}", i, message),
                details,
            },
            other => other,
        })?;
        validated.push(s);
    }

    let tx = conn.unchecked_transaction()?;
    for s in &validated {
        insert_linked(&tx, &viewer.id_number, s)?;
    }
    tx.commit()?;
    Ok(validated)
}

pub fn list_for(conn: &Connection, viewer: &Viewer) -> ServiceResult<Vec<Student>> {
    let sql = format!(
        "SELECT DISTINCT {}
         FROM students s
         JOIN responsible_students rs ON rs.student_id = s.id
         WHERE rs.responsible_id = ?
         ORDER BY s.last_name, s.first_name",
        STUDENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([&viewer.id_number], |r| student_from_row(r, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find(conn: &Connection, student_id: &str) -> ServiceResult<Option<Student>> {
    let sql = format!("SELECT {} FROM students s WHERE s.id = ?", STUDENT_COLUMNS);
    Ok(conn
        .query_row(&sql, [student_id], |r| student_from_row(r, 0))
        .optional()?)
}

/// Looks a student up through the viewer's links. Unlinked students are
/// reported as missing so their existence is not revealed.
pub fn find_linked(
    conn: &Connection,
    viewer: &Viewer,
    student_id: &str,
) -> ServiceResult<Student> {
    let sql = format!(
        "SELECT {}
         FROM students s
         JOIN responsible_students rs ON rs.student_id = s.id
         WHERE s.id = ? AND rs.responsible_id = ?",
        STUDENT_COLUMNS
    );
    conn.query_row(&sql, (student_id, &viewer.id_number), |r| {
        student_from_row(r, 0)
    })
    .optional()?
    .ok_or(ServiceError::NotFound("student"))
}

pub fn update(
    conn: &Connection,
    viewer: &Viewer,
    student_id: &str,
    patch: &StudentPatch,
) -> ServiceResult<Student> {
    let mut s = find_linked(conn, viewer, student_id)?;
    if let Some(v) = patch.first_name.as_deref() {
        s.first_name = model::validate_name("firstName", v, NAME_MAX_CHARS)?;
    }
    if let Some(v) = patch.last_name.as_deref() {
        s.last_name = model::validate_name("lastName", v, NAME_MAX_CHARS)?;
    }
    if let Some(v) = patch.level.as_deref() {
        s.level = Level::parse(v)?.as_str().to_string();
    }
    if let Some(v) = patch.grade {
        s.grade = model::validate_grade(v)?;
    }
    if let Some(v) = patch.active {
        s.active = v;
    }
    conn.execute(
        "UPDATE students
         SET first_name = ?, last_name = ?, level = ?, grade = ?, active = ?
         WHERE id = ?",
        (
            &s.first_name,
            &s.last_name,
            &s.level,
            s.grade,
            s.active as i64,
            &s.id,
        ),
    )?;
    Ok(s)
}

/// Hard delete. Links and late arrivals go with it.
pub fn delete(conn: &Connection, viewer: &Viewer, student_id: &str) -> ServiceResult<()> {
    let s = find_linked(conn, viewer, student_id)?;
    conn.execute("DELETE FROM students WHERE id = ?", [&s.id])?;
    Ok(())
}

pub fn active_linked_ids(conn: &Connection, viewer: &Viewer) -> ServiceResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT s.id
         FROM students s
         JOIN responsible_students rs ON rs.student_id = s.id
         WHERE rs.responsible_id = ? AND s.active = 1",
    )?;
    let ids = stmt
        .query_map([&viewer.id_number], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}
