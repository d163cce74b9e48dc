use crate::error::{map_unique, ServiceError, ServiceResult};
use crate::model::{self, User, FULL_NAME_MAX_CHARS};
use crate::policy::Viewer;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id_number: String,
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub id_number: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFlags {
    pub has_active_students: bool,
    pub is_school_staff: bool,
}

const USER_COLUMNS: &str = "id_number, full_name, email, is_school_staff, is_superuser";

fn user_from_row(r: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id_number: r.get(0)?,
        full_name: r.get(1)?,
        email: r.get(2)?,
        is_school_staff: r.get::<_, i64>(3)? != 0,
        is_superuser: r.get::<_, i64>(4)? != 0,
    })
}

pub fn create(conn: &Connection, new: &NewUser, superuser: bool) -> ServiceResult<User> {
    let user = User {
        id_number: model::validate_id_number(&new.id_number)?,
        full_name: model::validate_name("fullName", &new.full_name, FULL_NAME_MAX_CHARS)?,
        email: model::validate_email(&new.email)?,
        is_school_staff: false,
        is_superuser: superuser,
    };
    conn.execute(
        "INSERT INTO users(id_number, full_name, email, is_school_staff, is_superuser, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &user.id_number,
            &user.full_name,
            &user.email,
            user.is_school_staff as i64,
            user.is_superuser as i64,
            model::format_ts(Utc::now()),
        ),
    )
    .map_err(|e| map_unique(e, "user with this id number or email"))?;
    info!(id_number = %user.id_number, superuser, "user created");
    Ok(user)
}

pub fn find(conn: &Connection, id_number: &str) -> ServiceResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id_number = ?", USER_COLUMNS);
    Ok(conn
        .query_row(&sql, [id_number], user_from_row)
        .optional()?)
}

/// Resolves the host-asserted viewer id into a `Viewer`.
pub fn resolve_viewer(conn: &Connection, id_number: &str) -> ServiceResult<Viewer> {
    match find(conn, id_number.trim())? {
        Some(u) => Ok(Viewer::from(&u)),
        None => Err(ServiceError::Unauthenticated(id_number.to_string())),
    }
}

pub fn update_profile(
    conn: &Connection,
    viewer: &Viewer,
    patch: &ProfilePatch,
) -> ServiceResult<User> {
    let Some(mut user) = find(conn, &viewer.id_number)? else {
        return Err(ServiceError::NotFound("user"));
    };
    if let Some(v) = patch.full_name.as_deref() {
        user.full_name = model::validate_name("fullName", v, FULL_NAME_MAX_CHARS)?;
    }
    if let Some(v) = patch.email.as_deref() {
        user.email = model::validate_email(v)?;
    }
    if let Some(v) = patch.id_number.as_deref() {
        user.id_number = model::validate_id_number(v)?;
    }

    // id_number is the key; links and notices follow via ON UPDATE CASCADE.
    conn.execute(
        "UPDATE users SET id_number = ?, full_name = ?, email = ? WHERE id_number = ?",
        (
            &user.id_number,
            &user.full_name,
            &user.email,
            &viewer.id_number,
        ),
    )
    .map_err(|e| map_unique(e, "user with this id number or email"))?;
    Ok(user)
}

pub fn any_school_staff(conn: &Connection) -> ServiceResult<bool> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM users WHERE is_school_staff = 1 LIMIT 1",
            [],
            |r| r.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

/// Marks or unmarks a user as school staff. The first staff member can only be
/// appointed by a superuser; after that, staff may appoint others.
pub fn assign_school_staff(
    conn: &Connection,
    viewer: &Viewer,
    target_id_number: &str,
    mark: bool,
) -> ServiceResult<User> {
    let any_staff = any_school_staff(conn)?;
    if !any_staff && !viewer.is_superuser {
        return Err(ServiceError::Forbidden(
            "only a superuser can assign the first school staff member".to_string(),
        ));
    }
    if any_staff && !viewer.is_school() {
        return Err(ServiceError::Forbidden(
            "not allowed to assign school staff".to_string(),
        ));
    }

    let target = target_id_number.trim();
    if target.is_empty() || !target.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ServiceError::bad_field(
            "idNumber",
            "id number must be numeric",
        ));
    }
    let Some(mut user) = find(conn, target)? else {
        return Err(ServiceError::NotFound("user"));
    };
    conn.execute(
        "UPDATE users SET is_school_staff = ? WHERE id_number = ?",
        (mark as i64, &user.id_number),
    )?;
    user.is_school_staff = mark;
    info!(
        by = %viewer.id_number,
        target = %user.id_number,
        school_staff = mark,
        "school staff flag changed"
    );
    Ok(user)
}

pub fn session_flags(conn: &Connection, viewer: &Viewer) -> ServiceResult<SessionFlags> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1
             FROM students s
             JOIN responsible_students rs ON rs.student_id = s.id
             WHERE rs.responsible_id = ? AND s.active = 1
             LIMIT 1",
            [&viewer.id_number],
            |r| r.get(0),
        )
        .optional()?;
    Ok(SessionFlags {
        has_active_students: hit.is_some(),
        is_school_staff: viewer.is_school(),
    })
}
