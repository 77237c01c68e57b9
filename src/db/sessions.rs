//! Counting session and session assignment operations
//!
//! Status transitions are written as compare-and-swap updates against the
//! current status column, so two racing "complete" requests can never both
//! observe a changed row.

use diesel::prelude::*;
use tracing::debug;
use uuid::Uuid;

use super::context::TenantContext;
use super::diesel_schema::{count_sessions, session_assignments, stock_counts};
use super::models::{
    current_timestamp, session_statuses, CountSession, NewCountSession, NewSessionAssignment,
    SessionAssignment,
};
use crate::error::LedgerError;

/// Rows removed by a session teardown
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SessionTeardown {
    pub counts_deleted: usize,
    pub assignments_deleted: usize,
}

// ============================================================================
// Sessions
// ============================================================================

/// Insert a new session in the `active` state
pub fn create_session(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    name: &str,
    created_by: &str,
) -> Result<CountSession, LedgerError> {
    let id = Uuid::new_v4().to_string();
    let now = current_timestamp();

    diesel::insert_into(count_sessions::table)
        .values(&NewCountSession {
            id: &id,
            tenant_id: ctx.tenant_id(),
            name,
            status: session_statuses::ACTIVE,
            created_by,
            created_at: &now,
        })
        .execute(conn)?;

    debug!(session_id = %id, "Inserted count session");

    get_session(conn, ctx, &id)?
        .ok_or_else(|| LedgerError::Internal("Failed to retrieve created session".into()))
}

pub fn get_session(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    id: &str,
) -> Result<Option<CountSession>, LedgerError> {
    Ok(count_sessions::table
        .filter(count_sessions::tenant_id.eq(ctx.tenant_id()))
        .filter(count_sessions::id.eq(id))
        .first::<CountSession>(conn)
        .optional()?)
}

/// Current status of a session, read fresh at call time
pub fn session_status(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    id: &str,
) -> Result<Option<String>, LedgerError> {
    Ok(count_sessions::table
        .filter(count_sessions::tenant_id.eq(ctx.tenant_id()))
        .filter(count_sessions::id.eq(id))
        .select(count_sessions::status)
        .first::<String>(conn)
        .optional()?)
}

/// List sessions newest first, optionally filtered by status and id set
pub fn list_sessions(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    status: Option<&str>,
    only_ids: Option<&[String]>,
) -> Result<Vec<CountSession>, LedgerError> {
    let mut q = count_sessions::table
        .filter(count_sessions::tenant_id.eq(ctx.tenant_id()))
        .into_boxed();

    if let Some(status) = status {
        q = q.filter(count_sessions::status.eq(status));
    }

    if let Some(ids) = only_ids {
        q = q.filter(count_sessions::id.eq_any(ids));
    }

    Ok(q
        .order((count_sessions::created_at.desc(), count_sessions::id.asc()))
        .load::<CountSession>(conn)?)
}

/// Flip an active session to completed.
///
/// Returns false when no row matched `status = 'active'`, i.e. the session
/// was already completed (or does not exist) at write time.
pub fn complete_session(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    id: &str,
) -> Result<bool, LedgerError> {
    let now = current_timestamp();

    let updated = diesel::update(
        count_sessions::table
            .filter(count_sessions::tenant_id.eq(ctx.tenant_id()))
            .filter(count_sessions::id.eq(id))
            .filter(count_sessions::status.eq(session_statuses::ACTIVE)),
    )
    .set((
        count_sessions::status.eq(session_statuses::COMPLETED),
        count_sessions::completed_at.eq(Some(now.as_str())),
    ))
    .execute(conn)?;

    Ok(updated == 1)
}

/// Delete a session with its counts and assignments.
///
/// Must run inside a transaction; the caller decides the boundary.
/// Returns None when the session row did not exist.
pub fn delete_session_cascade(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    id: &str,
) -> Result<Option<SessionTeardown>, LedgerError> {
    let counts_deleted = diesel::delete(
        stock_counts::table
            .filter(stock_counts::tenant_id.eq(ctx.tenant_id()))
            .filter(stock_counts::session_id.eq(id)),
    )
    .execute(conn)?;

    let assignments_deleted = diesel::delete(
        session_assignments::table
            .filter(session_assignments::tenant_id.eq(ctx.tenant_id()))
            .filter(session_assignments::session_id.eq(id)),
    )
    .execute(conn)?;

    let sessions_deleted = diesel::delete(
        count_sessions::table
            .filter(count_sessions::tenant_id.eq(ctx.tenant_id()))
            .filter(count_sessions::id.eq(id)),
    )
    .execute(conn)?;

    if sessions_deleted == 0 {
        return Ok(None);
    }

    Ok(Some(SessionTeardown {
        counts_deleted,
        assignments_deleted,
    }))
}

// ============================================================================
// Session Assignments
// ============================================================================

pub fn add_assignment(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    session_id: &str,
    user_id: &str,
) -> Result<(), LedgerError> {
    let now = current_timestamp();

    diesel::insert_or_ignore_into(session_assignments::table)
        .values(&NewSessionAssignment {
            tenant_id: ctx.tenant_id(),
            session_id,
            user_id,
            created_at: &now,
        })
        .execute(conn)?;

    Ok(())
}

pub fn list_assignments(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    session_id: &str,
) -> Result<Vec<SessionAssignment>, LedgerError> {
    Ok(session_assignments::table
        .filter(session_assignments::tenant_id.eq(ctx.tenant_id()))
        .filter(session_assignments::session_id.eq(session_id))
        .order(session_assignments::user_id.asc())
        .load::<SessionAssignment>(conn)?)
}

/// Session ids a user is assigned to, across all statuses
pub fn assigned_session_ids(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    user_id: &str,
) -> Result<Vec<String>, LedgerError> {
    Ok(session_assignments::table
        .filter(session_assignments::tenant_id.eq(ctx.tenant_id()))
        .filter(session_assignments::user_id.eq(user_id))
        .select(session_assignments::session_id)
        .load::<String>(conn)?)
}

/// Session ids that have at least one assignment row
pub fn claimed_session_ids(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
) -> Result<Vec<String>, LedgerError> {
    Ok(session_assignments::table
        .filter(session_assignments::tenant_id.eq(ctx.tenant_id()))
        .select(session_assignments::session_id)
        .distinct()
        .load::<String>(conn)?)
}

pub fn session_has_assignments(
    conn: &mut SqliteConnection,
    ctx: &TenantContext,
    session_id: &str,
) -> Result<bool, LedgerError> {
    let n: i64 = session_assignments::table
        .filter(session_assignments::tenant_id.eq(ctx.tenant_id()))
        .filter(session_assignments::session_id.eq(session_id))
        .count()
        .get_result(conn)?;
    Ok(n > 0)
}
