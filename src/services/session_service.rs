//! Session service - lifecycle of counting sessions
//!
//! Wraps the session repository with authorization, validation, visibility
//! rules and event emission. Status changes are compare-and-swap writes, and
//! deletion tears down counts, assignments and the session in one transaction.

use std::collections::HashSet;
use std::sync::Arc;

use diesel::SqliteConnection;
use tracing::{info, warn};

use crate::auth::{authorize, Actor};
use crate::config::UnassignedPolicy;
use crate::db::models::session_statuses;
use crate::db::sessions::{self, SessionTeardown};
use crate::db::{CountSession, LedgerDb, SessionAssignment};
use crate::error::LedgerError;

use super::events::{EventBus, LedgerEvent};

/// A freshly created session and how its best-effort assignment writes went
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub session: CountSession,
    pub assigned: usize,
    pub assignment_failures: usize,
}

/// Whether an employee may act on a session, ignoring its status
///
/// An assignment naming the employee always grants access. Under the open
/// policy so does a session with no assignment rows, and so does any session
/// for an employee who has never been assigned anywhere.
pub(crate) fn employee_has_session_access(
    conn: &mut SqliteConnection,
    actor: &Actor,
    session_id: &str,
    policy: UnassignedPolicy,
) -> Result<bool, LedgerError> {
    let assigned = sessions::assigned_session_ids(conn, actor.ctx(), &actor.user_id)?;
    if assigned.iter().any(|id| id == session_id) {
        return Ok(true);
    }
    if !policy.is_open() {
        return Ok(false);
    }
    if assigned.is_empty() {
        return Ok(true);
    }
    Ok(!sessions::session_has_assignments(conn, actor.ctx(), session_id)?)
}

/// Session service for business logic
pub struct SessionService {
    db: Arc<LedgerDb>,
    events: Arc<EventBus>,
    unassigned_sessions: UnassignedPolicy,
}

impl SessionService {
    pub fn new(
        db: Arc<LedgerDb>,
        events: Arc<EventBus>,
        unassigned_sessions: UnassignedPolicy,
    ) -> Self {
        Self {
            db,
            events,
            unassigned_sessions,
        }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Sessions the actor may see
    ///
    /// Managers see active sessions, or every session when none is active.
    /// Employees see the active sessions assigned to them. Under the open
    /// policy they also see active sessions nobody is assigned to, and an
    /// employee with no assignment rows at all sees every active session.
    pub fn visible_sessions(&self, actor: &Actor) -> Result<Vec<CountSession>, LedgerError> {
        authorize(actor, "list_sessions")?;
        let ctx = actor.ctx();

        self.db.with_conn(|conn| {
            if actor.is_manager() {
                let active =
                    sessions::list_sessions(conn, ctx, Some(session_statuses::ACTIVE), None)?;
                if !active.is_empty() {
                    return Ok(active);
                }
                return sessions::list_sessions(conn, ctx, None, None);
            }

            let assigned = sessions::assigned_session_ids(conn, ctx, &actor.user_id)?;
            if !self.unassigned_sessions.is_open() {
                if assigned.is_empty() {
                    return Ok(Vec::new());
                }
                return sessions::list_sessions(
                    conn,
                    ctx,
                    Some(session_statuses::ACTIVE),
                    Some(assigned.as_slice()),
                );
            }

            let active = sessions::list_sessions(conn, ctx, Some(session_statuses::ACTIVE), None)?;
            if assigned.is_empty() {
                return Ok(active);
            }

            let claimed: HashSet<String> =
                sessions::claimed_session_ids(conn, ctx)?.into_iter().collect();
            Ok(active
                .into_iter()
                .filter(|s| assigned.contains(&s.id) || !claimed.contains(&s.id))
                .collect())
        })
    }

    /// Get one session; employees only reach sessions visible to them
    pub fn get(&self, actor: &Actor, id: &str) -> Result<CountSession, LedgerError> {
        authorize(actor, "get_session")?;

        self.db.with_conn(|conn| {
            let session = sessions::get_session(conn, actor.ctx(), id)?
                .ok_or_else(|| LedgerError::NotFound(format!("Session {} not found", id)))?;

            if !actor.is_manager() {
                let allowed = session.is_active()
                    && employee_has_session_access(conn, actor, id, self.unassigned_sessions)?;
                if !allowed {
                    return Err(LedgerError::Forbidden(format!(
                        "Session {} is not assigned to {}",
                        id, actor.user_id
                    )));
                }
            }

            Ok(session)
        })
    }

    pub fn list_assignments(
        &self,
        actor: &Actor,
        session_id: &str,
    ) -> Result<Vec<SessionAssignment>, LedgerError> {
        authorize(actor, "list_assignments")?;

        self.db.with_conn(|conn| {
            if sessions::get_session(conn, actor.ctx(), session_id)?.is_none() {
                return Err(LedgerError::NotFound(format!("Session {} not found", session_id)));
            }
            sessions::list_assignments(conn, actor.ctx(), session_id)
        })
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create an active session, then assign employees best-effort
    ///
    /// A failed assignment write is logged and counted; the session is kept.
    pub fn create(
        &self,
        actor: &Actor,
        name: &str,
        assignees: &[String],
    ) -> Result<CreatedSession, LedgerError> {
        authorize(actor, "create_session")?;

        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidInput("Session name is required".into()));
        }

        let ctx = actor.ctx();
        let session = self
            .db
            .with_conn(|conn| sessions::create_session(conn, ctx, name, &actor.user_id))?;

        let mut assigned = 0;
        let mut assignment_failures = 0;
        for user_id in assignees.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
            let result = self
                .db
                .with_conn(|conn| sessions::add_assignment(conn, ctx, &session.id, user_id));
            match result {
                Ok(()) => assigned += 1,
                Err(e) => {
                    assignment_failures += 1;
                    warn!(
                        tenant = %ctx.tenant_id(),
                        session_id = %session.id,
                        user_id = %user_id,
                        error = %e,
                        "Failed to write session assignment"
                    );
                }
            }
        }

        info!(
            tenant = %ctx.tenant_id(),
            session_id = %session.id,
            actor = %actor.user_id,
            assigned,
            "Session created"
        );

        self.events.emit(LedgerEvent::SessionCreated {
            tenant: ctx.tenant_id().to_string(),
            id: session.id.clone(),
            name: session.name.clone(),
            created_by: actor.user_id.clone(),
            assignees: assigned,
        });

        Ok(CreatedSession {
            session,
            assigned,
            assignment_failures,
        })
    }

    /// Move an active session to completed
    ///
    /// Of two racing callers exactly one succeeds; the other gets
    /// `SessionAlreadyCompleted`.
    pub fn complete(&self, actor: &Actor, id: &str) -> Result<CountSession, LedgerError> {
        authorize(actor, "complete_session")?;
        let ctx = actor.ctx();

        let session = self.db.with_conn(|conn| {
            let session = sessions::get_session(conn, ctx, id)?
                .ok_or_else(|| LedgerError::NotFound(format!("Session {} not found", id)))?;

            if session.is_completed() {
                return Err(LedgerError::SessionAlreadyCompleted(id.to_string()));
            }

            if !sessions::complete_session(conn, ctx, id)? {
                return Err(LedgerError::SessionAlreadyCompleted(id.to_string()));
            }

            sessions::get_session(conn, ctx, id)?
                .ok_or_else(|| LedgerError::NotFound(format!("Session {} not found", id)))
        })?;

        info!(
            tenant = %ctx.tenant_id(),
            session_id = %id,
            actor = %actor.user_id,
            "Session completed"
        );

        self.events.emit(LedgerEvent::SessionCompleted {
            tenant: ctx.tenant_id().to_string(),
            id: id.to_string(),
            completed_by: actor.user_id.clone(),
        });

        Ok(session)
    }

    /// Delete a completed session with all of its counts and assignments
    pub fn delete(&self, actor: &Actor, id: &str) -> Result<SessionTeardown, LedgerError> {
        authorize(actor, "delete_session")?;
        let ctx = actor.ctx();

        let teardown = self.db.with_transaction(|conn| {
            let status = sessions::session_status(conn, ctx, id)?
                .ok_or_else(|| LedgerError::NotFound(format!("Session {} not found", id)))?;

            if status != session_statuses::COMPLETED {
                return Err(LedgerError::SessionStillActive(id.to_string()));
            }

            sessions::delete_session_cascade(conn, ctx, id)?
                .ok_or_else(|| LedgerError::NotFound(format!("Session {} not found", id)))
        })?;

        info!(
            tenant = %ctx.tenant_id(),
            session_id = %id,
            actor = %actor.user_id,
            counts_deleted = teardown.counts_deleted,
            assignments_deleted = teardown.assignments_deleted,
            "Session deleted"
        );

        self.events.emit(LedgerEvent::SessionDeleted {
            tenant: ctx.tenant_id().to_string(),
            id: id.to_string(),
            counts_deleted: teardown.counts_deleted,
        });

        Ok(teardown)
    }
}
