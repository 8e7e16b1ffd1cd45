//! Middleware composition for externally-triggered operations.
//!
//! Fixed order for every call: path guard → session resolve → rate
//! limit → execute → audit. The audit step runs on every exit path —
//! ok, rejected, rate_limited, and error alike.

use std::time::Instant;

use serde_json::Value;

use memctl_core::MemctlResult;

use crate::audit::AuditLogger;
use crate::guard::{GuardConfig, PathGuard};
use crate::rate::{classify_tool, RateLimitConfig, RateLimiter, ToolClass};
use crate::session::SessionTracker;

/// The five collaborating governance components behind one entry
/// point.
pub struct Middleware {
    pub guard: PathGuard,
    pub limiter: RateLimiter,
    pub sessions: SessionTracker,
    pub audit: AuditLogger,
}

impl Middleware {
    pub fn new(guard_config: GuardConfig, rate_config: RateLimitConfig) -> Self {
        Self {
            guard: PathGuard::new(guard_config),
            limiter: RateLimiter::new(rate_config),
            sessions: SessionTracker::new(),
            audit: AuditLogger::to_stderr(),
        }
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// Run one governed operation.
    ///
    /// `detail` is the tool-specific audit payload (see
    /// [`crate::audit::make_content_detail`]); it is attached to the
    /// record regardless of outcome.
    pub fn invoke<T>(
        &self,
        tool: &str,
        session_id: Option<&str>,
        requested_db: &str,
        detail: Option<Value>,
        op: impl FnOnce(&std::path::Path) -> MemctlResult<T>,
    ) -> MemctlResult<T> {
        let started = Instant::now();
        let rid = self.audit.new_rid();
        let sid = self.sessions.resolve_session_id(session_id);

        // Path guard first: nothing below it sees an unvetted path.
        let resolved = match self.guard.validate_db_path(requested_db) {
            Ok(path) => path,
            Err(e) => {
                self.audit.log(
                    tool,
                    &rid,
                    &sid,
                    requested_db,
                    e.outcome(),
                    detail,
                    elapsed_ms(started),
                );
                return Err(e);
            }
        };
        let db_label = self.guard.relative_db_path(&resolved);
        self.guard.check_db_size(&resolved);

        self.sessions.get_or_create(&sid);

        // Rate limit by accounting class; exempt tools bypass both
        // buckets.
        let limited = match classify_tool(tool) {
            ToolClass::Write => self.limiter.check_write(&sid),
            ToolClass::Read => self.limiter.check_read(&sid),
            ToolClass::Exempt => Ok(()),
        };
        if let Err(e) = limited {
            self.audit.log(tool, &rid, &sid, &db_label, e.outcome(), detail, elapsed_ms(started));
            return Err(e);
        }

        // Execute, then audit on whichever path we exit through.
        let result = op(&resolved);
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.outcome(),
        };
        if outcome == "ok" && classify_tool(tool) == ToolClass::Write {
            self.sessions.record_write(&sid);
        }
        self.audit.log(tool, &rid, &sid, &db_label, outcome, detail, elapsed_ms(started));
        result
    }

    /// Turn boundary: reset per-turn counters for a session.
    pub fn end_turn(&self, session_id: Option<&str>) {
        let sid = self.sessions.resolve_session_id(session_id);
        self.limiter.reset_turn(&sid);
        self.sessions.increment_turn(&sid);
    }
}

impl Default for Middleware {
    fn default() -> Self {
        Self::new(GuardConfig::default(), RateLimitConfig::default())
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Convenience: build a middleware whose guard treats `db_root` as the
/// containment root.
pub fn rooted_middleware(db_root: &std::path::Path) -> Middleware {
    Middleware::new(
        GuardConfig { db_root: Some(db_root.to_path_buf()), ..Default::default() },
        RateLimitConfig::default(),
    )
}
