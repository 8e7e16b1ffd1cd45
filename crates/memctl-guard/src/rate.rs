//! Token-bucket rate limiting per session.
//!
//! Buckets are in-memory only and reset on process restart — no
//! persistent back-pressure, by contract. Tool accounting is locked:
//! the write/read/exempt classification is part of the external
//! contract and tests enforce it.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;

use memctl_core::{MemctlError, MemctlResult};

/// Tools that consume a write token.
pub const WRITE_TOOLS: &[&str] = &[
    "memory_write",
    "memory_propose",
    "memory_import",
    "memory_consolidate",
    "memory_sync",
];

/// Tools that consume a read token.
pub const READ_TOOLS: &[&str] = &[
    "memory_recall",
    "memory_search",
    "memory_read",
    "memory_export",
    "memory_inspect",
    "memory_ask",
    "memory_loop",
];

/// Metadata-only tools that bypass both buckets.
pub const EXEMPT_TOOLS: &[&str] = &["memory_stats", "memory_mount"];

/// Accounting class of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolClass {
    Write,
    Read,
    Exempt,
}

/// Classify a tool name. Unknown tools are exempt — the guard layer
/// in front of them decides what they may do.
pub fn classify_tool(tool: &str) -> ToolClass {
    if WRITE_TOOLS.contains(&tool) {
        ToolClass::Write
    } else if READ_TOOLS.contains(&tool) {
        ToolClass::Read
    } else {
        ToolClass::Exempt
    }
}

/// Limiter settings.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub writes_per_minute: u32,
    pub reads_per_minute: u32,
    pub burst_factor: f64,
    pub max_proposals_per_turn: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            writes_per_minute: 20,
            reads_per_minute: 120,
            burst_factor: 2.0,
            max_proposals_per_turn: 5,
        }
    }
}

struct Bucket {
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
    /// Tokens per second.
    refill_rate: f64,
}

impl Bucket {
    fn new(per_minute: u32, burst_factor: f64) -> Self {
        let capacity = per_minute as f64 * burst_factor;
        Self {
            capacity,
            tokens: capacity,
            last_refill: Instant::now(),
            refill_rate: per_minute as f64 / 60.0,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// 0 on success, or milliseconds to wait.
    fn try_consume(&mut self, n: f64) -> u64 {
        self.refill();
        if self.tokens >= n {
            self.tokens -= n;
            return 0;
        }
        let deficit = n - self.tokens;
        if self.refill_rate > 0.0 {
            ((deficit / self.refill_rate) * 1000.0) as u64
        } else {
            60_000
        }
    }
}

struct SessionBuckets {
    read: Bucket,
    write: Bucket,
    proposals_this_turn: u32,
}

/// Per-session token buckets for reads and writes, plus a per-turn
/// proposal counter.
pub struct RateLimiter {
    config: RateLimitConfig,
    sessions: Mutex<HashMap<String, SessionBuckets>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, sessions: Mutex::new(HashMap::new()) }
    }

    fn with_buckets<T>(&self, session_id: &str, f: impl FnOnce(&mut SessionBuckets) -> T) -> T {
        let mut sessions = self.sessions.lock();
        let buckets = sessions.entry(session_id.to_string()).or_insert_with(|| SessionBuckets {
            read: Bucket::new(self.config.reads_per_minute, self.config.burst_factor),
            write: Bucket::new(self.config.writes_per_minute, self.config.burst_factor),
            proposals_this_turn: 0,
        });
        f(buckets)
    }

    /// Consume one read token.
    pub fn check_read(&self, session_id: &str) -> MemctlResult<()> {
        let wait = self.with_buckets(session_id, |b| b.read.try_consume(1.0));
        if wait > 0 {
            return Err(MemctlError::RateLimited {
                retry_after_ms: wait,
                message: format!(
                    "read rate limit exceeded ({}/min), retry after {wait}ms",
                    self.config.reads_per_minute
                ),
            });
        }
        Ok(())
    }

    /// Consume one write token.
    pub fn check_write(&self, session_id: &str) -> MemctlResult<()> {
        self.check_write_n(session_id, 1)
    }

    /// Consume `n` write tokens (batch import).
    pub fn check_write_n(&self, session_id: &str, n: u32) -> MemctlResult<()> {
        let wait = self.with_buckets(session_id, |b| b.write.try_consume(n as f64));
        if wait > 0 {
            return Err(MemctlError::RateLimited {
                retry_after_ms: wait,
                message: format!(
                    "write rate limit exceeded ({}/min), retry after {wait}ms",
                    self.config.writes_per_minute
                ),
            });
        }
        Ok(())
    }

    /// Count proposals against the per-turn cap.
    pub fn check_proposals(&self, session_id: &str, count: u32) -> MemctlResult<()> {
        let max = self.config.max_proposals_per_turn;
        self.with_buckets(session_id, |b| {
            let total = b.proposals_this_turn + count;
            if total > max {
                return Err(MemctlError::RateLimited {
                    retry_after_ms: 0,
                    message: format!(
                        "proposal limit exceeded: {total} proposals this turn (limit: {max})"
                    ),
                });
            }
            b.proposals_this_turn = total;
            Ok(())
        })
    }

    /// Reset per-turn counters at the turn boundary.
    pub fn reset_turn(&self, session_id: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(buckets) = sessions.get_mut(session_id) {
            buckets.proposals_this_turn = 0;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
