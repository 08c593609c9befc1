//! Sandbox: governed execution of untrusted SUTRA programs.
//!
//! Every call runs against a fresh, disposable agent, so nothing leaks between
//! runs. The pipeline short-circuits into a failing `SandboxResult` instead of
//! returning an error: the host process never sees sandboxed failures.
//!
//! ```text
//! source ─▶ size cap ─▶ lex+parse ─▶ statement cap ─▶ capability filter
//!        ─▶ execute (hard timeout, OS limits) ─▶ time + ledger caps ─▶ result
//! ```

pub mod audit;
pub mod os_limits;

pub use audit::{AuditEntry, AuditEvent};
pub use os_limits::OsLimitGuard;

use crate::interpreter::{self, RuntimeError};
use audit::AuditTrail;
use std::fmt;
use std::fmt::Write as _;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use sutra_core::{AgentState, LedgerSizes, SandboxConfig, Signer};
use sutra_dsl::Program;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Statement and ledger counts of one sandboxed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SandboxStats {
    pub statements_total: usize,
    pub statements_executed: usize,
    pub statements_blocked: usize,
    pub beliefs: usize,
    pub goals: usize,
    pub offers: usize,
    pub commitments: usize,
    pub actions: usize,
}

impl SandboxStats {
    fn with_ledgers(mut self, sizes: LedgerSizes) -> Self {
        self.beliefs = sizes.beliefs;
        self.goals = sizes.goals;
        self.offers = sizes.offers;
        self.commitments = sizes.commitments;
        self.actions = sizes.actions;
        self
    }
}

/// Outcome of `Sandbox::execute`.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxResult {
    /// True when no violation was recorded
    pub success: bool,
    pub responses: Vec<String>,
    pub violations: Vec<String>,
    /// Every decision made during the run, in order
    pub audit: Vec<AuditEntry>,
    pub stats: SandboxStats,
    pub elapsed_ms: f64,
}

impl SandboxResult {
    pub fn is_clean(&self) -> bool {
        self.success && self.violations.is_empty()
    }
}

// ============================================================================
// SANDBOX
// ============================================================================

/// Executes programs under resource and capability limits.
#[derive(Clone)]
pub struct Sandbox {
    config: SandboxConfig,
    signer: Option<Arc<dyn Signer>>,
}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("config", &self.config)
            .field("signer", &self.signer.as_ref().map(|s| s.signer_id().to_string()))
            .finish()
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

/// What the execution stage produced.
enum Outcome {
    Finished(Vec<String>, LedgerSizes),
    Failed(RuntimeError),
    TimedOut(u64),
    WorkerLost,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            signer: None,
        }
    }

    /// Sign OFFER and COMMIT statements of sandboxed programs with `signer`.
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Preemptive timeout in effect. Falls back to the CPU ceiling plus one
    /// second when only OS limits are configured.
    fn hard_timeout_ms(&self) -> Option<u64> {
        self.config.hard_timeout_ms.or_else(|| {
            let os = &self.config.os_limits;
            (os.enabled && os_limits::is_supported())
                .then(|| os.max_cpu_seconds.saturating_add(1).saturating_mul(1000))
        })
    }

    fn os_limits_active(&self) -> bool {
        self.config.os_limits.enabled && os_limits::is_supported()
    }

    fn apply_os_limits(&self, trail: &mut AuditTrail) -> Option<OsLimitGuard> {
        self.os_limits_active()
            .then(|| OsLimitGuard::apply(&self.config.os_limits, trail))
    }

    /// Run `source` against a fresh disposable agent.
    pub fn execute(&self, source: &str) -> SandboxResult {
        let start = Instant::now();
        let limits = &self.config.limits;
        let mut trail = AuditTrail::new();

        tracing::info!(agent_id = %self.config.agent_id, bytes = source.len(), "sandbox run started");
        trail.info(format!("Sandbox started for '{}'", self.config.agent_id));

        if source.len() > limits.max_source_bytes {
            trail.violate(format!(
                "Source too large: {} bytes (max {})",
                source.len(),
                limits.max_source_bytes
            ));
            return finish(trail, Vec::new(), SandboxStats::default(), start);
        }

        let program = match sutra_dsl::parse(source) {
            Ok(program) => program,
            Err(e) => {
                trail.fail(format!("Parse error: {}", e));
                return finish(trail, Vec::new(), SandboxStats::default(), start);
            }
        };

        let total = program.statements.len();
        if total > limits.max_statements {
            trail.violate(format!(
                "Too many statements: {} (max {})",
                total, limits.max_statements
            ));
            let stats = SandboxStats {
                statements_total: total,
                ..SandboxStats::default()
            };
            return finish(trail, Vec::new(), stats, start);
        }

        let filtered = self.filter(program, &mut trail);
        let mut stats = SandboxStats {
            statements_total: total,
            statements_executed: filtered.statements.len(),
            statements_blocked: total - filtered.statements.len(),
            ..SandboxStats::default()
        };

        let agent = match &self.signer {
            Some(signer) => AgentState::with_signer(self.config.agent_id.as_str(), signer.clone()),
            None => AgentState::new(self.config.agent_id.as_str()),
        };

        // The worker thread must exist before the address-space ceiling is
        // lowered, or its stack cannot be mapped.
        let outcome = match self.hard_timeout_ms() {
            Some(ms) => match Worker::spawn(filtered) {
                Ok(worker) => {
                    let guard = self.apply_os_limits(&mut trail);
                    let outcome = worker.run(agent, ms);
                    restore_os_limits(guard, &mut trail);
                    outcome
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not spawn sandbox worker");
                    Outcome::WorkerLost
                }
            },
            None => {
                let guard = self.apply_os_limits(&mut trail);
                let outcome = run_inline(&filtered, agent);
                restore_os_limits(guard, &mut trail);
                outcome
            }
        };

        let responses = match outcome {
            Outcome::Finished(responses, sizes) => {
                stats = stats.with_ledgers(sizes);
                responses
            }
            Outcome::Failed(e) => {
                trail.fail(format!("Runtime error: {}", e));
                return finish(trail, Vec::new(), stats, start);
            }
            Outcome::TimedOut(ms) => {
                trail.violate(format!("Hard timeout: execution exceeded {}ms", ms));
                return finish(trail, Vec::new(), stats, start);
            }
            Outcome::WorkerLost => {
                trail.fail("Runtime error: worker terminated unexpectedly");
                return finish(trail, Vec::new(), stats, start);
            }
        };

        let elapsed_ms = elapsed_ms(start);
        if elapsed_ms > limits.max_time_ms as f64 {
            trail.violate(format!(
                "Execution too slow: {:.1}ms (max {}ms)",
                elapsed_ms, limits.max_time_ms
            ));
        }

        let ledger_checks = [
            (stats.beliefs, limits.max_beliefs, "beliefs"),
            (stats.goals, limits.max_goals, "goals"),
            (stats.offers, limits.max_offers, "offers"),
            (stats.commitments, limits.max_commits, "commitments"),
            (stats.actions, limits.max_actions, "actions"),
        ];
        for (actual, limit, name) in ledger_checks {
            if actual > limit {
                trail.violate(format!("Too many {}: {} (max {})", name, actual, limit));
            }
        }

        finish(trail, responses, stats, start)
    }

    /// Drop statements whose keyword the capability policy does not permit.
    fn filter(&self, program: Program, trail: &mut AuditTrail) -> Program {
        let policy = &self.config.capabilities;
        let statements = program
            .statements
            .into_iter()
            .filter(|statement| {
                let keyword = statement.keyword();
                if policy.permits(keyword) {
                    trail.allowed(format!("{} statement passed capability check", keyword));
                    true
                } else {
                    trail.violate(format!("Keyword '{}' not allowed in this sandbox", keyword));
                    false
                }
            })
            .collect();
        Program {
            headers: program.headers,
            statements,
        }
    }

    /// True when `source` runs without any violation.
    pub fn is_safe(&self, source: &str) -> bool {
        self.execute(source).is_clean()
    }

    /// Run `source` and render a human-readable report of the run.
    pub fn explain(&self, source: &str) -> String {
        let result = self.execute(source);
        let mut out = String::new();

        // Writing into a String cannot fail.
        let _ = writeln!(out, "Sandbox Report for '{}'", self.config.agent_id);
        let _ = writeln!(out, "{}", "─".repeat(50));
        let _ = writeln!(
            out,
            "  Status:     {}",
            if result.is_clean() { "CLEAN" } else { "VIOLATIONS" }
        );
        let _ = writeln!(out, "  Elapsed:    {:.1}ms", result.elapsed_ms);
        let _ = writeln!(
            out,
            "  Statements: {}/{} executed",
            result.stats.statements_executed, result.stats.statements_total
        );
        let _ = write!(
            out,
            "  OS Limits:  {}",
            if self.os_limits_active() { "ACTIVE" } else { "OFF" }
        );
        if result.stats.statements_blocked > 0 {
            let _ = write!(
                out,
                "\n  Blocked:    {} statements",
                result.stats.statements_blocked
            );
        }
        if !result.violations.is_empty() {
            let _ = write!(out, "\n\n  Violations ({}):", result.violations.len());
            for v in &result.violations {
                let _ = write!(out, "\n    ✗ {}", v);
            }
        }
        if !result.responses.is_empty() {
            let _ = write!(out, "\n\n  Output ({}):", result.responses.len());
            for r in &result.responses {
                let _ = write!(out, "\n    {}", r);
            }
        }
        let _ = write!(out, "\n\n  Audit Trail ({}):", result.audit.len());
        for entry in &result.audit {
            let _ = write!(out, "\n    [{:>8}] {}", entry.event.as_str(), entry.detail);
        }
        out
    }
}

// ============================================================================
// EXECUTION STRATEGIES
// ============================================================================

fn run_inline(program: &Program, mut agent: AgentState) -> Outcome {
    match interpreter::execute(program, &mut agent) {
        Ok(responses) => Outcome::Finished(responses, agent.sizes()),
        Err(e) => Outcome::Failed(e),
    }
}

fn restore_os_limits(guard: Option<OsLimitGuard>, trail: &mut AuditTrail) {
    if let Some(guard) = guard {
        guard.restore(trail);
    }
}

/// A parked worker thread. It is spawned before OS limits are applied and
/// only starts executing once `run` hands it the agent. On expiry the worker
/// is abandoned; its agent is dropped whenever it finishes.
struct Worker {
    start: mpsc::SyncSender<AgentState>,
    done: mpsc::Receiver<Outcome>,
}

impl Worker {
    fn spawn(program: Program) -> std::io::Result<Self> {
        // Bounded channels allocate their buffers up front, so neither side
        // allocates channel storage once the limits are in place.
        let (start, start_rx) = mpsc::sync_channel::<AgentState>(1);
        let (done_tx, done) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("sutra-sandbox".to_string())
            .spawn(move || {
                // Reserve this thread's heap before the ceiling applies.
                std::hint::black_box(Vec::<u8>::with_capacity(64));
                let Ok(agent) = start_rx.recv() else {
                    return;
                };
                // The receiver is gone after a timeout.
                let _ = done_tx.send(run_inline(&program, agent));
            })?;
        Ok(Self { start, done })
    }

    fn run(self, agent: AgentState, timeout_ms: u64) -> Outcome {
        if self.start.send(agent).is_err() {
            return Outcome::WorkerLost;
        }
        match self.done.recv_timeout(Duration::from_millis(timeout_ms)) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Outcome::TimedOut(timeout_ms),
            Err(RecvTimeoutError::Disconnected) => Outcome::WorkerLost,
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn finish(
    mut trail: AuditTrail,
    responses: Vec<String>,
    stats: SandboxStats,
    start: Instant,
) -> SandboxResult {
    let elapsed_ms = elapsed_ms(start);
    let violation_count = trail.violation_count();
    trail.info(format!(
        "Sandbox finished: {} responses, {} violations, {:.1}ms",
        responses.len(),
        violation_count,
        elapsed_ms
    ));
    tracing::info!(
        responses = responses.len(),
        violations = violation_count,
        elapsed_ms,
        "sandbox run finished"
    );

    let (audit, violations) = trail.into_parts();
    SandboxResult {
        success: violations.is_empty(),
        responses,
        violations,
        audit,
        stats,
        elapsed_ms,
    }
}
