//! Process-wide OS resource ceilings around a sandboxed run.
//!
//! Limits are applied by lowering soft limits only, so the previous values can
//! always be restored without privileges. The guard restores them on drop,
//! which covers normal exit, violations, unwinding and hard timeouts alike.

use super::audit::{AuditEvent, AuditTrail};
use sutra_core::OsResourceLimits;

/// Whether this platform supports OS resource ceilings.
pub const fn is_supported() -> bool {
    cfg!(unix)
}

#[cfg(unix)]
mod imp {
    use super::*;
    use rlimit::Resource;

    struct Saved {
        name: &'static str,
        resource: Resource,
        soft: u64,
        hard: u64,
    }

    /// Restores the saved limits when dropped.
    pub struct OsLimitGuard {
        saved: Vec<Saved>,
    }

    impl OsLimitGuard {
        /// Lower the process soft limits to `limits`. Limits that cannot be
        /// read or set are recorded as errors in the audit trail and skipped.
        pub(crate) fn apply(limits: &OsResourceLimits, trail: &mut AuditTrail) -> Self {
            trail.info("Applying OS-level resource limits");

            let wanted = [
                ("RLIMIT_CPU", Resource::CPU, limits.max_cpu_seconds, "s"),
                ("RLIMIT_AS", Resource::AS, limits.max_memory_bytes, " bytes"),
                ("RLIMIT_FSIZE", Resource::FSIZE, limits.max_file_size, " bytes"),
                ("RLIMIT_NOFILE", Resource::NOFILE, limits.max_open_files, ""),
            ];

            let mut saved = Vec::with_capacity(wanted.len());
            for (name, resource, requested, unit) in wanted {
                let (soft, hard) = match rlimit::getrlimit(resource) {
                    Ok(current) => current,
                    Err(e) => {
                        tracing::warn!(limit = name, error = %e, "could not read OS limit");
                        trail.log(AuditEvent::Error, format!("Failed to read {}: {}", name, e));
                        continue;
                    }
                };

                let target = requested.min(soft).min(hard);
                match rlimit::setrlimit(resource, target, hard) {
                    Ok(()) => {
                        trail.info(format!("{} set to {}{}", name, target, unit));
                        saved.push(Saved {
                            name,
                            resource,
                            soft,
                            hard,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(limit = name, error = %e, "could not apply OS limit");
                        trail.log(AuditEvent::Error, format!("Failed to set {}: {}", name, e));
                    }
                }
            }

            Self { saved }
        }

        /// Restore the saved limits now and record it in the audit trail.
        pub(crate) fn restore(mut self, trail: &mut AuditTrail) {
            self.restore_all();
            trail.info("OS-level resource limits restored");
        }

        fn restore_all(&mut self) {
            for s in self.saved.drain(..) {
                if let Err(e) = rlimit::setrlimit(s.resource, s.soft, s.hard) {
                    tracing::warn!(limit = s.name, error = %e, "could not restore OS limit");
                }
            }
        }

        #[cfg(test)]
        pub(crate) fn applied(&self) -> usize {
            self.saved.len()
        }
    }

    impl Drop for OsLimitGuard {
        fn drop(&mut self) {
            self.restore_all();
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::*;

    /// No-op guard on platforms without resource limits.
    pub struct OsLimitGuard;

    impl OsLimitGuard {
        pub(crate) fn apply(_limits: &OsResourceLimits, trail: &mut AuditTrail) -> Self {
            trail.log(
                AuditEvent::Error,
                "OS-level resource limits are not supported on this platform",
            );
            OsLimitGuard
        }

        pub(crate) fn restore(self, _trail: &mut AuditTrail) {}

        #[cfg(test)]
        pub(crate) fn applied(&self) -> usize {
            0
        }
    }
}

pub use imp::OsLimitGuard;
