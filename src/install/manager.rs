//! Process-wide installation of the intercepting channels.
//!
//! # Design Decisions
//! - Installation is serialized per manager; across managers the channel
//!   swap itself is a compare-and-swap, so the loser sees channels that are
//!   already intercepting
//! - A configurator already published in the shared scope always wins over
//!   this copy's own one

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::channel::SystemOutput;
use crate::error::{BridgeError, ScopeError};
use crate::install::configurator::{Configurator, CONFIGURATOR_IDENTITY, CONFIGURATOR_KEY};
use crate::install::scope::SharedScope;
use crate::observability::metrics;

const LEAK_WARNING: &str = "Could not publish the stdio configurator in the shared process scope. \
Falling back to a configurator owned by this copy of the bridge; if this copy is unloaded while \
the intercepting channels are installed, its code stays reachable from stdout and stderr. \
Grant this copy access to the shared scope, or call restore_original() before unloading it.";

/// What to do when the shared scope refuses a configurator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedScopePolicy {
    /// Warn once and install with the local configurator.
    #[default]
    Warn,
    /// Refuse to install.
    Deny,
}

/// Where the configurator used for an install came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Shared,
    Local,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Shared => "shared",
            ScopeKind::Local => "local",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed { scope: ScopeKind },
    AlreadyInstalled,
}

pub struct InstallationManager {
    system: Arc<SystemOutput>,
    scope: Arc<dyn SharedScope>,
    policy: DegradedScopePolicy,
    local: Arc<dyn Configurator>,
    lock: Mutex<()>,
    leak_warned: AtomicBool,
}

impl InstallationManager {
    pub fn new(
        system: Arc<SystemOutput>,
        scope: Arc<dyn SharedScope>,
        policy: DegradedScopePolicy,
        local: Arc<dyn Configurator>,
    ) -> Self {
        Self {
            system,
            scope,
            policy,
            local,
            lock: Mutex::new(()),
            leak_warned: AtomicBool::new(false),
        }
    }

    pub fn system(&self) -> &Arc<SystemOutput> {
        &self.system
    }

    pub fn policy(&self) -> DegradedScopePolicy {
        self.policy
    }

    /// Replace the standard channels with intercepting ones unless that
    /// already happened.
    pub fn install(&self) -> Result<InstallOutcome, BridgeError> {
        let _lock = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.system.is_intercepting() {
            tracing::debug!("stdout and stderr are already intercepting channels");
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        let (configurator, scope) = self.locate()?;
        if !configurator.replace_outputs(&self.system) {
            tracing::debug!("Another installer replaced stdout and stderr first");
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        metrics::record_install(scope);
        tracing::info!(
            scope = scope.as_str(),
            configurator = configurator.identity(),
            "Replaced standard stdout and stderr with intercepting channels"
        );
        Ok(InstallOutcome::Installed { scope })
    }

    /// Put the original channels back. Returns `false` if they were not
    /// intercepting.
    pub fn uninstall(&self) -> Result<bool, BridgeError> {
        let _lock = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.system.is_intercepting() {
            tracing::warn!("stdout and stderr are not intercepting channels - cannot restore");
            return Ok(false);
        }

        let configurator = self
            .scope
            .probe(CONFIGURATOR_KEY)
            .filter(|c| c.identity() == CONFIGURATOR_IDENTITY)
            .unwrap_or_else(|| Arc::clone(&self.local));
        let restored = configurator.restore_outputs(&self.system)?;
        if restored {
            metrics::record_restore();
            tracing::info!("Restored original stdout and stderr");
        }
        Ok(restored)
    }

    fn locate(&self) -> Result<(Arc<dyn Configurator>, ScopeKind), BridgeError> {
        if let Some(found) = self.scope.probe(CONFIGURATOR_KEY) {
            if found.identity() == CONFIGURATOR_IDENTITY {
                return Ok((found, ScopeKind::Shared));
            }
            let err = ScopeError::Incompatible {
                key: CONFIGURATOR_KEY.to_string(),
                found: found.identity().to_string(),
            };
            return self.degrade(err);
        }

        match self.scope.publish(CONFIGURATOR_KEY, Arc::clone(&self.local)) {
            Ok(published) if published.identity() == CONFIGURATOR_IDENTITY => {
                Ok((published, ScopeKind::Shared))
            }
            Ok(published) => self.degrade(ScopeError::Incompatible {
                key: CONFIGURATOR_KEY.to_string(),
                found: published.identity().to_string(),
            }),
            Err(err) => self.degrade(err),
        }
    }

    fn degrade(&self, err: ScopeError) -> Result<(Arc<dyn Configurator>, ScopeKind), BridgeError> {
        match self.policy {
            DegradedScopePolicy::Deny => {
                tracing::error!(error = %err, "Refusing to install without the shared scope");
                Err(BridgeError::InstallationFailure(err))
            }
            DegradedScopePolicy::Warn => {
                if !self.leak_warned.swap(true, Ordering::Relaxed) {
                    tracing::warn!(error = %err, "{}", LEAK_WARNING);
                }
                Ok((Arc::clone(&self.local), ScopeKind::Local))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{MemoryChannel, SystemOutput};
    use crate::install::configurator::StdioConfigurator;
    use crate::install::scope::{ProcessScope, ReadOnlyScope};
    use crate::registry::AppenderRegistry;

    struct ForeignConfigurator;

    impl Configurator for ForeignConfigurator {
        fn identity(&self) -> &str {
            "someone-else/v0"
        }

        fn replace_outputs(&self, _system: &SystemOutput) -> bool {
            false
        }
    }

    fn system() -> Arc<SystemOutput> {
        Arc::new(SystemOutput::new(Arc::new(MemoryChannel::new()), Arc::new(MemoryChannel::new())))
    }

    fn local() -> Arc<dyn Configurator> {
        Arc::new(StdioConfigurator::new(Arc::new(AppenderRegistry::new())))
    }

    #[test]
    fn test_install_is_idempotent() {
        let manager = InstallationManager::new(
            system(),
            Arc::new(ProcessScope::new()),
            DegradedScopePolicy::Warn,
            local(),
        );
        assert_eq!(
            manager.install().unwrap(),
            InstallOutcome::Installed { scope: ScopeKind::Shared }
        );
        assert_eq!(manager.install().unwrap(), InstallOutcome::AlreadyInstalled);
        assert!(manager.uninstall().unwrap());
        assert!(!manager.uninstall().unwrap());
    }

    #[test]
    fn test_second_manager_uses_published_configurator() {
        let scope: Arc<dyn SharedScope> = Arc::new(ProcessScope::new());
        let first = local();
        let a = InstallationManager::new(system(), scope.clone(), DegradedScopePolicy::Warn, first.clone());
        a.install().unwrap();

        let b = InstallationManager::new(system(), scope.clone(), DegradedScopePolicy::Warn, local());
        let (found, kind) = b.locate().unwrap();
        assert_eq!(kind, ScopeKind::Shared);
        assert!(std::ptr::addr_eq(Arc::as_ptr(&found), Arc::as_ptr(&first)));
    }

    #[test]
    fn test_read_only_scope_degrades_or_denies() {
        let warn = InstallationManager::new(
            system(),
            Arc::new(ReadOnlyScope::empty()),
            DegradedScopePolicy::Warn,
            local(),
        );
        assert_eq!(
            warn.install().unwrap(),
            InstallOutcome::Installed { scope: ScopeKind::Local }
        );

        let sys = system();
        let deny = InstallationManager::new(
            sys.clone(),
            Arc::new(ReadOnlyScope::empty()),
            DegradedScopePolicy::Deny,
            local(),
        );
        let err = deny.install().unwrap_err();
        assert!(matches!(err, BridgeError::InstallationFailure(ScopeError::AccessDenied(_))));
        assert!(!sys.is_intercepting());
    }

    #[test]
    fn test_incompatible_configurator_is_not_used() {
        let scope = Arc::new(ProcessScope::new());
        scope.publish(CONFIGURATOR_KEY, Arc::new(ForeignConfigurator)).unwrap();

        let manager = InstallationManager::new(system(), scope, DegradedScopePolicy::Warn, local());
        assert_eq!(
            manager.install().unwrap(),
            InstallOutcome::Installed { scope: ScopeKind::Local }
        );
    }
}
