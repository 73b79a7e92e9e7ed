//! Host-facing entry point.
//!
//! # Responsibilities
//! - Install the intercepting channels on first use
//! - Register and deregister the calling context's appenders
//! - Restore the original channels on request
//!
//! # Design Decisions
//! - Usage errors (stop before start, restore without install) are logged as
//!   warnings and never returned
//! - `start` is idempotent per context: a second call replaces the appenders
//!   after flushing the old ones

use std::sync::Arc;

use crate::appender::{LogBackend, LogLevel, LoggerAppender, TracingBackend};
use crate::channel::{Channel, ChannelWriter, Interception, OutputChannel, SystemOutput};
use crate::config::{BridgeConfig, CaptureConfig};
use crate::context::{Context, ContextResolver, ThreadContextResolver};
use crate::error::{BridgeError, BridgeResult};
use crate::exceptions::{ConfiguredStrategyFactory, ExceptionHandlingStrategyFactory};
use crate::install::{
    DegradedScopePolicy, InstallOutcome, InstallationManager, ProcessScope, SharedScope,
    StdioConfigurator,
};
use crate::lines::{LineClassifier, PlainClassifier, TraceClassifier};
use crate::registry::AppenderRegistry;

/// Builder for [`StdioBridge`].
pub struct BridgeBuilder {
    system: Option<Arc<SystemOutput>>,
    scope: Option<Arc<dyn SharedScope>>,
    resolver: Arc<dyn ContextResolver>,
    backend: Arc<dyn LogBackend>,
    classifier: Arc<dyn LineClassifier>,
    policy: DegradedScopePolicy,
    source_prefix: Option<String>,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self {
            system: None,
            scope: None,
            resolver: Arc::new(ThreadContextResolver),
            backend: Arc::new(TracingBackend),
            classifier: Arc::new(TraceClassifier),
            policy: DegradedScopePolicy::default(),
            source_prefix: None,
        }
    }
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel service to intercept. Defaults to the process-wide one.
    pub fn system(mut self, system: Arc<SystemOutput>) -> Self {
        self.system = Some(system);
        self
    }

    /// Shared scope used to find or publish the configurator.
    pub fn scope(mut self, scope: Arc<dyn SharedScope>) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Decides which context this bridge starts, stops and writes as. The
    /// installed channels are shared and never see it.
    pub fn resolver(mut self, resolver: Arc<dyn ContextResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn LogBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn LineClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn degraded_scope(mut self, policy: DegradedScopePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn source_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source_prefix = Some(prefix.into());
        self
    }

    pub fn build(self) -> StdioBridge {
        let system = self.system.unwrap_or_else(SystemOutput::global);
        let scope = self
            .scope
            .unwrap_or_else(|| ProcessScope::global() as Arc<dyn SharedScope>);
        let local = Arc::new(StdioConfigurator::new(Arc::new(AppenderRegistry::new())));
        StdioBridge {
            manager: InstallationManager::new(Arc::clone(&system), scope, self.policy, local),
            system,
            resolver: self.resolver,
            backend: self.backend,
            classifier: self.classifier,
            source_prefix: self.source_prefix,
        }
    }
}

/// Sends standard output and error of the calling context to logging.
pub struct StdioBridge {
    system: Arc<SystemOutput>,
    manager: InstallationManager,
    resolver: Arc<dyn ContextResolver>,
    backend: Arc<dyn LogBackend>,
    classifier: Arc<dyn LineClassifier>,
    source_prefix: Option<String>,
}

impl StdioBridge {
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// A bridge over the process-wide channels, configured from `config`.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::builder_from_config(config).build()
    }

    /// A builder preloaded with the settings from `config`.
    pub fn builder_from_config(config: &BridgeConfig) -> BridgeBuilder {
        let mut builder = BridgeBuilder::new().degraded_scope(config.install.degraded_scope);
        if !config.capture.merge_exceptions {
            builder = builder.classifier(Arc::new(PlainClassifier));
        }
        if let Some(prefix) = &config.capture.source_prefix {
            builder = builder.source_prefix(prefix.clone());
        }
        builder
    }

    /// Send the calling context's stdout and stderr to logging at the given
    /// levels. Installs the intercepting channels if necessary.
    pub fn start(
        &self,
        out_level: LogLevel,
        err_level: LogLevel,
        strategies: &dyn ExceptionHandlingStrategyFactory,
    ) -> BridgeResult<()> {
        if let InstallOutcome::Installed { .. } = self.manager.install()? {
            tracing::debug!("Installed intercepting channels for first start");
        }

        let context = self.resolver.current();
        let channels = self.system.snapshot();
        for (channel, level) in [(Channel::Out, out_level), (Channel::Err, err_level)] {
            let current = channels.get(channel);
            let interception = interception_of(channel, current.as_ref())?;
            let original = interception.original();
            let appender = LoggerAppender::new(
                channel,
                level,
                self.source_for(&context, channel),
                Arc::clone(&original),
                strategies.make(level, original),
                Arc::clone(&self.backend),
                Arc::clone(&self.classifier),
            );
            interception.register(&context, Arc::new(appender));
        }

        tracing::info!(
            context = %context.id(),
            name = context.name(),
            out_level = %out_level,
            err_level = %err_level,
            "Redirected stdout and stderr to logging for this context"
        );
        Ok(())
    }

    /// Start with levels and strategies taken from `config`.
    pub fn start_with(&self, config: &CaptureConfig) -> BridgeResult<()> {
        let factory = strategy_factory(config);
        self.start(config.out_level, config.err_level, &factory)
    }

    /// Stop sending the calling context's output to logging. Pending partial
    /// lines and held traces are logged first.
    pub fn stop(&self) {
        let context = self.resolver.current();
        let channels = self.system.snapshot();
        let mut stopped = false;

        for channel in Channel::ALL {
            let current = channels.get(channel);
            let Ok(interception) = interception_of(channel, current.as_ref()) else {
                continue;
            };
            match interception.deregister(&context) {
                Ok(()) => stopped = true,
                Err(BridgeError::NoActiveAppender { .. }) => {}
                Err(err) => tracing::warn!(error = %err, "Failed to stop capturing {}", channel),
            }
        }

        if stopped {
            tracing::info!(context = %context.id(), "Stopped sending stdout and stderr to logging for this context");
        } else {
            tracing::warn!(
                context = %context.id(),
                "Cannot stop sending stdout and stderr to logging - they are not being sent there at the moment"
            );
        }
    }

    /// Log any printed trace the calling context's appenders are still
    /// holding. Partial lines stay buffered until more text or `stop`.
    pub fn flush(&self) {
        let context = self.resolver.current();
        let channels = self.system.snapshot();
        for channel in Channel::ALL {
            let current = channels.get(channel);
            if let Ok(interception) = interception_of(channel, current.as_ref()) {
                interception.flush_context(&context);
            }
        }
    }

    /// Put the pre-interception channels back process-wide. Returns `false`
    /// if nothing was intercepting.
    pub fn restore_original(&self) -> bool {
        match self.manager.uninstall() {
            Ok(restored) => restored,
            Err(err) => {
                tracing::warn!(error = %err, "Cannot restore original stdout and stderr");
                false
            }
        }
    }

    pub fn is_intercepting(&self) -> bool {
        self.system.is_intercepting()
    }

    /// Writer for stdout that writes as this bridge's resolved context.
    pub fn stdout(&self) -> ChannelWriter {
        self.system.writer(Channel::Out).within(Arc::clone(&self.resolver))
    }

    /// Writer for stderr that writes as this bridge's resolved context.
    pub fn stderr(&self) -> ChannelWriter {
        self.system.writer(Channel::Err).within(Arc::clone(&self.resolver))
    }

    pub fn system(&self) -> &Arc<SystemOutput> {
        &self.system
    }

    fn source_for(&self, context: &Context, channel: Channel) -> String {
        let prefix = self.source_prefix.as_deref().unwrap_or(context.name());
        format!("{prefix}.{}", channel.label())
    }
}

fn interception_of(channel: Channel, current: &dyn OutputChannel) -> Result<&dyn Interception, BridgeError> {
    if !crate::channel::is_intercepting(current) {
        return Err(BridgeError::NotIntercepting(channel));
    }
    current
        .interception()
        .ok_or(BridgeError::ForeignInterceptor(channel))
}

/// Strategy factory described by a capture section. Override keys that do
/// not name a level are skipped; validation reports them.
pub fn strategy_factory(config: &CaptureConfig) -> ConfiguredStrategyFactory {
    config
        .exception_handling_overrides
        .iter()
        .filter_map(|(level, kind)| level.parse::<LogLevel>().ok().map(|l| (l, *kind)))
        .fold(
            ConfiguredStrategyFactory::new(config.exception_handling),
            |factory, (level, kind)| factory.with_override(level, kind),
        )
}
