//! The generator: what the collection scheduler sees of a plugin.

use crate::{
    collect::{self, KeyFilter, Values},
    command::{CommandRunner, ProcessRunner},
    config::PluginConfig,
    diagnostics::Diagnostics,
    error::PluginError,
    graphdef::{self, GraphDefsParam},
    meta::{self, PluginMeta},
};

/// Source of custom metrics and graph definitions.
///
/// Calls on the same generator must not overlap, which `&mut self` guarantees.
/// A failed call can simply be retried at the next collection cycle.
pub trait PluginGenerator {
    /// Runs the plugin and returns the current values.
    fn generate(&mut self) -> Result<Values, PluginError>;

    /// Reloads the metadata of the plugin and returns its graph definitions.
    fn prepare_graph_defs(&mut self) -> Result<Vec<GraphDefsParam>, PluginError>;

    /// Identifier of the host to which the values belong, if it is not the local one.
    fn custom_identifier(&self) -> Option<&str>;
}

/// State of the plugin metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MetaState {
    /// No attempt to load the metadata yet.
    #[default]
    NotLoaded,
    /// The last successful load.
    Loaded(PluginMeta),
    /// Every attempt so far has failed, this is the last error.
    Failed(String),
}

impl MetaState {
    pub fn meta(&self) -> Option<&PluginMeta> {
        match self {
            MetaState::Loaded(meta) => Some(meta),
            MetaState::NotLoaded | MetaState::Failed(_) => None,
        }
    }
}

/// [`PluginGenerator`] that runs an external command.
pub struct MetricPluginGenerator<R: CommandRunner = ProcessRunner> {
    runner: R,
    filter: KeyFilter,
    custom_identifier: Option<String>,
    diagnostics: Diagnostics,
    meta: MetaState,
}

impl MetricPluginGenerator<ProcessRunner> {
    /// Creates a generator that spawns the configured command and logs to the global logger.
    pub fn new(config: PluginConfig) -> Self {
        let runner = ProcessRunner::from_config(&config);
        Self::with_runner(config, runner, Diagnostics::global())
    }
}

impl<R: CommandRunner> MetricPluginGenerator<R> {
    pub fn with_runner(config: PluginConfig, runner: R, diagnostics: Diagnostics) -> Self {
        Self {
            filter: config.key_filter(),
            custom_identifier: config.custom_identifier,
            runner,
            diagnostics,
            meta: MetaState::NotLoaded,
        }
    }

    pub fn meta_state(&self) -> &MetaState {
        &self.meta
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn load_meta(&mut self) -> Result<PluginMeta, PluginError> {
        meta::load_plugin_meta(&self.runner, &self.diagnostics).inspect_err(|e| {
            // Keep the last good metadata, if any.
            if !matches!(self.meta, MetaState::Loaded(_)) {
                self.meta = MetaState::Failed(e.to_string());
            }
        })
    }
}

impl<R: CommandRunner> PluginGenerator for MetricPluginGenerator<R> {
    fn generate(&mut self) -> Result<Values, PluginError> {
        collect::collect_values(&self.runner, &self.filter, &self.diagnostics)
    }

    fn prepare_graph_defs(&mut self) -> Result<Vec<GraphDefsParam>, PluginError> {
        let meta = self.load_meta()?;
        let graph_defs = graphdef::make_graph_defs_param(Some(&meta));
        self.meta = MetaState::Loaded(meta);
        Ok(graph_defs)
    }

    fn custom_identifier(&self) -> Option<&str> {
        self.custom_identifier.as_deref()
    }
}
