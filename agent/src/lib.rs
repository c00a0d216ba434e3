//! One-shot driver for metric plugins.
//!
//! The agent reads a TOML file that declares the plugins, runs every selected plugin
//! once and returns the results, keyed by plugin name. Scheduling the runs and sending
//! the results somewhere is left to whoever invokes the agent.

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, anyhow};
use env_logger::Env;
use plugin_metrics::{
    Diagnostics, GraphDefsParam, MetricPluginGenerator, PluginConfig, PluginGenerator, command::ProcessRunner,
};
use serde::{Deserialize, Serialize};

/// Initializes the global logger.
///
/// Call this first!
pub fn init_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Content of the configuration file.
///
/// ```toml
/// [plugins.tcp]
/// command = "/usr/local/bin/tcp-states"
/// exclude_pattern = 'CLOSING$'
///
/// [plugins.dice]
/// command = ["/usr/local/bin/dice", "--faces", "6"]
/// custom_identifier = "casino.example.com"
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginConfig>,
}

impl AgentConfig {
    pub fn parse_file(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Keeps only the plugins in `names`, or every plugin if `names` is empty.
    pub fn select(&mut self, names: &[String]) -> anyhow::Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        if let Some(unknown) = names.iter().find(|name| !self.plugins.contains_key(*name)) {
            let available: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
            return Err(anyhow!(
                "plugin '{unknown}' is not in the config file, available plugins: {}",
                available.join(", ")
            ));
        }
        self.plugins.retain(|name, _| names.contains(name));
        Ok(())
    }

    /// Creates one generator per plugin, in name order.
    pub fn into_generators(self) -> Vec<(String, MetricPluginGenerator)> {
        self.plugins
            .into_iter()
            .map(|(name, config)| {
                let runner = ProcessRunner::from_config(&config);
                let diagnostics = Diagnostics::global().with_target(format!("metrics.plugin.{name}"));
                let generator = MetricPluginGenerator::with_runner(config, runner, diagnostics);
                (name, generator)
            })
            .collect()
    }
}

/// Values collected from one plugin.
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_identifier: Option<String>,
    pub values: BTreeMap<String, f64>,
}

/// Results of a pass over several plugins.
#[derive(Debug)]
pub struct Pass<T> {
    pub results: BTreeMap<String, T>,
    pub failed: Vec<String>,
}

impl<T> Pass<T> {
    /// Returns `true` if there were plugins and none of them succeeded.
    pub fn all_failed(&self) -> bool {
        self.results.is_empty() && !self.failed.is_empty()
    }
}

fn run_pass<G, T, F>(generators: &mut [(String, G)], mut run: F) -> Pass<T>
where
    G: PluginGenerator,
    F: FnMut(&mut G) -> Result<T, plugin_metrics::PluginError>,
{
    let mut pass = Pass {
        results: BTreeMap::new(),
        failed: Vec::new(),
    };
    for (name, generator) in generators.iter_mut() {
        match run(generator) {
            Ok(res) => {
                pass.results.insert(name.clone(), res);
            }
            Err(e) => {
                log::error!("plugin {name} failed: {e}");
                pass.failed.push(name.clone());
            }
        }
    }
    pass
}

/// Runs every plugin in emit mode.
pub fn collect_values<G: PluginGenerator>(generators: &mut [(String, G)]) -> Pass<PluginValues> {
    run_pass(generators, |generator| {
        let values = generator.generate()?;
        Ok(PluginValues {
            custom_identifier: generator.custom_identifier().map(str::to_owned),
            values: values.into_iter().collect(),
        })
    })
}

/// Runs every plugin in describe mode.
pub fn collect_graph_defs<G: PluginGenerator>(generators: &mut [(String, G)]) -> Pass<Vec<GraphDefsParam>> {
    run_pass(generators, |generator| generator.prepare_graph_defs())
}
