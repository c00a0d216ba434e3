//! Graph definitions sent to the monitoring backend.

use serde::{Deserialize, Serialize};

use crate::{PLUGIN_PREFIX, meta::PluginMeta, units::GraphUnit};

/// Definition of one graph, ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDefsParam {
    pub name: String,
    pub display_name: String,
    pub unit: GraphUnit,
    pub metrics: Vec<GraphDefsMetric>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDefsMetric {
    pub name: String,
    pub display_name: String,
    pub is_stacked: bool,
}

/// Builds the graph definitions of a plugin from its metadata.
///
/// Graph and metric names are namespaced with [`PLUGIN_PREFIX`], and graphs
/// without unit get [`GraphUnit::Float`]. The graphs come in the order of
/// the metadata, which the backend does not care about.
pub fn make_graph_defs_param(meta: Option<&PluginMeta>) -> Vec<GraphDefsParam> {
    let Some(meta) = meta else {
        return Vec::new();
    };

    meta.graphs
        .iter()
        .map(|(key, graph)| GraphDefsParam {
            name: format!("{PLUGIN_PREFIX}{key}"),
            display_name: graph.label.clone(),
            unit: graph.unit.clone().unwrap_or_default(),
            metrics: graph
                .metrics
                .iter()
                .map(|metric| GraphDefsMetric {
                    name: format!("{PLUGIN_PREFIX}{key}.{}", metric.name),
                    display_name: metric.label.clone(),
                    is_stacked: metric.stacked,
                })
                .collect(),
        })
        .collect()
}
