// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compiled-in plugin registry.
//!
//! Plugins are registered per job system at agent construction; there is
//! no filesystem discovery. Each selected step gets a locally generated
//! timeline record id.

use drover_adapters::JobPlugin;
use drover_core::RecordId;
use std::collections::HashMap;
use std::sync::Arc;

/// One plugin selected for a job, with its timeline record.
#[derive(Clone)]
pub struct PluginStep {
    pub plugin: Arc<dyn JobPlugin>,
    pub record_id: RecordId,
}

/// Plugins partitioned by which side of the task list they run on. A
/// plugin with both hooks appears in both lists, each appearance with its
/// own record so the records stay monotonic.
#[derive(Clone, Default)]
pub struct PluginSteps {
    pub before: Vec<PluginStep>,
    pub after: Vec<PluginStep>,
}

#[derive(Default)]
pub struct PluginRegistry {
    by_system: HashMap<String, Vec<Arc<dyn JobPlugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, system: &str, plugin: Arc<dyn JobPlugin>) {
        self.by_system
            .entry(system.to_string())
            .or_default()
            .push(plugin);
    }

    /// Steps for one job, in registration order. Unknown systems get none.
    pub fn steps_for(&self, system: &str) -> PluginSteps {
        let mut steps = PluginSteps::default();
        let Some(plugins) = self.by_system.get(system) else {
            return steps;
        };
        for plugin in plugins {
            let hooks = plugin.hooks();
            if hooks.before {
                steps.before.push(PluginStep {
                    plugin: Arc::clone(plugin),
                    record_id: RecordId::new(),
                });
            }
            if hooks.after {
                steps.after.push(PluginStep {
                    plugin: Arc::clone(plugin),
                    record_id: RecordId::new(),
                });
            }
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_adapters::{PluginHooks, TestPlugin};

    #[test]
    fn partitions_by_hooks_with_distinct_records() {
        let mut registry = PluginRegistry::new();
        registry.register("build", Arc::new(TestPlugin::new("prep", PluginHooks::BEFORE)));
        registry.register("build", Arc::new(TestPlugin::new("publish", PluginHooks::AFTER)));
        registry.register("build", Arc::new(TestPlugin::new("span", PluginHooks::BOTH)));

        let steps = registry.steps_for("build");
        assert_eq!(steps.before.len(), 2);
        assert_eq!(steps.after.len(), 2);
        assert_eq!(steps.before[0].plugin.name(), "prep");
        assert_eq!(steps.before[1].plugin.name(), "span");
        assert_eq!(steps.after[0].plugin.name(), "publish");
        assert_eq!(steps.after[1].plugin.name(), "span");
        // even a both-hook plugin gets a record per appearance
        assert_ne!(steps.before[1].record_id, steps.after[1].record_id);
    }

    #[test]
    fn unknown_system_gets_no_steps() {
        let registry = PluginRegistry::new();
        let steps = registry.steps_for("release");
        assert!(steps.before.is_empty());
        assert!(steps.after.is_empty());
    }
}
