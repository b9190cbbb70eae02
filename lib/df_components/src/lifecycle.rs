//! Lifecycle ordering templates.
//!
//! The order in which the Android runtime drives a component through its
//! lifecycle methods is platform knowledge, not something any algorithm can
//! derive from bytecode. It is therefore injected as configuration: a
//! template per component kind, listing the method names invoked before the
//! component becomes interactive (`setup`) and after it stops being so
//! (`teardown`). Methods absent from a class are simply skipped when the
//! template is instantiated.

use crate::components::ComponentKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleTemplate {
    setup: Vec<String>,
    teardown: Vec<String>,
}

impl LifecycleTemplate {
    pub fn new<S, T>(setup: S, teardown: T) -> Self
    where
        S: IntoIterator<Item = &'static str>,
        T: IntoIterator<Item = &'static str>,
    {
        Self {
            setup: setup.into_iter().map(str::to_string).collect(),
            teardown: teardown.into_iter().map(str::to_string).collect(),
        }
    }

    #[inline]
    pub fn setup(&self) -> impl Iterator<Item = &str> {
        self.setup.iter().map(String::as_str)
    }

    #[inline]
    pub fn teardown(&self) -> impl Iterator<Item = &str> {
        self.teardown.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    templates: BTreeMap<ComponentKind, LifecycleTemplate>,
}

impl Default for LifecycleConfig {
    /// The stock Android orderings.
    fn default() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(
            ComponentKind::Activity,
            LifecycleTemplate::new(
                ["onCreate", "onStart", "onResume"],
                ["onPause", "onStop", "onDestroy"],
            ),
        );
        templates.insert(
            ComponentKind::Fragment,
            LifecycleTemplate::new(
                [
                    "onAttach",
                    "onCreate",
                    "onCreateView",
                    "onViewCreated",
                    "onActivityCreated",
                    "onStart",
                    "onResume",
                ],
                [
                    "onPause",
                    "onStop",
                    "onDestroyView",
                    "onDestroy",
                    "onDetach",
                ],
            ),
        );
        templates.insert(
            ComponentKind::Service,
            LifecycleTemplate::new(
                ["onCreate", "onStartCommand", "onBind"],
                ["onUnbind", "onDestroy"],
            ),
        );
        templates.insert(
            ComponentKind::Receiver,
            LifecycleTemplate::new(["onReceive"], []),
        );
        templates.insert(
            ComponentKind::Application,
            LifecycleTemplate::new(["onCreate"], ["onTerminate"]),
        );
        Self { templates }
    }
}

impl LifecycleConfig {
    #[must_use]
    pub fn template(&self, kind: ComponentKind) -> Option<&LifecycleTemplate> {
        self.templates.get(&kind)
    }

    pub fn set_template(&mut self, kind: ComponentKind, template: LifecycleTemplate) {
        self.templates.insert(kind, template);
    }
}
