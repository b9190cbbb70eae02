//! Discovered application components.

use crate::errors::{ComponentError, ComponentResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Activity,
    Fragment,
    Service,
    Receiver,
    Application,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Activity => write!(f, "activity"),
            Self::Fragment => write!(f, "fragment"),
            Self::Service => write!(f, "service"),
            Self::Receiver => write!(f, "receiver"),
            Self::Application => write!(f, "application"),
        }
    }
}

/// One discovered component.
///
/// `callbacks` holds the layout-declared callback method names owned by the
/// component (e.g. `android:onClick` handlers); `host` is set for fragments
/// and names the component the fragment is attached to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    class_name: String,
    kind: ComponentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(default)]
    callbacks: Vec<String>,
}

impl Component {
    pub fn new(class_name: &str, kind: ComponentKind) -> Self {
        Self {
            class_name: class_name.replace('/', "."),
            kind,
            host: None,
            callbacks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.replace('/', "."));
        self
    }

    #[must_use]
    pub fn with_callbacks<C: IntoIterator<Item = String>>(mut self, callbacks: C) -> Self {
        self.callbacks = callbacks.into_iter().collect();
        self
    }

    #[inline]
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[inline]
    pub fn callbacks(&self) -> impl Iterator<Item = &str> {
        self.callbacks.iter().map(String::as_str)
    }
}

/// The whole component-metadata dump for one application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentModel {
    package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    main_component: Option<String>,
    #[serde(default)]
    components: Vec<Component>,
}

impl ComponentModel {
    pub fn new(package: &str, main_component: Option<&str>) -> Self {
        Self {
            package: package.to_string(),
            main_component: main_component.map(|m| m.replace('/', ".")),
            components: Vec::new(),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> ComponentResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> ComponentResult<Self> {
        let model: Self = serde_json::from_reader(reader)?;
        if model.package.is_empty() {
            return Err(ComponentError::MissingMetadata("package name".to_string()));
        }
        log::debug!(
            "component model for package {}: {} components",
            model.package,
            model.components.len()
        );
        Ok(model)
    }

    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    #[inline]
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    #[inline]
    #[must_use]
    pub fn main_component(&self) -> Option<&str> {
        self.main_component.as_deref()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    #[must_use]
    pub fn get(&self, class_name: &str) -> Option<&Component> {
        self.components
            .iter()
            .find(|c| c.class_name() == class_name)
    }

    pub fn of_kind(&self, kind: ComponentKind) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(move |c| c.kind() == kind)
    }

    /// Fragments hosted by the given component.
    pub fn hosted_fragments<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a Component> {
        self.components
            .iter()
            .filter(move |c| c.kind() == ComponentKind::Fragment && c.host() == Some(host))
    }
}
