//! Data model of the component-metadata provider consumed by the `DexFlow`
//! graph engine.
//!
//! The provider (an external package/manifest parser) discovers the
//! application components, their kinds, and the callback methods declared in
//! layout resources. The lifecycle ordering tables are domain configuration
//! injected alongside, never derived: this crate ships the stock Android
//! orderings as defaults.

pub mod components;
pub mod errors;
pub mod lifecycle;

pub use components::{Component, ComponentKind, ComponentModel};
pub use errors::{ComponentError, ComponentResult};
pub use lifecycle::{LifecycleConfig, LifecycleTemplate};
