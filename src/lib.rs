//! # `DexFlow`
//!
//! `dexflow` is the main crate of the `DexFlow` Android bytecode graph
//! project. The project is subdivided into multiple crates, `dexflow` acts as
//! entry point by reexporting important structs and functions from those
//! sub-crates. Most of the reexports are done within the `dexflow::prelude`
//! namespace.
//!
//! ## Library basics
//!
//! The engine consumes two provider files: a code model (decoded instruction
//! streams, one entry per method) and a component model (application
//! components with their lifecycle metadata). From those it builds the graph
//! layers everything else runs on:
//!
//! ```rust,no_run
//! use dexflow::prelude::*;
//!
//! let model = CodeModel::open("demo/model.json")?;
//! let sig: MethodSig = "com.example.Main->onCreate(Landroid.os.Bundle;)V".parse()?;
//! let cfg = IntraCfg::build(model.require_method(&sig)?, Mode::Instruction)?;
//! println!("cfg size: {}", cfg.graph().vertex_count());
//! # Ok::<(), DfError>(())
//! ```
//!
//! The application-wide graph additionally needs the component model, a
//! class hierarchy and a lifecycle configuration:
//!
//! ```rust,no_run
//! use dexflow::prelude::*;
//!
//! let model = CodeModel::open("demo/model.json")?;
//! let components = ComponentModel::open("demo/components.json")?;
//! let hierarchy = Hierarchy::build(&model);
//! let inter = InterCfg::build(
//!     &model,
//!     &hierarchy,
//!     &components,
//!     &LifecycleConfig::default(),
//!     &GraphOptions::default(),
//! )?;
//! println!("methods count: {}", inter.nb_methods());
//! # Ok::<(), DfError>(())
//! ```
//!
//! ## Sub-crates
//!
//! The `DexFlow` project is divided into several crates. Some of them are
//! (completely or partially) re-exported as parts of [`prelude`], but some
//! features may be accessible only by importing a given sub-crate. Here is a
//! list of those sub-crates:
//!
//!  - [`df_instr`] (instruction streams) and [`df_components`] (application
//!    components and lifecycle templates) contain the definitions, types and
//!    basic accessors, setters and constructors for the two provider data
//!    models the engine consumes,
//!  - [`df_graphs`] contains all the graph construction and derivation
//!    algorithms and relies heavily on the previously cited crates.

mod errors;
mod inputs;

pub mod cli;
pub mod df_calltree;
pub mod df_cfg;
pub mod df_lookup;

pub use df_components as components;
pub use df_graphs as graphs;
pub use df_instr as instr;

/// Reexport module of commonly used structures and functions from `DexFlow`
/// project sub-crates:
///
/// ```rust
/// use dexflow::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{DfError, DfResult};

    pub use df_components::{Component, ComponentKind, ComponentModel, LifecycleConfig};

    pub use df_graphs::{
        default_excludes, BaseGraph, CallTree, ControlDependenceGraph, Hierarchy, InterCfg,
        IntraCfg, Mode, Options as GraphOptions, PostDominatorTree, Trace, GLOBAL_ENTRY,
    };

    pub use df_instr::{CodeModel, MethodSig};

    use clap::ArgMatches;

    pub fn init_logger(args: &ArgMatches) {
        let env = env_logger::Env::new()
            .filter_or("DF_LOG", "info")
            .write_style("DF_LOG_STYLE");

        let mut builder = env_logger::Builder::from_env(env);
        if args.get_flag("verbose") {
            builder.filter_level(log::LevelFilter::Trace);
        } else if args.get_flag("debug") {
            builder.filter_level(log::LevelFilter::Debug);
        }
        if args.get_flag("ecslog") {
            builder.format(ecs_logger::format);
        }
        builder.init();
    }
}
