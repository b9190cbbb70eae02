//! Lifecycle synthesis.
//!
//! Components are not called from anywhere in the bytecode: the runtime
//! drives them. This module materializes that driving as graph structure,
//! chaining each component's lifecycle methods in the injected template
//! order, with a self-looping callbacks vertex standing for the interactive
//! phase between setup and teardown.

use super::Stub;
use crate::base::{BaseGraph, NodeIndex};
use crate::statement::Statement;
use crate::vertex::Vertex;
use df_components::{Component, ComponentKind, ComponentModel, LifecycleConfig};
use df_instr::{ClassDef, CodeModel, MethodSig};
use std::collections::HashMap;

/// Name of the pseudo-method standing for a component's interactive phase.
#[must_use]
pub fn callbacks_method(class: &str) -> String {
    format!("{class}->callbacks()V")
}

pub(super) fn synthesize(
    graph: &mut BaseGraph,
    stubs: &mut HashMap<String, Stub>,
    model: &CodeModel,
    components: &ComponentModel,
    lifecycle: &LifecycleConfig,
    pending: &[(String, MethodSig)],
) {
    wire_static_initializers(graph, stubs);
    for component in components.iter() {
        // hosted fragments are spliced into their host's chain
        if component.kind() == ComponentKind::Fragment && component.host().is_some() {
            continue;
        }
        synthesize_component(graph, stubs, model, components, lifecycle, component);
    }
    attach_pending_callbacks(graph, stubs, components, pending);

    if graph.successors(graph.entry_index()).is_empty() {
        log::warn!("no component chain to attach, wiring every method from the global entry");
        let entries: Vec<NodeIndex> = stubs.values().map(|s| s.entry).collect();
        let entry = graph.entry_index();
        for e in entries {
            graph.add_edge(entry, e);
        }
    }
}

/// Static initializers run before anything else; the global entry reaches
/// them directly.
fn wire_static_initializers(graph: &mut BaseGraph, stubs: &HashMap<String, Stub>) {
    let clinits: Vec<NodeIndex> = stubs
        .iter()
        .filter(|(name, _)| name.contains("-><clinit>("))
        .map(|(_, stub)| stub.entry)
        .collect();
    let entry = graph.entry_index();
    for id in clinits {
        graph.add_edge(entry, id);
    }
}

fn synthesize_component(
    graph: &mut BaseGraph,
    stubs: &mut HashMap<String, Stub>,
    model: &CodeModel,
    components: &ComponentModel,
    lifecycle: &LifecycleConfig,
    component: &Component,
) {
    let class = component.class_name();
    log::debug!("synthesizing {} lifecycle for {class}", component.kind());

    let mut tails = vec![graph.entry_index()];
    step_alternatives(graph, &mut tails, &constructor_stubs(model, stubs, class));
    if let Some(template) = lifecycle.template(component.kind()) {
        for name in template.setup() {
            step_member(graph, stubs, model, &mut tails, class, name);
        }
    }

    // hosted fragments come up after the host's setup
    let fragments: Vec<Component> = components.hosted_fragments(class).cloned().collect();
    for fragment in &fragments {
        step_alternatives(
            graph,
            &mut tails,
            &constructor_stubs(model, stubs, fragment.class_name()),
        );
        if let Some(template) = lifecycle.template(ComponentKind::Fragment) {
            for name in template.setup() {
                step_member(graph, stubs, model, &mut tails, fragment.class_name(), name);
            }
        }
    }

    let cb_name = callbacks_method(class);
    let cb = graph.add_vertex(Vertex::new(Statement::Entry {
        method: cb_name.clone(),
    }));
    graph.add_edge(cb, cb);
    stubs.insert(cb_name, Stub { entry: cb, exit: cb });
    for t in &tails {
        graph.add_edge(*t, cb);
    }

    attach_declared_callbacks(graph, stubs, model, cb, component);
    for fragment in &fragments {
        attach_declared_callbacks(graph, stubs, model, cb, fragment);
    }

    // fragments go down before their host
    let mut tails = vec![cb];
    for fragment in &fragments {
        if let Some(template) = lifecycle.template(ComponentKind::Fragment) {
            for name in template.teardown() {
                step_member(graph, stubs, model, &mut tails, fragment.class_name(), name);
            }
        }
    }
    if let Some(template) = lifecycle.template(component.kind()) {
        for name in template.teardown() {
            step_member(graph, stubs, model, &mut tails, class, name);
        }
    }
    let exit = graph.exit_index();
    for t in tails {
        graph.add_edge(t, exit);
    }
}

/// Advances the chain through one template member, skipping it when the
/// class has no decoded method of that name.
fn step_member(
    graph: &mut BaseGraph,
    stubs: &HashMap<String, Stub>,
    model: &CodeModel,
    tails: &mut Vec<NodeIndex>,
    class: &str,
    name: &str,
) {
    let Some(stub) = member_stub(stubs, model, class, name) else {
        log::trace!("absent lifecycle member skipped: {class}->{name}");
        return;
    };
    for t in tails.iter() {
        graph.add_edge(*t, stub.entry);
    }
    *tails = vec![stub.exit];
}

/// Advances the chain through alternative members (e.g. overloaded
/// constructors): every alternative is entered, all their exits become the
/// new tails.
fn step_alternatives(graph: &mut BaseGraph, tails: &mut Vec<NodeIndex>, alternatives: &[Stub]) {
    if alternatives.is_empty() {
        return;
    }
    let mut next = Vec::new();
    for stub in alternatives {
        for t in tails.iter() {
            graph.add_edge(*t, stub.entry);
        }
        next.push(stub.exit);
    }
    *tails = next;
}

fn member_stub(
    stubs: &HashMap<String, Stub>,
    model: &CodeModel,
    class: &str,
    name: &str,
) -> Option<Stub> {
    model
        .methods_named(class, name)
        .find_map(|b| stubs.get(&b.sig().to_string()).copied())
}

fn constructor_stubs(model: &CodeModel, stubs: &HashMap<String, Stub>, class: &str) -> Vec<Stub> {
    model
        .class(class)
        .into_iter()
        .flat_map(ClassDef::iter_methods)
        .filter(|b| b.sig().is_constructor())
        .filter_map(|b| stubs.get(&b.sig().to_string()).copied())
        .collect()
}

/// Layout-declared callbacks loop in and out of the callbacks vertex.
fn attach_declared_callbacks(
    graph: &mut BaseGraph,
    stubs: &HashMap<String, Stub>,
    model: &CodeModel,
    cb: NodeIndex,
    component: &Component,
) {
    for name in component.callbacks() {
        match member_stub(stubs, model, component.class_name(), name) {
            Some(stub) => {
                graph.add_edge(cb, stub.entry);
                graph.add_edge(stub.exit, cb);
            }
            None => log::warn!(
                "declared callback without body: {}->{name}",
                component.class_name()
            ),
        }
    }
}

/// Callbacks armed by listener registrations detected during stitching.
fn attach_pending_callbacks(
    graph: &mut BaseGraph,
    stubs: &HashMap<String, Stub>,
    components: &ComponentModel,
    pending: &[(String, MethodSig)],
) {
    for (registering_class, sig) in pending {
        let Some(stub) = stubs.get(&sig.to_string()).copied() else {
            log::warn!("registered callback has no decoded body: {sig}");
            continue;
        };
        let owner = components
            .get(sig.class_name())
            .or_else(|| components.get(registering_class));
        let cb = owner.and_then(|c| stubs.get(&callbacks_method(c.class_name())).copied());
        match cb {
            Some(cb) => {
                graph.add_edge(cb.entry, stub.entry);
                graph.add_edge(stub.exit, cb.entry);
            }
            None => {
                log::debug!("no owning component for callback {sig}, attaching to the global entry");
                let entry = graph.entry_index();
                graph.add_edge(entry, stub.entry);
            }
        }
    }
}
