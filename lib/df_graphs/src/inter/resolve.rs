//! Call-site resolution.
//!
//! A fixed, ordered table of call-shape detectors runs before generic
//! virtual-dispatch resolution. Each detector recognizes a framework calling
//! pattern from the nominal target signature and either substitutes the
//! methods actually driven by the runtime, synthesizes the callback chain
//! the runtime would execute, or defers the target to the callbacks loop of
//! a component. Everything here over-approximates on purpose: connecting to
//! every candidate trades precision for soundness.

use crate::hierarchy::Hierarchy;
use df_components::{ComponentKind, ComponentModel};
use df_instr::{ClassDef, CodeModel, MethodSig};
use lazy_static::lazy_static;
use std::collections::BTreeMap;

/// Outcome of resolving one call site.
#[derive(Debug, Clone)]
pub(super) enum Resolution {
    /// Alternative concrete targets; the call site connects to all of them.
    Targets(Vec<MethodSig>),
    /// Methods the runtime invokes in sequence; absent members are skipped.
    Chain(Vec<MethodSig>),
    /// A callback registration: the method runs from the owning component's
    /// callbacks loop, not from the call site.
    Callback(MethodSig),
}

pub(super) struct DetectCtx<'a> {
    pub model: &'a CodeModel,
    pub hierarchy: &'a Hierarchy,
    pub components: &'a ComponentModel,
    pub caller_class: &'a str,
}

type Detector = fn(&DetectCtx, &MethodSig) -> Option<Resolution>;

static DETECTORS: &[(&str, Detector)] = &[
    ("component-start", detect_component_start),
    ("reflective-instantiation", detect_reflection),
    ("thread-start", detect_thread),
    ("scheduled-callback", detect_scheduled),
    ("broadcast-dispatch", detect_broadcast),
    ("async-task", detect_async_task),
    ("listener-registration", detect_listener),
    ("dialog-creation", detect_dialog),
    ("database-lifecycle", detect_database),
];

lazy_static! {
    /// Registration method name to the callback it arms.
    static ref LISTENER_CALLBACKS: BTreeMap<&'static str, &'static str> = BTreeMap::from([
        ("setOnClickListener", "onClick"),
        ("setOnLongClickListener", "onLongClick"),
        ("setOnItemClickListener", "onItemClick"),
        ("setOnItemSelectedListener", "onItemSelected"),
        ("setOnTouchListener", "onTouch"),
        ("setOnKeyListener", "onKey"),
        ("setOnFocusChangeListener", "onFocusChange"),
        ("setOnCheckedChangeListener", "onCheckedChanged"),
        ("setOnSeekBarChangeListener", "onProgressChanged"),
        ("setOnEditorActionListener", "onEditorAction"),
        ("setAnimationListener", "onAnimationEnd"),
        ("setOnCompletionListener", "onCompletion"),
        ("setOnPreparedListener", "onPrepared"),
        ("setOnErrorListener", "onError"),
        ("setOnAudioFocusChangeListener", "onAudioFocusChange"),
    ]);
}

/// Resolves one call site, detectors first, virtual dispatch second.
pub(super) fn resolve(ctx: &DetectCtx, target: &MethodSig) -> Resolution {
    for (name, detector) in DETECTORS {
        if let Some(resolution) = detector(ctx, target) {
            log::trace!("call shape {name} matched for {target}");
            return resolution;
        }
    }
    Resolution::Targets(ctx.hierarchy.resolution_set(ctx.model, target))
}

const ACTIVITY_STARTERS: [&str; 4] = [
    "startActivity",
    "startActivityForResult",
    "startActivityIfNeeded",
    "startActivities",
];
const SERVICE_STARTERS: [&str; 3] = ["startService", "startForegroundService", "bindService"];
const BROADCAST_SENDERS: [&str; 3] = [
    "sendBroadcast",
    "sendOrderedBroadcast",
    "sendStickyBroadcast",
];

/// A component start resolves to the target component's constructors, never
/// to the framework body. Intent contents are not tracked, so every
/// component of the matching kind is a candidate.
fn detect_component_start(ctx: &DetectCtx, target: &MethodSig) -> Option<Resolution> {
    if ACTIVITY_STARTERS.contains(&target.name()) {
        return Some(Resolution::Targets(component_constructors(
            ctx,
            ComponentKind::Activity,
        )));
    }
    if SERVICE_STARTERS.contains(&target.name()) {
        return Some(Resolution::Targets(component_constructors(
            ctx,
            ComponentKind::Service,
        )));
    }
    None
}

fn detect_reflection(ctx: &DetectCtx, target: &MethodSig) -> Option<Resolution> {
    let reflective = target.name() == "newInstance"
        && matches!(
            target.class_name(),
            "java.lang.Class" | "java.lang.reflect.Constructor"
        );
    if !reflective {
        return None;
    }
    // the instantiated class is unknowable statically; every constructor
    // in the application package is a candidate
    let prefix = ctx.components.package();
    let sigs = ctx
        .model
        .iter_classes()
        .filter(|c| c.name().starts_with(prefix))
        .flat_map(ClassDef::iter_methods)
        .filter(|b| b.sig().is_constructor())
        .map(|b| b.sig().clone())
        .collect();
    Some(Resolution::Targets(sigs))
}

fn detect_thread(ctx: &DetectCtx, target: &MethodSig) -> Option<Resolution> {
    if target.name() == "start"
        && ctx
            .hierarchy
            .is_subtype_of(target.class_name(), "java.lang.Thread")
    {
        return Some(Resolution::Targets(named_with_subtypes(
            ctx,
            target.class_name(),
            "run",
        )));
    }
    if matches!(target.name(), "execute" | "submit") && target.class_name().contains("Executor") {
        return Some(Resolution::Targets(named_with_subtypes(
            ctx,
            "java.lang.Runnable",
            "run",
        )));
    }
    None
}

fn detect_scheduled(ctx: &DetectCtx, target: &MethodSig) -> Option<Resolution> {
    let handler = ctx
        .hierarchy
        .is_subtype_of(target.class_name(), "android.os.Handler")
        || target.class_name() == "android.os.Handler";
    if handler && target.name().starts_with("post") {
        return Some(Resolution::Targets(named_with_subtypes(
            ctx,
            "java.lang.Runnable",
            "run",
        )));
    }
    if handler && target.name().starts_with("send") {
        return Some(Resolution::Targets(named_with_subtypes(
            ctx,
            target.class_name(),
            "handleMessage",
        )));
    }
    if matches!(target.name(), "schedule" | "scheduleAtFixedRate")
        && (target.class_name().ends_with("Timer") || target.class_name().contains("Scheduled"))
    {
        let mut sigs = named_with_subtypes(ctx, "java.util.TimerTask", "run");
        sigs.extend(named_with_subtypes(ctx, "java.lang.Runnable", "run"));
        sigs.dedup();
        return Some(Resolution::Targets(sigs));
    }
    None
}

/// Broadcast contents are not tracked: dispatch to every declared receiver.
fn detect_broadcast(ctx: &DetectCtx, target: &MethodSig) -> Option<Resolution> {
    if !BROADCAST_SENDERS.contains(&target.name()) {
        return None;
    }
    let mut sigs = Vec::new();
    for receiver in ctx.components.of_kind(ComponentKind::Receiver) {
        sigs.extend(
            ctx.model
                .methods_named(receiver.class_name(), "onReceive")
                .map(|b| b.sig().clone()),
        );
    }
    Some(Resolution::Targets(sigs))
}

/// `execute` on an AsyncTask runs the four phase methods in order.
fn detect_async_task(ctx: &DetectCtx, target: &MethodSig) -> Option<Resolution> {
    if !matches!(target.name(), "execute" | "executeOnExecutor")
        || !ctx
            .hierarchy
            .is_subtype_of(target.class_name(), "android.os.AsyncTask")
    {
        return None;
    }
    let chain = [
        "onPreExecute",
        "doInBackground",
        "onProgressUpdate",
        "onPostExecute",
    ]
    .iter()
    .filter_map(|name| named(ctx.model, target.class_name(), name))
    .collect();
    Some(Resolution::Chain(chain))
}

/// Listener registrations defer the armed callback to the component's
/// callbacks loop. The listener object is not tracked, so the callback is
/// looked up by name, caller class first, declared components second.
fn detect_listener(ctx: &DetectCtx, target: &MethodSig) -> Option<Resolution> {
    let callback = LISTENER_CALLBACKS.get(target.name())?;
    if let Some(sig) = named(ctx.model, ctx.caller_class, callback) {
        return Some(Resolution::Callback(sig));
    }
    for component in ctx.components.iter() {
        if let Some(sig) = named(ctx.model, component.class_name(), callback) {
            return Some(Resolution::Callback(sig));
        }
    }
    None
}

fn detect_dialog(ctx: &DetectCtx, target: &MethodSig) -> Option<Resolution> {
    let builder_show = matches!(target.name(), "show" | "create")
        && target.class_name().contains("AlertDialog");
    if !builder_show && target.name() != "showDialog" {
        return None;
    }
    let chain = ["onCreateDialog", "onPrepareDialog"]
        .iter()
        .filter_map(|name| named(ctx.model, ctx.caller_class, name))
        .collect();
    Some(Resolution::Chain(chain))
}

fn detect_database(ctx: &DetectCtx, target: &MethodSig) -> Option<Resolution> {
    if !matches!(target.name(), "getWritableDatabase" | "getReadableDatabase")
        || !ctx
            .hierarchy
            .is_subtype_of(target.class_name(), "android.database.sqlite.SQLiteOpenHelper")
    {
        return None;
    }
    let chain = ["onCreate", "onUpgrade", "onOpen"]
        .iter()
        .filter_map(|name| named(ctx.model, target.class_name(), name))
        .collect();
    Some(Resolution::Chain(chain))
}

fn named(model: &CodeModel, class: &str, name: &str) -> Option<MethodSig> {
    model.methods_named(class, name).next().map(|b| b.sig().clone())
}

/// Decoded methods carrying `name` on `class` or any of its subtypes,
/// deterministically ordered.
fn named_with_subtypes(ctx: &DetectCtx, class: &str, name: &str) -> Vec<MethodSig> {
    let mut classes: Vec<String> = vec![class.to_string()];
    classes.extend(ctx.hierarchy.subtypes(class));
    classes.sort_unstable();
    classes.dedup();
    let mut sigs = Vec::new();
    for c in &classes {
        sigs.extend(ctx.model.methods_named(c, name).map(|b| b.sig().clone()));
    }
    sigs
}

fn component_constructors(ctx: &DetectCtx, kind: ComponentKind) -> Vec<MethodSig> {
    let mut sigs = Vec::new();
    for component in ctx.components.of_kind(kind) {
        sigs.extend(
            ctx.model
                .class(component.class_name())
                .into_iter()
                .flat_map(ClassDef::iter_methods)
                .filter(|b| b.sig().is_constructor())
                .map(|b| b.sig().clone()),
        );
    }
    sigs
}
