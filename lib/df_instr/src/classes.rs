//! Classes, method bodies and the application code model.

use crate::errors::{InstrError, InstrResult};
use crate::instrs::Instr;
use crate::method::MethodSig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// The decoded body of one method: its ordered instruction stream plus the
/// code addresses where execution may enter the method (the first
/// instruction, and exception handler entries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodBody {
    sig: MethodSig,
    instrs: Vec<Instr>,
    /// Beginning-of-method indices, handler entries included.
    #[serde(default)]
    entries: BTreeSet<u32>,
    /// Try-block handler entry addresses (subset of `entries`).
    #[serde(default)]
    handlers: BTreeSet<u32>,
}

impl MethodBody {
    pub fn new(sig: MethodSig, instrs: Vec<Instr>) -> Self {
        Self {
            sig,
            instrs,
            entries: BTreeSet::new(),
            handlers: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_handlers<H: IntoIterator<Item = u32>>(mut self, handlers: H) -> Self {
        self.handlers = handlers.into_iter().collect();
        self.entries.extend(self.handlers.iter().copied());
        self
    }

    #[inline]
    #[must_use]
    pub fn sig(&self) -> &MethodSig {
        &self.sig
    }

    #[inline]
    pub fn iter_instructions(&self) -> impl Iterator<Item = &Instr> {
        self.instrs.iter()
    }

    #[must_use]
    pub fn nb_instructions(&self) -> usize {
        self.instrs.len()
    }

    #[must_use]
    pub fn instr_at(&self, index: u32) -> Option<&Instr> {
        self.instrs
            .binary_search_by_key(&index, Instr::index)
            .ok()
            .map(|i| &self.instrs[i])
    }

    /// Indices where execution may enter the method. Falls back to the first
    /// instruction when the provider declared none explicitly.
    #[must_use]
    pub fn beginnings(&self) -> BTreeSet<u32> {
        let mut beginnings = self.entries.clone();
        if let Some(first) = self.instrs.first() {
            beginnings.insert(first.index());
        }
        beginnings
    }

    #[inline]
    #[must_use]
    pub fn handlers(&self) -> &BTreeSet<u32> {
        &self.handlers
    }
}

/// One class of the analyzed application, with its inheritance links and
/// decoded method bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDef {
    name: String,
    #[serde(default)]
    superclass: Option<String>,
    #[serde(default)]
    interfaces: Vec<String>,
    #[serde(default)]
    methods: Vec<MethodBody>,
}

impl ClassDef {
    pub fn new(name: &str, superclass: Option<&str>) -> Self {
        Self {
            name: name.replace('/', "."),
            superclass: superclass.map(|s| s.replace('/', ".")),
            interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_interfaces<I: IntoIterator<Item = String>>(mut self, interfaces: I) -> Self {
        self.interfaces = interfaces
            .into_iter()
            .map(|i| i.replace('/', "."))
            .collect();
        self
    }

    pub fn push_method(&mut self, body: MethodBody) {
        self.methods.push(body);
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    #[inline]
    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.interfaces.iter().map(String::as_str)
    }

    #[inline]
    pub fn iter_methods(&self) -> impl Iterator<Item = &MethodBody> {
        self.methods.iter()
    }
}

/// The whole provider dump: every decoded class of the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeModel {
    classes: Vec<ClassDef>,
    #[serde(skip)]
    class_ids: BTreeMap<String, usize>,
    #[serde(skip)]
    method_ids: BTreeMap<String, (usize, usize)>,
}

impl CodeModel {
    pub fn new(classes: Vec<ClassDef>) -> Self {
        let mut model = Self {
            classes,
            class_ids: BTreeMap::new(),
            method_ids: BTreeMap::new(),
        };
        model.reindex();
        model
    }

    pub fn open<P: AsRef<Path>>(path: P) -> InstrResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> InstrResult<Self> {
        let mut model: Self = serde_json::from_reader(reader)?;
        model.reindex();
        log::debug!(
            "decoded instruction streams for {} methods in {} classes",
            model.nb_methods(),
            model.nb_classes()
        );
        Ok(model)
    }

    fn reindex(&mut self) {
        self.class_ids.clear();
        self.method_ids.clear();
        for (ci, class) in self.classes.iter().enumerate() {
            self.class_ids.insert(class.name().to_string(), ci);
            for (mi, body) in class.methods.iter().enumerate() {
                self.method_ids.insert(body.sig().to_string(), (ci, mi));
            }
        }
    }

    #[inline]
    pub fn iter_classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.iter()
    }

    pub fn iter_methods(&self) -> impl Iterator<Item = &MethodBody> {
        self.classes.iter().flat_map(ClassDef::iter_methods)
    }

    #[must_use]
    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.class_ids.get(name).map(|ci| &self.classes[*ci])
    }

    #[must_use]
    pub fn method(&self, sig: &MethodSig) -> Option<&MethodBody> {
        self.method_ids
            .get(&sig.to_string())
            .map(|(ci, mi)| &self.classes[*ci].methods[*mi])
    }

    /// Any method of `class` carrying the given simple name, prototypes
    /// notwithstanding.
    pub fn methods_named<'a>(
        &'a self,
        class: &str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a MethodBody> {
        self.class(class)
            .into_iter()
            .flat_map(ClassDef::iter_methods)
            .filter(move |body| body.sig().name() == name)
    }

    /// Fails when a method claimed to exist has no instruction stream.
    pub fn require_method(&self, sig: &MethodSig) -> InstrResult<&MethodBody> {
        self.method(sig)
            .ok_or_else(|| InstrError::MethodNotFound(sig.to_string()))
    }

    #[must_use]
    pub fn nb_classes(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn nb_methods(&self) -> usize {
        self.method_ids.len()
    }
}
