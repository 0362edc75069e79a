//! Atom substrate: interned, immutable hypergraph terms.
//!
//! An atom is either a **node** (a named leaf) or a **link** (an ordered
//! sequence of child handles), tagged with a [`TypeId`]. Atoms live in a
//! [`Weft`] store and are addressed by [`AtomId`] handles. The store interns
//! by content fingerprint, so handle equality coincides with structural
//! equality, and the atom graph is a DAG by construction: a link may only
//! reference atoms that already exist.
//!
//! Atoms are immutable once published. The only mutable state attached to an
//! atom is its optional side annotations ([`TruthValue`], [`AttentionValue`]),
//! which the symbolic core neither reads nor invalidates.
//!
//! # Determinism
//! - `AtomId`s are dense indices assigned in interning order.
//! - Re-interning a structurally equal atom returns the existing handle.
//! - Numeric leaf names are canonicalized at construction, so `"4"`, `"4.0"`,
//!   and a computed `4.0_f64` intern to one atom.

use crate::fingerprint::{link_fingerprint, node_fingerprint, HashValue};
use crate::registry::{TypeId, NUMBER_NODE, PLUS_LINK, TIMES_LINK, VARIABLE_NODE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Handle to an interned atom.
///
/// Dense index into the store's arena. `Copy`, `Ord`, `Hash`; equality of
/// handles implies structural equality of the atoms they address (within one
/// store).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtomId(u32);

impl AtomId {
    /// Creates an `AtomId` from a raw `u32`.
    ///
    /// The caller must ensure the index refers to an atom of the store it
    /// will be used with; dangling handles make core operations report
    /// "undefined" results rather than panic.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtomId({})", self.0)
    }
}

/// Truth annotation attached to an atom.
///
/// Carried verbatim by the store; never read by reduction or unification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruthValue {
    /// Degree of belief in `[0, 1]`.
    pub strength: f64,
    /// Weight of evidence in `[0, 1]`.
    pub confidence: f64,
}

impl Default for TruthValue {
    fn default() -> Self {
        Self { strength: 1.0, confidence: 0.0 }
    }
}

/// Attention annotation attached to an atom.
///
/// Carried verbatim by the store; never read by reduction or unification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttentionValue {
    /// Short-term importance.
    pub sti: i32,
    /// Long-term importance.
    pub lti: i32,
    /// Very-long-term importance flag.
    pub vlti: bool,
}

/// The payload of an atom: a named leaf or an ordered child sequence.
///
/// Never both: the classification is structural, not a convention.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AtomBody {
    Node { name: Arc<str> },
    Link { children: Arc<[AtomId]> },
}

/// An interned term: type tag plus node or link payload.
///
/// Cheap to clone (payloads are reference-counted slices). Obtained from
/// [`Weft::get`]; there is no way to construct an `Atom` outside a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    ty: TypeId,
    body: AtomBody,
}

impl Atom {
    /// Returns the type tag.
    #[inline]
    pub fn type_of(&self) -> TypeId {
        self.ty
    }

    /// Returns `true` if this atom is a named leaf.
    #[inline]
    pub fn is_node(&self) -> bool {
        matches!(self.body, AtomBody::Node { .. })
    }

    /// Returns `true` if this atom is a link.
    #[inline]
    pub fn is_link(&self) -> bool {
        matches!(self.body, AtomBody::Link { .. })
    }

    /// Returns the number of children; zero for nodes.
    #[inline]
    pub fn arity(&self) -> usize {
        match &self.body {
            AtomBody::Node { .. } => 0,
            AtomBody::Link { children } => children.len(),
        }
    }

    /// Returns the ordered child handles, if this is a link.
    pub fn children(&self) -> Option<Arc<[AtomId]>> {
        match &self.body {
            AtomBody::Node { .. } => None,
            AtomBody::Link { children } => Some(children.clone()),
        }
    }

    /// Returns the name, if this is a node.
    pub fn name(&self) -> Option<Arc<str>> {
        match &self.body {
            AtomBody::Node { name } => Some(name.clone()),
            AtomBody::Link { .. } => None,
        }
    }
}

/// Error type for atom construction.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomError {
    /// A `NumberNode` name does not denote a finite real value.
    InvalidNumber(String),
    /// A link references a handle that is not interned in this store.
    DanglingChild(AtomId),
    /// An annotation or accessor was addressed to an unknown handle.
    UnknownHandle(AtomId),
}

impl fmt::Display for AtomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomError::InvalidNumber(name) => {
                write!(f, "'{}' does not denote a finite number", name)
            }
            AtomError::DanglingChild(id) => write!(f, "child {} is not in this store", id),
            AtomError::UnknownHandle(id) => write!(f, "{} is not in this store", id),
        }
    }
}

impl std::error::Error for AtomError {}

struct AtomRecord {
    atom: Atom,
    fingerprint: HashValue,
    truth: Option<TruthValue>,
    attention: Option<AttentionValue>,
}

#[derive(Default)]
struct StoreInner {
    atoms: Vec<AtomRecord>,
    index: HashMap<HashValue, AtomId>,
}

impl StoreInner {
    fn intern(&mut self, atom: Atom, fingerprint: HashValue) -> AtomId {
        if let Some(&existing) = self.index.get(&fingerprint) {
            return existing;
        }
        let id = AtomId(self.atoms.len() as u32);
        tracing::debug!(id = id.0, ty = atom.ty.as_u16(), "interned new atom");
        self.atoms.push(AtomRecord { atom, fingerprint, truth: None, attention: None });
        self.index.insert(fingerprint, id);
        id
    }
}

/// Content-addressed store of interned atoms.
///
/// The store is `Sync`: interning takes `&self` behind an `RwLock`, so any
/// number of threads may read concurrently, and interning writes serialize
/// against readers. Published atoms are never mutated or removed.
pub struct Weft {
    inner: RwLock<StoreInner>,
}

impl Weft {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self { inner: RwLock::new(StoreInner::default()) }
    }

    /// Returns the number of interned atoms.
    pub fn len(&self) -> usize {
        self.read().atoms.len()
    }

    /// Returns `true` if no atoms are interned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().expect("atom store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().expect("atom store lock poisoned")
    }

    /// Interns a named leaf and returns its handle.
    ///
    /// Idempotent with respect to structural equality. For [`NUMBER_NODE`]
    /// (and subtypes registered under it by callers that pass such tags), the
    /// name must parse as a finite decimal and is canonicalized, so distinct
    /// spellings of one value intern to one atom.
    pub fn make_node(&self, ty: TypeId, name: &str) -> Result<AtomId, AtomError> {
        let name: Arc<str> = if ty == NUMBER_NODE {
            let value: f64 =
                name.trim().parse().map_err(|_| AtomError::InvalidNumber(name.to_string()))?;
            if !value.is_finite() {
                return Err(AtomError::InvalidNumber(name.to_string()));
            }
            canonical_number_name(value).into()
        } else {
            name.into()
        };
        let fingerprint = node_fingerprint(ty, &name);
        let atom = Atom { ty, body: AtomBody::Node { name } };
        Ok(self.write().intern(atom, fingerprint))
    }

    /// Interns a link over existing atoms and returns its handle.
    ///
    /// Idempotent with respect to structural equality. Every child must
    /// already be interned in this store, which keeps the term graph acyclic.
    pub fn make_link(&self, ty: TypeId, children: &[AtomId]) -> Result<AtomId, AtomError> {
        let fingerprint = {
            let inner = self.read();
            let mut child_fps = Vec::with_capacity(children.len());
            for &child in children {
                let record = inner
                    .atoms
                    .get(child.0 as usize)
                    .ok_or(AtomError::DanglingChild(child))?;
                child_fps.push(record.fingerprint);
            }
            link_fingerprint(ty, &child_fps)
        };
        let atom = Atom { ty, body: AtomBody::Link { children: children.into() } };
        Ok(self.write().intern(atom, fingerprint))
    }

    /// Interns the [`NUMBER_NODE`] for a finite value.
    pub fn number(&self, value: f64) -> Result<AtomId, AtomError> {
        if !value.is_finite() {
            return Err(AtomError::InvalidNumber(value.to_string()));
        }
        self.make_node(NUMBER_NODE, &canonical_number_name(value))
    }

    /// Interns the [`VARIABLE_NODE`] with the given name.
    pub fn variable(&self, name: &str) -> Result<AtomId, AtomError> {
        self.make_node(VARIABLE_NODE, name)
    }

    /// Interns a [`PLUS_LINK`] over the given children.
    pub fn plus(&self, children: &[AtomId]) -> Result<AtomId, AtomError> {
        self.make_link(PLUS_LINK, children)
    }

    /// Interns a [`TIMES_LINK`] over the given children.
    pub fn times(&self, children: &[AtomId]) -> Result<AtomId, AtomError> {
        self.make_link(TIMES_LINK, children)
    }

    /// Returns a cheap clone of the atom at `h`.
    pub fn get(&self, h: AtomId) -> Option<Atom> {
        self.read().atoms.get(h.0 as usize).map(|r| r.atom.clone())
    }

    /// Returns the type tag of `h`.
    pub fn type_of(&self, h: AtomId) -> Option<TypeId> {
        self.read().atoms.get(h.0 as usize).map(|r| r.atom.ty)
    }

    /// Returns `true` if `h` resolves to a named leaf.
    pub fn is_node(&self, h: AtomId) -> bool {
        self.read().atoms.get(h.0 as usize).is_some_and(|r| r.atom.is_node())
    }

    /// Returns `true` if `h` resolves to a link.
    pub fn is_link(&self, h: AtomId) -> bool {
        self.read().atoms.get(h.0 as usize).is_some_and(|r| r.atom.is_link())
    }

    /// Returns the arity of `h`; zero for nodes and unknown handles.
    pub fn arity(&self, h: AtomId) -> usize {
        self.read().atoms.get(h.0 as usize).map_or(0, |r| r.atom.arity())
    }

    /// Returns the `i`-th child of `h`.
    pub fn child(&self, h: AtomId, i: usize) -> Option<AtomId> {
        match &self.read().atoms.get(h.0 as usize)?.atom.body {
            AtomBody::Link { children } => children.get(i).copied(),
            AtomBody::Node { .. } => None,
        }
    }

    /// Returns the ordered children of `h`, if it is a link.
    pub fn children(&self, h: AtomId) -> Option<Arc<[AtomId]>> {
        self.read().atoms.get(h.0 as usize)?.atom.children()
    }

    /// Returns the name of `h`, if it is a node.
    pub fn name(&self, h: AtomId) -> Option<Arc<str>> {
        self.read().atoms.get(h.0 as usize)?.atom.name()
    }

    /// Returns the numeric value of `h`, if it is a [`NUMBER_NODE`].
    ///
    /// The name is canonicalized at interning time, so the parse cannot fail
    /// on a well-typed atom.
    pub fn number_value(&self, h: AtomId) -> Option<f64> {
        let inner = self.read();
        let record = inner.atoms.get(h.0 as usize)?;
        if record.atom.ty != NUMBER_NODE {
            return None;
        }
        match &record.atom.body {
            AtomBody::Node { name } => name.parse().ok(),
            AtomBody::Link { .. } => None,
        }
    }

    /// Returns the content fingerprint of `h`.
    pub fn fingerprint(&self, h: AtomId) -> Option<HashValue> {
        self.read().atoms.get(h.0 as usize).map(|r| r.fingerprint)
    }

    /// Returns the truth annotation of `h`, if one was set.
    pub fn truth(&self, h: AtomId) -> Option<TruthValue> {
        self.read().atoms.get(h.0 as usize).and_then(|r| r.truth)
    }

    /// Attaches a truth annotation to `h`.
    pub fn set_truth(&self, h: AtomId, tv: TruthValue) -> Result<(), AtomError> {
        let mut inner = self.write();
        let record = inner.atoms.get_mut(h.0 as usize).ok_or(AtomError::UnknownHandle(h))?;
        record.truth = Some(tv);
        Ok(())
    }

    /// Returns the attention annotation of `h`, if one was set.
    pub fn attention(&self, h: AtomId) -> Option<AttentionValue> {
        self.read().atoms.get(h.0 as usize).and_then(|r| r.attention)
    }

    /// Attaches an attention annotation to `h`.
    pub fn set_attention(&self, h: AtomId, av: AttentionValue) -> Result<(), AtomError> {
        let mut inner = self.write();
        let record = inner.atoms.get_mut(h.0 as usize).ok_or(AtomError::UnknownHandle(h))?;
        record.attention = Some(av);
        Ok(())
    }

    /// Serializes the store to CBOR.
    ///
    /// The snapshot carries every atom in interning order together with its
    /// annotations. Handles remain valid across a round trip.
    pub fn to_cbor(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let inner = self.read();
        let records: Vec<SnapshotRecord> = inner
            .atoms
            .iter()
            .map(|r| SnapshotRecord {
                ty: r.atom.ty,
                name: r.atom.name().map(|n| n.to_string()),
                children: r.atom.children().map(|c| c.to_vec()),
                truth: r.truth,
                attention: r.attention,
            })
            .collect();
        let bytes = serde_cbor::to_vec(&records)?;
        Ok(bytes)
    }

    /// Deserializes a store from CBOR produced by [`Weft::to_cbor`].
    ///
    /// Fingerprints and the interning index are rebuilt; a record that is
    /// neither node nor link, or that references a child past its own
    /// position, is rejected.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, Box<dyn std::error::Error>> {
        let records: Vec<SnapshotRecord> = serde_cbor::from_slice(bytes)?;
        let store = Weft::new();
        {
            let mut inner = store.write();
            for record in records {
                let (atom, fingerprint) = match (record.name, record.children) {
                    (Some(name), None) => {
                        let name: Arc<str> = name.into();
                        let fp = node_fingerprint(record.ty, &name);
                        (Atom { ty: record.ty, body: AtomBody::Node { name } }, fp)
                    }
                    (None, Some(children)) => {
                        let mut child_fps = Vec::with_capacity(children.len());
                        for &child in &children {
                            let child_record = inner
                                .atoms
                                .get(child.0 as usize)
                                .ok_or(AtomError::DanglingChild(child))?;
                            child_fps.push(child_record.fingerprint);
                        }
                        let fp = link_fingerprint(record.ty, &child_fps);
                        (
                            Atom { ty: record.ty, body: AtomBody::Link { children: children.into() } },
                            fp,
                        )
                    }
                    _ => return Err(Box::new(AtomError::UnknownHandle(AtomId(0)))),
                };
                let id = AtomId(inner.atoms.len() as u32);
                inner.atoms.push(AtomRecord {
                    atom,
                    fingerprint,
                    truth: record.truth,
                    attention: record.attention,
                });
                inner.index.insert(fingerprint, id);
            }
        }
        Ok(store)
    }
}

impl Default for Weft {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize)]
struct SnapshotRecord {
    ty: TypeId,
    name: Option<String>,
    children: Option<Vec<AtomId>>,
    truth: Option<TruthValue>,
    attention: Option<AttentionValue>,
}

/// Canonical spelling of a finite numeric leaf name.
///
/// Integral values within `i64`'s exactly-representable range print without a
/// fraction; everything else uses Rust's shortest round-trip float formatting.
fn canonical_number_name(value: f64) -> String {
    if value == value.trunc() && value.abs() < 9.007_199_254_740_992e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CONCEPT_NODE, LIST_LINK};

    #[test]
    fn interning_is_idempotent() {
        let space = Weft::new();
        let a = space.make_node(CONCEPT_NODE, "cat").unwrap();
        let b = space.make_node(CONCEPT_NODE, "cat").unwrap();
        assert_eq!(a, b);
        assert_eq!(space.len(), 1);

        let c = space.make_node(CONCEPT_NODE, "dog").unwrap();
        assert_ne!(a, c);
        let l1 = space.make_link(LIST_LINK, &[a, c]).unwrap();
        let l2 = space.make_link(LIST_LINK, &[a, c]).unwrap();
        assert_eq!(l1, l2);
        // Child order is part of the structure.
        let l3 = space.make_link(LIST_LINK, &[c, a]).unwrap();
        assert_ne!(l1, l3);
    }

    #[test]
    fn number_names_canonicalize() {
        let space = Weft::new();
        let a = space.make_node(NUMBER_NODE, "4").unwrap();
        let b = space.make_node(NUMBER_NODE, "4.0").unwrap();
        let c = space.number(4.0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(space.name(a).unwrap().as_ref(), "4");
        assert_eq!(space.number_value(a), Some(4.0));

        let half = space.number(0.5).unwrap();
        assert_eq!(space.name(half).unwrap().as_ref(), "0.5");
        assert_eq!(space.number_value(half), Some(0.5));
    }

    #[test]
    fn invalid_numbers_rejected() {
        let space = Weft::new();
        assert!(matches!(
            space.make_node(NUMBER_NODE, "many"),
            Err(AtomError::InvalidNumber(_))
        ));
        assert!(matches!(space.number(f64::NAN), Err(AtomError::InvalidNumber(_))));
        assert!(matches!(space.number(f64::INFINITY), Err(AtomError::InvalidNumber(_))));
    }

    #[test]
    fn dangling_children_rejected() {
        let space = Weft::new();
        let ghost = AtomId::new(99);
        assert_eq!(
            space.make_link(LIST_LINK, &[ghost]),
            Err(AtomError::DanglingChild(ghost))
        );
    }

    #[test]
    fn accessors() {
        let space = Weft::new();
        let x = space.variable("$x").unwrap();
        let n = space.number(7.0).unwrap();
        let l = space.make_link(LIST_LINK, &[x, n]).unwrap();

        assert!(space.is_node(x));
        assert!(!space.is_link(x));
        assert!(space.is_link(l));
        assert_eq!(space.arity(l), 2);
        assert_eq!(space.child(l, 0), Some(x));
        assert_eq!(space.child(l, 1), Some(n));
        assert_eq!(space.child(l, 2), None);
        assert_eq!(space.children(l).unwrap().as_ref(), &[x, n]);
        assert_eq!(space.name(x).unwrap().as_ref(), "$x");
        assert_eq!(space.type_of(l), Some(LIST_LINK));
        assert_eq!(space.type_of(AtomId::new(50)), None);
        assert_eq!(space.number_value(x), None);
    }

    #[test]
    fn annotations_attach_and_survive() {
        let space = Weft::new();
        let cat = space.make_node(CONCEPT_NODE, "cat").unwrap();
        assert_eq!(space.truth(cat), None);
        let tv = TruthValue { strength: 0.9, confidence: 0.4 };
        space.set_truth(cat, tv).unwrap();
        assert_eq!(space.truth(cat), Some(tv));

        let av = AttentionValue { sti: 10, lti: 2, vlti: false };
        space.set_attention(cat, av).unwrap();
        assert_eq!(space.attention(cat), Some(av));

        let ghost = AtomId::new(42);
        assert_eq!(space.set_truth(ghost, tv), Err(AtomError::UnknownHandle(ghost)));
    }

    #[test]
    fn cbor_round_trip() {
        let space = Weft::new();
        let x = space.variable("$x").unwrap();
        let n = space.number(7.0).unwrap();
        let l = space.make_link(LIST_LINK, &[x, n]).unwrap();
        let tv = TruthValue { strength: 0.8, confidence: 0.2 };
        space.set_truth(l, tv).unwrap();

        let bytes = space.to_cbor().unwrap();
        let restored = Weft::from_cbor(&bytes).unwrap();
        assert_eq!(restored.len(), space.len());
        assert_eq!(restored.children(l).unwrap().as_ref(), &[x, n]);
        assert_eq!(restored.name(x).unwrap().as_ref(), "$x");
        assert_eq!(restored.truth(l), Some(tv));
        assert_eq!(restored.fingerprint(l), space.fingerprint(l));
        // Interning picks up where the snapshot left off.
        let again = restored.make_link(LIST_LINK, &[x, n]).unwrap();
        assert_eq!(again, l);
    }

    #[test]
    fn fingerprints_agree_across_stores() {
        let s1 = Weft::new();
        let s2 = Weft::new();
        let a1 = {
            let x = s1.variable("$x").unwrap();
            let n = s1.number(3.0).unwrap();
            s1.make_link(LIST_LINK, &[x, n]).unwrap()
        };
        let a2 = {
            // Different interning order, same structure.
            let n = s2.number(3.0).unwrap();
            let x = s2.variable("$x").unwrap();
            s2.make_link(LIST_LINK, &[x, n]).unwrap()
        };
        assert_eq!(s1.fingerprint(a1), s2.fingerprint(a2));
    }
}
