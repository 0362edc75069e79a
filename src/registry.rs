//! Type registry: the single source of truth for the atom type hierarchy.
//!
//! Every atom carries a [`TypeId`] tag drawn from a finite, extensible,
//! totally-ordered set. The registry records the tag names and the
//! parent relation, and answers the reflexive-transitive subtype test
//! [`TypeRegistry::is_a`] that the reducer and the unifier consult.
//!
//! The hierarchy is a rooted DAG with [`ATOM`] as the unique top. Registering
//! a tag requires its parents to exist already, so the DAG property holds by
//! construction. A registry is immutable once handed to core operations and
//! is `Sync`, so concurrent readers need no coordination.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a registered type tag.
///
/// Dense index into the registry's tag table. `Copy`, `Ord`, `Hash`; the
/// ordering is registration order, which is fixed for the builtin tags.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(u16);

impl TypeId {
    /// Creates a `TypeId` from a raw `u16`.
    ///
    /// The caller must ensure the index refers to a registered tag of the
    /// registry it will be used with; behavior on unregistered tags is
    /// unspecified.
    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw `u16` index.
    #[inline]
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns `true` if this is the [`BOTTOM`] sentinel.
    #[inline]
    pub const fn is_bottom(&self) -> bool {
        self.0 == BOTTOM.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            write!(f, "TypeId(⊥)")
        } else {
            write!(f, "TypeId({})", self.0)
        }
    }
}

/// Sentinel for the empty type: the result of a failed type intersection.
///
/// `BOTTOM` is never registered; it marks "no common type". It is not a valid
/// operand of [`TypeRegistry::is_a`].
pub const BOTTOM: TypeId = TypeId(u16::MAX);

// Builtin tags, registered by `TypeRegistry::with_builtins` at these exact
// indices. The arithmetic chain FOLD_LINK → ARITHMETIC_LINK → PLUS/TIMES
// mirrors the classification the reducer dispatches on.

/// Top of the hierarchy; every registered tag inherits from it.
pub const ATOM: TypeId = TypeId(0);
/// Classification of all named leaves.
pub const NODE: TypeId = TypeId(1);
/// Classification of all links.
pub const LINK: TypeId = TypeId(2);
/// Leaf whose name denotes a single finite real value.
pub const NUMBER_NODE: TypeId = TypeId(3);
/// Leaf naming a variable.
pub const VARIABLE_NODE: TypeId = TypeId(4);
/// Leaf naming a registered type tag.
pub const TYPE_NODE: TypeId = TypeId(5);
/// Generic named concept leaf.
pub const CONCEPT_NODE: TypeId = TypeId(6);
/// Generic named predicate leaf.
pub const PREDICATE_NODE: TypeId = TypeId(7);
/// Pairs a variable with a type declaration (`TYPE_NODE` or `TYPE_CHOICE`).
pub const TYPED_VARIABLE_LINK: TypeId = TypeId(8);
/// Ordered collection of variables and typed variables.
pub const VARIABLE_LIST: TypeId = TypeId(9);
/// Union of type declarations.
pub const TYPE_CHOICE: TypeId = TypeId(10);
/// A link whose semantics are a left-fold of a binary operation.
pub const FOLD_LINK: TypeId = TypeId(11);
/// Fold links over the numeric domain.
pub const ARITHMETIC_LINK: TypeId = TypeId(12);
/// Commutative associative sum.
pub const PLUS_LINK: TypeId = TypeId(13);
/// Commutative associative product.
pub const TIMES_LINK: TypeId = TypeId(14);
/// Generic ordered tuple.
pub const LIST_LINK: TypeId = TypeId(15);
/// Set-membership relation.
pub const MEMBER_LINK: TypeId = TypeId(16);
/// Subsumption relation between concepts.
pub const INHERITANCE_LINK: TypeId = TypeId(17);
/// Application of a predicate to arguments.
pub const EVALUATION_LINK: TypeId = TypeId(18);

/// Error type for registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A tag with this name exists with a different parent set.
    ConflictingName(String),
    /// A named parent tag is not registered.
    UnknownParent(TypeId),
    /// The tag table is full (`u16` space exhausted, minus the sentinel).
    Exhausted,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::ConflictingName(name) => {
                write!(f, "type '{}' already registered with different parents", name)
            }
            RegistryError::UnknownParent(id) => write!(f, "unknown parent type {}", id),
            RegistryError::Exhausted => write!(f, "type tag space exhausted"),
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Debug, Clone)]
struct TypeEntry {
    name: String,
    parents: Vec<TypeId>,
}

/// The type hierarchy.
///
/// # Invariants
/// - Entry 0 is [`ATOM`], the unique root (no parents).
/// - Every other entry has at least one parent with a smaller index, so the
///   parent relation is acyclic by construction.
/// - Names are unique.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    entries: Vec<TypeEntry>,
    by_name: HashMap<String, TypeId>,
}

impl TypeRegistry {
    /// Creates a registry containing only the root [`ATOM`] tag.
    pub fn new() -> Self {
        let mut reg = Self { entries: Vec::new(), by_name: HashMap::new() };
        reg.entries.push(TypeEntry { name: "Atom".to_string(), parents: Vec::new() });
        reg.by_name.insert("Atom".to_string(), ATOM);
        reg
    }

    /// Creates a registry with the builtin hierarchy registered at the
    /// documented fixed indices.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        let builtins: &[(&str, TypeId, &[TypeId])] = &[
            ("Node", NODE, &[ATOM]),
            ("Link", LINK, &[ATOM]),
            ("NumberNode", NUMBER_NODE, &[NODE]),
            ("VariableNode", VARIABLE_NODE, &[NODE]),
            ("TypeNode", TYPE_NODE, &[NODE]),
            ("ConceptNode", CONCEPT_NODE, &[NODE]),
            ("PredicateNode", PREDICATE_NODE, &[NODE]),
            ("TypedVariableLink", TYPED_VARIABLE_LINK, &[LINK]),
            ("VariableList", VARIABLE_LIST, &[LINK]),
            ("TypeChoice", TYPE_CHOICE, &[LINK]),
            ("FoldLink", FOLD_LINK, &[LINK]),
            ("ArithmeticLink", ARITHMETIC_LINK, &[FOLD_LINK]),
            ("PlusLink", PLUS_LINK, &[ARITHMETIC_LINK]),
            ("TimesLink", TIMES_LINK, &[ARITHMETIC_LINK]),
            ("ListLink", LIST_LINK, &[LINK]),
            ("MemberLink", MEMBER_LINK, &[LINK]),
            ("InheritanceLink", INHERITANCE_LINK, &[LINK]),
            ("EvaluationLink", EVALUATION_LINK, &[LINK]),
        ];
        for &(name, expected, parents) in builtins {
            let id = reg
                .register(name, parents)
                .expect("builtin registration cannot fail on a fresh registry");
            debug_assert_eq!(id, expected, "builtin '{}' registered off its fixed index", name);
        }
        reg
    }

    /// Registers a new tag under the given parents and returns its id.
    ///
    /// Idempotent: re-registering an existing name with an identical parent
    /// set returns the existing id. A name clash with different parents is a
    /// [`RegistryError::ConflictingName`].
    pub fn register(&mut self, name: &str, parents: &[TypeId]) -> Result<TypeId, RegistryError> {
        if let Some(&existing) = self.by_name.get(name) {
            if self.entries[existing.0 as usize].parents == parents {
                return Ok(existing);
            }
            return Err(RegistryError::ConflictingName(name.to_string()));
        }
        for &p in parents {
            if !self.contains(p) {
                return Err(RegistryError::UnknownParent(p));
            }
        }
        if self.entries.len() >= BOTTOM.0 as usize {
            return Err(RegistryError::Exhausted);
        }
        let id = TypeId(self.entries.len() as u16);
        self.entries.push(TypeEntry { name: name.to_string(), parents: parents.to_vec() });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Returns `true` if the tag is registered.
    #[inline]
    pub fn contains(&self, ty: TypeId) -> bool {
        (ty.0 as usize) < self.entries.len()
    }

    /// Returns the name of a registered tag.
    pub fn name(&self, ty: TypeId) -> Option<&str> {
        self.entries.get(ty.0 as usize).map(|e| e.name.as_str())
    }

    /// Looks up a tag by name.
    pub fn id_of(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Returns the number of registered tags.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if only the root is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Reflexive-transitive subtype test.
    ///
    /// Returns `true` iff `sub` equals `sup` or some chain of parent edges
    /// leads from `sub` to `sup`. Total over registered tags; behavior on
    /// unregistered tags (including [`BOTTOM`]) is unspecified and guarded by
    /// a debug assertion.
    pub fn is_a(&self, sub: TypeId, sup: TypeId) -> bool {
        debug_assert!(self.contains(sub), "is_a on unregistered tag {}", sub);
        debug_assert!(self.contains(sup), "is_a on unregistered tag {}", sup);
        if sub == sup {
            return true;
        }
        // Parent indices are strictly decreasing toward the root, so the walk
        // terminates without a visited set; a small stack suffices.
        let mut stack = vec![sub];
        while let Some(t) = stack.pop() {
            let Some(entry) = self.entries.get(t.0 as usize) else { continue };
            for &p in &entry.parents {
                if p == sup {
                    return true;
                }
                stack.push(p);
            }
        }
        false
    }

    /// Intersection of two tags in the hierarchy.
    ///
    /// Returns `a` if `is_a(a, b)`, `b` if `is_a(b, a)`, and [`BOTTOM`]
    /// otherwise. No structural intersection beyond the subtype comparison is
    /// attempted.
    pub fn type_intersection(&self, a: TypeId, b: TypeId) -> TypeId {
        if self.is_a(a, b) {
            a
        } else if self.is_a(b, a) {
            b
        } else {
            BOTTOM
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_at_fixed_indices() {
        let reg = TypeRegistry::with_builtins();
        assert_eq!(reg.id_of("Atom"), Some(ATOM));
        assert_eq!(reg.id_of("NumberNode"), Some(NUMBER_NODE));
        assert_eq!(reg.id_of("TimesLink"), Some(TIMES_LINK));
        assert_eq!(reg.name(PLUS_LINK), Some("PlusLink"));
        assert_eq!(reg.len(), 19);
    }

    #[test]
    fn is_a_reflexive_and_transitive() {
        let reg = TypeRegistry::with_builtins();
        assert!(reg.is_a(PLUS_LINK, PLUS_LINK));
        assert!(reg.is_a(PLUS_LINK, ARITHMETIC_LINK));
        assert!(reg.is_a(PLUS_LINK, FOLD_LINK));
        assert!(reg.is_a(PLUS_LINK, LINK));
        assert!(reg.is_a(PLUS_LINK, ATOM));
        assert!(!reg.is_a(ARITHMETIC_LINK, PLUS_LINK));
        assert!(!reg.is_a(PLUS_LINK, TIMES_LINK));
        assert!(!reg.is_a(NUMBER_NODE, LINK));
    }

    #[test]
    fn everything_inherits_atom() {
        let reg = TypeRegistry::with_builtins();
        for raw in 0..reg.len() as u16 {
            assert!(reg.is_a(TypeId::new(raw), ATOM));
        }
    }

    #[test]
    fn intersection() {
        let reg = TypeRegistry::with_builtins();
        // is_a(a, b) implies a ⊓ b = a.
        assert_eq!(reg.type_intersection(PLUS_LINK, ARITHMETIC_LINK), PLUS_LINK);
        assert_eq!(reg.type_intersection(ARITHMETIC_LINK, PLUS_LINK), PLUS_LINK);
        assert_eq!(reg.type_intersection(NODE, NODE), NODE);
        assert_eq!(reg.type_intersection(NUMBER_NODE, VARIABLE_NODE), BOTTOM);
        assert_eq!(reg.type_intersection(PLUS_LINK, TIMES_LINK), BOTTOM);
    }

    #[test]
    fn register_custom_type() {
        let mut reg = TypeRegistry::with_builtins();
        let minus = reg.register("MinusLink", &[ARITHMETIC_LINK]).unwrap();
        assert!(reg.is_a(minus, FOLD_LINK));
        assert_eq!(reg.type_intersection(minus, PLUS_LINK), BOTTOM);
        // Idempotent re-registration.
        assert_eq!(reg.register("MinusLink", &[ARITHMETIC_LINK]).unwrap(), minus);
        // Conflicting parents are rejected.
        assert_eq!(
            reg.register("MinusLink", &[LINK]),
            Err(RegistryError::ConflictingName("MinusLink".to_string()))
        );
    }

    #[test]
    fn unknown_parent_rejected() {
        let mut reg = TypeRegistry::new();
        assert_eq!(
            reg.register("Orphan", &[TypeId::new(40)]),
            Err(RegistryError::UnknownParent(TypeId::new(40)))
        );
    }

    #[test]
    fn diamond_hierarchy() {
        // A tag with two parents reaches the root through either.
        let mut reg = TypeRegistry::with_builtins();
        let a = reg.register("A", &[NODE]).unwrap();
        let b = reg.register("B", &[NODE]).unwrap();
        let ab = reg.register("AB", &[a, b]).unwrap();
        assert!(reg.is_a(ab, a));
        assert!(reg.is_a(ab, b));
        assert!(reg.is_a(ab, NODE));
        assert!(reg.is_a(ab, ATOM));
        assert!(!reg.is_a(a, b));
    }
}
