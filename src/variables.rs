//! Typed variable declarations.
//!
//! A term's variable environment maps each declared variable to a non-empty
//! **type union**: the set of tags a ground term substituted for it may
//! carry. Declarations arrive as atoms (a bare [`VARIABLE_NODE`], a
//! [`TYPED_VARIABLE_LINK`] pairing a variable with a [`TYPE_NODE`] or a
//! [`TYPE_CHOICE`], or a [`VARIABLE_LIST`] of those) and are normalized into
//! a [`Variables`] value. When no declaration accompanies a term, one is
//! synthesized from its free variables, each typed `{Atom}`.

use crate::atom::{AtomId, Weft};
use crate::registry::{
    TypeId, TypeRegistry, ATOM, TYPED_VARIABLE_LINK, TYPE_CHOICE, TYPE_NODE, VARIABLE_LIST,
    VARIABLE_NODE,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Collects the variable-node descendants of `term` in stable preorder.
///
/// Each variable appears once, at its first occurrence. Unresolvable handles
/// contribute nothing.
pub fn free_variables(space: &Weft, term: AtomId) -> Vec<AtomId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    collect_free(space, term, &mut seen, &mut out);
    out
}

fn collect_free(space: &Weft, h: AtomId, seen: &mut HashSet<AtomId>, out: &mut Vec<AtomId>) {
    match space.type_of(h) {
        Some(VARIABLE_NODE) => {
            if seen.insert(h) {
                out.push(h);
            }
        }
        Some(_) => {
            if let Some(children) = space.children(h) {
                for &child in children.iter() {
                    collect_free(space, child, seen, out);
                }
            }
        }
        None => {}
    }
}

/// A normalized variable environment.
///
/// Immutable after construction. Declared variables keep their declaration
/// order; each carries a non-empty type union (`{Atom}` when the declaration
/// named no types).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variables {
    order: Vec<AtomId>,
    types: BTreeMap<AtomId, BTreeSet<TypeId>>,
}

impl Variables {
    /// Normalizes an optional declaration atom for `term`.
    ///
    /// With `decl` absent, the environment is synthesized from
    /// [`free_variables`] of `term`, each typed `{Atom}`. With `decl`
    /// present, it must be a [`VARIABLE_NODE`], a [`TYPED_VARIABLE_LINK`], or
    /// a [`VARIABLE_LIST`] of those.
    ///
    /// # Panics
    /// Panics if the declaration is malformed: an unexpected tag where a
    /// declaration atom is required, a `TypedVariableLink` whose first child
    /// is not a variable or whose second child is not a `TypeNode` /
    /// `TypeChoice`, or a `TypeNode` naming an unregistered type. Malformed
    /// declarations are a contract violation, not an input condition.
    pub fn from_declaration(
        space: &Weft,
        registry: &TypeRegistry,
        term: AtomId,
        decl: Option<AtomId>,
    ) -> Self {
        let mut vars = Self { order: Vec::new(), types: BTreeMap::new() };
        match decl {
            None => {
                for v in free_variables(space, term) {
                    vars.insert(v, BTreeSet::from([ATOM]));
                }
            }
            Some(decl) => {
                let ty = space
                    .type_of(decl)
                    .unwrap_or_else(|| panic!("declaration handle {} does not resolve", decl));
                if ty == VARIABLE_LIST {
                    let children = space.children(decl).expect("VariableList must be a link");
                    for &child in children.iter() {
                        vars.parse_declaration_entry(space, registry, child);
                    }
                } else {
                    vars.parse_declaration_entry(space, registry, decl);
                }
            }
        }
        vars
    }

    fn parse_declaration_entry(&mut self, space: &Weft, registry: &TypeRegistry, entry: AtomId) {
        match space.type_of(entry) {
            Some(VARIABLE_NODE) => {
                self.insert(entry, BTreeSet::from([ATOM]));
            }
            Some(TYPED_VARIABLE_LINK) => {
                let children = space.children(entry).expect("TypedVariableLink must be a link");
                assert!(
                    children.len() == 2,
                    "TypedVariableLink must pair a variable with a type declaration"
                );
                let var = children[0];
                assert_eq!(
                    space.type_of(var),
                    Some(VARIABLE_NODE),
                    "first child of TypedVariableLink must be a VariableNode"
                );
                let union = parse_type_union(space, registry, children[1]);
                self.insert(var, union);
            }
            other => panic!(
                "expected a variable declaration, got type tag {:?} on {}",
                other, entry
            ),
        }
    }

    fn insert(&mut self, var: AtomId, union: BTreeSet<TypeId>) {
        if !self.types.contains_key(&var) {
            self.order.push(var);
        }
        // An empty union means "unrestricted".
        let union = if union.is_empty() { BTreeSet::from([ATOM]) } else { union };
        self.types.insert(var, union);
    }

    /// Returns the declared variables in declaration order.
    #[inline]
    pub fn vars(&self) -> &[AtomId] {
        &self.order
    }

    /// Returns the number of declared variables.
    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no variables are declared.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns `true` if `v` is declared here.
    #[inline]
    pub fn is_declared(&self, v: AtomId) -> bool {
        self.types.contains_key(&v)
    }

    /// Returns the declared type union for `v`, or `{Atom}` if `v` is not
    /// declared.
    pub fn union_type(&self, v: AtomId) -> BTreeSet<TypeId> {
        self.types.get(&v).cloned().unwrap_or_else(|| BTreeSet::from([ATOM]))
    }

    /// Permitted-substitution test: `true` iff `term` is a variable declared
    /// here and `candidate`'s type inherits from some member of its union.
    pub fn is_type(
        &self,
        space: &Weft,
        registry: &TypeRegistry,
        term: AtomId,
        candidate: AtomId,
    ) -> bool {
        let Some(union) = self.types.get(&term) else { return false };
        let Some(candidate_ty) = space.type_of(candidate) else { return false };
        union.iter().any(|&u| registry.is_a(candidate_ty, u))
    }
}

/// Parses the type side of a `TypedVariableLink`.
///
/// # Panics
/// Panics on anything other than a `TypeNode` naming a registered type or a
/// `TypeChoice` of such.
fn parse_type_union(space: &Weft, registry: &TypeRegistry, decl: AtomId) -> BTreeSet<TypeId> {
    match space.type_of(decl) {
        Some(TYPE_NODE) => BTreeSet::from([resolve_type_node(space, registry, decl)]),
        Some(TYPE_CHOICE) => {
            let children = space.children(decl).expect("TypeChoice must be a link");
            children
                .iter()
                .map(|&child| {
                    assert_eq!(
                        space.type_of(child),
                        Some(TYPE_NODE),
                        "TypeChoice members must be TypeNodes"
                    );
                    resolve_type_node(space, registry, child)
                })
                .collect()
        }
        other => panic!("expected TypeNode or TypeChoice, got type tag {:?} on {}", other, decl),
    }
}

fn resolve_type_node(space: &Weft, registry: &TypeRegistry, type_node: AtomId) -> TypeId {
    let name = space.name(type_node).expect("TypeNode must be a node");
    registry
        .id_of(&name)
        .unwrap_or_else(|| panic!("TypeNode names unregistered type '{}'", name))
}
