//! Syntactic, typed, first-order unification over interned terms.
//!
//! [`unify`] decides whether two terms have a common substitution instance.
//! The result is a [`SolutionSet`]: a satisfiability flag plus a set of
//! [`Partition`]s, each partition a disjoint family of [`Block`]s. A block is
//! an equivalence class of atoms (variables identified with each other or
//! with a concrete term) together with a representative handle carrying the
//! narrowed type of the class.
//!
//! Unification proceeds structurally: leaves unify by handle equality or by
//! variable solution, links by tag, arity, and child-wise recursion, merging
//! the per-child solution sets as it goes and short-circuiting on the first
//! unsatisfiable child. Unsatisfiability is a first-class value, never an
//! error.
//!
//! There is no occurs check: a variable may be identified with a term that
//! contains it, exactly as in the rest of the merge algebra.
//!
//! # Determinism
//! All collections are `BTreeSet`s keyed by handle identity, so iteration
//! order, partition deduplication, and the printed form of a solution set are
//! stable across runs. Tests may assert exact solution-set equality.
//!
//! # Citations
//! - Baader & Snyder, "Unification Theory", Handbook of Automated Reasoning (2001)
//! - Martelli & Montanari, "An efficient unification algorithm" (1982)

use crate::atom::{AtomId, Weft};
use crate::registry::{TypeId, TypeRegistry, VARIABLE_NODE};
use crate::variables::Variables;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A typed equivalence class of atoms.
///
/// `ty` is the representative handle of the intersected type: the left
/// variable when the class identifies two variables (a variable carries its
/// own declared type), otherwise the concrete side. A block whose
/// intersection would be undefined is never constructed; merges yield
/// `Option<Block>` instead.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Block {
    atoms: BTreeSet<AtomId>,
    ty: AtomId,
}

impl Block {
    /// Creates a block from a non-empty atom set and its type representative.
    pub fn new(atoms: BTreeSet<AtomId>, ty: AtomId) -> Self {
        debug_assert!(!atoms.is_empty(), "a block holds at least one atom");
        Self { atoms, ty }
    }

    /// Returns the atoms of the equivalence class.
    #[inline]
    pub fn atoms(&self) -> &BTreeSet<AtomId> {
        &self.atoms
    }

    /// Returns the representative handle of the intersected type.
    #[inline]
    pub fn type_handle(&self) -> AtomId {
        self.ty
    }
}

/// One consistent way to identify variables and terms: a set of blocks with
/// pairwise-disjoint atom sets.
pub type Partition = BTreeSet<Block>;

/// The outcome of a unification: satisfiability plus the set of partitions.
///
/// An empty partition set with `satisfiable = true` is the trivial
/// "no constraints" solution of two identical ground terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionSet {
    satisfiable: bool,
    partitions: BTreeSet<Partition>,
}

impl SolutionSet {
    /// The unsatisfiable solution set.
    pub fn unsatisfiable() -> Self {
        Self { satisfiable: false, partitions: BTreeSet::new() }
    }

    /// The trivial satisfiable solution set (no constraints).
    pub fn trivial() -> Self {
        Self { satisfiable: true, partitions: BTreeSet::new() }
    }

    /// Creates a solution set from parts.
    pub fn new(satisfiable: bool, partitions: BTreeSet<Partition>) -> Self {
        debug_assert!(satisfiable || partitions.is_empty(), "unsatisfiable sets carry no partitions");
        Self { satisfiable, partitions }
    }

    /// Returns `true` if the two sides have a common substitution instance.
    #[inline]
    pub fn is_satisfiable(&self) -> bool {
        self.satisfiable
    }

    /// Returns the partitions in canonical order.
    #[inline]
    pub fn partitions(&self) -> &BTreeSet<Partition> {
        &self.partitions
    }

    /// Caps the partition set at `max` entries, keeping the canonically
    /// least. A blowup guard for pathological inputs; satisfiability is
    /// unaffected.
    pub fn truncate(&mut self, max: usize) {
        if self.partitions.len() > max {
            tracing::warn!(
                kept = max,
                dropped = self.partitions.len() - max,
                "partition set exceeded its budget; truncating"
            );
            self.partitions = self.partitions.iter().take(max).cloned().collect();
        }
    }
}

/// Resource budget for a unification call.
#[derive(Debug, Clone, Copy)]
pub struct UnifyLimits {
    /// Maximum number of partitions retained while merging child solutions.
    pub max_partitions: usize,
}

impl Default for UnifyLimits {
    fn default() -> Self {
        Self { max_partitions: 4096 }
    }
}

/// Unifies two terms under their optional variable declarations.
///
/// See the module docs for the shape of the result. Declarations are atoms
/// (`VariableNode`, `TypedVariableLink`, or `VariableList`); `None` means
/// every free variable of the corresponding term is typed `{Atom}`.
///
/// # Panics
/// Panics if a declaration atom is malformed (see
/// [`Variables::from_declaration`]).
pub fn unify(
    space: &Weft,
    registry: &TypeRegistry,
    lhs: AtomId,
    rhs: AtomId,
    lhs_decl: Option<AtomId>,
    rhs_decl: Option<AtomId>,
) -> SolutionSet {
    unify_with_limits(space, registry, lhs, rhs, lhs_decl, rhs_decl, &UnifyLimits::default())
}

/// [`unify`] with an explicit resource budget.
pub fn unify_with_limits(
    space: &Weft,
    registry: &TypeRegistry,
    lhs: AtomId,
    rhs: AtomId,
    lhs_decl: Option<AtomId>,
    rhs_decl: Option<AtomId>,
    limits: &UnifyLimits,
) -> SolutionSet {
    // An unresolvable handle is undefined: nothing unifies with it.
    if space.type_of(lhs).is_none() || space.type_of(rhs).is_none() {
        return SolutionSet::unsatisfiable();
    }
    let lhs_vars = Variables::from_declaration(space, registry, lhs, lhs_decl);
    let rhs_vars = Variables::from_declaration(space, registry, rhs, rhs_decl);
    tracing::trace!(lhs = lhs.as_u32(), rhs = rhs.as_u32(), "unifying");
    unify_rec(space, registry, lhs, rhs, &lhs_vars, &rhs_vars, limits)
}

fn unify_rec(
    space: &Weft,
    registry: &TypeRegistry,
    lhs: AtomId,
    rhs: AtomId,
    lhs_vars: &Variables,
    rhs_vars: &Variables,
    limits: &UnifyLimits,
) -> SolutionSet {
    let (Some(lhs_ty), Some(rhs_ty)) = (space.type_of(lhs), space.type_of(rhs)) else {
        return SolutionSet::unsatisfiable();
    };

    // Leaf cases.
    if space.is_node(lhs) || space.is_node(rhs) {
        if lhs_ty == VARIABLE_NODE || rhs_ty == VARIABLE_NODE {
            return mkvarsol(space, registry, lhs, rhs, lhs_vars, rhs_vars);
        }
        return if lhs == rhs { SolutionSet::trivial() } else { SolutionSet::unsatisfiable() };
    }

    // Both links: tags and arities must agree.
    if lhs_ty != rhs_ty {
        return SolutionSet::unsatisfiable();
    }
    let (Some(lhs_kids), Some(rhs_kids)) = (space.children(lhs), space.children(rhs)) else {
        return SolutionSet::unsatisfiable();
    };
    if lhs_kids.len() != rhs_kids.len() {
        return SolutionSet::unsatisfiable();
    }

    // Child-wise recursion, merging as we go.
    let mut sol = SolutionSet::trivial();
    for (&lc, &rc) in lhs_kids.iter().zip(rhs_kids.iter()) {
        let child = unify_rec(space, registry, lc, rc, lhs_vars, rhs_vars, limits);
        sol = merge_solutions(space, registry, &sol, &child);
        sol.truncate(limits.max_partitions);
        if !sol.satisfiable {
            break;
        }
    }
    sol
}

/// Variable solution: at least one side is a variable.
///
/// The term type-intersection of the two sides under their declarations
/// decides satisfiability; a defined intersection yields a single partition
/// with the single block `({lhs, rhs}, intersection)`.
fn mkvarsol(
    space: &Weft,
    registry: &TypeRegistry,
    lhs: AtomId,
    rhs: AtomId,
    lhs_vars: &Variables,
    rhs_vars: &Variables,
) -> SolutionSet {
    match atom_type_intersection(space, registry, lhs, rhs, lhs_vars, rhs_vars) {
        None => SolutionSet::unsatisfiable(),
        Some(ty) => {
            let block = Block::new(BTreeSet::from([lhs, rhs]), ty);
            let partitions = BTreeSet::from([Partition::from([block])]);
            SolutionSet { satisfiable: true, partitions }
        }
    }
}

/// Merges two solution sets.
///
/// Unsatisfiable if either operand is. An empty partition set is the unit:
/// merging with it returns the other operand. Otherwise the result's
/// partitions are the pairwise partition merges that succeed, and the result
/// is satisfiable iff some pair succeeded.
pub fn merge_solutions(
    space: &Weft,
    registry: &TypeRegistry,
    lhs: &SolutionSet,
    rhs: &SolutionSet,
) -> SolutionSet {
    if !lhs.satisfiable || !rhs.satisfiable {
        return SolutionSet::unsatisfiable();
    }
    if rhs.partitions.is_empty() {
        return lhs.clone();
    }
    if lhs.partitions.is_empty() {
        return rhs.clone();
    }
    let partitions: BTreeSet<Partition> = lhs
        .partitions
        .iter()
        .cartesian_product(rhs.partitions.iter())
        .filter_map(|(p, q)| merge_partitions(space, registry, p, q))
        .collect();
    SolutionSet { satisfiable: !partitions.is_empty(), partitions }
}

/// Merges two partitions, or reports failure.
///
/// Starting from `lhs`, each block of `rhs` is either inserted unchanged
/// (disjoint from the block of `lhs` under consideration) or block-merged
/// with the overlapping block it meets. An invalid block merge invalidates
/// the whole partition: the result is `None`.
pub fn merge_partitions(
    space: &Weft,
    registry: &TypeRegistry,
    lhs: &Partition,
    rhs: &Partition,
) -> Option<Partition> {
    if lhs.is_empty() {
        return Some(rhs.clone());
    }
    if rhs.is_empty() {
        return Some(lhs.clone());
    }
    let mut result = lhs.clone();
    for block in rhs {
        for existing in lhs {
            if block.atoms.is_disjoint(&existing.atoms) {
                result.insert(block.clone());
            } else {
                let merged = merge_blocks(space, registry, block, existing)?;
                result.remove(existing);
                result.insert(merged);
            }
        }
    }
    Some(result)
}

/// Merges two blocks: atom-set union, type intersection of the
/// representatives. `None` iff the representatives have no common type.
///
/// The representatives are intersected under declarations synthesized from
/// their own free variables; a variable representative stands for `{Atom}`
/// here; the narrowing recorded when the block was formed travels with the
/// representative handle itself.
pub fn merge_blocks(
    space: &Weft,
    registry: &TypeRegistry,
    lhs: &Block,
    rhs: &Block,
) -> Option<Block> {
    let lhs_vars = Variables::from_declaration(space, registry, lhs.ty, None);
    let rhs_vars = Variables::from_declaration(space, registry, rhs.ty, None);
    let ty = atom_type_intersection(space, registry, lhs.ty, rhs.ty, &lhs_vars, &rhs_vars)?;
    let atoms = lhs.atoms.union(&rhs.atoms).copied().collect();
    Some(Block { atoms, ty })
}

/// Term type-intersection under declarations.
///
/// Returns the side that inherits from the other, preferring the left one
/// when both directions hold, or `None` when neither does.
pub fn atom_type_intersection(
    space: &Weft,
    registry: &TypeRegistry,
    lhs: AtomId,
    rhs: AtomId,
    lhs_vars: &Variables,
    rhs_vars: &Variables,
) -> Option<AtomId> {
    if inherit(space, registry, lhs, rhs, lhs_vars, rhs_vars) {
        Some(lhs)
    } else if inherit(space, registry, rhs, lhs, rhs_vars, lhs_vars) {
        Some(rhs)
    } else {
        None
    }
}

/// "`lhs` is a permitted instance of `rhs`" under the declarations.
///
/// Two variables compare by their declared type unions; otherwise `lhs` must
/// satisfy `rhs`'s declaration through the varlist abstraction. Equal handles
/// trivially inherit.
fn inherit(
    space: &Weft,
    registry: &TypeRegistry,
    lhs: AtomId,
    rhs: AtomId,
    lhs_vars: &Variables,
    rhs_vars: &Variables,
) -> bool {
    if lhs == rhs {
        return true;
    }
    if space.type_of(lhs) == Some(VARIABLE_NODE) && space.type_of(rhs) == Some(VARIABLE_NODE) {
        inherit_unions(registry, &lhs_vars.union_type(lhs), &rhs_vars.union_type(rhs))
    } else {
        rhs_vars.is_type(space, registry, rhs, lhs)
    }
}

/// Every member of `lhs` inherits from some member of `rhs`.
fn inherit_unions(
    registry: &TypeRegistry,
    lhs: &BTreeSet<TypeId>,
    rhs: &BTreeSet<TypeId>,
) -> bool {
    lhs.iter().all(|&t| rhs.iter().any(|&u| registry.is_a(t, u)))
}

/// Intersection of two type unions, distributed element-wise.
///
/// Only defined intersections are kept; an empty operand acts as the
/// universal union and returns the other side. An empty **result** means the
/// bottom type: the unions share no common subtype.
pub fn union_intersection(
    registry: &TypeRegistry,
    lhs: &BTreeSet<TypeId>,
    rhs: &BTreeSet<TypeId>,
) -> BTreeSet<TypeId> {
    if lhs.is_empty() {
        return rhs.clone();
    }
    if rhs.is_empty() {
        return lhs.clone();
    }
    let mut out = BTreeSet::new();
    for (&a, &b) in lhs.iter().cartesian_product(rhs.iter()) {
        let ty = registry.type_intersection(a, b);
        if !ty.is_bottom() {
            out.insert(ty);
        }
    }
    out
}
