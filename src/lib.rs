//! Weft: symbolic algebra and typed unification over an interned hypergraph.
//!
//! This crate implements the symbolic core of a hypergraph knowledge store:
//! - An immutable, content-addressed atom substrate: named leaves and ordered
//!   links interned by structural equality, addressed through cheap handles.
//! - A type registry serving a reflexive-transitive subtype relation over an
//!   extensible tag hierarchy.
//! - Arithmetic reduction of fold links: number folding, like-term
//!   collection, and canonical reordering of sums.
//! - Syntactic, typed, first-order unification producing solution sets of
//!   typed equivalence-class partitions.
//!
//! # Name Origin
//!
//! A "weft" is the thread drawn crosswise through the fixed warp of a loom.
//! Links here play the same role: they run across the atoms already strung in
//! the store, weaving leaves into terms and terms into larger fabric, without
//! ever disturbing what was laid down before.
//!
//! # Example
//!
//! ```
//! use weft::prelude::*;
//!
//! let space = Weft::new();
//! let registry = TypeRegistry::with_builtins();
//!
//! // reduce(2 + 3) == 5
//! let two = space.number(2.0).unwrap();
//! let three = space.number(3.0).unwrap();
//! let sum = space.plus(&[two, three]).unwrap();
//! let reduced = reduce(&space, &registry, sum).unwrap();
//! assert_eq!(space.number_value(reduced), Some(5.0));
//!
//! // unify($x, 5) binds the variable
//! let x = space.variable("$x").unwrap();
//! let sol = unify(&space, &registry, x, reduced, None, None);
//! assert!(sol.is_satisfiable());
//! ```
//!
//! # Concurrency
//!
//! The core is a pure functional layer: given a store and a registry, every
//! operation is synchronous and referentially transparent. [`Weft`] and
//! [`TypeRegistry`] are `Sync`; threads may reduce and unify in parallel on
//! shared inputs without coordination.

pub mod atom;
pub mod fingerprint;
pub mod reduce;
pub mod registry;
pub mod unify;
pub mod variables;


pub use crate::atom::{Atom, AtomError, AtomId, AttentionValue, TruthValue, Weft};
pub use crate::fingerprint::HashValue;
pub use crate::reduce::{reduce, reorder, FoldOp, PlusFold, ReduceError, TimesFold};
pub use crate::registry::{RegistryError, TypeId, TypeRegistry};
pub use crate::unify::{
    merge_solutions, unify, unify_with_limits, Block, Partition, SolutionSet, UnifyLimits,
};
pub use crate::variables::{free_variables, Variables};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::atom::{Atom, AtomError, AtomId, AttentionValue, TruthValue, Weft};
    pub use crate::fingerprint::HashValue;
    pub use crate::reduce::{reduce, reorder, FoldOp, PlusFold, ReduceError, TimesFold};
    pub use crate::registry::{
        RegistryError, TypeId, TypeRegistry, ATOM, BOTTOM, CONCEPT_NODE, EVALUATION_LINK,
        INHERITANCE_LINK, LIST_LINK, MEMBER_LINK, NODE, NUMBER_NODE, PLUS_LINK, PREDICATE_NODE,
        TIMES_LINK, TYPED_VARIABLE_LINK, TYPE_CHOICE, TYPE_NODE, VARIABLE_LIST, VARIABLE_NODE,
    };
    pub use crate::unify::{
        merge_solutions, unify, unify_with_limits, Block, Partition, SolutionSet, UnifyLimits,
    };
    pub use crate::variables::{free_variables, Variables};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::collections::BTreeSet;

    fn setup() -> (Weft, TypeRegistry) {
        (Weft::new(), TypeRegistry::with_builtins())
    }

    fn atom_decl(space: &Weft, vars: &[AtomId]) -> AtomId {
        let atom_ty = space.make_node(TYPE_NODE, "Atom").unwrap();
        let entries: Vec<AtomId> = vars
            .iter()
            .map(|&v| space.make_link(TYPED_VARIABLE_LINK, &[v, atom_ty]).unwrap())
            .collect();
        space.make_link(VARIABLE_LIST, &entries).unwrap()
    }

    /// 2 + 3 reduces to 5.
    #[test]
    fn sum_of_numbers_folds() {
        let (space, reg) = setup();
        let two = space.number(2.0).unwrap();
        let three = space.number(3.0).unwrap();
        let sum = space.plus(&[two, three]).unwrap();
        let reduced = reduce(&space, &reg, sum).unwrap();
        assert_eq!(reduced, space.number(5.0).unwrap());
    }

    /// x + x reduces to x·2.
    #[test]
    fn doubled_variable_becomes_a_product() {
        let (space, reg) = setup();
        let x = space.variable("$x").unwrap();
        let sum = space.plus(&[x, x]).unwrap();
        let reduced = reduce(&space, &reg, sum).unwrap();
        let two = space.number(2.0).unwrap();
        assert_eq!(reduced, space.times(&[x, two]).unwrap());
    }

    /// x + x·3 reduces to x·4.
    #[test]
    fn like_terms_collect() {
        let (space, reg) = setup();
        let x = space.variable("$x").unwrap();
        let three = space.number(3.0).unwrap();
        let x3 = space.times(&[x, three]).unwrap();
        let sum = space.plus(&[x, x3]).unwrap();
        let reduced = reduce(&space, &reg, sum).unwrap();
        let four = space.number(4.0).unwrap();
        assert_eq!(reduced, space.times(&[x, four]).unwrap());
    }

    /// x·2 + x·5 + 1 reduces to x·7 + 1, the product before the number.
    #[test]
    fn products_collect_and_order_canonically() {
        let (space, reg) = setup();
        let x = space.variable("$x").unwrap();
        let two = space.number(2.0).unwrap();
        let five = space.number(5.0).unwrap();
        let one = space.number(1.0).unwrap();
        let x2 = space.times(&[x, two]).unwrap();
        let x5 = space.times(&[x, five]).unwrap();
        let sum = space.plus(&[x2, x5, one]).unwrap();
        let reduced = reduce(&space, &reg, sum).unwrap();

        let seven = space.number(7.0).unwrap();
        let x7 = space.times(&[x, seven]).unwrap();
        assert_eq!(reduced, space.plus(&[x7, one]).unwrap());
        let kids = space.children(reduced).unwrap();
        assert_eq!(kids.as_ref(), &[x7, one]);
    }

    /// A Number-typed variable binds a number into one typed block.
    #[test]
    fn typed_variable_binds_a_number() {
        let (space, reg) = setup();
        let x = space.variable("$x").unwrap();
        let seven = space.number(7.0).unwrap();
        let number_ty = space.make_node(TYPE_NODE, "NumberNode").unwrap();
        let d = space.make_link(TYPED_VARIABLE_LINK, &[x, number_ty]).unwrap();
        let sol = unify(&space, &reg, x, seven, Some(d), None);

        assert!(sol.is_satisfiable());
        assert_eq!(sol.partitions().len(), 1);
        let partition = sol.partitions().iter().next().unwrap();
        assert_eq!(partition.len(), 1);
        let block = partition.iter().next().unwrap();
        assert_eq!(block.atoms(), &BTreeSet::from([x, seven]));
        assert_eq!(space.type_of(block.type_handle()), Some(NUMBER_NODE));
    }

    /// Unifying (x, y) against (a, (a, b)) yields one partition holding the
    /// classes {x, a} and {y, (a, b)}.
    #[test]
    fn nested_link_unification() {
        let (space, reg) = setup();
        let x = space.variable("$x").unwrap();
        let y = space.variable("$y").unwrap();
        let a = space.variable("$a").unwrap();
        let b = space.variable("$b").unwrap();
        let inner = space.make_link(LIST_LINK, &[a, b]).unwrap();
        let lhs = space.make_link(LIST_LINK, &[x, y]).unwrap();
        let rhs = space.make_link(LIST_LINK, &[a, inner]).unwrap();
        let lhs_decl = atom_decl(&space, &[x, y]);
        let rhs_decl = atom_decl(&space, &[a, b]);

        let sol = unify(&space, &reg, lhs, rhs, Some(lhs_decl), Some(rhs_decl));
        assert!(sol.is_satisfiable());
        assert_eq!(sol.partitions().len(), 1);
        let partition = sol.partitions().iter().next().unwrap();
        let shapes: BTreeSet<BTreeSet<AtomId>> =
            partition.iter().map(|blk| blk.atoms().clone()).collect();
        assert_eq!(
            shapes,
            BTreeSet::from([BTreeSet::from([x, a]), BTreeSet::from([y, inner])])
        );
        // The variable class keeps its left variable; the term class keeps
        // the concrete term.
        for block in partition {
            if block.atoms().contains(&x) {
                assert_eq!(block.type_handle(), x);
            } else {
                assert_eq!(block.type_handle(), inner);
            }
        }
    }

    /// Different link tags never unify.
    #[test]
    fn mismatched_link_tags_fail() {
        let (space, reg) = setup();
        let x = space.variable("$x").unwrap();
        let lhs = space.make_link(LIST_LINK, &[x]).unwrap();
        let rhs = space.make_link(MEMBER_LINK, &[x]).unwrap();
        let sol = unify(&space, &reg, lhs, rhs, None, None);
        assert!(!sol.is_satisfiable());
        assert!(sol.partitions().is_empty());
    }

    /// Unequal ground leaves never unify.
    #[test]
    fn unequal_numbers_fail() {
        let (space, reg) = setup();
        let one = space.number(1.0).unwrap();
        let two = space.number(2.0).unwrap();
        let sol = unify(&space, &reg, one, two, None, None);
        assert!(!sol.is_satisfiable());
    }

    /// Reduction results feed straight back into unification.
    #[test]
    fn reduce_then_unify() {
        let (space, reg) = setup();
        let x = space.variable("$x").unwrap();
        let two = space.number(2.0).unwrap();
        let three = space.number(3.0).unwrap();
        let sum = space.plus(&[two, three]).unwrap();
        let five = reduce(&space, &reg, sum).unwrap();

        let number_ty = space.make_node(TYPE_NODE, "NumberNode").unwrap();
        let d = space.make_link(TYPED_VARIABLE_LINK, &[x, number_ty]).unwrap();
        let sol = unify(&space, &reg, x, five, Some(d), None);
        assert!(sol.is_satisfiable());
        let block = sol.partitions().iter().next().unwrap().iter().next().unwrap();
        assert_eq!(block.atoms(), &BTreeSet::from([x, five]));
    }

    /// Merging solution sets is associative.
    #[test]
    fn solution_merge_associativity() {
        let (space, reg) = setup();
        let x = space.variable("$x").unwrap();
        let y = space.variable("$y").unwrap();
        let z = space.variable("$z").unwrap();
        let seven = space.number(7.0).unwrap();

        let s = unify(&space, &reg, x, seven, None, None);
        let t = unify(&space, &reg, x, y, None, None);
        let u = unify(&space, &reg, y, z, None, None);

        let left = merge_solutions(&space, &reg, &merge_solutions(&space, &reg, &s, &t), &u);
        let right = merge_solutions(&space, &reg, &s, &merge_solutions(&space, &reg, &t, &u));
        assert_eq!(left, right);
    }

    /// Threads may reduce and unify in parallel on a shared store.
    #[test]
    fn parallel_reduce_and_unify() {
        let (space, reg) = setup();
        let x = space.variable("$x").unwrap();
        let seven = space.number(7.0).unwrap();
        let three = space.number(3.0).unwrap();
        let x3 = space.times(&[x, three]).unwrap();
        let sum = space.plus(&[x, x3]).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let reduced = reduce(&space, &reg, sum).unwrap();
                    let four = space.number(4.0).unwrap();
                    assert_eq!(reduced, space.times(&[x, four]).unwrap());

                    let sol = unify(&space, &reg, x, seven, None, None);
                    assert!(sol.is_satisfiable());
                });
            }
        });
    }

    /// A store snapshot round-trips through CBOR with its contents intact.
    #[test]
    fn snapshot_round_trip_preserves_terms() {
        let (space, reg) = setup();
        let x = space.variable("$x").unwrap();
        let three = space.number(3.0).unwrap();
        let x3 = space.times(&[x, three]).unwrap();
        let sum = space.plus(&[x, x3]).unwrap();

        let bytes = space.to_cbor().unwrap();
        let restored = Weft::from_cbor(&bytes).unwrap();
        assert_eq!(restored.len(), space.len());
        // The restored store reduces the same term to the same normal form.
        let reduced = reduce(&restored, &reg, sum).unwrap();
        let four = restored.number(4.0).unwrap();
        assert_eq!(reduced, restored.times(&[x, four]).unwrap());
    }
}
