//! Arithmetic reduction of fold links.
//!
//! A fold link denotes a left-fold of a binary operation with a neutral
//! element over its children. Reduction normalizes such a link: children are
//! reduced recursively, neutral elements are dropped, numeric children are
//! folded into a single number, and symbolic children are combined pairwise
//! where an algebraic rule applies (`x + x → 2·x`, like-term collection into
//! a product). The result is in canonical order: variables first, then
//! compound expressions, then the at-most-one number.
//!
//! Simplification is opportunistic, never required: when no rule applies the
//! input comes back unchanged. The two fatal conditions are reducing a link
//! that is not arithmetic (an invalid parameter) and a canonical sum holding
//! more than one number (an invariant violation that means reduction was
//! skipped).
//!
//! # Determinism
//! - Symbolic children are kept sorted by bucket (variables before
//!   compounds) and ascending handle identity; each unordered pair is tried
//!   in exactly one orientation.
//! - Rules fire in a fixed order, and each firing strictly shrinks the child
//!   list, so the pairwise pass terminates.

use crate::atom::{AtomError, AtomId, Weft};
use crate::registry::{TypeId, TypeRegistry, NUMBER_NODE, PLUS_LINK, TIMES_LINK, VARIABLE_NODE};
use std::fmt;

/// Error type for reduction.
#[derive(Debug, Clone, PartialEq)]
pub enum ReduceError {
    /// The handle does not resolve to an arithmetic link.
    NotArithmetic { found: Option<TypeId> },
    /// A canonical sum holds more than one number: reduction was not run.
    MultipleNumbers,
    /// Construction of a reduced atom failed.
    Atom(AtomError),
}

impl fmt::Display for ReduceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReduceError::NotArithmetic { found: Some(ty) } => {
                write!(f, "expected an arithmetic link, got type tag {}", ty)
            }
            ReduceError::NotArithmetic { found: None } => {
                write!(f, "expected an arithmetic link, got an unresolvable handle")
            }
            ReduceError::MultipleNumbers => {
                write!(f, "sum holds more than one number; it has not been reduced")
            }
            ReduceError::Atom(err) => write!(f, "atom construction failed: {}", err),
        }
    }
}

impl std::error::Error for ReduceError {}

impl From<AtomError> for ReduceError {
    fn from(err: AtomError) -> Self {
        ReduceError::Atom(err)
    }
}

/// A fold operation: neutral element, numeric combiner, symbolic combiner.
///
/// Implementations parameterize [`reduce`] the way doctrines parameterize
/// graph operations: the outer loop is shared, the algebra is supplied.
pub trait FoldOp {
    /// The link tag this operation reduces.
    fn link_type(&self) -> TypeId;

    /// The neutral element as a real number.
    fn knil(&self) -> f64;

    /// The operation on two real values.
    fn knum(&self, x: f64, y: f64) -> f64;

    /// The symbolic combiner of two children that are not both numeric.
    ///
    /// Returns `Some(handle)` for an atom semantically equal to the combined
    /// pair, or `None` when no rule applies and both operands are kept. A
    /// returned atom may itself be further reducible.
    fn ksym(
        &self,
        space: &Weft,
        registry: &TypeRegistry,
        x: AtomId,
        y: AtomId,
    ) -> Result<Option<AtomId>, ReduceError>;

    /// Canonicalizes a freshly assembled link.
    ///
    /// The default keeps the link as assembled; sums override this with
    /// [`reorder`].
    fn canonicalize(
        &self,
        _space: &Weft,
        _registry: &TypeRegistry,
        link: AtomId,
    ) -> Result<AtomId, ReduceError> {
        Ok(link)
    }
}

/// Fold operation of a sum: neutral `0.0`, addition, like-term collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlusFold;

impl FoldOp for PlusFold {
    fn link_type(&self) -> TypeId {
        PLUS_LINK
    }

    fn knil(&self) -> f64 {
        0.0
    }

    fn knum(&self, x: f64, y: f64) -> f64 {
        x + y
    }

    /// Combines two summands, trying in order:
    ///
    /// 1. number + number → their sum;
    /// 2. `x + x` → `x · 2`;
    /// 3. like-term collection when `y` is a product with leading factor `c`:
    ///    `c + c·a → c·(1 + a)` and `c·a + c·b → c·(a + b)`;
    /// 4. no rule → `None`.
    ///
    /// Only the right operand is inspected as a product: the caller keeps the
    /// operands in canonical order, so each unordered pair arrives in exactly
    /// one orientation.
    fn ksym(
        &self,
        space: &Weft,
        registry: &TypeRegistry,
        x: AtomId,
        y: AtomId,
    ) -> Result<Option<AtomId>, ReduceError> {
        if let (Some(a), Some(b)) = (space.number_value(x), space.number_value(y)) {
            return Ok(Some(space.number(self.knum(a, b))?));
        }

        if x == y {
            tracing::trace!(x = x.as_u32(), "collapsing x + x into a product");
            let two = space.number(2.0)?;
            return Ok(Some(space.times(&[x, two])?));
        }

        if space.type_of(y) == Some(TIMES_LINK) {
            let y_kids = space.children(y).expect("a link has children");
            let Some(&leading) = y_kids.first() else { return Ok(None) };
            let mut rest: Vec<AtomId> = Vec::new();
            let mut collected = false;

            if x == leading {
                // c + c·a → c·(1 + a)
                rest.push(space.number(1.0)?);
                collected = true;
            } else if space.type_of(x) == Some(TIMES_LINK) {
                // c·a + c·b → c·(a + b)
                let x_kids = space.children(x).expect("a link has children");
                if x_kids.first() == Some(&leading) {
                    rest.extend_from_slice(&x_kids[1..]);
                    collected = true;
                }
            }

            if collected {
                rest.extend_from_slice(&y_kids[1..]);
                tracing::trace!(
                    factor = leading.as_u32(),
                    terms = rest.len(),
                    "collecting like terms"
                );
                let coefficient = space.plus(&rest)?;
                let coefficient = fold_reduce(space, registry, &PlusFold, coefficient)?;
                return Ok(Some(space.times(&[leading, coefficient])?));
            }
        }

        Ok(None)
    }

    fn canonicalize(
        &self,
        space: &Weft,
        registry: &TypeRegistry,
        link: AtomId,
    ) -> Result<AtomId, ReduceError> {
        reorder(space, registry, link)
    }
}

/// Fold operation of a product: neutral `1.0`, multiplication.
///
/// Symbolic combination is numeric-only.
// TODO: collect repeated factors into exponents once a power link exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimesFold;

impl FoldOp for TimesFold {
    fn link_type(&self) -> TypeId {
        TIMES_LINK
    }

    fn knil(&self) -> f64 {
        1.0
    }

    fn knum(&self, x: f64, y: f64) -> f64 {
        x * y
    }

    fn ksym(
        &self,
        space: &Weft,
        _registry: &TypeRegistry,
        x: AtomId,
        y: AtomId,
    ) -> Result<Option<AtomId>, ReduceError> {
        if let (Some(a), Some(b)) = (space.number_value(x), space.number_value(y)) {
            return Ok(Some(space.number(self.knum(a, b))?));
        }
        Ok(None)
    }
}

/// Reduces an arithmetic link to its normal form.
///
/// Dispatches on the link tag: sums reduce under [`PlusFold`], products under
/// [`TimesFold`]. Any other tag is an invalid parameter. Idempotent: reducing
/// a reduced term returns the same handle.
pub fn reduce(space: &Weft, registry: &TypeRegistry, h: AtomId) -> Result<AtomId, ReduceError> {
    let found = space.type_of(h);
    match found {
        Some(ty) if registry.is_a(ty, PLUS_LINK) => fold_reduce(space, registry, &PlusFold, h),
        Some(ty) if registry.is_a(ty, TIMES_LINK) => fold_reduce(space, registry, &TimesFold, h),
        _ => Err(ReduceError::NotArithmetic { found }),
    }
}

/// Reduces `h` if it is an arithmetic link, and returns it untouched
/// otherwise. Children of unknown tags are opaque to the reducer.
fn reduce_opportunistic(
    space: &Weft,
    registry: &TypeRegistry,
    h: AtomId,
) -> Result<AtomId, ReduceError> {
    match space.type_of(h) {
        Some(ty) if registry.is_a(ty, PLUS_LINK) || registry.is_a(ty, TIMES_LINK) => {
            reduce(space, registry, h)
        }
        _ => Ok(h),
    }
}

/// The outer fold-link reduction loop, shared by all fold operations.
fn fold_reduce(
    space: &Weft,
    registry: &TypeRegistry,
    fold: &dyn FoldOp,
    h: AtomId,
) -> Result<AtomId, ReduceError> {
    let kids = space.children(h).ok_or(ReduceError::NotArithmetic { found: space.type_of(h) })?;

    // Reduce children first, then split off the numeric part: the running
    // accumulator absorbs every number, which both folds numerics and drops
    // neutral elements.
    let mut acc = fold.knil();
    let mut symbolic: Vec<AtomId> = Vec::with_capacity(kids.len());
    for &kid in kids.iter() {
        let reduced = reduce_opportunistic(space, registry, kid)?;
        match space.number_value(reduced) {
            Some(v) => acc = fold.knum(acc, v),
            None => symbolic.push(reduced),
        }
    }

    sort_canonical(space, &mut symbolic);

    // Pairwise symbolic folding to a fixpoint. Every applied rule removes two
    // children and inserts at most one, so this terminates.
    'scan: loop {
        for i in 0..symbolic.len() {
            for j in (i + 1)..symbolic.len() {
                if let Some(combined) = fold.ksym(space, registry, symbolic[i], symbolic[j])? {
                    symbolic.remove(j);
                    symbolic.remove(i);
                    let combined = reduce_opportunistic(space, registry, combined)?;
                    match space.number_value(combined) {
                        Some(v) => acc = fold.knum(acc, v),
                        None => {
                            symbolic.push(combined);
                            sort_canonical(space, &mut symbolic);
                        }
                    }
                    continue 'scan;
                }
            }
        }
        break;
    }

    let mut result = symbolic;
    if acc != fold.knil() {
        result.push(space.number(acc)?);
    }
    match result.len() {
        0 => Ok(space.number(fold.knil())?),
        1 => Ok(result[0]),
        _ => {
            let link = space.make_link(fold.link_type(), &result)?;
            fold.canonicalize(space, registry, link)
        }
    }
}

/// Re-orders the children of a sum into canonical form.
///
/// Children are partitioned into three buckets by tag (variables, compound
/// expressions, numbers) and concatenated in that order, each bucket sorted
/// by ascending handle identity. A sum with more than one number has not
/// been reduced; that is an invariant violation, not an input condition.
pub fn reorder(space: &Weft, registry: &TypeRegistry, h: AtomId) -> Result<AtomId, ReduceError> {
    let ty = match space.type_of(h) {
        Some(ty) if registry.is_a(ty, PLUS_LINK) => ty,
        found => return Err(ReduceError::NotArithmetic { found }),
    };
    let kids = space.children(h).ok_or(ReduceError::NotArithmetic { found: Some(ty) })?;

    let mut vars = Vec::new();
    let mut exprs = Vec::new();
    let mut numbers = Vec::new();
    for &kid in kids.iter() {
        match space.type_of(kid) {
            Some(VARIABLE_NODE) => vars.push(kid),
            Some(NUMBER_NODE) => numbers.push(kid),
            _ => exprs.push(kid),
        }
    }
    if numbers.len() > 1 {
        return Err(ReduceError::MultipleNumbers);
    }

    vars.sort_unstable();
    exprs.sort_unstable();
    let mut result = vars;
    result.append(&mut exprs);
    result.append(&mut numbers);
    Ok(space.make_link(ty, &result)?)
}

/// Sorts symbolic children into canonical order: variables before compound
/// expressions, ascending handle identity within each bucket.
fn sort_canonical(space: &Weft, symbolic: &mut [AtomId]) {
    symbolic.sort_unstable_by_key(|&h| {
        let rank = if space.type_of(h) == Some(VARIABLE_NODE) { 0u8 } else { 1u8 };
        (rank, h)
    });
}
