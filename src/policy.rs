//! Policies deciding how much capacity to acquire on growth and shrink.

/// A stateless mapping from capacity demands to block sizes.
///
/// Backends consult their policy whenever a different-sized block is
/// needed; the policy only does arithmetic and never observes the result
/// of its previous decisions.
pub trait GrowthPolicy {
    /// Computes the size of the replacement block when growing.
    ///
    /// `cur` is the current capacity, `additional` the number of elements
    /// needed beyond it, and `max` the backend's maximum size. The result
    /// is always at least `cur + additional`, even when that exceeds `max`;
    /// it is the backend's job to refuse sizes it cannot provide.
    fn grow(cur: usize, additional: usize, max: usize) -> usize;

    /// Computes the size of the replacement block when shrinking.
    ///
    /// The result is always at least `needed`.
    fn shrink(cur: usize, needed: usize, max: usize) -> usize;
}

/// A policy that acquires exactly what is needed, in both directions.
///
/// Useful when memory is tighter than time; every growth step relocates.
pub struct ExactFit;

impl GrowthPolicy for ExactFit {
    #[inline]
    fn grow(cur: usize, additional: usize, _max: usize) -> usize {
        cur.saturating_add(additional)
    }

    #[inline]
    fn shrink(_cur: usize, needed: usize, _max: usize) -> usize {
        needed
    }
}

/// A policy that scales the current capacity by `NUM / DEN` when growing.
///
/// The scaled value is rounded to nearest with ties rounding up, through
/// the same arithmetic whether the factor is whole or fractional, and is
/// clamped to `max` (but never below the required minimum). Shrinking
/// releases down to exactly what is needed.
///
/// # Examples
/// ```
/// use yucca::{FactorGrowth, GrowthPolicy};
///
/// // One-and-a-half-fold growth: 5 * 1.5 = 7.5 rounds up to 8.
/// type Halfling = FactorGrowth<3, 2>;
/// assert_eq!(Halfling::grow(5, 1, usize::MAX), 8);
/// ```
pub struct FactorGrowth<const NUM: usize, const DEN: usize>;

/// The default growth policy: double the capacity, release exactly.
///
/// # Examples
/// ```
/// use yucca::{Doubling, GrowthPolicy};
///
/// assert_eq!(Doubling::grow(0, 40, usize::MAX), 40);
/// assert_eq!(Doubling::grow(40, 10, usize::MAX), 80);
/// ```
pub type Doubling = FactorGrowth<2, 1>;

impl<const NUM: usize, const DEN: usize> GrowthPolicy for FactorGrowth<NUM, DEN> {
    fn grow(cur: usize, additional: usize, max: usize) -> usize {
        let needed = cur.saturating_add(additional);
        let scaled = scale_round_half_up(cur, NUM, DEN);
        needed.max(scaled.min(max))
    }

    #[inline]
    fn shrink(_cur: usize, needed: usize, _max: usize) -> usize {
        needed
    }
}

/// Computes `round(cur * num / den)`, rounding ties up.
fn scale_round_half_up(cur: usize, num: usize, den: usize) -> usize {
    debug_assert!(den > 0);
    let num = num as u128;
    let den = den as u128;
    let scaled = (2 * cur as u128 * num + den) / (2 * den);
    if scaled > usize::MAX as u128 {
        usize::MAX
    } else {
        scaled as usize
    }
}
