//! Random selection over slot arrays.

use rand::Rng;

use crate::weight::Weight;

/// Draws a value uniformly from `[0, total)`, or `None` when `total` is not
/// positive.
#[inline]
pub(crate) fn draw_below<W: Weight, R: Rng + ?Sized>(rng: &mut R, total: W) -> Option<W> {
    if total > W::ZERO {
        Some(rng.random_range(W::ZERO..total))
    } else {
        None
    }
}

/// Returns the slot at which the running sum of weights first exceeds
/// `target`.
///
/// Slots with non-positive weight are never selected. If rounding leaves the
/// running sum at or below `target` after the last slot, the last slot with
/// positive weight is returned instead.
pub(crate) fn select_cumulative<W: Weight>(
    weights: impl IntoIterator<Item = (usize, W)>,
    target: W,
) -> Option<usize> {
    let mut running = W::ZERO;
    let mut last_positive = None;
    for (slot, weight) in weights {
        if weight > W::ZERO {
            running = running + weight;
            last_positive = Some(slot);
            if running > target {
                return Some(slot);
            }
        }
    }
    last_positive
}

/// Picks a uniformly random used slot by drawing slot indices until one is
/// occupied.
///
/// Terminates quickly as long as the load factor is bounded away from zero;
/// the caller must guarantee at least one slot is used.
pub(crate) fn rejection_sample<R: Rng + ?Sized>(
    rng: &mut R,
    native_size: usize,
    is_used: impl Fn(usize) -> bool,
) -> usize {
    debug_assert!(native_size > 0);
    loop {
        let slot = rng.random_range(0..native_size);
        if is_used(slot) {
            return slot;
        }
    }
}
