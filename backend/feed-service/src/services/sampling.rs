//! Down-sampling of feed segments
//!
//! A uniform random permutation of the input truncated to the target size.
//! Shorter inputs are returned whole (shuffled), never padded.

use rand::seq::SliceRandom;
use rand::Rng;

/// Sample at most `count` items without replacement using `rng`
pub fn sample_with<T, R>(mut items: Vec<T>, count: usize, rng: &mut R) -> Vec<T>
where
    R: Rng + ?Sized,
{
    items.shuffle(rng);
    items.truncate(count);
    items
}

/// Sample at most `count` items without replacement using the thread-local RNG
pub fn sample<T>(items: Vec<T>, count: usize) -> Vec<T> {
    sample_with(items, count, &mut rand::thread_rng())
}
