use oorandom::Rand32;


/// The maximum height a skiplist node may be created with, absent an explicit override.
///
/// With [`random_height`], one node is generated with this maximum height per approximately
/// 4,000 entries inserted into the skiplist (on average, at `p = 1/2`).
pub const MAX_HEIGHT: usize = 12;


/// A minimal PRNG trait, used for generating random node heights.
///
/// Abstracted away from [`oorandom::Rand32`] so tests can supply a seeded or adversarial
/// generator without pulling in a different RNG crate.
pub trait Prng32 {
    /// Produces a random `u32` in the range `[0, u32::MAX]`.
    #[must_use]
    fn rand_u32(&mut self) -> u32;
}

impl Prng32 for Rand32 {
    #[inline]
    fn rand_u32(&mut self) -> u32 {
        Self::rand_u32(self)
    }
}

/// Sample a node height in `1..=max_height`, geometric distribution with `p = 1/2`, matching
/// `std::geometric_distribution<int>(0.5)` in the reference implementation.
pub fn random_height<P: Prng32>(prng: &mut P, max_height: usize) -> usize {
    debug_assert!(max_height >= 1, "a skiplist must allow at least one level");

    let mut height = 1;
    while height < max_height && prng.rand_u32() % 2 == 0 {
        height += 1;
    }
    height
}
