//! Skiplists use a probabilistic distribution of nodes over the internal
//! levels, whereby the lowest level (level 1) contains all the nodes, and each
//! level $n > 1$ will contain a random subset of the nodes on level $n - 1$.
//!
//! Most commonly, a geometric distribution is used whereby the chance that a
//! node occupies level $n$ is $p$ times the chance of occupying level $n-1$
//! (with $0 < p < 1$).
//!
//! It is very unlikely that this will need to be changed as the default should
//! suffice, but if need be custom level generators can be implemented, for
//! example to obtain deterministic structures in tests.

pub mod geometric;

pub use geometric::Geometric;

// ////////////////////////////////////////////////////////////////////////////
// Level Generator
// ////////////////////////////////////////////////////////////////////////////

/// Upon the insertion of a new node in the list, the node is replicated to
/// high levels with a certain probability as determined by a
/// [`LevelGenerator`].
pub trait LevelGenerator {
    /// The maximum height a node may have, and hence the maximum number of
    /// levels the list may grow to.
    #[must_use]
    fn total(&self) -> usize;

    /// Draw a random height for a new node in the range `[1, total]`.
    ///
    /// This function should _never_ return zero or a height greater than
    /// [`total`][LevelGenerator::total].
    #[must_use]
    fn height(&mut self) -> usize;

    /// Create an independent generator with the same configuration.
    ///
    /// Used when a list is cloned so that the copy draws its own heights.
    #[must_use]
    fn fork(&self) -> Box<dyn LevelGenerator + Send>;
}
