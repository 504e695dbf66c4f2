//! An always-sorted set of unique elements backed by a skip list.
//!
//! A skip list arranges its elements in a small stack of sorted linked
//! levels: the bottom level contains every element, and each level above
//! contains a random subset of the level below. A search starts at the
//! topmost level and drops down whenever the next element overshoots, which
//! gives `O(log n)` expected time for search, insertion and removal while
//! keeping iteration as cheap as walking a linked list.
//!
//! The set rejects duplicates, keeps its elements in ascending order under a
//! configurable ordering function, and exposes positional access
//! ([`SkipSet::find`], [`SkipSet::lower_bound`], [`SkipSet::upper_bound`])
//! alongside the usual collection surface.
//!
//! ```
//! use skipset::SkipSet;
//!
//! let mut set = SkipSet::new();
//! set.extend([30, 10, 20]);
//!
//! assert_eq!(set.iter().copied().collect::<Vec<_>>(), [10, 20, 30]);
//! assert_eq!(set.get(set.lower_bound(&15)), Some(&20));
//!
//! set.remove(&20);
//! assert!(!set.contains(&20));
//! ```
//!
//! The height of each new element is drawn from a [`LevelGenerator`]; the
//! default [`Geometric`] generator halves the occupancy per level. A custom
//! generator may be injected with [`SkipSet::with_level_generator`], for
//! example to obtain a deterministic structure in tests.

pub mod level_generator;
mod skipnode;
mod skipset;

pub use crate::{
    level_generator::{Geometric, LevelGenerator},
    skipset::{IntoIter, Iter, Position, SkipSet, SkipSetError},
};
