//! An always-sorted set of unique elements backed by a skip list.

use std::{
    cmp,
    cmp::Ordering,
    fmt,
    hash::{self, Hash},
    iter, mem,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering::Relaxed},
    },
};

use thiserror::Error;

use crate::{
    level_generator::{Geometric, LevelGenerator},
    skipnode::{NodeArena, NodeId, NodeKind},
};

/// The default maximum number of levels, and hence the default height cap for
/// inserted elements.
const DEFAULT_MAX_LEVEL: usize = 16;

/// The default probability that an element present at some level is also
/// present at the level above.
const DEFAULT_PROBABILITY: f64 = 0.5;

/// Source of per-container tokens. Arena slot ids are only unique within one
/// set, so positions additionally carry the identity of the set that issued
/// them.
static NEXT_SET_TOKEN: AtomicU64 = AtomicU64::new(0);

// ////////////////////////////////////////////////////////////////////////////
// Errors
// ////////////////////////////////////////////////////////////////////////////

/// Errors reported by the fallible [`SkipSet`] operations.
///
/// Absence of an element is never an error: lookups on absent keys return the
/// end position instead.
#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum SkipSetError {
    /// The node arena has run out of slot ids. The operation that reported
    /// this has not modified the set.
    #[error("node storage is exhausted.")]
    AllocationFailed,
    /// The end position does not refer to an element and cannot be removed.
    #[error("cannot remove the end position.")]
    EndPosition,
    /// The position does not refer to a live element of this set. It may be
    /// stale (the element was removed) or belong to a different set.
    #[error("position does not refer to a live element of this set.")]
    InvalidPosition,
    /// The range end is not reachable from the range start; the bounds are
    /// inverted or refer to different sets. Nothing was removed.
    #[error("range end is not reachable from range start.")]
    InvalidRange,
}

// ////////////////////////////////////////////////////////////////////////////
// Position
// ////////////////////////////////////////////////////////////////////////////

/// An opaque reference to an element of a [`SkipSet`], or the end marker one
/// past the last element.
///
/// A position records which set issued it, so a position handed to a
/// different set is rejected even when the internal indices happen to
/// coincide. Positions are invalidated by any structural mutation of the set
/// they were obtained from (insert, remove, clear, merge); using a stale or
/// foreign position is a usage error and is reported by the fallible
/// operations that take one.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Position {
    set: u64,
    node: Option<NodeId>,
}

impl Position {
    /// Returns `true` if this is the end marker rather than an element.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }
}

// ////////////////////////////////////////////////////////////////////////////
// SkipSet
// ////////////////////////////////////////////////////////////////////////////

/// An ordered set backed by a skip list.
///
/// Elements are kept sorted at all times under the set's ordering function,
/// duplicates are rejected, and search, insertion and removal all run in
/// `O(log n)` expected time. Forward iteration visits the bottom level only
/// and yields elements in ascending order.
///
/// By default the set orders elements with
/// `a.partial_cmp(b).expect("element cannot be ordered")`, which handles all
/// types implementing `Ord` and `PartialOrd` but panics on values which cannot
/// be ordered (such as `f64::NAN`).
///
/// A custom ordering function must be well-behaved, i.e. it must be a total
/// order:
///
/// - Be well defined: `f(a, b)` should always return the same value.
/// - Be anti-symmetric: `f(a, b) == Greater` iff `f(b, a) == Less` and
///   `f(a, b) == Equal == f(b, a)`.
/// - Be transitive: if `f(a, b) == Greater` and `f(b, c) == Greater` then
///   `f(a, c) == Greater`.
///
/// A misbehaving ordering function cannot corrupt memory, but lookups and
/// iteration order become meaningless.
pub struct SkipSet<T> {
    /// Backing storage for every node and element.
    arena: NodeArena<T>,
    /// Head sentinel of the topmost level.
    head: NodeId,
    /// Tail sentinel of the topmost level.
    tail: NodeId,
    /// Number of active levels; at least 1, even when empty.
    level: usize,
    /// Number of elements, which equals the number of level-1 element nodes.
    len: usize,
    /// Identity stamped into every position this set issues.
    token: u64,
    level_generator: Box<dyn LevelGenerator + Send>,
    compare: Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>,
}

fn default_compare<T: PartialOrd>() -> Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync> {
    Arc::new(|a: &T, b: &T| a.partial_cmp(b).expect("Element cannot be ordered."))
}

fn default_generator(levels: usize) -> Box<dyn LevelGenerator + Send> {
    Box::new(
        Geometric::new(levels, DEFAULT_PROBABILITY)
            .expect("default level generator parameters are valid"),
    )
}

/// The element node following `id` on its level, skipping nothing: `None` once
/// the tail sentinel is next.
fn next_element<T>(arena: &NodeArena<T>, id: NodeId) -> Option<NodeId> {
    let right = arena.node(id).right?;
    arena.node(right).elem().map(|_| right)
}

// ///////////////////////////////////////////////
// Inherent methods
// ///////////////////////////////////////////////

impl<T> SkipSet<T>
where
    T: cmp::PartialOrd,
{
    /// Create a new skip set with the default comparison function and the
    /// default height cap of 16 levels.
    ///
    /// # Examples
    ///
    /// ```
    /// use skipset::SkipSet;
    ///
    /// let mut set: SkipSet<i64> = SkipSet::new();
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(default_compare(), default_generator(DEFAULT_MAX_LEVEL))
    }

    /// Constructs a new, empty skip set with the optimal number of levels for
    /// the intended capacity. Specifically, it uses `floor(log2(capacity))`
    /// number of levels, ensuring that only *a few* nodes occupy the highest
    /// level.
    ///
    /// # Examples
    ///
    /// ```
    /// use skipset::SkipSet;
    ///
    /// let mut set = SkipSet::with_capacity(100);
    /// set.extend(0..100);
    /// ```
    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_precision_loss,
            clippy::cast_sign_loss,
            clippy::as_conversions,
            clippy::float_arithmetic,
            reason = "level count is tiny and the cast saturates at zero"
        )]
        let levels = cmp::max(1, (capacity as f64).log2().floor() as usize);
        Self::with_parts(default_compare(), default_generator(levels))
    }

    /// Create a new skip set drawing node heights from the provided generator,
    /// with the default comparison function.
    ///
    /// Injecting a deterministic generator produces a reproducible level
    /// structure, which is useful in tests.
    #[inline]
    #[must_use]
    pub fn with_level_generator<G>(generator: G) -> Self
    where
        G: LevelGenerator + Send + 'static,
    {
        Self::with_parts(default_compare(), Box::new(generator))
    }
}

impl<T> SkipSet<T> {
    /// Create a new skip set using the provided function to determine the
    /// ordering of elements. It will be generated with the default height cap
    /// of 16 levels.
    ///
    /// The function must be a total order; see the [type documentation]
    /// [SkipSet] for the exact requirements.
    ///
    /// # Examples
    ///
    /// ```
    /// use skipset::SkipSet;
    ///
    /// let mut set = SkipSet::with_comp(|a: &i64, b: &i64| b.cmp(a));
    /// set.extend(0..5);
    /// assert_eq!(set.iter().copied().collect::<Vec<_>>(), [4, 3, 2, 1, 0]);
    /// ```
    #[inline]
    #[must_use]
    pub fn with_comp<F>(f: F) -> Self
    where
        F: 'static + Send + Sync + Fn(&T, &T) -> Ordering,
    {
        Self::with_parts(Arc::new(f), default_generator(DEFAULT_MAX_LEVEL))
    }

    fn with_parts(
        compare: Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>,
        level_generator: Box<dyn LevelGenerator + Send>,
    ) -> Self {
        let mut arena = NodeArena::new();
        let (head, tail) = arena
            .try_sentinel_pair()
            .expect("a fresh arena cannot be out of slots");
        SkipSet {
            arena,
            head,
            tail,
            level: 1,
            len: 0,
            token: NEXT_SET_TOKEN.fetch_add(1, Relaxed),
            level_generator,
            compare,
        }
    }

    /// Stamp a raw node reference with this set's identity.
    fn position(&self, node: Option<NodeId>) -> Position {
        Position {
            set: self.token,
            node,
        }
    }

    /// Returns the number of elements in the set.
    ///
    /// # Examples
    ///
    /// ```
    /// use skipset::SkipSet;
    ///
    /// let mut set = SkipSet::new();
    /// set.extend(0..10);
    /// assert_eq!(set.len(), 10);
    /// ```
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the set contains no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The configured height cap: the maximum number of levels the set may
    /// grow to, and hence the maximum height of any inserted element.
    #[inline]
    #[must_use]
    pub fn max_level(&self) -> usize {
        self.level_generator.total()
    }

    /// Clears the set, removing all elements and collapsing the ladder back
    /// to a single empty level.
    ///
    /// # Examples
    ///
    /// ```
    /// use skipset::SkipSet;
    ///
    /// let mut set = SkipSet::new();
    /// set.extend(0..10);
    /// set.clear();
    /// assert!(set.is_empty());
    /// ```
    pub fn clear(&mut self) {
        self.arena.clear();
        let (head, tail) = self
            .arena
            .try_sentinel_pair()
            .expect("a fresh arena cannot be out of slots");
        self.head = head;
        self.tail = tail;
        self.level = 1;
        self.len = 0;
    }

    /// Swaps the entire contents of two sets, including their ordering
    /// functions and level generators.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Insert an element, unless an equal element is already present.
    ///
    /// Returns the position of the element together with `true` if it was
    /// newly inserted, or the position of the already-present equal element
    /// together with `false`. The set never stores duplicates.
    ///
    /// # Errors
    ///
    /// [`SkipSetError::AllocationFailed`] if the node arena has run out of
    /// slot ids; the value is dropped. In that case the set is unchanged:
    /// every slot an insertion needs is allocated before any link is
    /// touched.
    ///
    /// # Examples
    ///
    /// ```
    /// use skipset::SkipSet;
    ///
    /// let mut set = SkipSet::new();
    /// let (_, inserted) = set.insert(5).unwrap();
    /// assert!(inserted);
    /// let (_, inserted) = set.insert(5).unwrap();
    /// assert!(!inserted);
    /// assert_eq!(set.len(), 1);
    /// ```
    pub fn insert(&mut self, value: T) -> Result<(Position, bool), SkipSetError> {
        self.insert_value(value).map_err(|(_, error)| error)
    }

    /// The [`insert`][Self::insert] engine. On failure the value is handed
    /// back alongside the error so callers moving elements between sets can
    /// restore them.
    fn insert_value(&mut self, value: T) -> Result<(Position, bool), (T, SkipSetError)> {
        let mut update = self.search_path(&value);
        if let Some(right) = self.arena.node(update[0]).right
            && let Some(existing) = self.arena.node(right).elem()
            && (self.compare)(self.arena.elem(existing), &value) == Ordering::Equal
        {
            return Ok((self.position(Some(right)), false));
        }

        let height = self.level_generator.height();

        // Allocation phase: claim every slot this insert needs before any
        // link is touched, so a failure leaves the structure untouched.
        let elem = match self.arena.try_insert_elem(value) {
            Ok(elem) => elem,
            Err(value) => return Err((value, SkipSetError::AllocationFailed)),
        };
        let mut new_sentinels = Vec::new();
        for _ in self.level..height {
            match self.arena.try_sentinel_pair() {
                Some(pair) => new_sentinels.push(pair),
                None => {
                    let value = self.rollback(elem, &new_sentinels, &[]);
                    return Err((value, SkipSetError::AllocationFailed));
                }
            }
        }
        let mut instances = Vec::with_capacity(height);
        for _ in 0..height {
            match self.arena.try_insert_node(NodeKind::Element(elem)) {
                Some(id) => instances.push(id),
                None => {
                    let value = self.rollback(elem, &new_sentinels, &instances);
                    return Err((value, SkipSetError::AllocationFailed));
                }
            }
        }

        // Link phase; infallible. Raise the ladder first so that the update
        // node for each new level is its fresh head sentinel.
        for &(head, tail) in &new_sentinels {
            self.arena.node_mut(head).down = Some(self.head);
            self.arena.node_mut(tail).down = Some(self.tail);
            self.head = head;
            self.tail = tail;
            update.push(head);
            self.level += 1;
        }

        // Splice bottom-up, threading the vertical chain as we go.
        let mut lower: Option<NodeId> = None;
        for (lvl, &id) in instances.iter().enumerate() {
            self.arena.node_mut(id).down = lower;
            self.arena.splice_after(update[lvl], id);
            lower = Some(id);
        }
        self.len += 1;
        Ok((self.position(Some(instances[0])), true))
    }

    /// Free the slots claimed by a failed insertion, returning the element.
    /// None of the slots has been linked into the structure yet.
    fn rollback(
        &mut self,
        elem: crate::skipnode::ElemId,
        sentinels: &[(NodeId, NodeId)],
        instances: &[NodeId],
    ) -> T {
        for &id in instances {
            self.arena.remove_node(id);
        }
        for &(head, tail) in sentinels {
            self.arena.remove_node(head);
            self.arena.remove_node(tail);
        }
        self.arena.remove_elem(elem)
    }

    /// Removes the element equal to the given key, returning it, or `None` if
    /// no such element is present.
    ///
    /// # Examples
    ///
    /// ```
    /// use skipset::SkipSet;
    ///
    /// let mut set = SkipSet::new();
    /// set.extend(0..10);
    /// assert_eq!(set.remove(&4), Some(4));
    /// assert_eq!(set.remove(&4), None);
    /// ```
    pub fn remove(&mut self, key: &T) -> Option<T> {
        let top = self.find_chain_top(key)?;
        Some(self.remove_chain(top))
    }

    /// Removes the element at the given position, returning it together with
    /// the position of the next element in ascending order (or the end
    /// marker).
    ///
    /// # Errors
    ///
    /// [`SkipSetError::EndPosition`] if `pos` is the end marker, and
    /// [`SkipSetError::InvalidPosition`] if it was issued by a different set
    /// or does not refer to a live element of this set. The set is unchanged
    /// in either case.
    pub fn remove_at(&mut self, pos: Position) -> Result<(T, Position), SkipSetError> {
        if pos.set != self.token {
            return Err(SkipSetError::InvalidPosition);
        }
        let id = pos.node.ok_or(SkipSetError::EndPosition)?;
        if !self.position_is_live(id) {
            return Err(SkipSetError::InvalidPosition);
        }
        let next = self.position(next_element(&self.arena, id));
        let top = {
            let elem = self
                .arena
                .node(id)
                .elem()
                .expect("live positions refer to element nodes");
            let key = self.arena.elem(elem);
            self.find_chain_top(key)
                .expect("live elements are reachable from the top level")
        };
        let value = self.remove_chain(top);
        Ok((value, next))
    }

    /// Removes every element in the range `[first, last)`, returning `last`.
    ///
    /// # Errors
    ///
    /// [`SkipSetError::InvalidPosition`] if either bound was issued by a
    /// different set or does not refer to a live element of this set (the
    /// end marker is always valid), and [`SkipSetError::InvalidRange`] if
    /// `last` is not reachable from `first` (inverted bounds). Nothing is
    /// removed on error.
    pub fn remove_range(
        &mut self,
        first: Position,
        last: Position,
    ) -> Result<Position, SkipSetError> {
        if first.set != self.token || last.set != self.token {
            return Err(SkipSetError::InvalidPosition);
        }
        if let Some(id) = first.node
            && !self.position_is_live(id)
        {
            return Err(SkipSetError::InvalidPosition);
        }
        if let Some(id) = last.node
            && !self.position_is_live(id)
        {
            return Err(SkipSetError::InvalidPosition);
        }
        if first == self.begin() && last.is_end() {
            self.clear();
            return Ok(self.position(None));
        }

        // Walk the range before touching anything, both to detect inverted
        // bounds and so a usage error removes nothing.
        let mut doomed = Vec::new();
        let mut current = first.node;
        while current != last.node {
            let Some(id) = current else {
                return Err(SkipSetError::InvalidRange);
            };
            doomed.push(id);
            current = next_element(&self.arena, id);
        }
        for id in doomed {
            let top = {
                let elem = self
                    .arena
                    .node(id)
                    .elem()
                    .expect("live positions refer to element nodes");
                let key = self.arena.elem(elem);
                self.find_chain_top(key)
                    .expect("live elements are reachable from the top level")
            };
            drop(self.remove_chain(top));
        }
        Ok(last)
    }

    /// Returns the position of the element equal to the given key, or the end
    /// marker if no such element is present.
    ///
    /// # Examples
    ///
    /// ```
    /// use skipset::SkipSet;
    ///
    /// let mut set = SkipSet::new();
    /// set.extend(0..10);
    /// assert_eq!(set.get(set.find(&4)), Some(&4));
    /// assert!(set.find(&15).is_end());
    /// ```
    #[must_use]
    pub fn find(&self, key: &T) -> Position {
        let prev = self.descend(key);
        let right = self
            .arena
            .node(prev)
            .right
            .expect("non-tail nodes link rightward");
        match self.arena.node(right).elem() {
            Some(elem) if (self.compare)(self.arena.elem(elem), key) == Ordering::Equal => {
                self.position(Some(right))
            }
            _ => self.position(None),
        }
    }

    /// Returns `true` if an element equal to the given key is present.
    ///
    /// # Examples
    ///
    /// ```
    /// use skipset::SkipSet;
    ///
    /// let mut set = SkipSet::new();
    /// set.extend(0..10);
    /// assert!(set.contains(&4));
    /// assert!(!set.contains(&15));
    /// ```
    #[must_use]
    pub fn contains(&self, key: &T) -> bool {
        !self.find(key).is_end()
    }

    /// Returns the position of the first element which is not less than the
    /// given key, or the end marker if every element is less.
    ///
    /// # Examples
    ///
    /// ```
    /// use skipset::SkipSet;
    ///
    /// let set: SkipSet<_> = (0..100).step_by(2).collect();
    /// assert_eq!(set.get(set.lower_bound(&35)), Some(&36));
    /// assert!(set.lower_bound(&100).is_end());
    /// ```
    #[must_use]
    pub fn lower_bound(&self, key: &T) -> Position {
        let prev = self.descend(key);
        let right = self
            .arena
            .node(prev)
            .right
            .expect("non-tail nodes link rightward");
        self.position(self.arena.node(right).elem().map(|_| right))
    }

    /// Returns the position of the first element strictly greater than the
    /// given key, or the end marker if no such element exists.
    #[must_use]
    pub fn upper_bound(&self, key: &T) -> Position {
        let pos = self.lower_bound(key);
        match self.get(pos) {
            Some(value) if (self.compare)(value, key) == Ordering::Equal => self.advance(pos),
            _ => pos,
        }
    }

    /// The element referred to by a position, or `None` for the end marker,
    /// a position issued by another set, or a position whose slot is no
    /// longer live.
    #[must_use]
    pub fn get(&self, pos: Position) -> Option<&T> {
        if pos.set != self.token {
            return None;
        }
        let id = pos.node?;
        let node = self.arena.try_node(id)?;
        node.elem().map(|elem| self.arena.elem(elem))
    }

    /// The position following `pos` in ascending order. Advancing the end
    /// marker (or a stale or foreign position) yields the end marker.
    #[must_use]
    pub fn advance(&self, pos: Position) -> Position {
        if pos.set != self.token {
            return self.position(None);
        }
        match pos.node {
            Some(id) if self.arena.try_node(id).is_some() => {
                self.position(next_element(&self.arena, id))
            }
            _ => self.position(None),
        }
    }

    /// The position of the smallest element, or the end marker if the set is
    /// empty.
    #[must_use]
    pub fn begin(&self) -> Position {
        self.position(self.first_element())
    }

    /// The end marker: the position one past the largest element.
    #[must_use]
    pub fn end(&self) -> Position {
        self.position(None)
    }

    /// Provides a reference to the smallest element, or `None` if the set is
    /// empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use skipset::SkipSet;
    ///
    /// let mut set = SkipSet::new();
    /// assert!(set.front().is_none());
    ///
    /// set.extend([2, 1]);
    /// assert_eq!(set.front(), Some(&1));
    /// ```
    #[inline]
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.get(self.begin())
    }

    /// Provides a reference to the largest element, or `None` if the set is
    /// empty.
    #[must_use]
    pub fn back(&self) -> Option<&T> {
        let mut node = self.head;
        loop {
            let current = self.arena.node(node);
            match current.right {
                Some(right) if self.arena.node(right).elem().is_some() => node = right,
                _ => match current.down {
                    Some(down) => node = down,
                    None => break,
                },
            }
        }
        self.arena.value_of(node)
    }

    /// Destructively absorbs every element of `other` which is not already
    /// present in this set. Absorbed elements are removed from `other`;
    /// elements equal to one already present stay in `other`.
    ///
    /// # Errors
    ///
    /// [`SkipSetError::AllocationFailed`] if this set's arena runs out of
    /// slot ids part-way through. Elements absorbed before the failure
    /// remain absorbed; the element that could not be absorbed is put back
    /// into `other`, so no element is ever lost.
    ///
    /// # Examples
    ///
    /// ```
    /// use skipset::SkipSet;
    ///
    /// let mut a: SkipSet<_> = [1, 2, 3].into_iter().collect();
    /// let mut b: SkipSet<_> = [3, 4, 5].into_iter().collect();
    /// a.merge(&mut b).unwrap();
    /// assert_eq!(a.iter().copied().collect::<Vec<_>>(), [1, 2, 3, 4, 5]);
    /// assert_eq!(b.iter().copied().collect::<Vec<_>>(), [3]);
    /// ```
    pub fn merge(&mut self, other: &mut Self) -> Result<(), SkipSetError> {
        let mut movable = Vec::new();
        let mut current = other.first_element();
        while let Some(id) = current {
            let value = other
                .arena
                .value_of(id)
                .expect("iteration visits element nodes only");
            if !self.contains(value) {
                movable.push(id);
            }
            current = next_element(&other.arena, id);
        }
        for id in movable {
            let top = {
                let elem = other
                    .arena
                    .node(id)
                    .elem()
                    .expect("iteration visits element nodes only");
                let key = other.arena.elem(elem);
                other
                    .find_chain_top(key)
                    .expect("live elements are reachable from the top level")
            };
            let value = other.remove_chain(top);
            if let Err((value, error)) = self.insert_value(value) {
                other.reattach(value);
                return Err(error);
            }
        }
        Ok(())
    }

    /// Creates an iterator over the elements of the set, in ascending order.
    ///
    /// # Examples
    ///
    /// ```
    /// use skipset::SkipSet;
    ///
    /// let mut set = SkipSet::new();
    /// set.extend([3, 1, 2]);
    /// let elements: Vec<_> = set.iter().copied().collect();
    /// assert_eq!(elements, [1, 2, 3]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            arena: &self.arena,
            next: self.first_element(),
            remaining: self.len,
        }
    }

    /// Re-checks the structural invariants by walking every level: strict
    /// ascending order per level, mutually-inverse horizontal links, vertical
    /// chains that stay within one element and terminate at level 1, intact
    /// sentinel boundaries, and an element count matching `len`.
    ///
    /// Intended for tests and diagnostics; it walks the entire structure.
    #[must_use]
    pub fn validate(&self) -> bool {
        let mut level_head = Some(self.head);
        let mut lvl = self.level;
        let mut bottom_count = 0;
        while let Some(head) = level_head {
            if lvl == 0 {
                // More sentinel levels than the recorded level count.
                return false;
            }
            let head_node = self.arena.node(head);
            if head_node.kind != NodeKind::Head
                || head_node.left.is_some()
                || (lvl > 1) != head_node.down.is_some()
            {
                return false;
            }
            let mut prev = head;
            let mut current = head_node.right;
            let mut terminated = false;
            while let Some(id) = current {
                let node = self.arena.node(id);
                if node.left != Some(prev) {
                    return false;
                }
                match node.kind {
                    NodeKind::Head => return false,
                    NodeKind::Tail => {
                        if node.right.is_some() || (lvl > 1) != node.down.is_some() {
                            return false;
                        }
                        terminated = true;
                    }
                    NodeKind::Element(elem) => {
                        if let Some(prev_elem) = self.arena.node(prev).elem()
                            && (self.compare)(self.arena.elem(prev_elem), self.arena.elem(elem))
                                != Ordering::Less
                        {
                            return false;
                        }
                        if lvl > 1 {
                            // The same element must occupy the level below.
                            match node.down {
                                Some(below) => {
                                    if self.arena.node(below).elem() != Some(elem) {
                                        return false;
                                    }
                                }
                                None => return false,
                            }
                        } else {
                            if node.down.is_some() {
                                return false;
                            }
                            bottom_count += 1;
                        }
                    }
                }
                prev = id;
                current = node.right;
            }
            if !terminated {
                return false;
            }
            level_head = head_node.down;
            lvl -= 1;
        }
        lvl == 0 && bottom_count == self.len
    }

    /// Renders the ladder for debugging, topmost level first, one line per
    /// level listing that level's elements left to right.
    #[must_use]
    pub fn dump_levels(&self) -> String
    where
        T: fmt::Debug,
    {
        use fmt::Write as _;

        let mut out = String::new();
        let mut level_head = Some(self.head);
        let mut lvl = self.level;
        while let Some(head) = level_head {
            if !out.is_empty() {
                out.push('\n');
            }
            let _ = write!(out, "level {lvl}:");
            let mut current = self.arena.node(head).right;
            while let Some(id) = current {
                let node = self.arena.node(id);
                if let Some(elem) = node.elem() {
                    let _ = write!(out, " {:?}", self.arena.elem(elem));
                }
                current = node.right;
            }
            level_head = self.arena.node(head).down;
            lvl = lvl.saturating_sub(1);
        }
        out
    }
}

// ///////////////////////////////////////////////
// Internal methods
// ///////////////////////////////////////////////

impl<T> SkipSet<T> {
    /// Advance right from `node` while the right neighbour's element is
    /// strictly less than `key`, stopping before any equal or greater element
    /// and before the tail sentinel.
    fn scan_level(&self, mut node: NodeId, key: &T) -> NodeId {
        while let Some(right) = self.arena.node(node).right {
            match self.arena.node(right).elem() {
                Some(elem) if (self.compare)(self.arena.elem(elem), key) == Ordering::Less => {
                    node = right;
                }
                _ => break,
            }
        }
        node
    }

    /// Classic top-down descent to level 1, returning the rightmost level-1
    /// node whose element is less than `key` (the bottom head sentinel if no
    /// element is less).
    fn descend(&self, key: &T) -> NodeId {
        let mut node = self.head;
        for lvl in (1..=self.level).rev() {
            node = self.scan_level(node, key);
            if lvl > 1 {
                node = self
                    .arena
                    .node(node)
                    .down
                    .expect("levels above 1 link downward");
            }
        }
        node
    }

    /// Like [`descend`][Self::descend], but additionally records, per level,
    /// the rightmost node whose element is less than `key`; a new element is
    /// spliced after that node at that level. `update[lvl - 1]` is the record
    /// for level `lvl`.
    fn search_path(&self, key: &T) -> Vec<NodeId> {
        let mut update = vec![self.head; self.level];
        let mut node = self.head;
        for lvl in (1..=self.level).rev() {
            node = self.scan_level(node, key);
            update[lvl - 1] = node;
            if lvl > 1 {
                node = self
                    .arena
                    .node(node)
                    .down
                    .expect("levels above 1 link downward");
            }
        }
        update
    }

    /// Find the topmost instance of the element equal to `key`.
    ///
    /// The descent encounters an element first at the highest level it
    /// occupies, since the strict-less scan stops immediately to its left on
    /// every level it is present.
    fn find_chain_top(&self, key: &T) -> Option<NodeId> {
        let mut node = self.head;
        for lvl in (1..=self.level).rev() {
            node = self.scan_level(node, key);
            if let Some(right) = self.arena.node(node).right
                && let Some(elem) = self.arena.node(right).elem()
                && (self.compare)(self.arena.elem(elem), key) == Ordering::Equal
            {
                return Some(right);
            }
            if lvl > 1 {
                node = self
                    .arena
                    .node(node)
                    .down
                    .expect("levels above 1 link downward");
            }
        }
        None
    }

    /// Unlink and free every instance of one element, from its topmost level
    /// down to level 1, then drop empty levels and return the element.
    fn remove_chain(&mut self, top: NodeId) -> T {
        let mut current = Some(top);
        let mut elem = None;
        while let Some(id) = current {
            let node = self.arena.unlink_remove(id);
            elem = node.elem();
            current = node.down;
        }
        self.len -= 1;
        self.trim_levels();
        let elem = elem.expect("a removed chain carries an element");
        self.arena.remove_elem(elem)
    }

    /// Put back an element whose chain was just removed. The reinsertion is
    /// done at height 1, so the slots freed by the removal always suffice
    /// and allocation cannot fail.
    fn reattach(&mut self, value: T) {
        let update = self.search_path(&value);
        let elem = match self.arena.try_insert_elem(value) {
            Ok(elem) => elem,
            Err(_) => unreachable!("the removal freed an element slot"),
        };
        let node = self
            .arena
            .try_insert_node(NodeKind::Element(elem))
            .expect("the removal freed a node slot");
        self.arena.splice_after(update[0], node);
        self.len += 1;
    }

    /// Discard empty levels from the top until a non-empty level surfaces or
    /// only level 1 remains.
    fn trim_levels(&mut self) {
        while self.level > 1 {
            let head = self.arena.node(self.head);
            if head.right != Some(self.tail) {
                break;
            }
            let old_head = self.head;
            let old_tail = self.tail;
            self.head = head.down.expect("levels above 1 link downward");
            self.tail = self
                .arena
                .node(old_tail)
                .down
                .expect("levels above 1 link downward");
            self.arena.remove_node(old_head);
            self.arena.remove_node(old_tail);
            self.level -= 1;
        }
    }

    /// The head sentinel of level 1.
    fn bottom_head(&self) -> NodeId {
        let mut node = self.head;
        while let Some(down) = self.arena.node(node).down {
            node = down;
        }
        node
    }

    /// The level-1 node of the first element, if any.
    fn first_element(&self) -> Option<NodeId> {
        next_element(&self.arena, self.bottom_head())
    }

    /// Whether `id` refers to an element node on this set's level-1 chain.
    /// Walks the bottom level, like iterator validation in general.
    fn position_is_live(&self, id: NodeId) -> bool {
        match self.arena.try_node(id) {
            Some(node) if node.elem().is_some() => {}
            _ => return false,
        }
        let mut current = self.first_element();
        while let Some(candidate) = current {
            if candidate == id {
                return true;
            }
            current = next_element(&self.arena, candidate);
        }
        false
    }
}

// ///////////////////////////////////////////////
// Trait implementation
// ///////////////////////////////////////////////

impl<T: PartialOrd> Default for SkipSet<T> {
    fn default() -> SkipSet<T> {
        SkipSet::new()
    }
}

impl<T: Clone> Clone for SkipSet<T> {
    /// Produces an independent set with equal elements *and* an identical
    /// level structure. Every level gets fresh nodes; vertical links are
    /// re-derived by locating, for each copied higher-level node, its
    /// counterpart at the level below in the new structure.
    fn clone(&self) -> Self {
        let mut arena = NodeArena::new();

        // Sentinel pairs for every level, vertically chained bottom-up.
        let mut heads = Vec::with_capacity(self.level);
        let mut tails = Vec::with_capacity(self.level);
        for lvl in 0..self.level {
            let (head, tail) = arena
                .try_sentinel_pair()
                .expect("clone cannot exhaust node storage before its source did");
            if lvl > 0 {
                arena.node_mut(head).down = Some(heads[lvl - 1]);
                arena.node_mut(tail).down = Some(tails[lvl - 1]);
            }
            heads.push(head);
            tails.push(tail);
        }

        // Source head sentinel per level, bottom-up.
        let mut src_heads = Vec::with_capacity(self.level);
        let mut source_head = Some(self.head);
        while let Some(id) = source_head {
            src_heads.push(id);
            source_head = self.arena.node(id).down;
        }
        src_heads.reverse();

        // Level 1 carries every element.
        let mut prev = heads[0];
        let mut source = next_element(&self.arena, src_heads[0]);
        while let Some(src) = source {
            let value = self
                .arena
                .value_of(src)
                .expect("iteration visits element nodes only")
                .clone();
            let Ok(elem) = arena.try_insert_elem(value) else {
                panic!("clone cannot exhaust node storage before its source did")
            };
            let node = arena
                .try_insert_node(NodeKind::Element(elem))
                .expect("clone cannot exhaust node storage before its source did");
            arena.splice_after(prev, node);
            prev = node;
            source = next_element(&self.arena, src);
        }

        // Each higher level is a subset of the one below, in the same order,
        // so a single rightward cursor on the new level below finds every
        // counterpart in one pass.
        for lvl in 2..=self.level {
            let mut prev = heads[lvl - 1];
            let mut cursor = heads[lvl - 2];
            let mut source = next_element(&self.arena, src_heads[lvl - 1]);
            while let Some(src) = source {
                let value = self
                    .arena
                    .value_of(src)
                    .expect("iteration visits element nodes only");
                let below = loop {
                    let right = arena
                        .node(cursor)
                        .right
                        .expect("non-tail nodes link rightward");
                    let Some(elem) = arena.node(right).elem() else {
                        unreachable!("element missing from the level below")
                    };
                    match (self.compare)(arena.elem(elem), value) {
                        Ordering::Less => cursor = right,
                        Ordering::Equal => break right,
                        Ordering::Greater => unreachable!("element missing from the level below"),
                    }
                };
                cursor = below;
                let elem = arena
                    .node(below)
                    .elem()
                    .expect("located counterpart is an element");
                let node = arena
                    .try_insert_node(NodeKind::Element(elem))
                    .expect("clone cannot exhaust node storage before its source did");
                arena.node_mut(node).down = Some(below);
                arena.splice_after(prev, node);
                prev = node;
                source = next_element(&self.arena, src);
            }
        }

        SkipSet {
            arena,
            head: heads[self.level - 1],
            tail: tails[self.level - 1],
            level: self.level,
            len: self.len,
            token: NEXT_SET_TOKEN.fetch_add(1, Relaxed),
            level_generator: self.level_generator.fork(),
            compare: Arc::clone(&self.compare),
        }
    }
}

/// This implementation of `PartialEq` only checks that the *elements* are
/// equal; it does not check for equivalence of other features (such as the
/// ordering function and the node levels). Furthermore, this uses `T`'s
/// implementation of `PartialEq` and *does not* use the owning set's
/// comparison function.
impl<A, B> cmp::PartialEq<SkipSet<B>> for SkipSet<A>
where
    A: cmp::PartialEq<B>,
{
    #[inline]
    fn eq(&self, other: &SkipSet<B>) -> bool {
        self.len() == other.len() && self.iter().eq(other)
    }
}

impl<T> cmp::Eq for SkipSet<T> where T: cmp::Eq {}

impl<A, B> cmp::PartialOrd<SkipSet<B>> for SkipSet<A>
where
    A: cmp::PartialOrd<B>,
{
    #[inline]
    fn partial_cmp(&self, other: &SkipSet<B>) -> Option<Ordering> {
        self.iter().partial_cmp(other)
    }
}

impl<T> Ord for SkipSet<T>
where
    T: cmp::Ord,
{
    #[inline]
    fn cmp(&self, other: &SkipSet<T>) -> Ordering {
        self.iter().cmp(other)
    }
}

impl<T> Extend<T> for SkipSet<T> {
    #[expect(
        clippy::expect_used,
        reason = "id-space exhaustion is not recoverable mid-extend"
    )]
    #[inline]
    fn extend<I: iter::IntoIterator<Item = T>>(&mut self, iterable: I) {
        for element in iterable {
            self.insert(element).expect("node storage is exhausted");
        }
    }
}

impl<T> iter::FromIterator<T> for SkipSet<T>
where
    T: PartialOrd,
{
    #[inline]
    fn from_iter<I>(iter: I) -> SkipSet<T>
    where
        I: iter::IntoIterator<Item = T>,
    {
        let mut set = SkipSet::new();
        set.extend(iter);
        set
    }
}

impl<T> fmt::Debug for SkipSet<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, entry) in self.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{entry:?}")?;
        }
        write!(f, "]")
    }
}

impl<T> fmt::Display for SkipSet<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, entry) in self.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{entry}")?;
        }
        write!(f, "]")
    }
}

impl<T: Hash> Hash for SkipSet<T> {
    #[inline]
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        for elt in self {
            elt.hash(state);
        }
    }
}

// /////////////////////////////////
// Iterators
// /////////////////////////////////

/// Iterator by reference over a [`SkipSet`], in ascending order.
pub struct Iter<'a, T> {
    arena: &'a NodeArena<T>,
    next: Option<NodeId>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = next_element(self.arena, id);
        self.remaining -= 1;
        self.arena.value_of(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Consuming iterator over a [`SkipSet`], in ascending order.
pub struct IntoIter<T> {
    arena: NodeArena<T>,
    next: Option<NodeId>,
    remaining: usize,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let id = self.next?;
        self.next = next_element(&self.arena, id);
        self.remaining -= 1;
        let elem = self
            .arena
            .node(id)
            .elem()
            .expect("iteration visits element nodes only");
        Some(self.arena.remove_elem(elem))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> iter::IntoIterator for SkipSet<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        let next = self.first_element();
        let remaining = self.len;
        IntoIter {
            arena: self.arena,
            next,
            remaining,
        }
    }
}

impl<'a, T> iter::IntoIterator for &'a SkipSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<'a, T> iter::IntoIterator for &'a mut SkipSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

// ////////////////////////////////////////////////////////////////////////////
// Tests
// ////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::{
        cmp::Ordering,
        hash::{DefaultHasher, Hash, Hasher},
    };

    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use rand::{SeedableRng, rngs::SmallRng, seq::SliceRandom};
    use rstest::rstest;

    use super::{SkipSet, SkipSetError};
    use crate::level_generator::LevelGenerator;

    /// Replays a fixed cycle of heights, producing a reproducible level
    /// structure.
    struct Scripted {
        total: usize,
        heights: Vec<usize>,
        next: usize,
    }

    impl Scripted {
        fn new(total: usize, heights: &[usize]) -> Self {
            Scripted {
                total,
                heights: heights.to_vec(),
                next: 0,
            }
        }
    }

    impl LevelGenerator for Scripted {
        fn total(&self) -> usize {
            self.total
        }

        fn height(&mut self) -> usize {
            let h = self.heights[self.next % self.heights.len()];
            self.next += 1;
            h
        }

        fn fork(&self) -> Box<dyn LevelGenerator + Send> {
            Box::new(Scripted {
                total: self.total,
                heights: self.heights.clone(),
                next: 0,
            })
        }
    }

    #[test]
    fn basic_small() -> Result<()> {
        let mut set = SkipSet::new();
        assert!(set.is_empty());
        assert!(set.begin().is_end());

        for value in [10, 20, 30, 15] {
            let (pos, inserted) = set.insert(value)?;
            assert!(inserted);
            assert_eq!(set.get(pos), Some(&value));
        }
        assert_eq!(set.len(), 4);
        assert!(set.validate());
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), [10, 15, 20, 30]);
        Ok(())
    }

    #[test]
    fn duplicate_insert_is_rejected() -> Result<()> {
        let mut set = SkipSet::new();
        let (first, inserted) = set.insert(5)?;
        assert!(inserted);

        let (again, inserted) = set.insert(5)?;
        assert!(!inserted);
        assert_eq!(again, first);
        assert_eq!(set.len(), 1);
        assert!(set.validate());
        Ok(())
    }

    #[test]
    fn remove_present_and_absent() -> Result<()> {
        let mut set = SkipSet::new();
        set.extend([10, 20, 30, 15]);

        assert_eq!(set.remove(&20), Some(20));
        assert!(!set.contains(&20));
        assert_eq!(set.remove(&20), None);
        assert_eq!(set.len(), 3);
        assert!(set.validate());
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), [10, 15, 30]);

        // Removal followed by reinsertion restores equality.
        set.insert(20)?;
        let expected: SkipSet<_> = [10, 15, 20, 30].into_iter().collect();
        assert_eq!(set, expected);
        Ok(())
    }

    #[test]
    fn shuffled_insertions_stay_sorted() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let mut values: Vec<i32> = (0..100).collect();
        values.shuffle(&mut rng);

        let mut set = SkipSet::new();
        for &value in &values {
            set.extend([value]);
            assert!(set.validate());
        }
        assert_eq!(set.len(), 100);
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), (0..100).collect::<Vec<_>>());
    }

    #[rstest]
    #[case(35, Some(36))]
    #[case(36, Some(36))]
    #[case(0, Some(0))]
    #[case(-1, Some(0))]
    #[case(98, Some(98))]
    #[case(99, None)]
    #[case(100, None)]
    fn lower_bound_on_evens(#[case] key: i32, #[case] expected: Option<i32>) {
        let set: SkipSet<i32> = (0..100).step_by(2).collect();
        assert_eq!(set.get(set.lower_bound(&key)).copied(), expected);
    }

    #[rstest]
    #[case(35, Some(36))]
    #[case(36, Some(38))]
    #[case(-1, Some(0))]
    #[case(96, Some(98))]
    #[case(98, None)]
    #[case(100, None)]
    fn upper_bound_on_evens(#[case] key: i32, #[case] expected: Option<i32>) {
        let set: SkipSet<i32> = (0..100).step_by(2).collect();
        assert_eq!(set.get(set.upper_bound(&key)).copied(), expected);
    }

    #[test]
    fn strings() {
        let mut set = SkipSet::new();
        set.extend(["banana".to_owned(), "apple".to_owned(), "cherry".to_owned()]);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            ["apple", "banana", "cherry"]
        );
        assert!(set.contains(&"banana".to_owned()));
        assert_eq!(set.remove(&"banana".to_owned()), Some("banana".to_owned()));
        assert!(!set.contains(&"banana".to_owned()));
        assert!(set.validate());
    }

    #[test]
    fn large_dataset() {
        let mut set = SkipSet::with_capacity(10_000);
        set.extend(0..10_000);
        assert_eq!(set.len(), 10_000);

        for value in (0..10_000).step_by(2) {
            assert_eq!(set.remove(&value), Some(value));
        }
        assert_eq!(set.len(), 5_000);
        assert!(set.validate());
        assert!(set.iter().all(|value| value % 2 == 1));
    }

    #[test]
    fn clear_collapses_the_ladder() {
        let mut set = SkipSet::new();
        set.extend(0..100);
        set.clear();
        assert!(set.is_empty());
        assert!(set.begin().is_end());
        assert!(set.validate());
        set.extend([3, 1, 2]);
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), [1, 2, 3]);
    }

    #[test]
    fn clone_is_deep_and_structure_preserving() {
        let mut set = SkipSet::with_level_generator(Scripted::new(16, &[1, 3, 2, 1]));
        set.extend([10, 20, 30, 15]);

        let mut copy = set.clone();
        assert_eq!(copy, set);
        assert!(copy.validate());
        assert_eq!(copy.dump_levels(), set.dump_levels());

        // Mutating the copy must not disturb the source.
        copy.remove(&20);
        assert!(set.contains(&20));
        assert!(!copy.contains(&20));
        assert!(set.validate());
        assert!(copy.validate());
    }

    #[test]
    fn take_leaves_an_empty_set() {
        let mut set: SkipSet<i32> = (0..10).collect();
        let moved = std::mem::take(&mut set);
        assert_eq!(moved.len(), 10);
        assert!(set.is_empty());
        assert!(set.validate());
    }

    #[test]
    fn merge_moves_only_missing_elements() -> Result<()> {
        let mut a: SkipSet<_> = [1, 2, 3].into_iter().collect();
        let mut b: SkipSet<_> = [3, 4, 5].into_iter().collect();

        a.merge(&mut b)?;
        assert_eq!(a.iter().copied().collect::<Vec<_>>(), [1, 2, 3, 4, 5]);
        assert_eq!(b.iter().copied().collect::<Vec<_>>(), [3]);
        assert!(a.validate());
        assert!(b.validate());
        Ok(())
    }

    #[test]
    fn reattach_restores_a_removed_element() {
        let mut set: SkipSet<i32> = (0..5).collect();
        let value = set.remove(&3).expect("element is present");
        set.reattach(value);
        assert!(set.contains(&3));
        assert_eq!(set.len(), 5);
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), [0, 1, 2, 3, 4]);
        assert!(set.validate());
    }

    #[test]
    fn swap_exchanges_contents() {
        let mut a: SkipSet<i32> = (0..5).collect();
        let mut b: SkipSet<i32> = (10..12).collect();
        a.swap(&mut b);
        assert_eq!(a.iter().copied().collect::<Vec<_>>(), [10, 11]);
        assert_eq!(b.len(), 5);
    }

    #[test]
    fn equality_ignores_level_structure() {
        let mut tall: SkipSet<i32> =
            SkipSet::with_level_generator(Scripted::new(16, &[4, 4, 4]));
        let mut flat: SkipSet<i32> = SkipSet::with_level_generator(Scripted::new(16, &[1]));
        tall.extend([1, 2, 3]);
        flat.extend([1, 2, 3]);
        assert_eq!(tall, flat);

        flat.remove(&2);
        assert_ne!(tall, flat);
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a: SkipSet<i32> = [1, 2, 3].into_iter().collect();
        let b: SkipSet<i32> = [1, 2, 4].into_iter().collect();
        let c: SkipSet<i32> = [1, 2].into_iter().collect();
        assert!(a < b);
        assert!(c < a);
        assert_eq!(a.cmp(&a.clone()), Ordering::Equal);
    }

    #[test]
    fn remove_at_returns_value_and_successor() -> Result<()> {
        let mut set: SkipSet<i32> = [10, 20, 30].into_iter().collect();
        let pos = set.find(&20);
        let (value, next) = set.remove_at(pos)?;
        assert_eq!(value, 20);
        assert_eq!(set.get(next), Some(&30));
        assert!(set.validate());

        let pos = set.find(&30);
        let (value, next) = set.remove_at(pos)?;
        assert_eq!(value, 30);
        assert!(next.is_end());
        Ok(())
    }

    #[test]
    fn remove_at_rejects_end_and_stale_positions() {
        let mut set: SkipSet<i32> = [10, 20, 30].into_iter().collect();
        assert_eq!(set.remove_at(set.end()), Err(SkipSetError::EndPosition));

        let stale = set.find(&20);
        set.remove(&20);
        assert_eq!(set.remove_at(stale), Err(SkipSetError::InvalidPosition));
        assert_eq!(set.len(), 2);

        // A position from another set whose slot is vacant here.
        let other: SkipSet<i32> = (0..10).collect();
        let mut empty: SkipSet<i32> = SkipSet::new();
        assert_eq!(
            empty.remove_at(other.find(&7)),
            Err(SkipSetError::InvalidPosition)
        );
    }

    #[test]
    fn positions_from_another_set_are_foreign() {
        // Identical insertion order gives both ladders identical slot ids,
        // so the raw index inside b's position collides with a live element
        // of a.
        let mut a: SkipSet<i32> = SkipSet::with_level_generator(Scripted::new(16, &[1]));
        let mut b: SkipSet<i32> = SkipSet::with_level_generator(Scripted::new(16, &[1]));
        a.extend([10, 20, 30]);
        b.extend([100, 200, 300]);

        let foreign = b.find(&200);
        assert_eq!(a.remove_at(foreign), Err(SkipSetError::InvalidPosition));
        assert_eq!(a.iter().copied().collect::<Vec<_>>(), [10, 20, 30]);

        assert_eq!(a.get(foreign), None);
        assert!(a.advance(foreign).is_end());
        assert_eq!(
            a.remove_range(b.begin(), b.end()),
            Err(SkipSetError::InvalidPosition)
        );
        assert_eq!(a.len(), 3);

        // The position stays good for the set that issued it.
        let (value, _) = b.remove_at(foreign).unwrap();
        assert_eq!(value, 200);
    }

    #[test]
    fn remove_range_middle() -> Result<()> {
        let mut set: SkipSet<i32> = (0..10).collect();
        let first = set.find(&3);
        let last = set.find(&7);
        let next = set.remove_range(first, last)?;
        assert_eq!(set.get(next), Some(&7));
        assert_eq!(
            set.iter().copied().collect::<Vec<_>>(),
            [0, 1, 2, 7, 8, 9]
        );
        assert!(set.validate());
        Ok(())
    }

    #[test]
    fn remove_range_full_and_inverted() -> Result<()> {
        let mut set: SkipSet<i32> = (0..10).collect();
        let first = set.find(&7);
        let last = set.find(&3);
        assert_eq!(
            set.remove_range(first, last),
            Err(SkipSetError::InvalidRange)
        );
        assert_eq!(set.len(), 10);

        let next = set.remove_range(set.begin(), set.end())?;
        assert!(next.is_end());
        assert!(set.is_empty());
        assert!(set.validate());
        Ok(())
    }

    #[test]
    fn with_comp_reverses_the_order() {
        let mut set = SkipSet::with_comp(|a: &i64, b: &i64| b.cmp(a));
        set.extend([1, 4, 2, 5, 3]);
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), [5, 4, 3, 2, 1]);
        assert_eq!(set.front(), Some(&5));
        assert_eq!(set.back(), Some(&1));
        assert!(set.validate());
    }

    #[test]
    fn front_and_back() {
        let mut set = SkipSet::new();
        assert_eq!(set.front(), None);
        assert_eq!(set.back(), None);

        set.extend([4, 2, 9, 7]);
        assert_eq!(set.front(), Some(&2));
        assert_eq!(set.back(), Some(&9));

        set.remove(&9);
        assert_eq!(set.back(), Some(&7));
    }

    #[test]
    fn position_walk_matches_iteration() {
        let set: SkipSet<i32> = (0..50).step_by(3).collect();
        let mut walked = Vec::new();
        let mut pos = set.begin();
        while let Some(&value) = set.get(pos) {
            walked.push(value);
            pos = set.advance(pos);
        }
        assert!(pos.is_end());
        assert!(set.advance(pos).is_end());
        assert_eq!(walked, set.iter().copied().collect::<Vec<_>>());
    }

    #[test]
    fn into_iter_is_sorted() {
        let set: SkipSet<i32> = [5, 1, 4, 2, 3].into_iter().collect();
        let iter = set.into_iter();
        assert_eq!(iter.size_hint(), (5, Some(5)));
        assert_eq!(iter.collect::<Vec<_>>(), [1, 2, 3, 4, 5]);
    }

    #[test]
    fn formatting() {
        let set: SkipSet<i32> = [3, 6, 9].into_iter().collect();
        assert_eq!(format!("{set:?}"), "[3, 6, 9]");
        assert_eq!(format!("{set}"), "[3, 6, 9]");
        assert_eq!(format!("{:?}", SkipSet::<i32>::new()), "[]");
    }

    #[test]
    fn hash_agrees_for_equal_sets() {
        let hash = |set: &SkipSet<i32>| {
            let mut hasher = DefaultHasher::new();
            set.hash(&mut hasher);
            hasher.finish()
        };
        let a: SkipSet<i32> = [3, 1, 2].into_iter().collect();
        let b: SkipSet<i32> = [2, 3, 1].into_iter().collect();
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn scripted_level_structure() {
        let mut set = SkipSet::with_level_generator(Scripted::new(16, &[1, 3, 2, 1]));
        set.extend([10, 20, 30, 15]);
        assert!(set.validate());
        insta::assert_snapshot!(set.dump_levels(), @r"
        level 3: 20
        level 2: 20 30
        level 1: 10 15 20 30
        ");

        // Dropping the only level-3 element trims the now-empty level.
        assert_eq!(set.remove(&20), Some(20));
        assert!(set.validate());
        insta::assert_snapshot!(set.dump_levels(), @r"
        level 2: 30
        level 1: 10 15 30
        ");
    }
}
