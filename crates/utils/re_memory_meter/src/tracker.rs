use std::sync::Arc;

use crate::NodeId;

/// Records which nodes one traversal has already reached.
///
/// Trackers only ever see [`NodeId`]s, so deduplication is by identity,
/// never by value equality.
pub trait Tracker {
    /// Returns `true` if `id` was not tracked before.
    fn insert(&mut self, id: NodeId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Produces a fresh, empty [`Tracker`] for each traversal.
pub type TrackerFactory = Arc<dyn Fn() -> Box<dyn Tracker> + Send + Sync>;

/// The default [`Tracker`]: a hash set of node identities.
#[derive(Default)]
pub struct IdentitySet {
    seen: ahash::HashSet<NodeId>,
}

impl IdentitySet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: ahash::HashSet::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// A [`TrackerFactory`] producing empty [`IdentitySet`]s.
    pub fn factory() -> TrackerFactory {
        Arc::new(|| Box::new(Self::default()) as Box<dyn Tracker>)
    }

    /// A [`TrackerFactory`] producing [`IdentitySet`]s with room for `capacity` nodes,
    /// for when you know roughly how large the graphs are.
    pub fn factory_with_capacity(capacity: usize) -> TrackerFactory {
        Arc::new(move || Box::new(Self::with_capacity(capacity)) as Box<dyn Tracker>)
    }
}

impl Tracker for IdentitySet {
    #[inline]
    fn insert(&mut self, id: NodeId) -> bool {
        self.seen.insert(id)
    }

    #[inline]
    fn len(&self) -> usize {
        self.seen.len()
    }
}

#[test]
fn test_identity_set() {
    let a = String::from("same");
    let b = String::from("same");

    let mut set = (IdentitySet::factory())();
    assert!(set.is_empty());
    assert!(set.insert(NodeId::of(&a)));
    assert!(set.insert(NodeId::of(&b)));
    assert!(!set.insert(NodeId::of(&a)));
    assert_eq!(set.len(), 2);
}

#[test]
fn test_identity_set_with_capacity() {
    let values = [1_u32, 2, 3];

    let mut set = (IdentitySet::factory_with_capacity(8))();
    for value in &values {
        assert!(set.insert(NodeId::of(value)));
    }
    assert!(!set.insert(NodeId::of(&values[1])));
    assert_eq!(set.len(), 3);

    assert!(IdentitySet::with_capacity(8).is_empty());
}
