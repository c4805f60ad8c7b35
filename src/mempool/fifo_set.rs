use crate::{Error, Result};

use parking_lot::Mutex;

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

type Indexer<K, T> = Box<dyn Fn(&T) -> K + Send + Sync>;
type OverflowFn<T> = Box<dyn Fn(&VecDeque<T>, usize) -> bool + Send + Sync>;
type Hook<T> = Box<dyn Fn(&T) + Send + Sync>;
type CollisionFn<T> = Box<dyn Fn(&T) -> Result<()> + Send + Sync>;

struct Inner<K, T> {
    set: HashSet<K>,
    queue: VecDeque<T>,
}

/// A bounded, thread-safe set which remembers insertion order.
///
/// Items are indexed by a key `K` derived from each item `T` (by default the item itself).
/// Pushing a key which is already present is a collision and leaves the set untouched. When a
/// push makes the set overflow, the oldest items are evicted first.
pub struct GenericFifoSet<K, T> {
    inner: Mutex<Inner<K, T>>,
    capacity: usize,
    indexer: Indexer<K, T>,
    is_overflowing: OverflowFn<T>,
    on_add: Option<Hook<T>>,
    on_remove: Option<Hook<T>>,
    on_collision: CollisionFn<T>,
}

/// The set used to remember RainTree nonces.
pub type NonceDeduper = GenericFifoSet<u64, u64>;

impl<T> GenericFifoSet<T, T>
where
    T: Eq + Hash + Clone + 'static,
{
    /// A set where every item is its own index.
    pub fn new(capacity: usize) -> Self {
        GenericFifoSet::with_indexer(capacity, |item: &T| item.clone())
    }
}

impl<K, T> GenericFifoSet<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: Clone + 'static,
{
    pub fn with_indexer<F>(capacity: usize, indexer: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        GenericFifoSet {
            inner: Mutex::new(Inner {
                set: HashSet::with_capacity(capacity),
                queue: VecDeque::with_capacity(capacity),
            }),
            capacity,
            indexer: Box::new(indexer),
            is_overflowing: Box::new(|queue: &VecDeque<T>, capacity| queue.len() > capacity),
            on_add: None,
            on_remove: None,
            on_collision: Box::new(|_: &T| Err(Error::SetCollision)),
        }
    }

    /// Replaces the overflow predicate, which receives the queue and the configured capacity.
    pub fn with_overflow<F>(mut self, f: F) -> Self
    where
        F: Fn(&VecDeque<T>, usize) -> bool + Send + Sync + 'static,
    {
        self.is_overflowing = Box::new(f);
        self
    }

    pub fn with_on_add<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_add = Some(Box::new(f));
        self
    }

    pub fn with_on_remove<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_remove = Some(Box::new(f));
        self
    }

    /// Replaces the collision handler. The default reports [Error::SetCollision].
    pub fn with_on_collision<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        self.on_collision = Box::new(f);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Adds an item, evicting the oldest items on overflow.
    pub fn push(&self, item: T) -> Result<()> {
        let mut inner = self.inner.lock();

        let index = (self.indexer)(&item);
        if inner.set.contains(&index) {
            return (self.on_collision)(&item);
        }

        let _ = inner.set.insert(index);
        inner.queue.push_back(item);
        if let Some(on_add) = &self.on_add {
            if let Some(added) = inner.queue.back() {
                on_add(added);
            }
        }

        while (self.is_overflowing)(&inner.queue, self.capacity) {
            match inner.queue.pop_front() {
                Some(evicted) => {
                    let _ = inner.set.remove(&(self.indexer)(&evicted));
                    if let Some(on_remove) = &self.on_remove {
                        on_remove(&evicted);
                    }
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Removes and returns the oldest item.
    pub fn pop(&self) -> Result<T> {
        let mut inner = self.inner.lock();
        let front = inner.queue.pop_front().ok_or(Error::EmptySet)?;
        let _ = inner.set.remove(&(self.indexer)(&front));
        if let Some(on_remove) = &self.on_remove {
            on_remove(&front);
        }
        Ok(front)
    }

    pub fn remove(&self, item: &T) {
        let mut inner = self.inner.lock();
        let index = (self.indexer)(item);
        if inner.set.remove(&index) {
            let position = inner.queue.iter().position(|queued| (self.indexer)(queued) == index);
            if let Some(removed) = position.and_then(|i| inner.queue.remove(i)) {
                if let Some(on_remove) = &self.on_remove {
                    on_remove(&removed);
                }
            }
        }
    }

    /// All items, oldest first.
    pub fn get_all(&self) -> Vec<T> {
        self.inner.lock().queue.iter().cloned().collect()
    }

    pub fn get(&self, index: &K) -> Option<T> {
        let inner = self.inner.lock();
        inner.queue.iter().find(|queued| (self.indexer)(queued) == *index).cloned()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.inner.lock().set.contains(&(self.indexer)(item))
    }

    pub fn contains_index(&self, index: &K) -> bool {
        self.inner.lock().set.contains(index)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.set.clear();
        inner.queue.clear();
    }
}
