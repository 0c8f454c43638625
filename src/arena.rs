//! Generation-Checked Slot Arenas
//!
//! Bodies, fixtures, joints and contacts each live in their own arena and are
//! addressed by small copyable handles. A slot is recycled through a free
//! list (like the node pool of the AABB tree); every reuse bumps the slot's
//! generation, so a handle to a destroyed entity can never alias a newer one.
//!
//! Iteration order is slot order, which depends only on the sequence of
//! insertions and removals. That keeps stepping deterministic.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Raw slot address shared by all handle kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Index {
    /// Slot position
    pub slot: u32,
    /// Generation of the slot when the handle was issued
    pub generation: u32,
}

/// Typed handle over an arena [`Index`].
pub trait Handle: Copy {
    /// Wrap a raw index.
    fn from_index(index: Index) -> Self;
    /// The raw index.
    fn index(self) -> Index;
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name(pub Index);

        impl Handle for $name {
            #[inline]
            fn from_index(index: Index) -> Self {
                Self(index)
            }

            #[inline]
            fn index(self) -> Index {
                self.0
            }
        }
    };
}

define_handle!(
    /// Handle to a [`crate::Body`].
    BodyId
);
define_handle!(
    /// Handle to a [`crate::Fixture`].
    FixtureId
);
define_handle!(
    /// Handle to a [`crate::Joint`].
    JointId
);
define_handle!(
    /// Handle to a [`crate::Contact`].
    ContactId
);

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena keyed by typed handles.
#[derive(Clone, Debug)]
pub struct Arena<H: Handle, T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: usize,
    _marker: core::marker::PhantomData<H>,
}

impl<H: Handle, T> Arena<H, T> {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            _marker: core::marker::PhantomData,
        }
    }

    /// Store a value and return its handle.
    pub fn insert(&mut self, value: T) -> H {
        self.len += 1;
        if let Some(slot) = self.free_list.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.generation = entry.generation.wrapping_add(1);
            entry.value = Some(value);
            return H::from_index(Index {
                slot,
                generation: entry.generation,
            });
        }
        let slot = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        H::from_index(Index {
            slot,
            generation: 0,
        })
    }

    /// Handle the next `insert` will return.
    ///
    /// Lets a value that stores its own handle be built before insertion.
    #[must_use]
    pub fn next_handle(&self) -> H {
        match self.free_list.last() {
            Some(&slot) => H::from_index(Index {
                slot,
                generation: self.slots[slot as usize].generation.wrapping_add(1),
            }),
            None => H::from_index(Index {
                slot: self.slots.len() as u32,
                generation: 0,
            }),
        }
    }

    /// Remove a value. Stale handles return `None`.
    pub fn remove(&mut self, handle: H) -> Option<T> {
        let index = handle.index();
        let entry = self.slots.get_mut(index.slot as usize)?;
        if entry.generation != index.generation {
            return None;
        }
        let value = entry.value.take()?;
        self.free_list.push(index.slot);
        self.len -= 1;
        Some(value)
    }

    /// Whether the handle is live.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: H) -> bool {
        self.get(handle).is_some()
    }

    /// Shared access.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: H) -> Option<&T> {
        let index = handle.index();
        let entry = self.slots.get(index.slot as usize)?;
        if entry.generation != index.generation {
            return None;
        }
        entry.value.as_ref()
    }

    /// Exclusive access.
    #[inline]
    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        let index = handle.index();
        let entry = self.slots.get_mut(index.slot as usize)?;
        if entry.generation != index.generation {
            return None;
        }
        entry.value.as_mut()
    }

    /// Exclusive access to two distinct entries at once.
    ///
    /// Returns `None` if either handle is stale or both are the same.
    pub fn get2_mut(&mut self, a: H, b: H) -> Option<(&mut T, &mut T)> {
        let (ia, ib) = (a.index(), b.index());
        if ia.slot == ib.slot {
            return None;
        }
        let (lo, hi, swapped) = if ia.slot < ib.slot {
            (ia, ib, false)
        } else {
            (ib, ia, true)
        };
        if hi.slot as usize >= self.slots.len() {
            return None;
        }
        let (left, right) = self.slots.split_at_mut(hi.slot as usize);
        let first = &mut left[lo.slot as usize];
        let second = &mut right[0];
        if first.generation != lo.generation || second.generation != hi.generation {
            return None;
        }
        let first = first.value.as_mut()?;
        let second = second.value.as_mut()?;
        if swapped {
            Some((second, first))
        } else {
            Some((first, second))
        }
    }

    /// Number of live values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// No live values.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        self.slots.iter().enumerate().filter_map(|(slot, entry)| {
            entry.value.as_ref().map(|value| {
                (
                    H::from_index(Index {
                        slot: slot as u32,
                        generation: entry.generation,
                    }),
                    value,
                )
            })
        })
    }

    /// Iterate live values mutably in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (H, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, entry)| {
                let generation = entry.generation;
                entry.value.as_mut().map(|value| {
                    (
                        H::from_index(Index {
                            slot: slot as u32,
                            generation,
                        }),
                        value,
                    )
                })
            })
    }

    /// Live handles in slot order.
    #[must_use]
    pub fn handles(&self) -> Vec<H> {
        self.iter().map(|(h, _)| h).collect()
    }
}

impl<H: Handle, T> Default for Arena<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Handle, T> core::ops::Index<H> for Arena<H, T> {
    type Output = T;

    /// Panics on a stale handle; internal code only indexes handles it
    /// stored itself and keeps in sync with destruction.
    fn index(&self, handle: H) -> &T {
        match self.get(handle) {
            Some(value) => value,
            None => panic!("stale arena handle {:?}", handle.index()),
        }
    }
}

impl<H: Handle, T> core::ops::IndexMut<H> for Arena<H, T> {
    fn index_mut(&mut self, handle: H) -> &mut T {
        let index = handle.index();
        match self.get_mut(handle) {
            Some(value) => value,
            None => panic!("stale arena handle {:?}", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut arena: Arena<BodyId, &str> = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.remove(a), Some("a"));
        assert!(!arena.contains(a));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut arena: Arena<FixtureId, u32> = Arena::new();
        let a = arena.insert(1);
        arena.remove(a);
        let predicted = arena.next_handle();
        let b = arena.insert(2);
        assert_eq!(predicted, b);
        assert_eq!(a.0.slot, b.0.slot, "slot should be recycled");
        assert!(arena.get(a).is_none(), "old handle must be stale");
        assert_eq!(arena.get(b), Some(&2));
        assert!(arena.remove(a).is_none());
    }

    #[test]
    fn test_get2_mut() {
        let mut arena: Arena<JointId, i32> = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);
        {
            let (x, y) = arena.get2_mut(b, a).unwrap();
            assert_eq!((*x, *y), (2, 1));
            *x += 10;
            *y += 20;
        }
        assert_eq!(arena[a], 21);
        assert_eq!(arena[b], 12);
        assert!(arena.get2_mut(a, a).is_none());
    }

    #[test]
    fn test_iteration_in_slot_order() {
        let mut arena: Arena<ContactId, u8> = Arena::new();
        let handles: Vec<_> = (0..5).map(|i| arena.insert(i)).collect();
        arena.remove(handles[1]);
        arena.remove(handles[3]);
        let values: Vec<u8> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0, 2, 4]);
    }
}
