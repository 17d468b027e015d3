//! # Used Set
//!
//! Insertion-ordered set of allocated slot indices, stored as an intrusive
//! doubly-linked list over a fixed link table. Insert and remove are O(1)
//! and never allocate after construction.
//!
//! Every structural change bumps `id`, which is how open cursors notice
//! that the set moved under them.

const NIL: u32 = u32::MAX;

#[derive(Clone, Copy, Debug)]
struct Link {
    prev: u32,
    next: u32,
}

impl Link {
    const DETACHED: Self = Self { prev: NIL, next: NIL };
}

/// Insertion-ordered set of slot indices.
#[derive(Debug)]
pub(crate) struct UsedList {
    links: Box<[Link]>,
    linked: Box<[bool]>,
    head: u32,
    tail: u32,
    len: usize,
    id: u64,
}

impl UsedList {
    /// Creates an empty set able to hold indices `0..capacity`.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            links: vec![Link::DETACHED; capacity].into_boxed_slice(),
            linked: vec![false; capacity].into_boxed_slice(),
            head: NIL,
            tail: NIL,
            len: 0,
            id: 1,
        }
    }

    /// Number of indices in the set.
    #[inline]
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Structural version of the set.
    #[inline]
    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    /// Returns true if `index` is in the set.
    #[inline]
    pub(crate) fn contains(&self, index: u32) -> bool {
        self.linked.get(index as usize).copied().unwrap_or(false)
    }

    /// Appends `index`. Returns false if it was already present.
    pub(crate) fn push_back(&mut self, index: u32) -> bool {
        let i = index as usize;
        if i >= self.links.len() || self.linked[i] {
            return false;
        }

        self.links[i] = Link {
            prev: self.tail,
            next: NIL,
        };
        if self.tail == NIL {
            self.head = index;
        } else {
            self.links[self.tail as usize].next = index;
        }
        self.tail = index;
        self.linked[i] = true;
        self.len += 1;
        self.id += 1;
        true
    }

    /// Unlinks `index`. Returns false if it was not present.
    pub(crate) fn remove(&mut self, index: u32) -> bool {
        if !self.contains(index) {
            return false;
        }
        let i = index as usize;
        let Link { prev, next } = self.links[i];

        if prev == NIL {
            self.head = next;
        } else {
            self.links[prev as usize].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.links[next as usize].prev = prev;
        }

        self.links[i] = Link::DETACHED;
        self.linked[i] = false;
        self.len -= 1;
        self.id += 1;
        true
    }

    /// First index in insertion order.
    #[inline]
    pub(crate) fn first(&self) -> Option<u32> {
        (self.head != NIL).then_some(self.head)
    }

    /// Index following `index`, if any.
    #[inline]
    pub(crate) fn next_of(&self, index: u32) -> Option<u32> {
        let next = self.links.get(index as usize)?.next;
        (next != NIL).then_some(next)
    }

    /// Iterates the set in insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        std::iter::successors(self.first(), |&index| self.next_of(index))
    }

    /// Drops every entry.
    pub(crate) fn clear(&mut self) {
        self.links.fill(Link::DETACHED);
        self.linked.fill(false);
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
        self.id += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order() {
        let mut list = UsedList::new(8);
        assert!(list.push_back(5));
        assert!(list.push_back(1));
        assert!(list.push_back(7));

        assert_eq!(list.iter().collect::<Vec<_>>(), vec![5, 1, 7]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_remove_middle_head_tail() {
        let mut list = UsedList::new(8);
        for i in [0, 1, 2, 3] {
            list.push_back(i);
        }

        assert!(list.remove(1));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![0, 2, 3]);
        assert!(list.remove(0));
        assert!(list.remove(3));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![2]);
        assert!(!list.remove(3));

        assert!(list.push_back(3));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_id_bumps_on_structural_change() {
        let mut list = UsedList::new(4);
        let start = list.id();

        list.push_back(2);
        assert!(list.id() > start);

        let after_push = list.id();
        assert!(!list.push_back(2));
        assert_eq!(list.id(), after_push);

        list.remove(2);
        assert!(list.id() > after_push);
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let mut list = UsedList::new(2);
        assert!(!list.push_back(2));
        assert!(!list.contains(9));
    }
}
