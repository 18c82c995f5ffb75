/// Indexed binary max-heap: a priority queue over a fixed universe of `n`
/// element ids (`0..n`) whose keys can be changed in place, restoring heap
/// order in `O(log n)` via the id's tracked heap position, so DSATUR's
/// saturation-degree updates don't need a full rebuild on every pop.
pub struct IndexedPriorityQueue<K: Ord + Copy> {
    heap: Vec<usize>,
    pos: Vec<Option<usize>>,
    keys: Vec<K>,
}

impl<K: Ord + Copy> IndexedPriorityQueue<K> {
    /// Build a queue containing every id in `0..keys.len()`, each with its
    /// given initial key.
    pub fn new(keys: Vec<K>) -> Self {
        let n = keys.len();
        let mut q = Self {
            heap: (0..n).collect(),
            pos: (0..n).map(Some).collect(),
            keys,
        };
        // Heapify bottom-up.
        for i in (0..n / 2).rev() {
            q.sift_down(i);
        }
        q
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    fn swap_heap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.pos[self.heap[i]] = Some(i);
        self.pos[self.heap[j]] = Some(j);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.keys[self.heap[parent]] < self.keys[self.heap[i]] {
                self.swap_heap(parent, i);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let n = self.heap.len();
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut largest = i;
            if left < n && self.keys[self.heap[left]] > self.keys[self.heap[largest]] {
                largest = left;
            }
            if right < n && self.keys[self.heap[right]] > self.keys[self.heap[largest]] {
                largest = right;
            }
            if largest == i {
                break;
            }
            self.swap_heap(i, largest);
            i = largest;
        }
    }

    /// Pop the id with the largest key, or `None` if empty.
    pub fn pop_max(&mut self) -> Option<usize> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.swap_heap(0, last);
        let id = self.heap.pop().unwrap();
        self.pos[id] = None;
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some(id)
    }

    /// Update `id`'s key in place and restore heap order, if `id` is still
    /// present in the queue. A no-op for ids already popped.
    pub fn update_key(&mut self, id: usize, new_key: K) {
        let Some(i) = self.pos[id] else { return };
        let old_key = self.keys[id];
        self.keys[id] = new_key;
        if new_key > old_key {
            self.sift_up(i);
        } else if new_key < old_key {
            self.sift_down(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_descending_key_order() {
        let mut q = IndexedPriorityQueue::new(vec![3, 1, 4, 1, 5, 9, 2, 6]);
        let mut popped = Vec::new();
        while let Some(id) = q.pop_max() {
            popped.push(id);
        }
        assert_eq!(popped.len(), 8);
        // first popped id must hold the largest key (index 5, key 9)
        assert_eq!(popped[0], 5);
    }

    #[test]
    fn test_update_key_reorders() {
        let mut q = IndexedPriorityQueue::new(vec![1, 2, 3]);
        q.update_key(0, 10);
        assert_eq!(q.pop_max(), Some(0));
    }

    #[test]
    fn test_update_after_pop_is_noop() {
        let mut q = IndexedPriorityQueue::new(vec![1, 2]);
        let popped = q.pop_max().unwrap();
        q.update_key(popped, 100);
        assert_eq!(q.pop_max(), Some(if popped == 0 { 1 } else { 0 }));
        assert!(q.pop_max().is_none());
    }
}
