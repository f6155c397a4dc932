/// PartitionSet maintains a total assignment of elements to sets, with O(1) move/find.
#[derive(Debug, Clone)]
pub(crate) struct PartitionSet {
    sets: Vec<Vec<usize>>,  // sets[s] = elements currently in set s
    index: Vec<usize>,      // index[e] = s when e is in sets[s]
    position: Vec<usize>,   // position[e] = i when sets[s][i] is e
}

impl PartitionSet {
    /// Build a partition of `assignments.len()` elements into `num_sets` sets.
    /// Elements are listed within each set in increasing order.
    pub(crate) fn from_assignments(num_sets: usize, assignments: &[usize]) -> Self {
        assert!(num_sets > 0, "must have at least one set");
        let capacity = assignments.len() / num_sets + 1;
        let mut sets = (0..num_sets)
            .map(|_| Vec::with_capacity(capacity))
            .collect::<Vec<_>>();

        let mut position = Vec::with_capacity(assignments.len());
        for (elem, &set) in assignments.iter().enumerate() {
            assert!(set < num_sets, "set out of range");
            position.push(sets[set].len());
            sets[set].push(elem);
        }

        Self { sets, index: assignments.to_vec(), position }
    }

    /// Number of sets.
    #[inline] pub(crate) fn num_sets(&self) -> usize { self.sets.len() }

    /// Universe size (number of elements addressable by index).
    #[cfg(test)]
    #[inline] pub(crate) fn num_elems(&self) -> usize { self.index.len() }

    /// Return the set that `elem` is currently in.
    #[cfg(test)]
    #[inline]
    pub(crate) fn find(&self, elem: usize) -> usize {
        debug_assert!(elem < self.index.len(), "element out of range");
        self.index[elem]
    }

    /// Returns a reference to the elements currently in `set`.
    #[inline]
    pub(crate) fn get(&self, set: usize) -> &[usize] {
        debug_assert!(set < self.sets.len(), "set out of range");
        &self.sets[set]
    }

    /// Iterator over each set as a slice.
    #[inline]
    pub(crate) fn iter_sets(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.sets.iter().map(|v| v.as_slice())
    }

    /// Move `elem` to `set`. Panics in debug if out of range.
    pub(crate) fn move_to(&mut self, elem: usize, set: usize) {
        debug_assert!(elem < self.index.len(), "element out of range");
        debug_assert!(set < self.sets.len(), "set out of range");

        let (prev, pos) = (self.index[elem], self.position[elem]);
        if prev == set { return }

        // Remove from previous set by swapping with last element.
        self.sets[prev].swap_remove(pos);
        if let Some(&moved) = self.sets[prev].get(pos) {
            self.position[moved] = pos;
        }

        // Add to new set.
        self.index[elem] = set;
        self.position[elem] = self.sets[set].len();
        self.sets[set].push(elem);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_assignments_groups_elements() {
        let ps = PartitionSet::from_assignments(3, &[0, 1, 2, 0, 2, 1]);

        assert_eq!(ps.num_sets(), 3);
        assert_eq!(ps.num_elems(), 6);
        assert_eq!(ps.get(0), &[0, 3]);
        assert_eq!(ps.get(1), &[1, 5]);
        assert_eq!(ps.get(2), &[2, 4]);
        for (elem, &set) in [0, 1, 2, 0, 2, 1].iter().enumerate() {
            assert_eq!(ps.find(elem), set);
        }
    }

    #[test]
    fn empty_sets_are_allowed() {
        let ps = PartitionSet::from_assignments(3, &[0, 0, 2]);
        assert!(ps.get(1).is_empty());
        assert_eq!(ps.iter_sets().map(|s| s.len()).collect::<Vec<_>>(), vec![2, 0, 1]);
    }

    #[test]
    #[should_panic(expected = "must have at least one set")]
    fn panics_on_zero_sets() {
        PartitionSet::from_assignments(0, &[]);
    }

    #[test]
    #[should_panic(expected = "set out of range")]
    fn panics_on_set_out_of_range() {
        PartitionSet::from_assignments(2, &[0, 1, 2]);
    }

    #[test]
    fn move_to_idempotent_when_same_set() {
        let mut ps = PartitionSet::from_assignments(2, &[0, 0, 0]);
        ps.move_to(2, 0);
        assert_eq!(ps.find(2), 0);
        assert_eq!(ps.get(0), &[0, 1, 2]);
        assert!(ps.get(1).is_empty());
    }

    #[test]
    fn move_to_updates_swapped_element_position() {
        let mut ps = PartitionSet::from_assignments(2, &[0, 0, 0, 1, 0]);
        ps.move_to(1, 1);

        assert_eq!(ps.find(1), 1);
        assert_eq!(ps.get(0), &[0, 4, 2]);
        assert_eq!(ps.get(1), &[3, 1]);

        // The swapped element must still be movable from its new slot.
        ps.move_to(4, 1);
        assert_eq!(ps.get(0), &[0, 2]);
        assert_eq!(ps.get(1), &[3, 1, 4]);
    }

    #[test]
    fn moving_last_element_of_set() {
        let mut ps = PartitionSet::from_assignments(2, &[0, 1]);
        ps.move_to(1, 0);
        assert!(ps.get(1).is_empty());
        assert_eq!(ps.get(0), &[0, 1]);
    }

    #[test]
    fn multiple_moves_keep_invariant() {
        let mut ps = PartitionSet::from_assignments(3, &[0; 6]);
        for (elem, set) in [(0, 1), (1, 2), (2, 1), (3, 2), (4, 1), (5, 2), (2, 0)] {
            ps.move_to(elem, set);
        }

        for elem in 0..6 {
            let set = ps.find(elem);
            assert!(ps.get(set).contains(&elem));
        }

        let mut all = ps.iter_sets().flatten().copied().collect::<Vec<_>>();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3, 4, 5]);
    }
}
