//! # Position Mapping
//!
//! Every step reports which ranges it replaced so positions taken before the
//! step (selection, find matches, history entries) can be carried forward.
//!
//! - positions before a changed range are untouched
//! - positions after it shift by the size difference
//! - positions strictly inside a replaced range collapse to its start (or to
//!   the end of the inserted content, depending on [`Assoc`])

/// Which side a position sticks to when content is inserted exactly at it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Before,
    After,
}

/// One replaced range: `old_size` positions at `start` became `new_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRange {
    pub start: usize,
    pub old_size: usize,
    pub new_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    /// The position was inside replaced content
    pub deleted: bool,
}

/// Position map of a single step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMap {
    ranges: Vec<MappedRange>,
}

impl StepMap {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn single(start: usize, old_size: usize, new_size: usize) -> Self {
        if old_size == 0 && new_size == 0 {
            return Self::identity();
        }
        Self {
            ranges: vec![MappedRange {
                start,
                old_size,
                new_size,
            }],
        }
    }

    pub fn ranges(&self) -> &[MappedRange] {
        &self.ranges
    }

    pub fn is_identity(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_result(pos, assoc).pos
    }

    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut diff: isize = 0;
        for range in &self.ranges {
            if range.start > pos {
                break;
            }
            let end = range.start + range.old_size;
            if pos <= end {
                let stick_before = if range.old_size == 0 {
                    assoc == Assoc::Before
                } else if pos == range.start {
                    true
                } else if pos == end {
                    false
                } else {
                    assoc == Assoc::Before
                };
                let base = (range.start as isize + diff) as usize;
                let mapped = if stick_before { base } else { base + range.new_size };
                return MapResult {
                    pos: mapped,
                    deleted: pos > range.start && pos < end,
                };
            }
            diff += range.new_size as isize - range.old_size as isize;
        }
        MapResult {
            pos: (pos as isize + diff) as usize,
            deleted: false,
        }
    }
}

/// Sequence of step maps, applied in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn extend(&mut self, other: &Mapping) {
        self.maps.extend(other.maps.iter().cloned());
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn is_identity(&self) -> bool {
        self.maps.iter().all(StepMap::is_identity)
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_result(pos, assoc).pos
    }

    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut deleted = false;
        let mut pos = pos;
        for map in &self.maps {
            let result = map.map_result(pos, assoc);
            deleted |= result.deleted;
            pos = result.pos;
        }
        MapResult { pos, deleted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_shifts_following_positions() {
        let map = StepMap::single(5, 0, 3);
        assert_eq!(map.map(2, Assoc::After), 2);
        assert_eq!(map.map(5, Assoc::After), 8);
        assert_eq!(map.map(5, Assoc::Before), 5);
        assert_eq!(map.map(10, Assoc::After), 13);
    }

    #[test]
    fn test_deletion_collapses_inner_positions() {
        let map = StepMap::single(4, 6, 0);
        let inner = map.map_result(7, Assoc::After);
        assert_eq!(inner.pos, 4);
        assert!(inner.deleted);
        assert_eq!(map.map(10, Assoc::After), 4);
        assert_eq!(map.map(12, Assoc::After), 6);
    }

    #[test]
    fn test_mapping_composes() {
        let mut mapping = Mapping::new();
        mapping.push(StepMap::single(0, 0, 2));
        mapping.push(StepMap::single(10, 4, 0));
        assert_eq!(mapping.map(5, Assoc::After), 7);
        assert_eq!(mapping.map(12, Assoc::After), 10);
        assert_eq!(mapping.map(20, Assoc::After), 18);
    }
}
