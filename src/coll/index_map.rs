//! Correlation of positions in a batch back to positions in the caller's request list.
use std::collections::BTreeMap;

/// A contiguous run of batch positions that map onto contiguous original positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexRange {
    pub index: usize,
    pub original_index: usize,
    pub count: usize,
}

impl IndexRange {
    fn contains(&self, index: usize) -> bool {
        index >= self.index && index < self.index + self.count
    }

    fn is_next(&self, index: usize, original_index: usize) -> bool {
        self.index + self.count == index && self.original_index + self.count == original_index
    }
}

/// Maps a position in a filtered or reordered request list to the index the
/// caller originally submitted the request at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexMap {
    /// Every index maps to itself.
    Identity,
    /// Contiguous runs; used while requests are added in order.
    RangeBased(Vec<IndexRange>),
    /// Arbitrary pairs.
    DictionaryBased(BTreeMap<usize, usize>),
}

impl IndexMap {
    /// Returns an empty map.
    pub fn new() -> IndexMap {
        IndexMap::RangeBased(Vec::new())
    }

    pub fn identity() -> IndexMap {
        IndexMap::Identity
    }

    /// Returns a map of `count` contiguous positions starting at `index`.
    pub fn range(index: usize, original_index: usize, count: usize) -> IndexMap {
        IndexMap::RangeBased(vec![IndexRange {
            index: index,
            original_index: original_index,
            count: count,
        }])
    }

    /// Records that position `index` corresponds to `original_index`.
    ///
    /// Pairs are expected in increasing `index` order. A pair continuing the
    /// last range extends it, and any other pair turns a range map into a
    /// dictionary map. The identity map absorbs pairs it already maps. Any
    /// other pair keeps the identity entries below `index` in an explicit map
    /// and adds the pair to it.
    pub fn add(self, index: usize, original_index: usize) -> IndexMap {
        match self {
            IndexMap::Identity => {
                if index == original_index {
                    IndexMap::Identity
                } else if index == 0 {
                    IndexMap::new().add(index, original_index)
                } else {
                    IndexMap::range(0, 0, index).add(index, original_index)
                }
            }
            IndexMap::RangeBased(mut ranges) => {
                let extended = match ranges.last_mut() {
                    Some(last) if last.is_next(index, original_index) => {
                        last.count += 1;
                        true
                    }
                    Some(_) => false,
                    None => {
                        ranges.push(IndexRange {
                            index: index,
                            original_index: original_index,
                            count: 1,
                        });
                        true
                    }
                };

                if extended {
                    IndexMap::RangeBased(ranges)
                } else {
                    let mut pairs = IndexMap::to_pairs(&ranges);
                    pairs.insert(index, original_index);
                    IndexMap::DictionaryBased(pairs)
                }
            }
            IndexMap::DictionaryBased(mut pairs) => {
                pairs.insert(index, original_index);
                IndexMap::DictionaryBased(pairs)
            }
        }
    }

    /// Returns the original index for `index`, or `None` if it was never added.
    pub fn map(&self, index: usize) -> Option<usize> {
        match *self {
            IndexMap::Identity => Some(index),
            IndexMap::RangeBased(ref ranges) => {
                ranges.iter()
                    .find(|range| range.contains(index))
                    .map(|range| range.original_index + (index - range.index))
            }
            IndexMap::DictionaryBased(ref pairs) => pairs.get(&index).cloned(),
        }
    }

    pub fn is_range_based(&self) -> bool {
        match *self {
            IndexMap::RangeBased(_) => true,
            _ => false,
        }
    }

    fn to_pairs(ranges: &[IndexRange]) -> BTreeMap<usize, usize> {
        let mut pairs = BTreeMap::new();
        for range in ranges {
            for offset in 0..range.count {
                pairs.insert(range.index + offset, range.original_index + offset);
            }
        }
        pairs
    }
}

impl Default for IndexMap {
    fn default() -> Self {
        IndexMap::new()
    }
}
