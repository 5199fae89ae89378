//! Island labelling: 4-connected components over base-layer land.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::tiles::TileId;

/// Region label; 0 means "not on an island".
pub type IslandId = u32;

/// Old island id to the ids its cells carry after a relabel. A split island
/// maps to several ids, merged islands map to the same one, and an island
/// that sank entirely is absent.
pub type IslandRemap = BTreeMap<IslandId, BTreeSet<IslandId>>;

/// Label every `land_tile` cell of a row-major `base` layer.
///
/// Ids are assigned from 1 in the row-major order in which each island is
/// first reached. Returns the label grid and the number of islands.
pub fn label(base: &[TileId], cols: usize, rows: usize, land_tile: TileId) -> (Vec<IslandId>, u32) {
    let mut islands = vec![0; cols * rows];
    let mut count = 0;
    let mut queue = VecDeque::new();

    for start in 0..cols * rows {
        if base[start] != land_tile || islands[start] != 0 {
            continue;
        }

        count += 1;
        islands[start] = count;
        queue.push_back(start);

        while let Some(idx) = queue.pop_front() {
            let col = idx % cols;
            let row = idx / cols;

            let mut visit = |n: usize| {
                if base[n] == land_tile && islands[n] == 0 {
                    islands[n] = count;
                    queue.push_back(n);
                }
            };

            if col > 0 {
                visit(idx - 1);
            }
            if col + 1 < cols {
                visit(idx + 1);
            }
            if row > 0 {
                visit(idx - cols);
            }
            if row + 1 < rows {
                visit(idx + cols);
            }
        }
    }

    (islands, count)
}

/// Relate two labellings of the same grid cell by cell.
pub fn remap(old: &[IslandId], new: &[IslandId]) -> IslandRemap {
    let mut map = IslandRemap::new();
    for (&o, &n) in old.iter().zip(new) {
        if o != 0 && n != 0 {
            map.entry(o).or_default().insert(n);
        }
    }
    map
}
