use rand::Rng;
use rand::seq::SliceRandom;

use crate::graph::{AttributeMatrix, Graph};

/// Rook-adjacency adjacency lists of a `rows x cols` grid, nodes numbered row-major.
fn grid_adjacency(rows: usize, cols: usize) -> Vec<Vec<u32>> {
    let mut adjacency = vec![Vec::with_capacity(4); rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            let u = r * cols + c;
            if r > 0 { adjacency[u].push((u - cols) as u32) }
            if c > 0 { adjacency[u].push((u - 1) as u32) }
            if c + 1 < cols { adjacency[u].push((u + 1) as u32) }
            if r + 1 < rows { adjacency[u].push((u + cols) as u32) }
        }
    }
    adjacency
}

/// A `rows x cols` grid graph where every unit has population 1.
pub fn grid(rows: usize, cols: usize) -> Graph {
    let n = rows * cols;
    Graph::from_parts(
        (0..n).map(|u| u.to_string()).collect(),
        &grid_adjacency(rows, cols),
        AttributeMatrix::new(vec!["population".into()], n, vec![1.0; n]),
    )
}

/// A synthetic voting map: a grid of single-voter units, `num_r_units` of which vote `R`
/// and the rest `D`, placed uniformly at random.
///
/// Attributes are `population`, `D` and `R`, each 0 or 1 per unit.
pub fn grid_with_votes(rows: usize, cols: usize, num_r_units: usize, rng: &mut impl Rng) -> Graph {
    let n = rows * cols;
    assert!(num_r_units <= n, "num_r_units ({num_r_units}) exceeds number of units ({n})");

    let mut units = (0..n).collect::<Vec<_>>();
    units.shuffle(rng);

    let mut votes_r = vec![false; n];
    for &u in &units[..num_r_units] { votes_r[u] = true }

    let values = votes_r.iter()
        .flat_map(|&r| if r { [1.0, 0.0, 1.0] } else { [1.0, 1.0, 0.0] })
        .collect::<Vec<_>>();

    Graph::from_parts(
        (0..n).map(|u| u.to_string()).collect(),
        &grid_adjacency(rows, cols),
        AttributeMatrix::new(vec!["population".into(), "D".into(), "R".into()], n, values),
    )
}
