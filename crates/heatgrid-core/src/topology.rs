//! Topology Resolver - 2-D grid placement without wraparound
//!
//! Workers are laid out row-major: worker rank `r` sits at grid index `r - 1`.
//! Neighbours are found by shifting ±1 along each axis; a shift that leaves
//! the grid yields no neighbour, so interior cells have 4 neighbours, edge
//! cells 3 and corner cells 2 (fewer on degenerate 1-wide grids).

use crate::{Coord, HeatgridError, HeatgridResult, Rank};

/// Grid axis used for shifting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Row,
    Col,
}

/// Neighbour ranks in report order: left, right, top, bottom
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Neighbors {
    pub left: Option<Rank>,
    pub right: Option<Rank>,
    pub top: Option<Rank>,
    pub bottom: Option<Rank>,
}

impl Neighbors {
    /// Present neighbours, in left/right/top/bottom order
    pub fn ranks(&self) -> Vec<Rank> {
        [self.left, self.right, self.top, self.bottom]
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.ranks().len()
    }
}

/// Shape of the sensor grid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    pub fn new(rows: usize, cols: usize) -> HeatgridResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(HeatgridError::InvalidConfig(format!(
                "grid {} x {} has no cells",
                rows, cols
            )));
        }
        Ok(GridShape { rows, cols })
    }

    /// Most square grid holding `workers` cells, rows >= cols
    pub fn balanced(workers: usize) -> HeatgridResult<Self> {
        let cols = (1..=workers)
            .take_while(|d| d * d <= workers)
            .filter(|d| workers % d == 0)
            .last()
            .unwrap_or(0);
        if cols == 0 {
            return Err(HeatgridError::InvalidConfig("no workers to place".into()));
        }
        GridShape::new(workers / cols, cols)
    }

    /// Number of worker cells
    #[inline]
    pub fn cells(&self) -> usize {
        self.rows * self.cols
    }

    /// A world of `process_count` ranks holds one correlator plus one worker per cell
    pub fn check_world(&self, process_count: usize) -> HeatgridResult<()> {
        let workers = process_count.saturating_sub(1);
        if self.cells() != workers {
            return Err(HeatgridError::GridMismatch {
                rows: self.rows,
                cols: self.cols,
                workers,
            });
        }
        Ok(())
    }

    pub fn contains(&self, coord: Coord) -> bool {
        coord.row >= 0
            && coord.col >= 0
            && (coord.row as usize) < self.rows
            && (coord.col as usize) < self.cols
    }

    /// Coordinate of a worker rank
    pub fn coord_of(&self, rank: Rank) -> HeatgridResult<Coord> {
        match rank.worker_index() {
            Some(index) if index < self.cells() => Ok(Coord::new(
                (index / self.cols) as i32,
                (index % self.cols) as i32,
            )),
            _ => Err(HeatgridError::UnknownRank(rank)),
        }
    }

    /// Worker rank at a coordinate, `None` outside the grid
    pub fn rank_at(&self, coord: Coord) -> Option<Rank> {
        if !self.contains(coord) {
            return None;
        }
        Some(Rank::worker(
            coord.row as usize * self.cols + coord.col as usize,
        ))
    }

    /// Source and destination ranks for a shift of `disp` along `axis`
    pub fn shift(&self, rank: Rank, axis: Axis, disp: i32) -> HeatgridResult<(Option<Rank>, Option<Rank>)> {
        let c = self.coord_of(rank)?;
        let (back, forward) = match axis {
            Axis::Row => (Coord::new(c.row - disp, c.col), Coord::new(c.row + disp, c.col)),
            Axis::Col => (Coord::new(c.row, c.col - disp), Coord::new(c.row, c.col + disp)),
        };
        Ok((self.rank_at(back), self.rank_at(forward)))
    }

    /// Full placement of a worker: coordinate and neighbours
    pub fn resolve(&self, rank: Rank) -> HeatgridResult<Placement> {
        let coord = self.coord_of(rank)?;
        let (top, bottom) = self.shift(rank, Axis::Row, 1)?;
        let (left, right) = self.shift(rank, Axis::Col, 1)?;
        Ok(Placement {
            rank,
            coord,
            neighbors: Neighbors {
                left,
                right,
                top,
                bottom,
            },
        })
    }
}

/// Where a worker sits in the grid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub rank: Rank,
    pub coord: Coord,
    pub neighbors: Neighbors,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_balanced() {
        assert_eq!(GridShape::balanced(9).unwrap(), GridShape { rows: 3, cols: 3 });
        assert_eq!(GridShape::balanced(8).unwrap(), GridShape { rows: 4, cols: 2 });
        assert_eq!(GridShape::balanced(7).unwrap(), GridShape { rows: 7, cols: 1 });
        assert!(GridShape::balanced(0).is_err());
    }

    #[test]
    fn test_row_major_coords() {
        let grid = GridShape::new(3, 4).unwrap();
        assert_eq!(grid.coord_of(Rank(1)).unwrap(), Coord::new(0, 0));
        assert_eq!(grid.coord_of(Rank(4)).unwrap(), Coord::new(0, 3));
        assert_eq!(grid.coord_of(Rank(5)).unwrap(), Coord::new(1, 0));
        assert_eq!(grid.coord_of(Rank(12)).unwrap(), Coord::new(2, 3));
        assert!(grid.coord_of(Rank(13)).is_err());
        assert!(grid.coord_of(Rank::BASE).is_err());
    }

    #[test]
    fn test_interior_has_four_neighbours() {
        let grid = GridShape::new(3, 3).unwrap();
        let centre = grid.resolve(Rank(5)).unwrap();
        assert_eq!(centre.coord, Coord::new(1, 1));
        assert_eq!(
            centre.neighbors,
            Neighbors {
                left: Some(Rank(4)),
                right: Some(Rank(6)),
                top: Some(Rank(2)),
                bottom: Some(Rank(8)),
            }
        );
        assert_eq!(centre.neighbors.ranks(), vec![Rank(4), Rank(6), Rank(2), Rank(8)]);
    }

    #[test]
    fn test_corner_and_edge() {
        let grid = GridShape::new(3, 3).unwrap();
        let corner = grid.resolve(Rank(1)).unwrap();
        assert_eq!(corner.neighbors.ranks(), vec![Rank(2), Rank(4)]);
        let edge = grid.resolve(Rank(2)).unwrap();
        assert_eq!(edge.neighbors.count(), 3);
    }

    #[test]
    fn test_no_wraparound() {
        let grid = GridShape::new(2, 2).unwrap();
        let (left, right) = grid.shift(Rank(1), Axis::Col, 1).unwrap();
        assert_eq!(left, None);
        assert_eq!(right, Some(Rank(2)));
    }

    #[test]
    fn test_world_check() {
        let grid = GridShape::new(3, 3).unwrap();
        assert!(grid.check_world(10).is_ok());
        let err = grid.check_world(9).unwrap_err();
        assert!(matches!(err, HeatgridError::GridMismatch { workers: 8, .. }));
        assert!(GridShape::new(0, 3).is_err());
    }

    proptest! {
        #[test]
        fn prop_neighbour_counts(rows in 2usize..12, cols in 2usize..12, pick in any::<prop::sample::Index>()) {
            let grid = GridShape::new(rows, cols).unwrap();
            let rank = Rank::worker(pick.index(grid.cells()));
            let placement = grid.resolve(rank).unwrap();
            let n = placement.neighbors.count();
            prop_assert!((2..=4).contains(&n));

            let Coord { row, col } = placement.coord;
            let on_row_edge = row == 0 || row as usize == rows - 1;
            let on_col_edge = col == 0 || col as usize == cols - 1;
            match (on_row_edge, on_col_edge) {
                (false, false) => prop_assert_eq!(n, 4),
                (true, true) => prop_assert_eq!(n, 2),
                _ => prop_assert_eq!(n, 3),
            }
        }

        #[test]
        fn prop_neighbours_are_symmetric(rows in 1usize..10, cols in 1usize..10, pick in any::<prop::sample::Index>()) {
            let grid = GridShape::new(rows, cols).unwrap();
            let rank = Rank::worker(pick.index(grid.cells()));
            for n in grid.resolve(rank).unwrap().neighbors.ranks() {
                prop_assert!(grid.resolve(n).unwrap().neighbors.ranks().contains(&rank));
            }
        }
    }
}
