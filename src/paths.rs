//! Path finding across the orb grid.
//!
//! Two strategies: a breadth-first enumeration of the shortest paths, which
//! is cheap but only finds solutions that never double back, and a
//! best-first search that allows revisiting squares (except the start) while
//! keeping the orb's weight non-negative.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashSet, VecDeque},
};

use color_eyre::eyre::{Result, WrapErr};
use serde::Serialize;
use tracing::{debug, trace};

use crate::grid::{directions, Direction, Grid, Position, Square};

/// Lazily yields paths from start to end in non-decreasing length.
///
/// Squares are marked visited when dequeued rather than when enqueued, so
/// several predecessors at the same depth can all reach a square before it
/// closes. On the vault this yields every monotone shortest path exactly once.
pub struct MinimalPaths<'a> {
    grid: &'a Grid,
    visited: HashSet<Position>,
    queue: VecDeque<(Position, Vec<Position>)>,
}

impl<'a> MinimalPaths<'a> {
    pub fn new(grid: &'a Grid) -> Self {
        Self {
            grid,
            visited: HashSet::new(),
            queue: VecDeque::from([(grid.start(), Vec::new())]),
        }
    }
}

impl Iterator for MinimalPaths<'_> {
    type Item = Vec<Position>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((pos, mut path)) = self.queue.pop_front() {
            self.visited.insert(pos);
            path.push(pos);
            if pos == self.grid.end() {
                return Some(path);
            }
            for next in self.grid.neighbors(pos) {
                if !self.visited.contains(&next) {
                    self.queue.push_back((next, path.clone()));
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Give up after popping this many nodes.
    pub max_pops: usize,
    /// Treat the end square as terminal, as the vault door does: a walk that
    /// reaches it at the wrong weight is not extended.
    pub stop_at_end: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_pops: 1_000_000,
            stop_at_end: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Priority {
    len: usize,
    dist: usize,
    diff: u64,
    seq: u64,
}

#[derive(Debug)]
struct Node {
    pos: Position,
    prev_path: Vec<Position>,
    value: i64,
    priority: Priority,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    // BinaryHeap is a max-heap; the smallest priority must pop first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.cmp(&self.priority)
    }
}

struct Frontier<'a> {
    grid: &'a Grid,
    heap: BinaryHeap<Node>,
    seq: u64,
}

impl Frontier<'_> {
    fn push(&mut self, pos: Position, prev_path: Vec<Position>, value: i64) {
        let priority = Priority {
            len: prev_path.len(),
            dist: pos.distance(self.grid.end()),
            diff: value.abs_diff(self.grid.target()),
            seq: self.seq,
        };
        self.seq += 1;
        self.heap.push(Node {
            pos,
            prev_path,
            value,
            priority,
        });
    }
}

/// Best-first search for a path ending on the end square with the target
/// weight.
///
/// Each step picks an operator square and then a number square next to it.
/// Returning to the start square or letting the weight drop below zero
/// shatters the orb, so those candidates are dropped. Walks may pass over the
/// end square unless `stop_at_end` is set.
pub fn search(grid: &Grid, config: &SearchConfig) -> Option<Vec<Position>> {
    let Ok(Square::Num(seed)) = grid.cell_at(grid.start()) else {
        return None;
    };
    let mut frontier = Frontier {
        grid,
        heap: BinaryHeap::new(),
        seq: 0,
    };
    frontier.push(grid.start(), Vec::new(), seed);

    let mut pops = 0;
    while let Some(node) = frontier.heap.pop() {
        pops += 1;
        if pops > config.max_pops {
            debug!(pops = config.max_pops, "search budget exhausted");
            return None;
        }

        let mut path = node.prev_path;
        path.push(node.pos);
        if node.pos == grid.end() && node.value == grid.target() {
            debug!(pops, len = path.len(), "heuristic search found a path");
            return Some(path);
        }
        if config.stop_at_end && node.pos == grid.end() {
            continue;
        }
        trace!(pos = %node.pos, value = node.value, len = path.len(), "expanding");

        for op_pos in grid.neighbors(node.pos) {
            let Ok(Square::Op(op)) = grid.cell_at(op_pos) else {
                continue;
            };
            let mut op_path = path.clone();
            op_path.push(op_pos);
            for num_pos in grid.neighbors(op_pos) {
                if num_pos == grid.start() {
                    continue;
                }
                let Ok(Square::Num(num)) = grid.cell_at(num_pos) else {
                    continue;
                };
                match op.apply(node.value, num) {
                    Some(value) if value >= 0 => {
                        frontier.push(num_pos, op_path.clone(), value)
                    }
                    _ => {}
                }
            }
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    MinimalPath,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrbSolution {
    pub strategy: Strategy,
    pub path: Vec<Position>,
    pub directions: Vec<Direction>,
    pub value: i64,
}

/// Tries the shortest paths first, then falls back to the heuristic search.
///
/// `Ok(None)` means no path was found. Errors come from evaluating the
/// chosen path, which both strategies only produce for valid walks.
pub fn solve_orb(grid: &Grid, config: &SearchConfig) -> Result<Option<OrbSolution>> {
    let minimal = MinimalPaths::new(grid).find(|path| {
        matches!(grid.evaluate_path(path), Ok(value) if value == grid.target())
    });
    let (strategy, path) = match minimal {
        Some(path) => (Strategy::MinimalPath, path),
        None => {
            debug!("no shortest path reaches the target, searching");
            match search(grid, config) {
                Some(path) => (Strategy::Heuristic, path),
                None => return Ok(None),
            }
        }
    };
    let value = grid
        .evaluate_path(&path)
        .wrap_err("solver produced a path that does not evaluate")?;
    Ok(Some(OrbSolution {
        strategy,
        directions: directions(&path),
        path,
        value,
    }))
}

pub fn find_orb_path(grid: &Grid, config: &SearchConfig) -> Result<Option<Vec<Position>>> {
    Ok(solve_orb(grid, config)?.map(|solution| solution.path))
}
