use std::{fmt, fs, path::Path};

use color_eyre::eyre::{bail, ensure, eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn distance(self, other: Position) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mult,
}

impl Op {
    /// `None` on overflow.
    pub fn apply(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            Op::Add => lhs.checked_add(rhs),
            Op::Sub => lhs.checked_sub(rhs),
            Op::Mult => lhs.checked_mul(rhs),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mult => "*",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Square {
    Num(i64),
    Op(Op),
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Square::Num(num) => write!(f, "{num}"),
            Square::Op(op) => write!(f, "{op}"),
        }
    }
}

const VAULT: [[Square; 4]; 4] = {
    use Op::{Add, Mult, Sub};
    use Square::{Num, Op as O};
    [
        [O(Mult), Num(8), O(Sub), Num(1)],
        [Num(4), O(Mult), Num(11), O(Mult)],
        [O(Add), Num(4), O(Sub), Num(18)],
        [Num(22), O(Sub), Num(9), O(Mult)],
    ]
};

pub const VAULT_START: Position = Position::new(3, 0);
pub const VAULT_END: Position = Position::new(0, 3);
pub const VAULT_TARGET: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Direction of a single step, `None` unless the positions are adjacent.
    pub fn between(from: Position, to: Position) -> Option<Direction> {
        if from.distance(to) != 1 {
            return None;
        }
        let direction = if from.row < to.row {
            Direction::South
        } else if from.row > to.row {
            Direction::North
        } else if from.col < to.col {
            Direction::East
        } else {
            Direction::West
        };
        Some(direction)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        };
        f.write_str(name)
    }
}

pub fn directions(path: &[Position]) -> Vec<Direction> {
    path.windows(2)
        .filter_map(|step| Direction::between(step[0], step[1]))
        .collect()
}

/// One move of a walkthrough. `value` is the orb weight after landing on a
/// number square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Step {
    pub direction: Direction,
    pub to: Position,
    pub square: Square,
    pub value: Option<i64>,
}

/// On-disk shape of a board.
#[derive(Debug, Deserialize)]
struct GridConfig {
    cells: Vec<Vec<Square>>,
    start: Position,
    end: Position,
    target: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cells: Vec<Vec<Square>>,
    start: Position,
    end: Position,
    target: i64,
}

impl Default for Grid {
    fn default() -> Self {
        Self::vault()
    }
}

impl Grid {
    /// The board in front of the vault door.
    pub fn vault() -> Self {
        Self {
            cells: VAULT.iter().map(|row| row.to_vec()).collect(),
            start: VAULT_START,
            end: VAULT_END,
            target: VAULT_TARGET,
        }
    }

    pub fn new(
        cells: Vec<Vec<Square>>,
        start: Position,
        end: Position,
        target: i64,
    ) -> Result<Self> {
        let width = cells.first().map_or(0, Vec::len);
        ensure!(width > 0, "grid must have at least one cell");
        if let Some(row) = cells.iter().position(|row| row.len() != width) {
            bail!(
                "grid is not rectangular: row {row} has {} cells, expected {width}",
                cells[row].len()
            );
        }

        let grid = Self {
            cells,
            start,
            end,
            target,
        };
        for (name, pos) in [("start", start), ("end", end)] {
            match grid.cell_at(pos)? {
                Square::Num(_) => {}
                Square::Op(op) => bail!("{name} {pos} must be a number square, found `{op}`"),
            }
        }
        Ok(grid)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: GridConfig = serde_json::from_str(json).wrap_err("malformed grid config")?;
        Self::new(config.cells, config.start, config.end, config.target)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .wrap_err_with(|| format!("can't read grid config {}", path.display()))?;
        Self::from_json(&json).wrap_err_with(|| format!("in {}", path.display()))
    }

    pub fn with_target(mut self, target: i64) -> Self {
        self.target = target;
        self
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn target(&self) -> i64 {
        self.target
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    pub fn width(&self) -> usize {
        self.cells[0].len()
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.height() && pos.col < self.width()
    }

    pub fn cell_at(&self, pos: Position) -> Result<Square> {
        self.cells
            .get(pos.row)
            .and_then(|row| row.get(pos.col))
            .copied()
            .ok_or_else(|| {
                eyre!(
                    "{pos} is outside the {}x{} grid",
                    self.height(),
                    self.width()
                )
            })
    }

    /// In-bounds neighbours in the order up, right, down, left.
    pub fn neighbors(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        let up = pos.row.checked_sub(1).map(|row| Position::new(row, pos.col));
        let right = Some(Position::new(pos.row, pos.col + 1));
        let down = Some(Position::new(pos.row + 1, pos.col));
        let left = pos.col.checked_sub(1).map(|col| Position::new(pos.row, col));
        [up, right, down, left]
            .into_iter()
            .flatten()
            .filter(move |&p| self.contains(p))
    }

    fn number_at(&self, pos: Position) -> Result<i64> {
        match self.cell_at(pos)? {
            Square::Num(num) => Ok(num),
            Square::Op(op) => bail!("expected a number at {pos}, found `{op}`"),
        }
    }

    fn op_at(&self, pos: Position) -> Result<Op> {
        match self.cell_at(pos)? {
            Square::Op(op) => Ok(op),
            Square::Num(num) => bail!("expected an operator at {pos}, found {num}"),
        }
    }

    /// Weight of the orb after each number square of `path`.
    fn running_values(&self, path: &[Position]) -> Result<Vec<i64>> {
        ensure!(
            path.len() % 2 == 1,
            "path must start and end on a number square, got {} squares",
            path.len()
        );

        let mut acc = self.number_at(path[0])?;
        let mut values = Vec::with_capacity(path.len() / 2 + 1);
        values.push(acc);
        for pair in path[1..].chunks_exact(2) {
            let op = self.op_at(pair[0])?;
            let num = self.number_at(pair[1])?;
            acc = op
                .apply(acc, num)
                .ok_or_else(|| eyre!("{acc} {op} {num} overflows at {}", pair[1]))?;
            values.push(acc);
        }
        Ok(values)
    }

    pub fn evaluate_path(&self, path: &[Position]) -> Result<i64> {
        let values = self.running_values(path)?;
        Ok(values[values.len() - 1])
    }

    pub fn walk(&self, path: &[Position]) -> Result<Vec<Step>> {
        let values = self.running_values(path)?;
        path.windows(2)
            .enumerate()
            .map(|(i, step)| {
                let (from, to) = (step[0], step[1]);
                let direction = Direction::between(from, to)
                    .ok_or_else(|| eyre!("{from} and {to} are not adjacent"))?;
                // number squares sit at even path indices
                let value = (i % 2 == 1).then(|| values[(i + 1) / 2]);
                Ok(Step {
                    direction,
                    to,
                    square: self.cell_at(to)?,
                    value,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(row: usize, col: usize) -> Position {
        Position::new(row, col)
    }

    #[test]
    fn vault_layout() {
        let grid = Grid::vault();
        assert_eq!(grid.cell_at(grid.start()).unwrap(), Square::Num(22));
        assert_eq!(grid.cell_at(grid.end()).unwrap(), Square::Num(1));
        assert_eq!(grid.cell_at(pos(0, 0)).unwrap(), Square::Op(Op::Mult));
        assert_eq!(grid.target(), 30);
        assert!(grid.cell_at(pos(4, 0)).is_err());
        assert!(grid.cell_at(pos(0, 4)).is_err());
    }

    #[test]
    fn neighbors_in_priority_order() {
        let grid = Grid::vault();
        let around: Vec<_> = grid.neighbors(pos(1, 1)).collect();
        assert_eq!(around, [pos(0, 1), pos(1, 2), pos(2, 1), pos(1, 0)]);

        let corner: Vec<_> = grid.neighbors(grid.start()).collect();
        assert_eq!(corner, [pos(2, 0), pos(3, 1)]);
    }

    #[test]
    fn evaluates_alternating_path() {
        let grid = Grid::vault();
        // 22 + 4 * 8 - 1 = 207 along the left column and the top row
        let path = [pos(3, 0), pos(2, 0), pos(1, 0), pos(0, 0), pos(0, 1), pos(0, 2), pos(0, 3)];
        assert_eq!(grid.evaluate_path(&path).unwrap(), 207);
    }

    #[test]
    fn rejects_malformed_paths() {
        let grid = Grid::vault();
        assert!(grid.evaluate_path(&[]).is_err());
        assert!(grid.evaluate_path(&[pos(3, 0), pos(2, 0)]).is_err());
        // starts on an operator
        assert!(grid.evaluate_path(&[pos(2, 0), pos(1, 0), pos(0, 0)]).is_err());
        // number where an operator belongs
        assert!(grid.evaluate_path(&[pos(3, 0), pos(1, 0), pos(3, 0)]).is_err());
        assert!(grid.evaluate_path(&[pos(3, 0), pos(3, 1), pos(3, 9)]).is_err());
    }

    #[test]
    fn single_square_path_is_its_own_value() {
        let grid = Grid::new(vec![vec![Square::Num(7)]], pos(0, 0), pos(0, 0), 7).unwrap();
        assert_eq!(grid.evaluate_path(&[pos(0, 0)]).unwrap(), 7);
        assert!(grid.walk(&[pos(0, 0)]).unwrap().is_empty());
    }

    #[test]
    fn overflow_is_an_error() {
        let cells = vec![vec![Square::Num(i64::MAX), Square::Op(Op::Mult), Square::Num(2)]];
        let grid = Grid::new(cells, pos(0, 0), pos(0, 2), 0).unwrap();
        assert!(grid.evaluate_path(&[pos(0, 0), pos(0, 1), pos(0, 2)]).is_err());
    }

    #[test]
    fn new_validates_board() {
        assert!(Grid::new(vec![], pos(0, 0), pos(0, 0), 0).is_err());
        let ragged = vec![vec![Square::Num(1), Square::Op(Op::Add)], vec![Square::Num(1)]];
        assert!(Grid::new(ragged, pos(0, 0), pos(0, 0), 0).is_err());
        let on_op = vec![vec![Square::Num(1), Square::Op(Op::Add)]];
        assert!(Grid::new(on_op.clone(), pos(0, 0), pos(0, 1), 0).is_err());
        assert!(Grid::new(on_op, pos(0, 0), pos(1, 0), 0).is_err());
    }

    #[test]
    fn directions_follow_row_and_column_changes() {
        assert_eq!(Direction::between(pos(3, 0), pos(2, 0)), Some(Direction::North));
        assert_eq!(Direction::between(pos(2, 0), pos(3, 0)), Some(Direction::South));
        assert_eq!(Direction::between(pos(2, 0), pos(2, 1)), Some(Direction::East));
        assert_eq!(Direction::between(pos(2, 1), pos(2, 0)), Some(Direction::West));
        assert_eq!(Direction::between(pos(2, 1), pos(2, 1)), None);
        assert_eq!(Direction::between(pos(0, 0), pos(1, 1)), None);

        let path = [pos(3, 0), pos(2, 0), pos(2, 1), pos(1, 1)];
        assert_eq!(
            directions(&path),
            [Direction::North, Direction::East, Direction::North]
        );
    }

    #[test]
    fn walk_reports_weights_on_number_squares() {
        let grid = Grid::vault();
        let path = [pos(3, 0), pos(2, 0), pos(2, 1), pos(2, 2), pos(2, 3)];
        let steps = grid.walk(&path).unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].square, Square::Op(Op::Add));
        assert_eq!(steps[0].value, None);
        assert_eq!(steps[1].value, Some(26));
        assert_eq!(steps[2].value, None);
        assert_eq!(steps[3].direction, Direction::East);
        assert_eq!(steps[3].value, Some(8));
    }

    #[test]
    fn loads_board_from_json() {
        let json = r#"{
            "cells": [[3, "*", 5], ["-", 2, "+"]],
            "start": {"row": 0, "col": 0},
            "end": {"row": 0, "col": 2},
            "target": 15
        }"#;
        let grid = Grid::from_json(json).unwrap();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.cell_at(pos(1, 0)).unwrap(), Square::Op(Op::Sub));
        assert_eq!(grid.evaluate_path(&[pos(0, 0), pos(0, 1), pos(0, 2)]).unwrap(), 15);

        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), json).unwrap();
        assert_eq!(Grid::load(file.path()).unwrap(), grid);

        let bad_op = r#"{
            "cells": [["/"]],
            "start": {"row": 0, "col": 0},
            "end": {"row": 0, "col": 0},
            "target": 1
        }"#;
        assert!(Grid::from_json(bad_op).is_err());
    }
}
