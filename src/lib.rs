//! Solvers for two puzzles from the Synacor challenge: the orb on the vault
//! grid and the teleporter's eighth register.

pub mod grid;
pub mod logging;
pub mod paths;
pub mod routine;
pub mod sweep;

pub use grid::{Direction, Grid, Op, Position, Square, Step};
pub use paths::{find_orb_path, solve_orb, MinimalPaths, OrbSolution, SearchConfig, Strategy};
pub use routine::{closed_form, teleporter_value, ClosedForm, Evaluator, Machine, Memoized, MOD};
pub use sweep::{find_teleporter_parameter, verify_evaluators, Sweep};
