use std::ops::RangeInclusive;

use color_eyre::eyre::{ensure, Result};
use rayon::prelude::{IntoParallelIterator, ParallelIterator};
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::routine::{ClosedForm, Evaluator, Machine, Memoized, MOD};

/// The teleporter checks `f(4, 1) == 6`.
pub const TELEPORTER_R0: u16 = 4;
pub const TELEPORTER_R1: u16 = 1;
pub const TELEPORTER_TARGET: u16 = 6;

/// Inputs the literal machine is cheap enough to run on.
pub const LITERAL_SAMPLES: [(u16, u16, u16); 6] = [
    (0, 0, 0),
    (0, 0, 1),
    (0, 1, 1),
    (1, 1, 1),
    (1, 2, 1),
    (2, 2, 1),
];

fn candidates() -> RangeInclusive<u16> {
    1..=(MOD - 2) as u16
}

/// Scan over the eighth register.
#[derive(Debug, Clone, Serialize)]
pub struct Sweep {
    pub r0: u16,
    pub r1: u16,
    pub target: u16,
    pub parallel: bool,
}

impl Default for Sweep {
    fn default() -> Self {
        Self {
            r0: TELEPORTER_R0,
            r1: TELEPORTER_R1,
            target: TELEPORTER_TARGET,
            parallel: false,
        }
    }
}

impl Sweep {
    /// Smallest `r7` in `1..MOD - 1` with `f(r0, r1, r7) == target`.
    pub fn run<E: Evaluator + Default>(&self) -> Result<Option<u16>> {
        if self.parallel {
            self.run_parallel::<E>()
        } else {
            self.run_with(&mut E::default())
        }
    }

    pub fn run_with<E: Evaluator>(&self, evaluator: &mut E) -> Result<Option<u16>> {
        debug!(
            r0 = self.r0,
            r1 = self.r1,
            target = self.target,
            evaluator = evaluator.name(),
            "sweeping r7"
        );
        for r7 in candidates() {
            if r7 % 1000 == 0 {
                debug!(r7, "working on r7");
            }
            trace!(r7, "testing r7");
            // results for one r7 never help another
            evaluator.reset();
            if evaluator.eval(self.r0, self.r1, r7)? == self.target {
                info!(r7, "found r7");
                return Ok(Some(r7));
            }
        }
        info!("no r7 matches");
        Ok(None)
    }

    // `find_first` keeps the sequential answer: the lowest matching r7, or
    // the lowest failing one.
    fn run_parallel<E: Evaluator + Default>(&self) -> Result<Option<u16>> {
        debug!(r0 = self.r0, r1 = self.r1, target = self.target, "sweeping r7 in parallel");
        let found = candidates()
            .into_par_iter()
            .map_init(E::default, |evaluator, r7| {
                evaluator.reset();
                evaluator.eval(self.r0, self.r1, r7).map(|out| (r7, out))
            })
            .find_first(|result| match result {
                Ok((_, out)) => *out == self.target,
                Err(_) => true,
            });
        match found {
            Some(Ok((r7, _))) => {
                info!(r7, "found r7");
                Ok(Some(r7))
            }
            Some(Err(err)) => Err(err),
            None => {
                info!("no r7 matches");
                Ok(None)
            }
        }
    }
}

pub fn find_teleporter_parameter(target_output: u16, fixed_r0: u16, fixed_r1: u16) -> Option<u16> {
    let sweep = Sweep {
        r0: fixed_r0,
        r1: fixed_r1,
        target: target_output,
        parallel: false,
    };
    // the closed form never fails
    sweep.run_with(&mut ClosedForm).ok().flatten()
}

fn check_agreement(
    evaluators: &mut [&mut dyn Evaluator],
    inputs: impl IntoIterator<Item = (u16, u16, u16)>,
) -> Result<usize> {
    let mut checked = 0;
    for (r0, r1, r7) in inputs {
        let outputs = evaluators
            .iter_mut()
            .map(|evaluator| -> Result<(&'static str, u16)> {
                Ok((evaluator.name(), evaluator.eval(r0, r1, r7)?))
            })
            .collect::<Result<Vec<_>>>()?;
        ensure!(
            outputs.iter().all(|&(_, out)| out == outputs[0].1),
            "evaluators disagree on ({r0}, {r1}, {r7}): {}",
            outputs
                .iter()
                .map(|(name, out)| format!("{name} = {out}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        checked += 1;
    }
    Ok(checked)
}

/// Cross-checks the three evaluators. Must pass before trusting a sweep.
pub fn verify_evaluators() -> Result<()> {
    let mut literal = Machine::new();
    let mut memoized = Memoized::new();
    let mut closed = ClosedForm;

    let mut checked = check_agreement(
        &mut [&mut literal, &mut memoized, &mut closed],
        LITERAL_SAMPLES,
    )?;

    let grid = (0..=3u16).flat_map(|r0| {
        (0..=20u16).flat_map(move |r1| (1..=20u16).map(move |r7| (r0, r1, r7)))
    });
    checked += check_agreement(&mut [&mut memoized, &mut closed], grid)?;

    debug!(checked, cached = memoized.cached(), "evaluators agree");
    Ok(())
}
