//! The teleporter confirmation routine at 0x17a1 and three ways to evaluate it.
//!
//! ```text
//! f(0, n) = n + 1
//! f(m, 0) = f(m - 1, r7)
//! f(m, n) = f(m - 1, f(m, n - 1))
//! ```
//!
//! with every value kept in 15 bits. It's Ackermann's function with the
//! eighth register standing in for the constant 1.

use std::collections::HashMap;

use color_eyre::eyre::{bail, eyre, Result};

pub const MOD: u32 = 1 << 15;
const MASK: u16 = 0x7fff;

fn add(a: u16, b: u16) -> u16 {
    ((u32::from(a) + u32::from(b)) % MOD) as u16
}

/// Anything that can compute the routine for a given `(r0, r1, r7)`.
pub trait Evaluator {
    fn name(&self) -> &'static str;

    fn eval(&mut self, r0: u16, r1: u16, r7: u16) -> Result<u16>;

    /// Forget state cached by earlier calls.
    fn reset(&mut self) {}
}

// Addresses of the routine's basic blocks.
const ENTRY: u16 = 0x17a1;
const R0_NOT_ZERO: u16 = 0x17a9;
const TAIL_RET: u16 = 0x17b5;
const R1_NOT_ZERO: u16 = 0x17b6;
const AFTER_INNER: u16 = 0x17be;
const OUTER_RET: u16 = 0x17c9;
// return address of the `call 0x17a1` in the teleporter check
const CALLER: u16 = 0x1589;

#[derive(Debug, Clone, Copy)]
struct Register(usize);

const R0: Register = Register(0);
const R1: Register = Register(1);
const R7: Register = Register(7);

/// Executes the routine block by block, exactly as the bytecode does:
///
/// ```text
/// 0x17a1  jt   r0, 0x17a9
///         add  r0, r1, 1
///         ret
/// 0x17a9  jt   r1, 0x17b6
///         add  r0, r0, 0x7fff
///         set  r1, r7
///         call 0x17a1
///         ret
/// 0x17b6  push r0
///         add  r1, r1, 0x7fff
///         call 0x17a1
///         set  r1, r0
///         pop  r0
///         add  r0, r0, 0x7fff
///         call 0x17a1
///         ret
/// ```
///
/// Return addresses and the saved `r0` share one heap-allocated stack, so
/// deep recursion costs memory rather than native stack. Running time is
/// still exponential; keep the inputs tiny.
#[derive(Debug, Clone, Default)]
pub struct Machine {
    registers: [u16; 8],
    stack: Vec<u16>,
    step_limit: Option<u64>,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail instead of running more than `limit` blocks.
    pub fn with_step_limit(limit: u64) -> Self {
        Self {
            step_limit: Some(limit),
            ..Self::default()
        }
    }

    fn reg(&self, reg: Register) -> u16 {
        self.registers[reg.0]
    }

    fn set(&mut self, reg: Register, val: u16) {
        self.registers[reg.0] = val;
    }

    fn pop(&mut self) -> Result<u16> {
        self.stack
            .pop()
            .ok_or_else(|| eyre!("popped from empty stack"))
    }

    fn call(&mut self, ret: u16) -> u16 {
        self.stack.push(ret);
        ENTRY
    }

    pub fn run(&mut self, r0: u16, r1: u16, r7: u16) -> Result<u16> {
        self.registers = [0; 8];
        self.set(R0, r0 & MASK);
        self.set(R1, r1 & MASK);
        self.set(R7, r7 & MASK);
        self.stack.clear();

        let mut pc = self.call(CALLER);
        let mut steps: u64 = 0;
        loop {
            steps += 1;
            if let Some(limit) = self.step_limit {
                if steps > limit {
                    bail!("gave up on ({r0}, {r1}, {r7}) after {limit} steps");
                }
            }

            pc = match pc {
                ENTRY => {
                    if self.reg(R0) != 0 {
                        R0_NOT_ZERO
                    } else {
                        self.set(R0, add(self.reg(R1), 1));
                        self.pop()?
                    }
                }
                R0_NOT_ZERO => {
                    if self.reg(R1) != 0 {
                        R1_NOT_ZERO
                    } else {
                        self.set(R0, add(self.reg(R0), MASK));
                        self.set(R1, self.reg(R7));
                        self.call(TAIL_RET)
                    }
                }
                R1_NOT_ZERO => {
                    let saved = self.reg(R0);
                    self.stack.push(saved);
                    self.set(R1, add(self.reg(R1), MASK));
                    self.call(AFTER_INNER)
                }
                AFTER_INNER => {
                    self.set(R1, self.reg(R0));
                    let saved = self.pop()?;
                    self.set(R0, add(saved, MASK));
                    self.call(OUTER_RET)
                }
                TAIL_RET | OUTER_RET => self.pop()?,
                CALLER => return Ok(self.reg(R0)),
                addr => bail!("jumped outside the routine to 0x{addr:04x}"),
            };
        }
    }
}

impl Evaluator for Machine {
    fn name(&self) -> &'static str {
        "literal"
    }

    fn eval(&mut self, r0: u16, r1: u16, r7: u16) -> Result<u16> {
        self.run(r0, r1, r7)
    }
}

type Regs = (u16, u16, u16);

enum Next {
    Ready(u16),
    Needs(u16, u16),
}

/// The recurrence with every intermediate result cached.
///
/// The cache belongs to the instance; clear it between unrelated sweeps.
/// Pending calls live on an explicit work stack since `f(3, n)` alone
/// nests tens of thousands of calls deep.
#[derive(Debug, Clone, Default)]
pub struct Memoized {
    memo: HashMap<Regs, u16>,
}

impl Memoized {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self) -> usize {
        self.memo.len()
    }

    pub fn clear(&mut self) {
        self.memo.clear();
    }

    fn get(&self, regs: Regs) -> Option<u16> {
        self.memo.get(&regs).copied()
    }

    pub fn find(&mut self, r0: u16, r1: u16, r7: u16) -> u16 {
        let (r0, r1, r7) = (r0 & MASK, r1 & MASK, r7 & MASK);
        let mut pending = vec![(r0, r1)];
        while let Some(&(m, n)) = pending.last() {
            if self.memo.contains_key(&(m, n, r7)) {
                pending.pop();
                continue;
            }

            let next = match (m, n) {
                (0, n) => Next::Ready(add(n, 1)),
                (m, 0) => match self.get((m - 1, r7, r7)) {
                    Some(ret) => Next::Ready(ret),
                    None => Next::Needs(m - 1, r7),
                },
                (m, n) => match self.get((m, n - 1, r7)) {
                    None => Next::Needs(m, n - 1),
                    Some(inner) => match self.get((m - 1, inner, r7)) {
                        Some(ret) => Next::Ready(ret),
                        None => Next::Needs(m - 1, inner),
                    },
                },
            };

            match next {
                Next::Ready(ret) => {
                    self.memo.insert((m, n, r7), ret);
                    pending.pop();
                }
                Next::Needs(m, n) => pending.push((m, n)),
            }
        }
        self.memo[&(r0, r1, r7)]
    }
}

impl Evaluator for Memoized {
    fn name(&self) -> &'static str {
        "memoized"
    }

    fn eval(&mut self, r0: u16, r1: u16, r7: u16) -> Result<u16> {
        Ok(self.find(r0, r1, r7))
    }

    fn reset(&mut self) {
        self.clear();
    }
}

/// `(Σ q^k for k in 0..len, q^len)`, both modulo `MOD`.
fn geometric(q: u32, len: u32) -> (u32, u32) {
    if len == 0 {
        return (0, 1);
    }
    let (half_sum, half_pow) = geometric(q, len / 2);
    let sum = half_sum * (1 + half_pow) % MOD;
    let pow = half_pow * half_pow % MOD;
    if len % 2 == 1 {
        ((sum + pow) % MOD, pow * q % MOD)
    } else {
        (sum, pow)
    }
}

fn closed(r0: u16, r1: u32, r7: u32) -> u32 {
    match r0 {
        0 => (r1 + 1) % MOD,
        1 => (r7 + r1 + 1) % MOD,
        2 => (r7 * (r1 + 2) + r1 + 1) % MOD,
        // f(3, n) = (r7 + 1)·f(3, n - 1) + 2·r7 + 1 with f(3, 0) = r7² + 3·r7 + 1,
        // which solves to ((r7 + 1)^(n + 3) - 2·r7 - 1) / r7 = Σ_{k=0}^{n+2} (r7 + 1)^k - 2
        3 => {
            let (sum, _) = geometric((r7 + 1) % MOD, r1 + 3);
            (sum + MOD - 2) % MOD
        }
        m => (0..r1).fold(closed(m - 1, r7, r7), |acc, _| closed(m - 1, acc, r7)),
    }
}

/// Closed form of the routine; recursion only on `r0`.
pub fn closed_form(r0: u16, r1: u16, r7: u16) -> u16 {
    closed(r0 & MASK, u32::from(r1 & MASK), u32::from(r7 & MASK)) as u16
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClosedForm;

impl Evaluator for ClosedForm {
    fn name(&self) -> &'static str {
        "closed form"
    }

    fn eval(&mut self, r0: u16, r1: u16, r7: u16) -> Result<u16> {
        Ok(closed_form(r0, r1, r7))
    }
}

pub fn teleporter_value(r0: u16, r1: u16, r7: u16) -> u16 {
    closed_form(r0, r1, r7)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [(Regs, u16); 7] = [
        ((0, 0, 0), 1),
        ((0, 0, 1), 1),
        ((0, 1, 1), 2),
        ((1, 1, 1), 3),
        ((1, 2, 1), 4),
        ((2, 2, 1), 7),
        ((3, 1, 1), 13),
    ];

    #[test]
    fn literal_machine_runs_small_inputs() {
        let mut machine = Machine::new();
        for ((r0, r1, r7), expected) in SAMPLES {
            assert_eq!(machine.run(r0, r1, r7).unwrap(), expected, "({r0}, {r1}, {r7})");
        }
    }

    #[test]
    fn literal_machine_respects_step_limit() {
        let mut machine = Machine::with_step_limit(50);
        assert!(machine.run(0, 5, 1).is_ok());
        assert!(machine.run(3, 1, 1).is_err());
    }

    #[test]
    fn evaluators_agree_on_samples() {
        let mut memo = Memoized::new();
        for ((r0, r1, r7), expected) in SAMPLES {
            assert_eq!(memo.find(r0, r1, r7), expected);
            assert_eq!(closed_form(r0, r1, r7), expected);
        }
    }

    #[test]
    fn memoized_matches_closed_form() {
        let mut memo = Memoized::new();
        for r0 in 0..=3 {
            for r1 in 0..=20 {
                for r7 in 0..=20 {
                    assert_eq!(
                        memo.find(r0, r1, r7),
                        closed_form(r0, r1, r7),
                        "({r0}, {r1}, {r7})"
                    );
                }
            }
        }
    }

    #[test]
    fn third_level_base_case() {
        let mut memo = Memoized::new();
        for r7 in 1..=50u16 {
            let r = u32::from(r7);
            assert_eq!(u32::from(closed_form(3, 0, r7)), (r * (r + 2) + r + 1) % MOD);
            assert_eq!(closed_form(3, 0, r7), memo.find(3, 0, r7));
        }
    }

    #[test]
    fn third_level_matches_exact_division() {
        for r7 in 1..=20u128 {
            for n in 0..=20u32 {
                let cube = r7.pow(3) + 3 * r7.pow(2) + 3 * r7 + 1;
                let numerator = (r7 + 1).pow(n) * cube - 2 * r7 - 1;
                assert_eq!(numerator % r7, 0);
                let expected = (numerator / r7 % u128::from(MOD)) as u16;
                assert_eq!(closed_form(3, n as u16, r7 as u16), expected, "(3, {n}, {r7})");
            }
        }
    }

    #[test]
    fn deep_inputs_do_not_overflow_the_stack() {
        let mut memo = Memoized::new();
        assert_eq!(memo.find(4, 1, 1), 32765);
        assert_eq!(closed_form(4, 1, 1), 32765);
        memo.clear();
        assert_eq!(memo.cached(), 0);
        assert_eq!(memo.find(4, 1, 2), 13234);
        assert_eq!(closed_form(4, 1, 2), 13234);
        assert_eq!(closed_form(3, 5, 7), 4679);
    }

    #[test]
    fn inputs_are_reduced_to_fifteen_bits() {
        assert_eq!(closed_form(0, 0x8000 + 4, 0), 5);
        assert_eq!(closed_form(0, 0x7fff, 0), 0);
        assert_eq!(Memoized::new().find(1, 0x7fff, 0), 0);
        assert_eq!(teleporter_value(2, 1, 0x8001), closed_form(2, 1, 1));
    }
}
