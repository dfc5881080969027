//! Automaton constraints over Boolean sequences.
//!
//! Several scheduling rules are most naturally stated as small DFAs over a
//! resident's per-block indicator sequence: fixed-length runs, and
//! "one contiguous stretch, no re-entry". The builder API is purely
//! linear, so [`add_automaton`] compiles a DFA into unrolled state
//! Booleans with one implication per transition: each step carries exactly
//! one state, undefined transitions are forbidden, and the final step must
//! land in an accepting state.

use super::{bool_sum, ModelContext};
use cp_sat::builder::{BoolVar, LinearExpr};

/// A deterministic finite automaton over the alphabet {0, 1}.
#[derive(Debug, Clone)]
pub struct Dfa {
    pub num_states: usize,
    pub initial: usize,
    pub accepting: Vec<usize>,
    /// (from_state, symbol, to_state); at most one transition per
    /// (from_state, symbol)
    pub transitions: Vec<(usize, u8, usize)>,
}

impl Dfa {
    /// The fixed-run-length machine for runs of exactly `d` consecutive
    /// blocks: states {INIT, 1..d, TERM}, accepting {INIT, TERM}.
    ///
    /// A streak must reach length `d` and then see a 0 before the year
    /// ends or another streak begins.
    pub fn run_length(d: i64) -> Dfa {
        let d = d as usize;
        let init = 0;
        let term = d + 1;
        let mut transitions = vec![(init, 0, init), (init, 1, 1)];
        for i in 1..d {
            transitions.push((i, 1, i + 1));
        }
        transitions.push((d, 0, term));
        transitions.push((term, 0, term));
        transitions.push((term, 1, 1));
        Dfa {
            num_states: d + 2,
            initial: init,
            accepting: vec![init, term],
            transitions,
        }
    }

    /// The three-state no-re-entry machine: once an indicator run ends it
    /// may never restart. All states accept.
    pub fn no_reentry() -> Dfa {
        Dfa {
            num_states: 3,
            initial: 0,
            accepting: vec![0, 1, 2],
            transitions: vec![(0, 0, 0), (0, 1, 1), (1, 1, 1), (1, 0, 2), (2, 0, 2)],
        }
    }

    fn next_state(&self, from: usize, symbol: u8) -> Option<usize> {
        self.transitions
            .iter()
            .find(|&&(q, v, _)| q == from && v == symbol)
            .map(|&(_, _, q2)| q2)
    }

    /// Runs the machine over a word; true when the word is accepted.
    pub fn accepts(&self, word: &[bool]) -> bool {
        let mut state = self.initial;
        for &bit in word {
            match self.next_state(state, bit as u8) {
                Some(next) => state = next,
                None => return false,
            }
        }
        self.accepting.contains(&state)
    }
}

/// Constrains `sequence` to be accepted by `dfa`.
///
/// One Boolean per (step, state); exactly one state per step; the initial
/// state is fixed; every defined transition implies its successor state
/// and every undefined transition is banned; the accepting-state sum at
/// the last step must be 1.
pub fn add_automaton(ctx: &mut ModelContext, sequence: &[BoolVar], dfa: &Dfa) {
    let steps = sequence.len();

    let states: Vec<Vec<BoolVar>> = (0..=steps)
        .map(|_| (0..dfa.num_states).map(|_| ctx.model.new_bool_var()).collect())
        .collect();

    for layer in &states {
        ctx.model.add_eq(bool_sum(layer.iter()), LinearExpr::from(1));
    }
    ctx.model.add_eq(
        LinearExpr::from(states[0][dfa.initial].clone()),
        LinearExpr::from(1),
    );

    for (t, symbol_var) in sequence.iter().enumerate() {
        for q in 0..dfa.num_states {
            for symbol in [0u8, 1u8] {
                let literal = if symbol == 1 {
                    LinearExpr::from(symbol_var.clone())
                } else {
                    LinearExpr::from(1) - symbol_var.clone()
                };
                match dfa.next_state(q, symbol) {
                    Some(q2) => {
                        // state[t][q] and symbol together force state[t+1][q2]
                        ctx.model.add_ge(
                            LinearExpr::from(states[t + 1][q2].clone()),
                            LinearExpr::from(states[t][q].clone()) + literal
                                - LinearExpr::from(1),
                        );
                    }
                    None => {
                        ctx.model.add_le(
                            LinearExpr::from(states[t][q].clone()) + literal,
                            LinearExpr::from(1),
                        );
                    }
                }
            }
        }
    }

    let accepting_vars: Vec<&BoolVar> = dfa.accepting.iter().map(|&q| &states[steps][q]).collect();
    ctx.model.add_ge(
        bool_sum(accepting_vars.into_iter()),
        LinearExpr::from(1),
    );
}
