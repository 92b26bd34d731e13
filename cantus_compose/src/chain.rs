// A first-order Markov chain over a labeled transition matrix.
//
// Rows are "from" states, columns "to" states, cells relative weights. The
// chain carries a current-state pointer; sampling moves it. Pruning with
// `erase`/`keep` restricts the reachable state set, typically to the pitches
// an instrument can actually play; the begin state always survives so the
// chain can be reset.

use crate::error::Result;
use crate::matrix::NamedMatrix;
use crate::sampling::pick_weighted;
use cantus_prng::RandomEngine;
use std::path::Path;

/// The label every trained matrix starts from.
pub const BEGIN_STATE: &str = "begin";

#[derive(Debug, Clone)]
pub struct MarkovChain {
    matrix: NamedMatrix,
    current: String,
    begin: String,
}

impl MarkovChain {
    pub fn from_matrix(matrix: NamedMatrix, begin: impl Into<String>) -> Self {
        let begin = begin.into();
        MarkovChain {
            matrix,
            current: begin.clone(),
            begin,
        }
    }

    /// Load a chain from a matrix CSV, starting at the "begin" state.
    pub fn from_csv(path: &Path) -> Result<Self> {
        Ok(MarkovChain::from_matrix(
            NamedMatrix::from_csv(path, ',')?,
            BEGIN_STATE,
        ))
    }

    pub fn state(&self) -> &str {
        &self.current
    }

    /// Restore the begin state.
    pub fn reset(&mut self) {
        self.current = self.begin.clone();
    }

    /// Sample the next state from the current row's weights, move there and
    /// return it.
    ///
    /// The current state is always a valid row label; a violation is a
    /// defect in the pruning logic, not a runtime condition.
    pub fn next(&mut self, engine: &mut dyn RandomEngine) -> String {
        assert!(
            self.matrix.is_row(&self.current),
            "current state '{}' lost its row",
            self.current
        );
        let row = self.matrix.get(&self.current);
        let idx = pick_weighted(engine, &row, |(_, w)| *w);
        self.current = row[idx].0.clone();
        self.current.clone()
    }

    /// Remove the given states from the chain entirely.
    ///
    /// The begin state is kept even if listed; the current state falls back
    /// to the begin state if it is erased.
    pub fn erase(&mut self, states: &[String]) {
        for state in states {
            if *state == self.begin {
                continue;
            }
            self.matrix.drop_row(state);
            self.matrix.drop_column(state);
        }
        if !self.matrix.is_row(&self.current) {
            self.reset();
        }
    }

    /// Remove every state that is not listed (the begin state always stays).
    pub fn keep(&mut self, states: &[String]) {
        let doomed: Vec<String> = self
            .matrix
            .row_labels()
            .into_iter()
            .chain(self.matrix.column_labels())
            .filter(|label| *label != self.begin && !states.contains(label))
            .collect();
        self.erase(&doomed);
    }
}
