//! Next/previous position rules for the three order modes.
//!
//! Sequential and alphabetical share the same arithmetic (alphabetical only
//! differs in how the active list was sorted). Random walks a shuffled
//! permutation once per cycle and answers "previous" from a history stack.

use std::collections::{HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::error::SequencingError;

/// Produces permutations of `0..len` for the random order.
pub trait Shuffler: Send {
    fn permutation(&mut self, len: usize) -> Vec<usize>;
}

/// Uniform Fisher–Yates shuffle over any `rand` generator.
#[derive(Debug)]
pub struct RngShuffler<R = StdRng> {
    rng: R,
}

impl RngShuffler<StdRng> {
    /// Deterministic when a seed is given, OS-seeded otherwise.
    pub fn from_seed(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }
}

impl<R: Rng> RngShuffler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> Shuffler for RngShuffler<R> {
    fn permutation(&mut self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut self.rng);
        order
    }
}

/// Replays fixed permutations, then falls back to identity order.
///
/// Scripts whose length does not match the request are skipped.
#[derive(Debug, Default)]
pub struct ScriptedShuffler {
    scripts: VecDeque<Vec<usize>>,
}

impl ScriptedShuffler {
    pub fn new<I>(scripts: I) -> Self
    where
        I: IntoIterator<Item = Vec<usize>>,
    {
        Self {
            scripts: scripts.into_iter().collect(),
        }
    }
}

impl Shuffler for ScriptedShuffler {
    fn permutation(&mut self, len: usize) -> Vec<usize> {
        while let Some(script) = self.scripts.pop_front() {
            if script.len() == len {
                return script;
            }
        }
        (0..len).collect()
    }
}

pub fn next_sequential(current: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(match current {
        Some(index) => (index + 1) % len,
        None => 0,
    })
}

pub fn previous_sequential(current: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(match current {
        Some(index) => (index % len + len - 1) % len,
        None => len - 1,
    })
}

/// Memory for the random order: the cycle permutation, the indices already
/// shown in this cycle, and the back-navigation stack.
pub struct RandomCycle {
    order: Vec<usize>,
    used: HashSet<usize>,
    history: Vec<usize>,
    reshuffle_pending: bool,
    shuffler: Box<dyn Shuffler>,
}

impl RandomCycle {
    pub fn new(shuffler: Box<dyn Shuffler>) -> Self {
        Self {
            order: Vec::new(),
            used: HashSet::new(),
            history: Vec::new(),
            reshuffle_pending: false,
            shuffler,
        }
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn used(&self) -> &HashSet<usize> {
        &self.used
    }

    pub fn history(&self) -> &[usize] {
        &self.history
    }

    /// Forget everything; the next lookup generates a fresh permutation.
    pub fn reset(&mut self) {
        self.order.clear();
        self.used.clear();
        self.history.clear();
        self.reshuffle_pending = false;
    }

    /// Regenerate the permutation on the next lookup instead of right away.
    pub fn mark_pending(&mut self) {
        self.reshuffle_pending = true;
    }

    pub fn push_history(&mut self, index: usize) {
        self.history.push(index);
    }

    /// Pick the next index of the cycle, or `None` for an empty list.
    pub fn next(&mut self, current: Option<usize>, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }

        if self.reshuffle_pending {
            self.restart_cycle(len);
            // The switch itself should not bring the visible image straight back.
            if let Some(current) = current.filter(|index| *index < len) {
                self.used.insert(current);
            }
        } else if self.order.len() != len {
            if !self.order.is_empty() {
                let err = SequencingError::StaleRandomState {
                    expected: len,
                    found: self.order.len(),
                };
                warn!(error = %err, "regenerating random order");
            }
            self.restart_cycle(len);
            let first = self.order[0];
            self.used.insert(first);
            return Some(first);
        }

        if self.used.len() >= len {
            debug!(images = len, "random cycle complete; reshuffling");
            self.restart_cycle(len);
        }

        let next = match self.order.iter().copied().find(|i| !self.used.contains(i)) {
            Some(index) => index,
            None => {
                warn!(
                    used = self.used.len(),
                    images = len,
                    "random cycle has no unused index; restarting"
                );
                self.restart_cycle(len);
                self.order[0]
            }
        };
        self.used.insert(next);
        Some(next)
    }

    /// Step back through the history stack, falling back to the sequential
    /// predecessor once it runs dry.
    pub fn previous(&mut self, current: Option<usize>, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        if self.reshuffle_pending {
            // History belongs to an earlier random session.
            self.history.clear();
        }
        if current.is_some() && self.history.last().copied() == current {
            self.history.pop();
        }
        while let Some(index) = self.history.pop() {
            if index < len {
                return Some(index);
            }
        }
        previous_sequential(current, len)
    }

    /// Start a new cycle at `index`: it leads the permutation and is the only
    /// used entry.
    pub fn restart_from(&mut self, index: usize, len: usize) {
        if index >= len {
            return;
        }
        self.restart_cycle(len);
        if let Some(pos) = self.order.iter().position(|i| *i == index) {
            let forced = self.order.remove(pos);
            self.order.insert(0, forced);
        }
        self.used.insert(index);
    }

    fn restart_cycle(&mut self, len: usize) {
        let mut order = self.shuffler.permutation(len);
        if !is_permutation(&order, len) {
            warn!(
                len,
                got = order.len(),
                "shuffler returned an invalid permutation; using identity order"
            );
            order = (0..len).collect();
        }
        self.order = order;
        self.used.clear();
        self.history.clear();
        self.reshuffle_pending = false;
    }
}

fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &index in order {
        match seen.get_mut(index) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}
