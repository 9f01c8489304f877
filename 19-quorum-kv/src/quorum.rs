//! Quorum arithmetic shared by the write and read coordinators.
//!
//! Decisions are expressed purely as counts. Peer completions arrive in no
//! particular order, so nothing here looks at which peer answered.

/// Majority of a peer set: `⌊n/2⌋ + 1`.
///
/// The coordinating node is not part of `n`, so this is a majority over
/// peers only.
pub fn majority(n: usize) -> usize {
    n / 2 + 1
}

/// How acknowledgments are compared against the quorum size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckRule {
    /// Legacy contract: succeed when `successes > needed`, fail when
    /// `failures > needed - successes`.
    ///
    /// A bare majority is not enough under this rule, and with two peers
    /// (`needed == 2`) success is structurally unreachable.
    Strict,
    /// Succeed when `successes >= needed`, fail as soon as the outstanding
    /// responses can no longer lift `successes` to `needed`.
    #[default]
    AtLeast,
}

/// Outcome of a tally at a given moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Pending,
    Reached,
    Unreachable,
}

/// Running count of acknowledgments for one coordinated operation.
#[derive(Debug, Clone)]
pub struct AckTally {
    rule: AckRule,
    needed: usize,
    expected: usize,
    successes: usize,
    failures: usize,
}

impl AckTally {
    /// `expected` is the total number of responses that can ever be recorded.
    pub fn new(rule: AckRule, needed: usize, expected: usize) -> Self {
        Self {
            rule,
            needed,
            expected,
            successes: 0,
            failures: 0,
        }
    }

    pub fn record_success(&mut self) -> Decision {
        self.successes += 1;
        self.decision()
    }

    pub fn record_failure(&mut self) -> Decision {
        self.failures += 1;
        self.decision()
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn needed(&self) -> usize {
        self.needed
    }

    /// Responses not yet recorded.
    pub fn outstanding(&self) -> usize {
        self.expected
            .saturating_sub(self.successes + self.failures)
    }

    pub fn decision(&self) -> Decision {
        let successes = self.successes as i64;
        let failures = self.failures as i64;
        let needed = self.needed as i64;
        let expected = self.expected as i64;

        match self.rule {
            AckRule::Strict => {
                if successes > needed {
                    Decision::Reached
                } else if failures > needed - successes {
                    Decision::Unreachable
                } else {
                    Decision::Pending
                }
            }
            AckRule::AtLeast => {
                if successes >= needed {
                    Decision::Reached
                } else if failures > expected - needed {
                    Decision::Unreachable
                } else {
                    Decision::Pending
                }
            }
        }
    }
}
