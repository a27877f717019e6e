//! Checkout run state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle of one checkout run.
///
/// ```text
/// NotStarted ──► Committing ──┬──► Placed
///                             └──► Compensating ──► Failed
/// ```
///
/// A run commits stock per line; the first line that cannot be
/// committed flips the run into compensation, which releases every
/// line committed so far before the run fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    #[default]
    NotStarted,

    /// Stock commits are in flight.
    Committing,

    /// A commit failed; previously committed lines are being released.
    Compensating,

    /// All stock committed and the order placed. Terminal.
    Placed,

    /// Compensation finished after a failure. Terminal.
    Failed,
}

impl CheckoutState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Placed | CheckoutState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::NotStarted => "NotStarted",
            CheckoutState::Committing => "Committing",
            CheckoutState::Compensating => "Compensating",
            CheckoutState::Placed => "Placed",
            CheckoutState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
