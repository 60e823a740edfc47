use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Provisioning,
    Active,
    TearingDown,
    Done,
    Aborted,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Provisioning => "provisioning",
            Self::Active => "active",
            Self::TearingDown => "tearing_down",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// `Idle -> TearingDown` covers a wrapper instantiated after `setup` ran
/// elsewhere: it only has the published build context to work from.
pub fn validate_transition(from: LifecycleState, to: LifecycleState) -> Result<(), CoreError> {
    use LifecycleState::{Aborted, Active, Done, Idle, Provisioning, TearingDown};

    let valid = matches!(
        (from, to),
        (Idle, Provisioning | Aborted | TearingDown)
            | (Provisioning, Active | Aborted)
            | (Active, TearingDown)
            | (TearingDown, Done)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
