//! Pipeline phases and the legal transition table.
//!
//! The pipeline is fixed and linear: INIT -> DESIGN -> BUILD -> QA ->
//! PUBLISH -> COMPLETE, with a single backward edge QA -> BUILD for the
//! fix-and-retry cycle. FAILED and CANCELLED are the other terminal
//! phases. `can_transition` is the one source of truth for legality;
//! everything else in the crate goes through it.

use serde::{Deserialize, Serialize};

/// One stage of the content-production pipeline, plus the bookend and
/// terminal markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Init,
    Design,
    Build,
    Qa,
    Publish,
    Complete,
    Failed,
    Cancelled,
}

impl Phase {
    /// All phases in pipeline order, terminal markers last.
    pub fn all() -> &'static [Phase] {
        &[
            Phase::Init,
            Phase::Design,
            Phase::Build,
            Phase::Qa,
            Phase::Publish,
            Phase::Complete,
            Phase::Failed,
            Phase::Cancelled,
        ]
    }

    /// Whether this phase has no outgoing edges.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Failed | Phase::Cancelled)
    }

    /// Whether a phase executor is invoked for this phase.
    pub fn is_executable(self) -> bool {
        matches!(
            self,
            Phase::Design | Phase::Build | Phase::Qa | Phase::Publish
        )
    }

    /// Check whether `self -> to` is a legal edge of the transition table.
    pub fn can_transition(self, to: Phase) -> bool {
        use Phase::*;

        if self.is_terminal() {
            return false;
        }
        // Any non-terminal phase may be cancelled.
        if to == Cancelled {
            return true;
        }
        match (self, to) {
            (Init, Design) => true,
            (Design, Build) => true,
            (Build, Qa) => true,
            (Qa, Publish) => true,
            // Fix-and-retry loop: QA sends work back to BUILD.
            (Qa, Build) => true,
            (Publish, Complete) => true,
            (Design | Build | Qa | Publish, Failed) => true,
            _ => false,
        }
    }

    /// The forward edge taken when this phase succeeds.
    pub fn next_on_success(self) -> Option<Phase> {
        match self {
            Phase::Init => Some(Phase::Design),
            Phase::Design => Some(Phase::Build),
            Phase::Build => Some(Phase::Qa),
            Phase::Qa => Some(Phase::Publish),
            Phase::Publish => Some(Phase::Complete),
            _ => None,
        }
    }

    /// Wire name, as persisted in state records and artifact keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Init => "INIT",
            Phase::Design => "DESIGN",
            Phase::Build => "BUILD",
            Phase::Qa => "QA",
            Phase::Publish => "PUBLISH",
            Phase::Complete => "COMPLETE",
            Phase::Failed => "FAILED",
            Phase::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INIT" => Ok(Phase::Init),
            "DESIGN" => Ok(Phase::Design),
            "BUILD" => Ok(Phase::Build),
            "QA" => Ok(Phase::Qa),
            "PUBLISH" => Ok(Phase::Publish),
            "COMPLETE" => Ok(Phase::Complete),
            "FAILED" => Ok(Phase::Failed),
            "CANCELLED" => Ok(Phase::Cancelled),
            _ => anyhow::bail!(
                "Invalid phase '{}'. Valid values: INIT, DESIGN, BUILD, QA, PUBLISH, COMPLETE, FAILED, CANCELLED",
                s
            ),
        }
    }
}
