use serde::{Deserialize, Serialize};

/// Pipeline phases in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Source,
    Parse,
    DetectType,
    StructuralFollowups,
    SkillAssessment,
    SectorFollowups,
    Polish,
    Render,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Source,
        Phase::Parse,
        Phase::DetectType,
        Phase::StructuralFollowups,
        Phase::SkillAssessment,
        Phase::SectorFollowups,
        Phase::Polish,
        Phase::Render,
    ];

    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Source => Some(Phase::Parse),
            Phase::Parse => Some(Phase::DetectType),
            Phase::DetectType => Some(Phase::StructuralFollowups),
            Phase::StructuralFollowups => Some(Phase::SkillAssessment),
            Phase::SkillAssessment => Some(Phase::SectorFollowups),
            Phase::SectorFollowups => Some(Phase::Polish),
            Phase::Polish => Some(Phase::Render),
            Phase::Render => None,
        }
    }

    pub fn prev(self) -> Option<Phase> {
        Phase::ALL.iter().copied().take_while(|p| *p != self).last()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Source => "source",
            Phase::Parse => "parse",
            Phase::DetectType => "detect_type",
            Phase::StructuralFollowups => "structural_followups",
            Phase::SkillAssessment => "skill_assessment",
            Phase::SectorFollowups => "sector_followups",
            Phase::Polish => "polish",
            Phase::Render => "render",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Phase::Render
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("phase '{0}' is terminal")]
    Terminal(Phase),

    #[error("phase '{0}' is the first phase")]
    AtStart(Phase),

    #[error("upload can only be skipped from 'source', current phase is '{0}'")]
    SkipUploadNotAllowed(Phase),

    #[error("improvement loop can only start from 'polish', current phase is '{0}'")]
    NotPolishing(Phase),

    #[error("improvement loop limit of {0} reached")]
    LoopLimitReached(u32),
}

/// Holds the current phase. Moves forward one step at a time; the only backward
/// move is the score-driven improvement loop from `Polish` to `SectorFollowups`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMachine {
    current: Phase,
    improve_loops: u32,
    max_improve_loops: u32,
}

impl PhaseMachine {
    pub fn new(max_improve_loops: u32) -> Self {
        Self {
            current: Phase::Source,
            improve_loops: 0,
            max_improve_loops,
        }
    }

    /// Restores a machine at `phase`, e.g. from a saved draft.
    pub fn resume_at(phase: Phase, improve_loops: u32, max_improve_loops: u32) -> Self {
        Self {
            current: phase,
            improve_loops,
            max_improve_loops,
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn improve_loops(&self) -> u32 {
        self.improve_loops
    }

    pub fn next(&mut self) -> Result<Phase, TransitionError> {
        let next = self.current.next().ok_or(TransitionError::Terminal(self.current))?;
        self.current = next;
        Ok(next)
    }

    /// Steps back exactly one phase.
    pub fn prev(&mut self) -> Result<Phase, TransitionError> {
        let prev = self.current.prev().ok_or(TransitionError::AtStart(self.current))?;
        self.current = prev;
        Ok(prev)
    }

    /// Bypasses `Parse` when the user has no source document.
    pub fn skip_upload(&mut self) -> Result<Phase, TransitionError> {
        if self.current != Phase::Source {
            return Err(TransitionError::SkipUploadNotAllowed(self.current));
        }
        self.current = Phase::DetectType;
        Ok(self.current)
    }

    pub fn can_reenter(&self) -> bool {
        self.current == Phase::Polish && self.improve_loops < self.max_improve_loops
    }

    /// Re-enters `SectorFollowups` for another round of questions before polishing again.
    pub fn reenter_for_improvement(&mut self) -> Result<Phase, TransitionError> {
        if self.current != Phase::Polish {
            return Err(TransitionError::NotPolishing(self.current));
        }
        if self.improve_loops >= self.max_improve_loops {
            return Err(TransitionError::LoopLimitReached(self.max_improve_loops));
        }
        self.improve_loops += 1;
        // Polish always sits right after SectorFollowups.
        self.prev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_walks_every_phase_in_order() {
        let mut machine = PhaseMachine::new(2);
        let mut seen = vec![machine.current()];
        while let Ok(p) = machine.next() {
            seen.push(p);
        }
        assert_eq!(seen, Phase::ALL.to_vec());
        assert_eq!(machine.next(), Err(TransitionError::Terminal(Phase::Render)));
    }

    #[test]
    fn test_prev_is_inverse_of_next() {
        for phase in Phase::ALL {
            if let Some(next) = phase.next() {
                assert_eq!(next.prev(), Some(phase));
            }
        }
        assert_eq!(Phase::Source.prev(), None);
    }

    #[test]
    fn test_machine_prev_steps_back_one_phase() {
        let mut machine = PhaseMachine::resume_at(Phase::Parse, 0, 2);
        assert_eq!(machine.prev(), Ok(Phase::Source));
        assert_eq!(machine.prev(), Err(TransitionError::AtStart(Phase::Source)));
        assert_eq!(machine.current(), Phase::Source);
        assert_eq!(machine.improve_loops(), 0);
    }

    #[test]
    fn test_skip_upload_only_from_source() {
        let mut machine = PhaseMachine::new(2);
        assert_eq!(machine.skip_upload(), Ok(Phase::DetectType));
        assert_eq!(
            machine.skip_upload(),
            Err(TransitionError::SkipUploadNotAllowed(Phase::DetectType))
        );
    }

    #[test]
    fn test_improvement_loop_is_capped() {
        let mut machine = PhaseMachine::resume_at(Phase::Polish, 0, 2);
        assert!(machine.can_reenter());
        assert_eq!(machine.reenter_for_improvement(), Ok(Phase::SectorFollowups));
        assert_eq!(machine.next(), Ok(Phase::Polish));
        assert_eq!(machine.reenter_for_improvement(), Ok(Phase::SectorFollowups));
        machine.next().unwrap();
        assert!(!machine.can_reenter());
        assert_eq!(machine.reenter_for_improvement(), Err(TransitionError::LoopLimitReached(2)));
        assert_eq!(machine.improve_loops(), 2);
    }

    #[test]
    fn test_reentry_only_from_polish() {
        let mut machine = PhaseMachine::resume_at(Phase::SkillAssessment, 0, 2);
        assert_eq!(
            machine.reenter_for_improvement(),
            Err(TransitionError::NotPolishing(Phase::SkillAssessment))
        );
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        assert_eq!(serde_json::to_value(Phase::DetectType).unwrap(), "detect_type");
        assert_eq!(Phase::StructuralFollowups.to_string(), "structural_followups");
    }
}
