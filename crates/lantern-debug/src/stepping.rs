//! Step-mode state machine.
//!
//! The machine is pure: it is told about trace events and operator commands
//! and answers whether execution should stop. Locking and blocking live in
//! [`crate::control`].

use crate::frame::{ancestry, frame_depth, ExecutionFrame, Location};

/// Call site a step-over was issued from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepAnchor {
    pub location: Location,
    /// Depth of the frame that was suspended at `location`.
    pub depth: u32,
}

impl StepAnchor {
    /// Whether `frame` runs inside a call made from the anchor line.
    ///
    /// Walks the caller chain up to the ancestor at the anchor's depth and
    /// compares its `(unit, line)` with the anchor. A frame at or above the
    /// anchor's depth is never nested, even when it reports the anchor line.
    #[must_use]
    pub fn encloses(&self, frame: &dyn ExecutionFrame) -> bool {
        let depth = frame_depth(frame);
        if depth <= self.depth {
            return false;
        }
        let hops = (depth - self.depth) as usize;
        ancestry(frame)
            .nth(hops)
            .is_some_and(|ancestor| self.location.matches(ancestor))
    }
}

/// The operator's condition for the next automatic stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepDirective {
    /// Only breakpoints stop execution.
    Continue,
    /// Stop at the very next line event.
    StepInto,
    /// Stop at the next line event not nested under the anchor.
    StepOver(StepAnchor),
    /// Stop at the next line event shallower than `depth`.
    StepOut { depth: u32 },
    /// Stop only at the target location.
    RunTo(Location),
}

impl StepDirective {
    #[must_use]
    pub fn is_satisfied(&self, frame: &dyn ExecutionFrame) -> bool {
        match self {
            StepDirective::Continue => false,
            StepDirective::StepInto => true,
            StepDirective::StepOver(anchor) => !anchor.encloses(frame),
            StepDirective::StepOut { depth } => frame_depth(frame) < *depth,
            StepDirective::RunTo(target) => target.matches(frame),
        }
    }
}

/// Where the current suspension happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendedAt {
    pub location: Location,
    pub depth: u32,
}

/// State of the step-mode machine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StepState {
    /// No directive armed; breakpoints alone gate stops.
    #[default]
    Idle,
    /// A directive waits for a qualifying line event.
    Armed(StepDirective),
    /// A traced flow is parked at this point.
    Suspended(SuspendedAt),
}

/// Operator commands accepted while suspended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Continue,
    StepInto,
    StepOver,
    StepOut,
    RunTo(Location),
}

/// Outcome of applying an operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// The command changed the debug state.
    Applied,
    /// The command was ignored because nothing was suspended.
    Ignored,
}

/// Why execution stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// A breakpoint matched the current line.
    Breakpoint,
    /// A step-into, step-over or step-out directive was satisfied.
    Step,
    /// The run-to target was reached.
    RunTo,
    /// First line after the session armed stop-on-entry.
    Entry,
}

impl StopReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::Breakpoint => "breakpoint",
            StopReason::Step => "step",
            StopReason::RunTo => "run-to",
            StopReason::Entry => "entry",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepMachine {
    state: StepState,
    entry_pending: bool,
}

impl StepMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &StepState {
        &self.state
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self.state, StepState::Suspended(_))
    }

    /// Arm a stop at the first line event, reported as [`StopReason::Entry`].
    ///
    /// Ignored while suspended.
    pub fn arm_entry(&mut self) -> ControlOutcome {
        if self.is_suspended() {
            return ControlOutcome::Ignored;
        }
        self.state = StepState::Armed(StepDirective::StepInto);
        self.entry_pending = true;
        ControlOutcome::Applied
    }

    /// Decide whether a line event at `frame` stops execution.
    ///
    /// A breakpoint and a satisfied directive both stop; the breakpoint wins
    /// when reporting the reason.
    #[must_use]
    pub fn evaluate(&self, frame: &dyn ExecutionFrame, breakpoint_hit: bool) -> Option<StopReason> {
        let directive = match &self.state {
            StepState::Suspended(_) => return None,
            StepState::Idle => None,
            StepState::Armed(directive) => Some(directive),
        };
        if breakpoint_hit {
            return Some(StopReason::Breakpoint);
        }
        let directive = directive?;
        if !directive.is_satisfied(frame) {
            return None;
        }
        Some(match directive {
            StepDirective::RunTo(_) => StopReason::RunTo,
            StepDirective::StepInto if self.entry_pending => StopReason::Entry,
            _ => StopReason::Step,
        })
    }

    /// Enter `Suspended`, consuming whatever directive was armed.
    pub fn suspend(&mut self, at: SuspendedAt) {
        self.state = StepState::Suspended(at);
        self.entry_pending = false;
    }

    /// Apply an operator command. Only valid while suspended.
    pub fn apply(&mut self, command: OperatorCommand) -> ControlOutcome {
        let StepState::Suspended(at) = &self.state else {
            return ControlOutcome::Ignored;
        };
        let directive = match command {
            OperatorCommand::Continue => StepDirective::Continue,
            OperatorCommand::StepInto => StepDirective::StepInto,
            OperatorCommand::StepOver => StepDirective::StepOver(StepAnchor {
                location: at.location.clone(),
                depth: at.depth,
            }),
            OperatorCommand::StepOut => StepDirective::StepOut { depth: at.depth },
            OperatorCommand::RunTo(target) => StepDirective::RunTo(target),
        };
        self.state = StepState::Armed(directive);
        ControlOutcome::Applied
    }

    /// Drop any directive or suspension.
    pub fn reset(&mut self) {
        self.state = StepState::Idle;
        self.entry_pending = false;
    }
}
