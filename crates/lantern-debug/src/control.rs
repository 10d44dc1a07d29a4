//! Shared debug control and trace dispatch.

use std::collections::BTreeSet;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use smol_str::SmolStr;
use tracing::{debug, info};

use crate::breakpoints::BreakpointRegistry;
use crate::bridge::SuspensionBridge;
use crate::frame::{call_chain, frame_depth, ExecutionFrame, FrameSummary, Location};
use crate::hook::{TraceEvent, TraceHook};
use crate::stepping::{
    ControlOutcome, OperatorCommand, StepMachine, StepState, StopReason, SuspendedAt,
};
use crate::value::Value;

/// Snapshot taken when a traced flow stops.
///
/// Everything is copied out of the live frame, so the snapshot stays valid
/// after the flow resumes.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugStop {
    pub reason: StopReason,
    pub location: Location,
    pub symbol: SmolStr,
    pub depth: u32,
    /// Call chain, outermost first and innermost last.
    pub frames: Vec<FrameSummary>,
    /// Locals of the suspended frame.
    pub locals: Vec<(SmolStr, Value)>,
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    Stopped(DebugStop),
    /// The suspended flow was released; drop any reference to its frame.
    Resumed,
    Detached,
}

/// Decides which source units are traced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitFilter {
    /// Trace units that were never registered with the control.
    pub trace_unknown_units: bool,
    /// Unit prefixes that are never traced.
    pub internal_prefixes: Vec<SmolStr>,
}

impl UnitFilter {
    #[must_use]
    pub fn is_internal(&self, unit: &str) -> bool {
        self.internal_prefixes
            .iter()
            .any(|prefix| unit.starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Default)]
struct DebugState {
    machine: StepMachine,
    breakpoints: BreakpointRegistry,
    known_units: BTreeSet<SmolStr>,
    filter: UnitFilter,
    dispatching: bool,
    snapshot: Option<DebugStop>,
    last_stop: Option<DebugStop>,
    event_tx: Option<Sender<DebugEvent>>,
    events: Vec<DebugEvent>,
}

impl DebugState {
    fn emit(&mut self, event: DebugEvent) {
        if let Some(sender) = &self.event_tx {
            if sender.send(event.clone()).is_ok() {
                return;
            }
            self.event_tx = None;
        }
        self.events.push(event);
    }
}

/// Shared handle over breakpoints, step state and suspension.
///
/// Operator commands and trace dispatch may run on different threads; all
/// state sits behind one mutex.
#[derive(Debug, Clone, Default)]
pub struct DebugControl {
    state: Arc<(Mutex<DebugState>, Condvar)>,
}

impl DebugControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filter(filter: UnitFilter) -> Self {
        let control = Self::new();
        control.set_filter(filter);
        control
    }

    fn lock(&self) -> MutexGuard<'_, DebugState> {
        self.state.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_filter(&self, filter: UnitFilter) {
        self.lock().filter = filter;
    }

    pub fn add_breakpoint(&self, unit: &str, line: u32) {
        self.lock().breakpoints.add(unit, line);
    }

    pub fn remove_breakpoint(&self, unit: &str, line: u32) {
        self.lock().breakpoints.remove(unit, line);
    }

    /// Flip a breakpoint. Returns whether it is now present.
    pub fn toggle_breakpoint(&self, unit: &str, line: u32) -> bool {
        self.lock().breakpoints.toggle(unit, line)
    }

    #[must_use]
    pub fn has_breakpoint(&self, unit: &str, line: u32) -> bool {
        self.lock().breakpoints.contains(unit, line)
    }

    #[must_use]
    pub fn breakpoints_for(&self, unit: &str) -> BTreeSet<u32> {
        self.lock().breakpoints.lines_for(unit)
    }

    pub fn clear_breakpoints_for(&self, unit: &str) {
        self.lock().breakpoints.clear_unit(unit);
    }

    /// Copy of the whole registry.
    #[must_use]
    pub fn breakpoints(&self) -> BreakpointRegistry {
        self.lock().breakpoints.clone()
    }

    /// Mark a unit as loaded so its frames are traced.
    pub fn register_unit(&self, unit: &str) {
        self.lock().known_units.insert(unit.into());
    }

    /// Forget a unit and discard its breakpoints.
    pub fn unregister_unit(&self, unit: &str) {
        let mut state = self.lock();
        state.known_units.remove(unit);
        state.breakpoints.clear_unit(unit);
    }

    #[must_use]
    pub fn is_known_unit(&self, unit: &str) -> bool {
        self.lock().known_units.contains(unit)
    }

    /// Whether frames of `unit` get line events.
    #[must_use]
    pub fn should_trace(&self, unit: &str) -> bool {
        let state = self.lock();
        if !state.dispatching || state.filter.is_internal(unit) {
            return false;
        }
        state.filter.trace_unknown_units || state.known_units.contains(unit)
    }

    /// Apply an operator command, releasing the suspended flow.
    pub fn apply_command(&self, command: OperatorCommand) -> ControlOutcome {
        let (_, cvar) = &*self.state;
        let mut state = self.lock();
        let outcome = state.machine.apply(command.clone());
        if outcome == ControlOutcome::Applied {
            state.snapshot = None;
            state.emit(DebugEvent::Resumed);
            cvar.notify_all();
        }
        debug!(?command, ?outcome, "operator command");
        outcome
    }

    pub fn continue_run(&self) -> ControlOutcome {
        self.apply_command(OperatorCommand::Continue)
    }

    pub fn step_into(&self) -> ControlOutcome {
        self.apply_command(OperatorCommand::StepInto)
    }

    pub fn step_over(&self) -> ControlOutcome {
        self.apply_command(OperatorCommand::StepOver)
    }

    pub fn step_out(&self) -> ControlOutcome {
        self.apply_command(OperatorCommand::StepOut)
    }

    pub fn run_to(&self, unit: &str, line: u32) -> ControlOutcome {
        self.apply_command(OperatorCommand::RunTo(Location::new(unit, line)))
    }

    /// Stop at the first traced line, before the program makes progress.
    pub fn arm_entry_stop(&self) -> ControlOutcome {
        self.lock().machine.arm_entry()
    }

    #[must_use]
    pub fn state(&self) -> StepState {
        self.lock().machine.state().clone()
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.lock().machine.is_suspended()
    }

    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.lock().dispatching
    }

    #[must_use]
    pub fn last_stop(&self) -> Option<DebugStop> {
        self.lock().last_stop.clone()
    }

    /// The current stop, present only while suspended.
    #[must_use]
    pub fn snapshot(&self) -> Option<DebugStop> {
        self.lock().snapshot.clone()
    }

    pub fn set_event_sender(&self, sender: Sender<DebugEvent>) {
        self.lock().event_tx = Some(sender);
    }

    pub fn clear_event_sender(&self) {
        self.lock().event_tx = None;
    }

    /// Events buffered while no sender was installed.
    pub fn drain_events(&self) -> Vec<DebugEvent> {
        std::mem::take(&mut self.lock().events)
    }

    /// Build a trace hook that suspends through `bridge`.
    pub fn dispatcher<B: SuspensionBridge>(&self, bridge: B) -> TraceDispatcher<B> {
        self.lock().dispatching = true;
        TraceDispatcher {
            control: self.clone(),
            bridge,
        }
    }

    /// Stop dispatching. A suspended flow is released and later events are
    /// ignored whatever directive was armed.
    pub fn detach(&self) {
        let (_, cvar) = &*self.state;
        let mut state = self.lock();
        if !state.dispatching && !state.machine.is_suspended() {
            return;
        }
        state.dispatching = false;
        state.machine.reset();
        state.snapshot = None;
        state.emit(DebugEvent::Detached);
        cvar.notify_all();
        info!("debugger detached");
    }

    /// Block the calling thread while a flow is suspended.
    pub fn wait_until_released(&self) {
        let (_, cvar) = &*self.state;
        let mut state = self.lock();
        while state.machine.is_suspended() {
            state = cvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Evaluate a line event. Returns whether the flow is now suspended.
    fn on_line(&self, frame: &dyn ExecutionFrame) -> bool {
        let mut state = self.lock();
        if !state.dispatching {
            return false;
        }
        let breakpoint_hit = state.breakpoints.contains(frame.unit(), frame.line());
        let Some(reason) = state.machine.evaluate(frame, breakpoint_hit) else {
            return false;
        };
        let location = Location::of(frame);
        let depth = frame_depth(frame);
        let stop = DebugStop {
            reason,
            location: location.clone(),
            symbol: frame.symbol().into(),
            depth,
            frames: call_chain(frame),
            locals: frame.locals(),
        };
        debug!(
            unit = %location.unit,
            line = location.line,
            depth,
            reason = reason.as_str(),
            "stop"
        );
        state.machine.suspend(SuspendedAt { location, depth });
        state.snapshot = Some(stop.clone());
        state.last_stop = Some(stop.clone());
        state.emit(DebugEvent::Stopped(stop));
        true
    }
}

/// Trace hook that consults a [`DebugControl`] and suspends through a bridge.
#[derive(Debug)]
pub struct TraceDispatcher<B> {
    control: DebugControl,
    bridge: B,
}

impl<B> TraceDispatcher<B> {
    #[must_use]
    pub fn control(&self) -> &DebugControl {
        &self.control
    }
}

impl<B: SuspensionBridge> TraceHook for TraceDispatcher<B> {
    fn on_event(&mut self, event: TraceEvent, frame: &dyn ExecutionFrame) -> bool {
        match event {
            TraceEvent::Call => {
                let traced = self.control.should_trace(frame.unit());
                if !traced {
                    debug!(unit = frame.unit(), symbol = frame.symbol(), "call not traced");
                }
                traced
            }
            TraceEvent::Line => {
                if self.control.on_line(frame) {
                    self.bridge.suspend_here(&self.control);
                }
                true
            }
            TraceEvent::Return => true,
        }
    }
}
