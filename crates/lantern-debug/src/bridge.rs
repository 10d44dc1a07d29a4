//! Suspension bridges: how a traced flow waits while it is suspended.

use tracing::debug;

use crate::control::DebugControl;

/// Blocks the traced control flow in place until the operator releases it.
///
/// Called from the trace dispatcher on the traced thread, with the call stack
/// intact. Must return once `control` is no longer suspended.
pub trait SuspensionBridge: Send {
    fn suspend_here(&mut self, control: &DebugControl);
}

/// Parks the traced OS thread on the control's condition variable.
///
/// Commands must come from another thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParkingBridge;

impl SuspensionBridge for ParkingBridge {
    fn suspend_here(&mut self, control: &DebugControl) {
        control.wait_until_released();
    }
}

/// Result of one pump iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    Continue,
    /// The operator is gone; detach and let the program run to completion.
    Quit,
}

/// One round of presentation work, run on the traced thread while suspended.
pub trait EventPump: Send {
    fn pump(&mut self, control: &DebugControl) -> PumpStatus;
}

impl<F> EventPump for F
where
    F: FnMut(&DebugControl) -> PumpStatus + Send,
{
    fn pump(&mut self, control: &DebugControl) -> PumpStatus {
        self(control)
    }
}

/// Runs a nested event loop on the traced thread until released.
#[derive(Debug)]
pub struct NestedLoopBridge<P> {
    pump: P,
}

impl<P: EventPump> NestedLoopBridge<P> {
    #[must_use]
    pub fn new(pump: P) -> Self {
        Self { pump }
    }

    pub fn into_inner(self) -> P {
        self.pump
    }
}

impl<P: EventPump> SuspensionBridge for NestedLoopBridge<P> {
    fn suspend_here(&mut self, control: &DebugControl) {
        let mut rounds = 0_u64;
        while control.is_suspended() {
            rounds += 1;
            if self.pump.pump(control) == PumpStatus::Quit {
                control.detach();
                break;
            }
        }
        debug!(rounds, "nested loop exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::DebugEvent;
    use crate::frame::testing::TestFrame;
    use crate::hook::{TraceEvent, TraceHook};
    use crate::stepping::ControlOutcome;

    #[test]
    fn nested_loop_runs_pump_until_released() {
        let control = DebugControl::new();
        control.register_unit("a.ls");
        control.add_breakpoint("a.ls", 3);
        let mut calls = 0;
        let mut hook = control.dispatcher(NestedLoopBridge::new(move |control: &DebugControl| {
            calls += 1;
            if calls % 3 == 0 {
                assert_eq!(control.step_into(), ControlOutcome::Applied);
            }
            PumpStatus::Continue
        }));
        hook.on_event(TraceEvent::Line, &TestFrame::root("a.ls", 3));
        assert!(!control.is_suspended());
        assert_eq!(control.drain_events().len(), 2);

        // step-into is now armed; the next line suspends again
        hook.on_event(TraceEvent::Line, &TestFrame::root("a.ls", 4));
        assert_eq!(control.last_stop().map(|stop| stop.location.line), Some(4));
    }

    #[test]
    fn quit_detaches() {
        let control = DebugControl::new();
        control.register_unit("a.ls");
        control.arm_entry_stop();
        let mut hook =
            control.dispatcher(NestedLoopBridge::new(|_: &DebugControl| PumpStatus::Quit));
        hook.on_event(TraceEvent::Line, &TestFrame::root("a.ls", 1));
        assert!(!control.is_dispatching());
        let events = control.drain_events();
        assert_eq!(events.last(), Some(&DebugEvent::Detached));
        assert!(!hook.on_event(TraceEvent::Call, &TestFrame::root("a.ls", 1)));
    }

    #[test]
    fn release_when_not_suspended_is_ignored() {
        let control = DebugControl::new();
        let mut bridge = ParkingBridge;
        bridge.suspend_here(&control);
        assert_eq!(control.continue_run(), ControlOutcome::Ignored);
    }
}
