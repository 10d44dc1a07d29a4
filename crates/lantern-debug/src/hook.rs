//! Trace hook contract between a host runtime and the debugger.

use crate::frame::ExecutionFrame;

/// Execution points reported by the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// A frame was entered. The frame is the callee.
    Call,
    /// A statement boundary is about to execute.
    Line,
    /// A frame is about to exit.
    Return,
}

/// Instrumentation callback registered with a host runtime.
pub trait TraceHook: Send {
    /// Handle one trace event.
    ///
    /// For [`TraceEvent::Call`], the result decides whether `Line` and
    /// `Return` events are delivered for the new frame. It is ignored for the
    /// other event kinds.
    fn on_event(&mut self, event: TraceEvent, frame: &dyn ExecutionFrame) -> bool;
}

/// Host runtime that can carry one trace hook at a time.
pub trait HostRuntime {
    /// Install `hook` as the execution-event source, replacing any previous one.
    fn attach(&mut self, hook: Box<dyn TraceHook>);

    /// Remove the installed hook, if any.
    fn detach(&mut self);

    /// Whether a hook is installed.
    fn is_attached(&self) -> bool;
}

/// Hook that traces everything and never stops.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTraceHook;

impl TraceHook for NoopTraceHook {
    fn on_event(&mut self, _event: TraceEvent, _frame: &dyn ExecutionFrame) -> bool {
        true
    }
}
