//! `lantern-debug` - in-process trace debugger core.
//!
//! A host runtime reports `Call`/`Line`/`Return` events to a
//! [`TraceDispatcher`]. The dispatcher checks the [`BreakpointRegistry`] and
//! the step-mode [`StepMachine`], and parks the traced flow through a
//! [`SuspensionBridge`] until the operator issues a command on the shared
//! [`DebugControl`]. While suspended, the frame's locals are inspected
//! through a lazily populated [`VariableTree`].

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

/// Per-unit breakpoint lines.
pub mod breakpoints;
/// Suspension bridges.
pub mod bridge;
/// Debugger configuration.
pub mod config;
/// Shared control handle and trace dispatcher.
pub mod control;
/// Debugger errors.
pub mod error;
/// Execution frames and call-chain helpers.
pub mod frame;
/// Cross-thread inspector hand-off.
pub mod handoff;
/// Trace hook contract.
pub mod hook;
/// Variable introspection.
pub mod inspect;
/// Debugging sessions and persisted state.
pub mod session;
/// Source units.
pub mod source;
/// Step-mode state machine.
pub mod stepping;
/// Inspection value model.
pub mod value;

pub use breakpoints::BreakpointRegistry;
pub use bridge::{EventPump, NestedLoopBridge, ParkingBridge, PumpStatus, SuspensionBridge};
pub use config::DebuggerConfig;
pub use control::{DebugControl, DebugEvent, DebugStop, TraceDispatcher, UnitFilter};
pub use error::DebugError;
pub use frame::{call_chain, frame_depth, ExecutionFrame, FrameSummary, Location};
pub use handoff::{
    inspector_channel, FaultReport, InspectorGate, InspectorHandle, InspectorReceiver,
    InspectorRequest,
};
pub use hook::{HostRuntime, NoopTraceHook, TraceEvent, TraceHook};
pub use inspect::{HandlerRegistry, NodeId, VariableTree};
pub use session::{DebugSession, SessionState};
pub use source::{canonical_unit_path, SourceCatalog, SourceUnit};
pub use stepping::{
    ControlOutcome, OperatorCommand, StepDirective, StepMachine, StepState, StopReason,
};
pub use value::{ObjectValue, Value};
