//! Execution frame view and call-chain helpers.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::value::Value;

/// A live activation record owned by the host runtime.
///
/// The debugger borrows frames for the duration of a single trace event and
/// never keeps a reference past it.
pub trait ExecutionFrame {
    /// Canonical identity of the source unit executing in this frame.
    fn unit(&self) -> &str;

    /// Current line (1-based).
    fn line(&self) -> u32;

    /// Name of the function or module running in this frame.
    fn symbol(&self) -> &str;

    /// Snapshot of the local bindings.
    fn locals(&self) -> Vec<(SmolStr, Value)>;

    /// The calling frame, if any.
    fn caller(&self) -> Option<&dyn ExecutionFrame>;
}

/// A `(unit, line)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub unit: SmolStr,
    pub line: u32,
}

impl Location {
    #[must_use]
    pub fn new(unit: impl Into<SmolStr>, line: u32) -> Self {
        Self {
            unit: unit.into(),
            line,
        }
    }

    #[must_use]
    pub fn of(frame: &dyn ExecutionFrame) -> Self {
        Self::new(frame.unit(), frame.line())
    }

    #[must_use]
    pub fn matches(&self, frame: &dyn ExecutionFrame) -> bool {
        self.line == frame.line() && self.unit == frame.unit()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.unit, self.line)
    }
}

/// One entry of a call-chain summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub unit: SmolStr,
    pub line: u32,
    pub symbol: SmolStr,
}

impl FrameSummary {
    #[must_use]
    pub fn of(frame: &dyn ExecutionFrame) -> Self {
        Self {
            unit: frame.unit().into(),
            line: frame.line(),
            symbol: frame.symbol().into(),
        }
    }

    #[must_use]
    pub fn location(&self) -> Location {
        Location::new(self.unit.clone(), self.line)
    }
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = std::path::Path::new(self.unit.as_str())
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(self.unit.as_str());
        write!(f, "{} [{}:{}]", self.symbol, name, self.line)
    }
}

/// Iterate a frame and its callers, innermost first.
pub fn ancestry<'a>(frame: &'a dyn ExecutionFrame) -> impl Iterator<Item = &'a dyn ExecutionFrame> {
    std::iter::successors(Some(frame), |current| current.caller())
}

/// Number of frames from `frame` to the root of the call chain, inclusive.
///
/// Recomputed on every call; the chain is never cached.
#[must_use]
pub fn frame_depth(frame: &dyn ExecutionFrame) -> u32 {
    let count = ancestry(frame).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Call-chain summary, outermost first and innermost last.
#[must_use]
pub fn call_chain(frame: &dyn ExecutionFrame) -> Vec<FrameSummary> {
    let mut chain: Vec<FrameSummary> = ancestry(frame).map(FrameSummary::of).collect();
    chain.reverse();
    chain
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stand-alone linked frames for unit tests.

    use super::*;

    pub(crate) struct TestFrame<'a> {
        pub unit: &'static str,
        pub line: u32,
        pub symbol: &'static str,
        pub locals: Vec<(SmolStr, Value)>,
        pub caller: Option<&'a TestFrame<'a>>,
    }

    impl<'a> TestFrame<'a> {
        pub(crate) fn root(unit: &'static str, line: u32) -> Self {
            Self {
                unit,
                line,
                symbol: "<module>",
                locals: Vec::new(),
                caller: None,
            }
        }

        pub(crate) fn call(&'a self, unit: &'static str, line: u32, symbol: &'static str) -> Self {
            Self {
                unit,
                line,
                symbol,
                locals: Vec::new(),
                caller: Some(self),
            }
        }
    }

    impl ExecutionFrame for TestFrame<'_> {
        fn unit(&self) -> &str {
            self.unit
        }

        fn line(&self) -> u32 {
            self.line
        }

        fn symbol(&self) -> &str {
            self.symbol
        }

        fn locals(&self) -> Vec<(SmolStr, Value)> {
            self.locals.clone()
        }

        fn caller(&self) -> Option<&dyn ExecutionFrame> {
            self.caller.map(|frame| frame as &dyn ExecutionFrame)
        }
    }
}
