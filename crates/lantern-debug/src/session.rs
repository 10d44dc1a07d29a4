//! Debugging session: units, breakpoints and handlers for one run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::{info, warn};

use crate::bridge::SuspensionBridge;
use crate::config::DebuggerConfig;
use crate::control::{DebugControl, DebugStop};
use crate::error::DebugError;
use crate::handoff::FaultReport;
use crate::hook::HostRuntime;
use crate::inspect::{register_geometry_handlers, ExtensionHandler, HandlerRegistry, VariableTree};
use crate::source::{canonical_unit_path, SourceCatalog};

pub const SESSION_VERSION: u32 = 1;

/// Bookkeeping persisted between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub version: u32,
    /// Source files that were loaded, in load order.
    #[serde(default)]
    pub units: Vec<PathBuf>,
    #[serde(default)]
    pub breakpoints: BTreeMap<SmolStr, Vec<u32>>,
    /// Presentation data the debugger stores without interpreting.
    #[serde(default)]
    pub presentation: serde_json::Value,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            version: SESSION_VERSION,
            units: Vec::new(),
            breakpoints: BTreeMap::new(),
            presentation: serde_json::Value::Null,
        }
    }
}

impl SessionState {
    pub fn from_json(text: &str) -> Result<Self, DebugError> {
        let state: Self = serde_json::from_str(text)?;
        if state.version > SESSION_VERSION {
            return Err(DebugError::SessionVersion(state.version));
        }
        Ok(state)
    }

    pub fn to_json(&self) -> Result<String, DebugError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DebugError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DebugError::SessionIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DebugError> {
        let path = path.as_ref();
        let text = self.to_json()?;
        std::fs::write(path, text).map_err(|source| DebugError::SessionIo {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug)]
pub struct DebugSession {
    config: DebuggerConfig,
    control: DebugControl,
    catalog: SourceCatalog,
    unit_paths: Vec<PathBuf>,
    handlers: Arc<HandlerRegistry>,
    presentation: serde_json::Value,
}

impl DebugSession {
    /// Start a session. The handler table is initialized with the built-in
    /// geometry handlers.
    #[must_use]
    pub fn new(config: DebuggerConfig) -> Self {
        let control = DebugControl::with_filter(config.unit_filter());
        let mut handlers = HandlerRegistry::new();
        register_geometry_handlers(&mut handlers);
        info!("debug session started");
        Self {
            config,
            control,
            catalog: SourceCatalog::new(),
            unit_paths: Vec::new(),
            handlers: Arc::new(handlers),
            presentation: serde_json::Value::Null,
        }
    }

    /// Reload persisted units and breakpoints. Units that fail to load are
    /// skipped and returned as warnings.
    pub fn restore(&mut self, state: SessionState) -> Vec<DebugError> {
        let mut warnings = Vec::new();
        for path in &state.units {
            if let Err(err) = self.load_unit(path) {
                warnings.push(err);
            }
        }
        for (unit, lines) in &state.breakpoints {
            for line in lines {
                self.control.add_breakpoint(unit, *line);
            }
        }
        self.presentation = state.presentation;
        info!(
            units = self.catalog.len(),
            breakpoints = self.control.breakpoints().len(),
            "session restored"
        );
        warnings
    }

    #[must_use]
    pub fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    #[must_use]
    pub fn control(&self) -> &DebugControl {
        &self.control
    }

    #[must_use]
    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Load a unit and return its canonical id.
    pub fn load_unit(&mut self, path: impl AsRef<Path>) -> Result<SmolStr, DebugError> {
        let path = path.as_ref();
        let id: SmolStr = self.catalog.load(path)?.id().into();
        self.control.register_unit(&id);
        if !self.unit_paths.iter().any(|known| canonical_unit_path(known) == id) {
            self.unit_paths.push(path.to_path_buf());
        }
        Ok(id)
    }

    /// Unload a unit; its breakpoints are discarded.
    pub fn unload_unit(&mut self, unit: &str) {
        self.catalog.unload(unit);
        self.unit_paths.retain(|path| canonical_unit_path(path) != unit);
        self.control.unregister_unit(unit);
    }

    pub fn toggle_breakpoint(&self, unit: &str, line: u32) -> bool {
        self.control.toggle_breakpoint(unit, line)
    }

    /// Register an extension handler for trees built from now on.
    pub fn register_handler(
        &mut self,
        type_name: impl Into<SmolStr>,
        handler: impl ExtensionHandler + 'static,
    ) {
        Arc::make_mut(&mut self.handlers).register(type_name, handler);
    }

    #[must_use]
    pub fn presentation(&self) -> &serde_json::Value {
        &self.presentation
    }

    pub fn set_presentation(&mut self, presentation: serde_json::Value) {
        self.presentation = presentation;
    }

    /// Install a dispatcher on `host`.
    pub fn attach<H, B>(&self, host: &mut H, bridge: B) -> Result<(), DebugError>
    where
        H: HostRuntime + ?Sized,
        B: SuspensionBridge + 'static,
    {
        if host.is_attached() {
            return Err(DebugError::AlreadyAttached);
        }
        if self.config.stop_on_entry {
            self.control.arm_entry_stop();
        }
        host.attach(Box::new(self.control.dispatcher(bridge)));
        info!(stop_on_entry = self.config.stop_on_entry, "debugger attached");
        Ok(())
    }

    /// Detach from `host`, clear the handler table and return the state to
    /// persist.
    pub fn end<H: HostRuntime + ?Sized>(&mut self, host: &mut H) -> SessionState {
        self.control.detach();
        host.detach();
        self.handlers = Arc::new(HandlerRegistry::new());
        let state = self.state();
        info!(units = state.units.len(), "debug session ended");
        state
    }

    /// Snapshot of the persistable state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        let registry = self.control.breakpoints();
        let breakpoints = registry
            .units()
            .map(|unit| (unit.clone(), registry.lines_for(unit).into_iter().collect()))
            .collect();
        SessionState {
            version: SESSION_VERSION,
            units: self.unit_paths.clone(),
            breakpoints,
            presentation: self.presentation.clone(),
        }
    }

    /// Build the variable tree for a stopped frame.
    #[must_use]
    pub fn inspect_stop(&self, stop: &DebugStop) -> VariableTree {
        VariableTree::from_bindings(stop.locals.iter().cloned(), Arc::clone(&self.handlers))
            .with_label_width(self.config.label_width)
    }

    #[must_use]
    pub fn inspect_report(&self, report: &FaultReport) -> VariableTree {
        VariableTree::from_bindings(report.locals.iter().cloned(), Arc::clone(&self.handlers))
            .with_label_width(self.config.label_width)
    }

    /// Save to the configured session file, if any. Failures are logged.
    pub fn persist(&self, state: &SessionState) -> Option<PathBuf> {
        let path = self.config.session_file.clone()?;
        match state.save(&path) {
            Ok(()) => Some(path),
            Err(err) => {
                warn!(error = %err, "failed to save session");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ParkingBridge;
    use crate::hook::TraceHook;
    use crate::value::Value;

    #[derive(Default)]
    struct FakeHost {
        hook: Option<Box<dyn TraceHook>>,
    }

    impl HostRuntime for FakeHost {
        fn attach(&mut self, hook: Box<dyn TraceHook>) {
            self.hook = Some(hook);
        }

        fn detach(&mut self) {
            self.hook = None;
        }

        fn is_attached(&self) -> bool {
            self.hook.is_some()
        }
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("lantern-session-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn state_json_tolerates_missing_fields() {
        let state = SessionState::from_json(r#"{"version": 1}"#).unwrap();
        assert_eq!(state, SessionState::default());
        let err = SessionState::from_json(r#"{"version": 99}"#).unwrap_err();
        assert!(matches!(err, DebugError::SessionVersion(99)));
    }

    #[test]
    fn breakpoints_survive_between_sessions() {
        let dir = scratch_dir("persist");
        let script = dir.join("main.ls");
        std::fs::write(&script, "let a = 1\nprint a\n").unwrap();

        let mut host = FakeHost::default();
        let mut session = DebugSession::new(DebuggerConfig::default());
        let unit = session.load_unit(&script).unwrap();
        assert!(session.toggle_breakpoint(&unit, 2));
        session.attach(&mut host, ParkingBridge).unwrap();
        assert!(matches!(
            session.attach(&mut host, ParkingBridge),
            Err(DebugError::AlreadyAttached)
        ));
        session.set_presentation(serde_json::json!({"geometry": [0, 0, 640, 480]}));
        let state = session.end(&mut host);
        assert!(!host.is_attached());
        assert!(session.handlers().is_empty());

        let file = dir.join("session.json");
        state.save(&file).unwrap();
        let loaded = SessionState::load(&file).unwrap();
        assert_eq!(loaded, state);

        let mut next = DebugSession::new(DebuggerConfig::default());
        let warnings = next.restore(loaded);
        assert!(warnings.is_empty());
        assert!(next.control().has_breakpoint(&unit, 2));
        assert!(next.control().is_known_unit(&unit));
        assert_eq!(next.state().presentation["geometry"][2], 640);
    }

    #[test]
    fn restore_reports_missing_units() {
        let dir = scratch_dir("missing");
        let state = SessionState {
            units: vec![dir.join("gone.ls")],
            ..SessionState::default()
        };
        let mut session = DebugSession::new(DebuggerConfig::default());
        let warnings = session.restore(state);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], DebugError::SourceLoad { .. }));
        assert!(session.catalog().is_empty());
    }

    #[test]
    fn unload_discards_breakpoints() {
        let dir = scratch_dir("unload");
        let script = dir.join("lib.ls");
        std::fs::write(&script, "print 1\n").unwrap();
        let mut session = DebugSession::new(DebuggerConfig::default());
        let unit = session.load_unit(&script).unwrap();
        session.toggle_breakpoint(&unit, 1);
        session.unload_unit(&unit);
        assert!(session.state().units.is_empty());
        assert!(session.state().breakpoints.is_empty());
    }

    #[test]
    fn unload_matches_units_by_canonical_path() {
        let dir = scratch_dir("aliases");
        std::fs::write(dir.join("a.ls"), "print 1\n").unwrap();
        let mut session = DebugSession::new(DebuggerConfig::default());
        let unit = session.load_unit(dir.join("a.ls")).unwrap();
        let again = session.load_unit(dir.join(".").join("a.ls")).unwrap();
        assert_eq!(unit, again);
        assert_eq!(session.state().units.len(), 1);

        session.unload_unit(&again);
        assert!(session.state().units.is_empty());
    }

    #[test]
    fn inspect_uses_session_handlers_and_width() {
        let config = DebuggerConfig {
            label_width: 20,
            ..DebuggerConfig::default()
        };
        let mut session = DebugSession::new(config);
        session.register_handler("Marker", |_: &Value, out: &mut crate::inspect::ChildSink| {
            out.push("tag", "m");
        });
        let report = FaultReport {
            message: "boom".into(),
            frames: Vec::new(),
            locals: vec![
                ("marker".into(), crate::value::ObjectValue::new("Marker").into()),
                ("long".into(), Value::from("a fairly long string value")),
            ],
        };
        let mut tree = session.inspect_report(&report);
        let marker = tree.find(&["marker"]).unwrap();
        assert!(tree.has_children(marker));
        let long = tree.find(&["long"]).unwrap();
        assert_eq!(tree.label(long).chars().count(), 20);
    }
}
