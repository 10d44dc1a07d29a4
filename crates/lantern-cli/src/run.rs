//! `run` and `check` commands.

use std::io::{BufReader, IsTerminal};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use lantern_debug::inspect::render;
use lantern_debug::{
    inspector_channel, DebugSession, DebuggerConfig, FaultReport, NestedLoopBridge,
    SessionState, VariableTree,
};
use lantern_script::{parse, Interpreter};
use serde_json::json;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::console::Console;
use crate::style;

const DEFAULT_DEPTH: usize = 2;

pub fn run_check(script: &Path) -> anyhow::Result<()> {
    let parsed = lantern_script::parse_file(script)?;
    println!(
        "{}: {} function(s), {} top-level statement(s)",
        script.display(),
        parsed.functions.len(),
        parsed.body.len()
    );
    Ok(())
}

pub fn run_script(args: RunArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => DebuggerConfig::load(path)?,
        None => DebuggerConfig::default(),
    };
    if args.stop_on_entry {
        config.stop_on_entry = true;
    }
    if let Some(path) = &args.session {
        config.session_file = Some(path.clone());
    }

    let mut session = DebugSession::new(config);
    restore_session(&mut session);
    let depth = args
        .depth
        .or_else(|| presentation_depth(session.presentation()))
        .unwrap_or(DEFAULT_DEPTH);

    let mut interp = Interpreter::new().with_echo(true);
    for lib in &args.libs {
        let unit = session.load_unit(lib)?;
        interp = interp.with_library(&parse_loaded(&session, &unit)?);
    }
    let unit = session.load_unit(&args.script)?;
    for line in &args.breakpoints {
        session.control().add_breakpoint(&unit, *line);
    }
    let script = parse_loaded(&session, &unit)?;

    let (gate, receiver) = inspector_channel();
    let mut interp = interp.with_inspector(gate);
    if !args.no_debug {
        let console = Console::new(
            BufReader::new(std::io::stdin()),
            std::io::stdout(),
            session.catalog().clone(),
            Arc::new(session.handlers().clone()),
        )
        .with_label_width(session.config().label_width)
        .with_depth(depth)
        .with_color(std::io::stdout().is_terminal());
        session.attach(&mut interp, NestedLoopBridge::new(console))?;
    }

    let result = interp.run(&script);
    if result.is_err() {
        if let Some(request) = receiver.try_next() {
            let (report, handle) = request.open();
            print_fault(&session, &report, depth);
            handle.close();
        }
    }

    session.set_presentation(json!({ "variables_depth": depth }));
    let state = session.end(&mut interp);
    if let Some(path) = session.persist(&state) {
        info!(path = %path.display(), "session saved");
    }
    result.map_err(Into::into)
}

fn restore_session(session: &mut DebugSession) {
    let Some(path) = session.config().session_file.clone() else {
        return;
    };
    if !path.exists() {
        return;
    }
    match SessionState::load(&path) {
        Ok(state) => {
            for err in session.restore(state) {
                eprintln!("{}", style::warning(format!("Warning: {err}")));
            }
        }
        Err(err) => warn!(path = %path.display(), error = %err, "ignoring unreadable session"),
    }
}

fn presentation_depth(presentation: &serde_json::Value) -> Option<usize> {
    presentation
        .get("variables_depth")
        .and_then(serde_json::Value::as_u64)
        .and_then(|depth| usize::try_from(depth).ok())
}

fn parse_loaded(session: &DebugSession, unit: &str) -> anyhow::Result<lantern_script::ast::Script> {
    let source = session
        .catalog()
        .get(unit)
        .with_context(|| format!("unit {unit} is not loaded"))?;
    Ok(parse(unit, source.text())?)
}

fn print_fault(session: &DebugSession, report: &FaultReport, depth: usize) {
    eprintln!("{}", style::accent("Fault inspector"));
    for frame in report.frames.iter().rev() {
        eprintln!("  at {frame}");
    }
    let mut tree: VariableTree = session.inspect_report(report);
    for line in render(&mut tree, depth).lines() {
        eprintln!("  {}", style::variable_line(line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_is_read_from_presentation() {
        assert_eq!(presentation_depth(&json!({ "variables_depth": 4 })), Some(4));
        assert_eq!(presentation_depth(&json!({ "variables_depth": "x" })), None);
        assert_eq!(presentation_depth(&serde_json::Value::Null), None);
    }
}
