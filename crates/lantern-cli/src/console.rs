//! Line-oriented operator console, pumped while a script is suspended.

use std::io::{BufRead, Write};
use std::sync::Arc;

use lantern_debug::inspect::render;
use lantern_debug::{
    DebugControl, DebugEvent, DebugStop, EventPump, HandlerRegistry, PumpStatus, SourceCatalog,
    VariableTree,
};
use tracing::debug;

use crate::commands::{parse_command, ConsoleCommand, HELP};
use crate::style;

/// Source lines shown on each side of the current line by `list`.
const LIST_CONTEXT: u32 = 2;

pub struct Console<R, W> {
    input: R,
    output: W,
    sources: SourceCatalog,
    handlers: Arc<HandlerRegistry>,
    label_width: usize,
    depth: usize,
    color: bool,
    last: Option<ConsoleCommand>,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(
        input: R,
        output: W,
        sources: SourceCatalog,
        handlers: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            input,
            output,
            sources,
            handlers,
            label_width: lantern_debug::config::DEFAULT_LABEL_WIDTH,
            depth: 2,
            color: false,
            last: None,
        }
    }

    #[must_use]
    pub fn with_label_width(mut self, label_width: usize) -> Self {
        self.label_width = label_width;
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth.max(1);
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn paint(&self, text: &str, style: impl Fn(&str) -> String) -> String {
        if self.color {
            style(text)
        } else {
            text.to_string()
        }
    }

    fn announce(&mut self, stop: &DebugStop) {
        let frame = stop
            .frames
            .last()
            .map_or_else(|| stop.location.to_string(), ToString::to_string);
        let heading = format!("Stopped ({}) at {frame}", stop.reason.as_str());
        let heading = self.paint(&heading, |text| style::accent(text));
        let _ = writeln!(self.output, "{heading}");
        if let Some(text) = self.source_line(stop, stop.location.line) {
            let _ = writeln!(self.output, "{:>5} | {text}", stop.location.line);
        }
    }

    fn source_line(&self, stop: &DebugStop, line: u32) -> Option<String> {
        self.sources
            .get(&stop.location.unit)
            .and_then(|unit| unit.line(line))
            .map(str::to_string)
    }

    fn read_command(&mut self) -> Option<Result<ConsoleCommand, String>> {
        let _ = write!(self.output, "(lantern) ");
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
        if line.trim().is_empty() {
            return Some(self.last.ok_or_else(|| "no previous command".to_string()));
        }
        Some(parse_command(&line).map_err(|err| err.to_string()))
    }

    fn execute(
        &mut self,
        control: &DebugControl,
        stop: &DebugStop,
        command: ConsoleCommand,
    ) -> PumpStatus {
        let unit = stop.location.unit.as_str();
        match command {
            ConsoleCommand::Continue => {
                control.continue_run();
            }
            ConsoleCommand::StepInto => {
                control.step_into();
            }
            ConsoleCommand::StepOver => {
                control.step_over();
            }
            ConsoleCommand::StepOut => {
                control.step_out();
            }
            ConsoleCommand::RunTo(line) => {
                control.run_to(unit, line);
            }
            ConsoleCommand::Toggle(line) => {
                let action = if control.toggle_breakpoint(unit, line) {
                    "set"
                } else {
                    "cleared"
                };
                let _ = writeln!(self.output, "breakpoint {action} at {unit}:{line}");
            }
            ConsoleCommand::Backtrace => {
                for (idx, frame) in stop.frames.iter().rev().enumerate() {
                    let _ = writeln!(self.output, "  #{idx} {frame}");
                }
            }
            ConsoleCommand::Variables(depth) => {
                let mut tree = VariableTree::from_bindings(
                    stop.locals.iter().cloned(),
                    Arc::clone(&self.handlers),
                )
                .with_label_width(self.label_width);
                if stop.locals.is_empty() {
                    let _ = writeln!(self.output, "(no locals)");
                }
                for line in render(&mut tree, depth.unwrap_or(self.depth)).lines() {
                    let line = self.paint(line, style::variable_line);
                    let _ = writeln!(self.output, "{line}");
                }
            }
            ConsoleCommand::List => {
                let current = stop.location.line;
                for line in current.saturating_sub(LIST_CONTEXT).max(1)..=current + LIST_CONTEXT {
                    let Some(text) = self.source_line(stop, line) else {
                        continue;
                    };
                    let marker = if line == current { ">" } else { " " };
                    let _ = writeln!(self.output, "{marker}{line:>4} | {text}");
                }
            }
            ConsoleCommand::Help => {
                let _ = writeln!(self.output, "{HELP}");
            }
            ConsoleCommand::Quit => return PumpStatus::Quit,
        }
        PumpStatus::Continue
    }
}

impl<R: BufRead + Send, W: Write + Send> EventPump for Console<R, W> {
    fn pump(&mut self, control: &DebugControl) -> PumpStatus {
        for event in control.drain_events() {
            if let DebugEvent::Stopped(stop) = event {
                self.announce(&stop);
            }
        }
        let Some(stop) = control.snapshot() else {
            return PumpStatus::Continue;
        };
        let command = match self.read_command() {
            None => {
                debug!("console input closed");
                return PumpStatus::Quit;
            }
            Some(Ok(command)) => command,
            Some(Err(message)) => {
                let message = self.paint(&message, |text| style::error(text));
                let _ = writeln!(self.output, "{message}");
                return PumpStatus::Continue;
            }
        };
        self.last = Some(command);
        self.execute(control, &stop, command)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use lantern_debug::{DebuggerConfig, HostRuntime, NestedLoopBridge, SourceUnit};
    use lantern_script::{parse, Interpreter};

    use super::*;

    const SCRIPT: &str = "let p = new Point { x: 1, y: 2 }\nlet n = 3\nprint n\n";

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn run_with_input(input: &str) -> (String, Vec<String>) {
        let control = DebugControl::with_filter(DebuggerConfig::default().unit_filter());
        control.register_unit("main.ls");
        control.arm_entry_stop();
        let mut sources = SourceCatalog::new();
        sources.insert(SourceUnit::new("main.ls", PathBuf::from("main.ls"), SCRIPT.to_string()));
        let mut handlers = HandlerRegistry::new();
        lantern_debug::inspect::register_geometry_handlers(&mut handlers);

        let out = SharedBuf::default();
        let console = Console::new(
            Cursor::new(input.to_string()),
            out.clone(),
            sources,
            Arc::new(handlers),
        );
        let mut interp = Interpreter::new();
        interp.attach(Box::new(control.dispatcher(NestedLoopBridge::new(console))));
        interp.run(&parse("main.ls", SCRIPT).unwrap()).unwrap();

        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        (text, interp.output().to_vec())
    }

    #[test]
    fn session_walkthrough() {
        let (text, printed) = run_with_input("v\nn\nbogus\nbt\nv\nb 3\nc\n");
        assert_eq!(printed, vec!["3"]);
        assert!(text.contains("Stopped (entry) at <module> [main.ls:1]"), "{text}");
        assert!(text.contains("    1 | let p = new Point { x: 1, y: 2 }"), "{text}");
        assert!(text.contains("(no locals)"), "{text}");
        assert!(text.contains("Stopped (step) at <module> [main.ls:2]"), "{text}");
        assert!(text.contains("unknown command 'bogus' (try 'help')"), "{text}");
        assert!(text.contains("  #0 <module> [main.ls:2]"), "{text}");
        assert!(text.contains("p = {Point} <Point object>"), "{text}");
        assert!(text.contains("  wkt = {str} \"POINT (1 2)\""), "{text}");
        assert!(text.contains("breakpoint set at main.ls:3"), "{text}");
        assert!(text.contains("Stopped (breakpoint) at <module> [main.ls:3]"), "{text}");
    }

    #[test]
    fn empty_line_repeats_last_command() {
        let (text, printed) = run_with_input("n\n\nl\nq\n");
        assert_eq!(printed, vec!["3"]);
        assert!(text.contains("Stopped (step) at <module> [main.ls:3]"), "{text}");
        assert!(text.contains(">   3 | print n"), "{text}");
        assert!(text.contains("    2 | let n = 3"), "{text}");
    }
}
