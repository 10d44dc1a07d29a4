use std::cell::Cell;
use std::sync::mpsc::{channel, Receiver};
use std::thread;
use std::time::Duration;

use lantern_debug::{
    DebugControl, DebugEvent, DebugStop, ExecutionFrame, Location, ParkingBridge, StopReason,
    TraceEvent, TraceHook, UnitFilter, Value,
};
use smol_str::SmolStr;

const TIMEOUT: Duration = Duration::from_millis(500);

/// Replayable program: line statements and nested calls.
#[derive(Clone)]
enum Op {
    Line(u32),
    Call(&'static str, &'static str, Vec<Op>),
}

struct SimFrame<'a> {
    unit: &'static str,
    symbol: &'static str,
    line: Cell<u32>,
    caller: Option<&'a SimFrame<'a>>,
}

impl ExecutionFrame for SimFrame<'_> {
    fn unit(&self) -> &str {
        self.unit
    }

    fn line(&self) -> u32 {
        self.line.get()
    }

    fn symbol(&self) -> &str {
        self.symbol
    }

    fn locals(&self) -> Vec<(SmolStr, Value)> {
        vec![("line".into(), Value::Int(i64::from(self.line.get())))]
    }

    fn caller(&self) -> Option<&dyn ExecutionFrame> {
        self.caller.map(|frame| frame as &dyn ExecutionFrame)
    }
}

fn play(hook: &mut dyn TraceHook, frame: &SimFrame<'_>, ops: &[Op], traced: bool) {
    for op in ops {
        match op {
            Op::Line(line) => {
                frame.line.set(*line);
                if traced {
                    hook.on_event(TraceEvent::Line, frame);
                }
            }
            Op::Call(unit, symbol, body) => {
                let first = body.iter().find_map(|op| match op {
                    Op::Line(line) => Some(*line),
                    Op::Call(..) => None,
                });
                let callee = SimFrame {
                    unit: *unit,
                    symbol: *symbol,
                    line: Cell::new(first.unwrap_or(0)),
                    caller: Some(frame),
                };
                let traced = hook.on_event(TraceEvent::Call, &callee);
                play(hook, &callee, body, traced);
                if traced {
                    hook.on_event(TraceEvent::Return, &callee);
                }
            }
        }
    }
}

fn run_module(control: &DebugControl, unit: &'static str, ops: Vec<Op>) -> thread::JoinHandle<()> {
    let mut hook = control.dispatcher(ParkingBridge);
    thread::spawn(move || {
        let module = SimFrame {
            unit,
            symbol: "<module>",
            line: Cell::new(1),
            caller: None,
        };
        let traced = hook.on_event(TraceEvent::Call, &module);
        play(&mut hook, &module, &ops, traced);
    })
}

fn next_stop(rx: &Receiver<DebugEvent>) -> DebugStop {
    loop {
        match rx.recv_timeout(TIMEOUT).expect("debug event") {
            DebugEvent::Stopped(stop) => return stop,
            DebugEvent::Resumed => {}
            DebugEvent::Detached => panic!("unexpected detach"),
        }
    }
}

fn assert_no_stop(rx: &Receiver<DebugEvent>) {
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, DebugEvent::Stopped(_)), "unexpected {event:?}");
    }
}

fn control_for(unit: &str) -> (DebugControl, Receiver<DebugEvent>) {
    let control = DebugControl::new();
    control.register_unit(unit);
    let (tx, rx) = channel();
    control.set_event_sender(tx);
    (control, rx)
}

#[test]
fn breakpoint_then_continue_runs_to_completion() {
    let (control, rx) = control_for("A");
    control.toggle_breakpoint("A", 5);
    let ops = (1..=20).map(Op::Line).collect();
    let handle = run_module(&control, "A", ops);

    let stop = next_stop(&rx);
    assert_eq!(stop.reason, StopReason::Breakpoint);
    assert_eq!(stop.location, Location::new("A", 5));
    assert_eq!(stop.locals, vec![(SmolStr::from("line"), Value::Int(5))]);
    assert!(control.is_suspended());

    control.continue_run();
    handle.join().unwrap();
    assert_no_stop(&rx);
    assert!(!control.is_suspended());
}

#[test]
fn step_over_skips_three_deep_call() {
    let (control, rx) = control_for("U");
    control.toggle_breakpoint("U", 10);
    let nested = Op::Call(
        "U",
        "outer",
        vec![
            Op::Line(2),
            Op::Call(
                "U",
                "middle",
                vec![Op::Line(4), Op::Call("U", "inner", vec![Op::Line(7), Op::Line(8)])],
            ),
            Op::Line(3),
        ],
    );
    let handle = run_module(&control, "U", vec![Op::Line(10), nested, Op::Line(11), Op::Line(12)]);

    let stop = next_stop(&rx);
    assert_eq!((stop.location.line, stop.depth), (10, 1));
    control.step_over();

    let stop = next_stop(&rx);
    assert_eq!(stop.reason, StopReason::Step);
    assert_eq!((stop.location.line, stop.depth), (11, 1));

    control.continue_run();
    handle.join().unwrap();
    assert_no_stop(&rx);
}

#[test]
fn step_out_waits_for_shallower_frame() {
    let (control, rx) = control_for("A");
    control.toggle_breakpoint("A", 5);
    let callee = Op::Call(
        "A",
        "work",
        vec![
            Op::Line(4),
            Op::Line(5),
            Op::Call("A", "helper", vec![Op::Line(8)]),
            Op::Line(6),
        ],
    );
    let handle = run_module(
        &control,
        "A",
        vec![Op::Line(12), callee.clone(), Op::Line(13), callee, Op::Line(14)],
    );

    let stop = next_stop(&rx);
    assert_eq!((stop.location.line, stop.depth), (5, 2));
    let symbols: Vec<_> = stop.frames.iter().map(|frame| frame.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["<module>", "work"]);

    control.step_out();
    let stop = next_stop(&rx);
    assert_eq!(stop.reason, StopReason::Step);
    assert_eq!((stop.location.line, stop.depth), (13, 1));

    // breakpoint at 5 fires again in the second call
    control.continue_run();
    let stop = next_stop(&rx);
    assert_eq!(stop.reason, StopReason::Breakpoint);
    control.continue_run();
    handle.join().unwrap();
}

#[test]
fn run_to_ignores_other_lines() {
    let (control, rx) = control_for("U");
    control.arm_entry_stop();
    let ops = (1..=50).map(Op::Line).collect();
    let handle = run_module(&control, "U", ops);

    let stop = next_stop(&rx);
    assert_eq!(stop.reason, StopReason::Entry);
    assert_eq!(stop.location.line, 1);

    control.run_to("U", 42);
    let stop = next_stop(&rx);
    assert_eq!(stop.reason, StopReason::RunTo);
    assert_eq!(stop.location, Location::new("U", 42));

    control.continue_run();
    handle.join().unwrap();
    assert_no_stop(&rx);
}

#[test]
fn untraced_units_never_stop() {
    let (control, rx) = control_for("main");
    control.set_filter(UnitFilter {
        trace_unknown_units: false,
        internal_prefixes: vec!["<internal>".into()],
    });
    control.toggle_breakpoint("lib", 2);
    control.toggle_breakpoint("<internal>/prelude", 1);
    let ops = vec![
        Op::Line(1),
        Op::Call("lib", "helper", vec![Op::Line(2)]),
        Op::Call("<internal>/prelude", "max", vec![Op::Line(1)]),
        Op::Line(2),
    ];
    control.toggle_breakpoint("main", 2);
    let handle = run_module(&control, "main", ops);

    let stop = next_stop(&rx);
    assert_eq!(stop.location, Location::new("main", 2));
    control.continue_run();
    handle.join().unwrap();
    assert_no_stop(&rx);
}

#[test]
fn step_into_enters_traced_callee() {
    let (control, rx) = control_for("A");
    control.toggle_breakpoint("A", 1);
    let ops = vec![Op::Line(1), Op::Call("A", "f", vec![Op::Line(7)]), Op::Line(2)];
    let handle = run_module(&control, "A", ops);

    next_stop(&rx);
    control.step_into();
    // line 1 has no further statements; the next line event is inside f
    let stop = next_stop(&rx);
    assert_eq!((stop.symbol.as_str(), stop.location.line, stop.depth), ("f", 7, 2));
    control.step_into();
    let stop = next_stop(&rx);
    assert_eq!((stop.location.line, stop.depth), (2, 1));
    control.continue_run();
    handle.join().unwrap();
}
