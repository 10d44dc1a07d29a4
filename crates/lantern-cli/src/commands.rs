//! Operator console command parsing.

use anyhow::{anyhow, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Continue,
    StepInto,
    StepOver,
    StepOut,
    /// Run to a line of the current unit.
    RunTo(u32),
    /// Toggle a breakpoint in the current unit.
    Toggle(u32),
    Backtrace,
    Variables(Option<usize>),
    List,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Whether the command releases the suspended flow.
    pub fn resumes(self) -> bool {
        matches!(
            self,
            ConsoleCommand::Continue
                | ConsoleCommand::StepInto
                | ConsoleCommand::StepOver
                | ConsoleCommand::StepOut
                | ConsoleCommand::RunTo(_)
        )
    }
}

pub const HELP: &str = "\
commands:
  c, continue        resume until the next breakpoint
  s, step            step into
  n, next            step over
  o, out             step out
  r, run LINE        run to LINE in the current unit
  b, break LINE      toggle a breakpoint in the current unit
  bt, where          show the call chain
  v, vars [DEPTH]    show local variables
  l, list            show source around the current line
  q, quit            detach and let the script finish
  h, help            show this help";

pub fn parse_command(input: &str) -> anyhow::Result<ConsoleCommand> {
    let mut parts = input.split_whitespace();
    let Some(word) = parts.next() else {
        bail!("empty command");
    };
    let arg = parts.next();
    if parts.next().is_some() {
        bail!("too many arguments");
    }
    let command = match word {
        "c" | "continue" => ConsoleCommand::Continue,
        "s" | "step" => ConsoleCommand::StepInto,
        "n" | "next" => ConsoleCommand::StepOver,
        "o" | "out" => ConsoleCommand::StepOut,
        "r" | "run" => ConsoleCommand::RunTo(line_arg(arg)?),
        "b" | "break" => ConsoleCommand::Toggle(line_arg(arg)?),
        "bt" | "where" => ConsoleCommand::Backtrace,
        "v" | "vars" => ConsoleCommand::Variables(
            arg.map(|depth| depth.parse().map_err(|_| anyhow!("invalid depth '{depth}'")))
                .transpose()?,
        ),
        "l" | "list" => ConsoleCommand::List,
        "h" | "help" | "?" => ConsoleCommand::Help,
        "q" | "quit" => ConsoleCommand::Quit,
        other => bail!("unknown command '{other}' (try 'help')"),
    };
    let takes_arg = matches!(
        command,
        ConsoleCommand::RunTo(_) | ConsoleCommand::Toggle(_) | ConsoleCommand::Variables(_)
    );
    if arg.is_some() && !takes_arg {
        bail!("'{word}' takes no argument");
    }
    Ok(command)
}

fn line_arg(arg: Option<&str>) -> anyhow::Result<u32> {
    let Some(arg) = arg else {
        bail!("missing line number");
    };
    match arg.parse::<u32>() {
        Ok(line) if line > 0 => Ok(line),
        _ => bail!("invalid line number '{arg}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_forms() {
        assert_eq!(parse_command("c").unwrap(), ConsoleCommand::Continue);
        assert_eq!(parse_command(" next ").unwrap(), ConsoleCommand::StepOver);
        assert_eq!(parse_command("r 42").unwrap(), ConsoleCommand::RunTo(42));
        assert_eq!(parse_command("break 7").unwrap(), ConsoleCommand::Toggle(7));
        assert_eq!(parse_command("v").unwrap(), ConsoleCommand::Variables(None));
        assert_eq!(parse_command("vars 3").unwrap(), ConsoleCommand::Variables(Some(3)));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert_eq!(parse_command("r").unwrap_err().to_string(), "missing line number");
        assert_eq!(parse_command("b 0").unwrap_err().to_string(), "invalid line number '0'");
        assert_eq!(parse_command("c 3").unwrap_err().to_string(), "'c' takes no argument");
        assert_eq!(parse_command("v x").unwrap_err().to_string(), "invalid depth 'x'");
        assert!(parse_command("jump 3").is_err());
        assert!(parse_command("b 1 2").is_err());
    }

    #[test]
    fn resuming_commands() {
        assert!(ConsoleCommand::StepOut.resumes());
        assert!(ConsoleCommand::RunTo(3).resumes());
        assert!(!ConsoleCommand::Toggle(3).resumes());
        assert!(!ConsoleCommand::Quit.resumes());
    }
}
