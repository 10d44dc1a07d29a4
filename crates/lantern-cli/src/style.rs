//! Shared styling helpers for CLI output.

use std::io::IsTerminal;

use owo_colors::OwoColorize;

fn should_color() -> bool {
    std::io::stdout().is_terminal()
}

pub fn warning(text: impl AsRef<str>) -> String {
    let text = text.as_ref();
    if should_color() {
        format!("{}", text.yellow())
    } else {
        text.to_string()
    }
}

pub fn error(text: impl AsRef<str>) -> String {
    let text = text.as_ref();
    if should_color() {
        format!("{}", text.red())
    } else {
        text.to_string()
    }
}

pub fn accent(text: impl AsRef<str>) -> String {
    let text = text.as_ref();
    if should_color() {
        format!("{}", text.cyan())
    } else {
        text.to_string()
    }
}

/// Color one rendered variable line: name red, `{type}` gray.
pub fn variable_line(line: &str) -> String {
    if !should_color() {
        return line.to_string();
    }
    let indent = line.len() - line.trim_start().len();
    let (lead, body) = line.split_at(indent);
    let Some((name, rest)) = body.split_once(" = ") else {
        return line.to_string();
    };
    let colored_rest = match rest.split_once("} ") {
        Some((ty, value)) if ty.starts_with('{') => {
            format!("{} {value}", format!("{ty}}}").bright_black())
        }
        _ => rest.to_string(),
    };
    format!("{lead}{} = {colored_rest}", name.red())
}
