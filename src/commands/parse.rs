//! Operator console input parsing.

use std::str::FromStr;

use crate::error::AppError;
use crate::models::{Coords, Realm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    Flat,
    Tree,
}

/// A command addressed to the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateCommand {
    Help,
    List(ListStyle),
    Status { path: String },
    Delete { path: String },
    /// `group` is empty for the root
    Add { group: String, name: String, coords: Coords, world: Realm },
    Group { path: String, description: Option<String> },
    Update { path: String },
    Ignore { comment: Option<String> },
    Make { comment: Option<String> },
    Reload,
}

/// One line of operator input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Gate(GateCommand),
    /// Plain line for the server's own console
    Forward(String),
    Stop,
    Empty,
}

/// Classify `line`. Only lines starting with `prefix` are gate commands.
pub fn parse_input(line: &str, prefix: &str) -> Result<ConsoleInput, AppError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(ConsoleInput::Empty);
    }
    if trimmed == "stop" {
        return Ok(ConsoleInput::Stop);
    }

    let mut words = trimmed.split_whitespace();
    if words.next() != Some(prefix) {
        return Ok(ConsoleInput::Forward(trimmed.to_string()));
    }
    let args: Vec<&str> = words.collect();
    parse_gate_command(&args).map(ConsoleInput::Gate)
}

/// Parse the words following the prefix.
pub fn parse_gate_command(args: &[&str]) -> Result<GateCommand, AppError> {
    match args {
        [] => Ok(GateCommand::Help),
        ["cp" | "checkpoint", rest @ ..] => parse_checkpoint_command(rest),
        ["ignore" | "ig", rest @ ..] => Ok(GateCommand::Ignore { comment: join_comment(rest) }),
        ["make", rest @ ..] => Ok(GateCommand::Make { comment: join_comment(rest) }),
        ["reload"] => Ok(GateCommand::Reload),
        ["help"] => Ok(GateCommand::Help),
        [other, ..] => Err(AppError::InvalidInput(format!("unknown command '{}'", other))),
    }
}

fn parse_checkpoint_command(args: &[&str]) -> Result<GateCommand, AppError> {
    match args {
        [] | ["help"] => Ok(GateCommand::Help),
        ["list" | "ls"] => Ok(GateCommand::List(ListStyle::Flat)),
        ["list" | "ls", "tree"] => Ok(GateCommand::List(ListStyle::Tree)),
        ["status" | "st", path] => Ok(GateCommand::Status { path: path.to_string() }),
        ["del", path] => Ok(GateCommand::Delete { path: path.to_string() }),
        ["add", rest @ ..] => parse_add(String::new(), rest, "cp add <x> <y> <z> <name> [world]"),
        ["add-to", group, rest @ ..] => {
            parse_add(group.to_string(), rest, "cp add-to <group> <x> <y> <z> <name> [world]")
        }
        ["group", path, rest @ ..] => Ok(GateCommand::Group { path: path.to_string(), description: join_comment(rest) }),
        ["update", path] => Ok(GateCommand::Update { path: path.to_string() }),
        [sub, ..] => Err(AppError::InvalidInput(format!("bad arguments for 'cp {}' (see cp help)", sub))),
    }
}

fn parse_add(group: String, args: &[&str], usage: &str) -> Result<GateCommand, AppError> {
    let (x, y, z, name, world) = match args {
        [x, y, z, name] => (x, y, z, name, None),
        [x, y, z, name, world] => (x, y, z, name, Some(world)),
        _ => return Err(AppError::InvalidInput(format!("usage: {}", usage))),
    };
    let coords = Coords::new(parse_coord(x)?, parse_coord(y)?, parse_coord(z)?);
    let world = match world {
        Some(tag) => Realm::from_str(tag)?,
        None => Realm::Overworld,
    };
    Ok(GateCommand::Add { group, name: name.to_string(), coords, world })
}

fn parse_coord(raw: &str) -> Result<i32, AppError> {
    raw.parse::<i32>()
        .map_err(|_| AppError::InvalidInput(format!("'{}' is not an integer coordinate", raw)))
}

fn join_comment(words: &[&str]) -> Option<String> {
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}
