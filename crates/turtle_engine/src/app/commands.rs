const SPAWN_SUFFIX: &str = "Turtle()";
const POSITION_SUFFIX: &str = ".position()";
// `.forward(` must be tried before `.fd(`.
const MOVE_VERBS: [&str; 2] = [".forward(", ".fd("];

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Spawn {
        name: String,
    },
    PositionQuery {
        var_name: String,
        actor_name: String,
    },
    Move {
        actor_name: String,
        distance: f32,
    },
    MalformedMove {
        actor_name: String,
        operand: String,
    },
    Unrecognized {
        raw: String,
    },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn",
            Self::PositionQuery { .. } => "position_query",
            Self::Move { .. } => "move",
            Self::MalformedMove { .. } => "malformed_move",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}

type RuleFn = fn(&str) -> Option<Command>;

// Precedence order; the first rule that claims the line wins.
const GRAMMAR_RULES: [(&str, RuleFn); 3] = [
    ("spawn", parse_spawn),
    ("position_query", parse_position_query),
    ("move", parse_move),
];

/// Classifies a whitespace-free command line. Never fails: lines no rule
/// claims come back as [`Command::Unrecognized`].
pub fn parse_command(line: &str) -> Command {
    GRAMMAR_RULES
        .iter()
        .find_map(|(_, rule)| rule(line))
        .unwrap_or_else(|| Command::Unrecognized {
            raw: line.to_string(),
        })
}

fn parse_spawn(line: &str) -> Option<Command> {
    if !line.ends_with(SPAWN_SUFFIX) {
        return None;
    }
    let (name, _) = split_single_assignment(line)?;
    Some(Command::Spawn {
        name: name.to_string(),
    })
}

fn parse_position_query(line: &str) -> Option<Command> {
    if !line.ends_with(POSITION_SUFFIX) {
        return None;
    }
    let (var_name, right) = split_single_assignment(line)?;
    let (actor_name, _) = right.split_once('.')?;
    if actor_name.is_empty() {
        return None;
    }
    Some(Command::PositionQuery {
        var_name: var_name.to_string(),
        actor_name: actor_name.to_string(),
    })
}

fn parse_move(line: &str) -> Option<Command> {
    let body = line.strip_suffix(')')?;
    MOVE_VERBS.iter().find_map(|verb| {
        let (actor_name, operand) = body.split_once(verb)?;
        let command = match parse_distance(operand) {
            Some(distance) => Command::Move {
                actor_name: actor_name.to_string(),
                distance,
            },
            None => Command::MalformedMove {
                actor_name: actor_name.to_string(),
                operand: operand.to_string(),
            },
        };
        Some(command)
    })
}

/// Only finite distances are accepted. `inf` would never finish its motion
/// and `NaN` would finish on the first step without moving, so both are
/// reported as malformed instead.
fn parse_distance(operand: &str) -> Option<f32> {
    operand
        .parse::<f32>()
        .ok()
        .filter(|distance| distance.is_finite())
}

fn split_single_assignment(line: &str) -> Option<(&str, &str)> {
    let (left, right) = line.split_once('=')?;
    if left.is_empty() || right.is_empty() || right.contains('=') {
        return None;
    }
    Some((left, right))
}
