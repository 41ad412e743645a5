//! Line-oriented operator console for the built-in broker.
//!
//! Plays the part of the application that would normally send actuation
//! requests: `set` writes a target, `get` reads back the published actual.

use std::io::{BufRead, IsTerminal, Write};
use std::sync::Arc;
use std::thread;

use hf_broker::InMemoryBroker;
use hf_core::{SignalPath, Value};
use hf_runner::{RunnerStats, StopSignal};
use tracing::{debug, info};

const HELP: &str = "commands: set <path> <value> | get <path> | stats | help | quit";

#[derive(Debug, PartialEq)]
pub enum Reply {
    Print(String),
    Quit,
}

pub fn execute(line: &str, broker: &InMemoryBroker, stats: &RunnerStats) -> Reply {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Reply::Print(String::new());
    };

    match command {
        "set" => {
            let (Some(path), Some(text)) = (words.next(), words.next()) else {
                return Reply::Print("usage: set <path> <value>".to_string());
            };
            Reply::Print(set(broker, path, text))
        }
        "get" => {
            let Some(path) = words.next() else {
                return Reply::Print("usage: get <path>".to_string());
            };
            match broker.actual(&SignalPath::new(path)) {
                Some(value) => Reply::Print(format!("{path} = {value}")),
                None => Reply::Print(format!("{path} has no value")),
            }
        }
        "stats" => Reply::Print(stats.snapshot().to_string()),
        "help" => Reply::Print(HELP.to_string()),
        "quit" | "exit" => Reply::Quit,
        other => Reply::Print(format!("unknown command '{other}'; {HELP}")),
    }
}

fn set(broker: &InMemoryBroker, path: &str, text: &str) -> String {
    let path = SignalPath::new(path);
    let Some(meta) = broker.catalog().get(&path) else {
        return format!("unknown signal {path}");
    };
    let value = match Value::parse_as(meta.data_type, text) {
        Ok(value) => value,
        Err(e) => return format!("error: {e}"),
    };
    match broker.actuate(&path, value) {
        Ok(()) => format!("ok {path}"),
        Err(e) => format!("error: {e}"),
    }
}

/// Why the console stopped reading.
#[derive(Debug, PartialEq)]
pub enum Ending {
    Quit,
    EndOfInput,
}

impl Ending {
    /// `quit` always stops the runner. End of input only does when a person
    /// was typing; a closed or redirected stdin leaves the runner to Ctrl-C.
    pub fn stops_runner(&self, interactive: bool) -> bool {
        match self {
            Ending::Quit => true,
            Ending::EndOfInput => interactive,
        }
    }
}

pub fn read_commands(
    input: impl BufRead,
    mut output: impl Write,
    broker: &InMemoryBroker,
    stats: &RunnerStats,
) -> Ending {
    for line in input.lines() {
        let Ok(line) = line else { break };
        match execute(&line, broker, stats) {
            Reply::Print(text) if text.is_empty() => {}
            Reply::Print(text) => {
                let _ = writeln!(output, "{text}");
            }
            Reply::Quit => return Ending::Quit,
        }
    }
    Ending::EndOfInput
}

/// Serve commands from stdin on a detached thread.
///
/// A Ctrl-C stop leaves the thread blocked on stdin until the process exits.
pub fn spawn(
    broker: InMemoryBroker,
    stats: Arc<RunnerStats>,
    stop: StopSignal,
) -> std::io::Result<()> {
    let interactive = std::io::stdin().is_terminal();
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            if interactive {
                println!("{HELP}");
            }
            let stdin = std::io::stdin().lock();
            let ending = read_commands(stdin, std::io::stdout(), &broker, &stats);
            if ending.stops_runner(interactive) {
                debug!(?ending, "console closed, stopping");
                stop.trigger();
            } else {
                info!("stdin closed; serving until Ctrl-C or SIGTERM");
            }
        })
        .map(|_| ())
}
