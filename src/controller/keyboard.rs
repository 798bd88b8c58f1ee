// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Command;

const LOAD: &str = "load";
const PLAY: &str = "play";
const PAUSE: &str = "pause";
const STOP: &str = "stop";
const FORWARD: &str = "forward";
const BACKWARD: &str = "backward";
const STATUS: &str = "status";

/// Marks a play command as looping, e.g. `play bgm loop`.
const LOOP: &str = "loop";

/// A controller that controls the sound manager using the keyboard.
#[derive(Default)]
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Prompts for and forwards a single command. Returns false once the input is exhausted.
    fn monitor_io<R, W>(
        events_tx: &Sender<Command>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <id> <locator>, {} <id> [{}], {} <id>, {} <id>, {} <id> [seconds], {} <id> [seconds], {}): ",
            LOAD, PLAY, LOOP, PAUSE, STOP, FORWARD, BACKWARD, STATUS,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        match parse_command(&input) {
            Some(command) => events_tx
                .blocking_send(command)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            None => warn!(input = input.trim(), "Unrecognized input"),
        }
        Ok(true)
    }
}

/// Parses a line of keyboard input into a command.
pub fn parse_command(input: &str) -> Option<Command> {
    let mut words = input.split_whitespace();
    let command = words.next()?.to_lowercase();
    let id = words.next().map(str::to_string);
    let rest: Vec<&str> = words.collect();

    let command = match (command.as_str(), id, rest.as_slice()) {
        (LOAD, Some(id), [locator]) => Command::Load {
            id,
            locator: locator.to_string(),
        },
        (PLAY, Some(id), []) => Command::Play { id, looping: false },
        (PLAY, Some(id), [flag]) if flag.eq_ignore_ascii_case(LOOP) => {
            Command::Play { id, looping: true }
        }
        (PAUSE, Some(id), []) => Command::Pause { id },
        (STOP, Some(id), []) => Command::Stop { id },
        (FORWARD, Some(id), seconds) => Command::Forward {
            id,
            seconds: parse_seconds(seconds)?,
        },
        (BACKWARD, Some(id), seconds) => Command::Backward {
            id,
            seconds: parse_seconds(seconds)?,
        },
        (STATUS, None, []) => Command::Status,
        _ => return None,
    };
    Some(command)
}

/// Parses an optional, finite number of seconds. `None` means the input was invalid.
fn parse_seconds(words: &[&str]) -> Option<Option<f64>> {
    match words {
        [] => Some(None),
        [seconds] => seconds
            .parse::<f64>()
            .ok()
            .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
            .map(Some),
        _ => None,
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Command>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard input closed.");
            Ok(())
        })
    }
}
