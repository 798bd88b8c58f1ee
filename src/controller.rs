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
use std::sync::Arc;

use tokio::sync::mpsc::{self, Sender};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, span, Instrument, Level};

use crate::engine::AudioEngine;
use crate::sound::{SoundError, SoundManager};
use crate::transport::Transport;

pub mod keyboard;

/// Commands that drive the sound manager.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Fetches and decodes a sound, storing it under the id.
    Load { id: String, locator: String },

    /// Starts a new voice for the sound. Voices already playing keep playing.
    Play { id: String, looping: bool },

    /// Stops every voice for the sound at the engine's current time.
    Pause { id: String },

    /// Stops every voice for the sound immediately.
    Stop { id: String },

    /// Moves every voice for the sound ahead, wrapping past the end. Uses the
    /// configured seek step when no distance is given.
    Forward { id: String, seconds: Option<f64> },

    /// Moves every voice for the sound back, stopping at the beginning.
    Backward { id: String, seconds: Option<f64> },

    /// Logs the loaded sounds and their voices.
    Status,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Command>) -> JoinHandle<Result<(), io::Error>>;
}

/// Controls a sound manager.
pub struct Controller<E: AudioEngine, T: Transport> {
    handle: JoinHandle<SoundManager<E, T>>,
}

impl<E: AudioEngine, T: Transport> Controller<E, T> {
    /// Creates a new controller with the given driver. The controller takes ownership
    /// of the sound manager until the driver closes.
    pub fn new(manager: SoundManager<E, T>, driver: Arc<dyn Driver>) -> Controller<E, T> {
        let span = span!(Level::INFO, "controller");
        Controller {
            handle: tokio::spawn(Controller::run(manager, driver).instrument(span)),
        }
    }

    /// Join will block until the controller finishes, returning the sound manager.
    pub async fn join(self) -> Result<SoundManager<E, T>, JoinError> {
        self.handle.await
    }

    /// Applies commands from the driver and events from the engine, one at a time.
    async fn run(mut manager: SoundManager<E, T>, driver: Arc<dyn Driver>) -> SoundManager<E, T> {
        let (commands_tx, mut commands_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(commands_tx);

        info!(
            sounds = manager.library().len(),
            seek_step = manager.seek_step(),
            "Controller started."
        );

        loop {
            tokio::select! {
                command = commands_rx.recv() => match command {
                    Some(command) => {
                        info!(command = ?command, "Received command.");
                        if let Err(e) = execute(&mut manager, command).await {
                            error!(err = %e, "Error talking to sound manager");
                        }
                    }
                    None => break,
                },
                Some(event) = manager.next_event() => manager.handle_event(event),
            }
        }

        info!("Controller closing.");
        manager.stop_all();
        match join_handle.await {
            Ok(Err(e)) => error!(err = %e, "Event monitor failed"),
            Err(e) => error!(err = %e, "Error waiting for event monitor to stop"),
            Ok(Ok(())) => {}
        }
        manager
    }
}

/// Applies a single command to the sound manager.
pub async fn execute<E: AudioEngine, T: Transport>(
    manager: &mut SoundManager<E, T>,
    command: Command,
) -> Result<(), SoundError> {
    match command {
        Command::Load { id, locator } => manager.load(&id, &locator).await.map(|_| ()),
        Command::Play { id, looping } => manager.play(&id, looping).await.map(|_| ()),
        Command::Pause { id } => manager.pause(&id).map(|_| ()),
        Command::Stop { id } => manager.stop(&id).map(|_| ()),
        Command::Forward { id, seconds } => {
            let seconds = seconds.unwrap_or(manager.seek_step());
            manager.forward(&id, seconds).map(|_| ())
        }
        Command::Backward { id, seconds } => {
            let seconds = seconds.unwrap_or(manager.seek_step());
            manager.backward(&id, seconds).map(|_| ())
        }
        Command::Status => {
            manager.process_pending_events();
            for id in manager.library().ids() {
                let voices = manager.voices(id);
                info!(
                    id,
                    voices = voices.len(),
                    looping = voices.iter().filter(|v| v.looping).count(),
                    "Sound status"
                );
            }
            info!(
                sounds = manager.library().len(),
                active_voices = manager.active_voice_count(),
                memory_kb = manager.library().total_memory_usage() / 1024,
                "Status"
            );
            Ok(())
        }
    }
}
