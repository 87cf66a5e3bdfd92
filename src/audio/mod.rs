pub mod noise;
pub mod track;

use noise::{NoiseColor, NoiseSource};

use anyhow::{anyhow, Result};
use log::info;
use rodio::{OutputStream, Sink};
use serde::Serialize;
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

/// Where a noise generator gets wired to. `connect` must only be called
/// after `disconnect` so at most one generator is ever producing samples.
pub trait NoiseOutput: Send {
    fn connect(&mut self, color: NoiseColor) -> Result<()>;
    fn disconnect(&mut self) -> Result<()>;
}

impl<T: NoiseOutput + ?Sized> NoiseOutput for Box<T> {
    fn connect(&mut self, color: NoiseColor) -> Result<()> {
        (**self).connect(color)
    }

    fn disconnect(&mut self) -> Result<()> {
        (**self).disconnect()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NoiseSession {
    pub color: Option<NoiseColor>,
    pub active: bool,
}

pub struct NoiseSynthesizer<O: NoiseOutput> {
    output: O,
    session: NoiseSession,
}

impl<O: NoiseOutput> NoiseSynthesizer<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            session: NoiseSession::default(),
        }
    }

    /// Tears down whatever is playing, then wires up a fresh generator.
    pub fn start(&mut self, color: NoiseColor) -> Result<()> {
        self.stop()?;

        self.output.connect(color)?;
        self.session = NoiseSession {
            color: Some(color),
            active: true,
        };
        info!("Started {} noise", color.as_str());
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        let was_active = self.session.active;
        self.session = NoiseSession::default();
        self.output.disconnect()?;
        if was_active {
            info!("Stopped noise");
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.session.active
    }

    pub fn current_color(&self) -> Option<NoiseColor> {
        self.session.color
    }

    pub fn session(&self) -> NoiseSession {
        self.session
    }
}

enum AudioCommand {
    Connect {
        color: NoiseColor,
        reply: Sender<Result<(), String>>,
    },
    Disconnect,
}

/// Owns the noise output stream on a dedicated thread, since rodio's stream
/// is not `Send`.
pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
}

impl Default for AudioEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|e| anyhow!("audio engine lock poisoned: {e}"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        // Spawn dedicated audio thread holding non-Send audio objects
        thread::Builder::new()
            .name("noise-engine".to_string())
            .spawn(move || {
                let mut stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn teardown(stream: &mut Option<OutputStream>, sink: &mut Option<Sink>) {
                    if let Some(old) = sink.take() {
                        old.stop();
                    }
                    *stream = None;
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Connect { color, reply } => {
                            teardown(&mut stream, &mut sink);
                            let result = OutputStream::try_default()
                                .map_err(|e| format!("Failed to create audio output stream: {}", e))
                                .and_then(|(s, handle)| {
                                    let new_sink = Sink::try_new(&handle)
                                        .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                                    new_sink.append(NoiseSource::new(color).with_output_gain());
                                    new_sink.play();
                                    stream = Some(s);
                                    sink = Some(new_sink);
                                    Ok(())
                                });
                            let _ = reply.send(result);
                        }
                        AudioCommand::Disconnect => {
                            teardown(&mut stream, &mut sink);
                        }
                    }
                }
            })
            .map_err(|e| anyhow!("failed to spawn noise engine thread: {e}"))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl NoiseOutput for AudioEngineHandle {
    fn connect(&mut self, color: NoiseColor) -> Result<()> {
        let tx = self.ensure_thread()?;
        let (reply_tx, reply_rx) = mpsc::channel();
        tx.send(AudioCommand::Connect {
            color,
            reply: reply_tx,
        })
        .map_err(|e| anyhow!("noise engine unavailable: {e}"))?;

        reply_rx
            .recv()
            .map_err(|_| anyhow!("noise engine exited before connecting"))?
            .map_err(|e| anyhow!(e))
    }

    fn disconnect(&mut self) -> Result<()> {
        // Nothing to tear down until the thread exists.
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Disconnect);
        }
        Ok(())
    }
}
