// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::playback::device::AudioDevice;
use crate::types::card_id::CardId;

/// How long a finished recording stays in Completed before the state decays
/// back to Idle.
pub const COMPLETION_GRACE: Duration = Duration::from_millis(1500);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlaybackPhase {
    Idle,
    Buffering,
    Playing,
    Error,
    Completed,
}

/// The single shared playback state. One of these exists per controller; it
/// names the card, if any, that currently owns the audio output.
#[derive(Clone, Debug)]
pub struct PlaybackUiState {
    pub card: Option<CardId>,
    pub phase: PlaybackPhase,
    pub audio_path: Option<String>,
    pub error: Option<String>,
}

impl PlaybackUiState {
    pub fn initial() -> Self {
        Self {
            card: None,
            phase: PlaybackPhase::Idle,
            audio_path: None,
            error: None,
        }
    }

    /// Whether this state claims the output for `card`.
    pub fn is_active_for(&self, card: CardId) -> bool {
        self.card == Some(card)
            && matches!(self.phase, PlaybackPhase::Buffering | PlaybackPhase::Playing)
    }
}

/// Serializes audio playback across all visible cards into one state.
///
/// Every request supersedes whatever was playing before it. Async callbacks
/// from a superseded request are discarded by comparing generations before
/// they touch the shared state.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<Inner>,
}

struct Inner {
    device: Arc<dyn AudioDevice>,
    state: watch::Sender<PlaybackUiState>,
    control: Mutex<Control>,
}

struct Control {
    generation: u64,
    stop: Option<Arc<Notify>>,
}

impl PlaybackController {
    pub fn new(device: Arc<dyn AudioDevice>) -> Self {
        let (state, _) = watch::channel(PlaybackUiState::initial());
        Self {
            inner: Arc::new(Inner {
                device,
                state,
                control: Mutex::new(Control {
                    generation: 0,
                    stop: None,
                }),
            }),
        }
    }

    /// Request playback for a card.
    ///
    /// If the card already owns the output (Playing or Buffering), this is a
    /// toggle: playback halts and the state goes Idle. Any other active
    /// playback is halted first; the device has exactly one slot. An absent
    /// path goes straight to Error without engaging the device.
    pub fn request(&self, card: CardId, audio_path: Option<String>) {
        let mut control = self.inner.control.lock().unwrap();
        let toggle_stop = self.inner.state.borrow().is_active_for(card);

        // Supersede whatever is running, stopping it if it got as far as the
        // device.
        control.generation += 1;
        if let Some(stop) = control.stop.take() {
            stop.notify_one();
        }

        if toggle_stop {
            self.inner.state.send_replace(PlaybackUiState {
                card: Some(card),
                phase: PlaybackPhase::Idle,
                audio_path,
                error: None,
            });
            return;
        }

        let path = audio_path.filter(|p| !p.trim().is_empty());
        let Some(path) = path else {
            self.inner.state.send_replace(PlaybackUiState {
                card: Some(card),
                phase: PlaybackPhase::Error,
                audio_path: None,
                error: Some("not available".to_string()),
            });
            return;
        };

        self.inner.state.send_replace(PlaybackUiState {
            card: Some(card),
            phase: PlaybackPhase::Buffering,
            audio_path: Some(path.clone()),
            error: None,
        });
        let stop = Arc::new(Notify::new());
        control.stop = Some(stop.clone());
        let generation = control.generation;
        drop(control);

        let inner = self.inner.clone();
        tokio::spawn(run_playback(inner, generation, card, path, stop));
    }

    /// A snapshot of the shared state.
    pub fn state(&self) -> PlaybackUiState {
        self.inner.state.borrow().clone()
    }

    /// Observe the shared state. Every visible card holds one receiver and
    /// compares the state's card against its own.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackUiState> {
        self.inner.state.subscribe()
    }

    /// Stop any active playback, release the device, and reset to the
    /// initial state. Must run whenever the hosting screen goes away.
    pub fn release(&self) {
        let mut control = self.inner.control.lock().unwrap();
        control.generation += 1;
        if let Some(stop) = control.stop.take() {
            stop.notify_one();
        }
        self.inner.state.send_replace(PlaybackUiState::initial());
    }
}

async fn run_playback(
    inner: Arc<Inner>,
    generation: u64,
    card: CardId,
    path: String,
    stop: Arc<Notify>,
) {
    let stream = inner.device.prepare(&path).await;
    let mut stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            apply_if_current(&inner, generation, |state| {
                *state = PlaybackUiState {
                    card: Some(card),
                    phase: PlaybackPhase::Error,
                    audio_path: Some(path.clone()),
                    error: Some(e.message().to_string()),
                };
            });
            return;
        }
    };

    // Superseded while preparing: drop the stream without ever playing.
    let playing = apply_if_current(&inner, generation, |state| {
        *state = PlaybackUiState {
            card: Some(card),
            phase: PlaybackPhase::Playing,
            audio_path: Some(path.clone()),
            error: None,
        };
    });
    if !playing {
        return;
    }

    let finished = tokio::select! {
        result = stream.play_to_end() => Some(result),
        // The superseding request already wrote the new state.
        _ = stop.notified() => None,
    };
    let Some(result) = finished else {
        return;
    };

    match result {
        Ok(()) => {
            let completed = apply_if_current(&inner, generation, |state| {
                *state = PlaybackUiState {
                    card: Some(card),
                    phase: PlaybackPhase::Completed,
                    audio_path: Some(path.clone()),
                    error: None,
                };
            });
            if !completed {
                return;
            }
            sleep(COMPLETION_GRACE).await;
            apply_if_current(&inner, generation, |state| {
                *state = PlaybackUiState {
                    card: Some(card),
                    phase: PlaybackPhase::Idle,
                    audio_path: Some(path.clone()),
                    error: None,
                };
            });
        }
        Err(e) => {
            apply_if_current(&inner, generation, |state| {
                *state = PlaybackUiState {
                    card: Some(card),
                    phase: PlaybackPhase::Error,
                    audio_path: Some(path.clone()),
                    error: Some(e.message().to_string()),
                };
            });
        }
    }
}

/// Apply a state change only if `generation` is still the latest request.
/// Late callbacks from superseded requests fall through here.
fn apply_if_current(
    inner: &Inner,
    generation: u64,
    f: impl FnOnce(&mut PlaybackUiState),
) -> bool {
    let control = inner.control.lock().unwrap();
    if control.generation != generation {
        return false;
    }
    inner.state.send_modify(f);
    true
}
