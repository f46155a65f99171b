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

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Child;
use tokio::process::Command;

use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;
use crate::media::AudioLoader;

/// The audio output device. Exactly one stream can exist at a time; the
/// controller enforces this, the device just opens streams.
#[async_trait]
pub trait AudioDevice: Send + Sync {
    /// Acquire the device and prepare the resource at `path` for playback.
    async fn prepare(&self, path: &str) -> Fallible<Box<dyn AudioStream>>;
}

/// A prepared, playing-or-about-to-play stream. Dropping the stream stops
/// playback and releases the device.
#[async_trait]
pub trait AudioStream: Send {
    /// Run playback to the natural end of the stream.
    async fn play_to_end(&mut self) -> Fallible<()>;
}

/// Plays recordings by spawning an external player process.
pub struct ProcessAudioDevice {
    player: String,
    loader: AudioLoader,
}

impl ProcessAudioDevice {
    pub fn new(player: String, loader: AudioLoader) -> Self {
        Self { player, loader }
    }
}

#[async_trait]
impl AudioDevice for ProcessAudioDevice {
    async fn prepare(&self, path: &str) -> Fallible<Box<dyn AudioStream>> {
        let path = self
            .loader
            .validate(path)
            .map_err(|e| ErrorReport::new(format!("audio file rejected: {e}.")))?;
        log::debug!("Playing {} with {}.", path.display(), self.player);
        let child = Command::new(&self.player)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            // The stream contract: dropping it stops playback.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ErrorReport::with_cause(format!("could not start player '{}'", self.player), e)
            })?;
        Ok(Box::new(ProcessStream { child }))
    }
}

struct ProcessStream {
    child: Child,
}

#[async_trait]
impl AudioStream for ProcessStream {
    async fn play_to_end(&mut self) -> Fallible<()> {
        let status = self.child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            fail(format!("player exited with {status}."))
        }
    }
}
