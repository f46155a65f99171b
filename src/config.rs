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

use std::fs::read_to_string;
use std::path::Path;

use serde::Deserialize;

use crate::error::Fallible;

/// The configuration file name, looked up in the collection directory.
pub const CONFIG_FILE: &str = "lexideck.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorBackend {
    /// The built-in offline word list.
    Canned,
    /// An OpenAI-style chat completions endpoint.
    Http,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    #[serde(default = "default_backend")]
    pub backend: GeneratorBackend,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// How many items to ask for per deck.
    #[serde(default = "default_items")]
    pub items: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PlaybackConfig {
    /// The external audio player command.
    #[serde(default = "default_player")]
    pub player: String,
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_open_browser() -> bool {
    true
}

fn default_backend() -> GeneratorBackend {
    GeneratorBackend::Canned
}

fn default_api_key_env() -> String {
    "LEXIDECK_API_KEY".to_string()
}

fn default_items() -> usize {
    10
}

fn default_player() -> String {
    "mpv".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            open_browser: default_open_browser(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoint: None,
            model: None,
            api_key_env: default_api_key_env(),
            items: default_items(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            player: default_player(),
        }
    }
}

impl Config {
    /// Load the configuration from a collection directory. A missing file
    /// means all defaults.
    pub fn load(directory: &Path) -> Fallible<Self> {
        let path = directory.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("No {CONFIG_FILE}, using defaults.");
            return Ok(Config::default());
        }
        let content = read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
