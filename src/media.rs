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

use std::fmt::Display;
use std::fmt::Formatter;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

/// File extensions the player is handed.
pub const AUDIO_EXTENSIONS: [&str; 3] = ["mp3", "wav", "ogg"];

/// The audio loader takes media-relative file paths and returns the absolute
/// path to the recording, if it exists.
///
/// Paths come from stored card fields and from the client, so there must be
/// no possibility of directory traversals.
pub struct AudioLoader {
    /// Absolute path to the media root directory.
    root: PathBuf,
}

/// Errors that can occur when loading an audio path.
#[derive(Debug, PartialEq)]
pub enum AudioLoaderError {
    /// Path is absolute.
    Absolute,
    /// Path contains parent (`..`) components.
    ParentComponent,
    /// Path does not exist.
    NotFound,
    /// Path is not a file.
    NotFile,
    /// Path points to a symbolic link.
    SymbolicLink,
    /// Path does not have a recognized audio extension.
    NotAudio,
}

impl Display for AudioLoaderError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let text = match self {
            AudioLoaderError::Absolute => "path is absolute",
            AudioLoaderError::ParentComponent => "path contains parent components",
            AudioLoaderError::NotFound => "file does not exist",
            AudioLoaderError::NotFile => "path is not a file",
            AudioLoaderError::SymbolicLink => "path is a symbolic link",
            AudioLoaderError::NotAudio => "not an audio file",
        };
        write!(f, "{text}")
    }
}

impl AudioLoader {
    /// Construct a new [`AudioLoader`].
    pub fn new(root: PathBuf) -> Self {
        assert!(root.is_absolute());
        Self { root }
    }

    /// Given a media-relative path string, check that an audio file exists at
    /// that location within the media root directory.
    ///
    /// Symbolic links, absolute paths, and non-audio extensions are rejected.
    pub fn validate(&self, path: &str) -> Result<PathBuf, AudioLoaderError> {
        let path: PathBuf = PathBuf::from(path);
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(AudioLoaderError::ParentComponent);
        }
        if path.is_absolute() {
            return Err(AudioLoaderError::Absolute);
        }
        let is_audio = path
            .extension()
            .is_some_and(|ext| AUDIO_EXTENSIONS.iter().any(|known| ext == *known));
        if !is_audio {
            return Err(AudioLoaderError::NotAudio);
        }
        let path: PathBuf = self.root.join(path);
        if !path.exists() {
            return Err(AudioLoaderError::NotFound);
        }
        if !path.is_file() {
            return Err(AudioLoaderError::NotFile);
        }
        if path.is_symlink() {
            return Err(AudioLoaderError::SymbolicLink);
        }
        Ok(path)
    }
}

/// Find a pronunciation recording for a term in the media directory, trying
/// each known audio extension. Returns the media-relative file name.
pub fn audio_file_name(media_root: &Path, term: &str) -> Option<String> {
    let slug = audio_slug(term);
    for ext in AUDIO_EXTENSIONS {
        let name = format!("{slug}.{ext}");
        if media_root.join(&name).is_file() {
            return Some(name);
        }
    }
    None
}

/// Lowercase a term and replace non-alphanumeric runs with single dashes.
fn audio_slug(term: &str) -> String {
    let mut slug = String::new();
    for c in term.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use tempfile::TempDir;

    use super::*;
    use crate::error::Fallible;

    #[test]
    fn test_abs_rejected() -> Fallible<()> {
        let root = TempDir::new()?;
        let loader = AudioLoader::new(root.path().to_path_buf());
        assert_eq!(
            loader.validate("/etc/passwd.mp3"),
            Err(AudioLoaderError::Absolute)
        );
        Ok(())
    }

    #[test]
    fn test_parent_rejected() -> Fallible<()> {
        let root = TempDir::new()?;
        let loader = AudioLoader::new(root.path().to_path_buf());
        assert_eq!(
            loader.validate("../../../../etc/passwd.mp3"),
            Err(AudioLoaderError::ParentComponent)
        );
        Ok(())
    }

    #[test]
    fn test_non_audio_rejected() -> Fallible<()> {
        let root = TempDir::new()?;
        let loader = AudioLoader::new(root.path().to_path_buf());
        assert_eq!(loader.validate("notes.txt"), Err(AudioLoaderError::NotAudio));
        Ok(())
    }

    #[test]
    fn test_missing_rejected() -> Fallible<()> {
        let root = TempDir::new()?;
        let loader = AudioLoader::new(root.path().to_path_buf());
        assert_eq!(
            loader.validate("missing.mp3"),
            Err(AudioLoaderError::NotFound)
        );
        Ok(())
    }

    #[test]
    fn test_valid_file_accepted() -> Fallible<()> {
        let root = TempDir::new()?;
        File::create(root.path().join("la-casa.mp3"))?;
        let loader = AudioLoader::new(root.path().to_path_buf());
        let path = loader.validate("la-casa.mp3").unwrap();
        assert!(path.ends_with("la-casa.mp3"));
        Ok(())
    }

    #[test]
    fn test_audio_slug() {
        assert_eq!(audio_slug("la casa"), "la-casa");
        assert_eq!(audio_slug("¡Hola, mundo!"), "hola-mundo");
        assert_eq!(audio_slug("el perro"), "el-perro");
    }

    #[test]
    fn test_audio_file_name() -> Fallible<()> {
        let root = TempDir::new()?;
        File::create(root.path().join("el-perro.ogg"))?;
        assert_eq!(
            audio_file_name(root.path(), "el perro").as_deref(),
            Some("el-perro.ogg")
        );
        assert!(audio_file_name(root.path(), "la casa").is_none());
        Ok(())
    }
}
