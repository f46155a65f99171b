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

use std::env::current_dir;
use std::fs::create_dir_all;
use std::path::PathBuf;

use crate::config::Config;
use crate::db::Store;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;

/// The database file name within a collection directory.
const DATABASE_FILE: &str = "lexideck.db";

/// The media subdirectory, holding pronunciation recordings.
const MEDIA_DIR: &str = "media";

/// Everything rooted in one collection directory: the configuration, the
/// database, and the media files.
pub struct Collection {
    pub directory: PathBuf,
    pub config: Config,
    pub store: Store,
    pub media_root: PathBuf,
}

impl Collection {
    pub fn open(directory: Option<String>) -> Fallible<Self> {
        let directory: PathBuf = match directory {
            Some(dir) => PathBuf::from(dir),
            None => current_dir()?,
        };
        let directory = if directory.exists() {
            directory.canonicalize()?
        } else {
            return fail("directory does not exist.");
        };

        let config = Config::load(&directory)?;

        let db_path: PathBuf = directory.join(DATABASE_FILE);
        let db_path: &str = db_path
            .to_str()
            .ok_or_else(|| ErrorReport::new("invalid path"))?;
        let store: Store = Store::open(db_path)?;

        let media_root = directory.join(MEDIA_DIR);
        create_dir_all(&media_root)?;

        Ok(Self {
            directory,
            config,
            store,
            media_root,
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_open_missing_directory() {
        let result = Collection::open(Some("./derpherp".to_string()));
        assert!(result.is_err());
        let err = result.err().unwrap();
        assert_eq!(err.to_string(), "error: directory does not exist.");
    }

    #[test]
    fn test_open_creates_media_dir() -> Fallible<()> {
        let dir = TempDir::new()?;
        let collection = Collection::open(Some(dir.path().display().to_string()))?;
        assert!(collection.media_root.is_dir());
        assert!(collection.directory.join(DATABASE_FILE).exists());
        Ok(())
    }

    #[test]
    fn test_reopen_existing_collection() -> Fallible<()> {
        let dir = TempDir::new()?;
        let path = dir.path().display().to_string();
        {
            let collection = Collection::open(Some(path.clone()))?;
            let deck = crate::types::deck::Deck::new("Animals");
            collection.store.insert_deck(&deck)?;
        }
        let collection = Collection::open(Some(path))?;
        assert_eq!(collection.store.list_decks()?.len(), 1);
        Ok(())
    }
}
