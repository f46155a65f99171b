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

use tokio::task::JoinHandle;

use crate::db::Store;
use crate::error::Fallible;
use crate::generate::VocabularySource;
use crate::playback::controller::PlaybackController;
use crate::review::ReviewSession;
use crate::types::deck::Deck;

#[derive(Clone)]
pub struct ServerState {
    pub store: Store,
    pub source: Arc<dyn VocabularySource>,
    pub playback: PlaybackController,
    pub mutable: Arc<Mutex<MutableState>>,
}

pub struct MutableState {
    pub review: Option<ActiveReview>,
}

/// The review screen currently on display: one session, plus the background
/// task that feeds it storage snapshots.
pub struct ActiveReview {
    pub deck: Deck,
    pub session: Arc<Mutex<ReviewSession>>,
    refresh_task: JoinHandle<()>,
}

impl MutableState {
    /// Tear down the active review screen: cancel its storage subscription
    /// and release the audio device.
    pub fn end_review(&mut self, playback: &PlaybackController) {
        if let Some(active) = self.review.take() {
            active.refresh_task.abort();
            playback.release();
            log::debug!("Review session for deck {} ended.", active.deck.id);
        }
    }
}

/// Make the active review session target `deck`, replacing any session for
/// another deck. A new session gets the current snapshot synchronously, then
/// a background task applies every later storage emission.
pub fn ensure_review(state: &ServerState, deck: Deck) -> Fallible<Arc<Mutex<ReviewSession>>> {
    let mut mutable = state.mutable.lock().unwrap();
    if let Some(active) = &mutable.review {
        if active.deck.id == deck.id {
            return Ok(active.session.clone());
        }
    }
    mutable.end_review(&state.playback);

    let mut session = ReviewSession::new(deck.id, state.store.clone());
    session.refresh(state.store.unlearned_cards(deck.id)?);
    let mut watcher = session.subscribe();
    let session = Arc::new(Mutex::new(session));
    let refresh_task = tokio::spawn({
        let session = session.clone();
        async move {
            loop {
                match watcher.next().await {
                    Ok(snapshot) => session.lock().unwrap().refresh(snapshot),
                    Err(e) => {
                        log::error!("Card subscription ended: {e}");
                        break;
                    }
                }
            }
        }
    });
    log::debug!("Review session for deck {} started.", deck.id);
    mutable.review = Some(ActiveReview {
        deck,
        session: session.clone(),
        refresh_task,
    });
    Ok(session)
}
