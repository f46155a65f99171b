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

use axum::Form;
use axum::extract::Path;
use axum::extract::State;
use axum::response::Redirect;
use percent_encoding::NON_ALPHANUMERIC;
use percent_encoding::utf8_percent_encode;
use serde::Deserialize;

use crate::error::Fallible;
use crate::generate::build_deck;
use crate::review::ReviewSession;
use crate::review::SwipeDirection;
use crate::review::SwipeOutcome;
use crate::types::card_id::CardId;
use crate::types::deck_id::DeckId;
use crate::types::timestamp::Timestamp;
use crate::web::state::ServerState;

#[derive(Deserialize)]
pub struct NewDeckForm {
    topic: String,
}

/// Create a deck from a topic. The deck and its cards are only persisted
/// together, after generation succeeds; any failure redirects with a banner
/// and writes nothing.
pub async fn create_deck_handler(
    State(state): State<ServerState>,
    Form(form): Form<NewDeckForm>,
) -> Redirect {
    match create_deck(&state, &form.topic).await {
        Ok(()) => Redirect::to("/"),
        Err(e) => redirect_with_error("/", e.message()),
    }
}

async fn create_deck(state: &ServerState, topic: &str) -> Fallible<()> {
    let (deck, cards) = build_deck(state.source.as_ref(), topic).await?;
    state.store.create_deck(&deck, &cards)?;
    log::debug!("Deck {} created from topic: {}", deck.id, deck.topic);
    Ok(())
}

pub async fn delete_deck_handler(
    State(state): State<ServerState>,
    Path(deck): Path<String>,
) -> Redirect {
    let deck_id = match DeckId::parse(&deck) {
        Ok(deck_id) => deck_id,
        Err(e) => return redirect_with_error("/", e.message()),
    };
    {
        let mut mutable = state.mutable.lock().unwrap();
        let reviewing = matches!(&mutable.review, Some(active) if active.deck.id == deck_id);
        if reviewing {
            mutable.end_review(&state.playback);
        }
    }
    match state.store.delete_deck(deck_id) {
        Ok(()) => Redirect::to("/"),
        Err(e) => redirect_with_error("/", e.message()),
    }
}

#[derive(Debug, Deserialize)]
enum SwipeAction {
    Known,
    Unknown,
}

impl SwipeAction {
    fn direction(&self) -> SwipeDirection {
        match self {
            SwipeAction::Known => SwipeDirection::Known,
            SwipeAction::Unknown => SwipeDirection::Unknown,
        }
    }
}

#[derive(Deserialize)]
pub struct SwipeForm {
    position: usize,
    direction: SwipeAction,
}

/// Swipe the card at a queue position. A stale position is a no-op; the
/// redirect re-renders the queue, which is all the reset the screen needs.
pub async fn swipe_handler(
    State(state): State<ServerState>,
    Path(deck): Path<String>,
    Form(form): Form<SwipeForm>,
) -> Redirect {
    let deck_id = match DeckId::parse(&deck) {
        Ok(deck_id) => deck_id,
        Err(_) => return Redirect::to("/"),
    };
    let review_url = format!("/decks/{deck_id}/review");
    let Some(session) = active_session(&state, deck_id) else {
        // No session for this deck; the review screen rebuilds one on GET.
        return Redirect::to(&review_url);
    };
    let outcome = session
        .lock()
        .unwrap()
        .swipe(form.position, form.direction.direction());
    match outcome {
        SwipeOutcome::Removed {
            persist_error: Some(e),
            ..
        } => redirect_with_error(&review_url, &format!("could not save the card: {}", e.message())),
        SwipeOutcome::Removed { .. } => {
            if let Err(e) = state.store.touch_deck(deck_id, Timestamp::now()) {
                log::error!("Failed to record review activity: {e}");
            }
            Redirect::to(&review_url)
        }
        SwipeOutcome::Stale => Redirect::to(&review_url),
    }
}

pub async fn end_review_handler(
    State(state): State<ServerState>,
    Path(deck): Path<String>,
) -> Redirect {
    if let Ok(deck_id) = DeckId::parse(&deck) {
        let mut mutable = state.mutable.lock().unwrap();
        let reviewing = matches!(&mutable.review, Some(active) if active.deck.id == deck_id);
        if reviewing {
            mutable.end_review(&state.playback);
        }
    }
    Redirect::to("/")
}

#[derive(Deserialize)]
pub struct PlayForm {
    card: String,
}

/// Request pronunciation audio for a card on the active review screen.
pub async fn play_handler(
    State(state): State<ServerState>,
    Form(form): Form<PlayForm>,
) -> Redirect {
    let Some(deck_id) = active_deck(&state) else {
        return Redirect::to("/");
    };
    let review_url = format!("/decks/{deck_id}/review");
    let card_id = match CardId::parse(&form.card) {
        Ok(card_id) => card_id,
        Err(_) => return Redirect::to(&review_url),
    };
    match state.store.get_card(card_id) {
        Ok(Some(card)) if card.deck_id == deck_id => {
            state.playback.request(card.id, card.audio_path);
        }
        Ok(_) => log::debug!("Playback requested for a card not on this screen."),
        Err(e) => log::error!("{e}"),
    }
    Redirect::to(&review_url)
}

fn active_session(state: &ServerState, deck_id: DeckId) -> Option<Arc<Mutex<ReviewSession>>> {
    let mutable = state.mutable.lock().unwrap();
    match &mutable.review {
        Some(active) if active.deck.id == deck_id => Some(active.session.clone()),
        _ => None,
    }
}

fn active_deck(state: &ServerState) -> Option<DeckId> {
    let mutable = state.mutable.lock().unwrap();
    mutable.review.as_ref().map(|active| active.deck.id)
}

fn redirect_with_error(base: &str, message: &str) -> Redirect {
    let encoded = utf8_percent_encode(message, NON_ALPHANUMERIC).to_string();
    Redirect::to(&format!("{base}?error={encoded}"))
}
