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

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use maud::Markup;
use maud::html;
use serde::Deserialize;

use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::playback::controller::PlaybackPhase;
use crate::types::card::Card;
use crate::types::deck::Deck;
use crate::types::deck_id::DeckId;
use crate::web::state::ServerState;
use crate::web::state::ensure_review;
use crate::web::template::error_banner;
use crate::web::template::page_template;

#[derive(Deserialize)]
pub struct PageQuery {
    error: Option<String>,
}

/// The deck list screen.
pub async fn decks_page(
    State(state): State<ServerState>,
    Query(query): Query<PageQuery>,
) -> (StatusCode, Html<String>) {
    match render_decks(&state, &query.error) {
        Ok(markup) => (StatusCode::OK, Html(markup.into_string())),
        Err(e) => error_page(e),
    }
}

fn render_decks(state: &ServerState, error: &Option<String>) -> Fallible<Markup> {
    let decks = state.store.list_decks()?;
    let mut rows: Vec<(Deck, usize)> = Vec::new();
    for deck in decks {
        let unlearned = state.store.unlearned_count(deck.id)?;
        rows.push((deck, unlearned));
    }
    let body = html! {
        div.root {
            h1 { "lexideck" }
            (error_banner(error))
            form.new-deck action="/decks" method="post" {
                input type="text" name="topic" placeholder="Topic for a new deck";
                input id="generate" type="submit" value="Generate";
            }
            @if rows.is_empty() {
                p.empty { "No decks yet. Type a topic above to generate one." }
            } @else {
                ul.decks {
                    @for (deck, unlearned) in &rows {
                        li.deck {
                            a.topic href=(format!("/decks/{}/review", deck.id)) {
                                (deck.topic)
                            }
                            span.count { (unlearned) " to review" }
                            span.created { "created " (deck.created_at.local_human()) }
                            @if let Some(learned) = deck.last_learned_at {
                                span.learned { "last reviewed " (learned.local_human()) }
                            }
                            form.delete action=(format!("/decks/{}/delete", deck.id)) method="post" {
                                input type="submit" value="Delete";
                            }
                        }
                    }
                }
            }
        }
    };
    Ok(page_template(body))
}

/// The review screen for one deck.
pub async fn review_page(
    State(state): State<ServerState>,
    Path(deck): Path<String>,
    Query(query): Query<PageQuery>,
) -> (StatusCode, Html<String>) {
    let deck_id = match DeckId::parse(&deck) {
        Ok(deck_id) => deck_id,
        Err(_) => return not_found_page(),
    };
    match render_review(&state, deck_id, &query.error) {
        Ok(Some(markup)) => (StatusCode::OK, Html(markup.into_string())),
        Ok(None) => not_found_page(),
        Err(e) => error_page(e),
    }
}

fn render_review(
    state: &ServerState,
    deck_id: DeckId,
    error: &Option<String>,
) -> Fallible<Option<Markup>> {
    let deck = match state.store.get_deck(deck_id)? {
        Some(deck) => deck,
        None => return Ok(None),
    };
    let session = ensure_review(state, deck.clone())?;
    let session = session.lock().unwrap();
    let remaining = session.queue_len();

    let body = if remaining == 0 {
        html! {
            div.root {
                div.finished {
                    h1 { "All caught up" }
                    p { "No cards left to review in " (deck.topic) "." }
                    a href="/" { "Back to decks" }
                }
            }
        }
    } else {
        let card = &session.cards()[0];
        html! {
            div.root {
                div.card {
                    div.header {
                        h1 { (deck.topic) }
                        div.progress { (remaining) " remaining" }
                    }
                    (card_content(state, card))
                    div.controls {
                        (swipe_controls(&deck))
                    }
                }
            }
        }
    };
    Ok(Some(page_template(html! {
        (error_banner(error))
        (body)
    })))
}

fn card_content(state: &ServerState, card: &Card) -> Markup {
    html! {
        div.content {
            div.term {
                h2 { (card.text) }
            }
            @if let Some(translation) = &card.translation {
                div.translation { (translation) }
            }
            @for example in &card.examples {
                p.example { (example) }
            }
            @if let Some(etymology) = &card.etymology {
                p.etymology { b { "Etymology: " } (etymology) }
            }
            @if let Some(mnemonic) = &card.mnemonic {
                p.mnemonic { b { "Mnemonic: " } (mnemonic) }
            }
            (audio_control(state, card))
        }
    }
}

/// The audio button. Every card compares the shared playback state's card
/// against its own to decide how to render.
fn audio_control(state: &ServerState, card: &Card) -> Markup {
    let playback = state.playback.state();
    let mine = playback.card == Some(card.id);
    let label = if mine {
        match playback.phase {
            PlaybackPhase::Buffering => "Buffering",
            PlaybackPhase::Playing => "Stop",
            _ => "Play",
        }
    } else {
        "Play"
    };
    let error = if mine && playback.phase == PlaybackPhase::Error {
        playback.error.clone()
    } else {
        None
    };
    html! {
        form.audio action="/play" method="post" {
            input type="hidden" name="card" value=(card.id);
            input id="play" type="submit" value=(label);
            @if let Some(message) = error {
                span.playback-error { "Audio: " (message) }
            }
        }
    }
}

fn swipe_controls(deck: &Deck) -> Markup {
    html! {
        form.swipe action=(format!("/decks/{}/review", deck.id)) method="post" {
            input type="hidden" name="position" value="0";
            input id="unknown" type="submit" name="direction" value="Unknown";
            input id="known" type="submit" name="direction" value="Known";
        }
        form.end action=(format!("/decks/{}/review/end", deck.id)) method="post" {
            input id="end" type="submit" value="End";
        }
    }
}

fn error_page(e: ErrorReport) -> (StatusCode, Html<String>) {
    log::error!("{e}");
    let body = html! {
        div.root {
            p { (e.to_string()) }
        }
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(page_template(body).into_string()),
    )
}

fn not_found_page() -> (StatusCode, Html<String>) {
    let body = html! {
        div.root {
            p { "No such deck." }
            a href="/" { "Back to decks" }
        }
    };
    (
        StatusCode::NOT_FOUND,
        Html(page_template(body).into_string()),
    )
}
