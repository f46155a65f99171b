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

use axum::Router;
use axum::http::HeaderName;
use axum::http::StatusCode;
use axum::http::header::CACHE_CONTROL;
use axum::http::header::CONTENT_TYPE;
use axum::response::Html;
use axum::routing::get;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::time::sleep;

use crate::collection::Collection;
use crate::error::Fallible;
use crate::generate::source_from_config;
use crate::media::AudioLoader;
use crate::playback::controller::PlaybackController;
use crate::playback::device::ProcessAudioDevice;
use crate::web::get::decks_page;
use crate::web::get::review_page;
use crate::web::post::create_deck_handler;
use crate::web::post::delete_deck_handler;
use crate::web::post::end_review_handler;
use crate::web::post::play_handler;
use crate::web::post::swipe_handler;
use crate::web::state::MutableState;
use crate::web::state::ServerState;

pub async fn start_server(directory: Option<String>) -> Fallible<()> {
    let collection = Collection::open(directory)?;
    let source = source_from_config(&collection.config.generator, &collection.media_root)?;
    let loader = AudioLoader::new(collection.media_root.clone());
    let device = Arc::new(ProcessAudioDevice::new(
        collection.config.playback.player.clone(),
        loader,
    ));
    let playback = PlaybackController::new(device);
    let state = ServerState {
        store: collection.store.clone(),
        source,
        playback: playback.clone(),
        mutable: Arc::new(Mutex::new(MutableState { review: None })),
    };

    let app = Router::new();
    let app = app.route("/", get(decks_page));
    let app = app.route("/decks", post(create_deck_handler));
    let app = app.route("/decks/{deck}/delete", post(delete_deck_handler));
    let app = app.route("/decks/{deck}/review", get(review_page));
    let app = app.route("/decks/{deck}/review", post(swipe_handler));
    let app = app.route("/decks/{deck}/review/end", post(end_review_handler));
    let app = app.route("/play", post(play_handler));
    let app = app.route("/style.css", get(stylesheet));
    let app = app.fallback(not_found_handler);
    let app = app.with_state(state);
    let bind = collection.config.server.bind.clone();

    // Start a separate task to open the browser.
    if collection.config.server.open_browser {
        let url = format!("http://{bind}/");
        let probe = bind.clone();
        tokio::spawn(async move {
            loop {
                if let Ok(stream) = TcpStream::connect(&probe).await {
                    drop(stream);
                    break;
                }
                sleep(Duration::from_millis(1)).await;
            }
            let _ = open::that(url);
        });
    }

    // Start the server.
    log::debug!("Starting server on {bind}");
    let listener = TcpListener::bind(&bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // The screens are gone; nothing may keep playing.
    playback.release();
    Ok(())
}

async fn stylesheet() -> (StatusCode, [(HeaderName, &'static str); 2], &'static [u8]) {
    let bytes = include_bytes!("style.css");
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/css"),
            (CACHE_CONTROL, "public, max-age=604800, immutable"),
        ],
        bytes,
    )
}

async fn not_found_handler() -> (StatusCode, Html<String>) {
    (StatusCode::NOT_FOUND, Html("Not Found".to_string()))
}
