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

use clap::Parser;

use crate::collection::Collection;
use crate::error::Fallible;
use crate::error::fail;
use crate::generate::build_deck;
use crate::generate::source_from_config;
use crate::types::deck_id::DeckId;
use crate::web::server::start_server;

#[derive(Parser)]
#[command(version, about, long_about = None)]
enum Command {
    /// Serve the web interface.
    Serve {
        /// Optional path to the collection directory.
        directory: Option<String>,
    },
    /// Generate a new deck on a topic.
    New {
        /// What the deck should teach.
        topic: String,
        /// Optional path to the collection directory.
        directory: Option<String>,
    },
    /// List decks.
    List {
        /// Optional path to the collection directory.
        directory: Option<String>,
    },
    /// Delete a deck and all of its cards.
    Delete {
        /// The deck identifier, as shown by `list`.
        deck: String,
        /// Optional path to the collection directory.
        directory: Option<String>,
    },
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Command = Command::parse();
    match cli {
        Command::Serve { directory } => start_server(directory).await,
        Command::New { topic, directory } => new_deck(topic, directory).await,
        Command::List { directory } => list_decks(directory).await,
        Command::Delete { deck, directory } => delete_deck(deck, directory),
    }
}

async fn new_deck(topic: String, directory: Option<String>) -> Fallible<()> {
    let collection = Collection::open(directory)?;
    let source = source_from_config(&collection.config.generator, &collection.media_root)?;
    let (deck, cards) = build_deck(source.as_ref(), &topic).await?;
    collection.store.create_deck(&deck, &cards)?;
    println!("Created deck {} with {} cards.", deck.id, cards.len());
    Ok(())
}

async fn list_decks(directory: Option<String>) -> Fallible<()> {
    let collection = Collection::open(directory)?;
    // The first emission of the deck stream is the current snapshot.
    let decks = collection.store.watch_decks().next().await?;
    if decks.is_empty() {
        println!("No decks.");
        return Ok(());
    }
    for deck in decks {
        let unlearned = collection.store.unlearned_count(deck.id)?;
        println!(
            "{}  {}  {} to review  created {}",
            deck.id,
            deck.topic,
            unlearned,
            deck.created_at.local_human()
        );
    }
    Ok(())
}

fn delete_deck(deck: String, directory: Option<String>) -> Fallible<()> {
    let collection = Collection::open(directory)?;
    let deck_id = DeckId::parse(&deck)?;
    if collection.store.get_deck(deck_id)?.is_none() {
        return fail("no such deck.");
    }
    collection.store.delete_deck(deck_id)?;
    println!("Deleted deck {deck_id}.");
    Ok(())
}
