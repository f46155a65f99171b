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
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::config::DbConfig;
use rusqlite::types::Type;
use tokio::sync::watch;

use crate::error::Fallible;
use crate::error::fail;
use crate::types::card::Card;
use crate::types::card_id::CardId;
use crate::types::deck::Deck;
use crate::types::deck_id::DeckId;
use crate::types::timestamp::Timestamp;

/// Persistent storage for decks and cards.
///
/// Every committed write bumps a generation counter on a watch channel, which
/// is how subscriptions learn that their snapshot is out of date.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    generation: Arc<watch::Sender<u64>>,
}

impl Store {
    pub fn open(database_path: &str) -> Fallible<Self> {
        let mut conn = Connection::open(database_path)?;
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)?;
        {
            let tx = conn.transaction()?;
            if !probe_schema_exists(&tx)? {
                tx.execute_batch(include_str!("schema.sql"))?;
                tx.commit()?;
            }
        }
        let conn = Arc::new(Mutex::new(conn));
        let (generation, _) = watch::channel(0u64);
        Ok(Self {
            conn,
            generation: Arc::new(generation),
        })
    }

    /// Add a new deck to the database.
    pub fn insert_deck(&self, deck: &Deck) -> Fallible<()> {
        {
            let conn = self.acquire();
            insert_deck(&conn, deck)?;
        }
        self.bump();
        Ok(())
    }

    /// Add a batch of cards to the database.
    pub fn insert_cards(&self, cards: &[Card]) -> Fallible<()> {
        {
            let mut conn = self.acquire();
            let tx = conn.transaction()?;
            for card in cards {
                insert_card(&tx, card)?;
            }
            tx.commit()?;
        }
        self.bump();
        Ok(())
    }

    /// Persist a deck and its cards in one transaction. Nothing is written
    /// if any insert fails.
    pub fn create_deck(&self, deck: &Deck, cards: &[Card]) -> Fallible<()> {
        log::debug!("Creating deck {} with {} cards.", deck.id, cards.len());
        {
            let mut conn = self.acquire();
            let tx = conn.transaction()?;
            insert_deck(&tx, deck)?;
            for card in cards {
                insert_card(&tx, card)?;
            }
            tx.commit()?;
        }
        self.bump();
        Ok(())
    }

    /// Persist a card's learning flag.
    pub fn update_card(&self, card: &Card) -> Fallible<()> {
        let changed = {
            let conn = self.acquire();
            let sql = "update cards set is_known = ? where card_id = ?;";
            conn.execute(sql, (card.is_known, card.id))?
        };
        if changed == 0 {
            return fail("no such card.");
        }
        self.bump();
        Ok(())
    }

    /// Record review activity against a deck.
    pub fn touch_deck(&self, deck_id: DeckId, at: Timestamp) -> Fallible<()> {
        let changed = {
            let conn = self.acquire();
            let sql = "update decks set last_learned_at = ? where deck_id = ?;";
            conn.execute(sql, (at, deck_id))?
        };
        if changed == 0 {
            return fail("no such deck.");
        }
        self.bump();
        Ok(())
    }

    /// Delete a deck. Its cards go with it.
    pub fn delete_deck(&self, deck_id: DeckId) -> Fallible<()> {
        let changed = {
            let conn = self.acquire();
            conn.execute("delete from decks where deck_id = ?;", [deck_id])?
        };
        if changed == 0 {
            return fail("no such deck.");
        }
        self.bump();
        Ok(())
    }

    /// Delete every card in a deck, leaving the deck itself in place.
    pub fn delete_cards_by_deck(&self, deck_id: DeckId) -> Fallible<()> {
        {
            let conn = self.acquire();
            conn.execute("delete from cards where deck_id = ?;", [deck_id])?;
        }
        self.bump();
        Ok(())
    }

    pub fn get_deck(&self, deck_id: DeckId) -> Fallible<Option<Deck>> {
        let conn = self.acquire();
        let sql = "select deck_id, topic, created_at, last_learned_at from decks where deck_id = ?;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([deck_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(read_deck(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_card(&self, card_id: CardId) -> Fallible<Option<Card>> {
        let conn = self.acquire();
        let sql = format!("select {CARD_COLUMNS} from cards where card_id = ?;");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([card_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(read_card(row)?)),
            None => Ok(None),
        }
    }

    /// All decks, newest first.
    pub fn list_decks(&self) -> Fallible<Vec<Deck>> {
        let conn = self.acquire();
        let sql = "select deck_id, topic, created_at, last_learned_at from decks order by created_at desc, rowid desc;";
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut decks = Vec::new();
        while let Some(row) = rows.next()? {
            decks.push(read_deck(row)?);
        }
        Ok(decks)
    }

    /// The unlearned cards of a deck, oldest-created first.
    pub fn unlearned_cards(&self, deck_id: DeckId) -> Fallible<Vec<Card>> {
        let conn = self.acquire();
        let sql = format!(
            "select {CARD_COLUMNS} from cards where deck_id = ? and is_known = 0 order by created_at asc, rowid asc;"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([deck_id])?;
        let mut cards = Vec::new();
        while let Some(row) = rows.next()? {
            cards.push(read_card(row)?);
        }
        Ok(cards)
    }

    pub fn unlearned_count(&self, deck_id: DeckId) -> Fallible<usize> {
        let conn = self.acquire();
        let sql = "select count(*) from cards where deck_id = ? and is_known = 0;";
        let count: i64 = conn.query_row(sql, [deck_id], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Subscribe to the unlearned cards of a deck. The first `next` returns
    /// the current snapshot; each later one waits for a committed change and
    /// returns a full replacement snapshot.
    pub fn watch_unlearned(&self, deck_id: DeckId) -> UnlearnedCards {
        UnlearnedCards {
            store: self.clone(),
            deck_id,
            rx: self.generation.subscribe(),
            primed: false,
        }
    }

    /// Subscribe to the deck list, with the same snapshot semantics as
    /// [`Store::watch_unlearned`].
    pub fn watch_decks(&self) -> Decks {
        Decks {
            store: self.clone(),
            rx: self.generation.subscribe(),
            primed: false,
        }
    }

    fn bump(&self) {
        self.generation.send_modify(|g| *g += 1);
    }

    fn acquire(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

/// A restartable subscription to a deck's unlearned cards.
pub struct UnlearnedCards {
    store: Store,
    deck_id: DeckId,
    rx: watch::Receiver<u64>,
    primed: bool,
}

impl UnlearnedCards {
    pub async fn next(&mut self) -> Fallible<Vec<Card>> {
        if self.primed {
            if self.rx.changed().await.is_err() {
                return fail("store closed.");
            }
        } else {
            self.primed = true;
        }
        self.store.unlearned_cards(self.deck_id)
    }
}

/// A restartable subscription to the deck list.
pub struct Decks {
    store: Store,
    rx: watch::Receiver<u64>,
    primed: bool,
}

impl Decks {
    pub async fn next(&mut self) -> Fallible<Vec<Deck>> {
        if self.primed {
            if self.rx.changed().await.is_err() {
                return fail("store closed.");
            }
        } else {
            self.primed = true;
        }
        self.store.list_decks()
    }
}

const CARD_COLUMNS: &str = "card_id, deck_id, text, translation, etymology, mnemonic, examples, audio_path, is_known, created_at";

fn insert_deck(conn: &Connection, deck: &Deck) -> Fallible<()> {
    let sql =
        "insert into decks (deck_id, topic, created_at, last_learned_at) values (?, ?, ?, ?);";
    conn.execute(
        sql,
        (deck.id, &deck.topic, deck.created_at, deck.last_learned_at),
    )?;
    Ok(())
}

fn insert_card(tx: &Transaction, card: &Card) -> Fallible<()> {
    let examples = serde_json::to_string(&card.examples)?;
    let sql = format!("insert into cards ({CARD_COLUMNS}) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?);");
    tx.execute(
        &sql,
        (
            card.id,
            card.deck_id,
            &card.text,
            &card.translation,
            &card.etymology,
            &card.mnemonic,
            examples,
            &card.audio_path,
            card.is_known,
            card.created_at,
        ),
    )?;
    Ok(())
}

fn read_deck(row: &Row) -> rusqlite::Result<Deck> {
    Ok(Deck {
        id: row.get(0)?,
        topic: row.get(1)?,
        created_at: row.get(2)?,
        last_learned_at: row.get(3)?,
    })
}

fn read_card(row: &Row) -> rusqlite::Result<Card> {
    let examples: String = row.get(6)?;
    let examples: Vec<String> = serde_json::from_str(&examples)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    Ok(Card {
        id: row.get(0)?,
        deck_id: row.get(1)?,
        text: row.get(2)?,
        translation: row.get(3)?,
        etymology: row.get(4)?,
        mnemonic: row.get(5)?,
        examples,
        audio_path: row.get(7)?,
        is_known: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn probe_schema_exists(tx: &Transaction) -> Fallible<bool> {
    let sql = "select count(*) from sqlite_master where type='table' AND name=?;";
    let count: i64 = tx.query_row(sql, ["cards"], |row| row.get(0))?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::types::card_id::CardId;

    fn test_store() -> Fallible<(TempDir, Store)> {
        let dir = TempDir::new()?;
        let path = dir.path().join("lexideck.db");
        let store = Store::open(path.to_str().unwrap())?;
        Ok((dir, store))
    }

    fn test_card(deck_id: DeckId, text: &str) -> Card {
        Card {
            id: CardId::fresh(),
            deck_id,
            text: text.to_string(),
            translation: Some(format!("{text} (translated)")),
            etymology: None,
            mnemonic: None,
            examples: vec![format!("A sentence with {text}.")],
            audio_path: None,
            is_known: false,
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn test_insert_and_get_deck() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let deck = Deck::new("Animals");
        store.insert_deck(&deck)?;
        let loaded = store.get_deck(deck.id)?.unwrap();
        assert_eq!(loaded.topic, "Animals");
        assert!(loaded.last_learned_at.is_none());
        Ok(())
    }

    #[test]
    fn test_insert_cards_separately() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let deck = Deck::new("Weather");
        store.insert_deck(&deck)?;
        let cards = vec![test_card(deck.id, "la lluvia"), test_card(deck.id, "el sol")];
        store.insert_cards(&cards)?;
        assert_eq!(store.unlearned_count(deck.id)?, 2);
        Ok(())
    }

    #[test]
    fn test_cards_require_existing_deck() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let orphan = test_card(DeckId::fresh(), "nowhere");
        assert!(store.insert_cards(&[orphan]).is_err());
        Ok(())
    }

    #[test]
    fn test_unlearned_cards_order_and_flags() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let deck = Deck::new("Animals");
        let cards: Vec<Card> = ["el gato", "el perro", "el pez"]
            .iter()
            .map(|text| test_card(deck.id, text))
            .collect();
        store.create_deck(&deck, &cards)?;

        let unlearned = store.unlearned_cards(deck.id)?;
        assert_eq!(unlearned.len(), 3);
        assert!(unlearned.iter().all(|card| !card.is_known));
        let texts: Vec<&str> = unlearned.iter().map(|card| card.text.as_str()).collect();
        assert_eq!(texts, vec!["el gato", "el perro", "el pez"]);
        Ok(())
    }

    #[test]
    fn test_update_card_persists_flag() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let deck = Deck::new("Animals");
        let mut card = test_card(deck.id, "el gato");
        store.create_deck(&deck, std::slice::from_ref(&card))?;

        card.is_known = true;
        store.update_card(&card)?;
        let loaded = store.get_card(card.id)?.unwrap();
        assert!(loaded.is_known);
        assert!(store.unlearned_cards(deck.id)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_update_missing_card() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let card = test_card(DeckId::fresh(), "ghost");
        assert!(store.update_card(&card).is_err());
        Ok(())
    }

    #[test]
    fn test_delete_deck_cascades() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let deck = Deck::new("Animals");
        let card = test_card(deck.id, "el gato");
        store.create_deck(&deck, &[card.clone()])?;

        store.delete_deck(deck.id)?;
        assert!(store.get_deck(deck.id)?.is_none());
        assert!(store.get_card(card.id)?.is_none());
        Ok(())
    }

    #[test]
    fn test_delete_cards_keeps_deck() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let deck = Deck::new("Animals");
        let card = test_card(deck.id, "el gato");
        store.create_deck(&deck, &[card])?;

        store.delete_cards_by_deck(deck.id)?;
        assert!(store.get_deck(deck.id)?.is_some());
        assert_eq!(store.unlearned_count(deck.id)?, 0);
        Ok(())
    }

    #[test]
    fn test_list_decks_newest_first() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        store.insert_deck(&Deck::new("first"))?;
        store.insert_deck(&Deck::new("second"))?;
        let decks = store.list_decks()?;
        assert_eq!(decks.len(), 2);
        assert_eq!(decks[0].topic, "second");
        assert_eq!(decks[1].topic, "first");
        Ok(())
    }

    #[test]
    fn test_touch_deck() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let deck = Deck::new("Animals");
        store.insert_deck(&deck)?;
        store.touch_deck(deck.id, Timestamp::now())?;
        let loaded = store.get_deck(deck.id)?.unwrap();
        assert!(loaded.last_learned_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_watch_unlearned_emits_snapshots() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let deck = Deck::new("Animals");
        let cards: Vec<Card> = ["uno", "dos", "tres"]
            .iter()
            .map(|text| test_card(deck.id, text))
            .collect();
        store.create_deck(&deck, &cards)?;

        let mut watcher = store.watch_unlearned(deck.id);
        let snapshot = watcher.next().await?;
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.iter().all(|card| !card.is_known));

        let mut known = snapshot[0].clone();
        known.is_known = true;
        store.update_card(&known)?;

        let snapshot = watcher.next().await?;
        assert_eq!(snapshot.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_watch_decks_emits_snapshots() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let mut watcher = store.watch_decks();
        assert!(watcher.next().await?.is_empty());

        store.insert_deck(&Deck::new("Animals"))?;
        let decks = watcher.next().await?;
        assert_eq!(decks.len(), 1);
        Ok(())
    }
}
