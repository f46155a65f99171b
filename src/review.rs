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

use crate::db::Store;
use crate::db::UnlearnedCards;
use crate::error::ErrorReport;
use crate::types::card::Card;
use crate::types::card_id::CardId;
use crate::types::deck_id::DeckId;

/// How a card was swiped.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SwipeDirection {
    Known,
    Unknown,
}

/// The result of a swipe.
#[derive(Debug)]
pub enum SwipeOutcome {
    /// The card was removed from its slot.
    Removed {
        card: CardId,
        /// Queue length after the swipe.
        remaining: usize,
        /// Set when the flag could not be persisted. The in-memory queue is
        /// not rolled back; storage catches up on the next refresh.
        persist_error: Option<ErrorReport>,
    },
    /// The position no longer refers to a queue slot. Nothing changed and
    /// nothing was persisted; the caller should refresh its view.
    Stale,
}

/// The review queue for a single deck.
///
/// Holds the unlearned cards as an ordered, mutable queue and interprets
/// swipes as state transitions. Storage is the source of truth: every
/// snapshot from [`Store::watch_unlearned`] replaces the queue wholesale, so
/// a locally requeued card may be reset to its storage-defined position by
/// the next emission.
pub struct ReviewSession {
    deck_id: DeckId,
    store: Store,
    queue: Vec<Card>,
}

impl ReviewSession {
    pub fn new(deck_id: DeckId, store: Store) -> Self {
        Self {
            deck_id,
            store,
            queue: Vec::new(),
        }
    }

    pub fn deck_id(&self) -> DeckId {
        self.deck_id
    }

    /// Subscribe to the storage stream that feeds [`ReviewSession::refresh`].
    pub fn subscribe(&self) -> UnlearnedCards {
        self.store.watch_unlearned(self.deck_id)
    }

    /// Replace the queue with a storage snapshot, discarding any local
    /// requeue order accumulated since the last emission.
    pub fn refresh(&mut self, snapshot: Vec<Card>) {
        self.queue = snapshot;
    }

    /// Process a swipe on the card at `position`.
    ///
    /// Known removes the card for the rest of the session; Unknown moves it
    /// to the back of the queue. Both persist the card's flag. The persist is
    /// fire-and-forget from the queue's perspective: a write failure is
    /// reported in the outcome but the removal stands.
    pub fn swipe(&mut self, position: usize, direction: SwipeDirection) -> SwipeOutcome {
        if position >= self.queue.len() {
            return SwipeOutcome::Stale;
        }
        let mut card = self.queue.remove(position);
        card.is_known = match direction {
            SwipeDirection::Known => true,
            SwipeDirection::Unknown => false,
        };
        let persist_error = self.store.update_card(&card).err();
        if let Some(e) = &persist_error {
            log::error!("Failed to persist card {}: {e}", card.id);
        }
        let card_id = card.id;
        if direction == SwipeDirection::Unknown {
            self.queue.push(card);
        }
        SwipeOutcome::Removed {
            card: card_id,
            remaining: self.queue.len(),
            persist_error,
        }
    }

    /// Number of cards still queued. Zero means the session is complete.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn card_at(&self, position: usize) -> Option<&Card> {
        self.queue.get(position)
    }

    pub fn cards(&self) -> &[Card] {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::error::Fallible;
    use crate::types::deck::Deck;
    use crate::types::timestamp::Timestamp;

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
            translation: None,
            etymology: None,
            mnemonic: None,
            examples: Vec::new(),
            audio_path: None,
            is_known: false,
            created_at: Timestamp::now(),
        }
    }

    fn session_with_cards(store: &Store, texts: &[&str]) -> Fallible<ReviewSession> {
        let deck = Deck::new("Animals");
        let cards: Vec<Card> = texts.iter().map(|text| test_card(deck.id, text)).collect();
        store.create_deck(&deck, &cards)?;
        let mut session = ReviewSession::new(deck.id, store.clone());
        session.refresh(store.unlearned_cards(deck.id)?);
        Ok(session)
    }

    fn texts(session: &ReviewSession) -> Vec<String> {
        session
            .cards()
            .iter()
            .map(|card| card.text.clone())
            .collect()
    }

    #[test]
    fn test_known_removes_exactly_one() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let mut session = session_with_cards(&store, &["a", "b", "c"])?;
        let before = session.queue_len();
        let outcome = session.swipe(1, SwipeDirection::Known);
        match outcome {
            SwipeOutcome::Removed {
                remaining,
                persist_error,
                ..
            } => {
                assert_eq!(remaining, before - 1);
                assert!(persist_error.is_none());
            }
            SwipeOutcome::Stale => panic!("expected removal"),
        }
        assert_eq!(texts(&session), vec!["a", "c"]);
        Ok(())
    }

    #[test]
    fn test_unknown_requeues_to_end() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let mut session = session_with_cards(&store, &["A", "B"])?;
        let first = session.card_at(0).unwrap().clone();
        let outcome = session.swipe(0, SwipeDirection::Unknown);
        match outcome {
            SwipeOutcome::Removed { card, remaining, .. } => {
                assert_eq!(card, first.id);
                assert_eq!(remaining, 2);
            }
            SwipeOutcome::Stale => panic!("expected removal"),
        }
        assert_eq!(texts(&session), vec!["B", "A"]);
        // The flag is persisted as still-unknown.
        assert!(!store.get_card(first.id)?.unwrap().is_known);
        Ok(())
    }

    #[test]
    fn test_unknown_requeue_never_duplicates() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let mut session = session_with_cards(&store, &["a", "b", "c"])?;
        for _ in 0..7 {
            session.swipe(0, SwipeDirection::Unknown);
            assert_eq!(session.queue_len(), 3);
            let mut ids: Vec<CardId> = session.cards().iter().map(|card| card.id).collect();
            ids.sort_by_key(|id| id.to_string());
            ids.dedup();
            assert_eq!(ids.len(), 3);
        }
        Ok(())
    }

    #[test]
    fn test_out_of_range_is_noop() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let mut session = session_with_cards(&store, &["a", "b"])?;
        let before = texts(&session);
        let outcome = session.swipe(2, SwipeDirection::Known);
        assert!(matches!(outcome, SwipeOutcome::Stale));
        assert_eq!(texts(&session), before);
        // No persistence call was issued.
        assert_eq!(store.unlearned_cards(session.deck_id())?.len(), 2);
        assert!(
            store
                .unlearned_cards(session.deck_id())?
                .iter()
                .all(|card| !card.is_known)
        );
        Ok(())
    }

    #[test]
    fn test_swipe_on_empty_queue() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let deck = Deck::new("Empty");
        store.insert_deck(&deck)?;
        let mut session = ReviewSession::new(deck.id, store.clone());
        session.refresh(store.unlearned_cards(deck.id)?);
        assert!(matches!(
            session.swipe(0, SwipeDirection::Known),
            SwipeOutcome::Stale
        ));
        assert_eq!(session.queue_len(), 0);
        Ok(())
    }

    /// Deck of five, swiping Known on position 0 three times: queue shrinks
    /// 5, 4, 3, 2 and the swiped cards' flags are persisted.
    #[test]
    fn test_known_run() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let mut session = session_with_cards(&store, &["v", "w", "x", "y", "z"])?;
        assert_eq!(session.queue_len(), 5);
        let mut swiped = Vec::new();
        for expected in [4, 3, 2] {
            match session.swipe(0, SwipeDirection::Known) {
                SwipeOutcome::Removed { card, remaining, .. } => {
                    assert_eq!(remaining, expected);
                    swiped.push(card);
                }
                SwipeOutcome::Stale => panic!("expected removal"),
            }
        }
        for id in swiped {
            assert!(store.get_card(id)?.unwrap().is_known);
        }
        Ok(())
    }

    #[test]
    fn test_known_card_stays_out_after_refresh() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let mut session = session_with_cards(&store, &["a", "b"])?;
        let first = session.card_at(0).unwrap().id;
        session.swipe(0, SwipeDirection::Known);
        // A storage refresh cannot bring the card back: the flag is already
        // persisted as known.
        session.refresh(store.unlearned_cards(session.deck_id())?);
        assert_eq!(session.queue_len(), 1);
        assert!(session.cards().iter().all(|card| card.id != first));
        Ok(())
    }

    #[test]
    fn test_refresh_resets_local_requeue_order() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let mut session = session_with_cards(&store, &["A", "B"])?;
        session.swipe(0, SwipeDirection::Unknown);
        assert_eq!(texts(&session), vec!["B", "A"]);
        // Storage order wins on refresh. Accepted behavior, not a bug.
        session.refresh(store.unlearned_cards(session.deck_id())?);
        assert_eq!(texts(&session), vec!["A", "B"]);
        Ok(())
    }

    #[test]
    fn test_persist_failure_keeps_removal() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let mut session = session_with_cards(&store, &["a", "b"])?;
        // Make the persist fail by deleting the cards out from under the
        // session.
        store.delete_cards_by_deck(session.deck_id())?;
        match session.swipe(0, SwipeDirection::Known) {
            SwipeOutcome::Removed {
                remaining,
                persist_error,
                ..
            } => {
                assert_eq!(remaining, 1);
                assert!(persist_error.is_some());
            }
            SwipeOutcome::Stale => panic!("expected removal"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_subscribe_feeds_refresh() -> Fallible<()> {
        let (_dir, store) = test_store()?;
        let mut session = session_with_cards(&store, &["a", "b", "c"])?;
        let mut watcher = session.subscribe();
        session.refresh(watcher.next().await?);
        assert_eq!(session.queue_len(), 3);

        session.swipe(0, SwipeDirection::Known);
        session.refresh(watcher.next().await?);
        assert_eq!(session.queue_len(), 2);
        Ok(())
    }
}
