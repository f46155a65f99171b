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

use crate::types::deck_id::DeckId;
use crate::types::timestamp::Timestamp;

/// A named collection of vocabulary cards on one topic.
#[derive(Clone, Debug)]
pub struct Deck {
    pub id: DeckId,
    /// Free-text label, set at creation.
    pub topic: String,
    pub created_at: Timestamp,
    /// Updated whenever the deck is reviewed.
    pub last_learned_at: Option<Timestamp>,
}

impl Deck {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            id: DeckId::fresh(),
            topic: topic.into(),
            created_at: Timestamp::now(),
            last_learned_at: None,
        }
    }
}
