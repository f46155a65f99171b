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

use crate::types::card_id::CardId;
use crate::types::deck_id::DeckId;
use crate::types::timestamp::Timestamp;

/// One vocabulary item belonging to a deck.
#[derive(Clone, Debug)]
pub struct Card {
    pub id: CardId,
    /// The deck this card belongs to. Every card belongs to exactly one deck.
    pub deck_id: DeckId,
    /// The vocabulary term.
    pub text: String,
    pub translation: Option<String>,
    pub etymology: Option<String>,
    pub mnemonic: Option<String>,
    /// Example sentences, in order.
    pub examples: Vec<String>,
    /// Media-relative path to a pronunciation recording.
    pub audio_path: Option<String>,
    /// The only field mutated during review.
    pub is_known: bool,
    pub created_at: Timestamp,
}
