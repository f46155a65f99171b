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

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::GeneratorBackend;
use crate::config::GeneratorConfig;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;
use crate::media::audio_file_name;
use crate::types::card::Card;
use crate::types::card_id::CardId;
use crate::types::deck::Deck;
use crate::types::deck_id::DeckId;
use crate::types::timestamp::Timestamp;

/// The field separator in generated vocabulary text.
pub const FIELD_DELIMITER: &str = "###";

/// The number of `###`-separated fields in a well-formed vocabulary line.
const FIELD_COUNT: usize = 5;

/// A vocabulary item as produced by a generator, before it becomes a card.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VocabularyItem {
    pub text: String,
    pub translation: String,
    pub example: String,
    pub etymology: Option<String>,
    pub mnemonic: Option<String>,
    pub audio_path: Option<String>,
}

impl VocabularyItem {
    pub fn into_card(self, deck_id: DeckId) -> Card {
        Card {
            id: CardId::fresh(),
            deck_id,
            text: self.text,
            translation: Some(self.translation),
            etymology: self.etymology,
            mnemonic: self.mnemonic,
            examples: vec![self.example],
            audio_path: self.audio_path,
            is_known: false,
            created_at: Timestamp::now(),
        }
    }
}

/// Something that can produce vocabulary items for a topic. One call per
/// deck; a failed call surfaces a single error to the caller, no retries.
#[async_trait]
pub trait VocabularySource: Send + Sync {
    async fn generate(&self, topic: &str) -> Fallible<Vec<VocabularyItem>>;
}

/// Validate a topic and turn a generator's output into a deck with cards.
pub async fn build_deck(source: &dyn VocabularySource, topic: &str) -> Fallible<(Deck, Vec<Card>)> {
    let topic = topic.trim();
    if topic.is_empty() {
        return fail("topic must not be empty.");
    }
    let items = source.generate(topic).await?;
    if items.is_empty() {
        return fail("the vocabulary source produced no items.");
    }
    let deck = Deck::new(topic);
    let cards = items
        .into_iter()
        .map(|item| item.into_card(deck.id))
        .collect();
    Ok((deck, cards))
}

/// Construct the generator named by the configuration.
pub fn source_from_config(
    config: &GeneratorConfig,
    media_root: &Path,
) -> Fallible<Arc<dyn VocabularySource>> {
    match config.backend {
        GeneratorBackend::Canned => Ok(Arc::new(CannedVocabularySource::new(
            media_root.to_path_buf(),
        ))),
        GeneratorBackend::Http => {
            let endpoint = match &config.endpoint {
                Some(endpoint) => endpoint.clone(),
                None => return fail("generator.endpoint is required for the http backend."),
            };
            let model = match &config.model {
                Some(model) => model.clone(),
                None => return fail("generator.model is required for the http backend."),
            };
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                ErrorReport::new(format!(
                    "environment variable {} is not set.",
                    config.api_key_env
                ))
            })?;
            Ok(Arc::new(HttpVocabularySource::new(
                endpoint,
                model,
                api_key,
                config.items,
            )))
        }
    }
}

/// Parse a raw text completion into vocabulary items.
///
/// One item per line: `text ### translation ### example ### etymology ###
/// mnemonic`, split on the first four delimiters. Lines with the wrong field
/// count or an empty required field are logged and skipped.
pub fn parse_completion(text: &str) -> Vec<VocabularyItem> {
    let mut items = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line
            .splitn(FIELD_COUNT, FIELD_DELIMITER)
            .map(|field| field.trim())
            .collect();
        if fields.len() != FIELD_COUNT {
            log::warn!("Skipping malformed vocabulary line: {line}");
            continue;
        }
        if fields[0].is_empty() || fields[1].is_empty() || fields[2].is_empty() {
            log::warn!("Skipping vocabulary line with an empty required field: {line}");
            continue;
        }
        items.push(VocabularyItem {
            text: fields[0].to_string(),
            translation: fields[1].to_string(),
            example: fields[2].to_string(),
            etymology: non_empty(fields[3]),
            mnemonic: non_empty(fields[4]),
            audio_path: None,
        });
    }
    items
}

fn non_empty(field: &str) -> Option<String> {
    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}

/// A generator backed by an OpenAI-style chat completions endpoint.
pub struct HttpVocabularySource {
    endpoint: String,
    model: String,
    api_key: String,
    items: usize,
    client: reqwest::Client,
}

impl HttpVocabularySource {
    pub fn new(endpoint: String, model: String, api_key: String, items: usize) -> Self {
        Self {
            endpoint,
            model,
            api_key,
            items,
            client: reqwest::Client::new(),
        }
    }

    fn prompt(&self, topic: &str) -> String {
        format!(
            "Generate {count} vocabulary flashcards for a learner studying: {topic}. \
             Write exactly one item per line, fields separated by '{delim}', in this order: \
             term {delim} translation {delim} example sentence {delim} etymology {delim} mnemonic. \
             Leave etymology or mnemonic blank if you have nothing useful. \
             Output the lines and nothing else.",
            count = self.items,
            delim = FIELD_DELIMITER,
        )
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl VocabularySource for HttpVocabularySource {
    async fn generate(&self, topic: &str) -> Fallible<Vec<VocabularyItem>> {
        log::debug!("Requesting vocabulary for topic: {topic}");
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": self.prompt(topic) },
            ],
        });
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return fail(format!("vocabulary request failed: {status}."));
        }
        let completion: ChatCompletion = response.json().await?;
        let content = match completion.choices.first() {
            Some(choice) => &choice.message.content,
            None => return fail("the generator returned no completion."),
        };
        let items = parse_completion(content);
        if items.is_empty() {
            return fail("the generator returned no usable vocabulary items.");
        }
        Ok(items)
    }
}

/// A fixed offline generator, used when no endpoint is configured and by the
/// test suite. Attaches pronunciation audio when a matching file exists in
/// the media directory.
pub struct CannedVocabularySource {
    media_root: PathBuf,
}

const CANNED_ITEMS: &[(&str, &str, &str, &str, &str)] = &[
    (
        "la casa",
        "the house",
        "La casa tiene un jardín pequeño.",
        "From Latin 'casa', a hut or cottage.",
        "",
    ),
    (
        "el perro",
        "the dog",
        "El perro duerme junto a la puerta.",
        "",
        "A dog chasing a PERRing cat.",
    ),
    (
        "la manzana",
        "the apple",
        "Como una manzana cada mañana.",
        "From Latin 'matiana', a kind of apple.",
        "",
    ),
    (
        "el libro",
        "the book",
        "Este libro es difícil de soltar.",
        "From Latin 'liber', the inner bark once written on.",
        "A LIBRary is full of libros.",
    ),
    (
        "la ventana",
        "the window",
        "Abre la ventana, hace calor.",
        "From Latin 'ventus', wind.",
        "The VENT in ventana lets the wind in.",
    ),
    (
        "el camino",
        "the road",
        "El camino al pueblo cruza el río.",
        "",
        "",
    ),
    (
        "la ciudad",
        "the city",
        "La ciudad nunca duerme.",
        "From Latin 'civitas', citizenry.",
        "",
    ),
    (
        "el tiempo",
        "time; weather",
        "No tengo tiempo para eso.",
        "From Latin 'tempus'.",
        "Tempo keeps time.",
    ),
];

impl CannedVocabularySource {
    pub fn new(media_root: PathBuf) -> Self {
        Self { media_root }
    }
}

#[async_trait]
impl VocabularySource for CannedVocabularySource {
    async fn generate(&self, topic: &str) -> Fallible<Vec<VocabularyItem>> {
        log::debug!("Serving canned vocabulary for topic: {topic}");
        let items = CANNED_ITEMS
            .iter()
            .map(|(text, translation, example, etymology, mnemonic)| VocabularyItem {
                text: text.to_string(),
                translation: translation.to_string(),
                example: example.to_string(),
                etymology: non_empty(etymology),
                mnemonic: non_empty(mnemonic),
                audio_path: audio_file_name(&self.media_root, text),
            })
            .collect();
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed() {
        let text = "la casa ### the house ### La casa es grande. ### From Latin 'casa'. ### \n\
                    el perro ### the dog ### El perro ladra. ###  ### A PERRing cat.";
        let items = parse_completion(text);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "la casa");
        assert_eq!(items[0].translation, "the house");
        assert_eq!(items[0].example, "La casa es grande.");
        assert_eq!(items[0].etymology.as_deref(), Some("From Latin 'casa'."));
        assert!(items[0].mnemonic.is_none());
        assert!(items[1].etymology.is_none());
        assert_eq!(items[1].mnemonic.as_deref(), Some("A PERRing cat."));
    }

    #[test]
    fn test_parse_skips_wrong_field_count() {
        let text = "just some chatter\nla casa ### the house ### La casa es grande. ###  ### ";
        let items = parse_completion(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "la casa");
    }

    #[test]
    fn test_parse_skips_empty_required_field() {
        let text = " ### the house ### La casa es grande. ###  ### \n\
                    la casa ###  ### La casa es grande. ###  ### \n\
                    la casa ### the house ###  ###  ### ";
        assert!(parse_completion(text).is_empty());
    }

    #[test]
    fn test_parse_extra_delimiters_fold_into_last_field() {
        // Only the first four delimiters split; the rest is mnemonic text.
        let text = "a ### b ### c ### d ### e ### f";
        let items = parse_completion(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].mnemonic.as_deref(), Some("e ### f"));
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_completion("").is_empty());
        assert!(parse_completion("\n  \n").is_empty());
    }

    #[test]
    fn test_into_card() {
        let deck_id = DeckId::fresh();
        let item = VocabularyItem {
            text: "la casa".to_string(),
            translation: "the house".to_string(),
            example: "La casa es grande.".to_string(),
            etymology: None,
            mnemonic: None,
            audio_path: Some("la-casa.mp3".to_string()),
        };
        let card = item.into_card(deck_id);
        assert_eq!(card.deck_id, deck_id);
        assert_eq!(card.text, "la casa");
        assert_eq!(card.translation.as_deref(), Some("the house"));
        assert_eq!(card.examples, vec!["La casa es grande.".to_string()]);
        assert_eq!(card.audio_path.as_deref(), Some("la-casa.mp3"));
        assert!(!card.is_known);
    }

    struct FixedSource {
        items: Vec<VocabularyItem>,
    }

    #[async_trait]
    impl VocabularySource for FixedSource {
        async fn generate(&self, _topic: &str) -> Fallible<Vec<VocabularyItem>> {
            Ok(self.items.clone())
        }
    }

    fn fixed_item(text: &str) -> VocabularyItem {
        VocabularyItem {
            text: text.to_string(),
            translation: format!("{text} (translated)"),
            example: format!("A sentence with {text}."),
            etymology: None,
            mnemonic: None,
            audio_path: None,
        }
    }

    #[tokio::test]
    async fn test_build_deck() -> Fallible<()> {
        let source = FixedSource {
            items: vec![fixed_item("uno"), fixed_item("dos")],
        };
        let (deck, cards) = build_deck(&source, "  Numbers  ").await?;
        assert_eq!(deck.topic, "Numbers");
        assert_eq!(cards.len(), 2);
        assert!(cards.iter().all(|card| card.deck_id == deck.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_build_deck_rejects_empty_topic() {
        let source = FixedSource { items: vec![] };
        let result = build_deck(&source, "   ").await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "error: topic must not be empty."
        );
    }

    #[tokio::test]
    async fn test_build_deck_rejects_empty_generation() {
        let source = FixedSource { items: vec![] };
        let result = build_deck(&source, "Numbers").await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "error: the vocabulary source produced no items."
        );
    }

    #[tokio::test]
    async fn test_canned_source_is_nonempty() -> Fallible<()> {
        let source = CannedVocabularySource::new(std::env::temp_dir());
        let items = source.generate("anything").await?;
        assert!(!items.is_empty());
        assert!(items.iter().all(|item| !item.text.is_empty()));
        Ok(())
    }
}
