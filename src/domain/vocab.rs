// ============================================================
// Layer 3 — Character Vocabulary
// ============================================================
// Bidirectional mapping between characters and dense ids.
//
// Ids are assigned in sorted character order, so the same
// corpus always produces the same mapping. Once built the
// vocabulary never changes; a checkpoint stores it and a
// resumed run refuses to continue on a corpus whose
// vocabulary differs.
//
// Serialised as the ordered symbol list; the index of a
// symbol in that list is its id.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::error::CharLstmError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    symbols: Vec<char>,
    ids:     HashMap<char, u32>,
}

impl Vocabulary {
    /// Collect every distinct character of `text`
    pub fn from_text(text: &str) -> Self {
        let unique: BTreeSet<char> = text.chars().collect();
        Self::from_symbols(unique.into_iter().collect())
    }

    fn from_symbols(symbols: Vec<char>) -> Self {
        let ids = symbols
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as u32))
            .collect();
        Self { symbols, ids }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn id_of(&self, symbol: char) -> Option<u32> {
        self.ids.get(&symbol).copied()
    }

    pub fn symbol_of(&self, id: u32) -> Option<char> {
        self.symbols.get(id as usize).copied()
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u32>, CharLstmError> {
        text.chars()
            .map(|c| self.id_of(c).ok_or(CharLstmError::UnknownSymbol(c)))
            .collect()
    }

    pub fn decode(&self, ids: &[u32]) -> Result<String, CharLstmError> {
        ids.iter()
            .map(|&id| {
                self.symbol_of(id).ok_or(CharLstmError::UnknownId {
                    id,
                    size: self.len(),
                })
            })
            .collect()
    }

    /// Fails unless `checkpoint` maps every symbol to the same id as `self`.
    pub fn ensure_matches(&self, checkpoint: &Vocabulary) -> Result<(), CharLstmError> {
        if self == checkpoint {
            return Ok(());
        }

        let first_difference = self
            .symbols
            .iter()
            .zip(&checkpoint.symbols)
            .position(|(a, b)| a != b)
            .map(|i| {
                format!(
                    "id {i}: corpus {:?} vs checkpoint {:?}",
                    self.symbols[i], checkpoint.symbols[i]
                )
            })
            .unwrap_or_else(|| "one vocabulary extends the other".to_string());

        Err(CharLstmError::VocabularyMismatch {
            checkpoint_size: checkpoint.len(),
            corpus_size:     self.len(),
            first_difference,
        })
    }
}

impl Serialize for Vocabulary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.symbols.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Vocabulary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let symbols = Vec::<char>::deserialize(deserializer)?;
        let unique: BTreeSet<char> = symbols.iter().copied().collect();
        if unique.len() != symbols.len() {
            return Err(serde::de::Error::custom("duplicate symbol in vocabulary"));
        }
        Ok(Self::from_symbols(symbols))
    }
}
