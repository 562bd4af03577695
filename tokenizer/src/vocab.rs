//! Vocabulary management for the byte-level BPE tokenizer.
//!
//! The vocabulary starts with 256 byte tokens (0x00-0xFF) and grows
//! by appending merged symbols during training. IDs are dense and never
//! renumbered: ID `n` always refers to the `n`-th symbol ever created.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, TokenizerError};

/// Number of single-byte symbols every trained vocabulary starts with.
pub const BASE_ALPHABET_SIZE: usize = 256;

/// A single merge rule: (left, right) → merged.
///
/// `merged` is always greater than both `left` and `right`, so rules can be
/// replayed in one forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergeRule {
    pub left: u32,
    pub right: u32,
    pub merged: u32,
}

/// The complete BPE vocabulary.
///
/// Structure:
/// - IDs 0-255: raw byte tokens (once the base alphabet is initialized)
/// - IDs 256..: merged tokens, in the order the merges were learned
#[derive(Debug, Clone, Default)]
pub struct Vocab {
    /// Token ID → byte sequence mapping (dense, indexed by ID)
    pub(crate) id_to_bytes: Vec<Vec<u8>>,

    /// Byte sequence → token ID mapping (for encoding)
    pub(crate) bytes_to_id: HashMap<Vec<u8>, u32>,

    /// Ordered list of merge rules, in learning order
    pub(crate) merges: Vec<MergeRule>,

    /// Merge pair → merged ID, derived from `merges`
    pub(crate) merge_table: HashMap<(u32, u32), u32>,
}

/// Returns `true` for the bytes that separate words.
///
/// This is the C-locale `isspace` set: space, `\t`, `\n`, `\v`, `\f`, `\r`.
pub fn is_word_delimiter(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == 0x0B
}

/// Split raw bytes into whitespace-delimited words, dropping empty runs.
///
/// Training and encoding share this rule, so merges never span a word
/// boundary.
pub fn split_words(text: &[u8]) -> impl Iterator<Item = &[u8]> {
    text.split(|&b| is_word_delimiter(b))
        .filter(|word| !word.is_empty())
}

impl Vocab {
    /// Create an empty vocabulary. The base alphabet is added on first training.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a vocabulary holding only the 256 byte tokens.
    pub fn with_base_alphabet() -> Self {
        let mut vocab = Self::new();
        vocab.init_base_alphabet();
        vocab
    }

    /// Seed the 256 byte tokens (ID = byte value). Does nothing if the
    /// vocabulary already has symbols.
    pub fn init_base_alphabet(&mut self) {
        if !self.id_to_bytes.is_empty() {
            return;
        }

        self.id_to_bytes.reserve(BASE_ALPHABET_SIZE);
        self.bytes_to_id.reserve(BASE_ALPHABET_SIZE);
        for byte_val in 0..=u8::MAX {
            let bytes = vec![byte_val];
            self.bytes_to_id.insert(bytes.clone(), byte_val as u32);
            self.id_to_bytes.push(bytes);
        }
    }

    /// Current number of symbols.
    pub fn len(&self) -> usize {
        self.id_to_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_bytes.is_empty()
    }

    /// Look up the ID of a byte string.
    ///
    /// If several IDs hold the same bytes, this returns the most recently
    /// created one.
    pub fn id_of(&self, bytes: &[u8]) -> Result<u32> {
        self.bytes_to_id
            .get(bytes)
            .copied()
            .ok_or_else(|| TokenizerError::UnknownSymbol(bytes.to_vec()))
    }

    /// Look up the byte string of an ID.
    pub fn symbol(&self, id: u32) -> Result<&[u8]> {
        self.id_to_bytes
            .get(id as usize)
            .map(Vec::as_slice)
            .ok_or(TokenizerError::InvalidId {
                id,
                len: self.id_to_bytes.len(),
            })
    }

    /// Learned merge rules in learning order.
    pub fn merges(&self) -> &[MergeRule] {
        &self.merges
    }

    /// The merged ID for an adjacent pair, if a rule exists.
    pub fn merge_for(&self, left: u32, right: u32) -> Option<u32> {
        self.merge_table.get(&(left, right)).copied()
    }

    /// Append a symbol with the next sequential ID.
    ///
    /// If the byte string already exists, the reverse map is repointed at the
    /// new ID; the older ID still decodes to the same bytes.
    pub fn add_symbol(&mut self, bytes: Vec<u8>) -> Result<u32> {
        let id = u32::try_from(self.id_to_bytes.len()).map_err(|_| {
            TokenizerError::InvalidArgument("vocabulary exceeds the 32-bit ID space".into())
        })?;

        self.bytes_to_id.insert(bytes.clone(), id);
        self.id_to_bytes.push(bytes);
        Ok(id)
    }

    /// Add a merge rule: merging `left` + `right` creates a new token.
    ///
    /// Returns the new token's ID.
    pub fn add_merge(&mut self, left: u32, right: u32) -> Result<u32> {
        if let Some(existing) = self.merge_for(left, right) {
            return Err(TokenizerError::InvalidArgument(format!(
                "pair ({left}, {right}) is already merged into {existing}"
            )));
        }

        // Build the byte sequence for the merged token
        let mut merged_bytes = self.symbol(left)?.to_vec();
        merged_bytes.extend_from_slice(self.symbol(right)?);

        let merged = self.add_symbol(merged_bytes)?;
        self.merges.push(MergeRule {
            left,
            right,
            merged,
        });
        self.merge_table.insert((left, right), merged);

        Ok(merged)
    }

    /// Rebuild the pair lookup table from the ordered rule sequence.
    pub fn rebuild_merge_table(&mut self) {
        self.merge_table.clear();
        self.merge_table.reserve(self.merges.len());
        for rule in &self.merges {
            self.merge_table.insert((rule.left, rule.right), rule.merged);
        }
    }

    /// Encode text into token IDs using the learned merges.
    ///
    /// Whitespace only separates words; it is not tokenized, so the
    /// decoded output has no separators between words.
    pub fn encode(&self, text: &[u8]) -> Result<Vec<u32>> {
        let mut tokens = Vec::with_capacity(text.len());
        for word in split_words(text) {
            tokens.extend(self.encode_word(word)?);
        }
        Ok(tokens)
    }

    /// Encode a single word (no whitespace splitting).
    ///
    /// Algorithm:
    /// 1. Start with one token per byte
    /// 2. Scan from the left and merge the first pair that has a rule
    /// 3. Restart the scan; stop when a full scan finds nothing to merge
    pub fn encode_word(&self, word: &[u8]) -> Result<Vec<u32>> {
        let mut tokens = word
            .iter()
            .map(|&b| self.id_of(&[b]))
            .collect::<Result<Vec<u32>>>()?;
        self.apply_merges(&mut tokens);
        Ok(tokens)
    }

    /// Encode many texts in parallel. The vocabulary is only read.
    pub fn encode_batch(&self, texts: &[&[u8]]) -> Result<Vec<Vec<u32>>> {
        texts.par_iter().map(|text| self.encode(text)).collect()
    }

    /// Reduce a token sequence with the merge table until no adjacent pair
    /// has a rule. Quadratic in the word length.
    pub(crate) fn apply_merges(&self, tokens: &mut Vec<u32>) {
        while let Some((idx, merged)) = self.first_mergeable(tokens) {
            tokens[idx] = merged;
            tokens.remove(idx + 1);
        }
    }

    fn first_mergeable(&self, tokens: &[u32]) -> Option<(usize, u32)> {
        tokens
            .windows(2)
            .enumerate()
            .find_map(|(idx, pair)| self.merge_for(pair[0], pair[1]).map(|m| (idx, m)))
    }

    /// Decode token IDs back to bytes, rejecting output that is not UTF-8.
    ///
    /// Validation is strict UTF-8: overlong forms, surrogates and code points
    /// above U+10FFFF are rejected along with bad or truncated sequences.
    pub fn decode(&self, ids: &[u32]) -> Result<Vec<u8>> {
        let bytes = self.concat_symbols(ids)?;
        std::str::from_utf8(&bytes)?;
        Ok(bytes)
    }

    /// Decode token IDs to a UTF-8 string.
    pub fn decode_to_string(&self, ids: &[u32]) -> Result<String> {
        let bytes = self.concat_symbols(ids)?;
        String::from_utf8(bytes).map_err(|e| TokenizerError::InvalidEncoding(e.utf8_error()))
    }

    /// Decode token IDs to a string, replacing invalid UTF-8 with U+FFFD.
    ///
    /// Out-of-range IDs are still an error.
    pub fn decode_lossy(&self, ids: &[u32]) -> Result<String> {
        let bytes = self.concat_symbols(ids)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn concat_symbols(&self, ids: &[u32]) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(ids.len() * 2);
        for &id in ids {
            bytes.extend_from_slice(self.symbol(id)?);
        }
        Ok(bytes)
    }
}
