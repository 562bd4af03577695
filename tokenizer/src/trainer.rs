//! BPE Tokenizer Training
//!
//! Trains a byte-level BPE tokenizer by iteratively finding and merging
//! the most frequent adjacent symbol pairs in a text corpus.
//!
//! Algorithm:
//! 1. Split the corpus into whitespace-delimited words
//! 2. Represent every word as a sequence of byte-token IDs
//! 3. Count all adjacent pair frequencies across all words
//! 4. Merge the most frequent pair, creating a new token
//! 5. Rewrite every word with the new token
//! 6. Repeat until the target vocabulary size is reached or no pair is left
//!
//! Pair counts live in an ordered map, and the first pair (lexicographic by
//! `(left, right)`) with the highest count wins a tie. The same corpus and
//! target therefore always produce the same merges.

use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::error::{Result, TokenizerError};
use crate::vocab::{split_words, Vocab, BASE_ALPHABET_SIZE};

/// Configuration for BPE training.
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Target vocabulary size (including the 256 base bytes). Must exceed 256.
    pub vocab_size: u32,
    /// Minimum frequency for a pair to be considered for merging
    pub min_frequency: u64,
    /// Log progress every N merges (0 disables progress lines)
    pub log_interval: u32,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            vocab_size: 32768,
            min_frequency: 1,
            log_interval: 1000,
        }
    }
}

/// A word in the corpus, represented as a sequence of token IDs
/// along with its frequency count.
#[derive(Debug, Clone)]
struct Word {
    tokens: Vec<u32>,
    count: u64,
}

/// BPE Trainer — learns merge rules from a text corpus.
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    /// Create a new trainer with the given configuration.
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Train a fresh BPE vocabulary from text files.
    ///
    /// File contents are joined with a newline, so a word never spans two files.
    pub fn train_from_files(&self, file_paths: &[&Path]) -> Result<Vocab> {
        let mut corpus = Vec::new();
        for path in file_paths {
            corpus.extend_from_slice(&fs::read(path)?);
            corpus.push(b'\n');
        }

        let mut vocab = Vocab::new();
        self.train(&mut vocab, &corpus)?;
        Ok(vocab)
    }

    /// Train a fresh BPE vocabulary from a raw text string.
    pub fn train_from_text(&self, text: &str) -> Result<Vocab> {
        let mut vocab = Vocab::new();
        self.train(&mut vocab, text.as_bytes())?;
        Ok(vocab)
    }

    /// Learn merges from `corpus` and append them to `vocab`.
    ///
    /// An empty vocabulary is seeded with the base alphabet first. A
    /// vocabulary that already has merges keeps them: each word is reduced
    /// with the existing rules before counting, so no rule is learned twice.
    pub fn train(&self, vocab: &mut Vocab, corpus: &[u8]) -> Result<()> {
        let target = self.config.vocab_size as usize;
        if target <= BASE_ALPHABET_SIZE {
            return Err(TokenizerError::InvalidArgument(format!(
                "vocabulary size must be > {BASE_ALPHABET_SIZE}, got {target}"
            )));
        }

        vocab.init_base_alphabet();

        let mut words = Self::collect_words(vocab, corpus)?;
        let start_len = vocab.len();

        info!(
            "Training BPE: {} unique words, vocab size {} → target {}",
            words.len(),
            start_len,
            target
        );

        while vocab.len() < target {
            let pair_counts = Self::count_pairs(&words);

            let Some(((left, right), count)) = Self::select_pair(&pair_counts) else {
                info!(
                    "Stopping early at vocab size {}: no adjacent pairs left",
                    vocab.len()
                );
                break;
            };

            if count < self.config.min_frequency {
                info!(
                    "Stopping early at vocab size {}: best pair below min_frequency={}",
                    vocab.len(),
                    self.config.min_frequency
                );
                break;
            }

            let new_id = vocab.add_merge(left, right)?;
            Self::apply_merge(&mut words, left, right, new_id);

            debug!("Merge ({left}, {right}) → {new_id} (freq={count})");

            let learned = vocab.len() - start_len;
            if self.config.log_interval > 0 && learned % self.config.log_interval as usize == 0 {
                info!(
                    "  Merge {}: vocab size {}/{} (freq={})",
                    learned,
                    vocab.len(),
                    target,
                    count
                );
            }
        }

        info!(
            "Training complete: {} merges learned, vocab size = {}",
            vocab.len() - start_len,
            vocab.len()
        );

        Ok(())
    }

    /// Group identical words and turn each into its starting token sequence.
    fn collect_words(vocab: &Vocab, corpus: &[u8]) -> Result<Vec<Word>> {
        let mut word_counts: HashMap<&[u8], u64> = HashMap::new();
        for word in split_words(corpus) {
            *word_counts.entry(word).or_insert(0) += 1;
        }

        word_counts
            .into_iter()
            .map(|(bytes, count)| {
                Ok(Word {
                    tokens: vocab.encode_word(bytes)?,
                    count,
                })
            })
            .collect()
    }

    /// Count all adjacent token pair frequencies across all words.
    fn count_pairs(words: &[Word]) -> BTreeMap<(u32, u32), u64> {
        let mut counts: BTreeMap<(u32, u32), u64> = BTreeMap::new();
        for word in words {
            for window in word.tokens.windows(2) {
                *counts.entry((window[0], window[1])).or_insert(0) += word.count;
            }
        }
        counts
    }

    /// The first pair, in key order, with the strictly highest count.
    fn select_pair(pair_counts: &BTreeMap<(u32, u32), u64>) -> Option<((u32, u32), u64)> {
        let mut best: Option<((u32, u32), u64)> = None;
        for (&pair, &count) in pair_counts {
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((pair, count));
            }
        }
        best
    }

    /// Apply a merge to all words: replace all occurrences of (left, right) with new_id.
    ///
    /// Each word is rebuilt left to right; a merged pair is consumed whole,
    /// so the new token is never the left half of another match in the same pass.
    fn apply_merge(words: &mut [Word], left: u32, right: u32, new_id: u32) {
        for word in words.iter_mut() {
            let mut i = 0;
            let mut new_tokens = Vec::with_capacity(word.tokens.len());

            while i < word.tokens.len() {
                if i + 1 < word.tokens.len()
                    && word.tokens[i] == left
                    && word.tokens[i + 1] == right
                {
                    new_tokens.push(new_id);
                    i += 2;
                } else {
                    new_tokens.push(word.tokens[i]);
                    i += 1;
                }
            }

            word.tokens = new_tokens;
        }
    }
}
