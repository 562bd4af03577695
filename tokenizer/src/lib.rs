//! Bytepair: byte-level BPE tokenizer.
//!
//! This crate learns a byte-level Byte Pair Encoding (BPE) vocabulary from
//! a text corpus and uses it to encode text to token IDs and back. It
//! supports:
//!
//! - Byte-level BPE (every byte 0x00-0xFF is a base token, no OOV tokens)
//! - Deterministic training (ties broken by the smallest pair)
//! - Strict decoding (out-of-range IDs and invalid UTF-8 are errors)
//! - A line-based hex vocabulary file, plus JSON merge-rule snapshots
//! - Optional Python bindings (`python` feature)
//!
//! ## Architecture
//!
//! 1. Start with a base vocabulary of 256 byte tokens
//! 2. Split the corpus on whitespace; merges never cross words
//! 3. Iteratively merge the most frequent adjacent pair
//! 4. Continue until reaching the target vocabulary size
//!
//! Whitespace separates words but is not itself tokenized, so decoding
//! concatenates the words with nothing in between.
//!
//! ## Usage
//!
//! ```rust
//! use bytepair::{Trainer, TrainerConfig};
//!
//! let config = TrainerConfig {
//!     vocab_size: 300,
//!     log_interval: 0,
//!     ..Default::default()
//! };
//! let trainer = Trainer::new(config);
//! let vocab = trainer.train_from_text("hello hello world").unwrap();
//!
//! let encoded = vocab.encode(b"hello").unwrap();
//! let decoded = vocab.decode_to_string(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod error;
pub mod persist;
pub mod trainer;
pub mod vocab;

#[cfg(feature = "python")]
pub mod python;

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module entry point
#[cfg(feature = "python")]
#[pymodule]
fn bytepair(_py: Python, m: &PyModule) -> PyResult<()> {
    pyo3_log::init();
    m.add_class::<python::PyVocab>()?;
    m.add_class::<python::PyTrainer>()?;
    Ok(())
}

// Re-export main types
pub use error::{Result, TokenizerError};
pub use persist::{LoadStats, MAX_LOAD_ID};
pub use trainer::{Trainer, TrainerConfig};
pub use vocab::{MergeRule, Vocab, BASE_ALPHABET_SIZE};
