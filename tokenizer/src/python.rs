use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use std::path::Path;

use crate::error::TokenizerError;
use crate::trainer::{Trainer, TrainerConfig};
use crate::vocab::Vocab;

fn to_py_err(err: TokenizerError) -> PyErr {
    match err {
        TokenizerError::Io(e) => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Python wrapper for the BPE Vocabulary
#[pyclass(name = "Vocab", module = "bytepair")]
pub struct PyVocab {
    pub(crate) inner: Vocab,
}

#[pymethods]
impl PyVocab {
    /// Create a vocabulary holding the 256 byte tokens.
    #[new]
    pub fn new() -> Self {
        Self {
            inner: Vocab::with_base_alphabet(),
        }
    }

    /// Encode text to a list of token IDs
    pub fn encode(&self, text: &str) -> PyResult<Vec<u32>> {
        self.inner.encode(text.as_bytes()).map_err(to_py_err)
    }

    /// Decode a list of token IDs to a string
    pub fn decode(&self, ids: Vec<u32>) -> PyResult<String> {
        self.inner.decode_to_string(&ids).map_err(to_py_err)
    }

    /// Merge rules as (left, right, merged) tuples, in learning order
    pub fn merges(&self) -> Vec<(u32, u32, u32)> {
        self.inner
            .merges()
            .iter()
            .map(|rule| (rule.left, rule.right, rule.merged))
            .collect()
    }

    /// Save the symbol table to a text file
    pub fn save(&self, path: &str) -> PyResult<()> {
        self.inner.save_to_file(Path::new(path)).map_err(to_py_err)
    }

    /// Load a symbol table from a text file (no merge rules)
    #[staticmethod]
    pub fn load(path: &str) -> PyResult<Self> {
        let vocab = Vocab::load_from_file(Path::new(path)).map_err(to_py_err)?;
        Ok(Self { inner: vocab })
    }

    /// Save merge rules to a JSON file
    pub fn save_merges(&self, path: &str) -> PyResult<()> {
        self.inner
            .save_merges_to_file(Path::new(path))
            .map_err(to_py_err)
    }

    /// Load merge rules from a JSON file
    pub fn load_merges(&mut self, path: &str) -> PyResult<()> {
        self.inner
            .load_merges_from_file(Path::new(path))
            .map_err(to_py_err)
    }

    pub fn __len__(&self) -> usize {
        self.inner.len()
    }
}

/// Python wrapper for the BPE Trainer
#[pyclass(name = "Trainer", module = "bytepair")]
pub struct PyTrainer {
    pub(crate) inner: Trainer,
}

#[pymethods]
impl PyTrainer {
    #[new]
    #[pyo3(signature = (vocab_size=32768, min_frequency=1))]
    pub fn new(vocab_size: u32, min_frequency: u64) -> Self {
        let config = TrainerConfig {
            vocab_size,
            min_frequency,
            ..TrainerConfig::default()
        };
        Self {
            inner: Trainer::new(config),
        }
    }

    /// Train a new vocabulary from a block of text
    pub fn train_from_text(&self, text: &str) -> PyResult<PyVocab> {
        let vocab = self.inner.train_from_text(text).map_err(to_py_err)?;
        Ok(PyVocab { inner: vocab })
    }

    /// Train a new vocabulary from multiple files
    pub fn train_from_files(&self, files: Vec<String>) -> PyResult<PyVocab> {
        let paths: Vec<&Path> = files.iter().map(Path::new).collect();
        let vocab = self.inner.train_from_files(&paths).map_err(to_py_err)?;
        Ok(PyVocab { inner: vocab })
    }

    /// Continue training an existing vocabulary in place
    pub fn train(&self, vocab: &mut PyVocab, text: &str) -> PyResult<()> {
        self.inner
            .train(&mut vocab.inner, text.as_bytes())
            .map_err(to_py_err)
    }
}
