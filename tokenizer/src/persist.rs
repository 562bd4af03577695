//! Vocabulary persistence.
//!
//! # Symbol table format
//!
//! One line per symbol, in ascending ID order:
//!
//! ```text
//! 0\t00
//! 65\t41
//! 256\t6865
//! ```
//!
//! The ID is decimal; the symbol bytes are uppercase hex, two digits per
//! byte, no separators. Merge rules are not part of this format: loading a
//! symbol table rebuilds the merge table from whatever rules the store
//! already holds. Rules are persisted separately as a JSON array with
//! [`Vocab::save_merges`] / [`Vocab::load_merges`].
//!
//! Loading is lenient. Blank lines are ignored, and malformed lines are
//! skipped with a warning instead of failing the whole load. IDs may appear
//! in any order and with gaps; the table grows to the highest ID seen, up to
//! [`MAX_LOAD_ID`].

use log::warn;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Result, TokenizerError};
use crate::vocab::{MergeRule, Vocab};

/// Highest symbol ID `load` accepts. Larger IDs are skipped with a warning
/// so that one corrupt row cannot force a multi-gigabyte allocation.
pub const MAX_LOAD_ID: u32 = (1 << 24) - 1;

/// Outcome of loading a symbol table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Lines that produced a symbol.
    pub loaded: usize,
    /// Non-blank lines that were skipped as malformed.
    pub skipped: usize,
    /// IDs below the highest loaded ID that no line defined.
    pub missing: usize,
}

impl Vocab {
    /// Write the symbol table to `sink`.
    pub fn save<W: Write>(&self, sink: W) -> Result<()> {
        let mut sink = BufWriter::new(sink);
        for (id, bytes) in self.id_to_bytes.iter().enumerate() {
            write!(sink, "{id}\t")?;
            for byte in bytes {
                write!(sink, "{byte:02X}")?;
            }
            writeln!(sink)?;
        }

        sink.flush()?;
        Ok(())
    }

    /// Replace the symbol table with the one read from `source`.
    ///
    /// Merge rules already in the store are kept and the merge table is
    /// rebuilt from them. The table grows to the highest ID seen; IDs that
    /// no line defines are left as empty symbols. When two IDs hold the same
    /// bytes, the reverse map points at the higher one.
    pub fn load<R: Read>(&mut self, mut source: R) -> Result<LoadStats> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;

        let mut stats = LoadStats::default();
        let mut symbols: Vec<Option<Vec<u8>>> = Vec::new();

        for (idx, row) in data.split(|&b| b == b'\n').enumerate() {
            let line_no = idx + 1;
            let Ok(line) = std::str::from_utf8(row) else {
                warn!("Skipping vocabulary line {line_no}: not valid UTF-8");
                stats.skipped += 1;
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }

            let (id, bytes) = match parse_line(line) {
                Ok(entry) => entry,
                Err(reason) => {
                    warn!("Skipping vocabulary line {line_no}: {reason}: {line:?}");
                    stats.skipped += 1;
                    continue;
                }
            };

            if id > MAX_LOAD_ID {
                warn!("Skipping vocabulary line {line_no}: id {id} exceeds {MAX_LOAD_ID}");
                stats.skipped += 1;
                continue;
            }

            let slot = id as usize;
            if slot >= symbols.len() {
                symbols.resize(slot + 1, None);
            }
            symbols[slot] = Some(bytes);
            stats.loaded += 1;
        }

        stats.missing = symbols.iter().filter(|s| s.is_none()).count();
        if stats.missing > 0 {
            warn!(
                "Loaded vocabulary has {} undefined ids; they decode to nothing",
                stats.missing
            );
        }

        self.id_to_bytes = symbols.into_iter().map(Option::unwrap_or_default).collect();
        self.bytes_to_id.clear();
        for (id, bytes) in self.id_to_bytes.iter().enumerate() {
            if !bytes.is_empty() {
                // id <= MAX_LOAD_ID, checked above
                self.bytes_to_id.insert(bytes.clone(), id as u32);
            }
        }
        self.rebuild_merge_table();

        Ok(stats)
    }

    /// Build a vocabulary from a symbol table. It has no merge rules.
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let mut vocab = Self::new();
        vocab.load(source)?;
        Ok(vocab)
    }

    /// Save the symbol table to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.save(File::create(path)?)
    }

    /// Load a symbol table from a file into a new vocabulary.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Write the ordered merge rules as JSON.
    pub fn save_merges<W: Write>(&self, mut sink: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut sink, &self.merges)?;
        sink.flush()?;
        Ok(())
    }

    /// Replace the merge rules with the JSON rules read from `source`.
    ///
    /// Every rule must refer to symbols in the current table and describe
    /// how its result symbol was built. Nothing changes if any rule fails.
    pub fn load_merges<R: Read>(&mut self, source: R) -> Result<()> {
        let rules: Vec<MergeRule> = serde_json::from_reader(source)?;

        let mut seen = HashSet::with_capacity(rules.len());
        for rule in &rules {
            self.check_rule(rule)?;
            if !seen.insert((rule.left, rule.right)) {
                return Err(TokenizerError::InvalidArgument(format!(
                    "pair ({}, {}) has more than one rule",
                    rule.left, rule.right
                )));
            }
        }

        self.merges = rules;
        self.rebuild_merge_table();
        Ok(())
    }

    pub fn save_merges_to_file(&self, path: &Path) -> Result<()> {
        self.save_merges(BufWriter::new(File::create(path)?))
    }

    pub fn load_merges_from_file(&mut self, path: &Path) -> Result<()> {
        let json = fs::read(path)?;
        self.load_merges(json.as_slice())
    }

    fn check_rule(&self, rule: &MergeRule) -> Result<()> {
        let left = self.symbol(rule.left)?;
        let right = self.symbol(rule.right)?;
        let merged = self.symbol(rule.merged)?;

        if rule.merged <= rule.left || rule.merged <= rule.right {
            return Err(TokenizerError::InvalidArgument(format!(
                "rule ({}, {}) → {} does not produce a newer id",
                rule.left, rule.right, rule.merged
            )));
        }
        if merged.len() != left.len() + right.len()
            || !merged.starts_with(left)
            || !merged.ends_with(right)
        {
            return Err(TokenizerError::InvalidArgument(format!(
                "symbol {} is not the concatenation of {} and {}",
                rule.merged, rule.left, rule.right
            )));
        }
        Ok(())
    }
}

/// Parse one `<id>\t<hex>` line.
fn parse_line(line: &str) -> std::result::Result<(u32, Vec<u8>), &'static str> {
    let (id_str, hex_str) = line.split_once('\t').ok_or("no tab separator")?;
    let (id_str, hex_str) = (id_str.trim(), hex_str.trim());

    if id_str.is_empty() {
        return Err("empty id");
    }
    if hex_str.is_empty() {
        return Err("empty symbol");
    }

    let id = id_str.parse::<u32>().map_err(|_| "invalid id")?;
    let bytes = decode_hex(hex_str)?;
    Ok((id, bytes))
}

fn decode_hex(hex: &str) -> std::result::Result<Vec<u8>, &'static str> {
    if hex.len() % 2 != 0 {
        return Err("odd number of hex digits");
    }
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err("invalid hex digit");
    }

    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or("invalid hex digit")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainer::{Trainer, TrainerConfig};

    fn trained() -> Vocab {
        Trainer::new(TrainerConfig {
            vocab_size: 280,
            min_frequency: 1,
            log_interval: 0,
        })
        .train_from_text("hello world hello there hello wonderful world")
        .unwrap()
    }

    fn saved(vocab: &Vocab) -> String {
        let mut buf = Vec::new();
        vocab.save(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_save_format() {
        let mut vocab = Vocab::with_base_alphabet();
        vocab.add_merge(b'h' as u32, b'e' as u32).unwrap();

        let text = saved(&vocab);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 257);
        assert_eq!(lines[0], "0\t00");
        assert_eq!(lines[10], "10\t0A");
        assert_eq!(lines[255], "255\tFF");
        assert_eq!(lines[256], "256\t6865");
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_save_load_preserves_symbols() {
        let vocab = trained();
        let loaded = Vocab::from_reader(saved(&vocab).as_bytes()).unwrap();

        assert_eq!(loaded.len(), vocab.len());
        for id in 0..vocab.len() as u32 {
            assert_eq!(loaded.symbol(id).unwrap(), vocab.symbol(id).unwrap());
            let bytes = vocab.symbol(id).unwrap();
            assert_eq!(loaded.id_of(bytes).unwrap(), vocab.id_of(bytes).unwrap());
        }
    }

    #[test]
    fn test_save_load_does_not_carry_merges() {
        let vocab = trained();
        assert!(!vocab.merges().is_empty());

        let loaded = Vocab::from_reader(saved(&vocab).as_bytes()).unwrap();
        assert!(loaded.merges().is_empty());

        // Same text, but the reloaded store only knows base bytes.
        let original = vocab.encode(b"hello").unwrap();
        let reloaded = loaded.encode(b"hello").unwrap();
        assert!(original.len() < reloaded.len());
        assert_eq!(reloaded, b"hello".iter().map(|&b| b as u32).collect::<Vec<_>>());
        assert_eq!(loaded.decode(&original).unwrap(), b"hello");
    }

    #[test]
    fn test_load_keeps_in_memory_merges() {
        let mut vocab = trained();
        let merges = vocab.merges().to_vec();
        let table = saved(&vocab);

        let stats = vocab.load(table.as_bytes()).unwrap();
        assert_eq!(stats.loaded, vocab.len());
        assert_eq!(vocab.merges(), &merges[..]);
        for rule in &merges {
            assert_eq!(vocab.merge_for(rule.left, rule.right), Some(rule.merged));
        }
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let input = "0\t41\n\
                     no tab here\n\
                     \n   \n\
                     1\tZZ\n\
                     2\t4\n\
                     x\t42\n\
                     \t43\n\
                     3\t\n\
                     4\t4243\r\n";
        let mut vocab = Vocab::new();
        let stats = vocab.load(input.as_bytes()).unwrap();

        assert_eq!(stats.loaded, 2);
        assert_eq!(stats.skipped, 6);
        assert_eq!(stats.missing, 3);
        assert_eq!(vocab.len(), 5);
        assert_eq!(vocab.symbol(0).unwrap(), b"A");
        assert_eq!(vocab.symbol(4).unwrap(), b"BC");
        assert_eq!(vocab.symbol(1).unwrap(), b"");
        assert_eq!(vocab.id_of(b"BC").unwrap(), 4);
    }

    #[test]
    fn test_load_trims_fields() {
        let vocab = Vocab::from_reader(" 0 \t  6869  \n1\t0a\n".as_bytes()).unwrap();
        assert_eq!(vocab.symbol(0).unwrap(), b"hi");
        assert_eq!(vocab.symbol(1).unwrap(), b"\n");
    }

    #[test]
    fn test_load_grows_to_highest_id() {
        let mut vocab = Vocab::new();
        let stats = vocab.load("0\t41\n5\t42\n".as_bytes()).unwrap();
        assert_eq!(stats.loaded, 2);
        assert_eq!(stats.missing, 4);
        assert_eq!(vocab.len(), 6);
        assert_eq!(vocab.symbol(5).unwrap(), b"B");
        assert_eq!(vocab.id_of(b"B").unwrap(), 5);
    }

    #[test]
    fn test_load_with_missing_rows_keeps_later_ids() {
        let vocab = Trainer::new(TrainerConfig {
            vocab_size: 260,
            min_frequency: 1,
            log_interval: 0,
        })
        .train_from_text("aa bb aa bb cc aa bb.")
        .unwrap();

        let text = saved(&vocab);
        let kept: String = text
            .lines()
            .enumerate()
            .filter(|(idx, _)| *idx != 10 && *idx != 11)
            .map(|(_, line)| format!("{line}\n"))
            .collect();

        let mut loaded = Vocab::new();
        let stats = loaded.load(kept.as_bytes()).unwrap();
        assert_eq!(stats.loaded, 258);
        assert_eq!(stats.missing, 2);
        assert_eq!(loaded.len(), 260);
        assert_eq!(loaded.symbol(259).unwrap(), b"bb.");

        let tokens = vocab.encode(b"aa bb.").unwrap();
        assert_eq!(loaded.decode(&tokens).unwrap(), b"aabb.");
    }

    #[test]
    fn test_load_skips_out_of_bounds_id() {
        let mut vocab = Vocab::new();
        let too_large = format!("0\t41\n{}\t42\n4000000000\t43\n", MAX_LOAD_ID + 1);
        let stats = vocab.load(too_large.as_bytes()).unwrap();
        assert_eq!(stats.skipped, 2);
        assert_eq!(vocab.len(), 1);
    }

    #[test]
    fn test_load_duplicate_bytes_map_to_higher_id() {
        let vocab = Vocab::from_reader("0\t41\n1\t4142\n2\t4142\n".as_bytes()).unwrap();
        assert_eq!(vocab.id_of(b"AB").unwrap(), 2);
        assert_eq!(vocab.symbol(1).unwrap(), b"AB");
    }

    #[test]
    fn test_save_writes_each_symbol_line() {
        let mut vocab = Vocab::new();
        vocab.add_symbol(vec![0x00, 0xAB]).unwrap();
        vocab.add_symbol(b"z".to_vec()).unwrap();
        assert_eq!(saved(&vocab), "0\t00AB\n1\t7A\n");
    }

    #[test]
    fn test_load_later_duplicate_id_wins() {
        let vocab = Vocab::from_reader("0\t41\n0\t42\n".as_bytes()).unwrap();
        assert_eq!(vocab.symbol(0).unwrap(), b"B");
        assert!(vocab.id_of(b"A").is_err());
    }

    #[test]
    fn test_load_empty_source() {
        let vocab = Vocab::from_reader(&b""[..]).unwrap();
        assert!(vocab.is_empty());
    }

    #[test]
    fn test_merges_roundtrip_restores_encoding() {
        let vocab = trained();
        let mut merges_json = Vec::new();
        vocab.save_merges(&mut merges_json).unwrap();

        let mut loaded = Vocab::from_reader(saved(&vocab).as_bytes()).unwrap();
        loaded.load_merges(merges_json.as_slice()).unwrap();

        assert_eq!(loaded.merges(), vocab.merges());
        let text = b"hello wonderful world";
        assert_eq!(loaded.encode(text).unwrap(), vocab.encode(text).unwrap());
    }

    #[test]
    fn test_load_merges_rejects_inconsistent_rules() {
        let mut vocab = Vocab::with_base_alphabet();
        vocab.add_merge(b'a' as u32, b'b' as u32).unwrap();

        // 256 is "ab", not "ba"
        let wrong_bytes = r#"[{"left": 98, "right": 97, "merged": 256}]"#;
        assert!(matches!(
            vocab.load_merges(wrong_bytes.as_bytes()),
            Err(TokenizerError::InvalidArgument(_))
        ));

        let out_of_range = r#"[{"left": 97, "right": 98, "merged": 300}]"#;
        assert!(matches!(
            vocab.load_merges(out_of_range.as_bytes()),
            Err(TokenizerError::InvalidId { id: 300, .. })
        ));

        let not_json = "not json";
        assert!(matches!(
            vocab.load_merges(not_json.as_bytes()),
            Err(TokenizerError::Serialization(_))
        ));

        // Failed loads leave the rules untouched.
        assert_eq!(vocab.merges().len(), 1);
        assert_eq!(vocab.merge_for(b'a' as u32, b'b' as u32), Some(256));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let vocab_path = dir.path().join("vocab.txt");
        let merges_path = dir.path().join("merges.json");

        let vocab = trained();
        vocab.save_to_file(&vocab_path).unwrap();
        vocab.save_merges_to_file(&merges_path).unwrap();

        let mut loaded = Vocab::load_from_file(&vocab_path).unwrap();
        loaded.load_merges_from_file(&merges_path).unwrap();
        assert_eq!(loaded.len(), vocab.len());
        assert_eq!(loaded.merges(), vocab.merges());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Vocab::load_from_file(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, TokenizerError::Io(_)));
    }
}
