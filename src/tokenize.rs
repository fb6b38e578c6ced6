//! Text → token IDs.
//!
//! The pipeline only depends on the [`Tokenizer`] trait, so the linguistic
//! front end stays swappable. Two implementations ship with the crate:
//!
//! * [`CodepointTokenizer`]: one token per Unicode scalar value. The
//!   placeholder policy for models trained on raw characters.
//! * [`SymbolTokenizer`]: Kokoro/StyleTTS symbol vocabulary for IPA input
//!   produced by an upstream phonemiser, wrapped in pad tokens (0).

use std::{collections::HashMap, fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{TtsError, TtsResult};

/// Maps input text to the integer sequence a backend expects.
///
/// Implementations must be deterministic and fail with
/// [`TtsError::EmptyInput`] rather than return an empty sequence.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> TtsResult<Vec<i64>>;
}

/// Which tokenizer to build at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenizerKind {
    #[default]
    Codepoint,
    Symbols,
}

impl TokenizerKind {
    pub fn build(self) -> Box<dyn Tokenizer> {
        match self {
            TokenizerKind::Codepoint => Box::new(CodepointTokenizer),
            TokenizerKind::Symbols => Box::new(SymbolTokenizer),
        }
    }
}

impl FromStr for TokenizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "codepoint" | "chars" => Ok(Self::Codepoint),
            "symbols" | "ipa" => Ok(Self::Symbols),
            _ => Err(format!("unknown tokenizer '{s}' (expected codepoint or symbols)")),
        }
    }
}

impl fmt::Display for TokenizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenizerKind::Codepoint => "codepoint",
            TokenizerKind::Symbols => "symbols",
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Code points
// ─────────────────────────────────────────────────────────────────────────────

/// One token per `char`, valued at its code point.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodepointTokenizer;

impl Tokenizer for CodepointTokenizer {
    fn tokenize(&self, text: &str) -> TtsResult<Vec<i64>> {
        if text.trim().is_empty() {
            return Err(TtsError::EmptyInput);
        }
        Ok(text.chars().map(|c| c as i64).collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Symbol vocabulary. Order matters: the index is the token ID.
// ─────────────────────────────────────────────────────────────────────────────

const PAD: char = '$';

/// Characters: ; : , . ! ? ¡ ¿ — … " « » " "  (space at end)
const PUNCTUATION: &str = ";:,.!?¡¿—…\u{201C}«»\u{201D}\" ";

const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// The combining character ̩ (U+0329) and curly quotes are individual entries.
const IPA_LETTERS: &str =
    "ɑɐɒæɓʙβɔɕçɗɖðʤəɘɚɛɜɝɞɟʄɡɠɢʛɦɧħɥʜɨɪʝɭɬɫɮʟɱɯɰŋɳɲɴøɵɸθœɶʘɹɺɾɻʀʁɽʂʃʈʧʉʊʋⱱʌɣɤʍχʎʏʑʐʒʔʡʕʢǀǁǂǃˈˌːˑʼʴʰʱʲʷˠˤ˞↓↑→↗↘\u{2019}\u{0329}\u{2018}ᵻ";

static VOCAB: Lazy<HashMap<char, i64>> = Lazy::new(|| {
    std::iter::once(PAD)
        .chain(PUNCTUATION.chars())
        .chain(LETTERS.chars())
        .chain(IPA_LETTERS.chars())
        .enumerate()
        .map(|(i, c)| (c, i as i64))
        .collect()
});

/// Words and individual punctuation marks.
static RE_WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+|[^\w\s]").expect("static regex"));

/// Vocabulary index of `c`, `None` for characters outside the symbol set.
pub fn symbol_id(c: char) -> Option<i64> {
    VOCAB.get(&c).copied()
}

/// Re-space IPA text so every word and punctuation mark is its own token.
fn space_words(text: &str) -> String {
    RE_WORDS
        .find_iter(text)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// IPA text → `[0, ids…, 0]`, silently dropping unknown characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolTokenizer;

impl Tokenizer for SymbolTokenizer {
    fn tokenize(&self, text: &str) -> TtsResult<Vec<i64>> {
        let spaced = space_words(text);
        let mut ids = Vec::with_capacity(spaced.len() + 2);
        ids.push(0);
        ids.extend(spaced.chars().filter_map(symbol_id));
        if ids.iter().skip(1).all(|&id| id == symbol_id(' ').unwrap_or(-1)) {
            return Err(TtsError::EmptyInput);
        }
        ids.push(0);
        Ok(ids)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codepoints() {
        let ids = CodepointTokenizer.tokenize("Hi!").unwrap();
        assert_eq!(ids, vec![72, 105, 33]);
    }

    #[test]
    fn test_codepoints_deterministic_unicode() {
        let a = CodepointTokenizer.tokenize("héllo ɛ").unwrap();
        let b = CodepointTokenizer.tokenize("héllo ɛ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 7);
        assert_eq!(a[1], 'é' as i64);
    }

    #[test]
    fn test_empty_input_rejected() {
        for text in ["", "   ", "\n\t"] {
            assert!(matches!(CodepointTokenizer.tokenize(text), Err(TtsError::EmptyInput)));
            assert!(matches!(SymbolTokenizer.tokenize(text), Err(TtsError::EmptyInput)));
        }
    }

    #[test]
    fn test_pad_is_zero() {
        assert_eq!(symbol_id('$'), Some(0));
    }

    #[test]
    fn test_unknown_symbols() {
        assert_eq!(symbol_id('\u{0000}'), None);
        assert_eq!(symbol_id('中'), None);
        assert!(matches!(SymbolTokenizer.tokenize("中文"), Err(TtsError::EmptyInput)));
    }

    #[test]
    fn test_symbol_ids_have_pads() {
        let ids = SymbolTokenizer.tokenize("hɛloʊ wɜːld!").unwrap();
        assert_eq!(ids[0], 0);
        assert_eq!(*ids.last().unwrap(), 0);
        // "hɛloʊ wɜːld !" → 13 symbols between the pads
        assert_eq!(ids.len(), 15);
        assert!(ids[1..ids.len() - 1].iter().all(|&id| id > 0));
    }

    #[test]
    fn test_vocab_has_no_repeated_symbols() {
        let total = 1 + PUNCTUATION.chars().count() + LETTERS.chars().count() + IPA_LETTERS.chars().count();
        assert_eq!(VOCAB.len(), total);
        assert_eq!(VOCAB.len(), 178);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("codepoint".parse::<TokenizerKind>().unwrap(), TokenizerKind::Codepoint);
        assert_eq!("IPA".parse::<TokenizerKind>().unwrap(), TokenizerKind::Symbols);
        assert!("bpe".parse::<TokenizerKind>().is_err());
    }
}
