//! # Tokenização e Stemming de Contexto
//!
//! A desambiguação semântica compara o texto do documento com textos de fundo
//! (resumos, GeneRIFs, interações) indexados por identificador de gene. Para isso
//! o texto é dividido em palavras, as stopwords são descartadas e cada palavra é
//! reduzida ao seu radical.
//!
//! ## Segmentação
//!
//! A segmentação usa as fronteiras de palavra do Unicode (UAX #29) via
//! `unicode-segmentation`, preservando os offsets de byte de cada token.
//!
//! ## Stemming
//!
//! O radical é obtido por remoção de sufixos do inglês em poucas etapas:
//! plurais (`-s`, `-es`, `-ies`), flexões verbais (`-ed`, `-ing`), `-y` final e
//! alguns sufixos derivacionais (`-ation`, `-ness`, `-ment`...).
//!
//! ```rust
//! use genemap_core::tokenizer::stem_token;
//!
//! assert_eq!(stem_token("proteins"), "protein");
//! assert_eq!(stem_token("binding"), "bind");
//! ```

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::resources::WordList;

/// Um token extraído do texto original.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    pub text: String,
    /// Índice de byte inicial no texto original (inclusive).
    pub start: usize,
    /// Índice de byte final no texto original (exclusivo).
    pub end: usize,
    pub index: usize,
}

/// Divide o texto em palavras. Espaços e pontuação isolada são descartados.
pub fn tokenize(text: &str) -> Vec<Token> {
    text.split_word_bound_indices()
        .filter(|(_, w)| w.chars().any(char::is_alphanumeric))
        .enumerate()
        .map(|(index, (start, w))| Token {
            text: w.to_string(),
            start,
            end: start + w.len(),
            index,
        })
        .collect()
}

/// Sufixos derivacionais e sua substituição, do mais longo para o mais curto.
const DERIVATIONAL_SUFFIXES: &[(&str, &str)] = &[
    ("ational", "ate"),
    ("ization", "ize"),
    ("fulness", "ful"),
    ("ousness", "ous"),
    ("iveness", "ive"),
    ("tional", "tion"),
    ("ation", "ate"),
    ("ement", ""),
    ("ness", ""),
    ("ment", ""),
    ("ably", "able"),
    ("ally", "al"),
];

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn has_vowel(s: &str) -> bool {
    s.chars().any(is_vowel)
}

fn ends_with_double_consonant(s: &str) -> bool {
    let mut rev = s.chars().rev();
    match (rev.next(), rev.next()) {
        (Some(a), Some(b)) => a == b && !is_vowel(a) && !matches!(a, 'l' | 's' | 'z'),
        _ => false,
    }
}

/// Reduz uma palavra ao seu radical (minúsculo).
///
/// Palavras com até 3 caracteres e tokens que contêm dígitos não são alterados.
pub fn stem_token(word: &str) -> String {
    let mut w = word.to_lowercase();
    if w.chars().count() <= 3 || w.chars().any(|c| c.is_ascii_digit()) || !w.is_ascii() {
        return w;
    }

    // Plurais
    if w.ends_with("sses") {
        w.truncate(w.len() - 2);
    } else if w.ends_with("ies") {
        w.truncate(w.len() - 2);
    } else if w.ends_with('s') && !w.ends_with("ss") && !w.ends_with("us") {
        w.truncate(w.len() - 1);
    }

    // Flexões verbais
    if w.ends_with("eed") {
        if w.len() > 4 {
            w.truncate(w.len() - 1);
        }
    } else {
        let stripped = if w.ends_with("ing") && has_vowel(&w[..w.len() - 3]) && w.len() > 5 {
            w.truncate(w.len() - 3);
            true
        } else if w.ends_with("ed") && has_vowel(&w[..w.len() - 2]) && w.len() > 4 {
            w.truncate(w.len() - 2);
            true
        } else {
            false
        };
        if stripped {
            if w.ends_with("at") || w.ends_with("bl") || w.ends_with("iz") {
                w.push('e');
            } else if ends_with_double_consonant(&w) {
                w.pop();
            }
        }
    }

    if w.ends_with('y') && w.len() > 3 && has_vowel(&w[..w.len() - 1]) {
        w.pop();
        w.push('i');
    }

    for (suffix, replacement) in DERIVATIONAL_SUFFIXES {
        if w.ends_with(suffix) && w.len() - suffix.len() >= 3 {
            w.truncate(w.len() - suffix.len());
            w.push_str(replacement);
            break;
        }
    }
    w
}

/// Tokens de contexto: minúsculos, sem stopwords, reduzidos ao radical.
pub fn context_tokens(text: &str, stopwords: &WordList) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .map(|t| t.text.to_lowercase())
        .filter(|t| !stopwords.contains(t))
        .map(|t| stem_token(&t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_offsets() {
        let text = "p53 binds MDM2, strongly.";
        let tokens = tokenize(text);
        let words: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["p53", "binds", "MDM2", "strongly"]);
        for t in &tokens {
            assert_eq!(&text[t.start..t.end], t.text);
        }
        assert_eq!(tokens[3].index, 3);
    }

    #[test]
    fn test_stem_plurals_and_inflections() {
        assert_eq!(stem_token("proteins"), "protein");
        assert_eq!(stem_token("kinases"), "kinase");
        assert_eq!(stem_token("activated"), "activate");
        assert_eq!(stem_token("activating"), "activate");
        assert_eq!(stem_token("activation"), "activate");
        assert_eq!(stem_token("stopped"), "stop");
        assert_eq!(stem_token("studies"), "studi");
    }

    #[test]
    fn test_stem_keeps_short_and_numeric_tokens() {
        assert_eq!(stem_token("has"), "has");
        assert_eq!(stem_token("IL2s"), "il2s");
        assert_eq!(stem_token("class"), "class");
    }

    #[test]
    fn test_context_tokens_drop_stopwords() {
        let stop = WordList::from_words(["the", "of", "in"]);
        let tokens = context_tokens("The expression of receptors in cells", &stop);
        assert_eq!(tokens, vec!["expression", "receptor", "cell"]);
    }
}
