//! # Correção Ortográfica de Plurais
//!
//! Sinônimos do dicionário quase sempre estão no singular. Um corretor opcional
//! troca tokens terminados em "s" que não existem no dicionário pela sugestão
//! mais próxima (distância de Levenshtein normalizada, `strsim`).
//!
//! O caminho principal de mapeamento não usa correção; o corretor fica
//! disponível para o [`crate::query::QueryBuilder`].

use std::collections::HashSet;
use std::path::Path;

use crate::error::Result;
use crate::resources::WordList;

/// Similaridade mínima para uma sugestão.
pub const MIN_SUGGESTION_SIMILARITY: f64 = 0.5;

const MAX_SUGGESTIONS: usize = 5;

pub trait SpellChecker: Send + Sync {
    fn exists(&self, word: &str) -> bool;

    /// Até `n` sugestões, da mais para a menos parecida.
    fn suggest_similar(&self, word: &str, n: usize) -> Vec<String>;

    /// Troca tokens plurais desconhecidos (mais de 2 caracteres, terminados em
    /// "s") pela primeira sugestão.
    fn correct_plurals(&self, name: &str) -> String {
        name.split_whitespace()
            .map(|token| {
                if token.len() > 2 && token.ends_with('s') && !self.exists(token) {
                    self.suggest_similar(token, MAX_SUGGESTIONS)
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| token.to_string())
                } else {
                    token.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Corretor sobre uma lista de palavras em memória.
#[derive(Debug, Clone, Default)]
pub struct DictionarySpellChecker {
    words: Vec<String>,
    index: HashSet<String>,
}

impl DictionarySpellChecker {
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut checker = Self::default();
        for w in words {
            let w = w.as_ref().trim().to_lowercase();
            if !w.is_empty() && checker.index.insert(w.clone()) {
                checker.words.push(w);
            }
        }
        checker
    }

    /// Uma palavra por linha, no formato das listas de recursos.
    pub fn from_file(path: &Path) -> Result<Self> {
        let list = WordList::from_file(path)?;
        Ok(Self::from_words(list.iter()))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl SpellChecker for DictionarySpellChecker {
    fn exists(&self, word: &str) -> bool {
        self.index.contains(&word.to_lowercase())
    }

    fn suggest_similar(&self, word: &str, n: usize) -> Vec<String> {
        let word = word.to_lowercase();
        let mut scored: Vec<(f64, &String)> = self
            .words
            .iter()
            .filter(|w| **w != word)
            .map(|w| (strsim::normalized_levenshtein(&word, w), w))
            .filter(|(sim, _)| *sim >= MIN_SUGGESTION_SIMILARITY)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored.into_iter().take(n).map(|(_, w)| w.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_closest_first() {
        let checker = DictionarySpellChecker::from_words(["receptor", "receptors x", "reception", "kinase"]);
        let suggestions = checker.suggest_similar("receptors", 5);
        assert_eq!(suggestions[0], "receptor");
        assert!(!suggestions.contains(&"kinase".to_string()));
    }

    #[test]
    fn test_correct_plurals_only_unknown_s_tokens() {
        let checker = DictionarySpellChecker::from_words(["factor", "gas"]);
        assert_eq!(checker.correct_plurals("growth factors"), "growth factor");
        // conhecido: mantido
        assert_eq!(checker.correct_plurals("gas"), "gas");
        // curto demais
        assert_eq!(checker.correct_plurals("ps"), "ps");
        // sem sugestão
        assert_eq!(checker.correct_plurals("zzzzs"), "zzzzs");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.txt");
        std::fs::write(&path, "# dicionário\nReceptor\nkinase\n").unwrap();
        let checker = DictionarySpellChecker::from_file(&path).unwrap();
        assert_eq!(checker.len(), 2);
        assert!(checker.exists("receptor"));
    }
}
