//! # Listas de Palavras (Léxico)
//!
//! O normalizador e o filtro de candidatos dependem de algumas listas de palavras.
//! Todas vêm embutidas no binário (`include_str!`) e podem ser substituídas por
//! arquivos em um diretório (`lexicon_dir` na configuração).
//!
//! ## Listas obrigatórias e opcionais
//!
//! | Arquivo                    | Uso                                    | Obrigatória |
//! |----------------------------|----------------------------------------|-------------|
//! | `greek_letters.txt`        | divisão e variantes de letras gregas   | sim         |
//! | `non_descriptives.txt`     | termos não descritivos                 | sim         |
//! | `stopwords.txt`            | remoção de stopwords do nome           | não         |
//! | `unspecified_proteins.txt` | nomes genéricos ("protein", "kinase")  | não         |
//! | `premodifiers.txt`         | modificadores iniciais ("human", ...)  | não         |
//! | `context_stopwords.txt`    | consulta de contexto do documento      | não         |
//!
//! Lista opcional ausente degrada a qualidade (a regra correspondente é ignorada);
//! lista obrigatória ausente ou vazia é erro fatal de construção.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{GeneMappingError, Result};

pub const GREEK_LETTERS_FILE: &str = "greek_letters.txt";
pub const NON_DESCRIPTIVES_FILE: &str = "non_descriptives.txt";
pub const STOPWORDS_FILE: &str = "stopwords.txt";
pub const UNSPECIFIEDS_FILE: &str = "unspecified_proteins.txt";
pub const PREMODIFIERS_FILE: &str = "premodifiers.txt";
pub const CONTEXT_STOPWORDS_FILE: &str = "context_stopwords.txt";

const BUNDLED_GREEK_LETTERS: &str = include_str!("../resources/greek_letters.txt");
const BUNDLED_NON_DESCRIPTIVES: &str = include_str!("../resources/non_descriptives.txt");
const BUNDLED_STOPWORDS: &str = include_str!("../resources/stopwords.txt");
const BUNDLED_UNSPECIFIEDS: &str = include_str!("../resources/unspecified_proteins.txt");
const BUNDLED_PREMODIFIERS: &str = include_str!("../resources/premodifiers.txt");
const BUNDLED_CONTEXT_STOPWORDS: &str = include_str!("../resources/context_stopwords.txt");

/// Lista ordenada de palavras com consulta de pertinência em O(1).
///
/// A ordem do arquivo é preservada: para as letras gregas ela decide qual letra
/// vence quando duas compartilham a mesma inicial.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordList {
    words: Vec<String>,
    index: HashSet<String>,
}

impl WordList {
    /// Lê uma entrada por linha. Linhas vazias e comentários (`#`) são ignorados.
    pub fn parse(text: &str) -> Self {
        let mut list = WordList::default();
        for line in text.lines() {
            let word = line.trim();
            if word.is_empty() || word.starts_with('#') {
                continue;
            }
            list.push(word);
        }
        list
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = WordList::default();
        for w in words {
            list.push(w.as_ref().trim());
        }
        list
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    fn push(&mut self, word: &str) {
        if !word.is_empty() && self.index.insert(word.to_string()) {
            self.words.push(word.to_string());
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.index.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    /// Alternativa regex (`a|b|c`) com as entradas escapadas, mais longas primeiro
    /// para que o casamento leftmost-first prefira a forma completa.
    pub fn alternation(&self) -> String {
        let mut sorted: Vec<&String> = self.words.iter().collect();
        sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        sorted
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Conjunto de todas as listas usadas pelo normalizador e pelo filtro.
#[derive(Debug, Clone)]
pub struct Lexicon {
    pub greek_letters: WordList,
    pub non_descriptives: WordList,
    pub stopwords: WordList,
    pub unspecifieds: WordList,
    pub premodifiers: WordList,
    pub context_stopwords: WordList,
}

impl Lexicon {
    /// Léxico embutido no crate.
    pub fn bundled() -> Self {
        Self {
            greek_letters: WordList::parse(BUNDLED_GREEK_LETTERS),
            non_descriptives: WordList::parse(BUNDLED_NON_DESCRIPTIVES),
            stopwords: WordList::parse(BUNDLED_STOPWORDS),
            unspecifieds: WordList::parse(BUNDLED_UNSPECIFIEDS),
            premodifiers: WordList::parse(BUNDLED_PREMODIFIERS),
            context_stopwords: WordList::parse(BUNDLED_CONTEXT_STOPWORDS),
        }
    }

    /// Carrega as listas de um diretório.
    ///
    /// Listas opcionais ausentes ou ilegíveis ficam vazias (com aviso no log).
    /// Listas obrigatórias ausentes ou vazias abortam a construção.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let lexicon = Self {
            greek_letters: load_required(dir, GREEK_LETTERS_FILE)?,
            non_descriptives: load_required(dir, NON_DESCRIPTIVES_FILE)?,
            stopwords: load_optional(dir, STOPWORDS_FILE),
            unspecifieds: load_optional(dir, UNSPECIFIEDS_FILE),
            premodifiers: load_optional(dir, PREMODIFIERS_FILE),
            context_stopwords: load_optional(dir, CONTEXT_STOPWORDS_FILE),
        };
        debug!(dir = %dir.display(), "lexicon loaded");
        Ok(lexicon)
    }

    /// Valida as listas obrigatórias de um léxico montado à mão.
    pub fn validate(&self) -> Result<()> {
        if self.greek_letters.is_empty() {
            return Err(GeneMappingError::Resource(
                "greek letter list is missing or empty".into(),
            ));
        }
        if self.non_descriptives.is_empty() {
            return Err(GeneMappingError::Resource(
                "non-descriptive term list is missing or empty".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::bundled()
    }
}

fn load_required(dir: &Path, file: &str) -> Result<WordList> {
    let path = dir.join(file);
    let list = WordList::from_file(&path).map_err(|e| {
        GeneMappingError::Resource(format!("required list {} unavailable: {e}", path.display()))
    })?;
    if list.is_empty() {
        return Err(GeneMappingError::Resource(format!(
            "required list {} is empty",
            path.display()
        )));
    }
    Ok(list)
}

fn load_optional(dir: &Path, file: &str) -> WordList {
    let path = dir.join(file);
    match WordList::from_file(&path) {
        Ok(list) => list,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "optional word list unavailable, rule disabled");
            WordList::default()
        }
    }
}
