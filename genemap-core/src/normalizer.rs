//! # Normalizador de Nomes de Genes
//!
//! Transforma o texto de uma menção (ou de um sinônimo do dicionário) em uma
//! sequência canônica de tokens. Menção e dicionário passam pela mesma
//! transformação, então "IL2R", "IL-2 R" e "il 2 r" convergem para a mesma forma.
//!
//! ## Etapas (ordem fixa)
//!
//! 1. Remoção de stopwords como token inteiro (entrada de um token passa intacta).
//! 2. Caracteres não alfanuméricos viram espaço, exceto o ponto decimal entre dígitos.
//! 3. Até estabilizar: separa letras de dígitos (`TP53` → `TP 53`) e quebra nas
//!    fronteiras minúscula→maiúscula/dígito, maiúscula→dígito, dígito→letra e
//!    duas maiúsculas→minúscula.
//! 4. Separa letras gregas e as palavras "high"/"low" embutidas em um token
//!    (casamento mais longo, sem diferenciar caixa).
//! 5. Separa numerais romanos finais (I–XX), preferindo o numeral mais longo.
//! 6. Troca tokens "I", "II", "III", "IV" por "1".."4" quando há mais de um token.
//! 7. Tudo em minúsculas, unido por espaço simples.
//!
//! A sequência é repetida até um ponto fixo, o que garante
//! `normalize(normalize(x)) == normalize(x)`.
//!
//! ## Variantes
//!
//! [`TermNormalizer::variants`] gera formas alternativas a partir do texto original
//! (hífen removido, numerais romanos em arábicos, letras gregas contraídas) e
//! normaliza cada uma.
//!
//! ```rust
//! use genemap_core::normalizer::TermNormalizer;
//!
//! let normalizer = TermNormalizer::new().unwrap();
//! assert_eq!(normalizer.normalize("TNF-alpha receptor 2"), "tnf alpha receptor 2");
//! assert_eq!(normalizer.normalize("IL2R"), "il 2 r");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::resources::{Lexicon, WordList};
use crate::tokenizer::stem_token;

/// Numerais romanos reconhecidos no final de tokens.
pub const ROMAN_NUMERALS: [&str; 20] = [
    "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X", "XI", "XII", "XIII", "XIV", "XV",
    "XVI", "XVII", "XVIII", "XIX", "XX",
];

/// Letras gregas contraídas para a inicial nas variantes.
pub const GREEK_CONTRACTIONS: [(&str, &str); 4] =
    [("alpha", "a"), ("beta", "b"), ("gamma", "g"), ("delta", "d")];

/// Palavras separadas de tokens junto com as letras gregas.
const SPLIT_WORDS: [&str; 2] = ["high", "low"];

const MAX_NORMALIZATION_PASSES: usize = 8;

// Ordem reversa: "III" precisa ser tentado antes de "II" e "I".
static ROMAN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let mut numerals = ROMAN_NUMERALS.to_vec();
    numerals.sort_by(|a, b| b.cmp(a));
    Regex::new(&numerals.join("|")).unwrap()
});

static HYPHEN_BETWEEN_NON_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^-0-9])-([^0-9])").unwrap());

static GREEK_CONTRACTION_PATTERNS: Lazy<Vec<(Regex, Regex, &'static str)>> = Lazy::new(|| {
    GREEK_CONTRACTIONS
        .iter()
        .map(|(name, letter)| {
            (
                Regex::new(name).unwrap(),
                Regex::new(&format!(r"\s?{name}")).unwrap(),
                *letter,
            )
        })
        .collect()
});

/// Um casamento `[start, end)` de um padrão dentro de um token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongestMatch {
    pub start: usize,
    pub end: usize,
    pub value: String,
}

impl LongestMatch {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn overlaps(&self, other: &LongestMatch) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Busca de múltiplos padrões com resolução de sobreposição pelo casamento mais longo.
#[derive(Debug, Clone)]
pub struct LongestMatcher {
    patterns: Vec<String>,
}

impl LongestMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Todas as ocorrências de todos os padrões, sem sobreposição.
    ///
    /// Ordena por início (e comprimento decrescente) e intercala: um casamento
    /// estritamente mais longo substitui o anterior sobreposto; em caso contrário
    /// fica o primeiro visto.
    pub fn find(&self, text: &str) -> Vec<LongestMatch> {
        let mut all: Vec<LongestMatch> = Vec::new();
        for pattern in &self.patterns {
            if pattern.is_empty() {
                continue;
            }
            let mut from = 0;
            while let Some(pos) = text[from..].find(pattern.as_str()) {
                let start = from + pos;
                all.push(LongestMatch {
                    start,
                    end: start + pattern.len(),
                    value: pattern.clone(),
                });
                // avança um caractere para permitir ocorrências sobrepostas
                from = start + text[start..].chars().next().map_or(1, char::len_utf8);
            }
        }
        all.sort_by(|a, b| a.start.cmp(&b.start).then(b.len().cmp(&a.len())));

        let mut merged: Vec<LongestMatch> = Vec::new();
        for m in all {
            match merged.last_mut() {
                Some(last) if last.overlaps(&m) => {
                    if m.len() > last.len() {
                        *last = m;
                    }
                }
                _ => merged.push(m),
            }
        }
        merged
    }
}

/// Normalizador determinístico de nomes de genes.
///
/// Puro e sem estado mutável: pode ser compartilhado entre threads (`Arc`).
#[derive(Debug, Clone)]
pub struct TermNormalizer {
    stopwords: WordList,
    non_descriptives: WordList,
    greek_letters: WordList,
    split_matcher: LongestMatcher,
}

impl TermNormalizer {
    /// Normalizador com o léxico embutido.
    pub fn new() -> Result<Self> {
        Self::with_lexicon(&Lexicon::bundled())
    }

    /// Falha se a lista de letras gregas ou de termos não descritivos estiver vazia.
    pub fn with_lexicon(lexicon: &Lexicon) -> Result<Self> {
        lexicon.validate()?;
        let split_matcher = LongestMatcher::new(
            lexicon
                .greek_letters
                .iter()
                .chain(SPLIT_WORDS.iter().copied())
                .map(str::to_string),
        );
        Ok(Self {
            stopwords: lexicon.stopwords.clone(),
            non_descriptives: lexicon.non_descriptives.clone(),
            greek_letters: lexicon.greek_letters.clone(),
            split_matcher,
        })
    }

    pub fn greek_letters(&self) -> &WordList {
        &self.greek_letters
    }

    /// Forma canônica de um nome.
    pub fn normalize(&self, text: &str) -> String {
        let (normalized, converged) = self.normalize_to_fixpoint(text);
        if !converged {
            debug!(
                input = text,
                output = %normalized,
                passes = MAX_NORMALIZATION_PASSES,
                "normalization did not reach a fixed point"
            );
        }
        normalized
    }

    /// Repete o passo de normalização até a saída não mudar. O booleano diz
    /// se o ponto fixo foi atingido antes do limite de passos.
    fn normalize_to_fixpoint(&self, text: &str) -> (String, bool) {
        let mut current = self.normalize_pass(text);
        for _ in 1..MAX_NORMALIZATION_PASSES {
            let next = self.normalize_pass(&current);
            if next == current {
                return (current, true);
            }
            current = next;
        }
        let stable = self.normalize_pass(&current) == current;
        (current, stable)
    }

    fn normalize_pass(&self, text: &str) -> String {
        let tokens = self.remove_stopwords(text);
        let mut tokens = remove_special_characters(tokens);
        loop {
            let before = tokens.clone();
            tokens = split_away_numbers(tokens);
            tokens = special_token_split(tokens);
            if tokens == before {
                break;
            }
        }
        let tokens = self.split_away_embedded_words(tokens);
        let tokens = split_away_roman_numerals(tokens);
        let tokens = replace_roman_numerals(tokens);
        tokens
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Formas alternativas normalizadas, na ordem: sem hífen, numerais romanos
    /// em arábicos, letras gregas contraídas, letras gregas contraídas e coladas.
    /// Duplicatas são removidas preservando a primeira ocorrência.
    pub fn variants(&self, text: &str) -> Vec<String> {
        let mut result: Vec<String> = Vec::with_capacity(4);
        for raw in generate_raw_variants(text) {
            let normalized = self.normalize(&raw);
            if !normalized.is_empty() && !result.contains(&normalized) {
                result.push(normalized);
            }
        }
        result
    }

    /// Reduz cada token de um nome normalizado ao radical.
    pub fn stem(&self, normalized: &str) -> String {
        normalized
            .split_whitespace()
            .map(stem_token)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_non_descriptive(&self, term: &str) -> bool {
        self.non_descriptives.contains(term)
    }

    /// Remove os tokens não descritivos ("protein", "gene"...) de um nome normalizado.
    pub fn remove_non_descriptives(&self, normalized: &str) -> String {
        normalized
            .split(' ')
            .filter(|t| !t.is_empty() && !self.non_descriptives.contains(t))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn remove_stopwords(&self, text: &str) -> Vec<String> {
        let tokens: Vec<&str> = text.split(' ').collect();
        // "for" (ferredoxin oxidoreductase) é um nome válido quando sozinho
        if tokens.len() == 1 {
            return vec![tokens[0].to_string()];
        }
        tokens
            .into_iter()
            .filter(|t| !self.stopwords.contains(t))
            .map(str::to_string)
            .collect()
    }

    fn split_away_embedded_words(&self, tokens: Vec<String>) -> Vec<String> {
        let mut result = Vec::with_capacity(tokens.len());
        for token in tokens {
            let lower = token.to_lowercase();
            let matches = self.split_matcher.find(&lower);
            let whole = matches.len() == 1 && matches[0].value == lower;
            if matches.is_empty() || whole {
                result.push(token);
                continue;
            }
            let mut pos = 0;
            for m in &matches {
                if m.start > pos {
                    result.push(lower[pos..m.start].to_string());
                }
                result.push(m.value.clone());
                pos = m.end;
            }
            if pos < lower.len() {
                result.push(lower[pos..].to_string());
            }
        }
        result
    }
}

fn remove_special_characters(tokens: Vec<String>) -> Vec<String> {
    let mut result = Vec::new();
    for token in tokens {
        let chars: Vec<char> = token.chars().collect();
        let mut cleaned = String::with_capacity(token.len());
        for (i, &c) in chars.iter().enumerate() {
            let decimal_point = c == '.'
                && i > 0
                && chars[i - 1].is_ascii_digit()
                && chars.get(i + 1).map_or(false, |n| n.is_ascii_digit());
            if c.is_ascii_alphanumeric() || decimal_point {
                cleaned.push(c);
            } else {
                cleaned.push(' ');
            }
        }
        result.extend(cleaned.split_whitespace().map(str::to_string));
    }
    result
}

/// `ABC123` → `ABC`, `123` (token inteiro letras seguidas de dígitos).
fn split_away_numbers(tokens: Vec<String>) -> Vec<String> {
    let mut result = Vec::with_capacity(tokens.len());
    for token in tokens {
        let letters = token.bytes().take_while(u8::is_ascii_alphabetic).count();
        let rest = &token[letters..];
        if letters > 0 && !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            result.push(token[..letters].to_string());
            result.push(rest.to_string());
        } else {
            result.push(token);
        }
    }
    result
}

/// Posições internas de quebra de um token.
fn split_points(token: &[u8]) -> Vec<usize> {
    let mut points = Vec::new();
    for i in 1..token.len() {
        let prev = token[i - 1];
        let cur = token[i];
        let lower_to_upper_or_digit =
            prev.is_ascii_lowercase() && (cur.is_ascii_uppercase() || cur.is_ascii_digit());
        let upper_to_digit = prev.is_ascii_uppercase() && cur.is_ascii_digit();
        let digit_to_letter = prev.is_ascii_digit() && cur.is_ascii_alphabetic();
        let double_upper_to_lower =
            i >= 2 && token[i - 2].is_ascii_uppercase() && prev.is_ascii_uppercase() && cur.is_ascii_lowercase();
        if lower_to_upper_or_digit || upper_to_digit || digit_to_letter || double_upper_to_lower {
            points.push(i);
        }
    }
    points
}

fn special_token_split(tokens: Vec<String>) -> Vec<String> {
    let mut result = Vec::with_capacity(tokens.len());
    for token in tokens {
        let points = split_points(token.as_bytes());
        let mut last = 0;
        for p in points {
            result.push(token[last..p].to_string());
            last = p;
        }
        result.push(token[last..].to_string());
    }
    result
}

/// Separa o numeral romano que termina o token ("CDII" → "CD", "II").
fn split_away_roman_numerals(tokens: Vec<String>) -> Vec<String> {
    let mut result = Vec::with_capacity(tokens.len());
    for token in tokens {
        let suffix = ROMAN_PATTERN
            .find_iter(&token)
            .find(|m| m.start() > 0 && m.end() == token.len())
            .map(|m| m.start());
        match suffix {
            Some(start) => {
                result.push(token[..start].to_string());
                result.push(token[start..].to_string());
            }
            None => result.push(token),
        }
    }
    result
}

fn replace_roman_numerals(mut tokens: Vec<String>) -> Vec<String> {
    if tokens.len() > 1 {
        for token in tokens.iter_mut() {
            let arabic = match token.as_str() {
                "I" => "1",
                "II" => "2",
                "III" => "3",
                "IV" => "4",
                _ => continue,
            };
            *token = arabic.to_string();
        }
    }
    tokens
}

fn roman_to_arabic(token: &str) -> Option<usize> {
    ROMAN_NUMERALS.iter().position(|r| *r == token).map(|i| i + 1)
}

/// Variantes ainda não normalizadas de um texto.
pub fn generate_raw_variants(text: &str) -> Vec<String> {
    let mut variants = Vec::with_capacity(4);
    variants.push(HYPHEN_BETWEEN_NON_DIGITS.replace_all(text, "$1$2").into_owned());

    let split = split_away_roman_numerals(text.split_whitespace().map(str::to_string).collect());
    let arabic: Vec<String> = split
        .iter()
        .map(|t| match roman_to_arabic(t) {
            Some(n) if split.len() > 1 => n.to_string(),
            _ => t.clone(),
        })
        .collect();
    variants.push(arabic.join(" "));

    let mut contracted = text.to_string();
    let mut glued = text.to_string();
    for (plain, spaced, letter) in GREEK_CONTRACTION_PATTERNS.iter() {
        contracted = plain.replace_all(&contracted, *letter).into_owned();
        glued = spaced.replace_all(&glued, *letter).into_owned();
    }
    variants.push(contracted);
    variants.push(glued);
    variants
}
