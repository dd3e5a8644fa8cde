//! # Features de Pares (Menção, Sinônimo)
//!
//! O scorer MaxEnt decide se um sinônimo do dicionário designa o mesmo gene que
//! a menção. Para isso cada par vira um vetor esparso de features, todas em
//! `[0, 1]`, que o modelo pondera.
//!
//! ## Features Implementadas
//!
//! ### Sobreposição de superfície
//! - `token_dice`: coeficiente de Dice entre os conjuntos de tokens
//! - `same_token_set`: mesmos tokens, em qualquer ordem
//! - `prefix_match`: o primeiro token coincide
//! - `length_ratio`: razão entre o menor e o maior comprimento
//!
//! ### Similaridade de cadeia (`strsim`)
//! - `jaro_winkler`
//! - `edit_similarity`: Levenshtein normalizado
//!
//! ### Concordância de tipo
//! - `number_compatible`: os mesmos números nos dois lados
//! - `greek_agreement`: as mesmas letras gregas nos dois lados
//!
//! Mais o termo constante `bias`.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::filter::is_number_compatible;
use crate::resources::WordList;

/// Vetor esparso de features.
///
/// Um mapa (`HashMap<String, f64>`) deixa o modelo tolerar features novas ou
/// ausentes: um peso sem feature correspondente simplesmente não contribui.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Features ativas. Ex: `{"bias": 1.0, "jaro_winkler": 0.93}`.
    pub features: HashMap<String, f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.features.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.features.get(key).copied()
    }

    /// Produto escalar com um vetor de pesos.
    ///
    /// $$ \text{score} = \sum (w_i \cdot f_i) $$
    pub fn dot(&self, weights: &HashMap<String, f64>) -> f64 {
        self.features
            .iter()
            .map(|(k, v)| v * weights.get(k).unwrap_or(&0.0))
            .sum()
    }
}

/// Extrator de features de pares.
#[derive(Debug, Clone)]
pub struct PairFeatureExtractor {
    greek_letters: WordList,
}

impl PairFeatureExtractor {
    pub fn new(greek_letters: WordList) -> Self {
        Self { greek_letters }
    }

    /// Features do par (menção normalizada, sinônimo normalizado).
    pub fn extract(&self, mention: &str, synonym: &str) -> FeatureVector {
        let mut fv = FeatureVector::new();
        fv.insert("bias", 1.0);

        let a: BTreeSet<&str> = mention.split_whitespace().collect();
        let b: BTreeSet<&str> = synonym.split_whitespace().collect();
        fv.insert("token_dice", dice(&a, &b));
        if !a.is_empty() && a == b {
            fv.insert("same_token_set", 1.0);
        }

        let first_a = mention.split_whitespace().next();
        if first_a.is_some() && first_a == synonym.split_whitespace().next() {
            fv.insert("prefix_match", 1.0);
        }

        let (la, lb) = (mention.chars().count(), synonym.chars().count());
        if la.max(lb) > 0 {
            fv.insert("length_ratio", la.min(lb) as f64 / la.max(lb) as f64);
        }

        fv.insert("jaro_winkler", strsim::jaro_winkler(mention, synonym));
        fv.insert("edit_similarity", strsim::normalized_levenshtein(mention, synonym));

        if is_number_compatible(mention, synonym) {
            fv.insert("number_compatible", 1.0);
        }
        if self.greek_tokens(&a) == self.greek_tokens(&b) {
            fv.insert("greek_agreement", 1.0);
        }
        fv
    }

    fn greek_tokens<'a>(&self, tokens: &BTreeSet<&'a str>) -> BTreeSet<&'a str> {
        tokens
            .iter()
            .copied()
            .filter(|t| self.greek_letters.contains(t))
            .collect()
    }
}

/// Coeficiente de Dice: 2|A ∩ B| / (|A| + |B|).
pub fn dice(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }
    2.0 * a.intersection(b).count() as f64 / total as f64
}
