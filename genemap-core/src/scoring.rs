//! # Estratégias de Score
//!
//! Um [`Scorer`] compara a forma normalizada da menção com a de um sinônimo e
//! devolve um valor em `[0, PERFECT_SCORE]`. Igualdade exata sempre vale
//! [`PERFECT_SCORE`], qualquer que seja a estratégia.
//!
//! | Tipo            | Código | Medida                                            |
//! |-----------------|--------|---------------------------------------------------|
//! | `simple`        | 0      | Dice sobre tokens                                 |
//! | `token_jaro`    | 1      | média simétrica do melhor Jaro-Winkler por token |
//! | `max_ent`       | 2      | probabilidade do modelo logístico de pares        |
//! | `jaro_winkler`  | 3      | Jaro-Winkler da cadeia inteira                    |
//! | `levenshtein`   | 4      | Levenshtein normalizado                           |
//! | `index_native`  | 10     | relevância do próprio índice                      |
//!
//! A configuração escolhe um scorer para casamentos exatos e outro para
//! aproximados, de forma independente. Os códigos numéricos legados são aceitos
//! ao lado dos nomes.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::error::{GeneMappingError, Result};
use crate::features::{dice, PairFeatureExtractor};
use crate::maxent::MaxEntModel;
use crate::resources::Lexicon;

/// Score máximo, atribuído a casamentos exatos.
pub const PERFECT_SCORE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "ScorerCode")]
pub enum ScorerKind {
    Simple,
    TokenJaro,
    MaxEnt,
    JaroWinkler,
    Levenshtein,
    IndexNative,
}

/// Forma aceita na configuração: código numérico ou nome.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScorerCode {
    Code(i64),
    Name(String),
}

impl TryFrom<ScorerCode> for ScorerKind {
    type Error = GeneMappingError;

    fn try_from(value: ScorerCode) -> Result<Self> {
        match value {
            ScorerCode::Code(code) => ScorerKind::from_code(code),
            ScorerCode::Name(name) => name.parse(),
        }
    }
}

impl ScorerKind {
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(ScorerKind::Simple),
            1 => Ok(ScorerKind::TokenJaro),
            2 => Ok(ScorerKind::MaxEnt),
            3 => Ok(ScorerKind::JaroWinkler),
            4 => Ok(ScorerKind::Levenshtein),
            10 => Ok(ScorerKind::IndexNative),
            other => Err(GeneMappingError::Configuration(format!("unknown scorer type {other}"))),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            ScorerKind::Simple => 0,
            ScorerKind::TokenJaro => 1,
            ScorerKind::MaxEnt => 2,
            ScorerKind::JaroWinkler => 3,
            ScorerKind::Levenshtein => 4,
            ScorerKind::IndexNative => 10,
        }
    }
}

impl FromStr for ScorerKind {
    type Err = GeneMappingError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return ScorerKind::from_code(code);
        }
        match s.to_lowercase().as_str() {
            "simple" => Ok(ScorerKind::Simple),
            "token_jaro" => Ok(ScorerKind::TokenJaro),
            "max_ent" | "maxent" => Ok(ScorerKind::MaxEnt),
            "jaro_winkler" => Ok(ScorerKind::JaroWinkler),
            "levenshtein" => Ok(ScorerKind::Levenshtein),
            "index_native" => Ok(ScorerKind::IndexNative),
            other => Err(GeneMappingError::Configuration(format!("unknown scorer type '{other}'"))),
        }
    }
}

impl fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScorerKind::Simple => "simple",
            ScorerKind::TokenJaro => "token_jaro",
            ScorerKind::MaxEnt => "max_ent",
            ScorerKind::JaroWinkler => "jaro_winkler",
            ScorerKind::Levenshtein => "levenshtein",
            ScorerKind::IndexNative => "index_native",
        };
        f.write_str(name)
    }
}

/// Estratégia de similaridade entre dois nomes normalizados.
pub trait Scorer: Send + Sync + fmt::Debug {
    fn score(&self, a: &str, b: &str) -> Result<f64>;

    fn info(&self) -> String;

    fn kind(&self) -> ScorerKind;
}

/// Casamento exato ou vazio, tratado antes de qualquer estratégia.
fn shortcut(a: &str, b: &str) -> Option<f64> {
    if a == b {
        Some(PERFECT_SCORE)
    } else if a.trim().is_empty() || b.trim().is_empty() {
        Some(0.0)
    } else {
        None
    }
}

#[derive(Debug, Default)]
pub struct SimpleScorer;

impl Scorer for SimpleScorer {
    fn score(&self, a: &str, b: &str) -> Result<f64> {
        if let Some(s) = shortcut(a, b) {
            return Ok(s);
        }
        let ta: BTreeSet<&str> = a.split_whitespace().collect();
        let tb: BTreeSet<&str> = b.split_whitespace().collect();
        Ok(dice(&ta, &tb) * PERFECT_SCORE)
    }

    fn info(&self) -> String {
        "Simple Scorer (token overlap)".into()
    }

    fn kind(&self) -> ScorerKind {
        ScorerKind::Simple
    }
}

/// Para cada token, o melhor Jaro-Winkler contra os tokens do outro lado; a
/// média é feita nos dois sentidos e as duas médias são combinadas.
#[derive(Debug, Default)]
pub struct TokenJaroScorer;

impl TokenJaroScorer {
    fn directed(from: &[&str], to: &[&str]) -> f64 {
        let total: f64 = from
            .iter()
            .map(|t| to.iter().map(|u| strsim::jaro_winkler(t, u)).fold(0.0, f64::max))
            .sum();
        total / from.len() as f64
    }
}

impl Scorer for TokenJaroScorer {
    fn score(&self, a: &str, b: &str) -> Result<f64> {
        if let Some(s) = shortcut(a, b) {
            return Ok(s);
        }
        let ta: Vec<&str> = a.split_whitespace().collect();
        let tb: Vec<&str> = b.split_whitespace().collect();
        let mean = (Self::directed(&ta, &tb) + Self::directed(&tb, &ta)) / 2.0;
        Ok(mean * PERFECT_SCORE)
    }

    fn info(&self) -> String {
        "Token Jaro-Winkler Scorer".into()
    }

    fn kind(&self) -> ScorerKind {
        ScorerKind::TokenJaro
    }
}

#[derive(Debug, Default)]
pub struct JaroWinklerScorer;

impl Scorer for JaroWinklerScorer {
    fn score(&self, a: &str, b: &str) -> Result<f64> {
        if let Some(s) = shortcut(a, b) {
            return Ok(s);
        }
        Ok(strsim::jaro_winkler(a, b) * PERFECT_SCORE)
    }

    fn info(&self) -> String {
        "Jaro-Winkler Scorer".into()
    }

    fn kind(&self) -> ScorerKind {
        ScorerKind::JaroWinkler
    }
}

#[derive(Debug, Default)]
pub struct LevenshteinScorer;

impl Scorer for LevenshteinScorer {
    fn score(&self, a: &str, b: &str) -> Result<f64> {
        if let Some(s) = shortcut(a, b) {
            return Ok(s);
        }
        Ok(strsim::normalized_levenshtein(a, b) * PERFECT_SCORE)
    }

    fn info(&self) -> String {
        "Levenshtein Scorer".into()
    }

    fn kind(&self) -> ScorerKind {
        ScorerKind::Levenshtein
    }
}

/// Marcador: o score vem do índice, não de uma comparação de cadeias.
#[derive(Debug, Default)]
pub struct IndexNativeScorer;

impl Scorer for IndexNativeScorer {
    fn score(&self, _a: &str, _b: &str) -> Result<f64> {
        Err(GeneMappingError::InvalidState(
            "the index-native scorer has no string score; use the index relevance".into(),
        ))
    }

    fn info(&self) -> String {
        "Index-native relevance score".into()
    }

    fn kind(&self) -> ScorerKind {
        ScorerKind::IndexNative
    }
}

#[derive(Debug)]
pub struct MaxEntScorer {
    model: MaxEntModel,
    extractor: PairFeatureExtractor,
}

impl MaxEntScorer {
    pub fn new(model: MaxEntModel, lexicon: &Lexicon) -> Self {
        Self {
            model,
            extractor: PairFeatureExtractor::new(lexicon.greek_letters.clone()),
        }
    }
}

impl Scorer for MaxEntScorer {
    fn score(&self, a: &str, b: &str) -> Result<f64> {
        if let Some(s) = shortcut(a, b) {
            return Ok(s);
        }
        let fv = self.extractor.extract(a, b);
        let p = self.model.probability(&fv);
        trace!(a, b, p, "maxent pair score");
        Ok(p * PERFECT_SCORE)
    }

    fn info(&self) -> String {
        format!("MaxEnt Scorer ({} weights)", self.model.weights.len())
    }

    fn kind(&self) -> ScorerKind {
        ScorerKind::MaxEnt
    }
}

/// Instancia a estratégia configurada. O modelo MaxEnt vem de `maxent_model`
/// quando informado, senão do modelo embutido.
pub fn create_scorer(
    kind: ScorerKind,
    maxent_model: Option<&Path>,
    lexicon: &Lexicon,
) -> Result<Arc<dyn Scorer>> {
    let scorer: Arc<dyn Scorer> = match kind {
        ScorerKind::Simple => Arc::new(SimpleScorer),
        ScorerKind::TokenJaro => Arc::new(TokenJaroScorer),
        ScorerKind::JaroWinkler => Arc::new(JaroWinklerScorer),
        ScorerKind::Levenshtein => Arc::new(LevenshteinScorer),
        ScorerKind::IndexNative => Arc::new(IndexNativeScorer),
        ScorerKind::MaxEnt => {
            let model = match maxent_model {
                Some(path) => MaxEntModel::from_file(path)?,
                None => MaxEntModel::bundled()?,
            };
            Arc::new(MaxEntScorer::new(model, lexicon))
        }
    };
    info!(scorer = %scorer.info(), "scorer created");
    Ok(scorer)
}
