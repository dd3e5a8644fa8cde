//! # Resultado do Mapeamento
//!
//! [`MentionMappingResult`] acompanha uma menção por todas as etapas:
//!
//! ```text
//! original_candidates ─▶ filtered_candidates ─▶ semantically_ordered_candidates
//!                                   │
//!                                   ▼
//!                           best_candidate ─▶ result_entries
//! ```
//!
//! O melhor candidato começa como [`Resolution::Rejected`], a sentinela de
//! rejeição. Menção sem candidatos não é erro: ela simplesmente continua
//! rejeitada. Ler campos de candidato (sinônimo, fonte, organismos) da
//! sentinela falha com `InvalidState`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GeneMappingError, Result};
use crate::synhit::SynHit;

/// Texto exibido para menções rejeitadas.
pub const REJECTION_LABEL: &str = "GENE MENTION REJECTED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Approx,
}

/// Melhor(es) candidato(s) de uma menção ou a sentinela de rejeição.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "hits", rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    Rejected,
    Mapped(Vec<SynHit>),
}

impl Resolution {
    /// `Mapped` com lista vazia também conta como rejeição.
    pub fn from_hits(hits: Vec<SynHit>) -> Self {
        if hits.is_empty() {
            Resolution::Rejected
        } else {
            Resolution::Mapped(hits)
        }
    }

    pub fn is_rejected(&self) -> bool {
        match self {
            Resolution::Rejected => true,
            Resolution::Mapped(hits) => hits.is_empty(),
        }
    }

    /// Candidatos aceitos; vazio para a sentinela.
    pub fn hits(&self) -> &[SynHit] {
        match self {
            Resolution::Rejected => &[],
            Resolution::Mapped(hits) => hits,
        }
    }

    pub fn best(&self) -> Result<&SynHit> {
        self.hits().first().ok_or_else(rejected)
    }

    pub fn best_mut(&mut self) -> Result<&mut SynHit> {
        match self {
            Resolution::Mapped(hits) => hits.first_mut().ok_or_else(rejected),
            Resolution::Rejected => Err(rejected()),
        }
    }

    /// Troca o primeiro candidato, transformando a sentinela em resultado se preciso.
    pub fn replace_best(&mut self, hit: SynHit) {
        match self {
            Resolution::Mapped(hits) if !hits.is_empty() => hits[0] = hit,
            _ => *self = Resolution::Mapped(vec![hit]),
        }
    }

    pub fn synonym(&self) -> Result<&str> {
        self.best().map(|h| h.synonym.as_str())
    }

    pub fn source(&self) -> Result<&str> {
        self.best().map(|h| h.source.as_str())
    }

    pub fn tax_ids(&self) -> Result<&[String]> {
        self.best().map(|h| h.tax_ids.as_slice())
    }

    pub fn mapped_mention(&self) -> Result<&str> {
        self.best().map(|h| h.mapped_mention.as_str())
    }

    /// Score do melhor candidato; a sentinela fica abaixo de qualquer score.
    pub fn mention_score(&self) -> f64 {
        self.best().map_or(f64::MIN, |h| h.mention_score)
    }

    pub fn is_exact_match(&self) -> bool {
        self.best().is_ok_and(SynHit::is_exact_match)
    }

    /// Identificador final, se houver candidato e ele estiver resolvido.
    pub fn id(&self) -> Option<&str> {
        self.best().ok().and_then(SynHit::id)
    }
}

fn rejected() -> GeneMappingError {
    GeneMappingError::InvalidState(
        "this is the rejection sentinel; it only marks a rejected gene mention".into(),
    )
}

/// Progresso e resultado do mapeamento de uma menção.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MentionMappingResult {
    /// Texto original da menção.
    pub mapped_mention: String,
    pub original_candidates: Vec<SynHit>,
    pub filtered_candidates: Vec<SynHit>,
    pub semantically_ordered_candidates: Vec<SynHit>,
    pub best_candidate: Resolution,
    pub result_entries: Resolution,
    pub match_type: Option<MatchType>,
    /// Número de genes distintos entre os melhores candidatos.
    pub ambiguity_degree: usize,
    pub confidence: f64,
    pub candidate_retrieval_time: Duration,
    pub disambiguation_time: Duration,
}

impl MentionMappingResult {
    pub fn new(mapped_mention: impl Into<String>) -> Self {
        Self {
            mapped_mention: mapped_mention.into(),
            ..Self::default()
        }
    }

    /// Resultado de menção sem candidatos.
    pub fn rejected(mapped_mention: impl Into<String>) -> Self {
        Self::new(mapped_mention)
    }

    pub fn is_rejected(&self) -> bool {
        self.result_entries.is_rejected()
    }

    /// Copia o melhor candidato para as entradas finais e deriva tipo de
    /// casamento, grau de ambiguidade e confiança.
    pub fn finalize(&mut self) {
        self.result_entries = self.best_candidate.clone();
        match self.result_entries.best() {
            Ok(best) => {
                self.match_type = Some(if best.is_exact_match() {
                    MatchType::Exact
                } else {
                    MatchType::Approx
                });
                let mut ids: Vec<&str> = self
                    .result_entries
                    .hits()
                    .iter()
                    .flat_map(|h| h.ids.iter().map(String::as_str))
                    .collect();
                ids.sort_unstable();
                ids.dedup();
                self.ambiguity_degree = ids.len();
                self.confidence = best.mention_score;
            }
            Err(_) => {
                self.match_type = None;
                self.ambiguity_degree = 0;
                self.confidence = 0.0;
            }
        }
    }
}

/// Resultados de todas as menções de um documento.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMappingResult {
    pub doc_id: String,
    pub mention_results: Vec<MentionMappingResult>,
}

impl DocumentMappingResult {
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            mention_results: Vec::new(),
        }
    }

    /// Menções que receberam um candidato.
    pub fn mapped(&self) -> impl Iterator<Item = &MentionMappingResult> {
        self.mention_results.iter().filter(|r| !r.is_rejected())
    }
}
