//! # Candidatos (SynHit)
//!
//! Um [`SynHit`] é um sinônimo do dicionário que casou com uma menção. Um mesmo
//! sinônimo pode pertencer a vários genes ("p53" existe em humano, camundongo,
//! rato...), então os identificadores, os organismos e as prioridades ficam em
//! vetores alinhados por posição:
//!
//! ```text
//! ids        = ["7157", "22059", "24842"]
//! tax_ids    = ["9606", "10090", "10116"]
//! priorities = [-1,     -1,      2     ]
//! ```
//!
//! A desambiguação preenche o organismo escolhido ([`SynHit::set_tax_id`]) e, se
//! ele determina um único gene, o identificador final.
//!
//! ## Ordenação
//!
//! A ordem é sempre decrescente e o critério é escolhido no momento da
//! ordenação via [`HitOrder`], nunca guardado no registro.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{GeneMappingError, Result};
use crate::scoring::PERFECT_SCORE;

/// Critério de ordenação de candidatos (sempre decrescente).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitOrder {
    ByMentionScore,
    BySemanticScore,
    ByRandomTiebreak,
}

impl HitOrder {
    pub fn compare(&self, a: &SynHit, b: &SynHit) -> Ordering {
        match self {
            HitOrder::ByMentionScore => b.mention_score.total_cmp(&a.mention_score),
            HitOrder::BySemanticScore => b.semantic_score.total_cmp(&a.semantic_score),
            HitOrder::ByRandomTiebreak => b.tiebreak.cmp(&a.tiebreak),
        }
    }

    /// Ordenação estável: empates mantêm a ordem de chegada.
    pub fn sort(&self, hits: &mut [SynHit]) {
        hits.sort_by(|a, b| self.compare(a, b));
    }
}

/// Um sinônimo candidato com seus genes e organismos.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynHit {
    pub synonym: String,
    pub mention_score: f64,
    pub semantic_score: f64,
    pub ids: Vec<String>,
    pub tax_ids: Vec<String>,
    /// Prioridade da fonte do nome por identificador (menor = mais confiável, -1 = símbolo oficial).
    pub priorities: Vec<i32>,
    pub source: String,
    /// Texto da menção (minúsculo) que originou a busca.
    pub mapped_mention: String,
    tax_id: Option<String>,
    id: Option<String>,
    taxonomy_specific_ids: Vec<String>,
    tiebreak: u64,
}

impl SynHit {
    pub fn new(
        synonym: impl Into<String>,
        mention_score: f64,
        ids: Vec<String>,
        source: impl Into<String>,
        tax_ids: Vec<String>,
    ) -> Self {
        let synonym = synonym.into();
        let tiebreak = tiebreak_of(&synonym, &ids);
        let priorities = vec![0; ids.len()];
        Self {
            synonym,
            mention_score,
            semantic_score: 0.0,
            ids,
            tax_ids,
            priorities,
            source: source.into(),
            mapped_mention: String::new(),
            tax_id: None,
            id: None,
            taxonomy_specific_ids: Vec::new(),
            tiebreak,
        }
    }

    pub fn with_priorities(mut self, priorities: Vec<i32>) -> Self {
        self.priorities = priorities;
        self
    }

    pub fn is_exact_match(&self) -> bool {
        self.mention_score == PERFECT_SCORE
    }

    /// Organismo aceito para este sinônimo, se já atribuído.
    pub fn tax_id(&self) -> Option<&str> {
        self.tax_id.as_deref()
    }

    /// Identificador final. Sem desambiguação explícita, cai para o único id do
    /// organismo atribuído ou para o único id do sinônimo.
    pub fn id(&self) -> Option<&str> {
        if let Some(id) = &self.id {
            return Some(id);
        }
        if let Some(first) = self.taxonomy_specific_ids.first() {
            return Some(first);
        }
        if self.ids.len() == 1 {
            return Some(&self.ids[0]);
        }
        None
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn taxonomy_specific_ids(&self) -> &[String] {
        &self.taxonomy_specific_ids
    }

    /// Aceita o organismo para este sinônimo.
    ///
    /// Se o organismo corresponde a um único gene, esse gene vira o id final;
    /// senão um id escolhido antes para outro organismo é descartado.
    /// Organismo ausente do sinônimo é erro de argumento e não altera o registro.
    pub fn set_tax_id(&mut self, tax_id: &str) -> Result<()> {
        let specific: Vec<String> = self.gene_ids_of_tax_id(tax_id).map(str::to_string).collect();
        if specific.is_empty() {
            return Err(GeneMappingError::InvalidArgument(format!(
                "cannot set taxonomy ID '{tax_id}' to synonym '{}': it does not occur for this synonym",
                self.synonym
            )));
        }
        self.id = match specific.as_slice() {
            [only] => Some(only.clone()),
            _ => None,
        };
        self.taxonomy_specific_ids = specific;
        self.tax_id = Some(tax_id.to_string());
        Ok(())
    }

    /// Fixa organismo e id no último gene do organismo, descartando atribuições anteriores.
    pub fn restrict_to_tax_id(&mut self, tax_id: &str) -> Result<()> {
        let last = self
            .ids
            .iter()
            .zip(&self.tax_ids)
            .filter(|(_, t)| t.as_str() == tax_id)
            .map(|(id, _)| id.clone())
            .last();
        match last {
            Some(id) => {
                self.id = Some(id);
                self.tax_id = Some(tax_id.to_string());
                Ok(())
            }
            None => Err(GeneMappingError::InvalidArgument(format!(
                "synonym '{}' does not contain taxonomy ID {tax_id}",
                self.synonym
            ))),
        }
    }

    pub fn has_tax_id(&self, tax_id: &str) -> bool {
        self.tax_ids.iter().any(|t| t == tax_id)
    }

    pub fn gene_ids_of_tax_id<'a>(&'a self, tax_id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.ids
            .iter()
            .zip(&self.tax_ids)
            .filter(move |(_, t)| t.as_str() == tax_id)
            .map(|(id, _)| id.as_str())
    }

    /// Prioridades dos ids informados, na ordem dos ids do sinônimo.
    pub fn priorities_of_ids(&self, ids: &[String]) -> Vec<i32> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.ids
            .iter()
            .zip(&self.priorities)
            .filter(|(id, _)| wanted.contains(id.as_str()))
            .map(|(_, p)| *p)
            .collect()
    }

    pub fn synonym_priority(&self) -> Option<i32> {
        self.priorities.first().copied()
    }

    pub fn is_disambiguated(&self) -> bool {
        self.id.is_some()
    }

    /// Mais de um gene usa este sinônimo.
    pub fn is_ambiguous_in_general(&self) -> bool {
        self.ids.len() > 1
    }

    /// Algum organismo aparece mais de uma vez (genes diferentes da mesma espécie).
    pub fn is_intra_species_ambiguous(&self) -> bool {
        let mut seen = HashSet::new();
        self.tax_ids.iter().any(|t| !seen.insert(t.as_str()))
    }

    /// Ao menos dois organismos distintos.
    pub fn is_inter_species_ambiguous(&self) -> bool {
        self.tax_ids.iter().collect::<HashSet<_>>().len() > 1
    }
}

impl fmt::Display for SynHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "syn={} ids={:?} tax={:?} score={:.3} sem={:.3} source={}",
            self.synonym, self.ids, self.tax_ids, self.mention_score, self.semantic_score, self.source
        )
    }
}

fn tiebreak_of(synonym: &str, ids: &[String]) -> u64 {
    let mut hasher = DefaultHasher::new();
    synonym.hash(&mut hasher);
    ids.hash(&mut hasher);
    hasher.finish()
}

/// Ids dos candidatos, para log.
pub fn show_hit_ids(hits: &[SynHit]) -> String {
    hits.iter()
        .map(|h| format!("{}:{:?}", h.synonym, h.ids))
        .collect::<Vec<_>>()
        .join(", ")
}
