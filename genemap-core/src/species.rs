//! # Evidência de Organismo
//!
//! Um mesmo nome de gene existe em muitas espécies. Para escolher o organismo de
//! uma menção, o documento fornece **evidências** de onde cada espécie aparece
//! em relação à menção. Cada evidência tem um nível de confiabilidade:
//!
//! ```text
//! Compound        "human [p53]"           mesmo substantivo composto
//! Phrase          "p53 of human cells"    mesma frase nominal / enumeração
//! Title           espécie citada no título
//! Sentence        mesma sentença
//! PreviousSentence
//! FirstSentence   primeira sentença do resumo
//! Anywhere        qualquer ponto do resumo
//! Mesh            termos MeSH do documento
//! Prefix          prefixo do nome ("hTERT" → humano)
//! Default         espécie padrão do corpus (só sem nenhuma outra evidência)
//! ```
//!
//! A ordem da tabela é a ordem do `enum`: a variante de menor ordinal é a mais
//! confiável. Empates no melhor nível mantêm todos os organismos.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::result::MentionMappingResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesEvidence {
    Compound,
    Phrase,
    Title,
    Sentence,
    PreviousSentence,
    FirstSentence,
    Anywhere,
    Mesh,
    Prefix,
    Default,
}

impl SpeciesEvidence {
    pub const ALL: [SpeciesEvidence; 10] = [
        SpeciesEvidence::Compound,
        SpeciesEvidence::Phrase,
        SpeciesEvidence::Title,
        SpeciesEvidence::Sentence,
        SpeciesEvidence::PreviousSentence,
        SpeciesEvidence::FirstSentence,
        SpeciesEvidence::Anywhere,
        SpeciesEvidence::Mesh,
        SpeciesEvidence::Prefix,
        SpeciesEvidence::Default,
    ];

    /// Peso usado como score de organismo: 10 para `Compound` até 1 para `Default`.
    pub fn reliability(&self) -> f64 {
        (Self::ALL.len() - *self as usize) as f64
    }
}

/// Organismo → níveis de evidência encontrados para uma menção.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyEvidence {
    tiers: BTreeMap<String, BTreeSet<SpeciesEvidence>>,
}

impl TaxonomyEvidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tax_id: impl Into<String>, evidence: SpeciesEvidence) {
        self.tiers.entry(tax_id.into()).or_default().insert(evidence);
    }

    /// Insere só se o organismo ainda não tem evidência mais específica.
    pub fn insert_if_absent(&mut self, tax_id: &str, evidence: SpeciesEvidence) {
        if !self.tiers.contains_key(tax_id) {
            self.insert(tax_id, evidence);
        }
    }

    pub fn contains(&self, tax_id: &str) -> bool {
        self.tiers.contains_key(tax_id)
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn tax_ids(&self) -> impl Iterator<Item = &str> {
        self.tiers.keys().map(String::as_str)
    }

    pub fn evidence_of(&self, tax_id: &str) -> Option<&BTreeSet<SpeciesEvidence>> {
        self.tiers.get(tax_id)
    }

    /// Melhor nível de um organismo.
    pub fn best_tier_of(&self, tax_id: &str) -> Option<SpeciesEvidence> {
        self.tiers.get(tax_id).and_then(|e| e.first().copied())
    }

    /// Melhor nível presente e todos os organismos que o atingem.
    pub fn best_tier(&self) -> Option<(SpeciesEvidence, Vec<&str>)> {
        let best = self.tiers.values().filter_map(|e| e.first().copied()).min()?;
        let organisms = self
            .tiers
            .iter()
            .filter(|(_, e)| e.first() == Some(&best))
            .map(|(t, _)| t.as_str())
            .collect();
        Some((best, organisms))
    }

    /// Score por organismo: confiabilidade do melhor nível, apenas para os
    /// organismos presentes entre os candidatos da menção.
    pub fn taxonomy_scores<'a>(
        &self,
        candidate_tax_ids: impl IntoIterator<Item = &'a str>,
    ) -> BTreeMap<String, f64> {
        let candidates: BTreeSet<&str> = candidate_tax_ids.into_iter().collect();
        self.tiers
            .iter()
            .filter(|(tax, _)| candidates.contains(tax.as_str()))
            .filter_map(|(tax, e)| e.first().map(|best| (tax.clone(), best.reliability())))
            .collect()
    }
}

/// Organismo de maior score; empates ficam com o menor id.
pub fn highest_scoring_tax(scores: &BTreeMap<String, f64>) -> Option<&str> {
    let mut best: Option<(&str, f64)> = None;
    for (tax, &score) in scores {
        if score > 0.0 && best.map_or(true, |(_, b)| score > b) {
            best = Some((tax, score));
        }
    }
    best.map(|(tax, _)| tax)
}

/// Atribui ao melhor candidato o organismo de maior score.
///
/// 1. tenta no melhor candidato atual;
/// 2. senão procura entre os candidatos filtrados um que aceite o organismo e o promove;
/// 3. senão repete com a espécie padrão.
///
/// Se nada funcionar, o melhor candidato fica sem organismo. Devolve se houve
/// atribuição.
pub fn accept_highest_scoring_tax(
    result: &mut MentionMappingResult,
    scores: &BTreeMap<String, f64>,
    default_species: Option<&str>,
) -> bool {
    let Some(best_tax) = highest_scoring_tax(scores) else {
        return false;
    };
    if result.best_candidate.is_rejected() {
        return false;
    }
    if assign_tax_to_result(result, best_tax) {
        return true;
    }
    if let Some(default) = default_species.filter(|d| !d.trim().is_empty()) {
        if assign_tax_to_result(result, default) {
            debug!(tax_id = default, "default species assigned");
            return true;
        }
    }
    warn!(
        best_tax,
        default_species,
        mention = %result.mapped_mention,
        "no candidate applies to the best scored or the default taxonomy ID"
    );
    false
}

fn assign_tax_to_result(result: &mut MentionMappingResult, tax_id: &str) -> bool {
    if let Ok(best) = result.best_candidate.best_mut() {
        if best.set_tax_id(tax_id).is_ok() {
            return true;
        }
    }
    for candidate in &result.filtered_candidates {
        if candidate.has_tax_id(tax_id) {
            let mut promoted = candidate.clone();
            if promoted.set_tax_id(tax_id).is_ok() {
                debug!(synonym = %promoted.synonym, tax_id, "candidate promoted for taxonomy");
                result.best_candidate.replace_best(promoted);
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Resolution;
    use crate::synhit::SynHit;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_title_outranks_sentence_regardless_of_insertion_order() {
        let mut evidence = TaxonomyEvidence::new();
        evidence.insert("A", SpeciesEvidence::Sentence);
        evidence.insert("B", SpeciesEvidence::Title);
        let (tier, organisms) = evidence.best_tier().unwrap();
        assert_eq!(tier, SpeciesEvidence::Title);
        assert_eq!(organisms, vec!["B"]);
    }

    #[test]
    fn test_ties_keep_all_organisms() {
        let mut evidence = TaxonomyEvidence::new();
        evidence.insert("10090", SpeciesEvidence::Anywhere);
        evidence.insert("9606", SpeciesEvidence::Phrase);
        evidence.insert("10116", SpeciesEvidence::Phrase);
        evidence.insert("10116", SpeciesEvidence::Anywhere);
        let (tier, organisms) = evidence.best_tier().unwrap();
        assert_eq!(tier, SpeciesEvidence::Phrase);
        assert_eq!(organisms, vec!["10116", "9606"]);
        assert!(TaxonomyEvidence::new().best_tier().is_none());
    }

    #[test]
    fn test_reliability_is_strictly_decreasing() {
        for pair in SpeciesEvidence::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].reliability() > pair[1].reliability());
        }
        assert_eq!(SpeciesEvidence::Compound.reliability(), 10.0);
        assert_eq!(SpeciesEvidence::Default.reliability(), 1.0);
    }

    #[test]
    fn test_scores_restricted_to_candidate_organisms() {
        let mut evidence = TaxonomyEvidence::new();
        evidence.insert("9606", SpeciesEvidence::Anywhere);
        evidence.insert("9606", SpeciesEvidence::Compound);
        evidence.insert("7227", SpeciesEvidence::Title);
        let scores = evidence.taxonomy_scores(["9606", "10090"]);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores["9606"], 10.0);
        assert_eq!(highest_scoring_tax(&scores), Some("9606"));
    }

    fn result_with(best: SynHit, filtered: Vec<SynHit>) -> MentionMappingResult {
        let mut result = MentionMappingResult::new("p53");
        result.filtered_candidates = filtered;
        result.best_candidate = Resolution::Mapped(vec![best]);
        result
    }

    #[test]
    fn test_best_candidate_is_promoted_for_taxonomy() {
        let human = SynHit::new("p 53", 10.0, strings(&["7157"]), "lexicon", strings(&["9606"]));
        let mouse = SynHit::new("trp 53", 8.0, strings(&["22059"]), "lexicon", strings(&["10090"]));
        let mut result = result_with(human.clone(), vec![human, mouse]);
        let scores: BTreeMap<String, f64> = [("10090".to_string(), 5.0)].into_iter().collect();
        assert!(accept_highest_scoring_tax(&mut result, &scores, None));
        let best = result.best_candidate.best().unwrap();
        assert_eq!(best.synonym, "trp 53");
        assert_eq!(best.tax_id(), Some("10090"));
    }

    #[test]
    fn test_falls_back_to_default_species() {
        let human = SynHit::new("p 53", 10.0, strings(&["7157"]), "lexicon", strings(&["9606"]));
        let mut result = result_with(human.clone(), vec![human]);
        let scores: BTreeMap<String, f64> = [("7227".to_string(), 4.0)].into_iter().collect();
        assert!(accept_highest_scoring_tax(&mut result, &scores, Some("9606")));
        assert_eq!(result.best_candidate.best().unwrap().id(), Some("7157"));

        let mut result = result_with(
            SynHit::new("p 53", 10.0, strings(&["7157"]), "lexicon", strings(&["9606"])),
            Vec::new(),
        );
        assert!(!accept_highest_scoring_tax(&mut result, &scores, Some("10090")));
        assert_eq!(result.best_candidate.best().unwrap().tax_id(), None);
    }
}
