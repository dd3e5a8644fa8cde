//! # Núcleos de Mapeamento
//!
//! Um [`MappingCore`] decide, para os candidatos de uma menção, quais formam o
//! melhor grupo e como os ids finais são resolvidos. A escolha do núcleo é feita
//! na configuração, entre as variantes de [`MappingCoreKind`].
//!
//! ## Weeping tree
//!
//! O núcleo simplificado trabalha só com uma lista de organismos permitidos:
//!
//! ```text
//! candidatos ──▶ com organismo permitido ──▶ grupo de maior score ──▶ 1º organismo aplicável
//!                                                                     (descarta se nenhum)
//! ```
//!
//! Se um índice de itens de contexto estiver configurado, um sinônimo que ainda
//! tem vários genes no organismo escolhido recebe o gene cujas GeneRIFs citam o
//! sinônimo.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CANDIDATE_CACHE, CONTEXT_ITEMS_CACHE};
use crate::error::{GeneMappingError, Result};
use crate::normalizer::TermNormalizer;
use crate::result::{MentionMappingResult, Resolution};
use crate::retrieval::{CandidateCacheRegistry, CandidateRetrieval};
use crate::semantic::{ContextItemsCacheRegistry, ContextItemsIndex};
use crate::synhit::SynHit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingCoreKind {
    #[default]
    WeepingTree,
}

impl fmt::Display for MappingCoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingCoreKind::WeepingTree => f.write_str("weeping_tree"),
        }
    }
}

/// Registros de cache compartilhados por todos os mapeadores do processo.
///
/// Quem cria o mapeador é dono dos registros e os passa adiante; dois
/// mapeadores sobre o mesmo índice usam o mesmo cache.
pub struct MappingCaches {
    pub candidates: CandidateCacheRegistry,
    pub context_items: ContextItemsCacheRegistry,
}

impl MappingCaches {
    pub fn new() -> Self {
        Self {
            candidates: CandidateCacheRegistry::new("candidates", CANDIDATE_CACHE),
            context_items: ContextItemsCacheRegistry::new("context items", CONTEXT_ITEMS_CACHE),
        }
    }
}

impl Default for MappingCaches {
    fn default() -> Self {
        Self::new()
    }
}

pub trait MappingCore: Send + Sync + fmt::Debug {
    fn kind(&self) -> MappingCoreKind;

    fn retrieval(&self) -> &CandidateRetrieval;

    fn normalizer(&self) -> &TermNormalizer {
        self.retrieval().normalizer()
    }

    /// Organismos permitidos, na ordem configurada.
    fn organisms(&self) -> &[String];

    /// Organismos usados para restringir a busca; vazio = busca sem restrição.
    fn retrieval_organisms(&self) -> &[String] {
        &[]
    }

    /// Melhor grupo de candidatos, com organismo atribuído. Vazio = rejeição.
    fn select_best(&self, candidates: &[SynHit]) -> Vec<SynHit>;

    /// Resolve ids de sinônimos que continuam ambíguos no organismo escolhido.
    fn resolve_ids(&self, result: &mut MentionMappingResult) -> Result<()>;
}

#[derive(Debug)]
pub struct WeepingTreeCore {
    retrieval: CandidateRetrieval,
    organisms: Vec<String>,
    context_items: Option<ContextItemsIndex>,
}

impl WeepingTreeCore {
    pub fn new(
        retrieval: CandidateRetrieval,
        organisms: Vec<String>,
        context_items: Option<ContextItemsIndex>,
    ) -> Result<Self> {
        if organisms.is_empty() {
            return Err(GeneMappingError::Configuration(
                "the weeping tree mapping core requires at least one allowed taxonomy ID".into(),
            ));
        }
        info!(
            organisms = ?organisms,
            context_items = ?context_items.as_ref().map(ContextItemsIndex::location),
            "weeping tree mapping core ready"
        );
        Ok(Self {
            retrieval,
            organisms,
            context_items,
        })
    }

    fn is_allowed(&self, hit: &SynHit) -> bool {
        self.organisms.iter().any(|tax| hit.has_tax_id(tax))
    }
}

impl MappingCore for WeepingTreeCore {
    fn kind(&self) -> MappingCoreKind {
        MappingCoreKind::WeepingTree
    }

    fn retrieval(&self) -> &CandidateRetrieval {
        &self.retrieval
    }

    fn organisms(&self) -> &[String] {
        &self.organisms
    }

    fn select_best(&self, candidates: &[SynHit]) -> Vec<SynHit> {
        let allowed: Vec<&SynHit> = candidates.iter().filter(|h| self.is_allowed(h)).collect();
        let Some(top) = allowed.iter().map(|h| h.mention_score).reduce(f64::max) else {
            debug!(candidates = candidates.len(), "no candidate for an allowed organism");
            return Vec::new();
        };

        let mut best = Vec::new();
        for hit in allowed.into_iter().filter(|h| h.mention_score == top) {
            let mut hit = hit.clone();
            let assigned = self.organisms.iter().any(|tax| hit.set_tax_id(tax).is_ok());
            if assigned {
                best.push(hit);
            } else {
                warn!(synonym = %hit.synonym, "no allowed organism could be assigned; candidate dropped");
            }
        }
        best
    }

    fn resolve_ids(&self, result: &mut MentionMappingResult) -> Result<()> {
        let Some(items) = &self.context_items else {
            return Ok(());
        };
        let Resolution::Mapped(hits) = &mut result.best_candidate else {
            return Ok(());
        };
        for hit in hits.iter_mut() {
            if hit.is_disambiguated() || hit.taxonomy_specific_ids().len() < 2 {
                continue;
            }
            let Some(tax_id) = hit.tax_id().map(str::to_string) else {
                continue;
            };
            match items.best_gene_for_tax_id(hit, &tax_id)? {
                Some(id) => {
                    debug!(synonym = %hit.synonym, tax_id, id, "gene chosen by context items");
                    hit.set_id(id);
                }
                None => debug!(synonym = %hit.synonym, tax_id, "no context evidence to choose a gene"),
            }
        }
        Ok(())
    }
}

pub fn create_mapping_core(
    kind: MappingCoreKind,
    retrieval: CandidateRetrieval,
    organisms: Vec<String>,
    context_items: Option<ContextItemsIndex>,
) -> Result<Arc<dyn MappingCore>> {
    match kind {
        MappingCoreKind::WeepingTree => Ok(Arc::new(WeepingTreeCore::new(retrieval, organisms, context_items)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{demo_context_index, demo_mention_index, HUMAN, MOUSE, RAT};
    use crate::resources::Lexicon;
    use crate::scoring::{create_scorer, ScorerKind};

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn weeping_tree(caches: &MappingCaches, organisms: &[&str], with_items: bool) -> WeepingTreeCore {
        let lexicon = Lexicon::bundled();
        let normalizer = Arc::new(TermNormalizer::new().unwrap());
        let scorer = create_scorer(ScorerKind::Simple, None, &lexicon).unwrap();
        let retrieval = CandidateRetrieval::new(
            "demo",
            Arc::new(demo_mention_index(&normalizer).unwrap()),
            Arc::clone(&normalizer),
            Arc::clone(&scorer),
            scorer,
            &caches.candidates,
        )
        .unwrap();
        let items = with_items.then(|| {
            let index = demo_context_index(&normalizer, &lexicon.context_stopwords).unwrap();
            ContextItemsIndex::new("demo-context", Arc::new(index), &caches.context_items).unwrap()
        });
        WeepingTreeCore::new(retrieval, strings(organisms), items).unwrap()
    }

    #[test]
    fn test_requires_organisms() {
        let caches = MappingCaches::new();
        let lexicon = Lexicon::bundled();
        let normalizer = Arc::new(TermNormalizer::new().unwrap());
        let scorer = create_scorer(ScorerKind::Simple, None, &lexicon).unwrap();
        let retrieval = CandidateRetrieval::new(
            "demo",
            Arc::new(demo_mention_index(&normalizer).unwrap()),
            normalizer,
            Arc::clone(&scorer),
            scorer,
            &caches.candidates,
        )
        .unwrap();
        let err = WeepingTreeCore::new(retrieval, Vec::new(), None).unwrap_err();
        assert!(matches!(err, GeneMappingError::Configuration(_)));
    }

    #[test]
    fn test_select_best_keeps_top_tie_group() {
        let caches = MappingCaches::new();
        let core = weeping_tree(&caches, &[HUMAN, MOUSE], false);
        let hits = vec![
            SynHit::new("a", 10.0, strings(&["1"]), "test", strings(&[HUMAN])),
            SynHit::new("b", 10.0, strings(&["2", "3"]), "test", strings(&[RAT, MOUSE])),
            SynHit::new("c", 8.0, strings(&["4"]), "test", strings(&[HUMAN])),
        ];
        let best = core.select_best(&hits);
        assert_eq!(best.len(), 2);
        assert_eq!(best[0].tax_id(), Some(HUMAN));
        assert_eq!(best[0].id(), Some("1"));
        assert_eq!(best[1].tax_id(), Some(MOUSE));
        assert_eq!(best[1].id(), Some("3"));
    }

    #[test]
    fn test_select_best_ignores_disallowed_top_score() {
        let caches = MappingCaches::new();
        let core = weeping_tree(&caches, &[MOUSE], false);
        let hits = vec![
            SynHit::new("a", 10.0, strings(&["1"]), "test", strings(&[HUMAN])),
            SynHit::new("b", 6.0, strings(&["2"]), "test", strings(&[MOUSE])),
        ];
        let best = core.select_best(&hits);
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].synonym, "b");
        assert!(core.select_best(&hits[..1]).is_empty());
        assert!(core.select_best(&[]).is_empty());
    }

    #[test]
    fn test_first_allowed_organism_wins() {
        let caches = MappingCaches::new();
        let core = weeping_tree(&caches, &[RAT, HUMAN], false);
        let hit = SynHit::new("p 53", 10.0, strings(&["7157", "24842"]), "test", strings(&[HUMAN, RAT]));
        let best = core.select_best(&[hit]);
        assert_eq!(best[0].tax_id(), Some(RAT));
        assert_eq!(best[0].id(), Some("24842"));
    }

    #[test]
    fn test_resolve_ids_with_context_items() {
        let caches = MappingCaches::new();
        let core = weeping_tree(&caches, &[HUMAN], true);
        let hit = SynHit::new("p 40", 10.0, strings(&["4689", "3593"]), "test", strings(&[HUMAN, HUMAN]));
        let mut result = MentionMappingResult::new("p40");
        result.best_candidate = Resolution::from_hits(core.select_best(&[hit]));
        assert_eq!(result.best_candidate.best().unwrap().taxonomy_specific_ids().len(), 2);
        assert!(!result.best_candidate.best().unwrap().is_disambiguated());

        core.resolve_ids(&mut result).unwrap();
        let best = result.best_candidate.best().unwrap();
        assert!(best.is_disambiguated());
        assert_eq!(best.id(), Some("3593"));
    }

    #[test]
    fn test_resolve_ids_without_context_items() {
        let caches = MappingCaches::new();
        let core = weeping_tree(&caches, &[HUMAN], false);
        let hit = SynHit::new("p 40", 10.0, strings(&["4689", "3593"]), "test", strings(&[HUMAN, HUMAN]));
        let mut result = MentionMappingResult::new("p40");
        result.best_candidate = Resolution::from_hits(core.select_best(&[hit]));
        core.resolve_ids(&mut result).unwrap();
        let best = result.best_candidate.best().unwrap();
        assert!(!best.is_disambiguated());
        assert_eq!(best.id(), Some("4689"));

        let mut rejected = MentionMappingResult::rejected("xyzzy");
        assert!(core.resolve_ids(&mut rejected).is_ok());
    }

    #[test]
    fn test_create_mapping_core() {
        let caches = MappingCaches::new();
        let core = weeping_tree(&caches, &[HUMAN], false);
        let retrieval = core.retrieval;
        let created = create_mapping_core(MappingCoreKind::WeepingTree, retrieval, strings(&[HUMAN]), None).unwrap();
        assert_eq!(created.kind(), MappingCoreKind::WeepingTree);
        assert_eq!(created.organisms(), &[HUMAN.to_string()]);
        assert!(created.retrieval_organisms().is_empty());
        assert_eq!(created.normalizer().normalize("p53"), "p 53");
    }
}
