//! # Desambiguação por Contexto
//!
//! Dois índices auxiliares, ambos chaveados pelo identificador do gene:
//!
//! - [`ContextItemsIndex`]: textos de evidência por gene (resumo, GeneRIF,
//!   interações). Escolhe, entre os genes de um sinônimo em um organismo, o que
//!   tem o sinônimo citado nas frases GeneRIF.
//! - [`SemanticDisambiguator`]: compara o texto do documento com o contexto de
//!   cada candidato e reordena os candidatos pela similaridade.
//!
//! Nas duas consultas os ids dos candidatos entram como **filtro** obrigatório
//! que não pontua. O score vem só do texto, e um id fora dos candidatos nunca é
//! devolvido.
//!
//! ```text
//! +(context:tumor context:suppressor ...)  #(id:7157 id:22059)
//!   └── pontua pelo documento ───────┘     └── restringe ────┘
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::cache::{CacheRegistry, LoadingCache};
use crate::error::{GeneMappingError, IndexError, Result};
use crate::index::SearchIndex;
use crate::query::{context_fields, Query};
use crate::resources::WordList;
use crate::synhit::{HitOrder, SynHit};
use crate::tokenizer::context_tokens;

/// Máximo de documentos lidos por gene ao buscar itens de contexto.
const MAX_ITEMS_DOCS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextItemsCacheKey {
    pub gene_id: String,
    pub field: String,
}

pub type ContextItemsCache = LoadingCache<ContextItemsCacheKey, Vec<String>>;
pub type ContextItemsCacheRegistry = CacheRegistry<ContextItemsCacheKey, Vec<String>>;

fn index_error(subject: &str, source: IndexError) -> GeneMappingError {
    GeneMappingError::CandidateRetrieval {
        mention: subject.to_string(),
        source,
    }
}

/// Ids como cláusulas `SHOULD`, para uso como filtro.
fn id_filter<'a>(ids: impl IntoIterator<Item = &'a str>) -> Option<Query> {
    let mut builder = Query::boolean();
    let mut any = false;
    for id in ids {
        builder = builder.should(Query::term(context_fields::ID, id));
        any = true;
    }
    any.then(|| builder.build())
}

pub struct ContextItemsIndex {
    location: String,
    index: Arc<dyn SearchIndex>,
    cache: Arc<ContextItemsCache>,
}

impl fmt::Debug for ContextItemsIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextItemsIndex")
            .field("location", &self.location)
            .field("docs", &self.index.num_docs())
            .finish()
    }
}

impl ContextItemsIndex {
    pub fn new(location: &str, index: Arc<dyn SearchIndex>, registry: &ContextItemsCacheRegistry) -> Result<Self> {
        let cache = registry.get_or_create(location)?;
        info!(location, docs = index.num_docs(), "context items index ready");
        Ok(Self {
            location: location.to_string(),
            index,
            cache,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn cache(&self) -> &Arc<ContextItemsCache> {
        &self.cache
    }

    /// Textos de um campo de evidência do gene (com cache).
    pub fn context_items(&self, gene_id: &str, field: &str) -> Result<Vec<String>> {
        let key = ContextItemsCacheKey {
            gene_id: gene_id.to_string(),
            field: field.to_string(),
        };
        self.cache.get(&key, |k| {
            let query = Query::boolean().filter(Query::term(context_fields::ID, k.gene_id.as_str())).build();
            let found = self
                .index
                .search(&query, MAX_ITEMS_DOCS)
                .map_err(|source| index_error(&k.gene_id, source))?;
            Ok(found
                .iter()
                .flat_map(|hit| hit.document.get_all(&k.field).iter().cloned())
                .collect())
        })
    }

    /// Score de cada gene do sinônimo nos organismos informados: relevância da
    /// frase do sinônimo nas GeneRIFs do gene. Genes sem ocorrência ficam com 0.
    pub fn synonym_scores_for_tax_ids(&self, hit: &SynHit, tax_ids: &[&str]) -> Result<BTreeMap<String, f64>> {
        let mut scores: BTreeMap<String, f64> = tax_ids
            .iter()
            .flat_map(|&tax| hit.gene_ids_of_tax_id(tax))
            .map(|id| (id.to_string(), 0.0))
            .collect();
        if hit.synonym.split_whitespace().next().is_none() {
            return Ok(scores);
        }
        let Some(filter) = id_filter(scores.keys().map(String::as_str)) else {
            return Ok(scores);
        };

        let query = Query::boolean()
            .must(Query::phrase(context_fields::GENERIF, &hit.synonym))
            .filter(filter)
            .build();
        let found = self
            .index
            .search(&query, scores.len())
            .map_err(|source| index_error(&hit.synonym, source))?;
        for doc in &found {
            if let Some(score) = doc.document.get(context_fields::ID).and_then(|id| scores.get_mut(id)) {
                *score = score.max(doc.score);
            }
        }
        debug!(synonym = %hit.synonym, ?scores, "generif scores");
        Ok(scores)
    }

    /// Gene de maior score positivo no organismo; empates ficam com o menor id.
    pub fn best_gene_for_tax_id(&self, hit: &SynHit, tax_id: &str) -> Result<Option<String>> {
        let scores = self.synonym_scores_for_tax_ids(hit, &[tax_id])?;
        let mut best: Option<(&String, f64)> = None;
        for (id, &score) in &scores {
            if score > 0.0 && best.map_or(true, |(_, b)| score > b) {
                best = Some((id, score));
            }
        }
        Ok(best.map(|(id, _)| id.clone()))
    }
}

/// Reordena candidatos pela similaridade entre o documento e o contexto dos genes.
pub struct SemanticDisambiguator {
    index: Arc<dyn SearchIndex>,
    stopwords: WordList,
    min_context_score: f64,
}

impl fmt::Debug for SemanticDisambiguator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemanticDisambiguator")
            .field("docs", &self.index.num_docs())
            .field("min_context_score", &self.min_context_score)
            .finish()
    }
}

impl SemanticDisambiguator {
    pub fn new(index: Arc<dyn SearchIndex>, stopwords: WordList, min_context_score: f64) -> Self {
        info!(docs = index.num_docs(), min_context_score, "semantic disambiguation enabled");
        Self {
            index,
            stopwords,
            min_context_score,
        }
    }

    pub fn min_context_score(&self) -> f64 {
        self.min_context_score
    }

    /// Um termo `SHOULD` por token de contexto distinto. `None` sem tokens.
    pub fn context_query(&self, context: &str) -> Option<Query> {
        let tokens: BTreeSet<String> = context_tokens(context, &self.stopwords).into_iter().collect();
        if tokens.is_empty() {
            return None;
        }
        let mut builder = Query::boolean();
        for token in tokens {
            builder = builder.should(Query::term(context_fields::CONTEXT, token));
        }
        Some(builder.build())
    }

    /// Candidatos com `semantic_score` preenchido, em ordem decrescente.
    ///
    /// O score de um candidato é o maior entre os de seus genes. Sem tokens de
    /// contexto todos ficam com 0 e a ordem não muda.
    pub fn rank(&self, candidates: &[SynHit], context: &str) -> Result<Vec<SynHit>> {
        let mut ranked = candidates.to_vec();
        for hit in &mut ranked {
            hit.semantic_score = 0.0;
        }
        let ids: BTreeSet<&str> = candidates.iter().flat_map(|h| h.ids.iter().map(String::as_str)).collect();
        let (Some(context_query), Some(filter)) = (self.context_query(context), id_filter(ids.iter().copied())) else {
            return Ok(ranked);
        };

        let query = Query::boolean().must(context_query).filter(filter).build();
        let found = self
            .index
            .search(&query, ids.len())
            .map_err(|source| index_error("document context", source))?;
        let mut id_scores: HashMap<&str, f64> = HashMap::new();
        for doc in &found {
            if let Some(id) = doc.document.get(context_fields::ID).and_then(|id| ids.get(id).copied()) {
                let score = id_scores.entry(id).or_insert(0.0);
                *score = score.max(doc.score);
            }
        }

        for hit in &mut ranked {
            hit.semantic_score = hit
                .ids
                .iter()
                .filter_map(|id| id_scores.get(id.as_str()))
                .copied()
                .fold(0.0, f64::max);
            trace!(synonym = %hit.synonym, score = hit.semantic_score, "semantic score");
        }
        HitOrder::BySemanticScore.sort(&mut ranked);
        Ok(ranked)
    }

    /// O primeiro candidato ordenado, se o score dele atinge o mínimo.
    pub fn select(&self, ranked: &[SynHit]) -> Option<SynHit> {
        let top = ranked.first()?;
        if top.semantic_score >= self.min_context_score {
            Some(top.clone())
        } else {
            debug!(
                synonym = %top.synonym,
                score = top.semantic_score,
                min = self.min_context_score,
                "best context score below minimum"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CONTEXT_ITEMS_CACHE;
    use crate::corpus::{demo_context_index, HUMAN};
    use crate::normalizer::TermNormalizer;
    use crate::resources::Lexicon;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn context_index() -> Arc<dyn SearchIndex> {
        let normalizer = TermNormalizer::new().unwrap();
        Arc::new(demo_context_index(&normalizer, &Lexicon::bundled().context_stopwords).unwrap())
    }

    fn p40() -> SynHit {
        SynHit::new("p 40", 10.0, strings(&["3593", "4689"]), "lexicon", strings(&[HUMAN, HUMAN]))
    }

    #[test]
    fn test_context_items_are_cached() {
        let registry = ContextItemsCacheRegistry::new("context items", CONTEXT_ITEMS_CACHE);
        let items = ContextItemsIndex::new("demo-context", context_index(), &registry).unwrap();
        let generifs = items.context_items("4689", context_fields::GENERIF).unwrap();
        assert_eq!(generifs.len(), 1);
        assert!(generifs[0].contains("superoxide"));
        items.context_items("4689", context_fields::GENERIF).unwrap();
        assert_eq!(items.cache().stats().loads, 1);
        assert!(items.context_items("0", context_fields::SUMMARY).unwrap().is_empty());
    }

    #[test]
    fn test_generif_scores_pick_cited_gene() {
        let registry = ContextItemsCacheRegistry::new("context items", CONTEXT_ITEMS_CACHE);
        let items = ContextItemsIndex::new("demo-context", context_index(), &registry).unwrap();
        let scores = items.synonym_scores_for_tax_ids(&p40(), &[HUMAN]).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores["3593"] > 0.0);
        assert_eq!(scores["4689"], 0.0);
        assert_eq!(items.best_gene_for_tax_id(&p40(), HUMAN).unwrap().as_deref(), Some("3593"));
        // organismo sem genes para o sinônimo
        assert!(items.synonym_scores_for_tax_ids(&p40(), &["10090"]).unwrap().is_empty());
        assert_eq!(items.best_gene_for_tax_id(&p40(), "10090").unwrap(), None);
    }

    #[test]
    fn test_rank_by_document_context() {
        let semantic = SemanticDisambiguator::new(context_index(), Lexicon::bundled().context_stopwords, 0.0);
        let cytokine = SynHit::new("p 40", 10.0, strings(&["3593"]), "lexicon", strings(&[HUMAN]));
        let oxidase = SynHit::new("p 40", 10.0, strings(&["4689"]), "lexicon", strings(&[HUMAN]));
        let context = "The p40 homodimer inhibits IL-12 signaling in T cells.";
        let ranked = semantic.rank(&[oxidase, cytokine], context).unwrap();
        assert_eq!(ranked[0].ids, vec!["3593"]);
        assert!(ranked[0].semantic_score > ranked[1].semantic_score);
        assert_eq!(semantic.select(&ranked).unwrap().ids, vec!["3593"]);
    }

    #[test]
    fn test_ids_outside_candidates_never_win() {
        let semantic = SemanticDisambiguator::new(context_index(), Lexicon::bundled().context_stopwords, 0.0);
        // o contexto descreve o 3593, que não é candidato
        let oxidase = SynHit::new("p 40", 10.0, strings(&["4689"]), "lexicon", strings(&[HUMAN]));
        let ranked = semantic.rank(&[oxidase], "The p40 homodimer inhibits IL-12 signaling in T cells.").unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].ids, vec!["4689"]);
    }

    #[test]
    fn test_select_requires_minimum_score() {
        let semantic = SemanticDisambiguator::new(context_index(), Lexicon::bundled().context_stopwords, 1e9);
        let ranked = semantic.rank(&[p40()], "IL-12 signaling in T cells").unwrap();
        assert!(semantic.select(&ranked).is_none());
        assert!(semantic.select(&[]).is_none());
    }

    #[test]
    fn test_empty_context_keeps_order() {
        let semantic = SemanticDisambiguator::new(context_index(), Lexicon::bundled().context_stopwords, 0.0);
        assert!(semantic.context_query("  ").is_none());
        let ranked = semantic.rank(&[p40()], "").unwrap();
        assert_eq!(ranked[0].semantic_score, 0.0);
    }
}
