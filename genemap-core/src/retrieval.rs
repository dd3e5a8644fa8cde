//! # Recuperação de Candidatos
//!
//! Para uma menção, consulta o índice léxico e transforma cada documento
//! encontrado em um [`SynHit`] pontuado.
//!
//! ```text
//! menção ──▶ chave (texto, organismo) ──▶ cache ──(ausente)──▶ consulta DisMax
//!                                           │                       │
//!                                           ▼                       ▼
//!                                     cópia da lista  ◀──  documentos → SynHits
//! ```
//!
//! ## Pontuação
//!
//! | Caso                                  | Score                                  |
//! |---------------------------------------|----------------------------------------|
//! | forma indexada = forma normalizada    | `exact_scorer` (atalho: perfeito)      |
//! | demais                                | `approx_scorer`                        |
//! | estratégia `IndexNative`, exato       | [`PERFECT_SCORE`]                      |
//! | estratégia `IndexNative`, aproximado  | relevância `s` → `PERFECT × s/(s+1)`   |
//!
//! A relevância do índice não é comparável entre campos; por isso é comprimida
//! para ficar sempre abaixo do score perfeito.
//!
//! ## Organismos
//!
//! Sem organismos, uma única busca sem restrição. Com organismos, uma busca
//! restrita por organismo e os resultados concatenados: o mesmo sinônimo pode
//! aparecer uma vez por organismo.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::cache::{CacheRegistry, LoadingCache};
use crate::error::{GeneMappingError, IndexError, Result};
use crate::filter::CandidateFilter;
use crate::index::{ScoredDocument, SearchIndex};
use crate::mention::{GeneMention, GeneName};
use crate::normalizer::TermNormalizer;
use crate::query::{fields, Query, QueryBuilder, NAME_PRIO_DELIMITER};
use crate::scoring::{Scorer, ScorerKind, PERFECT_SCORE};
use crate::spelling::{DictionarySpellChecker, SpellChecker};
use crate::synhit::{show_hit_ids, HitOrder, SynHit};

/// Máximo de documentos por consulta de candidatos.
pub const MAX_HITS: usize = 20;

/// Máximo de sinônimos devolvidos por [`CandidateRetrieval::synonyms`].
pub const MAX_SYNONYMS: usize = 200;

/// Fonte registrada nos candidatos.
pub const SOURCE_DEFINITION: &str = "NCBI Gene";

/// Chave do cache de candidatos: texto da menção e organismo opcional.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateCacheKey {
    pub text: String,
    /// `None`: busca sem restrição de organismo.
    pub tax_id: Option<String>,
}

impl CandidateCacheKey {
    pub fn new(text: impl Into<String>, tax_id: Option<String>) -> Self {
        Self {
            text: text.into(),
            tax_id: tax_id.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        }
    }
}

pub type CandidateCache = LoadingCache<CandidateCacheKey, Vec<SynHit>>;
pub type CandidateCacheRegistry = CacheRegistry<CandidateCacheKey, Vec<SynHit>>;

pub struct CandidateRetrieval {
    location: String,
    index: Arc<dyn SearchIndex>,
    normalizer: Arc<TermNormalizer>,
    query_builder: QueryBuilder,
    exact_scorer: Arc<dyn Scorer>,
    approx_scorer: Arc<dyn Scorer>,
    cache: Arc<CandidateCache>,
}

impl fmt::Debug for CandidateRetrieval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateRetrieval")
            .field("location", &self.location)
            .field("docs", &self.index.num_docs())
            .field("exact_scorer", &self.exact_scorer.kind())
            .field("approx_scorer", &self.approx_scorer.kind())
            .field("cache", &self.cache)
            .finish()
    }
}

impl CandidateRetrieval {
    /// Recuperação sobre `index`. O cache vem do registro, pelo `location`:
    /// instâncias sobre o mesmo local compartilham o mesmo cache.
    pub fn new(
        location: &str,
        index: Arc<dyn SearchIndex>,
        normalizer: Arc<TermNormalizer>,
        exact_scorer: Arc<dyn Scorer>,
        approx_scorer: Arc<dyn Scorer>,
        registry: &CandidateCacheRegistry,
    ) -> Result<Self> {
        if location.trim().is_empty() {
            return Err(GeneMappingError::Configuration(
                "the mention index location must not be empty".into(),
            ));
        }
        let cache = registry.get_or_create(location)?;
        info!(
            location,
            docs = index.num_docs(),
            exact = %exact_scorer.kind(),
            approx = %approx_scorer.kind(),
            "candidate retrieval ready"
        );
        Ok(Self {
            location: location.to_string(),
            index,
            normalizer,
            query_builder: QueryBuilder::new(),
            exact_scorer,
            approx_scorer,
            cache,
        })
    }

    /// Ativa a correção de plurais a partir de um dicionário de palavras.
    ///
    /// Um dicionário ilegível não impede a recuperação: a correção apenas fica
    /// desligada.
    pub fn with_spelling_dictionary(mut self, path: &Path) -> Self {
        match DictionarySpellChecker::from_file(path) {
            Ok(checker) => {
                info!(path = %path.display(), words = checker.len(), "spelling correction enabled");
                self = self.with_spell_checker(Arc::new(checker));
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "spelling dictionary not loaded; correction disabled");
            }
        }
        self
    }

    pub fn with_spell_checker(mut self, checker: Arc<dyn SpellChecker>) -> Self {
        self.query_builder = self.query_builder.with_spell_checker(checker);
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn normalizer(&self) -> &TermNormalizer {
        &self.normalizer
    }

    pub fn cache(&self) -> &Arc<CandidateCache> {
        &self.cache
    }

    /// Candidatos da menção, score decrescente.
    ///
    /// Cada chamada recebe cópias próprias: atribuir organismo ou id a um
    /// candidato não afeta o cache nem outros chamadores.
    pub fn get_candidates(&self, mention: &GeneMention, organisms: &[String]) -> Result<Vec<SynHit>> {
        self.get_candidates_for_text(mention.text(), organisms)
    }

    pub fn get_candidates_for_text(&self, text: &str, organisms: &[String]) -> Result<Vec<SynHit>> {
        let keys: Vec<CandidateCacheKey> = if organisms.is_empty() {
            vec![CandidateCacheKey::new(text, None)]
        } else {
            organisms
                .iter()
                .map(|o| CandidateCacheKey::new(text, Some(o.clone())))
                .collect()
        };

        let mut hits = Vec::new();
        for key in &keys {
            hits.extend(self.cache.get(key, |k| self.load(k))?);
        }
        HitOrder::ByMentionScore.sort(&mut hits);
        debug!(mention = text, candidates = hits.len(), hits = %show_hit_ids(&hits), "candidates");
        Ok(hits)
    }

    /// Consulta o índice, sem cache.
    fn load(&self, key: &CandidateCacheKey) -> Result<Vec<SynHit>> {
        let name = GeneName::new(key.text.as_str());
        let normalized = name.normalized(&self.normalizer);
        let variants = name.variants(&self.normalizer);
        let Some(query) = self
            .query_builder
            .build(&key.text, normalized, variants, key.tax_id.as_deref())
        else {
            debug!(mention = %key.text, "no query for mention; zero candidates");
            return Ok(Vec::new());
        };

        let found = self
            .index
            .search(&query, MAX_HITS)
            .map_err(|source| retrieval_error(&key.text, source))?;
        debug!(mention = %key.text, found = found.len(), "searched mention index");

        let original = key.text.to_lowercase();
        found
            .iter()
            .map(|doc| self.score_hit(doc, normalized, &original))
            .collect::<std::result::Result<Vec<_>, IndexError>>()
            .map_err(|source| retrieval_error(&key.text, source))
    }

    fn score_hit(&self, doc: &ScoredDocument, normalized: &str, original: &str) -> std::result::Result<SynHit, IndexError> {
        let synonym = doc.document.get(fields::INDEXED_SYN).ok_or_else(|| {
            IndexError::MalformedDocument(format!("document {} has no '{}' field", doc.doc, fields::INDEXED_SYN))
        })?;
        let (ids, priorities) = unpack_entry_ids(doc.document.get_all(fields::ENTRY_ID))?;
        let tax_ids = doc.document.get_all(fields::TAX_ID).to_vec();
        if ids.is_empty() || ids.len() != tax_ids.len() {
            return Err(IndexError::MalformedDocument(format!(
                "document {} has {} ids but {} taxonomy ids",
                doc.doc,
                ids.len(),
                tax_ids.len()
            )));
        }

        let exact = synonym == normalized;
        let scorer = if exact { &self.exact_scorer } else { &self.approx_scorer };
        let score = if scorer.kind() == ScorerKind::IndexNative {
            if exact {
                PERFECT_SCORE
            } else {
                squash(doc.score)
            }
        } else {
            // as estratégias de cadeia só falham para IndexNative
            scorer
                .score(normalized, synonym)
                .map_err(|e| IndexError::MalformedQuery(e.to_string()))?
        };
        trace!(synonym, normalized, score, relevance = doc.score, exact, "candidate scored");

        let mut hit = SynHit::new(synonym, score, ids, SOURCE_DEFINITION, tax_ids).with_priorities(priorities);
        hit.mapped_mention = original.to_string();
        Ok(hit)
    }

    /// Organismo do gene, pela entrada do símbolo oficial (`<id>__-1`).
    pub fn map_gene_id_to_tax_id(&self, gene_id: &str) -> Result<Option<String>> {
        let entry = format!("{gene_id}{NAME_PRIO_DELIMITER}-1");
        let found = self
            .index
            .search(&Query::term(fields::ENTRY_ID, entry.as_str()), 1)
            .map_err(|source| retrieval_error(gene_id, source))?;
        Ok(found.first().and_then(|hit| {
            let position = hit.document.get_all(fields::ENTRY_ID).iter().position(|e| *e == entry)?;
            hit.document.get_all(fields::TAX_ID).get(position).cloned()
        }))
    }

    /// Formas indexadas de todos os sinônimos do gene.
    pub fn synonyms(&self, gene_id: &str) -> Result<Vec<String>> {
        let query = Query::prefix(fields::ENTRY_ID, format!("{gene_id}{NAME_PRIO_DELIMITER}"));
        let found = self
            .index
            .search(&query, MAX_SYNONYMS)
            .map_err(|source| retrieval_error(gene_id, source))?;
        let mut synonyms: Vec<String> = Vec::new();
        for hit in &found {
            for syn in hit.document.get_all(fields::INDEXED_SYN) {
                if !synonyms.contains(syn) {
                    synonyms.push(syn.clone());
                }
            }
        }
        Ok(synonyms)
    }

    /// Formas indexadas dos nomes do gene com a prioridade informada.
    pub fn priority_names(&self, gene_id: &str, priority: i32) -> Result<Vec<String>> {
        let entry = format!("{gene_id}{NAME_PRIO_DELIMITER}{priority}");
        let found = self
            .index
            .search(&Query::term(fields::ENTRY_ID, entry), 1)
            .map_err(|source| retrieval_error(gene_id, source))?;
        Ok(found
            .iter()
            .flat_map(|hit| hit.document.get_all(fields::INDEXED_SYN).iter().cloned())
            .collect())
    }

    /// Os `n` melhores candidatos para um termo livre, sem os descartados pelo filtro.
    ///
    /// O termo é normalizado e perde os modificadores; se nada sobra, não há
    /// candidatos.
    pub fn top_n(&self, term: &str, n: usize, filter: &CandidateFilter) -> Result<Vec<SynHit>> {
        let normalized = self.normalizer.normalize(term);
        let stripped = filter.remove_modifiers(&normalized);
        if stripped.trim().is_empty() {
            debug!(term, "nothing left after removing modifiers");
            return Ok(Vec::new());
        }
        let candidates = self.get_candidates_for_text(&stripped, &[])?;
        Ok(candidates
            .into_iter()
            .filter(|hit| !filter.filter_out(&stripped, &hit.synonym))
            .take(n)
            .collect())
    }
}

fn retrieval_error(mention: &str, source: IndexError) -> GeneMappingError {
    GeneMappingError::CandidateRetrieval {
        mention: mention.to_string(),
        source,
    }
}

/// Relevância do índice comprimida para `[0, PERFECT_SCORE)`.
fn squash(relevance: f64) -> f64 {
    let s = relevance.max(0.0);
    PERFECT_SCORE * s / (s + 1.0)
}

/// Separa `"<id>__<prioridade>"` em ids e prioridades alinhados.
pub fn unpack_entry_ids(entries: &[String]) -> std::result::Result<(Vec<String>, Vec<i32>), IndexError> {
    let mut ids = Vec::with_capacity(entries.len());
    let mut priorities = Vec::with_capacity(entries.len());
    for entry in entries {
        let (id, priority) = entry
            .rsplit_once(NAME_PRIO_DELIMITER)
            .filter(|(id, _)| !id.is_empty())
            .ok_or_else(|| IndexError::MalformedDocument(format!("entry id without priority: '{entry}'")))?;
        let priority = priority
            .parse::<i32>()
            .map_err(|e| IndexError::MalformedDocument(format!("invalid priority in '{entry}': {e}")))?;
        ids.push(id.to_string());
        priorities.push(priority);
    }
    Ok((ids, priorities))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CANDIDATE_CACHE;
    use crate::corpus::demo_mention_index;
    use crate::index::{StoredDocument, TantivyIndex};
    use crate::scoring::{IndexNativeScorer, SimpleScorer};
    use std::sync::Barrier;
    use std::thread;

    fn retrieval(location: &str, registry: &CandidateCacheRegistry) -> CandidateRetrieval {
        let normalizer = Arc::new(TermNormalizer::new().unwrap());
        let index = Arc::new(demo_mention_index(&normalizer).unwrap());
        CandidateRetrieval::new(
            location,
            index,
            normalizer,
            Arc::new(SimpleScorer),
            Arc::new(SimpleScorer),
            registry,
        )
        .unwrap()
    }

    #[test]
    fn test_exact_match_ranks_first() {
        let registry = CandidateCacheRegistry::new("candidates", CANDIDATE_CACHE);
        let r = retrieval("demo", &registry);
        let hits = r.get_candidates(&GeneMention::new("p53"), &[]).unwrap();
        assert_eq!(hits[0].synonym, "p 53");
        assert!(hits[0].is_exact_match());
        assert_eq!(hits[0].ids, vec!["7157", "22059", "24842"]);
        assert_eq!(hits[0].priorities, vec![2, 2, 2]);
        assert_eq!(hits[0].mapped_mention, "p53");
        assert_eq!(hits[0].source, SOURCE_DEFINITION);
        for pair in hits.windows(2) {
            assert!(pair[0].mention_score >= pair[1].mention_score);
        }
    }

    #[test]
    fn test_organism_restricted_lookups_are_concatenated() {
        let registry = CandidateCacheRegistry::new("candidates", CANDIDATE_CACHE);
        let r = retrieval("demo", &registry);
        let organisms = vec!["9606".to_string(), "10116".to_string()];
        let hits = r.get_candidates(&GeneMention::new("TP53"), &organisms).unwrap();
        // "tp 53" pertence aos dois organismos e aparece uma vez por busca
        let exact: Vec<&SynHit> = hits.iter().filter(|h| h.synonym == "tp 53").collect();
        assert_eq!(exact.len(), 2);
        assert!(hits.iter().all(|h| h.has_tax_id("9606") || h.has_tax_id("10116")));
        assert_eq!(r.cache().len(), 2);
    }

    #[test]
    fn test_unknown_mention_has_no_candidates() {
        let registry = CandidateCacheRegistry::new("candidates", CANDIDATE_CACHE);
        let r = retrieval("demo", &registry);
        assert!(r.get_candidates(&GeneMention::new("xyzzy"), &[]).unwrap().is_empty());
        assert!(r.get_candidates(&GeneMention::new("  "), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_engines_on_same_location_share_cache() {
        let registry = CandidateCacheRegistry::new("candidates", CANDIDATE_CACHE);
        let first = retrieval("mentions/a", &registry);
        let second = retrieval("mentions/a", &registry);
        let third = retrieval("mentions/b", &registry);
        assert!(Arc::ptr_eq(first.cache(), second.cache()));
        assert!(!Arc::ptr_eq(first.cache(), third.cache()));

        first.get_candidates(&GeneMention::new("BRCA1"), &[]).unwrap();
        second.get_candidates(&GeneMention::new("BRCA1"), &[]).unwrap();
        assert_eq!(first.cache().stats(), second.cache().stats());
        let stats = second.cache().stats();
        assert_eq!((stats.hits, stats.misses, stats.loads), (1, 1, 1));
        assert_eq!(third.cache().stats().loads, 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_cached_results_are_deep_copies() {
        let registry = CandidateCacheRegistry::new("candidates", CANDIDATE_CACHE);
        let r = retrieval("demo", &registry);
        let mut first = r.get_candidates(&GeneMention::new("p53"), &[]).unwrap();
        first[0].set_tax_id("10090").unwrap();
        let second = r.get_candidates(&GeneMention::new("p53"), &[]).unwrap();
        assert_eq!(second[0].tax_id(), None);
        assert_eq!(r.cache().stats().loads, 1);
    }

    #[test]
    fn test_concurrent_requests_load_once() {
        let registry = CandidateCacheRegistry::new("candidates", CANDIDATE_CACHE);
        let r = Arc::new(retrieval("demo", &registry));
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&r);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    r.get_candidates(&GeneMention::new("TNF-alpha"), &[]).unwrap()
                })
            })
            .collect();
        let results: Vec<Vec<SynHit>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(r.cache().stats().loads, 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_index_native_scores() {
        let registry = CandidateCacheRegistry::new("candidates", CANDIDATE_CACHE);
        let normalizer = Arc::new(TermNormalizer::new().unwrap());
        let index = Arc::new(demo_mention_index(&normalizer).unwrap());
        let r = CandidateRetrieval::new(
            "demo",
            index,
            normalizer,
            Arc::new(IndexNativeScorer),
            Arc::new(IndexNativeScorer),
            &registry,
        )
        .unwrap();
        let hits = r.get_candidates(&GeneMention::new("CD4"), &[]).unwrap();
        assert_eq!(hits[0].synonym, "cd 4");
        assert_eq!(hits[0].mention_score, PERFECT_SCORE);
        assert!(hits[1..].iter().all(|h| h.mention_score < PERFECT_SCORE));
    }

    #[test]
    fn test_malformed_entry_is_retrieval_error() {
        let registry = CandidateCacheRegistry::new("candidates", CANDIDATE_CACHE);
        let normalizer = Arc::new(TermNormalizer::new().unwrap());
        let index = Arc::new(
            TantivyIndex::from_documents([StoredDocument::new()
                .with(fields::INDEXED_SYN, "cd 4")
                .with(fields::ENTRY_ID, "920")
                .with(fields::TAX_ID, "9606")])
            .unwrap(),
        );
        let r = CandidateRetrieval::new(
            "broken",
            index,
            normalizer,
            Arc::new(SimpleScorer),
            Arc::new(SimpleScorer),
            &registry,
        )
        .unwrap();
        let err = r.get_candidates(&GeneMention::new("CD4"), &[]).unwrap_err();
        assert!(matches!(
            err,
            GeneMappingError::CandidateRetrieval { source: IndexError::MalformedDocument(_), .. }
        ));
        assert!(r.cache().is_empty());
    }

    #[test]
    fn test_id_lookups() {
        let registry = CandidateCacheRegistry::new("candidates", CANDIDATE_CACHE);
        let r = retrieval("demo", &registry);
        assert_eq!(r.map_gene_id_to_tax_id("24842").unwrap().as_deref(), Some("10116"));
        assert_eq!(r.map_gene_id_to_tax_id("0").unwrap(), None);

        let synonyms = r.synonyms("7157").unwrap();
        assert!(synonyms.contains(&"tp 53".to_string()));
        assert!(synonyms.contains(&"p 53".to_string()));
        assert!(synonyms.contains(&"tumor protein p 53".to_string()));
        assert!(!synonyms.contains(&"trp 53".to_string()));

        assert_eq!(r.priority_names("7157", 1).unwrap(), vec!["tumor protein p 53".to_string()]);
    }

    #[test]
    fn test_top_n_drops_filtered_candidates() {
        let registry = CandidateCacheRegistry::new("candidates", CANDIDATE_CACHE);
        let r = retrieval("demo", &registry);
        let filter = CandidateFilter::new().unwrap();
        let top = r.top_n("IL2 protein", 3, &filter).unwrap();
        assert!(!top.is_empty() && top.len() <= 3);
        assert_eq!(top[0].synonym, "il 2");
        // "il 4" difere só no número
        assert!(top.iter().all(|h| h.synonym != "il 4"));
        assert!(r.top_n("protein", 3, &filter).unwrap().is_empty());
    }

    #[test]
    fn test_unpack_entry_ids() {
        let (ids, prios) = unpack_entry_ids(&["7157__-1".to_string(), "22059__2".to_string()]).unwrap();
        assert_eq!(ids, vec!["7157", "22059"]);
        assert_eq!(prios, vec![-1, 2]);
        assert!(unpack_entry_ids(&["7157".to_string()]).is_err());
        assert!(unpack_entry_ids(&["7157__x".to_string()]).is_err());
    }
}
