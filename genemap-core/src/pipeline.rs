//! # Mapeador de Genes: Orquestrador com Eventos Observáveis
//!
//! [`GeneMapper`] coordena os módulos (normalização, recuperação, filtro,
//! desambiguação por contexto, espécie) e emite um [`MappingEvent`] a cada
//! passo por um canal `mpsc`, para quem quiser acompanhar a decisão.
//!
//! ## Estados de uma menção
//!
//! ```text
//! RAW ──▶ RETRIEVED ──▶ FILTERED ──▶ BEST_SELECTED ──▶ TAXONOMY_RESOLVED ──▶ FINAL
//!  │          │              │              │                    │
//!  Normalized CandidatesRetrieved  CandidatesFiltered  BestSelected  TaxonomyResolved ──▶ Done
//! ```
//!
//! Falta de candidatos não é erro: a menção termina com a sentinela de rejeição.
//! Só falhas do índice interrompem a menção (evento `Error` e `Err` para quem
//! chamou).
//!
//! ## Paralelismo
//!
//! Documentos são independentes; [`GeneMapper::map_documents`] os distribui no
//! pool do rayon. O único estado compartilhado são os caches.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::config::MappingSettings;
use crate::corpus::{demo_context_index, demo_mention_index};
use crate::document::GeneDocument;
use crate::error::{GeneMappingError, IndexError, Result};
use crate::filter::{CandidateFilter, FilterRule};
use crate::index::{SearchIndex, TantivyIndex};
use crate::mapping::{create_mapping_core, MappingCaches, MappingCore};
use crate::mention::GeneMention;
use crate::normalizer::TermNormalizer;
use crate::resources::Lexicon;
use crate::result::{DocumentMappingResult, MentionMappingResult, Resolution};
use crate::retrieval::CandidateRetrieval;
use crate::scoring::create_scorer;
use crate::semantic::{ContextItemsIndex, SemanticDisambiguator};
use crate::species::accept_highest_scoring_tax;
use crate::synhit::SynHit;

/// Candidatos listados no evento de recuperação.
const EVENT_TOP_HITS: usize = 5;

/// Eventos emitidos durante o mapeamento de uma menção.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MappingEvent {
    Normalized {
        mention: String,
        normalized: String,
        variants: Vec<String>,
    },
    CandidatesRetrieved {
        total: usize,
        /// Melhores sinônimos e seus scores.
        top: Vec<(String, f64)>,
    },
    CandidatesFiltered {
        kept: usize,
        removed: Vec<(String, FilterRule)>,
    },
    BestSelected {
        synonyms: Vec<String>,
        score: f64,
        by_context: bool,
        rejected: bool,
    },
    TaxonomyResolved {
        scores: BTreeMap<String, f64>,
        tax_id: Option<String>,
        id: Option<String>,
    },
    Done {
        result: MentionMappingResult,
        processing_ms: u64,
    },
    Error {
        message: String,
    },
}

/// Índices já abertos que o mapeador usa.
pub struct MappingIndexes {
    pub mention: Arc<dyn SearchIndex>,
    pub context_items: Option<Arc<dyn SearchIndex>>,
    pub semantic: Option<Arc<dyn SearchIndex>>,
}

impl MappingIndexes {
    /// Abre os locais configurados como arquivos JSON lines.
    pub fn open(settings: &MappingSettings) -> Result<Self> {
        let open = |location: &str| -> Result<Arc<dyn SearchIndex>> {
            let index = TantivyIndex::open(Path::new(location)).map_err(|e| {
                GeneMappingError::Resource(format!("cannot open index '{location}': {e}"))
            })?;
            Ok(Arc::new(index))
        };
        Ok(Self {
            mention: open(&settings.mention_index)?,
            context_items: settings.context_items_index.as_deref().map(|l| open(l)).transpose()?,
            semantic: settings.semantic_index.as_deref().map(|l| open(l)).transpose()?,
        })
    }

    /// Dicionário e contexto de demonstração do módulo `corpus`.
    pub fn demo(lexicon: &Lexicon) -> Result<Self> {
        let normalizer = TermNormalizer::with_lexicon(lexicon)?;
        let demo_error = |e: IndexError| GeneMappingError::Resource(format!("demo index: {e}"));
        let context: Arc<dyn SearchIndex> =
            Arc::new(demo_context_index(&normalizer, &lexicon.context_stopwords).map_err(demo_error)?);
        Ok(Self {
            mention: Arc::new(demo_mention_index(&normalizer).map_err(demo_error)?),
            context_items: Some(Arc::clone(&context)),
            semantic: Some(context),
        })
    }
}

/// O mapeador de menções de genes.
///
/// # Modos de Uso
/// - **Sync**: [`GeneMapper::map_mention`] e [`GeneMapper::map_document`].
/// - **Streaming**: [`GeneMapper::map_mention_streaming`] envia os eventos de cada passo.
/// - **Lote**: [`GeneMapper::map_documents`] em paralelo.
pub struct GeneMapper {
    settings: MappingSettings,
    core: Arc<dyn MappingCore>,
    filter: CandidateFilter,
    semantic: Option<SemanticDisambiguator>,
    caches: Arc<MappingCaches>,
}

impl GeneMapper {
    /// Abre os índices configurados e monta o mapeador.
    pub fn from_settings(settings: MappingSettings, caches: Arc<MappingCaches>) -> Result<Self> {
        let indexes = MappingIndexes::open(&settings)?;
        Self::with_indexes(settings, indexes, caches)
    }

    pub fn with_indexes(
        settings: MappingSettings,
        indexes: MappingIndexes,
        caches: Arc<MappingCaches>,
    ) -> Result<Self> {
        settings.validate()?;
        let lexicon = settings.lexicon()?;
        lexicon.validate()?;
        let normalizer = Arc::new(TermNormalizer::with_lexicon(&lexicon)?);
        let filter = CandidateFilter::with_lexicon(&lexicon, &normalizer)?;
        let model = settings.maxent_model.as_deref();
        let exact = create_scorer(settings.exact_scorer_type, model, &lexicon)?;
        let approx = create_scorer(settings.approx_scorer_type, model, &lexicon)?;

        let mut retrieval = CandidateRetrieval::new(
            &settings.mention_index,
            indexes.mention,
            normalizer,
            exact,
            approx,
            &caches.candidates,
        )?;
        if let Some(path) = &settings.spelling_index {
            retrieval = retrieval.with_spelling_dictionary(path);
        }

        let context_items = match (settings.context_items_index.as_deref(), indexes.context_items) {
            (Some(location), Some(index)) => Some(ContextItemsIndex::new(location, index, &caches.context_items)?),
            (Some(location), None) => return Err(not_opened("context items", location)),
            (None, _) => None,
        };
        let semantic = match (settings.semantic_index.as_deref(), indexes.semantic) {
            (Some(_), Some(index)) => Some(SemanticDisambiguator::new(
                index,
                lexicon.context_stopwords.clone(),
                settings.min_context_score,
            )),
            (Some(location), None) => return Err(not_opened("semantic", location)),
            (None, _) => None,
        };

        let core = create_mapping_core(settings.mapping_core, retrieval, settings.tax_ids(), context_items)?;
        info!(core = %settings.mapping_core, semantic = semantic.is_some(), "gene mapper ready");
        Ok(Self {
            settings,
            core,
            filter,
            semantic,
            caches,
        })
    }

    pub fn settings(&self) -> &MappingSettings {
        &self.settings
    }

    pub fn core(&self) -> &dyn MappingCore {
        self.core.as_ref()
    }

    pub fn caches(&self) -> &Arc<MappingCaches> {
        &self.caches
    }

    /// Mapeia uma menção de forma síncrona.
    pub fn map_mention(&self, mention: &mut GeneMention) -> Result<MentionMappingResult> {
        let (tx, rx) = mpsc::channel();
        let result = self.map_mention_streaming(mention, None, &tx);
        drop(tx);
        let events = rx.try_iter().count();
        trace!(events, "mapping events drained");
        result
    }

    /// Mapeia um texto solto, sem documento.
    pub fn map_text(&self, text: &str) -> Result<MentionMappingResult> {
        self.map_mention(&mut GeneMention::new(text))
    }

    /// Mapeia a menção enviando eventos de progresso por `tx`.
    ///
    /// `context` é o texto do documento, usado pela desambiguação por contexto
    /// quando ela está configurada. O resultado também fica em
    /// `mention.mapping_result`.
    ///
    /// # Fluxo de Eventos
    /// 1. `Normalized`
    /// 2. `CandidatesRetrieved`
    /// 3. `CandidatesFiltered`
    /// 4. `BestSelected`
    /// 5. `TaxonomyResolved` (só quando há candidato)
    /// 6. `Done`, ou `Error` se o índice falhar
    pub fn map_mention_streaming(
        &self,
        mention: &mut GeneMention,
        context: Option<&str>,
        tx: &mpsc::Sender<MappingEvent>,
    ) -> Result<MentionMappingResult> {
        let start = Instant::now();
        match self.run(mention, context, tx) {
            Ok(result) => {
                let _ = tx.send(MappingEvent::Done {
                    result: result.clone(),
                    processing_ms: elapsed_ms(start.elapsed()),
                });
                Ok(result)
            }
            Err(err) => {
                let _ = tx.send(MappingEvent::Error {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn run(
        &self,
        mention: &mut GeneMention,
        context: Option<&str>,
        tx: &mpsc::Sender<MappingEvent>,
    ) -> Result<MentionMappingResult> {
        // === Passo 1: Normalização ===
        let normalizer = self.core.normalizer();
        let normalized = mention.normalized(normalizer).to_string();
        let _ = tx.send(MappingEvent::Normalized {
            mention: mention.text().to_string(),
            normalized: normalized.clone(),
            variants: mention.variants(normalizer).to_vec(),
        });
        let mut result = MentionMappingResult::new(mention.text());

        // === Passo 2: Recuperação ===
        let retrieval_start = Instant::now();
        let candidates = self
            .core
            .retrieval()
            .get_candidates(mention, self.core.retrieval_organisms())?;
        result.candidate_retrieval_time = retrieval_start.elapsed();
        let _ = tx.send(MappingEvent::CandidatesRetrieved {
            total: candidates.len(),
            top: candidates
                .iter()
                .take(EVENT_TOP_HITS)
                .map(|h| (h.synonym.clone(), h.mention_score))
                .collect(),
        });

        // === Passo 3: Filtro ===
        let disambiguation_start = Instant::now();
        let mut removed = Vec::new();
        let filtered: Vec<SynHit> = if self.settings.filter_candidates {
            candidates
                .iter()
                .filter(|hit| match self.filter.filter_reason(&normalized, &hit.synonym) {
                    Some(rule) => {
                        removed.push((hit.synonym.clone(), rule));
                        false
                    }
                    None => true,
                })
                .cloned()
                .collect()
        } else {
            candidates.clone()
        };
        debug!(mention = %mention, kept = filtered.len(), removed = removed.len(), "candidates filtered");
        let _ = tx.send(MappingEvent::CandidatesFiltered {
            kept: filtered.len(),
            removed,
        });
        result.original_candidates = candidates;
        result.filtered_candidates = filtered;

        // === Passo 4: Melhor candidato ===
        let by_context = self.semantic.is_some() && context.is_some();
        let best = match (&self.semantic, context) {
            (Some(semantic), Some(context)) => {
                let ranked = semantic.rank(&result.filtered_candidates, context)?;
                let winner = semantic.select(&ranked);
                result.semantically_ordered_candidates = ranked;
                match winner {
                    Some(winner) => self.core.select_best(&[winner]),
                    None => Vec::new(),
                }
            }
            _ => self.core.select_best(&result.filtered_candidates),
        };
        result.best_candidate = Resolution::from_hits(best);
        let _ = tx.send(MappingEvent::BestSelected {
            synonyms: result.best_candidate.hits().iter().map(|h| h.synonym.clone()).collect(),
            score: result.best_candidate.mention_score(),
            by_context,
            rejected: result.best_candidate.is_rejected(),
        });

        // === Passo 5: Organismo ===
        if !result.best_candidate.is_rejected() {
            if mention.taxonomy_scores.is_empty() {
                let allowed = self.core.organisms();
                let candidate_taxa: BTreeSet<&str> = result
                    .filtered_candidates
                    .iter()
                    .flat_map(|h| h.tax_ids.iter().map(String::as_str))
                    .filter(|tax| allowed.iter().any(|a| a == tax))
                    .collect();
                mention.taxonomy_scores = mention.taxonomy_candidates.taxonomy_scores(candidate_taxa);
            }
            let scores = mention.taxonomy_scores.clone();
            accept_highest_scoring_tax(&mut result, &scores, self.settings.default_species.as_deref());
            self.core.resolve_ids(&mut result)?;

            let best = result.best_candidate.best()?;
            let _ = tx.send(MappingEvent::TaxonomyResolved {
                scores,
                tax_id: best.tax_id().map(str::to_string),
                id: best.id().map(str::to_string),
            });
        }

        result.disambiguation_time = disambiguation_start.elapsed();
        result.finalize();
        debug!(
            mention = %mention,
            id = ?result.result_entries.id(),
            rejected = result.is_rejected(),
            "mention mapped"
        );
        mention.mapping_result = Some(result.clone());
        Ok(result)
    }

    /// Mapeia todas as menções do documento.
    ///
    /// Calcula antes as evidências de espécie de cada menção, com os prefixos
    /// e a espécie padrão da configuração.
    pub fn map_document(&self, document: &mut GeneDocument) -> Result<DocumentMappingResult> {
        document.species_prefixes = self.settings.species_prefixes.clone();
        if document.default_species.is_none() {
            document.default_species = self.settings.default_species.clone();
        }
        document.assign_species_hints();

        let (tx, rx) = mpsc::channel();
        let GeneDocument { id, text, genes, .. } = document;
        let context = self.semantic.is_some().then_some(text.as_str());
        let mut results = DocumentMappingResult::new(id.as_str());
        for gene in genes.iter_mut() {
            if gene.doc_id.is_none() {
                gene.doc_id = Some(id.clone());
            }
            results.mention_results.push(self.map_mention_streaming(gene, context, &tx)?);
        }
        drop(tx);
        let events = rx.try_iter().count();
        info!(
            doc = %results.doc_id,
            mentions = results.mention_results.len(),
            mapped = results.mapped().count(),
            events,
            "document mapped"
        );
        Ok(results)
    }

    /// Mapeia documentos em paralelo; a falha de um não interrompe os outros.
    pub fn map_documents(&self, documents: &mut [GeneDocument]) -> Vec<Result<DocumentMappingResult>> {
        documents.par_iter_mut().map(|doc| self.map_document(doc)).collect()
    }

    /// Os `n` melhores sinônimos para um termo, sem modificadores nem candidatos filtrados.
    pub fn top_n(&self, term: &str, n: usize) -> Result<Vec<SynHit>> {
        self.core.retrieval().top_n(term, n, &self.filter)
    }
}

fn not_opened(kind: &str, location: &str) -> GeneMappingError {
    GeneMappingError::Configuration(format!("the {kind} index '{location}' is configured but was not opened"))
}

/// Milissegundos inteiros, saturando em `u64::MAX`.
fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{demo_documents, synonym_documents, HUMAN, MOUSE, RAT};
    use crate::error::IndexError;
    use crate::query::Query;
    use crate::result::MatchType;
    use crate::scoring::ScorerKind;
    use std::io::Write;

    fn init_logs() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn demo_settings(with_context: bool) -> MappingSettings {
        let mut settings =
            MappingSettings::new("demo", ScorerKind::Simple, ScorerKind::Simple).with_tax_ids(&[HUMAN, MOUSE, RAT]);
        if with_context {
            settings.context_items_index = Some("demo-context".into());
            settings.semantic_index = Some("demo-semantic".into());
        }
        settings
    }

    fn demo_mapper(settings: MappingSettings, caches: &Arc<MappingCaches>) -> GeneMapper {
        let indexes = MappingIndexes::demo(&Lexicon::bundled()).unwrap();
        GeneMapper::with_indexes(settings, indexes, Arc::clone(caches)).unwrap()
    }

    fn mapped_ids(result: &DocumentMappingResult) -> Vec<Option<&str>> {
        result.mention_results.iter().map(|r| r.result_entries.id()).collect()
    }

    #[derive(Debug)]
    struct FailingIndex;

    impl SearchIndex for FailingIndex {
        fn search(&self, _query: &Query, _max_hits: usize) -> std::result::Result<Vec<crate::index::ScoredDocument>, IndexError> {
            Err(IndexError::Io("index unavailable".into()))
        }

        fn num_docs(&self) -> usize {
            0
        }
    }

    #[test]
    fn test_map_demo_documents() {
        init_logs();
        let caches = Arc::new(MappingCaches::new());
        let mapper = demo_mapper(demo_settings(false), &caches);
        let mut documents = demo_documents();
        let results: Vec<DocumentMappingResult> =
            mapper.map_documents(&mut documents).into_iter().map(Result::unwrap).collect();

        assert_eq!(results[0].doc_id, "demo-1");
        assert_eq!(mapped_ids(&results[0]), vec![Some("7157"), Some("7157"), Some("672")]);
        assert_eq!(mapped_ids(&results[1]), vec![Some("16183"), Some("21926")]);
        // sem itens de contexto o gene ambíguo fica com o primeiro do organismo
        assert_eq!(mapped_ids(&results[2]), vec![Some("4689")]);
        assert!(!results[2].mention_results[0].result_entries.best().unwrap().is_disambiguated());

        let il2 = &documents[1].genes[0];
        assert!(il2.taxonomy_score(MOUSE) > 0.0);
        assert_eq!(il2.taxonomy_score(RAT), 0.0);
        assert_eq!(il2.doc_id.as_deref(), Some("demo-2"));
        assert!(il2.mapping_result.is_some());
    }

    #[test]
    fn test_map_demo_documents_with_context() {
        init_logs();
        let caches = Arc::new(MappingCaches::new());
        let mapper = demo_mapper(demo_settings(true), &caches);
        let mut documents = demo_documents();
        let results: Vec<DocumentMappingResult> = documents
            .iter_mut()
            .map(|doc| mapper.map_document(doc).unwrap())
            .collect();

        assert_eq!(mapped_ids(&results[0]), vec![Some("7157"), Some("7157"), Some("672")]);
        assert_eq!(mapped_ids(&results[1]), vec![Some("16183"), Some("21926")]);
        assert_eq!(mapped_ids(&results[2]), vec![Some("3593")]);

        let p40 = &results[2].mention_results[0];
        assert_eq!(p40.match_type, Some(MatchType::Exact));
        assert!(!p40.semantically_ordered_candidates.is_empty());
        assert!(p40.semantically_ordered_candidates[0].semantic_score > 0.0);
    }

    #[test]
    fn test_rejection_path() {
        let caches = Arc::new(MappingCaches::new());
        let mapper = demo_mapper(demo_settings(false), &caches);
        let result = mapper.map_text("xyzzy").unwrap();
        assert!(result.is_rejected());
        assert!(result.original_candidates.is_empty());
        assert_eq!(result.result_entries, Resolution::Rejected);
        assert!(matches!(result.result_entries.synonym(), Err(GeneMappingError::InvalidState(_))));
        assert_eq!(result.match_type, None);
    }

    #[test]
    fn test_allow_list_without_match_rejects() {
        let caches = Arc::new(MappingCaches::new());
        let settings = MappingSettings::new("demo", ScorerKind::Simple, ScorerKind::Simple).with_tax_ids(&["7227"]);
        let mapper = demo_mapper(settings, &caches);
        let result = mapper.map_text("p53").unwrap();
        assert!(!result.original_candidates.is_empty());
        assert!(result.is_rejected());
    }

    #[test]
    fn test_event_stream() {
        let caches = Arc::new(MappingCaches::new());
        let mapper = demo_mapper(demo_settings(false), &caches);
        let (tx, rx) = mpsc::channel();
        let mut mention = GeneMention::new("IL2");
        mapper.map_mention_streaming(&mut mention, None, &tx).unwrap();
        drop(tx);

        let events: Vec<MappingEvent> = rx.try_iter().collect();
        assert!(matches!(&events[0], MappingEvent::Normalized { normalized, .. } if normalized == "il 2"));
        assert!(events.iter().any(|e| matches!(e, MappingEvent::CandidatesFiltered { .. })));
        assert!(events.iter().any(|e| matches!(e, MappingEvent::TaxonomyResolved { .. })));
        assert!(matches!(events.last().unwrap(), MappingEvent::Done { .. }));

        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["type"], "Normalized");
        assert_eq!(json["data"]["mention"], "IL2");
    }

    #[test]
    fn test_retrieval_error_is_reported() {
        let caches = Arc::new(MappingCaches::new());
        let indexes = MappingIndexes {
            mention: Arc::new(FailingIndex),
            context_items: None,
            semantic: None,
        };
        let mapper = GeneMapper::with_indexes(demo_settings(false), indexes, caches).unwrap();
        let (tx, rx) = mpsc::channel();
        let err = mapper
            .map_mention_streaming(&mut GeneMention::new("p53"), None, &tx)
            .unwrap_err();
        drop(tx);
        assert!(matches!(err, GeneMappingError::CandidateRetrieval { .. }));
        let events: Vec<MappingEvent> = rx.try_iter().collect();
        assert!(matches!(events.last().unwrap(), MappingEvent::Error { .. }));
        // falha não fica no cache
        assert_eq!(mapper.core().retrieval().cache().len(), 0);
    }

    #[test]
    fn test_mappers_share_caches() {
        let caches = Arc::new(MappingCaches::new());
        let first = demo_mapper(demo_settings(false), &caches);
        let second = demo_mapper(demo_settings(false), &caches);
        assert!(Arc::ptr_eq(first.core().retrieval().cache(), second.core().retrieval().cache()));

        first.map_text("BRCA1").unwrap();
        second.map_text("BRCA1").unwrap();
        let stats = first.core().retrieval().cache().stats();
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.hits, 1);

        let mut other = demo_settings(false);
        other.mention_index = "demo-copy".into();
        let third = demo_mapper(other, &caches);
        assert!(!Arc::ptr_eq(first.core().retrieval().cache(), third.core().retrieval().cache()));
        assert_eq!(caches.candidates.len(), 2);
    }

    #[test]
    fn test_missing_configured_index() {
        let caches = Arc::new(MappingCaches::new());
        let indexes = MappingIndexes::demo(&Lexicon::bundled()).unwrap();
        let indexes = MappingIndexes {
            semantic: None,
            ..indexes
        };
        let err = GeneMapper::with_indexes(demo_settings(true), indexes, caches).err().unwrap();
        assert!(matches!(err, GeneMappingError::Configuration(_)));
    }

    #[test]
    fn test_from_settings_with_index_file() {
        let normalizer = TermNormalizer::new().unwrap();
        let mut file = tempfile::Builder::new().suffix(".jsonl").tempfile().unwrap();
        for doc in synonym_documents(&normalizer) {
            writeln!(file, "{}", serde_json::to_string(&doc.fields).unwrap()).unwrap();
        }
        let location = file.path().to_string_lossy().to_string();
        let settings = MappingSettings::new(location, ScorerKind::Simple, ScorerKind::JaroWinkler).with_tax_ids(&[HUMAN]);
        let mapper = GeneMapper::from_settings(settings, Arc::new(MappingCaches::new())).unwrap();
        let result = mapper.map_text("CD4").unwrap();
        assert_eq!(result.result_entries.id(), Some("920"));
        assert!(result.result_entries.is_exact_match());

        let missing = MappingSettings::new("/nonexistent/genes.jsonl", ScorerKind::Simple, ScorerKind::Simple)
            .with_tax_ids(&[HUMAN]);
        assert!(matches!(
            GeneMapper::from_settings(missing, Arc::new(MappingCaches::new())),
            Err(GeneMappingError::Resource(_))
        ));
    }

    #[test]
    fn test_top_n() {
        let caches = Arc::new(MappingCaches::new());
        let mapper = demo_mapper(demo_settings(false), &caches);
        let top = mapper.top_n("IL2 protein", 3).unwrap();
        assert_eq!(top[0].synonym, "il 2");
        assert!(top.iter().all(|h| h.synonym != "il 4"));
        assert!(mapper.top_n("protein", 3).unwrap().is_empty());
    }

    #[test]
    fn test_elapsed_ms_saturates() {
        assert_eq!(elapsed_ms(Duration::from_micros(2_500)), 2);
        assert_eq!(elapsed_ms(Duration::from_secs(3)), 3_000);
        assert_eq!(elapsed_ms(Duration::MAX), u64::MAX);
    }
}
