//! # Índice Léxico (Tantivy)
//!
//! O mapeamento só **consulta** índices construídos fora deste crate. A
//! capacidade exigida é pequena e fica atrás do trait [`SearchIndex`]:
//! "consulta → documentos ranqueados com seus campos armazenados".
//!
//! [`TantivyIndex`] é a implementação sobre o `tantivy`, mantida em memória.
//! Os documentos chegam de um arquivo JSON lines, um objeto por linha, com
//! campos de valor único ou múltiplo:
//!
//! ```text
//! {"entry_id": ["7157__-1", "22059__-1"], "indexed_syn": "tp 53", "tax_id": ["9606", "10090"]}
//! ```
//!
//! ## Tradução das consultas
//!
//! | [`Query`]             | tantivy                                         |
//! |-----------------------|-------------------------------------------------|
//! | `Term`                | `TermQuery`                                     |
//! | `Phrase`              | `PhraseQuery` (um só termo vira `TermQuery`)    |
//! | `Prefix`              | `RegexQuery` com score constante 1.0            |
//! | `Boolean` `must`      | `Occur::Must`                                   |
//! | `Boolean` `should`    | `Occur::Should`                                 |
//! | `Boolean` `filter`    | `Occur::Must` + `ConstScoreQuery(.., 0.0)`      |
//! | `DisMax`              | `DisjunctionMaxQuery` com `tie_breaker`         |
//!
//! Todos os campos usam a mesma análise: espaços e minúsculas. A similaridade
//! é o BM25 do tantivy. Empates de score saem na ordem de inserção.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tantivy::collector::TopDocs;
use tantivy::query::{
    BooleanQuery, ConstScoreQuery, DisjunctionMaxQuery, EmptyQuery, Occur, PhraseQuery, Query as EngineQuery,
    RegexQuery, TermQuery,
};
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value};
use tantivy::tokenizer::{LowerCaser, TextAnalyzer, WhitespaceTokenizer};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term, TantivyError};
use tracing::{debug, info};

use crate::error::IndexError;
use crate::query::Query;

/// Nome do analisador registrado no índice.
const ANALYZER: &str = "genemap_whitespace";

/// Memória do escritor. Uma única thread mantém a ordem de inserção.
const WRITER_MEMORY: usize = 50_000_000;

/// Documento com campos armazenados (cada campo pode ter vários valores).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub fields: BTreeMap<String, Vec<String>>,
}

impl StoredDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acrescenta um valor ao campo.
    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.add(field, value);
        self
    }

    pub fn add(&mut self, field: &str, value: impl Into<String>) {
        self.fields.entry(field.to_string()).or_default().push(value.into());
    }

    /// Primeiro valor do campo.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn get_all(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Lê um objeto JSON: strings, números e booleanos viram texto; listas viram
    /// campos multivalorados.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, IndexError> {
        let object = value
            .as_object()
            .ok_or_else(|| IndexError::MalformedDocument("document is not a JSON object".into()))?;
        let mut doc = StoredDocument::new();
        for (field, value) in object {
            match value {
                serde_json::Value::Array(values) => {
                    for v in values {
                        doc.add(field, scalar_to_string(field, v)?);
                    }
                }
                v => doc.add(field, scalar_to_string(field, v)?),
            }
        }
        Ok(doc)
    }
}

fn scalar_to_string(field: &str, value: &serde_json::Value) -> Result<String, IndexError> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        other => Err(IndexError::MalformedDocument(format!(
            "unsupported value for field '{field}': {other}"
        ))),
    }
}

/// Um documento encontrado e seu score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    /// Posição do documento no índice.
    pub doc: usize,
    pub score: f64,
    pub document: StoredDocument,
}

/// Capacidade de busca consumida pelo mapeamento.
pub trait SearchIndex: Send + Sync {
    /// Até `max_hits` documentos, score decrescente.
    fn search(&self, query: &Query, max_hits: usize) -> Result<Vec<ScoredDocument>, IndexError>;

    fn num_docs(&self) -> usize;
}

fn engine_error(err: TantivyError) -> IndexError {
    IndexError::Io(format!("search engine: {err}"))
}

fn analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(WhitespaceTokenizer::default())
        .filter(LowerCaser)
        .build()
}

fn valid_field_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('-')
}

/// Índice tantivy em memória.
pub struct TantivyIndex {
    reader: IndexReader,
    fields: BTreeMap<String, Field>,
}

impl fmt::Debug for TantivyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TantivyIndex")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("docs", &self.num_docs())
            .finish()
    }
}

impl TantivyIndex {
    /// Indexa os documentos; o esquema é a união dos campos presentes.
    pub fn from_documents(documents: impl IntoIterator<Item = StoredDocument>) -> Result<Self, IndexError> {
        let documents: Vec<StoredDocument> = documents.into_iter().collect();
        let names: BTreeSet<&str> = documents
            .iter()
            .flat_map(|d| d.fields.keys().map(String::as_str))
            .collect();

        let indexing = TextFieldIndexing::default()
            .set_tokenizer(ANALYZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let options = TextOptions::default().set_indexing_options(indexing).set_stored();
        let mut schema_builder = Schema::builder();
        let mut fields = BTreeMap::new();
        for name in names {
            if !valid_field_name(name) {
                return Err(IndexError::MalformedDocument(format!("invalid field name '{name}'")));
            }
            fields.insert(name.to_string(), schema_builder.add_text_field(name, options.clone()));
        }

        let index = Index::create_in_ram(schema_builder.build());
        index.tokenizers().register(ANALYZER, analyzer());

        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_MEMORY)
            .map_err(engine_error)?;
        for stored in &documents {
            let mut doc = TantivyDocument::new();
            for (name, values) in &stored.fields {
                if let Some(&field) = fields.get(name) {
                    for value in values {
                        doc.add_text(field, value);
                    }
                }
            }
            writer.add_document(doc).map_err(engine_error)?;
        }
        writer.commit().map_err(engine_error)?;
        writer.wait_merging_threads().map_err(engine_error)?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(engine_error)?;
        Ok(Self { reader, fields })
    }

    /// Carrega um arquivo JSON lines. Linhas vazias são ignoradas.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let text = fs::read_to_string(path)
            .map_err(|e| IndexError::Io(format!("{}: {e}", path.display())))?;
        let index = Self::from_json_lines(&text)?;
        info!(path = %path.display(), docs = index.num_docs(), "index opened");
        Ok(index)
    }

    pub fn from_json_lines(text: &str) -> Result<Self, IndexError> {
        let mut documents = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
                IndexError::MalformedDocument(format!("line {}: {e}", line_no + 1))
            })?;
            documents.push(StoredDocument::from_json(&value)?);
        }
        Self::from_documents(documents)
    }

    fn field_terms(&self, field: &str, values: impl IntoIterator<Item = String>) -> Option<Vec<Term>> {
        let field = *self.fields.get(field)?;
        Some(values.into_iter().map(|v| Term::from_field_text(field, &v)).collect())
    }

    fn compile(&self, query: &Query) -> Result<Box<dyn EngineQuery>, IndexError> {
        match query {
            Query::Term { field, value } => {
                let term = value.trim().to_lowercase();
                if term.is_empty() {
                    return Err(IndexError::MalformedQuery(format!("empty term for field '{field}'")));
                }
                let compiled: Box<dyn EngineQuery> = match self.fields.get(field.as_str()) {
                    Some(&engine_field) => Box::new(TermQuery::new(
                        Term::from_field_text(engine_field, &term),
                        IndexRecordOption::WithFreqs,
                    )),
                    None => Box::new(EmptyQuery),
                };
                Ok(compiled)
            }
            Query::Phrase { field, terms } => {
                let words: Vec<String> = terms
                    .iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect();
                if words.is_empty() {
                    return Err(IndexError::MalformedQuery(format!("empty phrase for field '{field}'")));
                }
                let compiled: Box<dyn EngineQuery> = match self.field_terms(field, words) {
                    None => Box::new(EmptyQuery),
                    Some(mut terms) if terms.len() == 1 => {
                        Box::new(TermQuery::new(terms.remove(0), IndexRecordOption::WithFreqs))
                    }
                    Some(terms) => Box::new(PhraseQuery::new(terms)),
                };
                Ok(compiled)
            }
            Query::Prefix { field, prefix } => {
                let prefix = prefix.to_lowercase();
                if prefix.is_empty() {
                    return Err(IndexError::MalformedQuery(format!("empty prefix for field '{field}'")));
                }
                let Some(&engine_field) = self.fields.get(field.as_str()) else {
                    return Ok(Box::new(EmptyQuery));
                };
                let pattern = format!("{}.*", regex::escape(&prefix));
                let regex = RegexQuery::from_pattern(&pattern, engine_field)
                    .map_err(|e| IndexError::MalformedQuery(format!("prefix '{prefix}': {e}")))?;
                Ok(Box::new(ConstScoreQuery::new(Box::new(regex), 1.0)))
            }
            Query::Boolean { must, should, filter } => {
                if must.is_empty() && should.is_empty() && filter.is_empty() {
                    return Err(IndexError::MalformedQuery("boolean query without clauses".into()));
                }
                let mut clauses: Vec<(Occur, Box<dyn EngineQuery>)> = Vec::new();
                for clause in must {
                    clauses.push((Occur::Must, self.compile(clause)?));
                }
                for clause in should {
                    clauses.push((Occur::Should, self.compile(clause)?));
                }
                for clause in filter {
                    let unscored: Box<dyn EngineQuery> = Box::new(ConstScoreQuery::new(self.compile(clause)?, 0.0));
                    clauses.push((Occur::Must, unscored));
                }
                Ok(Box::new(BooleanQuery::new(clauses)))
            }
            Query::DisMax { disjuncts, tie_breaker } => {
                if disjuncts.is_empty() {
                    return Err(IndexError::MalformedQuery("disjunction without disjuncts".into()));
                }
                let compiled = disjuncts
                    .iter()
                    .map(|d| self.compile(d))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Box::new(DisjunctionMaxQuery::with_tie_breaker(compiled, *tie_breaker as f32)))
            }
        }
    }

    fn stored(&self, doc: &TantivyDocument) -> StoredDocument {
        let mut stored = StoredDocument::new();
        for (name, &field) in &self.fields {
            for value in doc.get_all(field) {
                if let Some(text) = value.as_str() {
                    stored.add(name, text);
                }
            }
        }
        stored
    }
}

impl SearchIndex for TantivyIndex {
    fn search(&self, query: &Query, max_hits: usize) -> Result<Vec<ScoredDocument>, IndexError> {
        let compiled = self.compile(query)?;
        if max_hits == 0 {
            return Ok(Vec::new());
        }
        let searcher = self.reader.searcher();
        let top = searcher
            .search(&*compiled, &TopDocs::with_limit(max_hits))
            .map_err(engine_error)?;

        // posição global = documentos dos segmentos anteriores + id no segmento
        let mut offsets = Vec::with_capacity(searcher.segment_readers().len());
        let mut total = 0usize;
        for segment in searcher.segment_readers() {
            offsets.push(total);
            total += segment.max_doc() as usize;
        }

        let mut ranked = Vec::with_capacity(top.len());
        for (score, address) in top {
            let doc: TantivyDocument = searcher.doc(address).map_err(engine_error)?;
            let base = offsets.get(address.segment_ord as usize).copied().unwrap_or(0);
            ranked.push(ScoredDocument {
                doc: base + address.doc_id as usize,
                score: f64::from(score),
                document: self.stored(&doc),
            });
        }
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc.cmp(&b.doc)));
        debug!(%query, hits = ranked.len(), "search");
        Ok(ranked)
    }

    fn num_docs(&self) -> usize {
        self.reader.searcher().num_docs() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fields;

    fn index() -> TantivyIndex {
        TantivyIndex::from_documents([
            StoredDocument::new()
                .with(fields::INDEXED_SYN, "tp 53")
                .with(fields::ENTRY_ID, "7157__-1")
                .with(fields::TAX_ID, "9606"),
            StoredDocument::new()
                .with(fields::INDEXED_SYN, "tumor protein p 53")
                .with(fields::ENTRY_ID, "7157__2")
                .with(fields::TAX_ID, "9606"),
            StoredDocument::new()
                .with(fields::INDEXED_SYN, "trp 53")
                .with(fields::ENTRY_ID, "22059__-1")
                .with(fields::TAX_ID, "10090"),
        ])
        .unwrap()
    }

    #[test]
    fn test_term_scores_shorter_field_higher() {
        let idx = index();
        let hits = idx.search(&Query::term(fields::INDEXED_SYN, "53"), 10).unwrap();
        assert_eq!(hits.len(), 3);
        // "tp 53" e "trp 53" (2 tokens) empatam acima do nome longo; empate por posição
        assert_eq!(hits[0].doc, 0);
        assert_eq!(hits[1].doc, 2);
        assert_eq!(hits[2].doc, 1);
        assert!(hits[0].score > hits[2].score);
    }

    #[test]
    fn test_boolean_filter_does_not_score() {
        let idx = index();
        let plain = idx.search(&Query::term(fields::INDEXED_SYN, "53"), 10).unwrap();
        let filtered = idx
            .search(
                &Query::boolean()
                    .must(Query::term(fields::INDEXED_SYN, "53"))
                    .filter(Query::term(fields::TAX_ID, "10090"))
                    .build(),
                10,
            )
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].document.get(fields::ENTRY_ID), Some("22059__-1"));
        let unfiltered_score = plain.iter().find(|h| h.doc == 2).unwrap().score;
        assert!((filtered[0].score - unfiltered_score).abs() < 1e-6);
    }

    #[test]
    fn test_filter_only_matches_with_zero_score() {
        let idx = index();
        let hits = idx
            .search(&Query::boolean().filter(Query::term(fields::TAX_ID, "9606")).build(), 10)
            .unwrap();
        assert_eq!(hits.iter().map(|h| h.doc).collect::<Vec<_>>(), vec![0, 1]);
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn test_should_only_requires_one_match() {
        let idx = index();
        let q = Query::disjunctive("tumor xyz", fields::INDEXED_SYN).unwrap();
        let hits = idx.search(&q, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc, 1);
    }

    #[test]
    fn test_dismax_takes_maximum() {
        let idx = index();
        let a = Query::term(fields::INDEXED_SYN, "tp");
        let b = Query::term(fields::INDEXED_SYN, "53");
        let single = idx.search(&a, 10).unwrap()[0].score;
        let other = idx
            .search(&b, 10)
            .unwrap()
            .into_iter()
            .find(|h| h.doc == 0)
            .unwrap()
            .score;
        let hits = idx
            .search(
                &Query::DisMax {
                    disjuncts: vec![a, b],
                    tie_breaker: 0.0,
                },
                10,
            )
            .unwrap();
        let doc0 = hits.iter().find(|h| h.doc == 0).unwrap();
        assert!((doc0.score - single.max(other)).abs() < 1e-6);
    }

    #[test]
    fn test_phrase_and_prefix() {
        let idx = index();
        let hits = idx.search(&Query::phrase(fields::INDEXED_SYN, "protein p"), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc, 1);
        assert!(idx.search(&Query::phrase(fields::INDEXED_SYN, "p protein"), 10).unwrap().is_empty());

        let hits = idx.search(&Query::prefix(fields::ENTRY_ID, "7157__"), 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.score == 1.0));
    }

    #[test]
    fn test_malformed_queries() {
        let idx = index();
        assert!(matches!(
            idx.search(&Query::term(fields::INDEXED_SYN, " "), 10),
            Err(IndexError::MalformedQuery(_))
        ));
        assert!(idx.search(&Query::boolean().build(), 10).is_err());
    }

    #[test]
    fn test_max_hits_and_unknown_field() {
        let idx = index();
        assert_eq!(idx.search(&Query::term(fields::INDEXED_SYN, "53"), 1).unwrap().len(), 1);
        assert!(idx.search(&Query::term(fields::INDEXED_SYN, "53"), 0).unwrap().is_empty());
        assert!(idx.search(&Query::term("nope", "53"), 10).unwrap().is_empty());
        assert_eq!(idx.num_docs(), 3);
    }

    #[test]
    fn test_multi_valued_fields_keep_order() {
        let idx = TantivyIndex::from_documents([StoredDocument::new()
            .with(fields::INDEXED_SYN, "p 53")
            .with(fields::ENTRY_ID, "7157__2")
            .with(fields::ENTRY_ID, "22059__2")
            .with(fields::ENTRY_ID, "24842__2")
            .with(fields::TAX_ID, "9606")
            .with(fields::TAX_ID, "10090")
            .with(fields::TAX_ID, "10116")])
        .unwrap();
        let hits = idx.search(&Query::term(fields::TAX_ID, "10090"), 10).unwrap();
        let doc = &hits[0].document;
        assert_eq!(doc.get_all(fields::ENTRY_ID), &["7157__2", "22059__2", "24842__2"]);
        assert_eq!(doc.get_all(fields::TAX_ID), &["9606", "10090", "10116"]);
    }

    #[test]
    fn test_json_lines_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mentions.jsonl");
        fs::write(
            &path,
            "{\"indexed_syn\": \"brca 1\", \"entry_id\": [\"672__-1\"], \"tax_id\": [9606], \"filtered\": false}\n\n",
        )
        .unwrap();
        let idx = TantivyIndex::open(&path).unwrap();
        assert_eq!(idx.num_docs(), 1);
        let hits = idx.search(&Query::term(fields::INDEXED_SYN, "BRCA"), 1).unwrap();
        let doc = &hits[0].document;
        assert_eq!(doc.get_all(fields::TAX_ID), &["9606".to_string()]);
        assert_eq!(doc.get(fields::FILTERED), Some("0"));

        assert!(matches!(
            TantivyIndex::from_json_lines("{not json"),
            Err(IndexError::MalformedDocument(_))
        ));
        assert!(matches!(
            TantivyIndex::from_json_lines("{\"-bad\": \"x\"}"),
            Err(IndexError::MalformedDocument(_))
        ));
        assert!(matches!(
            TantivyIndex::open(&dir.path().join("missing.jsonl")),
            Err(IndexError::Io(_))
        ));
    }
}
