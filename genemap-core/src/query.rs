//! # Consultas ao Índice Léxico
//!
//! O índice de sinônimos é consultado por um modelo de consulta pequeno,
//! independente do motor de busca: termo, frase, prefixo, booleana
//! (`must`/`should`/`filter`) e disjunção pelo máximo (`DisMax`).
//!
//! ## Consulta de candidatos
//!
//! [`QueryBuilder::build`] monta uma subconsulta "qualquer token" para cada forma
//! da menção e combina todas pelo **máximo**, não pela soma:
//!
//! ```text
//! +( original_name:(tnf alpha)  |  indexed_syn:(tnf alpha)  |  variant_name:(tnf a) )~0
//! #tax_id:9606
//! ```
//!
//! O filtro de organismo (`#`) restringe os documentos sem contribuir para o score.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::spelling::SpellChecker;

/// Nomes de campo do índice de sinônimos. Outras ferramentas dependem deles.
pub mod fields {
    /// Cada valor tem a forma `"<id>__<prioridade>"`.
    pub const ENTRY_ID: &str = "entry_id";
    pub const ORIGINAL_NAME: &str = "original_name";
    /// Forma normalizada usada na busca principal.
    pub const INDEXED_SYN: &str = "indexed_syn";
    pub const VARIANT_NAME: &str = "variant_name";
    pub const STEMMED_NORMALIZED_NAME: &str = "stemmed_normalized_name";
    pub const TAX_ID: &str = "tax_id";
    pub const PRIORITY: &str = "priority";
    pub const FILTERED: &str = "filtered";
}

/// Nomes de campo do índice de contexto (textos de fundo por gene).
pub mod context_fields {
    pub const ID: &str = "id";
    /// Texto livre do documento, usado na consulta semântica.
    pub const CONTEXT: &str = "context";
    pub const SUMMARY: &str = "summary";
    pub const GENERIF: &str = "generif";
    pub const INTERACTION: &str = "interaction";
}

/// Separador entre identificador e prioridade em [`fields::ENTRY_ID`].
pub const NAME_PRIO_DELIMITER: &str = "__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    Term {
        field: String,
        value: String,
    },
    Phrase {
        field: String,
        terms: Vec<String>,
    },
    Prefix {
        field: String,
        prefix: String,
    },
    Boolean {
        must: Vec<Query>,
        should: Vec<Query>,
        /// Cláusulas obrigatórias que não pontuam.
        filter: Vec<Query>,
    },
    DisMax {
        disjuncts: Vec<Query>,
        tie_breaker: f64,
    },
}

impl Query {
    pub fn term(field: &str, value: impl Into<String>) -> Self {
        Query::Term {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn phrase(field: &str, text: &str) -> Self {
        Query::Phrase {
            field: field.to_string(),
            terms: text.split_whitespace().map(str::to_lowercase).collect(),
        }
    }

    pub fn prefix(field: &str, prefix: impl Into<String>) -> Self {
        Query::Prefix {
            field: field.to_string(),
            prefix: prefix.into(),
        }
    }

    pub fn boolean() -> BooleanBuilder {
        BooleanBuilder::default()
    }

    /// Um termo `SHOULD` por token. `None` se não houver tokens.
    pub fn disjunctive(text: &str, field: &str) -> Option<Self> {
        let should: Vec<Query> = text.split_whitespace().map(|t| Query::term(field, t)).collect();
        if should.is_empty() {
            return None;
        }
        Some(Query::Boolean {
            must: Vec::new(),
            should,
            filter: Vec::new(),
        })
    }

    /// Um termo `MUST` por token. `None` se não houver tokens.
    pub fn conjunctive(text: &str, field: &str) -> Option<Self> {
        let must: Vec<Query> = text.split_whitespace().map(|t| Query::term(field, t)).collect();
        if must.is_empty() {
            return None;
        }
        Some(Query::Boolean {
            must,
            should: Vec::new(),
            filter: Vec::new(),
        })
    }
}

/// Montagem incremental de uma consulta booleana.
#[derive(Debug, Default, Clone)]
pub struct BooleanBuilder {
    must: Vec<Query>,
    should: Vec<Query>,
    filter: Vec<Query>,
}

impl BooleanBuilder {
    pub fn must(mut self, q: Query) -> Self {
        self.must.push(q);
        self
    }

    pub fn should(mut self, q: Query) -> Self {
        self.should.push(q);
        self
    }

    pub fn filter(mut self, q: Query) -> Self {
        self.filter.push(q);
        self
    }

    pub fn build(self) -> Query {
        Query::Boolean {
            must: self.must,
            should: self.should,
            filter: self.filter,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term { field, value } => write!(f, "{field}:{value}"),
            Query::Phrase { field, terms } => write!(f, "{field}:\"{}\"", terms.join(" ")),
            Query::Prefix { field, prefix } => write!(f, "{field}:{prefix}*"),
            Query::Boolean { must, should, filter } => {
                let mut parts = Vec::new();
                parts.extend(must.iter().map(|q| format!("+{}", wrap(q))));
                parts.extend(should.iter().map(|q| wrap(q)));
                parts.extend(filter.iter().map(|q| format!("#{}", wrap(q))));
                write!(f, "{}", parts.join(" "))
            }
            Query::DisMax { disjuncts, tie_breaker } => {
                let inner: Vec<String> = disjuncts.iter().map(|q| format!("({q})")).collect();
                write!(f, "({})~{tie_breaker}", inner.join(" | "))
            }
        }
    }
}

fn wrap(q: &Query) -> String {
    match q {
        Query::Boolean { .. } => format!("({q})"),
        _ => q.to_string(),
    }
}

/// Monta a consulta de candidatos de uma menção.
#[derive(Clone, Default)]
pub struct QueryBuilder {
    spell_checker: Option<Arc<dyn SpellChecker>>,
}

impl fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("spell_checker", &self.spell_checker.is_some())
            .finish()
    }
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ativa a correção de plurais na forma normalizada.
    pub fn with_spell_checker(mut self, checker: Arc<dyn SpellChecker>) -> Self {
        self.spell_checker = Some(checker);
        self
    }

    /// Consulta `DisMax` sobre nome original, forma normalizada e variantes,
    /// com filtro opcional de organismo. `None` para entrada vazia.
    pub fn build(
        &self,
        original: &str,
        normalized: &str,
        variants: &[String],
        organism: Option<&str>,
    ) -> Option<Query> {
        let original = original.to_lowercase();
        let normalized = match &self.spell_checker {
            Some(checker) => checker.correct_plurals(normalized),
            None => normalized.to_string(),
        };

        let mut disjuncts = Vec::with_capacity(2 + variants.len());
        disjuncts.extend(Query::disjunctive(&original, fields::ORIGINAL_NAME));
        disjuncts.extend(Query::disjunctive(&normalized, fields::INDEXED_SYN));
        for variant in variants {
            if *variant != original && *variant != normalized {
                disjuncts.extend(Query::disjunctive(variant, fields::VARIANT_NAME));
            }
        }
        if disjuncts.is_empty() {
            return None;
        }

        let mut builder = Query::boolean().must(Query::DisMax {
            disjuncts,
            tie_breaker: 0.0,
        });
        if let Some(tax_id) = organism.map(str::trim).filter(|t| !t.is_empty()) {
            builder = builder.filter(Query::term(fields::TAX_ID, tax_id));
        }
        let query = builder.build();
        debug!(%query, "candidate query built");
        Some(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spelling::DictionarySpellChecker;

    fn variants(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_dismax_over_fields() {
        let q = QueryBuilder::new()
            .build("TNF-alpha", "tnf alpha", &variants(&["tnf alpha", "tnf a"]), None)
            .unwrap();
        let Query::Boolean { must, should, filter } = &q else {
            panic!("expected boolean query");
        };
        assert!(should.is_empty());
        assert!(filter.is_empty());
        let Query::DisMax { disjuncts, tie_breaker } = &must[0] else {
            panic!("expected dismax");
        };
        assert_eq!(*tie_breaker, 0.0);
        // variante igual à forma normalizada não entra
        assert_eq!(disjuncts.len(), 3);
        assert_eq!(
            q.to_string(),
            "+((original_name:tnf-alpha) | (indexed_syn:tnf indexed_syn:alpha) | (variant_name:tnf variant_name:a))~0"
        );
    }

    #[test]
    fn test_organism_filter_is_non_scoring_clause() {
        let q = QueryBuilder::new()
            .build("p53", "p 53", &[], Some("9606"))
            .unwrap();
        let Query::Boolean { filter, .. } = &q else {
            panic!("expected boolean query");
        };
        assert_eq!(filter, &vec![Query::term(fields::TAX_ID, "9606")]);
        assert!(q.to_string().ends_with("#tax_id:9606"));
    }

    #[test]
    fn test_empty_input_yields_no_query() {
        assert!(QueryBuilder::new().build("", "", &[], None).is_none());
        assert!(QueryBuilder::new().build("  ", "", &[], Some("9606")).is_none());
    }

    #[test]
    fn test_spell_checker_corrects_plural_tokens() {
        let checker = DictionarySpellChecker::from_words(["receptor", "tnf"]);
        let q = QueryBuilder::new()
            .with_spell_checker(Arc::new(checker))
            .build("tnf receptors", "tnf receptors", &[], None)
            .unwrap();
        assert!(q.to_string().contains("indexed_syn:receptor)"));
    }

    #[test]
    fn test_query_serde_tagged() {
        let q = Query::prefix(fields::ENTRY_ID, "7157__");
        let json = serde_json::to_string(&q).unwrap();
        assert!(json.contains("\"type\":\"prefix\""));
        assert_eq!(q.to_string(), "entry_id:7157__*");
    }
}
