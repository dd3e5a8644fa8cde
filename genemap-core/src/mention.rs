//! # Menções de Genes
//!
//! [`GeneMention`] é um trecho de texto que supostamente nomeia um gene ou
//! proteína. Ele carrega um [`GeneName`], que calcula sob demanda (e guarda) a
//! forma normalizada e as variantes do texto.
//!
//! Menções podem nascer da divisão de uma menção maior ("IL-2 and -4" →
//! "IL-2", "IL-4"); nesse caso `parent` aponta para a original. Quando o texto
//! é trocado com [`GeneMention::set_text`], a normalização guardada é descartada.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::normalizer::TermNormalizer;
use crate::result::MentionMappingResult;
use crate::species::TaxonomyEvidence;

/// Texto de um nome com normalização preguiçosa.
#[derive(Debug, Clone, Default)]
pub struct GeneName {
    text: String,
    normalized: OnceCell<String>,
    variants: OnceCell<Vec<String>>,
}

impl GeneName {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Forma normalizada, calculada na primeira chamada.
    pub fn normalized(&self, normalizer: &TermNormalizer) -> &str {
        self.normalized.get_or_init(|| normalizer.normalize(&self.text))
    }

    /// Variantes normalizadas, calculadas na primeira chamada.
    pub fn variants(&self, normalizer: &TermNormalizer) -> &[String] {
        self.variants.get_or_init(|| normalizer.variants(&self.text))
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized.get().is_some()
    }
}

impl PartialEq for GeneName {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for GeneName {}

/// Origem da menção.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneTagger {
    Gold,
    Dictionary,
    Statistical,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneMention {
    name: GeneName,
    /// Offsets de byte no texto do documento.
    pub offsets: Option<Range<usize>>,
    pub parent: Option<Box<GeneMention>>,
    pub tagger: GeneTagger,
    pub doc_id: Option<String>,
    pub taxonomy_candidates: TaxonomyEvidence,
    pub taxonomy_scores: BTreeMap<String, f64>,
    pub gold_tax_id: Option<String>,
    pub mapping_result: Option<MentionMappingResult>,
}

impl GeneMention {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            name: GeneName::new(text),
            offsets: None,
            parent: None,
            tagger: GeneTagger::Unknown,
            doc_id: None,
            taxonomy_candidates: TaxonomyEvidence::new(),
            taxonomy_scores: BTreeMap::new(),
            gold_tax_id: None,
            mapping_result: None,
        }
    }

    pub fn with_offsets(mut self, start: usize, end: usize) -> Self {
        self.offsets = Some(start..end);
        self
    }

    pub fn with_tagger(mut self, tagger: GeneTagger) -> Self {
        self.tagger = tagger;
        self
    }

    /// Menção derivada desta, com outro texto e outros offsets.
    pub fn split_child(&self, text: impl Into<String>, offsets: Option<Range<usize>>) -> Self {
        let mut child = GeneMention::new(text);
        child.offsets = offsets;
        child.tagger = self.tagger;
        child.doc_id = self.doc_id.clone();
        child.parent = Some(Box::new(self.clone()));
        child
    }

    pub fn text(&self) -> &str {
        self.name.text()
    }

    /// Troca o texto e descarta a normalização calculada.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.name = GeneName::new(text);
    }

    pub fn name(&self) -> &GeneName {
        &self.name
    }

    pub fn normalized(&self, normalizer: &TermNormalizer) -> &str {
        self.name.normalized(normalizer)
    }

    pub fn variants(&self, normalizer: &TermNormalizer) -> &[String] {
        self.name.variants(normalizer)
    }

    pub fn taxonomy_score(&self, tax_id: &str) -> f64 {
        self.taxonomy_scores.get(tax_id).copied().unwrap_or(0.0)
    }

    pub fn set_taxonomy_score(&mut self, tax_id: impl Into<String>, score: f64) {
        self.taxonomy_scores.insert(tax_id.into(), score);
    }
}

impl fmt::Display for GeneMention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())?;
        if let Some(offsets) = &self.offsets {
            write!(f, " [{}..{}]", offsets.start, offsets.end)?;
        }
        if let Some(doc_id) = &self.doc_id {
            write!(f, " ({doc_id})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_normalization() {
        let normalizer = TermNormalizer::new().unwrap();
        let mention = GeneMention::new("IL2R");
        assert!(!mention.name().is_normalized());
        assert_eq!(mention.normalized(&normalizer), "il 2 r");
        assert!(mention.name().is_normalized());
    }

    #[test]
    fn test_set_text_invalidates_normalization() {
        let normalizer = TermNormalizer::new().unwrap();
        let mut mention = GeneMention::new("IL2R");
        let _ = mention.normalized(&normalizer);
        mention.set_text("TNF-alpha");
        assert!(!mention.name().is_normalized());
        assert_eq!(mention.normalized(&normalizer), "tnf alpha");
    }

    #[test]
    fn test_split_child_keeps_parent() {
        let mut parent = GeneMention::new("IL-2 and -4").with_offsets(10, 21);
        parent.doc_id = Some("PMID1".into());
        let child = parent.split_child("IL-4", None);
        assert_eq!(child.parent.as_deref().map(GeneMention::text), Some("IL-2 and -4"));
        assert_eq!(child.doc_id.as_deref(), Some("PMID1"));
        assert_eq!(child.to_string(), "IL-4 (PMID1)");
    }

    #[test]
    fn test_taxonomy_scores_default_to_zero() {
        let mut mention = GeneMention::new("p53");
        assert_eq!(mention.taxonomy_score("9606"), 0.0);
        mention.set_taxonomy_score("9606", 3.0);
        assert_eq!(mention.taxonomy_score("9606"), 3.0);
    }
}
