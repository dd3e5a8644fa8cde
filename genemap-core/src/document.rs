//! # Documento Anotado
//!
//! [`GeneDocument`] é a visão do documento que o mapeamento consome. A estrutura
//! (sentenças, chunks, etiquetas morfossintáticas, abreviações e menções de
//! espécies) vem de etapas anteriores da anotação; aqui ela só é consultada.
//!
//! Todos os offsets são de byte no texto completo do documento, que começa pelo
//! título:
//!
//! ```text
//! "p53 in mice\nThe human p53 protein ..."
//!  └─ título ─┘ └─ resumo ─────────────...
//! ```
//!
//! ## Evidência de espécie por menção
//!
//! [`GeneDocument::species_hints`] coleta, para uma menção, os organismos
//! citados ao redor e o nível de cada citação (ver [`SpeciesEvidence`]).

use std::collections::BTreeMap;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::mention::GeneMention;
use crate::species::{SpeciesEvidence, TaxonomyEvidence};

static HYBRID_SYSTEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(one|two|bi|three|tri)(-|\s)hybrid").unwrap());

/// Prefixos de espécie padrão (h: humano, m: camundongo, r: rato).
pub fn default_species_prefixes() -> BTreeMap<String, String> {
    [("h", "9606"), ("m", "10090"), ("r", "10116")]
        .into_iter()
        .map(|(p, t)| (p.to_string(), t.to_string()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    NounPhrase,
    VerbPhrase,
    PrepositionalPhrase,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub offsets: Range<usize>,
    pub kind: ChunkKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosTag {
    pub offsets: Range<usize>,
    pub tag: String,
}

/// Par forma curta / forma longa ("TNF" / "tumor necrosis factor").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abbreviation {
    pub short_form: Range<usize>,
    pub long_form: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesMention {
    pub tax_id: String,
    pub offsets: Range<usize>,
}

impl SpeciesMention {
    pub fn new(tax_id: impl Into<String>, offsets: Range<usize>) -> Self {
        Self {
            tax_id: tax_id.into(),
            offsets,
        }
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

fn within(inner: &Range<usize>, outer: &Range<usize>) -> bool {
    inner.start >= outer.start && inner.end <= outer.end
}

#[derive(Debug, Clone, Default)]
pub struct GeneDocument {
    pub id: String,
    pub title: String,
    /// Título seguido do resumo.
    pub text: String,
    /// Ordenadas por início.
    pub sentences: Vec<Range<usize>>,
    /// Ordenados por início.
    pub chunks: Vec<Chunk>,
    pub pos_tags: Vec<PosTag>,
    pub abbreviations: Vec<Abbreviation>,
    pub title_species: Vec<SpeciesMention>,
    pub text_species: Vec<SpeciesMention>,
    pub mesh_tax_ids: Vec<String>,
    pub default_species: Option<String>,
    pub species_prefixes: BTreeMap<String, String>,
    pub genes: Vec<GeneMention>,
}

impl GeneDocument {
    /// Documento com título e resumo; o texto é `título + "\n" + resumo`.
    pub fn new(id: impl Into<String>, title: impl Into<String>, abstract_text: &str) -> Self {
        let title = title.into();
        let text = format!("{title}\n{abstract_text}");
        Self {
            id: id.into(),
            title,
            text,
            species_prefixes: default_species_prefixes(),
            ..Self::default()
        }
    }

    pub fn with_sentences(mut self, mut sentences: Vec<Range<usize>>) -> Self {
        sentences.sort_by_key(|s| s.start);
        self.sentences = sentences;
        self
    }

    pub fn with_chunks(mut self, mut chunks: Vec<Chunk>) -> Self {
        chunks.sort_by_key(|c| c.offsets.start);
        self.chunks = chunks;
        self
    }

    /// Espécies do título e do resumo. Deve vir depois dos chunks: menções
    /// dentro de "two-hybrid" e afins são descartadas.
    pub fn with_species(mut self, title: Vec<SpeciesMention>, text: Vec<SpeciesMention>) -> Self {
        if self.chunks.is_empty() {
            warn!(doc = %self.id, "species set before chunks; hybrid system mentions are not filtered");
        }
        self.title_species = self.without_hybrid_systems(title);
        self.text_species = self.without_hybrid_systems(text);
        self
    }

    /// Acrescenta uma menção e devolve seu índice.
    pub fn add_gene(&mut self, mut mention: GeneMention) -> usize {
        mention.doc_id = Some(self.id.clone());
        self.genes.push(mention);
        self.genes.len() - 1
    }

    /// Menção a partir de offsets no texto. `None` se os offsets forem inválidos.
    pub fn add_gene_at(&mut self, offsets: Range<usize>) -> Option<usize> {
        let text = self.covered_text(&offsets)?.to_string();
        Some(self.add_gene(GeneMention::new(text).with_offsets(offsets.start, offsets.end)))
    }

    pub fn covered_text(&self, offsets: &Range<usize>) -> Option<&str> {
        self.text.get(offsets.clone())
    }

    /// Sentença que contém o início do trecho.
    pub fn sentence_of(&self, offsets: &Range<usize>) -> Option<Range<usize>> {
        self.sentences
            .iter()
            .find(|s| s.start <= offsets.start && offsets.start < s.end)
            .cloned()
    }

    pub fn previous_sentence(&self, sentence: &Range<usize>) -> Option<Range<usize>> {
        self.sentences
            .iter()
            .filter(|s| s.end <= sentence.start)
            .last()
            .cloned()
    }

    /// Primeira sentença depois do título.
    pub fn first_abstract_sentence(&self) -> Option<Range<usize>> {
        let title_end = self.title.len();
        self.sentences
            .iter()
            .find(|s| s.start > 0 && s.start >= title_end)
            .cloned()
    }

    pub fn overlapping_chunks(&self, offsets: &Range<usize>) -> impl Iterator<Item = &Chunk> + '_ {
        let offsets = offsets.clone();
        self.chunks.iter().filter(move |c| overlaps(&c.offsets, &offsets))
    }

    pub fn overlapping_pos_tags(&self, offsets: &Range<usize>) -> impl Iterator<Item = &PosTag> + '_ {
        let offsets = offsets.clone();
        self.pos_tags.iter().filter(move |p| overlaps(&p.offsets, &offsets))
    }

    /// Forma longa da abreviação cuja forma curta cobre o trecho.
    pub fn long_form_of(&self, offsets: &Range<usize>) -> Option<&str> {
        self.abbreviations
            .iter()
            .find(|a| overlaps(&a.short_form, offsets))
            .and_then(|a| self.covered_text(&a.long_form))
    }

    fn without_hybrid_systems(&self, species: Vec<SpeciesMention>) -> Vec<SpeciesMention> {
        species
            .into_iter()
            .filter(|s| {
                let context = self
                    .overlapping_chunks(&s.offsets)
                    .filter_map(|c| self.covered_text(&c.offsets))
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                let hybrid = HYBRID_SYSTEM.is_match(&context);
                if hybrid {
                    debug!(doc = %self.id, tax_id = %s.tax_id, "species mention in hybrid system removed");
                }
                !hybrid
            })
            .collect()
    }

    /// Evidências de espécie para uma menção, nível a nível.
    pub fn species_hints(&self, mention: &GeneMention) -> TaxonomyEvidence {
        let mut evidence = TaxonomyEvidence::new();

        if let Some(gene) = &mention.offsets {
            if let Some(sentence) = self.sentence_of(gene) {
                self.species_in_noun_phrase(gene, &sentence, &mut evidence);
                if let Some(previous) = self.previous_sentence(&sentence) {
                    for s in self.text_species.iter().filter(|s| within(&s.offsets, &previous)) {
                        evidence.insert_if_absent(&s.tax_id, SpeciesEvidence::PreviousSentence);
                    }
                }
            }
        }

        for s in &self.title_species {
            evidence.insert(s.tax_id.clone(), SpeciesEvidence::Title);
        }
        if let Some(first) = self.first_abstract_sentence() {
            for s in self.text_species.iter().filter(|s| within(&s.offsets, &first)) {
                evidence.insert(s.tax_id.clone(), SpeciesEvidence::FirstSentence);
            }
        }
        for s in &self.text_species {
            evidence.insert(s.tax_id.clone(), SpeciesEvidence::Anywhere);
        }
        for tax_id in &self.mesh_tax_ids {
            evidence.insert(tax_id.clone(), SpeciesEvidence::Mesh);
        }
        if let Some(tax_id) = self.prefix_species(mention.text()) {
            evidence.insert(tax_id.to_string(), SpeciesEvidence::Prefix);
        }

        if evidence.is_empty() {
            if let Some(default) = self.default_species.as_deref().filter(|d| !d.trim().is_empty()) {
                evidence.insert(default, SpeciesEvidence::Default);
            }
        }
        evidence
    }

    /// Calcula as evidências de todas as menções.
    pub fn assign_species_hints(&mut self) {
        let hints: Vec<TaxonomyEvidence> = self.genes.iter().map(|g| self.species_hints(g)).collect();
        for (gene, evidence) in self.genes.iter_mut().zip(hints) {
            gene.taxonomy_candidates = evidence;
        }
    }

    fn species_in_noun_phrase(
        &self,
        gene: &Range<usize>,
        sentence: &Range<usize>,
        evidence: &mut TaxonomyEvidence,
    ) {
        let sentence_species: Vec<&SpeciesMention> = self
            .text_species
            .iter()
            .filter(|s| within(&s.offsets, sentence))
            .collect();
        if sentence_species.is_empty() {
            return;
        }

        // dentro da própria menção ("human-p53") ou do mesmo chunk
        for s in sentence_species.iter().filter(|s| within(&s.offsets, gene)) {
            evidence.insert(s.tax_id.clone(), SpeciesEvidence::Compound);
        }
        let sentence_chunks: Vec<&Chunk> = self
            .chunks
            .iter()
            .filter(|c| within(&c.offsets, sentence))
            .collect();
        let enclosing = sentence_chunks
            .iter()
            .rposition(|c| c.offsets.start <= gene.start);
        if let Some(i) = enclosing.filter(|&i| overlaps(&sentence_chunks[i].offsets, gene)) {
            let chunk = &sentence_chunks[i].offsets;
            for s in sentence_species.iter().filter(|s| within(&s.offsets, chunk)) {
                evidence.insert(s.tax_id.clone(), SpeciesEvidence::Compound);
            }
        }

        // sequência de chunks nominais que termina na menção
        if let Some(mut i) = enclosing {
            let mut phrase_start = None;
            while sentence_chunks[i].kind == ChunkKind::NounPhrase {
                phrase_start = Some(sentence_chunks[i].offsets.start);
                if i == 0 {
                    break;
                }
                i -= 1;
            }
            if let Some(start) = phrase_start {
                for s in sentence_species
                    .iter()
                    .filter(|s| s.offsets.start >= start && s.offsets.end <= gene.end)
                {
                    evidence.insert_if_absent(&s.tax_id, SpeciesEvidence::Phrase);
                }
            }
        }

        let preceding: Vec<&&SpeciesMention> = sentence_species
            .iter()
            .filter(|s| s.offsets.start < gene.start)
            .collect();
        if preceding.is_empty() {
            for s in &sentence_species {
                evidence.insert_if_absent(&s.tax_id, SpeciesEvidence::Sentence);
            }
        } else {
            for s in preceding {
                evidence.insert_if_absent(&s.tax_id, SpeciesEvidence::Sentence);
            }
        }
    }

    /// "hTERT": prefixo conhecido, mais de dois caracteres, segunda letra maiúscula.
    fn prefix_species(&self, text: &str) -> Option<&str> {
        let mut chars = text.chars();
        let first = chars.next()?;
        let second = chars.next()?;
        if text.chars().count() <= 2 || !second.is_uppercase() {
            return None;
        }
        self.species_prefixes
            .get(first.to_string().as_str())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// "Trp53 in mice\nHuman p53 binds DNA. In rat liver, mouse Trp53 is induced."
    fn document() -> GeneDocument {
        let title = "Trp53 in mice";
        let abstract_text = "Human p53 binds DNA. In rat liver, mouse Trp53 is induced.";
        let doc = GeneDocument::new("PMID1", title, abstract_text);
        let t = title.len() + 1;
        let text = doc.text.clone();
        let at = |needle: &str, from: usize| -> Range<usize> {
            let start = text[from..].find(needle).unwrap() + from;
            start..start + needle.len()
        };
        let mut doc = doc
            .with_sentences(vec![0..title.len(), t..t + 20, t + 21..text.len()])
            .with_chunks(vec![
                Chunk { offsets: at("Human p53", t), kind: ChunkKind::NounPhrase },
                Chunk { offsets: at("binds", t), kind: ChunkKind::VerbPhrase },
                Chunk { offsets: at("DNA", t), kind: ChunkKind::NounPhrase },
                Chunk { offsets: at("In", t), kind: ChunkKind::PrepositionalPhrase },
                Chunk { offsets: at("rat liver", t), kind: ChunkKind::NounPhrase },
                Chunk { offsets: at("mouse Trp53", t), kind: ChunkKind::NounPhrase },
            ]);
        let title_species = vec![SpeciesMention::new("10090", at("mice", 0))];
        let text_species = vec![
            SpeciesMention::new("9606", at("Human", t)),
            SpeciesMention::new("10116", at("rat", t)),
            SpeciesMention::new("10090", at("mouse", t)),
        ];
        doc = doc.with_species(title_species, text_species);
        let p53 = at("p53", t);
        doc.add_gene_at(p53);
        let trp53 = at("Trp53", t);
        doc.add_gene_at(trp53);
        doc
    }

    #[test]
    fn test_compound_evidence() {
        let doc = document();
        let hints = doc.species_hints(&doc.genes[0]);
        assert_eq!(hints.best_tier_of("9606"), Some(SpeciesEvidence::Compound));
        let (tier, organisms) = hints.best_tier().unwrap();
        assert_eq!(tier, SpeciesEvidence::Compound);
        assert_eq!(organisms, vec!["9606"]);
        assert_eq!(hints.best_tier_of("10090"), Some(SpeciesEvidence::Title));
        assert_eq!(hints.best_tier_of("10116"), Some(SpeciesEvidence::Anywhere));
    }

    #[test]
    fn test_phrase_and_previous_sentence_evidence() {
        let doc = document();
        let hints = doc.species_hints(&doc.genes[1]);
        assert_eq!(hints.best_tier_of("10090"), Some(SpeciesEvidence::Compound));
        // "rat liver, mouse Trp53": chunks nominais contíguos
        assert_eq!(hints.best_tier_of("10116"), Some(SpeciesEvidence::Phrase));
        // "Human" só aparece na sentença anterior (que também é a primeira do resumo)
        let human = hints.evidence_of("9606").unwrap();
        assert!(human.contains(&SpeciesEvidence::PreviousSentence));
        assert!(human.contains(&SpeciesEvidence::FirstSentence));
    }

    #[test]
    fn test_prefix_mesh_and_default() {
        let mut doc = GeneDocument::new("PMID2", "", "hTERT is active.");
        doc.default_species = Some("9606".into());
        let hints = doc.species_hints(&GeneMention::new("hTERT"));
        assert_eq!(hints.best_tier_of("9606"), Some(SpeciesEvidence::Prefix));

        let hints = doc.species_hints(&GeneMention::new("TERT"));
        assert_eq!(hints.best_tier_of("9606"), Some(SpeciesEvidence::Default));

        doc.mesh_tax_ids = vec!["10090".into()];
        let hints = doc.species_hints(&GeneMention::new("TERT"));
        assert_eq!(hints.best_tier_of("10090"), Some(SpeciesEvidence::Mesh));
        assert!(!hints.contains("9606"));
    }

    #[test]
    fn test_hybrid_system_species_are_removed() {
        let doc = GeneDocument::new("PMID3", "", "A yeast two-hybrid screen found p53.");
        let text = doc.text.clone();
        let start = text.find("yeast").unwrap();
        let doc = doc
            .with_chunks(vec![Chunk {
                offsets: start..start + "yeast two-hybrid screen".len(),
                kind: ChunkKind::NounPhrase,
            }])
            .with_species(Vec::new(), vec![SpeciesMention::new("4932", start..start + 5)]);
        assert!(doc.text_species.is_empty());
    }

    #[test]
    fn test_document_lookups() {
        let mut doc = document();
        let t = doc.title.len() + 1;
        assert_eq!(doc.first_abstract_sentence(), Some(t..t + 20));
        assert_eq!(doc.genes[0].text(), "p53");
        assert_eq!(doc.genes[0].doc_id.as_deref(), Some("PMID1"));
        assert!(doc.add_gene_at(1000..1003).is_none());

        let long = doc.text.find("Human").unwrap();
        doc.abbreviations.push(Abbreviation {
            short_form: doc.genes[0].offsets.clone().unwrap(),
            long_form: long..long + 9,
        });
        let offsets = doc.genes[0].offsets.clone().unwrap();
        assert_eq!(doc.long_form_of(&offsets), Some("Human p53"));

        doc.pos_tags.push(PosTag { offsets: offsets.clone(), tag: "NN".into() });
        assert_eq!(doc.overlapping_pos_tags(&(0..offsets.end)).count(), 1);

        doc.assign_species_hints();
        assert!(doc.genes.iter().all(|g| !g.taxonomy_candidates.is_empty()));
    }
}
