//! # Dicionário e Documentos de Demonstração
//!
//! Um pequeno dicionário de sinônimos de genes (humano, camundongo e rato),
//! textos de contexto por gene e resumos anotados. Serve para demonstração e
//! para os testes de ponta a ponta, sem depender de índices externos.
//!
//! ## Do dicionário ao índice
//!
//! Cada sinônimo é normalizado e as entradas com a mesma forma normalizada viram
//! **um** documento do índice léxico, com os genes alinhados por posição:
//!
//! ```text
//! "TP53" (7157, humano) ─┐
//!                        ├─▶ indexed_syn = "tp 53"
//! "Tp53" (24842, rato) ──┘   entry_id    = ["7157__-1", "24842__-1"]
//!                            tax_id      = ["9606", "10116"]
//! ```
//!
//! ## Índice de contexto
//!
//! Cada gene tem um resumo, frases GeneRIF e interações. O campo `context`
//! guarda os tokens de contexto (radicais, sem stopwords) de todos os textos; o
//! campo `generif` guarda as frases GeneRIF já normalizadas, para que a busca
//! por frase do sinônimo normalizado funcione.

use std::collections::BTreeMap;
use std::ops::Range;

use tracing::{debug, warn};

use crate::document::{Chunk, ChunkKind, GeneDocument, SpeciesMention};
use crate::error::IndexError;
use crate::index::{SearchIndex, StoredDocument, TantivyIndex};
use crate::normalizer::TermNormalizer;
use crate::query::{context_fields, fields, NAME_PRIO_DELIMITER};
use crate::resources::WordList;
use crate::tokenizer::context_tokens;

pub const HUMAN: &str = "9606";
pub const MOUSE: &str = "10090";
pub const RAT: &str = "10116";

/// Um sinônimo e os genes que o usam: `(id, prioridade, organismo)`.
///
/// Prioridade -1 é o símbolo oficial; quanto maior, menos confiável a fonte.
pub struct DictionaryEntry {
    pub synonym: &'static str,
    pub genes: &'static [(&'static str, i32, &'static str)],
}

/// Dicionário de demonstração.
pub fn dictionary() -> Vec<DictionaryEntry> {
    vec![
        // ===== p53 =====
        DictionaryEntry { synonym: "TP53", genes: &[("7157", -1, HUMAN)] },
        DictionaryEntry { synonym: "Trp53", genes: &[("22059", -1, MOUSE)] },
        DictionaryEntry { synonym: "Tp53", genes: &[("24842", -1, RAT)] },
        DictionaryEntry {
            synonym: "p53",
            genes: &[("7157", 2, HUMAN), ("22059", 2, MOUSE), ("24842", 2, RAT)],
        },
        DictionaryEntry {
            synonym: "tumor protein p53",
            genes: &[("7157", 1, HUMAN), ("24842", 1, RAT)],
        },
        DictionaryEntry {
            synonym: "transformation related protein 53",
            genes: &[("22059", 1, MOUSE)],
        },
        // ===== BRCA1 =====
        DictionaryEntry { synonym: "BRCA1", genes: &[("672", -1, HUMAN)] },
        DictionaryEntry { synonym: "Brca1", genes: &[("12189", -1, MOUSE)] },
        // ===== Interleucinas =====
        DictionaryEntry { synonym: "IL2", genes: &[("3558", -1, HUMAN)] },
        DictionaryEntry { synonym: "Il2", genes: &[("16183", -1, MOUSE)] },
        DictionaryEntry {
            synonym: "interleukin 2",
            genes: &[("3558", 1, HUMAN), ("16183", 1, MOUSE)],
        },
        DictionaryEntry { synonym: "IL4", genes: &[("3565", -1, HUMAN)] },
        DictionaryEntry { synonym: "IL2RA", genes: &[("3559", -1, HUMAN)] },
        DictionaryEntry { synonym: "IL-2 receptor alpha", genes: &[("3559", 2, HUMAN)] },
        DictionaryEntry {
            synonym: "p40",
            genes: &[("4689", 3, HUMAN), ("3593", 3, HUMAN)],
        },
        // ===== Marcadores de superfície =====
        DictionaryEntry { synonym: "CD4", genes: &[("920", -1, HUMAN)] },
        DictionaryEntry { synonym: "Cd4", genes: &[("12504", -1, MOUSE)] },
        DictionaryEntry { synonym: "CD44", genes: &[("960", -1, HUMAN)] },
        // ===== TNF =====
        DictionaryEntry { synonym: "TNF", genes: &[("7124", -1, HUMAN)] },
        DictionaryEntry { synonym: "Tnf", genes: &[("21926", -1, MOUSE)] },
        DictionaryEntry {
            synonym: "TNF-alpha",
            genes: &[("7124", 2, HUMAN), ("21926", 2, MOUSE)],
        },
        // ===== Proteína quinase C =====
        DictionaryEntry { synonym: "PRKCA", genes: &[("5578", -1, HUMAN)] },
        DictionaryEntry { synonym: "PKC alpha", genes: &[("5578", 2, HUMAN)] },
        DictionaryEntry { synonym: "PKC beta", genes: &[("5579", 2, HUMAN)] },
    ]
}

/// Agrupa o dicionário por forma normalizada, um documento por forma.
pub fn synonym_documents(normalizer: &TermNormalizer) -> Vec<StoredDocument> {
    let mut grouped: BTreeMap<String, Vec<(&DictionaryEntry, usize)>> = BTreeMap::new();
    let entries = dictionary();
    for entry in &entries {
        let group = grouped.entry(normalizer.normalize(entry.synonym)).or_default();
        group.extend((0..entry.genes.len()).map(|i| (entry, i)));
    }

    grouped
        .into_iter()
        .map(|(normalized, genes)| {
            let mut doc = StoredDocument::new()
                .with(fields::INDEXED_SYN, normalized.as_str())
                .with(fields::STEMMED_NORMALIZED_NAME, normalizer.stem(&normalized))
                .with(fields::FILTERED, "0");
            let mut originals: Vec<String> = Vec::new();
            for (entry, i) in genes {
                let (id, priority, tax_id) = entry.genes[i];
                doc.add(fields::ENTRY_ID, format!("{id}{NAME_PRIO_DELIMITER}{priority}"));
                doc.add(fields::TAX_ID, tax_id);
                doc.add(fields::PRIORITY, priority.to_string());
                let original = entry.synonym.to_lowercase();
                if !originals.contains(&original) {
                    for variant in normalizer.variants(entry.synonym) {
                        if variant != normalized && !doc.get_all(fields::VARIANT_NAME).contains(&variant) {
                            doc.add(fields::VARIANT_NAME, variant);
                        }
                    }
                    originals.push(original);
                }
            }
            for original in originals {
                doc.add(fields::ORIGINAL_NAME, original);
            }
            doc
        })
        .collect()
}

/// Índice léxico com o dicionário de demonstração.
pub fn demo_mention_index(normalizer: &TermNormalizer) -> Result<TantivyIndex, IndexError> {
    let index = TantivyIndex::from_documents(synonym_documents(normalizer))?;
    debug!(docs = index.num_docs(), "demo mention index built");
    Ok(index)
}

/// Textos de contexto de um gene.
pub struct ContextEntry {
    pub id: &'static str,
    pub summary: &'static str,
    pub generifs: &'static [&'static str],
    pub interactions: &'static [&'static str],
}

pub fn context_entries() -> Vec<ContextEntry> {
    vec![
        ContextEntry {
            id: "7157",
            summary: "This gene encodes a tumor suppressor protein that responds to DNA damage and induces cell cycle arrest or apoptosis.",
            generifs: &[
                "Somatic TP53 mutations are frequent in human breast tumors.",
                "p53 cooperates with BRCA1 in DNA repair.",
            ],
            interactions: &["MDM2 binds p53 and promotes its degradation."],
        },
        ContextEntry {
            id: "22059",
            summary: "Transcription factor that regulates apoptosis and senescence in mouse cells after genotoxic stress.",
            generifs: &["Trp53 deficient mice develop lymphomas."],
            interactions: &[],
        },
        ContextEntry {
            id: "3593",
            summary: "Subunit beta of interleukin 12, a cytokine that acts on T cells and natural killer cells.",
            generifs: &["The p40 homodimer inhibits IL-12 signaling in T cells."],
            interactions: &["IL12B associates with IL12A to form interleukin 12."],
        },
        ContextEntry {
            id: "4689",
            summary: "Cytosolic regulatory component of the superoxide producing phagocyte NADPH oxidase.",
            generifs: &["NCF4 regulates superoxide production in neutrophils."],
            interactions: &["NCF4 binds NCF2 in resting neutrophils."],
        },
        ContextEntry {
            id: "3558",
            summary: "Secreted cytokine important for the proliferation of T and B lymphocytes.",
            generifs: &["IL2 stimulates T cell growth."],
            interactions: &[],
        },
        ContextEntry {
            id: "16183",
            summary: "Cytokine produced by activated mouse T cells that drives clonal expansion.",
            generifs: &["Il2 deficient mice develop autoimmunity."],
            interactions: &[],
        },
    ]
}

/// Índice de contexto de demonstração.
///
/// `context_stopwords` deve ser a mesma lista usada para os tokens de contexto
/// das consultas.
pub fn demo_context_index(
    normalizer: &TermNormalizer,
    context_stopwords: &WordList,
) -> Result<TantivyIndex, IndexError> {
    let documents = context_entries().into_iter().map(|entry| {
        let mut doc = StoredDocument::new()
            .with(context_fields::ID, entry.id)
            .with(context_fields::SUMMARY, entry.summary);
        let mut texts = vec![entry.summary];
        for generif in entry.generifs {
            doc.add(context_fields::GENERIF, normalizer.normalize(generif));
            texts.push(generif);
        }
        for interaction in entry.interactions {
            doc.add(context_fields::INTERACTION, *interaction);
            texts.push(interaction);
        }
        let tokens = context_tokens(&texts.join(" "), context_stopwords);
        doc.with(context_fields::CONTEXT, tokens.join(" "))
    });
    TantivyIndex::from_documents(documents)
}

/// Resumo anotado: anotações são trechos procurados em ordem no texto.
pub struct DemoDocument {
    pub id: &'static str,
    pub title: &'static str,
    pub abstract_text: &'static str,
    pub chunks: &'static [(&'static str, ChunkKind)],
    pub title_species: &'static [(&'static str, &'static str)],
    pub text_species: &'static [(&'static str, &'static str)],
    pub genes: &'static [&'static str],
}

pub fn demo_texts() -> Vec<DemoDocument> {
    use ChunkKind::*;
    vec![
        DemoDocument {
            id: "demo-1",
            title: "TP53 and BRCA1 in human breast cancer",
            abstract_text: "Somatic mutations of TP53 are frequent in tumors. The p53 protein cooperates with BRCA1 in DNA repair.",
            chunks: &[
                ("Somatic mutations", NounPhrase),
                ("of", PrepositionalPhrase),
                ("TP53", NounPhrase),
                ("are", VerbPhrase),
                ("The p53 protein", NounPhrase),
                ("cooperates", VerbPhrase),
                ("with", PrepositionalPhrase),
                ("BRCA1", NounPhrase),
            ],
            title_species: &[("human", HUMAN)],
            text_species: &[],
            genes: &["TP53", "p53", "BRCA1"],
        },
        DemoDocument {
            id: "demo-2",
            title: "Cytokine signaling in mouse T cells",
            abstract_text: "Mouse IL2 stimulates T cell growth. In rat macrophages, TNF-alpha release was weaker.",
            chunks: &[
                ("Mouse IL2", NounPhrase),
                ("stimulates", VerbPhrase),
                ("T cell growth", NounPhrase),
                ("In", PrepositionalPhrase),
                ("rat macrophages", NounPhrase),
                ("TNF-alpha release", NounPhrase),
                ("was", VerbPhrase),
            ],
            title_species: &[("mouse", MOUSE)],
            text_species: &[("Mouse", MOUSE), ("rat", RAT)],
            genes: &["IL2", "TNF-alpha"],
        },
        DemoDocument {
            id: "demo-3",
            title: "Interleukin 12 subunit homodimers in human T cells",
            abstract_text: "The p40 homodimer inhibits IL-12 signaling in T cells.",
            chunks: &[("The p40 homodimer", NounPhrase), ("inhibits", VerbPhrase)],
            title_species: &[("human", HUMAN)],
            text_species: &[],
            genes: &["p40"],
        },
    ]
}

/// Documentos de demonstração já com sentenças, chunks, espécies e menções.
pub fn demo_documents() -> Vec<GeneDocument> {
    demo_texts().iter().map(build_document).collect()
}

fn build_document(demo: &DemoDocument) -> GeneDocument {
    let doc = GeneDocument::new(demo.id, demo.title, demo.abstract_text);
    let abstract_start = demo.title.len() + 1;
    let text = doc.text.clone();

    let chunk_texts: Vec<&str> = demo.chunks.iter().map(|(t, _)| *t).collect();
    let chunks = locate(&text, abstract_start, &chunk_texts)
        .into_iter()
        .zip(demo.chunks)
        .map(|(offsets, (_, kind))| Chunk { offsets, kind: *kind })
        .collect();
    let species = |from: usize, annotations: &[(&str, &str)]| -> Vec<SpeciesMention> {
        let needles: Vec<&str> = annotations.iter().map(|(t, _)| *t).collect();
        locate(&text, from, &needles)
            .into_iter()
            .zip(annotations)
            .map(|(offsets, (_, tax_id))| SpeciesMention::new(*tax_id, offsets))
            .collect()
    };
    let title_species = species(0, demo.title_species);
    let text_species = species(abstract_start, demo.text_species);

    let mut doc = doc
        .with_sentences(sentence_ranges(demo.title, demo.abstract_text))
        .with_chunks(chunks)
        .with_species(title_species, text_species);
    for offsets in locate(&text, 0, demo.genes) {
        doc.add_gene_at(offsets);
    }
    doc
}

/// Título como uma sentença; o resumo é dividido em ". ".
fn sentence_ranges(title: &str, abstract_text: &str) -> Vec<Range<usize>> {
    let offset = title.len() + 1;
    let mut sentences = vec![0..title.len()];
    let mut start = 0;
    for (i, _) in abstract_text.match_indices(". ") {
        sentences.push(offset + start..offset + i + 1);
        start = i + 2;
    }
    if start < abstract_text.len() {
        sentences.push(offset + start..offset + abstract_text.len());
    }
    sentences
}

/// Procura os trechos em ordem, cada um depois do anterior.
///
/// Trechos não encontrados são descartados; o resultado pode ser mais curto
/// que `needles`, e nesse caso o pareamento posicional com as anotações deixa
/// de valer para os seguintes.
fn locate(text: &str, from: usize, needles: &[&str]) -> Vec<Range<usize>> {
    let mut cursor = from;
    let mut found = Vec::with_capacity(needles.len());
    for needle in needles {
        match text.get(cursor..).and_then(|rest| rest.find(needle)) {
            Some(i) => {
                let start = cursor + i;
                found.push(start..start + needle.len());
                cursor = start + needle.len();
            }
            None => warn!(needle, "demo annotation not found in text"),
        }
    }
    found
}
