//! # Filtro de Candidatos: Regras de Diferença entre Nomes
//!
//! A busca aproximada devolve muitos candidatos que compartilham quase todos os
//! tokens com a menção, mas designam outro gene: "IL 2" contra "IL 3",
//! "TNF alpha" contra "TNF beta". O filtro compara o termo buscado com o termo
//! encontrado e descarta o candidato quando a diferença está concentrada em
//! números, letras gregas ou qualificadores genéricos.
//!
//! ## Regras (avaliadas em ordem, a primeira que dispara decide)
//!
//! | # | Regra                                                          |
//! |---|----------------------------------------------------------------|
//! | 1 | diferença simétrica só de números                              |
//! | 2 | diferença simétrica só de letras ou dígitos isolados           |
//! | 3 | diferença simétrica só de letras gregas, modificadores ou termos não descritivos |
//! | 4 | mesmos tokens, exceto um número trocado por outro              |
//! | 5 | mesmos tokens, exceto uma letra grega trocada por outra        |
//! | 6 | um termo tem um número a mais (exceto "1")                     |
//! | 7 | um termo tem uma letra grega a mais (exceto "alpha")           |
//! | 8 | um termo tem um modificador a mais                             |
//!
//! Além das regras, o módulo expõe os predicados usados para limpar um nome
//! antes da busca ([`CandidateFilter::remove_modifiers`]).
//!
//! ```rust
//! use genemap_core::filter::CandidateFilter;
//!
//! let filter = CandidateFilter::new().unwrap();
//! assert!(filter.filter_out("il 2 receptor", "il 2 receptor alpha"));
//! assert!(!filter.filter_out("cd 4", "cd 44 antigen x"));
//! ```

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GeneMappingError, Result};
use crate::normalizer::TermNormalizer;
use crate::resources::{Lexicon, WordList};

/// Palavras que qualificam a função de um gene sem identificá-lo.
pub const MODIFIER: &str = "receptors?|cofactors?|factors?|tranporters?|regulators?|inhibitors?|activators?|suppressors?|enhancers?|repressors?|adaptors?|interactors?|modulators?|mediators?|inducers?|effectors?|coactivators?|supressors?|integrators?|facilitators?|binders?|terminators?|acceptors?|responders?|proactivators?|exchangers?|adapters?|modifiers?|ligands?";

/// Substantivos de categoria ("protein", "gene", "subunit"...).
pub const NON_DESCRIPTIVE: &str = "constructs?|fragments?|antigens?|precursors?|proteins?|genes?|chains?|domains?|kinases?|homologues?|homologs?|isoforms?|isologs?|isotypes?|motifs?|orthologues?|orthologs?|products?|sequences?|subtypes?|subunits?";

/// Sufixos que descrevem um artefato do gene e não o gene em si.
pub const NON_DESC_SUFFIX: &str = "(promoter|onco protein|oncoprotein|proto oncogene|protooncogene|protease|binding site|transcript|element|construct|si rna|prem rna|pre m rna|m rna ?s?|rna|locus|gene product|product|reporter gene|reporter|gene|protein|c dna|molecule|pseudogene|autoantigen|peptide|polypeptide|enzyme)$";

/// Famílias e domínios: um nome terminado assim não designa um gene único.
pub const DOMAIN_FAMILIES: &str = "^.*(acceptors|acid|activators|adapters|adaptors|antibodi|antibody|binders|binding|binding site|binding sites|box|boxe|channel|channels|chromosome|coactivators|cofactors|complex|domain|dyneins|effectors|element|enhancers|epitope|erythrocyte|exchangers|exon|facilitators|factors|familie|family|filament|finger|helicases|histone|histones|homeodomain|inducers|inhibitors|integrators|interactors|intron|kinases|kinesins|lectins|ligands|mediators|member|membrane|modifiers|modulators|motif|myosins|proactivators|proteases|proteasome|proteins|reductases|region|regulators|repeat|repressors|residue|responders|sequence|site|subdomain|subfamily|subunits|superfamily|suppressors|supressors|syndrome|tail|terminal|terminators|terminus|tranporters|transferases|zinc finger)e?s?";

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());
static SINGLE_CHAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[a-z]|[0-9])$").unwrap());
static MODIFIER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^(?:{MODIFIER})$")).unwrap());
static NON_DESCRIPTIVE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^(?:{NON_DESCRIPTIVE})$")).unwrap());
// "1" fica de fora: "IL 1" e "IL" são com frequência o mesmo gene
static RESTRICTED_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[02-9]|[1-9]{2,})$").unwrap());
static NON_DESC_WHOLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^.* {NON_DESC_SUFFIX}")).unwrap());
static NON_DESC_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(NON_DESC_SUFFIX).unwrap());
static DOMAIN_FAMILIES_WHOLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("{DOMAIN_FAMILIES}$")).unwrap());
static DOMAIN_FAMILIES_HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(DOMAIN_FAMILIES).unwrap());
static SINGLE_LETTER_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z]\b").unwrap());

/// Regra que levou ao descarte de um candidato.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterRule {
    OnlyNumbers,
    OnlySingleCharacters,
    OnlySpecialWords,
    DifferentNumber,
    DifferentGreek,
    ExtraNumber,
    ExtraGreek,
    ExtraModifier,
}

impl FilterRule {
    pub fn description(&self) -> &'static str {
        match self {
            FilterRule::OnlyNumbers => "overlap only numbers",
            FilterRule::OnlySingleCharacters => "overlap only single characters or single digits",
            FilterRule::OnlySpecialWords => {
                "overlap consists only of special words (greek, modifiers, non-descriptive)"
            }
            FilterRule::DifferentNumber => "terms differ in one number only",
            FilterRule::DifferentGreek => "terms differ in one greek token only",
            FilterRule::ExtraNumber => "one has a number and the other doesn't (1 is excluded)",
            FilterRule::ExtraGreek => "one has a greek and the other doesn't (alpha is excluded)",
            FilterRule::ExtraModifier => "one has a modifier and the other doesn't",
        }
    }
}

/// Classe de token usada pelas regras de troca e de token extra.
#[derive(Debug, Clone, Copy)]
enum TokenType {
    Number,
    RestrictedNumber,
    Greek,
    GreekExceptAlpha,
    Modifier,
}

/// Filtro de falsos positivos e limpeza de nomes.
///
/// Sem estado mutável após a construção; pode ser usado por várias threads.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    greek_letters: WordList,
    /// Letra grega por inicial ("a" → "alpha"); a primeira da lista vence.
    greek_by_initial: HashMap<char, String>,
    unspecifieds: Option<Regex>,
    premodifiers: Option<Regex>,
}

impl CandidateFilter {
    pub fn new() -> Result<Self> {
        let normalizer = TermNormalizer::new()?;
        Self::with_lexicon(&Lexicon::bundled(), &normalizer)
    }

    /// Monta o filtro a partir do léxico. Os nomes genéricos são normalizados com
    /// o mesmo normalizador das menções, para casar com termos normalizados.
    pub fn with_lexicon(lexicon: &Lexicon, normalizer: &TermNormalizer) -> Result<Self> {
        lexicon.validate()?;

        let mut greek_by_initial = HashMap::new();
        for letter in lexicon.greek_letters.iter() {
            if let Some(initial) = letter.chars().next() {
                greek_by_initial
                    .entry(initial)
                    .or_insert_with(|| letter.to_string());
            }
        }

        let unspecifieds = if lexicon.unspecifieds.is_empty() {
            None
        } else {
            let normalized = WordList::from_words(
                lexicon.unspecifieds.iter().map(|w| normalizer.normalize(w)),
            );
            let pattern = format!("^({})e?s?$", normalized.alternation());
            debug!(%pattern, "unspecified proteins pattern");
            Some(compile(&pattern)?)
        };

        let premodifiers = if lexicon.premodifiers.is_empty() {
            None
        } else {
            let pattern = format!("^({}) ", lexicon.premodifiers.alternation());
            debug!(%pattern, "premodifiers pattern");
            Some(compile(&pattern)?)
        };

        Ok(Self {
            greek_letters: lexicon.greek_letters.clone(),
            greek_by_initial,
            unspecifieds,
            premodifiers,
        })
    }

    /// `true` quando o candidato `found_term` deve ser descartado para `search_term`.
    pub fn filter_out(&self, search_term: &str, found_term: &str) -> bool {
        match self.filter_reason(search_term, found_term) {
            Some(rule) => {
                debug!(
                    search_term,
                    found_term,
                    rule = ?rule,
                    "filtered out because: {}",
                    rule.description()
                );
                true
            }
            None => false,
        }
    }

    /// A primeira regra que dispara para o par, se alguma.
    pub fn filter_reason(&self, search_term: &str, found_term: &str) -> Option<FilterRule> {
        let differing = symmetric_difference(search_term, found_term);
        if !differing.is_empty() {
            if differing.iter().all(|t| NUMBER.is_match(t)) {
                return Some(FilterRule::OnlyNumbers);
            }
            if differing.iter().all(|t| SINGLE_CHAR.is_match(t)) {
                return Some(FilterRule::OnlySingleCharacters);
            }
            if differing.iter().all(|t| self.is_special_word(t)) {
                return Some(FilterRule::OnlySpecialWords);
            }
        }
        if self.only_different_types(search_term, found_term, TokenType::Number) {
            return Some(FilterRule::DifferentNumber);
        }
        if self.only_different_types(search_term, found_term, TokenType::Greek) {
            return Some(FilterRule::DifferentGreek);
        }
        if self.differ_in_type_of_one_term(search_term, found_term, TokenType::RestrictedNumber) {
            return Some(FilterRule::ExtraNumber);
        }
        if self.differ_in_type_of_one_term(search_term, found_term, TokenType::GreekExceptAlpha) {
            return Some(FilterRule::ExtraGreek);
        }
        if self.differ_in_type_of_one_term(search_term, found_term, TokenType::Modifier) {
            return Some(FilterRule::ExtraModifier);
        }
        None
    }

    fn is_special_word(&self, token: &str) -> bool {
        self.greek_letters.contains(token)
            || MODIFIER_TOKEN.is_match(token)
            || NON_DESCRIPTIVE_TOKEN.is_match(token)
    }

    fn is_type(&self, token: &str, kind: TokenType) -> bool {
        match kind {
            TokenType::Number => NUMBER.is_match(token),
            TokenType::RestrictedNumber => RESTRICTED_NUMBER.is_match(token),
            TokenType::Greek => self.greek_letters.contains(token),
            TokenType::GreekExceptAlpha => token != "alpha" && self.greek_letters.contains(token),
            TokenType::Modifier => MODIFIER_TOKEN.is_match(token),
        }
    }

    /// Regras 4 e 5: exatamente um token do tipo em cada termo, diferentes
    /// entre si, com prefixo e sufixo idênticos.
    fn only_different_types(&self, search_term: &str, found_term: &str, kind: TokenType) -> bool {
        let a: Vec<&str> = search_term.split_whitespace().collect();
        let b: Vec<&str> = found_term.split_whitespace().collect();
        let (Some(i), Some(j)) = (self.single_type_position(&a, kind), self.single_type_position(&b, kind))
        else {
            return false;
        };
        a[i] != b[j] && a[..i] == b[..j] && a[i + 1..] == b[j + 1..]
    }

    fn single_type_position(&self, tokens: &[&str], kind: TokenType) -> Option<usize> {
        let mut positions = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| self.is_type(t, kind))
            .map(|(i, _)| i);
        match (positions.next(), positions.next()) {
            (Some(i), None) => Some(i),
            _ => None,
        }
    }

    /// Regras 6 a 8: um conjunto de tokens tem exatamente um elemento a mais
    /// que o outro, e esse elemento é do tipo pedido. Vale nos dois sentidos.
    fn differ_in_type_of_one_term(&self, search_term: &str, found_term: &str, kind: TokenType) -> bool {
        if search_term == found_term {
            return false;
        }
        let a: BTreeSet<&str> = search_term.split_whitespace().collect();
        let b: BTreeSet<&str> = found_term.split_whitespace().collect();
        let diff: Vec<&str> = if a.len() == b.len() + 1 {
            a.difference(&b).copied().collect()
        } else if b.len() == a.len() + 1 {
            b.difference(&a).copied().collect()
        } else {
            return false;
        };
        diff.len() == 1 && self.is_type(diff[0], kind)
    }

    /// Nome genérico como "protein kinase" ou "receptors".
    pub fn is_unspecified(&self, term: &str) -> bool {
        self.unspecifieds.as_ref().map_or(false, |re| re.is_match(term))
    }

    /// Termo terminado em um sufixo não descritivo ("... promoter", "... mrna").
    pub fn is_non_descriptive(&self, term: &str) -> bool {
        NON_DESC_WHOLE.is_match(term)
    }

    /// Nome de família ou domínio ("zinc finger", "... subfamily").
    pub fn is_domain_family(&self, term: &str) -> bool {
        DOMAIN_FAMILIES_WHOLE.is_match(term)
    }

    /// Remove de um nome normalizado o que não identifica o gene: nomes
    /// genéricos, famílias e domínios, premodificadores e sufixos não descritivos.
    /// Pode devolver string vazia quando nada de específico sobra.
    pub fn remove_modifiers(&self, normalized: &str) -> String {
        let mut term = normalized.trim().to_string();

        if let Some(re) = &self.unspecifieds {
            if re.is_match(&term) {
                debug!(term = %term, "unspecified name removed");
                term = re.replacen(&term, 1, "").trim().to_string();
            }
        }
        if DOMAIN_FAMILIES_WHOLE.is_match(&term) {
            debug!(term = %term, "domain or family removed");
            term = DOMAIN_FAMILIES_HEAD.replacen(&term, 1, "").trim().to_string();
        }
        if let Some(re) = &self.premodifiers {
            if re.is_match(&term) {
                debug!(term = %term, "premodifier removed");
                term = re.replacen(&term, 1, "").trim().to_string();
            }
        }
        if NON_DESC_WHOLE.is_match(&term) {
            debug!(term = %term, "non-descriptive suffix removed");
            term = NON_DESC_TAIL.replacen(&term, 1, "").trim().to_string();
        }
        term
    }

    /// Troca letras isoladas pelo nome grego de mesma inicial ("tnf a" → "tnf alpha").
    pub fn expand_greek(&self, text: &str) -> String {
        SINGLE_LETTER_WORD
            .replace_all(text, |caps: &regex::Captures| {
                let letter = &caps[0];
                letter
                    .chars()
                    .next()
                    .and_then(|c| self.greek_by_initial.get(&c))
                    .cloned()
                    .unwrap_or_else(|| letter.to_string())
            })
            .into_owned()
    }
}

/// Menção e sinônimo têm o mesmo multiconjunto de números.
pub fn is_number_compatible(normalized_mention: &str, synonym: &str) -> bool {
    number_tokens(normalized_mention) == number_tokens(synonym)
}

fn number_tokens(term: &str) -> Vec<&str> {
    let mut numbers: Vec<&str> = term
        .split_whitespace()
        .filter(|t| NUMBER.is_match(t))
        .collect();
    numbers.sort_unstable();
    numbers
}

/// Tokens presentes em apenas um dos dois termos, em ordem lexicográfica.
pub fn symmetric_difference<'a>(a: &'a str, b: &'a str) -> BTreeSet<&'a str> {
    let sa: BTreeSet<&str> = a.split_whitespace().collect();
    let sb: BTreeSet<&str> = b.split_whitespace().collect();
    sa.symmetric_difference(&sb).copied().collect()
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| GeneMappingError::Resource(format!("invalid word list pattern: {e}")))
}
