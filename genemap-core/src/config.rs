//! # Configuração do Mapeador
//!
//! [`MappingSettings`] vem de um arquivo opcional (TOML, JSON ou YAML, pela
//! extensão) sobreposto por variáveis de ambiente com prefixo `GENEMAP`:
//!
//! ```text
//! genemap.toml                      ambiente
//! mention_index = "idx/genes"   <-  GENEMAP_MENTION_INDEX=idx/outro
//! exact_scorer_type = 0             GENEMAP_FILTER_TAX_IDS=9606,10090
//! approx_scorer_type = "max_ent"
//! filter_tax_ids = "9606"
//! ```
//!
//! | Chave                | Obrigatória        | Padrão                          |
//! |----------------------|--------------------|---------------------------------|
//! | `mention_index`      | sim                |                                 |
//! | `exact_scorer_type`  | sim                |                                 |
//! | `approx_scorer_type` | sim                |                                 |
//! | `filter_tax_ids`     | para `weeping_tree`|                                 |
//! | `mapping_core`       | não                | `weeping_tree`                  |
//! | `min_context_score`  | não                | 0.0                             |
//! | `filter_candidates`  | não                | `true`                          |
//! | `species_prefixes`   | não                | h → 9606, m → 10090, r → 10116  |
//!
//! Os tipos de scorer aceitam o código numérico (0 simple, 1 token Jaro, 2
//! MaxEnt, 3 Jaro-Winkler, 4 Levenshtein, 10 índice) ou o nome.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::default_species_prefixes;
use crate::error::{GeneMappingError, Result};
use crate::mapping::MappingCoreKind;
use crate::resources::Lexicon;
use crate::scoring::ScorerKind;

pub const ENV_PREFIX: &str = "GENEMAP";

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSettings {
    /// Local do índice léxico de sinônimos.
    pub mention_index: String,
    #[serde(default)]
    pub context_items_index: Option<String>,
    #[serde(default)]
    pub semantic_index: Option<String>,
    /// Dicionário para correção de plurais (desligada no caminho principal).
    #[serde(default)]
    pub spelling_index: Option<PathBuf>,
    pub exact_scorer_type: ScorerKind,
    pub approx_scorer_type: ScorerKind,
    #[serde(default)]
    pub maxent_model: Option<PathBuf>,
    /// Organismos permitidos, separados por vírgula.
    #[serde(default)]
    pub filter_tax_ids: String,
    #[serde(default)]
    pub default_species: Option<String>,
    #[serde(default)]
    pub mapping_core: MappingCoreKind,
    #[serde(default)]
    pub min_context_score: f64,
    #[serde(default = "default_true")]
    pub filter_candidates: bool,
    #[serde(default = "default_species_prefixes")]
    pub species_prefixes: BTreeMap<String, String>,
    /// Diretório com listas de palavras que substituem as embutidas.
    #[serde(default)]
    pub lexicon_dir: Option<PathBuf>,
}

impl MappingSettings {
    pub fn new(mention_index: impl Into<String>, exact: ScorerKind, approx: ScorerKind) -> Self {
        Self {
            mention_index: mention_index.into(),
            context_items_index: None,
            semantic_index: None,
            spelling_index: None,
            exact_scorer_type: exact,
            approx_scorer_type: approx,
            maxent_model: None,
            filter_tax_ids: String::new(),
            default_species: None,
            mapping_core: MappingCoreKind::default(),
            min_context_score: 0.0,
            filter_candidates: true,
            species_prefixes: default_species_prefixes(),
            lexicon_dir: None,
        }
    }

    pub fn with_tax_ids(mut self, tax_ids: &[&str]) -> Self {
        self.filter_tax_ids = tax_ids.join(",");
        self
    }

    /// Arquivo opcional + ambiente `GENEMAP_*`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, ENV_PREFIX)
    }

    pub fn load_from(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        let settings: Self = builder
            .add_source(::config::Environment::with_prefix(env_prefix))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        info!(
            mention_index = %settings.mention_index,
            exact = %settings.exact_scorer_type,
            approx = %settings.approx_scorer_type,
            core = ?settings.mapping_core,
            "settings loaded"
        );
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mention_index.trim().is_empty() {
            return Err(GeneMappingError::Configuration("mention_index is required".into()));
        }
        if self.mapping_core == MappingCoreKind::WeepingTree && self.tax_ids().is_empty() {
            return Err(GeneMappingError::Configuration(
                "filter_tax_ids is required by the weeping tree mapping core".into(),
            ));
        }
        if !self.min_context_score.is_finite() {
            return Err(GeneMappingError::Configuration(format!(
                "min_context_score must be finite, got {}",
                self.min_context_score
            )));
        }
        Ok(())
    }

    /// Organismos permitidos, na ordem configurada.
    pub fn tax_ids(&self) -> Vec<String> {
        self.filter_tax_ids
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Léxico de `lexicon_dir`, ou o embutido.
    pub fn lexicon(&self) -> Result<Lexicon> {
        match &self.lexicon_dir {
            Some(dir) => Lexicon::from_dir(dir),
            None => Ok(Lexicon::bundled()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn toml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml_with_defaults() {
        let file = toml_file(
            r#"
mention_index = "indexes/genes"
exact_scorer_type = 0
approx_scorer_type = "max_ent"
filter_tax_ids = "9606, 10090"
"#,
        );
        let settings = MappingSettings::load_from(Some(file.path()), "GENEMAP_TEST_DEFAULTS").unwrap();
        assert_eq!(settings.mention_index, "indexes/genes");
        assert_eq!(settings.exact_scorer_type, ScorerKind::Simple);
        assert_eq!(settings.approx_scorer_type, ScorerKind::MaxEnt);
        assert_eq!(settings.tax_ids(), vec!["9606", "10090"]);
        assert_eq!(settings.mapping_core, MappingCoreKind::WeepingTree);
        assert_eq!(settings.min_context_score, 0.0);
        assert!(settings.filter_candidates);
        assert_eq!(settings.species_prefixes.get("m").map(String::as_str), Some("10090"));
        assert!(settings.context_items_index.is_none());
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = toml_file(
            r#"
mention_index = "indexes/genes"
exact_scorer_type = "simple"
approx_scorer_type = "token_jaro"
filter_tax_ids = "9606"
"#,
        );
        std::env::set_var("GENEMAP_TEST_OVERRIDE_MENTION_INDEX", "indexes/other");
        let settings = MappingSettings::load_from(Some(file.path()), "GENEMAP_TEST_OVERRIDE").unwrap();
        std::env::remove_var("GENEMAP_TEST_OVERRIDE_MENTION_INDEX");
        assert_eq!(settings.mention_index, "indexes/other");
        assert_eq!(settings.approx_scorer_type, ScorerKind::TokenJaro);
    }

    #[test]
    fn test_missing_required_keys() {
        let file = toml_file("exact_scorer_type = 0\napprox_scorer_type = 0\nfilter_tax_ids = \"9606\"\n");
        let err = MappingSettings::load_from(Some(file.path()), "GENEMAP_TEST_MISSING").unwrap_err();
        assert!(matches!(err, GeneMappingError::Configuration(_)));

        let file = toml_file("mention_index = \"idx\"\nexact_scorer_type = 0\napprox_scorer_type = 0\n");
        let err = MappingSettings::load_from(Some(file.path()), "GENEMAP_TEST_MISSING").unwrap_err();
        assert!(err.to_string().contains("filter_tax_ids"));
    }

    #[test]
    fn test_unknown_scorer_code() {
        let file = toml_file(
            "mention_index = \"idx\"\nexact_scorer_type = 7\napprox_scorer_type = 0\nfilter_tax_ids = \"9606\"\n",
        );
        let err = MappingSettings::load_from(Some(file.path()), "GENEMAP_TEST_SCORER").unwrap_err();
        assert!(matches!(err, GeneMappingError::Configuration(_)));
    }

    #[test]
    fn test_programmatic_settings() {
        let settings = MappingSettings::new("demo", ScorerKind::Simple, ScorerKind::Simple)
            .with_tax_ids(&["9606", " ", "10116"]);
        assert_eq!(settings.tax_ids(), vec!["9606", "10116"]);
        assert!(settings.validate().is_ok());
        assert!(MappingSettings::new("demo", ScorerKind::Simple, ScorerKind::Simple).validate().is_err());
        assert!(settings.lexicon().unwrap().validate().is_ok());
    }
}
