//! # Erros do Mapeamento de Genes
//!
//! Taxonomia de falhas do crate:
//!
//! - **Configuração** ([`GeneMappingError::Configuration`]): propriedade obrigatória ausente ou
//!   inválida. Fatal na construção dos componentes.
//! - **Recursos** ([`GeneMappingError::Resource`]): lista de palavras estruturalmente obrigatória
//!   ausente ou vazia, modelo ilegível.
//! - **Recuperação** ([`GeneMappingError::CandidateRetrieval`]): falha de I/O ou consulta malformada
//!   no índice léxico. Propagada para quem pediu o mapeamento da menção; nunca fica no cache.
//! - **Invariantes** ([`GeneMappingError::InvalidArgument`], [`GeneMappingError::InvalidState`]):
//!   erros de programação, como atribuir a um candidato um organismo que ele não possui.
//!
//! Ausência de candidatos **não** é erro: resolve para a sentinela de rejeição
//! (ver [`crate::result::Resolution`]).

use thiserror::Error;

/// Erros devolvidos pela implementação de [`crate::index::SearchIndex`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("index I/O error: {0}")]
    Io(String),
    #[error("malformed query: {0}")]
    MalformedQuery(String),
    #[error("malformed index document: {0}")]
    MalformedDocument(String),
}

#[derive(Error, Debug)]
pub enum GeneMappingError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("resource error: {0}")]
    Resource(String),
    #[error("candidate retrieval failed for '{mention}': {source}")]
    CandidateRetrieval {
        mention: String,
        #[source]
        source: IndexError,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<::config::ConfigError> for GeneMappingError {
    fn from(err: ::config::ConfigError) -> Self {
        GeneMappingError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeneMappingError>;
