//! # genemap-core: Mapeamento de Menções de Genes para Identificadores
//!
//! Este crate liga menções de genes e proteínas em textos biomédicos ("p53",
//! "IL-2 receptor alpha", "TNF-alpha") a identificadores de banco de dados de
//! genes, escolhendo também o organismo de cada menção.
//!
//! ## Arquitetura do Sistema
//!
//! Cada menção passa por um pipeline linear:
//!
//! 1.  **Normalização** ([`normalizer`]): forma canônica do nome ("TNF-alpha" → "tnf alpha") e variantes.
//! 2.  **Recuperação** ([`retrieval`]): consulta ao índice léxico ([`index`], [`query`]) com cache
//!     por índice ([`cache`]) e score de cada candidato ([`scoring`]).
//! 3.  **Filtro** ([`filter`]): descarta candidatos que diferem da menção só por números,
//!     letras gregas ou modificadores.
//! 4.  **Desambiguação** ([`mapping`], [`semantic`]): melhor grupo de candidatos, opcionalmente
//!     reordenado pelo contexto do documento.
//! 5.  **Espécie** ([`species`], [`document`]): organismo com a evidência mais confiável no texto.
//! 6.  **Saída**: [`MentionMappingResult`] por menção, ou a sentinela de rejeição.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use std::sync::Arc;
//! use genemap_core::corpus::demo_documents;
//! use genemap_core::{GeneMapper, Lexicon, MappingCaches, MappingIndexes, MappingSettings, ScorerKind};
//!
//! // 1. Configuração: scorers e organismos permitidos
//! let settings = MappingSettings::new("demo", ScorerKind::Simple, ScorerKind::Simple)
//!     .with_tax_ids(&["9606", "10090"]);
//!
//! // 2. Índices de demonstração e caches compartilhados
//! let indexes = MappingIndexes::demo(&Lexicon::bundled())?;
//! let mapper = GeneMapper::with_indexes(settings, indexes, Arc::new(MappingCaches::new()))?;
//!
//! // 3. Mapeia as menções de um resumo anotado
//! let mut documents = demo_documents();
//! let result = mapper.map_document(&mut documents[0])?;
//! for mention in &result.mention_results {
//!     println!("{} -> {:?}", mention.mapped_mention, mention.result_entries.id());
//! }
//! # Ok::<(), genemap_core::GeneMappingError>(())
//! ```
//!
//! ## Módulos Principais
//!
//! - [`pipeline`]: Orquestrador que conecta todos os estágios e emite eventos.
//! - [`config`]: Configuração por arquivo e variáveis de ambiente.
//! - [`corpus`]: Dicionário, contexto e documentos de demonstração.

pub mod cache;
pub mod config;
pub mod corpus;
pub mod document;
pub mod error;
pub mod features;
pub mod filter;
pub mod index;
pub mod mapping;
pub mod maxent;
pub mod mention;
pub mod normalizer;
pub mod pipeline;
pub mod query;
pub mod resources;
pub mod result;
pub mod retrieval;
pub mod scoring;
pub mod semantic;
pub mod species;
pub mod spelling;
pub mod synhit;
pub mod tokenizer;

pub use crate::config::MappingSettings;
pub use document::GeneDocument;
pub use error::{GeneMappingError, IndexError, Result};
pub use mapping::{MappingCaches, MappingCore, MappingCoreKind};
pub use mention::GeneMention;
pub use pipeline::{GeneMapper, MappingEvent, MappingIndexes};
pub use resources::Lexicon;
pub use result::{DocumentMappingResult, MentionMappingResult, Resolution};
pub use scoring::ScorerKind;
pub use synhit::{HitOrder, SynHit};
