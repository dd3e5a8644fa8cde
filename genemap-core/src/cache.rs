//! # Cache de Carregamento com Voo Único
//!
//! Cada consulta ao índice léxico é cara e as mesmas menções se repetem muito
//! num corpus ("p53" aparece em milhares de resumos). O [`LoadingCache`] guarda
//! o resultado por chave com:
//!
//! - **limite de entradas**: ao estourar, sai a menos usada recentemente
//!   (ordem de uso mantida por um `lru::LruCache` sob `parking_lot::Mutex`);
//! - **expiração**: uma entrada vale por um tempo fixo desde a escrita;
//! - **voo único**: para uma mesma chave, no máximo uma carga executa por vez;
//!   os demais chamadores esperam e recebem o mesmo resultado;
//! - **falhas não ficam no cache**: o próximo chamador tenta de novo.
//!
//! Leituras devolvem **cópias** (`V: Clone`); o chamador pode alterar o que
//! recebeu sem afetar o cache.
//!
//! ## Registro por local de índice
//!
//! [`CacheRegistry`] mantém um cache por local de índice, compartilhado por
//! todos os componentes que apontam para o mesmo local. O registro é criado
//! pela aplicação e passado por referência (`Arc`). `register` exige um local
//! novo; `get_or_create` reaproveita o existente.
//!
//! ```rust
//! use genemap_core::cache::{CacheConfig, LoadingCache};
//! use std::time::Duration;
//!
//! let cache: LoadingCache<String, usize> = LoadingCache::new(CacheConfig::new(100, Duration::from_secs(60)));
//! let len = cache.get(&"brca1".to_string(), |k| Ok::<_, ()>(k.len())).unwrap();
//! assert_eq!(len, 5);
//! assert_eq!(cache.stats().loads, 1);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{GeneMappingError, Result};

/// Limites de um cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Zero é tratado como 1.
    pub max_entries: usize,
    pub time_to_live: Duration,
}

impl CacheConfig {
    pub const fn new(max_entries: usize, time_to_live: Duration) -> Self {
        Self {
            max_entries,
            time_to_live,
        }
    }

    fn capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}

/// Cache de candidatos: 1.000.000 entradas, 60 minutos.
pub const CANDIDATE_CACHE: CacheConfig = CacheConfig::new(1_000_000, Duration::from_secs(60 * 60));

/// Cache de itens de contexto: 10.000 entradas, 10 minutos.
pub const CONTEXT_ITEMS_CACHE: CacheConfig = CacheConfig::new(10_000, Duration::from_secs(10 * 60));

/// Contadores acumulados desde a criação.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub evictions: u64,
    pub size: usize,
}

struct Entry<V> {
    value: Arc<V>,
    written: Instant,
}

/// Carga em andamento de uma chave, compartilhada pelos que esperam.
type Flight<V> = Arc<OnceCell<Arc<V>>>;

struct State<K: Hash + Eq, V> {
    entries: LruCache<K, Entry<V>>,
    in_flight: HashMap<K, Flight<V>>,
}

pub struct LoadingCache<K: Hash + Eq, V> {
    config: CacheConfig,
    state: Mutex<State<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
}

impl<K: Hash + Eq, V> fmt::Debug for LoadingCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingCache")
            .field("config", &self.config)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K, V> LoadingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                entries: LruCache::new(config.capacity()),
                in_flight: HashMap::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            load_failures: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Valor da chave, carregando com `loader` se ausente ou expirado.
    ///
    /// Chamadores simultâneos da mesma chave esperam a carga em andamento.
    /// Um erro do `loader` é devolvido e nada é guardado.
    pub fn get<E, F>(&self, key: &K, loader: F) -> std::result::Result<V, E>
    where
        F: FnOnce(&K) -> std::result::Result<V, E>,
    {
        let flight = {
            let mut state = self.state.lock();
            if let Some(value) = self.lookup(&mut state, key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok((*value).clone());
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
            state
                .in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let loaded = flight.get_or_try_init(|| {
            self.loads.fetch_add(1, Ordering::Relaxed);
            loader(key).map(Arc::new)
        });

        let mut state = self.state.lock();
        let is_current = state
            .in_flight
            .get(key)
            .map_or(false, |current| Arc::ptr_eq(current, &flight));
        if is_current {
            state.in_flight.remove(key);
        }
        match loaded {
            Ok(value) => {
                if is_current {
                    self.insert_locked(&mut state, key.clone(), Arc::clone(value));
                }
                Ok((**value).clone())
            }
            Err(err) => {
                self.load_failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    /// Valor presente e válido, sem carregar.
    pub fn get_if_present(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        self.lookup(&mut state, key).map(|v| (*v).clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let mut state = self.state.lock();
        self.insert_locked(&mut state, key, Arc::new(value));
    }

    pub fn invalidate(&self, key: &K) {
        self.state.lock().entries.pop(key);
    }

    pub fn invalidate_all(&self) {
        self.state.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.len(),
        }
    }

    /// Entrada válida, promovida a mais recente. Expirada sai do cache.
    fn lookup(&self, state: &mut State<K, V>, key: &K) -> Option<Arc<V>> {
        let expired = state.entries.peek(key)?.written.elapsed() >= self.config.time_to_live;
        if expired {
            state.entries.pop(key);
            return None;
        }
        state.entries.get(key).map(|entry| Arc::clone(&entry.value))
    }

    fn insert_locked(&self, state: &mut State<K, V>, key: K, value: Arc<V>) {
        // sem a chave antiga, o que `push` devolve é sempre a menos recente
        state.entries.pop(&key);
        let entry = Entry {
            value,
            written: Instant::now(),
        };
        if state.entries.push(key, entry).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Um cache por local de índice, compartilhado no processo.
pub struct CacheRegistry<K: Hash + Eq, V> {
    name: &'static str,
    config: CacheConfig,
    caches: Mutex<HashMap<String, Arc<LoadingCache<K, V>>>>,
}

impl<K: Hash + Eq, V> fmt::Debug for CacheRegistry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("locations", &self.caches.lock().len())
            .finish()
    }
}

impl<K, V> CacheRegistry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        Self {
            name,
            config,
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// Cache do local, criado na primeira chamada.
    ///
    /// Consulta e criação acontecem sob o mesmo lock, então dois chamadores
    /// nunca criam caches diferentes para um local.
    pub fn get_or_create(&self, location: &str) -> Result<Arc<LoadingCache<K, V>>> {
        let mut caches = self.caches.lock();
        if let Some(cache) = caches.get(location) {
            info!(cache = self.name, location, "using existing cache");
            return Ok(Arc::clone(cache));
        }
        info!(cache = self.name, location, "creating new cache");
        let cache = Arc::new(LoadingCache::new(self.config));
        caches.insert(location.to_string(), Arc::clone(&cache));
        debug!(cache = self.name, locations = caches.len(), "cache registered");
        Ok(cache)
    }

    /// Cria o cache de um local ainda não registrado.
    ///
    /// Um local já registrado é erro de estado: o chamador esperava ser o
    /// primeiro.
    pub fn register(&self, location: &str) -> Result<Arc<LoadingCache<K, V>>> {
        let mut caches = self.caches.lock();
        if caches.contains_key(location) {
            return Err(GeneMappingError::InvalidState(format!(
                "there already is a {} cache for {location}",
                self.name
            )));
        }
        info!(cache = self.name, location, "creating new cache");
        let cache = Arc::new(LoadingCache::new(self.config));
        caches.insert(location.to_string(), Arc::clone(&cache));
        Ok(cache)
    }

    pub fn get(&self, location: &str) -> Option<Arc<LoadingCache<K, V>>> {
        self.caches.lock().get(location).cloned()
    }

    pub fn len(&self) -> usize {
        self.caches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
