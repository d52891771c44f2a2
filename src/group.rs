//! Provides named cache groups and the read-through orchestration.
//!
//! A [Group] pairs a bounded local [LRU cache](crate::lru::LruCache) with a caller supplied
//! [Source] of truth. A lookup via [Group::get] first consults the local cache. On a miss, all
//! concurrent lookups for the same key are collapsed into a single fetch (see
//! [crate::flight]), which resolves the value either from the peer owning the key (if a
//! [PeerPicker] has been registered) or from the source.
//!
//! Two behaviors are deliberate design choices and not accidents:
//! * Values resolved by a **peer** are returned but **not** written into the local cache. The
//!   owning node caches them already - storing them here as well would duplicate the data on
//!   every node which merely routes requests. Only values obtained from the local source are
//!   cached locally.
//! * A **peer failure is never surfaced** to the caller. It is logged and the lookup
//!   transparently falls back to the source of truth. Peers being temporarily unreachable is
//!   expected operation in a distributed setting, not an error the caller could act upon.
//!
//! Groups are created and looked up through a [Registry]. The registry is an explicit object
//! rather than ambient global state, so tests (and applications embedding several independent
//! cache topologies) can simply instantiate their own.
//!
//! # Examples
//! ```
//! # use std::sync::Arc;
//! # use peercache::group::{FnSource, Registry};
//! #[tokio::main]
//! async fn main() {
//!     let registry = Registry::new();
//!     let source = Arc::new(FnSource::new(|key: &str| -> anyhow::Result<Vec<u8>> {
//!         Ok(format!("{}-val", key).into_bytes())
//!     }));
//!
//!     let group = registry.create_group("demo", 64 * 1024, source);
//!     let value = group.get("x").await.unwrap();
//!     assert_eq!(value.as_text(), "x-val");
//! }
//! ```
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::flight::Flight;
use crate::fmt::format_size;
use crate::lru::LruCache;
use crate::peers::{PeerClient, PeerPicker};
use crate::protocol::FetchRequest;
use crate::view::ByteView;

/// Loads values which are not present in any cache.
///
/// The source is the authority for the data a group serves. It must be safe to call
/// concurrently for different keys - the group only serializes fetches for the *same* key
/// (via its [Flight]), fetches for distinct keys may run in parallel.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    /// Loads the raw bytes for the given key.
    async fn fetch(&self, key: &str) -> anyhow::Result<Vec<u8>>;
}

/// Adapts a plain function or closure into a [Source].
///
/// # Examples
/// ```
/// # use peercache::group::FnSource;
/// let source = FnSource::new(|key: &str| -> anyhow::Result<Vec<u8>> {
///     Ok(key.to_uppercase().into_bytes())
/// });
/// ```
pub struct FnSource<F> {
    fetcher: F,
}

impl<F> FnSource<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    /// Wraps the given function into a [Source].
    pub fn new(fetcher: F) -> Self {
        FnSource { fetcher }
    }
}

#[async_trait::async_trait]
impl<F> Source for FnSource<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    async fn fetch(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        (self.fetcher)(key)
    }
}

/// Provides a point-in-time snapshot of the cache metrics of a group.
///
/// The `Display` implementation renders a one line summary suitable for log output.
#[derive(Clone, Debug)]
pub struct CacheStats {
    /// Contains the number of entries currently cached.
    pub entries: usize,

    /// Contains the memory (in bytes) accounted for the cached keys and values.
    pub allocated_memory: usize,

    /// Contains the configured memory limit in bytes.
    pub max_memory: usize,

    /// Contains the number of cache reads since the last flush.
    pub reads: usize,

    /// Contains the number of cache writes since the last flush.
    pub writes: usize,

    /// Contains the cache hit rate in percent.
    pub hit_rate: f32,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            formatter,
            "{} entries, {} of {} used, {:.0}% hit rate",
            self.entries,
            format_size(self.allocated_memory),
            format_size(self.max_memory),
            self.hit_rate
        )
    }
}

/// A named, bounded read-through cache.
///
/// See the [module docs](crate::group) for the lookup semantics. Groups live for the process
/// lifetime and are shared via `Arc`, therefore all operations take `&self`.
pub struct Group {
    name: String,
    source: Arc<dyn Source>,
    cache: Mutex<LruCache<ByteView>>,
    flight: Flight<ByteView>,
    peers: Mutex<Option<Arc<dyn PeerPicker>>>,
}

impl Group {
    fn new(name: &str, max_memory: usize, source: Arc<dyn Source>) -> Arc<Self> {
        Arc::new(Group {
            name: name.to_owned(),
            source,
            cache: Mutex::new(LruCache::new(max_memory)),
            flight: Flight::new(),
            peers: Mutex::new(None),
        })
    }

    /// Returns the name of this group.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers the peer picker which routes keys to remote nodes.
    ///
    /// Without a registered picker every miss is resolved via the local source. The picker can
    /// be registered exactly once, as silently swapping the routing topology of a running
    /// group is almost certainly a wiring error.
    ///
    /// # Panics
    /// Panics if a picker has already been registered for this group.
    pub fn register_peers(&self, picker: Arc<dyn PeerPicker>) {
        let mut peers = self.peers.lock().unwrap();
        if peers.is_some() {
            panic!(
                "A peer picker has already been registered for group '{}'!",
                self.name
            );
        }

        *peers = Some(picker);
    }

    /// Resolves the value for the given key.
    ///
    /// Performs a local cache lookup first. On a miss, concurrent calls for the same key are
    /// collapsed into a single fetch which consults the owning peer (if any) and falls back to
    /// the source of truth. Values obtained from the source are written into the local cache.
    ///
    /// # Errors
    /// Fails if the key is empty or if the source reports an error for the given key. Peer
    /// failures are not surfaced (see the [module docs](crate::group)).
    pub async fn get(&self, key: &str) -> anyhow::Result<ByteView> {
        if key.is_empty() {
            return Err(anyhow::anyhow!(
                "An empty key cannot be resolved by group '{}'.",
                self.name
            ));
        }

        if let Some(value) = self.cache.lock().unwrap().get(key).cloned() {
            return Ok(value);
        }

        self.flight
            .execute(key, self.load(key))
            .await
            .map_err(|error| anyhow::anyhow!("{:#}", error))
    }

    /// Performs the actual fetch for a cache miss.
    ///
    /// This runs at most once per key at a time, all concurrent callers share its outcome.
    async fn load(&self, key: &str) -> anyhow::Result<ByteView> {
        if let Some(peer) = self.pick_peer(key) {
            match self.fetch_from_peer(peer, key).await {
                Ok(value) => return Ok(value),
                Err(error) => log::warn!(
                    "Failed to fetch '{}' of group '{}' from a peer: {:#} Falling back to the local source...",
                    key,
                    self.name,
                    error
                ),
            }
        }

        self.fetch_from_source(key).await
    }

    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerClient>> {
        self.peers
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|picker| picker.pick(key))
    }

    async fn fetch_from_peer(
        &self,
        peer: Arc<dyn PeerClient>,
        key: &str,
    ) -> anyhow::Result<ByteView> {
        let request = FetchRequest::new(self.name.as_str(), key);
        let response = peer.fetch(&request).await?;

        // Peer sourced values bypass the local cache on purpose, see the module docs.
        Ok(ByteView::from(response.value))
    }

    async fn fetch_from_source(&self, key: &str) -> anyhow::Result<ByteView> {
        let data = self.source.fetch(key).await?;
        let value = ByteView::from(data);
        self.cache
            .lock()
            .unwrap()
            .put(key.to_owned(), value.clone());

        Ok(value)
    }

    /// Reports the current cache metrics of this group.
    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.lock().unwrap();

        CacheStats {
            entries: cache.len(),
            allocated_memory: cache.allocated_memory(),
            max_memory: cache.max_memory(),
            reads: cache.reads(),
            writes: cache.writes(),
            hit_rate: cache.hit_rate(),
        }
    }
}

/// Keeps track of all named groups.
///
/// Multiple lookups can run concurrently, creating a group acquires exclusive access. Note
/// that creating a group under a name which is already taken silently replaces the registry
/// entry - callers still holding the previous `Arc<Group>` keep operating on the old group.
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl Registry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Registry {
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a group with the given name, cache memory limit and source of truth.
    ///
    /// A **max_memory** of zero effectively disables local caching for the group (every
    /// insertion is evicted right away) - the group still deduplicates concurrent fetches and
    /// consults peers, it just never retains values.
    pub fn create_group(
        &self,
        name: &str,
        max_memory: usize,
        source: Arc<dyn Source>,
    ) -> Arc<Group> {
        let group = Group::new(name, max_memory, source);
        let _ = self
            .groups
            .write()
            .unwrap()
            .insert(name.to_owned(), group.clone());

        group
    }

    /// Looks up a previously created group.
    pub fn find(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().unwrap().get(name).cloned()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}
