//! Peercache is an in-process, horizontally-distributable read-through cache.
//!
//! # Introduction
//! Applications ask a named cache **group** for a value by key. The group serves the value from
//! its bounded local cache or - if absent - fetches it exactly once, even under concurrent
//! request storms: either from the peer node owning the key (when a peer topology is wired up)
//! or from the source of truth supplied by the application.
//!
//! The building blocks are deliberately small and composable:
//! * **[view]** - [ByteView](view::ByteView), an immutable, defensively copied snapshot of a
//!   cached value.
//! * **[lru]** - a size constrained LRU cache which accounts the memory of its keys and values
//!   and evicts the least recently used entries once the limit is exceeded.
//! * **[flight]** - a collapsing executor which ensures that at most one fetch per key is in
//!   flight at any time, no matter how many tasks miss the cache simultaneously.
//! * **[peers]** - the boundary towards remote nodes: a picker routing keys to their owners
//!   and an HTTP client fetching values from them.
//! * **[protocol]** - the wire messages exchanged between peers.
//! * **[group]** - the orchestration tying all of the above together, plus the registry of
//!   named groups.
//! * **[config]** / **[fmt]** - YAML cache settings and byte size expressions like `64m`.
//!
//! # Example
//! ```
//! use peercache::group::{FnSource, Registry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Registry::new();
//!
//!     // The source of truth is consulted whenever a key misses all caches...
//!     let source = Arc::new(FnSource::new(|key: &str| -> anyhow::Result<Vec<u8>> {
//!         Ok(format!("{}-val", key).into_bytes())
//!     }));
//!
//!     let group = registry.create_group("demo", 64 * 1024, source);
//!
//!     // ...but only once: the second lookup is answered from the local cache.
//!     assert_eq!(group.get("x").await.unwrap().as_text(), "x-val");
//!     assert_eq!(group.get("x").await.unwrap().as_text(), "x-val");
//!     assert_eq!(group.stats().entries, 1);
//! }
//! ```
//!
//! To span multiple nodes, implement [peers::PeerPicker] (e.g. consistent hashing over the
//! known nodes) and register it via [group::Group::register_peers] - lookups for keys owned by
//! another node are then fetched from that peer via [peers::HttpPeerClient] and any peer
//! failure transparently falls back to the local source.
#![deny(
    warnings,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_results
)]
use simplelog::{format_description, ConfigBuilder, LevelFilter, SimpleLogger};
use std::sync::Once;

pub mod config;
pub mod flight;
pub mod fmt;
pub mod group;
pub mod lru;
pub mod peers;
pub mod protocol;
pub mod view;

/// Initializes the logging system.
///
/// This is provided for applications which do not bring their own logger. Calling it more than
/// once is safe - only the first invocation has an effect.
pub fn init_logging() {
    static INIT_LOGGING: Once = Once::new();

    // We need to do this as otherwise the integration tests might crash as the logging system
    // is initialized several times...
    INIT_LOGGING.call_once(|| {
        if let Err(error) = SimpleLogger::init(
            LevelFilter::Debug,
            ConfigBuilder::new()
                .set_time_format_custom(format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]"
                ))
                .set_thread_level(LevelFilter::Trace)
                .set_target_level(LevelFilter::Error)
                .set_location_level(LevelFilter::Trace)
                .build(),
        ) {
            panic!("Failed to initialize logging system: {}", error);
        }
    });
}

#[cfg(test)]
mod testing {
    /// Executes async code within a single threaded tokio runtime.
    pub fn test_async<F: std::future::Future>(future: F) {
        use tokio::runtime;

        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let _ = rt.block_on(future);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn logging_can_be_initialized_repeatedly() {
        // The second call must be a no-op instead of crashing on double initialization...
        super::init_logging();
        super::init_logging();
    }
}
