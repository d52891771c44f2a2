//! Parses the cache settings from a YAML config.
//!
//! The settings are expected to live in an object named **caches** which lists the settings for
//! each group:
//!
//! ```yaml
//! caches:
//!     thumbnails:
//!         # Specifies the maximal amount of memory to use (in bytes).
//!         # Supports common suffixes like: k, m, g, t
//!         max_memory: 64m
//!     metadata:
//!         max_memory: 1g
//! ```
//!
//! An entry with missing or unparseable settings is skipped (and logged) rather than aborting
//! the whole parse - a single broken entry must not take down every other cache.
use std::collections::HashMap;

use anyhow::Context;
use yaml_rust::{Yaml, YamlLoader};

use crate::fmt::parse_size;

/// Contains the settings for a single cache group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSettings {
    /// Specifies the maximal amount of memory (in bytes) the group may cache.
    pub max_memory: usize,
}

/// Parses the settings of all configured cache groups from the given YAML string.
///
/// # Errors
/// Fails if the input is not valid YAML or if no **caches** object is present at all. Invalid
/// entries within the object are skipped with an error being logged.
///
/// # Examples
/// ```
/// # use peercache::config::parse_cache_settings;
/// let settings = parse_cache_settings(
///     "caches:
///          thumbnails:
///              max_memory: 8k
///     ",
/// )
/// .unwrap();
///
/// assert_eq!(settings["thumbnails"].max_memory, 8192);
/// ```
pub fn parse_cache_settings(input: &str) -> anyhow::Result<HashMap<String, GroupSettings>> {
    let mut documents =
        YamlLoader::load_from_str(input).context("Failed to parse the cache config as YAML.")?;
    let document = documents.pop().unwrap_or(Yaml::Null);

    match &document["caches"] {
        Yaml::Hash(entries) => {
            let mut result = HashMap::new();
            for (name, settings) in entries {
                let name = match name.as_str() {
                    Some(name) => name,
                    None => continue,
                };

                match parse_group_settings(settings) {
                    Ok(settings) => {
                        let _ = result.insert(name.to_owned(), settings);
                    }
                    Err(error) => {
                        log::error!("Skipping the settings of cache {}: {:#}", name, error);
                    }
                }
            }

            Ok(result)
        }
        _ => Err(anyhow::anyhow!(
            "The config does not contain a 'caches' object."
        )),
    }
}

/// Parses the settings of a single cache group.
fn parse_group_settings(element: &Yaml) -> anyhow::Result<GroupSettings> {
    let max_memory = match &element["max_memory"] {
        Yaml::Integer(bytes) if *bytes >= 0 => *bytes as usize,
        Yaml::String(expression) => {
            parse_size(expression).context("Failed to parse 'max_memory'.")?
        }
        Yaml::BadValue => return Err(anyhow::anyhow!("No 'max_memory' was given.")),
        _ => {
            return Err(anyhow::anyhow!(
                "'max_memory' must be a positive number of bytes or a size expression."
            ))
        }
    };

    Ok(GroupSettings { max_memory })
}
