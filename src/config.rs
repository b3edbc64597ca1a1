//! Experiment configuration: a plain, YAML-serializable [`RawConfig`] converted into a live
//! [`Config`] holding the resolver functions used to build trait objects for each closed policy
//! family.

use serde::{Deserialize, Serialize};

use crate::cache::{default_cache_policy_resolver, CachePolicy};
use crate::controller::{default_controller_resolver, Controller};
use crate::scheduler::{default_scheduler_resolver, Scheduler};

/// Plain serializable experiment description, as loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub scheduler_type: String,
    pub cache_policy: String,
    pub controller_type: String,
    pub invoker_number: u64,
    pub invoker_memory_gb: u64,
    pub invoker_core: u64,
    pub application_number: u64,
    pub application_invocation_limit: u64,
    pub simulation_minutes: u64,
    /// Accepted but unused by the bundled workload generator; external trace ingestion is out of
    /// scope for this crate.
    pub azure_trace_dir: Option<String>,
    /// Accepted but unused; replaced by the explicit `random_seed` field below.
    pub random_seed_dir: Option<String>,
    pub random_seed: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            scheduler_type: "FIFO".to_string(),
            cache_policy: "LRU".to_string(),
            controller_type: "leastload".to_string(),
            invoker_number: 4,
            invoker_memory_gb: 4,
            invoker_core: 4,
            application_number: 20,
            application_invocation_limit: 100,
            simulation_minutes: 60,
            azure_trace_dir: None,
            random_seed_dir: None,
            random_seed: 0,
        }
    }
}

/// The construction functions used to turn configuration names into trait objects. Split out
/// from [`Config`] so tests can substitute their own resolvers (e.g. to register a scheduler not
/// in the default set) without touching the rest of the configuration.
pub struct ConfigParamResolvers {
    pub scheduler_resolver: fn(&str, u64) -> Box<dyn Scheduler>,
    pub cache_policy_resolver: fn(&str) -> Box<dyn CachePolicy>,
    pub controller_resolver: fn(&str) -> Box<dyn Controller>,
}

impl Default for ConfigParamResolvers {
    fn default() -> Self {
        Self {
            scheduler_resolver: default_scheduler_resolver,
            cache_policy_resolver: default_cache_policy_resolver,
            controller_resolver: default_controller_resolver,
        }
    }
}

/// A fully-resolved experiment configuration, ready to build a [`crate::simulation::Simulator`].
pub struct Config {
    pub scheduler_type: String,
    pub cache_policy: String,
    pub controller_type: String,
    pub invoker_number: u64,
    /// Megabytes; converted from `RawConfig::invoker_memory_gb`.
    pub invoker_memory: i64,
    pub invoker_core: u64,
    pub application_number: u64,
    pub application_invocation_limit: u64,
    pub simulation_minutes: u64,
    pub random_seed: u64,
    pub resolvers: ConfigParamResolvers,
}

impl Config {
    pub fn from_raw(raw: RawConfig) -> Self {
        Self::from_raw_split_resolvers(raw, ConfigParamResolvers::default())
    }

    pub fn from_raw_split_resolvers(raw: RawConfig, resolvers: ConfigParamResolvers) -> Self {
        Self {
            scheduler_type: raw.scheduler_type,
            cache_policy: raw.cache_policy,
            controller_type: raw.controller_type,
            invoker_number: raw.invoker_number,
            invoker_memory: (raw.invoker_memory_gb * 1024) as i64,
            invoker_core: raw.invoker_core,
            application_number: raw.application_number,
            application_invocation_limit: raw.application_invocation_limit,
            simulation_minutes: raw.simulation_minutes,
            random_seed: raw.random_seed,
            resolvers,
        }
    }

    /// Parses a YAML experiment description.
    ///
    /// # Panics
    /// Panics if `yaml` does not deserialize into [`RawConfig`] -- malformed configuration is
    /// fatal before the simulation starts.
    pub fn from_yaml(yaml: &str) -> Self {
        let raw: RawConfig = serde_yaml::from_str(yaml).expect("invalid configuration YAML");
        Self::from_raw(raw)
    }

    pub fn build_scheduler(&self) -> Box<dyn Scheduler> {
        (self.resolvers.scheduler_resolver)(&self.scheduler_type, self.invoker_core)
    }

    pub fn build_cache_policy(&self) -> Box<dyn CachePolicy> {
        (self.resolvers.cache_policy_resolver)(&self.cache_policy)
    }

    pub fn build_controller(&self) -> Box<dyn Controller> {
        (self.resolvers.controller_resolver)(&self.controller_type)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_raw(RawConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_round_trip_with_partial_overrides() {
        let yaml = "scheduler_type: SRTF\ncontroller_type: cacheaware\nrandom_seed: 42\n";
        let config = Config::from_yaml(yaml);
        assert_eq!(config.scheduler_type, "SRTF");
        assert_eq!(config.controller_type, "cacheaware");
        assert_eq!(config.random_seed, 42);
        // Fields not present in the YAML fall back to RawConfig::default().
        assert_eq!(config.cache_policy, "LRU");
    }

    #[test]
    #[should_panic(expected = "unknown scheduler")]
    fn unknown_scheduler_name_panics_at_build_time() {
        let mut raw = RawConfig::default();
        raw.scheduler_type = "bogus".to_string();
        let config = Config::from_raw(raw);
        config.build_scheduler();
    }
}
