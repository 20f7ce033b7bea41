//! Scenario snapshot generation
//!
//! [`LocalSampler`] draws seeded random snapshots and is always available.
//! [`RemoteScenarioGenerator`] asks a model for stress snapshots and
//! substitutes a sampled one for every request that fails.

use super::{CompletionClient, HookError};
use crate::fixture::{ClusterMetadata, MetricField, ScenarioSnapshot};
use crate::models::ClusterMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

const SCENARIO_SYSTEM_PROMPT: &str = "You generate realistic datacenter stress snapshots. \
Output strictly JSON with fields: power_draw_kw, cooling_online_kw, battery_kw, utilization, temp_c. \
Raise heat and load on 1-2 clusters per snapshot; others moderate.";

const SCENARIO_HINT: &str = "one hot GPU cluster, one donor";

/// Snapshots plus notes on how they were produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeneratedScenarios {
    pub scenarios: Vec<ScenarioSnapshot>,
    pub notes: Vec<String>,
}

/// Trait for scenario generators
pub trait ScenarioSource: Send + Sync {
    fn name(&self) -> &str;

    /// Produce `count` snapshots for the metadata's clusters
    ///
    /// With a seed, snapshot `i` is derived from `seed + i`.
    fn generate(&self, meta: &ClusterMetadata, count: usize, seed: Option<u64>) -> GeneratedScenarios;
}

/// Seeded random snapshot sampler
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSampler;

impl LocalSampler {
    /// Draw one snapshot for `clusters`
    pub fn sample(&self, clusters: &[String], seed: Option<u64>) -> ScenarioSnapshot {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let mut whole = |lo: i64, hi: i64| -> MetricField {
            let map: ClusterMap = clusters
                .iter()
                .map(|c| (c.clone(), rng.gen_range(lo..=hi) as f64))
                .collect();
            map.into()
        };

        let power_draw_kw = whole(10, 65);
        let cooling_online_kw = whole(5, 20);
        let battery_kw = whole(3, 12);

        let utilization: ClusterMap = clusters
            .iter()
            .map(|c| (c.clone(), (rng.gen_range(0.2..0.9_f64) * 100.0).round() / 100.0))
            .collect();

        let temp_c: ClusterMap = clusters
            .iter()
            .map(|c| (c.clone(), rng.gen_range(55..=90) as f64))
            .collect();

        ScenarioSnapshot {
            timestep: 0,
            power_draw_kw: Some(power_draw_kw),
            cooling_online_kw: Some(cooling_online_kw),
            battery_kw: Some(battery_kw),
            utilization: Some(utilization.into()),
            temp_c: Some(temp_c.into()),
            ..Default::default()
        }
    }
}

fn nth_seed(seed: Option<u64>, i: usize) -> Option<u64> {
    seed.map(|s| s.wrapping_add(i as u64))
}

impl ScenarioSource for LocalSampler {
    fn name(&self) -> &str {
        "local"
    }

    fn generate(&self, meta: &ClusterMetadata, count: usize, seed: Option<u64>) -> GeneratedScenarios {
        let clusters = meta.cluster_keys();
        GeneratedScenarios {
            scenarios: (0..count)
                .map(|i| self.sample(&clusters, nth_seed(seed, i)))
                .collect(),
            notes: vec!["Locally sampled scenarios.".to_string()],
        }
    }
}

/// Model-backed generator with per-scenario fallback to [`LocalSampler`]
#[derive(Debug, Clone)]
pub struct RemoteScenarioGenerator {
    client: CompletionClient,
    sampler: LocalSampler,
}

impl RemoteScenarioGenerator {
    pub fn new(client: CompletionClient) -> Self {
        Self {
            client,
            sampler: LocalSampler,
        }
    }

    fn request_one(&self, clusters: &[String]) -> Result<ScenarioSnapshot, HookError> {
        let user = json!({"clusters": clusters, "hint": SCENARIO_HINT}).to_string();
        let reply = self.client.complete_json(SCENARIO_SYSTEM_PROMPT, &user)?;
        if !reply.is_object() {
            return Err(HookError::MalformedResponse("snapshot is not an object".to_string()));
        }
        serde_json::from_value(reply)
            .map_err(|e| HookError::MalformedResponse(format!("invalid snapshot: {}", e)))
    }
}

impl ScenarioSource for RemoteScenarioGenerator {
    fn name(&self) -> &str {
        "remote"
    }

    fn generate(&self, meta: &ClusterMetadata, count: usize, seed: Option<u64>) -> GeneratedScenarios {
        let clusters = meta.cluster_keys();

        if !self.client.has_api_key() {
            return GeneratedScenarios {
                scenarios: (0..count)
                    .map(|i| self.sampler.sample(&clusters, nth_seed(seed, i)))
                    .collect(),
                notes: vec!["API key missing; returned locally sampled scenarios.".to_string()],
            };
        }

        let mut scenarios = Vec::with_capacity(count);
        let mut notes = Vec::new();
        for i in 0..count {
            match self.request_one(&clusters) {
                Ok(snapshot) => scenarios.push(snapshot),
                Err(e) => {
                    warn!(scenario = i, error_kind = e.kind(), error = %e, "Remote scenario failed, sampling locally");
                    notes.push(format!("Remote error on scenario {}: {}", i, e.kind()));
                    scenarios.push(self.sampler.sample(&clusters, nth_seed(seed, i)));
                }
            }
        }

        if notes.is_empty() {
            notes.push(
                "Generated scenarios remotely where possible; fell back to local sampler on errors."
                    .to_string(),
            );
        }

        GeneratedScenarios { scenarios, notes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    fn meta() -> ClusterMetadata {
        ClusterMetadata {
            clusters: Some(vec!["GPU_A".into(), "CPU_B".into()]),
            ..Default::default()
        }
    }

    fn values(field: &Option<MetricField>) -> Vec<f64> {
        match field {
            Some(MetricField::PerCluster(map)) => map.values().copied().collect(),
            other => panic!("expected per-cluster field, got {:?}", other),
        }
    }

    #[test]
    fn test_sampler_ranges() {
        let clusters = meta().cluster_keys();
        for seed in 0..50 {
            let s = LocalSampler.sample(&clusters, Some(seed));
            assert!(values(&s.power_draw_kw).iter().all(|v| (10.0..=65.0).contains(v)));
            assert!(values(&s.cooling_online_kw).iter().all(|v| (5.0..=20.0).contains(v)));
            assert!(values(&s.battery_kw).iter().all(|v| (3.0..=12.0).contains(v)));
            assert!(values(&s.utilization).iter().all(|v| (0.2..=0.9).contains(v)));
            assert!(values(&s.temp_c).iter().all(|v| (55.0..=90.0).contains(v)));
            assert!(values(&s.temp_c).iter().all(|v| v.fract() == 0.0));
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = LocalSampler.generate(&meta(), 3, Some(7));
        let b = LocalSampler.generate(&meta(), 3, Some(7));
        assert_eq!(a, b);
        assert_eq!(a.scenarios.len(), 3);
        // scenario i uses seed + i
        assert_eq!(a.scenarios[1], LocalSampler.sample(&meta().cluster_keys(), Some(8)));
    }

    fn client(url: &str, key: Option<&str>) -> CompletionClient {
        CompletionClient::new(&LlmConfig {
            enabled: true,
            endpoint: format!("{}/v1/chat/completions", url),
            model: "test-model".to_string(),
            api_key: key.map(str::to_string),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_missing_key_samples_locally() {
        let generator = RemoteScenarioGenerator::new(client("http://127.0.0.1:9", None));
        let out = generator.generate(&meta(), 2, Some(1));
        assert_eq!(out.scenarios.len(), 2);
        assert_eq!(out.notes, vec!["API key missing; returned locally sampled scenarios."]);
        assert_eq!(out.scenarios, LocalSampler.generate(&meta(), 2, Some(1)).scenarios);
    }

    #[test]
    fn test_remote_snapshot_used() {
        let mut server = mockito::Server::new();
        let content = json!({"power_draw_kw": {"GPU_A": 70}, "temp_c": {"GPU_A": 88}}).to_string();
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(json!({"choices": [{"message": {"content": content}}]}).to_string())
            .expect(2)
            .create();

        let out = RemoteScenarioGenerator::new(client(&server.url(), Some("k"))).generate(&meta(), 2, None);
        assert_eq!(out.scenarios.len(), 2);
        assert_eq!(
            out.scenarios[0].temp_c,
            Some(MetricField::PerCluster([("GPU_A".to_string(), 88.0)].into()))
        );
        assert!(out.notes[0].starts_with("Generated scenarios remotely"));
    }

    #[test]
    fn test_remote_failure_falls_back_per_scenario() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(502)
            .create();

        let out = RemoteScenarioGenerator::new(client(&server.url(), Some("k"))).generate(&meta(), 2, Some(3));
        assert_eq!(out.notes, vec!["Remote error on scenario 0: status", "Remote error on scenario 1: status"]);
        assert_eq!(out.scenarios, LocalSampler.generate(&meta(), 2, Some(3)).scenarios);
    }
}
