use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::debug;

use crate::model::{
    CPU, ClusterCapacity, EPHEMERAL_STORAGE, MEMORY, NodeSnapshot, PodMetricsSnapshot,
    PodSnapshot, QuantityMap, RUNNING_PHASE, ResourceTotals, UsageTotals,
};
use crate::quantity::{CpuUnit, MemoryUnit, parse_cpu, parse_memory, unrecognized_memory_suffix};

/// Sums declared requests and limits of every running pod per namespace.
///
/// Pods outside the `Running` phase are skipped entirely, as are containers
/// without a resources block. Bare CPU numbers are whole cores; memory and
/// storage must carry a unit suffix.
pub fn summarize_pods<'a, I>(pods: I) -> Result<BTreeMap<String, ResourceTotals>>
where
    I: IntoIterator<Item = &'a PodSnapshot>,
{
    let mut totals = BTreeMap::<String, ResourceTotals>::new();
    let mut skipped = 0usize;

    for pod in pods {
        if pod.phase != RUNNING_PHASE || pod.containers.is_empty() {
            skipped += 1;
            continue;
        }

        for resources in pod
            .containers
            .iter()
            .filter_map(|container| container.resources.as_ref())
        {
            let requests = quantities(resources.requests.as_ref()).with_context(|| {
                format!("invalid resource request in namespace {}", pod.namespace)
            })?;
            let limits = quantities(resources.limits.as_ref()).with_context(|| {
                format!("invalid resource limit in namespace {}", pod.namespace)
            })?;

            let owner = format!("namespace {}", pod.namespace);
            let entry = totals.entry(pod.namespace.clone()).or_default();
            entry.cpu_request = add(entry.cpu_request, requests.cpu, "cpu request", &owner)?;
            entry.cpu_limit = add(entry.cpu_limit, limits.cpu, "cpu limit", &owner)?;
            entry.mem_request = add(entry.mem_request, requests.memory, "memory request", &owner)?;
            entry.mem_limit = add(entry.mem_limit, limits.memory, "memory limit", &owner)?;
            entry.storage_request =
                add(entry.storage_request, requests.storage, "storage request", &owner)?;
            entry.storage_limit =
                add(entry.storage_limit, limits.storage, "storage limit", &owner)?;
        }
    }

    debug!(
        namespaces = totals.len(),
        skipped_pods = skipped,
        "summarized pod resources"
    );
    Ok(totals)
}

/// Sums live container usage per namespace. Bare CPU numbers are nanocores.
pub fn summarize_metrics<'a, I>(metrics: I) -> Result<BTreeMap<String, UsageTotals>>
where
    I: IntoIterator<Item = &'a PodMetricsSnapshot>,
{
    let mut usage = BTreeMap::<String, UsageTotals>::new();

    for pod_metric in metrics {
        let owner = format!("namespace {}", pod_metric.namespace);
        let entry = usage.entry(pod_metric.namespace.clone()).or_default();
        for container in &pod_metric.containers {
            let cpu = parse_cpu(&container.cpu, Some(CpuUnit::Nano)).with_context(|| {
                format!("invalid cpu usage in namespace {}", pod_metric.namespace)
            })?;
            let memory = parse_memory(&container.memory, None).with_context(|| {
                format!("invalid memory usage in namespace {}", pod_metric.namespace)
            })?;
            entry.cpu_usage = add(entry.cpu_usage, cpu, "cpu usage", &owner)?;
            entry.mem_usage = add(entry.mem_usage, memory, "memory usage", &owner)?;
        }
    }

    debug!(namespaces = usage.len(), "summarized pod metrics");
    Ok(usage)
}

/// Sums node capacity across the cluster. Bare memory and storage numbers
/// are bytes, and so are numbers with a suffix outside the memory units
/// (`12Pi` reads as 12 bytes); such suffixes are logged at debug level.
pub fn cluster_capacity<'a, I>(nodes: I) -> Result<ClusterCapacity>
where
    I: IntoIterator<Item = &'a NodeSnapshot>,
{
    let mut capacity = ClusterCapacity::default();

    for node in nodes {
        let lookup = |key: &str| node.capacity.get(key).map(String::as_str).unwrap_or("0");
        let cpu = parse_cpu(lookup(CPU), Some(CpuUnit::Cores))
            .with_context(|| format!("invalid cpu capacity on node {}", node.name))?;
        let memory = parse_memory(lookup(MEMORY), Some(MemoryUnit::Bytes))
            .with_context(|| format!("invalid memory capacity on node {}", node.name))?;
        let storage = parse_memory(lookup(EPHEMERAL_STORAGE), Some(MemoryUnit::Bytes))
            .with_context(|| format!("invalid storage capacity on node {}", node.name))?;

        for key in [MEMORY, EPHEMERAL_STORAGE] {
            if let Some(suffix) = unrecognized_memory_suffix(lookup(key)) {
                debug!(node = %node.name, key, suffix, "unrecognized unit read as bytes");
            }
        }

        let owner = format!("node {}", node.name);
        capacity.cpu = add(capacity.cpu, cpu, "cpu capacity", &owner)?;
        capacity.memory = add(capacity.memory, memory, "memory capacity", &owner)?;
        capacity.storage = add(capacity.storage, storage, "storage capacity", &owner)?;
    }

    debug!(
        cpu_nanocores = capacity.cpu,
        memory_bytes = capacity.memory,
        storage_bytes = capacity.storage,
        "summarized cluster capacity"
    );
    Ok(capacity)
}

fn add(total: u64, value: u64, what: &str, owner: &str) -> Result<u64> {
    total
        .checked_add(value)
        .with_context(|| format!("{what} total overflows u64 at {owner}"))
}

#[derive(Debug, Clone, Copy, Default)]
struct Quantities {
    cpu: u64,
    memory: u64,
    storage: u64,
}

fn quantities(map: Option<&QuantityMap>) -> Result<Quantities> {
    let Some(map) = map else {
        return Ok(Quantities::default());
    };
    let lookup = |key: &str| map.get(key).map(String::as_str).unwrap_or_default();

    Ok(Quantities {
        cpu: parse_cpu(lookup(CPU), Some(CpuUnit::Cores))?,
        memory: parse_memory(lookup(MEMORY), None)?,
        storage: parse_memory(lookup(EPHEMERAL_STORAGE), None)?,
    })
}

#[cfg(test)]
mod tests {
    use super::{cluster_capacity, summarize_metrics, summarize_pods};
    use crate::model::{
        ClusterCapacity, ContainerSnapshot, ContainerUsage, NodeSnapshot, PodMetricsSnapshot,
        PodSnapshot, QuantityMap, ResourceSpec, ResourceTotals,
    };
    use crate::quantity::QuantityError;
    use proptest::prelude::*;

    fn map(entries: &[(&str, &str)]) -> QuantityMap {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn container(requests: &[(&str, &str)], limits: &[(&str, &str)]) -> ContainerSnapshot {
        ContainerSnapshot {
            resources: Some(ResourceSpec {
                requests: Some(map(requests)),
                limits: Some(map(limits)),
            }),
        }
    }

    fn pod(namespace: &str, phase: &str, containers: Vec<ContainerSnapshot>) -> PodSnapshot {
        PodSnapshot {
            namespace: namespace.to_string(),
            phase: phase.to_string(),
            containers,
        }
    }

    #[test]
    fn running_pods_are_summed_per_namespace() {
        let pods = vec![
            pod(
                "web",
                "Running",
                vec![
                    container(
                        &[("cpu", "250m"), ("memory", "256Mi")],
                        &[("cpu", "1"), ("memory", "1Gi")],
                    ),
                    container(&[("cpu", "250m"), ("ephemeral-storage", "2Gi")], &[]),
                ],
            ),
            pod(
                "web",
                "Running",
                vec![container(&[("memory", "256Mi")], &[("ephemeral-storage", "4Gi")])],
            ),
            pod("db", "Running", vec![container(&[("cpu", "2")], &[])]),
        ];

        let totals = summarize_pods(&pods).expect("pods should aggregate");

        assert_eq!(
            totals["web"],
            ResourceTotals {
                cpu_request: 500_000_000,
                cpu_limit: 1_000_000_000,
                mem_request: 512 * 1024 * 1024,
                mem_limit: 1024 * 1024 * 1024,
                storage_request: 2 * 1024 * 1024 * 1024,
                storage_limit: 4 * 1024 * 1024 * 1024,
            }
        );
        assert_eq!(totals["db"].cpu_request, 2_000_000_000);
        assert_eq!(totals["db"].mem_request, 0);
    }

    #[test]
    fn pending_pods_contribute_nothing() {
        let pods = vec![
            pod(
                "batch",
                "Pending",
                vec![container(&[("cpu", "4"), ("memory", "8Gi")], &[])],
            ),
            pod(
                "batch",
                "Succeeded",
                vec![container(&[("cpu", "1")], &[])],
            ),
        ];

        let totals = summarize_pods(&pods).expect("pods should aggregate");
        assert!(!totals.contains_key("batch"));
    }

    #[test]
    fn containers_without_resources_are_skipped() {
        let pods = vec![pod(
            "tools",
            "Running",
            vec![
                ContainerSnapshot { resources: None },
                ContainerSnapshot {
                    resources: Some(ResourceSpec {
                        requests: None,
                        limits: Some(map(&[("cpu", "100m")])),
                    }),
                },
            ],
        )];

        let totals = summarize_pods(&pods).expect("pods should aggregate");
        assert_eq!(totals["tools"].cpu_limit, 100_000_000);
        assert_eq!(totals["tools"].cpu_request, 0);
    }

    #[test]
    fn unsuffixed_pod_memory_aborts_aggregation() {
        let pods = vec![pod(
            "legacy",
            "Running",
            vec![container(&[("memory", "128974848")], &[])],
        )];

        let error = summarize_pods(&pods).expect_err("bare memory bytes should fail");
        assert!(matches!(
            error.downcast_ref::<QuantityError>(),
            Some(QuantityError::UnknownUnit { .. })
        ));
        assert!(format!("{error:#}").contains("legacy"));
    }

    #[test]
    fn overflowing_namespace_total_is_an_error() {
        let pods = vec![pod(
            "huge",
            "Running",
            vec![
                container(&[("memory", "16000000Ti")], &[]),
                container(&[("memory", "16000000Ti")], &[]),
            ],
        )];

        let error = summarize_pods(&pods).expect_err("summed memory should overflow");
        let message = format!("{error:#}");
        assert!(message.contains("memory request"));
        assert!(message.contains("namespace huge"));
    }

    #[test]
    fn overflowing_node_capacity_is_an_error() {
        let nodes = vec![
            NodeSnapshot {
                name: "node-a".to_string(),
                capacity: map(&[("ephemeral-storage", "16000000Ti")]),
            },
            NodeSnapshot {
                name: "node-b".to_string(),
                capacity: map(&[("ephemeral-storage", "16000000Ti")]),
            },
        ];

        let error = cluster_capacity(&nodes).expect_err("summed storage should overflow");
        assert!(format!("{error:#}").contains("node node-b"));
    }

    #[test]
    fn unrecognized_capacity_suffix_reads_as_bytes() {
        let nodes = vec![NodeSnapshot {
            name: "node-a".to_string(),
            capacity: map(&[("memory", "12Pi"), ("ephemeral-storage", "1Ki")]),
        }];

        let capacity = cluster_capacity(&nodes).expect("fallback applies to node capacity");
        assert_eq!(capacity.memory, 12);
        assert_eq!(capacity.storage, 1024);
    }

    #[test]
    fn metrics_treat_bare_cpu_as_nanocores() {
        let metrics = vec![
            PodMetricsSnapshot {
                namespace: "web".to_string(),
                containers: vec![
                    ContainerUsage {
                        cpu: "1500000n".to_string(),
                        memory: "1024Ki".to_string(),
                    },
                    ContainerUsage {
                        cpu: "500".to_string(),
                        memory: "1Mi".to_string(),
                    },
                ],
            },
            PodMetricsSnapshot {
                namespace: "web".to_string(),
                containers: vec![ContainerUsage {
                    cpu: "2m".to_string(),
                    memory: "0".to_string(),
                }],
            },
        ];

        let usage = summarize_metrics(&metrics).expect("metrics should aggregate");
        assert_eq!(usage["web"].cpu_usage, 1_500_000 + 500 + 2_000_000);
        assert_eq!(usage["web"].mem_usage, 2 * 1024 * 1024);
    }

    #[test]
    fn capacity_sums_nodes_with_byte_fallback() {
        let nodes = vec![
            NodeSnapshot {
                name: "node-a".to_string(),
                capacity: map(&[
                    ("cpu", "4"),
                    ("memory", "16318412Ki"),
                    ("ephemeral-storage", "101430960Ki"),
                ]),
            },
            NodeSnapshot {
                name: "node-b".to_string(),
                capacity: map(&[("cpu", "2"), ("memory", "1000000")]),
            },
        ];

        let capacity = cluster_capacity(&nodes).expect("nodes should aggregate");
        assert_eq!(capacity.cpu, 6_000_000_000);
        assert_eq!(capacity.memory, 16_318_412 * 1024 + 1_000_000);
        assert_eq!(capacity.storage, 101_430_960 * 1024);
    }

    #[test]
    fn empty_inputs_yield_empty_totals() {
        assert!(summarize_pods(&Vec::<PodSnapshot>::new()).unwrap().is_empty());
        assert!(
            summarize_metrics(&Vec::<PodMetricsSnapshot>::new())
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            cluster_capacity(&Vec::<NodeSnapshot>::new()).unwrap(),
            ClusterCapacity::default()
        );
    }

    fn arb_pod() -> impl Strategy<Value = PodSnapshot> {
        (
            prop::sample::select(vec!["a", "b", "c"]),
            prop::sample::select(vec!["Running", "Running", "Pending"]),
            prop::collection::vec((0u32..4_000, 0u32..4_096, 0u32..64), 0..4),
        )
            .prop_map(|(namespace, phase, containers)| PodSnapshot {
                namespace: namespace.to_string(),
                phase: phase.to_string(),
                containers: containers
                    .into_iter()
                    .map(|(cpu, memory, storage)| ContainerSnapshot {
                        resources: Some(ResourceSpec {
                            requests: Some(
                                [
                                    ("cpu".to_string(), format!("{cpu}m")),
                                    ("memory".to_string(), format!("{memory}Mi")),
                                ]
                                .into_iter()
                                .collect(),
                            ),
                            limits: Some(
                                [("ephemeral-storage".to_string(), format!("{storage}Gi"))]
                                    .into_iter()
                                    .collect(),
                            ),
                        }),
                    })
                    .collect(),
            })
    }

    proptest! {
        #[test]
        fn pod_order_does_not_change_totals(
            (pods, shuffled) in prop::collection::vec(arb_pod(), 0..12)
                .prop_flat_map(|pods| (Just(pods.clone()), Just(pods).prop_shuffle()))
        ) {
            let forward = summarize_pods(&pods).unwrap();
            let permuted = summarize_pods(&shuffled).unwrap();
            prop_assert_eq!(forward, permuted);
        }
    }
}
