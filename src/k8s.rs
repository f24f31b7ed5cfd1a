use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, Config, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::future::Future;
use tokio::time::{Duration, timeout};
use tracing::{debug, info};

use crate::model::{
    ContainerSnapshot, ContainerUsage, NodeSnapshot, PodMetricsSnapshot, PodSnapshot,
    QuantityMap, ResourceSpec,
};

const PAGE_SIZE: u32 = 500;

/// Raw cluster state gathered for one report.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pub pods: Vec<PodSnapshot>,
    pub metrics: Vec<PodMetricsSnapshot>,
    pub nodes: Vec<NodeSnapshot>,
}

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    context: String,
    cluster: String,
    request_timeout: Duration,
}

impl KubeGateway {
    pub async fn new(context: Option<String>, request_timeout: Duration) -> Result<Self> {
        let kubeconfig = Kubeconfig::read().ok();

        let config = if let Some(kubeconfig_value) = kubeconfig.clone() {
            let options = KubeConfigOptions {
                context: context.clone(),
                cluster: None,
                user: None,
            };
            Config::from_custom_kubeconfig(kubeconfig_value, &options)
                .await
                .context("failed to infer Kubernetes configuration")?
        } else {
            if context.is_some() {
                anyhow::bail!("kubeconfig not found; cannot select a context in this environment");
            }
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let cluster = config.cluster_url.to_string();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;
        let context = context
            .or_else(|| kubeconfig.and_then(|cfg| cfg.current_context))
            .unwrap_or_else(|| "in-cluster".to_string());

        info!(%context, %cluster, "connected to cluster");
        Ok(Self {
            client,
            context,
            cluster,
            request_timeout,
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Lists pods, pod metrics and nodes, one call after the other.
    pub async fn fetch_snapshot(&self) -> Result<ClusterSnapshot> {
        let pods = self.fetch_pods().await?;
        let metrics = self.fetch_pod_metrics().await?;
        let nodes = self.fetch_nodes().await?;
        Ok(ClusterSnapshot {
            pods,
            metrics,
            nodes,
        })
    }

    async fn fetch_pods(&self) -> Result<Vec<PodSnapshot>> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let pods = self
            .bounded("pods", list_all(&api))
            .await
            .context("failed to list pods")?;
        debug!(count = pods.len(), "listed pods");
        Ok(pods.into_iter().map(pod_snapshot).collect())
    }

    async fn fetch_nodes(&self) -> Result<Vec<NodeSnapshot>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = self
            .bounded("nodes", list_all(&api))
            .await
            .context("failed to list nodes")?;
        debug!(count = nodes.len(), "listed nodes");
        Ok(nodes.into_iter().map(node_snapshot).collect())
    }

    async fn fetch_pod_metrics(&self) -> Result<Vec<PodMetricsSnapshot>> {
        let gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        let resource = ApiResource::from_gvk_with_plural(&gvk, "pods");
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);
        let metrics = self
            .bounded("pod metrics", list_all(&api))
            .await
            .context("failed to list pod metrics (is metrics-server installed?)")?;
        debug!(count = metrics.len(), "listed pod metrics");
        Ok(metrics.into_iter().map(pod_metrics_snapshot).collect())
    }

    async fn bounded<T>(&self, what: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        timeout(self.request_timeout, call).await.with_context(|| {
            format!(
                "timed out after {}s listing {what}",
                self.request_timeout.as_secs()
            )
        })?
    }
}

async fn list_all<K>(api: &Api<K>) -> Result<Vec<K>>
where
    K: Clone + DeserializeOwned + Debug,
{
    let mut items = Vec::new();
    let mut continue_token: Option<String> = None;

    loop {
        let mut params = ListParams::default().limit(PAGE_SIZE);
        if let Some(token) = continue_token.as_deref() {
            params = params.continue_token(token);
        }

        let page = api.list(&params).await?;
        items.extend(page.items);
        continue_token = page.metadata.continue_.filter(|token| !token.is_empty());
        if continue_token.is_none() {
            return Ok(items);
        }
    }
}

fn pod_snapshot(pod: Pod) -> PodSnapshot {
    let namespace = pod.namespace().unwrap_or_else(|| "-".to_string());
    let phase = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.clone())
        .unwrap_or_default();
    let containers = pod
        .spec
        .map(|spec| spec.containers)
        .unwrap_or_default()
        .into_iter()
        .map(|container| ContainerSnapshot {
            resources: container.resources.map(|resources| ResourceSpec {
                requests: resources.requests.map(quantity_map),
                limits: resources.limits.map(quantity_map),
            }),
        })
        .collect();

    PodSnapshot {
        namespace,
        phase,
        containers,
    }
}

fn node_snapshot(node: Node) -> NodeSnapshot {
    let name = node.name_any();
    let capacity = node
        .status
        .and_then(|status| status.capacity)
        .map(quantity_map)
        .unwrap_or_default();
    NodeSnapshot { name, capacity }
}

fn pod_metrics_snapshot(pod_metric: DynamicObject) -> PodMetricsSnapshot {
    let namespace = pod_metric.namespace().unwrap_or_else(|| "-".to_string());
    let containers = pod_metric
        .data
        .get("containers")
        .and_then(Value::as_array)
        .map(|containers| containers.iter().map(container_usage).collect())
        .unwrap_or_default();
    PodMetricsSnapshot {
        namespace,
        containers,
    }
}

fn container_usage(container: &Value) -> ContainerUsage {
    let usage = &container["usage"];
    let field = |key: &str| usage.get(key).and_then(Value::as_str).unwrap_or_default();
    ContainerUsage {
        cpu: field("cpu").to_string(),
        memory: field("memory").to_string(),
    }
}

fn quantity_map(map: BTreeMap<String, Quantity>) -> QuantityMap {
    map.into_iter()
        .map(|(name, quantity)| (name, quantity.0))
        .collect()
}
