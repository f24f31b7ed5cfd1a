use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

pub const CPU: &str = "cpu";
pub const MEMORY: &str = "memory";
pub const EPHEMERAL_STORAGE: &str = "ephemeral-storage";
pub const RUNNING_PHASE: &str = "Running";

/// Resource name to raw quantity string, as found in pod specs and node status.
pub type QuantityMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PodSnapshot {
    pub namespace: String,
    pub phase: String,
    pub containers: Vec<ContainerSnapshot>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ContainerSnapshot {
    pub resources: Option<ResourceSpec>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ResourceSpec {
    pub requests: Option<QuantityMap>,
    pub limits: Option<QuantityMap>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct NodeSnapshot {
    pub name: String,
    pub capacity: QuantityMap,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct PodMetricsSnapshot {
    pub namespace: String,
    pub containers: Vec<ContainerUsage>,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ContainerUsage {
    pub cpu: String,
    pub memory: String,
}

/// Declared requests and limits of one namespace. CPU in nanocores, the rest
/// in bytes.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ResourceTotals {
    pub cpu_request: u64,
    pub cpu_limit: u64,
    pub mem_request: u64,
    pub mem_limit: u64,
    pub storage_request: u64,
    pub storage_limit: u64,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct UsageTotals {
    pub cpu_usage: u64,
    pub mem_usage: u64,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ClusterCapacity {
    pub cpu: u64,
    pub memory: u64,
    pub storage: u64,
}

/// An absolute amount and its share of the matching capacity dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measure {
    pub amount: u64,
    pub percent: f64,
}

impl Measure {
    pub fn of(amount: u64, capacity: u64) -> Self {
        Self {
            amount,
            percent: percent_of(amount, capacity),
        }
    }

    pub fn full(amount: u64) -> Self {
        Self {
            amount,
            percent: 100.0,
        }
    }

    fn plus(self, other: Self) -> Self {
        Self {
            amount: self.amount.saturating_add(other.amount),
            percent: self.percent + other.percent,
        }
    }
}

/// Share of `capacity` taken by `amount`, in percent. A zero capacity yields 0.
pub fn percent_of(amount: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        return 0.0;
    }
    amount as f64 / capacity as f64 * 100.0
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RowKind {
    Namespace,
    TotalUsed,
    TotalCapacity,
}

impl RowKind {
    pub fn is_summary(self) -> bool {
        !matches!(self, Self::Namespace)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub namespace: String,
    pub kind: RowKind,
    pub cpu_request: Measure,
    pub cpu_limit: Measure,
    pub cpu_usage: Measure,
    pub mem_request: Measure,
    pub mem_limit: Measure,
    pub mem_usage: Measure,
    pub storage_request: Measure,
    pub storage_limit: Measure,
}

impl TableRow {
    pub fn empty(namespace: impl Into<String>, kind: RowKind) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            cpu_request: Measure::default(),
            cpu_limit: Measure::default(),
            cpu_usage: Measure::default(),
            mem_request: Measure::default(),
            mem_limit: Measure::default(),
            mem_usage: Measure::default(),
            storage_request: Measure::default(),
            storage_limit: Measure::default(),
        }
    }

    /// Measures in column order.
    pub fn measures(&self) -> [Measure; 8] {
        [
            self.cpu_request,
            self.cpu_limit,
            self.cpu_usage,
            self.mem_request,
            self.mem_limit,
            self.mem_usage,
            self.storage_request,
            self.storage_limit,
        ]
    }

    /// Adds every measure of `other` to this row, amounts and percents alike.
    pub fn accumulate(&mut self, other: &TableRow) {
        self.cpu_request = self.cpu_request.plus(other.cpu_request);
        self.cpu_limit = self.cpu_limit.plus(other.cpu_limit);
        self.cpu_usage = self.cpu_usage.plus(other.cpu_usage);
        self.mem_request = self.mem_request.plus(other.mem_request);
        self.mem_limit = self.mem_limit.plus(other.mem_limit);
        self.mem_usage = self.mem_usage.plus(other.mem_usage);
        self.storage_request = self.storage_request.plus(other.storage_request);
        self.storage_limit = self.storage_limit.plus(other.storage_limit);
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SortKey {
    Name,
    CpuRequest,
    CpuLimit,
    CpuUsage,
    MemRequest,
    MemLimit,
    MemUsage,
    StorageRequest,
    StorageLimit,
}

impl SortKey {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "n" | "name" | "namespace" => Some(Self::Name),
            "cr" | "cpu-request" => Some(Self::CpuRequest),
            "cl" | "cpu-limit" => Some(Self::CpuLimit),
            "cu" | "cpu-usage" => Some(Self::CpuUsage),
            "mr" | "mem-request" => Some(Self::MemRequest),
            "ml" | "mem-limit" => Some(Self::MemLimit),
            "mu" | "mem-usage" => Some(Self::MemUsage),
            "sr" | "storage-request" => Some(Self::StorageRequest),
            "sl" | "storage-limit" => Some(Self::StorageLimit),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::CpuRequest => "cpu-request",
            Self::CpuLimit => "cpu-limit",
            Self::CpuUsage => "cpu-usage",
            Self::MemRequest => "mem-request",
            Self::MemLimit => "mem-limit",
            Self::MemUsage => "mem-usage",
            Self::StorageRequest => "storage-request",
            Self::StorageLimit => "storage-limit",
        }
    }

    /// Amount the row is ordered by, `None` for [`SortKey::Name`].
    pub fn amount(self, row: &TableRow) -> Option<u64> {
        let measure = match self {
            Self::Name => return None,
            Self::CpuRequest => row.cpu_request,
            Self::CpuLimit => row.cpu_limit,
            Self::CpuUsage => row.cpu_usage,
            Self::MemRequest => row.mem_request,
            Self::MemLimit => row.mem_limit,
            Self::MemUsage => row.mem_usage,
            Self::StorageRequest => row.storage_request,
            Self::StorageLimit => row.storage_limit,
        };
        Some(measure.amount)
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}
