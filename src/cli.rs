use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kube-utilization",
    version,
    disable_version_flag = true,
    about = "Per-namespace CPU, memory and storage requests, limits and usage against cluster capacity."
)]
pub struct CliArgs {
    /// Print version
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    version: (),

    /// Output data as CSV
    #[arg(long)]
    pub csv: bool,

    /// Sort namespaces by field: name|cpu-request|cpu-limit|cpu-usage|mem-request|mem-limit|
    /// mem-usage|storage-request|storage-limit (short: n|cr|cl|cu|mr|ml|mu|sr|sl)
    #[arg(short, long, value_name = "KEY")]
    pub sort_by: Option<String>,

    /// Kubeconfig context to query instead of the current one
    #[arg(long)]
    pub context: Option<String>,

    /// Timeout in seconds for each list call against the cluster
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,

    /// Disable the severity colors in table output
    #[arg(long)]
    pub no_color: bool,

    /// tracing filter (for example: warn,info,debug)
    #[arg(long, default_value = "warn")]
    pub log_filter: String,
}
