use crate::provider::ProviderArgs;
use crate::workflow_error;
use anyhow::{Context, Result};
use clap::Parser;
use eksflow_model::constants::DEFAULT_CHUNK_SIZE;
use eksflow_model::ClusterSummary;
use eksflow_orchestrator::{get_clusters, GetClustersRequest};
use eksflow_providers::AwsInfrastructure;
use std::str::FromStr;
use tabled::{Style, Table, Tabled, Width};
use terminal_size::{Height, Width as TerminalWidth};

/// How `get cluster` prints its results.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            _ => Err(format!(
                "Unknown output format '{}', expected table, json or yaml",
                s
            )),
        }
    }
}

#[derive(Debug, Parser)]
pub(crate) enum Get {
    /// List clusters.
    #[clap(alias = "clusters")]
    Cluster(GetClusterArgs),
}

impl Get {
    pub(crate) async fn run(self) -> Result<()> {
        match self {
            Get::Cluster(args) => args.run().await,
        }
    }
}

#[derive(Debug, Parser)]
pub(crate) struct GetClusterArgs {
    /// The name of a cluster to show.
    #[clap(value_name = "NAME")]
    name_argument: Option<String>,

    /// The name of a cluster to show, as a flag.
    #[clap(long, short = 'n')]
    name: Option<String>,

    /// List clusters in every supported region.
    #[clap(long, short = 'A')]
    all_regions: bool,

    /// How many clusters to fetch per request. 0 fetches as many as the service allows.
    #[clap(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    #[clap(flatten)]
    provider: ProviderArgs,

    /// The output format [table|json|yaml].
    #[clap(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

impl GetClusterArgs {
    fn request(&self) -> GetClustersRequest {
        GetClustersRequest {
            name_flag: self.name.clone(),
            name_argument: self.name_argument.clone(),
            all_regions: self.all_regions,
            region_given: self.provider.region_given(),
            chunk_size: self.chunk_size,
        }
    }

    async fn run(self) -> Result<()> {
        let provider = self.provider.config(None);
        let infra = AwsInfrastructure::new(&provider).await;
        let clusters = get_clusters(&infra, &provider, &self.request())
            .await
            .map_err(|e| workflow_error(e, &provider.region, None))?;
        println!("{}", render(&clusters, self.output)?);
        Ok(())
    }
}

/// A row of the cluster table.
#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "REGION")]
    region: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "VERSION")]
    #[tabled(display_with = "display_option")]
    version: Option<String>,
}

fn display_option(o: &Option<String>) -> String {
    o.clone().unwrap_or_default()
}

impl From<&ClusterSummary> for ClusterRow {
    fn from(cluster: &ClusterSummary) -> Self {
        Self {
            name: cluster.name.clone(),
            region: cluster.region.clone(),
            status: cluster.status.clone(),
            version: cluster.version.clone(),
        }
    }
}

fn render(clusters: &[ClusterSummary], output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Json => {
            serde_json::to_string_pretty(clusters).context("Could not create JSON from clusters")
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(clusters).context("Could not create YAML from clusters")
        }
        OutputFormat::Table => {
            if clusters.is_empty() {
                return Ok("No clusters found".to_string());
            }
            let (TerminalWidth(width), _) = terminal_size::terminal_size()
                .unwrap_or((TerminalWidth(120), Height(0)));
            Ok(Table::new(clusters.iter().map(ClusterRow::from))
                .with(Style::blank())
                .with(Width::truncate(width as usize))
                .to_string())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn clusters() -> Vec<ClusterSummary> {
        vec![ClusterSummary {
            name: "dev".to_string(),
            region: "us-west-2".to_string(),
            status: "ACTIVE".to_string(),
            version: Some("1.24".to_string()),
            endpoint: None,
        }]
    }

    #[test]
    fn table() {
        let table = render(&clusters(), OutputFormat::Table).unwrap();
        assert!(table.contains("NAME"));
        assert!(table.contains("ACTIVE"));
        assert!(table.contains("1.24"));
        assert_eq!(
            render(&[], OutputFormat::Table).unwrap(),
            "No clusters found"
        );
    }

    #[test]
    fn json() {
        let json = render(&clusters(), OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["name"], "dev");
        assert!(parsed[0].get("endpoint").is_none());
    }

    #[test]
    fn yaml() {
        let yaml = render(&clusters(), OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("region: us-west-2"));
    }

    #[test]
    fn arguments() {
        let args =
            GetClusterArgs::try_parse_from(["get-cluster", "-A", "-o", "json", "--region=eu-west-1"])
                .unwrap();
        let request = args.request();
        assert!(request.all_regions);
        assert!(request.region_given);
        assert_eq!(request.chunk_size, 100);
        assert_eq!(args.output, OutputFormat::Json);
        assert!(GetClusterArgs::try_parse_from(["get-cluster", "-o", "xml"]).is_err());
    }
}
