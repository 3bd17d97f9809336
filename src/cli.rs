use clap::{Parser, Subcommand};
use kube::config::Kubeconfig;
use std::path::PathBuf;

use crate::adapters::kube_contexts::kubeconfig_contexts;
use crate::adapters::select_contexts;
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "kubesight-alerts")]
#[command(version)]
#[command(about = "Watches CloudNativePG clusters and posts health alerts to Mattermost", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding default.toml and environment overlays
    #[arg(long, default_value = "config", env = "KUBESIGHT_CONFIG_DIR")]
    pub config_dir: PathBuf,

    /// Kubeconfig context to watch (repeatable, replaces the configured list)
    #[arg(long = "context", value_name = "NAME")]
    pub contexts: Vec<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Watch clusters and send alerts (default)
    Run,
    /// List allowed contexts present in the kubeconfig
    Contexts,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }

    /// Contexts from the command line, if any were given
    pub fn context_overrides(&self) -> Option<Vec<String>> {
        if self.contexts.is_empty() {
            None
        } else {
            Some(self.contexts.clone())
        }
    }
}

/// Print every kubeconfig context, marking the ones that will be watched
pub fn list_contexts(allowed: &[String]) -> Result<()> {
    let kubeconfig = Kubeconfig::read()?;
    let available = kubeconfig_contexts(&kubeconfig);
    let selected = select_contexts(&available, allowed);

    println!("   CONTEXT");
    for name in &available {
        let marker = if selected.contains(name) { "*" } else { "" };
        println!("{:<3}{}", marker, name);
    }

    for name in allowed.iter().filter(|name| !available.contains(name)) {
        println!("{:<3}{} (not in kubeconfig)", "-", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_run() {
        let cli = Cli::parse_from(["kubesight-alerts"]);
        assert_eq!(cli.command(), Commands::Run);
        assert_eq!(cli.config_dir, PathBuf::from("config"));
        assert!(cli.context_overrides().is_none());
    }

    #[test]
    fn test_repeated_context_flags() {
        let cli = Cli::parse_from([
            "kubesight-alerts",
            "--context",
            "prod",
            "--context",
            "ovh-prod",
            "contexts",
        ]);
        assert_eq!(cli.command(), Commands::Contexts);
        assert_eq!(
            cli.context_overrides(),
            Some(vec!["prod".to_string(), "ovh-prod".to_string()])
        );
    }
}
