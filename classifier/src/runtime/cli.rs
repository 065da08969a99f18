use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::runtime::conf::{Backend, conf_serde::level};

/// Command-line overrides. Every field is optional so that only flags the
/// user actually passed are layered over the config file.
#[derive(Parser, Debug, Default, Serialize, Deserialize)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Set the path to the configuration file (e.g., "classifier.yaml").
    #[arg(short, long, value_name = "FILE", env = "CLASSIFIER_CONFIG_PATH")]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Set the application's log level (e.g., "debug", "warn").
    #[arg(short, long, value_name = "LEVEL", env = "CLASSIFIER_LOG_LEVEL")]
    #[serde(
        with = "level::option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub log_level: Option<Level>,

    /// Interfaces to observe; repeat the flag or separate with commas.
    #[arg(
        short,
        long = "interface",
        value_name = "IFACE",
        env = "CLASSIFIER_INTERFACES",
        value_delimiter = ','
    )]
    #[serde(
        rename = "interfaces",
        skip_serializing_if = "Vec::is_empty",
        default
    )]
    pub interfaces: Vec<String>,

    /// Where classification runs.
    #[arg(short, long, value_enum, env = "CLASSIFIER_BACKEND")]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub backend: Option<Backend>,

    /// Worker threads for the userspace backend.
    #[arg(short, long, env = "CLASSIFIER_WORKERS")]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub workers: Option<usize>,
}
