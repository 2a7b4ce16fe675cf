//! Server configuration, from command-line flags or the environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::recommender::RankerConfig;

/// Beer recommendation web server
#[derive(Parser, Debug, Clone)]
#[command(name = "server")]
#[command(about = "Serves beer neighbours and rating predictions from a pre-trained k-NN model", long_about = None)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Persisted k-NN model artifact
    #[arg(long, env = "KNN_MODEL_PATH", default_value = "data/dump/knn_model.json")]
    pub model_path: PathBuf,

    /// Beer metadata table
    #[arg(long, env = "BEERS_PATH", default_value = "data/dump/beer_final.tsv")]
    pub beers_path: PathBuf,

    /// Threads used to score the catalog for one ranking request
    /// (defaults to the number of CPUs)
    #[arg(long, env = "RANK_WORKERS")]
    pub workers: Option<usize>,

    /// Deadline for one ranking request, in milliseconds
    #[arg(long, env = "RANK_DEADLINE_MS", default_value_t = 30_000)]
    pub rank_deadline_ms: u64,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ranker_config(&self) -> RankerConfig {
        let defaults = RankerConfig::default();
        RankerConfig {
            workers: self.workers.unwrap_or(defaults.workers),
            deadline: Duration::from_millis(self.rank_deadline_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "server",
            "--port",
            "9000",
            "--workers",
            "3",
            "--rank-deadline-ms",
            "250",
            "--beers-path",
            "/tmp/beers.tsv",
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.beers_path, PathBuf::from("/tmp/beers.tsv"));
        let ranker = config.ranker_config();
        assert_eq!(ranker.workers, 3);
        assert_eq!(ranker.deadline, Duration::from_millis(250));
    }

    #[test]
    fn test_bind_address() {
        let config =
            ServerConfig::try_parse_from(["server", "--host", "127.0.0.1", "--port", "8081"])
                .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8081");
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(ServerConfig::try_parse_from(["server", "--port", "eighty"]).is_err());
    }
}
