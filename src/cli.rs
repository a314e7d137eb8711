//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::route::Route;

#[derive(Debug, Clone, Parser)]
#[command(name = "plaza", version, about = "Terminal client for the Plaza community")]
pub struct Cli {
    /// Path to the configuration file [default: ./plaza.toml if present]
    #[arg(long, env = "PLAZA_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Base URL of the REST API, overriding `api.base_url`.
    #[arg(long, env = "PLAZA_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// Run against built-in sample data instead of the API.
    #[arg(long)]
    pub demo: bool,

    /// Log level or filter directive, overriding `log.level`.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Screen to open first, e.g. `/posts/p-1` or `/wallet`.
    #[arg(long, value_name = "PATH", default_value = "/")]
    pub open: Route,
}

impl Cli {
    /// Applies the command-line overrides to `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.api.base_url.clone_from(url);
        }
        if let Some(level) = &self.log_level {
            config.log.level.clone_from(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "plaza",
            "--config",
            "other.toml",
            "--api-url",
            "https://plaza.example/api",
            "--demo",
            "--log-level",
            "debug",
            "--open",
            "/posts/p-1",
        ])
        .expect("valid arguments");

        assert_eq!(cli.config, Some(PathBuf::from("other.toml")));
        assert!(cli.demo);
        assert_eq!(cli.open, Route::PostDetail("p-1".into()));

        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.api.base_url, "https://plaza.example/api");
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_no_overrides_keep_file_values() {
        let cli = Cli::try_parse_from(["plaza"]).expect("no arguments");
        assert_eq!(cli.open, Route::Feed);
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_unknown_screen_is_rejected() {
        assert!(Cli::try_parse_from(["plaza", "--open", "/settings"]).is_err());
    }
}
