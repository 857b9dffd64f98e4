//! Command line arguments

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the JSON config file
    #[arg(short = 'c', long, default_value = "./files/config.json")]
    pub config: PathBuf,

    /// Google service account key, or a file holding an access token
    #[arg(short = 'g', long, default_value = "./files/gcloud.json")]
    pub gcloud: PathBuf,

    /// Directory for app.log and error.log
    #[arg(short = 'l', long, default_value = "./logs")]
    pub log_dir: PathBuf,

    /// Verbose console and file logging
    #[arg(short = 'd', long, default_value_t = false)]
    pub debug: bool,

    /// Keep running and repeat every `retry_interval` hours
    #[arg(short = 'w', long, default_value_t = false)]
    pub watchdog: bool,

    /// Skip the cooldown check on the sheet markers
    #[arg(long, default_value_t = false)]
    pub skip_checks: bool,

    /// Run self checks and exit
    #[arg(short = 'a', long, default_value_t = false)]
    pub analysis: bool,

    /// Print price history statistics and exit
    #[arg(short = 'z', long, default_value_t = false)]
    pub stats: bool,

    /// Items for `--stats`, comma separated, `all` for every item
    #[arg(long, value_delimiter = ',', default_value = "all")]
    pub stats_items: Vec<String>,

    /// Range for `--stats` like `7d` or `12h`, blank for all time
    #[arg(long, default_value = "")]
    pub stats_range: String,

    /// Read the configuration from environment variables
    #[arg(short = 'e', long, default_value_t = false)]
    pub env: bool,

    /// Dotenv file loaded before reading the environment
    #[arg(long, requires = "env")]
    pub env_file: Option<PathBuf>,

    /// Do not look for new releases
    #[arg(long, default_value_t = false)]
    pub disable_updates: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["steamquery"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("./files/config.json"));
        assert_eq!(cli.gcloud, PathBuf::from("./files/gcloud.json"));
        assert_eq!(cli.log_dir, PathBuf::from("./logs"));
        assert!(!cli.watchdog);
        assert!(!cli.env);
        assert_eq!(cli.stats_items, vec!["all".to_string()]);
        assert!(cli.stats_range.is_empty());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "steamquery",
            "-w",
            "-d",
            "--skip-checks",
            "-e",
            "--env-file",
            "prod.env",
            "-z",
            "--stats-items",
            "AK-47,AWP",
            "--stats-range",
            "7d",
        ])
        .unwrap();
        assert!(cli.watchdog && cli.debug && cli.skip_checks && cli.stats);
        assert_eq!(cli.env_file, Some(PathBuf::from("prod.env")));
        assert_eq!(cli.stats_items, vec!["AK-47".to_string(), "AWP".to_string()]);
        assert_eq!(cli.stats_range, "7d");
    }

    #[test]
    fn test_env_file_requires_env() {
        assert!(Cli::try_parse_from(["steamquery", "--env-file", "x.env"]).is_err());
    }
}
