use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CONFIG, ENV_DATABASE_MAX_CONNECTIONS, ENV_DATABASE_PATH, ENV_HOST, ENV_PORT,
    ENV_SEARCH_MAX_PAGE_LIMIT,
};

#[derive(Parser)]
#[command(name = "memberbase")]
#[command(version, about = "Membership CRM search service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// SQLite database file (`:memory:` for a throwaway database)
    #[arg(long, global = true, env = ENV_DATABASE_PATH)]
    pub database_path: Option<String>,

    /// SQLite connection pool size
    #[arg(long, global = true, env = ENV_DATABASE_MAX_CONNECTIONS)]
    pub database_max_connections: Option<u32>,

    /// Largest page size a search may request
    #[arg(long, global = true, env = ENV_SEARCH_MAX_PAGE_LIMIT)]
    pub search_max_page_limit: Option<u32>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// Create or upgrade the database schema, then exit
    Migrate,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub database_path: Option<String>,
    pub database_max_connections: Option<u32>,
    pub search_max_page_limit: Option<u32>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        database_path: cli.database_path,
        database_max_connections: cli.database_max_connections,
        search_max_page_limit: cli.search_max_page_limit,
    };
    (config, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "memberbase",
            "--port",
            "8080",
            "--database-path",
            ":memory:",
            "migrate",
        ])
        .unwrap();

        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.database_path.as_deref(), Some(":memory:"));
        assert!(matches!(cli.command, Some(Commands::Migrate)));
    }

    #[test]
    fn test_no_subcommand_means_start() {
        let cli = Cli::try_parse_from(["memberbase"]).unwrap();
        assert!(cli.command.is_none());
    }
}
