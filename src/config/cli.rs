//! Command-line interface.
//!
//! Every flag is optional: an absent flag leaves the value from the config
//! file (or the built-in default) untouched.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::schema::Settings;

#[derive(Debug, Parser)]
#[command(name = "torq")]
#[command(version, about = "Lightning node monitoring daemon", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Start the main daemon
    Start,
    /// Start the subscribe daemon, listening for data from LND
    Subscribe,
    /// Migrates the database to the latest version
    #[command(name = "migrate_up")]
    MigrateUp,
    /// Rolls the database back by one migration
    #[command(name = "migrate_down")]
    MigrateDown,
    /// Query the running daemon's API once and print the response
    Call,
}

/// Explicit overrides, applied on top of the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Path to config file
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Password used to access the API
    #[arg(long = "torq.password", global = true)]
    pub torq_password: Option<String>,

    /// Host address for the API
    #[arg(long = "torq.host", global = true)]
    pub torq_host: Option<String>,

    /// Port for the API (defaults to 8081, next to lnd's REST port)
    #[arg(long = "torq.port", global = true)]
    pub torq_port: Option<u16>,

    /// Path to the cert.pem file used by the API server
    #[arg(long = "torq.cert", global = true)]
    pub torq_cert: Option<String>,

    /// Path to the key.pem file used by the API server
    #[arg(long = "torq.key", global = true)]
    pub torq_key: Option<String>,

    /// Name of the database
    #[arg(long = "db.name", global = true)]
    pub db_name: Option<String>,

    /// Port of the database
    #[arg(long = "db.port", global = true)]
    pub db_port: Option<u16>,

    /// Host of the database
    #[arg(long = "db.host", global = true)]
    pub db_host: Option<String>,

    /// Name of the postgres user with access to the database
    #[arg(long = "db.user", global = true)]
    pub db_user: Option<String>,

    /// Password of the postgres user
    #[arg(long = "db.password", global = true)]
    pub db_password: Option<String>,

    /// REST listener of the lnd node, host:port
    #[arg(long = "lnd.node_address", visible_alias = "na", global = true)]
    pub lnd_node_address: Option<String>,

    /// Path to the node's tls.cert file
    #[arg(long = "lnd.tls", global = true)]
    pub lnd_tls: Option<String>,

    /// Path to the node's admin.macaroon file
    #[arg(long = "lnd.macaroon", global = true)]
    pub lnd_macaroon: Option<String>,
}

impl Overrides {
    /// Write every flag that was given into `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut settings.torq.password, &self.torq_password);
        set(&mut settings.torq.host, &self.torq_host);
        set(&mut settings.torq.port, &self.torq_port);
        set(&mut settings.torq.cert, &self.torq_cert);
        set(&mut settings.torq.key, &self.torq_key);

        set(&mut settings.db.name, &self.db_name);
        set(&mut settings.db.port, &self.db_port);
        set(&mut settings.db.host, &self.db_host);
        set(&mut settings.db.user, &self.db_user);
        set(&mut settings.db.password, &self.db_password);

        set(&mut settings.lnd.node_address, &self.lnd_node_address);
        set(&mut settings.lnd.tls, &self.lnd_tls);
        set(&mut settings.lnd.macaroon, &self.lnd_macaroon);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_flags_parse() {
        let cli = Cli::try_parse_from([
            "torq",
            "--db.name",
            "other",
            "--na",
            "node:8080",
            "start",
            "--torq.port",
            "9000",
        ])
        .unwrap();

        assert_eq!(cli.command, Command::Start);
        assert_eq!(cli.overrides.db_name.as_deref(), Some("other"));
        assert_eq!(cli.overrides.lnd_node_address.as_deref(), Some("node:8080"));
        assert_eq!(cli.overrides.torq_port, Some(9000));
    }

    #[test]
    fn test_migrate_commands_keep_underscored_names() {
        let cli = Cli::try_parse_from(["torq", "migrate_down"]).unwrap();
        assert_eq!(cli.command, Command::MigrateDown);
    }

    #[test]
    fn test_absent_flags_leave_settings_untouched() {
        let mut settings = Settings::default();
        settings.db.host = "from-file".to_string();

        let overrides = Overrides {
            db_user: Some("alice".to_string()),
            ..Default::default()
        };
        overrides.apply(&mut settings);

        assert_eq!(settings.db.host, "from-file");
        assert_eq!(settings.db.user, "alice");
    }
}
