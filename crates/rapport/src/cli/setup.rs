use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rapport", bin_name = "rapport", version)]
#[command(about = "Operator tool for the Rapport-Tool record store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (TOML). Environment variables override it.
    #[arg(
        short,
        long,
        global = true,
        env = "RAPPORT_CONFIG",
        default_value = "rapport.toml",
        help_heading = "Options"
    )]
    pub config: PathBuf,

    /// Login for commands that act as a user
    #[arg(short, long, global = true, env = "RAPPORT_USER", help_heading = "Options")]
    pub user: Option<String>,

    /// Password for --user
    #[arg(
        long,
        global = true,
        env = "RAPPORT_PASSWORD",
        hide_env_values = true,
        help_heading = "Options"
    )]
    pub password: Option<String>,

    /// Debug logging on stderr
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the DB, MELD and FOTOS folders and show where data lives
    Init,

    /// List all reports
    #[command(alias = "ls")]
    List,

    /// Show the identifier the next report would get
    NextId,

    /// Create and show reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Attach a photo to the next free slot of a report
    Photo {
        /// Report identifier (YYMMDD-NNN)
        id: String,
        /// Image file
        file: PathBuf,
    },

    /// Remediation notes
    #[command(subcommand)]
    Massnahme(MassnahmeCommands),

    /// User accounts
    #[command(subcommand)]
    Users(UserCommands),

    /// Print a raw collection
    Dump {
        /// users, rapporte, massnahmen or meldungen
        collection: String,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    /// Create a report as --user
    Create {
        #[arg(long)]
        anlage: String,
        #[arg(long)]
        bereich: String,
        #[arg(long)]
        titel: String,
        #[arg(long)]
        meldung: String,
    },

    /// Show a report's detail document
    Show { id: String },
}

#[derive(Subcommand, Debug)]
pub enum MassnahmeCommands {
    /// Add a note to a report as --user
    Add {
        id: String,
        text: String,
        /// Optional photo
        #[arg(long)]
        photo: Option<PathBuf>,
    },

    /// List a report's notes, oldest first
    List { id: String },
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Write the default accounts if there are none
    Seed,

    /// List accounts (managing roles only)
    List,

    /// Check --user and --password
    Login,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_report_create() {
        let cli = Cli::try_parse_from([
            "rapport", "-u", "admin", "report", "create", "--anlage", "A", "--bereich", "B",
            "--titel", "T", "--meldung", "M",
        ])
        .unwrap();
        assert_eq!(cli.user.as_deref(), Some("admin"));
        match cli.command {
            Commands::Report(ReportCommands::Create { titel, .. }) => assert_eq!(titel, "T"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn parses_massnahme_with_photo() {
        let cli = Cli::try_parse_from([
            "rapport", "massnahme", "add", "250101-000", "erledigt", "--photo", "a.jpg",
        ])
        .unwrap();
        match cli.command {
            Commands::Massnahme(MassnahmeCommands::Add { id, photo, .. }) => {
                assert_eq!(id, "250101-000");
                assert_eq!(photo, Some(PathBuf::from("a.jpg")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn list_alias() {
        let cli = Cli::try_parse_from(["rapport", "ls"]).unwrap();
        assert!(matches!(cli.command, Commands::List));
    }
}
