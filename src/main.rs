use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use gearguard::models::{Priority, RequestStatus, RequestType};
use gearguard::projection::SortKey;

mod cmd;

#[derive(Parser)]
#[command(name = "gearguard")]
#[command(version, about = "Maintenance request tracker: equipment, requests and a status board")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of gearguard.toml / the per-user config
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// API root, e.g. http://localhost:3000/api/v1. Overrides config and env.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the reference API server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        bind: Option<String>,

        /// JSON file to persist the document store in
        #[arg(long)]
        data: Option<PathBuf>,

        /// Start with an empty equipment/team catalog
        #[arg(long)]
        no_seed: bool,

        /// Enable permissive CORS for a local frontend
        #[arg(long)]
        dev: bool,
    },
    /// Log in and remember the session
    Login {
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = "GEARGUARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account and log in
    Signup {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = "GEARGUARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// End the current session
    Logout,
    /// List equipment, optionally filtered by name or serial number
    Equipment { search: Option<String> },
    /// List maintenance teams
    Teams,
    /// List requests as a table
    List {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Show requests grouped into status lanes
    Board {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Show one request in detail
    Show {
        /// Request id or unique id prefix
        id: String,
    },
    /// Create a maintenance request
    Create {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        description: String,
        /// Equipment id (see `gearguard equipment`)
        #[arg(long)]
        equipment: String,
        #[arg(long = "type", default_value = "Corrective")]
        kind: RequestType,
        #[arg(long, default_value = "Medium")]
        priority: Priority,
        /// YYYY-MM-DD, preventive requests only
        #[arg(long)]
        scheduled: Option<chrono::NaiveDate>,
        #[arg(long)]
        technician: Option<String>,
        /// Defaults to the equipment's maintenance team
        #[arg(long)]
        team: Option<String>,
    },
    /// Move a request to another status lane
    Move {
        id: String,
        /// New, "In Progress", Completed, "On Hold" or Scrap
        status: RequestStatus,
    },
    /// Edit fields of a request
    Edit {
        id: String,
        #[command(flatten)]
        changes: EditArgs,
    },
    /// Delete a request
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Args, Clone, Default)]
pub struct FilterArgs {
    /// Match subject, equipment name/serial or technician name
    #[arg(short, long, default_value = "")]
    pub search: String,
    #[arg(long, default_value = "all")]
    pub status: String,
    #[arg(long, default_value = "all")]
    pub priority: String,
    #[arg(long = "type", default_value = "all")]
    pub kind: String,
    /// Team name
    #[arg(long)]
    pub team: Option<String>,
    #[arg(long, default_value = "recent")]
    pub sort: SortKey,
}

#[derive(Args, Clone, Default)]
pub struct EditArgs {
    #[arg(long)]
    pub subject: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long = "type")]
    pub kind: Option<RequestType>,
    #[arg(long)]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub status: Option<RequestStatus>,
    #[arg(long)]
    pub equipment: Option<String>,
    #[arg(long)]
    pub team: Option<String>,
    /// Technician id, or "none" to unassign
    #[arg(long)]
    pub technician: Option<String>,
    /// YYYY-MM-DD, or "none" to clear
    #[arg(long)]
    pub scheduled: Option<String>,
    /// Hours worked, or "none" to clear
    #[arg(long)]
    pub duration: Option<String>,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Check the configuration for problems
    Validate,
    /// Write a default gearguard.toml in the current directory
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = gearguard::config::GearGuardConfig::load(cli.config.as_deref())?
        .with_api_url(cli.api_url.clone());
    let _log_guard = gearguard::logging::init(&config.toml.logging, cli.verbose)?;
    config.log_warnings();

    match cli.command {
        Commands::Serve {
            port,
            bind,
            data,
            no_seed,
            dev,
        } => cmd::cmd_serve(&config, port, bind, data, no_seed, dev).await?,
        Commands::Login { email, password } => cmd::cmd_login(&config, email, password).await?,
        Commands::Signup {
            name,
            email,
            password,
        } => cmd::cmd_signup(&config, name, email, password).await?,
        Commands::Logout => cmd::cmd_logout(&config).await?,
        Commands::Equipment { search } => cmd::cmd_equipment(&config, search.as_deref()).await?,
        Commands::Teams => cmd::cmd_teams(&config).await?,
        Commands::List { filters } => cmd::cmd_list(&config, &filters).await?,
        Commands::Board { filters } => cmd::cmd_board(&config, &filters).await?,
        Commands::Show { id } => cmd::cmd_show(&config, &id).await?,
        Commands::Create {
            subject,
            description,
            equipment,
            kind,
            priority,
            scheduled,
            technician,
            team,
        } => {
            let draft = gearguard::models::NewRequest {
                subject,
                description,
                equipment_id: equipment.as_str().into(),
                kind,
                priority,
                scheduled_date: scheduled,
                technician_id: technician.as_deref().map(Into::into),
                team_id: team.as_deref().map(Into::into),
            };
            cmd::cmd_create(&config, draft).await?
        }
        Commands::Move { id, status } => cmd::cmd_move(&config, &id, status).await?,
        Commands::Edit { id, changes } => cmd::cmd_edit(&config, &id, &changes).await?,
        Commands::Delete { id, yes } => cmd::cmd_delete(&config, &id, yes).await?,
        Commands::Config { command } => cmd::cmd_config(&config, command)?,
    }

    Ok(())
}
