//! FinImpact command line interface
//!
//! Drives the service layer against the database named in the settings
//! file: schema setup, seeding, user administration, initiatives, impacts
//! and the dashboard.

mod commands;
mod logging;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use finimpact_drivers::TaskRunner;
use finimpact_services::{AtributoImpacto, EstadoIniciativa, Riesgo, Rol, TipoImpacto};
use rust_decimal::Decimal;

#[derive(Parser, Debug)]
#[command(name = "finimpact")]
#[command(author, version, about = "Track financial initiatives and their impacts")]
#[command(propagate_version = true)]
struct Cli {
    /// Database settings file (defaults to <config dir>/finimpact/finimpact.toml)
    #[arg(short, long, global = true, env = "FINIMPACT_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    credentials: Credentials,

    /// Verbose logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Sign-in for commands that act on behalf of a user
#[derive(Args, Debug, Clone, Default)]
struct Credentials {
    /// Email of the signed-in user
    #[arg(long, global = true, env = "FINIMPACT_EMAIL")]
    email: Option<String>,

    /// Password of the signed-in user
    #[arg(long, global = true, env = "FINIMPACT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the tables if they do not exist
    InitDb,

    /// Create the default admin, analyst and viewer accounts
    SeedUsers,

    /// Make an analyst the owner of initiatives, by exact name
    Assign {
        /// Analyst email
        #[arg(long, default_value = "analista@finimpact.com")]
        analyst: String,

        /// Initiative names (defaults to the demo set)
        names: Vec<String>,
    },

    /// Check the credentials and show the signed-in user
    Login,

    /// Change the signed-in user's password (--password is the current one)
    Password {
        /// New password, at least 6 characters
        #[arg(long = "new")]
        nueva: String,

        /// New password again
        #[arg(long = "confirm")]
        confirmacion: String,
    },

    /// User administration (admin only)
    Users {
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Initiative management
    Initiatives {
        #[command(subcommand)]
        action: InitiativeCommand,
    },

    /// Impact management
    Impacts {
        #[command(subcommand)]
        action: ImpactCommand,
    },

    /// Key figures for the initiatives visible to the signed-in user
    Dashboard {
        /// Restrict to one owner (ignored for analysts)
        #[arg(long)]
        owner: Option<i64>,

        /// Restrict to initiatives with this exact name
        #[arg(long)]
        name: Option<String>,
    },

    /// Acquire every pooled connection, ping it and show pool statistics
    PoolCheck,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// List active users
    List {
        #[arg(long)]
        role: Option<Rol>,

        /// Substring of the name or email
        #[arg(long)]
        search: Option<String>,
    },

    /// Create a user
    Create {
        #[arg(long)]
        name: String,

        #[arg(long = "user-email")]
        user_email: String,

        #[arg(long = "user-password")]
        user_password: String,

        #[arg(long, default_value = "viewer")]
        role: Rol,
    },

    /// Mark a user inactive
    Deactivate { id: i64 },
}

#[derive(Subcommand, Debug)]
enum InitiativeCommand {
    /// List initiatives in scope
    List {
        #[arg(long)]
        state: Option<EstadoIniciativa>,

        #[arg(long)]
        risk: Option<Riesgo>,

        /// Substring of the name
        #[arg(long)]
        search: Option<String>,
    },

    /// Create an initiative
    Create(NewInitiative),

    /// Delete an initiative and its impacts
    Delete { id: i64 },
}

#[derive(Args, Debug)]
struct NewInitiative {
    #[arg(long)]
    name: String,

    #[arg(long = "type")]
    tipo: String,

    #[arg(long, default_value = "")]
    description: String,

    #[arg(long)]
    start: Option<NaiveDate>,

    #[arg(long)]
    end: Option<NaiveDate>,

    #[arg(long, default_value = "planeado")]
    state: EstadoIniciativa,

    #[arg(long, default_value = "medio")]
    risk: Riesgo,

    /// Owner user id (analysts always own what they create)
    #[arg(long)]
    owner: Option<i64>,
}

#[derive(Subcommand, Debug)]
enum ImpactCommand {
    /// List impacts in scope
    List {
        #[arg(long = "type")]
        tipo: Option<TipoImpacto>,

        #[arg(long)]
        attribute: Option<AtributoImpacto>,

        /// Substring of the impact type
        #[arg(long)]
        search: Option<String>,
    },

    /// Record an impact on an initiative
    Create(NewImpact),

    /// Delete an impact
    Delete { id: i64 },

    /// Count and signed total per impact type
    Stats,
}

#[derive(Args, Debug)]
struct NewImpact {
    #[arg(long)]
    initiative: i64,

    #[arg(long = "type")]
    tipo: TipoImpacto,

    #[arg(long, default_value = "Real")]
    attribute: AtributoImpacto,

    #[arg(long)]
    date: NaiveDate,

    #[arg(long)]
    amount: Decimal,

    /// Record the amount as a negative impact
    #[arg(long)]
    negative: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.verbose {
        logging::LoggingConfig::development()
    } else {
        logging::LoggingConfig::production()
    };
    let _log_guard = logging::init(config).context("failed to initialize logging")?;

    let runner = TaskRunner::with_defaults().context("failed to start the worker runtime")?;
    let result = runner.block_on(commands::run(cli, &runner));
    runner.shutdown(Duration::from_secs(5));

    if let Err(e) = &result {
        tracing::error!(error = %e, "command failed");
    }
    result
}
