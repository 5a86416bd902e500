use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use quill_cli::{
    admin, base_dir, handle_error, init, list_migrations, migrate, rollback, serve, serve_config,
    Result,
};

#[derive(Parser)]
#[command(
    name = "quill",
    version,
    about = "Set up and run a Quill blog",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the saved connection. Defaults to `.quill` in
    /// the working directory.
    #[arg(long, global = true, value_name = "DIR")]
    path: Option<PathBuf>,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database connection.
    Init {
        /// Database backend to use. 'sqlite' or 'docstore'.
        backend: String,
        /// Database connection string. Format depends on backend.
        connection: String,
    },
    /// Apply migrations.
    Migrate,
    /// Rollback migrations. With no arguments, undoes the latest
    /// migration. If the name of a migration is specified, rolls back
    /// until that migration is the latest applied migration.
    Rollback {
        /// Migration to roll back to.
        name: Option<String>,
    },
    /// List migrations.
    List,
    /// Grant a user admin rights.
    Admin {
        username: String,
        /// Take admin rights away instead.
        #[arg(long)]
        revoke: bool,
    },
    /// Migrate the database and run the web server.
    Serve {
        /// Database URL, e.g. sqlite://quill.db. Overrides the saved connection.
        #[arg(long, env = "DATABASE_URL")]
        database_url: Option<String>,
        /// Address to listen on.
        #[arg(long, env = "QUILL_BIND")]
        bind: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .parse_default_env()
        .init();
    handle_error(run(cli));
}

fn run(cli: Cli) -> Result<()> {
    let base_dir = match cli.path {
        Some(path) => path,
        None => base_dir()?,
    };
    match cli.command {
        Commands::Init {
            backend,
            connection,
        } => init(&base_dir, &backend, &connection).map(|_| ()),
        Commands::Migrate => migrate(&base_dir).map(|_| ()),
        Commands::Rollback { name } => rollback(&base_dir, name.as_deref()),
        Commands::List => list_migrations(&base_dir),
        Commands::Admin { username, revoke } => admin(&base_dir, &username, revoke).map(|_| ()),
        Commands::Serve { database_url, bind } => {
            let config = serve_config(&base_dir, database_url, bind)?;
            tokio::runtime::Runtime::new()?.block_on(serve(config))
        }
    }
}
