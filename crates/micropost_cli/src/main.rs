//! Command-line front end over `micropost_core`.
//!
//! # Responsibility
//! - Map subcommands onto `EntityStore` save/delete/read operations.
//! - Report violations as data (exit 1) and storage failures as errors (exit 2).

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::debug;
use micropost_core::db::open_db;
use micropost_core::{
    init_logging, CoreConfig, DeleteError, DeletePolicy, EntityKind, EntityStore, FieldValues,
    SaveError, SqliteBackend, User, FIELD_CONTENT, FIELD_USER_ID,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

const EXIT_REJECTED: u8 = 1;
const EXIT_FAILED: u8 = 2;

/// A read addressed a record the database does not hold.
#[derive(Debug)]
struct RecordMissing {
    kind: EntityKind,
    id: Uuid,
}

impl Display for RecordMissing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found: {}", self.kind, self.id)
    }
}

impl Error for RecordMissing {}

#[derive(Parser)]
#[command(name = "micropost")]
#[command(about = "Manage users and their microposts in a SQLite database")]
#[command(version)]
struct Cli {
    /// SQLite database file, created when missing.
    #[arg(long, global = true, default_value = "micropost.sqlite3")]
    db: PathBuf,

    /// JSON config file (logging and delete policy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// User records
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Micropost records
    Post {
        #[command(subcommand)]
        action: PostAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    Add {
        name: String,
        email: String,
    },
    Show {
        id: Uuid,
    },
    Delete {
        id: Uuid,
        /// Delete the user's microposts too, overriding the configured policy.
        #[arg(long)]
        cascade: bool,
    },
}

#[derive(Subcommand)]
enum PostAction {
    Add {
        user_id: String,
        content: String,
    },
    List {
        user_id: Uuid,
    },
    Delete {
        id: Uuid,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => CoreConfig::load(path)
            .with_context(|| format!("loading config `{}`", path.display()))?,
        None => CoreConfig::default(),
    };
    if config.log.dir.is_some() {
        init_logging(&config.log).map_err(anyhow::Error::msg)?;
    }
    if let Command::User {
        action: UserAction::Delete { cascade: true, .. },
    } = &cli.command
    {
        config.store.delete_policy = DeletePolicy::Cascade;
    }

    let conn = open_db(&cli.db).with_context(|| format!("opening `{}`", cli.db.display()))?;
    let backend = SqliteBackend::try_new(&conn)?;
    let mut store = EntityStore::new(backend, config.store);
    debug!(
        "event=cli_start module=cli status=ok policy={:?}",
        store.config().delete_policy
    );

    match cli.command {
        Command::User { action } => run_user(&mut store, action),
        Command::Post { action } => run_post(&mut store, action),
    }
}

fn run_user(
    store: &mut EntityStore<SqliteBackend<'_>>,
    action: UserAction,
) -> anyhow::Result<()> {
    match action {
        UserAction::Add { name, email } => {
            let mut user = User::new(name, email);
            let id = store.save_user(&mut user)?;
            println!("{id}");
        }
        UserAction::Show { id } => {
            let user = store.find_user(id)?.ok_or(RecordMissing {
                kind: EntityKind::User,
                id,
            })?;
            let posts = store.microposts_of(id)?;
            println!("id={id}");
            println!("name={}", user.name);
            println!("email={}", user.email);
            println!("microposts={}", posts.len());
        }
        UserAction::Delete { id, .. } => {
            store.delete(EntityKind::User, id)?;
            println!("deleted user {id}");
        }
    }
    Ok(())
}

fn run_post(
    store: &mut EntityStore<SqliteBackend<'_>>,
    action: PostAction,
) -> anyhow::Result<()> {
    match action {
        PostAction::Add { user_id, content } => {
            let fields = FieldValues::new()
                .with(FIELD_USER_ID, user_id)
                .with(FIELD_CONTENT, content);
            let id = store.save(EntityKind::Micropost, &fields, None)?;
            println!("{id}");
        }
        PostAction::List { user_id } => {
            for post in store.microposts_of(user_id)? {
                let id = post.id.map(|id| id.to_string()).unwrap_or_default();
                println!("{id}\t{}", post.content);
            }
        }
        PostAction::Delete { id } => {
            store.delete(EntityKind::Micropost, id)?;
            println!("deleted micropost {id}");
        }
    }
    Ok(())
}

/// Prints `err` and maps it to the process exit status.
fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<SaveError>() {
        Some(SaveError::Invalid(violations)) => {
            for violation in violations {
                eprintln!("{violation}");
            }
        }
        _ if exit_status(err) == EXIT_REJECTED => eprintln!("{err}"),
        _ => eprintln!("error: {err:#}"),
    }
    ExitCode::from(exit_status(err))
}

/// Violations, missing records and delete refusals are expected outcomes;
/// everything else is a failure.
fn exit_status(err: &anyhow::Error) -> u8 {
    let rejected = matches!(
        err.downcast_ref::<SaveError>(),
        Some(SaveError::Invalid(_) | SaveError::NotFound(_))
    ) || matches!(
        err.downcast_ref::<DeleteError>(),
        Some(DeleteError::HasDependents { .. } | DeleteError::NotFound(_))
    ) || err.downcast_ref::<RecordMissing>().is_some();

    if rejected {
        EXIT_REJECTED
    } else {
        EXIT_FAILED
    }
}
