//! Command-line arguments and the non-interactive subcommands.
//!
//! Without a subcommand the binary starts the terminal UI. Subcommands act
//! with administrator rights on the data files directly.

use anyhow::{Context as _, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use crate::catalog::{BorrowOutcome, DataPaths, Library};
use crate::search::{SearchMode, find_books, find_users};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Books data file.
    #[arg(long, value_name = "FILE", env = "LIBRARY_BOOKS", default_value = "book.csv")]
    pub books: PathBuf,

    /// Users data file.
    #[arg(long, value_name = "FILE", env = "LIBRARY_USERS", default_value = "user.csv")]
    pub users: PathBuf,

    /// Directory holding theme.conf and keybinds.conf.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub config_dir: PathBuf,

    /// Write logs here while the terminal UI runs.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List books, optionally filtered.
    Books(Query),
    /// List users, optionally filtered.
    Users(Query),
    /// Lend a book to a user and save.
    Borrow(Loan),
    /// Take a book back from a user and save.
    Return(Loan),
    /// Load the data files and verify they are consistent.
    Check,
}

#[derive(Args, Debug)]
pub struct Query {
    /// Name substring (case-sensitive), or an id with --id.
    pub query: Option<String>,

    /// Match the query against identifiers instead of names.
    #[arg(long)]
    pub id: bool,
}

impl Query {
    fn mode(&self) -> SearchMode {
        if self.id { SearchMode::ById } else { SearchMode::ByName }
    }
}

#[derive(Args, Debug)]
pub struct Loan {
    #[arg(long)]
    pub user: u32,

    #[arg(long)]
    pub book: u32,
}

impl Cli {
    pub fn data_paths(&self) -> DataPaths {
        DataPaths::new(&self.users, &self.books)
    }
}

fn load(paths: &DataPaths) -> Result<Library> {
    let mut library = Library::new();
    library
        .load(paths)
        .with_context(|| format!("loading {} and {}", paths.books.display(), paths.users.display()))?;
    Ok(library)
}

/// Run one subcommand, writing its report to `out`.
pub fn execute_command(command: &Commands, paths: &DataPaths, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::Books(q) => {
            let library = load(paths)?;
            let query = q.query.as_deref().unwrap_or("");
            for id in find_books(&library, query, q.mode()) {
                if let Some(b) = library.find_book(id) {
                    writeln!(out, "{:>8}  {:<40}  {}/{}", b.identifier, b.name, b.remaining(), b.quantity)?;
                }
            }
        }
        Commands::Users(q) => {
            let library = load(paths)?;
            let query = q.query.as_deref().unwrap_or("");
            for id in find_users(&library, query, q.mode()) {
                if let Some(u) = library.find_user(id) {
                    let admin = if u.is_admin { "admin" } else { "" };
                    writeln!(out, "{:>8}  {:<32}  {:<5}  {} book(s)", u.identifier, u.name, admin, u.books.len())?;
                }
            }
        }
        Commands::Borrow(loan) => {
            let mut library = load(paths)?;
            match library.borrow(loan.user, loan.book)? {
                BorrowOutcome::Borrowed => {
                    library.save_to_loaded_paths().context("saving after borrow")?;
                    writeln!(out, "user {} borrowed book {}", loan.user, loan.book)?;
                }
                BorrowOutcome::AlreadyHeld => {
                    writeln!(out, "user {} already holds book {}", loan.user, loan.book)?;
                }
            }
        }
        Commands::Return(loan) => {
            let mut library = load(paths)?;
            library.return_book(loan.user, loan.book)?;
            library.save_to_loaded_paths().context("saving after return")?;
            writeln!(out, "user {} returned book {}", loan.user, loan.book)?;
        }
        Commands::Check => {
            if paths.is_fresh() {
                bail!("neither {} nor {} exists", paths.books.display(), paths.users.display());
            }
            let library = load(paths)?;
            library.check_invariants()?;
            info!(books = library.book_count(), users = library.user_count(), "catalog consistent");
            writeln!(out, "ok: {} book(s), {} user(s)", library.book_count(), library.user_count())?;
        }
    }
    Ok(())
}
