//! Delimited-file persistence for [`Library`].
//!
//! Two files, one record per line, fields separated by `,`:
//!
//! ```text
//! book:  name,identifier,quantity[,reader-id]*
//! user:  name,identifier,password,is_admin(0|1)[,book-id]*
//! ```
//!
//! Inside a field `\` escapes the next character (`\,` comma, `\\` backslash,
//! `\n` newline). Blank lines are skipped.
//!
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{BookInfo, Library, UserInfo};
use crate::error::{CatalogError, CatalogResult};

const DELIMITER: char = ',';
const ESCAPE: char = '\\';

/// Locations of the user and book files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataPaths {
    pub users: PathBuf,
    pub books: PathBuf,
}

impl DataPaths {
    pub fn new(users: impl Into<PathBuf>, books: impl Into<PathBuf>) -> Self {
        Self {
            users: users.into(),
            books: books.into(),
        }
    }

    /// Both files are absent, i.e. nothing has been saved yet.
    pub fn is_fresh(&self) -> bool {
        !self.users.exists() && !self.books.exists()
    }
}

impl Library {
    /// Paths recorded by the last successful load (or [`Library::set_paths`]).
    pub fn paths(&self) -> Option<&DataPaths> {
        self.paths.as_ref()
    }

    pub fn set_paths(&mut self, paths: DataPaths) {
        self.paths = Some(paths);
    }

    /// Replace the whole catalog with the contents of `paths`.
    ///
    /// The files are parsed and validated into a fresh catalog first; on any
    /// error `self` is left exactly as it was.
    pub fn load(&mut self, paths: &DataPaths) -> CatalogResult<()> {
        let fresh = read_library(paths).inspect_err(|e| warn!(error = %e, "load failed"))?;
        info!(
            users = fresh.user_count(),
            books = fresh.book_count(),
            users_path = %paths.users.display(),
            books_path = %paths.books.display(),
            "catalog loaded"
        );
        *self = fresh;
        self.paths = Some(paths.clone());
        Ok(())
    }

    /// Write every record, loans included, to `paths`.
    pub fn save(&self, paths: &DataPaths) -> CatalogResult<()> {
        write_atomic(&paths.users, &render_users(self))
            .and_then(|_| write_atomic(&paths.books, &render_books(self)))
            .inspect_err(|e| warn!(error = %e, "save failed"))?;
        info!(
            users = self.user_count(),
            books = self.book_count(),
            users_path = %paths.users.display(),
            books_path = %paths.books.display(),
            "catalog saved"
        );
        Ok(())
    }

    /// Save back to the recorded paths.
    pub fn save_to_loaded_paths(&self) -> CatalogResult<()> {
        let paths = self.paths.as_ref().ok_or_else(|| CatalogError::Persistence {
            path: PathBuf::new(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no data file paths configured"),
        })?;
        self.save(paths)
    }
}

fn read_library(paths: &DataPaths) -> CatalogResult<Library> {
    let users = read_records(&paths.users, parse_user)?;
    let books = read_records(&paths.books, parse_book)?;

    let mut lib = Library::default();
    for (line, user) in users {
        if lib.users.contains_key(&user.identifier) {
            return Err(malformed(&paths.users, line, format!("duplicate user id {}", user.identifier)));
        }
        lib.users.insert(user.identifier, user);
    }
    for (line, book) in books {
        if lib.books.contains_key(&book.identifier) {
            return Err(malformed(&paths.books, line, format!("duplicate book id {}", book.identifier)));
        }
        lib.books.insert(book.identifier, book);
    }
    lib.check_invariants()?;
    Ok(lib)
}

fn read_records<T>(
    path: &Path,
    parse: fn(&[String]) -> Result<T, String>,
) -> CatalogResult<Vec<(usize, T)>> {
    let contents = fs::read_to_string(path).map_err(|source| CatalogError::Persistence {
        path: path.to_path_buf(),
        source,
    })?;
    let mut records = Vec::new();
    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim_end();
        if line.is_empty() {
            continue;
        }
        let fields = split_fields(line).map_err(|reason| malformed(path, idx + 1, reason))?;
        let record = parse(&fields).map_err(|reason| malformed(path, idx + 1, reason))?;
        records.push((idx + 1, record));
    }
    Ok(records)
}

fn parse_book(fields: &[String]) -> Result<BookInfo, String> {
    if fields.len() < 3 {
        return Err(format!("expected at least 3 fields, found {}", fields.len()));
    }
    let mut book = BookInfo::new(fields[0].clone(), parse_number(&fields[1], "identifier")?, parse_number(&fields[2], "quantity")?);
    for raw in fields[3..].iter().filter(|s| !s.is_empty()) {
        let reader = parse_number(raw, "reader id")?;
        if !book.readers.insert(reader) {
            return Err(format!("reader {} listed twice", reader));
        }
    }
    Ok(book)
}

fn parse_user(fields: &[String]) -> Result<UserInfo, String> {
    if fields.len() < 4 {
        return Err(format!("expected at least 4 fields, found {}", fields.len()));
    }
    let is_admin = match fields[3].as_str() {
        "1" => true,
        "0" => false,
        other => return Err(format!("admin flag must be 0 or 1, found '{}'", other)),
    };
    let mut user = UserInfo::new(fields[0].clone(), parse_number(&fields[1], "identifier")?, fields[2].clone(), is_admin);
    for raw in fields[4..].iter().filter(|s| !s.is_empty()) {
        let book = parse_number(raw, "book id")?;
        if !user.books.insert(book) {
            return Err(format!("book {} listed twice", book));
        }
    }
    Ok(user)
}

fn parse_number(s: &str, what: &str) -> Result<u32, String> {
    s.trim().parse::<u32>().map_err(|_| format!("invalid {} '{}'", what, s))
}

fn malformed(path: &Path, line: usize, reason: String) -> CatalogError {
    CatalogError::Malformed {
        path: path.to_path_buf(),
        line,
        reason,
    }
}

/// Split one line on unescaped delimiters, resolving escapes.
fn split_fields(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.next() {
                Some('n') => current.push('\n'),
                Some(other) => current.push(other),
                None => return Err("line ends with a dangling escape".to_string()),
            },
            DELIMITER => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    Ok(fields)
}

fn escape_field(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            ESCAPE => out.push_str("\\\\"),
            DELIMITER => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}

fn render_books(lib: &Library) -> String {
    let mut buf = String::new();
    for book in lib.books() {
        let _ = write!(&mut buf, "{},{},{}", escape_field(&book.name), book.identifier, book.quantity);
        for reader in &book.readers {
            let _ = write!(&mut buf, ",{}", reader);
        }
        buf.push('\n');
    }
    buf
}

fn render_users(lib: &Library) -> String {
    let mut buf = String::new();
    for user in lib.users() {
        let _ = write!(
            &mut buf,
            "{},{},{},{}",
            escape_field(&user.name),
            user.identifier,
            escape_field(&user.password),
            if user.is_admin { 1 } else { 0 }
        );
        for book in &user.books {
            let _ = write!(&mut buf, ",{}", book);
        }
        buf.push('\n');
    }
    buf
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, contents: &str) -> CatalogResult<()> {
    let io_err = |source| CatalogError::Persistence {
        path: path.to_path_buf(),
        source,
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    fs::write(&tmp, contents).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        io_err(e)
    })
}
