use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use thiserror::Error;

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type Result<T> = std::result::Result<T, DynError>;

/// Which collection an identifier refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Book,
    User,
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Book => write!(f, "book"),
            RecordKind::User => write!(f, "user"),
        }
    }
}

/// Every way a catalog, store or session operation can be refused.
///
/// None of these leave the catalog partially modified.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no {kind} with id {id}")]
    NotFound { kind: RecordKind, id: u32 },

    #[error("a {kind} with id {id} already exists")]
    DuplicateIdentifier { kind: RecordKind, id: u32 },

    #[error("no copies of book {book} are left")]
    Unavailable { book: u32 },

    #[error("user {user} has not borrowed book {book}")]
    NotBorrowed { user: u32, book: u32 },

    #[error("{kind} {id} still has {count} outstanding loan(s)")]
    HasDependents { kind: RecordKind, id: u32, count: usize },

    #[error("book {book} has {borrowed} copies out, quantity {quantity} is too low")]
    QuantityBelowBorrowed { book: u32, borrowed: usize, quantity: u32 },

    #[error("inconsistent catalog: {0}")]
    Inconsistent(String),

    #[error("{}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {reason}", path.display())]
    Malformed { path: PathBuf, line: usize, reason: String },

    #[error("wrong user name or password")]
    LoginFailed,

    #[error("not allowed: {0}")]
    Forbidden(String),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

pub trait Context<T> {
    fn with_ctx<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

#[derive(Debug)]
pub struct WithContextError {
    pub context: String,
    pub source: DynError,
}

impl Display for WithContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.context, self.source)
    }
}

impl std::error::Error for WithContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

impl<T, E> Context<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_ctx<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            Box::new(WithContextError {
                context: f(),
                source: e.into(),
            }) as DynError
        })
    }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn with_ctx_prefixes_message_and_keeps_source() {
		let res: std::result::Result<(), CatalogError> = Err(CatalogError::Unavailable { book: 7 });
		let err = res.with_ctx(|| "borrow".to_string()).unwrap_err();
		assert_eq!(err.to_string(), "borrow: no copies of book 7 are left");
		assert!(std::error::Error::source(&*err).is_some());
	}

	#[test]
	fn malformed_mentions_path_and_line() {
		let err = CatalogError::Malformed {
			path: PathBuf::from("book.csv"),
			line: 3,
			reason: "missing quantity".into(),
		};
		assert_eq!(err.to_string(), "book.csv:3: missing quantity");
	}
}
