//! Error type for `cohort-store-sqlite`.

use cohort_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] cohort_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown comment parent kind: {0:?}")]
  UnknownParentKind(String),

  #[error("unknown enum value in column: {0}")]
  UnknownVariant(#[from] strum::ParseError),
}

impl StoreError for Error {
  fn domain(&self) -> Option<&cohort_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
