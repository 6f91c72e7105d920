//! The error currency of the push surface.
//!
//! Streams carry a single opaque error value through `on_err`; there is no
//! typed error hierarchy. [`Error`] is a cheap-to-clone wrapper around any
//! `std::error::Error`, and [`CoreError`] enumerates the few errors the
//! library synthesizes itself.

use std::fmt;
use std::sync::Arc;

use thiserror::Error as ThisError;

/// Errors synthesized by the library itself.
#[derive(Debug, Clone, ThisError)]
pub enum CoreError {
  /// The `timeout` watchdog fired before the first upstream signal.
  #[error("stream timed out")]
  Timeout,
  /// A subscriber joined a shared hub whose upstream already failed.
  #[error("shared source already errored: {0}")]
  SharedAlreadyErrored(Error),
}

/// An opaque, cheaply clonable error value carried by `on_err`.
///
/// Every stream terminates with at most one of `on_done`/`on_err`; the error
/// case carries one of these. Construct from any error type with
/// [`Error::new`], or from a bare message with [`Error::msg`]. Consumers that
/// care about a specific cause can [`Error::downcast_ref`] it back out.
#[derive(Clone)]
pub struct Error {
  inner: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl Error {
  pub fn new<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error { inner: Arc::new(err) }
  }

  /// Wrap a plain message.
  pub fn msg(msg: impl Into<String>) -> Self {
    Error { inner: Arc::new(MessageError(msg.into())) }
  }

  /// The message carried by [`Error::msg`], if this is one.
  pub fn message(&self) -> Option<&str> {
    self.downcast_ref::<MessageError>().map(|m| m.0.as_str())
  }

  pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
    self.inner.downcast_ref::<E>()
  }

  /// Whether this error is the `timeout` watchdog's verdict.
  pub fn is_timeout(&self) -> bool {
    matches!(self.downcast_ref::<CoreError>(), Some(CoreError::Timeout))
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.inner, f)
  }
}

impl fmt::Debug for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&self.inner, f)
  }
}

impl From<CoreError> for Error {
  fn from(err: CoreError) -> Self { Error::new(err) }
}

#[derive(Debug, ThisError)]
#[error("{0}")]
struct MessageError(String);
