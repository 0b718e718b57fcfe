use std::fmt;

use rand::{
    Rng,
    distr::{Alphanumeric, Distribution},
};
use thiserror::Error;

/// Length of the identifiers handed out by `POST /shorten`.
pub const GENERATED_LEN: usize = 4;

/// Upper bound on identifiers accepted from the outside world.
pub const MAX_LEN: usize = 32;

/// Draws `len` characters uniformly and independently from `[A-Za-z0-9]`.
///
/// This is not a cryptographically secure identifier; callers must handle
/// collisions themselves.
pub fn random_alphanumeric<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(Alphanumeric.sample(&mut *rng)))
        .collect()
}

/// A validated short identifier: non-empty, at most [`MAX_LEN`] characters,
/// ASCII alphanumeric only.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShortId(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShortIdValidationError {
    #[error("short ID is empty")]
    Empty,
    #[error("short ID is {len} characters long; at most {MAX_LEN} are allowed")]
    TooLong { len: usize },
    #[error("short ID contains invalid characters: {invalid_chars}")]
    InvalidCharacters { invalid_chars: String },
}

impl ShortId {
    /// # Errors
    /// Will return [`Err`] if `id` is empty, too long, or not alphanumeric.
    pub fn new(id: String) -> Result<Self, ShortIdValidationError> {
        if id.is_empty() {
            return Err(ShortIdValidationError::Empty);
        }

        let len = id.chars().count();
        if len > MAX_LEN {
            return Err(ShortIdValidationError::TooLong { len });
        }

        let invalid_chars: String = id.chars().filter(|c| !c.is_ascii_alphanumeric()).collect();
        if !invalid_chars.is_empty() {
            return Err(ShortIdValidationError::InvalidCharacters { invalid_chars });
        }

        Ok(Self(id))
    }

    /// Generates a fresh random [`ShortId`] of [`GENERATED_LEN`] characters.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        // NOTE: the alphabet and length are both within the validation rules
        Self(random_alphanumeric(rng, GENERATED_LEN))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
