//! Operation outcomes
//!
//! An [`Outcome`] decouples what happened in business logic from how it is
//! reported over HTTP. Handlers build one and hand it to the
//! [`ResponseMapper`](crate::responses::ResponseMapper).
//!
//! ```rust
//! use petrohub_api::outcome::{Failure, Outcome};
//!
//! fn reserve(litres: u32) -> Outcome<u32> {
//!     if litres == 0 {
//!         return Outcome::failure("Quantity must be positive");
//!     }
//!     Outcome::success(litres)
//! }
//!
//! assert!(reserve(40).is_success());
//! assert_eq!(reserve(0).failure_message(), Some("Quantity must be positive"));
//! ```

use std::fmt;

/// Success carrying a payload, or a failure carrying a message and/or errors
///
/// `Outcome` without a type argument is the payload-free variant.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T = ()> {
    /// The operation succeeded
    Success(T),
    /// The operation failed
    Failure(Failure),
}

/// Why an operation failed
///
/// Always has a message, at least one error, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    message: Option<String>,
    errors: Vec<String>,
}

impl Failure {
    /// Failure with a single message and no error list
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            errors: Vec::new(),
        }
    }

    /// Failure described only by its error list
    ///
    /// Returns `None` for an empty list.
    pub fn from_errors<I, S>(errors: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let errors: Vec<String> = errors.into_iter().map(Into::into).collect();
        if errors.is_empty() {
            return None;
        }
        Some(Self {
            message: None,
            errors,
        })
    }

    /// Append errors to the list
    #[must_use]
    pub fn with_errors<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors.extend(errors.into_iter().map(Into::into));
        self
    }

    /// The failure message, if one was given
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The error list, in insertion order
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Split into message and errors
    pub fn into_parts(self) -> (Option<String>, Vec<String>) {
        (self.message, self.errors)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, self.errors.is_empty()) {
            (Some(message), true) => write!(f, "{}", message),
            (Some(message), false) => write!(f, "{} ({})", message, self.errors.join("; ")),
            (None, _) => write!(f, "{}", self.errors.join("; ")),
        }
    }
}

impl<T> Outcome<T> {
    /// Successful outcome
    pub fn success(data: T) -> Self {
        Self::Success(data)
    }

    /// Failed outcome with a message
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(Failure::new(message))
    }

    /// Check whether the operation succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The payload, if successful
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            Self::Failure(_) => None,
        }
    }

    /// The failure message, if failed with one
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => failure.message(),
        }
    }

    /// The error list; always empty on success
    pub fn errors(&self) -> &[String] {
        match self {
            Self::Success(_) => &[],
            Self::Failure(failure) => failure.errors(),
        }
    }

    /// Transform the payload
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Success(data) => Outcome::Success(f(data)),
            Self::Failure(failure) => Outcome::Failure(failure),
        }
    }

    /// Chain another fallible step
    pub fn and_then<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> Outcome<U>,
    {
        match self {
            Self::Success(data) => f(data),
            Self::Failure(failure) => Outcome::Failure(failure),
        }
    }

    /// Convert into a standard `Result`
    pub fn into_result(self) -> std::result::Result<T, Failure> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Failure(failure) => Err(failure),
        }
    }
}

impl Outcome {
    /// Payload-free success
    pub fn ok() -> Self {
        Self::Success(())
    }
}

impl<T> From<Failure> for Outcome<T> {
    fn from(failure: Failure) -> Self {
        Self::Failure(failure)
    }
}

impl<T> From<std::result::Result<T, Failure>> for Outcome<T> {
    fn from(result: std::result::Result<T, Failure>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(failure) => Self::Failure(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_has_no_errors_or_message() {
        let outcome = Outcome::success(5);
        assert!(outcome.is_success());
        assert_eq!(outcome.data(), Some(&5));
        assert!(outcome.errors().is_empty());
        assert!(outcome.failure_message().is_none());
    }

    #[test]
    fn test_failure_with_message() {
        let outcome: Outcome<i32> = Outcome::failure("Tank is empty");
        assert!(!outcome.is_success());
        assert_eq!(outcome.failure_message(), Some("Tank is empty"));
        assert!(outcome.data().is_none());
    }

    #[test]
    fn test_failure_from_errors_requires_at_least_one() {
        assert!(Failure::from_errors(Vec::<String>::new()).is_none());

        let failure = Failure::from_errors(["a", "b"]).unwrap();
        assert!(failure.message().is_none());
        assert_eq!(failure.errors(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_failure_with_message_and_errors() {
        let failure = Failure::new("Validation failed").with_errors(["name is required"]);
        assert_eq!(failure.message(), Some("Validation failed"));
        assert_eq!(failure.errors().len(), 1);
        assert_eq!(failure.to_string(), "Validation failed (name is required)");
    }

    #[test]
    fn test_map_and_and_then() {
        let doubled = Outcome::success(21).map(|n| n * 2);
        assert_eq!(doubled, Outcome::Success(42));

        let chained: Outcome<i32> = Outcome::success(1).and_then(|_| Outcome::failure("nope"));
        assert_eq!(chained.failure_message(), Some("nope"));

        let untouched: Outcome<i32> = Outcome::<i32>::failure("first").map(|n| n + 1);
        assert_eq!(untouched.failure_message(), Some("first"));
    }

    #[test]
    fn test_unit_outcome() {
        let outcome = Outcome::ok();
        assert!(outcome.is_success());
        assert_eq!(outcome.into_result(), Ok(()));
    }

    #[test]
    fn test_from_result() {
        let outcome: Outcome<u8> = Err(Failure::new("bad")).into();
        assert!(!outcome.is_success());

        let outcome: Outcome<u8> = Ok(3).into();
        assert_eq!(outcome.data(), Some(&3));
    }
}
