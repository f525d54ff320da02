// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Declared outcomes and the carrier type that pairs them with success values.
//!
//! Every operation in the framework that can fail reports its status with an `Outcome`.  Outcomes
//! come in two flavors: declared outcomes, which are constants defined by the application (or by
//! the `builtin` catalogue) with a stable numeric code, and captured outcomes, which wrap an
//! unexpected error under the `-1` sentinel code.
//!
//! Operations that also produce a value return a `Resulted<T>`, which holds either the value or a
//! non-valid `Outcome`.

use http::StatusCode;
use serde::de::Deserializer;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

mod bank;
pub use bank::ResultBank;
pub mod builtin;

/// Code reserved for outcomes that wrap an unexpected error.
pub const EXCEPTION_CODE: i32 = -1;

/// Message attached to outcomes that wrap an unexpected error.
pub const EXCEPTION_MESSAGE: &str = "Something went wrong";

/// Storage for `Outcome::VALID` so that it can be handed out by reference.
static VALID: Outcome = Outcome::VALID;

/// Error raised when only a textual description of a failure is available.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct InternalError(pub String);

/// An unexpected error captured inside an `Outcome`.
#[derive(Clone)]
pub struct Captured {
    /// Name of the Rust type of the original error, for logging purposes.
    type_name: &'static str,

    /// The original error.
    error: Arc<dyn Error + Send + Sync>,
}

impl Captured {
    /// Returns the name of the type of the captured error.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the captured error.
    pub fn error(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.error.as_ref()
    }
}

impl fmt::Debug for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.type_name, self.error)
    }
}

impl fmt::Display for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.error)
    }
}

/// An immutable, declared outcome of an operation.
///
/// Two outcomes are considered equal if their codes match, regardless of their messages or of
/// any captured error.  Only the code and the message are ever serialized.
#[derive(Clone, Debug)]
pub struct Outcome {
    /// Application-defined code, unique within a `ResultBank`.
    code: i32,

    /// Human-readable description of the outcome.
    message: Cow<'static, str>,

    /// HTTP status this outcome maps to when there is no captured error.
    status: StatusCode,

    /// Unexpected error that caused this outcome, if any.
    exception: Option<Captured>,
}

impl Outcome {
    /// The operation succeeded and there is nothing else to report.
    pub const VALID: Outcome = Outcome::declare(0, "Valid", StatusCode::OK);

    /// Placeholder for an outcome that was never set.  Observing this in a response is a bug.
    pub const UNDECLARED: Outcome =
        Outcome::declare(-2, "Result was never declared", StatusCode::INTERNAL_SERVER_ERROR);

    /// Declares a new outcome with the given `code`, `message` and HTTP `status`.
    pub const fn declare(code: i32, message: &'static str, status: StatusCode) -> Self {
        Self { code, message: Cow::Borrowed(message), status, exception: None }
    }

    /// Declares a new outcome with the given `code` and `message` that maps to `200 OK`.
    pub const fn declare_ok(code: i32, message: &'static str) -> Self {
        Self::declare(code, message, StatusCode::OK)
    }

    /// Creates an outcome that captures the unexpected error `e`.
    pub fn from_exception<E: Error + Send + Sync + 'static>(e: E) -> Self {
        Self {
            code: EXCEPTION_CODE,
            message: Cow::Borrowed(EXCEPTION_MESSAGE),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            exception: Some(Captured { type_name: std::any::type_name::<E>(), error: Arc::new(e) }),
        }
    }

    /// Creates an outcome that captures an unexpected error described only by `message`.
    pub fn from_message<M: Into<String>>(message: M) -> Self {
        Self::from_exception(InternalError(message.into()))
    }

    /// Returns the code of the outcome.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Returns the message of the outcome.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status of the outcome, which is always `500` if an error was captured.
    pub fn status(&self) -> StatusCode {
        match self.exception {
            Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
            None => self.status,
        }
    }

    /// Returns the HTTP status the outcome was declared with.
    pub fn declared_status(&self) -> StatusCode {
        self.status
    }

    /// Returns the captured error, if any.
    pub fn exception(&self) -> Option<&Captured> {
        self.exception.as_ref()
    }

    /// Returns the name of the type of the captured error, if any.
    pub fn exception_type(&self) -> Option<&'static str> {
        self.exception.as_ref().map(Captured::type_name)
    }

    /// Returns true if this outcome represents success.
    pub fn is_valid(&self) -> bool {
        self.code == Outcome::VALID.code
    }
}

impl PartialEq for Outcome {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Outcome {}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(exception) = self.exception.as_ref() {
            write!(f, " ({})", exception)?;
        }
        Ok(())
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Outcome", 2)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        state.end()
    }
}

/// Wire representation of an `Outcome`.
#[derive(Deserialize)]
#[serde(rename = "Outcome")]
struct WireOutcome {
    /// The code of the outcome.
    code: i32,

    /// The message of the outcome.
    message: String,
}

/// Deserialization is meant for clients: the HTTP status does not travel on the wire, so the
/// resulting outcome is declared with `200 OK`.
impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireOutcome::deserialize(deserializer)?;
        Ok(Self {
            code: wire.code,
            message: Cow::Owned(wire.message),
            status: StatusCode::OK,
            exception: None,
        })
    }
}

/// Resources that must be released exactly once when their owner is done with them.
///
/// Implementations must make `close` idempotent and should also release on `Drop`.
pub trait Close {
    /// Releases the resources held by this object.
    fn close(&mut self);
}

/// Carrier for either a success value or a non-valid `Outcome`.
#[derive(Debug)]
#[must_use]
pub struct Resulted<T> {
    /// The success value or the (never valid) failure outcome.
    inner: Result<T, Outcome>,

    /// Whether `close` already released the success value.
    closed: bool,
}

impl<T> Resulted<T> {
    /// Wraps a success `value`.
    pub fn ok(value: T) -> Self {
        Self { inner: Ok(value), closed: false }
    }

    /// Wraps a failure `outcome`.
    ///
    /// Panics if `outcome` is `Outcome::VALID` because a success needs a value.
    pub fn from_result(outcome: Outcome) -> Self {
        assert!(!outcome.is_valid(), "Resulted cannot be built from a valid outcome");
        Self { inner: Err(outcome), closed: false }
    }

    /// Wraps an unexpected error `e`.
    pub fn from_exception<E: Error + Send + Sync + 'static>(e: E) -> Self {
        Self::from_result(Outcome::from_exception(e))
    }

    /// Re-types the failure in `other`, preserving its outcome.
    ///
    /// Panics if `other` holds a value, as there would be nothing to propagate.
    pub fn propagate<U>(other: Resulted<U>) -> Self {
        match other.inner {
            Ok(_) => panic!("Cannot propagate a Resulted that holds a value"),
            Err(outcome) => Self { inner: Err(outcome), closed: false },
        }
    }

    /// Returns true if this holds a failure outcome instead of a value.
    pub fn with_result(&self) -> bool {
        self.inner.is_err()
    }

    /// Same as `with_result`.
    pub fn not_valid(&self) -> bool {
        self.with_result()
    }

    /// Returns the outcome, which is `Outcome::VALID` when a value is present.
    pub fn result(&self) -> &Outcome {
        match &self.inner {
            Ok(_) => &VALID,
            Err(outcome) => outcome,
        }
    }

    /// Returns the success value, if any, without panicking.
    pub fn as_value(&self) -> Option<&T> {
        self.inner.as_ref().ok()
    }

    /// Returns the success value.
    ///
    /// Panics if this holds a failure.
    pub fn value(&self) -> &T {
        match &self.inner {
            Ok(value) => value,
            Err(outcome) => panic!("No value present; outcome was {}", outcome),
        }
    }

    /// Returns the success value for in-place updates.
    ///
    /// Panics if this holds a failure.
    pub fn value_mut(&mut self) -> &mut T {
        match &mut self.inner {
            Ok(value) => value,
            Err(outcome) => panic!("No value present; outcome was {}", outcome),
        }
    }

    /// Consumes this object and returns the success value.
    ///
    /// Panics if this holds a failure.
    pub fn into_value(self) -> T {
        match self.inner {
            Ok(value) => value,
            Err(outcome) => panic!("No value present; outcome was {}", outcome),
        }
    }

    /// Converts this object into a standard `Result` so that `?` can be used on it.
    pub fn into_result(self) -> Result<T, Outcome> {
        self.inner
    }

    /// Transforms the success value with `f`, leaving failures untouched.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Resulted<U> {
        Resulted { inner: self.inner.map(f), closed: self.closed }
    }
}

impl<T: Close> Resulted<T> {
    /// Releases the resources held by the success value, if any.
    ///
    /// Only the first call reaches the value.  Later calls do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Ok(value) = &mut self.inner {
            value.close();
        }
    }

    /// Returns true if `close` was already called on this object.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<T, E: Error + Send + Sync + 'static> From<Result<T, E>> for Resulted<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Resulted::ok(value),
            Err(e) => Resulted::from_exception(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_test::{assert_ser_tokens, Token};
    use std::io;

    /// Outcome used across the tests.
    const DECLARED: Outcome = Outcome::declare(10, "Declared failure", StatusCode::NOT_FOUND);

    /// Fake resource that counts every call to `close`.
    struct Counted(u32);

    impl Close for Counted {
        fn close(&mut self) {
            self.0 += 1;
        }
    }

    #[test]
    fn test_outcome_declare() {
        assert_eq!(10, DECLARED.code());
        assert_eq!("Declared failure", DECLARED.message());
        assert_eq!(StatusCode::NOT_FOUND, DECLARED.status());
        assert!(DECLARED.exception().is_none());
        assert!(!DECLARED.is_valid());
        assert!(Outcome::VALID.is_valid());
        assert_eq!(StatusCode::OK, Outcome::declare_ok(11, "Fine").status());
    }

    #[test]
    fn test_outcome_from_exception() {
        let outcome = Outcome::from_exception(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        assert_eq!(EXCEPTION_CODE, outcome.code());
        assert_eq!(EXCEPTION_MESSAGE, outcome.message());
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, outcome.status());
        assert!(outcome.exception_type().unwrap().contains("io"));
        assert_eq!("disk on fire", outcome.exception().unwrap().error().to_string());
    }

    #[test]
    fn test_outcome_from_message() {
        let outcome = Outcome::from_message("Could not find code: 5");
        assert_eq!(EXCEPTION_CODE, outcome.code());
        assert_eq!("Could not find code: 5", outcome.exception().unwrap().error().to_string());
    }

    #[test]
    fn test_outcome_equality_is_by_code() {
        let other = Outcome::declare(10, "Same code, different text", StatusCode::OK);
        assert_eq!(DECLARED, other);
        assert_ne!(DECLARED, Outcome::VALID);
    }

    #[test]
    fn test_outcome_serialize_omits_internals() {
        assert_ser_tokens(
            &DECLARED,
            &[
                Token::Struct { name: "Outcome", len: 2 },
                Token::Str("code"),
                Token::I32(10),
                Token::Str("message"),
                Token::Str("Declared failure"),
                Token::StructEnd,
            ],
        );

        let outcome = Outcome::from_message("secret details");
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(r#"{"code":-1,"message":"Something went wrong"}"#, json);
    }

    #[test]
    fn test_outcome_deserialize() {
        let outcome: Outcome = serde_json::from_str(r#"{"code":10,"message":"foo"}"#).unwrap();
        assert_eq!(DECLARED, outcome);
        assert_eq!("foo", outcome.message());
    }

    #[test]
    fn test_resulted_ok() {
        let resulted = Resulted::ok(42);
        assert!(!resulted.with_result());
        assert!(!resulted.not_valid());
        assert_eq!(42, *resulted.value());
        assert_eq!(&Outcome::VALID, resulted.result());
        assert_eq!(Ok(42), resulted.into_result());
    }

    #[test]
    fn test_resulted_from_result() {
        let resulted = Resulted::<i32>::from_result(DECLARED);
        assert!(resulted.with_result());
        assert_eq!(&DECLARED, resulted.result());
        assert!(resulted.result().exception().is_none());
    }

    #[test]
    #[should_panic(expected = "valid outcome")]
    fn test_resulted_from_result_valid_panics() {
        let _ = Resulted::<i32>::from_result(Outcome::VALID);
    }

    #[test]
    fn test_resulted_from_exception() {
        let resulted =
            Resulted::<i32>::from_exception(io::Error::new(io::ErrorKind::Other, "broken"));
        assert!(resulted.with_result());
        assert_eq!("broken", resulted.result().exception().unwrap().error().to_string());
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, resulted.result().status());
    }

    #[test]
    #[should_panic(expected = "No value present")]
    fn test_resulted_value_on_failure_panics() {
        let resulted = Resulted::<i32>::from_result(DECLARED);
        resulted.value();
    }

    #[test]
    fn test_resulted_propagate() {
        let original = Resulted::<i32>::from_result(DECLARED);
        let propagated = Resulted::<String>::propagate(original);
        assert_eq!(&DECLARED, propagated.result());
    }

    #[test]
    #[should_panic(expected = "Cannot propagate")]
    fn test_resulted_propagate_value_panics() {
        let _ = Resulted::<String>::propagate(Resulted::ok(3));
    }

    #[test]
    fn test_resulted_from_std_result() {
        let resulted: Resulted<u8> = "300".parse::<u8>().into();
        assert_eq!(EXCEPTION_CODE, resulted.result().code());
        assert!(resulted.result().exception_type().unwrap().contains("ParseIntError"));

        let resulted: Resulted<u8> = "30".parse::<u8>().into();
        assert_eq!(60, resulted.map(|v| v * 2).into_value());
    }

    #[test]
    fn test_resulted_close_is_idempotent() {
        let mut resulted = Resulted::ok(Counted(0));
        assert!(!resulted.is_closed());
        resulted.close();
        resulted.close();
        resulted.close();
        assert!(resulted.is_closed());
        assert_eq!(1, resulted.value().0);

        let mut failed = Resulted::<Counted>::from_result(DECLARED);
        failed.close();
        assert!(failed.is_closed());
    }
}
