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

//! Dotted-path access to YAML configuration documents.
//!
//! A `Properties` object wraps a parsed document and offers three families of accessors for
//! every value type:
//!
//! *   Optional accessors (`get`, `get_str`) return `None` when the path is absent.
//! *   Defaulting accessors (`get_or`, `get_str_or`) return the caller-provided default instead.
//! *   Required accessors (`get_req`, `get_req_str`) fail with
//!     `ConfigError::RequiredPathNotFound` instead.
//!
//! A YAML `null` is treated as an absent value.
//!
//! String values that start with `enc=` are encrypted: when the `Properties` object has been
//! configured with a `Decryptor`, the remainder of the string is decrypted before it is handed to
//! the caller.  This applies to strings nested inside sequences and maps too.

use crate::convert::to_node;
use derivative::Derivative;
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::Path;

pub mod crypto;
use crypto::{CryptoError, Decryptor, PbeCipher};

/// Prefix that marks a string value as encrypted.
pub const ENCRYPTED_VALUE_LABEL: &str = "enc=";

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    /// Two settings that cannot coexist were both provided.
    #[error("{0}")]
    Conflict(String),

    /// An encrypted value could not be decrypted.
    #[error("Cannot decrypt value: {0}")]
    Decrypt(String),

    /// A value exists but cannot be converted to the requested type.
    #[error("Invalid value at '{path}': {message}")]
    InvalidValue {
        /// Path to the offending value.
        path: String,

        /// Description of the conversion problem.
        message: String,
    },

    /// The configuration file could not be read.
    #[error("Cannot read configuration file: {0}")]
    Io(String),

    /// The configuration document is malformed.
    #[error("Invalid configuration document: {0}")]
    Parse(String),

    /// A required path has no value.
    #[error("Required path: '{0}' not found")]
    RequiredPathNotFound(String),
}

impl From<CryptoError> for ConfigError {
    fn from(e: CryptoError) -> Self {
        ConfigError::Decrypt(e.to_string())
    }
}

/// Result type for this module.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A parsed configuration document with dotted-path accessors.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Properties {
    /// Root of the parsed document.
    root: Value,

    /// Decryptor for `enc=` values, if encrypted values are supported.
    #[derivative(Debug = "ignore")]
    decryptor: Option<Box<dyn Decryptor + Send + Sync>>,
}

impl Properties {
    /// Wraps an already-parsed document.
    pub fn from_value(root: Value) -> Self {
        Self { root, decryptor: None }
    }

    /// Parses a YAML (or JSON) document from `text`.
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let root: Value =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(Self::from_value(root))
    }

    /// Parses the YAML document stored in the file at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&text)
    }

    /// Parses the YAML document stored in the file at `path` and enables decryption of `enc=`
    /// values with `algorithm` keyed by `password`.
    pub fn from_file_encrypted<P: AsRef<Path>>(
        path: P,
        algorithm: &str,
        password: &str,
    ) -> ConfigResult<Self> {
        let cipher = PbeCipher::new(algorithm, password)?;
        Ok(Self::from_file(path)?.with_decryptor(Box::from(cipher)))
    }

    /// Enables decryption of `enc=` values with `decryptor`.
    pub fn with_decryptor(mut self, decryptor: Box<dyn Decryptor + Send + Sync>) -> Self {
        self.decryptor = Some(decryptor);
        self
    }

    /// Locates the raw node at the dotted `path`, treating `null` as absent.
    fn node(&self, path: &str) -> Option<&Value> {
        to_node(&self.root, path)
    }

    /// Returns a copy of `node` with every encrypted string in it decrypted.
    fn resolve(&self, path: &str, node: &Value) -> ConfigResult<Value> {
        let decryptor = match self.decryptor.as_ref() {
            Some(decryptor) => decryptor,
            None => return Ok(node.clone()),
        };

        match node {
            Value::String(s) => match s.strip_prefix(ENCRYPTED_VALUE_LABEL) {
                Some(ciphertext) => decryptor
                    .decrypt(ciphertext)
                    .map(Value::String)
                    .map_err(|e| ConfigError::Decrypt(format!("{}: {}", path, e))),
                None => Ok(node.clone()),
            },
            Value::Array(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(self.resolve(path, item)?);
                }
                Ok(Value::Array(resolved))
            }
            Value::Object(map) => {
                let mut resolved = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    resolved.insert(key.clone(), self.resolve(path, item)?);
                }
                Ok(Value::Object(resolved))
            }
            _ => Ok(node.clone()),
        }
    }

    /// Returns true if `path` has a non-null value.
    pub fn contains(&self, path: &str) -> bool {
        self.node(path).is_some()
    }

    /// Warns if `path` has a value, as it will be ignored given the rest of the configuration.
    pub fn check_ignored(&self, path: &str) {
        if self.contains(path) {
            warn!("Configuration value '{}' is set but will be ignored", path);
        }
    }

    /// Gets the value at `path` converted to `T`, or `None` if absent.
    ///
    /// Strings holding a scalar are accepted for numeric and boolean targets, so that encrypted
    /// values (which are always strings) can be used for any type.
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> ConfigResult<Option<T>> {
        let node = match self.node(path) {
            Some(node) => node,
            None => return Ok(None),
        };
        let value = self.resolve(path, node)?;

        let text = match &value {
            Value::String(s) => Some(s.clone()),
            _ => None,
        };
        match serde_json::from_value::<T>(value) {
            Ok(value) => Ok(Some(value)),
            Err(e) => match text.and_then(|s| serde_json::from_str::<T>(&s).ok()) {
                Some(value) => Ok(Some(value)),
                None => Err(ConfigError::InvalidValue {
                    path: path.to_owned(),
                    message: e.to_string(),
                }),
            },
        }
    }

    /// Gets the value at `path` converted to `T`, or `default` if absent.
    pub fn get_or<T: DeserializeOwned>(&self, path: &str, default: T) -> ConfigResult<T> {
        Ok(self.get(path)?.unwrap_or(default))
    }

    /// Gets the value at `path` converted to `T`, failing if absent.
    pub fn get_req<T: DeserializeOwned>(&self, path: &str) -> ConfigResult<T> {
        self.get(path)?.ok_or_else(|| ConfigError::RequiredPathNotFound(path.to_owned()))
    }

    /// Gets the scalar at `path` as text, or `None` if absent.
    ///
    /// Numbers and booleans are rendered in their textual form.  Sequences and maps are errors.
    pub fn get_str(&self, path: &str) -> ConfigResult<Option<String>> {
        let node = match self.node(path) {
            Some(node) => node,
            None => return Ok(None),
        };
        match self.resolve(path, node)? {
            Value::String(s) => Ok(Some(s)),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            _ => Err(ConfigError::InvalidValue {
                path: path.to_owned(),
                message: "Expected a scalar value".to_owned(),
            }),
        }
    }

    /// Gets the scalar at `path` as text, or `default` if absent.
    pub fn get_str_or(&self, path: &str, default: &str) -> ConfigResult<String> {
        Ok(self.get_str(path)?.unwrap_or_else(|| default.to_owned()))
    }

    /// Gets the scalar at `path` as text, failing if absent.
    pub fn get_req_str(&self, path: &str) -> ConfigResult<String> {
        self.get_str(path)?.ok_or_else(|| ConfigError::RequiredPathNotFound(path.to_owned()))
    }
}

/// Test utilities for code that consumes configuration documents.
#[cfg(any(test, feature = "testutils"))]
pub mod testutils {
    use super::*;

    /// Parses `text` as YAML, panicking on errors.
    pub fn properties(text: &str) -> Properties {
        Properties::from_yaml_str(text).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testutils::*;
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    /// Fake decryptor that reverses its input.
    struct Reverse;

    impl Decryptor for Reverse {
        fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
            if ciphertext == "bad" {
                return Err(CryptoError::DecryptionFailed);
            }
            Ok(ciphertext.chars().rev().collect())
        }
    }

    const DOCUMENT: &str = r#"
uri:
  scheme: http
  hostname: localhost
  port: 8080
db:
  maxPoolSize: "12"
  password: "enc=terces"
  properties:
    sslmode: "enc=elbasid"
    plain: value
  hosts:
    - first
    - "enc=dnoces"
idm:
  nothing: ~
"#;

    #[test]
    fn test_get_str_present() {
        let props = properties(DOCUMENT);
        assert_eq!(Some("http".to_owned()), props.get_str("uri.scheme").unwrap());
        assert_eq!(Some("8080".to_owned()), props.get_str("uri.port").unwrap());
        assert_eq!("localhost", props.get_req_str("uri.hostname").unwrap());
    }

    #[test]
    fn test_get_str_absent() {
        let props = properties(DOCUMENT);
        assert_eq!(None, props.get_str("idm.optional").unwrap());
        assert_eq!(None, props.get_str("idm.nothing").unwrap());
        assert_eq!(None, props.get_str("uri.scheme.deeper").unwrap());
        assert_eq!("fallback", props.get_str_or("idm.optional", "fallback").unwrap());
    }

    #[test]
    fn test_get_req_str_absent() {
        let props = properties(DOCUMENT);
        let err = props.get_req_str("idm.optional").unwrap_err();
        assert_eq!(ConfigError::RequiredPathNotFound("idm.optional".to_owned()), err);
        assert_eq!("Required path: 'idm.optional' not found", err.to_string());
    }

    #[test]
    fn test_get_typed() {
        let props = properties(DOCUMENT);
        assert_eq!(8080u16, props.get_req::<u16>("uri.port").unwrap());
        assert_eq!(12u32, props.get_req::<u32>("db.maxPoolSize").unwrap());
        assert_eq!(None, props.get::<u32>("db.missing").unwrap());
        assert_eq!(7u32, props.get_or::<u32>("db.missing", 7).unwrap());
        assert_eq!(
            vec!["first".to_owned(), "enc=dnoces".to_owned()],
            props.get_req::<Vec<String>>("db.hosts").unwrap()
        );
        assert_eq!("first", props.get_req_str("db.hosts.0").unwrap());
    }

    #[test]
    fn test_get_typed_invalid() {
        let props = properties(DOCUMENT);
        match props.get::<u16>("uri.scheme") {
            Err(ConfigError::InvalidValue { path, .. }) => assert_eq!("uri.scheme", path),
            e => panic!("Unexpected result {:?}", e),
        }
        match props.get_str("db.properties") {
            Err(ConfigError::InvalidValue { path, .. }) => assert_eq!("db.properties", path),
            e => panic!("Unexpected result {:?}", e),
        }
    }

    #[test]
    fn test_encrypted_values_without_decryptor() {
        let props = properties(DOCUMENT);
        assert_eq!("enc=terces", props.get_req_str("db.password").unwrap());
    }

    #[test]
    fn test_encrypted_values_with_decryptor() {
        let props = properties(DOCUMENT).with_decryptor(Box::from(Reverse));
        assert_eq!("secret", props.get_req_str("db.password").unwrap());
        assert_eq!("http", props.get_req_str("uri.scheme").unwrap());

        let map = props.get_req::<HashMap<String, String>>("db.properties").unwrap();
        assert_eq!("disable", map["sslmode"]);
        assert_eq!("value", map["plain"]);

        assert_eq!(
            vec!["first".to_owned(), "second".to_owned()],
            props.get_req::<Vec<String>>("db.hosts").unwrap()
        );
    }

    #[test]
    fn test_encrypted_value_fails_to_decrypt() {
        let props = properties("db:\n  password: enc=bad\n").with_decryptor(Box::from(Reverse));
        match props.get_req_str("db.password") {
            Err(ConfigError::Decrypt(message)) => assert!(message.contains("db.password")),
            e => panic!("Unexpected result {:?}", e),
        }
    }

    #[test]
    fn test_from_file_encrypted() {
        let cipher = PbeCipher::new(PbeCipher::ALGORITHM, "master").unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "db:\n  password: \"enc={}\"", cipher.encrypt("plain").unwrap()).unwrap();

        let props =
            Properties::from_file_encrypted(file.path(), PbeCipher::ALGORITHM, "master").unwrap();
        assert_eq!("plain", props.get_req_str("db.password").unwrap());
    }

    #[test]
    fn test_from_file_missing() {
        match Properties::from_file("/nonexistent/config.yaml") {
            Err(ConfigError::Io(message)) => assert!(message.contains("config.yaml")),
            e => panic!("Unexpected result {:?}", e),
        }
    }

    #[test]
    fn test_parse_error() {
        match Properties::from_yaml_str("uri: [unterminated") {
            Err(ConfigError::Parse(_)) => (),
            e => panic!("Unexpected result {:?}", e),
        }
    }

    #[test]
    fn test_paths_resolve_like_json_readers() {
        let props = properties(DOCUMENT);
        for (path, exists) in [
            ("db.hosts.0", true),
            ("db.hosts.1", true),
            ("db.hosts.2", false),
            ("db.hosts.first", false),
            ("db.properties.plain", true),
            ("idm.nothing", false),
            ("uri.port.deeper", false),
            ("", false),
        ] {
            assert_eq!(exists, props.contains(path), "Bad result for {}", path);
            assert_eq!(exists, to_node(&props.root, path).is_some(), "Bad result for {}", path);
        }
    }

    #[test]
    fn test_contains_and_check_ignored() {
        let _ = env_logger::builder().is_test(true).try_init();

        let props = properties(DOCUMENT);
        assert!(props.contains("uri.port"));
        assert!(!props.contains("idm.nothing"));
        props.check_ignored("uri.port");
        props.check_ignored("idm.nothing");
    }
}
