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

//! Conversions between model types and their JSON, YAML and XML representations.
//!
//! All decoders report failures as a `Resulted`: malformed input maps to the builtin
//! `JSON_PARSE` outcome, well-formed input with the wrong shape maps to the builtin
//! `*_MAPPING` outcomes, and I/O problems are captured as unexpected errors.

use crate::result::{builtin, Outcome, Resulted};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::error::Category;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

mod path;
pub use path::*;

/// Errors captured by conversion operations.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The input could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A value could not be serialized.
    #[error("Serialization failed: {0}")]
    Serialize(String),
}

/// Maps a JSON deserialization error to an outcome.
fn json_outcome(e: serde_json::Error) -> Outcome {
    match e.classify() {
        Category::Io => Outcome::from_exception(ConvertError::Io(io::Error::from(e))),
        Category::Syntax | Category::Eof => {
            debug!("Cannot parse JSON: {}", e);
            builtin::JSON_PARSE
        }
        Category::Data => {
            debug!("Cannot map JSON: {}", e);
            builtin::JSON_MAPPING
        }
    }
}

/// Reads the whole file at `path` into a string.
fn read_file(path: &Path) -> Result<String, Outcome> {
    fs::read_to_string(path).map_err(|e| Outcome::from_exception(ConvertError::Io(e)))
}

/// Decodes a `T` from the JSON document in `text`.
pub fn from_json<T: DeserializeOwned>(text: &str) -> Resulted<T> {
    match serde_json::from_str(text) {
        Ok(value) => Resulted::ok(value),
        Err(e) => Resulted::from_result(json_outcome(e)),
    }
}

/// Decodes a `T` from the JSON document in `bytes`.
pub fn from_json_slice<T: DeserializeOwned>(bytes: &[u8]) -> Resulted<T> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Resulted::ok(value),
        Err(e) => Resulted::from_result(json_outcome(e)),
    }
}

/// Decodes a `T` from the JSON document provided by `reader`.
pub fn from_json_reader<T: DeserializeOwned, R: Read>(reader: R) -> Resulted<T> {
    match serde_json::from_reader(reader) {
        Ok(value) => Resulted::ok(value),
        Err(e) => Resulted::from_result(json_outcome(e)),
    }
}

/// Decodes a `T` from the JSON document stored in the file at `path`.
pub fn from_json_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Resulted<T> {
    match read_file(path.as_ref()) {
        Ok(text) => from_json(&text),
        Err(outcome) => Resulted::from_result(outcome),
    }
}

/// Decodes a `T` from the YAML document in `text`.
pub fn from_yaml<T: DeserializeOwned>(text: &str) -> Resulted<T> {
    match serde_yaml::from_str(text) {
        Ok(value) => Resulted::ok(value),
        Err(e) => {
            debug!("Cannot map YAML: {}", e);
            Resulted::from_result(builtin::YAML_MAPPING)
        }
    }
}

/// Decodes a `T` from the YAML document stored in the file at `path`.
pub fn from_yaml_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Resulted<T> {
    match read_file(path.as_ref()) {
        Ok(text) => from_yaml(&text),
        Err(outcome) => Resulted::from_result(outcome),
    }
}

/// Decodes a `T` from the XML document in `text`.
pub fn from_xml<T: DeserializeOwned>(text: &str) -> Resulted<T> {
    match quick_xml::de::from_str(text) {
        Ok(value) => Resulted::ok(value),
        Err(e) => {
            debug!("Cannot map XML: {}", e);
            Resulted::from_result(builtin::XML_MAPPING)
        }
    }
}

/// Decodes a `T` from the XML document stored in the file at `path`.
pub fn from_xml_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Resulted<T> {
    match read_file(path.as_ref()) {
        Ok(text) => from_xml(&text),
        Err(outcome) => Resulted::from_result(outcome),
    }
}

/// Encodes `value` as compact JSON.
pub fn to_json<T: Serialize>(value: &T) -> Resulted<String> {
    serde_json::to_string(value).map_err(|e| ConvertError::Serialize(e.to_string())).into()
}

/// Encodes `value` as indented JSON.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Resulted<String> {
    serde_json::to_string_pretty(value).map_err(|e| ConvertError::Serialize(e.to_string())).into()
}

/// Encodes `value` as YAML.
pub fn to_yaml<T: Serialize>(value: &T) -> Resulted<String> {
    serde_yaml::to_string(value).map_err(|e| ConvertError::Serialize(e.to_string())).into()
}

/// Encodes `value` as XML, using the name of its type as the root element.
pub fn to_xml<T: Serialize>(value: &T) -> Resulted<String> {
    quick_xml::se::to_string(value).map_err(|e| ConvertError::Serialize(e.to_string())).into()
}
