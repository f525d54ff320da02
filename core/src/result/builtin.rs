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

//! Outcomes raised by the framework itself.
//!
//! Negative codes are reserved for these.  Applications should declare their own outcomes with
//! positive codes.

use super::{Outcome, EXCEPTION_CODE, EXCEPTION_MESSAGE};
use http::StatusCode;

/// Generic failure returned to clients in place of any unexpected error.
pub const INTERNAL_ERROR: Outcome =
    Outcome::declare(EXCEPTION_CODE, EXCEPTION_MESSAGE, StatusCode::INTERNAL_SERVER_ERROR);

/// A JSON document was well-formed but did not match the expected shape.
pub const JSON_MAPPING: Outcome =
    Outcome::declare(-10, "Invalid JSON fields", StatusCode::BAD_REQUEST);

/// A JSON document could not be parsed.
pub const JSON_PARSE: Outcome = Outcome::declare(-11, "Malformed JSON", StatusCode::BAD_REQUEST);

/// A path lookup into a JSON document found nothing.
pub const NO_VALUE_FOUND: Outcome =
    Outcome::declare(-12, "No value found at the requested path", StatusCode::NOT_FOUND);

/// An XML document could not be mapped to the expected shape.
pub const XML_MAPPING: Outcome = Outcome::declare(-13, "Invalid XML", StatusCode::BAD_REQUEST);

/// A YAML document could not be mapped to the expected shape.
pub const YAML_MAPPING: Outcome = Outcome::declare(-14, "Invalid YAML", StatusCode::BAD_REQUEST);

/// A request that must not carry a payload did.
pub const PAYLOAD_NOT_EMPTY: Outcome =
    Outcome::declare(-15, "Content should be empty", StatusCode::PAYLOAD_TOO_LARGE);

/// Worker went from never started to running.
pub const WORKER_STARTED: Outcome = Outcome::declare_ok(-100, "Worker started");

/// Worker was already running.
pub const WORKER_ALREADY_STARTED: Outcome =
    Outcome::declare(-101, "Worker already started", StatusCode::CONFLICT);

/// Worker went from stopped to running.
pub const WORKER_RESTARTED: Outcome = Outcome::declare_ok(-102, "Worker restarted");

/// Worker went from running to stopped.
pub const WORKER_STOPPED: Outcome = Outcome::declare_ok(-103, "Worker stopped");

/// Worker was already stopped.
pub const WORKER_ALREADY_STOPPED: Outcome =
    Outcome::declare(-104, "Worker already stopped", StatusCode::CONFLICT);

/// Worker has never been started.
pub const WORKER_NOT_STARTED: Outcome =
    Outcome::declare(-105, "Worker has not been started", StatusCode::CONFLICT);

/// Worker task was run on demand.
pub const WORKER_INVOKED: Outcome = Outcome::declare_ok(-106, "Worker invoked");

/// Worker task cannot be run on demand while the worker is stopped.
pub const WORKER_CANNOT_INVOKE: Outcome =
    Outcome::declare(-107, "Worker is stopped and cannot be invoked", StatusCode::CONFLICT);

/// Worker was started with a new period.
pub const WORKER_STARTED_PERIOD: Outcome =
    Outcome::declare_ok(-108, "Worker started with new period");

/// Worker was restarted with a new period.
pub const WORKER_RESTARTED_PERIOD: Outcome =
    Outcome::declare_ok(-109, "Worker restarted with new period");

/// Worker status: never started.
pub const WORKER_STATUS_NONE: Outcome = Outcome::declare_ok(-110, "Worker status: none");

/// Worker status: running.
pub const WORKER_STATUS_WORKING: Outcome = Outcome::declare_ok(-111, "Worker status: working");

/// Worker status: stopped.
pub const WORKER_STATUS_STOPPED: Outcome = Outcome::declare_ok(-112, "Worker status: stopped");

/// All builtin outcomes, for registration in a `ResultBank`.
pub const ALL: &[Outcome] = &[
    Outcome::VALID,
    Outcome::UNDECLARED,
    INTERNAL_ERROR,
    JSON_MAPPING,
    JSON_PARSE,
    NO_VALUE_FOUND,
    XML_MAPPING,
    YAML_MAPPING,
    PAYLOAD_NOT_EMPTY,
    WORKER_STARTED,
    WORKER_ALREADY_STARTED,
    WORKER_RESTARTED,
    WORKER_STOPPED,
    WORKER_ALREADY_STOPPED,
    WORKER_NOT_STARTED,
    WORKER_INVOKED,
    WORKER_CANNOT_INVOKE,
    WORKER_STARTED_PERIOD,
    WORKER_RESTARTED_PERIOD,
    WORKER_STATUS_NONE,
    WORKER_STATUS_WORKING,
    WORKER_STATUS_STOPPED,
];
