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

//! Rudimentary framework to build small web services.
//!
//! Services built using this framework are structured around a few conventions:
//!
//! 1.  `result`: Every operation reports its status with an `Outcome`, which is either a constant
//!     declared by the application with a stable numeric code or a captured unexpected error.
//!     Operations that produce values return a `Resulted<T>` instead, which carries either the
//!     value or a non-valid `Outcome`.  Services declare their outcomes in catalogues and may
//!     register them in a `ResultBank` to look them up by code.
//!
//! 1.  `config`: Configuration comes from a YAML document read through dotted paths, with
//!     support for encrypted values.
//!
//! 1.  `convert`: Model types are decoded from JSON, YAML and XML into `Resulted` values so that
//!     decoding problems map to declared outcomes.
//!
//! 1.  `rest`: Every HTTP response is an `Envelope` that carries the outcome of the request next
//!     to its payload.  Unexpected errors are logged and hidden from clients.
//!
//! 1.  `socket`: Calls to other services go through a `SocketFactory` bound to the base URL of
//!     the remote service.
//!
//! 1.  `worker`: Periodic background tasks are controlled with outcome-returning operations.
//!
//! Database access lives in the `rms-sql` crate and the server bootstrap lives in the
//! `rms-service` crate.  This crate does not have any heavy dependencies except those that are
//! required for all services.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

pub mod config;
pub mod convert;
pub mod rest;
pub mod result;
pub mod socket;
pub mod worker;
