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

//! Service-level configuration.

use rms_core::config::{ConfigResult, Properties};
use rms_sql::PoolOptions;

/// Where and how the service is exposed, plus its optional database.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceConfig {
    /// Scheme clients use to reach the service, such as `http`.
    pub scheme: String,

    /// Host name or address to bind to.
    pub hostname: String,

    /// Port to bind to.
    pub port: u16,

    /// Path prefix under which all routes are served.
    pub path: String,

    /// Database connection options, if the service uses a database.
    pub db: Option<PoolOptions>,
}

impl ServiceConfig {
    /// Reads the `uri` and `db` sections of a configuration document.
    ///
    /// `uri.scheme`, `uri.hostname`, `uri.port` and `uri.path` are all required.
    pub fn from_properties(props: &Properties) -> ConfigResult<Self> {
        Ok(Self {
            scheme: props.get_req_str("uri.scheme")?,
            hostname: props.get_req_str("uri.hostname")?,
            port: props.get_req("uri.port")?,
            path: props.get_req_str("uri.path")?,
            db: PoolOptions::from_properties(props)?,
        })
    }

    /// Returns the path prefix in canonical form: with a leading slash and without a trailing
    /// one.  The root path is returned as the empty string.
    pub fn base_path(&self) -> String {
        let trimmed = self.path.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Returns the base URL of the service.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.hostname, self.port, self.base_path())
    }
}
