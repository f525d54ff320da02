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

//! Sample REST service that implements a key/value store.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use log::info;
use rms_core::config::crypto::PbeCipher;
use rms_core::config::{ConfigResult, Properties};
use rms_service::{Service, ServiceConfig};
use std::env;
use std::error::Error;

mod db;
mod driver;
use driver::Driver;
pub(crate) mod model;
mod outcomes;
mod rest;
use rest::app;

/// Loads the configuration document named by the `RMS_CONFIG` environment variable.
///
/// If `RMS_CONFIG_PASSWORD` is set, `enc=` values in the document are decrypted with that
/// password using the algorithm in `RMS_CONFIG_ALGORITHM`, which defaults to the only one
/// supported.
pub fn load_properties() -> ConfigResult<Properties> {
    let path = env::var("RMS_CONFIG").unwrap_or_else(|_| "config.yaml".to_owned());
    match env::var("RMS_CONFIG_PASSWORD") {
        Ok(password) => {
            let algorithm = env::var("RMS_CONFIG_ALGORITHM")
                .unwrap_or_else(|_| PbeCipher::ALGORITHM.to_owned());
            Properties::from_file_encrypted(&path, &algorithm, &password)
        }
        Err(_) => Properties::from_file(&path),
    }
}

/// Instantiates all resources described by `props` and serves the application.
///
/// While it'd be nice to push this responsibility to `main`, doing so would force us to expose many
/// crate-internal types to the public, which in turn would make dead code detection harder.
pub async fn serve(props: &Properties) -> Result<(), Box<dyn Error>> {
    let service = Service::new(ServiceConfig::from_properties(props)?)?;
    let pm = service.pool_manager().ok_or("This service requires a database")?.clone();
    db::init_schema(&pm).await?;

    let bank = outcomes::bank();
    info!("Serving with {} known outcomes", bank.len());

    let app = app(Driver::new(pm), bank);
    service.serve(app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rms_core::config::ConfigError;
    use std::fs;

    #[test]
    fn test_load_properties_plain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "db:\n  password: secret\n").unwrap();

        temp_env::with_vars(
            [
                ("RMS_CONFIG", Some(path.to_str().unwrap())),
                ("RMS_CONFIG_PASSWORD", None),
                ("RMS_CONFIG_ALGORITHM", None),
            ],
            || {
                let props = load_properties().unwrap();
                assert_eq!("secret", props.get_req_str("db.password").unwrap());
            },
        );
    }

    #[test]
    fn test_load_properties_encrypted() {
        let cipher = PbeCipher::new(PbeCipher::ALGORITHM, "the-password").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let ciphertext = cipher.encrypt("secret").unwrap();
        fs::write(&path, format!("db:\n  password: \"enc={}\"\n", ciphertext)).unwrap();

        temp_env::with_vars(
            [
                ("RMS_CONFIG", Some(path.to_str().unwrap())),
                ("RMS_CONFIG_PASSWORD", Some("the-password")),
                ("RMS_CONFIG_ALGORITHM", None),
            ],
            || {
                let props = load_properties().unwrap();
                assert_eq!("secret", props.get_req_str("db.password").unwrap());
            },
        );
    }

    #[test]
    fn test_load_properties_missing_file() {
        temp_env::with_vars(
            [
                ("RMS_CONFIG", Some("/nonexistent/config.yaml")),
                ("RMS_CONFIG_PASSWORD", None::<&str>),
            ],
            || match load_properties() {
                Err(ConfigError::Io(message)) => assert!(message.contains("/nonexistent")),
                e => panic!("Unexpected result {:?}", e),
            },
        );
    }
}
