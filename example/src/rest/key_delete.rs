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

//! API to delete a key.

use crate::driver::Driver;
use crate::model::Key;
use axum::extract::{Path, State};
use rms_core::rest::EmptyBody;
use rms_core::result::Outcome;

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(key): Path<Key>,
    _: EmptyBody,
) -> Outcome {
    driver.delete_key(&key).await
}

#[cfg(test)]
mod tests {
    use crate::outcomes::KEY_NOT_FOUND;
    use crate::rest::testutils::*;
    use axum::http;
    use rms_core::rest::testutils::*;
    use rms_core::result::Outcome;

    fn route(key: &str) -> (http::Method, String) {
        (http::Method::DELETE, format!("/keys/{}", key))
    }

    #[tokio::test]
    async fn test_ok() {
        let context = TestContext::setup().await;

        context.set_key("first", "value", 1).await;
        context.set_key("second", "value", 1).await;

        OneShotBuilder::new(context.app(), route("first"))
            .send_empty()
            .await
            .expect_outcome(&Outcome::VALID)
            .await;

        assert!(!context.has_key("first").await);
        assert!(context.has_key("second").await);
    }

    #[tokio::test]
    async fn test_missing() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.app(), route("first"))
            .send_empty()
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_outcome(&KEY_NOT_FOUND)
            .await;
    }

    test_payload_must_be_empty!(TestContext::setup().await.app(), route("irrelevant"));
}
