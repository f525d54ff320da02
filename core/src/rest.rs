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

//! Generic code for REST handlers.
//!
//! Every response produced by a service is an `Envelope`: a JSON object with a `result` field
//! that carries the code and message of an `Outcome`, plus any fields of the response body
//! flattened next to it.  For example, a successful lookup might produce:
//!
//! ```json
//! {"result": {"code": 0, "message": "Valid"}, "key": "foo", "value": "bar"}
//! ```
//!
//! Handlers can return an `Envelope`, an `Outcome` or a `Resulted` directly, as all of them
//! implement `IntoResponse`.  Unexpected errors are never leaked to clients: they are logged and
//! replaced by the generic `INTERNAL_ERROR` outcome.

use crate::result::{builtin, Outcome, Resulted};
use async_trait::async_trait;
use axum::body::HttpBody;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// The JSON envelope wrapped around every response.
#[derive(Debug, Deserialize, Serialize)]
pub struct Envelope<T> {
    /// Outcome of the request.
    pub result: Outcome,

    /// Payload of the response, whose fields are flattened into the envelope.
    #[serde(flatten)]
    pub body: Option<T>,
}

impl<T> Default for Envelope<T> {
    fn default() -> Self {
        Self { result: Outcome::UNDECLARED, body: None }
    }
}

impl<T> Envelope<T> {
    /// Creates an envelope with a `result` and a `body`.
    pub fn new(result: Outcome, body: T) -> Self {
        Self { result, body: Some(body) }
    }

    /// Creates a successful envelope with a `body`.
    pub fn ok(body: T) -> Self {
        Self::new(Outcome::VALID, body)
    }

    /// Creates an envelope with just a `result`.
    pub fn from_outcome(result: Outcome) -> Self {
        Self { result, body: None }
    }

    /// Creates an envelope from the contents of a `Resulted`.
    pub fn from_resulted(resulted: Resulted<T>) -> Self {
        match resulted.into_result() {
            Ok(body) => Self::ok(body),
            Err(result) => Self::from_outcome(result),
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        if self.result == Outcome::UNDECLARED {
            error!("Response sent without declaring its result");
        } else if self.result.exception().is_some() {
            error!("Request failed with unexpected error: {}", self.result);
        } else if self.result.status() == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self.result);
        } else {
            return (self.result.status(), Json(self)).into_response();
        }

        let generic = Envelope::<()>::from_outcome(builtin::INTERNAL_ERROR);
        (StatusCode::INTERNAL_SERVER_ERROR, Json(generic)).into_response()
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        Envelope::<()>::from_outcome(self).into_response()
    }
}

impl<T: Serialize> IntoResponse for Resulted<T> {
    fn into_response(self) -> Response {
        Envelope::from_resulted(self).into_response()
    }
}

/// A request body extractor that decodes JSON and reports failures as envelopes.
///
/// Malformed documents are rejected with `JSON_PARSE` and documents that do not match `T` are
/// rejected with `JSON_MAPPING`.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = Envelope<()>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                debug!("Rejected JSON payload: {}", rejection.body_text());
                let result = match rejection {
                    JsonRejection::JsonDataError(_) => builtin::JSON_MAPPING,
                    _ => builtin::JSON_PARSE,
                };
                Err(Envelope::from_outcome(result))
            }
        }
    }
}

/// A request body extractor that forbids any content.
///
/// Any API that doesn't expect a body should use this to ensure we don't get garbage data that we
/// don't care about.
pub struct EmptyBody {}

#[async_trait]
impl<S> FromRequest<S> for EmptyBody
where
    S: Send + Sync,
{
    type Rejection = Envelope<()>;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        if req.into_body().is_end_stream() {
            Ok(EmptyBody {})
        } else {
            Err(Envelope::from_outcome(builtin::PAYLOAD_NOT_EMPTY))
        }
    }
}

/// Common test code for the REST server.
#[cfg(any(test, feature = "testutils"))]
pub mod testutils {
    use super::*;
    use axum::http::{self, HeaderName, HeaderValue};
    use axum::Router;
    use tower::util::ServiceExt;

    /// Maximum body size for testing purposes.
    const MAX_BODY_SIZE: usize = 64 * 1024;

    /// Builder for a single request to the API server.
    #[must_use]
    pub struct OneShotBuilder {
        /// The router for the app being tested.
        app: Router,

        /// Builder for the request that will be sent to the app.
        builder: axum::http::request::Builder,
    }

    impl OneShotBuilder {
        /// Creates a new request against a given `method`/`uri` pair served by an `app` router.
        pub fn new<U: AsRef<str>>(app: Router, (method, uri): (http::Method, U)) -> Self {
            let builder = Request::builder().method(method).uri(uri.as_ref());
            Self { app, builder }
        }

        /// Sets the header `name` to `value` in the outgoing request.
        pub fn with_header<K, V>(mut self, name: K, value: V) -> Self
        where
            HeaderName: TryFrom<K>,
            <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
            HeaderValue: TryFrom<V>,
            <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
        {
            self.builder = self.builder.header(name, value);
            self
        }

        /// Finishes building the request and sends it with an empty payload.
        pub async fn send_empty(self) -> ResponseChecker {
            let request = self.builder.body(axum::body::Body::empty()).unwrap();
            ResponseChecker::from(self.app.oneshot(request).await.unwrap())
        }

        /// Finishes building the request and sends it with a text payload.
        pub async fn send_text<T: Into<String>>(self, text: T) -> ResponseChecker {
            let request = self
                .builder
                .header(http::header::CONTENT_TYPE, mime::TEXT_PLAIN.as_ref())
                .body(axum::body::Body::from(text.into()))
                .unwrap();
            ResponseChecker::from(self.app.oneshot(request).await.unwrap())
        }

        /// Finishes building the request and sends it with a JSON payload.
        pub async fn send_json<T: Serialize>(self, request: T) -> ResponseChecker {
            let request = self
                .builder
                .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                .body(axum::body::Body::from(serde_json::to_vec(&request).unwrap()))
                .unwrap();
            ResponseChecker::from(self.app.oneshot(request).await.unwrap())
        }
    }

    /// Type alias for the complex type returned by the `oneshot` function.
    type HttpResponse = hyper::Response<axum::body::Body>;

    /// Validator for the outcome of a request sent by a `OneShotBuilder`.
    #[must_use]
    pub struct ResponseChecker {
        /// Actual response that we received from the app.
        response: HttpResponse,

        /// Expected HTTP status code in the response above.
        exp_status: http::StatusCode,
    }

    impl From<HttpResponse> for ResponseChecker {
        fn from(response: HttpResponse) -> Self {
            Self { response, exp_status: http::StatusCode::OK }
        }
    }

    impl ResponseChecker {
        /// Sets the expected exit HTTP status to `status`.
        pub fn expect_status(mut self, status: http::StatusCode) -> Self {
            self.exp_status = status;
            self
        }

        /// Performs common validation operations on the response.
        pub fn verify(&self) {
            assert_eq!(self.exp_status, self.response.status());
        }

        /// Reads the whole body of the response after validating it.
        async fn take_body(self) -> Vec<u8> {
            self.verify();
            axum::body::to_bytes(self.response.into_body(), MAX_BODY_SIZE).await.unwrap().to_vec()
        }

        /// Finishes checking the response and expects its body to be an `Envelope` without
        /// payload whose result matches `exp` in both code and message.
        pub async fn expect_outcome(self, exp: &Outcome) {
            let envelope = self.expect_envelope::<serde_json::Value>().await;
            assert_eq!(exp.code(), envelope.result.code(), "Got {:?}", envelope);
            assert_eq!(exp.message(), envelope.result.message());
        }

        /// Finishes checking the response and expects its body to be an `Envelope` with a
        /// payload of type `T`.
        pub async fn expect_envelope<T: DeserializeOwned>(self) -> Envelope<T> {
            let body = self.take_body().await;
            match serde_json::from_slice::<Envelope<T>>(&body) {
                Ok(envelope) => envelope,
                Err(e) => {
                    let body = String::from_utf8(body).unwrap();
                    panic!("Invalid envelope due to {}; content was {}", e, body);
                }
            }
        }

        /// Finishes checking the response and expects a successful `Envelope` whose payload is
        /// of type `T`.
        pub async fn expect_json<T: DeserializeOwned>(self) -> T {
            let envelope = self.expect_envelope::<T>().await;
            assert_eq!(Outcome::VALID, envelope.result);
            envelope.body.expect("Envelope has no payload")
        }

        /// Finishes checking the response and expects its body to be valid UTF-8 and to match
        /// `exp_re`.
        pub async fn expect_text(self, exp_re: &str) {
            let body = String::from_utf8(self.take_body().await).unwrap();
            let re = regex::Regex::new(exp_re).unwrap();
            assert!(re.is_match(&body), "Body content '{}' does not match re '{}'", body, exp_re);
        }
    }

    /// Generates a test to verify that an API that expects JSON fails when it gets something else.
    #[macro_export]
    macro_rules! test_payload_must_be_json {
        ( $app:expr, $route:expr ) => {
            #[tokio::test]
            async fn test_payload_must_be_json() {
                $crate::rest::testutils::OneShotBuilder::new($app, $route)
                    .with_header(axum::http::header::CONTENT_TYPE, "application/json")
                    .send_text("this is not json")
                    .await
                    .expect_status(axum::http::StatusCode::BAD_REQUEST)
                    .expect_outcome(&$crate::result::builtin::JSON_PARSE)
                    .await;
            }
        };
    }

    pub use test_payload_must_be_json;

    /// Generates a test to verify that an API that does not expect a payload fails as necessary.
    #[macro_export]
    macro_rules! test_payload_must_be_empty {
        ( $app:expr, $route:expr ) => {
            #[tokio::test]
            async fn test_payload_must_be_empty() {
                $crate::rest::testutils::OneShotBuilder::new($app, $route)
                    .send_text("should not be here")
                    .await
                    .expect_status(axum::http::StatusCode::PAYLOAD_TOO_LARGE)
                    .expect_outcome(&$crate::result::builtin::PAYLOAD_NOT_EMPTY)
                    .await;
            }
        };
    }

    pub use test_payload_must_be_empty;
}
