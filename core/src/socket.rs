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

//! Outbound HTTP calls to other services.
//!
//! A `SocketFactory` fixes the base URL of a remote service and the media type expected back
//! from it.  Each `ServiceSocket` it creates targets one path under that base and accumulates
//! the headers and query parameters of the call before issuing it.

use log::debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Body, Client, Method, RequestBuilder, Response};
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// Errors raised while calling another service.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// The base URL of the remote service is malformed or cannot hold a path.
    #[error("Invalid service URL '{0}': {1}")]
    InvalidUrl(String, String),

    /// The request could not be sent or its response could not be received.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Result type for this module.
pub type SocketResult<T> = Result<T, SocketError>;

/// Creates sockets against a single remote service.
#[derive(Clone, Debug)]
pub struct SocketFactory {
    /// Base URL of the remote service.
    base: Url,

    /// Value of the `Accept` header sent with every call.
    accept: String,

    /// HTTP client shared by all sockets created by this factory.
    client: Client,
}

impl SocketFactory {
    /// Creates a factory for the service at `uri` that responds with the `accept` media type.
    pub fn new<A: Into<String>>(uri: &str, accept: A) -> SocketResult<Self> {
        let base =
            Url::parse(uri).map_err(|e| SocketError::InvalidUrl(uri.to_owned(), e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(SocketError::InvalidUrl(uri.to_owned(), "Cannot hold a path".to_owned()));
        }
        Ok(Self { base, accept: accept.into(), client: Client::default() })
    }

    /// Replaces the HTTP client with `client`, which allows customizing TLS and timeouts.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Shares the HTTP client of `other` with this factory.
    pub fn with_factory_client(mut self, other: &SocketFactory) -> Self {
        self.client = other.client.clone();
        self
    }

    /// Returns the base URL of the remote service.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Creates a socket for the endpoint at `path` under the base URL.
    pub fn create_socket<P: Into<String>>(&self, path: P) -> ServiceSocket {
        ServiceSocket {
            client: self.client.clone(),
            base: self.base.clone(),
            accept: self.accept.clone(),
            path: path.into(),
            headers: BTreeMap::default(),
            queries: BTreeMap::default(),
        }
    }
}

/// A call to one endpoint of a remote service.
///
/// Headers and query parameters keep the first value given for each name.
#[derive(Clone, Debug)]
pub struct ServiceSocket {
    /// HTTP client to issue the call with.
    client: Client,

    /// Base URL of the remote service.
    base: Url,

    /// Value of the `Accept` header.
    accept: String,

    /// Path of the endpoint relative to `base`.
    path: String,

    /// Headers to send.
    headers: BTreeMap<String, String>,

    /// Query parameters to send.
    queries: BTreeMap<String, String>,
}

impl ServiceSocket {
    /// Adds the header `key` with `value` unless `key` was already set.
    pub fn header<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.headers.entry(key.into()).or_insert_with(|| value.to_string());
        self
    }

    /// Adds all `headers` as if by calling `header` on each of them.
    pub fn headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        headers.into_iter().fold(self, |socket, (key, value)| socket.header(key, value))
    }

    /// Adds the query parameter `key` with `value` unless `key` was already set.
    pub fn query<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.queries.entry(key.into()).or_insert_with(|| value.to_string());
        self
    }

    /// Adds all `queries` as if by calling `query` on each of them.
    pub fn queries<I, K, V>(self, queries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        queries.into_iter().fold(self, |socket, (key, value)| socket.query(key, value))
    }

    /// Computes the full URL of the endpoint, including the query parameters.
    pub fn url(&self) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(self.path.split('/').filter(|s| !s.is_empty()));
        }
        if !self.queries.is_empty() {
            url.query_pairs_mut().extend_pairs(self.queries.iter());
        }
        url
    }

    /// Prepares a request with `method` carrying all the accumulated settings.
    fn request(&self, method: Method) -> RequestBuilder {
        let url = self.url();
        debug!("{} {}", method, url);
        let mut builder = self.client.request(method, url).header(ACCEPT, &self.accept);
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }
        builder
    }

    /// Sends `builder` and returns the response, whatever its status.
    async fn send(builder: RequestBuilder) -> SocketResult<Response> {
        Ok(builder.send().await?)
    }

    /// Issues a GET request.
    pub async fn get(&self) -> SocketResult<Response> {
        Self::send(self.request(Method::GET)).await
    }

    /// Issues a HEAD request.
    pub async fn head(&self) -> SocketResult<Response> {
        Self::send(self.request(Method::HEAD)).await
    }

    /// Issues a POST request with `body` of the `content_type` media type.
    pub async fn post<B: Into<Body>>(&self, content_type: &str, body: B) -> SocketResult<Response> {
        Self::send(
            self.request(Method::POST).header(CONTENT_TYPE, content_type).body(body),
        )
        .await
    }

    /// Issues a POST request with `body` serialized as JSON.
    pub async fn post_json<T: Serialize + ?Sized>(&self, body: &T) -> SocketResult<Response> {
        Self::send(self.request(Method::POST).json(body)).await
    }

    /// Issues a PUT request with `body` of the `content_type` media type.
    pub async fn put<B: Into<Body>>(&self, content_type: &str, body: B) -> SocketResult<Response> {
        Self::send(
            self.request(Method::PUT).header(CONTENT_TYPE, content_type).body(body),
        )
        .await
    }

    /// Issues a PUT request with `body` serialized as JSON.
    pub async fn put_json<T: Serialize + ?Sized>(&self, body: &T) -> SocketResult<Response> {
        Self::send(self.request(Method::PUT).json(body)).await
    }

    /// Issues a DELETE request.
    pub async fn delete(&self) -> SocketResult<Response> {
        Self::send(self.request(Method::DELETE)).await
    }

    /// Issues an OPTIONS request.
    pub async fn options(&self) -> SocketResult<Response> {
        Self::send(self.request(Method::OPTIONS)).await
    }

    /// Issues a TRACE request.
    pub async fn trace(&self) -> SocketResult<Response> {
        Self::send(self.request(Method::TRACE)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Uri};
    use axum::routing::any;
    use axum::{Json, Router};
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use std::net::SocketAddr;

    /// Echoes the details of the request it receives as a JSON document.
    async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Value> {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
        Json(json!({
            "method": method.as_str(),
            "path": uri.path(),
            "query": uri.query(),
            "accept": header("accept"),
            "content_type": header("content-type"),
            "token": header("x-token"),
            "body": body,
        }))
    }

    /// Starts an echo server in the background and returns its address.
    async fn start_server() -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/*path", any(echo));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    /// Creates a factory against the echo server at `addr` under the `/api` base path.
    fn factory(addr: SocketAddr) -> SocketFactory {
        SocketFactory::new(&format!("http://{}/api/", addr), "application/json").unwrap()
    }

    /// Checks that `response` succeeded and returns the request details echoed in it.
    async fn echoed(response: SocketResult<Response>) -> Value {
        let response = response.unwrap();
        assert_eq!(StatusCode::OK, response.status());
        response.json::<Value>().await.unwrap()
    }

    #[test]
    fn test_factory_invalid_url() {
        match SocketFactory::new("not a url", "application/json") {
            Err(SocketError::InvalidUrl(url, _)) => assert_eq!("not a url", url),
            e => panic!("Unexpected result {:?}", e),
        }
        match SocketFactory::new("mailto:someone@example.com", "application/json") {
            Err(SocketError::InvalidUrl(_, message)) => assert_eq!("Cannot hold a path", message),
            e => panic!("Unexpected result {:?}", e),
        }
    }

    #[test]
    fn test_url_joins_paths() {
        let factory = SocketFactory::new("http://localhost:8080/api", "text/plain").unwrap();
        assert_eq!("http://localhost:8080/api/keys/a", factory.create_socket("keys/a").url().as_str());
        assert_eq!(
            "http://localhost:8080/api/keys/a",
            factory.create_socket("/keys//a/").url().as_str()
        );

        let factory = SocketFactory::new("http://localhost:8080/", "text/plain").unwrap();
        assert_eq!("http://localhost:8080/keys", factory.create_socket("keys").url().as_str());
        assert_eq!(&Url::parse("http://localhost:8080/").unwrap(), factory.base());
    }

    #[test]
    fn test_url_encodes_path_and_queries() {
        let factory = SocketFactory::new("http://localhost/", "text/plain").unwrap();
        let socket = factory.create_socket("a b").query("q", "x&y").query("n", 3);
        assert_eq!("http://localhost/a%20b?n=3&q=x%26y", socket.url().as_str());
    }

    #[test]
    fn test_first_value_wins() {
        let factory = SocketFactory::new("http://localhost/", "text/plain").unwrap();
        let socket = factory
            .create_socket("keys")
            .queries([("page", "1"), ("page", "2")])
            .query("page", "3")
            .headers([("x-token", "first")])
            .header("x-token", "second");
        assert_eq!("http://localhost/keys?page=1", socket.url().as_str());
        assert_eq!(Some(&"first".to_owned()), socket.headers.get("x-token"));
    }

    #[tokio::test]
    async fn test_get_sends_settings() {
        let addr = start_server().await;
        let socket = factory(addr).create_socket("keys").header("x-token", "abc").query("limit", 5);

        let response = echoed(socket.get().await).await;
        assert_eq!("GET", response["method"]);
        assert_eq!("/api/keys", response["path"]);
        assert_eq!("limit=5", response["query"]);
        assert_eq!("application/json", response["accept"]);
        assert_eq!("abc", response["token"]);
    }

    #[tokio::test]
    async fn test_bodyless_methods() {
        let addr = start_server().await;
        let socket = factory(addr).create_socket("keys/a");

        assert_eq!("DELETE", echoed(socket.delete().await).await["method"]);
        assert_eq!("OPTIONS", echoed(socket.options().await).await["method"]);
        assert_eq!("TRACE", echoed(socket.trace().await).await["method"]);

        let response = socket.head().await.unwrap();
        assert_eq!(StatusCode::OK, response.status());
        assert!(response.bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_methods_with_body() {
        let addr = start_server().await;
        let socket = factory(addr).create_socket("keys/a");

        let response = echoed(socket.post("text/plain", "raw text").await).await;
        assert_eq!("POST", response["method"]);
        assert_eq!("text/plain", response["content_type"]);
        assert_eq!("raw text", response["body"]);

        let response = echoed(socket.put_json(&json!({"value": "v"})).await).await;
        assert_eq!("PUT", response["method"]);
        assert_eq!("application/json", response["content_type"]);
        assert_eq!(r#"{"value":"v"}"#, response["body"]);

        let response = echoed(socket.post_json(&[1, 2]).await).await;
        assert_eq!("[1,2]", response["body"]);

        let response = echoed(socket.put("application/xml", "<a/>").await).await;
        assert_eq!("<a/>", response["body"]);
    }

    #[tokio::test]
    async fn test_shared_client() {
        let addr = start_server().await;
        let first = factory(addr);
        let second = SocketFactory::new(&format!("http://{}/other", addr), "text/plain")
            .unwrap()
            .with_factory_client(&first);

        let response = echoed(second.create_socket("x").get().await).await;
        assert_eq!("/other/x", response["path"]);
        assert_eq!("text/plain", response["accept"]);

        let custom = factory(addr).with_client(Client::new());
        assert_eq!("/api/y", echoed(custom.create_socket("y").get().await).await["path"]);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        match factory(addr).create_socket("keys").get().await {
            Err(SocketError::Request(_)) => (),
            e => panic!("Unexpected result {:?}", e.map(|r| r.status())),
        }
    }
}
