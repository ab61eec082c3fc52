//! WebDAV transport.
//!
//! Speaks the handful of WebDAV verbs the adapter needs (PROPFIND, MKCOL, PUT,
//! GET, DELETE) over reqwest. Multistatus responses are scanned for the two
//! properties we care about rather than fully parsed.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::debug;

use crate::backend::{ByteStream, ObjectStat, RemoteTransport};
use crate::config::StorageConfig;
use crate::error::RemoteError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontentlength/>
  </d:prop>
</d:propfind>"#;

#[derive(Clone)]
pub struct WebDavTransport {
    client: Client,
    base_url: String,
    auth: Option<(String, Option<String>)>,
}

impl WebDavTransport {
    pub fn new(
        base_url: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: username.map(|u| (u.to_string(), password.map(|p| p.to_string()))),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self, RemoteError> {
        Self::new(
            &config.url,
            config.username.as_deref(),
            config.password.as_deref(),
        )
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, encode_path(path))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, self.object_url(path));
        match &self.auth {
            Some((user, password)) => req.basic_auth(user, password.as_ref()),
            None => req,
        }
    }
}

#[async_trait]
impl RemoteTransport for WebDavTransport {
    async fn stat(&self, path: &str) -> Result<ObjectStat, RemoteError> {
        let resp = self
            .request(dav_method(b"PROPFIND"), path)
            .header("Depth", "0")
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(PROPFIND_BODY)
            .send()
            .await?;

        match resp.status() {
            StatusCode::MULTI_STATUS | StatusCode::OK => {
                let body = resp.text().await?;
                Ok(parse_stat(&body))
            }
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound(path.to_string())),
            _ => Err(server_error(resp).await),
        }
    }

    async fn create_directory(&self, path: &str) -> Result<(), RemoteError> {
        let resp = self.request(dav_method(b"MKCOL"), path).send().await?;

        match resp.status() {
            StatusCode::CREATED | StatusCode::OK => {
                debug!(path = %path, "WebDAV collection created");
                Ok(())
            }
            // RFC 4918: MKCOL on an existing resource is 405
            StatusCode::METHOD_NOT_ALLOWED => Err(RemoteError::AlreadyExists(path.to_string())),
            _ => Err(server_error(resp).await),
        }
    }

    async fn put_file_contents(&self, path: &str, data: Bytes) -> Result<(), RemoteError> {
        let len = data.len();
        let resp = self
            .request(Method::PUT, path)
            .header("Content-Type", "application/octet-stream")
            .body(data)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(server_error(resp).await);
        }
        debug!(path = %path, bytes = len, "WebDAV upload complete");
        Ok(())
    }

    async fn get_file_contents(&self, path: &str) -> Result<Bytes, RemoteError> {
        let resp = self.request(Method::GET, path).send().await?;

        match resp.status() {
            s if s.is_success() => Ok(resp.bytes().await?),
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound(path.to_string())),
            _ => Err(server_error(resp).await),
        }
    }

    async fn delete_file(&self, path: &str) -> Result<(), RemoteError> {
        let resp = self.request(Method::DELETE, path).send().await?;

        match resp.status() {
            s if s.is_success() => {
                debug!(path = %path, "WebDAV delete complete");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound(path.to_string())),
            _ => Err(server_error(resp).await),
        }
    }

    async fn create_read_stream(&self, path: &str) -> Result<ByteStream, RemoteError> {
        let resp = self.request(Method::GET, path).send().await?;

        match resp.status() {
            s if s.is_success() => Ok(Box::pin(
                resp.bytes_stream().map(|chunk| chunk.map_err(RemoteError::from)),
            )),
            StatusCode::NOT_FOUND => Err(RemoteError::NotFound(path.to_string())),
            _ => Err(server_error(resp).await),
        }
    }
}

fn dav_method(name: &'static [u8]) -> Method {
    // Extension methods are valid tokens, so this cannot fail for the verbs used here.
    Method::from_bytes(name).unwrap_or(Method::GET)
}

async fn server_error(resp: Response) -> RemoteError {
    let status = resp.status().as_u16();
    let reason = resp.text().await.unwrap_or_default();
    RemoteError::Server { status, reason }
}

/// Percent-encode each path segment, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Pull `resourcetype` and `getcontentlength` out of a Depth: 0 multistatus body.
fn parse_stat(xml: &str) -> ObjectStat {
    let is_collection = element_body(xml, "resourcetype")
        .map(|body| body.contains("collection"))
        .unwrap_or(false);
    let content_length = element_body(xml, "getcontentlength").and_then(|s| s.trim().parse().ok());
    ObjectStat {
        is_collection,
        content_length,
    }
}

/// Inner text of the first element whose local name is `local`, ignoring any
/// namespace prefix. Self-closing elements yield an empty body.
fn element_body<'a>(xml: &'a str, local: &str) -> Option<&'a str> {
    let mut rest = xml;
    while let Some(open) = rest.find('<') {
        rest = &rest[open + 1..];
        let end = rest.find('>')?;
        let tag = &rest[..end];
        let name = tag.split_whitespace().next().unwrap_or("");
        let bare = name.rsplit(':').next().unwrap_or(name);
        if name.starts_with('/') || bare.trim_end_matches('/') != local {
            continue;
        }
        if tag.ends_with('/') {
            return Some("");
        }
        let body = &rest[end + 1..];
        let close = body.find("</")?;
        return Some(&body[..close]);
    }
    None
}

#[cfg(test)]
mod tests {
    use axum::http::{header, HeaderMap, Method as HttpMethod, StatusCode as HttpStatus, Uri};
    use axum::Router;

    use super::*;

    /// `ghost:secret`
    const EXPECTED_AUTH: &str = "Basic Z2hvc3Q6c2VjcmV0";

    const FILE_STAT: &str = r#"<D:multistatus xmlns:D="DAV:"><D:response><D:href>/dav/data/x.jpg</D:href>
<D:propstat><D:prop><D:resourcetype/><D:getcontentlength>5</D:getcontentlength></D:prop>
<D:status>HTTP/1.1 200 OK</D:status></D:propstat></D:response></D:multistatus>"#;

    const DIR_STAT: &str = r#"<d:multistatus xmlns:d="DAV:"><d:response><d:href>/dav/data/</d:href>
<d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop>
<d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response></d:multistatus>"#;

    async fn fake_dav(method: HttpMethod, uri: Uri, headers: HeaderMap) -> (HttpStatus, String) {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            == Some(EXPECTED_AUTH);
        if !authorized {
            return (HttpStatus::UNAUTHORIZED, "login required".into());
        }

        let depth = headers.get("depth").and_then(|v| v.to_str().ok());
        match (method.as_str(), uri.path()) {
            ("PROPFIND", "/dav/data") if depth == Some("0") => (HttpStatus::MULTI_STATUS, DIR_STAT.into()),
            ("PROPFIND", "/dav/data/x.jpg") if depth == Some("0") => {
                (HttpStatus::MULTI_STATUS, FILE_STAT.into())
            }
            ("MKCOL", "/dav/data/new") => (HttpStatus::CREATED, String::new()),
            ("MKCOL", "/dav/data/2024") => (HttpStatus::METHOD_NOT_ALLOWED, String::new()),
            ("MKCOL", "/dav/data/a/b") => (HttpStatus::CONFLICT, "parent missing".into()),
            ("PUT", "/dav/data/full.jpg") => (HttpStatus::INSUFFICIENT_STORAGE, "quota".into()),
            ("PUT", _) => (HttpStatus::CREATED, String::new()),
            ("GET", "/dav/data/x.jpg") => (HttpStatus::OK, "hello".into()),
            ("DELETE", "/dav/data/x.jpg") => (HttpStatus::NO_CONTENT, String::new()),
            _ => (HttpStatus::NOT_FOUND, String::new()),
        }
    }

    /// Base URL of a throwaway server answering like a WebDAV share mounted at `/dav`.
    async fn spawn_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().fallback(fake_dav)).await.unwrap();
        });
        format!("http://{}/dav", addr)
    }

    async fn transport() -> WebDavTransport {
        WebDavTransport::new(&spawn_server().await, Some("ghost"), Some("secret")).unwrap()
    }

    #[tokio::test]
    async fn test_mkcol_statuses() {
        let t = transport().await;
        t.create_directory("/data/new").await.unwrap();

        let err = t.create_directory("/data/2024").await.unwrap_err();
        assert!(matches!(err, RemoteError::AlreadyExists(ref p) if p == "/data/2024"));

        let err = t.create_directory("/data/a/b").await.unwrap_err();
        assert!(
            matches!(err, RemoteError::Server { status: 409, ref reason } if reason == "parent missing")
        );
    }

    #[tokio::test]
    async fn test_propfind_statuses() {
        let t = transport().await;

        let dir = t.stat("/data").await.unwrap();
        assert!(dir.is_collection);

        let file = t.stat("/data/x.jpg").await.unwrap();
        assert_eq!(
            file,
            ObjectStat {
                is_collection: false,
                content_length: Some(5)
            }
        );

        let err = t.stat("/data/missing.jpg").await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(ref p) if p == "/data/missing.jpg"));
    }

    #[tokio::test]
    async fn test_put_failure_keeps_status() {
        let t = transport().await;
        t.put_file_contents("/data/ok.jpg", Bytes::from_static(b"x"))
            .await
            .unwrap();

        let err = t
            .put_file_contents("/data/full.jpg", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Server { status: 507, ref reason } if reason == "quota"));
    }

    #[tokio::test]
    async fn test_get_and_stream_statuses() {
        let t = transport().await;

        assert_eq!(t.get_file_contents("/data/x.jpg").await.unwrap(), "hello");
        let err = t.get_file_contents("/data/missing.jpg").await.unwrap_err();
        assert!(err.is_not_found());

        let mut stream = t.create_read_stream("/data/x.jpg").await.unwrap();
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(body, b"hello");

        match t.create_read_stream("/data/missing.jpg").await {
            Err(e) => assert!(e.is_not_found()),
            Ok(_) => panic!("stream opened for a missing object"),
        }
    }

    #[tokio::test]
    async fn test_delete_statuses() {
        let t = transport().await;
        t.delete_file("/data/x.jpg").await.unwrap();

        let err = t.delete_file("/data/missing.jpg").await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(ref p) if p == "/data/missing.jpg"));
    }

    #[tokio::test]
    async fn test_credentials_are_sent() {
        let base = spawn_server().await;

        let anonymous = WebDavTransport::new(&base, None, None).unwrap();
        let err = anonymous.stat("/data").await.unwrap_err();
        assert!(matches!(err, RemoteError::Server { status: 401, .. }));

        let wrong = WebDavTransport::new(&base, Some("ghost"), Some("guess")).unwrap();
        assert!(wrong.stat("/data").await.is_err());

        let authed = WebDavTransport::new(&base, Some("ghost"), Some("secret")).unwrap();
        assert!(authed.stat("/data").await.unwrap().is_collection);
    }

    #[test]
    fn test_encode_path() {
        assert_eq!(encode_path("/data/2024/05/my photo.jpg"), "/data/2024/05/my%20photo.jpg");
        assert_eq!(encode_path("/"), "/");
    }

    #[test]
    fn test_object_url_trims_base() {
        let t = WebDavTransport::new("https://dav.example.com/remote.php/webdav/", None, None).unwrap();
        assert_eq!(
            t.object_url("/images/a.png"),
            "https://dav.example.com/remote.php/webdav/images/a.png"
        );
    }

    #[test]
    fn test_parse_stat_file() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/data/2024/05/x.jpg</D:href>
    <D:propstat>
      <D:prop>
        <D:resourcetype/>
        <D:getcontentlength>5120</D:getcontentlength>
      </D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#;
        let stat = parse_stat(xml);
        assert!(!stat.is_collection);
        assert_eq!(stat.content_length, Some(5120));
    }

    #[test]
    fn test_parse_stat_collection() {
        let xml = r#"<d:multistatus xmlns:d="DAV:"><d:response><d:href>/data/</d:href>
<d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop>
<d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response></d:multistatus>"#;
        let stat = parse_stat(xml);
        assert!(stat.is_collection);
        assert_eq!(stat.content_length, None);
    }

    #[test]
    fn test_element_body_skips_closing_tags() {
        assert_eq!(element_body("<a></a><b>7</b>", "b"), Some("7"));
        assert_eq!(element_body("<x:b attr=\"1\">9</x:b>", "b"), Some("9"));
        assert_eq!(element_body("<a>1</a>", "b"), None);
    }
}
