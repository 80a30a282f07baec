//! reqwest-backed transport implementation

use super::{RawResponse, ResponseBody, Transport};
use crate::config::Config;
use crate::error::{Result, TransportError};
use crate::request::{PartValue, Request};
use crate::retry::with_retry;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tokio::io::AsyncWriteExt;

/// HTTP transport built on a shared reqwest client
///
/// One instance (and thus one connection pool) is shared across all workers.
/// Transient connect-level failures are retried per the configured policy;
/// responses carrying an HTTP status are returned as-is, whatever the code.
pub struct HttpTransport {
    client: reqwest::Client,
    retry: crate::config::RetryConfig,
}

impl HttpTransport {
    /// Build the transport from the library configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`](crate::Error::Network) if the underlying
    /// client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.http.user_agent.clone())
            .connect_timeout(config.http.connect_timeout)
            .timeout(config.http.request_timeout)
            .build()?;

        Ok(Self {
            client,
            retry: config.retry.clone(),
        })
    }

    fn request_builder(&self, request: &Request) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone());

        if let Some(body) = request.body() {
            if let Some(content_type) = body.content_type() {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            builder = builder.body(body.as_bytes().to_vec());
        }

        builder
    }

    async fn build_form(request: &Request) -> std::result::Result<reqwest::multipart::Form, TransportError> {
        let mut form = reqwest::multipart::Form::new();

        for part in request.parts() {
            let built = match &part.value {
                PartValue::Text(value) => reqwest::multipart::Part::text(value.clone()),
                PartValue::Bytes {
                    data,
                    file_name,
                    content_type,
                } => {
                    let mut built = reqwest::multipart::Part::bytes(data.clone());
                    if let Some(name) = file_name {
                        built = built.file_name(name.clone());
                    }
                    if let Some(mime) = content_type {
                        built = built.mime_str(mime)?;
                    }
                    built
                }
                PartValue::File {
                    path,
                    file_name,
                    content_type,
                } => {
                    let data = tokio::fs::read(path).await?;
                    let mut built = reqwest::multipart::Part::bytes(data);
                    let name = file_name.clone().or_else(|| {
                        path.file_name().map(|n| n.to_string_lossy().into_owned())
                    });
                    if let Some(name) = name {
                        built = built.file_name(name);
                    }
                    if let Some(mime) = content_type {
                        built = built.mime_str(mime)?;
                    }
                    built
                }
            };
            form = form.part(part.name.clone(), built);
        }

        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform_simple(&self, request: &Request) -> std::result::Result<RawResponse, TransportError> {
        let response = with_retry(&self.retry, || async {
            let response = self.request_builder(request).send().await?;
            Ok::<_, TransportError>(response)
        })
        .await?;

        Ok(RawResponse::new(
            response.status().as_u16(),
            response.headers().clone(),
            Some(Box::new(HttpBody::new(response))),
        ))
    }

    async fn perform_download(&self, request: &Request) -> std::result::Result<RawResponse, TransportError> {
        let destination = request
            .download_to()
            .ok_or_else(|| {
                TransportError::Other("download request is missing a destination path".to_string())
            })?
            .clone();

        let (status, headers) = with_retry(&self.retry, || {
            let destination = destination.clone();
            async move {
                let mut response = self.request_builder(request).send().await?;
                let status = response.status();
                let headers = response.headers().clone();

                // Error and not-modified statuses produce no payload; never
                // touch the destination file for them.
                if status.is_success() {
                    let mut file = tokio::fs::File::create(&destination).await?;
                    let mut written: u64 = 0;
                    while let Some(chunk) = response.chunk().await? {
                        file.write_all(&chunk).await?;
                        written += chunk.len() as u64;
                    }
                    file.flush().await?;
                    tracing::debug!(
                        bytes = written,
                        path = %destination.display(),
                        "download written to destination"
                    );
                }

                Ok::<_, TransportError>((status.as_u16(), headers))
            }
        })
        .await?;

        Ok(RawResponse::new(status, headers, None))
    }

    async fn perform_upload(&self, request: &Request) -> std::result::Result<RawResponse, TransportError> {
        let response = with_retry(&self.retry, || async {
            // The form is not reusable across attempts; rebuild it (and
            // re-read any file parts) each time.
            let form = Self::build_form(request).await?;
            let response = self.request_builder(request).multipart(form).send().await?;
            Ok::<_, TransportError>(response)
        })
        .await?;

        Ok(RawResponse::new(
            response.status().as_u16(),
            response.headers().clone(),
            Some(Box::new(HttpBody::new(response))),
        ))
    }
}

/// Response body backed by a live reqwest response
struct HttpBody {
    response: Option<reqwest::Response>,
}

impl HttpBody {
    fn new(response: reqwest::Response) -> Self {
        Self {
            response: Some(response),
        }
    }
}

#[async_trait]
impl ResponseBody for HttpBody {
    async fn read_to_end(&mut self) -> std::io::Result<Vec<u8>> {
        match self.response.take() {
            Some(response) => response
                .bytes()
                .await
                .map(|bytes| bytes.to_vec())
                .map_err(std::io::Error::other),
            None => Ok(Vec::new()),
        }
    }

    fn close(&mut self) -> std::io::Result<()> {
        // Dropping the response releases the connection back to the pool
        self.response.take();
        Ok(())
    }
}
