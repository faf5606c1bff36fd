// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! [`Target`] over HTTP with a blocking client.

use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::header::USER_AGENT;

use super::target::{AccessCredential, Download, InferenceResponse, ModelListing, Target, TargetError};
use crate::config::ProtocolConfig;

/// A remote model host.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    client: Client,
    base_url: String,
    models_path: String,
    download_path: String,
    inference_path: String,
}

impl HttpTarget {
    /// Build a client with the configured per-request timeout.
    pub fn new(config: &ProtocolConfig) -> Result<Self, TargetError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            models_path: config.models_path.clone(),
            download_path: config.download_path.clone(),
            inference_path: config.inference_path.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder, credential: &AccessCredential) -> RequestBuilder {
        credential.headers().iter().fold(request, |req, &(name, value)| {
            if name.eq_ignore_ascii_case("User-Agent") {
                req.header(USER_AGENT, value)
            } else {
                req.header(name, value)
            }
        })
    }
}

fn transport(e: reqwest::Error) -> TargetError {
    TargetError::Transport(e.to_string())
}

/// `x-risk-level` -> `X-Risk-Level`, the casing hosts send on the wire.
fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    let mut out = first.to_ascii_uppercase().to_string();
                    out.push_str(&chars.as_str().to_ascii_lowercase());
                    out
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Map non-success statuses to [`TargetError`].
fn check_status(response: Response, what: &str) -> Result<Response, TargetError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(TargetError::NotFound(what.to_owned()));
    }
    let message = response.text().unwrap_or_default();
    Err(TargetError::Rejected { status: status.as_u16(), message })
}

impl Target for HttpTarget {
    fn fetch_text(&self, path: &str) -> Result<String, TargetError> {
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        let response = self.client.get(&url).send().map_err(transport)?;
        check_status(response, path)?.text().map_err(transport)
    }

    fn list_models(&self, credential: &AccessCredential) -> Result<ModelListing, TargetError> {
        let url = self.url(&self.models_path);
        tracing::debug!(%url, "GET (authenticated)");
        let request = self.authorized(self.client.get(&url), credential);
        let response = check_status(request.send().map_err(transport)?, &self.models_path)?;
        response
            .json::<ModelListing>()
            .map_err(|e| TargetError::InvalidResponse(e.to_string()))
    }

    fn download_model(&self, model_id: &str, credential: &AccessCredential) -> Result<Download, TargetError> {
        let url = self.url(&self.download_path);
        tracing::debug!(%url, model_id, "GET model");
        let request = self.authorized(self.client.get(&url), credential).query(&[("model", model_id)]);
        let response = check_status(request.send().map_err(transport)?, model_id)?;

        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| name.as_str().starts_with("x-"))
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (canonical_header_name(name.as_str()), v.to_owned()))
            })
            .collect();
        let bytes = response.bytes().map_err(transport)?.to_vec();
        Ok(Download { bytes, headers })
    }

    fn infer(&self, model_id: &str, image: &[u8]) -> Result<InferenceResponse, TargetError> {
        let url = self.url(&self.inference_path);
        tracing::debug!(%url, model_id, bytes = image.len(), "POST inference");
        let part = multipart::Part::bytes(image.to_vec())
            .file_name("trigger.png")
            .mime_str("image/png")
            .map_err(transport)?;
        let form = multipart::Form::new().part("image", part);
        let response = self
            .client
            .post(&url)
            .header("X-Model", model_id)
            .multipart(form)
            .send()
            .map_err(transport)?;
        check_status(response, model_id)?
            .json::<InferenceResponse>()
            .map_err(|e| TargetError::InvalidResponse(e.to_string()))
    }
}
