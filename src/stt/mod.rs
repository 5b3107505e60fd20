//! Speech-to-text boundary
//!
//! One network exchange per utterance: the encoded segment is posted with a
//! bearer credential and the response carries either recognized text or an
//! error payload. Retries are a caller policy decision, not built in.

mod credentials;

pub use credentials::{
    ConfiguredCredential, CredentialChain, CredentialProvider, EnvCredential, CREDENTIAL_ENV_VAR,
};

use secrecy::ExposeSecret;

use crate::audio::EncodedSegment;
use crate::config::SttConfig;
use crate::{Error, Result};

/// Response from the transcription service
#[derive(Debug, serde::Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
    error: Option<ErrorPayload>,
}

/// Error payload shapes seen in the wild: a bare string or an object with a
/// message field
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum ErrorPayload {
    Object { message: String },
    Message(String),
}

impl ErrorPayload {
    fn into_message(self) -> String {
        match self {
            Self::Object { message } | Self::Message(message) => message,
        }
    }
}

/// Transcribes finished audio segments
pub struct TranscriptionClient {
    client: reqwest::Client,
    endpoint: String,
    credentials: CredentialChain,
}

impl TranscriptionClient {
    #[must_use]
    pub fn new(endpoint: String, credentials: CredentialChain) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            credentials,
        }
    }

    /// Build a client from configuration with the standard provider order:
    /// persisted config value, then the process environment default.
    #[must_use]
    pub fn from_config(config: &SttConfig) -> Self {
        let chain = CredentialChain::new(vec![
            Box::new(ConfiguredCredential::new(config.credential.clone())),
            Box::new(EnvCredential::default()),
        ]);
        Self::new(config.endpoint.clone(), chain)
    }

    /// Transcribe one segment.
    ///
    /// The credential is resolved before any network activity: explicit
    /// argument, then the provider chain.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingCredential`] when nothing in the chain resolves;
    ///   the network is never touched.
    /// - [`Error::Upstream`] when the service reports an error payload.
    /// - [`Error::Transport`] on network failure.
    pub async fn transcribe(
        &self,
        segment: &EncodedSegment,
        credential: Option<&str>,
    ) -> Result<String> {
        let credential = self
            .credentials
            .resolve(credential)
            .ok_or(Error::MissingCredential)?;

        tracing::debug!(
            audio_bytes = segment.wav.len(),
            duration_ms = segment.duration.as_millis(),
            "starting transcription"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(segment.wav.clone())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received transcription response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TranscriptionResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .map_or_else(|| format!("{status}: {body}"), ErrorPayload::into_message);
            tracing::error!(status = %status, message = %message, "transcription service error");
            return Err(Error::Upstream(message));
        }

        let result: TranscriptionResponse = response.json().await?;

        if let Some(error) = result.error {
            return Err(Error::Upstream(error.into_message()));
        }

        let text = result
            .text
            .ok_or_else(|| Error::Upstream("response carried no text".to_string()))?;

        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }
}
