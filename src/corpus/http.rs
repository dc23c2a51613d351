use serde::Deserialize;
use std::thread;
use std::time::Duration;

use super::{CorpusProvider, ProviderError, VerseCache};
use crate::scheduler::VerseAddress;
use crate::ui::prelude::*;

#[derive(Debug, Deserialize)]
struct AyahResponse {
    code: u16,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Option<AyahData>,
}

#[derive(Debug, Deserialize)]
struct AyahData {
    text: String,
}

/// Fetches verse text from an alquran.cloud style endpoint, consulting the cache first.
pub struct HttpCorpusProvider {
    client: reqwest::blocking::Client,
    url_template: String,
    cache: VerseCache,
    retries: u32,
    retry_delay: Duration,
}

impl HttpCorpusProvider {
    pub fn new(
        url_template: &str,
        timeout: Duration,
        cache: VerseCache,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("ayat-reels/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;
        Ok(HttpCorpusProvider {
            client,
            url_template: url_template.to_string(),
            cache,
            retries: 0,
            retry_delay: Duration::ZERO,
        })
    }

    /// Retry transient failures up to `retries` times, doubling `delay` after each attempt.
    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    fn url_for(&self, address: VerseAddress) -> String {
        self.url_template
            .replace("{chapter}", &address.chapter.to_string())
            .replace("{verse}", &address.verse.to_string())
    }

    fn fetch(&self, address: VerseAddress) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(self.url_for(address))
            .send()
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;
        if !status.is_success() {
            return Err(ProviderError::HttpError {
                status: status.as_u16(),
                body,
            });
        }
        parse_ayah_text(&body, address)
    }

    fn fetch_with_retry(&self, address: VerseAddress) -> Result<String, ProviderError> {
        let mut delay = self.retry_delay;
        let mut attempt = 0;
        loop {
            match self.fetch(address) {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    emit(
                        Level::Warn,
                        "corpus.retry",
                        &format!(
                            "Fetching {} failed ({}), retry {}/{} in {:?}",
                            address, e, attempt, self.retries, delay
                        ),
                        None,
                    );
                    thread::sleep(delay);
                    delay *= 2;
                }
                result => return result,
            }
        }
    }
}

fn parse_ayah_text(body: &str, address: VerseAddress) -> Result<String, ProviderError> {
    let parsed: AyahResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::JsonError(e.to_string()))?;
    match parsed {
        AyahResponse {
            code: 200,
            data: Some(data),
            ..
        } if !data.text.trim().is_empty() => Ok(data.text),
        AyahResponse { code, status, .. } => Err(ProviderError::ApiError {
            address,
            message: format!(
                "code {} ({})",
                code,
                status.unwrap_or_else(|| "no status".to_string())
            ),
        }),
    }
}

impl CorpusProvider for HttpCorpusProvider {
    fn verse_text(&mut self, address: VerseAddress) -> Result<String, ProviderError> {
        if let Some(text) = self.cache.get(address) {
            return Ok(text.to_string());
        }
        let text = self.fetch_with_retry(address)?;
        // A cache that cannot be written only costs a refetch next time
        if let Err(e) = self.cache.insert(address, text.clone()) {
            emit(
                Level::Warn,
                "corpus.cache",
                &format!("Could not save verse cache: {}", e),
                None,
            );
        }
        Ok(text)
    }
}
