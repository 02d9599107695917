use std::path::Path;
use std::time::Duration;
use eyre::{Result, WrapErr};
use futures::FutureExt;
use serde::de::DeserializeOwned;

use super::cache::ResponseCache;
use super::transport::{BlockingTransport, CurlTransport, FetchRequest, PrimaryTransport, Transport};
use crate::config::HttpSettings;
use crate::constants::FALLBACK_TRANSPORT_TIMEOUT_SECS;
use crate::fallback::{Candidate, run_with_fallback};

/// JSON/text fetcher that walks a stack of independent transports.
///
/// A request is only failed once every transport has failed; the error then
/// carries the failures of each layer and the last error seen.
pub struct ResilientClient {
    layers: Vec<Box<dyn Transport>>,
}

impl ResilientClient {
    /// Primary async client, then the blocking client, then curl.
    pub fn new(settings: &HttpSettings, cache_dir: &Path) -> Result<Self> {
        let fallback_timeout = Duration::from_secs(FALLBACK_TRANSPORT_TIMEOUT_SECS);
        Ok(Self {
            layers: vec![
                Box::new(PrimaryTransport::new(settings, ResponseCache::new(cache_dir))?),
                Box::new(BlockingTransport::new(settings, fallback_timeout)),
                Box::new(CurlTransport::new(settings, fallback_timeout)),
            ],
        })
    }

    pub fn with_layers(layers: Vec<Box<dyn Transport>>) -> Self {
        Self { layers }
    }

    pub fn layer_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|layer| layer.name()).collect()
    }

    pub async fn fetch_text(&self, request: &FetchRequest) -> Result<String> {
        self.fetch_parsed(request, |body| Ok(body.to_string())).await
    }

    /// A body that does not parse counts as a failure of that transport.
    pub async fn fetch_json<T>(&self, request: &FetchRequest) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        self.fetch_parsed(request, |body| {
            serde_json::from_str::<T>(body).wrap_err("Response is not the expected JSON")
        })
        .await
    }

    async fn fetch_parsed<T, P>(&self, request: &FetchRequest, parse: P) -> Result<T>
    where
        T: Send,
        P: Fn(&str) -> Result<T> + Send + Sync,
    {
        let parse = &parse;
        let candidates = self
            .layers
            .iter()
            .map(|layer| {
                Candidate::new(layer.name(), move || {
                    async move {
                        let body = layer.get_body(request).await?;
                        parse(&body)
                    }
                    .boxed()
                })
            })
            .collect();

        let outcome = run_with_fallback(&request.url, candidates).await?;
        Ok(outcome.value)
    }
}
