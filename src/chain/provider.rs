use std::sync::Arc;
use ethers::prelude::*;
use eyre::{Result, WrapErr};
use url::Url;

use crate::config::HttpSettings;

/// One JSON-RPC endpoint of the ordered RPC sequence.
#[derive(Debug, Clone)]
pub struct RpcEndpoint {
    /// Host of the url; the only part that is logged.
    pub name: String,
    pub url: String,
    pub provider: Arc<Provider<Http>>,
}

/// Provider over an explicit HTTP client so the proxy and timeout apply to RPC calls too.
pub fn build_provider(rpc_url: &str, settings: &HttpSettings) -> Result<Provider<Http>> {
    let url = Url::parse(rpc_url).wrap_err_with(|| format!("Invalid RPC url: {rpc_url}"))?;

    let mut builder = reqwest::Client::builder()
        .timeout(settings.timeout)
        .user_agent(settings.user_agent.as_str());
    if let Some(proxy) = &settings.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy.url.as_str())?);
    }
    let client = builder.build()?;

    Ok(Provider::new(Http::new_with_client(url, client)))
}

pub fn build_endpoints(rpc_urls: &[String], settings: &HttpSettings) -> Result<Vec<RpcEndpoint>> {
    rpc_urls
        .iter()
        .map(|url| {
            Ok(RpcEndpoint {
                name: endpoint_name(url),
                url: url.clone(),
                provider: Arc::new(build_provider(url, settings)?),
            })
        })
        .collect()
}

fn endpoint_name(rpc_url: &str) -> String {
    Url::parse(rpc_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| rpc_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_endpoint_per_url_in_order() {
        let urls = vec!["https://a.example/rpc".to_string(), "https://b.example/rpc".to_string()];
        let endpoints = build_endpoints(&urls, &HttpSettings::default()).unwrap();
        assert_eq!(endpoints.iter().map(|e| e.url.as_str()).collect::<Vec<_>>(), vec![
            "https://a.example/rpc",
            "https://b.example/rpc"
        ]);
    }

    #[test]
    fn names_hide_paths() {
        assert_eq!(endpoint_name("https://arb-mainnet.example.com/v2/secret-key"), "arb-mainnet.example.com");
    }

    #[test]
    fn malformed_url_is_rejected() {
        assert!(build_provider("not a url", &HttpSettings::default()).is_err());
    }
}
