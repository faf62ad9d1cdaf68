//! Bearer tokens for the artifact host.

use serde::Deserialize;
use url::Url;
use vl_common::InstallerConfig;

use crate::error::InstallError;
use crate::transport::Transport;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

/// Repository path for a package: `@` and `+` are not valid there.
pub fn repository_path(repository: &str, package: &str) -> String {
    let name = package.replace('@', "/").replace('+', "x");
    format!("{}/{}", repository.trim_end_matches('/'), name)
}

/// `<token_url>?service=<service>&scope=repository:<repo>/<name>:pull`
pub fn token_request_url(config: &InstallerConfig, package: &str) -> Result<Url, InstallError> {
    let mut url = Url::parse(&config.token_url).map_err(|e| InstallError::Token {
        package: package.to_string(),
        reason: format!("invalid token url: {e}"),
    })?;
    let scope = format!(
        "repository:{}:pull",
        repository_path(&config.repository, package)
    );
    url.query_pairs_mut()
        .append_pair("service", &config.token_service)
        .append_pair("scope", &scope);
    Ok(url)
}

/// Obtain a short-lived pull token for `package`.
pub fn fetch_token(
    transport: &dyn Transport,
    config: &InstallerConfig,
    package: &str,
) -> Result<String, InstallError> {
    let url = token_request_url(config, package)?;
    let response = transport.get(url.as_str(), None)?;
    if !response.is_success() {
        return Err(InstallError::Token {
            package: package.to_string(),
            reason: format!("HTTP {}", response.status),
        });
    }
    let text = response.into_text(url.as_str())?;
    let parsed: TokenResponse = serde_json::from_str(&text).map_err(|e| InstallError::Token {
        package: package.to_string(),
        reason: e.to_string(),
    })?;
    parsed
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| InstallError::Token {
            package: package.to_string(),
            reason: "response has no token".into(),
        })
}
