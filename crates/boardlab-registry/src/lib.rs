//! Client for the toolchain release registry.
//!
//! Releases are published on the toolchain's GitHub repository; the
//! registry returns them most-recent-first. Fetching sits behind the
//! [`ReleaseSource`] trait so consumers (the validation pipeline, the
//! request broker) can be exercised without the network.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One published toolchain release, most-recent-first in registry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    pub tag_name: String,
    pub html_url: String,
    pub prerelease: bool,
    pub published_at: String,
    /// Login of the publishing account.
    pub author: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("registry returned status {0}")]
    Status(u16),
    #[error("malformed registry payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Trait for fetching the ordered release list.
pub trait ReleaseSource: Send + Sync + std::fmt::Debug {
    fn releases(&self) -> Result<Vec<Release>, RegistryError>;
}

/// Fetches releases from the GitHub releases API.
///
/// Requests are blocking; callers that must not block wrap this in their
/// own task (the broker uses its blocking pool).
#[derive(Debug)]
pub struct GithubReleases {
    owner: String,
    repo: String,
    client: reqwest::blocking::Client,
}

const PER_PAGE: u32 = 10;

impl GithubReleases {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!(
            "https://api.github.com/repos/{}/{}/releases?per_page={}&page=1",
            self.owner, self.repo, PER_PAGE
        )
    }
}

impl ReleaseSource for GithubReleases {
    fn releases(&self) -> Result<Vec<Release>, RegistryError> {
        let url = self.url();
        debug!("fetching releases from {}", url);

        let response = self
            .client
            .get(&url)
            // GitHub rejects requests without a user agent.
            .header(reqwest::header::USER_AGENT, "boardlab")
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status(status.as_u16()));
        }

        let payload: Value = response.json()?;
        decode_releases(&payload)
    }
}

/// Decodes the raw API payload into [`Release`] records, flattening the
/// nested author object to its login.
pub fn decode_releases(payload: &Value) -> Result<Vec<Release>, RegistryError> {
    #[derive(Deserialize)]
    struct ApiAuthor {
        #[serde(default)]
        login: String,
    }

    #[derive(Deserialize)]
    struct ApiRelease {
        #[serde(default)]
        name: String,
        #[serde(default)]
        tag_name: String,
        #[serde(default)]
        html_url: String,
        #[serde(default)]
        prerelease: bool,
        #[serde(default)]
        published_at: String,
        author: Option<ApiAuthor>,
    }

    let raw: Vec<ApiRelease> = serde_json::from_value(payload.clone())?;
    Ok(raw
        .into_iter()
        .map(|r| Release {
            name: r.name,
            tag_name: r.tag_name,
            html_url: r.html_url,
            prerelease: r.prerelease,
            published_at: r.published_at,
            author: r.author.map(|a| a.login).unwrap_or_default(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_releases_flattens_author() {
        let payload = json!([
            {
                "name": "0.9.0",
                "tag_name": "v0.9.0",
                "html_url": "https://example.com/releases/v0.9.0",
                "prerelease": false,
                "published_at": "2026-05-02T10:00:00Z",
                "author": {"login": "release-bot", "id": 42}
            },
            {
                "name": "0.9.0-rc1",
                "tag_name": "v0.9.0-rc1",
                "html_url": "https://example.com/releases/v0.9.0-rc1",
                "prerelease": true,
                "published_at": "2026-04-20T10:00:00Z",
                "author": null
            }
        ]);

        let releases = decode_releases(&payload).unwrap();
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].name, "0.9.0");
        assert_eq!(releases[0].author, "release-bot");
        assert!(releases[1].prerelease);
        assert!(releases[1].author.is_empty());
    }

    #[test]
    fn test_decode_releases_rejects_non_array() {
        let payload = json!({"message": "rate limited"});
        assert!(matches!(
            decode_releases(&payload),
            Err(RegistryError::Decode(_))
        ));
    }

    #[test]
    fn test_url_shape() {
        let source = GithubReleases::new("acme", "boardctl");
        assert_eq!(
            source.url(),
            "https://api.github.com/repos/acme/boardctl/releases?per_page=10&page=1"
        );
    }
}
