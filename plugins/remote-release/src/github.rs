//! GitHub REST v3 adapter.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use shipwright_plugin::{
    AssetUpload, CollaboratorCheck, PluginResult, ReleaseApi, ReleaseDraft, RemoteError,
    RemoteRelease, RepoCoordinates,
};
use tracing::debug;

use crate::http::{self, endpoint};

const PUBLIC_API: &str = "https://api.github.com";
const PUBLIC_UPLOADS: &str = "https://uploads.github.com";

#[derive(Debug, Deserialize)]
struct Release {
    id: u64,
    html_url: String,
}

impl From<Release> for RemoteRelease {
    fn from(release: Release) -> Self {
        Self {
            id: release.id.to_string(),
            url: release.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Asset {
    browser_download_url: String,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

/// Client for one GitHub (or GitHub Enterprise) repository.
#[derive(Debug)]
pub struct GithubApi {
    client: Client,
    coordinates: RepoCoordinates,
}

impl GithubApi {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(coordinates: RepoCoordinates) -> PluginResult<Self> {
        Ok(Self {
            client: http::client(coordinates.timeout)?,
            coordinates,
        })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.coordinates.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    fn repo_url(&self, path: &[&str]) -> Result<Url, RemoteError> {
        let mut segments = vec![
            "repos",
            self.coordinates.owner.as_str(),
            self.coordinates.project.as_str(),
        ];
        segments.extend_from_slice(path);
        endpoint(&self.coordinates.api_url, &segments)
    }

    fn uploads_url(&self, release: &RemoteRelease) -> Result<Url, RemoteError> {
        endpoint(
            &uploads_base(&self.coordinates.api_url),
            &[
                "repos",
                self.coordinates.owner.as_str(),
                self.coordinates.project.as_str(),
                "releases",
                release.id.as_str(),
                "assets",
            ],
        )
    }
}

/// Upload host for an API base: `uploads.github.com` for the public API,
/// `/api/uploads` on Enterprise servers.
fn uploads_base(api_url: &str) -> String {
    if api_url.trim_end_matches('/') == PUBLIC_API {
        return PUBLIC_UPLOADS.to_string();
    }
    match api_url.trim_end_matches('/').strip_suffix("/api/v3") {
        Some(server) => format!("{server}/api/uploads"),
        None => api_url.to_string(),
    }
}

/// API base for a web host.
pub(crate) fn api_url(host: &str) -> String {
    if host == "github.com" {
        PUBLIC_API.to_string()
    } else {
        format!("https://{host}/api/v3")
    }
}

fn release_body(draft: &ReleaseDraft) -> serde_json::Value {
    json!({
        "tag_name": draft.tag_name,
        "name": draft.name,
        "body": draft.notes,
        "draft": draft.draft,
        "prerelease": draft.pre_release,
    })
}

#[async_trait]
impl ReleaseApi for GithubApi {
    async fn create_release(&self, draft: &ReleaseDraft) -> Result<RemoteRelease, RemoteError> {
        debug!(tag = %draft.tag_name, "creating GitHub release");
        let release: Release = http::send_json(
            self.request(Method::POST, self.repo_url(&["releases"])?)
                .json(&release_body(draft)),
        )
        .await?;
        Ok(release.into())
    }

    async fn find_release(&self, tag: &str) -> Result<Option<RemoteRelease>, RemoteError> {
        let url = self.repo_url(&["releases", "tags", tag])?;
        match http::send_json::<Release>(self.request(Method::GET, url)).await {
            Ok(release) => Ok(Some(release.into())),
            Err(e) if e.status == Some(StatusCode::NOT_FOUND.as_u16()) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update_release(
        &self,
        release: &RemoteRelease,
        draft: &ReleaseDraft,
    ) -> Result<RemoteRelease, RemoteError> {
        debug!(id = %release.id, "updating GitHub release");
        let url = self.repo_url(&["releases", &release.id])?;
        let updated: Release =
            http::send_json(self.request(Method::PATCH, url).json(&release_body(draft))).await?;
        Ok(updated.into())
    }

    fn asset_upload(&self) -> Option<&dyn AssetUpload> {
        Some(self)
    }

    fn collaborator_check(&self) -> Option<&dyn CollaboratorCheck> {
        Some(self)
    }
}

#[async_trait]
impl AssetUpload for GithubApi {
    async fn upload_asset(
        &self,
        release: &RemoteRelease,
        path: &Path,
    ) -> Result<String, RemoteError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RemoteError::transport(format!("{}: {e}", path.display())))?;

        debug!(asset = %name, size = bytes.len(), "uploading GitHub asset");
        let asset: Asset = http::send_json(
            self.request(Method::POST, self.uploads_url(release)?)
                .query(&[("name", name.as_str())])
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(bytes),
        )
        .await?;
        Ok(asset.browser_download_url)
    }
}

#[async_trait]
impl CollaboratorCheck for GithubApi {
    async fn authenticated_user(&self) -> Result<String, RemoteError> {
        let url = endpoint(&self.coordinates.api_url, &["user"])?;
        let user: User = http::send_json(self.request(Method::GET, url)).await?;
        Ok(user.login)
    }

    async fn is_collaborator(&self, user: &str) -> Result<bool, RemoteError> {
        let url = self.repo_url(&["collaborators", user])?;
        match http::send(self.request(Method::GET, url)).await {
            Ok(_) => Ok(true),
            Err(e) if e.status == Some(StatusCode::NOT_FOUND.as_u16()) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
