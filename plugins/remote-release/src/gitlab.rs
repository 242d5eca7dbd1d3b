//! GitLab REST v4 adapter.
//!
//! GitLab identifies a release by its tag, so [`RemoteRelease::id`] holds
//! the tag name. Drafts do not exist on GitLab and are ignored.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use shipwright_plugin::{
    AssetUpload, CollaboratorCheck, PluginResult, ReleaseApi, ReleaseDraft, RemoteError,
    RemoteRelease, RepoCoordinates,
};
use tracing::debug;

use crate::http::{self, endpoint};

/// Developer access level, the minimum that may create releases.
const DEVELOPER_ACCESS: u32 = 30;

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(rename = "_links", default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(rename = "self")]
    html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Upload {
    url: String,
}

#[derive(Debug, Deserialize)]
struct User {
    username: String,
}

#[derive(Debug, Deserialize)]
struct Member {
    username: String,
    access_level: u32,
}

/// Client for one GitLab project.
#[derive(Debug)]
pub struct GitlabApi {
    client: Client,
    coordinates: RepoCoordinates,
}

impl GitlabApi {
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
            .header("PRIVATE-TOKEN", &self.coordinates.token)
    }

    /// Projects are addressed by their encoded full path.
    fn project_url(&self, path: &[&str]) -> Result<Url, RemoteError> {
        let repository = self.coordinates.repository();
        let mut segments = vec!["projects", repository.as_str()];
        segments.extend_from_slice(path);
        endpoint(&self.coordinates.api_url, &segments)
    }

    fn release_url(&self, tag: &str, path: &[&str]) -> Result<Url, RemoteError> {
        let mut segments = vec!["releases", tag];
        segments.extend_from_slice(path);
        self.project_url(&segments)
    }

    fn remote_release(&self, release: Release) -> RemoteRelease {
        let url = release.links.html.unwrap_or_else(|| {
            format!(
                "https://{}/{}/-/releases/{}",
                self.coordinates.host,
                self.coordinates.repository(),
                release.tag_name
            )
        });
        RemoteRelease {
            id: release.tag_name,
            url,
        }
    }
}

/// API base for a web host.
pub(crate) fn api_url(host: &str) -> String {
    format!("https://{host}/api/v4")
}

#[async_trait]
impl ReleaseApi for GitlabApi {
    async fn create_release(&self, draft: &ReleaseDraft) -> Result<RemoteRelease, RemoteError> {
        debug!(tag = %draft.tag_name, "creating GitLab release");
        let body = json!({
            "tag_name": draft.tag_name,
            "name": draft.name,
            "description": draft.notes,
        });
        let release: Release = http::send_json(
            self.request(Method::POST, self.project_url(&["releases"])?)
                .json(&body),
        )
        .await?;
        Ok(self.remote_release(release))
    }

    async fn find_release(&self, tag: &str) -> Result<Option<RemoteRelease>, RemoteError> {
        let url = self.release_url(tag, &[])?;
        match http::send_json::<Release>(self.request(Method::GET, url)).await {
            Ok(release) => Ok(Some(self.remote_release(release))),
            Err(e) if e.status == Some(StatusCode::NOT_FOUND.as_u16()) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update_release(
        &self,
        release: &RemoteRelease,
        draft: &ReleaseDraft,
    ) -> Result<RemoteRelease, RemoteError> {
        debug!(tag = %release.id, "updating GitLab release");
        let body = json!({ "name": draft.name, "description": draft.notes });
        let updated: Release = http::send_json(
            self.request(Method::PUT, self.release_url(&release.id, &[])?)
                .json(&body),
        )
        .await?;
        Ok(self.remote_release(updated))
    }

    fn asset_upload(&self) -> Option<&dyn AssetUpload> {
        Some(self)
    }

    fn collaborator_check(&self) -> Option<&dyn CollaboratorCheck> {
        Some(self)
    }
}

#[async_trait]
impl AssetUpload for GitlabApi {
    /// Uploads the file to the project, then links it from the release.
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

        debug!(asset = %name, size = bytes.len(), "uploading GitLab asset");
        let form = Form::new().part("file", Part::bytes(bytes).file_name(name.clone()));
        let upload: Upload = http::send_json(
            self.request(Method::POST, self.project_url(&["uploads"])?)
                .multipart(form),
        )
        .await?;

        let url = format!(
            "https://{}/{}{}",
            self.coordinates.host,
            self.coordinates.repository(),
            upload.url
        );
        let link = json!({ "name": name, "url": url });
        http::send(
            self.request(
                Method::POST,
                self.release_url(&release.id, &["assets", "links"])?,
            )
            .json(&link),
        )
        .await?;
        Ok(url)
    }
}

#[async_trait]
impl CollaboratorCheck for GitlabApi {
    async fn authenticated_user(&self) -> Result<String, RemoteError> {
        let url = endpoint(&self.coordinates.api_url, &["user"])?;
        let user: User = http::send_json(self.request(Method::GET, url)).await?;
        Ok(user.username)
    }

    async fn is_collaborator(&self, user: &str) -> Result<bool, RemoteError> {
        let members: Vec<Member> = http::send_json(
            self.request(Method::GET, self.project_url(&["members", "all"])?)
                .query(&[("query", user)]),
        )
        .await?;
        Ok(members
            .iter()
            .any(|m| m.username == user && m.access_level >= DEVELOPER_ACCESS))
    }
}
