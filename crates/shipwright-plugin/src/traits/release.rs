//! Release-hosting API contract.
//!
//! A host exposes the core release operations through [`ReleaseApi`] and
//! may opt into [`AssetUpload`] and [`CollaboratorCheck`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::{PluginResult, RemoteError};

/// Where a release API client points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    /// Web host (`github.com`).
    pub host: String,
    /// API base URL.
    pub api_url: String,
    /// Owner or group path.
    pub owner: String,
    /// Project name.
    pub project: String,
    /// API token.
    pub token: String,
    /// Bound on connecting and on each request.
    pub timeout: Duration,
}

impl RepoCoordinates {
    /// Returns `owner/project`.
    #[must_use]
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.project)
    }
}

/// Release fields sent to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDraft {
    /// Tag the release points at.
    pub tag_name: String,
    /// Release title.
    pub name: String,
    /// Release body.
    pub notes: String,
    /// Create unpublished.
    pub draft: bool,
    /// Mark as pre-release.
    pub pre_release: bool,
}

/// A release as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRelease {
    /// Host identifier of the release.
    pub id: String,
    /// Web URL of the release.
    pub url: String,
}

/// Core release operations of a hosting service.
#[async_trait]
pub trait ReleaseApi: Send + Sync {
    /// Creates a release.
    async fn create_release(&self, draft: &ReleaseDraft) -> Result<RemoteRelease, RemoteError>;

    /// Returns the release for `tag`, if one exists.
    async fn find_release(&self, tag: &str) -> Result<Option<RemoteRelease>, RemoteError>;

    /// Updates an existing release.
    async fn update_release(
        &self,
        release: &RemoteRelease,
        draft: &ReleaseDraft,
    ) -> Result<RemoteRelease, RemoteError>;

    /// Returns the asset upload capability, if supported.
    fn asset_upload(&self) -> Option<&dyn AssetUpload> {
        None
    }

    /// Returns the collaborator check capability, if supported.
    fn collaborator_check(&self) -> Option<&dyn CollaboratorCheck> {
        None
    }
}

/// Uploads files to an existing release.
#[async_trait]
pub trait AssetUpload: Send + Sync {
    /// Uploads `path` and returns the asset's download URL.
    async fn upload_asset(&self, release: &RemoteRelease, path: &Path)
    -> Result<String, RemoteError>;
}

/// Verifies that the token may create releases.
#[async_trait]
pub trait CollaboratorCheck: Send + Sync {
    /// Returns the login of the authenticated user.
    async fn authenticated_user(&self) -> Result<String, RemoteError>;

    /// Returns whether `user` may push to the repository.
    async fn is_collaborator(&self, user: &str) -> Result<bool, RemoteError>;
}

/// Builds API clients once the repository is known.
pub trait ReleaseApiProvider: Send + Sync {
    /// Creates a client for `coordinates`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be configured.
    fn connect(&self, coordinates: &RepoCoordinates) -> PluginResult<Arc<dyn ReleaseApi>>;
}

impl<F> ReleaseApiProvider for F
where
    F: Fn(&RepoCoordinates) -> PluginResult<Arc<dyn ReleaseApi>> + Send + Sync,
{
    fn connect(&self, coordinates: &RepoCoordinates) -> PluginResult<Arc<dyn ReleaseApi>> {
        self(coordinates)
    }
}
