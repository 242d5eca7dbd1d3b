//! Git repository wrapper.

use std::path::{Path, PathBuf};

use git2::{BranchType, Repository as Git2Repo, ResetType, StatusOptions};
use tracing::debug;

use crate::{GitError, GitResult};

/// One commit as needed for a changelog line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    /// Full commit hash.
    pub hash: String,
    /// First line of the message.
    pub subject: String,
    /// Author name.
    pub author: String,
}

impl CommitSummary {
    /// Returns the abbreviated hash (7 characters).
    #[must_use]
    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(7)]
    }
}

/// Where [`Repository::reset_hard`] moves the branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTarget {
    /// Discard working tree and index changes only.
    Head,
    /// Drop the HEAD commit as well.
    Parent,
}

/// A Git repository wrapper.
pub struct Repository {
    inner: Git2Repo,
}

impl Repository {
    /// Opens a repository at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a valid Git repository.
    pub fn open(path: impl AsRef<Path>) -> GitResult<Self> {
        let path = path.as_ref();
        let inner = Git2Repo::open(path).map_err(|_| GitError::NotARepo(path.to_path_buf()))?;
        Ok(Self { inner })
    }

    /// Discovers the repository containing `path`, walking up parents.
    ///
    /// # Errors
    ///
    /// Returns an error if no repository is found.
    pub fn discover(path: impl AsRef<Path>) -> GitResult<Self> {
        let path = path.as_ref();
        let inner =
            Git2Repo::discover(path).map_err(|_| GitError::NotARepo(path.to_path_buf()))?;
        Ok(Self { inner })
    }

    /// Returns the repository root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.workdir().unwrap_or_else(|| self.inner.path())
    }

    /// Returns an owned copy of the root path.
    #[must_use]
    pub fn root(&self) -> PathBuf {
        self.path().to_path_buf()
    }

    /// Returns all tags in the repository.
    ///
    /// # Errors
    ///
    /// Returns an error if tags cannot be read.
    pub fn tags(&self) -> GitResult<Vec<String>> {
        let tags = self.inner.tag_names(None)?;
        Ok(tags.iter().flatten().map(String::from).collect())
    }

    /// Returns whether a local tag exists.
    #[must_use]
    pub fn tag_exists(&self, name: &str) -> bool {
        self.inner.refname_to_id(&format!("refs/tags/{name}")).is_ok()
    }

    /// Returns the highest semver tag starting with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if tags cannot be read.
    pub fn latest_version_tag(&self, prefix: &str) -> GitResult<Option<String>> {
        let mut version_tags: Vec<_> = self
            .tags()?
            .into_iter()
            .filter_map(|t| {
                let version = semver::Version::parse(t.strip_prefix(prefix)?).ok()?;
                Some((t, version))
            })
            .collect();

        version_tags.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(version_tags.into_iter().next().map(|(tag, _)| tag))
    }

    /// Returns commits reachable from HEAD but not from `tag`, newest first.
    ///
    /// If tag is `None`, returns all commits.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag does not exist or history cannot be read.
    pub fn commits_since(&self, tag: Option<&str>) -> GitResult<Vec<CommitSummary>> {
        let mut revwalk = self.inner.revwalk()?;
        revwalk.push_head()?;

        if let Some(tag_name) = tag {
            let tag_commit = self
                .inner
                .resolve_reference_from_short_name(tag_name)
                .and_then(|reference| reference.peel_to_commit())
                .map_err(|_| GitError::TagNotFound(tag_name.to_string()))?;
            revwalk.hide(tag_commit.id())?;
        }

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = self.inner.find_commit(oid?)?;
            commits.push(CommitSummary {
                hash: commit.id().to_string(),
                subject: commit.summary().unwrap_or("").to_string(),
                author: commit.author().name().unwrap_or("Unknown").to_string(),
            });
        }

        Ok(commits)
    }

    /// Returns whether tracked files are unmodified.
    ///
    /// Untracked and ignored files do not count.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be read.
    pub fn is_clean(&self) -> GitResult<bool> {
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = self.inner.statuses(Some(&mut options))?;
        Ok(statuses.is_empty())
    }

    /// Returns the checked-out branch, or `None` when HEAD is detached.
    #[must_use]
    pub fn current_branch(&self) -> Option<String> {
        match self.inner.head() {
            Ok(head) if head.is_branch() => head.shorthand().map(String::from),
            _ => None,
        }
    }

    /// Returns the upstream (`origin/main`) of the current branch.
    #[must_use]
    pub fn upstream(&self) -> Option<String> {
        let branch_name = self.current_branch()?;
        let branch = self.inner.find_branch(&branch_name, BranchType::Local).ok()?;
        let upstream = branch.upstream().ok()?;
        upstream.name().ok().flatten().map(String::from)
    }

    /// Returns the URL of a remote.
    #[must_use]
    pub fn remote_url(&self, name: &str) -> Option<String> {
        let remote = self.inner.find_remote(name).ok()?;
        remote.url().map(String::from)
    }

    /// Stages changes to tracked files.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be updated.
    pub fn stage_tracked(&self) -> GitResult<()> {
        let mut index = self.inner.index()?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    /// Commits the index on top of HEAD.
    ///
    /// Returns `None` without committing when the index matches HEAD.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit cannot be written.
    pub fn commit(&self, message: &str) -> GitResult<Option<String>> {
        let mut index = self.inner.index()?;
        let tree_id = index.write_tree()?;
        let parent = self.inner.head().ok().and_then(|h| h.peel_to_commit().ok());

        if parent.as_ref().is_some_and(|p| p.tree_id() == tree_id) {
            debug!("index matches HEAD, nothing to commit");
            return Ok(None);
        }

        let tree = self.inner.find_tree(tree_id)?;
        let sig = self.inner.signature()?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .inner
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;

        Ok(Some(oid.to_string()))
    }

    /// Creates an annotated tag on HEAD.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag cannot be created (e.g. it exists).
    pub fn create_tag(&self, name: &str, message: &str) -> GitResult<()> {
        let head = self.inner.head()?;
        let commit = head.peel_to_commit()?;
        let sig = self.inner.signature()?;

        self.inner
            .tag(name, commit.as_object(), &sig, message, false)?;

        Ok(())
    }

    /// Deletes a local tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag does not exist.
    pub fn delete_tag(&self, name: &str) -> GitResult<()> {
        if !self.tag_exists(name) {
            return Err(GitError::TagNotFound(name.to_string()));
        }
        self.inner.tag_delete(name)?;
        Ok(())
    }

    /// Hard-resets the current branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the target commit cannot be resolved.
    pub fn reset_hard(&self, target: ResetTarget) -> GitResult<()> {
        let head = self.inner.head()?.peel_to_commit()?;
        let commit = match target {
            ResetTarget::Head => head,
            ResetTarget::Parent => head.parent(0).map_err(|_| GitError::NoParent)?,
        };
        self.inner.reset(commit.as_object(), ResetType::Hard, None)?;
        Ok(())
    }
}
