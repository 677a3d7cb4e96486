//! Best-effort branch/commit lookup for annotating results.

use std::path::Path;

use anyhow::Result;
use tracing::debug;

use crate::console;
use crate::core::types::RepoContext;
use crate::io::git::Git;

/// Read the current branch and short commit of `workdir`.
///
/// Never fails: missing git metadata or a failing query yields an empty
/// context and a warning.
pub fn read_repo_context(workdir: &Path) -> RepoContext {
    let git = Git::new(workdir);
    if !git.is_repository() {
        debug!(workdir = %workdir.display(), "no git metadata, empty context");
        console::warning("No git metadata found, results will carry no branch or commit");
        return RepoContext::default();
    }
    match query(&git) {
        Ok(context) => {
            debug!(branch = ?context.branch, commit = ?context.commit, "repository context");
            context
        }
        Err(err) => {
            console::warning(format!(
                "Couldn't get branch and commit info for repository: {err:#}"
            ));
            RepoContext::default()
        }
    }
}

fn query(git: &Git) -> Result<RepoContext> {
    let branch = git.current_branch()?;
    let commit = git.head_short_sha()?;
    Ok(RepoContext {
        branch: Some(branch),
        commit: Some(commit),
    })
}
