//! Git repository sources

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};
use url::Url;

use crate::errors::DeployError;

/// A validated repository reference of the form `https://<host>/<owner>/<repo>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub url: String,
    pub host: String,
    pub owner: String,
    pub repo: String,
}

impl RepositoryRef {
    /// Validate a submitted repository URL against the allowed hosts
    pub fn parse(input: &str, allowed_hosts: &[String]) -> Result<Self, DeployError> {
        let invalid = |reason: &str| {
            DeployError::InvalidInput(format!("Invalid repository URL '{}': {}", input, reason))
        };

        let url = Url::parse(input.trim()).map_err(|_| invalid("not a URL"))?;
        if url.scheme() != "https" {
            return Err(invalid("only https URLs are accepted"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("credentials are not allowed"));
        }
        if url.port().is_some() || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("unexpected port, query or fragment"));
        }

        let host = url.host_str().unwrap_or_default().to_lowercase();
        if !allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(&host)) {
            return Err(invalid("host is not allowed"));
        }

        let segments: Vec<&str> = url
            .path()
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let &[owner, repo] = segments.as_slice() else {
            return Err(invalid("expected /<owner>/<repo>"));
        };

        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        if !is_valid_name(owner) || !is_valid_name(repo) {
            return Err(invalid("owner and repository may only contain letters, digits, '_', '.' and '-'"));
        }

        Ok(Self {
            url: format!("https://{}/{}/{}.git", host, owner, repo),
            host,
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Shallow-clone `repo` into `target_dir` and strip its `.git` directory
pub async fn shallow_clone(repo: &RepositoryRef, target_dir: &Path) -> Result<(), DeployError> {
    info!("Cloning {} into {}", repo.url, target_dir.display());

    let output = Command::new("git")
        .args(["clone", "--depth", "1", "--quiet", "--", &repo.url])
        .arg(target_dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| DeployError::SourceFetch(format!("Failed to run git clone: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(DeployError::SourceFetch(format!(
            "git clone of {} failed: {}",
            repo.url,
            if stderr.is_empty() { "no output".to_string() } else { stderr }
        )));
    }

    let git_dir = target_dir.join(".git");
    if tokio::fs::metadata(&git_dir).await.is_ok() {
        tokio::fs::remove_dir_all(&git_dir).await?;
        debug!("Removed {}", git_dir.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github() -> Vec<String> {
        vec!["github.com".to_string()]
    }

    #[test]
    fn test_parse_accepts_common_forms() {
        for input in [
            "https://github.com/acme/site",
            "https://github.com/acme/site.git",
            "https://github.com/acme/site/",
            "https://GitHub.com/acme/my_site.v2",
        ] {
            let repo = RepositoryRef::parse(input, &github()).unwrap();
            assert_eq!(repo.owner, "acme");
            assert!(repo.url.ends_with(".git"));
        }
    }

    #[test]
    fn test_parse_rejects_before_network() {
        for input in [
            "http://github.com/acme/site",
            "https://gitlab.com/acme/site",
            "https://github.com/acme",
            "https://github.com/acme/site/tree/main",
            "https://user:pw@github.com/acme/site",
            "https://github.com/acme/si te",
            "git@github.com:acme/site.git",
        ] {
            let err = RepositoryRef::parse(input, &github()).unwrap_err();
            assert_eq!(err.kind(), "InvalidInputError", "{}", input);
        }
    }

    #[tokio::test]
    async fn test_failed_clone_is_source_fetch_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("missing.git");
        let repo = RepositoryRef {
            url: format!("file://{}", missing.display()),
            host: "localhost".to_string(),
            owner: "acme".to_string(),
            repo: "missing".to_string(),
        };

        let err = shallow_clone(&repo, &temp.path().join("checkout")).await.unwrap_err();
        assert_eq!(err.kind(), "SourceFetchError");
        assert!(!temp.path().join("checkout/.git").exists());
    }
}
