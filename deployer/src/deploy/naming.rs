//! Project names and the publish key scheme

use crate::utils::short_id;

/// Top-level blob prefix for published sites
pub const SITES_PREFIX: &str = "sites";

const SOURCE_EXTENSIONS: &[&str] = &[".tar.zst", ".tzst", ".tar", ".zip", ".git"];
const MIN_NAME_LEN: usize = 3;

/// Derive a URL-safe project name from an archive file name or repository name.
///
/// Names shorter than three characters after cleanup become `web-deployment-<8 hex>`.
pub fn sanitize_project_name(source: &str) -> String {
    let base = source
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(source)
        .trim()
        .to_lowercase();

    let mut stem = base.as_str();
    for ext in SOURCE_EXTENSIONS {
        if let Some(stripped) = stem.strip_suffix(ext) {
            stem = stripped;
            break;
        }
    }

    let mut name = String::with_capacity(stem.len());
    for c in stem.chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' };
        if c == '-' && name.ends_with('-') {
            continue;
        }
        name.push(c);
    }
    let name = name.trim_matches('-');

    if name.len() < MIN_NAME_LEN {
        return format!("web-deployment-{}", short_id());
    }
    name.to_string()
}

/// Blob prefix a project is published under
pub fn site_prefix(project_name: &str) -> String {
    format!("{}/{}", SITES_PREFIX, project_name)
}

/// Public path a project is served from, without a trailing slash
pub fn base_path(project_name: &str) -> String {
    format!("/{}/{}", SITES_PREFIX, project_name)
}
