use crate::config::ApiConfig;

/// Header carrying the workspace scope of a request
pub const WORKSPACE_HEADER: &str = "mex-workspace-id";

const MAX_WORKSPACE_ID_LEN: usize = 128;

/// Boundary check on the workspace header, run together with the auth header
pub trait WorkspaceValidator: Send + Sync {
    fn validate(&self, workspace_id: Option<&str>, authorization: Option<&str>) -> bool;
}

/// Accepts any non-empty id made of ASCII alphanumerics, `-` and `_`
pub struct HeaderShapeValidator;

impl WorkspaceValidator for HeaderShapeValidator {
    fn validate(&self, workspace_id: Option<&str>, authorization: Option<&str>) -> bool {
        let (Some(workspace_id), Some(authorization)) = (workspace_id, authorization) else {
            return false;
        };

        !authorization.trim().is_empty()
            && !workspace_id.is_empty()
            && workspace_id.len() <= MAX_WORKSPACE_ID_LEN
            && workspace_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

/// Decides which routes need a workspace header.
///
/// Matching is by whole path segments: `/user` covers `/user` and `/user/me`
/// but not `/username` or `/node/user`.
#[derive(Debug, Clone)]
pub struct WorkspacePolicy {
    prefix: String,
    exempt: Vec<String>,
    required_overrides: Vec<String>,
}

impl WorkspacePolicy {
    pub fn new(prefix: impl Into<String>, exempt: Vec<String>, required_overrides: Vec<String>) -> Self {
        Self {
            prefix: normalize(&prefix.into()).to_string(),
            exempt: exempt.iter().map(|p| normalize(p).to_string()).collect(),
            required_overrides: required_overrides
                .iter()
                .map(|p| normalize(p).to_string())
                .collect(),
        }
    }

    pub fn from_config(api: &ApiConfig) -> Self {
        Self::new(
            api.prefix.clone(),
            api.workspace_exempt_prefixes.clone(),
            api.workspace_required_overrides.clone(),
        )
    }

    pub fn requires_workspace(&self, path: &str) -> bool {
        let path = self.relative(path);

        if self.required_overrides.iter().any(|p| under(path, p)) {
            return true;
        }
        !self.exempt.iter().any(|p| under(path, p))
    }

    fn relative<'a>(&self, path: &'a str) -> &'a str {
        let path = normalize(path);
        if self.prefix.is_empty() {
            return path;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        }
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

fn under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
