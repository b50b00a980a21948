use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use axum::http::Method;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route {0} is not registered")]
    NotRegistered(String),

    #[error("route {name} has an invalid route key '{route}'")]
    InvalidRouteKey { name: String, route: String },

    #[error("failed to read route table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("route table is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One entry of the route table as written in YAML
#[derive(Debug, Deserialize)]
struct RawRoute {
    route: String,
    service: String,
}

/// Logical operation: HTTP method, path template and downstream service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub method: Method,
    pub path: String,
    pub service: String,
}

impl RouteDescriptor {
    /// Parse a `"METHOD /path"` route key
    pub fn parse(name: &str, route: &str, service: impl Into<String>) -> Result<Self, RouteError> {
        let invalid = || RouteError::InvalidRouteKey {
            name: name.to_string(),
            route: route.to_string(),
        };

        let (method, path) = route.trim().split_once(' ').ok_or_else(invalid)?;
        let method = Method::from_str(&method.to_ascii_uppercase()).map_err(|_| invalid())?;
        let path = path.trim();
        if !path.starts_with('/') {
            return Err(invalid());
        }

        Ok(Self {
            method,
            path: path.to_string(),
            service: service.into(),
        })
    }

    /// Route key sent downstream, with an optional method override
    pub fn route_key(&self, method: Option<&Method>) -> String {
        format!("{} {}", method.unwrap_or(&self.method), self.path)
    }
}

/// Process-wide map of logical route names, loaded once at startup
#[derive(Debug, Clone)]
pub struct RouteTable {
    stage: String,
    routes: HashMap<String, RouteDescriptor>,
}

impl RouteTable {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            routes: HashMap::new(),
        }
    }

    pub fn from_yaml(raw: &str, stage: impl Into<String>) -> Result<Self, RouteError> {
        let entries: HashMap<String, RawRoute> = serde_yaml::from_str(raw)?;
        let mut table = Self::new(stage);
        for (name, entry) in entries {
            let descriptor = RouteDescriptor::parse(&name, &entry.route, entry.service)?;
            table.routes.insert(name, descriptor);
        }
        Ok(table)
    }

    pub fn from_file(path: impl AsRef<Path>, stage: impl Into<String>) -> Result<Self, RouteError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| RouteError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table = Self::from_yaml(&raw, stage)?;
        tracing::info!("Loaded {} routes from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn insert(&mut self, name: impl Into<String>, descriptor: RouteDescriptor) {
        self.routes.insert(name.into(), descriptor);
    }

    pub fn get(&self, name: &str) -> Result<&RouteDescriptor, RouteError> {
        self.routes
            .get(name)
            .ok_or_else(|| RouteError::NotRegistered(name.to_string()))
    }

    /// Downstream function name: `<service>-<stage>`
    pub fn target(&self, descriptor: &RouteDescriptor) -> String {
        format!("{}-{}", descriptor.service, self.stage)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
