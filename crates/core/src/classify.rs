//! Request classification and strategy selection.
//!
//! Classification is an ordered table of predicates; the first one that
//! matches decides the resource class, and each class maps to exactly one
//! strategy and bucket. Everything here is pure so precedence can be tested
//! without any fetch plumbing.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{AppConfig, ConfigError};
use crate::manager::BucketKind;
use crate::request::{Destination, Request};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif"];
const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "otf", "eot"];
const BUILD_EXTENSIONS: &[&str] = &["js", "mjs", "css", "json"];

/// What kind of resource a request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceClass {
    Api,
    Image,
    Font,
    Navigation,
    StaticAsset,
    Other,
}

impl ResourceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceClass::Api => "api",
            ResourceClass::Image => "image",
            ResourceClass::Font => "font",
            ResourceClass::Navigation => "navigation",
            ResourceClass::StaticAsset => "static-asset",
            ResourceClass::Other => "other",
        }
    }
}

/// How a request is answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum Strategy {
    /// Network, then the bucket, then (for navigations) the fallback page.
    NetworkFirst { fallback: Option<String> },
    /// Bucket, then the network.
    CacheFirst,
}

/// The strategy and bucket chosen for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Route {
    pub class: ResourceClass,
    #[serde(flatten)]
    pub strategy: Strategy,
    pub bucket: BucketKind,
}

type Predicate = fn(&Router, &Request) -> bool;

/// Precedence order. `Other` is the implicit last rule.
const RULES: &[(ResourceClass, Predicate)] = &[
    (ResourceClass::Api, Router::is_api),
    (ResourceClass::Image, Router::is_image),
    (ResourceClass::Font, Router::is_font),
    (ResourceClass::Navigation, Router::is_navigation),
    (ResourceClass::StaticAsset, Router::is_build_artifact),
];

/// Decides which requests are intercepted and how each is answered.
#[derive(Debug, Clone)]
pub struct Router {
    origin: Url,
    api_prefix: String,
    data_hosts: Vec<String>,
    offline_page: String,
}

impl Router {
    pub fn new(origin: Url, api_prefix: &str, data_hosts: &[String], offline_page: &str) -> Self {
        Self {
            origin,
            api_prefix: api_prefix.to_string(),
            data_hosts: data_hosts.iter().map(|h| h.trim().trim_start_matches('.').to_ascii_lowercase()).collect(),
            offline_page: offline_page.to_string(),
        }
    }

    /// Build a router from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the configured origin is not a URL.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.origin_url()?, &config.api_prefix, &config.data_hosts, &config.offline_page))
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn offline_page(&self) -> &str {
        &self.offline_page
    }

    /// Only same-origin or backend-bound `GET`s over http(s) are handled; the
    /// rest go to the network untouched.
    pub fn intercepts(&self, request: &Request) -> bool {
        if !request.is_get() {
            return false;
        }
        if !matches!(request.url.scheme(), "http" | "https") {
            return false;
        }
        self.is_same_origin(&request.url) || self.is_data_host(&request.url)
    }

    /// First matching rule wins.
    pub fn classify(&self, request: &Request) -> ResourceClass {
        RULES
            .iter()
            .find(|(_, matches)| matches(self, request))
            .map(|(class, _)| *class)
            .unwrap_or(ResourceClass::Other)
    }

    /// Strategy and bucket for a resource class.
    pub fn plan(&self, class: ResourceClass) -> Route {
        let (strategy, bucket) = match class {
            ResourceClass::Api => (Strategy::NetworkFirst { fallback: None }, BucketKind::Api),
            ResourceClass::Image => (Strategy::CacheFirst, BucketKind::Dynamic),
            ResourceClass::Font => (Strategy::CacheFirst, BucketKind::Static),
            ResourceClass::Navigation => {
                (Strategy::NetworkFirst { fallback: Some(self.offline_page.clone()) }, BucketKind::Dynamic)
            }
            ResourceClass::StaticAsset => (Strategy::CacheFirst, BucketKind::Static),
            ResourceClass::Other => (Strategy::NetworkFirst { fallback: None }, BucketKind::Dynamic),
        };
        Route { class, strategy, bucket }
    }

    /// The route for an intercepted request, or None to pass it through.
    pub fn route(&self, request: &Request) -> Option<Route> {
        if !self.intercepts(request) {
            return None;
        }
        Some(self.plan(self.classify(request)))
    }

    fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    fn is_data_host(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.data_hosts.iter().any(|data_host| {
            !data_host.is_empty()
                && (host == *data_host
                    || host
                        .strip_suffix(data_host.as_str())
                        .is_some_and(|rest| rest.ends_with('.')))
        })
    }

    fn is_api(&self, request: &Request) -> bool {
        (self.is_same_origin(&request.url) && request.url.path().starts_with(&self.api_prefix))
            || self.is_data_host(&request.url)
    }

    fn is_image(&self, request: &Request) -> bool {
        request.destination == Destination::Image || has_extension(request, IMAGE_EXTENSIONS)
    }

    fn is_font(&self, request: &Request) -> bool {
        request.destination == Destination::Font || has_extension(request, FONT_EXTENSIONS)
    }

    fn is_navigation(&self, request: &Request) -> bool {
        request.is_navigation()
    }

    fn is_build_artifact(&self, request: &Request) -> bool {
        has_extension(request, BUILD_EXTENSIONS)
    }
}

fn has_extension(request: &Request, extensions: &[&str]) -> bool {
    request
        .extension()
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}
