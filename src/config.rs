//! Environment-driven runtime configuration.

use std::env;

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

/// Environment variable selecting the listen port.
const PORT_ENV: &str = "PORT";
/// Port used when [`PORT_ENV`] is unset or unparsable.
const DEFAULT_PORT: u16 = 3333;
/// Environment variable carrying a comma-separated allow-list of CORS
/// origins, or `*` for any origin.
const CORS_ORIGIN_ENV: &str = "CORS_ORIGIN";

/// Immutable runtime configuration resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP port the server binds to.
    pub port: u16,
    /// Allowed CORS origins; `None` means any origin.
    pub cors_origins: Option<Vec<HeaderValue>>,
}

impl AppConfig {
    /// Resolve the configuration from the environment, logging and
    /// falling back to defaults on anything unparsable.
    pub fn load() -> Self {
        let port = match env::var(PORT_ENV) {
            Ok(raw) => raw.parse::<u16>().unwrap_or_else(|_| {
                warn!(value = %raw, "unparsable {PORT_ENV}; using default port {DEFAULT_PORT}");
                DEFAULT_PORT
            }),
            Err(_) => DEFAULT_PORT,
        };

        let cors_origins = match env::var(CORS_ORIGIN_ENV) {
            Ok(raw) if raw.trim() == "*" => None,
            Ok(raw) => {
                let origins = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .filter_map(|origin| {
                        HeaderValue::from_str(origin)
                            .inspect_err(|_| {
                                warn!(%origin, "ignoring invalid CORS origin");
                            })
                            .ok()
                    })
                    .collect::<Vec<_>>();
                if origins.is_empty() { None } else { Some(origins) }
            }
            Err(_) => None,
        };

        Self { port, cors_origins }
    }

    /// Build the CORS middleware corresponding to this configuration.
    pub fn cors_layer(&self) -> CorsLayer {
        match &self.cors_origins {
            None => CorsLayer::permissive(),
            Some(origins) => CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins.iter().cloned()))
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cors_origins: None,
        }
    }
}
