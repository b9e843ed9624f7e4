//! Fetch handling and the last-resort error boundary.
//!
//! Once a request is intercepted it always gets a response: a strategy that
//! fails is answered with the cached offline page (navigations) or a 503.

use shellcache_core::{Error, Request, Response, Route};

use super::Worker;
use crate::fetch::resolve;
use crate::strategy::StrategyContext;

/// Result of offering a request to the worker.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The worker answered the request.
    Respond { response: Response, route: Route },
    /// Not intercepted; the host goes to the network itself.
    PassThrough,
}

impl Worker {
    pub(crate) async fn handle_fetch(&self, request: &Request) -> FetchOutcome {
        let Some(route) = self.settings.router.route(request) else {
            tracing::trace!(request = %request.describe(), "pass through");
            return FetchOutcome::PassThrough;
        };

        let ctx = StrategyContext {
            caches: &self.caches,
            network: self.platform.network.as_ref(),
            lifetime: &self.lifetime,
        };
        let response = match ctx.respond(request, &route).await {
            Ok(response) => response,
            Err(e) => self.recover(request, &e).await,
        };
        FetchOutcome::Respond { response, route }
    }

    async fn recover(&self, request: &Request, err: &Error) -> Response {
        tracing::warn!(request = %request.describe(), error = %err, "fetch failed");
        if !request.is_navigation() {
            return Response::service_unavailable();
        }

        let offline = match resolve(&request.url, self.settings.router.offline_page()) {
            Ok(url) => self.caches.match_any(&Request::get(url)).await,
            Err(e) => {
                tracing::warn!(error = %e, "bad offline page path");
                Ok(None)
            }
        };
        match offline {
            Ok(Some(page)) => page,
            Ok(None) => Response::offline_placeholder(),
            Err(e) => {
                tracing::warn!(error = %e, "cache read failed");
                Response::offline_placeholder()
            }
        }
    }
}
