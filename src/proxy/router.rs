use std::collections::HashMap;
use std::sync::Arc;

use matchit::{InsertError, Router as MatchRouter};
use pingora_http::RequestHeader;

use crate::config::Router;
use crate::utils::request::get_request_host;

use super::plugin::ProxyPluginExecutor;

pub struct ProxyRouter {
    pub router: Router,
    pub plugin: Arc<ProxyPluginExecutor>,
}

impl ProxyRouter {
    pub fn new(router: Router, plugin: ProxyPluginExecutor) -> Self {
        Self {
            router,
            plugin: Arc::new(plugin),
        }
    }

    fn accepts_method(&self, method: &str) -> bool {
        self.router.methods.is_empty()
            || self
                .router
                .methods
                .iter()
                .any(|m| m.to_string() == method)
    }
}

type UriRouter = MatchRouter<Vec<Arc<ProxyRouter>>>;

#[derive(Default)]
pub struct MatchEntry {
    /// Router for non-host URI matching
    non_host_uri: UriRouter,
    /// Routers for host URI matching, keyed by host
    host_uris: HashMap<String, UriRouter>,
}

impl MatchEntry {
    pub fn insert_router(&mut self, proxy_router: ProxyRouter) -> Result<(), InsertError> {
        let hosts = proxy_router.router.get_hosts();
        let uris = proxy_router.router.get_uris();
        let proxy_router = Arc::new(proxy_router);

        if hosts.is_empty() {
            Self::insert_router_for_uri(&mut self.non_host_uri, &uris, proxy_router)?;
        } else {
            for host in hosts.iter() {
                let inner = self.host_uris.entry(host.to_lowercase()).or_default();
                Self::insert_router_for_uri(inner, &uris, proxy_router.clone())?;
            }
        }

        Ok(())
    }

    fn insert_router_for_uri(
        match_router: &mut UriRouter,
        uris: &[String],
        proxy_router: Arc<ProxyRouter>,
    ) -> Result<(), InsertError> {
        for uri in uris.iter() {
            match match_router.at_mut(uri) {
                Ok(matched) => {
                    let routers = matched.value;
                    routers.push(proxy_router.clone());
                    routers.sort_by_key(|r| std::cmp::Reverse(r.router.priority));
                }
                Err(_) => match_router.insert(uri, vec![proxy_router.clone()])?,
            }
        }
        Ok(())
    }

    /// Match a request to a router. Host-bound routers win over host-less ones.
    pub fn match_request(&self, req_header: &RequestHeader) -> Option<Arc<ProxyRouter>> {
        let host = get_request_host(req_header);
        let uri = req_header.uri.path();
        let method = req_header.method.as_str();

        log::debug!(
            "match request: host={:?}, uri={:?}, method={:?}",
            host,
            uri,
            method
        );

        if let Some(inner) = host
            .filter(|h| !h.is_empty())
            .and_then(|h| self.host_uris.get(&h.to_lowercase()))
        {
            if let Some(matched) = Self::match_uri(inner, uri, method) {
                return Some(matched);
            }
        }

        Self::match_uri(&self.non_host_uri, uri, method)
    }

    fn match_uri(match_router: &UriRouter, uri: &str, method: &str) -> Option<Arc<ProxyRouter>> {
        let matched = match_router.at(uri).ok()?;
        matched
            .value
            .iter()
            .find(|r| r.accepts_method(method))
            .cloned()
    }
}
