use std::time::Duration;

use log::{debug, info};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{redirect, Client, StatusCode};
use serde::Deserialize;

use crate::error::{ApplyError, AuthError, ProbeError, ScrapeError, UpdateError};
use crate::node::ProxyNode;
use crate::scrape;

pub const LOGIN_PATH: &str = "/cgi-bin/luci/";
pub const SERVERS_PATH: &str = "/cgi-bin/luci/admin/services/vssr/servers";
pub const SUBSCRIBE_PATH: &str = "/cgi-bin/luci/admin/services/vssr/subscribe";
pub const CHECKPORT_PATH: &str = "/cgi-bin/luci/admin/services/vssr/checkport";
pub const CHANGE_PATH: &str = "/cgi-bin/luci/admin/services/vssr/change";

/// Marker of the session attribute inside the login Set-Cookie headers.
const SESSION_COOKIE: &str = "sysauth";

/// Sentinel id the router documents for clearing the global selection.
const CLEAR_SENTINEL: &str = "nil";

/// Subscription entries whose remark matches these words are dropped by
/// the router while importing.
const FILTER_WORDS: &str = "过期时间/剩余流量";

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// host:port of the admin interface.
    pub addr: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

/// Client for the router's proxy-management panel. One instance owns one
/// session; every privileged call authenticates lazily when the session
/// cookie is absent. Not meant to be shared across tasks, the `&mut self`
/// receivers make single ownership explicit.
pub struct Router {
    addr: String,
    username: String,
    password: String,
    timeout: Duration,
    cookie: String,
}

#[derive(Deserialize)]
struct CheckPortReply {
    ret: String,
    used: u64,
}

#[derive(Deserialize)]
struct ChangeReply {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    sid: String,
}

#[derive(Deserialize)]
struct SubscribeReply {
    error: i64,
}

impl Router {
    pub fn new(conf: RouterConfig) -> Self {
        Self {
            addr: conf.addr,
            username: conf.username,
            password: conf.password,
            timeout: conf.timeout,
            cookie: String::new(),
        }
    }

    /// The captured session attribute, `None` while unauthenticated.
    pub fn session_cookie(&self) -> Option<&str> {
        if self.cookie.is_empty() {
            None
        } else {
            Some(&self.cookie)
        }
    }

    /// Authenticate against the LuCI login form. The router signals
    /// success with a 302 whose Set-Cookie carries the session attribute,
    /// so redirect following is disabled for this request only; following
    /// it would discard the cookie. Callable repeatedly, each success
    /// overwrites the previous cookie.
    pub async fn login(&mut self) -> Result<(), AuthError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        let rsp = client
            .post(format!("http://{}{}", self.addr, LOGIN_PATH))
            .form(&[
                ("luci_username", self.username.as_str()),
                ("luci_password", self.password.as_str()),
            ])
            .send()
            .await?;

        if rsp.status() != StatusCode::FOUND {
            return Err(AuthError::UnexpectedStatus(rsp.status()));
        }

        for value in rsp.headers().get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            if let Some(attr) = raw.split(';').find(|a| a.contains(SESSION_COOKIE)) {
                self.cookie = attr.trim().to_string();
                debug!("session established on {}", self.addr);
                return Ok(());
            }
        }
        Err(AuthError::CookieNotFound)
    }

    /// Scrape the servers page into the current node list. Each call
    /// re-reads and re-parses from scratch.
    pub async fn list_nodes(&mut self) -> Result<Vec<ProxyNode>, ScrapeError> {
        self.ensure_session().await?;

        let body = self.authed_get(SERVERS_PATH, &[]).await?;
        let nodes = match scrape::parse_nodes(&body) {
            Ok(nodes) => nodes,
            Err(ScrapeError::Parse) => {
                self.relogin().await?;
                let body = self.authed_get(SERVERS_PATH, &[]).await?;
                scrape::parse_nodes(&body)?
            }
            Err(err) => return Err(err),
        };
        info!("{} proxy nodes on {}", nodes.len(), self.addr);
        Ok(nodes)
    }

    /// Ask the router to measure the reachability of one node's backend.
    /// The node is only touched after a fully decoded reply: `ret == "0"`
    /// means the backend is offline (router polarity, kept as is) and
    /// `used` is the round-trip time in milliseconds.
    pub async fn probe_latency(&mut self, node: &mut ProxyNode) -> Result<(), ProbeError> {
        self.ensure_session().await?;

        let query = [("host", node.host.as_str()), ("port", node.port.as_str())];
        let body = self.authed_get(CHECKPORT_PATH, &query).await?;
        let reply: CheckPortReply = match serde_json::from_str(&body) {
            Ok(reply) => reply,
            Err(_) => {
                self.relogin().await?;
                let body = self.authed_get(CHECKPORT_PATH, &query).await?;
                serde_json::from_str(&body)?
            }
        };

        node.offline = reply.ret == "0";
        node.latency_ms = reply.used;
        Ok(())
    }

    /// Switch the router's global proxy to the given node, or clear the
    /// selection when no node is passed.
    pub async fn apply_global(&mut self, node: Option<&ProxyNode>) -> Result<(), ApplyError> {
        self.ensure_session().await?;

        let id = node.map_or(CLEAR_SENTINEL, |n| n.id.as_str());
        let query = [("server", "global"), ("set", id)];
        let body = self.authed_get(CHANGE_PATH, &query).await?;
        let reply: ChangeReply = match serde_json::from_str(&body) {
            Ok(reply) => reply,
            Err(_) => {
                self.relogin().await?;
                let body = self.authed_get(CHANGE_PATH, &query).await?;
                serde_json::from_str(&body)?
            }
        };

        if !reply.status {
            return Err(ApplyError::Rejected { sid: reply.sid });
        }
        debug!("global proxy set to {} on {}", id, self.addr);
        Ok(())
    }

    /// Push subscription URLs into the router configuration. An empty
    /// list is a success without any network traffic, checked before the
    /// lazy login so that no session is established either.
    pub async fn update_subscriptions(&mut self, urls: &[String]) -> Result<(), UpdateError> {
        if urls.is_empty() {
            return Ok(());
        }
        self.ensure_session().await?;

        let subscribe_url = serde_json::to_string(urls)?;
        let form = [
            ("auto_update", "1"),
            ("auto_update_time", "2"),
            ("subscribe_url", subscribe_url.as_str()),
            ("proxy", "0"),
            ("filter_words", FILTER_WORDS),
        ];
        let body = self.authed_post_form(SUBSCRIBE_PATH, &form).await?;
        let reply: SubscribeReply = match serde_json::from_str(&body) {
            Ok(reply) => reply,
            Err(_) => {
                self.relogin().await?;
                let body = self.authed_post_form(SUBSCRIBE_PATH, &form).await?;
                serde_json::from_str(&body)?
            }
        };

        if reply.error != 0 {
            return Err(UpdateError::Code(reply.error));
        }
        info!("{} subscription urls pushed to {}", urls.len(), self.addr);
        Ok(())
    }

    async fn ensure_session(&mut self) -> Result<(), AuthError> {
        if self.cookie.is_empty() {
            self.login().await?;
        }
        Ok(())
    }

    /// A stale session makes the router answer privileged calls with its
    /// login page instead of the expected payload. Drop the cookie and
    /// authenticate once more; callers retry their request exactly once.
    async fn relogin(&mut self) -> Result<(), AuthError> {
        debug!("session on {} looks stale, re-authenticating", self.addr);
        self.cookie.clear();
        self.login().await
    }

    fn http_client(&self) -> reqwest::Result<Client> {
        Client::builder().timeout(self.timeout).build()
    }

    async fn authed_get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<String, reqwest::Error> {
        let client = self.http_client()?;
        let mut req = client
            .get(format!("http://{}{}", self.addr, path))
            .header(COOKIE, self.cookie.as_str());
        if !query.is_empty() {
            req = req.query(query);
        }
        req.send().await?.text().await
    }

    async fn authed_post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<String, reqwest::Error> {
        let client = self.http_client()?;
        client
            .post(format!("http://{}{}", self.addr, path))
            .header(COOKIE, self.cookie.as_str())
            .form(form)
            .send()
            .await?
            .text()
            .await
    }
}
