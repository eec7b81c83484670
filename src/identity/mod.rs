//! Caller identity.
//!
//! Authentication belongs to the surrounding application; the gateway only
//! asks "who is making this request" so it can assert the answer to
//! upstreams through trust headers.

use std::collections::HashMap;

use axum::http::HeaderMap;

use crate::config::IdentityConfig;
use crate::proxy::outbound::parse_cookies;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub username: String,
    pub groups: Vec<CallerGroup>,
}

/// Group membership as reported by the session source (name not yet trusted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerGroup {
    pub id: u64,
    pub name: String,
}

/// Resolves the caller behind an inbound request.
pub trait CallerIdentity: Send + Sync {
    fn current_caller(&self, headers: &HeaderMap) -> Option<Caller>;
}

/// Every request is anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl CallerIdentity for Anonymous {
    fn current_caller(&self, _headers: &HeaderMap) -> Option<Caller> {
        None
    }
}

/// Looks up a session cookie in a fixed table of known sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    cookie_name: String,
    sessions: HashMap<String, Caller>,
}

impl SessionTable {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            sessions: HashMap::new(),
        }
    }

    pub fn from_config(config: &IdentityConfig) -> Self {
        let mut table = Self::new(config.session_cookie.clone());
        for session in &config.sessions {
            table.insert(
                session.token.clone(),
                Caller {
                    username: session.username.clone(),
                    groups: session
                        .groups
                        .iter()
                        .map(|g| CallerGroup {
                            id: g.id,
                            name: g.name.clone(),
                        })
                        .collect(),
                },
            );
        }
        table
    }

    pub fn insert(&mut self, token: impl Into<String>, caller: Caller) {
        self.sessions.insert(token.into(), caller);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl CallerIdentity for SessionTable {
    fn current_caller(&self, headers: &HeaderMap) -> Option<Caller> {
        parse_cookies(headers)
            .into_iter()
            .find(|(name, _)| *name == self.cookie_name)
            .and_then(|(_, token)| self.sessions.get(&token).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{schema::GroupConfig, SessionConfig};
    use axum::http::header::COOKIE;

    fn table() -> SessionTable {
        SessionTable::from_config(&IdentityConfig {
            session_cookie: "_sess".into(),
            sessions: vec![SessionConfig {
                token: "abc".into(),
                username: "alice".into(),
                groups: vec![GroupConfig {
                    id: 3,
                    name: "staff".into(),
                }],
            }],
        })
    }

    #[test]
    fn resolves_known_session() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "theme=dark; _sess=abc".parse().unwrap());

        let caller = table().current_caller(&headers).unwrap();
        assert_eq!(caller.username, "alice");
        assert_eq!(caller.groups, vec![CallerGroup { id: 3, name: "staff".into() }]);
    }

    #[test]
    fn unknown_or_missing_session_is_anonymous() {
        let mut headers = HeaderMap::new();
        assert!(table().current_caller(&headers).is_none());

        headers.insert(COOKIE, "_sess=nope".parse().unwrap());
        assert!(table().current_caller(&headers).is_none());
        assert!(Anonymous.current_caller(&headers).is_none());
    }
}
