//! Request metadata for audit records

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use serde::Serialize;

use crate::domain::entities::NewAuditLog;

/// Client address and user agent of the current request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Attach the request metadata to an audit entry
    pub fn stamp(&self, mut entry: NewAuditLog) -> NewAuditLog {
        entry.ip_address = self.ip_address.clone();
        entry.user_agent = self.user_agent.clone();
        entry
    }
}

/// JSON image of a record for `old_values`/`new_values`
pub fn snapshot<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`.
/// Values that are not a valid IP address are skipped.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let first_hop = header("x-forwarded-for").and_then(|v| v.split(',').next());
    [first_hop, header("x-real-ip")]
        .into_iter()
        .flatten()
        .find_map(|candidate| candidate.trim().parse::<IpAddr>().ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip_address = forwarded_ip(&parts.headers)
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .map(|ip| ip.to_string());
        let user_agent = parts
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Self {
            ip_address,
            user_agent,
        })
    }
}
