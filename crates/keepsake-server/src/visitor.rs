use std::net::{IpAddr, SocketAddr};

use axum::http::{header, HeaderMap};

use crate::analytics::VisitorContext;

const SESSION_HEADER: &str = "x-session-id";

/// Build the analytics context for a request.
pub fn visitor_context(headers: &HeaderMap, peer: Option<SocketAddr>) -> VisitorContext {
    VisitorContext {
        ip: client_ip(headers, peer).map(|ip| ip.to_string()),
        user_agent: header_string(headers, header::USER_AGENT.as_str()),
        referrer: header_string(headers, header::REFERER.as_str()),
        session_id: header_string(headers, SESSION_HEADER),
    }
}

/// Try the socket address first, then X-Forwarded-For, then X-Real-IP.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    if let Some(addr) = peer {
        return Some(addr.ip());
    }

    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return Some(ip);
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            if let Ok(ip) = value.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }

    None
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_peer_address_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("9.9.9.9"));
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), Some("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers, None), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_real_ip_fallback_and_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, None), None);
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers, None), Some("10.0.0.2".parse().unwrap()));
    }

    #[test]
    fn test_context_reads_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers.insert(header::REFERER, HeaderValue::from_static("https://example.com/gallery"));
        headers.insert(SESSION_HEADER, HeaderValue::from_static("abc123"));

        let ctx = visitor_context(&headers, None);
        assert_eq!(ctx.ip, None);
        assert_eq!(ctx.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(ctx.referrer.as_deref(), Some("https://example.com/gallery"));
        assert_eq!(ctx.session_id.as_deref(), Some("abc123"));
    }
}
