use pingora_http::RequestHeader;

/// Collects every value of a query parameter from the request URI, in order.
///
/// Values are form-url-decoded and otherwise passed through untouched. A key
/// without `=` yields an empty value.
pub fn get_query_values(req_header: &RequestHeader, name: &str) -> Vec<String> {
    req_header
        .uri
        .query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .filter(|(k, _)| *k == name)
                .map(|(_, v)| v.into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// Retrieves the request host (domain name) from the request header.
///
/// Prefers the host from the URI, falls back to the `Host` header.
/// Removes the port number if present in the `Host` header.
pub fn get_request_host(header: &RequestHeader) -> Option<&str> {
    if let Some(host) = header.uri.host() {
        if !host.is_empty() {
            return Some(host);
        }
    }
    if let Some(host_header_value) = header.headers.get(http::header::HOST) {
        if let Ok(host_str) = host_header_value.to_str() {
            return host_str.split(':').next();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(uri: &str) -> RequestHeader {
        RequestHeader::build("GET", uri.as_bytes(), None).unwrap()
    }

    #[test]
    fn test_query_values() {
        let req = header("/test?id=42&other=x");
        assert_eq!(get_query_values(&req, "id"), vec!["42"]);
        assert_eq!(get_query_values(&req, "other"), vec!["x"]);
        assert!(get_query_values(&req, "missing").is_empty());
    }

    #[test]
    fn test_query_values_keeps_repeats() {
        let req = header("/test?id=1&id=2");
        assert_eq!(get_query_values(&req, "id"), vec!["1", "2"]);
    }

    #[test]
    fn test_query_values_are_decoded() {
        let req = header("/test?id=%34%32");
        assert_eq!(get_query_values(&req, "id"), vec!["42"]);

        let req = header("/test?id=%2042");
        assert_eq!(get_query_values(&req, "id"), vec![" 42"]);
    }

    #[test]
    fn test_query_key_without_value() {
        let req = header("/test?id");
        assert_eq!(get_query_values(&req, "id"), vec![""]);
    }

    #[test]
    fn test_no_query() {
        let req = header("/test");
        assert!(get_query_values(&req, "id").is_empty());
    }

    #[test]
    fn test_request_host_from_header() {
        let mut req = header("/test");
        req.insert_header("Host", "example.com:8080").unwrap();
        assert_eq!(get_request_host(&req), Some("example.com"));
    }
}
