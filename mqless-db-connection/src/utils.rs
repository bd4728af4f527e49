use std::borrow::Cow;

const REDACTED_USERINFO: &str = "****:****@";
const SECRET_QUERY_KEYS: &[&str] = &["password", "pass", "pwd", "sslpassword"];

/// Redact the credentials of a connection URL so it can be logged.
///
/// Both the userinfo part and secret query parameters (`?password=...`) are masked. SQLite
/// URLs are returned as-is; anything else without a scheme is fully redacted.
pub fn sanitize_database_url(raw: &str) -> Cow<'_, str> {
    let Some(scheme_end) = raw.find("://") else {
        if raw.starts_with("sqlite:") {
            return Cow::Borrowed(raw);
        }
        return Cow::Borrowed("<redacted>");
    };
    let rest = &raw[scheme_end + 3..];
    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());

    let url = match rest[..authority_end].rfind('@') {
        Some(at_pos) => {
            let scheme = &raw[..scheme_end + 3];
            let host_and_rest = &rest[at_pos + 1..];
            Cow::Owned(format!("{scheme}{REDACTED_USERINFO}{host_and_rest}"))
        }
        None => Cow::Borrowed(raw),
    };

    match url.find('?') {
        Some(query_start) if has_secret_param(&url[query_start + 1..]) => {
            let (base, query) = url.split_at(query_start + 1);
            let masked: Vec<String> = query.split('&').map(mask_param).collect();
            Cow::Owned(format!("{base}{}", masked.join("&")))
        }
        _ => url,
    }
}

fn is_secret_key(key: &str) -> bool {
    SECRET_QUERY_KEYS
        .iter()
        .any(|secret| key.eq_ignore_ascii_case(secret))
}

fn has_secret_param(query: &str) -> bool {
    query
        .split('&')
        .any(|param| param.split_once('=').is_some_and(|(key, _)| is_secret_key(key)))
}

fn mask_param(param: &str) -> String {
    match param.split_once('=') {
        Some((key, _)) if is_secret_key(key) => format!("{key}=****"),
        _ => param.to_owned(),
    }
}
