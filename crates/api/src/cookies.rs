//! Session cookies: reading `access`/`refresh` from requests and writing them
//! back on login and rotation.

use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, Utc};

use clinic_auth::TokenType;
use clinic_infra::{AuthTokens, IssuedToken};

pub const ACCESS_COOKIE: &str = "access";
pub const REFRESH_COOKIE: &str = "refresh";

const EXPIRED: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SameSite {
    Lax,
    Strict,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
        }
    }

    fn for_cookie(name: &str) -> Self {
        if name == REFRESH_COOKIE {
            SameSite::Strict
        } else {
            SameSite::Lax
        }
    }
}

/// Value of cookie `name`, looking through every `Cookie` header.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all(header::COOKIE) {
        let Ok(s) = cookie.to_str() else {
            continue;
        };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name && !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn cookie_line(name: &str, value: &str, expires: &str, secure: bool) -> String {
    let mut line = format!(
        "{name}={value}; Expires={expires}; Path=/; HttpOnly; SameSite={}",
        SameSite::for_cookie(name).as_str()
    );
    if secure {
        line.push_str("; Secure");
    }
    line
}

fn append(headers: &mut HeaderMap, line: String) {
    match HeaderValue::from_str(&line) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "unencodable Set-Cookie header dropped"),
    }
}

fn append_token(headers: &mut HeaderMap, token_type: TokenType, issued: &IssuedToken, secure: bool) {
    let line = cookie_line(
        token_type.as_str(),
        &issued.token,
        &http_date(issued.expires),
        secure,
    );
    append(headers, line);
}

/// `Set-Cookie` for the access token and, when present, the refresh token.
pub fn append_session_cookies(headers: &mut HeaderMap, tokens: &AuthTokens, secure: bool) {
    append_token(headers, TokenType::Access, &tokens.access, secure);
    if let Some(refresh) = &tokens.refresh {
        append_token(headers, TokenType::Refresh, refresh, secure);
    }
}

pub fn append_cleared_cookies(headers: &mut HeaderMap, secure: bool) {
    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        append(headers, cookie_line(name, "deleted", EXPIRED, secure));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tokens() -> AuthTokens {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        AuthTokens {
            access: IssuedToken {
                token: "a.b.c".to_string(),
                expires: at,
            },
            refresh: Some(IssuedToken {
                token: "r.s.t".to_string(),
                expires: at,
            }),
        }
    }

    fn set_cookies(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn parses_named_cookie_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; access=abc"));
        headers.append(header::COOKIE, HeaderValue::from_static("refresh=def"));

        assert_eq!(parse_cookie(&headers, ACCESS_COOKIE).as_deref(), Some("abc"));
        assert_eq!(parse_cookie(&headers, REFRESH_COOKIE).as_deref(), Some("def"));
        assert_eq!(parse_cookie(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_value_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("access=; refresh=x"));
        assert_eq!(parse_cookie(&headers, ACCESS_COOKIE), None);
    }

    #[test]
    fn session_cookies_carry_flags() {
        let mut headers = HeaderMap::new();
        append_session_cookies(&mut headers, &tokens(), true);

        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 2);
        assert_eq!(
            cookies[0],
            "access=a.b.c; Expires=Wed, 01 May 2024 09:30:00 GMT; Path=/; HttpOnly; SameSite=Lax; Secure"
        );
        assert!(cookies[1].starts_with("refresh=r.s.t;"));
        assert!(cookies[1].contains("SameSite=Strict"));
        assert!(cookies[1].contains("HttpOnly"));
    }

    #[test]
    fn insecure_mode_omits_secure() {
        let mut headers = HeaderMap::new();
        append_cleared_cookies(&mut headers, false);

        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.contains(EXPIRED) && !c.contains("Secure")));
    }
}
