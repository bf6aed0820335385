//! Cookie plumbing for the session client.
//!
//! The session client only sees [`CookieAdapter`]. The middleware and the
//! route handlers each supply their own implementation because they hold
//! cookies in different places.

use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use time::Duration;
use tower_cookies::{
    cookie::{CookieJar, SameSite},
    Cookie, Cookies,
};

use crate::config::Config;

/// Session cookies live as long as the provider's refresh-token window.
const SESSION_COOKIE_DAYS: i64 = 400;

/// Capability interface over wherever cookies are held for this request.
pub trait CookieAdapter {
    /// Every cookie the request currently carries.
    fn get_all(&self) -> Vec<Cookie<'static>>;

    /// Make `cookies` visible to later reads within this request.
    fn set_all_on_request(&mut self, cookies: &[Cookie<'static>]);

    /// Queue `cookies` for the browser.
    fn set_all_on_response(&mut self, cookies: &[Cookie<'static>]);
}

/// A cookie carrying an empty value and `Max-Age=0` deletes its name.
pub fn is_removal(cookie: &Cookie<'_>) -> bool {
    cookie.value().is_empty() || cookie.max_age() == Some(Duration::ZERO)
}

// ── Cookie settings ──────────────────────────────────────────

/// Names and attributes of the session cookies.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub access_name:   String,
    pub refresh_name:  String,
    pub verifier_name: String,
    pub secure:        bool,
}

impl CookieSettings {
    pub fn new(prefix: &str, secure: bool) -> Self {
        Self {
            access_name:   format!("{prefix}-access-token"),
            refresh_name:  format!("{prefix}-refresh-token"),
            verifier_name: format!("{prefix}-auth-token-code-verifier"),
            secure,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.cookie_prefix, !config.is_development())
    }

    /// Browser scripts share this session, so the cookie is not HttpOnly.
    pub fn build(&self, name: &str, value: &str) -> Cookie<'static> {
        Cookie::build((name.to_owned(), value.to_owned()))
            .http_only(false)
            .same_site(SameSite::Lax)
            .path("/")
            .secure(self.secure)
            .max_age(Duration::days(SESSION_COOKIE_DAYS))
            .build()
    }

    pub fn removal(&self, name: &str) -> Cookie<'static> {
        Cookie::build((name.to_owned(), ""))
            .http_only(false)
            .same_site(SameSite::Lax)
            .path("/")
            .secure(self.secure)
            .max_age(Duration::ZERO)
            .build()
    }
}

// ── Middleware context ───────────────────────────────────────

/// Cookies as seen from the request middleware: the inbound jar parsed from
/// the `Cookie` header, plus a delta of cookies bound for the browser.
///
/// The delta is keyed by cookie name, so queueing the same mutation twice
/// leaves exactly one `Set-Cookie` for it.
#[derive(Debug, Default)]
pub struct RequestCookies {
    request:  CookieJar,
    response: CookieJar,
    /// Inbound pairs the cookie parser refused; passed through untouched.
    unparsed: Vec<String>,
}

impl RequestCookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut request = CookieJar::new();
        let mut unparsed = Vec::new();
        for value in headers.get_all(COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            for pair in raw.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
                match Cookie::parse_encoded(pair.to_owned()) {
                    Ok(cookie) => request.add_original(cookie),
                    Err(_) => unparsed.push(pair.to_owned()),
                }
            }
        }
        Self { request, response: CookieJar::new(), unparsed }
    }

    /// Cookies queued for the browser, in name order.
    pub fn pending(&self) -> Vec<Cookie<'static>> {
        let mut pending: Vec<_> = self.response.iter().cloned().collect();
        pending.sort_by(|a, b| a.name().cmp(b.name()));
        pending
    }

    /// Replace the `Cookie` header so downstream handlers read the refreshed
    /// values instead of the ones the browser sent. Left alone when nothing
    /// was rotated.
    pub fn write_request_header(&self, headers: &mut HeaderMap) {
        if self.request.delta().next().is_none() {
            return;
        }

        let mut pairs: Vec<String> = self
            .request
            .iter()
            .map(|c| format!("{}", c.stripped().encoded()))
            .collect();
        pairs.sort();
        pairs.extend(self.unparsed.iter().cloned());

        headers.remove(COOKIE);
        if pairs.is_empty() {
            return;
        }
        match HeaderValue::from_str(&pairs.join("; ")) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(err) => tracing::warn!(error = %err, "Refreshed cookies are not a valid header value"),
        }
    }

    /// Emit the queued cookies ahead of any `Set-Cookie` already on
    /// `headers`. Browsers apply `Set-Cookie` in order, so a value the
    /// downstream handler set for the same name still wins.
    pub fn apply_to_response(&self, headers: &mut HeaderMap) {
        let downstream: Vec<HeaderValue> = headers.get_all(SET_COOKIE).iter().cloned().collect();
        headers.remove(SET_COOKIE);

        for cookie in self.pending() {
            match HeaderValue::from_str(&cookie.encoded().to_string()) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(err) => tracing::warn!(cookie = cookie.name(), error = %err, "Dropping unencodable cookie"),
            }
        }
        for value in downstream {
            headers.append(SET_COOKIE, value);
        }
    }
}

impl CookieAdapter for RequestCookies {
    fn get_all(&self) -> Vec<Cookie<'static>> {
        self.request.iter().cloned().collect()
    }

    fn set_all_on_request(&mut self, cookies: &[Cookie<'static>]) {
        for cookie in cookies {
            if is_removal(cookie) {
                self.request.remove(Cookie::from(cookie.name().to_owned()));
            } else {
                self.request.add(cookie.clone());
            }
        }
    }

    fn set_all_on_response(&mut self, cookies: &[Cookie<'static>]) {
        for cookie in cookies {
            self.response.add(cookie.clone());
        }
    }
}

// ── Handler context ──────────────────────────────────────────

/// Cookies as seen from a route handler through `tower_cookies`.
///
/// `Cookies` is a single jar: an added cookie is readable for the rest of
/// the request and is emitted on the response by `CookieManagerLayer`.
pub struct HandlerCookies(pub Cookies);

impl CookieAdapter for HandlerCookies {
    fn get_all(&self) -> Vec<Cookie<'static>> {
        self.0
            .list()
            .into_iter()
            .filter(|c| !c.value().is_empty())
            .map(Cookie::into_owned)
            .collect()
    }

    fn set_all_on_request(&mut self, _cookies: &[Cookie<'static>]) {
        // The jar is shared with the response; `set_all_on_response` covers both.
    }

    fn set_all_on_response(&mut self, cookies: &[Cookie<'static>]) {
        for cookie in cookies {
            self.0.add(cookie.clone());
        }
    }
}
