//! Route classification and the authorization decision tree.
//!
//! Everything here is a pure function of the path, query and the caller's
//! resolved identity/role. The request middleware feeds it and acts on the
//! resulting [`Verdict`].

use crate::models::RoleInfo;

pub const HOME_PATH:          &str = "/";
pub const LOGIN_PATH:         &str = "/login";
pub const ADMIN_PREFIX:       &str = "/admin";
pub const AUTH_CALLBACK_PATH: &str = "/auth/callback";

pub const NEXT_PARAM:         &str = "next";
pub const REDIRECT_TO_PARAM:  &str = "redirectTo";

const STATIC_EXTENSIONS: [&str; 6] = ["svg", "png", "jpg", "jpeg", "gif", "webp"];

// ── Classification ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Requires an identity holding the admin role.
    Admin,
    /// Requires an identity.
    Protected,
    /// Login, callback and error pages; never blocked.
    PublicAuth,
    Root,
    Unrestricted,
}

/// The path the file server will actually resolve: percent-decoded, with
/// empty and `.` segments dropped and `..` applied. Classification must run
/// on this form, or `/%61dmin` and `//admin` slip past the admin prefix.
pub fn normalize_path(raw: &str) -> String {
    let decoded = urlencoding::decode_binary(raw.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut path = format!("/{}", segments.join("/"));
    if decoded.ends_with('/') && !segments.is_empty() {
        path.push('/');
    }
    path
}

/// Plain prefix matching: `/administrator` is admin territory too.
pub fn classify_route(path: &str) -> RouteClass {
    if path.starts_with(ADMIN_PREFIX) {
        RouteClass::Admin
    } else if path.starts_with("/dashboard") {
        RouteClass::Protected
    } else if ["/login", "/auth", "/error"].iter().any(|p| path.starts_with(p)) {
        RouteClass::PublicAuth
    } else if path == HOME_PATH {
        RouteClass::Root
    } else {
        RouteClass::Unrestricted
    }
}

/// Whether the session middleware runs for `path` at all. Static assets
/// skip it unless they live under one of the always-matched areas.
pub fn middleware_applies(path: &str) -> bool {
    const ALWAYS: [&str; 5] = ["/admin", "/dashboard", "/main", "/login", "/auth"];

    let under = |area: &str| {
        path.strip_prefix(area)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    };
    if path == HOME_PATH || ALWAYS.iter().any(|area| under(*area)) {
        return true;
    }

    let rest = path.strip_prefix('/').unwrap_or(path);
    let is_framework_asset = ["_next/static", "_next/image", "favicon.ico"]
        .iter()
        .any(|p| rest.starts_with(p));
    let is_image = rest
        .rsplit_once('.')
        .is_some_and(|(_, ext)| STATIC_EXTENSIONS.contains(&ext));

    !(is_framework_asset || is_image)
}

/// True on the auth callback when its `next` parameter points into the
/// admin area, i.e. while a login is bouncing back to the console.
pub fn callback_targets_admin(path: &str, query: Option<&str>) -> bool {
    path.starts_with(AUTH_CALLBACK_PATH)
        && query_param(query, NEXT_PARAM).is_some_and(|next| next.starts_with(ADMIN_PREFIX))
}

// ── Decision ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub path:              &'a str,
    pub has_identity:      bool,
    pub role:              &'a RoleInfo,
    pub callback_to_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Send to the login page, remembering where the caller wanted to go.
    RedirectLogin { redirect_to: String },
    /// Send to the home page with any `next` parameter stripped.
    RedirectHome,
}

/// First matching rule wins:
/// 1. a non-admin identity finishing a login aimed at the admin area goes home;
/// 2. protected areas without an identity go to login;
/// 3. the admin area with a non-admin identity goes home;
/// 4. everything else is allowed.
pub fn authorize(request: &AccessRequest<'_>) -> Verdict {
    let is_admin = request.has_identity && request.role.is_admin;

    if request.callback_to_admin && request.has_identity && !is_admin {
        return Verdict::RedirectHome;
    }

    match classify_route(request.path) {
        RouteClass::Admin | RouteClass::Protected if !request.has_identity => {
            Verdict::RedirectLogin { redirect_to: request.path.to_owned() }
        }
        RouteClass::Admin if !is_admin => Verdict::RedirectHome,
        _ => Verdict::Allow,
    }
}

impl Verdict {
    /// `Location` for a redirect verdict, carrying over the inbound query.
    pub fn location(&self, query: Option<&str>) -> Option<String> {
        let (path, query) = match self {
            Verdict::Allow => return None,
            Verdict::RedirectLogin { redirect_to } => {
                (LOGIN_PATH, set_param(query, REDIRECT_TO_PARAM, redirect_to))
            }
            Verdict::RedirectHome => (HOME_PATH, remove_param(query, NEXT_PARAM)),
        };
        Some(if query.is_empty() { path.to_owned() } else { format!("{path}?{query}") })
    }
}

// ── Query helpers ────────────────────────────────────────────

fn pairs(query: Option<&str>) -> impl Iterator<Item = &str> {
    query.unwrap_or_default().split('&').filter(|pair| !pair.is_empty())
}

fn pair_name(pair: &str) -> String {
    decode_component(pair.split_once('=').map_or(pair, |(name, _)| name))
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

/// First value of `name`, form-decoded.
pub fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    pairs(query)
        .find(|pair| pair_name(pair) == name)
        .map(|pair| decode_component(pair.split_once('=').map_or("", |(_, value)| value)))
}

/// Drop every occurrence of `name`, leaving the other pairs untouched.
pub fn remove_param(query: Option<&str>, name: &str) -> String {
    pairs(query)
        .filter(|pair| pair_name(pair) != name)
        .collect::<Vec<_>>()
        .join("&")
}

/// Replace every occurrence of `name` with a single `name=value` at the end.
pub fn set_param(query: Option<&str>, name: &str, value: &str) -> String {
    let mut kept = remove_param(query, name);
    if !kept.is_empty() {
        kept.push('&');
    }
    kept.push_str(&urlencoding::encode(name));
    kept.push('=');
    kept.push_str(&urlencoding::encode(value));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ROLE_NONE, ROLE_NO_ROLE};

    fn verdict(path: &str, role: Option<&str>, callback_to_admin: bool) -> Verdict {
        let info = role.map(RoleInfo::from_role).unwrap_or_default();
        authorize(&AccessRequest {
            path,
            has_identity: role.is_some(),
            role: &info,
            callback_to_admin,
        })
    }

    #[test]
    fn classification_table() {
        assert_eq!(classify_route("/admin"), RouteClass::Admin);
        assert_eq!(classify_route("/admin/events"), RouteClass::Admin);
        assert_eq!(classify_route("/administrator"), RouteClass::Admin);
        assert_eq!(classify_route("/dashboard"), RouteClass::Protected);
        assert_eq!(classify_route("/dashboard/stats"), RouteClass::Protected);
        assert_eq!(classify_route("/login"), RouteClass::PublicAuth);
        assert_eq!(classify_route("/auth/callback"), RouteClass::PublicAuth);
        assert_eq!(classify_route("/auth/signout"), RouteClass::PublicAuth);
        assert_eq!(classify_route("/error"), RouteClass::PublicAuth);
        assert_eq!(classify_route("/"), RouteClass::Root);
        assert_eq!(classify_route("/events"), RouteClass::Unrestricted);
        assert_eq!(classify_route("/main/events"), RouteClass::Unrestricted);
    }

    #[test]
    fn anonymous_on_protected_goes_to_login() {
        for path in ["/admin", "/admin/events", "/dashboard", "/dashboard/x"] {
            assert_eq!(
                verdict(path, None, false),
                Verdict::RedirectLogin { redirect_to: path.to_owned() }
            );
        }
    }

    #[test]
    fn non_admin_identities_are_sent_home_from_admin() {
        for role in ["customer", ROLE_NO_ROLE, ROLE_NONE, "Admin", "administrator"] {
            assert_eq!(verdict("/admin/events", Some(role), false), Verdict::RedirectHome, "role {role}");
            assert_eq!(verdict("/dashboard", Some(role), false), Verdict::Allow, "role {role}");
        }
    }

    #[test]
    fn admin_is_allowed_everywhere() {
        for path in ["/admin", "/admin/events", "/dashboard", "/", "/login", "/auth/callback"] {
            assert_eq!(verdict(path, Some("admin"), false), Verdict::Allow);
        }
    }

    #[test]
    fn public_auth_routes_are_never_blocked() {
        for path in ["/login", "/login/reset", "/auth/callback", "/auth/signout", "/error"] {
            for role in [None, Some("customer"), Some("admin"), Some(ROLE_NO_ROLE)] {
                assert_eq!(verdict(path, role, false), Verdict::Allow, "{path} {role:?}");
            }
        }
    }

    #[test]
    fn callback_rule_precedes_everything() {
        assert_eq!(verdict("/auth/callback", Some("customer"), true), Verdict::RedirectHome);
        assert_eq!(verdict("/auth/callback", Some("admin"), true), Verdict::Allow);
        // No identity yet: the callback handler still has to exchange the code.
        assert_eq!(verdict("/auth/callback", None, true), Verdict::Allow);
    }

    #[test]
    fn admin_claim_without_identity_is_not_admin() {
        let info = RoleInfo::from_role("admin");
        let request = AccessRequest {
            path:              "/admin",
            has_identity:      false,
            role:              &info,
            callback_to_admin: false,
        };
        assert_eq!(
            authorize(&request),
            Verdict::RedirectLogin { redirect_to: "/admin".into() }
        );
    }

    #[test]
    fn callback_detection_reads_next() {
        assert!(callback_targets_admin("/auth/callback", Some("code=abc&next=/admin")));
        assert!(callback_targets_admin("/auth/callback", Some("next=%2Fadmin%2Fevents")));
        assert!(!callback_targets_admin("/auth/callback", Some("next=/events")));
        assert!(!callback_targets_admin("/auth/callback", None));
        assert!(!callback_targets_admin("/login", Some("next=/admin")));
    }

    #[test]
    fn login_location_carries_original_path() {
        let v = Verdict::RedirectLogin { redirect_to: "/admin/events".into() };
        assert_eq!(v.location(None).unwrap(), "/login?redirectTo=%2Fadmin%2Fevents");
        assert_eq!(
            v.location(Some("tab=2&redirectTo=/old")).unwrap(),
            "/login?tab=2&redirectTo=%2Fadmin%2Fevents"
        );
    }

    #[test]
    fn home_location_strips_next() {
        let v = Verdict::RedirectHome;
        assert_eq!(v.location(None).unwrap(), "/");
        assert_eq!(v.location(Some("next=/admin")).unwrap(), "/");
        assert_eq!(v.location(Some("code=1&next=%2Fadmin&next=/x")).unwrap(), "/?code=1");
        assert_eq!(Verdict::Allow.location(Some("a=1")), None);
    }

    #[test]
    fn query_helpers_decode_values() {
        assert_eq!(query_param(Some("a=1&b=hello+world"), "b").as_deref(), Some("hello world"));
        assert_eq!(query_param(Some("flag&a=1"), "flag").as_deref(), Some(""));
        assert_eq!(query_param(Some("a=1"), "b"), None);
        assert_eq!(set_param(None, "redirectTo", "/a b"), "redirectTo=%2Fa%20b");
    }

    #[test]
    fn matcher_skips_static_assets() {
        for path in ["/", "/admin", "/admin/logo.png", "/dashboard/x", "/login", "/auth/callback", "/main/events", "/events", "/contact"] {
            assert!(middleware_applies(path), "{path}");
        }
        for path in ["/_next/static/chunk.js", "/_next/image", "/favicon.ico", "/img/hero.webp", "/logo.svg", "/a/b.jpeg"] {
            assert!(!middleware_applies(path), "{path}");
        }
    }

    #[test]
    fn encoded_and_doubled_paths_normalize_to_what_is_served() {
        assert_eq!(normalize_path("/%61dmin"), "/admin");
        assert_eq!(normalize_path("/%61dmin/"), "/admin/");
        assert_eq!(normalize_path("//admin"), "/admin");
        assert_eq!(normalize_path("//admin//events"), "/admin/events");
        assert_eq!(normalize_path("/%2Fadmin"), "/admin");
        assert_eq!(normalize_path("/./admin"), "/admin");
        assert_eq!(normalize_path("/events/../admin"), "/admin");
        assert_eq!(normalize_path("/../../admin"), "/admin");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("//"), "/");
        assert_eq!(normalize_path("/events/caf%C3%A9"), "/events/café");

        for raw in ["/%61dmin", "//admin/", "/%2Fadmin", "/%2fdashboard"] {
            let path = normalize_path(raw);
            assert!(middleware_applies(&path), "{raw}");
            assert_ne!(classify_route(&path), RouteClass::Unrestricted, "{raw}");
        }
    }
}
