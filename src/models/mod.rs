use serde::{Deserialize, Serialize};

// ── Identity ─────────────────────────────────────────────────

/// The authenticated caller as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub id:    String,
    #[serde(default)]
    pub email: Option<String>,
}

// ── Sessions ─────────────────────────────────────────────────

/// Token pair held in the session cookies.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token:  String,
    pub refresh_token: Option<String>,
    /// Unix seconds, taken from the access token's `exp` claim.
    pub expires_at:    Option<i64>,
}

/// Token grant returned by the provider's `/token` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token:  String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at:    Option<i64>,
}

impl From<TokenGrant> for Session {
    fn from(grant: TokenGrant) -> Self {
        Session {
            access_token:  grant.access_token,
            refresh_token: Some(grant.refresh_token),
            expires_at:    grant.expires_at,
        }
    }
}

// ── Roles ────────────────────────────────────────────────────

pub const ROLE_ADMIN:   &str = "admin";
/// No session, or a token that could not be decoded.
pub const ROLE_NONE:    &str = "none";
/// Authenticated, but the token carries no role claim.
pub const ROLE_NO_ROLE: &str = "no-role";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleInfo {
    pub role:     String,
    pub is_admin: bool,
}

impl RoleInfo {
    /// Only an exact match on the admin role grants elevated access.
    pub fn from_role(role: impl Into<String>) -> Self {
        let role = role.into();
        let is_admin = role == ROLE_ADMIN;
        Self { role, is_admin }
    }

    pub fn none() -> Self {
        Self { role: ROLE_NONE.to_owned(), is_admin: false }
    }
}

impl Default for RoleInfo {
    fn default() -> Self {
        Self::none()
    }
}

/// Per-request view of who is calling, inserted into request extensions by
/// the session middleware. Handlers take `Extension<AuthContext>` instead of
/// re-resolving the session.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub user: Option<Identity>,
    #[serde(flatten)]
    pub role: RoleInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exact_admin_is_admin() {
        assert!(RoleInfo::from_role("admin").is_admin);
        assert!(!RoleInfo::from_role("Admin").is_admin);
        assert!(!RoleInfo::from_role("admin ").is_admin);
        assert!(!RoleInfo::from_role(ROLE_NO_ROLE).is_admin);
        assert!(!RoleInfo::from_role("customer").is_admin);
    }

    #[test]
    fn auth_context_serializes_flat() {
        let ctx = AuthContext {
            user: Some(Identity { id: "u1".into(), email: None }),
            role: RoleInfo::from_role("admin"),
        };
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["role"], "admin");
        assert_eq!(value["isAdmin"], true);
        assert_eq!(value["user"]["id"], "u1");
    }
}
