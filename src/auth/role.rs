//! Role extraction from the session's access token.

use crate::{
    auth::{session::SessionSource, token},
    models::{RoleInfo, ROLE_NO_ROLE},
};

/// Resolve the caller's role from the session held by `source`.
///
/// Never fails: no session, a provider error and an undecodable token all
/// collapse to [`RoleInfo::none`]. A decodable token without `claim` is
/// authenticated but unclassified (`"no-role"`).
pub async fn role_from_session<S: SessionSource + ?Sized>(
    source: &mut S,
    claim: &str,
    debug_claims: bool,
) -> RoleInfo {
    let session = match source.get_session().await {
        Ok(Some(session)) => session,
        Ok(None) => {
            tracing::debug!("No access token in session");
            return RoleInfo::none();
        }
        Err(err) => {
            tracing::warn!(error = %err, "Could not load session for role lookup");
            return RoleInfo::none();
        }
    };

    let info = decode_role(&session.access_token, claim);
    if debug_claims {
        tracing::debug!(role = %info.role, claim, "Role claim resolved");
    }
    info
}

/// Pure decoder behind [`role_from_session`]. No signature check happens here.
pub fn decode_role(access_token: &str, claim: &str) -> RoleInfo {
    if access_token.is_empty() {
        return RoleInfo::none();
    }
    match token::string_claim(access_token, claim) {
        Ok(Some(role)) if !role.is_empty() => RoleInfo::from_role(role),
        Ok(_) => RoleInfo::from_role(ROLE_NO_ROLE),
        Err(err) => {
            tracing::warn!(error = %err, "Access token could not be decoded");
            RoleInfo::none()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{provider::ProviderError, token::encode_unsigned},
        models::{Session, ROLE_NONE},
    };
    use async_trait::async_trait;
    use serde_json::json;

    struct Fixed(Result<Option<Session>, ()>, usize);

    #[async_trait]
    impl SessionSource for Fixed {
        async fn get_session(&mut self) -> Result<Option<Session>, ProviderError> {
            self.1 += 1;
            self.0.clone().map_err(|_| ProviderError::Timeout(std::time::Duration::ZERO))
        }
    }

    fn session(access_token: &str) -> Fixed {
        Fixed(
            Ok(Some(Session {
                access_token:  access_token.to_owned(),
                refresh_token: None,
                expires_at:    None,
            })),
            0,
        )
    }

    #[tokio::test]
    async fn admin_claim_grants_admin() {
        let token = encode_unsigned(&json!({ "sub": "u1", "user_role": "admin" }));
        let mut source = session(&token);
        let info = role_from_session(&mut source, "user_role", true).await;
        assert_eq!(info, RoleInfo { role: "admin".into(), is_admin: true });
        assert_eq!(source.1, 1);
    }

    #[tokio::test]
    async fn other_roles_are_not_admin() {
        let token = encode_unsigned(&json!({ "sub": "u1", "user_role": "customer" }));
        let info = role_from_session(&mut session(&token), "user_role", false).await;
        assert_eq!(info.role, "customer");
        assert!(!info.is_admin);
    }

    #[tokio::test]
    async fn missing_claim_is_no_role() {
        // `role` holds the database role on provider tokens; only the configured claim counts.
        let token = encode_unsigned(&json!({ "sub": "u1", "role": "authenticated" }));
        let info = role_from_session(&mut session(&token), "user_role", false).await;
        assert_eq!(info, RoleInfo { role: ROLE_NO_ROLE.into(), is_admin: false });
    }

    #[test]
    fn empty_claim_is_no_role() {
        let token = encode_unsigned(&json!({ "sub": "u1", "user_role": "" }));
        assert_eq!(decode_role(&token, "user_role"), RoleInfo::from_role(ROLE_NO_ROLE));
    }

    #[tokio::test]
    async fn claim_name_is_configurable() {
        let token = encode_unsigned(&json!({ "sub": "u1", "app_role": "admin" }));
        assert!(role_from_session(&mut session(&token), "app_role", false).await.is_admin);
        assert!(!role_from_session(&mut session(&token), "user_role", false).await.is_admin);
    }

    #[tokio::test]
    async fn no_session_is_none() {
        let info = role_from_session(&mut Fixed(Ok(None), 0), "user_role", false).await;
        assert_eq!(info, RoleInfo::none());
    }

    #[tokio::test]
    async fn provider_failure_is_none() {
        let info = role_from_session(&mut Fixed(Err(()), 0), "user_role", false).await;
        assert_eq!(info.role, ROLE_NONE);
        assert!(!info.is_admin);
    }

    #[tokio::test]
    async fn malformed_token_is_none() {
        for token in ["", "garbage", "a.b", "a.%%%.c", "a.bm90LWpzb24.c"] {
            let info = role_from_session(&mut session(token), "user_role", false).await;
            assert_eq!(info, RoleInfo::none(), "token {token:?}");
        }
    }
}
