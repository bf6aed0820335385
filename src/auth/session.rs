//! Cookie-backed session client.
//!
//! Resolves the caller's session from cookies, rotates it through the
//! identity provider when the access token is stale, and pushes every
//! rotation through the [`CookieAdapter`]: request side first so later
//! lookups in the same pass see fresh tokens, then response side so the
//! browser receives them.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use tower_cookies::Cookie;

use crate::{
    auth::{
        cookies::{CookieAdapter, CookieSettings},
        provider::{IdentityProvider, ProviderError},
        token,
    },
    models::{Identity, Session, TokenGrant},
    state::AppState,
};

/// Access tokens this close to expiry are refreshed up front.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Anything that can hand out the current session.
#[async_trait]
pub trait SessionSource: Send {
    async fn get_session(&mut self) -> Result<Option<Session>, ProviderError>;
}

pub struct SessionClient<C> {
    provider: Arc<dyn IdentityProvider>,
    cookies:  C,
    settings: CookieSettings,
    timeout:  Duration,
    /// Session from the last grant in this pass. A rotated refresh token is
    /// spent, so later reads must not refresh again.
    granted:  Option<Session>,
}

impl<C: CookieAdapter + Send> SessionClient<C> {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        cookies:  C,
        settings: CookieSettings,
        timeout:  Duration,
    ) -> Self {
        Self { provider, cookies, settings, timeout, granted: None }
    }

    pub fn from_state(state: &AppState, cookies: C) -> Self {
        Self::new(
            state.provider.clone(),
            cookies,
            CookieSettings::from_config(&state.config),
            state.config.provider_timeout,
        )
    }

    pub fn into_cookies(self) -> C {
        self.cookies
    }

    /// The current user, validated by the provider. `Ok(None)` when the
    /// request carries no session at all.
    pub async fn get_user(&mut self) -> Result<Option<Identity>, ProviderError> {
        let Some(session) = self.current_session().await? else {
            return Ok(None);
        };
        let provider = self.provider.clone();
        let user = bounded(self.timeout, provider.get_user(&session.access_token)).await?;
        Ok(Some(user))
    }

    /// Finish a PKCE login: trade `auth_code` plus the stored verifier for a
    /// session, persist it and drop the verifier cookie.
    pub async fn exchange_code(&mut self, auth_code: &str) -> Result<Session, ProviderError> {
        let verifier = self.cookie_value(&self.settings.verifier_name).unwrap_or_default();
        let provider = self.provider.clone();
        let grant = bounded(self.timeout, provider.exchange_code(auth_code, &verifier)).await?;

        let removal = self.settings.removal(&self.settings.verifier_name);
        self.persist(vec![removal]);
        Ok(self.store_grant(grant))
    }

    /// Revoke the session at the provider (best effort) and clear cookies.
    pub async fn sign_out(&mut self) {
        if let Some(access) = self.cookie_value(&self.settings.access_name) {
            let provider = self.provider.clone();
            if let Err(err) = bounded(self.timeout, provider.sign_out(&access)).await {
                tracing::warn!(error = %err, "Provider sign-out failed; clearing cookies anyway");
            }
        }
        self.clear_session();
    }

    async fn current_session(&mut self) -> Result<Option<Session>, ProviderError> {
        if let Some(session) = &self.granted {
            return Ok(Some(session.clone()));
        }

        let access = self.cookie_value(&self.settings.access_name);
        let refresh = self.cookie_value(&self.settings.refresh_name);

        if let Some(access_token) = access {
            let expires_at = token::expires_at(&access_token);
            let fresh = expires_at.is_some_and(|exp| exp - EXPIRY_MARGIN_SECS > Utc::now().timestamp());
            if fresh || refresh.is_none() {
                return Ok(Some(Session { access_token, refresh_token: refresh, expires_at }));
            }
        }

        let Some(refresh_token) = refresh else {
            return Ok(None);
        };

        let provider = self.provider.clone();
        match bounded(self.timeout, provider.refresh_session(&refresh_token)).await {
            Ok(grant) => {
                tracing::debug!("Session refreshed");
                Ok(Some(self.store_grant(grant)))
            }
            Err(err) => {
                // A refused refresh token is dead for good; an unreachable
                // provider says nothing about it, so keep the cookies.
                if err.is_rejection() {
                    self.clear_session();
                }
                Err(err)
            }
        }
    }

    fn store_grant(&mut self, grant: TokenGrant) -> Session {
        let mut session = Session::from(grant);
        if session.expires_at.is_none() {
            session.expires_at = token::expires_at(&session.access_token);
        }

        let refresh = session.refresh_token.as_deref().unwrap_or_default();
        let cookies = vec![
            self.settings.build(&self.settings.access_name, &session.access_token),
            self.settings.build(&self.settings.refresh_name, refresh),
        ];
        self.persist(cookies);
        self.granted = Some(session.clone());
        session
    }

    fn clear_session(&mut self) {
        let cookies = vec![
            self.settings.removal(&self.settings.access_name),
            self.settings.removal(&self.settings.refresh_name),
        ];
        self.persist(cookies);
        self.granted = None;
    }

    /// Request side first: later reads in this pass must see the new values.
    fn persist(&mut self, cookies: Vec<Cookie<'static>>) {
        self.cookies.set_all_on_request(&cookies);
        self.cookies.set_all_on_response(&cookies);
    }

    fn cookie_value(&self, name: &str) -> Option<String> {
        self.cookies
            .get_all()
            .into_iter()
            .find(|c| c.name() == name && !c.value().is_empty())
            .map(|c| c.value().to_owned())
    }
}

/// A provider call that outlives `limit` counts as a provider failure.
async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| ProviderError::Timeout(limit))?
}

#[async_trait]
impl<C: CookieAdapter + Send> SessionSource for SessionClient<C> {
    async fn get_session(&mut self) -> Result<Option<Session>, ProviderError> {
        self.current_session().await
    }
}
