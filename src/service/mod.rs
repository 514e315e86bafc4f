//! Authentication service.
//!
//! Drives an identity through `PendingConfirmation -> Confirmed` and owns
//! every write to its refresh token. The directory is the only source of
//! truth; the session cache is invalidated after each mutation.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::{Configuration, Token as TokenConfig};
use crate::crypto::PasswordHasher;
use crate::domain::{EmailAddress, Identity, invalid_field};
use crate::dto::{Credentials, NewPassword};
use crate::error::{AuthError, Result};
use crate::ports::{CachePort, NotificationKind, Notifier, UserDirectory};
use crate::session::SessionCache;
use crate::telemetry::{self, Event};
use crate::token::{Scope, TOKEN_TYPE, TokenCodec, TokenPair};


struct Inner {
    directory: Arc<dyn UserDirectory>,
    cache: SessionCache,
    notifier: Arc<dyn Notifier>,
    hasher: PasswordHasher,
    codec: TokenCodec,
    token: TokenConfig,
    base_url: String,
    notify_timeout: Duration,
}

/// Handle on the authentication service. Cheap to clone.
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<Inner>,
}

impl AuthService {
    /// Create a new [`AuthService`].
    pub fn new(
        config: &Configuration,
        directory: Arc<dyn UserDirectory>,
        cache: Arc<dyn CachePort>,
        notifier: Arc<dyn Notifier>,
        hasher: PasswordHasher,
        codec: TokenCodec,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                directory,
                cache: SessionCache::new(cache, &config.cache),
                notifier,
                hasher,
                codec,
                token: config.token.clone(),
                base_url: config.url.clone(),
                notify_timeout: config.notify_timeout(),
            }),
        }
    }

    /// Register a new identity and send its confirmation link.
    pub async fn signup(&self, credentials: &Credentials) -> Result<Identity> {
        let result = self.create_identity(credentials).await;
        telemetry::record(Event::Signup, &result);
        result
    }

    async fn create_identity(
        &self,
        credentials: &Credentials,
    ) -> Result<Identity> {
        let (email, password) = credentials.parse()?;
        let this = &self.inner;

        if this.directory.get_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict);
        }

        let hash = this.hasher.hash(&password)?;
        let identity = this.directory.create_user(&email, &hash).await?;
        tracing::info!(id = %identity.id, "identity created");

        self.notify(NotificationKind::ConfirmEmail, &identity.email)
            .await?;

        Ok(identity)
    }

    /// Exchange credentials for a token pair.
    ///
    /// Credentials are checked before the confirmation state, so an
    /// unconfirmed account is only revealed to its owner.
    pub async fn signin(&self, credentials: &Credentials) -> Result<TokenPair> {
        let result = self.authenticate(credentials).await;
        telemetry::record(Event::Signin, &result);
        result
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<TokenPair> {
        let (email, password) = credentials.parse()?;
        let this = &self.inner;

        let identity = match this.directory.get_by_email(&email).await? {
            Some(identity)
                if this.hasher.verify(&password, &identity.password_hash) =>
            {
                identity
            },
            _ => return Err(AuthError::InvalidCredentials),
        };

        if !identity.is_confirmed {
            return Err(AuthError::EmailNotConfirmed);
        }

        let pair = self.issue_pair(&identity.email)?;
        this.directory
            .set_refresh_token(identity.id, Some(&pair.refresh_token))
            .await?;
        this.cache.invalidate(&identity.email).await;

        Ok(pair)
    }

    /// Rotate a refresh token.
    ///
    /// Presenting a token that is no longer the stored one revokes the
    /// stored token as well.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let result = self.rotate(refresh_token).await;
        telemetry::record(Event::Refresh, &result);
        result
    }

    async fn rotate(&self, refresh_token: &str) -> Result<TokenPair> {
        let this = &self.inner;
        let email = self.subject(refresh_token, Scope::Refresh)?;

        let Some(identity) = this.directory.get_by_email(&email).await? else {
            return Err(AuthError::Unauthorized);
        };

        let pair = self.issue_pair(&identity.email)?;
        let swapped = this
            .directory
            .swap_refresh_token(
                identity.id,
                refresh_token,
                Some(&pair.refresh_token),
            )
            .await?;

        if !swapped {
            tracing::warn!(id = %identity.id, "refresh token reused, revoking session");
            this.directory.set_refresh_token(identity.id, None).await?;
            this.cache.invalidate(&identity.email).await;
            return Err(AuthError::Unauthorized);
        }

        this.cache.invalidate(&identity.email).await;
        Ok(pair)
    }

    /// Confirm the email address carried by an email-action token.
    ///
    /// Confirming twice is a no-op.
    pub async fn confirm_email(&self, token: &str) -> Result<()> {
        let result = self.confirm(token).await;
        telemetry::record(Event::ConfirmEmail, &result);
        result
    }

    async fn confirm(&self, token: &str) -> Result<()> {
        let this = &self.inner;
        let email = self.subject(token, Scope::EmailAction)?;

        let Some(identity) = this.directory.get_by_email(&email).await? else {
            return Err(AuthError::Unauthorized);
        };

        if identity.is_confirmed {
            return Ok(());
        }

        this.directory.set_confirmed(identity.id).await?;
        this.cache.invalidate(&identity.email).await;
        tracing::info!(id = %identity.id, "email confirmed");

        Ok(())
    }

    /// Send a new confirmation link.
    ///
    /// Succeeds silently for unknown and already confirmed addresses.
    pub async fn request_email_confirmation(&self, email: &str) -> Result<()> {
        let email = EmailAddress::parse(email)?;

        match self.inner.directory.get_by_email(&email).await? {
            Some(identity) if !identity.is_confirmed => {
                self.notify(NotificationKind::ConfirmEmail, &identity.email)
                    .await
            },
            Some(_) => Ok(()),
            None => {
                tracing::debug!("confirmation requested for unknown email");
                Ok(())
            },
        }
    }

    /// Send a password reset link to a confirmed identity.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let email = EmailAddress::parse(email)?;

        match self.inner.directory.get_by_email(&email).await? {
            Some(identity) if identity.is_confirmed => {
                self.notify(NotificationKind::ResetPassword, &identity.email)
                    .await
            },
            _ => Err(AuthError::InvalidState),
        }
    }

    /// Replace the password of the identity carried by an email-action token.
    ///
    /// The stored refresh token is cleared, ending every open session.
    pub async fn reset_password(
        &self,
        token: &str,
        password: &NewPassword,
    ) -> Result<()> {
        let result = self.replace_password(token, password).await;
        telemetry::record(Event::PasswordReset, &result);
        result
    }

    async fn replace_password(
        &self,
        token: &str,
        password: &NewPassword,
    ) -> Result<()> {
        let this = &self.inner;
        let email = self.subject(token, Scope::EmailAction)?;
        let password = password.parse()?;

        let identity = match this.directory.get_by_email(&email).await? {
            Some(identity) if identity.is_confirmed => identity,
            _ => return Err(AuthError::Unauthorized),
        };

        let hash = this.hasher.hash(&password)?;
        this.directory.set_password(identity.id, &hash).await?;
        this.directory.set_refresh_token(identity.id, None).await?;
        this.cache.invalidate(&identity.email).await;
        tracing::info!(id = %identity.id, "password reset");

        Ok(())
    }

    /// Resolve the identity behind an access token.
    ///
    /// A cached snapshot is served as is until it expires. The returned
    /// identity never carries the refresh token.
    pub async fn resolve_current_user(&self, access_token: &str) -> Result<Identity> {
        let this = &self.inner;
        let email = self.subject(access_token, Scope::Access)?;

        if let Some(identity) = this.cache.get(&email).await {
            return Ok(identity);
        }

        let Some(identity) = this.directory.get_by_email(&email).await? else {
            return Err(AuthError::Unauthorized);
        };

        let identity = identity.redacted();
        this.cache.put(&email, &identity).await;
        Ok(identity)
    }

    /// Clear the refresh token of an authenticated identity.
    pub async fn signout(&self, identity: &Identity) -> Result<()> {
        let this = &self.inner;
        let result = this.directory.set_refresh_token(identity.id, None).await;
        telemetry::record(Event::Signout, &result);
        result?;

        this.cache.invalidate(&identity.email).await;
        Ok(())
    }

    /// Set the avatar of an authenticated identity and return the updated
    /// record, without its refresh token.
    pub async fn update_avatar(
        &self,
        identity: &Identity,
        avatar: &str,
    ) -> Result<Identity> {
        let this = &self.inner;
        let url = match Url::parse(avatar) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => {
                return Err(AuthError::Validation(invalid_field(
                    "avatar",
                    "url",
                    "Avatar must be an HTTP(S) URL.",
                )));
            },
        };

        this.directory.set_avatar(identity.id, url.as_str()).await?;
        this.cache.invalidate(&identity.email).await;

        let Some(updated) = this.directory.get_by_id(identity.id).await? else {
            return Err(AuthError::Unauthorized);
        };
        let updated = updated.redacted();
        this.cache.put(&updated.email, &updated).await;

        Ok(updated)
    }

    /// Decode a token and return its subject.
    ///
    /// Every rejection reason collapses into [`AuthError::Unauthorized`].
    fn subject(&self, token: &str, scope: Scope) -> Result<EmailAddress> {
        let claims = self.inner.codec.decode(token, scope).map_err(|err| {
            tracing::debug!(%err, ?scope, "token rejected");
            AuthError::Unauthorized
        })?;

        EmailAddress::parse(claims.sub).map_err(|_| AuthError::Unauthorized)
    }

    fn issue_pair(&self, email: &EmailAddress) -> Result<TokenPair> {
        let this = &self.inner;
        Ok(TokenPair {
            access_token: this.codec.issue(
                email.as_str(),
                Scope::Access,
                this.token.access_ttl,
            )?,
            refresh_token: this.codec.issue(
                email.as_str(),
                Scope::Refresh,
                this.token.refresh_ttl,
            )?,
            token_type: TOKEN_TYPE.to_owned(),
        })
    }

    /// Issue an email-action token and hand it to the notifier.
    ///
    /// Delivery errors are logged and never returned.
    async fn notify(
        &self,
        kind: NotificationKind,
        email: &EmailAddress,
    ) -> Result<()> {
        let this = &self.inner;
        let token = this.codec.issue(
            email.as_str(),
            Scope::EmailAction,
            this.token.email_ttl,
        )?;

        // Later, we should handle error with retries.
        let send = this.notifier.send(kind, email, &token, &this.base_url);
        match tokio::time::timeout(this.notify_timeout, send).await {
            Ok(Ok(())) => {},
            Ok(Err(err)) => {
                tracing::warn!(%err, ?kind, "notification not delivered");
                telemetry::record_notification_failure();
            },
            Err(_) => {
                tracing::warn!(?kind, "notification timed out");
                telemetry::record_notification_failure();
            },
        }

        Ok(())
    }
}
