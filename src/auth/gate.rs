// Strongbox — Authentication gate
//
// Turns a password pair or a bearer token into a verified identity. Every
// authentication failure leaves here as `AuthError::Unauthenticated`: a
// caller cannot tell a malformed token from an expired, revoked, or orphaned
// one. Engine failures are the exception and surface as internal errors.

use super::tokens::{Claims, TokenPair, TokenService};
use super::AuthError;
use crate::store::{CredentialStore, Identity};

pub struct AuthGate<'a> {
    credentials: &'a dyn CredentialStore,
    tokens: &'a TokenService<'a>,
}

impl<'a> AuthGate<'a> {
    pub fn new(credentials: &'a dyn CredentialStore, tokens: &'a TokenService<'a>) -> Self {
        Self {
            credentials,
            tokens,
        }
    }

    /// Verify a name/password pair and open a session.
    pub fn login(&self, name: &str, password: &str) -> Result<(Identity, TokenPair), AuthError> {
        let identity = self
            .credentials
            .authenticate(name, password)
            .map_err(|e| AuthError::from(e).collapse())?;
        let pair = self.tokens.issue(&identity.name)?;

        tracing::info!(name = %identity.name, "Login succeeded");
        Ok((identity, pair))
    }

    /// Resolve a bearer token (access or refresh) to its identity.
    pub fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        self.resolve_claims(token).map(|(identity, _)| identity)
    }

    /// Like [`AuthGate::resolve`], but only admins pass.
    pub fn resolve_admin(&self, token: &str) -> Result<Identity, AuthError> {
        let identity = self.resolve(token)?;
        if !identity.is_admin {
            return Err(AuthError::Forbidden(format!(
                "'{}' is not an admin",
                identity.name
            )));
        }
        Ok(identity)
    }

    /// Exchange a refresh token for a new pair, retiring the old one.
    pub fn refresh(&self, refresh_token: &str) -> Result<(Identity, TokenPair), AuthError> {
        let (identity, claims) = self.resolve_claims(refresh_token)?;
        let pair = self
            .tokens
            .rotate(&claims)
            .map_err(AuthError::collapse)?;
        Ok((identity, pair))
    }

    /// End the session anchored by `refresh_token`.
    pub fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self.tokens.parse(refresh_token).map_err(AuthError::collapse)?;
        self.tokens
            .revoke_token(&claims)
            .map_err(AuthError::collapse)?;

        tracing::info!(name = %claims.user, "Logged out");
        Ok(())
    }

    fn resolve_claims(&self, token: &str) -> Result<(Identity, Claims), AuthError> {
        let claims = self.tokens.parse(token).map_err(AuthError::collapse)?;

        if let Some(token_id) = &claims.jti {
            if self.tokens.is_revoked(token_id).map_err(AuthError::collapse)? {
                return Err(AuthError::Unauthenticated);
            }
        }

        let identity = self
            .credentials
            .get(&claims.user)?
            .ok_or(AuthError::Unauthenticated)?;
        Ok((identity, claims))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enclave::{Argon2Hasher, TokenSigner};
    use crate::store::{Database, KvCredentialStore, NewIdentity};
    use chrono::Duration;
    use zeroize::Zeroizing;

    struct Fixture {
        db: Database,
        hasher: Argon2Hasher,
        signer: TokenSigner,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                db: Database::open_in_memory().unwrap(),
                hasher: Argon2Hasher::fast(),
                signer: TokenSigner::new(Zeroizing::new(vec![3u8; 32])).unwrap(),
            }
        }
    }

    macro_rules! gate {
        ($fx:expr, $creds:ident, $tokens:ident, $gate:ident) => {
            let $creds = KvCredentialStore::new(&$fx.db, &$fx.hasher);
            let $tokens =
                TokenService::new(&$fx.db, &$fx.signer, Duration::minutes(15), Duration::days(7));
            let $gate = AuthGate::new(&$creds, &$tokens);
        };
    }

    #[test]
    fn test_login_then_resolve() {
        let fx = Fixture::new();
        gate!(fx, creds, tokens, gate);
        creds.create(NewIdentity::new("foo", "hgEiPCZP", false)).unwrap();

        let (identity, pair) = gate.login("foo", "hgEiPCZP").unwrap();
        assert_eq!(identity.name, "foo");
        assert_eq!(gate.resolve(&pair.access_token).unwrap().name, "foo");
        assert_eq!(gate.resolve(&pair.refresh_token).unwrap().name, "foo");
    }

    #[test]
    fn test_login_failures_are_indistinguishable() {
        let fx = Fixture::new();
        gate!(fx, creds, tokens, gate);
        creds.create(NewIdentity::new("foo", "hgEiPCZP", false)).unwrap();

        assert!(matches!(gate.login("foo", "wrongpass"), Err(AuthError::Unauthenticated)));
        assert!(matches!(gate.login("nobody", "hgEiPCZP"), Err(AuthError::Unauthenticated)));
    }

    #[test]
    fn test_resolve_rejects_bad_and_orphaned_tokens() {
        let fx = Fixture::new();
        gate!(fx, creds, tokens, gate);
        creds.create(NewIdentity::new("foo", "hgEiPCZP", false)).unwrap();
        let (_, pair) = gate.login("foo", "hgEiPCZP").unwrap();

        assert!(matches!(gate.resolve("not.a.token"), Err(AuthError::Unauthenticated)));

        creds.delete("foo").unwrap();
        assert!(matches!(gate.resolve(&pair.access_token), Err(AuthError::Unauthenticated)));
    }

    #[test]
    fn test_revoked_identifier_fails_resolution() {
        let fx = Fixture::new();
        gate!(fx, creds, tokens, gate);
        creds.create(NewIdentity::new("foo", "hgEiPCZP", false)).unwrap();
        let (_, pair) = gate.login("foo", "hgEiPCZP").unwrap();

        gate.logout(&pair.refresh_token).unwrap();
        assert!(matches!(gate.resolve(&pair.refresh_token), Err(AuthError::Unauthenticated)));
        assert!(matches!(gate.refresh(&pair.refresh_token), Err(AuthError::Unauthenticated)));
    }

    #[test]
    fn test_refresh_rotates_and_replay_fails() {
        let fx = Fixture::new();
        gate!(fx, creds, tokens, gate);
        creds.create(NewIdentity::new("foo", "hgEiPCZP", false)).unwrap();
        let (_, first) = gate.login("foo", "hgEiPCZP").unwrap();

        let (identity, second) = gate.refresh(&first.refresh_token).unwrap();
        assert_eq!(identity.name, "foo");
        assert_eq!(gate.resolve(&second.access_token).unwrap().name, "foo");

        assert!(matches!(gate.refresh(&first.refresh_token), Err(AuthError::Unauthenticated)));
        assert!(gate.refresh(&second.refresh_token).is_ok());
    }

    #[test]
    fn test_access_token_cannot_refresh() {
        let fx = Fixture::new();
        gate!(fx, creds, tokens, gate);
        creds.create(NewIdentity::new("foo", "hgEiPCZP", false)).unwrap();
        let (_, pair) = gate.login("foo", "hgEiPCZP").unwrap();

        assert!(matches!(gate.refresh(&pair.access_token), Err(AuthError::Unauthenticated)));
        assert!(matches!(gate.logout(&pair.access_token), Err(AuthError::Unauthenticated)));
    }

    #[test]
    fn test_resolve_admin() {
        let fx = Fixture::new();
        gate!(fx, creds, tokens, gate);
        creds.create(NewIdentity::new("root", "password1", true)).unwrap();
        creds.create(NewIdentity::new("user", "password1", false)).unwrap();

        let (_, admin) = gate.login("root", "password1").unwrap();
        let (_, user) = gate.login("user", "password1").unwrap();

        assert!(gate.resolve_admin(&admin.access_token).unwrap().is_admin);
        assert!(matches!(gate.resolve_admin(&user.access_token), Err(AuthError::Forbidden(_))));
        assert!(matches!(gate.resolve_admin("junk"), Err(AuthError::Unauthenticated)));
    }
}
