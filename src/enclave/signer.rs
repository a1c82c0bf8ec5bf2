// Strongbox — Token signing
//
// Compact HS256 tokens: base64url(header) "." base64url(claims) "." base64url(mac)
// where mac = HMAC-SHA256(secret, header "." claims). The layout is the JWT
// compact serialization, so tokens are readable by standard tooling.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::EnclaveError;

type HmacSha256 = Hmac<Sha256>;

/// Minimum accepted signing secret length in bytes (256 bits).
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

const ALG: &str = "HS256";

/// Signs and verifies claim sets with a symmetric secret.
pub struct TokenSigner {
    secret: Zeroizing<Vec<u8>>,
}

impl TokenSigner {
    pub fn new(secret: Zeroizing<Vec<u8>>) -> Result<Self, EnclaveError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(EnclaveError::WeakSecret(secret.len(), MIN_SECRET_LEN));
        }
        Ok(Self { secret })
    }

    fn mac(&self) -> Result<HmacSha256, EnclaveError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| EnclaveError::Signing(format!("invalid HMAC key: {}", e)))
    }

    /// Serialize and sign a claim set.
    pub fn sign<C: Serialize>(&self, claims: &C) -> Result<String, EnclaveError> {
        let header = Header {
            alg: ALG.to_string(),
            typ: "JWT".to_string(),
        };
        let header_json = serde_json::to_vec(&header)
            .map_err(|e| EnclaveError::Signing(format!("header encoding failed: {}", e)))?;
        let claims_json = serde_json::to_vec(claims)
            .map_err(|e| EnclaveError::Signing(format!("claims encoding failed: {}", e)))?;

        let mut token = URL_SAFE_NO_PAD.encode(header_json);
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(claims_json));

        let mut mac = self.mac()?;
        mac.update(token.as_bytes());
        let signature = mac.finalize().into_bytes();

        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(signature));
        Ok(token)
    }

    /// Verify the signature and decode the claim set.
    ///
    /// Expiry is not checked here; that belongs to the caller, which knows
    /// which claims it expects.
    pub fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, EnclaveError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(EnclaveError::MalformedToken);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| EnclaveError::MalformedToken)?;

        // Signed portion is everything before the last '.'
        let signed_len = header_b64.len() + 1 + claims_b64.len();
        let mut mac = self.mac()?;
        mac.update(&token.as_bytes()[..signed_len]);
        mac.verify_slice(&signature)
            .map_err(|_| EnclaveError::BadSignature)?;

        let header: Header = URL_SAFE_NO_PAD
            .decode(header_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(EnclaveError::MalformedToken)?;
        if header.alg != ALG {
            return Err(EnclaveError::MalformedToken);
        }

        URL_SAFE_NO_PAD
            .decode(claims_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(EnclaveError::MalformedToken)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestClaims {
        user: String,
        exp: i64,
    }

    fn signer(byte: u8) -> TokenSigner {
        TokenSigner::new(Zeroizing::new(vec![byte; MIN_SECRET_LEN])).unwrap()
    }

    fn claims() -> TestClaims {
        TestClaims {
            user: "foo".to_string(),
            exp: 1_900_000_000,
        }
    }

    #[test]
    fn test_sign_then_verify() {
        let signer = signer(7);
        let token = signer.sign(&claims()).unwrap();
        assert_eq!(token.split('.').count(), 3);
        let decoded: TestClaims = signer.verify(&token).unwrap();
        assert_eq!(decoded, claims());
    }

    #[test]
    fn test_other_secret_fails_verification() {
        let token = signer(1).sign(&claims()).unwrap();
        let result: Result<TestClaims, _> = signer(2).verify(&token);
        assert!(matches!(result, Err(EnclaveError::BadSignature)));
    }

    #[test]
    fn test_tampered_claims_fail_verification() {
        let signer = signer(3);
        let token = signer.sign(&claims()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = URL_SAFE_NO_PAD.encode(br#"{"user":"admin","exp":1900000000}"#);
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);
        let result: Result<TestClaims, _> = signer.verify(&tampered);
        assert!(matches!(result, Err(EnclaveError::BadSignature)));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let signer = signer(4);
        for token in ["", "abc", "a.b", "a.b.c.d", "a.b.!!!"] {
            let result: Result<TestClaims, _> = signer.verify(token);
            assert!(result.is_err(), "{:?} must not verify", token);
        }
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = TokenSigner::new(Zeroizing::new(vec![0u8; 8]));
        assert!(matches!(result, Err(EnclaveError::WeakSecret(8, MIN_SECRET_LEN))));
    }
}
