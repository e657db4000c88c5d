//! Capability-link signing and validation.
//!
//! The `LinkSigner` mints and validates signed, time-limited capability
//! tokens. The wire format is `{version}.{payload_b64}.{sig_b64}` with a
//! canonical JSON payload, an HMAC-SHA256 tag under the configured secret and
//! URL-safe base64 throughout. Signature verification is constant-time.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

use crate::config::Config;
use crate::constants::{crypto, token, windows};
use crate::core::errors::WardenError;
use crate::core::models::{AccessType, TokenPayload};
use crate::utils::time::Clock;

type HmacSha256 = Hmac<Sha256>;

/// A minted capability link.
#[derive(Debug, Clone)]
pub struct MintedLink {
    pub url: String,
    pub token: String,
    pub expires_at: i64,
}

pub struct LinkSigner {
    secret: [u8; crypto::SECRET_KEY_LENGTH],
    clock: Clock,
    default_lifetime_days: u32,
    max_lifetime_days: u32,
}

impl LinkSigner {
    pub fn new(secret: [u8; crypto::SECRET_KEY_LENGTH], clock: Clock) -> Self {
        Self {
            secret,
            clock,
            default_lifetime_days: token::DEFAULT_LIFETIME_DAYS,
            max_lifetime_days: token::MAX_LIFETIME_DAYS,
        }
    }

    /// Create a signer with a secure random ephemeral key. Tokens minted by
    /// an ephemeral signer do not survive a process restart.
    pub fn ephemeral(clock: Clock) -> Result<Self, WardenError> {
        let rng = SystemRandom::new();
        let mut secret = [0u8; crypto::SECRET_KEY_LENGTH];
        rng.fill(&mut secret)
            .map_err(|_| WardenError::Internal("failed to generate signing key".to_string()))?;
        Ok(Self::new(secret, clock))
    }

    /// Build a signer from configuration: the configured secret string is
    /// stretched to key length with SHA-256, and the configured algorithm
    /// name must match the one this build implements.
    pub fn from_config(config: &Config, clock: Clock) -> Result<Self, WardenError> {
        if !config
            .signing_algorithm
            .eq_ignore_ascii_case(crypto::SIGNING_ALGORITHM)
        {
            return Err(WardenError::Validation(format!(
                "unsupported signing algorithm '{}'",
                config.signing_algorithm
            )));
        }
        let mut signer = match &config.signing_secret {
            Some(secret) => {
                let digest = Sha256::digest(secret.expose_secret().as_bytes());
                let mut key = [0u8; crypto::SECRET_KEY_LENGTH];
                key.copy_from_slice(&digest);
                Self::new(key, clock)
            }
            None => Self::ephemeral(clock)?,
        };
        signer.default_lifetime_days = config.default_token_lifetime_days;
        signer.max_lifetime_days = config.max_token_lifetime_days;
        Ok(signer)
    }

    /// Mint a signed capability URL. `expiry_days = None` applies the default
    /// lifetime; anything above the configured cap is rejected.
    #[allow(clippy::too_many_arguments)]
    pub fn mint(
        &self,
        report_id: &str,
        user_id: &str,
        purchase_id: Option<&str>,
        base_url: &str,
        expiry_days: Option<u32>,
        access_type: AccessType,
        metadata: BTreeMap<String, String>,
    ) -> Result<String, WardenError> {
        let days = expiry_days.unwrap_or(self.default_lifetime_days);
        if days > self.max_lifetime_days {
            return Err(WardenError::Validation(format!(
                "expiry_days {} exceeds maximum {}",
                days, self.max_lifetime_days
            )));
        }
        let link = self.mint_with_lifetime(
            report_id,
            user_id,
            purchase_id,
            base_url,
            i64::from(days) * windows::DAY_SECS,
            access_type,
            metadata,
        )?;
        Ok(link.url)
    }

    /// Mint with an explicit lifetime in seconds. Used by callers that work
    /// in hours rather than whole days.
    #[allow(clippy::too_many_arguments)]
    pub fn mint_with_lifetime(
        &self,
        report_id: &str,
        user_id: &str,
        purchase_id: Option<&str>,
        base_url: &str,
        lifetime_secs: i64,
        access_type: AccessType,
        metadata: BTreeMap<String, String>,
    ) -> Result<MintedLink, WardenError> {
        if lifetime_secs <= 0 {
            return Err(WardenError::Validation(
                "token lifetime must be positive".to_string(),
            ));
        }
        if lifetime_secs > i64::from(self.max_lifetime_days) * windows::DAY_SECS {
            return Err(WardenError::Validation(format!(
                "token lifetime {}s exceeds maximum {} days",
                lifetime_secs, self.max_lifetime_days
            )));
        }

        let expires_at = self.clock.now_unix() + lifetime_secs;
        let payload = TokenPayload {
            report_id: report_id.to_string(),
            user_id: user_id.to_string(),
            purchase_id: purchase_id.map(str::to_string),
            expires_at,
            access_type,
            metadata,
            exp: expires_at,
        };
        let token = self.encode(&payload)?;
        Ok(MintedLink {
            url: format!("{}?token={}", base_url, token),
            token,
            expires_at,
        })
    }

    fn encode(&self, payload: &TokenPayload) -> Result<String, WardenError> {
        let payload_bytes = serde_json::to_vec(payload)
            .map_err(|e| WardenError::Internal(format!("failed to serialize payload: {}", e)))?;
        let tag = self.sign_bytes(&payload_bytes)?;
        Ok(format!(
            "{}.{}.{}",
            token::FORMAT_VERSION,
            URL_SAFE_NO_PAD.encode(&payload_bytes),
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }

    /// Validate a token: format, signature, expiry-claim agreement, then
    /// wall-clock expiry. The signature is verified over the exact received
    /// payload bytes; `expires_at` is checked against the shared clock
    /// independently of the embedded `exp` mirror.
    pub fn validate(&self, presented: &str) -> Result<TokenPayload, WardenError> {
        let parts: Vec<&str> = presented.split('.').collect();
        if parts.len() != 3 {
            return Err(WardenError::InvalidToken("malformed token".to_string()));
        }
        if parts[0] != token::FORMAT_VERSION {
            return Err(WardenError::InvalidToken(format!(
                "unsupported token version '{}'",
                parts[0]
            )));
        }

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| WardenError::InvalidToken("payload is not valid base64".to_string()))?;
        let provided_sig = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| WardenError::InvalidToken("signature is not valid base64".to_string()))?;

        let mut mac = self.mac()?;
        mac.update(&payload_bytes);
        mac.verify_slice(&provided_sig)
            .map_err(|_| WardenError::InvalidToken("signature mismatch".to_string()))?;

        let payload: TokenPayload = serde_json::from_slice(&payload_bytes)
            .map_err(|_| WardenError::InvalidToken("payload is not valid JSON".to_string()))?;

        if payload.exp != payload.expires_at {
            return Err(WardenError::InvalidToken(
                "expiry claim mismatch".to_string(),
            ));
        }
        if payload.expires_at <= self.clock.now_unix() {
            return Err(WardenError::ExpiredToken);
        }
        Ok(payload)
    }

    /// Append tracking parameters and a short keyed signature over the sorted
    /// query set. Tracking links are a lower-stakes surface: the signature
    /// detects tampering but authorizes nothing.
    pub fn sign_tracking_params(
        &self,
        url: &str,
        user_id: &str,
        campaign_id: &str,
        link_type: &str,
    ) -> Result<String, WardenError> {
        let mut parsed = Url::parse(url)
            .map_err(|e| WardenError::Validation(format!("invalid url: {}", e)))?;
        parsed
            .query_pairs_mut()
            .append_pair("user_id", user_id)
            .append_pair("campaign_id", campaign_id)
            .append_pair("link_type", link_type);

        let canonical = Self::canonical_query(&parsed);
        let tag = self.sign_bytes(canonical.as_bytes())?;
        let sig = hex::encode(&tag[..crypto::TRACKING_SIG_BYTES]);
        parsed.query_pairs_mut().append_pair("sig", &sig);
        Ok(parsed.to_string())
    }

    /// Verify a tracking-link signature. Returns false for missing, short or
    /// mismatched signatures and for unparseable URLs.
    pub fn verify_tracking_params(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(_) => return false,
        };
        let sig_hex = match parsed.query_pairs().find(|(k, _)| k == "sig") {
            Some((_, v)) => v.into_owned(),
            None => return false,
        };
        let provided = match hex::decode(&sig_hex) {
            Ok(b) if b.len() == crypto::TRACKING_SIG_BYTES => b,
            _ => return false,
        };

        let mut unsigned = parsed.clone();
        unsigned.query_pairs_mut().clear();
        {
            let mut qp = unsigned.query_pairs_mut();
            for (k, v) in parsed.query_pairs().filter(|(k, _)| k != "sig") {
                qp.append_pair(&k, &v);
            }
        }
        let canonical = Self::canonical_query(&unsigned);

        let mut mac = match self.mac() {
            Ok(m) => m,
            Err(_) => return false,
        };
        mac.update(canonical.as_bytes());
        mac.verify_truncated_left(&provided).is_ok()
    }

    fn canonical_query(url: &Url) -> String {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();
        pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn mac(&self) -> Result<HmacSha256, WardenError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| WardenError::Internal(format!("failed to key MAC: {}", e)))
    }

    fn sign_bytes(&self, data: &[u8]) -> Result<Vec<u8>, WardenError> {
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer_at(now: i64) -> LinkSigner {
        LinkSigner::new([7u8; crypto::SECRET_KEY_LENGTH], Clock::fixed(now))
    }

    fn token_from_url(url: &str) -> String {
        url.split("token=").nth(1).unwrap().to_string()
    }

    #[test]
    fn mint_then_validate_round_trips() {
        let signer = signer_at(1_700_000_000);
        let mut metadata = BTreeMap::new();
        metadata.insert("source".to_string(), "email".to_string());
        let url = signer
            .mint(
                "rep-9",
                "user-3",
                Some("pur-44"),
                "https://reports.example.com/dl",
                Some(7),
                AccessType::Download,
                metadata.clone(),
            )
            .unwrap();
        assert!(url.starts_with("https://reports.example.com/dl?token="));

        let payload = signer.validate(&token_from_url(&url)).unwrap();
        assert_eq!(payload.report_id, "rep-9");
        assert_eq!(payload.user_id, "user-3");
        assert_eq!(payload.purchase_id.as_deref(), Some("pur-44"));
        assert_eq!(payload.access_type, AccessType::Download);
        assert_eq!(payload.metadata, metadata);
        assert_eq!(payload.expires_at, 1_700_000_000 + 7 * 86_400);
        assert_eq!(payload.exp, payload.expires_at);
    }

    #[test]
    fn validation_is_idempotent() {
        let signer = signer_at(1_700_000_000);
        let url = signer
            .mint(
                "rep-1",
                "user-1",
                None,
                "https://x.test",
                None,
                AccessType::View,
                BTreeMap::new(),
            )
            .unwrap();
        let token = token_from_url(&url);
        let first = signer.validate(&token).unwrap();
        let second = signer.validate(&token).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn mint_rejects_lifetime_over_cap() {
        let signer = signer_at(1_700_000_000);
        let err = signer
            .mint(
                "rep-1",
                "user-1",
                None,
                "https://x.test",
                Some(31),
                AccessType::View,
                BTreeMap::new(),
            )
            .unwrap_err();
        assert!(matches!(err, WardenError::Validation(_)));
    }

    #[test]
    fn token_expires_once_clock_passes_lifetime() {
        let clock = Clock::fixed(1_700_000_000);
        let signer = LinkSigner::new([7u8; crypto::SECRET_KEY_LENGTH], clock.clone());
        let url = signer
            .mint(
                "rep-1",
                "user-1",
                None,
                "https://x.test",
                Some(2),
                AccessType::View,
                BTreeMap::new(),
            )
            .unwrap();
        let token = token_from_url(&url);

        assert!(signer.validate(&token).is_ok());
        clock.advance(2 * 86_400 + 1);
        assert!(matches!(
            signer.validate(&token),
            Err(WardenError::ExpiredToken)
        ));
    }

    #[test]
    fn tampered_payload_fails_signature_check() {
        let signer = signer_at(1_700_000_000);
        let url = signer
            .mint(
                "rep-1",
                "user-1",
                None,
                "https://x.test",
                None,
                AccessType::View,
                BTreeMap::new(),
            )
            .unwrap();
        let token = token_from_url(&url);
        let parts: Vec<&str> = token.split('.').collect();

        // Forge a payload claiming a different user.
        let mut payload: TokenPayload =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        payload.user_id = "attacker".to_string();
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap()),
            parts[2]
        );
        assert!(matches!(
            signer.validate(&forged),
            Err(WardenError::InvalidToken(_))
        ));
    }

    #[test]
    fn wrong_key_fails_validation() {
        let signer = signer_at(1_700_000_000);
        let other = LinkSigner::new(rand::random(), Clock::fixed(1_700_000_000));
        let url = signer
            .mint(
                "rep-1",
                "user-1",
                None,
                "https://x.test",
                None,
                AccessType::View,
                BTreeMap::new(),
            )
            .unwrap();
        assert!(matches!(
            other.validate(&token_from_url(&url)),
            Err(WardenError::InvalidToken(_))
        ));
    }

    #[test]
    fn garbage_tokens_are_invalid_not_panics() {
        let signer = signer_at(1_700_000_000);
        for junk in ["", "a.b", "v2.x.y", "v1.!!!.sig", "v1.e30.%%%"] {
            assert!(matches!(
                signer.validate(junk),
                Err(WardenError::InvalidToken(_))
            ));
        }
    }

    #[test]
    fn mismatched_exp_mirror_is_rejected() {
        let signer = signer_at(1_700_000_000);
        let payload = TokenPayload {
            report_id: "rep-1".to_string(),
            user_id: "user-1".to_string(),
            purchase_id: None,
            expires_at: 1_700_000_000 + 86_400,
            access_type: AccessType::View,
            metadata: BTreeMap::new(),
            exp: 1_700_000_000 + 2 * 86_400,
        };
        let token = signer.encode(&payload).unwrap();
        assert!(matches!(
            signer.validate(&token),
            Err(WardenError::InvalidToken(_))
        ));
    }

    #[test]
    fn tracking_signature_round_trips_and_detects_tampering() {
        let signer = signer_at(1_700_000_000);
        let signed = signer
            .sign_tracking_params(
                "https://example.com/r?ref=newsletter",
                "user-1",
                "summer",
                "cta",
            )
            .unwrap();
        assert!(signer.verify_tracking_params(&signed));

        let tampered = signed.replace("campaign_id=summer", "campaign_id=winter");
        assert!(!signer.verify_tracking_params(&tampered));
        assert!(!signer.verify_tracking_params("https://example.com/r?ref=newsletter"));
    }
}
