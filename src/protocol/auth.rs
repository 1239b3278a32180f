//! Password authentication: MD5 and SCRAM-SHA-256.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use sha2::Sha256;

use crate::error::{Error, Result, eyre};

pub const SCRAM_SHA_256: &str = "SCRAM-SHA-256";

type HmacSha256 = Hmac<Sha256>;

/// `"md5" + hex(md5(hex(md5(password + user)) + salt))`
pub fn md5_password(user: &str, password: &str, salt: &[u8; 4]) -> String {
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(user.as_bytes());
    let inner = format!("{:x}", hasher.finalize());

    let mut hasher = Md5::new();
    hasher.update(inner.as_bytes());
    hasher.update(salt);
    format!("md5{:x}", hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::LibraryBug(eyre!("HMAC rejected key: {e}")))?;
    mac.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Client side of a SCRAM-SHA-256 exchange (RFC 5802, RFC 7677)
pub enum ScramSha256 {
    /// client-first-message has been produced
    Start {
        password: String,
        client_nonce: String,
        client_first_bare: String,
    },
    /// client-final-message has been produced; waiting for the server signature
    Final { server_signature: [u8; 32] },
}

impl ScramSha256 {
    pub fn new(user: &str, password: &str) -> Self {
        let nonce: String = rand::rng()
            .sample_iter(&rand::distr::Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        Self::with_nonce(user, password, nonce)
    }

    pub fn with_nonce(user: &str, password: &str, client_nonce: String) -> Self {
        // the server takes the user from the startup packet, but RFC 5802 wants it escaped here
        let user = user.replace('=', "=3D").replace(',', "=2C");
        let client_first_bare = format!("n={user},r={client_nonce}");
        Self::Start {
            password: password.to_string(),
            client_nonce,
            client_first_bare,
        }
    }

    /// gs2-header `n,,` (no channel binding) followed by client-first-bare
    pub fn client_first_message(&self) -> Result<Vec<u8>> {
        match self {
            Self::Start {
                client_first_bare, ..
            } => Ok(format!("n,,{client_first_bare}").into_bytes()),
            Self::Final { .. } => Err(Error::AuthFailed(
                "SCRAM exchange already past client-first".to_string(),
            )),
        }
    }

    /// Consume server-first-message and produce client-final-message.
    pub fn client_final_message(&mut self, server_first: &[u8]) -> Result<Vec<u8>> {
        let Self::Start {
            password,
            client_nonce,
            client_first_bare,
        } = self
        else {
            return Err(Error::AuthFailed(
                "unexpected SASLContinue from server".to_string(),
            ));
        };

        let server_first = std::str::from_utf8(server_first)
            .map_err(|e| Error::AuthFailed(format!("server-first-message is not UTF-8: {e}")))?;

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;
        for part in server_first.split(',') {
            if let Some(value) = part.strip_prefix("r=") {
                nonce = Some(value);
            } else if let Some(value) = part.strip_prefix("s=") {
                salt = Some(
                    BASE64
                        .decode(value)
                        .map_err(|e| Error::AuthFailed(format!("invalid salt: {e}")))?,
                );
            } else if let Some(value) = part.strip_prefix("i=") {
                iterations = Some(
                    value
                        .parse::<u32>()
                        .map_err(|e| Error::AuthFailed(format!("invalid iterations: {e}")))?,
                );
            }
        }

        let nonce = nonce.ok_or_else(|| Error::AuthFailed("missing server nonce".to_string()))?;
        let salt = salt.ok_or_else(|| Error::AuthFailed("missing salt".to_string()))?;
        let iterations = iterations
            .filter(|&i| i > 0)
            .ok_or_else(|| Error::AuthFailed("missing iterations".to_string()))?;
        if !nonce.starts_with(client_nonce.as_str()) {
            return Err(Error::AuthFailed("server nonce mismatch".to_string()));
        }

        let mut salted_password = [0u8; 32];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut salted_password);

        let client_key = hmac_sha256(&salted_password, b"Client Key")?;
        let stored_key = Sha256::digest(client_key);

        // c=biws is base64("n,,")
        let client_final_without_proof = format!("c=biws,r={nonce}");
        let auth_message =
            format!("{client_first_bare},{server_first},{client_final_without_proof}");

        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes())?;
        let proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(k, s)| k ^ s)
            .collect();

        let server_key = hmac_sha256(&salted_password, b"Server Key")?;
        let server_signature = hmac_sha256(&server_key, auth_message.as_bytes())?;

        let message = format!("{client_final_without_proof},p={}", BASE64.encode(proof));
        *self = Self::Final { server_signature };
        Ok(message.into_bytes())
    }

    /// Check the server-final-message signature.
    pub fn verify_server_final(&self, server_final: &[u8]) -> Result<()> {
        let Self::Final { server_signature } = self else {
            return Err(Error::AuthFailed(
                "unexpected SASLFinal from server".to_string(),
            ));
        };

        let server_final = std::str::from_utf8(server_final)
            .map_err(|e| Error::AuthFailed(format!("server-final-message is not UTF-8: {e}")))?;
        if let Some(err) = server_final.strip_prefix("e=") {
            return Err(Error::AuthFailed(err.to_string()));
        }
        let signature = server_final
            .split(',')
            .find_map(|part| part.strip_prefix("v="))
            .ok_or_else(|| Error::AuthFailed("missing server signature".to_string()))?;
        let signature = BASE64
            .decode(signature)
            .map_err(|e| Error::AuthFailed(format!("invalid server signature: {e}")))?;

        if signature.as_slice() != server_signature.as_slice() {
            return Err(Error::AuthFailed("server signature mismatch".to_string()));
        }
        Ok(())
    }
}
