//! Client identity loading.

use std::path::{Path, PathBuf};

use x509_parser::prelude::{FromDer as _, X509Certificate};

/// Subject `UID` attribute, where Apple stores the bundle ID of a push certificate.
const UID_OID: &str = "0.9.2342.19200300.100.1.1";

/// Common name prefixes of Apple push certificates, followed by the topic.
const COMMON_NAME_PREFIXES: &[&str] = &[
    "Apple Push Services: ",
    "Apple Production IOS Push Services: ",
    "Apple Development IOS Push Services: ",
    "Apple Sandbox Push Services: ",
];

const KEY_TAGS: &[&str] = &["PRIVATE KEY", "RSA PRIVATE KEY", "EC PRIVATE KEY"];

/// Errors loading a client identity.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("failed to read certificate file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse PEM")]
    Pem(#[from] pem::PemError),
    #[error("no CERTIFICATE block found")]
    MissingCertificate,
    #[error("no private key block found")]
    MissingPrivateKey,
    #[error("found {0} private keys, expected exactly one")]
    MultiplePrivateKeys(usize),
    #[error("encrypted private keys are not supported, decrypt the key first")]
    EncryptedKey,
    #[error("failed to parse certificate: {0}")]
    Certificate(String),
}

/// A client certificate with its private key, ready to authenticate a TLS connection.
#[derive(Clone)]
pub struct Identity {
    pem: Vec<u8>,
    subject: String,
    topic: Option<String>,
    not_after: i64,
    expired: bool,
}

impl Identity {
    /// Parse a PEM bundle holding certificate(s) and one unencrypted private key.
    ///
    /// The first certificate is the leaf; any following ones are its chain.
    pub fn from_pem(input: &[u8]) -> Result<Self, IdentityError> {
        let blocks = pem::parse_many(input)?;

        if blocks.iter().any(|block| {
            block.tag() == "ENCRYPTED PRIVATE KEY"
                || block
                    .headers()
                    .get("Proc-Type")
                    .is_some_and(|v| v.contains("ENCRYPTED"))
        }) {
            return Err(IdentityError::EncryptedKey);
        }

        let certs: Vec<&pem::Pem> = blocks.iter().filter(|b| b.tag() == "CERTIFICATE").collect();
        let keys: Vec<&pem::Pem> = blocks
            .iter()
            .filter(|b| KEY_TAGS.contains(&b.tag()))
            .collect();

        let leaf = certs.first().ok_or(IdentityError::MissingCertificate)?;
        match keys.len() {
            0 => return Err(IdentityError::MissingPrivateKey),
            1 => {}
            n => return Err(IdentityError::MultiplePrivateKeys(n)),
        }

        let (_, cert) = X509Certificate::from_der(leaf.contents())
            .map_err(|e| IdentityError::Certificate(e.to_string()))?;

        let validity = cert.validity();
        let identity = Self {
            subject: cert.subject().to_string(),
            topic: extract_topic(&cert),
            not_after: validity.not_after.timestamp(),
            expired: !validity.is_valid(),
            pem: pem::encode_many(
                &certs
                    .iter()
                    .chain(keys.iter())
                    .map(|b| (*b).clone())
                    .collect::<Vec<_>>(),
            )
            .into_bytes(),
        };

        Ok(identity)
    }

    /// Normalized PEM: certificates followed by the private key.
    pub fn pem(&self) -> &[u8] {
        &self.pem
    }

    /// Subject of the leaf certificate.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Topic the certificate was issued for, if it names one.
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Expiry of the leaf certificate as a UNIX timestamp.
    pub fn not_after(&self) -> i64 {
        self.not_after
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("subject", &self.subject)
            .field("topic", &self.topic)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// Load a client identity from a PEM file.
pub fn load_identity(path: impl AsRef<Path>) -> Result<Identity, IdentityError> {
    let path = path.as_ref();
    let input = std::fs::read(path).map_err(|source| IdentityError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let identity = Identity::from_pem(&input)?;

    if identity.is_expired() {
        tracing::warn!(
            path = %path.display(),
            subject = identity.subject(),
            not_after = identity.not_after(),
            "certificate is not currently valid"
        );
    } else {
        tracing::debug!(
            path = %path.display(),
            subject = identity.subject(),
            topic = identity.topic(),
            "loaded client identity"
        );
    }

    Ok(identity)
}

/// Extract the APNs topic from a push certificate's subject.
fn extract_topic(cert: &X509Certificate<'_>) -> Option<String> {
    for rdn in cert.subject().iter() {
        for attr in rdn.iter() {
            if attr.attr_type().to_id_string() == UID_OID {
                if let Ok(value) = attr.attr_value().as_str() {
                    return Some(value.to_string());
                }
            }
        }
    }

    cert.subject().iter_common_name().find_map(|cn| {
        let cn = cn.as_str().ok()?;
        COMMON_NAME_PREFIXES
            .iter()
            .find_map(|prefix| cn.strip_prefix(prefix))
            .map(str::to_string)
    })
}
