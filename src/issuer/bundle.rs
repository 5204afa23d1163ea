//! Decoded PKCS#12 credential returned by the SP.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use openssl::error::ErrorStack;
use openssl::pkcs12::Pkcs12;
use openssl::x509::X509Ref;
use pem::{EncodeConfig, LineEnding, Pem};
use tracing::{debug, instrument};

use super::DecodeFailure;

/// Private key, certificate and chain from a PKCS#12 archive.
///
/// The private key is redacted in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateBundle {
    private_key: Vec<u8>,
    certificate: Vec<u8>,
    chain: Vec<Vec<u8>>,
}

impl CertificateBundle {
    /// Decodes a DER PKCS#12 archive protected by `password`.
    ///
    /// The certificate matching the private key is the end-entity
    /// certificate; every other certificate in the archive is its chain.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeFailure::Corrupt`] when the bytes are not a readable
    /// PKCS#12 archive, [`DecodeFailure::PasswordMismatch`] when the MAC does
    /// not verify, and [`DecodeFailure::Incomplete`] when the key or its
    /// certificate is missing.
    #[instrument(level = "debug", skip_all, fields(bytes = der.len()))]
    pub fn from_pkcs12(der: &[u8], password: &str) -> Result<Self, DecodeFailure> {
        let archive = Pkcs12::from_der(der).map_err(corrupt)?;
        let parsed = archive.parse2(password).map_err(classify_parse_error)?;

        let chain = match parsed.ca {
            Some(stack) => stack
                .iter()
                .map(X509Ref::to_der)
                .collect::<Result<Vec<_>, _>>()
                .map_err(corrupt)?,
            None => Vec::new(),
        };
        debug!(
            key = parsed.pkey.is_some(),
            certificate = parsed.cert.is_some(),
            chain = chain.len(),
            "decoded PKCS#12 archive"
        );

        let key = parsed.pkey.ok_or(DecodeFailure::Incomplete {
            missing: "private key",
        })?;
        let certificate = parsed.cert.ok_or(DecodeFailure::Incomplete {
            missing: "certificate",
        })?;

        Ok(Self {
            private_key: key.private_key_to_pkcs8().map_err(corrupt)?,
            certificate: certificate.to_der().map_err(corrupt)?,
            chain,
        })
    }

    /// The private key as PKCS#8 DER. Sensitive, never log.
    #[must_use]
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    /// The end-entity certificate as DER.
    #[must_use]
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    /// Intermediate certificates as DER, in archive order.
    #[must_use]
    pub fn chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    /// Renders certificate, private key and chain as concatenated PEM blocks.
    #[must_use]
    pub fn to_pem(&self) -> String {
        let mut blocks = vec![
            Pem::new("CERTIFICATE", self.certificate.clone()),
            Pem::new("PRIVATE KEY", self.private_key.clone()),
        ];
        blocks.extend(
            self.chain
                .iter()
                .map(|cert| Pem::new("CERTIFICATE", cert.clone())),
        );
        pem::encode_many_config(
            &blocks,
            EncodeConfig::new().set_line_ending(LineEnding::LF),
        )
    }

    /// Writes [`to_pem`](Self::to_pem) output to `path`, readable by the owner only.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the file cannot be written.
    #[instrument(level = "debug", skip(self))]
    pub fn write_pem(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = open_owner_only(path)?;
        file.write_all(self.to_pem().as_bytes())?;
        file.flush()
    }
}

impl fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("private_key", &"[REDACTED]")
            .field("certificate_bytes", &self.certificate.len())
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

fn corrupt(stack: ErrorStack) -> DecodeFailure {
    DecodeFailure::Corrupt {
        reason: stack.to_string(),
    }
}

// PKCS12_parse reports a wrong password as a MAC failure
fn classify_parse_error(stack: ErrorStack) -> DecodeFailure {
    let mac_failure = stack.errors().iter().any(|error| {
        error
            .reason()
            .is_some_and(|reason| reason.contains("mac verify failure"))
    });
    if mac_failure {
        DecodeFailure::PasswordMismatch
    } else {
        corrupt(stack)
    }
}

#[cfg(unix)]
fn open_owner_only(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode() only applies on creation
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_owner_only(path: &Path) -> std::io::Result<fs::File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{issued_by, legacy_pkcs12, pkcs12, self_signed};

    #[test]
    fn test_from_pkcs12_decodes_aes_sha256_archive() {
        let identity = self_signed("ecp user", 1);
        let der = pkcs12(&identity, &[], "Secret12!@");

        let bundle = CertificateBundle::from_pkcs12(&der, "Secret12!@").unwrap();
        assert_eq!(bundle.certificate(), identity.cert.to_der().unwrap());
        assert_eq!(
            bundle.private_key(),
            identity.key.private_key_to_pkcs8().unwrap()
        );
        assert!(bundle.chain().is_empty());
    }

    #[test]
    fn test_from_pkcs12_decodes_legacy_3des_sha1_archive() {
        let identity = self_signed("ecp user", 1);
        let der = legacy_pkcs12(&identity, "pw");

        let bundle = CertificateBundle::from_pkcs12(&der, "pw").unwrap();
        assert_eq!(bundle.certificate(), identity.cert.to_der().unwrap());
    }

    #[test]
    fn test_from_pkcs12_separates_leaf_from_chain() {
        let ca = self_signed("Example CA", 30);
        let leaf = issued_by(&ca, "ecp user", 1);
        let der = pkcs12(&leaf, &[&ca.cert], "pw");

        let bundle = CertificateBundle::from_pkcs12(&der, "pw").unwrap();
        assert_eq!(bundle.certificate(), leaf.cert.to_der().unwrap());
        assert_eq!(bundle.chain(), [ca.cert.to_der().unwrap()]);
    }

    #[test]
    fn test_from_pkcs12_wrong_password() {
        let der = pkcs12(&self_signed("ecp user", 1), &[], "right");
        let err = CertificateBundle::from_pkcs12(&der, "wrong").unwrap_err();
        assert!(matches!(err, DecodeFailure::PasswordMismatch), "got: {err}");
    }

    #[test]
    fn test_from_pkcs12_corrupt_bytes() {
        let err = CertificateBundle::from_pkcs12(b"definitely not der", "pw").unwrap_err();
        assert!(matches!(err, DecodeFailure::Corrupt { .. }), "got: {err}");
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let bundle = CertificateBundle {
            private_key: b"very-secret".to_vec(),
            certificate: vec![2; 10],
            chain: Vec::new(),
        };
        let debug_str = format!("{bundle:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("very-secret"));
    }

    #[test]
    fn test_to_pem_blocks_in_order() {
        let bundle = CertificateBundle {
            private_key: vec![1; 100],
            certificate: vec![2; 10],
            chain: vec![vec![3; 10]],
        };
        let rendered = bundle.to_pem();
        assert!(!rendered.contains('\r'));
        assert!(rendered.lines().all(|line| line.len() <= 64));

        let blocks = pem::parse_many(&rendered).unwrap();
        let parsed: Vec<(&str, &[u8])> = blocks
            .iter()
            .map(|block| (block.tag(), block.contents()))
            .collect();
        assert_eq!(
            parsed,
            [
                ("CERTIFICATE", &[2u8; 10][..]),
                ("PRIVATE KEY", &[1u8; 100][..]),
                ("CERTIFICATE", &[3u8; 10][..]),
            ]
        );
    }

    #[test]
    fn test_write_pem_owner_only() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("x509up_test");
        let bundle = CertificateBundle {
            private_key: vec![1; 4],
            certificate: vec![2; 4],
            chain: Vec::new(),
        };
        bundle.write_pem(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), bundle.to_pem());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }
}
