//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::sync::LazyLock;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509, X509Builder, X509NameBuilder};
use wiremock::{Request, Respond, ResponseTemplate};

/// Key and self-signed certificate the mock SP hands out.
pub struct Credential {
    pub key: PKey<Private>,
    pub cert: X509,
}

pub static CREDENTIAL: LazyLock<Credential> = LazyLock::new(Credential::generate);

impl Credential {
    fn generate() -> Self {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_nid(Nid::ORGANIZATIONNAME, "Example Grid")
            .unwrap();
        name.append_entry_by_nid(Nid::COMMONNAME, "ecp integration user")
            .unwrap();
        let name = name.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        builder
            .set_serial_number(&BigNum::from_u32(7).unwrap().to_asn1_integer().unwrap())
            .unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(1).unwrap())
            .unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        Self {
            key,
            cert: builder.build(),
        }
    }

    #[must_use]
    pub fn certificate_der(&self) -> Vec<u8> {
        self.cert.to_der().unwrap()
    }

    #[must_use]
    pub fn private_key_der(&self) -> Vec<u8> {
        self.key.private_key_to_pkcs8().unwrap()
    }

    /// PKCS#12 archive with OpenSSL 3 defaults (AES-256-CBC, HMAC-SHA256).
    #[must_use]
    pub fn pkcs12(&self, password: &str) -> Vec<u8> {
        let mut builder = Pkcs12::builder();
        builder
            .name("ecp")
            .pkey(&self.key)
            .cert(&self.cert)
            .key_algorithm(Nid::AES_256_CBC)
            .cert_algorithm(Nid::AES_256_CBC)
            .mac_md(MessageDigest::sha256());
        builder.build2(password).unwrap().to_der().unwrap()
    }
}

/// Decoded value of `key` in an `application/x-www-form-urlencoded` body.
#[must_use]
pub fn form_field(body: &[u8], key: &str) -> Option<String> {
    let body = String::from_utf8_lossy(body);
    body.split('&')
        .find_map(|pair| pair.strip_prefix(&format!("{key}=")).map(str::to_string))
        .map(|value| urlencoding::decode(&value).expect("utf-8 form value").into_owned())
}

/// SP stand-in: answers a certificate request with a PKCS#12 archive
/// encrypted under the submitted `p12password`.
pub struct Pkcs12Responder {
    pub set_cookie: Option<&'static str>,
}

impl Respond for Pkcs12Responder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some(password) = form_field(&request.body, "p12password") else {
            return ResponseTemplate::new(400).set_body_string("missing p12password");
        };
        let der = CREDENTIAL.pkcs12(&password);
        let mut response = ResponseTemplate::new(200)
            .insert_header("content-type", "application/x-pkcs12")
            .set_body_bytes(der);
        if let Some(set_cookie) = self.set_cookie {
            response = response.insert_header("set-cookie", set_cookie);
        }
        response
    }
}
