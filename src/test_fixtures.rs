//! Real keys, certificates and PKCS#12 archives for unit tests.

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::stack::Stack;
use openssl::x509::{X509, X509Builder, X509Name, X509NameBuilder};

pub(crate) struct Identity {
    pub key: PKey<Private>,
    pub cert: X509,
}

fn name(common_name: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder.append_entry_by_nid(Nid::ORGANIZATIONNAME, "Example Grid").unwrap();
    builder.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
    builder.build()
}

fn certificate(
    subject: &str,
    key: &PKey<Private>,
    issuer: Option<&Identity>,
    valid_days: u32,
) -> X509 {
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(rand::random::<u32>() >> 1)
        .unwrap()
        .to_asn1_integer()
        .unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name(subject)).unwrap();
    match issuer {
        Some(ca) => builder.set_issuer_name(ca.cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name(subject)).unwrap(),
    }
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(valid_days).unwrap())
        .unwrap();
    let signer = issuer.map_or(key, |ca| &ca.key);
    builder.sign(signer, MessageDigest::sha256()).unwrap();
    builder.build()
}

fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

/// A self-signed identity valid for `valid_days`.
pub(crate) fn self_signed(common_name: &str, valid_days: u32) -> Identity {
    let key = ec_key();
    let cert = certificate(common_name, &key, None, valid_days);
    Identity { key, cert }
}

/// An identity whose certificate is signed by `ca`.
pub(crate) fn issued_by(ca: &Identity, common_name: &str, valid_days: u32) -> Identity {
    let key = ec_key();
    let cert = certificate(common_name, &key, Some(ca), valid_days);
    Identity { key, cert }
}

/// Archive with current OpenSSL defaults: PBES2/AES-256-CBC and an HMAC-SHA256 MAC.
pub(crate) fn pkcs12(identity: &Identity, chain: &[&X509], password: &str) -> Vec<u8> {
    build(identity, chain, password, Nid::AES_256_CBC, MessageDigest::sha256())
}

/// Archive in the pre-OpenSSL-3 layout: 3DES and a SHA-1 MAC.
pub(crate) fn legacy_pkcs12(identity: &Identity, password: &str) -> Vec<u8> {
    build(
        identity,
        &[],
        password,
        Nid::PBE_WITHSHA1AND3_KEY_TRIPLEDES_CBC,
        MessageDigest::sha1(),
    )
}

fn build(
    identity: &Identity,
    chain: &[&X509],
    password: &str,
    algorithm: Nid,
    mac: MessageDigest,
) -> Vec<u8> {
    let mut builder = Pkcs12::builder();
    builder
        .name("ecp")
        .pkey(&identity.key)
        .cert(&identity.cert)
        .key_algorithm(algorithm)
        .cert_algorithm(algorithm)
        .mac_md(mac);
    if !chain.is_empty() {
        let mut stack = Stack::new().unwrap();
        for cert in chain {
            stack.push((*cert).clone()).unwrap();
        }
        builder.ca(stack);
    }
    builder.build2(password).unwrap().to_der().unwrap()
}
