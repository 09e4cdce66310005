//! Throwaway PKI for integration tests
//!
//! Generates a CA, a server and a client certificate signed by it, and a
//! second unrelated CA with its own client certificate, all under a
//! temporary directory.

#![allow(dead_code)]

use mtls_hello::settings::IdentityPaths;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use std::fs;
use std::path::PathBuf;
use std::sync::Once;
use tempfile::TempDir;

static INIT: Once = Once::new();

/// Route crate logs to the test harness when RUST_LOG is set
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

struct Issued {
    cert: X509,
    key: PKey<Private>,
}

pub struct Pki {
    dir: TempDir,
}

impl Pki {
    /// Write `ca.crt`, `server.{crt,key}`, `client.{crt,key}`, `other-ca.crt`
    /// and `rogue.{crt,key}` (signed by the other CA)
    pub fn generate() -> Pki {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let pki = Pki { dir };

        let ca = issue("Test CA", None, true);
        pki.write_cert("ca.crt", &ca);

        let server = issue("server", Some(&ca), false);
        pki.write_cert("server.crt", &server);
        pki.write_key("server.key", &server);

        let client = issue("client", Some(&ca), false);
        pki.write_cert("client.crt", &client);
        pki.write_key("client.key", &client);

        let other_ca = issue("Other CA", None, true);
        pki.write_cert("other-ca.crt", &other_ca);

        let rogue = issue("rogue", Some(&other_ca), false);
        pki.write_cert("rogue.crt", &rogue);
        pki.write_key("rogue.key", &rogue);

        pki
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn server_paths(&self) -> IdentityPaths {
        IdentityPaths::new("ca.crt", "server.crt", "server.key").in_dir(self.dir.path())
    }

    pub fn client_paths(&self) -> IdentityPaths {
        IdentityPaths::new("ca.crt", "client.crt", "client.key").in_dir(self.dir.path())
    }

    /// Client identity issued by the other CA, still trusting the real one
    pub fn rogue_paths(&self) -> IdentityPaths {
        IdentityPaths::new("ca.crt", "rogue.crt", "rogue.key").in_dir(self.dir.path())
    }

    pub fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn write_cert(&self, name: &str, issued: &Issued) {
        self.write(name, &issued.cert.to_pem().unwrap());
    }

    fn write_key(&self, name: &str, issued: &Issued) {
        self.write(name, &issued.key.private_key_to_pem_pkcs8().unwrap());
    }
}

fn issue(cn: &str, issuer: Option<&Issued>, ca: bool) -> Issued {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("O", "mtls-hello tests").unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    let name = name.build();

    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    match issuer {
        Some(issuer) => builder.set_issuer_name(issuer.cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();

    if ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
    } else {
        builder
            .append_extension(BasicConstraints::new().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .digital_signature()
                    .key_encipherment()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        builder
            .append_extension(
                ExtendedKeyUsage::new()
                    .server_auth()
                    .client_auth()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let san = SubjectAlternativeName::new()
            .dns("localhost")
            .ip("127.0.0.1")
            .build(&builder.x509v3_context(issuer.map(|i| &*i.cert), None))
            .unwrap();
        builder.append_extension(san).unwrap();
    }

    let signer = issuer.map(|i| &i.key).unwrap_or(&key);
    builder.sign(signer, MessageDigest::sha256()).unwrap();

    Issued {
        cert: builder.build(),
        key,
    }
}
