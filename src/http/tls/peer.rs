//! Peer certificate inspection
//!
//! After a successful mTLS handshake the peer certificate has already been
//! verified by OpenSSL; this module only extracts what is worth logging.

use openssl::nid::Nid;
use openssl::ssl::SslRef;
use openssl::x509::{X509NameRef, X509Ref};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Verified peer certificate summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    /// Subject common name
    pub subject: String,
    /// Issuer common name
    pub issuer: String,
    /// Subject Alternative Names, as `DNS:name` or `IP:addr`
    pub subject_alt_names: Vec<String>,
}

impl PeerIdentity {
    pub fn from_x509(cert: &X509Ref) -> Self {
        PeerIdentity {
            subject: common_name(cert.subject_name()),
            issuer: common_name(cert.issuer_name()),
            subject_alt_names: subject_alt_names(cert),
        }
    }

    /// Peer certificate of an established connection, if one was presented
    pub fn from_ssl(ssl: &SslRef) -> Option<Self> {
        ssl.peer_certificate().map(|cert| Self::from_x509(&cert))
    }
}

/// First common name of an X.509 name, or `<undef>`
pub(crate) fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "<undef>".to_string())
}

fn subject_alt_names(cert: &X509Ref) -> Vec<String> {
    let Some(sans) = cert.subject_alt_names() else {
        return Vec::new();
    };

    sans.iter()
        .filter_map(|name| {
            if let Some(dns) = name.dnsname() {
                return Some(format!("DNS:{}", dns));
            }
            let ip = match name.ipaddress()? {
                &[a, b, c, d] => IpAddr::V4(Ipv4Addr::new(a, b, c, d)),
                bytes if bytes.len() == 16 => {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(bytes);
                    IpAddr::V6(Ipv6Addr::from(octets))
                }
                _ => return None,
            };
            Some(format!("IP:{}", ip))
        })
        .collect()
}
