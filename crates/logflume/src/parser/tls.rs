//! IANA cipher-suite catalog for decimal `%k` tokens.

const CIPHER_CATALOG: &[(u16, &str, &str)] = &[
    // TLS 1.3 (RFC 8446)
    (0x1301, "TLS_AES_128_GCM_SHA256", "TLSv1.3"),
    (0x1302, "TLS_AES_256_GCM_SHA384", "TLSv1.3"),
    (0x1303, "TLS_CHACHA20_POLY1305_SHA256", "TLSv1.3"),
    (0x1304, "TLS_AES_128_CCM_SHA256", "TLSv1.3"),
    (0x1305, "TLS_AES_128_CCM_8_SHA256", "TLSv1.3"),
    // common TLS 1.2 suites
    (0xc02b, "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256", "TLSv1.2"),
    (0xc02c, "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384", "TLSv1.2"),
    (0xc02f, "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256", "TLSv1.2"),
    (0xc030, "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384", "TLSv1.2"),
    (0xcca8, "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256", "TLSv1.2"),
    (0xcca9, "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256", "TLSv1.2"),
    (0xc013, "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA", "TLSv1.2"),
    (0xc014, "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA", "TLSv1.2"),
    (0xc009, "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA", "TLSv1.2"),
    (0xc00a, "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA", "TLSv1.2"),
    (0x009c, "TLS_RSA_WITH_AES_128_GCM_SHA256", "TLSv1.2"),
    (0x009d, "TLS_RSA_WITH_AES_256_GCM_SHA384", "TLSv1.2"),
    (0x002f, "TLS_RSA_WITH_AES_128_CBC_SHA", "TLSv1.2"),
    (0x0035, "TLS_RSA_WITH_AES_256_CBC_SHA", "TLSv1.2"),
];

/// Resolve a decimal IANA cipher code into `(cipher_name, tls_version)`.
pub fn extract_tls_version_cipher(token: &str) -> Option<(&'static str, &'static str)> {
    let code: u16 = token.parse().ok()?;
    CIPHER_CATALOG
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, name, version)| (*name, *version))
}
