use snapvault_core::hash::sha256_hex;

/// Fingerprint of a migration's SQL, recorded when it is applied
pub fn sql_fingerprint(sql: &str) -> String {
    sha256_hex(sql.as_bytes())
}
