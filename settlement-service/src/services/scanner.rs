//! Pluggable malware scanning for uploaded proof files.

use async_trait::async_trait;

use crate::models::quarantine::{RiskLevel, ScanReport};

#[async_trait]
pub trait MalwareScanner: Send + Sync {
    async fn scan(&self, data: &[u8], file_name: &str) -> ScanReport;
}

/// Byte-signature scanner covering the EICAR test string, embedded PE
/// executables and inline script tags.
pub struct SignatureScanner;

const EICAR_MARKER: &[u8] = b"EICAR-STANDARD-ANTIVIRUS-TEST-FILE";
const SCRIPT_MARKER: &[u8] = b"<script";

#[async_trait]
impl MalwareScanner for SignatureScanner {
    async fn scan(&self, data: &[u8], file_name: &str) -> ScanReport {
        let mut threats = Vec::new();
        let mut risk: Option<RiskLevel> = None;

        if contains(data, EICAR_MARKER) {
            threats.push("eicar_test_file".to_string());
            risk = raise(risk, RiskLevel::High);
        }
        if data.starts_with(b"MZ") {
            threats.push("embedded_executable".to_string());
            risk = raise(risk, RiskLevel::High);
        }
        if contains_ignore_case(data, SCRIPT_MARKER) {
            threats.push("script_injection".to_string());
            risk = raise(risk, RiskLevel::Medium);
        }

        if threats.is_empty() {
            ScanReport::clean()
        } else {
            tracing::warn!(file_name, threats = ?threats, "scan detected threats");
            ScanReport {
                clean: false,
                threats,
                risk_level: risk,
            }
        }
    }
}

fn raise(current: Option<RiskLevel>, level: RiskLevel) -> Option<RiskLevel> {
    Some(current.map_or(level, |existing| existing.max(level)))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn contains_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}
