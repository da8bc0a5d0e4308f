//! Rollback consent hook
//!
//! A rollback invoked with `confirm = true` asks a `RollbackConsent` hook
//! whether to proceed. The engine never prompts; a caller that presents the
//! safety analysis to a human wires the human's answer in through this trait.

use crate::model::{OperationType, RollbackSafetyAnalysis};

/// What the hook is asked to approve
#[derive(Debug, Clone, Copy)]
pub struct ConsentRequest<'a> {
    pub collection_name: &'a str,
    pub target_snapshot_id: &'a str,
    pub operation: OperationType,
    /// Present for intelligent rollbacks; simple rollbacks run no analysis
    pub analysis: Option<&'a RollbackSafetyAnalysis>,
}

/// Consent hook: approve or withhold a confirmed rollback before any writes.
pub trait RollbackConsent: Send + Sync {
    /// Return `false` to cancel the rollback.
    fn approve(&self, request: &ConsentRequest<'_>) -> bool;
}

/// Always approves (caller already obtained consent out of band).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConsent;

impl RollbackConsent for AlwaysConsent {
    fn approve(&self, _: &ConsentRequest<'_>) -> bool {
        true
    }
}

/// Always withholds consent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyConsent;

impl RollbackConsent for DenyConsent {
    fn approve(&self, _: &ConsentRequest<'_>) -> bool {
        false
    }
}

/// Approves only rollbacks whose analysis reports no conflicts.
///
/// Simple rollbacks carry no analysis and are refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeOnlyConsent;

impl RollbackConsent for SafeOnlyConsent {
    fn approve(&self, request: &ConsentRequest<'_>) -> bool {
        request.analysis.is_some_and(|a| a.is_safe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(is_safe: bool) -> RollbackSafetyAnalysis {
        RollbackSafetyAnalysis {
            is_safe,
            target_snapshot_id: "s1".into(),
            local_changes_detected: !is_safe,
            files_with_conflicts: if is_safe { vec![] } else { vec!["a.txt".into()] },
            files_safe_to_restore: vec![],
            files_to_merge: vec![],
            warnings: vec![],
        }
    }

    #[test]
    fn test_always_and_deny() {
        let req = ConsentRequest {
            collection_name: "skills",
            target_snapshot_id: "s1",
            operation: OperationType::Simple,
            analysis: None,
        };
        assert!(AlwaysConsent.approve(&req));
        assert!(!DenyConsent.approve(&req));
    }

    #[test]
    fn test_safe_only_consent_follows_analysis() {
        let safe = analysis(true);
        let unsafe_ = analysis(false);
        let mut req = ConsentRequest {
            collection_name: "skills",
            target_snapshot_id: "s1",
            operation: OperationType::Intelligent,
            analysis: Some(&safe),
        };
        assert!(SafeOnlyConsent.approve(&req));
        req.analysis = Some(&unsafe_);
        assert!(!SafeOnlyConsent.approve(&req));
        req.analysis = None;
        assert!(!SafeOnlyConsent.approve(&req));
    }
}
