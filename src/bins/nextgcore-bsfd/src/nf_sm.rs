//! BSF NF Association State Machine
//!
//! Tracks which NF instance each session depends on and reference-counts
//! the instances so a shared instance is torn down only by its last holder.
//!
//! ```text
//!  Unbound --bind--> Registered --release (count > 0)--> Suspended
//!                        ^                                   |
//!                        +---------------bind----------------+
//!  Registered / Suspended --release (count == 0)--> Removed
//! ```

use std::fmt;

use ogs_sbi::{NfAssocState, NfInstance, NfInstanceDirectory, NfInstanceRef, NfStatus, NfType};

use crate::error::{BsfError, BsfResult};

/// Releases resources held by an NF instance once its last holder is gone
pub trait NfFinalizer: Send + Sync {
    fn finalize(&self, nf_instance: &mut NfInstance) -> Result<(), String>;
}

/// Drops the endpoints of the instance
#[derive(Debug, Default)]
pub struct DefaultNfFinalizer;

impl NfFinalizer for DefaultNfFinalizer {
    fn finalize(&self, nf_instance: &mut NfInstance) -> Result<(), String> {
        nf_instance.fqdn = None;
        nf_instance.ipv4_addresses.clear();
        nf_instance.ipv6_addresses.clear();
        Ok(())
    }
}

/// Result of a bind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// The holder now references the instance; its count was incremented
    Bound { id: String, reference_count: usize },
    /// The holder already referenced the instance; nothing changed
    AlreadyBound { id: String, reference_count: usize },
}

impl BindOutcome {
    pub fn id(&self) -> &str {
        match self {
            Self::Bound { id, .. } | Self::AlreadyBound { id, .. } => id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Bound { .. })
    }
}

/// Result of a release
#[derive(Debug, Clone)]
pub enum ReleaseOutcome {
    /// The holder had no instance
    NotBound,
    /// Other holders remain; the instance stays in the directory
    Suspended { id: String, reference_count: usize },
    /// Last holder released; the instance was finalized and deregistered
    Removed { nf_instance: NfInstance },
}

/// NF association state machine, owner of the NF instance directory
///
/// Provisioned candidates live in a separate catalog. `select` copies a
/// candidate into the directory, so dropping the last holder deregisters the
/// live instance while the candidate stays selectable.
pub struct BsfNfSm {
    nf_instances: NfInstanceDirectory,
    candidates: NfInstanceDirectory,
    finalizer: Box<dyn NfFinalizer>,
}

impl BsfNfSm {
    pub fn new() -> Self {
        Self::with_finalizer(Box::new(DefaultNfFinalizer))
    }

    pub fn with_finalizer(finalizer: Box<dyn NfFinalizer>) -> Self {
        Self {
            nf_instances: NfInstanceDirectory::new(),
            candidates: NfInstanceDirectory::new(),
            finalizer,
        }
    }

    pub fn nf_instances(&self) -> &NfInstanceDirectory {
        &self.nf_instances
    }

    /// Provisioned candidates available to `select`
    pub fn candidates(&self) -> &NfInstanceDirectory {
        &self.candidates
    }

    /// Provision a candidate for `select` without binding it
    pub fn nf_instance_add(&mut self, mut candidate: NfInstance) -> &NfInstance {
        candidate.reference_count = 0;
        candidate.state = NfAssocState::Unbound;
        self.candidates.add(candidate)
    }

    /// Live state, or `Unbound` for a candidate no session holds
    pub fn state(&self, id: &str) -> Option<NfAssocState> {
        self.nf_instances
            .find(id)
            .or_else(|| self.candidates.find(id))
            .map(|i| i.state)
    }

    pub fn reference_count(&self, id: &str) -> usize {
        self.nf_instances
            .find(id)
            .map(|i| i.reference_count)
            .unwrap_or(0)
    }

    /// Bind the holder to `candidate`, releasing any other instance first.
    pub fn associate(
        &mut self,
        holder: &mut Option<NfInstanceRef>,
        candidate: NfInstance,
    ) -> BsfResult<BindOutcome> {
        if let Some(held) = self.already_held(holder, |r| r.id == candidate.id) {
            return Ok(held);
        }

        self.release_before_bind(holder);
        let id = candidate.id.clone();
        self.nf_instances.add(candidate);
        self.hold(holder, &id)
    }

    /// Bind the holder to the first registered instance of `nf_type`,
    /// live or provisioned, ordered by priority then id.
    pub fn select(
        &mut self,
        holder: &mut Option<NfInstanceRef>,
        nf_type: NfType,
    ) -> BsfResult<BindOutcome> {
        if let Some(held) = self.already_held(holder, |r| r.nf_type == nf_type) {
            return Ok(held);
        }

        let id = self
            .select_candidate(nf_type)
            .ok_or_else(|| BsfError::NfInstanceNotFound(format!("No registered {nf_type}")))?;

        self.release_before_bind(holder);
        if !self.nf_instances.contains(&id) {
            if let Some(candidate) = self.candidates.find(&id) {
                self.nf_instances.add(candidate.clone());
            }
        }
        self.hold(holder, &id)
    }

    fn select_candidate(&self, nf_type: NfType) -> Option<String> {
        let mut found = self.nf_instances.find_by_type(nf_type);
        found.extend(
            self.candidates
                .find_by_type(nf_type)
                .into_iter()
                .filter(|c| !self.nf_instances.contains(&c.id)),
        );
        found.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        found
            .into_iter()
            .find(|i| i.nf_status == NfStatus::Registered)
            .map(|i| i.id.clone())
    }

    /// Drop the holder's reference.
    ///
    /// The holder is cleared on every path. When the count reaches zero the
    /// instance is marked `Removed` and taken out of the directory before the
    /// finalizer runs, so a finalizer error never leaves it resolvable.
    pub fn release(
        &mut self,
        holder: &mut Option<NfInstanceRef>,
        cause: &str,
    ) -> BsfResult<ReleaseOutcome> {
        let Some(nf_ref) = holder.take() else {
            return Ok(ReleaseOutcome::NotBound);
        };

        let remaining = match self.nf_instances.find_mut(&nf_ref.id) {
            Some(nf_instance) => {
                nf_instance.reference_count = nf_instance.reference_count.saturating_sub(1);
                if nf_instance.is_referenced() {
                    nf_instance.state = NfAssocState::Suspended;
                }
                nf_instance.reference_count
            }
            None => return Err(BsfError::NfInstanceNotFound(nf_ref.id)),
        };

        if remaining > 0 {
            log::info!("[{}:{}] ({}) NF suspended", nf_ref.id, remaining, cause);
            return Ok(ReleaseOutcome::Suspended {
                id: nf_ref.id,
                reference_count: remaining,
            });
        }

        let Some(mut nf_instance) = self.nf_instances.remove(&nf_ref.id) else {
            return Err(BsfError::NfInstanceNotFound(nf_ref.id));
        };
        nf_instance.state = NfAssocState::Removed;
        log::info!("[{}] ({}) NF removed", nf_instance.id, cause);

        match self.finalizer.finalize(&mut nf_instance) {
            Ok(()) => Ok(ReleaseOutcome::Removed { nf_instance }),
            Err(reason) => {
                log::error!("[{}] NF finalization failed: {}", nf_instance.id, reason);
                Err(BsfError::FinalizeFailed {
                    id: nf_instance.id,
                    reason,
                })
            }
        }
    }

    /// Forget every live instance and candidate; returns how many live
    /// instances were dropped
    pub fn clear(&mut self) -> usize {
        self.candidates.clear();
        self.nf_instances.clear()
    }

    fn already_held(
        &self,
        holder: &Option<NfInstanceRef>,
        matches: impl Fn(&NfInstanceRef) -> bool,
    ) -> Option<BindOutcome> {
        let nf_ref = holder.as_ref().filter(|r| matches(r))?;
        Some(BindOutcome::AlreadyBound {
            id: nf_ref.id.clone(),
            reference_count: self.reference_count(&nf_ref.id),
        })
    }

    fn release_before_bind(&mut self, holder: &mut Option<NfInstanceRef>) {
        if holder.is_none() {
            return;
        }
        if let Err(e) = self.release(holder, "rebind") {
            log::error!("Release before bind failed: {e}");
        }
    }

    fn hold(&mut self, holder: &mut Option<NfInstanceRef>, id: &str) -> BsfResult<BindOutcome> {
        let nf_instance = self
            .nf_instances
            .find_mut(id)
            .ok_or_else(|| BsfError::NfInstanceNotFound(id.to_string()))?;

        nf_instance.reference_count += 1;
        nf_instance.state = NfAssocState::Registered;
        *holder = Some(NfInstanceRef::of(nf_instance));

        log::info!(
            "[{}:{}] NF associated ({})",
            nf_instance.id,
            nf_instance.reference_count,
            nf_instance.nf_type
        );

        Ok(BindOutcome::Bound {
            id: nf_instance.id.clone(),
            reference_count: nf_instance.reference_count,
        })
    }
}

impl Default for BsfNfSm {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BsfNfSm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BsfNfSm")
            .field("nf_instances", &self.nf_instances.count())
            .field("candidates", &self.candidates.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingFinalizer {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl NfFinalizer for CountingFinalizer {
        fn finalize(&self, _nf_instance: &mut NfInstance) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("client still busy".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn counting_sm(fail: bool) -> (BsfNfSm, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let sm = BsfNfSm::with_finalizer(Box::new(CountingFinalizer {
            calls: calls.clone(),
            fail,
        }));
        (sm, calls)
    }

    fn pcf(id: &str) -> NfInstance {
        NfInstance::new(id, NfType::Pcf)
    }

    #[test]
    fn test_bind_registers_instance() {
        let mut sm = BsfNfSm::new();
        let mut holder = None;

        let outcome = sm.associate(&mut holder, pcf("pcf-1")).unwrap();
        assert!(outcome.is_new());
        assert_eq!(outcome.id(), "pcf-1");
        assert_eq!(sm.reference_count("pcf-1"), 1);
        assert_eq!(sm.state("pcf-1"), Some(NfAssocState::Registered));
        assert_eq!(holder.as_ref().map(|r| r.nf_type), Some(NfType::Pcf));
    }

    #[test]
    fn test_rebind_same_instance_does_not_double_count() {
        let mut sm = BsfNfSm::new();
        let mut holder = None;

        sm.associate(&mut holder, pcf("pcf-1")).unwrap();
        let outcome = sm.associate(&mut holder, pcf("pcf-1")).unwrap();

        assert_eq!(
            outcome,
            BindOutcome::AlreadyBound {
                id: "pcf-1".to_string(),
                reference_count: 1
            }
        );
        assert_eq!(sm.reference_count("pcf-1"), 1);
    }

    #[test]
    fn test_shared_instance_suspended_then_removed() {
        let (mut sm, calls) = counting_sm(false);
        let mut sess_a = None;
        let mut sess_b = None;

        sm.associate(&mut sess_a, pcf("pcf-1")).unwrap();
        sm.associate(&mut sess_b, pcf("pcf-1")).unwrap();
        assert_eq!(sm.reference_count("pcf-1"), 2);

        match sm.release(&mut sess_a, "test").unwrap() {
            ReleaseOutcome::Suspended { id, reference_count } => {
                assert_eq!(id, "pcf-1");
                assert_eq!(reference_count, 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(sess_a.is_none());
        assert_eq!(sm.state("pcf-1"), Some(NfAssocState::Suspended));
        assert!(sm.nf_instances().contains("pcf-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        match sm.release(&mut sess_b, "test").unwrap() {
            ReleaseOutcome::Removed { nf_instance } => {
                assert_eq!(nf_instance.state, NfAssocState::Removed);
                assert_eq!(nf_instance.reference_count, 0);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(!sm.nf_instances().contains("pcf-1"));
        assert_eq!(sm.state("pcf-1"), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let (mut sm, calls) = counting_sm(false);
        let mut holder = None;

        sm.associate(&mut holder, pcf("pcf-1")).unwrap();
        sm.release(&mut holder, "test").unwrap();
        let again = sm.release(&mut holder, "test").unwrap();

        assert!(matches!(again, ReleaseOutcome::NotBound));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_suspended_instance_rebinds_to_registered() {
        let mut sm = BsfNfSm::new();
        let mut sess_a = None;
        let mut sess_b = None;

        sm.associate(&mut sess_a, pcf("pcf-1")).unwrap();
        sm.associate(&mut sess_b, pcf("pcf-1")).unwrap();
        sm.release(&mut sess_a, "test").unwrap();
        assert_eq!(sm.state("pcf-1"), Some(NfAssocState::Suspended));

        sm.associate(&mut sess_a, pcf("pcf-1")).unwrap();
        assert_eq!(sm.state("pcf-1"), Some(NfAssocState::Registered));
        assert_eq!(sm.reference_count("pcf-1"), 2);
    }

    #[test]
    fn test_rebind_releases_old_instance_first() {
        let (mut sm, calls) = counting_sm(false);
        let mut holder = None;

        sm.associate(&mut holder, pcf("pcf-1")).unwrap();
        sm.associate(&mut holder, pcf("pcf-2")).unwrap();

        assert!(!sm.nf_instances().contains("pcf-1"));
        assert_eq!(sm.reference_count("pcf-2"), 1);
        assert_eq!(holder.map(|r| r.id), Some("pcf-2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_finalize_failure_still_removes() {
        let (mut sm, calls) = counting_sm(true);
        let mut holder = None;

        sm.associate(&mut holder, pcf("pcf-1")).unwrap();
        let result = sm.release(&mut holder, "test");

        assert!(matches!(result, Err(BsfError::FinalizeFailed { ref id, .. }) if id == "pcf-1"));
        assert!(holder.is_none());
        assert!(!sm.nf_instances().contains("pcf-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_finalize_failure_during_rebind_keeps_new_binding() {
        let (mut sm, _calls) = counting_sm(true);
        let mut holder = None;

        sm.associate(&mut holder, pcf("pcf-1")).unwrap();
        let outcome = sm.associate(&mut holder, pcf("pcf-2")).unwrap();

        assert!(outcome.is_new());
        assert!(!sm.nf_instances().contains("pcf-1"));
        assert_eq!(holder.map(|r| r.id), Some("pcf-2".to_string()));
    }

    #[test]
    fn test_select_picks_registered_instance() {
        let mut sm = BsfNfSm::new();
        let mut down = pcf("pcf-a");
        down.nf_status = NfStatus::Suspended;
        sm.nf_instance_add(down);
        sm.nf_instance_add(pcf("pcf-b"));
        sm.nf_instance_add(NfInstance::new("bsf-1", NfType::Bsf));
        assert_eq!(sm.state("pcf-b"), Some(NfAssocState::Unbound));

        let mut holder = None;
        let outcome = sm.select(&mut holder, NfType::Pcf).unwrap();
        assert_eq!(outcome.id(), "pcf-b");
        assert_eq!(sm.state("pcf-b"), Some(NfAssocState::Registered));

        let again = sm.select(&mut holder, NfType::Pcf).unwrap();
        assert!(!again.is_new());
        assert_eq!(sm.reference_count("pcf-b"), 1);
    }

    #[test]
    fn test_provisioned_candidate_survives_removal() {
        let (mut sm, calls) = counting_sm(false);
        let mut provisioned = pcf("pcf-1");
        provisioned.ipv4_addresses.push("127.0.0.13".to_string());
        sm.nf_instance_add(provisioned);
        assert!(!sm.nf_instances().contains("pcf-1"));

        let mut holder = None;
        sm.select(&mut holder, NfType::Pcf).unwrap();
        assert!(sm.nf_instances().contains("pcf-1"));
        assert!(matches!(
            sm.release(&mut holder, "test").unwrap(),
            ReleaseOutcome::Removed { .. }
        ));
        assert!(!sm.nf_instances().contains("pcf-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let outcome = sm.select(&mut holder, NfType::Pcf).unwrap();
        assert!(outcome.is_new());
        assert_eq!(sm.reference_count("pcf-1"), 1);
        let live = sm.nf_instances().find("pcf-1").unwrap();
        assert_eq!(live.ipv4_addresses, vec!["127.0.0.13".to_string()]);
        assert_eq!(sm.candidates().find("pcf-1").unwrap().reference_count, 0);
    }

    #[test]
    fn test_select_prefers_live_instance_by_priority() {
        let mut sm = BsfNfSm::new();
        let mut holder_a = None;
        sm.associate(&mut holder_a, pcf("pcf-a")).unwrap();
        let mut backup = pcf("pcf-z");
        backup.priority = 1;
        sm.nf_instance_add(backup);

        let mut holder_b = None;
        assert_eq!(sm.select(&mut holder_b, NfType::Pcf).unwrap().id(), "pcf-a");
        assert_eq!(sm.reference_count("pcf-a"), 2);
        assert!(!sm.nf_instances().contains("pcf-z"));
    }

    #[test]
    fn test_select_without_candidate() {
        let mut sm = BsfNfSm::new();
        let mut holder = None;
        let result = sm.select(&mut holder, NfType::Pcf);
        assert!(matches!(result, Err(BsfError::NfInstanceNotFound(_))));
        assert!(holder.is_none());
    }
}
