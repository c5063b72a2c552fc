//! SBI Context Management
//!
//! NF instance records and the directory that owns them.

use std::collections::HashMap;

use crate::types::NfType;

/// NF profile status as advertised by the NRF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfStatus {
    Registered,
    Suspended,
    Undiscoverable,
}

/// Association state of an NF instance held by consumer sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NfAssocState {
    /// Known to the directory, no session holds it yet
    #[default]
    Unbound,
    /// At least one session holds it and it is actively serving
    Registered,
    /// Released by a session but still referenced by others
    Suspended,
    /// Finalized and deregistered
    Removed,
}

/// NF Instance information - matches ogs_sbi_nf_instance_t
#[derive(Debug, Clone)]
pub struct NfInstance {
    /// NF Instance ID (UUID)
    pub id: String,
    /// NF Type
    pub nf_type: NfType,
    /// NF Status
    pub nf_status: NfStatus,
    /// FQDN
    pub fqdn: Option<String>,
    /// IPv4 addresses
    pub ipv4_addresses: Vec<String>,
    /// IPv6 addresses
    pub ipv6_addresses: Vec<String>,
    /// Priority
    pub priority: u16,
    /// Capacity
    pub capacity: u16,
    /// Number of consumer contexts holding this instance
    pub reference_count: usize,
    /// Association state
    pub state: NfAssocState,
}

impl NfInstance {
    pub fn new(id: impl Into<String>, nf_type: NfType) -> Self {
        Self {
            id: id.into(),
            nf_type,
            nf_status: NfStatus::Registered,
            fqdn: None,
            ipv4_addresses: Vec::new(),
            ipv6_addresses: Vec::new(),
            priority: 0,
            capacity: 100,
            reference_count: 0,
            state: NfAssocState::Unbound,
        }
    }

    pub fn is_referenced(&self) -> bool {
        self.reference_count > 0
    }
}

/// Non-owning handle to an NF instance held in a directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NfInstanceRef {
    pub id: String,
    pub nf_type: NfType,
}

impl NfInstanceRef {
    pub fn of(nf_instance: &NfInstance) -> Self {
        Self {
            id: nf_instance.id.clone(),
            nf_type: nf_instance.nf_type,
        }
    }
}

/// NF instance directory - exclusive owner of NF instances, keyed by id
#[derive(Debug, Default)]
pub struct NfInstanceDirectory {
    nf_instances: HashMap<String, NfInstance>,
}

impl NfInstanceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an instance unless one with the same id is already known.
    /// Returns the record held by the directory.
    pub fn add(&mut self, nf_instance: NfInstance) -> &mut NfInstance {
        let id = nf_instance.id.clone();
        self.nf_instances.entry(id).or_insert_with(|| {
            log::debug!("[{}] NF instance added ({})", nf_instance.id, nf_instance.nf_type);
            nf_instance
        })
    }

    pub fn find(&self, id: &str) -> Option<&NfInstance> {
        self.nf_instances.get(id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut NfInstance> {
        self.nf_instances.get_mut(id)
    }

    /// Deregister an instance, handing ownership back to the caller
    pub fn remove(&mut self, id: &str) -> Option<NfInstance> {
        let removed = self.nf_instances.remove(id);
        if removed.is_some() {
            log::debug!("[{id}] NF instance deregistered");
        }
        removed
    }

    /// Instances of a type, ordered by priority then id
    pub fn find_by_type(&self, nf_type: NfType) -> Vec<&NfInstance> {
        let mut found: Vec<&NfInstance> = self
            .nf_instances
            .values()
            .filter(|i| i.nf_type == nf_type)
            .collect();
        found.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        found
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nf_instances.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.nf_instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nf_instances.is_empty()
    }

    /// Drop every instance; returns how many were held
    pub fn clear(&mut self) -> usize {
        let count = self.nf_instances.len();
        self.nf_instances.clear();
        count
    }
}
