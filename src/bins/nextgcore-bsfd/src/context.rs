//! BSF Context Management
//!
//! Session registry: an arena of sessions indexed by subscriber+slice,
//! IPv4 address, IPv6 prefix and binding id. Every index entry points at an
//! arena slot, and add/remove touch the arena and all indexes in one call.

use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, OnceLock, RwLock};

use ogs_sbi::{NfInstance, NfInstanceDirectory, NfInstanceRef, NfType};
use slab::Slab;

use crate::error::{BsfError, BsfResult};
use crate::nf_sm::{BindOutcome, BsfNfSm, NfFinalizer, ReleaseOutcome};

/// Default size of the session pool
pub const MAX_NUM_OF_SESS: usize = 1024;

/// SD value meaning "no SD"
pub const S_NSSAI_NO_SD_VALUE: u32 = 0xFFFFFF;

/// SD is a 24-bit value
const S_NSSAI_SD_MASK: u32 = 0xFFFFFF;

/// S-NSSAI (Single Network Slice Selection Assistance Information)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SNssai {
    pub sst: u8,
    pub sd: Option<u32>,
}

impl SNssai {
    /// SD is truncated to 24 bits; the reserved value means "no SD"
    pub fn new(sst: u8, sd: Option<u32>) -> Self {
        let sd = sd
            .map(|sd| sd & S_NSSAI_SD_MASK)
            .filter(|sd| *sd != S_NSSAI_NO_SD_VALUE);
        Self { sst, sd }
    }

    /// Create S-NSSAI from SST and SD values
    pub fn from_sst_sd(sst: u8, sd: u32) -> Self {
        let sd_opt = if sd == S_NSSAI_NO_SD_VALUE { None } else { Some(sd) };
        Self { sst, sd: sd_opt }
    }

    /// Convert SD to string representation
    pub fn sd_to_string(&self) -> Option<String> {
        self.sd.map(|sd| format!("{:06X}", sd & S_NSSAI_SD_MASK))
    }

    /// Parse SD from exactly six hex digits
    pub fn sd_from_string(s: &str) -> Option<u32> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(s, 16).ok()
    }
}

impl fmt::Display for SNssai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sd_to_string() {
            Some(sd) => write!(f, "{}:{}", self.sst, sd),
            None => write!(f, "{}", self.sst),
        }
    }
}

/// IPv6 prefix, stored with the host bits cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv6Prefix {
    pub len: u8,
    pub addr6: [u8; 16],
}

impl Ipv6Prefix {
    /// Parse `addr/len`; a bare address is a /128
    pub fn from_string(prefix_str: &str) -> Option<Self> {
        let (addr, len) = match prefix_str.split_once('/') {
            Some((addr, len)) => (addr, len.parse::<u8>().ok()?),
            None => (prefix_str, 128),
        };
        if len > 128 {
            return None;
        }
        let addr: Ipv6Addr = addr.parse().ok()?;

        let mask = u128::MAX.checked_shl(128 - u32::from(len)).unwrap_or(0);
        let masked = u128::from(addr) & mask;
        Some(Self {
            len,
            addr6: masked.to_be_bytes(),
        })
    }
}

impl fmt::Display for Ipv6Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = Ipv6Addr::from(self.addr6);
        write!(f, "{addr}/{}", self.len)
    }
}

/// Stable session handle: arena slot plus allocation sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessId {
    index: usize,
    seq: u64,
}

impl fmt::Display for SessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.seq)
    }
}

/// BSF Session
#[derive(Debug, Clone)]
pub struct BsfSess {
    pub id: SessId,
    /// Binding ID, unique for the lifetime of the process
    pub binding_id: String,

    /// SUPI (Subscription Permanent Identifier)
    pub supi: Option<String>,
    /// GPSI (Generic Public Subscription Identifier)
    pub gpsi: Option<String>,

    pub ipv4addr_string: Option<String>,
    pub ipv6prefix_string: Option<String>,
    pub ipv4addr: Option<Ipv4Addr>,
    pub ipv6prefix: Option<Ipv6Prefix>,

    pub s_nssai: SNssai,
    /// DNN (Data Network Name)
    pub dnn: Option<String>,

    /// NF instance currently serving this session
    pub nf_instance: Option<NfInstanceRef>,
}

impl BsfSess {
    pub fn is_bound(&self) -> bool {
        self.nf_instance.is_some()
    }
}

/// BSF Context - session registry plus the NF association state machine
#[derive(Debug)]
pub struct BsfContext {
    sess_pool: Slab<BsfSess>,
    /// (SUPI, S-NSSAI) -> slot
    supi_hash: HashMap<(String, SNssai), usize>,
    /// IPv4 address -> slot
    ipv4addr_hash: HashMap<Ipv4Addr, usize>,
    /// IPv6 prefix -> slot
    ipv6prefix_hash: HashMap<Ipv6Prefix, usize>,
    /// Binding sequence -> slot
    binding_hash: HashMap<u64, usize>,
    nf_sm: BsfNfSm,
    next_seq: u64,
    max_num_of_sess: usize,
    initialized: bool,
}

impl BsfContext {
    pub fn new() -> Self {
        Self::with_nf_sm(BsfNfSm::new())
    }

    /// Context whose NF instances are released through `finalizer`
    pub fn with_finalizer(finalizer: Box<dyn NfFinalizer>) -> Self {
        Self::with_nf_sm(BsfNfSm::with_finalizer(finalizer))
    }

    fn with_nf_sm(nf_sm: BsfNfSm) -> Self {
        Self {
            sess_pool: Slab::new(),
            supi_hash: HashMap::new(),
            ipv4addr_hash: HashMap::new(),
            ipv6prefix_hash: HashMap::new(),
            binding_hash: HashMap::new(),
            nf_sm,
            next_seq: 1,
            max_num_of_sess: 0,
            initialized: false,
        }
    }

    pub fn init(&mut self, max_sess: usize) {
        if self.initialized {
            return;
        }
        self.max_num_of_sess = max_sess;
        self.sess_pool.reserve(max_sess);
        self.initialized = true;
        log::info!("BSF context initialized with max {max_sess} sessions");
    }

    pub fn fini(&mut self) {
        if !self.initialized {
            return;
        }
        self.sess_remove_all();
        let leftover = self.nf_sm.clear();
        if leftover > 0 {
            log::debug!("{leftover} unbound NF instances dropped");
        }
        self.initialized = false;
        log::info!("BSF context finalized");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Create a session and index it under every key supplied.
    ///
    /// Fails without touching any index when no key is given, a key does not
    /// parse, a key is already indexed, or the pool is full.
    pub fn sess_add(
        &mut self,
        s_nssai: &SNssai,
        dnn: &str,
        supi: Option<&str>,
        ipv4addr_string: Option<&str>,
        ipv6prefix_string: Option<&str>,
    ) -> BsfResult<&BsfSess> {
        let supi = supi.filter(|s| !s.is_empty());
        let ipv4addr_string = ipv4addr_string.filter(|s| !s.is_empty());
        let ipv6prefix_string = ipv6prefix_string.filter(|s| !s.is_empty());

        if supi.is_none() && ipv4addr_string.is_none() && ipv6prefix_string.is_none() {
            log::error!("No SUPI, IPv4 address or IPv6 prefix");
            return Err(BsfError::PreconditionViolation(
                "No SUPI, IPv4 address or IPv6 prefix".to_string(),
            ));
        }

        if self.sess_pool.len() >= self.max_num_of_sess {
            log::error!("Maximum number of sessions [{}] reached", self.max_num_of_sess);
            return Err(BsfError::PoolExhausted(self.max_num_of_sess));
        }

        let ipv4addr = ipv4addr_string
            .map(|s| {
                s.parse::<Ipv4Addr>().map_err(|_| {
                    BsfError::PreconditionViolation(format!("Invalid IPv4 address [{s}]"))
                })
            })
            .transpose()?;
        let ipv6prefix = ipv6prefix_string
            .map(|s| {
                Ipv6Prefix::from_string(s).ok_or_else(|| {
                    BsfError::PreconditionViolation(format!("Invalid IPv6 prefix [{s}]"))
                })
            })
            .transpose()?;

        let supi_key = supi.map(|s| (s.to_string(), s_nssai.clone()));
        if let Some(key) = &supi_key {
            self.check_free(self.supi_hash.get(key), || format!("{}/{}", key.0, key.1))?;
        }
        if let Some(addr) = &ipv4addr {
            self.check_free(self.ipv4addr_hash.get(addr), || addr.to_string())?;
        }
        if let Some(prefix) = &ipv6prefix {
            self.check_free(self.ipv6prefix_hash.get(prefix), || prefix.to_string())?;
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let entry = self.sess_pool.vacant_entry();
        let index = entry.key();
        let sess = BsfSess {
            id: SessId { index, seq },
            binding_id: seq.to_string(),
            supi: supi.map(str::to_string),
            gpsi: None,
            ipv4addr_string: ipv4addr_string.map(str::to_string),
            ipv6prefix_string: ipv6prefix_string.map(str::to_string),
            ipv4addr,
            ipv6prefix,
            s_nssai: s_nssai.clone(),
            dnn: Some(dnn).filter(|d| !d.is_empty()).map(str::to_string),
            nf_instance: None,
        };
        entry.insert(sess);

        if let Some(key) = supi_key {
            self.supi_hash.insert(key, index);
        }
        if let Some(addr) = ipv4addr {
            self.ipv4addr_hash.insert(addr, index);
        }
        if let Some(prefix) = ipv6prefix {
            self.ipv6prefix_hash.insert(prefix, index);
        }
        self.binding_hash.insert(seq, index);

        log::debug!(
            "BSF session added (binding_id={seq}, supi={supi:?}, ipv4={:?}, ipv6={:?})",
            ipv4addr_string,
            ipv6prefix_string
        );

        Ok(&self.sess_pool[index])
    }

    fn check_free(&self, indexed: Option<&usize>, key: impl FnOnce() -> String) -> BsfResult<()> {
        match indexed.and_then(|&index| self.sess_pool.get(index)) {
            Some(holder) => Err(BsfError::DuplicateKey {
                key: key(),
                binding_id: holder.binding_id.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Set or clear the GPSI of a session
    pub fn sess_set_gpsi(&mut self, id: SessId, gpsi: Option<&str>) -> BsfResult<()> {
        let sess = pool_get_mut(&mut self.sess_pool, id)?;
        sess.gpsi = gpsi.map(str::to_string);
        Ok(())
    }

    /// Remove a session from the arena and every index, then release its
    /// NF instance.
    ///
    /// The session is gone even when the release reports `FinalizeFailed`.
    pub fn sess_remove(&mut self, id: SessId) -> BsfResult<BsfSess> {
        if self.sess_find(id).is_none() {
            return Err(BsfError::SessionNotFound(id.to_string()));
        }

        let mut sess = self.sess_pool.remove(id.index);
        if let Some(supi) = &sess.supi {
            self.supi_hash.remove(&(supi.clone(), sess.s_nssai.clone()));
        }
        if let Some(addr) = &sess.ipv4addr {
            self.ipv4addr_hash.remove(addr);
        }
        if let Some(prefix) = &sess.ipv6prefix {
            self.ipv6prefix_hash.remove(prefix);
        }
        self.binding_hash.remove(&id.seq);
        log::debug!("BSF session removed (binding_id={})", sess.binding_id);

        self.nf_sm.release(&mut sess.nf_instance, "session removed")?;
        Ok(sess)
    }

    /// Remove every session; returns how many were removed
    pub fn sess_remove_all(&mut self) -> usize {
        let ids: Vec<SessId> = self.sess_pool.iter().map(|(_, sess)| sess.id).collect();
        for id in &ids {
            if let Err(e) = self.sess_remove(*id) {
                log::error!("Session [{id}] removal: {e}");
            }
        }
        ids.len()
    }

    /// Find session by handle
    pub fn sess_find(&self, id: SessId) -> Option<&BsfSess> {
        self.sess_pool.get(id.index).filter(|sess| sess.id == id)
    }

    /// Find session by binding ID; only the exact id string matches
    pub fn sess_find_by_binding_id(&self, binding_id: &str) -> Option<&BsfSess> {
        let seq: u64 = binding_id.parse().ok()?;
        let index = self.binding_hash.get(&seq)?;
        self.sess_pool
            .get(*index)
            .filter(|sess| sess.binding_id == binding_id)
    }

    /// Find session by SUPI and S-NSSAI
    pub fn sess_find_by_supi_and_snssai(
        &self,
        supi: &str,
        s_nssai: &SNssai,
    ) -> Option<&BsfSess> {
        let index = self.supi_hash.get(&(supi.to_string(), s_nssai.clone()))?;
        self.sess_pool.get(*index)
    }

    /// Find session by IPv4 address string
    pub fn sess_find_by_ipv4addr(&self, ipv4addr_string: &str) -> Option<&BsfSess> {
        let addr: Ipv4Addr = ipv4addr_string.parse().ok()?;
        let index = self.ipv4addr_hash.get(&addr)?;
        self.sess_pool.get(*index)
    }

    /// Find session by IPv6 prefix string
    pub fn sess_find_by_ipv6prefix(&self, ipv6prefix_string: &str) -> Option<&BsfSess> {
        let prefix = Ipv6Prefix::from_string(ipv6prefix_string)?;
        let index = self.ipv6prefix_hash.get(&prefix)?;
        self.sess_pool.get(*index)
    }

    /// Find session by IPv4 address or IPv6 prefix
    pub fn sess_find_by_address(&self, address: &str) -> Option<&BsfSess> {
        if address.contains(':') {
            self.sess_find_by_ipv6prefix(address)
        } else {
            self.sess_find_by_ipv4addr(address)
        }
    }

    /// Find session by S-NSSAI and DNN
    pub fn sess_find_by_snssai_and_dnn(&self, s_nssai: &SNssai, dnn: &str) -> Option<&BsfSess> {
        self.sess_pool.iter().map(|(_, sess)| sess).find(|sess| {
            sess.s_nssai == *s_nssai
                && sess
                    .dnn
                    .as_deref()
                    .is_some_and(|d| d.eq_ignore_ascii_case(dnn))
        })
    }

    /// Bind a session to an NF instance candidate
    pub fn sess_bind_nf(&mut self, id: SessId, candidate: NfInstance) -> BsfResult<BindOutcome> {
        let sess = pool_get_mut(&mut self.sess_pool, id)?;
        self.nf_sm.associate(&mut sess.nf_instance, candidate)
    }

    /// Bind a session to a registered instance of `nf_type` from the directory
    pub fn sess_select_nf(&mut self, id: SessId, nf_type: NfType) -> BsfResult<BindOutcome> {
        let sess = pool_get_mut(&mut self.sess_pool, id)?;
        self.nf_sm.select(&mut sess.nf_instance, nf_type)
    }

    /// Release the NF instance held by a session; a no-op when none is held
    pub fn sess_release_nf(&mut self, id: SessId) -> BsfResult<ReleaseOutcome> {
        let sess = pool_get_mut(&mut self.sess_pool, id)?;
        self.nf_sm.release(&mut sess.nf_instance, "session released")
    }

    /// Provision an NF instance candidate for `sess_select_nf`
    pub fn nf_instance_add(&mut self, candidate: NfInstance) -> &NfInstance {
        self.nf_sm.nf_instance_add(candidate)
    }

    pub fn nf_sm(&self) -> &BsfNfSm {
        &self.nf_sm
    }

    pub fn nf_instances(&self) -> &NfInstanceDirectory {
        self.nf_sm.nf_instances()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &BsfSess> {
        self.sess_pool.iter().map(|(_, sess)| sess)
    }

    /// Get session load percentage
    pub fn get_sess_load(&self) -> i32 {
        if self.max_num_of_sess == 0 {
            return 0;
        }
        ((self.sess_pool.len() * 100) / self.max_num_of_sess) as i32
    }

    pub fn sess_count(&self) -> usize {
        self.sess_pool.len()
    }

    pub fn max_num_of_sess(&self) -> usize {
        self.max_num_of_sess
    }
}

impl Default for BsfContext {
    fn default() -> Self {
        Self::new()
    }
}

fn pool_get_mut(pool: &mut Slab<BsfSess>, id: SessId) -> BsfResult<&mut BsfSess> {
    pool.get_mut(id.index)
        .filter(|sess| sess.id == id)
        .ok_or_else(|| BsfError::SessionNotFound(id.to_string()))
}

/// Global BSF context
static GLOBAL_BSF_CONTEXT: OnceLock<Arc<RwLock<BsfContext>>> = OnceLock::new();

/// Get the global BSF context
pub fn bsf_self() -> Arc<RwLock<BsfContext>> {
    GLOBAL_BSF_CONTEXT
        .get_or_init(|| Arc::new(RwLock::new(BsfContext::new())))
        .clone()
}

/// Initialize the global BSF context
pub fn bsf_context_init(max_sess: usize) {
    let ctx = bsf_self();
    if let Ok(mut context) = ctx.write() {
        context.init(max_sess);
    };
}

/// Finalize the global BSF context
pub fn bsf_context_final() {
    let ctx = bsf_self();
    if let Ok(mut context) = ctx.write() {
        context.fini();
    };
}

/// Get session load (for NF instance load reporting)
pub fn get_sess_load() -> i32 {
    let ctx = bsf_self();
    if let Ok(context) = ctx.read() {
        return context.get_sess_load();
    }
    0
}
