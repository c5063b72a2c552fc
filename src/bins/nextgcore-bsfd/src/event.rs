//! BSF Event Definitions
//!
//! Inbound triggers driving the registry and the NF association state machine.

use ogs_sbi::{NfInstance, NfType};

use crate::context::{SNssai, SessId};

/// Event types for BSF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BsfEventId {
    /// FSM entry signal
    FsmEntry,
    /// FSM exit signal
    FsmExit,
    /// A session was established
    SessCreate,
    /// A session was torn down
    SessTeardown,
    /// Bind a session to an NF instance
    NfBind,
    /// Release a session's NF instance
    NfRelease,
    /// Re-announce a session's binding
    BindingRegister,
}

impl BsfEventId {
    pub fn name(&self) -> &'static str {
        match self {
            BsfEventId::FsmEntry => "OGS_FSM_ENTRY_SIG",
            BsfEventId::FsmExit => "OGS_FSM_EXIT_SIG",
            BsfEventId::SessCreate => "BSF_EVT_SESS_CREATE",
            BsfEventId::SessTeardown => "BSF_EVT_SESS_TEARDOWN",
            BsfEventId::NfBind => "BSF_EVT_NF_BIND",
            BsfEventId::NfRelease => "BSF_EVT_NF_RELEASE",
            BsfEventId::BindingRegister => "BSF_EVT_BINDING_REGISTER",
        }
    }
}

/// How an event addresses its session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessKey {
    Handle(SessId),
    BindingId(String),
    /// IPv4 address or IPv6 prefix
    Address(String),
    SupiAndSnssai(String, SNssai),
}

/// Session establishment data
#[derive(Debug, Clone, Default)]
pub struct SessCreateData {
    pub s_nssai: SNssai,
    pub dnn: String,
    pub supi: Option<String>,
    pub gpsi: Option<String>,
    pub ipv4addr: Option<String>,
    pub ipv6prefix: Option<String>,
}

/// NF instance to bind
#[derive(Debug, Clone)]
pub enum NfTarget {
    /// Explicit candidate record
    Instance(NfInstance),
    /// First registered instance of a type known to the directory
    Select(NfType),
}

/// BSF Event structure
#[derive(Debug, Clone)]
pub struct BsfEvent {
    pub id: BsfEventId,
    pub sess: Option<SessKey>,
    pub create: Option<SessCreateData>,
    pub nf: Option<NfTarget>,
}

impl BsfEvent {
    pub fn new(id: BsfEventId) -> Self {
        Self {
            id,
            sess: None,
            create: None,
            nf: None,
        }
    }

    pub fn entry() -> Self {
        Self::new(BsfEventId::FsmEntry)
    }

    pub fn exit() -> Self {
        Self::new(BsfEventId::FsmExit)
    }

    pub fn sess_create(data: SessCreateData) -> Self {
        Self {
            create: Some(data),
            ..Self::new(BsfEventId::SessCreate)
        }
    }

    pub fn sess_teardown(sess: SessKey) -> Self {
        Self::new(BsfEventId::SessTeardown).with_sess(sess)
    }

    pub fn nf_bind(sess: SessKey, nf: NfTarget) -> Self {
        Self {
            nf: Some(nf),
            ..Self::new(BsfEventId::NfBind).with_sess(sess)
        }
    }

    pub fn nf_release(sess: SessKey) -> Self {
        Self::new(BsfEventId::NfRelease).with_sess(sess)
    }

    pub fn binding_register(sess: SessKey) -> Self {
        Self::new(BsfEventId::BindingRegister).with_sess(sess)
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    /// Also bind the session to `nf` once it exists
    pub fn with_nf(mut self, nf: NfTarget) -> Self {
        self.nf = Some(nf);
        self
    }

    pub fn with_sess(mut self, sess: SessKey) -> Self {
        self.sess = Some(sess);
        self
    }
}

impl Default for BsfEvent {
    fn default() -> Self {
        Self::new(BsfEventId::FsmEntry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_exit_events() {
        let entry = BsfEvent::entry();
        assert_eq!(entry.id, BsfEventId::FsmEntry);
        assert!(entry.sess.is_none());

        let exit = BsfEvent::exit();
        assert_eq!(exit.id, BsfEventId::FsmExit);
    }

    #[test]
    fn test_event_name() {
        let event = BsfEvent::nf_release(SessKey::BindingId("1".to_string()));
        assert_eq!(event.name(), "BSF_EVT_NF_RELEASE");
    }

    #[test]
    fn test_sess_create_with_nf() {
        let event = BsfEvent::sess_create(SessCreateData {
            dnn: "internet".to_string(),
            ipv4addr: Some("10.45.0.2".to_string()),
            ..Default::default()
        })
        .with_nf(NfTarget::Select(NfType::Pcf));

        assert_eq!(event.id, BsfEventId::SessCreate);
        assert!(matches!(event.nf, Some(NfTarget::Select(NfType::Pcf))));
        assert_eq!(event.create.unwrap().dnn, "internet");
    }

    #[test]
    fn test_nf_bind_event() {
        let event = BsfEvent::nf_bind(
            SessKey::Address("10.45.0.2".to_string()),
            NfTarget::Instance(NfInstance::new("pcf-1", NfType::Pcf)),
        );
        assert_eq!(event.id, BsfEventId::NfBind);
        assert_eq!(event.sess, Some(SessKey::Address("10.45.0.2".to_string())));
    }
}
