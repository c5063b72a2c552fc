//! BSF Main State Machine
//!
//! Dispatches inbound events onto the session registry and the NF association
//! state machine, and emits binding (de-)registration requests.

use crate::context::{BsfContext, SessId};
use crate::error::{BsfError, BsfResult};
use crate::event::{BsfEvent, BsfEventId, NfTarget, SessKey};
use crate::sbi_path::{
    bsf_sbi_send_binding_de_register, bsf_sbi_send_binding_register, SbiTransport,
};

/// BSF state type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BsfState {
    Initial,
    Operational,
    Final,
}

/// BSF state machine context
#[derive(Debug)]
pub struct BsfSmContext {
    state: BsfState,
}

impl BsfSmContext {
    pub fn new() -> Self {
        Self {
            state: BsfState::Initial,
        }
    }

    pub fn init(&mut self, ctx: &mut BsfContext, transport: &mut dyn SbiTransport) {
        log::debug!("BSF SM: Initializing");
        self.state = BsfState::Initial;
        if let Err(e) = self.dispatch(ctx, transport, &BsfEvent::entry()) {
            log::error!("BSF SM entry failed: {e}");
        }
    }

    pub fn fini(&mut self, ctx: &mut BsfContext, transport: &mut dyn SbiTransport) {
        log::debug!("BSF SM: Finalizing");
        if let Err(e) = self.dispatch(ctx, transport, &BsfEvent::exit()) {
            log::error!("BSF SM exit failed: {e}");
        }
        self.state = BsfState::Final;
    }

    /// Handle one event. Returns the session the event acted on, if any.
    pub fn dispatch(
        &mut self,
        ctx: &mut BsfContext,
        transport: &mut dyn SbiTransport,
        event: &BsfEvent,
    ) -> BsfResult<Option<SessId>> {
        bsf_sm_debug(event);

        match self.state {
            BsfState::Initial => self.handle_initial_state(event),
            BsfState::Operational => self.handle_operational_state(ctx, transport, event),
            BsfState::Final => self.handle_final_state(event),
        }
    }

    pub fn state(&self) -> BsfState {
        self.state
    }

    pub fn is_operational(&self) -> bool {
        self.state == BsfState::Operational
    }

    fn handle_initial_state(&mut self, event: &BsfEvent) -> BsfResult<Option<SessId>> {
        match event.id {
            BsfEventId::FsmEntry => {
                log::info!("BSF SM: Transitioning from Initial to Operational");
                self.state = BsfState::Operational;
                Ok(None)
            }
            BsfEventId::FsmExit => Ok(None),
            _ => Err(not_operational(event)),
        }
    }

    fn handle_final_state(&mut self, event: &BsfEvent) -> BsfResult<Option<SessId>> {
        match event.id {
            BsfEventId::FsmEntry | BsfEventId::FsmExit => Ok(None),
            _ => Err(not_operational(event)),
        }
    }

    fn handle_operational_state(
        &mut self,
        ctx: &mut BsfContext,
        transport: &mut dyn SbiTransport,
        event: &BsfEvent,
    ) -> BsfResult<Option<SessId>> {
        match event.id {
            BsfEventId::FsmEntry => {
                log::info!("BSF entering operational state");
                Ok(None)
            }
            BsfEventId::FsmExit => {
                log::info!("BSF exiting operational state");
                Ok(None)
            }
            BsfEventId::SessCreate => self.handle_sess_create(ctx, transport, event).map(Some),
            BsfEventId::SessTeardown => {
                let id = resolve_sess(ctx, event)?;
                self.handle_sess_teardown(ctx, transport, id).map(|_| Some(id))
            }
            BsfEventId::NfBind => {
                let id = resolve_sess(ctx, event)?;
                let nf = event.nf.clone().ok_or_else(|| {
                    BsfError::PreconditionViolation("No NF instance in bind event".to_string())
                })?;
                self.handle_nf_bind(ctx, transport, id, nf).map(|_| Some(id))
            }
            BsfEventId::NfRelease => {
                let id = resolve_sess(ctx, event)?;
                ctx.sess_release_nf(id)?;
                Ok(Some(id))
            }
            BsfEventId::BindingRegister => {
                let id = resolve_sess(ctx, event)?;
                let sess = ctx
                    .sess_find(id)
                    .ok_or_else(|| BsfError::SessionNotFound(id.to_string()))?;
                bsf_sbi_send_binding_register(transport, sess)?;
                Ok(Some(id))
            }
        }
    }

    fn handle_sess_create(
        &mut self,
        ctx: &mut BsfContext,
        transport: &mut dyn SbiTransport,
        event: &BsfEvent,
    ) -> BsfResult<SessId> {
        let data = event.create.as_ref().ok_or_else(|| {
            BsfError::PreconditionViolation("No session data in create event".to_string())
        })?;

        let id = ctx
            .sess_add(
                &data.s_nssai,
                &data.dnn,
                data.supi.as_deref(),
                data.ipv4addr.as_deref(),
                data.ipv6prefix.as_deref(),
            )?
            .id;
        if let Some(gpsi) = data.gpsi.as_deref() {
            ctx.sess_set_gpsi(id, Some(gpsi))?;
        }
        log::info!("[{id}] Session created (sessions={})", ctx.sess_count());

        let Some(nf) = event.nf.clone() else {
            return Ok(id);
        };
        if let Err(e) = self.handle_nf_bind(ctx, transport, id, nf) {
            // A failed create leaves no session behind
            if let Err(remove_err) = ctx.sess_remove(id) {
                log::error!("[{id}] Session rollback: {remove_err}");
            }
            log::warn!("[{id}] Session create rolled back (sessions={})", ctx.sess_count());
            return Err(e);
        }
        Ok(id)
    }

    fn handle_nf_bind(
        &mut self,
        ctx: &mut BsfContext,
        transport: &mut dyn SbiTransport,
        id: SessId,
        nf: NfTarget,
    ) -> BsfResult<()> {
        let outcome = match nf {
            NfTarget::Instance(candidate) => ctx.sess_bind_nf(id, candidate)?,
            NfTarget::Select(nf_type) => ctx.sess_select_nf(id, nf_type)?,
        };
        if !outcome.is_new() {
            return Ok(());
        }

        let sess = ctx
            .sess_find(id)
            .ok_or_else(|| BsfError::SessionNotFound(id.to_string()))?;
        bsf_sbi_send_binding_register(transport, sess)
    }

    fn handle_sess_teardown(
        &mut self,
        ctx: &mut BsfContext,
        transport: &mut dyn SbiTransport,
        id: SessId,
    ) -> BsfResult<()> {
        if let Some(sess) = ctx.sess_find(id).filter(|sess| sess.is_bound()) {
            if let Err(e) = bsf_sbi_send_binding_de_register(transport, sess) {
                log::warn!("[{}] Binding de-register failed: {e}", sess.binding_id);
            }
        }
        let removed = ctx.sess_remove(id);
        log::info!("[{id}] Session removed (sessions={})", ctx.sess_count());
        removed.map(|_| ())
    }
}

impl Default for BsfSmContext {
    fn default() -> Self {
        Self::new()
    }
}

fn not_operational(event: &BsfEvent) -> BsfError {
    BsfError::PreconditionViolation(format!("BSF not operational for {}", event.name()))
}

fn resolve_sess(ctx: &BsfContext, event: &BsfEvent) -> BsfResult<SessId> {
    let key = event.sess.as_ref().ok_or_else(|| {
        BsfError::PreconditionViolation(format!("No session in {}", event.name()))
    })?;

    let sess = match key {
        SessKey::Handle(id) => ctx.sess_find(*id),
        SessKey::BindingId(binding_id) => ctx.sess_find_by_binding_id(binding_id),
        SessKey::Address(address) => ctx.sess_find_by_address(address),
        SessKey::SupiAndSnssai(supi, s_nssai) => ctx.sess_find_by_supi_and_snssai(supi, s_nssai),
    };
    sess.map(|sess| sess.id)
        .ok_or_else(|| BsfError::SessionNotFound(format!("{key:?}")))
}

fn bsf_sm_debug(event: &BsfEvent) {
    log::trace!("BSF SM event: {}", event.name());
}
