//! BSF SBI Path Functions
//!
//! Hands built Nbsf_Management requests to the transport layer.

use std::collections::VecDeque;

use ogs_sbi::{SbiError, SbiRequest};

use crate::context::BsfSess;
use crate::error::BsfResult;
use crate::nbsf_build::{
    pcf_nbsf_management_build_de_register, pcf_nbsf_management_build_register,
};

/// Outbound transport for SBI requests
pub trait SbiTransport {
    fn send_request(&mut self, request: SbiRequest) -> Result<(), SbiError>;
}

/// In-process request queue drained by the daemon loop
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: VecDeque<SbiRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every queued request in send order
    pub fn drain(&mut self) -> Vec<SbiRequest> {
        self.pending.drain(..).collect()
    }
}

impl SbiTransport for RequestQueue {
    fn send_request(&mut self, request: SbiRequest) -> Result<(), SbiError> {
        self.pending.push_back(request);
        Ok(())
    }
}

/// Announce a session's binding
pub fn bsf_sbi_send_binding_register(
    transport: &mut dyn SbiTransport,
    sess: &BsfSess,
) -> BsfResult<()> {
    let request = pcf_nbsf_management_build_register(sess)?;
    transport.send_request(request)?;
    log::debug!("[{}] Binding register sent", sess.binding_id);
    Ok(())
}

/// Withdraw a session's binding
pub fn bsf_sbi_send_binding_de_register(
    transport: &mut dyn SbiTransport,
    sess: &BsfSess,
) -> BsfResult<()> {
    let request = pcf_nbsf_management_build_de_register(sess)?;
    transport.send_request(request)?;
    log::debug!("[{}] Binding de-register sent", sess.binding_id);
    Ok(())
}
