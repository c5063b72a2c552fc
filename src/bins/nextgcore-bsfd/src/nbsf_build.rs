//! Nbsf_Management Request Builders
//!
//! Builds the binding registration (`POST pcfBindings`) and de-registration
//! (`DELETE pcfBindings/{bindingId}`) requests for a bound session.

use ogs_sbi::constants::{api, method, resource};
use ogs_sbi::{
    build_request, NfType, PcfBinding, SbiHeader, SbiMessage, SbiRequest, SbiServiceType, Snssai,
};

use crate::context::{BsfSess, SNssai};
use crate::error::{BsfError, BsfResult};

/// NF type a session must be bound to before its binding is announced
pub const BINDING_NF_TYPE: NfType = NfType::Pcf;

/// SD rendered to text for the lifetime of one request body
struct TransientSd(Option<String>);

impl TransientSd {
    fn render(s_nssai: &SNssai) -> Self {
        let sd = s_nssai.sd_to_string();
        if sd.is_some() {
            tracking::track(1);
        }
        Self(sd)
    }

    fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl Drop for TransientSd {
    fn drop(&mut self) {
        if self.0.take().is_some() {
            tracking::track(-1);
        }
    }
}

#[cfg(test)]
pub(crate) mod tracking {
    use std::cell::Cell;

    thread_local! {
        static LIVE: Cell<isize> = const { Cell::new(0) };
        static RENDERED: Cell<usize> = const { Cell::new(0) };
    }

    pub fn track(delta: isize) {
        LIVE.with(|live| live.set(live.get() + delta));
        if delta > 0 {
            RENDERED.with(|rendered| rendered.set(rendered.get() + 1));
        }
    }

    /// Transient SD strings ever rendered on this thread
    pub fn rendered() -> usize {
        RENDERED.with(|rendered| rendered.get())
    }

    /// Transient SD strings currently alive on this thread
    pub fn live() -> isize {
        LIVE.with(|live| live.get())
    }
}

#[cfg(not(test))]
mod tracking {
    #[inline(always)]
    pub fn track(_delta: isize) {}
}

fn precondition(reason: String) -> BsfError {
    log::error!("{reason}");
    BsfError::PreconditionViolation(reason)
}

fn bound_pcf_id(sess: &BsfSess) -> BsfResult<&str> {
    match &sess.nf_instance {
        Some(nf_ref) if nf_ref.nf_type == BINDING_NF_TYPE => Ok(&nf_ref.id),
        Some(nf_ref) => Err(precondition(format!(
            "[{}] Bound NF is {}, expected {}",
            sess.binding_id, nf_ref.nf_type, BINDING_NF_TYPE
        ))),
        None => Err(precondition(format!(
            "[{}] No {} bound",
            sess.binding_id, BINDING_NF_TYPE
        ))),
    }
}

/// Build the binding registration request for a session
pub fn pcf_nbsf_management_build_register(sess: &BsfSess) -> BsfResult<SbiRequest> {
    build_register(sess, method::POST)
}

fn build_register(sess: &BsfSess, http_method: &str) -> BsfResult<SbiRequest> {
    let pcf_id = bound_pcf_id(sess)?;
    let dnn = match sess.dnn.as_deref() {
        Some(dnn) if !dnn.is_empty() => dnn,
        _ => return Err(precondition(format!("[{}] No DNN", sess.binding_id))),
    };

    let sd = TransientSd::render(&sess.s_nssai);

    let pcf_binding = PcfBinding {
        supi: sess.supi.as_deref(),
        gpsi: sess.gpsi.as_deref(),
        ipv4_addr: sess.ipv4addr_string.as_deref(),
        ipv6_prefix: sess.ipv6prefix_string.as_deref(),
        dnn,
        snssai: Snssai {
            sst: sess.s_nssai.sst,
            sd: sd.as_deref(),
        },
        pcf_id: Some(pcf_id),
        supp_feat: None,
    };

    let message = SbiMessage {
        header: SbiHeader::new(http_method, SbiServiceType::NbsfManagement, api::V1)
            .with_resource(resource::PCF_BINDINGS),
        pcf_binding: Some(&pcf_binding),
    };

    let request = build_request(&message)?;
    log::debug!("[{}] Binding register built ({})", sess.binding_id, pcf_id);
    Ok(request)
}

/// Build the binding de-registration request for a session
pub fn pcf_nbsf_management_build_de_register(sess: &BsfSess) -> BsfResult<SbiRequest> {
    bound_pcf_id(sess)?;

    let message = SbiMessage {
        header: SbiHeader::new(method::DELETE, SbiServiceType::NbsfManagement, api::V1)
            .with_resource(resource::PCF_BINDINGS)
            .with_resource(sess.binding_id.as_str()),
        pcf_binding: None,
    };

    let request = build_request(&message)?;
    log::debug!("[{}] Binding de-register built", sess.binding_id);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BsfContext;
    use ogs_sbi::NfInstance;

    fn bound_ctx(sd: Option<u32>, dnn: &str) -> (BsfContext, crate::context::SessId) {
        let mut ctx = BsfContext::new();
        ctx.init(8);
        let id = ctx
            .sess_add(&SNssai::new(1, sd), dnn, Some("IMSI1"), None, None)
            .unwrap()
            .id;
        ctx.sess_bind_nf(id, NfInstance::new("pcf-1", NfType::Pcf)).unwrap();
        (ctx, id)
    }

    #[test]
    fn test_build_register() {
        let (ctx, id) = bound_ctx(Some(0xA1B2C3), "internet");
        let sess = ctx.sess_find(id).unwrap();

        let request = pcf_nbsf_management_build_register(sess).unwrap();
        assert_eq!(tracking::live(), 0);

        assert_eq!(request.header.method, "POST");
        assert_eq!(request.uri, "/nbsf-management/v1/pcfBindings");
        assert_eq!(request.get_header("content-type"), Some("application/json"));

        let body = request.json().unwrap().unwrap();
        assert_eq!(body["supi"], "IMSI1");
        assert_eq!(body["dnn"], "internet");
        assert_eq!(body["snssai"]["sst"], 1);
        assert_eq!(body["snssai"]["sd"], "A1B2C3");
        assert_eq!(body["pcfId"], "pcf-1");
        assert!(body.get("gpsi").is_none());
        assert!(body.get("ipv4Addr").is_none());

        // Building never mutates the session or the instance
        assert_eq!(ctx.nf_sm().reference_count("pcf-1"), 1);
    }

    #[test]
    fn test_sd_released_when_build_fails() {
        let (ctx, id) = bound_ctx(Some(0xA1B2C3), "internet");
        let rendered = tracking::rendered();

        let result = build_register(ctx.sess_find(id).unwrap(), "");

        assert!(matches!(
            result,
            Err(BsfError::Sbi(ogs_sbi::SbiError::InvalidMessage(_)))
        ));
        assert_eq!(tracking::rendered(), rendered + 1);
        assert_eq!(tracking::live(), 0);
    }

    #[test]
    fn test_build_register_without_sd() {
        let (ctx, id) = bound_ctx(None, "internet");
        let request = pcf_nbsf_management_build_register(ctx.sess_find(id).unwrap()).unwrap();
        let body = request.json().unwrap().unwrap();
        assert!(body["snssai"].get("sd").is_none());
        assert_eq!(tracking::live(), 0);
    }

    #[test]
    fn test_build_register_unbound() {
        let mut ctx = BsfContext::new();
        ctx.init(8);
        let id = ctx
            .sess_add(&SNssai::new(1, Some(0xA1B2C3)), "internet", Some("IMSI1"), None, None)
            .unwrap()
            .id;

        let result = pcf_nbsf_management_build_register(ctx.sess_find(id).unwrap());
        assert!(matches!(result, Err(BsfError::PreconditionViolation(_))));
        assert_eq!(tracking::live(), 0);
    }

    #[test]
    fn test_build_register_wrong_nf_type() {
        let mut ctx = BsfContext::new();
        ctx.init(8);
        let id = ctx
            .sess_add(&SNssai::new(1, None), "internet", Some("IMSI1"), None, None)
            .unwrap()
            .id;
        ctx.sess_bind_nf(id, NfInstance::new("smf-1", NfType::Smf)).unwrap();

        let result = pcf_nbsf_management_build_register(ctx.sess_find(id).unwrap());
        assert!(matches!(result, Err(BsfError::PreconditionViolation(_))));
    }

    #[test]
    fn test_build_register_missing_dnn() {
        let (ctx, id) = bound_ctx(Some(0xA1B2C3), "");
        let result = pcf_nbsf_management_build_register(ctx.sess_find(id).unwrap());
        assert!(matches!(result, Err(BsfError::PreconditionViolation(_))));
    }

    #[test]
    fn test_build_de_register() {
        let (ctx, id) = bound_ctx(Some(0xA1B2C3), "internet");
        let sess = ctx.sess_find(id).unwrap();

        let request = pcf_nbsf_management_build_de_register(sess).unwrap();
        assert_eq!(request.header.method, "DELETE");
        assert_eq!(
            request.uri,
            format!("/nbsf-management/v1/pcfBindings/{}", sess.binding_id)
        );
        assert!(request.content.is_none());
        assert!(request.get_header("content-type").is_none());
    }
}
