//! TSN Programming Engine (§4.H). I225/I226 only; callers must check
//! [`Family::is_tsn_capable`](avb_driver_api::Family::is_tsn_capable)
//! before reaching any function here — the generic request dispatcher
//! does this at the capability-check stage, not this module.

pub mod fp;
pub mod ptm;
pub mod tas;
