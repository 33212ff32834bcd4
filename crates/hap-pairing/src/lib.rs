//! # hap-pairing
//!
//! Controller side of HomeKit pair-verify: re-authenticates an accessory
//! whose long-term key we already hold and derives fresh session keys.
//!
//! - [`VerifyController`]: sans-IO handshake state machine
//! - [`run_pair_verify`]: drives a controller over a [`Transport`]
//! - [`AccessoryKeyStore`]: where accessory long-term keys come from

mod config;
mod driver;
mod identity;
#[cfg(test)]
mod mock_accessory;
mod pair_verify;
mod redact;
mod session;
mod store;
mod traits;

pub use config::VerifyConfig;
pub use driver::run_pair_verify;
pub use identity::ControllerIdentity;
pub use pair_verify::{
    signing_material, Sequence, VerifyController, VerifyState, VerifyStep, METHOD_PAIR_VERIFY,
};
pub use session::VerifySession;
pub use store::{AccessoryKey, AccessoryKeyStore, FileKeyStore, MemoryKeyStore};
pub use traits::Transport;
