//! EMLSR Types
//!
//! Plain data shared by the switching coordinator, the simulator and any
//! PHY/MAC integration:
//!
//! - **Identifiers**: [`RadioId`], [`LinkId`], [`SwitchId`]
//! - **Virtual time**: [`Timestamp`] offsets handed out by an external scheduler
//! - **Radio profile**: [`Capability`], [`ChannelWidth`], [`ModulationTier`]
//! - **Momentary state**: [`PhyState`], [`OperatingState`], [`SwitchInfo`]
//! - **Medium**: [`MediumSnapshot`] with NAV and per-width CCA busy indications
//! - **Header peeking**: [`PartialHeader`]
//!
//! Enable the `serde` feature to derive `Serialize`/`Deserialize` on the
//! value types.
//!
//! # Example
//!
//! ```rust
//! use emlsr_types::{ChannelWidth, MediumSnapshot, MediumState, Timestamp};
//!
//! let snap = MediumSnapshot::idle()
//!     .with_cca_busy(ChannelWidth::Mhz20, Timestamp::from_micros(30));
//!
//! let now = Timestamp::from_micros(10);
//! assert_eq!(
//!     snap.state_at(now, ChannelWidth::Mhz80),
//!     MediumState::CcaBusy(Timestamp::from_micros(30))
//! );
//! ```

pub mod error;
pub mod header;
pub mod link;
pub mod radio;
pub mod switch;
pub mod time;

pub use error::TypesError;
pub use header::{FrameKind, PartialHeader};
pub use link::{CcaBusy, LinkId, MediumSnapshot, MediumState};
pub use radio::{
    Capability, ChannelWidth, ModulationTier, OperatingState, PhyState, RadioId, RadioRole,
    ReceptionInfo,
};
pub use switch::{AccessCategory, SwitchId, SwitchInfo, SwitchPurpose};
pub use time::Timestamp;
