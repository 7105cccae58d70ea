//! Control plane: supervisor, watchdog, and status surface.
//!
//! All share-state transitions execute on this side of the process
//! boundary, fully serialized; the serving process only ever reads the
//! filesystem within the share root and can be killed at any moment
//! without corrupting control-plane state.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │               lanshare run                    │
//! ├───────────────────────────────────────────────┤
//! │ StatusAggregator │ Control API │   Watchdog   │
//! │  (snapshots)     │ (loopback)  │ (crash/idle) │
//! ├───────────────────────────────────────────────┤
//! │             ShareSupervisor                   │
//! │        (spawns `lanshare serve …`)            │
//! └───────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod capture;
pub mod client;
pub mod state;
pub mod status;
pub mod supervisor;
pub mod watchdog;

pub use client::ControlClient;
pub use state::{ServeCommand, ShareState, ShareStatus, StartOutcome, StatusPatch};
pub use status::StatusAggregator;
pub use supervisor::ShareSupervisor;
pub use watchdog::Watchdog;
