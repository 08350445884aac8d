pub mod claims;
pub mod machine;
pub mod policy;
pub mod state;
pub mod supervisor;
pub mod timers;

pub use claims::{ClaimRegistry, Owner};
pub use machine::{EmbedController, EmbedReport, EmbedTarget};
pub use policy::{ControllerPolicy, Scope};
pub use state::{Action, ControllerState, Outcome, Phase, SwitchReason, Trigger};
pub use supervisor::{ControllerTask, EmbedSupervisor, PageRun, Settlement};
pub use timers::{TimerHandle, WatchdogPair};
