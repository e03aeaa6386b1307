mod mock;
mod provider;
mod still;
mod types;
#[cfg(test)]
mod tests;

pub use mock::{MockMediaDevices, PermissionOutcome, ReadyBehavior};
pub use provider::{MediaDeviceProvider, MediaStream};
pub use still::StillImageDevices;
pub use types::{Facing, FacingHint, StreamConstraints};
