mod gate;
mod marshal;
mod ticker;

pub use gate::{ClosedScope, GateError, MutationGate};
pub use marshal::Marshal;
pub use ticker::{TickStrategy, Ticker};
