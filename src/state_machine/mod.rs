mod state;
mod unit;

pub use state::{StateMachine, UnitEvent, UnitState};
pub use unit::{RunReport, WorkUnit};
