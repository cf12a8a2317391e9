mod control;
mod events;

pub use control::{Control, ExitMode};
pub use events::{ErrorKind, PanelEvent};
