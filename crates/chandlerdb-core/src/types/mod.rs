mod generator;
mod id;
mod reference;

pub use generator::IdGenerator;
pub use id::{ItemId, ItemIdError};
pub use reference::ItemRef;
