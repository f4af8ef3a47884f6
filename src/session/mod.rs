pub mod error;
pub mod model;
pub mod ownership;
pub mod persistence;
pub mod reaper;
pub mod store;
pub mod transition;


pub use error::*;
pub use model::*;
pub use ownership::*;
pub use persistence::*;
pub use reaper::*;
pub use store::*;
pub use transition::*;
