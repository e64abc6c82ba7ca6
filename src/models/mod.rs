pub mod ai_session;
pub mod case;
pub mod conversation;
pub mod enums;
pub mod medication;
pub mod order;
pub mod profile;

pub use ai_session::*;
pub use case::*;
pub use conversation::*;
pub use enums::*;
pub use medication::*;
pub use order::*;
pub use profile::*;
