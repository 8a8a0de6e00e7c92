pub mod config;
pub mod hash;
pub mod logging;
pub mod model;

pub use config::{ErrorPolicy, MemexConfig, QueryConfig, TablesConfig};
pub use hash::{HashError, ImageHash};
pub use model::{CdrId, ImageDocument, LocalId, PhonePosting, parse_datetime};
