mod loader;
mod root;

pub use loader::load_from_path;
pub(crate) use loader::validate;
pub use root::{ClientConfig, ServerAddr, DEFAULT_MAX_BODY, DEFAULT_PORT, DEFAULT_UNIX_PATH};
