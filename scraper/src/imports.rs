pub use ::anyhow::{Context, Result};
pub use ::log::{debug, info};
pub use ::once_cell::sync::OnceCell;
pub use ::regex::Regex;
pub use ::std::path::{Path, PathBuf};
pub use ::std::time::Duration;
