use crate::constants::*;
use crate::imports::*;
use crate::script::Limits;
use ::clap::Args;
use ::std::fmt;

#[derive(Args, Clone, Debug)]
pub struct Options {
    /// Origin of the metro service site
    #[clap(long, env = "SHMETRO_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// File that receives the pretty-printed line status JSON
    #[clap(short, long, env = "SHMETRO_OUTPUT_FILE", default_value = DEFAULT_OUTPUT_FILE, parse(from_os_str))]
    pub output_file: PathBuf,

    /// Maximum number of requests in one run, counting every redirect and replay
    #[clap(long, env = "SHMETRO_MAX_ATTEMPTS", default_value = "10")]
    pub max_attempts: u32,

    /// Time limit for evaluating a gate page's script, in milliseconds
    #[clap(long, env = "SHMETRO_SCRIPT_TIMEOUT_MS", default_value = "2000")]
    pub script_timeout_ms: u64,

    /// Timeout for each HTTP request, in seconds (none by default)
    #[clap(long, env = "SHMETRO_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,
}

impl Options {
    pub fn script_limits(&self) -> Limits {
        Limits::with_timeout(Duration::from_millis(self.script_timeout_ms))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// How a response body presents itself to the gated fetcher.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GateResponse {
    RealPage,
    ObfuscationGate,
    Unrecognized,
}

/// Relative path (starting with `/`) computed by a gate page's script.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RedirectTarget(String);

impl RedirectTarget {
    pub fn new(path: impl Into<String>) -> RedirectTarget {
        RedirectTarget(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_path(self) -> String {
        self.0
    }
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
