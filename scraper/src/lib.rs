mod budget;
mod client;
mod constants;
mod errors;
mod fetcher;
mod gate;
mod imports;
mod macros;
mod output;
mod pipeline;
mod resolver;
mod status;
mod types;

pub mod script;

pub use crate::budget::AttemptBudget;
pub use crate::client::{Client, HttpResponse};
pub use crate::errors::{exit_code, Phase, ScrapeError};
pub use crate::fetcher::GatedFetcher;
pub use crate::gate::{classify_response, is_gate_page};
pub use crate::output::{parse_status_document, write_status_file};
pub use crate::pipeline::{scrape_line_status, PhaseFailure};
pub use crate::resolver::resolve_redirect;
pub use crate::status::fetch_status;
pub use crate::types::{GateResponse, Options, RedirectTarget};
