use std::fmt;

use crate::budget::AttemptBudget;
use crate::client::Client;
use crate::constants::*;
use crate::errors::{exit_code, Phase};
use crate::fetcher::GatedFetcher;
use crate::imports::*;
use crate::output::{parse_status_document, write_status_file};
use crate::status::fetch_status;
use crate::types::Options;

/// A failed run: the error chain plus the phase it surfaced in.
#[derive(Debug)]
pub struct PhaseFailure {
    pub phase: Phase,
    pub error: anyhow::Error,
}

impl PhaseFailure {
    pub fn exit_code(&self) -> i32 {
        exit_code(&self.error, self.phase)
    }
}

impl fmt::Display for PhaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} phase failed: {:#}", self.phase, self.error)
    }
}

trait InPhase<T> {
    fn in_phase(self, phase: Phase) -> Result<T, PhaseFailure>;
}

impl<T> InPhase<T> for Result<T> {
    fn in_phase(self, phase: Phase) -> Result<T, PhaseFailure> {
        self.map_err(|error| PhaseFailure { phase, error })
    }
}

/// Loads the landing page to obtain a session, queries the line status and writes it to the output file.
pub async fn scrape_line_status(options: &Options) -> Result<(), PhaseFailure> {
    let client = Client::new(&options.host, options.request_timeout()).in_phase(Phase::Page)?;
    let fetcher = GatedFetcher::new(&client, options.script_limits());
    let mut budget = AttemptBudget::new(options.max_attempts);

    fetcher.fetch(LANDING_PATH, &mut budget).await.in_phase(Phase::Page)?;

    let body = fetch_status(&fetcher, &mut budget).await.in_phase(Phase::Status)?;
    let document = parse_status_document(&body).in_phase(Phase::Status)?;
    write_status_file(&options.output_file, &document).in_phase(Phase::Status)?;
    info!("Done after {} of {} attempts", budget.used(), budget.ceiling());
    Ok(())
}
