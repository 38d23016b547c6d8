use crate::budget::AttemptBudget;
use crate::constants::*;
use crate::fetcher::GatedFetcher;
use crate::gate::is_gate_page;
use crate::imports::*;
use crate::resolver::resolve_redirect;

async fn post_until_ungated(fetcher: &GatedFetcher<'_>, budget: &mut AttemptBudget) -> Result<String> {
    let client = fetcher.client();
    loop {
        budget.consume()?;
        info!("Load page {}", STATUS_PATH);
        debug!("Attempt {} of {}", budget.used(), budget.ceiling());
        let response = client.post_form(STATUS_PATH, STATUS_FORM).await?;
        if !is_gate_page(&response.body) {
            debug!("Line status body from {:?} (HTTP {}):\n{}", response.url, response.status, response.body);
            return Ok(response.body);
        }
        debug!("Gate page from {:?}:\n{}", response.url, response.body);
        let target = resolve_redirect(&response.body, fetcher.script_limits())?;
        info!("Status query gated, visiting: {}", target);
        fetcher.fetch(target.as_str(), budget).await?;
    }
}

/// Posts the line status query and returns its raw body, whatever its HTTP status; the JSON parse judges it.
///
/// A gate in front of the query is resolved by loading the computed target through `fetcher`, which plants the
/// session cookies the site wants, and then posting the query again. Every post counts against `budget`.
pub async fn fetch_status(fetcher: &GatedFetcher<'_>, budget: &mut AttemptBudget) -> Result<String> {
    post_until_ungated(fetcher, budget).await.context("Failed to fetch line status")
}
