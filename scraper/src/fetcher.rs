use crate::budget::AttemptBudget;
use crate::client::{Client, HttpResponse};
use crate::errors::ScrapeError;
use crate::gate::classify_response;
use crate::imports::*;
use crate::resolver::resolve_redirect;
use crate::script::Limits;
use crate::types::GateResponse;

/// Where a fetch currently stands. Every `Requesting` step costs one attempt from the run's budget.
#[derive(Debug)]
enum FetchState {
    Requesting(String),
    NeedsRedirect(String),
    Resolved(HttpResponse),
    Failed(anyhow::Error),
}

/// Loads pages through the site's obfuscation gate, following computed redirects until a real page comes back.
pub struct GatedFetcher<'a> {
    client: &'a Client,
    script_limits: Limits,
}

impl<'a> GatedFetcher<'a> {
    pub fn new(client: &'a Client, script_limits: Limits) -> GatedFetcher<'a> {
        GatedFetcher { client, script_limits }
    }

    pub fn client(&self) -> &'a Client {
        self.client
    }

    pub fn script_limits(&self) -> Limits {
        self.script_limits
    }

    async fn step(&self, state: FetchState, budget: &mut AttemptBudget) -> FetchState {
        match state {
            FetchState::Requesting(path) => {
                if let Err(error) = budget.consume() {
                    return FetchState::Failed(error.into());
                }
                info!("Load page {}", path);
                debug!("Attempt {} of {}", budget.used(), budget.ceiling());
                let response = match self.client.get(&path).await {
                    Ok(response) => response,
                    Err(error) => return FetchState::Failed(error),
                };
                match classify_response(response.status, &response.body) {
                    GateResponse::RealPage => FetchState::Resolved(response),
                    GateResponse::ObfuscationGate => {
                        debug!("Gate page from {:?}:\n{}", response.url, response.body);
                        FetchState::NeedsRedirect(response.body)
                    }
                    GateResponse::Unrecognized => FetchState::Failed(
                        ScrapeError::UnexpectedResponseShape {
                            url: response.url,
                            status: response.status.as_u16(),
                            detail: "neither a page nor a gate",
                        }
                        .into(),
                    ),
                }
            }
            FetchState::NeedsRedirect(body) => match resolve_redirect(&body, self.script_limits) {
                Ok(target) => {
                    info!("Gate redirects to: {}", target);
                    FetchState::Requesting(target.into_path())
                }
                Err(error) => FetchState::Failed(error),
            },
            state @ (FetchState::Resolved(_) | FetchState::Failed(_)) => state,
        }
    }

    /// Fetches `path`, resolving any gate pages on the way. Returns the first real page.
    pub async fn fetch(&self, path: &str, budget: &mut AttemptBudget) -> Result<HttpResponse> {
        let mut state = FetchState::Requesting(path.to_string());
        loop {
            state = match state {
                FetchState::Resolved(response) => return Ok(response),
                FetchState::Failed(error) => return Err(error.context(format!("Failed to load page: {}", path))),
                state => self.step(state, budget).await,
            };
        }
    }
}
