use reqwest::StatusCode;

use crate::errors::ScrapeError;
use crate::imports::*;

#[derive(Debug)]
pub struct HttpResponse {
    pub url: String,
    pub status: StatusCode,
    pub body: String,
}

/// HTTP client bound to one origin. Cookies set by the site are kept for the lifetime of the client only.
#[derive(Debug)]
pub struct Client {
    host: String,
    reqwest_client: reqwest::Client,
}

impl Client {
    pub fn new(host: &str, request_timeout: Option<Duration>) -> Result<Client> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let reqwest_client = builder.build().context("Failed to build HTTP client")?;
        Ok(Client { host: host.trim_end_matches('/').to_string(), reqwest_client })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    pub async fn get(&self, path: &str) -> Result<HttpResponse> {
        let url = self.url(path);
        let response = self.reqwest_client.get(&url).send().await;
        read_response(url, response).await
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<HttpResponse> {
        let url = self.url(path);
        let response = self.reqwest_client.post(&url).form(form).send().await;
        read_response(url, response).await
    }
}

async fn read_response(url: String, response: reqwest::Result<reqwest::Response>) -> Result<HttpResponse> {
    let inner = async {
        let response = response?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body)) as reqwest::Result<_>
    };
    match inner.await {
        Ok((status, body)) => Ok(HttpResponse { url, status, body }),
        Err(source) => Err(ScrapeError::TransportError { url, source }.into()),
    }
}
