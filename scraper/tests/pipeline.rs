use anyhow::Result;
use serde_json::json;
use shmetro_scraper::script::Limits;
use shmetro_scraper::{scrape_line_status, AttemptBudget, Client, GatedFetcher, Options, ScrapeError};
use std::path::Path;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LANDING: &str = "/gxyxqk/index.jhtml";
const REAL_PAGE: &str = "<!DOCTYPE html><html><head><title>Metro</title></head><body>ok</body></html>";

// Built like the site's gate: the navigation is XOR-encoded, decoded by an inner `eval` and run by the last one.
fn gate_page(target: &str, key: u8) -> String {
    let navigation = format!("location=\"{}\"", target);
    let codes: Vec<String> = navigation.bytes().map(|b| format!("0x{:x}", (u16::from(b ^ key) + 3) & 0xff)).collect();
    format!(
        "<html><body><script language=\"javascript\"> window.onload=setTimeout(\"cx({key})\", 200); \
         function cx(KR) {{ var qo, po = \"\", oo = [{codes}]; \
         qo = \"qo=oo.length-1; do{{oo[qo]=(oo[qo]-3)&0xff;}}while(--qo>=0);\"; eval(qo); \
         for (qo = 0; qo < oo.length; qo++) po += String.fromCharCode(oo[qo] ^ KR); \
         eval(\"qo=eval;qo(po);\"); }} </script> </body></html>",
        key = key,
        codes = codes.join(",")
    )
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(body.into())
}

fn options(server: &MockServer, output_file: &Path) -> Options {
    Options {
        host: server.uri(),
        output_file: output_file.to_path_buf(),
        max_attempts: 10,
        script_timeout_ms: 2000,
        request_timeout_secs: Some(10),
    }
}

async fn mount_status(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/i/sm"))
        .and(query_param("method", "doGetAllLineStatus"))
        .and(body_string("method=doGetAllLineStatus"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_gated_landing_and_status_write_pretty_json() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LANDING))
        .and(query_param("token", "a1b2c3"))
        .respond_with(html(REAL_PAGE))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LANDING))
        .respond_with(html(gate_page("/gxyxqk/index.jhtml?token=a1b2c3", 77)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/i/sm"))
        .respond_with(html(gate_page("/status?t=xyz", 19)))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .and(query_param("t", "xyz"))
        .respond_with(html(REAL_PAGE))
        .expect(1)
        .mount(&server)
        .await;
    mount_status(&server, html(r#"{"result":[{"line":"1","status":"normal"}]}"#)).await;

    let dir = tempfile::tempdir()?;
    let output_file = dir.path().join("status.json");
    scrape_line_status(&options(&server, &output_file)).await.map_err(|failure| failure.error)?;

    let written = std::fs::read_to_string(&output_file)?;
    assert!(written.starts_with("{\n    \"result\": [\n        {\n"));
    assert_eq!(serde_json::from_str::<serde_json::Value>(&written)?, json!({"result": [{"line": "1", "status": "normal"}]}));
    Ok(())
}

#[tokio::test]
async fn test_invalid_status_json_leaves_previous_file() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path(LANDING)).respond_with(html(REAL_PAGE)).mount(&server).await;
    mount_status(&server, html("<!DOCTYPE html><p>maintenance</p>")).await;

    let dir = tempfile::tempdir()?;
    let output_file = dir.path().join("status.json");
    std::fs::write(&output_file, "previous")?;
    let failure = scrape_line_status(&options(&server, &output_file)).await.unwrap_err();

    assert!(matches!(ScrapeError::find(&failure.error), Some(ScrapeError::DownstreamParseError(_))));
    assert_eq!(failure.exit_code(), 3);
    assert_eq!(std::fs::read_to_string(&output_file)?, "previous");
    Ok(())
}

#[tokio::test]
async fn test_perpetual_gate_exhausts_budget() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LANDING))
        .respond_with(html(gate_page("/gxyxqk/index.jhtml?token=again", 5)))
        .expect(10)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let failure = scrape_line_status(&options(&server, &dir.path().join("status.json"))).await.unwrap_err();

    assert!(matches!(ScrapeError::find(&failure.error), Some(ScrapeError::RetryExceeded { ceiling: 10 })));
    assert_eq!(failure.exit_code(), 2);
    assert!(!dir.path().join("status.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_status_posts_share_the_budget() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path(LANDING)).respond_with(html(REAL_PAGE)).expect(1).mount(&server).await;
    Mock::given(method("POST")).and(path("/i/sm")).respond_with(html("[]")).expect(0).mount(&server).await;

    let dir = tempfile::tempdir()?;
    let mut options = options(&server, &dir.path().join("status.json"));
    options.max_attempts = 1;
    let failure = scrape_line_status(&options).await.unwrap_err();

    assert!(matches!(ScrapeError::find(&failure.error), Some(ScrapeError::RetryExceeded { ceiling: 1 })));
    assert_eq!(failure.exit_code(), 2);
    Ok(())
}

#[tokio::test]
async fn test_real_page_is_returned_without_resolving() -> Result<()> {
    let server = MockServer::start().await;
    // Carries the gate marker too, with a script that would fail to resolve.
    let page = "<!DOCTYPE html><html><body><script language=\"javascript\">broken(</script></body></html>";
    Mock::given(method("GET")).and(path(LANDING)).respond_with(html(page)).expect(1).mount(&server).await;

    let client = Client::new(&server.uri(), None)?;
    let fetcher = GatedFetcher::new(&client, Limits::default());
    let mut budget = AttemptBudget::new(10);
    let response = fetcher.fetch(LANDING, &mut budget).await?;

    assert_eq!(response.body, page);
    assert_eq!(budget.used(), 1);
    Ok(())
}

#[tokio::test]
async fn test_unrecognized_landing_responses_fail() -> Result<()> {
    for response in [html("{\"not\":\"html\"}"), ResponseTemplate::new(503).set_body_string(gate_page("/x", 1))] {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path(LANDING)).respond_with(response).expect(1).mount(&server).await;

        let dir = tempfile::tempdir()?;
        let failure = scrape_line_status(&options(&server, &dir.path().join("status.json"))).await.unwrap_err();

        assert!(matches!(ScrapeError::find(&failure.error), Some(ScrapeError::UnexpectedResponseShape { .. })));
        assert_eq!(failure.exit_code(), 2);
    }
    Ok(())
}

#[tokio::test]
async fn test_malformed_gate_fails_landing() -> Result<()> {
    let server = MockServer::start().await;
    let gate = "<html><body><script language=\"javascript\">eval('location=nowhere');</script></body></html>";
    Mock::given(method("GET")).and(path(LANDING)).respond_with(html(gate)).expect(1).mount(&server).await;

    let dir = tempfile::tempdir()?;
    let failure = scrape_line_status(&options(&server, &dir.path().join("status.json"))).await.unwrap_err();

    assert!(matches!(ScrapeError::find(&failure.error), Some(ScrapeError::MalformedGatePage(_))));
    assert_eq!(failure.exit_code(), 2);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_host_is_a_landing_transport_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let options = Options {
        host: "http://127.0.0.1:1".to_string(),
        output_file: dir.path().join("status.json"),
        max_attempts: 10,
        script_timeout_ms: 2000,
        request_timeout_secs: Some(5),
    };
    let failure = scrape_line_status(&options).await.unwrap_err();

    assert!(matches!(ScrapeError::find(&failure.error), Some(ScrapeError::TransportError { .. })));
    assert_eq!(failure.exit_code(), 2);
    Ok(())
}
