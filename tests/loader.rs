use sec_insights::loader::{DocumentLoader, UrlLoader};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetches_text_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sec-edgar-filings/AAPL/10-K/x/primary-document.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Item 1. Business"))
        .mount(&server)
        .await;

    let loader = UrlLoader::new(5).unwrap();
    let text = loader
        .load(&format!(
            "{}/sec-edgar-filings/AAPL/10-K/x/primary-document.pdf",
            server.uri()
        ))
        .await
        .unwrap();
    assert_eq!(text, "Item 1. Business");
}

#[tokio::test]
async fn http_error_status_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let loader = UrlLoader::new(5).unwrap();
    let err = loader
        .load(&format!("{}/private.pdf", server.uri()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("403"));
}
