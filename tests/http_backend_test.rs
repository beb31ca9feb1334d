mod common;

use common::http_responder;
use rust_asset_backend::config::CdnConfig;
use rust_asset_backend::models::VerifyReport;
use rust_asset_backend::services::cdn::{AssetDeleter, CdnDeleter, DeletionStatus};
use rust_asset_backend::services::verifier::{HttpProbe, ReachabilityProbe, ReachabilityVerifier};
use std::sync::Arc;
use std::time::Duration;

fn cdn_config(api_base: String) -> CdnConfig {
    CdnConfig {
        cloud_name: "demo".to_string(),
        api_key: "key123".to_string(),
        api_secret: "shh".to_string(),
        api_base,
        host: None,
    }
}

#[tokio::test]
async fn test_probe_reports_status_without_body() {
    let (base, requests) = http_responder(403, "").await;
    let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();

    let status = probe.head(&format!("{}/Images/photo1.png", base)).await.unwrap();
    assert_eq!(status, 403);

    let requests = requests.lock().unwrap();
    assert!(requests[0].starts_with("HEAD /Images/photo1.png HTTP/1.1"));
}

#[tokio::test]
async fn test_verifier_over_http() {
    let (base, _requests) = http_responder(200, "").await;
    let verifier =
        ReachabilityVerifier::new(Arc::new(HttpProbe::new(Duration::from_secs(5)).unwrap()));

    let report = verifier.verify(&format!("{}/Images/photo1.png", base)).await;
    assert_eq!(
        report,
        VerifyReport {
            reachable: true,
            http_status: Some(200)
        }
    );
}

#[tokio::test]
async fn test_verifier_treats_refused_connection_as_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let verifier =
        ReachabilityVerifier::new(Arc::new(HttpProbe::new(Duration::from_secs(2)).unwrap()));
    let report = verifier.verify(&format!("http://{}/x.png", addr)).await;
    assert_eq!(report, VerifyReport::unreachable(None));
}

#[tokio::test]
async fn test_cdn_destroy_is_signed() {
    let (base, requests) = http_responder(200, r#"{"result":"ok"}"#).await;
    let deleter = CdnDeleter::new(cdn_config(base));

    let status = deleter.delete("folder/old123").await.unwrap();
    assert_eq!(status, DeletionStatus::Deleted);

    let requests = requests.lock().unwrap();
    let request = &requests[0];
    assert!(request.starts_with("POST /demo/image/destroy HTTP/1.1"));
    assert!(request.contains("public_id=folder%2Fold123"));
    assert!(request.contains("api_key=key123"));
    assert!(request.contains("signature_algorithm=sha256"));
    assert!(request.contains("signature="));
}

#[tokio::test]
async fn test_cdn_not_found_is_not_an_error() {
    let (base, _requests) = http_responder(200, r#"{"result":"not found"}"#).await;
    let deleter = CdnDeleter::new(cdn_config(base));

    assert_eq!(
        deleter.delete("folder/gone").await.unwrap(),
        DeletionStatus::NotFound
    );
}

#[tokio::test]
async fn test_cdn_rejection_is_an_error() {
    let (base, _requests) =
        http_responder(401, r#"{"error":{"message":"Invalid Signature"}}"#).await;
    let deleter = CdnDeleter::new(cdn_config(base));

    let err = deleter.delete("folder/old123").await.unwrap_err();
    assert!(err.to_string().contains("Invalid Signature"));
}
