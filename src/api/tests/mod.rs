use super::*;
use crate::pipeline::test_helpers::{FakeConverter, FakeGenerator, test_png_bytes};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;


const BOUNDARY: &str = "test-boundary-7f3a";

/// Router plus a handle to the pipeline behind it
fn test_app(generator: Arc<FakeGenerator>) -> (Router, Arc<AssetPipeline>) {
    let mut config = Config::default();
    config.pipeline.max_concurrent_tasks = 2;
    let pipeline = Arc::new(AssetPipeline::with_collaborators(
        config.clone(),
        generator,
        Arc::new(FakeConverter::Slides(2)),
    ));
    let router = create_router(pipeline.clone(), Arc::new(config));
    (router, pipeline)
}

/// Build a multipart body: (field name, optional filename, bytes) per part
fn multipart_body(parts: &[(&str, Option<&str>, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(parts: &[(&str, Option<&str>, Vec<u8>)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/batches")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Submit a two-image batch and return its id
async fn submit_two_images(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(upload_request(&[
            ("files", Some("a.png"), test_png_bytes(1)),
            ("files", Some("b.png"), test_png_bytes(2)),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    body["batch_id"].as_str().unwrap().to_string()
}

/// Poll GET /batches/:id until the batch reports completed
async fn wait_for_completed(app: &Router, id: &str) -> serde_json::Value {
    for _ in 0..500 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/batches/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        if body["state"] == "completed" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("batch {id} did not complete in time");
}
