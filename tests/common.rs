use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, Response};
use axum::Router;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use prometheus::Registry;
use reqmetrics::config::{extract_config, ConfigV1};
use reqmetrics::routes::create_router;
use reqmetrics::startup::build_state;

pub fn load_test_config(yaml: &str) -> ConfigV1 {
    extract_config(&Figment::new().merge(Yaml::string(yaml)))
        .expect("Failed to parse test config YAML")
}

pub fn build_app(config: ConfigV1) -> Router {
    build_app_with_registry(config, Arc::new(Registry::new()))
}

pub fn build_app_with_registry(config: ConfigV1, registry: Arc<Registry>) -> Router {
    let state = build_state(Arc::new(config), registry).expect("recorder should build");
    create_router(state)
}

pub fn request(path: &str, method: Method) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    String::from_utf8(bytes.to_vec()).expect("body is not UTF-8")
}
