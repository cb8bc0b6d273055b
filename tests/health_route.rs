use rocket::http::Status;
use rocket::routes;
use todo_api::routes::health::{HealthResponse, StatusBanner, health_check, index};
use todo_api::test_support::TestRocketBuilder;

#[test]
fn health_endpoint_returns_ok() {
    let client = TestRocketBuilder::new()
        .mount_routes(routes![health_check])
        .blocking_client();

    let response = client.get("/health").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let payload: HealthResponse = response.into_json().expect("valid JSON payload");
    assert_eq!(payload.status, "ok");
}

#[test]
fn root_banner_reports_running() {
    let client = TestRocketBuilder::new()
        .mount_routes(routes![index])
        .blocking_client();

    let response = client.get("/").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let payload: StatusBanner = response.into_json().expect("valid JSON payload");
    assert_eq!(payload.status, "success");
    assert_eq!(payload.database, "connected");
}
