mod common;

use acumatica_client::{
    AcumaticaClient, AcumaticaError, EntityId, F, Invocation, ModelError, QueryOptions,
};
use common::{OLD_VERSION, config, entity_path, mount_instance, swagger};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_bytes, body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn connect(server: &MockServer, cache: &TempDir) -> AcumaticaClient {
    mount_instance(server, &swagger()).await;
    AcumaticaClient::connect(config(server, cache.path()))
        .await
        .unwrap()
}

#[tokio::test]
async fn get_list_sends_query_options() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(entity_path("Contact")))
        .and(query_param("$filter", "(Active eq true)"))
        .and(query_param("$select", "DisplayName,Email"))
        .and(query_param("$top", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "1", "DisplayName": {"value": "Jane Doe"}}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    let cache = TempDir::new().unwrap();
    let client = connect(&server, &cache).await;

    let options = QueryOptions::new()
        .filter(F::field("Active").eq(true))
        .select(["DisplayName", "Email"])
        .top(5);
    let body = client
        .service("Contact")
        .unwrap()
        .get_list(Some(options), None)
        .await
        .unwrap();
    assert_eq!(body, Some(json!([{"id": "1", "DisplayName": {"value": "Jane Doe"}}])));
}

#[tokio::test]
async fn get_by_id_joins_compound_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(entity_path("Contact/SO,000123")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "7"})))
        .expect(1)
        .mount(&server)
        .await;
    let cache = TempDir::new().unwrap();
    let client = connect(&server, &cache).await;

    let body = client
        .service("Contact")
        .unwrap()
        .get_by_id(vec!["SO", "000123"], None, None)
        .await
        .unwrap();
    assert_eq!(body, Some(json!({"id": "7"})));
}

#[tokio::test]
async fn typed_helpers_honor_a_version_override() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/entity/Default/{OLD_VERSION}/Contact")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/entity/Default/{OLD_VERSION}/Contact/42")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let cache = TempDir::new().unwrap();
    let client = connect(&server, &cache).await;
    let contacts = client.service("Contact").unwrap();

    let listed = contacts.get_list(None, Some(OLD_VERSION)).await.unwrap();
    assert_eq!(listed, Some(json!([])));
    let deleted = contacts.delete_by_id("42", Some(OLD_VERSION)).await.unwrap();
    assert_eq!(deleted, None);
}

#[tokio::test]
async fn put_entity_sends_the_model_payload() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(entity_path("Contact")))
        .and(query_param("$expand", "Address"))
        .and(body_partial_json(json!({
            "DisplayName": {"value": "Jane Doe"},
            "Email": {"value": "jane@example.com"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "42",
            "DisplayName": {"value": "Jane Doe"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    let cache = TempDir::new().unwrap();
    let client = connect(&server, &cache).await;

    let mut contact = client.models().instantiate("Contact").unwrap();
    contact.set("DisplayName", "Jane Doe").unwrap();
    contact.set("Email", "jane@example.com").unwrap();

    let saved = client
        .service("Contact")
        .unwrap()
        .put_entity(contact, Some(QueryOptions::new().expand(["Address"])), None)
        .await
        .unwrap()
        .unwrap();
    let saved = client.decode("Contact", &saved).unwrap();
    assert_eq!(saved.get("id").unwrap().as_str(), Some("42"));
}

#[tokio::test]
async fn delete_returns_nothing_on_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(entity_path("Contact/42")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let cache = TempDir::new().unwrap();
    let client = connect(&server, &cache).await;

    let body = client
        .service("Contact")
        .unwrap()
        .delete_by_id("42", None)
        .await
        .unwrap();
    assert_eq!(body, None);
}

#[tokio::test]
async fn action_prunes_entity_and_wraps_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(entity_path("Contact/SendEmail")))
        .and(body_json(json!({
            "entity": {"id": "42"},
            "parameters": {"Subject": {"value": "Hello"}}
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;
    let cache = TempDir::new().unwrap();
    let client = connect(&server, &cache).await;
    let contacts = client.service("Contact").unwrap();

    let invocation = json!({
        "entity": {"id": "42", "DisplayName": {"value": null}, "Activities": []},
        "parameters": {"Subject": "Hello"}
    });
    let invocation = invocation.as_object().unwrap().clone();

    // By action name and by generated method name.
    contacts
        .invoke_action("SendEmail", invocation.clone(), None)
        .await
        .unwrap();
    contacts
        .invoke_action("invoke_action_send_email", invocation, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn action_without_parameters_omits_them() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(entity_path("Contact/SendEmail")))
        .and(body_json(json!({"entity": {"id": "42"}})))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    let cache = TempDir::new().unwrap();
    let client = connect(&server, &cache).await;

    let invocation = json!({"entity": {"id": "42"}, "parameters": {}});
    client
        .service("Contact")
        .unwrap()
        .invoke_action("SendEmail", invocation.as_object().unwrap().clone(), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn put_file_sends_bytes_and_comment() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(entity_path("Contact/42/files/notes.txt")))
        .and(header("PX-CbFileComment", "Signed copy"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_bytes(b"hello".to_vec()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let cache = TempDir::new().unwrap();
    let client = connect(&server, &cache).await;

    let body = client
        .service("Contact")
        .unwrap()
        .put_file("42", "notes.txt", &b"hello"[..], Some("Signed copy".into()), None)
        .await
        .unwrap();
    assert_eq!(body, None);
}

#[tokio::test]
async fn ad_hoc_schema_uses_its_own_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(entity_path("Contact/$adHocSchema")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"custom": {}})))
        .expect(1)
        .mount(&server)
        .await;
    let cache = TempDir::new().unwrap();
    let client = connect(&server, &cache).await;

    let body = client
        .service("Contact")
        .unwrap()
        .get_ad_hoc_schema(None)
        .await
        .unwrap();
    assert_eq!(body, Some(json!({"custom": {}})));
}

#[tokio::test]
async fn api_version_overrides_the_endpoint_version_per_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/entity/Default/23.200.001/Customer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    let cache = TempDir::new().unwrap();
    let client = connect(&server, &cache).await;

    let body = client
        .service("Customer")
        .unwrap()
        .call("get_list", Invocation::List { options: None }, Some("23.200.001"))
        .await
        .unwrap();
    assert_eq!(body, Some(json!([])));
}

#[tokio::test]
async fn misuse_is_reported_before_any_request() {
    let server = MockServer::start().await;
    let cache = TempDir::new().unwrap();
    let client = connect(&server, &cache).await;

    assert!(matches!(
        client.service("Invoice"),
        Err(ModelError::UnknownService { .. })
    ));

    let customers = client.service("Customer").unwrap();
    let err = customers.delete_by_id("C1", None).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Service 'Customer' has no method 'delete'"
    );

    let err = customers
        .call(
            "get_list",
            Invocation::Delete {
                id: EntityId::from("C1"),
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AcumaticaError::Model(ModelError::ArgumentMismatch { .. })
    ));
}

#[tokio::test]
async fn server_errors_carry_the_exception_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(entity_path("Customer")))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_json(json!({"exceptionMessage": "CustomerID cannot be empty."})),
        )
        .mount(&server)
        .await;
    let cache = TempDir::new().unwrap();
    let client = connect(&server, &cache).await;

    let err = client
        .service("Customer")
        .unwrap()
        .get_list(None, None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(422));
    assert!(err.to_string().contains("CustomerID cannot be empty."));
}

#[tokio::test]
async fn inquiries_query_the_odata_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/t/Company/api/odata/gi/IN-Inventory%20Summary"))
        .and(query_param("$top", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [
            {"InventoryID": "AALEGO500", "OnHand": 12.0}
        ]})))
        .expect(1)
        .mount(&server)
        .await;
    let cache = TempDir::new().unwrap();
    let client = connect(&server, &cache).await;

    let body = client
        .inquiries()
        .call("in_inventory_summary", Some(QueryOptions::new().top(2)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(body["value"][0]["InventoryID"], "AALEGO500");

    let err = client.inquiries().call("gl_trial_balance", None).await.unwrap_err();
    assert!(matches!(
        err,
        AcumaticaError::Model(ModelError::UnknownMethod { .. })
    ));
}
