//! Shared fixtures: a small contract-based schema, inquiry metadata and a
//! wiremock instance that serves them.

#![allow(dead_code)]

use std::path::Path;

use acumatica_client::{CacheConfig, ClientConfig};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const VERSION: &str = "24.200.001";
pub const OLD_VERSION: &str = "23.200.001";

pub const METADATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
    <Schema Namespace="Default" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <EntityType Name="AccountDetailsType">
        <Property Name="AccountID" Type="Edm.String"/>
        <Property Name="Balance" Type="Edm.Decimal"/>
      </EntityType>
      <EntityType Name="InventorySummaryType">
        <Property Name="InventoryID" Type="Edm.String"/>
        <Property Name="OnHand" Type="Edm.Decimal"/>
      </EntityType>
      <EntityContainer Name="Default">
        <EntitySet Name="Account Details" EntityType="Default.AccountDetailsType"/>
        <EntitySet Name="IN-Inventory Summary" EntityType="Default.InventorySummaryType"/>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;

fn sref(name: &str) -> Value {
    json!({"$ref": format!("#/components/schemas/{name}")})
}

fn body(model: &str) -> Value {
    json!({"content": {"application/json": {"schema": sref(model)}}})
}

fn ids() -> Value {
    json!([{"name": "ids", "in": "path", "required": true, "schema": {"type": "string"}}])
}

/// Contact with every operation kind, plus a read-only Customer service.
pub fn swagger() -> Value {
    json!({
        "openapi": "3.0.1",
        "info": {"title": "Default/24.200.001", "version": VERSION},
        "paths": {
            "/Contact": {
                "get": {
                    "tags": ["Contact"],
                    "operationId": "Contact_GetList",
                    "summary": "Retrieves records",
                    "responses": {"200": {"content": {"application/json": {"schema": {
                        "type": "array", "items": sref("Contact")
                    }}}}}
                },
                "put": {
                    "tags": ["Contact"],
                    "operationId": "Contact_PutEntity",
                    "summary": "Creates or updates a record",
                    "requestBody": body("Contact"),
                    "responses": {"200": {"content": {"application/json": {"schema": sref("Contact")}}}}
                }
            },
            "/Contact/{ids}": {
                "get": {
                    "tags": ["Contact"],
                    "operationId": "Contact_GetById",
                    "parameters": ids(),
                    "responses": {"200": {"content": {"application/json": {"schema": sref("Contact")}}}}
                },
                "delete": {
                    "tags": ["Contact"],
                    "operationId": "Contact_DeleteById",
                    "parameters": ids(),
                    "responses": {"204": {"description": "No Content"}}
                }
            },
            "/Contact/SendEmail": {
                "post": {
                    "tags": ["Contact"],
                    "operationId": "Contact_InvokeAction_SendEmail",
                    "requestBody": body("SendEmail"),
                    "responses": {"202": {"description": "Accepted"}, "204": {"description": "No Content"}}
                }
            },
            "/Contact/$adHocSchema": {
                "get": {
                    "tags": ["Contact"],
                    "operationId": "Contact_GetAdHocSchema",
                    "responses": {"200": {"content": {"application/json": {"schema": sref("Contact")}}}}
                }
            },
            "/Contact/{ids}/files/{filename}": {
                "put": {
                    "tags": ["Contact"],
                    "operationId": "Contact_PutFile",
                    "parameters": [
                        {"name": "ids", "in": "path", "required": true},
                        {"name": "filename", "in": "path", "required": true}
                    ],
                    "responses": {"204": {"description": "No Content"}}
                }
            },
            "/Customer": {
                "get": {
                    "tags": ["Customer"],
                    "operationId": "Customer_GetList",
                    "responses": {"200": {"content": {"application/json": {"schema": {
                        "type": "array", "items": sref("Customer")
                    }}}}}
                }
            }
        },
        "components": {"schemas": {
            "StringValue": {"type": "object", "properties": {"value": {"type": "string"}}},
            "BooleanValue": {"type": "object", "properties": {"value": {"type": "boolean"}}},
            "DecimalValue": {"type": "object", "properties": {"value": {"type": "number"}}},
            "Entity": {"type": "object", "properties": {
                "id": {"type": "string", "format": "uuid"},
                "rowNumber": {"type": "integer"},
                "note": sref("StringValue")
            }},
            "Address": {"allOf": [sref("Entity"), {"type": "object", "properties": {
                "City": sref("StringValue"),
                "Country": sref("StringValue")
            }}]},
            "ContactActivity": {"allOf": [sref("Entity"), {"type": "object", "properties": {
                "Summary": sref("StringValue"),
                "Contact": sref("Contact")
            }}]},
            "Contact": {"allOf": [sref("Entity"), {
                "type": "object",
                "required": ["DisplayName"],
                "properties": {
                    "DisplayName": sref("StringValue"),
                    "Email": sref("StringValue"),
                    "Active": sref("BooleanValue"),
                    "Address": sref("Address"),
                    "Activities": {"type": "array", "items": sref("ContactActivity")}
                }
            }]},
            "SendEmail": {"type": "object", "properties": {
                "entity": sref("Contact"),
                "parameters": {"type": "object", "properties": {"Subject": sref("StringValue")}}
            }},
            "Customer": {"allOf": [sref("Entity"), {"type": "object", "properties": {
                "CustomerID": sref("StringValue"),
                "Balance": sref("DecimalValue")
            }}]}
        }}
    })
}

/// [`swagger`] with one extra field on Customer.
pub fn swagger_with_customer_email() -> Value {
    let mut doc = swagger();
    doc["components"]["schemas"]["Customer"]["allOf"][1]["properties"]["Email"] =
        sref("StringValue");
    doc
}

/// Mounts login, logout, endpoint discovery, the schema at [`VERSION`] and
/// the inquiry metadata.
pub async fn mount_instance(server: &MockServer, schema: &Value) {
    mount_session(server).await;
    Mock::given(method("GET"))
        .and(path("/entity"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"endpoints": [
            {"name": "Default", "version": OLD_VERSION},
            {"name": "Default", "version": VERSION},
            {"name": "Manufacturing", "version": "23.100.001"}
        ]})))
        .mount(server)
        .await;
    mount_schema(server, VERSION, schema).await;
    mount_metadata(server).await;
}

pub async fn mount_session(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/entity/auth/login"))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/entity/auth/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
}

pub async fn mount_schema(server: &MockServer, version: &str, schema: &Value) {
    Mock::given(method("GET"))
        .and(path(format!("/entity/Default/{version}/swagger.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(schema))
        .mount(server)
        .await;
}

pub async fn mount_metadata(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/t/Company/api/odata/gi/$metadata"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(METADATA.as_bytes(), "application/xml"),
        )
        .mount(server)
        .await;
}

/// A configuration pointing at `server` with snapshots under `cache_dir`.
pub fn config(server: &MockServer, cache_dir: &Path) -> ClientConfig {
    ClientConfig::builder(server.uri(), "admin", "secret", "Company")
        .cache(CacheConfig {
            dir: Some(cache_dir.to_path_buf()),
            ..CacheConfig::default()
        })
        .build()
        .unwrap()
}

/// Entity URL path for `segments` under the current version.
pub fn entity_path(segments: &str) -> String {
    format!("/entity/Default/{VERSION}/{segments}")
}
