use fake_client::FakeClient;
use futures_util::TryStreamExt;
use serde_json::{Value, json};
use std::sync::Arc;
use topaz_core::{
    CallOptions, ClientError, Directory, DirectoryConfig, ExportOption, ImportRequest,
    ServiceKind,
    client::{NullProxy, ServiceClient},
    config::{BaseConfig, ServiceConfig},
};

mod fake_client;

fn shared(client: &Arc<FakeClient>) -> Arc<dyn ServiceClient> {
    client.clone()
}

/// A directory whose every service is served by `fake`, except the writer which is unconfigured.
fn directory_without_writer(fake: &Arc<FakeClient>) -> Directory {
    Directory::from_clients(|kind| match kind {
        ServiceKind::Writer => Arc::new(NullProxy::new(kind)) as Arc<dyn ServiceClient>,
        _ => shared(fake),
    })
    .unwrap()
}

fn directory(fake: &Arc<FakeClient>) -> Directory {
    Directory::from_clients(|_| shared(fake)).unwrap()
}

fn options() -> CallOptions {
    CallOptions::default()
}

#[tokio::test]
async fn reads_through_configured_reader_and_rejects_unconfigured_writer() {
    let fake = Arc::new(FakeClient::new());
    fake.respond(
        "GetObject",
        vec![json!({"result": {"type": "user", "id": "rick@the-citadel.com", "etag": "42"}})],
    );
    let directory = directory_without_writer(&fake);

    let object = directory
        .object(
            json!({"objectType": "user", "objectId": "rick@the-citadel.com"}),
            options(),
        )
        .await
        .unwrap();
    let err = directory
        .set_object(json!({"object": object["result"]}), options())
        .await
        .unwrap_err();

    assert_eq!(
        object,
        json!({
            "relations": [],
            "result": {
                "type": "user",
                "id": "rick@the-citadel.com",
                "displayName": "",
                "etag": "42"
            }
        })
    );
    assert_eq!(
        err.to_string(),
        "Cannot call 'setObject', 'Writer' is not configured."
    );
    assert_eq!(fake.calls().len(), 1);
}

#[tokio::test]
async fn every_method_of_an_unconfigured_directory_rejects() {
    let directory = Directory::new(&DirectoryConfig::default()).unwrap();
    let body = json!({});

    let results: Vec<(&str, ServiceKind, ClientError)> = vec![
        ("check", ServiceKind::Reader, directory.check(body.clone(), options()).await.unwrap_err()),
        ("checks", ServiceKind::Reader, directory.checks(body.clone(), options()).await.unwrap_err()),
        ("getObject", ServiceKind::Reader, directory.object(body.clone(), options()).await.unwrap_err()),
        ("getObjects", ServiceKind::Reader, directory.objects(body.clone(), options()).await.unwrap_err()),
        ("getObjectMany", ServiceKind::Reader, directory.object_many(body.clone(), options()).await.unwrap_err()),
        ("getRelation", ServiceKind::Reader, directory.relation(body.clone(), options()).await.unwrap_err()),
        ("getRelations", ServiceKind::Reader, directory.relations(body.clone(), options()).await.unwrap_err()),
        ("getGraph", ServiceKind::Reader, directory.graph(body.clone(), options()).await.unwrap_err()),
        ("setObject", ServiceKind::Writer, directory.set_object(body.clone(), options()).await.unwrap_err()),
        ("deleteObject", ServiceKind::Writer, directory.delete_object(body.clone(), options()).await.unwrap_err()),
        ("setRelation", ServiceKind::Writer, directory.set_relation(body.clone(), options()).await.unwrap_err()),
        ("deleteRelation", ServiceKind::Writer, directory.delete_relation(body.clone(), options()).await.unwrap_err()),
        ("import", ServiceKind::Importer, directory.import(Vec::new(), options()).await.err().unwrap()),
        ("export", ServiceKind::Exporter, directory.export(ExportOption::Data, options()).await.err().unwrap()),
        ("getManifest", ServiceKind::Model, directory.get_manifest(options()).await.unwrap_err()),
        ("setManifest", ServiceKind::Model, directory.set_manifest("model:", options()).await.unwrap_err()),
        ("deleteManifest", ServiceKind::Model, directory.delete_manifest(options()).await.unwrap_err()),
    ];

    for (method, service, err) in results {
        assert_eq!(
            err.to_string(),
            format!("Cannot call '{method}', '{service}' is not configured.")
        );
    }
}

#[tokio::test]
async fn unconfigured_service_wins_over_invalid_requests() {
    let fake = Arc::new(FakeClient::new());
    let directory = directory_without_writer(&fake);

    let err = directory
        .set_object(json!({"object": "not an object"}), options())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::NotConfigured { service: ServiceKind::Writer, .. }));
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_sending() {
    let fake = Arc::new(FakeClient::new());
    let directory = directory(&fake);

    let err = directory
        .object(json!({"objectType": ["user"]}), options())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::InvalidRequest { ref method, .. } if method == "getObject"));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn set_object_strips_server_timestamps() {
    let fake = Arc::new(FakeClient::new());
    let directory = directory(&fake);

    directory
        .set_object(
            json!({"object": {
                "type": "user",
                "id": "morty",
                "createdAt": "2023-01-01T00:00:00Z",
                "updatedAt": "2023-06-01T00:00:00Z"
            }}),
            options(),
        )
        .await
        .unwrap();

    let calls = fake.calls();
    assert_eq!(calls[0].method, "SetObject");
    let object = &calls[0].request["object"];
    assert_eq!(object["id"], json!("morty"));
    assert!(object.get("createdAt").is_none());
    assert!(object.get("updatedAt").is_none());
}

#[tokio::test]
async fn set_relation_strips_server_timestamps() {
    let fake = Arc::new(FakeClient::new());
    let directory = directory(&fake);

    directory
        .set_relation(
            json!({"relation": {
                "objectType": "group",
                "objectId": "admin",
                "relation": "member",
                "subjectType": "user",
                "subjectId": "morty",
                "updatedAt": "2023-06-01T00:00:00Z"
            }}),
            options(),
        )
        .await
        .unwrap();

    let calls = fake.calls();
    let relation = &calls[0].request["relation"];
    assert_eq!(relation["subjectId"], json!("morty"));
    assert!(relation.get("updatedAt").is_none());
}

#[tokio::test]
async fn list_operations_default_the_page_size() {
    let fake = Arc::new(FakeClient::new());
    let directory = directory(&fake);

    directory
        .objects(json!({"objectType": "user", "page": {}}), options())
        .await
        .unwrap();
    directory
        .relations(json!({"objectType": "group", "page": {"size": 0}}), options())
        .await
        .unwrap();
    directory
        .objects(json!({"objectType": "user"}), options())
        .await
        .unwrap();

    let calls = fake.calls();
    assert_eq!(calls[0].request["page"]["size"], json!(100));
    assert_eq!(calls[1].request["page"]["size"], json!(0));
    assert!(calls[2].request.get("page").is_none());
}

#[tokio::test]
async fn translates_remote_errors() {
    let fake = Arc::new(FakeClient::new());
    fake.fail(tonic::Status::not_found("key not found"));
    let directory = directory(&fake);

    let err = directory
        .object(json!({"objectType": "user", "objectId": "nobody"}), options())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::NotFound { ref method, ref message } if method == "getObject" && message == "key not found"));
}

#[tokio::test]
async fn streams_export_records() {
    let fake = Arc::new(FakeClient::new());
    fake.respond(
        "Export",
        vec![
            json!({"object": {"type": "user", "id": "rick"}}),
            json!({"relation": {"objectType": "group", "objectId": "admin", "relation": "member"}}),
        ],
    );
    let directory = directory(&fake);

    let stream = directory.export(ExportOption::Data, options()).await.unwrap();
    let records: Vec<Value> = directory
        .registry()
        .serialize_stream(stream)
        .try_collect()
        .await
        .unwrap();

    assert_eq!(fake.calls()[0].request, json!({"options": 24}));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["object"]["id"], json!("rick"));
    assert_eq!(records[1]["relation"]["relation"], json!("member"));
}

#[tokio::test]
async fn imports_typed_requests() {
    let fake = Arc::new(FakeClient::new());
    fake.respond(
        "Import",
        vec![json!({"counter": {"recv": "2", "set": "2", "type": "object"}})],
    );
    let directory = directory(&fake);

    let responses: Vec<_> = directory
        .import(
            vec![
                ImportRequest::set_object(json!({"type": "user", "id": "rick"})),
                ImportRequest::set_relation(json!({
                    "objectType": "group",
                    "objectId": "admin",
                    "relation": "member",
                    "subjectType": "user",
                    "subjectId": "rick"
                })),
            ],
            options(),
        )
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    let calls = fake.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].request["opCode"], json!("OPCODE_SET"));
    assert_eq!(calls[0].request["object"]["id"], json!("rick"));
    assert_eq!(calls[1].request["relation"]["subjectId"], json!("rick"));
    let counter = directory.registry().serialize(&responses[0]).unwrap();
    assert_eq!(counter["counter"]["set"], json!("2"));
}

#[tokio::test]
async fn folds_the_manifest_stream() {
    let fake = Arc::new(FakeClient::new());
    fake.respond(
        "GetManifest",
        vec![
            json!({"metadata": {"etag": "e1", "updatedAt": "2024-05-01T10:00:00Z"}}),
            // "model:\n"
            json!({"body": {"data": "bW9kZWw6Cg=="}}),
            // "  version: 3\n"
            json!({"body": {"data": "ICB2ZXJzaW9uOiAzCg=="}}),
            json!({"model": {"types": {"user": {}}}}),
        ],
    );
    let directory = directory(&fake);

    let manifest = directory.get_manifest(options()).await.unwrap();

    assert_eq!(manifest.body, "model:\n  version: 3\n");
    assert_eq!(manifest.model, json!({"types": {"user": {}}}));
    assert_eq!(manifest.etag.as_deref(), Some("e1"));
    assert_eq!(manifest.updated_at.as_deref(), Some("2024-05-01T10:00:00Z"));
}

#[tokio::test]
async fn set_manifest_sends_a_single_body_chunk() {
    let fake = Arc::new(FakeClient::new());
    let directory = directory(&fake);

    directory
        .set_manifest("model:\n  version: 3\n", options())
        .await
        .unwrap();

    let calls = fake.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "SetManifest");
    assert_eq!(
        calls[0].request,
        json!({"body": {"data": "bW9kZWw6CiAgdmVyc2lvbjogMwo="}})
    );
}

#[tokio::test]
async fn services_with_identical_settings_share_a_transport() {
    let config = DirectoryConfig {
        base: BaseConfig {
            api_key: Some("key".into()),
            tenant_id: Some("tenant".into()),
            ..Default::default()
        },
        reader: Some(ServiceConfig {
            url: Some("https://localhost:9292".into()),
            ..Default::default()
        }),
        writer: Some(ServiceConfig {
            custom_headers: [("x-writer".to_string(), "1".to_string())].into(),
            ..Default::default()
        }),
        ..Default::default()
    };

    let directory = Directory::new(&config).unwrap();

    let reader = directory.transport(ServiceKind::Reader).unwrap();
    let exporter = directory.transport(ServiceKind::Exporter).unwrap();
    let writer = directory.transport(ServiceKind::Writer).unwrap();
    assert!(Arc::ptr_eq(&reader, &exporter));
    assert!(!Arc::ptr_eq(&reader, &writer));
    assert_eq!(writer.url(), "https://localhost:9292");
}

#[tokio::test]
async fn reader_override_alone_leaves_the_writer_unconfigured() {
    let config = DirectoryConfig {
        reader: Some(ServiceConfig {
            url: Some("https://r".into()),
            api_key: Some("k1".into()),
            tenant_id: Some("t1".into()),
            ..Default::default()
        }),
        ..Default::default()
    };

    let directory = Directory::new(&config).unwrap();

    let reader = directory.transport(ServiceKind::Reader).unwrap();
    assert_eq!(reader.url(), "https://r");
    assert_eq!(reader.settings().credentials.tenant_id.as_deref(), Some("t1"));
    assert!(directory.transport(ServiceKind::Writer).is_none());

    let err = directory
        .set_object(json!({"object": {"type": "user", "id": "rick"}}), options())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Cannot call 'setObject', 'Writer' is not configured."
    );
}

#[tokio::test]
async fn base_credentials_configure_every_directory_service() {
    let config = DirectoryConfig {
        base: BaseConfig {
            api_key: Some("k1".into()),
            tenant_id: Some("t1".into()),
            ..Default::default()
        },
        reader: Some(ServiceConfig {
            url: Some("https://r".into()),
            ..Default::default()
        }),
        ..Default::default()
    };

    let directory = Directory::new(&config).unwrap();

    assert_eq!(directory.transport(ServiceKind::Reader).unwrap().url(), "https://r");
    let writer = directory.transport(ServiceKind::Writer).unwrap();
    assert_eq!(writer.url(), "https://localhost:9292");
}
