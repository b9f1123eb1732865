use directory_service::pb::{common, importer, model, reader};
use directory_service::{Importer, Model, Reader};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};
use tonic::{Request, Response, Status, Streaming, metadata::MetadataMap};

type Unary<T> = Result<Response<T>, Status>;
type Chunks<T> = tokio_stream::Iter<std::vec::IntoIter<Result<T, Status>>>;

/// A call as seen by the server: the method and the ASCII headers it carried.
#[derive(Debug, Clone)]
pub struct ReceivedCall {
    pub method: &'static str,
    pub headers: BTreeMap<String, String>,
}

impl ReceivedCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Serves `Reader`, `Model` and `Importer` from memory and records every call it receives.
#[derive(Debug, Clone, Default)]
pub struct DirectoryServiceImpl {
    calls: Arc<Mutex<Vec<ReceivedCall>>>,
    manifest: Arc<Mutex<Vec<u8>>>,
    imported: Arc<Mutex<Vec<importer::ImportRequest>>>,
}

impl DirectoryServiceImpl {
    pub fn calls(&self) -> Vec<ReceivedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> ReceivedCall {
        self.calls().pop().expect("no call received")
    }

    pub fn manifest(&self) -> String {
        String::from_utf8(self.manifest.lock().unwrap().clone()).unwrap()
    }

    pub fn imported(&self) -> Vec<importer::ImportRequest> {
        self.imported.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str, metadata: &MetadataMap) {
        let headers = metadata
            .clone()
            .into_headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_string(), value.to_string()))
            })
            .collect();

        self.calls
            .lock()
            .unwrap()
            .push(ReceivedCall { method, headers });
    }
}

fn timestamp() -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: 1_700_000_000,
        nanos: 0,
    }
}

#[tonic::async_trait]
impl Reader for DirectoryServiceImpl {
    async fn get_object(
        &self,
        request: Request<reader::GetObjectRequest>,
    ) -> Unary<reader::GetObjectResponse> {
        self.record("GetObject", request.metadata());
        let request = request.into_inner();

        if request.object_id == "missing" {
            return Err(Status::not_found("E20051 object not found"));
        }

        let page_size = request.page.map(|page| page.size).unwrap_or_default();
        Ok(Response::new(reader::GetObjectResponse {
            result: Some(common::Object {
                r#type: request.object_type,
                id: request.object_id,
                display_name: format!("page size {page_size}"),
                etag: "42".to_string(),
                created_at: Some(timestamp()),
                ..Default::default()
            }),
            relations: vec![],
            page: None,
        }))
    }

    async fn get_object_many(
        &self,
        _req: Request<reader::GetObjectManyRequest>,
    ) -> Unary<reader::GetObjectManyResponse> {
        Err(Status::unimplemented("GetObjectMany"))
    }

    async fn get_objects(
        &self,
        _req: Request<reader::GetObjectsRequest>,
    ) -> Unary<reader::GetObjectsResponse> {
        Err(Status::unimplemented("GetObjects"))
    }

    async fn get_relation(
        &self,
        _req: Request<reader::GetRelationRequest>,
    ) -> Unary<reader::GetRelationResponse> {
        Err(Status::unimplemented("GetRelation"))
    }

    async fn get_relations(
        &self,
        _req: Request<reader::GetRelationsRequest>,
    ) -> Unary<reader::GetRelationsResponse> {
        Err(Status::unimplemented("GetRelations"))
    }

    async fn check(&self, request: Request<reader::CheckRequest>) -> Unary<reader::CheckResponse> {
        self.record("Check", request.metadata());
        let request = request.into_inner();

        Ok(Response::new(reader::CheckResponse {
            check: request.subject_id == "rick",
            ..Default::default()
        }))
    }

    async fn checks(&self, _req: Request<reader::ChecksRequest>) -> Unary<reader::ChecksResponse> {
        Err(Status::unimplemented("Checks"))
    }

    async fn get_graph(
        &self,
        _req: Request<reader::GetGraphRequest>,
    ) -> Unary<reader::GetGraphResponse> {
        Err(Status::unimplemented("GetGraph"))
    }
}

#[tonic::async_trait]
impl Model for DirectoryServiceImpl {
    type GetManifestStream = Chunks<model::GetManifestResponse>;

    async fn get_manifest(
        &self,
        request: Request<model::GetManifestRequest>,
    ) -> Unary<Self::GetManifestStream> {
        use model::get_manifest_response::Msg;

        self.record("GetManifest", request.metadata());

        let manifest_model = prost_types::Struct {
            fields: [(
                "version".to_string(),
                prost_types::Value {
                    kind: Some(prost_types::value::Kind::StringValue("3".to_string())),
                },
            )]
            .into(),
        };
        let chunks = vec![
            Msg::Metadata(model::Metadata {
                updated_at: Some(timestamp()),
                etag: "m1".to_string(),
            }),
            Msg::Body(model::Body {
                data: b"model:\n".to_vec(),
            }),
            Msg::Body(model::Body {
                data: b"  version: 3\n".to_vec(),
            }),
            Msg::Model(manifest_model),
        ];

        let responses: Vec<_> = chunks
            .into_iter()
            .map(|msg| Ok(model::GetManifestResponse { msg: Some(msg) }))
            .collect();
        Ok(Response::new(tokio_stream::iter(responses)))
    }

    async fn set_manifest(
        &self,
        request: Request<Streaming<model::SetManifestRequest>>,
    ) -> Unary<model::SetManifestResponse> {
        use model::set_manifest_request::Msg;

        self.record("SetManifest", request.metadata());
        let mut stream = request.into_inner();

        let mut data = Vec::new();
        while let Some(chunk) = stream.message().await? {
            if let Some(Msg::Body(body)) = chunk.msg {
                data.extend_from_slice(&body.data);
            }
        }
        *self.manifest.lock().unwrap() = data;

        Ok(Response::new(model::SetManifestResponse { result: Some(()) }))
    }

    async fn delete_manifest(
        &self,
        _req: Request<model::DeleteManifestRequest>,
    ) -> Unary<model::DeleteManifestResponse> {
        Err(Status::unimplemented("DeleteManifest"))
    }
}

#[tonic::async_trait]
impl Importer for DirectoryServiceImpl {
    type ImportStream = Chunks<importer::ImportResponse>;

    async fn import(
        &self,
        request: Request<Streaming<importer::ImportRequest>>,
    ) -> Unary<Self::ImportStream> {
        use importer::{ImportCounter, ImportResponse, import_request, import_response};

        self.record("Import", request.metadata());
        let mut stream = request.into_inner();

        let mut objects = ImportCounter {
            r#type: "object".to_string(),
            ..Default::default()
        };
        let mut relations = ImportCounter {
            r#type: "relation".to_string(),
            ..Default::default()
        };

        while let Some(message) = stream.message().await? {
            let counter = match &message.msg {
                Some(import_request::Msg::Object(_)) => &mut objects,
                Some(import_request::Msg::Relation(_)) => &mut relations,
                None => continue,
            };
            counter.recv += 1;
            match importer::Opcode::try_from(message.op_code) {
                Ok(importer::Opcode::Set) => counter.set += 1,
                Ok(importer::Opcode::Delete | importer::Opcode::DeleteWithRelations) => {
                    counter.delete += 1
                }
                _ => counter.error += 1,
            }
            self.imported.lock().unwrap().push(message);
        }

        let responses = [objects, relations]
            .into_iter()
            .map(|counter| {
                Ok(ImportResponse {
                    msg: Some(import_response::Msg::Counter(counter)),
                })
            })
            .collect::<Vec<_>>();
        Ok(Response::new(tokio_stream::iter(responses)))
    }
}
