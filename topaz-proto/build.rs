use std::env::var;
use std::io::Result;

fn main() -> Result<()> {
    // Every file here ends up in the descriptor set, together with its imports
    let proto_files = &[
        // Directory v3
        "proto/aserto/directory/common/v3/common.proto",
        "proto/aserto/directory/reader/v3/reader.proto",
        "proto/aserto/directory/writer/v3/writer.proto",
        "proto/aserto/directory/importer/v3/importer.proto",
        "proto/aserto/directory/exporter/v3/exporter.proto",
        "proto/aserto/directory/model/v3/model.proto",
        // Authorizer v2
        "proto/aserto/authorizer/v2/api/identity_context.proto",
        "proto/aserto/authorizer/v2/api/module.proto",
        "proto/aserto/authorizer/v2/api/policy_context.proto",
        "proto/aserto/authorizer/v2/api/policy_instance.proto",
        "proto/aserto/authorizer/v2/authorizer.proto",
    ];

    let proto_folder = "proto";
    let out_dir = var("OUT_DIR").expect("Missing OUT_DIR environment variable");
    let descriptors_path = format!("{}/descriptors.bin", out_dir);

    // Messages are handled dynamically, only the descriptor set is consumed.
    tonic_prost_build::configure()
        .file_descriptor_set_path(descriptors_path)
        .protoc_arg("--experimental_allow_proto3_optional")
        .build_client(false)
        .build_server(false)
        .compile_protos(proto_files, &[proto_folder])
        .unwrap();

    println!("cargo:rerun-if-changed={proto_folder}");

    Ok(())
}
