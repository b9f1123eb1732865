use std::io::Result;

fn main() -> Result<()> {
    // Servers only, for the services the integration tests drive
    let proto_files = &[
        "../topaz-proto/proto/aserto/directory/common/v3/common.proto",
        "../topaz-proto/proto/aserto/directory/reader/v3/reader.proto",
        "../topaz-proto/proto/aserto/directory/importer/v3/importer.proto",
        "../topaz-proto/proto/aserto/directory/model/v3/model.proto",
    ];

    let proto_folder = "../topaz-proto/proto";

    tonic_prost_build::configure()
        .protoc_arg("--experimental_allow_proto3_optional")
        .build_client(false)
        .compile_protos(proto_files, &[proto_folder])
        .unwrap();

    println!("cargo:rerun-if-changed={proto_folder}");

    Ok(())
}
