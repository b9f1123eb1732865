//! # Directory Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide gRPC server implementations
//! of the directory `Reader`, `Importer` and `Model` services for integration testing
//! `topaz-core`. It is not intended for production use.

pub mod pb {
    pub mod aserto {
        pub mod directory {
            pub mod common {
                pub mod v3 {
                    include!(concat!(env!("OUT_DIR"), "/aserto.directory.common.v3.rs"));
                }
            }

            pub mod reader {
                pub mod v3 {
                    include!(concat!(env!("OUT_DIR"), "/aserto.directory.reader.v3.rs"));
                }
            }

            pub mod importer {
                pub mod v3 {
                    include!(concat!(env!("OUT_DIR"), "/aserto.directory.importer.v3.rs"));
                }
            }

            pub mod model {
                pub mod v3 {
                    include!(concat!(env!("OUT_DIR"), "/aserto.directory.model.v3.rs"));
                }
            }
        }
    }

    pub use aserto::directory::{
        common::v3 as common, importer::v3 as importer, model::v3 as model, reader::v3 as reader,
    };
}

pub use pb::importer::importer_server::{Importer, ImporterServer};
pub use pb::model::model_server::{Model, ModelServer};
pub use pb::reader::reader_server::{Reader, ReaderServer};
