/// Builds the gRPC client and server code for `incident.proto` and
/// `greeter.proto` using `tonic-prost-build`.
///
/// Both files are compiled in one pass so that a single file descriptor set
/// (`reports_descriptor.bin`) covers every service. The server registers that
/// set with `tonic-reflection`.
///
/// # Files and Paths
///
/// - Proto files: `proto/incident.proto`, `proto/greeter.proto`
/// - Includes: `proto/`
///
/// # Panics
///
/// This function will `panic!` if `OUT_DIR` is missing or code generation
/// fails. `protoc` must be available on the build host.
///
/// # Output
///
/// Generated code will be accessible in Rust via:
///
/// ```rust
/// pub mod incident {
///     tonic::include_proto!("incident");
/// }
/// pub mod greeter {
///     tonic::include_proto!("greeter");
/// }
/// ```
use std::env;
use std::path::PathBuf;

const PROTOS: &[&str] = &["proto/incident.proto", "proto/greeter.proto"];

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("reports_descriptor.bin");

    for proto in PROTOS {
        println!("cargo:rerun-if-changed={proto}");
    }

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, PROTOS, &["proto"])
        .unwrap();
}
