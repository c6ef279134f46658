fn main() {
    prost_build::compile_protos(&["src/identify.proto"], &["src"]).unwrap();
}
