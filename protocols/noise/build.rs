fn main() {
    prost_build::compile_protos(&["src/noise.proto"], &["src"]).unwrap();
}
