fn main() {
    prost_build::compile_protos(&["src/plaintext.proto"], &["src"]).unwrap();
}
