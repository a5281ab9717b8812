use course_server::api::openapi_json;

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or("openapi.json".to_string());
    let json = openapi_json().expect("failed to build openapi spec");
    std::fs::write(path, json).unwrap();
}
