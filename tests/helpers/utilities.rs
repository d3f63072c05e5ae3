use dotenv::dotenv;
use std::path::PathBuf;
use std::time::Instant;

pub fn init() -> Instant {
    dotenv().ok();
    dynamo_etl::logger::init();

    info!("running from current directory: {:?}", std::env::current_dir().unwrap_or_default());

    Instant::now()
}

pub fn repository_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn read_repository_file(relative_path: &str) -> String {
    let path = repository_root().join(relative_path);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {:?}: {}", path, e))
}
