use tracing_subscriber::EnvFilter;

use crate::Stream;

/// Route the crate's logs to the test output. Set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn read_all_string(stream: Option<Stream>) -> String {
    let mut stream = stream.expect("no stream for this channel");
    String::from_utf8(stream.read_all().unwrap()).unwrap()
}
