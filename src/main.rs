use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    iris_lib::run().await
}
