#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    custom_resource_handler::run().await
}
