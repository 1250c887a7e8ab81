#[tokio::main]
async fn main() {
    tenantd::start_server().await;
}
