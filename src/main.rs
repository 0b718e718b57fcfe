use shortify::{
    config,
    http::{AppState, router},
    url_service::url_rest_service_capsule,
};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let container = config::init_container().await?;

    let (url_service, public_base_url) =
        container.read((url_rest_service_capsule, config::public_base_url_capsule));
    let app = router(AppState {
        url_service,
        public_base_url,
    });

    let listener = TcpListener::bind(container.read(config::addr_capsule)).await?;
    info!(addr = %listener.local_addr()?, "Started listening on TCP");
    axum::serve(listener, app).await?;
    Ok(())
}
