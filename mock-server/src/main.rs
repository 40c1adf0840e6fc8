use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mock_olog=debug,tower_http=debug")),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("mock Olog listening on http://{addr}/resources");

    match (std::env::var("OLOG_USERNAME"), std::env::var("OLOG_PASSWORD")) {
        (Ok(user), Ok(pass)) => {
            tracing::info!(%user, "writes require basic auth");
            mock_olog::run_app(listener, mock_olog::app_with_auth(&user, &pass)).await
        }
        _ => mock_olog::run(listener).await,
    }
}
