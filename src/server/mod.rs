mod error;
mod routes;

pub use error::ApiError;
pub use routes::*;

use tokio::net::TcpListener;
use tracing::info;

/// Serves the router on an already bound listener until the process stops.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, build_router(state)).await
}
