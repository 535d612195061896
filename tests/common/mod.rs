use std::net::TcpListener;

use axum::Router;

/// Local HTTP server serving canned venue responses
pub struct MockVenueServer {
    pub base_url: String,
}

impl MockVenueServer {
    pub async fn start(app: Router) -> Self {
        // Find an available port
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock venue");
        listener.set_nonblocking(true).expect("nonblocking listener");
        let port = listener.local_addr().expect("local addr").port();

        let server = axum::Server::from_tcp(listener)
            .expect("mock venue server")
            .serve(app.into_make_service());

        tokio::spawn(async move {
            if let Err(e) = server.await {
                eprintln!("🎭 Mock venue server error: {}", e);
            }
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
        }
    }
}
