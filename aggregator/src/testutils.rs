use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// An axum app bound to an ephemeral local port, standing in for a real
/// upstream API. The server stops when this is dropped.
pub struct MockUpstream {
    base: String,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    pub async fn spawn(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // The socket is already listening, so requests queue until serve starts.
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        MockUpstream {
            base: format!("http://{addr}"),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("{}{}", self.base, path)).unwrap()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A local URL nothing is listening on.
pub async fn unreachable_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/")).unwrap()
}
