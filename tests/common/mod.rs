#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use file_sharer::{router, HandlerSet, ServedRoot};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct TestServer {
    pub handle: JoinHandle<std::io::Result<()>>,
    pub addr: SocketAddr,
    pub url: String,
    pub root: ServedRoot,
    /// Parent of the served root, so tests can check nothing lands beside it.
    pub sandbox: TempDir,
    pub client: Client,
}

impl TestServer {
    pub async fn start(handlers: HandlerSet) -> Self {
        Self::start_with(handlers, |_| {}, None).await
    }

    pub async fn start_with(
        handlers: HandlerSet,
        seed: impl FnOnce(&Path),
        timeout: Option<Duration>,
    ) -> Self {
        let sandbox = TempDir::new().expect("tempdir");
        let share = sandbox.path().join("share");
        std::fs::create_dir_all(&share).expect("create share dir");
        seed(&share);
        let root = ServedRoot::resolve(&share).expect("resolve root");

        let app = router(handlers, root.clone(), timeout).expect("router");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move { axum::serve(listener, app).await });

        TestServer {
            handle,
            addr,
            url: format!("http://{}", addr),
            root,
            sandbox,
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("client"),
        }
    }

    pub fn share_path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub async fn upload(&self, name: &str, content: &[u8]) -> reqwest::Response {
        let form = Form::new()
            .percent_encode_noop()
            .part("files", Part::bytes(content.to_vec()).file_name(name.to_string()));
        self.client
            .post(format!("{}/uploadFile", self.url))
            .multipart(form)
            .send()
            .await
            .expect("upload request")
    }

    pub async fn download(&self, name: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/downloadFile", self.url))
            .query(&[("file", name)])
            .send()
            .await
            .expect("download request")
    }

    pub async fn home(&self) -> String {
        self.client
            .get(format!("{}/", self.url))
            .send()
            .await
            .expect("home request")
            .text()
            .await
            .expect("home body")
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}
