use std::path::Path;
use std::process::{Child, Command, Stdio};

use serde_json::{Value, json};
use tempfile::TempDir;

pub const ADMIN_EMAIL: &str = "head@school.example";

pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub admin_token: String,
    pub client: reqwest::Client,
    server_process: Option<Child>,
}

/// A student account created through the admin API.
pub struct TestStudent {
    pub id: String,
    pub token: String,
}

impl TestServer {
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let data_dir = temp_dir.path();
        let binary = Path::new(env!("CARGO_BIN_EXE_studytrack"));

        let init_output = Command::new(binary)
            .args(["admin", "init", "--data-dir"])
            .arg(data_dir)
            .args(["--email", ADMIN_EMAIL])
            .output()
            .expect("run init");
        assert!(
            init_output.status.success(),
            "Failed to initialize database"
        );

        let token_path = data_dir.join(".admin_token");
        let admin_token = std::fs::read_to_string(&token_path)
            .expect("read admin token")
            .trim()
            .to_string();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let base_url = format!("http://127.0.0.1:{}", port);

        let server_process = Command::new(binary)
            .args(["serve", "--data-dir"])
            .arg(data_dir)
            .args(["--host", "127.0.0.1", "--port"])
            .arg(port.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("start server");

        let client = reqwest::Client::new();
        Self::wait_for_ready(&client, &base_url).await;

        Self {
            temp_dir,
            base_url,
            admin_token,
            client,
            server_process: Some(server_process),
        }
    }

    async fn wait_for_ready(client: &reqwest::Client, base_url: &str) {
        for _ in 0..50 {
            if client
                .get(format!("{}/health", base_url))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready");
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    /// Creates a student in `level` (11 or 12) and issues them a token.
    pub async fn create_student(&self, email: &str, level: i64) -> TestStudent {
        let resp: Value = self
            .client
            .post(self.url("/admin/users"))
            .bearer_auth(&self.admin_token)
            .json(&json!({"email": email, "current_level": level}))
            .send()
            .await
            .expect("create user")
            .json()
            .await
            .expect("parse user response");
        let id = resp["data"]["id"].as_str().expect("user id").to_string();

        let resp: Value = self
            .client
            .post(self.url(&format!("/admin/users/{id}/tokens")))
            .bearer_auth(&self.admin_token)
            .json(&json!({}))
            .send()
            .await
            .expect("create token")
            .json()
            .await
            .expect("parse token response");
        let token = resp["data"]["token"].as_str().expect("token").to_string();

        TestStudent { id, token }
    }

    pub async fn get(&self, token: &str, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("send GET");
        Self::decode(resp).await
    }

    pub async fn send_json(
        &self,
        method: reqwest::Method,
        token: &str,
        path: &str,
        body: Value,
    ) -> (u16, Value) {
        let resp = self
            .client
            .request(method, self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("send request");
        Self::decode(resp).await
    }

    async fn decode(resp: reqwest::Response) -> (u16, Value) {
        let status = resp.status().as_u16();
        let text = resp.text().await.expect("read body");
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        (status, body)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(mut process) = self.server_process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}
