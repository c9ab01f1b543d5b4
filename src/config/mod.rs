mod server;

pub use server::{ADMIN_TOKEN_FILE, DB_FILE_NAME, ServerConfig};
