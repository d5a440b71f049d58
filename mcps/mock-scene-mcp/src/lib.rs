//! Mock Scene MCP Library
//!
//! Use in process through [`atelier_mcp::EmbeddedServer`]:
//!
//! ```rust,ignore
//! use mock_scene_mcp::MockSceneServer;
//!
//! let server = MockSceneServer::new();
//! let result = server.call_tool("get_scene", serde_json::json!({})).await?;
//! ```

pub mod scene;
pub mod server;

pub use scene::{Scene, SceneError, SceneObject};
pub use server::{AddObjectParams, EchoParams, MockSceneServer, RemoveObjectParams};

pub use atelier_mcp::{EmbeddedError, EmbeddedResult, EmbeddedServer};
