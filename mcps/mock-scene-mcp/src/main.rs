//! Mock Scene MCP Server
//!
//! Stands in for a creative application (Blender, Figma, Photoshop) during
//! development: an in-memory scene the model can inspect and mutate.
//!
//! Configure in `.mcp.json`:
//! ```json
//! { "mcpServers": { "scene": { "command": "./mock-scene-mcp" } } }
//! ```

mod scene;
mod server;

use server::MockSceneServer;

atelier_mcp::serve_stdio!(MockSceneServer, "mock_scene_mcp");
