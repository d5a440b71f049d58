//! MCP server exposing the mock scene

use std::sync::Arc;

use atelier_mcp::{
    async_trait, error_text, json_success, text_success, EmbeddedError, EmbeddedResult,
    EmbeddedServer, McpError,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo, Tool},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::scene::{Scene, SceneObject};

const INSTRUCTIONS: &str = "Mock creative application - an in-memory scene of named \
     objects that can be listed, added, and removed.";

/// Mock application server holding one scene
#[derive(Clone)]
pub struct MockSceneServer {
    scene: Arc<Mutex<Scene>>,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Parameter Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddObjectParams {
    #[schemars(description = "Unique object name")]
    pub name: String,
    #[schemars(description = "Object kind, e.g. mesh, light, camera")]
    pub kind: String,
    #[schemars(description = "Optional [x, y, z] location (defaults to the origin)")]
    pub location: Option<[f64; 3]>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RemoveObjectParams {
    #[schemars(description = "Name of the object to remove")]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EchoParams {
    #[schemars(description = "Text to send back")]
    pub message: String,
}

#[derive(Serialize)]
struct SceneSnapshot<'a> {
    count: usize,
    objects: Vec<&'a SceneObject>,
}

// ============================================================================
// Tool Router Implementation
// ============================================================================

#[tool_router]
impl MockSceneServer {
    pub fn new() -> Self {
        Self::with_scene(Scene::with_defaults())
    }

    pub fn with_scene(scene: Scene) -> Self {
        Self {
            scene: Arc::new(Mutex::new(scene)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List every object in the scene with its kind and location")]
    async fn get_scene(&self) -> Result<CallToolResult, McpError> {
        let scene = self.scene.lock().await;
        json_success(&SceneSnapshot {
            count: scene.len(),
            objects: scene.objects().collect(),
        })
    }

    #[tool(description = "Add a named object to the scene")]
    async fn add_object(
        &self,
        Parameters(params): Parameters<AddObjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut scene = self.scene.lock().await;
        let object = SceneObject {
            name: params.name,
            kind: params.kind,
            location: params.location.unwrap_or([0.0, 0.0, 0.0]),
        };
        match scene.add(object) {
            Ok(added) => json_success(added),
            Err(e) => Ok(error_text(e.to_string())),
        }
    }

    #[tool(description = "Remove an object from the scene by name")]
    async fn remove_object(
        &self,
        Parameters(params): Parameters<RemoveObjectParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut scene = self.scene.lock().await;
        match scene.remove(&params.name) {
            Ok(removed) => Ok(text_success(format!("Removed {}", removed.name))),
            Err(e) => Ok(error_text(e.to_string())),
        }
    }

    #[tool(description = "Return the given message unchanged")]
    async fn echo(
        &self,
        Parameters(params): Parameters<EchoParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(text_success(params.message))
    }
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl rmcp::ServerHandler for MockSceneServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

impl Default for MockSceneServer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// EmbeddedServer Implementation
// ============================================================================

#[async_trait]
impl EmbeddedServer for MockSceneServer {
    fn server_name(&self) -> &str {
        "scene"
    }

    fn server_description(&self) -> Option<&str> {
        Some(INSTRUCTIONS)
    }

    fn list_tools(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }

    async fn call_tool(&self, name: &str, params: Value) -> EmbeddedResult<CallToolResult> {
        match name {
            "get_scene" => self.get_scene().await.map_err(Into::into),

            "add_object" => {
                let params: AddObjectParams = serde_json::from_value(params)?;
                self.add_object(Parameters(params)).await.map_err(Into::into)
            }

            "remove_object" => {
                let params: RemoveObjectParams = serde_json::from_value(params)?;
                self.remove_object(Parameters(params)).await.map_err(Into::into)
            }

            "echo" => {
                let params: EchoParams = serde_json::from_value(params)?;
                self.echo(Parameters(params)).await.map_err(Into::into)
            }

            _ => Err(EmbeddedError::ToolNotFound(name.to_string())),
        }
    }
}
