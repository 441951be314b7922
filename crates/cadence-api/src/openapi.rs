//! OpenAPI documentation
//!
//! Provides the OpenAPI 3.0 specification and Swagger UI for the Cadence
//! API.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde_json::json;

/// Create OpenAPI routes
pub fn create_openapi_routes() -> Router {
    Router::new()
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
}

/// OpenAPI JSON specification endpoint
async fn openapi_json() -> impl IntoResponse {
    Json(get_openapi_spec())
}

/// Swagger UI HTML endpoint
async fn swagger_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

/// Get the OpenAPI specification as JSON
fn get_openapi_spec() -> serde_json::Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Cadence API",
            "description": "REST API for the Cadence campaign dispatcher",
            "version": "1.0.0"
        },
        "servers": [
            {
                "url": "/api/v1",
                "description": "API v1"
            }
        ],
        "tags": [
            {"name": "health", "description": "Health check endpoints"},
            {"name": "campaigns", "description": "Campaign admission and lifecycle"},
            {"name": "messages", "description": "Per-recipient message operations"},
            {"name": "dispatch", "description": "Dispatcher trigger"}
        ],
        "paths": {
            "/campaigns": {
                "get": {
                    "tags": ["campaigns"],
                    "summary": "List campaigns for an owner",
                    "operationId": "listCampaigns",
                    "parameters": [
                        {"name": "owner_id", "in": "query", "required": true, "schema": {"type": "string", "format": "uuid"}},
                        {"name": "status", "in": "query", "schema": {"type": "string"}},
                        {"name": "limit", "in": "query", "schema": {"type": "integer", "default": 50}},
                        {"name": "offset", "in": "query", "schema": {"type": "integer", "default": 0}}
                    ],
                    "responses": {
                        "200": {"description": "List of campaigns"}
                    }
                },
                "post": {
                    "tags": ["campaigns"],
                    "summary": "Create a campaign",
                    "description": "Validates the pacing policy, checks the planned window against the owner's other campaigns and persists the campaign with its recipient rows. An immediate dispatcher run is scheduled.",
                    "operationId": "createCampaign",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/CreateCampaignRequest"}
                            }
                        }
                    },
                    "responses": {
                        "201": {"description": "Campaign created"},
                        "409": {"description": "Planned window conflicts with another campaign; the response proposes a replacement start"},
                        "422": {"description": "Invalid pacing policy"}
                    }
                }
            },
            "/campaigns/preview": {
                "post": {
                    "tags": ["campaigns"],
                    "summary": "Preview the expected schedule for a policy",
                    "operationId": "previewSchedule",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": {"$ref": "#/components/schemas/PreviewRequest"}
                            }
                        }
                    },
                    "responses": {
                        "200": {"description": "Expected send instants"}
                    }
                }
            },
            "/campaigns/{id}": {
                "get": {
                    "tags": ["campaigns"],
                    "summary": "Get a campaign",
                    "operationId": "getCampaign",
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {"description": "Campaign details"},
                        "404": {"description": "Campaign not found"}
                    }
                }
            },
            "/campaigns/{id}/stats": {
                "get": {
                    "tags": ["campaigns"],
                    "summary": "Campaign statistics",
                    "operationId": "getCampaignStats",
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {"description": "Per-status message counts and progress"}
                    }
                }
            },
            "/campaigns/{id}/messages": {
                "get": {
                    "tags": ["messages"],
                    "summary": "List messages of a campaign",
                    "operationId": "listMessages",
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}},
                        {"name": "status", "in": "query", "schema": {"type": "string", "enum": ["waiting", "sending", "sent", "failed"]}}
                    ],
                    "responses": {
                        "200": {"description": "Message rows"}
                    }
                }
            },
            "/campaigns/{id}/pause": {
                "post": {
                    "tags": ["campaigns"],
                    "summary": "Pause a campaign",
                    "operationId": "pauseCampaign",
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {"description": "Campaign paused (idempotent)"}
                    }
                }
            },
            "/campaigns/{id}/resume": {
                "post": {
                    "tags": ["campaigns"],
                    "summary": "Resume a paused campaign",
                    "operationId": "resumeCampaign",
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {"description": "Campaign resumed (idempotent)"}
                    }
                }
            },
            "/campaigns/{id}/cancel": {
                "post": {
                    "tags": ["campaigns"],
                    "summary": "Cancel a campaign (terminal)",
                    "operationId": "cancelCampaign",
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {"description": "Campaign canceled"}
                    }
                }
            },
            "/messages/{id}/retry": {
                "post": {
                    "tags": ["messages"],
                    "summary": "Reset a failed message to waiting",
                    "operationId": "retryMessage",
                    "parameters": [
                        {"name": "id", "in": "path", "required": true, "schema": {"type": "string", "format": "uuid"}}
                    ],
                    "responses": {
                        "200": {"description": "Retry outcome; non-failed messages are a no-op"},
                        "404": {"description": "Message not found"}
                    }
                }
            },
            "/dispatch": {
                "post": {
                    "tags": ["dispatch"],
                    "summary": "Run one dispatcher invocation",
                    "description": "Invoked by the periodic external trigger, or with a campaign_id for a targeted run. Always answers HTTP 200.",
                    "operationId": "triggerDispatch",
                    "requestBody": {
                        "required": false,
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "properties": {
                                        "campaign_id": {"type": "string", "format": "uuid"}
                                    }
                                }
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Per-campaign results",
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/TriggerResponse"}
                                }
                            }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "CreateCampaignRequest": {
                    "type": "object",
                    "required": ["owner_id", "name"],
                    "properties": {
                        "owner_id": {"type": "string", "format": "uuid"},
                        "name": {"type": "string"},
                        "scheduled_at": {"type": "string", "format": "date-time"},
                        "config": {"$ref": "#/components/schemas/PolicyConfig"},
                        "recipients": {
                            "type": "array",
                            "items": {"$ref": "#/components/schemas/Recipient"}
                        }
                    }
                },
                "PolicyConfig": {
                    "type": "object",
                    "description": "Pacing policy; camelCase spellings of all fields are accepted as well",
                    "properties": {
                        "min_interval": {"type": "integer", "minimum": 5, "default": 30},
                        "max_interval": {"type": "integer", "default": 40},
                        "use_batching": {"type": "boolean", "default": false},
                        "batch_size": {"type": "integer"},
                        "batch_pause_min": {"type": "integer"},
                        "batch_pause_max": {"type": "integer"},
                        "business_hours": {"type": "string", "enum": ["ignore", "pause"], "default": "ignore"},
                        "pause_at": {"type": "string", "example": "18:00"},
                        "resume_at": {"type": "string", "example": "08:00"},
                        "automatic_pause": {
                            "type": "object",
                            "properties": {
                                "pause_at": {"type": "string", "example": "12:00"},
                                "resume_at": {"type": "string", "format": "date-time"}
                            }
                        }
                    }
                },
                "Recipient": {
                    "type": "object",
                    "required": ["name", "phone", "message_body"],
                    "properties": {
                        "name": {"type": "string"},
                        "phone": {"type": "string"},
                        "message_body": {"type": "string"}
                    }
                },
                "PreviewRequest": {
                    "type": "object",
                    "required": ["count"],
                    "properties": {
                        "config": {"$ref": "#/components/schemas/PolicyConfig"},
                        "start_at": {"type": "string", "format": "date-time"},
                        "count": {"type": "integer"}
                    }
                },
                "TriggerResponse": {
                    "type": "object",
                    "properties": {
                        "success": {"type": "boolean"},
                        "results": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "id": {"type": "string", "format": "uuid"},
                                    "messages_sent": {"type": "integer"},
                                    "status": {"type": "string", "enum": ["continued", "finished", "paused_temporarily"]}
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Swagger UI HTML template
const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Cadence API Documentation</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui.css" />
    <style>
        body { margin: 0; padding: 0; }
        .swagger-ui .topbar { display: none; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            SwaggerUIBundle({
                url: "/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIBundle.SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>"#;
