use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;

fn error_schema() -> Value {
    json!({
        "type": "object",
        "required": ["error"],
        "properties": {
            "code": { "type": "integer" },
            "error": { "type": "string" }
        }
    })
}

/// OpenAPI 3 description of the routes served under `base_uri`.
pub fn openapi_document(base_uri: &str, points: u32, window_secs: u64) -> Value {
    let rate_limited = json!({
        "description": format!("More than {} requests in {} seconds", points, window_secs),
        "headers": {
            "Retry-After": { "schema": { "type": "integer" } },
            "X-RateLimit-Limit": { "schema": { "type": "integer" } },
            "X-RateLimit-Remaining": { "schema": { "type": "integer" } }
        },
        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Error" } } }
    });
    let error = json!({
        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Error" } } }
    });

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Kan API",
            "version": env!("CARGO_PKG_VERSION")
        },
        "servers": [{ "url": base_uri }],
        "paths": {
            "/auth/{path}": {
                "parameters": [{
                    "name": "path", "in": "path", "required": true,
                    "schema": { "type": "string" }
                }],
                "post": {
                    "summary": "Authentication (disabled in this build)",
                    "responses": {
                        "410": { "description": "Authentication is disabled", "content": error["content"] },
                        "429": rate_limited
                    }
                }
            },
            "/openapi.json": {
                "get": {
                    "summary": "This document",
                    "responses": {
                        "200": { "description": "OpenAPI document" },
                        "429": rate_limited
                    }
                }
            },
            "/cards/{cardPublicId}/invalidate": {
                "post": {
                    "summary": "Invalidate cached card.byId results for a card",
                    "parameters": [{
                        "name": "cardPublicId", "in": "path", "required": true,
                        "schema": { "type": "string" }
                    }],
                    "responses": {
                        "200": {
                            "description": "`invalidated` is false for unresolved card ids",
                            "content": { "application/json": { "schema": {
                                "type": "object",
                                "properties": {
                                    "cardPublicId": { "type": "string" },
                                    "invalidated": { "type": "boolean" }
                                }
                            } } }
                        },
                        "429": rate_limited,
                        "500": { "description": "Query cache failure", "content": error["content"] }
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Liveness probe",
                    "responses": { "200": { "description": "Service is up" } }
                }
            }
        },
        "components": {
            "schemas": { "Error": error_schema() }
        }
    })
}

pub async fn document(State(state): State<AppState>) -> Json<Value> {
    Json(openapi_document(
        &state.config.api_base_uri,
        state.config.rate_limit_requests,
        state.config.rate_limit_window_secs,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = openapi_document("/api", 100, 60);

        assert_eq!(doc["servers"][0]["url"], "/api");
        for path in ["/auth/{path}", "/openapi.json", "/cards/{cardPublicId}/invalidate", "/health"] {
            assert!(doc["paths"].get(path).is_some(), "missing {}", path);
        }
        assert_eq!(
            doc["paths"]["/openapi.json"]["get"]["responses"]["429"]["description"],
            "More than 100 requests in 60 seconds"
        );
    }
}
