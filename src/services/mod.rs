/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Room provisioning operations behind the HTTP routes.
pub mod room_service;
/// WebSocket gateway: registration, authorization, command dispatch.
pub mod websocket_service;
