//! Axum server exposing the Lobby HTTP surface and the real-time poker
//! WebSocket gateway.
//!
//! # Routes
//!
//! | Method | Path                    | Description                      |
//! |--------|-------------------------|-----------------------------------|
//! | `GET`  | `/ws`                   | WebSocket upgrade for gameplay    |
//! | `POST` | `/auth/register`        | Create an account                 |
//! | `POST` | `/auth/login`           | Mint a bearer token                |
//! | `GET`  | `/rooms`, `/rooms/{id}` | List/describe waiting rooms        |
//! | `POST` | `/rooms/{id}/join`      | Buy in and take a seat             |
//! | `POST` | `/rooms/{id}/leave`     | Cash out and vacate a seat         |
//! | `POST` | `/admin/rooms`          | Admin: create a room               |
//! | `PATCH`| `/admin/rooms/{id}`     | Admin: change room status          |
//! | `DELETE`| `/admin/rooms/{id}`    | Admin: delete an empty room        |

mod auth;
mod config;
mod error;
mod gateway;
mod hand;
mod lobby;
mod model;
mod persistence;
mod registry;
mod room;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use auth::InMemoryAuthService;
use config::Config;
use gateway::GatewayState;
use lobby::LobbyState;
use persistence::PersistenceAdapter;
use registry::RoomRegistry;
use store::InMemoryStore;

#[derive(Clone)]
struct AppState {
    gateway: GatewayState,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    let store: Arc<dyn store::Store> = Arc::new(InMemoryStore::new());
    let auth: Arc<dyn auth::AuthService> = Arc::new(InMemoryAuthService::new());
    let persistence = Arc::new(PersistenceAdapter::new(store.clone()));
    let registry = Arc::new(RoomRegistry::new(store.clone(), persistence.clone()));
    registry.bootstrap().await;

    let gateway_state = GatewayState {
        auth: auth.clone(),
        store: store.clone(),
        registry,
    };
    let lobby_state = LobbyState {
        auth,
        store,
    };

    let state = AppState {
        gateway: gateway_state,
    };

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
        .merge(lobby::router(lobby_state))
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!("Poker server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| gateway::handle_socket(socket, state.gateway))
}
