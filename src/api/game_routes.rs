use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

use crate::game::GameServer;
use super::game_websocket;

/// Every HTTP and WebSocket route the service exposes
pub fn routes(
    server: Arc<GameServer>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    game_websocket_route(server.clone())
        .or(game_health_check(server.clone()))
        .or(game_config_endpoint(server))
}

pub fn game_websocket_route(
    server: Arc<GameServer>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("game")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_game_server(server))
        .map(|ws: warp::ws::Ws, server: Arc<GameServer>| {
            ws.on_upgrade(move |websocket| game_websocket::handle_game_websocket(websocket, server))
        })
}

pub fn game_health_check(
    server: Arc<GameServer>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("game" / "health")
        .and(warp::get())
        .and(with_game_server(server))
        .and_then(|server: Arc<GameServer>| async move {
            let stats = server.stats().await;
            Ok::<_, Infallible>(warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "Quiz Live Server",
                "version": env!("CARGO_PKG_VERSION"),
                "lobby_sessions": stats.lobby_sessions,
                "active_sessions": stats.active_sessions,
                "connections": stats.connections,
            })))
        })
}

/// Game tunables clients may want to display, e.g. the room capacity
pub fn game_config_endpoint(
    server: Arc<GameServer>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("game" / "config")
        .and(warp::get())
        .and(with_game_server(server))
        .map(|server: Arc<GameServer>| {
            let settings = server.settings();
            warp::reply::json(&serde_json::json!({
                "room_capacity": settings.room_capacity,
                "join_code_digits": settings.join_code_digits,
                "end_grace_secs": settings.end_grace.as_secs(),
            }))
        })
}

fn with_game_server(
    server: Arc<GameServer>,
) -> impl Filter<Extract = (Arc<GameServer>,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::RecordingSink;
    use crate::backend::{ResultQueue, StaticQuizSource};
    use crate::game::GameSettings;

    fn server() -> Arc<GameServer> {
        GameServer::new(
            GameSettings::default(),
            Arc::new(StaticQuizSource::new()),
            ResultQueue::new(Arc::new(RecordingSink::default())),
        )
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let response = warp::test::request()
            .method("GET")
            .path("/game/health")
            .reply(&routes(server()))
            .await;

        assert_eq!(response.status(), 200);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["lobby_sessions"], 0);
        assert_eq!(body["connections"], 0);
    }

    #[tokio::test]
    async fn test_config_endpoint() {
        let response = warp::test::request()
            .method("GET")
            .path("/game/config")
            .reply(&routes(server()))
            .await;

        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["room_capacity"], 20);
        assert_eq!(body["join_code_digits"], 6);
        assert_eq!(body["end_grace_secs"], 60);
    }

    #[tokio::test]
    async fn test_unknown_path_rejected() {
        let response = warp::test::request()
            .method("GET")
            .path("/rooms")
            .reply(&routes(server()))
            .await;
        assert_eq!(response.status(), 404);
    }
}
