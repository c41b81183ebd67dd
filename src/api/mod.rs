pub mod game_routes;
mod game_websocket;

pub use game_routes::routes;
