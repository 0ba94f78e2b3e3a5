// Network adapter: the single websocket entrypoint clients connect through.

pub mod ws;

pub use ws::ws_handler;
