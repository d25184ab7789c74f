//! Built-in application services layered on the hub.

pub mod rooms;
pub mod stats;

pub use rooms::{JoinRoomService, LeaveRoomService, RoomMessageService};
pub use stats::StatsService;

use std::sync::Arc;

use crate::dispatch::MessageRouter;

/// Wire the room and stats services into the router.
pub fn register(router: &mut MessageRouter) {
    router.register_handler("join_room", Arc::new(JoinRoomService));
    router.register_handler("leave_room", Arc::new(LeaveRoomService));
    router.register_handler("room_message", Arc::new(RoomMessageService));
    router.register_handler("get_stats", Arc::new(StatsService));
}
