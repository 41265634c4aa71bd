pub mod user_service;
pub use user_service::{Role, UserError, UserService, UserStats, UserUpdate};

pub mod user_service_impl;
pub use user_service_impl::SeaOrmUserService;
