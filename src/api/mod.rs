mod form;
pub mod handlers;
pub mod response;
mod routes;

pub use form::FormInput;
pub use routes::create_router;
