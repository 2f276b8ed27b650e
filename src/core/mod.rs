pub mod definition;
pub mod interact;
pub mod object;
pub mod presentation_definition;
pub mod query;
pub mod validation;
pub mod vp_request;
