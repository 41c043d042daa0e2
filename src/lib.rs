pub mod app;
pub mod auth;
pub mod campaigns;
pub mod client;
pub mod config;
pub mod dates;
pub mod error;
pub mod events;
pub mod extract;
pub mod households;
pub mod persons;
pub mod response;
pub mod state;
pub mod statistics;
pub mod temp_residence;
pub mod users;
