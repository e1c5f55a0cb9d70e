mod client;
mod models;

pub use client::{JellyfinClient, JellyfinClientBuilder};
