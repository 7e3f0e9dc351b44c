pub mod db;
pub mod movies;
pub mod progress;
