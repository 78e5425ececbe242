//! Concrete catalog backends.

pub mod spotify;

pub use spotify::SpotifyClient;
