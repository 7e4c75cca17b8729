// Data models for the Travel Blog API

pub mod auth;
pub mod blog;

pub use auth::{AuthResponse, LoginRequest, RegisterRequest, User};
pub use blog::{Comment, ImageUpload, NewComment, NewPost, Post};
