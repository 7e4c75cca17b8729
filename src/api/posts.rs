// Posts and comments

use super::{comments_path, post_path, BlogApi, POSTS_PATH, PUBLIC_POSTS_PATH};
use crate::error::Result;
use crate::models::{Comment, NewComment, NewPost, Post};
use crate::request::PendingRequest;

impl BlogApi {
    /// Posts visible to the authenticated user
    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        self.call(PendingRequest::get(POSTS_PATH)).await
    }

    /// Posts visible without logging in
    pub async fn list_public_posts(&self) -> Result<Vec<Post>> {
        self.call(PendingRequest::get(PUBLIC_POSTS_PATH)).await
    }

    pub async fn get_post(&self, id: i64) -> Result<Post> {
        self.call(PendingRequest::get(post_path(id))).await
    }

    pub async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let request = with_post_body(PendingRequest::post(POSTS_PATH), post)?;
        self.call(request).await
    }

    pub async fn update_post(&self, id: i64, post: &NewPost) -> Result<Post> {
        let request = with_post_body(PendingRequest::put(post_path(id)), post)?;
        self.call(request).await
    }

    pub async fn delete_post(&self, id: i64) -> Result<()> {
        self.send_checked(PendingRequest::delete(post_path(id)))
            .await?;
        Ok(())
    }

    pub async fn create_comment(&self, post_id: i64, content: &str) -> Result<Comment> {
        let request = PendingRequest::post(comments_path(post_id)).json(&NewComment {
            content: content.to_string(),
        })?;
        self.call(request).await
    }
}

/// Images go up as multipart; everything else as JSON
fn with_post_body(request: PendingRequest, post: &NewPost) -> Result<PendingRequest> {
    if post.image.is_some() {
        Ok(request.multipart(post.form_fields()))
    } else {
        Ok(request.json(post)?)
    }
}
