//! Comment commands.

use popflix_client::{ClientError, PopflixClient};
use popflix_core::{CommentId, ContentType, ExternalId};

pub async fn list(
    client: &PopflixClient,
    content_type: ContentType,
    id: ExternalId,
) -> Result<(), ClientError> {
    let comments = client.interactions().comments(content_type, id).await?;
    if comments.is_empty() {
        println!("No comments yet");
    }
    for comment in &comments {
        let indent = if comment.parent_id.is_some() { "    " } else { "" };
        println!("{indent}[{}] {}: {}", comment.id, comment.user_name, comment.text);
    }
    Ok(())
}

pub async fn post(
    client: &PopflixClient,
    content_type: ContentType,
    id: ExternalId,
    text: &str,
    reply_to: Option<String>,
) -> Result<(), ClientError> {
    let comment = client
        .interactions()
        .post_comment(content_type, id, text, reply_to.map(CommentId::new))
        .await?;
    println!("Posted comment {}", comment.id);
    Ok(())
}
