//! Playback and library commands.

use popflix_client::services::FavoriteOutcome;
use popflix_client::{ClientError, PopflixClient};
use popflix_core::{ContentType, Episode, ExternalId};

use super::resolve_item;

/// Resolve a stream and wait for the history submission before exiting.
pub async fn play(
    client: &PopflixClient,
    content_type: ContentType,
    id: ExternalId,
    season: u32,
    episode: u32,
    title: Option<&str>,
) -> Result<(), ClientError> {
    let item = resolve_item(client, content_type, id, title).await?;
    let playback = client
        .interactions()
        .play_episode(&item, content_type, Episode::new(season, episode))
        .await?;

    println!("Now playing: {}", item.title);
    println!("  stream:   {}", playback.stream.embed_url);
    if let Some(url) = &playback.stream.torrent_url {
        println!("  torrent:  {url}");
    }
    if let Some(url) = &playback.stream.aggregator_url {
        println!("  alt:      {url}");
    }
    if let Some(url) = &playback.stream.download_url {
        println!("  download: {url}");
    }

    // The process is about to exit; give the detached submission a chance.
    if let Some(task) = playback.history_task
        && let Err(e) = task.await
    {
        tracing::warn!(error = %e, "Watch history task did not finish");
    }
    Ok(())
}

pub async fn favorite(
    client: &PopflixClient,
    content_type: ContentType,
    id: ExternalId,
    title: Option<&str>,
) -> Result<(), ClientError> {
    let item = resolve_item(client, content_type, id, title).await?;
    match client.interactions().add_favorite(&item, content_type).await? {
        FavoriteOutcome::Added => println!("Added {} to favorites", item.title),
        FavoriteOutcome::AlreadyFavorite => println!("{} is already a favorite", item.title),
    }
    Ok(())
}

pub async fn favorites(client: &PopflixClient) -> Result<(), ClientError> {
    let favorites = client.interactions().favorites().await?;
    if favorites.is_empty() {
        println!("No favorites yet");
    }
    for favorite in &favorites {
        println!(
            "{:>5}  {:>8}  {}",
            favorite.entry.content_type.as_str(),
            favorite.entry.external_id.as_i64(),
            favorite.entry.title
        );
    }
    Ok(())
}

pub async fn unfavorite(
    client: &PopflixClient,
    content_type: ContentType,
    id: ExternalId,
) -> Result<(), ClientError> {
    client.interactions().remove_favorite(content_type, id).await?;
    println!("Removed {content_type} {id} from favorites");
    Ok(())
}

pub async fn history(client: &PopflixClient) -> Result<(), ClientError> {
    let history = client.interactions().watch_history().await?;
    if history.is_empty() {
        println!("Nothing watched yet");
    }
    for record in &history {
        let episode = record
            .episode
            .map(|e| format!(" S{:02}E{:02}", e.season, e.episode))
            .unwrap_or_default();
        let watched = record
            .last_watched
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{watched:>16}  {:>5}  {}{episode}",
            record.entry.content_type.as_str(),
            record.entry.title
        );
    }
    Ok(())
}
