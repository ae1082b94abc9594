//! Catalog commands.

use popflix_client::services::SearchOutcome;
use popflix_client::{ClientError, PopflixClient};
use popflix_core::{ContentType, MediaKind};

use super::describe;

/// Print the popular list for a content type.
pub async fn popular(client: &PopflixClient, content_type: ContentType) -> Result<(), ClientError> {
    let items = client.catalog().fetch_popular(content_type).await?;
    if items.is_empty() {
        println!("Nothing popular right now");
    }
    for item in &items {
        println!("{}", describe(item));
    }
    Ok(())
}

/// Print both popular lists. Either may be empty if it could not be loaded.
pub async fn home(client: &PopflixClient) {
    let feed = client.catalog().fetch_home().await;
    for (heading, items) in [("Movies", &feed.movies), ("TV shows", &feed.shows)] {
        println!("{heading}");
        for item in items {
            println!("{}", describe(item));
        }
    }
}

/// Print the top search matches.
pub async fn search(client: &PopflixClient, query: &str) -> Result<(), ClientError> {
    match client.search().search(query).await? {
        SearchOutcome::Applied(view) if view.results.is_empty() => println!("No matches"),
        SearchOutcome::Applied(view) => {
            for result in &view.results {
                let kind = match result.kind {
                    MediaKind::Movie => "movie",
                    MediaKind::Tv => "tv",
                    MediaKind::Other => "other",
                };
                println!("{kind:>5}  {}", describe(&result.item));
            }
        }
        SearchOutcome::Hidden => println!("Type something to search"),
        SearchOutcome::Superseded => {}
    }
    Ok(())
}
