use futures::StreamExt;
use notifier_core::FeedSource;
use reddit_client::{RedditClient, RedditOAuth2Config};
use std::env;

/// Prints new posts from the subreddits given on the command line.
///
/// ```text
/// REDDIT_CLIENT_ID=... REDDIT_CLIENT_SECRET=... cargo run -p reddit-client --example watch_new -- rust news
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let client_id = env::var("REDDIT_CLIENT_ID")?;
    let client_secret = env::var("REDDIT_CLIENT_SECRET")?;
    let subreddits: Vec<String> = env::args().skip(1).collect();
    if subreddits.is_empty() {
        println!("Usage: watch_new <subreddit>...");
        return Ok(());
    }

    let config = RedditOAuth2Config::new(
        client_id,
        client_secret,
        "reddit-post-notifier/0.1 watch_new example".to_string(),
    );
    let client = RedditClient::new(config)?;

    let token = client.authenticate().await?;
    println!("Authenticated, token scopes: {:?}", token.scope);

    for subreddit in &subreddits {
        match client.check_feed_exists(subreddit).await {
            Ok(()) => println!("r/{} ok", subreddit),
            Err(e) => println!("r/{}: {}", subreddit, e),
        }
    }

    println!("Waiting for new posts, Ctrl+C to stop");
    let mut stream = client.open_combined_subscription(&subreddits);
    while let Some(item) = stream.next().await {
        match item {
            Ok(post) => println!("r/{}: {}\n{}", post.subreddit, post.title, post.link()),
            Err(e) => {
                println!("Stream ended: {}", e);
                break;
            }
        }
    }

    println!("{}", client.api().metrics_summary().await);
    Ok(())
}
