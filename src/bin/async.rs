use std::time::Duration;

use wemo_skill::tokio::discovery;

#[tokio::main]
async fn main() {
    env_logger::init();

    let duration = Duration::from_secs(2);
    match discovery::with_timeout(duration).await {
        Ok(responses) => responses.into_iter().for_each(|resp| {
            println!("{}\t{}", resp.location, resp.usn.unwrap_or_default());
        }),
        Err(err) => {
            eprintln!("Discovery failed: {}", err);
            std::process::exit(1);
        }
    }
}
