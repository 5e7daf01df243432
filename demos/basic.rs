use fetch_retry::{Fetcher, RequestConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::var("FETCH_URL").unwrap_or_else(|_| "https://httpbin.org/anything".to_owned());

    let fetcher = Fetcher::new();
    let config = RequestConfig::from_env()?
        .method("post")
        .header("accept", "application/json")
        .query("source", "demo")
        .query_opt("trace", std::env::var("FETCH_TRACE").ok())
        .json(serde_json::json!({ "hello": "world" }));

    match fetcher.execute(&url, &config).await {
        Ok(body) => println!("{body:?}"),
        Err(err) => {
            eprintln!("{err}");
            if let Some(data) = err.data() {
                eprintln!("payload: {data:?}");
            }
        }
    }

    Ok(())
}
