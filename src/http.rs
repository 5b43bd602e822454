use anyhow::Context as _;
use scraper::Html;
use url::Url;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0 storypack/0.1";

#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Page retrieval. Non-2xx statuses are returned, not raised; callers decide.
pub trait Fetch {
    fn get(&self, url: &Url) -> anyhow::Result<Response>;
}

pub struct HttpClient {
    client: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build http client")?;
        Ok(Self { client })
    }
}

impl Fetch for HttpClient {
    fn get(&self, url: &Url) -> anyhow::Result<Response> {
        tracing::debug!(%url, "GET");
        let resp = self
            .client
            .get(url.clone())
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .with_context(|| format!("GET {url}"))?;

        let status = resp.status().as_u16();
        let final_url = resp.url().clone();
        let body = resp
            .text()
            .with_context(|| format!("read body: {url}"))?;
        tracing::debug!(%final_url, status, bytes = body.len(), "fetched");

        Ok(Response {
            url: final_url,
            status,
            body,
        })
    }
}
