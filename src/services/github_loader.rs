use std::time::Duration;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::{stream, StreamExt, TryStreamExt};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;
use crate::config::GithubConfig;
use crate::error::RagError;
use crate::models::document::Document;

const USER_AGENT: &str = "repo-chat-agent";
const CONCURRENT_BLOB_REQUESTS: usize = 8;

lazy_static! {
    /// Paths that are never worth indexing: vendored trees, build output and binary assets.
    static ref SKIPPED_PATH: Regex = Regex::new(
        r"(?i)(^|/)(\.git|node_modules|vendor|target|dist|build)/|\.(png|jpe?g|gif|ico|svg|webp|bmp|pdf|zip|gz|tgz|tar|jar|class|exe|dll|so|dylib|a|o|bin|woff2?|ttf|eot|mp3|mp4|mov|lock)$"
    ).unwrap();
}

/// Produces documents for a source descriptor.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, source: &str) -> Result<Vec<Document>, RagError>;
}

/// The repository named by a `repo:owner/name type:repo` descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoQuery {
    pub owner: String,
    pub name: String,
}

impl RepoQuery {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

pub fn parse_descriptor(source: &str) -> Result<RepoQuery, RagError> {
    let mut repo = None;
    for token in source.split_whitespace() {
        if let Some(value) = token.strip_prefix("repo:") {
            repo = Some(value);
        } else if let Some(kind) = token.strip_prefix("type:") {
            if kind != "repo" {
                return Err(RagError::InvalidDescriptor(format!("unsupported type '{}'", kind)));
            }
        } else {
            return Err(RagError::InvalidDescriptor(format!("unexpected token '{}'", token)));
        }
    }

    let repo = repo.ok_or_else(|| RagError::InvalidDescriptor(format!("no repo in '{}'", source)))?;
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => Ok(RepoQuery {
            owner: owner.to_string(),
            name: name.to_string(),
        }),
        _ => Err(RagError::InvalidDescriptor(format!("'{}' is not of the form owner/repo", repo))),
    }
}

pub fn should_index(path: &str, size: Option<u64>, max_file_size: u64) -> bool {
    if SKIPPED_PATH.is_match(path) {
        return false;
    }
    size.map_or(true, |size| size <= max_file_size)
}

/// Decodes the base64 payload of a git blob. Returns `None` for non-UTF-8 content.
pub fn decode_blob(content: &str) -> Result<Option<String>, RagError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact)?;
    Ok(String::from_utf8(bytes).ok())
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    content: String,
    encoding: String,
}

/// Reads a repository's default branch through the GitHub REST API.
pub struct GithubLoader {
    client: reqwest::Client,
    token: String,
    api_base: Url,
    max_files: usize,
    max_file_size: u64,
}

impl GithubLoader {
    pub fn new(token: impl Into<String>, config: &GithubConfig) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        let mut base = config.api_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(GithubLoader {
            client,
            token: token.into(),
            api_base: Url::parse(&base)?,
            max_files: config.max_files,
            max_file_size: config.max_file_size,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RagError> {
        Ok(self.api_base.join(path)?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, RagError> {
        let response = self.client
            .get(url.clone())
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json::<T>().await?),
            StatusCode::NOT_FOUND => Err(RagError::Loader(format!("not found: {}", url))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RagError::Loader(format!(
                "GitHub rejected the token ({}) for {}",
                response.status(),
                url
            ))),
            status => Err(RagError::Loader(format!("GitHub API returned {} for {}", status, url))),
        }
    }

    async fn fetch_blob(&self, repo: &RepoQuery, entry: &TreeEntry) -> Result<Option<Document>, RagError> {
        let url = self.endpoint(&format!("repos/{}/{}/git/blobs/{}", repo.owner, repo.name, entry.sha))?;
        let blob: BlobResponse = self.get_json(url).await?;
        if blob.encoding != "base64" {
            warn!("Skipping {} with unexpected encoding {}", entry.path, blob.encoding);
            return Ok(None);
        }

        match decode_blob(&blob.content)? {
            Some(content) => Ok(Some(Document {
                source: format!("https://github.com/{}/blob/HEAD/{}", repo.full_name(), entry.path),
                content,
                repository: Some(repo.full_name()),
                path: Some(entry.path.clone()),
            })),
            None => {
                debug!("Skipping binary file {}", entry.path);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Loader for GithubLoader {
    async fn load(&self, source: &str) -> Result<Vec<Document>, RagError> {
        let repo = parse_descriptor(source)?;
        info!("Listing files of {}", repo.full_name());

        let mut url = self.endpoint(&format!("repos/{}/{}/git/trees/HEAD", repo.owner, repo.name))?;
        url.set_query(Some("recursive=1"));
        let tree: TreeResponse = self.get_json(url).await?;
        if tree.truncated {
            warn!("GitHub truncated the file tree of {}", repo.full_name());
        }

        let entries: Vec<TreeEntry> = tree.tree.into_iter()
            .filter(|entry| entry.kind == "blob")
            .filter(|entry| should_index(&entry.path, entry.size, self.max_file_size))
            .take(self.max_files)
            .collect();
        info!("Fetching {} files from {}", entries.len(), repo.full_name());

        let fetches: Vec<_> = entries.iter().map(|entry| self.fetch_blob(&repo, entry)).collect();
        let documents: Vec<Option<Document>> = stream::iter(fetches)
            .buffered(CONCURRENT_BLOB_REQUESTS)
            .try_collect()
            .await?;

        Ok(documents.into_iter().flatten().collect())
    }
}
