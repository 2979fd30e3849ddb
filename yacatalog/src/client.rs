//! HTTP client for the Yandex.Music catalog API
//!
//! [`CatalogClient`] is the capability the source controllers depend on;
//! [`HttpCatalogClient`] is the `reqwest` implementation. Every call takes an
//! explicit timeout so that the retry wrapper can bound each attempt.

use crate::error::{CatalogError, Result};
use crate::models::*;
use async_trait::async_trait;
use md5::{Digest, Md5};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Default Yandex.Music API base URL
pub const DEFAULT_API_BASE: &str = "https://api.music.yandex.net";

/// Default timeout applied by the underlying HTTP client
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "Yandex-Music-API";

/// Salt used to sign direct stream links
const SIGN_SALT: &str = "XGRlBW9FXlekgbPrRHuSiA";

/// Remote catalog capability used by the source controllers
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Stations shown on the personal rotor dashboard
    async fn rotor_stations_dashboard(&self, timeout: Duration) -> Result<Vec<StationResult>>;

    /// Full list of rotor stations
    async fn rotor_stations_list(&self, timeout: Duration) -> Result<Vec<StationResult>>;

    /// Next batch of tracks for `station` (`type:tag`)
    async fn rotor_station_tracks(
        &self,
        station: &str,
        queue: Option<&str>,
        timeout: Duration,
    ) -> Result<StationTracks>;

    /// Applies rotor settings, `false` when the server rejects them
    async fn rotor_station_settings(
        &self,
        station: &str,
        settings: &RotorSettings,
        timeout: Duration,
    ) -> Result<bool>;

    async fn rotor_feedback(
        &self,
        station: &str,
        batch_id: Option<&str>,
        feedback: &RotorFeedback,
        timeout: Duration,
    ) -> Result<bool>;

    async fn tracks(&self, track_ids: &[String], timeout: Duration) -> Result<Vec<Track>>;

    async fn download_info(&self, track_id: &str, timeout: Duration) -> Result<Vec<DownloadInfo>>;

    /// Resolves a download descriptor into a signed stream URL
    async fn direct_link(&self, info: &DownloadInfo, timeout: Duration) -> Result<String>;

    async fn like_track(&self, track_id: &str, timeout: Duration) -> Result<bool>;

    async fn play_audio(&self, report: &PlayAudio, timeout: Duration) -> Result<()>;

    async fn user_playlists(&self, timeout: Duration) -> Result<Vec<PlaylistSummary>>;

    async fn playlist_tracks(&self, kind: &str, timeout: Duration) -> Result<Vec<Track>>;

    async fn liked_tracks(&self, timeout: Duration) -> Result<Vec<Track>>;

    async fn search_artists(&self, text: &str, timeout: Duration) -> Result<Vec<ArtistCandidate>>;

    /// Albums of an artist, sorted by year
    async fn artist_albums(&self, artist_id: &str, timeout: Duration) -> Result<Vec<Album>>;

    /// Tracks of an album, volumes flattened in order
    async fn album_tracks(&self, album_id: &str, timeout: Duration) -> Result<Vec<Track>>;
}

/// Enveloppe `{"result": ...}` des réponses de l'API
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct AccountStatus {
    account: Account,
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    uid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Dashboard {
    #[serde(default)]
    stations: Vec<StationResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackShort {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    album_id: Option<String>,
}

impl TrackShort {
    fn track_id(&self) -> String {
        match &self.album_id {
            Some(album) => format!("{}:{}", self.id, album),
            None => self.id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistFull {
    #[serde(default)]
    tracks: Vec<TrackShort>,
}

#[derive(Debug, Deserialize)]
struct Library {
    #[serde(default)]
    tracks: Vec<TrackShort>,
}

#[derive(Debug, Deserialize)]
struct LikesResponse {
    library: Library,
}

#[derive(Debug, Deserialize)]
struct ArtistResults {
    #[serde(default)]
    results: Vec<ArtistCandidate>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    artists: Option<ArtistResults>,
}

#[derive(Debug, Deserialize)]
struct ArtistAlbums {
    #[serde(default)]
    albums: Vec<Album>,
}

#[derive(Debug, Deserialize)]
struct AlbumWithTracks {
    #[serde(default)]
    volumes: Vec<Vec<Track>>,
}

/// `reqwest` implementation of [`CatalogClient`]
///
/// # Example
///
/// ```no_run
/// use yacatalog::{CatalogClient, HttpCatalogClient};
/// use std::time::Duration;
///
/// # async fn run() -> yacatalog::Result<()> {
/// let client = HttpCatalogClient::builder().token("...").connect().await?;
/// let stations = client.rotor_stations_list(Duration::from_secs(2)).await?;
/// println!("{} stations", stations.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: Client,
    api_base: String,
    token: Option<String>,
    uid: Option<String>,
}

impl HttpCatalogClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Identifiant du compte, connu après [`ClientBuilder::connect`]
    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    fn ensure_authenticated(&self) -> Result<&str> {
        self.uid
            .as_deref()
            .ok_or_else(|| CatalogError::Unauthorized("Not authenticated".to_string()))
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_base, endpoint)
    }

    fn authorize(&self, request: RequestBuilder, timeout: Duration) -> RequestBuilder {
        let request = request.timeout(timeout);
        match &self.token {
            Some(token) => request.header("Authorization", format!("OAuth {}", token)),
            None => request,
        }
    }

    /// Effectue une requête GET à l'API
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<T> {
        let url = self.url(endpoint);
        debug!("GET {} with {} params", url, params.len());
        let request = self.authorize(self.client.get(&url).query(params), timeout);
        let response = send(request, endpoint).await?;
        handle_response::<Envelope<T>>(response).await.map(|e| e.result)
    }

    /// Effectue une requête POST (formulaire) à l'API
    async fn post_form<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<T> {
        let url = self.url(endpoint);
        debug!("POST {} with {} params", url, params.len());
        let request = self.authorize(self.client.post(&url).form(params), timeout);
        let response = send(request, endpoint).await?;
        handle_response::<Envelope<T>>(response).await.map(|e| e.result)
    }

    /// Effectue une requête POST (JSON) à l'API
    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        body: &Value,
        timeout: Duration,
    ) -> Result<T> {
        let url = self.url(endpoint);
        debug!("POST {} (json)", url);
        let request = self.authorize(self.client.post(&url).query(query).json(body), timeout);
        let response = send(request, endpoint).await?;
        handle_response::<Envelope<T>>(response).await.map(|e| e.result)
    }

    async fn resolve_short_tracks(
        &self,
        shorts: Vec<TrackShort>,
        timeout: Duration,
    ) -> Result<Vec<Track>> {
        if shorts.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = shorts.iter().map(TrackShort::track_id).collect();
        self.tracks(&ids, timeout).await
    }
}

async fn send(request: RequestBuilder, endpoint: &str) -> Result<Response> {
    request.send().await.map_err(|e| {
        if e.is_timeout() {
            CatalogError::Timeout(endpoint.to_string())
        } else {
            CatalogError::Http(e)
        }
    })
}

/// Traite la réponse HTTP
async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let status_code = status.as_u16();

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        warn!("API error ({}): {}", status_code, error_text);
        return Err(CatalogError::from_status_code(status_code, error_text));
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        warn!("Failed to parse response: {}", e);
        CatalogError::JsonParse(e)
    })
}

/// Builds the signed direct link from a download-info document
pub fn sign_direct_link(doc: &DownloadInfoDocument) -> String {
    let path = doc.path.strip_prefix('/').unwrap_or(&doc.path);
    let mut hasher = Md5::new();
    hasher.update(SIGN_SALT.as_bytes());
    hasher.update(path.as_bytes());
    hasher.update(doc.s.as_bytes());
    let sign = hex::encode(hasher.finalize());
    format!("https://{}/get-mp3/{}/{}/{}", doc.host, sign, doc.ts, path)
}

fn unix_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn rotor_stations_dashboard(&self, timeout: Duration) -> Result<Vec<StationResult>> {
        let dashboard: Dashboard = self.get("/rotor/stations/dashboard", &[], timeout).await?;
        Ok(dashboard.stations)
    }

    async fn rotor_stations_list(&self, timeout: Duration) -> Result<Vec<StationResult>> {
        self.get("/rotor/stations/list", &[], timeout).await
    }

    async fn rotor_station_tracks(
        &self,
        station: &str,
        queue: Option<&str>,
        timeout: Duration,
    ) -> Result<StationTracks> {
        let endpoint = format!("/rotor/station/{}/tracks", station);
        let mut params = vec![("settings2", "true")];
        if let Some(queue) = queue {
            params.push(("queue", queue));
        }
        self.get(&endpoint, &params, timeout).await
    }

    async fn rotor_station_settings(
        &self,
        station: &str,
        settings: &RotorSettings,
        timeout: Duration,
    ) -> Result<bool> {
        let endpoint = format!("/rotor/station/{}/settings2", station);
        let body = serde_json::json!({
            "language": settings.language,
            "diversity": settings.diversity,
            "moodEnergy": settings.mood_energy,
            "type": "rotor",
        });
        let result: Value = self.post_json(&endpoint, &[], &body, timeout).await?;
        Ok(result == "ok")
    }

    async fn rotor_feedback(
        &self,
        station: &str,
        batch_id: Option<&str>,
        feedback: &RotorFeedback,
        timeout: Duration,
    ) -> Result<bool> {
        let endpoint = format!("/rotor/station/{}/feedback", station);
        let mut body = serde_json::to_value(feedback)?;
        if let Value::Object(map) = &mut body {
            map.insert("timestamp".to_string(), Value::String(unix_timestamp()));
        }
        let query: Vec<(&str, &str)> = batch_id.map(|b| ("batch-id", b)).into_iter().collect();
        let result: Value = self.post_json(&endpoint, &query, &body, timeout).await?;
        Ok(result == "ok")
    }

    async fn tracks(&self, track_ids: &[String], timeout: Duration) -> Result<Vec<Track>> {
        let ids = track_ids.join(",");
        self.post_form("/tracks", &[("track-ids", ids.as_str()), ("with-positions", "true")], timeout)
            .await
    }

    async fn download_info(&self, track_id: &str, timeout: Duration) -> Result<Vec<DownloadInfo>> {
        let endpoint = format!("/tracks/{}/download-info", track_id);
        self.get(&endpoint, &[], timeout).await
    }

    async fn direct_link(&self, info: &DownloadInfo, timeout: Duration) -> Result<String> {
        let request = self.authorize(
            self.client
                .get(&info.download_info_url)
                .query(&[("format", "json")]),
            timeout,
        );
        let response = send(request, "download-info document").await?;
        let doc: DownloadInfoDocument = handle_response(response).await?;
        Ok(sign_direct_link(&doc))
    }

    async fn like_track(&self, track_id: &str, timeout: Duration) -> Result<bool> {
        let uid = self.ensure_authenticated()?;
        let endpoint = format!("/users/{}/likes/tracks/add-multiple", uid);
        let result: Value = self
            .post_form(&endpoint, &[("track-ids", track_id)], timeout)
            .await?;
        Ok(result.get("revision").is_some())
    }

    async fn play_audio(&self, report: &PlayAudio, timeout: Duration) -> Result<()> {
        let uid = self.uid.clone().unwrap_or_default();
        let timestamp = unix_timestamp();
        let request = self.authorize(
            self.client
                .post(self.url("/play-audio"))
                .form(report)
                .query(&[("uid", uid.as_str()), ("timestamp", timestamp.as_str())]),
            timeout,
        );
        let response = send(request, "/play-audio").await?;
        let _: Envelope<Value> = handle_response(response).await?;
        Ok(())
    }

    async fn user_playlists(&self, timeout: Duration) -> Result<Vec<PlaylistSummary>> {
        let uid = self.ensure_authenticated()?;
        let endpoint = format!("/users/{}/playlists/list", uid);
        self.get(&endpoint, &[], timeout).await
    }

    async fn playlist_tracks(&self, kind: &str, timeout: Duration) -> Result<Vec<Track>> {
        let uid = self.ensure_authenticated()?;
        let endpoint = format!("/users/{}/playlists/{}", uid, kind);
        let playlist: PlaylistFull = self.get(&endpoint, &[], timeout).await?;
        self.resolve_short_tracks(playlist.tracks, timeout).await
    }

    async fn liked_tracks(&self, timeout: Duration) -> Result<Vec<Track>> {
        let uid = self.ensure_authenticated()?;
        let endpoint = format!("/users/{}/likes/tracks", uid);
        let likes: LikesResponse = self.get(&endpoint, &[], timeout).await?;
        self.resolve_short_tracks(likes.library.tracks, timeout).await
    }

    async fn search_artists(&self, text: &str, timeout: Duration) -> Result<Vec<ArtistCandidate>> {
        let quoted = format!("\"{}\"", text);
        let result: SearchResponse = self
            .get(
                "/search",
                &[("text", quoted.as_str()), ("type", "artist"), ("page", "0")],
                timeout,
            )
            .await?;
        Ok(result.artists.map(|a| a.results).unwrap_or_default())
    }

    async fn artist_albums(&self, artist_id: &str, timeout: Duration) -> Result<Vec<Album>> {
        let endpoint = format!("/artists/{}/direct-albums", artist_id);
        let result: ArtistAlbums = self
            .get(&endpoint, &[("sort-by", "year"), ("page-size", "100")], timeout)
            .await?;
        let mut albums = result.albums;
        albums.sort_by_key(|a| a.year.unwrap_or_default());
        Ok(albums)
    }

    async fn album_tracks(&self, album_id: &str, timeout: Duration) -> Result<Vec<Track>> {
        let endpoint = format!("/albums/{}/with-tracks", album_id);
        let album: AlbumWithTracks = self.get(&endpoint, &[], timeout).await?;
        Ok(album.volumes.into_iter().flatten().collect())
    }
}

/// Builder for [`HttpCatalogClient`]
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    api_base: String,
    token: Option<String>,
    request_timeout: Duration,
    user_agent: String,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the API base URL
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the OAuth token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the overall HTTP client timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client without contacting the API
    pub fn build(self) -> Result<HttpCatalogClient> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.request_timeout)
                .build()?,
        };

        Ok(HttpCatalogClient {
            client,
            api_base: self.api_base,
            token: self.token,
            uid: None,
        })
    }

    /// Build the client and fetch the account id needed by user endpoints
    pub async fn connect(self) -> Result<HttpCatalogClient> {
        let timeout = self.request_timeout;
        let mut client = self.build()?;
        let status: AccountStatus = client.get("/account/status", &[], timeout).await?;
        client.uid = status.account.uid;
        match &client.uid {
            Some(uid) => debug!(uid = %uid, "Connected to catalog"),
            None => warn!("Catalog account has no uid, user endpoints are unavailable"),
        }
        Ok(client)
    }
}
