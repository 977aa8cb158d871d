//! Spotify Web API client (blocking).
//!
//! Covers the three narrow surfaces the pipeline needs: the OAuth
//! authorization-code handshake with an on-disk token cache, the paginated
//! saved-tracks read, and playlist read/write for the organize variant.
//!
//! Authorization is interactive on first run: the authorize URL is printed,
//! the user approves in a browser and pastes the redirect URL back. The
//! resulting token (plus refresh token) is cached so later runs are silent.

use crate::config::Config;
use crate::models::Track;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const API_BASE_URL: &str = "https://api.spotify.com/v1";
const ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for /me/tracks and /me/playlists, fixed by the API.
pub const PAGE_LIMIT: u32 = 50;
/// Maximum track uris per playlist-add call, fixed by the API.
pub const PLAYLIST_ADD_LIMIT: usize = 100;

const SCOPES: &str = "user-library-read playlist-modify-private playlist-read-private";

/// Refresh this long before the reported expiry to avoid mid-run 401s.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("token cache error: {0}")]
    TokenCache(#[from] std::io::Error),

    #[error("token cache is malformed: {0}")]
    TokenFormat(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        Utc::now() + ChronoDuration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

// ============================================================================
// Wire models
//
// Everything nullable: a malformed item (removed track, local file) must
// surface as a skippable record, never abort deserialization of the page.
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SavedTracksPage {
    pub items: Vec<SavedTrackItem>,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SavedTrackItem {
    pub added_at: Option<String>,
    pub track: Option<RawTrack>,
}

#[derive(Debug, Deserialize)]
pub struct RawTrack {
    pub id: Option<String>,
    pub name: Option<String>,
    pub uri: Option<String>,
    #[serde(default)]
    pub popularity: i64,
    #[serde(default)]
    pub artists: Vec<RawArtist>,
    pub album: Option<RawAlbum>,
}

#[derive(Debug, Deserialize)]
pub struct RawArtist {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawAlbum {
    pub name: Option<String>,
    pub release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistsPage {
    items: Vec<PlaylistRef>,
    next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
}

/// Convert one saved-track item into a `Track`. Returns `None` when required
/// fields are missing; the caller logs and skips such items.
pub fn item_to_track(item: &SavedTrackItem) -> Option<Track> {
    let track = item.track.as_ref()?;
    let album = track.album.as_ref()?;

    let artist = track
        .artists
        .iter()
        .filter_map(|a| a.name.as_deref())
        .collect::<Vec<_>>()
        .join(", ");

    Some(Track {
        id: track.id.clone()?,
        name: track.name.clone()?,
        artist,
        album: album.name.clone()?,
        uri: track.uri.clone()?,
        popularity: track.popularity,
        added_at: item.added_at.clone().unwrap_or_default(),
        release_date: album
            .release_date
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
    })
}

/// Extract the `code` parameter from a pasted redirect URL, or accept a bare
/// code pasted directly.
pub fn extract_auth_code(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(pos) = trimmed.find("code=") {
        let rest = &trimmed[pos + "code=".len()..];
        let code = rest.split(['&', '#']).next().unwrap_or(rest);
        if code.is_empty() {
            return None;
        }
        return Some(code.to_string());
    }
    if trimmed.contains("://") {
        // A URL without a code parameter (e.g. an error redirect).
        return None;
    }
    Some(trimmed.to_string())
}

pub struct SpotifyClient {
    http: reqwest::blocking::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_path: PathBuf,
    token: CachedToken,
}

impl SpotifyClient {
    /// Authenticate against Spotify, reusing the cached token when possible.
    pub fn connect(config: &Config, token_path: &Path) -> Result<Self, SpotifyError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut client = Self {
            http,
            client_id: config.spotify_client_id.clone(),
            client_secret: config.spotify_client_secret.clone(),
            redirect_uri: config.spotify_redirect_uri.clone(),
            token_path: token_path.to_path_buf(),
            token: CachedToken {
                access_token: String::new(),
                refresh_token: None,
                expires_at: Utc::now(),
            },
        };

        if token_path.exists() {
            let raw = std::fs::read_to_string(token_path)?;
            match serde_json::from_str::<CachedToken>(&raw) {
                Ok(token) => {
                    client.token = token;
                    client.ensure_fresh_token()?;
                    return Ok(client);
                }
                Err(e) => warn!("Ignoring unreadable token cache: {}", e),
            }
        }

        client.authorize_interactively()?;
        Ok(client)
    }

    fn ensure_fresh_token(&mut self) -> Result<(), SpotifyError> {
        if !self.token.is_expired() {
            return Ok(());
        }
        match self.token.refresh_token.clone() {
            Some(refresh_token) => self.refresh_access_token(&refresh_token),
            None => {
                warn!("Cached token expired and no refresh token present; re-authorizing");
                self.authorize_interactively()
            }
        }
    }

    fn authorize_interactively(&mut self) -> Result<(), SpotifyError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{ACCOUNTS_BASE_URL}/authorize"),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", SCOPES),
            ],
        )
        .map_err(|e| SpotifyError::Auth(format!("invalid authorize URL: {e}")))?;

        println!("Open this URL in a browser and approve access:");
        println!("\n  {url}\n");
        print!("Paste the URL you were redirected to: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        let code = extract_auth_code(&line)
            .ok_or_else(|| SpotifyError::Auth("no authorization code in input".to_string()))?;

        let redirect_uri = self.redirect_uri.clone();
        self.exchange_token(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ])
    }

    fn refresh_access_token(&mut self, refresh_token: &str) -> Result<(), SpotifyError> {
        info!("Refreshing Spotify access token");
        self.exchange_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
    }

    fn exchange_token(&mut self, form: &[(&str, &str)]) -> Result<(), SpotifyError> {
        let response = self
            .http
            .post(format!("{ACCOUNTS_BASE_URL}/api/token"))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SpotifyError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json()?;
        let refresh_token = token
            .refresh_token
            .or_else(|| self.token.refresh_token.clone());
        self.token = CachedToken {
            access_token: token.access_token,
            refresh_token,
            expires_at: Utc::now() + ChronoDuration::seconds(token.expires_in),
        };

        // Best-effort cache write: a failure here costs a re-auth next run,
        // not this one.
        if let Err(e) = std::fs::write(
            &self.token_path,
            serde_json::to_string_pretty(&self.token)?,
        ) {
            warn!("Failed to write token cache: {}", e);
        }
        Ok(())
    }

    fn get_json<T: serde::de::DeserializeOwned>(&mut self, url: &str) -> Result<T, SpotifyError> {
        self.ensure_fresh_token()?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token.access_token)
            .send()?;
        Self::parse_response(response)
    }

    fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &mut self,
        url: &str,
        body: &B,
    ) -> Result<T, SpotifyError> {
        self.ensure_fresh_token()?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token.access_token)
            .json(body)
            .send()?;
        Self::parse_response(response)
    }

    fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::blocking::Response,
    ) -> Result<T, SpotifyError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SpotifyError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json()?)
    }

    /// One page of the user's saved tracks.
    pub fn saved_tracks_page(&mut self, offset: u32) -> Result<SavedTracksPage, SpotifyError> {
        self.get_json(&format!(
            "{API_BASE_URL}/me/tracks?limit={PAGE_LIMIT}&offset={offset}"
        ))
    }

    pub fn current_user_id(&mut self) -> Result<String, SpotifyError> {
        let profile: UserProfile = self.get_json(&format!("{API_BASE_URL}/me"))?;
        Ok(profile.id)
    }

    /// All of the current user's playlists (id + name), fully drained.
    pub fn list_playlists(&mut self) -> Result<Vec<PlaylistRef>, SpotifyError> {
        let mut playlists = Vec::new();
        let mut offset = 0u32;
        loop {
            let page: PlaylistsPage = self.get_json(&format!(
                "{API_BASE_URL}/me/playlists?limit={PAGE_LIMIT}&offset={offset}"
            ))?;
            let fetched = page.items.len() as u32;
            playlists.extend(page.items);
            if page.next.is_none() || fetched == 0 {
                break;
            }
            offset += PAGE_LIMIT;
        }
        Ok(playlists)
    }

    pub fn create_private_playlist(
        &mut self,
        user_id: &str,
        name: &str,
        description: &str,
    ) -> Result<String, SpotifyError> {
        let body = serde_json::json!({
            "name": name,
            "public": false,
            "description": description,
        });
        let created: CreatedPlaylist =
            self.post_json(&format!("{API_BASE_URL}/users/{user_id}/playlists"), &body)?;
        Ok(created.id)
    }

    /// Append up to [`PLAYLIST_ADD_LIMIT`] track uris to a playlist.
    pub fn add_tracks_to_playlist(
        &mut self,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError> {
        let body = serde_json::json!({ "uris": uris });
        let _: serde_json::Value =
            self.post_json(&format!("{API_BASE_URL}/playlists/{playlist_id}/tracks"), &body)?;
        Ok(())
    }
}
