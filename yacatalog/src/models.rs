//! Structures de données pour représenter les objets du catalogue

use serde::{Deserialize, Deserializer, Serialize};

/// Désérialiseur flexible pour les IDs qui peuvent être des strings ou des integers
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(Error::custom("ID must be a string or number")),
    }
}

pub(crate) fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Identifiant d'une station rotor (`genre:rock`, `user:onyourwave`...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StationId {
    #[serde(rename = "type")]
    pub kind: String,
    pub tag: String,
}

impl StationId {
    /// Identifiant complet utilisé par l'API rotor (`type:tag`)
    pub fn full(&self) -> String {
        format!("{}:{}", self.kind, self.tag)
    }
}

/// Valeur autorisée pour un réglage de station
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestrictionValue {
    #[serde(deserialize_with = "deserialize_id")]
    pub value: String,
    pub name: String,
}

/// Un réglage de station et ses valeurs possibles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Restriction {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub possible_values: Vec<RestrictionValue>,
}

/// Restrictions (valeurs admises) des réglages d'une station
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Restrictions {
    #[serde(default)]
    pub language: Option<Restriction>,
    #[serde(default)]
    pub diversity: Option<Restriction>,
    #[serde(default)]
    pub mood_energy: Option<Restriction>,
}

/// Réglages rotor d'une station
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RotorSettings {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub diversity: String,
    #[serde(default)]
    pub mood_energy: String,
}

/// Représente une station rotor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: StationId,
    pub name: String,
    #[serde(default)]
    pub restrictions2: Option<Restrictions>,
    #[serde(default)]
    pub id_for_from: Option<String>,
}

/// Une station et ses réglages par défaut côté serveur
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StationResult {
    pub station: Station,
    #[serde(default)]
    pub settings2: Option<RotorSettings>,
}

/// Entrée sélectionnable dans l'interface (station, playlist, artiste, album)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceEntry {
    pub id: String,
    pub name: String,
}

impl SourceEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Référence d'artiste portée par un track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtistRef {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub id: Option<String>,
    pub name: String,
}

/// Représente un album
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default)]
    pub track_count: Option<u32>,
}

/// Représente un track du catalogue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub albums: Vec<Album>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl Track {
    pub fn artists_name(&self) -> Vec<&str> {
        self.artists.iter().map(|a| a.name.as_str()).collect()
    }

    /// Durée en secondes (fractionnaire)
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }

    pub fn album_id(&self) -> Option<&str> {
        self.albums.first().map(|a| a.id.as_str())
    }
}

/// Entrée d'une séquence rotor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SequenceItem {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub track: Track,
    #[serde(default)]
    pub liked: Option<bool>,
}

/// Lot de tracks renvoyé par une station
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StationTracks {
    #[serde(default)]
    pub id: Option<StationId>,
    pub batch_id: String,
    #[serde(default)]
    pub sequence: Vec<SequenceItem>,
}

/// Descripteur de téléchargement d'un track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInfo {
    pub codec: String,
    pub bitrate_in_kbps: u32,
    pub download_info_url: String,
    #[serde(default)]
    pub gain: bool,
    #[serde(default)]
    pub preview: bool,
}

/// Document pointé par `download_info_url`, utilisé pour signer le lien direct
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DownloadInfoDocument {
    pub host: String,
    pub path: String,
    pub ts: String,
    pub s: String,
}

/// Playlist de l'utilisateur (sans ses tracks)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    #[serde(deserialize_with = "deserialize_id")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub track_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtistCounts {
    #[serde(default)]
    pub direct_albums: u32,
}

/// Résultat de recherche d'artiste
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtistCandidate {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub counts: ArtistCounts,
}

/// Rapport générique de lecture (`/play-audio`)
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct PlayAudio {
    pub track_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
    pub play_id: String,
    pub from: String,
    pub track_length_seconds: u64,
    pub total_played_seconds: f64,
    pub end_position_seconds: f64,
}

/// Retour d'écoute envoyé à une station rotor
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RotorFeedback {
    RadioStarted { from: String },
    TrackStarted { track_id: String },
    Skip { track_id: String, total_played_seconds: f64 },
    TrackFinished { track_id: String, total_played_seconds: f64 },
}

impl RotorFeedback {
    pub fn name(&self) -> &'static str {
        match self {
            RotorFeedback::RadioStarted { .. } => "radioStarted",
            RotorFeedback::TrackStarted { .. } => "trackStarted",
            RotorFeedback::Skip { .. } => "skip",
            RotorFeedback::TrackFinished { .. } => "trackFinished",
        }
    }
}
