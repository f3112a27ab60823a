use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::namespace::NamespaceKind;
use crate::error::Result;

lazy_static! {
    static ref TYPE_ANNOTATION: Regex = Regex::new(r"^(?P<type>[^.]*)(?:\.(?P<sub>.*))?$").unwrap();
}

/// The groupware type of a folder, taken from the `folder-type` annotation.
///
/// Folders without an annotation hold plain mail.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum FolderType {
    /// Plain mail, also the type of every unannotated folder.
    Mail,
    /// Calendar events.
    Event,
    /// Address book entries.
    Contact,
    /// Notes.
    Note,
    /// Tasks.
    Task,
    /// Journal entries.
    Journal,
    /// Client configuration objects.
    Configuration,
    /// Free/busy data.
    FreeBusy,
    /// File attachments.
    File,
    /// A type this crate does not know about.
    Other(String),
}

impl FolderType {
    /// The annotation spelling of this type.
    pub fn as_str(&self) -> &str {
        match self {
            FolderType::Mail => "mail",
            FolderType::Event => "event",
            FolderType::Contact => "contact",
            FolderType::Note => "note",
            FolderType::Task => "task",
            FolderType::Journal => "journal",
            FolderType::Configuration => "configuration",
            FolderType::FreeBusy => "freebusy",
            FolderType::File => "file",
            FolderType::Other(s) => s,
        }
    }
}

impl From<&str> for FolderType {
    fn from(s: &str) -> Self {
        match s {
            "" | "mail" => FolderType::Mail,
            "event" => FolderType::Event,
            "contact" => FolderType::Contact,
            "note" => FolderType::Note,
            "task" => FolderType::Task,
            "journal" => FolderType::Journal,
            "configuration" => FolderType::Configuration,
            "freebusy" => FolderType::FreeBusy,
            "file" => FolderType::File,
            other => FolderType::Other(other.to_string()),
        }
    }
}

impl FromStr for FolderType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(FolderType::from(s))
    }
}

impl fmt::Display for FolderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Serialized as the bare annotation string so that types can key JSON maps.
impl Serialize for FolderType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FolderType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.contains('.') {
            return Err(de::Error::custom(format!("{s:?} is an annotation, not a type")));
        }
        Ok(FolderType::from(s.as_str()))
    }
}

/// A parsed `folder-type` annotation value such as `event.default` or `mail.sentitems`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeAnnotation {
    /// The folder type before the first dot.
    pub folder_type: FolderType,
    /// Everything after the first dot, if present.
    pub subtype: Option<String>,
}

impl TypeAnnotation {
    /// Parse an annotation value. An empty value means mail.
    pub fn parse(value: &str) -> Self {
        let caps = match TYPE_ANNOTATION.captures(value) {
            Some(caps) => caps,
            None => return Self::default(),
        };
        let folder_type = caps
            .name("type")
            .map(|m| FolderType::from(m.as_str()))
            .unwrap_or(FolderType::Mail);
        let subtype = caps
            .name("sub")
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.is_empty());
        TypeAnnotation {
            folder_type,
            subtype,
        }
    }

    /// The annotation marking a folder of type `folder_type` as default.
    pub fn default_of(folder_type: &FolderType) -> Self {
        TypeAnnotation {
            folder_type: folder_type.clone(),
            subtype: Some("default".to_string()),
        }
    }

    /// The annotation carrying only the bare type.
    pub fn bare(folder_type: &FolderType) -> Self {
        TypeAnnotation {
            folder_type: folder_type.clone(),
            subtype: None,
        }
    }

    /// Whether the annotation claims the default folder of its type.
    pub fn is_default(&self) -> bool {
        self.subtype.as_deref() == Some("default")
    }
}

impl Default for TypeAnnotation {
    fn default() -> Self {
        TypeAnnotation::bare(&FolderType::Mail)
    }
}

impl fmt::Display for TypeAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subtype {
            Some(ref sub) => write!(f, "{}.{}", self.folder_type, sub),
            None => write!(f, "{}", self.folder_type),
        }
    }
}

/// A folder record as stored in the `FOLDERS` and `BY_TYPE` indices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// The full backend path of the folder.
    pub folder: String,
    /// The resolved folder type.
    #[serde(rename = "type")]
    pub folder_type: FolderType,
    /// Whether the folder's annotation claims the default of its type.
    pub default: bool,
    /// The user owning the folder.
    pub owner: String,
    /// A readable title.
    pub name: String,
    /// The path below the namespace prefix (and owner, for other users' folders).
    pub subpath: String,
    /// The path of the parent folder, empty at the top level.
    pub parent: String,
    /// The namespace the folder lives in.
    pub namespace: NamespaceKind,
    /// Prefix of the matching namespace element.
    pub prefix: String,
    /// Hierarchy delimiter of the matching namespace element.
    pub delimiter: String,
}

/// Opaque share parameters kept in a folder annotation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(pub BTreeMap<String, Value>);

impl Parameters {
    /// The parameter holding the name of the share backed by the folder.
    pub const SHARE_NAME: &'static str = "share_name";

    /// Look up a single parameter.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a single parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// The share name, if the parameters carry a non-empty string for it.
    pub fn share_name(&self) -> Option<&str> {
        self.get(Self::SHARE_NAME)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Decode the annotation representation: base64 encoded JSON.
    pub fn decode(annotation: &str) -> Result<Self> {
        if annotation.is_empty() {
            return Ok(Parameters::default());
        }
        let json = STANDARD.decode(annotation.trim())?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Encode into the annotation representation.
    pub fn encode(&self) -> Result<String> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_type() {
        let annotation = TypeAnnotation::parse("event");
        assert_eq!(annotation.folder_type, FolderType::Event);
        assert!(!annotation.is_default());
    }

    #[test]
    fn parse_default_type() {
        let annotation = TypeAnnotation::parse("contact.default");
        assert_eq!(annotation.folder_type, FolderType::Contact);
        assert!(annotation.is_default());
        assert_eq!(annotation.to_string(), "contact.default");
    }

    #[test]
    fn parse_subtype_is_not_default() {
        let annotation = TypeAnnotation::parse("mail.sentitems");
        assert_eq!(annotation.folder_type, FolderType::Mail);
        assert_eq!(annotation.subtype.as_deref(), Some("sentitems"));
        assert!(!annotation.is_default());
    }

    #[test]
    fn empty_annotation_is_mail() {
        assert_eq!(TypeAnnotation::parse(""), TypeAnnotation::default());
        assert_eq!(TypeAnnotation::parse("").folder_type, FolderType::Mail);
    }

    #[test]
    fn unknown_type_is_kept() {
        let annotation = TypeAnnotation::parse("h-prefs.default");
        assert_eq!(annotation.folder_type, FolderType::Other("h-prefs".into()));
        assert_eq!(annotation.to_string(), "h-prefs.default");
    }

    #[test]
    fn folder_type_keys_json_maps() {
        let mut map = BTreeMap::new();
        map.insert(FolderType::Event, "Calendar");
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"event":"Calendar"}"#);
        let back: BTreeMap<FolderType, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[&FolderType::Event], "Calendar");
    }

    #[test]
    fn parameters_annotation_encoding() {
        let mut params = Parameters::default();
        params.insert(Parameters::SHARE_NAME, "internal_id");
        let encoded = params.encode().unwrap();
        assert_eq!(Parameters::decode(&encoded).unwrap().share_name(), Some("internal_id"));
        assert_eq!(Parameters::decode("").unwrap(), Parameters::default());
        assert!(Parameters::decode("%%%").is_err());
    }
}
