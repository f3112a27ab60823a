use serde::{Deserialize, Serialize};

/// The three IMAP namespace roles from [RFC 2342](https://tools.ietf.org/html/rfc2342).
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    /// Folders of the authenticated user.
    Personal,
    /// Folders of other users that were shared with the authenticated user.
    Other,
    /// Folders shared by nobody in particular.
    Shared,
}

/// A single namespace declaration: everything below `prefix` belongs to `kind`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceElement {
    /// The role of folders in this namespace.
    pub kind: NamespaceKind,
    /// The path prefix, without a trailing delimiter. Empty matches every path.
    pub prefix: String,
    /// The hierarchy delimiter used below the prefix.
    pub delimiter: String,
}

impl NamespaceElement {
    /// Declare a namespace element.
    pub fn new(
        kind: NamespaceKind,
        prefix: impl Into<String>,
        delimiter: impl Into<String>,
    ) -> Self {
        NamespaceElement {
            kind,
            prefix: prefix.into(),
            delimiter: delimiter.into(),
        }
    }

    fn matches(&self, path: &str) -> bool {
        if self.prefix.is_empty() || path == self.prefix {
            return true;
        }
        path.strip_prefix(self.prefix.as_str())
            .map_or(false, |rest| rest.starts_with(self.delimiter.as_str()))
    }

    /// The path segments below the prefix.
    fn segments<'a>(&self, path: &'a str) -> Vec<&'a str> {
        let rest = if self.prefix.is_empty() {
            path
        } else {
            path.strip_prefix(self.prefix.as_str())
                .map(|rest| rest.strip_prefix(self.delimiter.as_str()).unwrap_or(rest))
                .unwrap_or(path)
        };
        rest.split(self.delimiter.as_str())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Classifies folder paths for one authenticated user.
///
/// The element with the longest matching prefix decides a path's role. Paths
/// no element matches are treated as personal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    user: String,
    elements: Vec<NamespaceElement>,
}

impl Namespace {
    /// The owner reported for folders in the shared namespace.
    pub const ANONYMOUS: &'static str = "anonymous";

    /// The name IMAP reserves for the user's inbox.
    pub const INBOX: &'static str = "INBOX";

    /// Build a namespace from explicit elements.
    pub fn new(user: impl Into<String>, elements: Vec<NamespaceElement>) -> Self {
        Namespace {
            user: user.into(),
            elements,
        }
    }

    /// The common layout: personal folders at the top level, other users below
    /// `user/`, shared folders below `shared/`.
    pub fn fixed(user: impl Into<String>) -> Self {
        Namespace::new(
            user,
            vec![
                NamespaceElement::new(NamespaceKind::Personal, "", "/"),
                NamespaceElement::new(NamespaceKind::Other, "user", "/"),
                NamespaceElement::new(NamespaceKind::Shared, "shared", "/"),
            ],
        )
    }

    /// The authenticated user.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The declared elements.
    pub fn elements(&self) -> &[NamespaceElement] {
        &self.elements
    }

    /// The element governing `path`.
    pub fn element(&self, path: &str) -> NamespaceElement {
        self.elements
            .iter()
            .filter(|e| e.matches(path))
            .max_by_key(|e| e.prefix.len())
            .cloned()
            .unwrap_or_else(|| NamespaceElement::new(NamespaceKind::Personal, "", "/"))
    }

    /// The namespace role of `path`.
    pub fn classify(&self, path: &str) -> NamespaceKind {
        self.element(path).kind
    }

    /// The owner of `path`.
    ///
    /// Other users' folders are owned by the first segment below the prefix. If
    /// that name carries no domain, the authenticated user's domain is added.
    pub fn owner(&self, path: &str) -> String {
        let element = self.element(path);
        match element.kind {
            NamespaceKind::Personal => self.user.clone(),
            NamespaceKind::Shared => Self::ANONYMOUS.to_string(),
            NamespaceKind::Other => {
                let user = element.segments(path).first().copied().unwrap_or_default();
                match self.user.find('@') {
                    Some(at) if !user.contains('@') => format!("{}{}", user, &self.user[at..]),
                    _ => user.to_string(),
                }
            }
        }
    }

    /// The path below the namespace prefix, the owner segment and a leading `INBOX`.
    pub fn subpath(&self, path: &str) -> String {
        let element = self.element(path);
        let mut segments = element.segments(path);
        match element.kind {
            NamespaceKind::Other if !segments.is_empty() => {
                segments.remove(0);
            }
            NamespaceKind::Personal if segments.len() > 1 && segments[0] == Self::INBOX => {
                segments.remove(0);
            }
            _ => {}
        }
        if segments.is_empty() {
            return path.to_string();
        }
        segments.join(&element.delimiter)
    }

    /// A readable title: the subpath segments joined by `:`.
    pub fn title(&self, path: &str) -> String {
        let element = self.element(path);
        self.subpath(path)
            .split(element.delimiter.as_str())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// The parent path of `path`, empty at the top level.
    pub fn parent(&self, path: &str) -> String {
        let element = self.element(path);
        match path.rfind(element.delimiter.as_str()) {
            Some(pos) => path[..pos].to_string(),
            None => String::new(),
        }
    }
}
