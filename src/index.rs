//! Derives every folder query from the raw folder list, the type annotations
//! and the namespace.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{trace, warn};

use crate::cache::QueryKey;
use crate::error::{PolicyViolation, Result};
use crate::types::{
    Annotations, Duplicates, Folder, FolderType, Namespace, NamespaceKind, TypeAnnotation,
};

/// The result of resolving a folder listing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FolderIndex {
    /// Folder path to resolved type.
    pub types: BTreeMap<String, FolderType>,
    /// Folder path to folder record.
    pub folders: BTreeMap<String, Folder>,
    /// Folder path to owner.
    pub owners: BTreeMap<String, String>,
    /// Folder type to folder path to folder record.
    pub by_type: BTreeMap<FolderType, BTreeMap<String, Folder>>,
    /// Folder type to the elected default folder of the authenticated user.
    pub defaults: BTreeMap<FolderType, String>,
    /// Owner to folder type to that owner's elected default folder.
    pub personal_defaults: BTreeMap<String, BTreeMap<FolderType, String>>,
    /// Every default claim that lost an election.
    pub duplicates: Duplicates,
}

/// Build the record of a single folder.
pub fn record(namespace: &Namespace, path: &str, annotation: Option<&str>) -> Folder {
    let annotation = annotation.map(TypeAnnotation::parse).unwrap_or_default();
    let element = namespace.element(path);
    Folder {
        folder: path.to_string(),
        folder_type: annotation.folder_type.clone(),
        default: annotation.is_default(),
        owner: namespace.owner(path),
        name: namespace.title(path),
        subpath: namespace.subpath(path),
        parent: namespace.parent(path),
        namespace: element.kind,
        prefix: element.prefix,
        delimiter: element.delimiter,
    }
}

/// The type annotation writes that make `folder` the default folder of its type.
///
/// `annotation` is the folder's current type annotation. The folder must live
/// in the personal namespace and carry a type. `previous`, the folder losing
/// the default, is demoted to the bare type first.
pub fn default_claim(
    namespace: &Namespace,
    folder: &str,
    annotation: Option<&str>,
    previous: Option<&str>,
) -> Result<Vec<(String, String)>> {
    if namespace.classify(folder) != NamespaceKind::Personal {
        return Err(PolicyViolation::NotPersonal(folder.to_string()).into());
    }
    let annotation = match annotation {
        Some(annotation) => TypeAnnotation::parse(annotation),
        None => return Err(PolicyViolation::Untyped(folder.to_string()).into()),
    };
    let mut writes = Vec::with_capacity(2);
    if let Some(previous) = previous.filter(|p| *p != folder) {
        writes.push((
            previous.to_string(),
            TypeAnnotation::bare(&annotation.folder_type).to_string(),
        ));
    }
    writes.push((
        folder.to_string(),
        TypeAnnotation::default_of(&annotation.folder_type).to_string(),
    ));
    Ok(writes)
}

impl FolderIndex {
    /// Resolve `folders` in listing order.
    ///
    /// The first folder claiming the default of a type wins the election for
    /// its owner. Later claimants are recorded in [`FolderIndex::duplicates`]
    /// after the winner.
    pub fn build(
        folders: &[String],
        annotations: &Annotations,
        namespace: &Namespace,
    ) -> FolderIndex {
        let mut index = FolderIndex::default();
        for path in folders {
            let folder = record(namespace, path, annotations.get(path).map(String::as_str));
            trace!("{} resolved as {} owned by {}", path, folder.folder_type, folder.owner);

            index.types.insert(path.clone(), folder.folder_type.clone());
            index.owners.insert(path.clone(), folder.owner.clone());
            index
                .by_type
                .entry(folder.folder_type.clone())
                .or_default()
                .insert(path.clone(), folder.clone());

            if folder.default {
                index.elect(&folder);
            }
            index.folders.insert(path.clone(), folder);
        }
        index
    }

    fn elect(&mut self, folder: &Folder) {
        let owned = self.personal_defaults.entry(folder.owner.clone()).or_default();
        match owned.entry(folder.folder_type.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(folder.folder.clone());
                if folder.namespace == NamespaceKind::Personal {
                    self.defaults
                        .insert(folder.folder_type.clone(), folder.folder.clone());
                }
            }
            Entry::Occupied(elected) => {
                warn!(
                    "{} and {} both claim to be the default {} folder of {}",
                    elected.get(),
                    folder.folder,
                    folder.folder_type,
                    folder.owner
                );
                self.duplicates
                    .entry(folder.folder_type.clone())
                    .or_default()
                    .entry(folder.owner.clone())
                    .or_insert_with(|| vec![elected.get().clone()])
                    .push(folder.folder.clone());
            }
        }
    }

    /// Serialize every persisted query.
    pub fn queries(&self) -> Result<Vec<(QueryKey, Value)>> {
        Ok(vec![
            (QueryKey::Types, serde_json::to_value(&self.types)?),
            (QueryKey::Folders, serde_json::to_value(&self.folders)?),
            (QueryKey::Owners, serde_json::to_value(&self.owners)?),
            (QueryKey::ByType, serde_json::to_value(&self.by_type)?),
            (QueryKey::Defaults, serde_json::to_value(&self.defaults)?),
            (
                QueryKey::PersonalDefaults,
                serde_json::to_value(&self.personal_defaults)?,
            ),
            (QueryKey::Duplicates, serde_json::to_value(&self.duplicates)?),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn list(folders: &[&str]) -> Vec<String> {
        folders.iter().map(|f| f.to_string()).collect()
    }

    fn annotate(pairs: &[(&str, &str)]) -> Annotations {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn inbox_annotated_as_event() {
        let ns = Namespace::fixed("test");
        let index = FolderIndex::build(&list(&["INBOX"]), &annotate(&[("INBOX", "event")]), &ns);
        assert_eq!(index.types["INBOX"], FolderType::Event);
        assert!(!index.folders["INBOX"].default);
        assert!(index.defaults.is_empty());
    }

    #[test]
    fn unannotated_is_mail() {
        let ns = Namespace::fixed("test");
        let index = FolderIndex::build(&list(&["INBOX", "Notes"]), &annotate(&[]), &ns);
        assert_eq!(index.types["Notes"], FolderType::Mail);
        assert_eq!(index.by_type[&FolderType::Mail].len(), 2);
    }

    #[test]
    fn first_default_wins() {
        let ns = Namespace::fixed("test");
        let annotations = annotate(&[("Calendar", "event.default"), ("Work", "event.default")]);
        let index = FolderIndex::build(&list(&["Work", "Calendar"]), &annotations, &ns);
        assert_eq!(index.defaults[&FolderType::Event], "Work");
        assert_eq!(
            index.duplicates[&FolderType::Event]["test"],
            vec!["Work".to_string(), "Calendar".to_string()]
        );

        let index = FolderIndex::build(&list(&["Calendar", "Work"]), &annotations, &ns);
        assert_eq!(index.defaults[&FolderType::Event], "Calendar");
        assert_eq!(index.duplicates[&FolderType::Event]["test"].len(), 2);
    }

    #[test]
    fn three_claimants_are_all_listed() {
        let ns = Namespace::fixed("test");
        let annotations = annotate(&[
            ("A", "note.default"),
            ("B", "note.default"),
            ("C", "note.default"),
        ]);
        let index = FolderIndex::build(&list(&["A", "B", "C"]), &annotations, &ns);
        assert_eq!(index.duplicates[&FolderType::Note]["test"], list(&["A", "B", "C"]));
    }

    #[test]
    fn foreign_defaults_are_not_elected_for_the_user() {
        let ns = Namespace::fixed("test@example.org");
        let annotations = annotate(&[
            ("user/john/Calendar", "event.default"),
            ("shared/Calendar", "event.default"),
            ("Calendar", "event.default"),
        ]);
        let index = FolderIndex::build(
            &list(&["user/john/Calendar", "shared/Calendar", "Calendar"]),
            &annotations,
            &ns,
        );
        assert_eq!(index.defaults[&FolderType::Event], "Calendar");
        assert_eq!(
            index.personal_defaults["john@example.org"][&FolderType::Event],
            "user/john/Calendar"
        );
        assert_eq!(
            index.personal_defaults[Namespace::ANONYMOUS][&FolderType::Event],
            "shared/Calendar"
        );
        assert!(index.duplicates.is_empty());
    }

    #[test]
    fn records_carry_namespace_details() {
        let ns = Namespace::fixed("test@example.org");
        let folder = record(&ns, "user/john/Calendar/Work", Some("event"));
        assert_eq!(folder.owner, "john@example.org");
        assert_eq!(folder.name, "Calendar:Work");
        assert_eq!(folder.subpath, "Calendar/Work");
        assert_eq!(folder.parent, "user/john/Calendar");
        assert_eq!(folder.namespace, NamespaceKind::Other);
        assert_eq!(folder.prefix, "user");
        assert_eq!(folder.delimiter, "/");
    }

    #[test]
    fn default_claim_demotes_previous() {
        let ns = Namespace::fixed("test");
        let writes = default_claim(&ns, "Calendar1", Some("event"), Some("Calendar")).unwrap();
        assert_eq!(
            writes,
            vec![
                ("Calendar".to_string(), "event".to_string()),
                ("Calendar1".to_string(), "event.default".to_string()),
            ]
        );
    }

    #[test]
    fn default_claim_policy() {
        let ns = Namespace::fixed("test");
        match default_claim(&ns, "shared/Calendar", None, None) {
            Err(Error::Policy(PolicyViolation::NotPersonal(f))) => assert_eq!(f, "shared/Calendar"),
            other => unreachable!("unexpected {:?}", other),
        }
        match default_claim(&ns, "Calendar", None, None) {
            Err(Error::Policy(PolicyViolation::Untyped(f))) => assert_eq!(f, "Calendar"),
            other => unreachable!("unexpected {:?}", other),
        }
    }

    #[test]
    fn queries_cover_every_index() {
        let ns = Namespace::fixed("test");
        let index = FolderIndex::build(&list(&["INBOX"]), &annotate(&[]), &ns);
        let keys: Vec<QueryKey> = index.queries().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                QueryKey::Types,
                QueryKey::Folders,
                QueryKey::Owners,
                QueryKey::ByType,
                QueryKey::Defaults,
                QueryKey::PersonalDefaults,
                QueryKey::Duplicates,
            ]
        );
    }
}
