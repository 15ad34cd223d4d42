use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Remote directory that can become the active folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub name: String,
    pub kind: String,
}

/// The set of folders index queries are restricted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderScope {
    folders: BTreeSet<String>,
}

impl FolderScope {
    pub fn single(folder: impl Into<String>) -> Self {
        let mut folders = BTreeSet::new();
        folders.insert(folder.into());
        Self { folders }
    }

    pub fn of<I, S>(folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            folders: folders.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, folder: &str) -> bool {
        self.folders.contains(folder)
    }

    pub fn folders(&self) -> impl Iterator<Item = &str> {
        self.folders.iter().map(String::as_str)
    }
}

impl fmt::Display for FolderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.folders().collect();
        f.write_str(&names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::FolderScope;

    #[test]
    fn scope_displays_all_folders() {
        let scope = FolderScope::of(["Vacation", "Home"]);
        assert!(scope.contains("Home"));
        assert!(!scope.contains("Work"));
        assert_eq!(scope.to_string(), "Home, Vacation");
    }
}
