use crate::types::{NavigationMeta, Page, UnknownPage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NavigationState {
    pub page: Page,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationCommand {
    pub page: Page,
    // Only ever set for `Page::Project`.
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("metadata is not a navigation event: {0:?}")]
    NotNavigation(String),
    #[error("navigation event without a page")]
    MissingPage,
    #[error(transparent)]
    UnknownPage(#[from] UnknownPage),
}

pub fn resolve_navigation(meta: &NavigationMeta) -> Result<NavigationCommand, NavigationError> {
    if meta.kind != NavigationMeta::KIND_NAVIGATION {
        return Err(NavigationError::NotNavigation(meta.kind.clone()));
    }

    let page: Page = meta
        .page
        .as_deref()
        .ok_or(NavigationError::MissingPage)?
        .parse()?;

    let project_id = match page {
        Page::Project => meta
            .project_id
            .clone()
            .filter(|id| !id.trim().is_empty()),
        _ => None,
    };

    Ok(NavigationCommand { page, project_id })
}

impl NavigationState {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            project_id: None,
        }
    }

    /// Apply a resolved command. Returns whether anything changed.
    ///
    /// A project command without an id keeps the previously selected project.
    pub fn apply(&mut self, cmd: &NavigationCommand) -> bool {
        let before = self.clone();
        self.page = cmd.page;
        if let Some(id) = &cmd.project_id {
            self.project_id = Some(id.clone());
        }
        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_pages() {
        let cmd = resolve_navigation(&NavigationMeta::navigate("education")).unwrap();
        assert_eq!(
            cmd,
            NavigationCommand {
                page: Page::Education,
                project_id: None
            }
        );
    }

    #[test]
    fn project_id_only_applies_to_project_page() {
        let cmd =
            resolve_navigation(&NavigationMeta::navigate("project").with_project_id("p-7")).unwrap();
        assert_eq!(cmd.project_id.as_deref(), Some("p-7"));

        let cmd =
            resolve_navigation(&NavigationMeta::navigate("personal").with_project_id("p-7"))
                .unwrap();
        assert_eq!(cmd.page, Page::Personal);
        assert_eq!(cmd.project_id, None);
    }

    #[test]
    fn rejects_unknown_and_non_navigation_events() {
        assert_eq!(
            resolve_navigation(&NavigationMeta::navigate("blog")),
            Err(NavigationError::UnknownPage(UnknownPage("blog".into())))
        );

        let mut meta = NavigationMeta::navigate("project");
        meta.kind = "tool_call".into();
        assert!(matches!(
            resolve_navigation(&meta),
            Err(NavigationError::NotNavigation(_))
        ));

        meta.kind = "navigation".into();
        meta.page = None;
        assert_eq!(resolve_navigation(&meta), Err(NavigationError::MissingPage));
    }

    #[test]
    fn state_keeps_project_when_command_has_none() {
        let mut state = NavigationState::new(Page::Landing);
        assert!(state.apply(&NavigationCommand {
            page: Page::Project,
            project_id: Some("p-1".into()),
        }));
        assert!(state.apply(&NavigationCommand {
            page: Page::Education,
            project_id: None,
        }));
        assert!(state.apply(&NavigationCommand {
            page: Page::Project,
            project_id: None,
        }));
        assert_eq!(state.project_id.as_deref(), Some("p-1"));
        assert!(!state.apply(&NavigationCommand {
            page: Page::Project,
            project_id: None,
        }));
    }
}
