use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::host::{Badge, SignInPanel};

/// What the toolbar currently shows.
#[derive(Debug, Clone)]
pub struct ToolbarView {
    pub badge: Option<u32>,
    pub badge_color: String,
    pub badge_updated: Option<DateTime<Utc>>,
    pub panel_visible: bool,
    pub panel_color: String,
    pub panel_shown_count: u64,
}

/// In-process toolbar backing the web surface.
pub struct ToolbarState {
    view: RwLock<ToolbarView>,
}

impl ToolbarState {
    pub fn new(color: &str) -> Self {
        Self {
            view: RwLock::new(ToolbarView {
                badge: None,
                badge_color: color.to_string(),
                badge_updated: None,
                panel_visible: false,
                panel_color: color.to_string(),
                panel_shown_count: 0,
            }),
        }
    }

    pub fn snapshot(&self) -> ToolbarView {
        self.read().clone()
    }

    pub fn dismiss_panel(&self) {
        self.write().panel_visible = false;
    }

    fn read(&self) -> RwLockReadGuard<'_, ToolbarView> {
        self.view.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ToolbarView> {
        self.view.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Badge for ToolbarState {
    fn set_badge(&self, value: Option<u32>) {
        let mut view = self.write();
        view.badge = value;
        view.badge_updated = Some(Utc::now());
    }

    fn set_badge_color(&self, color: &str) {
        self.write().badge_color = color.to_string();
    }
}

impl SignInPanel for ToolbarState {
    fn show(&self) {
        info!("Showing sign-in panel");
        let mut view = self.write();
        view.panel_visible = true;
        view.panel_shown_count += 1;
    }

    fn emit(&self, topic: &str, payload: &str) {
        if topic == "color" {
            self.write().panel_color = payload.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_toolbar_is_empty() {
        let toolbar = ToolbarState::new("#186DEE");
        let view = toolbar.snapshot();

        assert_eq!(view.badge, None);
        assert!(view.badge_updated.is_none());
        assert!(!view.panel_visible);
        assert_eq!(view.badge_color, "#186DEE");
        assert_eq!(view.panel_color, "#186DEE");
    }

    #[test]
    fn test_set_badge_records_update_time() {
        let toolbar = ToolbarState::new("#186DEE");
        toolbar.set_badge(Some(4));

        let view = toolbar.snapshot();
        assert_eq!(view.badge, Some(4));
        assert!(view.badge_updated.is_some());
    }

    #[test]
    fn test_show_and_dismiss_panel() {
        let toolbar = ToolbarState::new("#186DEE");
        toolbar.show();
        assert!(toolbar.snapshot().panel_visible);
        assert_eq!(toolbar.snapshot().panel_shown_count, 1);

        toolbar.dismiss_panel();
        assert!(!toolbar.snapshot().panel_visible);
        assert_eq!(toolbar.snapshot().panel_shown_count, 1);
    }

    #[test]
    fn test_panel_only_listens_to_color_topic() {
        let toolbar = ToolbarState::new("#186DEE");
        toolbar.emit("color", "#123456");
        toolbar.emit("other", "#FFFFFF");

        assert_eq!(toolbar.snapshot().panel_color, "#123456");
    }
}
