//! Collaborators provided by the hosting toolbar.
//!
//! The poller only ever talks to a [`Badge`] and a [`SignInPanel`]. Color
//! preferences and button navigation live here too, since they are thin glue
//! over the same host surface.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Numeric overlay on the toolbar button.
pub trait Badge {
    /// `None` clears the badge.
    fn set_badge(&self, value: Option<u32>);
    fn set_badge_color(&self, color: &str);
}

/// Prompt shown when the account appears to be signed out.
pub trait SignInPanel {
    fn show(&self);
    fn emit(&self, topic: &str, payload: &str);
}

/// Browsing context the button navigates in.
pub trait Navigator {
    fn active_url(&self) -> Option<String>;
    fn redirect_active(&self, url: &str);
    fn open(&self, url: &str);
}

impl<T: Badge + ?Sized> Badge for Arc<T> {
    fn set_badge(&self, value: Option<u32>) {
        (**self).set_badge(value)
    }

    fn set_badge_color(&self, color: &str) {
        (**self).set_badge_color(color)
    }
}

impl<T: SignInPanel + ?Sized> SignInPanel for Arc<T> {
    fn show(&self) {
        (**self).show()
    }

    fn emit(&self, topic: &str, payload: &str) {
        (**self).emit(topic, payload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    RedirectActive,
    OpenNew,
}

/// Blank contexts get reused; anything else keeps its page.
pub fn click_action(active_url: Option<&str>) -> NavAction {
    match active_url {
        None | Some("about:newtab") | Some("about:blank") => NavAction::RedirectActive,
        Some(_) => NavAction::OpenNew,
    }
}

pub fn handle_button_click<N: Navigator + ?Sized>(nav: &N, mail_url: &str) -> NavAction {
    let action = click_action(nav.active_url().as_deref());
    match action {
        NavAction::RedirectActive => nav.redirect_active(mail_url),
        NavAction::OpenNew => nav.open(mail_url),
    }
    action
}

pub fn is_valid_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Push a color to both the badge and the panel.
pub fn apply_color<B, P>(color: &str, badge: &B, panel: &P)
where
    B: Badge + ?Sized,
    P: SignInPanel + ?Sized,
{
    badge.set_badge_color(color);
    panel.emit("color", color);
}

/// Holds the `color` preference and notifies subscribers on change.
pub struct Preferences {
    color: watch::Sender<String>,
}

impl Preferences {
    pub fn new(color: impl Into<String>) -> Self {
        let (color, _) = watch::channel(color.into());
        Self { color }
    }

    pub fn color(&self) -> String {
        self.color.borrow().clone()
    }

    pub fn set_color(&self, color: &str) -> anyhow::Result<()> {
        if !is_valid_color(color) {
            anyhow::bail!("invalid color '{}', expected #RRGGBB", color);
        }
        self.color.send_replace(color.to_string());
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.color.subscribe()
    }
}

/// Apply the current color, then every later change, until the preferences go away.
pub async fn watch_color<B, P>(mut changes: watch::Receiver<String>, badge: &B, panel: &P)
where
    B: Badge + ?Sized,
    P: SignInPanel + ?Sized,
{
    loop {
        let color = changes.borrow_and_update().clone();
        info!("Badge color set to {}", color);
        apply_color(&color, badge, panel);

        if changes.changed().await.is_err() {
            break;
        }
    }
}
