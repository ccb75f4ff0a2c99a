//! Desktop notification surface over `org.freedesktop.Notifications`.
//!
//! The notification is created once and then updated in place through
//! `replaces_id`, so the desktop shows a single persistent entry while sounds
//! are active.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use soundscape_core::notification::{NotificationContent, NotificationResult};
use soundscape_core::protocol_constants::{APP_NAME, NOTIFICATION_ICON};
use soundscape_core::{LoggingNotificationSurface, NotificationError, NotificationSurface};
use zbus::zvariant::Value;

/// Never expire; the service removes the notification itself.
const EXPIRE_NEVER: i32 = 0;

#[zbus::proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    #[allow(clippy::too_many_arguments)]
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: HashMap<&str, Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;

    fn close_notification(&self, id: u32) -> zbus::Result<()>;
}

/// Notification surface backed by the desktop notification daemon.
pub struct DbusNotificationSurface {
    proxy: NotificationsProxy<'static>,
    /// Id of the visible notification, 0 when none is shown.
    current_id: Mutex<u32>,
}

impl DbusNotificationSurface {
    /// Connects to the session bus.
    pub async fn connect() -> zbus::Result<Self> {
        let conn = zbus::Connection::session().await?;
        let proxy = NotificationsProxy::new(&conn).await?;
        Ok(Self {
            proxy,
            current_id: Mutex::new(0),
        })
    }
}

fn backend_error(e: zbus::Error) -> NotificationError {
    NotificationError::Backend(e.to_string())
}

#[async_trait]
impl NotificationSurface for DbusNotificationSurface {
    async fn show(&self, content: &NotificationContent) -> NotificationResult<()> {
        let replaces_id = *self.current_id.lock();
        let mut hints = HashMap::new();
        hints.insert("resident", Value::from(true));
        hints.insert("transient", Value::from(false));
        hints.insert("category", Value::from("x-soundscape.playback"));

        let id = self
            .proxy
            .notify(
                APP_NAME,
                replaces_id,
                NOTIFICATION_ICON,
                &content.title,
                &content.body,
                &[],
                hints,
                EXPIRE_NEVER,
            )
            .await
            .map_err(backend_error)?;
        *self.current_id.lock() = id;
        Ok(())
    }

    async fn dismiss(&self) -> NotificationResult<()> {
        let id = std::mem::take(&mut *self.current_id.lock());
        if id == 0 {
            return Ok(());
        }
        self.proxy
            .close_notification(id)
            .await
            .map_err(backend_error)
    }

    fn name(&self) -> &'static str {
        "dbus"
    }
}

/// Picks the notification surface for this host.
///
/// Falls back to logging when desktop notifications are disabled or no
/// session bus is reachable (e.g. running as a system service).
pub async fn select_surface(desktop_notifications: bool) -> Arc<dyn NotificationSurface> {
    if !desktop_notifications {
        return Arc::new(LoggingNotificationSurface);
    }
    match DbusNotificationSurface::connect().await {
        Ok(surface) => Arc::new(surface),
        Err(e) => {
            log::warn!(
                "[Notification] Session bus unavailable ({}), logging notifications instead",
                e
            );
            Arc::new(LoggingNotificationSurface)
        }
    }
}
